use console::style;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// A question asked of the user.
    Prompt,
    /// One entry of a numbered menu.
    Item,
    Info,
    Success,
    Warning,
    Error,
}

/// Where everything meant for the user ends up.
pub trait Reporter: Send + Sync {
    fn report(&self, level: Level, message: &str);
}

/// Colored terminal output. Warnings and errors go to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn report(&self, level: Level, message: &str) {
        match level {
            Level::Prompt => println!("{}", style(message).blue().bold()),
            Level::Item => println!("{}", style(message).yellow()),
            Level::Info => println!("{message}"),
            Level::Success => println!("{}", style(message).green().bright()),
            Level::Warning => eprintln!("{}", style(message).yellow().bright()),
            Level::Error => eprintln!("{}", style(message).red()),
        }
    }
}

#[cfg(test)]
pub mod testing {
    use super::{Level, Reporter};
    use std::sync::Mutex;

    /// Keeps every report in memory so tests can look at it.
    #[derive(Default)]
    pub struct RecordingReporter {
        pub entries: Mutex<Vec<(Level, String)>>,
    }

    impl RecordingReporter {
        pub fn messages(&self, level: Level) -> Vec<String> {
            self.entries
                .lock()
                .unwrap()
                .iter()
                .filter(|(l, _)| *l == level)
                .map(|(_, message)| message.clone())
                .collect()
        }
    }

    impl Reporter for RecordingReporter {
        fn report(&self, level: Level, message: &str) {
            self.entries
                .lock()
                .unwrap()
                .push((level, message.to_string()));
        }
    }
}
