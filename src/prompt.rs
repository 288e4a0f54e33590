use std::io::{self, BufRead, ErrorKind, Write};
use std::path::PathBuf;

use crate::manga::{Chapter, Manga};
use crate::report::{Level, Reporter};
use crate::selection::{parse_selection, resolve_selection};

/// A source of typed answers, one line at a time.
pub trait Prompt {
    /// Reads one answer, without its line ending. End of input is an
    /// `UnexpectedEof` error.
    fn read_line(&mut self) -> io::Result<String>;
}

/// Line prompt over any reader/writer pair, `>> ` before each answer.
pub struct LinePrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> LinePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl LinePrompt<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Prompt for LinePrompt<R, W> {
    fn read_line(&mut self) -> io::Result<String> {
        write!(self.output, ">> ")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(ErrorKind::UnexpectedEof, "input closed"));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// Asks until a line could be read. Only a closed input gives up.
fn ask(prompt: &mut dyn Prompt, reporter: &dyn Reporter, question: &str) -> io::Result<String> {
    loop {
        reporter.report(Level::Prompt, question);
        match prompt.read_line() {
            Ok(answer) => return Ok(answer),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Err(e),
            Err(_) => reporter.report(Level::Error, "Error reading input. Please try again."),
        }
    }
}

/// `y`/`yes` and `n`/`no`/nothing, in any case.
pub fn parse_yes_no(answer: &str) -> Option<bool> {
    match answer.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" | "" => Some(false),
        _ => None,
    }
}

pub fn download_location(prompt: &mut dyn Prompt, reporter: &dyn Reporter) -> io::Result<PathBuf> {
    loop {
        let answer = ask(prompt, reporter, "Select a download location")?;
        let path = PathBuf::from(answer.trim());
        if !answer.trim().is_empty() && path.is_dir() {
            return Ok(path);
        }
        reporter.report(Level::Error, "Invalid selection. Please select a valid location.");
    }
}

pub fn confirm_cbz(prompt: &mut dyn Prompt, reporter: &dyn Reporter) -> io::Result<bool> {
    loop {
        let answer = ask(prompt, reporter, "Would you like a cbz archive to be created? (y/N)")?;
        match parse_yes_no(&answer) {
            Some(cbz) => return Ok(cbz),
            None => reporter.report(
                Level::Error,
                "Invalid input. Please enter 'y' for yes or 'n' for no.",
            ),
        }
    }
}

/// Looks up a 1-based menu entry.
pub fn pick_manga<'a>(mangas: &'a [Manga], answer: &str) -> Option<&'a Manga> {
    let index: usize = answer.trim().parse().ok()?;
    mangas.get(index.checked_sub(1)?)
}

pub fn select_manga<'a>(
    prompt: &mut dyn Prompt,
    reporter: &dyn Reporter,
    mangas: &'a [Manga],
) -> io::Result<&'a Manga> {
    for (i, manga) in mangas.iter().enumerate() {
        reporter.report(Level::Item, &format!("({}) {}", i + 1, manga.title));
    }

    loop {
        let answer = ask(prompt, reporter, "Select a manga")?;
        if let Some(manga) = pick_manga(mangas, &answer) {
            return Ok(manga);
        }
        reporter.report(Level::Error, "Invalid selection. Please select a valid manga.");
    }
}

/// Parses and resolves a selection, or explains why nothing was selected.
pub fn pick_chapters(chapters: &[Chapter], answer: &str) -> Result<Vec<Chapter>, String> {
    let available: Vec<f64> = chapters.iter().map(|c| c.number).collect();
    let selected = parse_selection(answer, &available).map_err(|e| e.to_string())?;
    let resolved = resolve_selection(&selected, chapters);
    if resolved.is_empty() {
        return Err(format!("no listed chapter matches {:?}", answer.trim()));
    }
    Ok(resolved)
}

pub fn select_chapters(
    prompt: &mut dyn Prompt,
    reporter: &dyn Reporter,
    chapters: &[Chapter],
) -> io::Result<Vec<Chapter>> {
    for chapter in chapters {
        reporter.report(Level::Item, &chapter.label());
    }

    loop {
        let answer = ask(prompt, reporter, "Select chapters (e.g. 1-5,7,10.5)")?;
        match pick_chapters(chapters, &answer) {
            Ok(selected) => return Ok(selected),
            Err(reason) => reporter.report(
                Level::Error,
                &format!("Invalid selection: {reason}. Please try again."),
            ),
        }
    }
}
