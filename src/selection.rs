use std::str::FromStr;

use crate::error::SelectionError;
use crate::manga::Chapter;

/// Inclusive range of chapter numbers, written `start-end`.
#[derive(PartialEq, Clone, Copy, Debug)]
pub struct ChapterRange {
    start: f64,
    end: f64,
}

impl ChapterRange {
    /// Checks to see if the given value is within the range, both ends included.
    pub fn contains(&self, value: &f64) -> bool {
        value >= &self.start && value <= &self.end
    }

    #[cfg(test)]
    fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }
}

impl FromStr for ChapterRange {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('-').map(str::trim).collect();
        let &[start, end] = parts.as_slice() else {
            return Err(SelectionError::InvalidRangeFormat(s.to_string()));
        };
        if start.is_empty() || end.is_empty() {
            return Err(SelectionError::InvalidRangeFormat(s.to_string()));
        }

        let start = parse_number(start)?;
        let end = parse_number(end)?;
        if start > end {
            return Err(SelectionError::InvalidRange(s.to_string()));
        }

        Ok(Self { start, end })
    }
}

/// One comma separated piece of a selection.
#[derive(PartialEq, Clone, Copy, Debug)]
enum Token {
    Single(f64),
    Range(ChapterRange),
}

impl FromStr for Token {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.contains('-') {
            Ok(Token::Range(s.parse()?))
        } else {
            Ok(Token::Single(parse_number(s)?))
        }
    }
}

fn parse_number(s: &str) -> Result<f64, SelectionError> {
    match s.trim().parse::<f64>() {
        Ok(number) if number.is_finite() => Ok(number),
        _ => Err(SelectionError::InvalidNumber(s.to_string())),
    }
}

/// Parses a selection like `1-5,7,10.5` against the chapter numbers on offer.
///
/// Ranges only ever pick numbers from `available`. Single numbers are kept
/// as typed, whether or not a chapter carries that number; they simply
/// resolve to nothing later on. The result is sorted and free of duplicates.
pub fn parse_selection(input: &str, available: &[f64]) -> Result<Vec<f64>, SelectionError> {
    let mut selected = Vec::new();
    for token in input.split(',') {
        match token.parse::<Token>()? {
            Token::Single(number) => selected.push(number),
            Token::Range(range) => {
                selected.extend(available.iter().filter(|n| range.contains(n)).copied())
            }
        }
    }

    selected.sort_by(f64::total_cmp);
    selected.dedup();
    Ok(selected)
}

/// Maps selected numbers to the chapters carrying them, in ascending order.
pub fn resolve_selection(selected: &[f64], chapters: &[Chapter]) -> Vec<Chapter> {
    selected
        .iter()
        .filter_map(|number| chapters.iter().find(|chapter| chapter.number == *number))
        .cloned()
        .collect()
}
