use regex::Regex;
use std::sync::LazyLock;

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Clean one line of OCR output
///
/// Control characters are dropped, whitespace runs collapse to a single
/// space and the ends are trimmed. Case is preserved.
pub fn normalize_line(line: &str) -> String {
    let printable: String = line
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();

    WHITESPACE_RUN
        .replace_all(printable.trim(), " ")
        .into_owned()
}

/// Split raw recognizer text into normalized, non-empty lines
pub fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(normalize_line)
        .filter(|line| !line.is_empty())
        .collect()
}
