use std::sync::LazyLock;

use regex::Regex;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").unwrap());

/// An email-shaped token and the line it was found on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor<'a> {
    pub line: usize,
    pub email: &'a str,
}

/// Split pasted text into trimmed lines. Blank lines stay in place as block separators.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.lines().map(str::trim).collect()
}

/// First email-shaped token on the line. A second email on the same line is ignored.
pub fn find_anchor(line: &str) -> Option<&str> {
    EMAIL_RE.find(line).map(|m| m.as_str())
}

/// Lazily yield anchors at or below line `from`, top to bottom.
pub fn scan_anchors<'a>(lines: &'a [&'a str], from: usize) -> impl Iterator<Item = Anchor<'a>> + 'a {
    lines
        .iter()
        .enumerate()
        .skip(from)
        .filter_map(|(line, text)| find_anchor(text).map(|email| Anchor { line, email }))
}
