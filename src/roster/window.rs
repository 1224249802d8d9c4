use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use tracing::debug;

use super::anchors::find_anchor;
use super::vocab::{Role, Vocabulary};

pub const DEFAULT_WINDOW: usize = 10;

const JOIN_DATE_FORMAT: &str = "%b %d, %Y";

static JOIN_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z][a-z]{2}\s\d{1,2},\s\d{4}").unwrap());

/// What the forward scan found for one anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowScan {
    pub role: Option<Role>,
    pub joined: Option<NaiveDate>,
    /// First line not consumed by this record. Always past the anchor line.
    pub resume_at: usize,
}

/// Scan up to `window` lines below the anchor for a role line and a join date.
///
/// Stops early once both are known, or on a line holding another anchor. That
/// line is left untouched so it can open the next record.
pub fn scan_window(lines: &[&str], anchor: usize, window: usize, vocab: &Vocabulary) -> WindowScan {
    let start = anchor + 1;
    let end = lines.len().min(start.saturating_add(window)).max(start);
    let mut scan = WindowScan {
        role: None,
        joined: None,
        resume_at: end,
    };

    for (idx, &line) in lines.iter().enumerate().take(end).skip(start) {
        if line.is_empty() {
            continue;
        }
        if find_anchor(line).is_some() {
            scan.resume_at = idx;
            return scan;
        }
        if scan.role.is_none() {
            scan.role = vocab.role(line);
        }
        if scan.joined.is_none() {
            scan.joined = parse_join_date(line);
        }
        if scan.role.is_some() && scan.joined.is_some() {
            scan.resume_at = idx + 1;
            return scan;
        }
    }

    scan
}

/// Parse the first `Mon D, YYYY` substring of the line.
///
/// A shape match that is not a real date ("Foo 12, 2024", "Feb 30, 2024")
/// yields `None` so the caller keeps scanning.
pub fn parse_join_date(line: &str) -> Option<NaiveDate> {
    let raw = JOIN_DATE_RE.find(line)?.as_str();
    match NaiveDate::parse_from_str(raw, JOIN_DATE_FORMAT) {
        Ok(date) => Some(date),
        Err(e) => {
            debug!(raw, error = %e, "date-shaped text did not parse");
            None
        }
    }
}
