pub mod anchors;
pub mod names;
pub mod vocab;
pub mod window;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::debug;

use anchors::{scan_anchors, split_lines, Anchor};
pub use vocab::{Role, Vocabulary};
use window::{scan_window, DEFAULT_WINDOW};

/// Name used when nothing above the anchor looks like a name.
pub const UNKNOWN_NAME: &str = "Unknown";

/// Join date of a member: read from the text, or stamped with the processing time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "source", content = "value", rename_all = "snake_case")]
pub enum JoinDate {
    Parsed(NaiveDate),
    Defaulted(DateTime<Utc>),
}

impl JoinDate {
    pub fn instant(&self) -> DateTime<Utc> {
        match self {
            JoinDate::Parsed(d) => d.and_time(chrono::NaiveTime::MIN).and_utc(),
            JoinDate::Defaulted(t) => *t,
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, JoinDate::Parsed(_))
    }

    pub fn source(&self) -> &'static str {
        match self {
            JoinDate::Parsed(_) => "parsed",
            JoinDate::Defaulted(_) => "default",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberRecord {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub joined: JoinDate,
}

/// Records in the order their emails appear in the pasted text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportResult {
    pub records: Vec<MemberRecord>,
}

impl ImportResult {
    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// One anchor resolved into a record, plus where the outer scan picks up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub record: MemberRecord,
    pub resume_at: usize,
}

/// Turns pasted member-page text into [`MemberRecord`]s.
///
/// Holds only configuration; every call is independent and the parser can be
/// shared across threads.
#[derive(Debug, Clone)]
pub struct RosterParser {
    vocab: Vocabulary,
    window: usize,
}

impl Default for RosterParser {
    fn default() -> Self {
        RosterParser::new(Vocabulary::default(), DEFAULT_WINDOW)
    }
}

impl RosterParser {
    pub fn new(vocab: Vocabulary, window: usize) -> Self {
        RosterParser { vocab, window }
    }

    pub fn parse(&self, text: &str) -> ImportResult {
        self.parse_at(text, Utc::now())
    }

    /// Like [`parse`](Self::parse) with a fixed processing time for defaulted dates.
    pub fn parse_at(&self, text: &str, now: DateTime<Utc>) -> ImportResult {
        let lines = split_lines(text);
        let mut records = Vec::new();
        let mut cursor = 0;

        // Lines before the cursor were consumed by the previous record's window,
        // which always stops on the next anchor line, so no anchor is skipped.
        while let Some(anchor) = scan_anchors(&lines, cursor).next() {
            let resolved = self.resolve(&lines, anchor, now);
            debug!(
                line = anchor.line,
                email = %resolved.record.email,
                role = resolved.record.role.as_str(),
                date_source = resolved.record.joined.source(),
                "resolved member"
            );
            records.push(resolved.record);
            cursor = resolved.resume_at;
        }

        debug!(lines = lines.len(), records = records.len(), "roster parsed");
        ImportResult { records }
    }

    /// Build the record for one anchor from its neighbouring lines.
    pub fn resolve(&self, lines: &[&str], anchor: Anchor<'_>, now: DateTime<Utc>) -> Resolved {
        let name = names::resolve_name(lines, anchor.line, &self.vocab).unwrap_or(UNKNOWN_NAME);
        let scan = scan_window(lines, anchor.line, self.window, &self.vocab);

        Resolved {
            record: MemberRecord {
                name: name.to_string(),
                email: anchor.email.to_string(),
                role: scan.role.unwrap_or_default(),
                joined: scan.joined.map_or(JoinDate::Defaulted(now), JoinDate::Parsed),
            },
            resume_at: scan.resume_at.max(anchor.line + 1),
        }
    }
}
