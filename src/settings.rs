use std::path::PathBuf;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::roster::window::DEFAULT_WINDOW;
use crate::roster::{RosterParser, Vocabulary};

const DEFAULT_DB_PATH: &str = "data/roster.sqlite";
const DEFAULT_MAX_INPUT_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub db_path: PathBuf,
    /// Lines scanned below each email for role and join date.
    pub window: usize,
    /// Pasted payloads larger than this are rejected before parsing.
    pub max_input_bytes: usize,
    #[serde(default)]
    pub extra_structural_tokens: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            window: DEFAULT_WINDOW,
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            extra_structural_tokens: Vec::new(),
        }
    }
}

impl Settings {
    /// Defaults, then `roster.toml` if present, then `ROSTER_*` environment variables.
    pub fn load() -> Result<Self> {
        Config::builder()
            .set_default("db_path", DEFAULT_DB_PATH)?
            .set_default("window", DEFAULT_WINDOW as i64)?
            .set_default("max_input_bytes", DEFAULT_MAX_INPUT_BYTES as i64)?
            .set_default("extra_structural_tokens", Vec::<String>::new())?
            .add_source(File::with_name("roster").required(false))
            .add_source(
                Environment::with_prefix("ROSTER")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("extra_structural_tokens"),
            )
            .build()
            .context("Failed to read settings")?
            .try_deserialize()
            .context("Invalid settings")
    }

    pub fn parser(&self) -> RosterParser {
        let vocab = Vocabulary::default().with_structural_tokens(self.extra_structural_tokens.iter().cloned());
        RosterParser::new(vocab, self.window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = Settings::default();
        assert_eq!(s.window, 10);
        assert_eq!(s.db_path, PathBuf::from("data/roster.sqlite"));
        assert_eq!(s.max_input_bytes, 1_048_576);
    }

    #[test]
    fn parser_uses_extra_tokens() {
        let s = Settings {
            extra_structural_tokens: vec!["Seat type".into()],
            ..Settings::default()
        };
        let result = s.parser().parse("Jane\nSeat type\njane@x.com");
        assert_eq!(result.records[0].name, "Jane");
    }

    #[test]
    fn parser_uses_window() {
        let s = Settings {
            window: 1,
            ..Settings::default()
        };
        let result = s.parser().parse("a@x.com\n\nOwner");
        assert_eq!(result.records[0].role, crate::roster::Role::Member);
    }
}
