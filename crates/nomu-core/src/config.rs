//! Tunable limits for the consultation pipeline.
//!
//! Every field has a default; a JSON file may override any subset.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CounselConfig {
    /// Hard cap on checklist rounds, independent of the continuation decision.
    pub max_rounds: u32,
    pub max_checklist_items: usize,
    /// Evidence records shown to the checklist prompt.
    pub max_checklist_articles: usize,
    /// Issues that get their own evidence collection during classification.
    pub issue_search_top_n: usize,

    pub main_top_k: usize,
    pub classification_top_k: usize,
    pub conclusion_top_k: usize,
    pub decree_top_k: usize,
    pub filter_top_k: usize,
    /// Cap on records added by one enrichment pass.
    pub max_additional: usize,

    // Context budgets, in characters.
    pub checklist_context_chars: usize,
    pub classification_context_chars: usize,
    pub conclusion_context_chars: usize,
    pub decree_context_chars: usize,
    pub continuation_context_chars: usize,
    pub precedent_snippet_chars: usize,

    // Model output budgets.
    pub classification_max_tokens: u32,
    pub checklist_max_tokens: u32,
    pub checklist_retry_max_tokens: u32,
    pub continuation_max_tokens: u32,
    /// `None` leaves the conclusion length to the model.
    pub conclusion_max_tokens: Option<u32>,

    /// Timeout applied to every store and model call.
    pub call_timeout_secs: u64,
}

impl Default for CounselConfig {
    fn default() -> Self {
        Self {
            max_rounds: 3,
            max_checklist_items: 7,
            max_checklist_articles: 10,
            issue_search_top_n: 3,
            main_top_k: 15,
            classification_top_k: 22,
            conclusion_top_k: 10,
            decree_top_k: 8,
            filter_top_k: 20,
            max_additional: 20,
            checklist_context_chars: 3600,
            classification_context_chars: 5000,
            conclusion_context_chars: 4000,
            decree_context_chars: 2000,
            continuation_context_chars: 800,
            precedent_snippet_chars: 500,
            classification_max_tokens: 1024,
            checklist_max_tokens: 4096,
            checklist_retry_max_tokens: 8192,
            continuation_max_tokens: 512,
            conclusion_max_tokens: None,
            call_timeout_secs: 120,
        }
    }
}

impl CounselConfig {
    /// Load from a JSON file; missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks: [(&'static str, bool); 5] = [
            ("max_rounds", self.max_rounds == 0),
            ("max_checklist_items", self.max_checklist_items == 0),
            ("main_top_k", self.main_top_k == 0),
            ("conclusion_top_k", self.conclusion_top_k == 0),
            ("call_timeout_secs", self.call_timeout_secs == 0),
        ];
        match checks.iter().find(|(_, is_zero)| *is_zero) {
            Some((field, _)) => Err(ConfigError::Zero { field: *field }),
            None => Ok(()),
        }
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = CounselConfig::default();
        assert_eq!(config.max_rounds, 3);
        assert_eq!(config.max_checklist_items, 7);
        assert_eq!(config.checklist_context_chars, 3600);
        assert!(config.checklist_retry_max_tokens > config.checklist_max_tokens);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_override_keeps_defaults() {
        let config = CounselConfig::from_json_str(r#"{"max_rounds": 2}"#).unwrap();
        assert_eq!(config.max_rounds, 2);
        assert_eq!(config.max_checklist_items, 7);
    }

    #[test]
    fn zero_rounds_rejected() {
        let err = CounselConfig::from_json_str(r#"{"max_rounds": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Zero { field: "max_rounds" }));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"conclusion_top_k": 12, "call_timeout_secs": 30}}"#).unwrap();
        let config = CounselConfig::from_file(file.path()).unwrap();
        assert_eq!(config.conclusion_top_k, 12);
        assert_eq!(config.call_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = CounselConfig::from_file(Path::new("/nonexistent/nomu.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
