//! Search log models

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Longest accepted search term, in characters
pub const MAX_TERM_CHARS: usize = 200;

/// A trimmed, non-empty search term
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchTerm(String);

impl SearchTerm {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::Validation("Search term cannot be empty.".into()));
        }
        if trimmed.chars().count() > MAX_TERM_CHARS {
            return Err(Error::Validation(format!(
                "Search term cannot exceed {MAX_TERM_CHARS} characters."
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SearchTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One logged search. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub term: String,
    pub timestamp: DateTime<Utc>,
}

/// Aggregated frequency of a term across all users
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermCount {
    pub term: String,
    pub count: u64,
}

/// A single image hit, relayed verbatim from the image provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageResult(pub serde_json::Value);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_term_is_trimmed() {
        let term = SearchTerm::parse("  cats \n").unwrap();
        assert_eq!(term.as_str(), "cats");
    }

    #[test]
    fn test_blank_terms_rejected() {
        for raw in ["", "   ", "\t\n"] {
            assert!(matches!(SearchTerm::parse(raw), Err(Error::Validation(_))));
        }
    }

    #[test]
    fn test_overlong_term_rejected() {
        let raw = "x".repeat(MAX_TERM_CHARS + 1);
        assert!(SearchTerm::parse(&raw).is_err());
        assert!(SearchTerm::parse(&raw[1..]).is_ok());
    }

    #[test]
    fn test_image_result_is_transparent() {
        let value = serde_json::json!({"id": "abc", "urls": {"thumb": "t"}});
        let result: ImageResult = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(serde_json::to_value(&result).unwrap(), value);
    }
}
