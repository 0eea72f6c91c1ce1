//! Structured warnings for recoverable failures.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of recoverable condition a warning records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// A page could not be decoded and was skipped.
    PageDecode,
    /// A table region was demoted to body text.
    TableGrid,
    /// The model response used unknown or missing category keys.
    SchemaViolation,
    /// The model response was not well-formed and needed repair.
    ResponseFormat,
    /// The model call failed after retries.
    ModelCall,
    /// Prompt content was cut to fit the character budget.
    Truncation,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WarningKind::PageDecode => "page-decode",
            WarningKind::TableGrid => "table-grid",
            WarningKind::SchemaViolation => "schema-violation",
            WarningKind::ResponseFormat => "response-format",
            WarningKind::ModelCall => "model-call",
            WarningKind::Truncation => "truncation",
        };
        f.write_str(name)
    }
}

/// A recoverable problem attached to one document's result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionWarning {
    pub kind: WarningKind,
    /// Page the warning refers to, if any
    pub page: Option<u32>,
    pub message: String,
}

impl ExtractionWarning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            page: None,
            message: message.into(),
        }
    }

    /// Attach a page number.
    pub fn on_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }
}

impl fmt::Display for ExtractionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.page {
            Some(page) => write!(f, "[{}] page {}: {}", self.kind, page, self.message),
            None => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_display() {
        let w = ExtractionWarning::new(WarningKind::PageDecode, "bad stream").on_page(4);
        assert_eq!(w.to_string(), "[page-decode] page 4: bad stream");

        let w = ExtractionWarning::new(WarningKind::SchemaViolation, "dropped key 'misc'");
        assert_eq!(w.to_string(), "[schema-violation] dropped key 'misc'");
    }
}
