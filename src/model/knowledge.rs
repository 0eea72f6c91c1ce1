//! The pipeline's terminal record.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ExtractionMode;

/// How classification of a document ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationStatus {
    /// The model answered with a well-formed record.
    #[default]
    Complete,
    /// The answer needed repair or line-based recovery, or some keys were
    /// missing; the record is usable but partial.
    Degraded,
    /// Nothing could be classified; only structural detail is present.
    Failed,
}

/// Metadata attached to every knowledge record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeMetadata {
    pub extraction_method: ExtractionMode,
    pub pages_processed: u32,
    pub headers_found: usize,
    pub tables_found: usize,
    pub footnotes_found: usize,
    pub timestamp: DateTime<Utc>,
    pub source_file_name: String,
    pub classification: ClassificationStatus,
}

/// Knowledge items grouped by category key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorizedKnowledge {
    categories: BTreeMap<String, Vec<String>>,
    metadata: KnowledgeMetadata,
}

impl CategorizedKnowledge {
    pub(crate) fn new(
        categories: BTreeMap<String, Vec<String>>,
        metadata: KnowledgeMetadata,
    ) -> Self {
        Self {
            categories,
            metadata,
        }
    }

    /// All categories, keyed by category key.
    pub fn categories(&self) -> &BTreeMap<String, Vec<String>> {
        &self.categories
    }

    /// Items for one category; empty if the key is not present.
    pub fn get(&self, key: &str) -> &[String] {
        self.categories.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn metadata(&self) -> &KnowledgeMetadata {
        &self.metadata
    }

    pub fn status(&self) -> ClassificationStatus {
        self.metadata.classification
    }

    /// Whether classification ended degraded or failed.
    pub fn is_degraded(&self) -> bool {
        self.metadata.classification != ClassificationStatus::Complete
    }

    /// Number of categories holding at least one item.
    pub fn populated_count(&self) -> usize {
        self.categories.values().filter(|v| !v.is_empty()).count()
    }

    /// Total number of items over all categories.
    pub fn total_items(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    /// Equality ignoring the timestamp.
    pub fn same_content(&self, other: &CategorizedKnowledge) -> bool {
        let mut left = self.metadata.clone();
        left.timestamp = other.metadata.timestamp;
        self.categories == other.categories && left == other.metadata
    }
}
