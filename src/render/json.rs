//! JSON hand-off of knowledge records.

use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::model::CategorizedKnowledge;

/// JSON output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonFormat {
    /// Pretty-printed JSON with indentation
    #[default]
    Pretty,
    /// Compact JSON without extra whitespace
    Compact,
}

/// Serialize a knowledge record.
pub fn to_json(knowledge: &CategorizedKnowledge, format: JsonFormat) -> Result<String> {
    let json = match format {
        JsonFormat::Pretty => serde_json::to_string_pretty(knowledge)?,
        JsonFormat::Compact => serde_json::to_string(knowledge)?,
    };
    Ok(json)
}

/// Serialize a knowledge record and write it to `path`.
pub fn write_json<P: AsRef<Path>>(
    knowledge: &CategorizedKnowledge,
    path: P,
    format: JsonFormat,
) -> Result<()> {
    let json = to_json(knowledge, format)?;
    fs::write(path.as_ref(), json)?;
    log::debug!("Wrote {}", path.as_ref().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassificationStatus, ExtractionMode, KnowledgeMetadata};
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn knowledge() -> CategorizedKnowledge {
        let mut categories = BTreeMap::new();
        categories.insert("risks".to_string(), vec!["Currency exposure".to_string()]);
        categories.insert("concepts".to_string(), Vec::new());
        CategorizedKnowledge::new(
            categories,
            KnowledgeMetadata {
                extraction_method: ExtractionMode::Detailed,
                pages_processed: 3,
                headers_found: 1,
                tables_found: 1,
                footnotes_found: 1,
                timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(),
                source_file_name: "report.pdf".into(),
                classification: ClassificationStatus::Complete,
            },
        )
    }

    #[test]
    fn test_to_json_pretty() {
        let json = to_json(&knowledge(), JsonFormat::Pretty).unwrap();
        assert!(json.contains("\"risks\""));
        assert!(json.contains("Currency exposure"));
        assert!(json.contains('\n'));
    }

    #[test]
    fn test_to_json_compact() {
        let json = to_json(&knowledge(), JsonFormat::Compact).unwrap();
        assert!(!json.contains('\n'));
    }

    #[test]
    fn test_metadata_keys() {
        let json = to_json(&knowledge(), JsonFormat::Compact).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let metadata = &value["metadata"];
        assert_eq!(metadata["extractionMethod"], "detailed");
        assert_eq!(metadata["pagesProcessed"], 3);
        assert_eq!(metadata["sourceFileName"], "report.pdf");
        assert_eq!(metadata["classification"], "complete");
        assert!(metadata["timestamp"].as_str().unwrap().starts_with("2024-05-01T09:30:00"));
    }

    #[test]
    fn test_write_json_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.knowledge.json");
        let original = knowledge();
        write_json(&original, &path, JsonFormat::Pretty).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: CategorizedKnowledge = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, original);
    }
}
