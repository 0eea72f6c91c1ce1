//! The fixed category taxonomy the classifier fills.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use unicode_normalization::UnicodeNormalization;

use crate::config::PromptSettings;
use crate::error::Error;

/// Key of the structural-detail category, present only in detailed mode.
pub const DETAILED_INFO: &str = "detailed_info";

/// Extraction mode for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    /// Body text only, six categories
    #[default]
    Standard,
    /// Body text plus structural appendix, adds `detailed_info`
    Detailed,
}

impl ExtractionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMode::Standard => "standard",
            ExtractionMode::Detailed => "detailed",
        }
    }
}

impl fmt::Display for ExtractionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtractionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Ok(ExtractionMode::Standard),
            "detailed" => Ok(ExtractionMode::Detailed),
            other => Err(Error::Config(format!(
                "unknown extraction mode '{}' (expected 'standard' or 'detailed')",
                other
            ))),
        }
    }
}

/// One knowledge bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDef {
    /// Stable ASCII key used in output records
    pub key: String,
    /// Display label, also accepted as a response key
    pub label: String,
    /// What belongs in this bucket; shown to the model
    pub description: String,
    /// Other names the model may use for this bucket
    pub synonyms: Vec<String>,
    /// Only active in detailed mode
    pub detailed_only: bool,
}

impl CategoryDef {
    fn new(key: &str, label: &str, description: &str, synonyms: &[&str]) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            description: description.to_string(),
            synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
            detailed_only: false,
        }
    }

    /// Whether `name` refers to this category once normalized.
    pub fn matches(&self, name: &str) -> bool {
        let wanted = normalize_name(name);
        if wanted.is_empty() {
            return false;
        }
        std::iter::once(&self.key)
            .chain(std::iter::once(&self.label))
            .chain(self.synonyms.iter())
            .any(|candidate| normalize_name(candidate) == wanted)
    }
}

/// Normalize a category name for comparison: NFKC, lowercase, and only
/// alphanumeric characters kept.
pub fn normalize_name(name: &str) -> String {
    name.nfkc()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// The category taxonomy, shared read-only for the whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySchema {
    categories: Vec<CategoryDef>,
}

impl Default for CategorySchema {
    fn default() -> Self {
        let mut detailed = CategoryDef::new(
            DETAILED_INFO,
            "詳細情報",
            "見出し、タイトル、表の内容、脚注、補足情報など",
            &["detailed info", "details", "detail", "structure", "詳細"],
        );
        detailed.detailed_only = true;

        Self {
            categories: vec![
                CategoryDef::new(
                    "concepts",
                    "概念・理論",
                    "ビジネス概念、戦略理論、フレームワーク、基本原理、定義など",
                    &["concept", "theory", "theories", "概念", "理論"],
                ),
                CategoryDef::new(
                    "methodology",
                    "方法論・手順",
                    "実施方法、プロセス、ステップ、手順、やり方、具体的な手順など",
                    &["method", "methods", "process", "procedure", "procedures", "方法論", "手順"],
                ),
                CategoryDef::new(
                    "case_studies",
                    "事例・ケーススタディ",
                    "具体例、成功事例、失敗事例、実際の取り組み、企業事例、実例など",
                    &["case study", "cases", "examples", "事例", "ケーススタディ"],
                ),
                CategoryDef::new(
                    "data_points",
                    "データ・数値",
                    "統計数値、売上データ、市場規模、パーセンテージ、年度、金額、具体的な数値など",
                    &["data", "statistics", "figures", "numbers", "データ", "数値"],
                ),
                CategoryDef::new(
                    "risks",
                    "注意点・リスク",
                    "注意すべき点、課題、問題点、リスク要因、障害、制約など",
                    &["risk", "cautions", "caveats", "pitfalls", "注意点", "リスク"],
                ),
                CategoryDef::new(
                    "best_practices",
                    "ベストプラクティス",
                    "推奨事項、成功のコツ、効果的な方法、改善案、最適解など",
                    &["best practice", "recommendations", "推奨事項"],
                ),
                detailed,
            ],
        }
    }
}

impl CategorySchema {
    /// The built-in schema with description overrides from the config
    /// applied. Override keys that name no category are ignored.
    pub fn from_config(prompts: &PromptSettings) -> Self {
        let mut schema = Self::default();
        for (name, description) in &prompts.categories {
            match schema.categories.iter_mut().find(|c| c.matches(name)) {
                Some(category) => category.description = description.clone(),
                None => log::warn!("Ignoring description override for unknown category '{}'", name),
            }
        }
        schema
    }

    /// All categories, including detailed-only ones.
    pub fn categories(&self) -> &[CategoryDef] {
        &self.categories
    }

    /// Categories active in `mode`, in schema order.
    pub fn active(&self, mode: ExtractionMode) -> impl Iterator<Item = &CategoryDef> {
        self.categories
            .iter()
            .filter(move |c| mode == ExtractionMode::Detailed || !c.detailed_only)
    }

    /// Keys active in `mode`, in schema order.
    pub fn keys(&self, mode: ExtractionMode) -> Vec<&str> {
        self.active(mode).map(|c| c.key.as_str()).collect()
    }

    /// Look up a category by key.
    pub fn get(&self, key: &str) -> Option<&CategoryDef> {
        self.categories.iter().find(|c| c.key == key)
    }

    /// Resolve a key, label, or synonym to an active category.
    pub fn resolve(&self, name: &str, mode: ExtractionMode) -> Option<&CategoryDef> {
        self.active(mode).find(|c| c.matches(name))
    }
}
