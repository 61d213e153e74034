//! Records produced by each triage stage.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Topic of an issue. The set is closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Bug,
    Feature,
    #[default]
    Question,
    Docs,
    Security,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Bug,
        Category::Feature,
        Category::Question,
        Category::Docs,
        Category::Security,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Bug => "bug",
            Category::Feature => "feature",
            Category::Question => "question",
            Category::Docs => "docs",
            Category::Security => "security",
        }
    }

    /// Parse a category name, ignoring case and surrounding whitespace.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
    }

    /// Label applied to the issue for this category.
    pub fn label(&self) -> String {
        format!("triage/{}", self.as_str())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub category: Category,

    /// Always within `[0.0, 1.0]`
    pub confidence: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl ClassificationResult {
    pub const FAILURE_REASONING: &'static str = "Classification failed due to error.";

    pub fn new(category: Category, confidence: f32, reasoning: Option<String>) -> Self {
        Self {
            category,
            confidence: confidence.clamp(0.0, 1.0),
            reasoning,
        }
    }

    /// Fixed result returned when classification could not be performed.
    pub fn failed() -> Self {
        Self {
            category: Category::Question,
            confidence: 0.0,
            reasoning: Some(Self::FAILURE_REASONING.to_string()),
        }
    }
}

/// A previously indexed issue that looks like the current one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateMatch {
    /// Index record id (string form of the issue id)
    pub id: String,
    pub number: u64,
    pub title: String,
    pub distance: f32,
}

/// Output of duplicate detection. Matches are ordered nearest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    pub duplicates: Vec<DuplicateMatch>,
    pub is_duplicate: bool,
}

impl SimilarityResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_matches(duplicates: Vec<DuplicateMatch>) -> Self {
        let is_duplicate = !duplicates.is_empty();
        Self {
            duplicates,
            is_duplicate,
        }
    }
}

/// Output of the router. `team` is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingResult {
    pub team: String,
    pub reasoning: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Generated,
    Templated,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::Generated => "generated",
            ResponseSource::Templated => "templated",
        }
    }
}

/// Reply posted on the issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseResult {
    pub text: String,
    pub source: ResponseSource,
}
