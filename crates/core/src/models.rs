use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub position: usize,
    pub distance: f32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub query: String,
    pub response: String,
}

/// One labeled field to pull out of a restaurant page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRule {
    /// Space-separated class list as it appears in the page's `class`
    /// attribute.
    pub class_names: String,
    pub label: String,
}

impl ExtractionRule {
    pub fn new(class_names: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            class_names: class_names.into(),
            label: label.into(),
        }
    }

    pub fn css_selector(&self) -> String {
        self.class_names
            .split_whitespace()
            .map(|class| format!(".{class}"))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct SkippedPage {
    pub url: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct ScrapeReport {
    pub documents: Vec<String>,
    pub skipped: Vec<SkippedPage>,
}
