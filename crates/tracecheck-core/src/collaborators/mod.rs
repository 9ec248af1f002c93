//! Contracts for external scorers and services.
//!
//! Classification, extraction, OCR, moderation and embedding similarity are
//! implemented outside this crate (usually behind a network client). The value
//! model only calls these traits synchronously and applies its address rules
//! to whatever spans they report.

pub mod cache;
pub mod similarity;
pub mod store;

use serde::{Deserialize, Serialize};

use crate::domain::{CharRange, ImageRef, Result};

pub use cache::{CachedClassifier, ResponseCache};
pub use similarity::levenshtein;
pub use store::{annotations_from_outcome, Annotation, PushTraceRequest, PushedTrace, TraceStore};

/// Input handed to a classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ClassifierInput {
    Text(String),
    Image(ImageRef),
}

/// A single-choice classification request. The serialized form doubles as
/// the cache key payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRequest {
    pub model: String,
    pub prompt: String,
    pub options: Vec<String>,
    pub input: ClassifierInput,
}

/// Picks one of `request.options` for the given input.
pub trait Classifier: Send + Sync {
    fn classify(&self, request: &ClassificationRequest) -> Result<String>;
}

/// One extracted substring, located by its 1-based line number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    pub line: usize,
    pub substring: String,
}

/// Extracts the parts of a text that satisfy a natural-language predicate.
pub trait Extractor: Send + Sync {
    fn extract(&self, text: &str, predicate: &str) -> Result<Vec<Detection>>;
}

/// A flagged region of a moderated text. `span` is in characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationFlag {
    pub category: String,
    pub span: CharRange,
}

pub trait Moderator: Send + Sync {
    fn moderate(&self, text: &str) -> Result<Vec<ModerationFlag>>;
}

/// Region of an image, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

pub trait OcrDetector: Send + Sync {
    fn contains(
        &self,
        image: &ImageRef,
        text: &str,
        case_sensitive: bool,
        bbox: Option<&BoundingBox>,
    ) -> Result<bool>;
}

/// Semantic similarity of two texts in `[0, 1]`.
pub trait EmbeddingScorer: Send + Sync {
    fn similarity(&self, a: &str, b: &str) -> Result<f64>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serializes_with_tagged_input() {
        let req = ClassificationRequest {
            model: "gpt-4o".to_string(),
            prompt: "Is it rude?".to_string(),
            options: vec!["yes".to_string(), "no".to_string()],
            input: ClassifierInput::Text("hello".to_string()),
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["input"], json!({"type": "text", "value": "hello"}));
    }

    #[test]
    fn test_moderation_flag_range_as_string() {
        let flag = ModerationFlag {
            category: "harassment".to_string(),
            span: CharRange::new(2, 7),
        };
        let value = serde_json::to_value(&flag).unwrap();
        assert_eq!(value["span"], json!("2-7"));
        let back: ModerationFlag = serde_json::from_value(value).unwrap();
        assert_eq!(back, flag);
    }
}
