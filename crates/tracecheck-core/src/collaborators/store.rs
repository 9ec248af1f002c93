//! Remote trace store contract.
//!
//! When pushing is enabled, a closing scope uploads its trace together with
//! one annotation per address of every failed assertion, so the store's
//! explorer can highlight the offending spans.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{Address, Result};
use crate::manager::TestOutcome;

/// Fallback annotation text for assertions recorded without a message.
pub const DEFAULT_ANNOTATION: &str = "assertion failed";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub content: String,
    pub address: Address,
}

#[derive(Debug, Clone, Serialize)]
pub struct PushTraceRequest<'a> {
    pub messages: &'a [Value],
    pub annotations: Vec<Annotation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<&'a Map<String, Value>>,
    pub dataset: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushedTrace {
    /// Where the pushed trace can be inspected.
    pub url: String,
}

pub trait TraceStore: Send + Sync {
    fn push_trace(&self, request: &PushTraceRequest<'_>) -> Result<PushedTrace>;
}

/// Annotations for every failed assertion, HARD and SOFT, one per address.
pub fn annotations_from_outcome(outcome: &TestOutcome) -> Vec<Annotation> {
    outcome
        .assertions
        .iter()
        .filter(|a| !a.passed)
        .flat_map(|a| {
            let content = format!(
                "[{}] {}",
                a.kind,
                a.message.as_deref().unwrap_or(DEFAULT_ANNOTATION)
            );
            a.addresses.iter().map(move |address| Annotation {
                content: content.clone(),
                address: address.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::{Assertion, AssertionKind};
    use serde_json::json;

    fn addr(raw: &str) -> Address {
        Address::parse(raw).unwrap()
    }

    #[test]
    fn test_annotations_only_for_failures() {
        let outcome = TestOutcome::from_assertions(
            "t",
            vec![
                Assertion::new(AssertionKind::Hard, true, vec![addr("0")], None),
                Assertion::new(
                    AssertionKind::Hard,
                    false,
                    vec![addr("1.content:0-5"), addr("2")],
                    Some("wrong city".to_string()),
                ),
                Assertion::new(AssertionKind::Soft, false, vec![addr("3")], None),
            ],
        );
        let annotations = annotations_from_outcome(&outcome);
        assert_eq!(annotations.len(), 3);
        assert_eq!(annotations[0].content, "[HARD] wrong city");
        assert_eq!(annotations[0].address, addr("1.content:0-5"));
        assert_eq!(annotations[2].content, "[SOFT] assertion failed");
    }

    #[test]
    fn test_request_serialization() {
        let messages = vec![json!({"role": "user", "content": "hi"})];
        let request = PushTraceRequest {
            messages: &messages,
            annotations: vec![Annotation {
                content: "bad".to_string(),
                address: addr("0.content:0-2"),
            }],
            metadata: None,
            dataset: "weather",
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "messages": [{"role": "user", "content": "hi"}],
                "annotations": [{"content": "bad", "address": "0.content:0-2"}],
                "dataset": "weather"
            })
        );
    }
}
