//! Hard and soft assertions over provenance values.
//!
//! `assert_*` record HARD assertions: a failure fails the enclosing test.
//! `expect_*` record SOFT assertions: a failure is reported but the test
//! still passes. All of them record into [`Manager::current`]. Outside any
//! scope a failed HARD assertion returns [`TracecheckError::AssertionFailed`]
//! and a failed SOFT assertion only logs a warning.

use serde_json::Value;

use super::{Assertion, AssertionKind, Manager};
use crate::domain::{Address, Result, TracecheckError};
use crate::matchers::Matcher;
use crate::obs;
use crate::value::{BoolValue, Provenance};

fn record(
    kind: AssertionKind,
    passed: bool,
    addresses: &[Address],
    message: &str,
    fallback: impl FnOnce() -> String,
) -> Result<()> {
    let message = (!message.is_empty()).then(|| message.to_string());
    match Manager::current() {
        Some(scope) => scope.record(Assertion::new(kind, passed, addresses.to_vec(), message)),
        None if passed => Ok(()),
        None => {
            let message = message.unwrap_or_else(fallback);
            match kind {
                AssertionKind::Hard => Err(TracecheckError::AssertionFailed(message)),
                AssertionKind::Soft => {
                    obs::emit_unscoped_expectation(&message);
                    Ok(())
                }
            }
        }
    }
}

fn check_true(kind: AssertionKind, condition: &BoolValue, message: &str) -> Result<()> {
    record(kind, condition.value(), condition.addresses(), message, || {
        "expected condition to be true".to_string()
    })
}

fn check_false(kind: AssertionKind, condition: &BoolValue, message: &str) -> Result<()> {
    record(kind, !condition.value(), condition.addresses(), message, || {
        "expected condition to be false".to_string()
    })
}

fn check_equals<P: Provenance + ?Sized>(
    kind: AssertionKind,
    expected: &Value,
    actual: &P,
    message: &str,
) -> Result<()> {
    let result = actual.equals(expected);
    record(kind, result.value(), result.addresses(), message, || {
        format!("expected {expected} but got {}", actual.to_json())
    })
}

fn check_that<P: Provenance + ?Sized>(
    kind: AssertionKind,
    actual: &P,
    matcher: &dyn Matcher,
    message: &str,
) -> Result<()> {
    let result = actual.matches(matcher)?;
    record(kind, result.value(), result.addresses(), message, || {
        format!("{} does not satisfy {}", actual.to_json(), matcher.describe())
    })
}

pub fn assert_true(condition: &BoolValue, message: &str) -> Result<()> {
    check_true(AssertionKind::Hard, condition, message)
}

pub fn assert_false(condition: &BoolValue, message: &str) -> Result<()> {
    check_false(AssertionKind::Hard, condition, message)
}

/// HARD: `actual` equals `expected`. Records `actual`'s addresses.
pub fn assert_equals<P: Provenance + ?Sized>(expected: &Value, actual: &P, message: &str) -> Result<()> {
    check_equals(AssertionKind::Hard, expected, actual, message)
}

/// HARD: `actual` satisfies `matcher`. Matcher errors propagate unrecorded.
pub fn assert_that<P: Provenance + ?Sized>(actual: &P, matcher: &dyn Matcher, message: &str) -> Result<()> {
    check_that(AssertionKind::Hard, actual, matcher, message)
}

pub fn expect_true(condition: &BoolValue, message: &str) -> Result<()> {
    check_true(AssertionKind::Soft, condition, message)
}

pub fn expect_false(condition: &BoolValue, message: &str) -> Result<()> {
    check_false(AssertionKind::Soft, condition, message)
}

pub fn expect_equals<P: Provenance + ?Sized>(expected: &Value, actual: &P, message: &str) -> Result<()> {
    check_equals(AssertionKind::Soft, expected, actual, message)
}

pub fn expect_that<P: Provenance + ?Sized>(actual: &P, matcher: &dyn Matcher, message: &str) -> Result<()> {
    check_that(AssertionKind::Soft, actual, matcher, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::matchers::HasSubstring;
    use crate::trace::Trace;
    use crate::value::StringValue;
    use serde_json::json;

    fn trace() -> Trace {
        Trace::new(vec![
            json!({"role": "user", "content": "What is the weather?"}),
            json!({"role": "assistant", "content": "Sunny in Zurich"}),
        ])
        .unwrap()
    }

    #[test]
    fn test_unscoped_hard_failure_returns_error() {
        let err = assert_true(&BoolValue::from(false), "").unwrap_err();
        assert!(matches!(err, TracecheckError::AssertionFailed(m) if m == "expected condition to be true"));
        assert!(assert_false(&BoolValue::from(false), "").is_ok());
    }

    #[test]
    fn test_unscoped_soft_failure_is_ok() {
        assert!(expect_true(&BoolValue::from(false), "soft").is_ok());
    }

    #[test]
    fn test_records_into_current_scope() {
        let trace = trace();
        let guard = Manager::enter_with_config(&trace, Some("weather"), Config::without_persistence()).unwrap();
        let content = trace.message(1).unwrap().field("content").unwrap();

        assert_equals(&json!("Sunny in Zurich"), &content, "exact content").unwrap();
        expect_equals(&json!("Rainy"), &content, "").unwrap();
        let outcome = guard.finish().unwrap();

        assert!(outcome.passed);
        assert_eq!(outcome.assertions.len(), 2);
        assert_eq!(outcome.assertions[0].message.as_deref(), Some("exact content"));
        assert_eq!(outcome.assertions[1].kind, AssertionKind::Soft);
        assert!(!outcome.assertions[1].passed);
        assert!(outcome.assertions[1].message.is_none());
        assert_eq!(outcome.assertions[1].addresses[0].to_string(), "1.content:0-15");
    }

    #[test]
    fn test_assert_that_keeps_narrowed_addresses() {
        let trace = trace();
        let guard = Manager::enter_with_config(&trace, Some("narrow"), Config::without_persistence()).unwrap();
        let text = StringValue::new("Sunny in Zurich", vec![Address::parse("1.content").unwrap()]);
        let city = text.slice(9..15).unwrap();
        assert_that(&city, &HasSubstring::new("Zurich"), "mentions city").unwrap();
        let outcome = guard.finish().unwrap();
        assert_eq!(outcome.assertions[0].addresses[0].to_string(), "1.content:9-15");
    }

    #[test]
    fn test_matcher_error_propagates() {
        let n = crate::value::NumberValue::new(3.0, vec![]);
        assert!(matches!(
            expect_that(&n, &HasSubstring::new("3"), ""),
            Err(TracecheckError::TypeMismatch { .. })
        ));
    }
}
