//! Field filters over messages and tool calls.
//!
//! A [`Selector`] is a conjunction of per-field filters. Each filter is either
//! a literal compared for equality (strings and numbers only) or a predicate
//! over the raw field value. Field names may be dotted paths; string values
//! holding serialized JSON are parsed on the way down.

use std::fmt;

use serde_json::Value;

use crate::domain::{Result, TracecheckError};
use crate::value::json_kind;

type Predicate = Box<dyn Fn(&Value) -> bool + Send + Sync>;

/// One field filter.
pub enum Filter {
    Literal(Value),
    Predicate(Predicate),
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Literal(v) => write!(f, "Literal({v})"),
            Filter::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl Filter {
    /// Missing fields never match a literal; predicates see them as `null`.
    fn accepts(&self, actual: Option<&Value>) -> bool {
        match (self, actual) {
            (Filter::Literal(expected), Some(actual)) => literal_eq(expected, actual),
            (Filter::Literal(_), None) => false,
            (Filter::Predicate(pred), Some(actual)) => pred(actual),
            (Filter::Predicate(pred), None) => pred(&Value::Null),
        }
    }
}

fn literal_eq(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Number(e), Value::Number(a)) => e.as_f64() == a.as_f64(),
        _ => expected == actual,
    }
}

/// Conjunction of field filters. An empty selector matches everything.
#[derive(Debug, Default)]
pub struct Selector {
    filters: Vec<(String, Filter)>,
}

impl Selector {
    pub fn all() -> Self {
        Self::default()
    }

    /// Require `name` to equal `literal`.
    pub fn field(mut self, name: impl Into<String>, literal: impl Into<Value>) -> Self {
        self.filters.push((name.into(), Filter::Literal(literal.into())));
        self
    }

    /// Require `predicate` to hold for the value of `name`.
    pub fn field_with<F>(mut self, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.filters
            .push((name.into(), Filter::Predicate(Box::new(predicate))));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Reject literal filters other than strings and numbers.
    pub fn validate(&self) -> Result<()> {
        for (name, filter) in &self.filters {
            if let Filter::Literal(literal) = filter {
                if !(literal.is_string() || literal.is_number()) {
                    return Err(TracecheckError::UnsupportedFilterType {
                        field: name.clone(),
                        kind: json_kind(literal),
                    });
                }
            }
        }
        Ok(())
    }

    /// Whether every filter accepts the value `lookup` returns for its field.
    pub(crate) fn matches(&self, lookup: impl Fn(&str) -> Option<Value>) -> bool {
        self.filters
            .iter()
            .all(|(name, filter)| filter.accepts(lookup(name).as_ref()))
    }
}

/// Follow a dotted `path` from `root`. Array segments must be indices. A
/// string met along the way is parsed as JSON before descending; if it does
/// not parse the lookup yields `None`.
pub(crate) fn lookup_path(root: &Value, path: &str) -> Option<Value> {
    let mut current = root.clone();
    for segment in path.split('.') {
        if let Value::String(text) = &current {
            current = serde_json::from_str(text).ok()?;
        }
        current = match current {
            Value::Object(mut fields) => fields.remove(segment)?,
            Value::Array(mut items) => {
                let index: usize = segment.parse().ok()?;
                if index >= items.len() {
                    return None;
                }
                items.swap_remove(index)
            }
            _ => return None,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_literal_and_predicate_filters() {
        let msg = json!({"role": "user", "turn": 2});
        let by_role = Selector::all().field("role", "user");
        assert!(by_role.matches(|k| lookup_path(&msg, k)));
        let by_turn = Selector::all().field("turn", 2.0);
        assert!(by_turn.matches(|k| lookup_path(&msg, k)));
        let pred = Selector::all().field_with("role", |v| v.as_str().is_some_and(|r| r.starts_with('u')));
        assert!(pred.matches(|k| lookup_path(&msg, k)));
        let both = Selector::all().field("role", "user").field("turn", 3);
        assert!(!both.matches(|k| lookup_path(&msg, k)));
    }

    #[test]
    fn test_missing_field() {
        let msg = json!({"role": "user"});
        assert!(!Selector::all()
            .field("name", "x")
            .matches(|k| lookup_path(&msg, k)));
        assert!(Selector::all()
            .field_with("name", Value::is_null)
            .matches(|k| lookup_path(&msg, k)));
    }

    #[test]
    fn test_unsupported_literal_kinds() {
        let err = Selector::all().field("flag", true).validate().unwrap_err();
        assert!(matches!(
            err,
            TracecheckError::UnsupportedFilterType { ref field, kind: "bool" } if field == "flag"
        ));
        assert!(Selector::all().field("x", json!([1])).validate().is_err());
        assert!(Selector::all().field("x", "ok").validate().is_ok());
    }

    #[test]
    fn test_lookup_parses_serialized_json() {
        let call = json!({"arguments": "{\"path\": {\"dir\": \"/tmp\"}}"});
        assert_eq!(lookup_path(&call, "arguments.path.dir"), Some(json!("/tmp")));
        let broken = json!({"arguments": "{not json"});
        assert_eq!(lookup_path(&broken, "arguments.path"), None);
        let list = json!({"items": ["a", "b"]});
        assert_eq!(lookup_path(&list, "items.1"), Some(json!("b")));
        assert_eq!(lookup_path(&list, "items.5"), None);
    }
}
