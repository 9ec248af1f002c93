//! Helpers for working with collections of provenance values.
//!
//! Reductions derive their addresses from the elements that took part:
//! `any`, `all`, `sum`, `len` and `count` from every element, `min` and `max`
//! from the selected element only.

use serde_json::Value;

use super::{BoolValue, NumberValue, Provenance, StringValue};
use crate::domain::address::union;
use crate::domain::{Address, Result};

fn union_of<T: Provenance>(items: &[T]) -> Vec<Address> {
    let sets: Vec<&[Address]> = items.iter().map(|item| item.addresses()).collect();
    union(&sets)
}

/// True if any element is true. An empty slice is false.
pub fn any(items: &[BoolValue]) -> BoolValue {
    BoolValue::new(items.iter().any(BoolValue::value), union_of(items))
}

/// True if every element is true. An empty slice is true.
pub fn all(items: &[BoolValue]) -> BoolValue {
    BoolValue::new(items.iter().all(BoolValue::value), union_of(items))
}

pub fn sum(items: &[NumberValue]) -> NumberValue {
    NumberValue::new(items.iter().map(NumberValue::value).sum(), union_of(items))
}

pub fn len<T: Provenance>(items: &[T]) -> NumberValue {
    NumberValue::from_count(items.len(), union_of(items))
}

/// Number of elements equal to `needle`.
pub fn count<T: Provenance>(needle: &Value, items: &[T]) -> NumberValue {
    let hits = items
        .iter()
        .filter(|item| item.equals(needle).value())
        .count();
    NumberValue::from_count(hits, union_of(items))
}

/// Smallest element (first one on ties), or `None` for an empty slice.
pub fn min(items: &[NumberValue]) -> Option<NumberValue> {
    items
        .iter()
        .fold(None::<&NumberValue>, |best, item| match best {
            Some(b) if b.value() <= item.value() => Some(b),
            _ => Some(item),
        })
        .cloned()
}

/// Largest element (first one on ties), or `None` for an empty slice.
pub fn max(items: &[NumberValue]) -> Option<NumberValue> {
    items
        .iter()
        .fold(None::<&NumberValue>, |best, item| match best {
            Some(b) if b.value() >= item.value() => Some(b),
            _ => Some(item),
        })
        .cloned()
}

pub fn map<T, U>(items: &[T], f: impl Fn(&T) -> U) -> Vec<U> {
    items.iter().map(f).collect()
}

pub fn filter<T: Clone>(items: &[T], predicate: impl Fn(&T) -> bool) -> Vec<T> {
    items.iter().filter(|item| predicate(item)).cloned().collect()
}

pub fn find<T: Clone>(items: &[T], predicate: impl Fn(&T) -> bool) -> Option<T> {
    items.iter().find(|item| predicate(item)).cloned()
}

/// Fold over the raw payloads, discarding provenance.
pub fn reduce_raw<T: Provenance, A>(items: &[T], init: A, f: impl Fn(A, Value) -> A) -> A {
    items.iter().map(|item| item.to_json()).fold(init, f)
}

/// Capture `group` of `pattern` in each string; strings without a match are
/// skipped.
pub fn match_all(pattern: &str, items: &[StringValue], group: usize) -> Result<Vec<StringValue>> {
    let mut out = Vec::new();
    for item in items {
        if let Some(found) = item.match_group(pattern, group)? {
            out.push(found);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn addr(raw: &str) -> Address {
        Address::parse(raw).unwrap()
    }

    fn numbers() -> Vec<NumberValue> {
        vec![
            NumberValue::new(3.0, vec![addr("0.n")]),
            NumberValue::new(1.0, vec![addr("1.n")]),
            NumberValue::new(1.0, vec![addr("2.n")]),
        ]
    }

    #[test]
    fn test_any_all_union_every_element() {
        let flags = vec![
            BoolValue::new(false, vec![addr("0")]),
            BoolValue::new(true, vec![addr("1")]),
        ];
        let any_true = any(&flags);
        assert!(any_true.value());
        assert_eq!(any_true.addresses(), &[addr("0"), addr("1")]);
        assert!(!all(&flags).value());
        assert!(!any(&[]).value());
        assert!(all(&[]).value());
    }

    #[test]
    fn test_min_max_keep_selected_element() {
        let lo = min(&numbers()).unwrap();
        assert_eq!(lo.value(), 1.0);
        assert_eq!(lo.addresses(), &[addr("1.n")]);
        let hi = max(&numbers()).unwrap();
        assert_eq!(hi.addresses(), &[addr("0.n")]);
        assert!(min(&[]).is_none());
    }

    #[test]
    fn test_sum_len_count() {
        let total = sum(&numbers());
        assert_eq!(total.value(), 5.0);
        assert_eq!(total.addresses().len(), 3);
        assert_eq!(len(&numbers()).value(), 3.0);
        let ones = count(&json!(1), &numbers());
        assert_eq!(ones.value(), 2.0);
        assert_eq!(ones.addresses().len(), 3);
    }

    #[test]
    fn test_reduce_raw_and_match_all() {
        let total = reduce_raw(&numbers(), 0.0, |acc, v| acc + v.as_f64().unwrap_or(0.0));
        assert_eq!(total, 5.0);

        let texts = vec![
            StringValue::new("order #12", vec![addr("0.content")]),
            StringValue::new("nothing", vec![addr("1.content")]),
        ];
        let ids = match_all(r"#(\d+)", &texts, 1).unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0].value(), "12");
        assert_eq!(ids[0].addresses(), &[addr("0.content:7-9")]);
        let long = filter(&texts, |t| t.char_len() > 7);
        assert_eq!(long.len(), 1);
        assert!(find(&texts, |t| t.value() == "nothing").is_some());
        assert_eq!(map(&texts, |t| t.char_len()), vec![9, 7]);
    }
}
