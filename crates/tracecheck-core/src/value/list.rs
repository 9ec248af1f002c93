use std::fmt;

use serde_json::Value;

use super::{fmt_addresses, BoolValue, NumberValue, Provenance, ProvenanceValue};
use crate::domain::address::union;
use crate::domain::{Address, Result, TracecheckError};

/// Ordered collection of provenance values.
#[derive(Debug, Clone, PartialEq)]
pub struct ListValue {
    items: Vec<ProvenanceValue>,
    addresses: Vec<Address>,
}

impl ListValue {
    /// Wrap a raw JSON array. Element `i` is addressed `a.i` for every list
    /// address `a`.
    pub fn from_raw(raw: Vec<Value>, addresses: Vec<Address>) -> Self {
        let items = raw
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                let element_addresses = addresses.iter().map(|a| a.child(i)).collect();
                ProvenanceValue::of(item, element_addresses)
            })
            .collect();
        Self { items, addresses }
    }

    /// Build from values that carry their own addresses. The list is derived
    /// from all of them.
    pub fn from_items(items: Vec<ProvenanceValue>) -> Self {
        let sets: Vec<&[Address]> = items.iter().map(|item| item.addresses()).collect();
        let addresses = union(&sets);
        Self { items, addresses }
    }

    pub fn items(&self) -> &[ProvenanceValue] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ProvenanceValue> {
        self.items.iter()
    }

    pub fn into_items(self) -> Vec<ProvenanceValue> {
        self.items
    }

    pub fn len(&self) -> NumberValue {
        NumberValue::from_count(self.items.len(), self.addresses.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn at(&self, index: usize) -> Result<ProvenanceValue> {
        self.items
            .get(index)
            .cloned()
            .ok_or(TracecheckError::OutOfRange {
                index,
                len: self.items.len(),
            })
    }

    /// Membership by raw value. On a hit the result points at the first
    /// matching element; otherwise at the list.
    pub fn contains(&self, needle: &Value) -> BoolValue {
        match self.items.iter().find(|item| item.equals(needle).value()) {
            Some(hit) => BoolValue::new(true, hit.addresses().to_vec()),
            None => BoolValue::new(false, self.addresses.clone()),
        }
    }
}

impl<'a> IntoIterator for &'a ListValue {
    type Item = &'a ProvenanceValue;
    type IntoIter = std::slice::Iter<'a, ProvenanceValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl Provenance for ListValue {
    fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    fn to_json(&self) -> Value {
        Value::Array(self.items.iter().map(|item| item.to_json()).collect())
    }
}

impl fmt::Display for ListValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at ", self.to_json())?;
        fmt_addresses(&self.addresses, f)
    }
}
