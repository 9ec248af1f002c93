use std::fmt;

use serde_json::{Map, Value};

use super::{fmt_addresses, NumberValue, Provenance, ProvenanceValue};
use crate::domain::{Address, Result, TracecheckError};

/// JSON object with provenance. Fields are wrapped lazily on access and are
/// addressed `a.key` for every map address `a`.
#[derive(Debug, Clone, PartialEq)]
pub struct MapValue {
    value: Map<String, Value>,
    addresses: Vec<Address>,
}

impl MapValue {
    pub fn new(value: Map<String, Value>, addresses: Vec<Address>) -> Self {
        Self { value, addresses }
    }

    pub fn raw(&self) -> &Map<String, Value> {
        &self.value
    }

    /// Field `key`, or `None` when it is absent or `null`.
    pub fn get(&self, key: &str) -> Option<ProvenanceValue> {
        match self.value.get(key) {
            None | Some(Value::Null) => None,
            Some(raw) => {
                let addresses = self.addresses.iter().map(|a| a.child(key)).collect();
                Some(ProvenanceValue::of(raw.clone(), addresses))
            }
        }
    }

    /// Field `key`, failing with `KeyNotFound` when it is absent or `null`.
    pub fn field(&self, key: &str) -> Result<ProvenanceValue> {
        self.get(key).ok_or_else(|| TracecheckError::KeyNotFound {
            key: key.to_string(),
        })
    }

    /// Follow a dotted path (`function.arguments.command`).
    pub fn path(&self, dotted: &str) -> Option<ProvenanceValue> {
        let mut segments = dotted.split('.');
        let mut current = self.get(segments.next()?)?;
        for segment in segments {
            current = match &current {
                ProvenanceValue::Map(m) => m.get(segment)?,
                ProvenanceValue::List(l) => l.at(segment.parse().ok()?).ok()?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.value.keys().map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.value.contains_key(key)
    }

    pub fn len(&self) -> NumberValue {
        NumberValue::from_count(self.value.len(), self.addresses.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl Provenance for MapValue {
    fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    fn to_json(&self) -> Value {
        Value::Object(self.value.clone())
    }
}

impl fmt::Display for MapValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at ", self.to_json())?;
        fmt_addresses(&self.addresses, f)
    }
}
