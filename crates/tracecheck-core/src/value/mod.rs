//! Provenance-tracked value model.
//!
//! Every value derived from a trace carries the set of [`Address`]es it came
//! from. [`ProvenanceValue::of`] is the single factory that wraps raw JSON into
//! the matching variant; each variant then computes the addresses of anything
//! derived from it:
//!
//! - comparisons keep the left operand's addresses
//! - concatenation unions both operands
//! - slicing and pattern search narrow ranges relative to the current range
//! - reductions union the participating elements (see [`functional`])

pub mod boolean;
pub mod functional;
pub mod list;
pub mod map;
pub mod number;
pub mod string;

use std::fmt;

use serde_json::Value;

use crate::domain::{Address, Result, TracecheckError};
use crate::matchers::Matcher;

pub use boolean::BoolValue;
pub use list::ListValue;
pub use map::MapValue;
pub use number::NumberValue;
pub use string::StringValue;

/// Behaviour shared by every provenance-carrying value.
pub trait Provenance {
    /// Addresses of the trace spans this value was derived from.
    fn addresses(&self) -> &[Address];

    /// Raw payload without provenance.
    fn to_json(&self) -> Value;

    /// Exact equality against a raw value. Keeps this value's addresses.
    fn equals(&self, other: &Value) -> BoolValue {
        BoolValue::new(self.to_json() == *other, self.addresses().to_vec())
    }

    fn not_equals(&self, other: &Value) -> BoolValue {
        !self.equals(other)
    }

    /// Run a matcher against the raw payload. Keeps this value's addresses.
    fn matches(&self, matcher: &dyn Matcher) -> Result<BoolValue> {
        let passed = matcher.matches(&self.to_json())?;
        Ok(BoolValue::new(passed, self.addresses().to_vec()))
    }
}

/// A raw payload the value model has no dedicated variant for (e.g. `null`).
#[derive(Debug, Clone, PartialEq)]
pub struct OpaqueValue {
    value: Value,
    addresses: Vec<Address>,
}

impl OpaqueValue {
    pub fn new(value: Value, addresses: Vec<Address>) -> Self {
        Self { value, addresses }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl Provenance for OpaqueValue {
    fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    fn to_json(&self) -> Value {
        self.value.clone()
    }
}

/// Tagged union over the provenance variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ProvenanceValue {
    Bool(BoolValue),
    Number(NumberValue),
    String(StringValue),
    List(ListValue),
    Map(MapValue),
    Opaque(OpaqueValue),
}

impl ProvenanceValue {
    /// Wrap a raw value in the variant matching its shape.
    pub fn of(raw: Value, addresses: Vec<Address>) -> Self {
        match raw {
            Value::Array(items) => ProvenanceValue::List(ListValue::from_raw(items, addresses)),
            Value::Object(fields) => ProvenanceValue::Map(MapValue::new(fields, addresses)),
            Value::String(text) => ProvenanceValue::String(StringValue::new(text, addresses)),
            Value::Number(n) => match n.as_f64() {
                Some(f) => ProvenanceValue::Number(NumberValue::new(f, addresses)),
                None => ProvenanceValue::Opaque(OpaqueValue::new(Value::Number(n), addresses)),
            },
            Value::Bool(b) => ProvenanceValue::Bool(BoolValue::new(b, addresses)),
            Value::Null => ProvenanceValue::Opaque(OpaqueValue::new(Value::Null, addresses)),
        }
    }

    /// Variant name, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            ProvenanceValue::Bool(_) => "bool",
            ProvenanceValue::Number(_) => "number",
            ProvenanceValue::String(_) => "string",
            ProvenanceValue::List(_) => "list",
            ProvenanceValue::Map(_) => "map",
            ProvenanceValue::Opaque(_) => "opaque",
        }
    }

    pub fn as_string(&self) -> Option<&StringValue> {
        match self {
            ProvenanceValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<&BoolValue> {
        match self {
            ProvenanceValue::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&NumberValue> {
        match self {
            ProvenanceValue::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListValue> {
        match self {
            ProvenanceValue::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapValue> {
        match self {
            ProvenanceValue::Map(m) => Some(m),
            _ => None,
        }
    }

    fn unsupported(&self, operation: &'static str) -> TracecheckError {
        TracecheckError::UnsupportedOperation {
            operation,
            variant: self.kind(),
        }
    }

    /// Field lookup. Only defined for maps.
    pub fn get(&self, key: &str) -> Result<Option<ProvenanceValue>> {
        match self {
            ProvenanceValue::Map(m) => Ok(m.get(key)),
            _ => Err(self.unsupported("get")),
        }
    }

    /// Field lookup failing with `KeyNotFound`. Only defined for maps.
    pub fn field(&self, key: &str) -> Result<ProvenanceValue> {
        match self {
            ProvenanceValue::Map(m) => m.field(key),
            _ => Err(self.unsupported("field")),
        }
    }

    /// Element lookup. Only defined for lists.
    pub fn at(&self, index: usize) -> Result<ProvenanceValue> {
        match self {
            ProvenanceValue::List(l) => l.at(index),
            _ => Err(self.unsupported("at")),
        }
    }

    /// Pattern search on strings, membership on lists.
    pub fn contains(&self, pattern: &str) -> Result<BoolValue> {
        match self {
            ProvenanceValue::String(s) => s.contains(pattern),
            ProvenanceValue::List(l) => Ok(l.contains(&Value::String(pattern.to_string()))),
            _ => Err(self.unsupported("contains")),
        }
    }

    pub fn len(&self) -> Result<NumberValue> {
        match self {
            ProvenanceValue::String(s) => Ok(s.len()),
            ProvenanceValue::List(l) => Ok(l.len()),
            ProvenanceValue::Map(m) => Ok(m.len()),
            _ => Err(self.unsupported("len")),
        }
    }
}

impl Provenance for ProvenanceValue {
    fn addresses(&self) -> &[Address] {
        match self {
            ProvenanceValue::Bool(v) => v.addresses(),
            ProvenanceValue::Number(v) => v.addresses(),
            ProvenanceValue::String(v) => v.addresses(),
            ProvenanceValue::List(v) => v.addresses(),
            ProvenanceValue::Map(v) => v.addresses(),
            ProvenanceValue::Opaque(v) => v.addresses(),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            ProvenanceValue::Bool(v) => v.to_json(),
            ProvenanceValue::Number(v) => v.to_json(),
            ProvenanceValue::String(v) => v.to_json(),
            ProvenanceValue::List(v) => v.to_json(),
            ProvenanceValue::Map(v) => v.to_json(),
            ProvenanceValue::Opaque(v) => v.to_json(),
        }
    }

    fn equals(&self, other: &Value) -> BoolValue {
        match self {
            ProvenanceValue::Number(n) => n.equals(other),
            _ => BoolValue::new(self.to_json() == *other, self.addresses().to_vec()),
        }
    }

    fn not_equals(&self, other: &Value) -> BoolValue {
        !self.equals(other)
    }
}

macro_rules! variant_conversions {
    ($($variant:ident => $ty:ty, $name:literal;)*) => {
        $(
            impl From<$ty> for ProvenanceValue {
                fn from(value: $ty) -> Self {
                    ProvenanceValue::$variant(value)
                }
            }

            impl TryFrom<ProvenanceValue> for $ty {
                type Error = TracecheckError;

                fn try_from(value: ProvenanceValue) -> Result<Self> {
                    match value {
                        ProvenanceValue::$variant(inner) => Ok(inner),
                        other => Err(TracecheckError::TypeMismatch {
                            expected: $name,
                            actual: other.kind(),
                        }),
                    }
                }
            }
        )*
    };
}

variant_conversions! {
    Bool => BoolValue, "bool";
    Number => NumberValue, "number";
    String => StringValue, "string";
    List => ListValue, "list";
    Map => MapValue, "map";
}

/// JSON kind name for error messages.
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

/// Render an address list as `[a, b]`.
pub(crate) fn fmt_addresses(addresses: &[Address], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("[")?;
    for (i, addr) in addresses.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{addr}")?;
    }
    f.write_str("]")
}

impl fmt::Display for ProvenanceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at ", self.to_json())?;
        fmt_addresses(self.addresses(), f)
    }
}
