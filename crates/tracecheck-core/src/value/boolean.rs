use std::fmt;
use std::ops::{BitAnd, BitOr, Not};

use serde_json::Value;

use super::{fmt_addresses, json_kind, Provenance};
use crate::domain::{Address, Result, TracecheckError};

/// Boolean with provenance. Logical operators keep the left operand's
/// addresses; use [`super::functional::any`]/[`super::functional::all`] to
/// aggregate addresses over many booleans.
#[derive(Debug, Clone, PartialEq)]
pub struct BoolValue {
    value: bool,
    addresses: Vec<Address>,
}

impl BoolValue {
    pub fn new(value: bool, addresses: Vec<Address>) -> Self {
        Self { value, addresses }
    }

    pub fn try_from_raw(raw: &Value, addresses: Vec<Address>) -> Result<Self> {
        match raw {
            Value::Bool(b) => Ok(Self::new(*b, addresses)),
            other => Err(TracecheckError::TypeMismatch {
                expected: "bool",
                actual: json_kind(other),
            }),
        }
    }

    pub fn value(&self) -> bool {
        self.value
    }

    pub fn and(&self, other: &BoolValue) -> BoolValue {
        BoolValue::new(self.value && other.value, self.addresses.clone())
    }

    pub fn or(&self, other: &BoolValue) -> BoolValue {
        BoolValue::new(self.value || other.value, self.addresses.clone())
    }
}

impl From<bool> for BoolValue {
    fn from(value: bool) -> Self {
        Self::new(value, Vec::new())
    }
}

impl Provenance for BoolValue {
    fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    fn to_json(&self) -> Value {
        Value::Bool(self.value)
    }
}

impl Not for BoolValue {
    type Output = BoolValue;

    fn not(self) -> BoolValue {
        BoolValue::new(!self.value, self.addresses)
    }
}

impl BitAnd<bool> for BoolValue {
    type Output = BoolValue;

    fn bitand(self, rhs: bool) -> BoolValue {
        BoolValue::new(self.value && rhs, self.addresses)
    }
}

impl BitOr<bool> for BoolValue {
    type Output = BoolValue;

    fn bitor(self, rhs: bool) -> BoolValue {
        BoolValue::new(self.value || rhs, self.addresses)
    }
}

impl BitAnd<&BoolValue> for BoolValue {
    type Output = BoolValue;

    fn bitand(self, rhs: &BoolValue) -> BoolValue {
        self & rhs.value
    }
}

impl BitOr<&BoolValue> for BoolValue {
    type Output = BoolValue;

    fn bitor(self, rhs: &BoolValue) -> BoolValue {
        self | rhs.value
    }
}

impl fmt::Display for BoolValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at ", self.value)?;
        fmt_addresses(&self.addresses, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn addrs(raw: &[&str]) -> Vec<Address> {
        raw.iter().map(|a| Address::parse(a).unwrap()).collect()
    }

    #[test]
    fn test_logic_keeps_left_addresses() {
        let left = BoolValue::new(true, addrs(&["0"]));
        let right = BoolValue::new(false, addrs(&["1"]));
        let and = left.and(&right);
        assert!(!and.value());
        assert_eq!(and.addresses(), addrs(&["0"]).as_slice());
        assert!(left.or(&right).value());
        assert_eq!((left.clone() & &right).addresses(), addrs(&["0"]).as_slice());
        assert!((left.clone() | false).value());
    }

    #[test]
    fn test_not_and_equality() {
        let value = BoolValue::new(true, addrs(&["3.flag"]));
        let negated = !value.clone();
        assert!(!negated.value());
        assert_eq!(negated.addresses(), value.addresses());
        assert!(value.equals(&json!(true)).value());
        assert!(value.not_equals(&json!(false)).value());
    }

    #[test]
    fn test_try_from_raw_rejects_other_kinds() {
        assert!(BoolValue::try_from_raw(&json!(false), vec![]).is_ok());
        assert!(matches!(
            BoolValue::try_from_raw(&json!("yes"), vec![]),
            Err(TracecheckError::TypeMismatch { expected: "bool", .. })
        ));
    }
}
