use std::fmt;
use std::ops::Add;

use serde_json::Value;

use super::{fmt_addresses, json_kind, BoolValue, Provenance};
use crate::domain::address::union;
use crate::domain::{Address, Result, TracecheckError};

/// Number with provenance. Integers and floats share one `f64` payload;
/// integral values serialize back as JSON integers.
#[derive(Debug, Clone, PartialEq)]
pub struct NumberValue {
    value: f64,
    addresses: Vec<Address>,
}

impl NumberValue {
    pub fn new(value: f64, addresses: Vec<Address>) -> Self {
        Self { value, addresses }
    }

    /// A count (`len`, `count`, match totals).
    pub fn from_count(count: usize, addresses: Vec<Address>) -> Self {
        Self::new(count as f64, addresses)
    }

    pub fn try_from_raw(raw: &Value, addresses: Vec<Address>) -> Result<Self> {
        match raw.as_f64() {
            Some(f) => Ok(Self::new(f, addresses)),
            None => Err(TracecheckError::TypeMismatch {
                expected: "number",
                actual: json_kind(raw),
            }),
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Integral value, when the number has no fractional part.
    pub fn as_i64(&self) -> Option<i64> {
        if self.value.fract() == 0.0 && self.value.abs() < i64::MAX as f64 {
            Some(self.value as i64)
        } else {
            None
        }
    }

    fn compare(&self, result: bool) -> BoolValue {
        BoolValue::new(result, self.addresses.clone())
    }

    pub fn lt(&self, other: impl Into<f64>) -> BoolValue {
        self.compare(self.value < other.into())
    }

    pub fn le(&self, other: impl Into<f64>) -> BoolValue {
        self.compare(self.value <= other.into())
    }

    pub fn gt(&self, other: impl Into<f64>) -> BoolValue {
        self.compare(self.value > other.into())
    }

    pub fn ge(&self, other: impl Into<f64>) -> BoolValue {
        self.compare(self.value >= other.into())
    }
}

impl Provenance for NumberValue {
    fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    fn to_json(&self) -> Value {
        match self.as_i64() {
            Some(i) => Value::from(i),
            None => Value::from(self.value),
        }
    }

    fn equals(&self, other: &Value) -> BoolValue {
        self.compare(other.as_f64() == Some(self.value))
    }

    fn not_equals(&self, other: &Value) -> BoolValue {
        self.compare(other.as_f64() != Some(self.value))
    }
}

/// Sum of two numbers; the result is derived from both.
impl Add<&NumberValue> for NumberValue {
    type Output = NumberValue;

    fn add(self, rhs: &NumberValue) -> NumberValue {
        let addresses = union(&[&self.addresses, &rhs.addresses]);
        NumberValue::new(self.value + rhs.value, addresses)
    }
}

impl fmt::Display for NumberValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at ", self.to_json())?;
        fmt_addresses(&self.addresses, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn addr(raw: &str) -> Address {
        Address::parse(raw).unwrap()
    }

    #[test]
    fn test_comparisons_keep_addresses() {
        let n = NumberValue::new(5.0, vec![addr("1.count")]);
        assert!(n.gt(3).value());
        assert!(!n.lt(3).value());
        assert!(n.ge(5).value());
        assert!(n.le(5.5).value());
        assert_eq!(n.gt(3).addresses(), &[addr("1.count")]);
        assert!(n.equals(&json!(5)).value());
        assert!(n.not_equals(&json!(4)).value());
        assert!(!n.equals(&json!("5")).value());
    }

    #[test]
    fn test_add_unions_addresses() {
        let a = NumberValue::new(1.0, vec![addr("0")]);
        let b = NumberValue::new(2.5, vec![addr("1")]);
        let sum = a + &b;
        assert_eq!(sum.value(), 3.5);
        assert_eq!(sum.addresses(), &[addr("0"), addr("1")]);
    }

    #[test]
    fn test_integral_numbers_serialize_as_integers() {
        assert_eq!(NumberValue::from_count(3, vec![]).to_json(), json!(3));
        assert_eq!(NumberValue::new(0.5, vec![]).to_json(), json!(0.5));
        assert!(NumberValue::try_from_raw(&json!("3"), vec![]).is_err());
    }
}
