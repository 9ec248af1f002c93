//! Address algebra.
//!
//! An [`Address`] locates a value inside a trace: a dot-separated path of
//! message indices and field names, optionally followed by a half-open
//! character range within a string field (`3.tool_calls.0.function.name:0-4`).
//!
//! Ranges are counted in characters (Unicode scalar values), never bytes, so
//! that addresses stay meaningful to renderers in any language.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::error::AddressError;

/// Half-open character range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CharRange {
    pub start: usize,
    pub end: usize,
}

impl CharRange {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "inverted range {start}-{end}");
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl fmt::Display for CharRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

impl Serialize for CharRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CharRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_range(&raw, &raw).map_err(serde::de::Error::custom)
    }
}

/// Path plus optional character range identifying the origin of a value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    path: String,
    range: Option<CharRange>,
}

impl Address {
    /// Address without a range. The path is taken verbatim.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            range: None,
        }
    }

    /// Address of the message at `index`.
    pub fn message(index: usize) -> Self {
        Self::new(index.to_string())
    }

    /// Parse `path(.path)*[:start-end]`.
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        let (path, range) = match raw.rsplit_once(':') {
            Some((path, suffix)) => (path, Some(parse_range(raw, suffix)?)),
            None => (raw, None),
        };
        if !path.is_empty() && path.split('.').any(str::is_empty) {
            return Err(AddressError::EmptySegment {
                address: raw.to_string(),
            });
        }
        Ok(Self {
            path: path.to_string(),
            range,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn range(&self) -> Option<CharRange> {
        self.range
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('.').filter(|s| !s.is_empty())
    }

    /// Index of the owning message, when the path starts with one.
    pub fn message_index(&self) -> Option<usize> {
        self.segments().next().and_then(|s| s.parse().ok())
    }

    pub fn with_range(mut self, range: CharRange) -> Self {
        self.range = Some(range);
        self
    }

    /// Same address with the range suffix stripped.
    pub fn owner(&self) -> Self {
        Self::new(self.path.clone())
    }

    /// Descend into a field or list element. Any range is dropped because it
    /// described the parent, not the child.
    pub fn child(&self, key: impl fmt::Display) -> Self {
        if self.path.is_empty() {
            Self::new(key.to_string())
        } else {
            Self::new(format!("{}.{}", self.path, key))
        }
    }

    /// Narrow to a sub-range expressed relative to the current range.
    ///
    /// `prefix:s-e` narrowed by `a-b` becomes `prefix:(s+a)-(s+b)`. An
    /// address without a range is treated as starting at offset zero.
    pub fn narrow(&self, relative: CharRange) -> Self {
        let base = self.range.map(|r| r.start).unwrap_or(0);
        Self {
            path: self.path.clone(),
            range: Some(CharRange::new(
                base + relative.start,
                base + relative.end,
            )),
        }
    }
}

fn parse_range(raw: &str, suffix: &str) -> Result<CharRange, AddressError> {
    let malformed = || AddressError::MalformedRange {
        address: raw.to_string(),
    };
    let (start, end) = suffix.split_once('-').ok_or_else(malformed)?;
    let start = parse_offset(start).ok_or_else(malformed)?;
    let end = parse_offset(end).ok_or_else(malformed)?;
    if start > end {
        return Err(AddressError::InvertedRange {
            address: raw.to_string(),
            start,
            end,
        });
    }
    Ok(CharRange { start, end })
}

fn parse_offset(digits: &str) -> Option<usize> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.range {
            Some(range) => write!(f, "{}:{}", self.path, range),
            None => f.write_str(&self.path),
        }
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Merge address sets, keeping first-seen order and dropping duplicates.
pub fn union(sets: &[&[Address]]) -> Vec<Address> {
    let mut out: Vec<Address> = Vec::new();
    for set in sets {
        for addr in set.iter() {
            if !out.contains(addr) {
                out.push(addr.clone());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display_roundtrip() {
        for raw in [
            "3",
            "3.tool_calls.0.function.arguments.command",
            "1.content:6-11",
            ":0-5",
        ] {
            let addr = Address::parse(raw).expect("parse");
            assert_eq!(addr.to_string(), raw);
        }
    }

    #[test]
    fn test_parse_rejects_bad_grammar() {
        assert!(matches!(
            Address::parse("1..content"),
            Err(AddressError::EmptySegment { .. })
        ));
        assert!(matches!(
            Address::parse("1.content:a-2"),
            Err(AddressError::MalformedRange { .. })
        ));
        assert!(matches!(
            Address::parse("1.content:5"),
            Err(AddressError::MalformedRange { .. })
        ));
        assert!(matches!(
            Address::parse("1.content:9-2"),
            Err(AddressError::InvertedRange { start: 9, end: 2, .. })
        ));
    }

    #[test]
    fn test_narrow_composes_relative_to_current_range() {
        let addr = Address::parse("2.content:10-30").unwrap();
        let once = addr.narrow(CharRange::new(5, 15));
        assert_eq!(once.to_string(), "2.content:15-25");
        let twice = once.narrow(CharRange::new(1, 3));
        assert_eq!(twice.to_string(), "2.content:16-18");
    }

    #[test]
    fn test_identity_narrow_keeps_address() {
        let addr = Address::parse("0.content:4-9").unwrap();
        assert_eq!(addr.narrow(CharRange::new(0, 5)), addr);
    }

    #[test]
    fn test_child_owner_and_message_index() {
        let addr = Address::message(4).child("tool_calls").child(1);
        assert_eq!(addr.to_string(), "4.tool_calls.1");
        assert_eq!(addr.message_index(), Some(4));

        let ranged = Address::parse("4.content:1-2").unwrap();
        assert_eq!(ranged.owner().to_string(), "4.content");
        assert_eq!(ranged.child("x").to_string(), "4.content.x");
        assert_eq!(Address::new("").child("k").to_string(), "k");
        assert_eq!(Address::new("addr1").message_index(), None);
    }

    #[test]
    fn test_serde_as_plain_string() {
        let addr = Address::parse("1.content:0-2").unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"1.content:0-2\"");
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
        assert!(serde_json::from_str::<Address>("\"1:3-1\"").is_err());
    }

    #[test]
    fn test_union_dedups_in_order() {
        let a = vec![Address::new("1"), Address::new("2")];
        let b = vec![Address::new("2"), Address::new("3")];
        let merged = union(&[&a, &b]);
        let rendered: Vec<String> = merged.iter().map(|a| a.to_string()).collect();
        assert_eq!(rendered, vec!["1", "2", "3"]);
    }
}
