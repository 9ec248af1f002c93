//! Strings with character-range provenance.

use std::fmt;
use std::ops::{Add, Range};

use regex::Regex;
use serde_json::Value;

use super::{fmt_addresses, json_kind, BoolValue, ListValue, NumberValue, Provenance, ProvenanceValue};
use crate::collaborators::{
    levenshtein, BoundingBox, ClassificationRequest, Classifier, ClassifierInput, EmbeddingScorer,
    Extractor, Moderator, OcrDetector,
};
use crate::domain::address::union;
use crate::domain::{Address, CharRange, Content, ImageRef, Result, TracecheckError};

/// Model requested from classifiers unless the caller builds its own request.
pub const DEFAULT_CLASSIFIER_MODEL: &str = "gpt-4o";

/// A string value. Every address carries a character range; addresses given
/// without one are assigned the full range `0-len` on construction.
#[derive(Debug, Clone, PartialEq)]
pub struct StringValue {
    value: String,
    addresses: Vec<Address>,
}

impl StringValue {
    pub fn new(value: impl Into<String>, addresses: Vec<Address>) -> Self {
        let value = value.into();
        let full = CharRange::new(0, value.chars().count());
        let addresses = addresses
            .into_iter()
            .map(|addr| match addr.range() {
                Some(_) => addr,
                None => addr.with_range(full),
            })
            .collect();
        Self { value, addresses }
    }

    pub fn try_from_raw(raw: &Value, addresses: Vec<Address>) -> Result<Self> {
        match raw {
            Value::String(text) => Ok(Self::new(text.clone(), addresses)),
            other => Err(TracecheckError::TypeMismatch {
                expected: "string",
                actual: json_kind(other),
            }),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn char_len(&self) -> usize {
        self.value.chars().count()
    }

    /// Length in characters. Keeps addresses.
    pub fn len(&self) -> NumberValue {
        NumberValue::from_count(self.char_len(), self.addresses.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    fn keep(&self, value: impl Into<String>) -> StringValue {
        StringValue::new(value, self.addresses.clone())
    }

    fn judge(&self, result: bool) -> BoolValue {
        BoolValue::new(result, self.addresses.clone())
    }

    /// One narrowed address per (address, range) pair.
    fn narrowed(&self, ranges: &[CharRange]) -> Vec<Address> {
        self.addresses
            .iter()
            .flat_map(|addr| ranges.iter().map(move |r| addr.narrow(*r)))
            .collect()
    }

    /// Narrowed addresses, or the current ones when nothing was found.
    fn narrowed_or_kept(&self, ranges: &[CharRange]) -> Vec<Address> {
        if ranges.is_empty() {
            self.addresses.clone()
        } else {
            self.narrowed(ranges)
        }
    }

    fn substring(&self, range: CharRange) -> StringValue {
        let text: String = self
            .value
            .chars()
            .skip(range.start)
            .take(range.len())
            .collect();
        StringValue::new(text, self.narrowed(&[range]))
    }

    // ------------------------------------------------------------------
    // Comparison
    // ------------------------------------------------------------------

    pub fn lt(&self, other: &str) -> BoolValue {
        self.judge(self.value.as_str() < other)
    }

    pub fn le(&self, other: &str) -> BoolValue {
        self.judge(self.value.as_str() <= other)
    }

    pub fn gt(&self, other: &str) -> BoolValue {
        self.judge(self.value.as_str() > other)
    }

    pub fn ge(&self, other: &str) -> BoolValue {
        self.judge(self.value.as_str() >= other)
    }

    pub fn starts_with(&self, prefix: &str) -> BoolValue {
        self.judge(self.value.starts_with(prefix))
    }

    pub fn ends_with(&self, suffix: &str) -> BoolValue {
        self.judge(self.value.ends_with(suffix))
    }

    // ------------------------------------------------------------------
    // Slicing and search
    // ------------------------------------------------------------------

    /// Concatenation. Addresses keep pointing at the original spans of both
    /// operands.
    pub fn concat(&self, other: &StringValue) -> StringValue {
        StringValue {
            value: format!("{}{}", self.value, other.value),
            addresses: union(&[&self.addresses, &other.addresses]),
        }
    }

    /// Single character at `index`, narrowed to `index-(index+1)`.
    pub fn char_at(&self, index: usize) -> Result<StringValue> {
        let len = self.char_len();
        if index >= len {
            return Err(TracecheckError::OutOfRange { index, len });
        }
        Ok(self.substring(CharRange::new(index, index + 1)))
    }

    /// Character slice `range`, narrowed accordingly.
    pub fn slice(&self, range: Range<usize>) -> Result<StringValue> {
        let len = self.char_len();
        if range.end > len {
            return Err(TracecheckError::OutOfRange {
                index: range.end,
                len,
            });
        }
        if range.start > range.end {
            return Err(TracecheckError::OutOfRange {
                index: range.start,
                len,
            });
        }
        Ok(self.substring(CharRange::new(range.start, range.end)))
    }

    fn match_spans(&self, pattern: &str) -> Result<Vec<CharRange>> {
        let re = Regex::new(pattern)?;
        Ok(re
            .find_iter(&self.value)
            .map(|m| char_span(&self.value, m.range()))
            .collect())
    }

    /// Whether `pattern` (a regex) matches anywhere. On success the result is
    /// narrowed to every match; otherwise addresses are unchanged.
    pub fn contains(&self, pattern: &str) -> Result<BoolValue> {
        let spans = self.match_spans(pattern)?;
        Ok(BoolValue::new(!spans.is_empty(), self.narrowed_or_kept(&spans)))
    }

    /// Number of non-overlapping matches of `pattern`, narrowed like
    /// [`StringValue::contains`].
    pub fn count(&self, pattern: &str) -> Result<NumberValue> {
        let spans = self.match_spans(pattern)?;
        Ok(NumberValue::from_count(spans.len(), self.narrowed_or_kept(&spans)))
    }

    /// Capture `group` of the first match of `pattern`, narrowed to its span.
    /// Group 0 is the whole match.
    pub fn match_group(&self, pattern: &str, group: usize) -> Result<Option<StringValue>> {
        let re = Regex::new(pattern)?;
        let found = re
            .captures(&self.value)
            .and_then(|caps| caps.get(group))
            .map(|m| self.substring(char_span(&self.value, m.range())));
        Ok(found)
    }

    /// Split on `separator`; each piece is narrowed to its own span. An empty
    /// separator yields the whole string as a single piece.
    pub fn split(&self, separator: &str) -> ListValue {
        let mut pieces = Vec::new();
        if separator.is_empty() {
            pieces.push(CharRange::new(0, self.char_len()));
        } else {
            let mut start = 0;
            for (at, _) in self.value.match_indices(separator) {
                pieces.push(char_span(&self.value, start..at));
                start = at + separator.len();
            }
            pieces.push(char_span(&self.value, start..self.value.len()));
        }
        let items = pieces
            .into_iter()
            .map(|range| ProvenanceValue::String(self.substring(range)))
            .collect();
        ListValue::from_items(items)
    }

    /// Strip surrounding whitespace, narrowed to the remaining span.
    pub fn trim(&self) -> StringValue {
        let leading = self.value.len() - self.value.trim_start().len();
        let trimmed = self.value.trim();
        self.substring(char_span(&self.value, leading..leading + trimmed.len()))
    }

    pub fn to_uppercase(&self) -> StringValue {
        self.keep(self.value.to_uppercase())
    }

    pub fn to_lowercase(&self) -> StringValue {
        self.keep(self.value.to_lowercase())
    }

    // ------------------------------------------------------------------
    // Structured content
    // ------------------------------------------------------------------

    pub fn is_valid_json(&self) -> BoolValue {
        self.judge(serde_json::from_str::<Value>(&self.value).is_ok())
    }

    /// Field `key` of the JSON object serialized in this string. `None` when
    /// the text is not a JSON object or has no such field.
    pub fn json_get(&self, key: &str) -> Option<ProvenanceValue> {
        match serde_json::from_str::<Value>(&self.value) {
            Ok(Value::Object(mut fields)) => fields
                .remove(key)
                .map(|raw| ProvenanceValue::of(raw, self.addresses.clone())),
            _ => None,
        }
    }

    /// Image payload, when the content is an image reference.
    pub fn image(&self) -> Option<ImageRef> {
        match Content::from_raw(Some(&Value::String(self.value.clone()))) {
            Content::Image(image) => Some(image),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Similarity and external scorers
    // ------------------------------------------------------------------

    /// Normalised edit-distance similarity to `other`, in `[0, 1]`.
    pub fn levenshtein(&self, other: &str) -> NumberValue {
        NumberValue::new(levenshtein(&self.value, other), self.addresses.clone())
    }

    pub fn is_similar(
        &self,
        scorer: &dyn EmbeddingScorer,
        other: &str,
        threshold: f64,
    ) -> Result<BoolValue> {
        let score = scorer.similarity(&self.value, other)?;
        Ok(self.judge(score >= threshold))
    }

    /// Ask `classifier` to pick one of `options`. Image content is sent as an
    /// image, everything else as text.
    pub fn classify(
        &self,
        classifier: &dyn Classifier,
        prompt: &str,
        options: &[&str],
    ) -> Result<StringValue> {
        let input = match self.image() {
            Some(image) => ClassifierInput::Image(image),
            None => ClassifierInput::Text(self.value.clone()),
        };
        let request = ClassificationRequest {
            model: DEFAULT_CLASSIFIER_MODEL.to_string(),
            prompt: prompt.to_string(),
            options: options.iter().map(|o| o.to_string()).collect(),
            input,
        };
        Ok(self.keep(classifier.classify(&request)?))
    }

    /// Substrings satisfying `predicate`, each narrowed to where it occurs.
    /// Detections on lines that do not exist are dropped.
    pub fn extract(&self, extractor: &dyn Extractor, predicate: &str) -> Result<ListValue> {
        let detections = extractor.extract(&self.value, predicate)?;
        let items = detections
            .iter()
            .filter_map(|d| line_span(&self.value, d.line, &d.substring))
            .map(|range| ProvenanceValue::String(self.substring(range)))
            .collect();
        Ok(ListValue::from_items(items))
    }

    /// True when the moderator flags anything; narrowed to the flagged spans.
    pub fn moderate(&self, moderator: &dyn Moderator) -> Result<BoolValue> {
        let len = self.char_len();
        let spans: Vec<CharRange> = moderator
            .moderate(&self.value)?
            .into_iter()
            .map(|flag| CharRange::new(flag.span.start.min(len), flag.span.end.min(len)))
            .collect();
        Ok(BoolValue::new(!spans.is_empty(), self.narrowed_or_kept(&spans)))
    }

    /// OCR containment check. Only defined for image content.
    pub fn ocr_contains(
        &self,
        detector: &dyn OcrDetector,
        text: &str,
        case_sensitive: bool,
        bbox: Option<&BoundingBox>,
    ) -> Result<BoolValue> {
        let image = self.image().ok_or(TracecheckError::UnsupportedOperation {
            operation: "ocr_contains",
            variant: "text",
        })?;
        let found = detector.contains(&image, text, case_sensitive, bbox)?;
        Ok(self.judge(found))
    }
}

/// Convert a byte range of `text` into a character range.
fn char_span(text: &str, bytes: Range<usize>) -> CharRange {
    let start = text[..bytes.start].chars().count();
    let len = text[bytes.start..bytes.end].chars().count();
    CharRange::new(start, start + len)
}

/// Character range of `needle` on 1-based `line` of `text`, or of the whole
/// line when the needle does not occur on it.
fn line_span(text: &str, line: usize, needle: &str) -> Option<CharRange> {
    let mut offset = 0;
    for (i, current) in text.split('\n').enumerate() {
        let width = current.chars().count();
        if i + 1 == line {
            let local = match current.find(needle) {
                Some(at) if !needle.is_empty() => char_span(current, at..at + needle.len()),
                _ => CharRange::new(0, width),
            };
            return Some(CharRange::new(offset + local.start, offset + local.end));
        }
        offset += width + 1;
    }
    None
}

impl Provenance for StringValue {
    fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    fn to_json(&self) -> Value {
        Value::String(self.value.clone())
    }
}

impl Add<&StringValue> for StringValue {
    type Output = StringValue;

    fn add(self, rhs: &StringValue) -> StringValue {
        self.concat(rhs)
    }
}

impl Add<&str> for StringValue {
    type Output = StringValue;

    fn add(mut self, rhs: &str) -> StringValue {
        self.value.push_str(rhs);
        self
    }
}

impl Add<&StringValue> for &str {
    type Output = StringValue;

    fn add(self, rhs: &StringValue) -> StringValue {
        StringValue {
            value: format!("{}{}", self, rhs.value),
            addresses: rhs.addresses.clone(),
        }
    }
}

impl fmt::Display for StringValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} at ", self.value)?;
        fmt_addresses(&self.addresses, f)
    }
}
