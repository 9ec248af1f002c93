//! Trace indexing and queries.
//!
//! A [`Trace`] owns the raw message list and a typed index built once at
//! construction. Queries never mutate it: every result is a fresh
//! [`MapValue`] addressed at its position in the trace.

pub mod pairing;
pub mod selector;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::{Map, Value};

use crate::domain::{Address, Message, Result, ToolCall, TracecheckError};
use crate::value::{json_kind, MapValue};

pub use pairing::Pairing;
pub use selector::{Filter, Selector};

use pairing::{flatten_calls, pair_tool_calls};
use selector::lookup_path;

/// A tool call together with the output it was paired with.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolPair {
    pub call: MapValue,
    pub output: MapValue,
}

/// An ordered, read-only list of messages plus optional metadata.
#[derive(Debug)]
pub struct Trace {
    messages: Vec<Value>,
    metadata: Option<Map<String, Value>>,
    index: Vec<Message>,
    bound: AtomicBool,
}

impl Clone for Trace {
    /// A clone is a separate trace and starts unbound.
    fn clone(&self) -> Self {
        Self {
            messages: self.messages.clone(),
            metadata: self.metadata.clone(),
            index: self.index.clone(),
            bound: AtomicBool::new(false),
        }
    }
}

fn as_object<'a>(value: &'a Value) -> Result<&'a Map<String, Value>> {
    value.as_object().ok_or(TracecheckError::TypeMismatch {
        expected: "map",
        actual: json_kind(value),
    })
}

impl Trace {
    /// Index `messages`. Every message, and every tool call inside an
    /// assistant message, must be a JSON object.
    pub fn new(messages: Vec<Value>) -> Result<Self> {
        for message in &messages {
            as_object(message)?;
            if message.get("role").and_then(Value::as_str) == Some("assistant") {
                if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
                    for call in calls {
                        as_object(call)?;
                    }
                }
            }
        }
        let index = messages
            .iter()
            .enumerate()
            .map(|(i, raw)| Message::from_raw(i, raw))
            .collect();
        Ok(Self {
            messages,
            metadata: None,
            index,
            bound: AtomicBool::new(false),
        })
    }

    /// Parse a trace from JSON: either a bare message array or an object with
    /// a `trace` (or `messages`) array and optional `metadata`.
    pub fn from_json(raw: &str) -> Result<Self> {
        match serde_json::from_str::<Value>(raw)? {
            Value::Array(messages) => Self::new(messages),
            Value::Object(mut doc) => {
                let messages = match doc.remove("trace").or_else(|| doc.remove("messages")) {
                    Some(Value::Array(messages)) => messages,
                    Some(other) => {
                        return Err(TracecheckError::TypeMismatch {
                            expected: "list",
                            actual: json_kind(&other),
                        })
                    }
                    None => {
                        return Err(TracecheckError::KeyNotFound {
                            key: "trace".to_string(),
                        })
                    }
                };
                let trace = Self::new(messages)?;
                match doc.remove("metadata") {
                    Some(Value::Object(metadata)) => Ok(trace.with_metadata(metadata)),
                    _ => Ok(trace),
                }
            }
            other => Err(TracecheckError::TypeMismatch {
                expected: "list",
                actual: json_kind(&other),
            }),
        }
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn metadata(&self) -> Option<&Map<String, Value>> {
        self.metadata.as_ref()
    }

    pub fn raw_messages(&self) -> &[Value] {
        &self.messages
    }

    /// Typed per-message index.
    pub fn indexed(&self) -> &[Message] {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn map_at(raw: &Value, address: Address) -> MapValue {
        let fields = raw.as_object().cloned().unwrap_or_default();
        MapValue::new(fields, vec![address])
    }

    fn message_value(&self, index: usize) -> MapValue {
        Self::map_at(&self.messages[index], Address::message(index))
    }

    fn raw_call(&self, call: &ToolCall) -> &Value {
        let message = &self.messages[call.message_index];
        let position = call
            .address
            .segments()
            .last()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or_default();
        &message["tool_calls"][position]
    }

    fn call_value(&self, call: &ToolCall) -> MapValue {
        Self::map_at(self.raw_call(call), call.address.clone())
    }

    /// Field lookup for message selectors; adds the `data_type` pseudo-field.
    fn message_field(&self, index: usize, name: &str) -> Option<Value> {
        if name == "data_type" {
            return Some(Value::from(self.index[index].content.data_type()));
        }
        lookup_path(&self.messages[index], name)
    }

    /// Field lookup for tool call selectors. `name` and `arguments` resolve
    /// inside the `function` object when the call has one.
    fn call_field(raw: &Value, name: &str) -> Option<Value> {
        let head = name.split('.').next().unwrap_or_default();
        match raw.get("function") {
            Some(function) if function.is_object() && (head == "name" || head == "arguments") => {
                lookup_path(function, name)
            }
            _ => lookup_path(raw, name),
        }
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    /// Message at `index`.
    pub fn message(&self, index: usize) -> Result<MapValue> {
        if index >= self.len() {
            return Err(TracecheckError::OutOfRange {
                index,
                len: self.len(),
            });
        }
        Ok(self.message_value(index))
    }

    /// Messages accepted by `selector`, in trace order.
    pub fn messages(&self, selector: &Selector) -> Result<Vec<MapValue>> {
        selector.validate()?;
        Ok((0..self.len())
            .filter(|&i| selector.matches(|name| self.message_field(i, name)))
            .map(|i| self.message_value(i))
            .collect())
    }

    fn output_indices(&self) -> Vec<usize> {
        self.index
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_tool_output())
            .map(|(i, _)| i)
            .collect()
    }

    /// The `index`-th tool output message.
    pub fn tool_output(&self, index: usize) -> Result<MapValue> {
        let outputs = self.output_indices();
        outputs
            .get(index)
            .map(|&i| self.message_value(i))
            .ok_or(TracecheckError::OutOfRange {
                index,
                len: outputs.len(),
            })
    }

    pub fn tool_outputs(&self, selector: &Selector) -> Result<Vec<MapValue>> {
        selector.validate()?;
        Ok(self
            .output_indices()
            .into_iter()
            .filter(|&i| selector.matches(|name| self.message_field(i, name)))
            .map(|i| self.message_value(i))
            .collect())
    }

    // ------------------------------------------------------------------
    // Tool calls
    // ------------------------------------------------------------------

    /// The `index`-th tool call in trace order.
    pub fn tool_call(&self, index: usize) -> Result<MapValue> {
        let calls = flatten_calls(&self.index);
        calls
            .get(index)
            .map(|call| self.call_value(call))
            .ok_or(TracecheckError::OutOfRange {
                index,
                len: calls.len(),
            })
    }

    pub fn tool_calls(&self, selector: &Selector) -> Result<Vec<MapValue>> {
        selector.validate()?;
        Ok(flatten_calls(&self.index)
            .into_iter()
            .filter(|call| {
                let raw = self.raw_call(call);
                selector.matches(|name| Self::call_field(raw, name))
            })
            .map(|call| self.call_value(call))
            .collect())
    }

    /// Positional result of pairing calls with outputs.
    pub fn pairing(&self) -> Pairing {
        pair_tool_calls(&self.index)
    }

    /// Paired calls and outputs, in call order. Calls without an output are
    /// left out; see [`Trace::unpaired_tool_calls`].
    pub fn tool_pairs(&self) -> Vec<ToolPair> {
        let calls = flatten_calls(&self.index);
        self.pairing()
            .pairs
            .into_iter()
            .map(|(call, output)| ToolPair {
                call: self.call_value(calls[call]),
                output: self.message_value(output),
            })
            .collect()
    }

    pub fn unpaired_tool_calls(&self) -> Vec<MapValue> {
        let calls = flatten_calls(&self.index);
        self.pairing()
            .unpaired
            .into_iter()
            .map(|call| self.call_value(calls[call]))
            .collect()
    }

    /// Run each check against this trace, stopping at the first error.
    pub fn run_assertions(&self, checks: &[fn(&Trace) -> Result<()>]) -> Result<()> {
        for check in checks {
            check(self)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Scope binding
    // ------------------------------------------------------------------

    pub fn is_bound(&self) -> bool {
        self.bound.load(Ordering::Acquire)
    }

    pub(crate) fn bind(&self) -> Result<()> {
        self.bound
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| TracecheckError::TraceAlreadyBound)
    }

    pub(crate) fn unbind(&self) {
        self.bound.store(false, Ordering::Release);
    }
}

impl fmt::Display for Trace {
    /// One JSON message per line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, message) in self.messages.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{message}")?;
        }
        Ok(())
    }
}
