//! Typed views over raw trace messages.
//!
//! Traces arrive as loosely structured JSON. These views pull out the fields
//! the indexer and renderer care about without changing the raw message,
//! which stays the source of truth for selectors and persisted records.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::address::Address;

/// Prefix marking inline base64 image content.
pub const BASE64_IMAGE_PREFIX: &str = "local_base64_img: ";
/// Prefix marking a link to image content resolved by a collaborator.
pub const IMAGE_LINK_PREFIX: &str = "local_img_link: ";

/// Reference to binary media embedded in a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ImageRef {
    Base64(String),
    Link(String),
}

/// Message content, classified by kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text(String),
    Image(ImageRef),
    Empty,
}

impl Content {
    pub fn from_raw(raw: Option<&Value>) -> Self {
        match raw {
            Some(Value::String(text)) => {
                if let Some(data) = text.strip_prefix(BASE64_IMAGE_PREFIX) {
                    Content::Image(ImageRef::Base64(data.to_string()))
                } else if let Some(link) = text.strip_prefix(IMAGE_LINK_PREFIX) {
                    Content::Image(ImageRef::Link(link.to_string()))
                } else {
                    Content::Text(text.clone())
                }
            }
            Some(Value::Null) | None => Content::Empty,
            Some(other) => Content::Text(other.to_string()),
        }
    }

    /// Value of the `data_type` pseudo-field used by selectors.
    pub fn data_type(&self) -> &'static str {
        match self {
            Content::Image(_) => "image",
            Content::Text(_) | Content::Empty => "text",
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Content::Image(_))
    }
}

/// A tool invocation inside an assistant message.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: Option<String>,
    pub name: String,
    pub arguments: Value,
    /// `{message}.tool_calls.{call}`
    pub address: Address,
    /// Position of the owning message in the trace.
    pub message_index: usize,
}

impl ToolCall {
    /// Read a call in either the OpenAI shape (`{id, function: {name,
    /// arguments}}`) or the flat shape (`{id, name, arguments}`).
    pub fn from_raw(message_index: usize, call_index: usize, raw: &Value) -> Self {
        let function = raw.get("function").filter(|f| f.is_object());
        let field = |key: &str| function.and_then(|f| f.get(key)).or_else(|| raw.get(key));
        Self {
            id: raw.get("id").and_then(Value::as_str).map(str::to_string),
            name: field("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            arguments: field("arguments").cloned().unwrap_or(Value::Null),
            address: tool_call_address(message_index, call_index),
            message_index,
        }
    }
}

/// Address of the `call_index`-th tool call of message `message_index`.
pub fn tool_call_address(message_index: usize, call_index: usize) -> Address {
    Address::message(message_index)
        .child("tool_calls")
        .child(call_index)
}

/// Typed view of one trace message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: String,
    pub content: Content,
    pub tool_calls: Vec<ToolCall>,
    pub tool_call_id: Option<String>,
    pub id: Option<String>,
    pub address: Address,
}

impl Message {
    pub fn from_raw(index: usize, raw: &Value) -> Self {
        let role = raw
            .get("role")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let tool_calls = if role == "assistant" {
            raw.get("tool_calls")
                .and_then(Value::as_array)
                .map(|calls| {
                    calls
                        .iter()
                        .enumerate()
                        .map(|(i, call)| ToolCall::from_raw(index, i, call))
                        .collect()
                })
                .unwrap_or_default()
        } else {
            Vec::new()
        };
        let text = |key: &str| raw.get(key).and_then(Value::as_str).map(str::to_string);
        Self {
            content: Content::from_raw(raw.get("content")),
            tool_call_id: text("tool_call_id"),
            id: text("id"),
            role,
            tool_calls,
            address: Address::message(index),
        }
    }

    pub fn is_tool_output(&self) -> bool {
        self.role == "tool"
    }

    /// Identifier linking a tool output to its call: `tool_call_id` when
    /// present, else the message `id`.
    pub fn output_key(&self) -> Option<&str> {
        self.tool_call_id.as_deref().or(self.id.as_deref())
    }
}
