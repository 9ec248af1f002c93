//! Failure rendering.
//!
//! A failed HARD assertion is shown against a skeleton of its trace:
//!
//! ```text
//! ASSERTION FAILED: wrong city
//!
//! #   [0] user: What is the weather in Zurich?
//! >   [1] assistant
//!       content:
//!         It is sunny in Geneva
//!                        ^^^^^^
//! ```
//!
//! Messages the assertion does not reference collapse to one `#` line
//! truncated to the terminal width. Referenced messages are expanded: each
//! referenced field is printed in full with `^` under the referenced
//! characters.

use std::fmt::Write as _;

use serde_json::Value;

use crate::domain::{Address, CharRange, Content, Message};
use crate::manager::TestOutcome;
use crate::trace::selector::lookup_path;
use crate::trace::Trace;

const FIELD_INDENT: &str = "      ";
const TEXT_INDENT: &str = "        ";

/// Report for every failed HARD assertion of `outcome`, separated by a
/// divider `width` columns wide.
pub fn render_failures(trace: &Trace, outcome: &TestOutcome, width: usize) -> String {
    let divider = "-".repeat(width.max(1));
    outcome
        .assertions
        .iter()
        .filter(|a| a.is_hard_failure())
        .map(|a| {
            let header = match &a.message {
                Some(message) => format!("ASSERTION FAILED: {message}"),
                None => "ASSERTION FAILED".to_string(),
            };
            format!("{header}\n\n{}", render_trace(trace, &a.addresses, width))
        })
        .collect::<Vec<_>>()
        .join(&format!("\n{divider}\n"))
}

/// Trace skeleton with `addresses` highlighted.
pub fn render_trace(trace: &Trace, addresses: &[Address], width: usize) -> String {
    let mut out = String::new();
    for (index, (raw, message)) in trace.raw_messages().iter().zip(trace.indexed()).enumerate() {
        let referenced: Vec<&Address> = addresses
            .iter()
            .filter(|a| a.message_index() == Some(index))
            .collect();
        if referenced.is_empty() {
            let line = format!("#   [{index}] {}: {}", message.role, summary(message));
            out.push_str(&truncate(&line, width));
            out.push('\n');
        } else {
            let _ = writeln!(out, ">   [{index}] {}", message.role);
            render_fields(&mut out, raw, &referenced, width);
        }
    }

    let unlocated: Vec<&Address> = addresses
        .iter()
        .filter(|a| a.message_index().map_or(true, |i| i >= trace.len()))
        .collect();
    for address in unlocated {
        let _ = writeln!(out, "?   {address}");
    }
    out
}

fn summary(message: &Message) -> String {
    let content = match &message.content {
        Content::Text(text) => text.replace('\n', " "),
        Content::Image(_) => "<image>".to_string(),
        Content::Empty => String::new(),
    };
    if message.tool_calls.is_empty() {
        return content;
    }
    let calls = message
        .tool_calls
        .iter()
        .map(|call| {
            let args = match &call.arguments {
                Value::String(raw) => raw.clone(),
                other => other.to_string(),
            };
            format!("{}({args})", call.name)
        })
        .collect::<Vec<_>>()
        .join(", ");
    if content.is_empty() {
        calls
    } else {
        format!("{content} {calls}")
    }
}

fn truncate(line: &str, width: usize) -> String {
    if line.chars().count() <= width {
        return line.to_string();
    }
    if width < 4 {
        return line.chars().take(width).collect();
    }
    let mut cut: String = line.chars().take(width - 3).collect();
    cut.push_str("...");
    cut
}

/// Field path below the message index, e.g. `tool_calls.0.function.name`.
fn field_path(address: &Address) -> String {
    address.segments().skip(1).collect::<Vec<_>>().join(".")
}

fn render_fields(out: &mut String, raw: &Value, referenced: &[&Address], width: usize) {
    let mut fields: Vec<(String, Vec<CharRange>)> = Vec::new();
    for address in referenced {
        let path = field_path(address);
        let slot = match fields.iter().position(|(p, _)| *p == path) {
            Some(i) => i,
            None => {
                fields.push((path, Vec::new()));
                fields.len() - 1
            }
        };
        if let Some(range) = address.range() {
            fields[slot].1.push(range);
        }
    }

    for (path, ranges) in fields {
        if path.is_empty() {
            render_whole_message(out, raw, width);
            continue;
        }
        match lookup_path(raw, &path) {
            Some(value) => {
                let text = match value {
                    Value::String(text) => text,
                    other => other.to_string(),
                };
                let _ = writeln!(out, "{FIELD_INDENT}{path}:");
                write_highlighted(out, &text, &ranges);
            }
            None => {
                let _ = writeln!(out, "{FIELD_INDENT}{path}: <missing>");
            }
        }
    }
}

fn render_whole_message(out: &mut String, raw: &Value, width: usize) {
    let Some(fields) = raw.as_object() else {
        return;
    };
    for (key, value) in fields.iter().filter(|(k, _)| k.as_str() != "role") {
        let shown = match value {
            Value::String(text) => text.replace('\n', " "),
            other => other.to_string(),
        };
        out.push_str(&truncate(&format!("{FIELD_INDENT}{key}: {shown}"), width));
        out.push('\n');
    }
}

fn write_highlighted(out: &mut String, text: &str, ranges: &[CharRange]) {
    let mut offset = 0;
    for line in text.split('\n') {
        let len = line.chars().count();
        let _ = writeln!(out, "{TEXT_INDENT}{line}");
        let marks: String = (offset..offset + len)
            .map(|i| {
                if ranges.iter().any(|r| r.start <= i && i < r.end) {
                    '^'
                } else {
                    ' '
                }
            })
            .collect();
        let marks = marks.trim_end();
        if !marks.is_empty() {
            let _ = writeln!(out, "{TEXT_INDENT}{marks}");
        }
        offset += len + 1;
    }
}
