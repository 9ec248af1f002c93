//! Tool call / tool output reconciliation.
//!
//! Pairing runs in two passes over the indexed messages:
//!
//! 1. **Exact**: each tool output carrying an identifier (`tool_call_id`, else
//!    `id`) is paired with the first still-unpaired call with that id. Only the
//!    first output claiming an identifier takes part in this pass.
//! 2. **Positional**: every output left over (no identifier, an identifier no
//!    call carries, or a later duplicate) goes, in message order, to the
//!    nearest preceding unpaired call, scanning calls backwards from the end.
//!
//! Both passes are greedy and deterministic; a call is never paired twice.

use std::collections::HashSet;

use crate::domain::{Message, ToolCall};

/// Outcome of pairing, in terms of positions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pairing {
    /// `(call position, output message index)` in call order. Call positions
    /// index the trace-ordered list of all tool calls.
    pub pairs: Vec<(usize, usize)>,
    /// Positions of calls that received no output.
    pub unpaired: Vec<usize>,
}

/// Every tool call in the trace, in order.
pub fn flatten_calls(messages: &[Message]) -> Vec<&ToolCall> {
    messages.iter().flat_map(|m| m.tool_calls.iter()).collect()
}

pub fn pair_tool_calls(messages: &[Message]) -> Pairing {
    let calls = flatten_calls(messages);
    let mut assigned: Vec<Option<usize>> = vec![None; calls.len()];
    let mut consumed: HashSet<&str> = HashSet::new();
    let mut leftovers: Vec<usize> = Vec::new();

    for (index, message) in messages.iter().enumerate() {
        if !message.is_tool_output() {
            continue;
        }
        let key = match message.output_key() {
            Some(key) if !consumed.contains(key) => key,
            _ => {
                leftovers.push(index);
                continue;
            }
        };
        let hit = calls
            .iter()
            .zip(assigned.iter())
            .position(|(call, slot)| slot.is_none() && call.id.as_deref() == Some(key));
        match hit {
            Some(position) => {
                assigned[position] = Some(index);
                consumed.insert(key);
            }
            None => leftovers.push(index),
        }
    }

    for output in leftovers {
        let nearest = (0..calls.len())
            .rev()
            .find(|&i| assigned[i].is_none() && calls[i].message_index <= output);
        if let Some(position) = nearest {
            assigned[position] = Some(output);
        }
    }

    let mut pairing = Pairing::default();
    for (position, slot) in assigned.into_iter().enumerate() {
        match slot {
            Some(output) => pairing.pairs.push((position, output)),
            None => pairing.unpaired.push(position),
        }
    }
    pairing
}
