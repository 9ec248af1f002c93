//! Domain models for tracecheck.
//!
//! Canonical definitions for the core entities:
//! - `Address`: path + character range locating a value in a trace
//! - `Message` / `ToolCall`: typed views over raw trace messages
//! - `TracecheckError`: the error taxonomy shared by every module

pub mod address;
pub mod error;
pub mod message;

// Re-export main types and errors
pub use address::{Address, CharRange};
pub use error::{AddressError, Result, TracecheckError};
pub use message::{Content, ImageRef, Message, ToolCall};
