//! Domain-level error taxonomy for tracecheck.

/// Errors produced while parsing an address string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("address {address:?} has an empty path segment")]
    EmptySegment { address: String },

    #[error("address {address:?} has a malformed range suffix")]
    MalformedRange { address: String },

    #[error("address {address:?} has an inverted range {start}-{end}")]
    InvertedRange {
        address: String,
        start: usize,
        end: usize,
    },
}

/// tracecheck domain errors.
#[derive(Debug, thiserror::Error)]
pub enum TracecheckError {
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("unsupported operation: {operation} is not defined for {variant} values")]
    UnsupportedOperation {
        operation: &'static str,
        variant: &'static str,
    },

    #[error("cannot filter field '{field}' with a {kind} literal (only strings, numbers or predicates are supported)")]
    UnsupportedFilterType { field: String, kind: &'static str },

    #[error("trace is already bound to an active manager")]
    TraceAlreadyBound,

    #[error("index {index} out of range for {len} items")]
    OutOfRange { index: usize, len: usize },

    #[error("key not found: {key}")]
    KeyNotFound { key: String },

    #[error("invalid address: {0}")]
    InvalidAddress(#[from] AddressError),

    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("no active manager in the current scope")]
    NoActiveManager,

    #[error("assertion failed: {0}")]
    AssertionFailed(String),

    #[error("{count} hard assertions failed\n{report}")]
    HardAssertionsFailed { count: usize, report: String },

    #[error("collaborator error: {0}")]
    Collaborator(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for tracecheck operations.
pub type Result<T> = std::result::Result<T, TracecheckError>;
