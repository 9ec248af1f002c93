//! Tracecheck Core Library
//!
//! Provenance-tracked assertions over agent traces. Values read from a
//! [`Trace`] remember which message, field and character range they came
//! from; assertions recorded inside a [`Manager`] scope carry those addresses,
//! and failures are rendered against the trace with the offending spans
//! highlighted.

pub mod collaborators;
pub mod config;
pub mod domain;
pub mod manager;
pub mod matchers;
pub mod obs;
pub mod record;
pub mod render;
pub mod telemetry;
pub mod trace;
pub mod value;

pub use collaborators::{
    levenshtein, Annotation, BoundingBox, CachedClassifier, ClassificationRequest, Classifier,
    ClassifierInput, Detection, EmbeddingScorer, Extractor, ModerationFlag, Moderator,
    OcrDetector, PushTraceRequest, PushedTrace, ResponseCache, TraceStore,
};

pub use config::Config;

pub use domain::{
    Address, AddressError, CharRange, Content, ImageRef, Message, Result, ToolCall,
    TracecheckError,
};

pub use manager::assertions::{
    assert_equals, assert_false, assert_that, assert_true, expect_equals, expect_false,
    expect_that, expect_true,
};
pub use manager::{Assertion, AssertionKind, Manager, ScopeGuard, ScopeHandle, TestOutcome};

pub use matchers::{
    Agreement, HasSubstring, IsFactuallyEqual, IsSimilar, LambdaMatcher, Matcher,
    SimilarityMetric,
};

pub use record::{
    append_result, clear_results, read_results, render_summary, summarize, RunSummary,
    TestResultRecord,
};

pub use render::{render_failures, render_trace};

pub use trace::{Filter, Pairing, Selector, ToolPair, Trace};

pub use value::{
    BoolValue, ListValue, MapValue, NumberValue, OpaqueValue, Provenance, ProvenanceValue,
    StringValue,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
