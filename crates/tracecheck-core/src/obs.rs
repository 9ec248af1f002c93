//! Structured observability hooks for assertion scope lifecycle events.
//!
//! This module provides:
//! - Scope-level tracing spans via the `ScopeSpan` RAII guard
//! - Emission functions for scope entry/exit, recorded assertions and result
//!   persistence
//!
//! Events are emitted at `info!` level (configurable via `TRACECHECK_LOG`).

use tracing::{debug, info, warn};

/// RAII guard that enters a scope-level tracing span while a manager is active.
///
/// # Example
///
/// ```ignore
/// let _span = ScopeSpan::enter("test_weather_lookup");
/// // every event logged here carries test = "test_weather_lookup"
/// ```
pub struct ScopeSpan {
    _span: tracing::span::EnteredSpan,
}

impl ScopeSpan {
    pub fn enter(test: &str) -> Self {
        let span = tracing::info_span!("tracecheck.scope", test = %test);
        Self {
            _span: span.entered(),
        }
    }
}

pub fn emit_scope_entered(test: &str, messages: usize) {
    info!(event = "scope.entered", test = %test, messages = messages);
}

/// Emit event: scope closed with its verdict and failure counts.
pub fn emit_scope_exited(test: &str, passed: bool, hard_failures: usize, soft_failures: usize) {
    info!(
        event = "scope.exited",
        test = %test,
        passed = passed,
        hard_failures = hard_failures,
        soft_failures = soft_failures,
    );
}

pub fn emit_assertion_recorded(kind: &str, passed: bool, addresses: usize) {
    debug!(
        event = "assertion.recorded",
        kind = %kind,
        passed = passed,
        addresses = addresses,
    );
}

/// Emit event: result line appended to the results file.
pub fn emit_result_persisted(test: &str, path: &std::path::Path) {
    info!(event = "result.persisted", test = %test, path = %path.display());
}

/// Emit event: result could not be written (warning level).
pub fn emit_result_persist_error(test: &str, error: &dyn std::fmt::Display) {
    warn!(event = "result.persist_error", test = %test, error = %error);
}

/// Emit event: trace pushed to a remote store.
pub fn emit_trace_pushed(test: &str, url: &str) {
    info!(event = "trace.pushed", test = %test, url = %url);
}

pub fn emit_trace_push_error(test: &str, error: &dyn std::fmt::Display) {
    warn!(event = "trace.push_error", test = %test, error = %error);
}

/// Emit event: soft assertion failed outside any scope (warning level).
pub fn emit_unscoped_expectation(message: &str) {
    warn!(event = "expectation.unscoped_failure", message = %message);
}
