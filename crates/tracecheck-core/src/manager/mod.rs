//! Assertion scopes.
//!
//! [`Manager::enter`] binds a [`Trace`] and pushes a scope onto the calling
//! thread's scope stack. Assertions issued while the scope is on top of the
//! stack are recorded into it. The returned [`ScopeGuard`] closes the scope
//! exactly once, either through [`ScopeGuard::finish`] or on drop:
//!
//! - the scope is popped and the trace unbound, unconditionally
//! - the [`TestOutcome`] is computed (soft failures never fail a test)
//! - a result record is appended when persistence is configured
//! - failed HARD assertions are rendered against the trace and surfaced as
//!   [`TracecheckError::HardAssertionsFailed`] (or a panic when the guard is
//!   dropped without `finish`)

pub mod assertions;

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::collaborators::{annotations_from_outcome, PushTraceRequest, TraceStore};
use crate::config::Config;
use crate::domain::{Address, Result, TracecheckError};
use crate::obs::{self, ScopeSpan};
use crate::record::{append_result, TestResultRecord};
use crate::render::render_failures;
use crate::trace::Trace;

/// Name used when neither the caller nor the thread provides one.
pub const UNKNOWN_TEST: &str = "unknown_test";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AssertionKind {
    /// Failure fails the test.
    Hard,
    /// Failure is recorded only.
    Soft,
}

impl fmt::Display for AssertionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssertionKind::Hard => f.write_str("HARD"),
            AssertionKind::Soft => f.write_str("SOFT"),
        }
    }
}

/// One recorded judgment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assertion {
    pub kind: AssertionKind,
    pub passed: bool,
    pub addresses: Vec<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Assertion {
    pub fn new(
        kind: AssertionKind,
        passed: bool,
        addresses: Vec<Address>,
        message: Option<String>,
    ) -> Self {
        Self {
            kind,
            passed,
            addresses,
            message,
        }
    }

    pub fn is_hard_failure(&self) -> bool {
        self.kind == AssertionKind::Hard && !self.passed
    }

    pub fn is_soft_failure(&self) -> bool {
        self.kind == AssertionKind::Soft && !self.passed
    }
}

/// Verdict of one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub name: String,
    pub passed: bool,
    pub assertions: Vec<Assertion>,
}

impl TestOutcome {
    /// `passed` is true unless some HARD assertion failed.
    pub fn from_assertions(name: impl Into<String>, assertions: Vec<Assertion>) -> Self {
        let passed = !assertions.iter().any(Assertion::is_hard_failure);
        Self {
            name: name.into(),
            passed,
            assertions,
        }
    }

    pub fn hard_failures(&self) -> usize {
        self.assertions.iter().filter(|a| a.is_hard_failure()).count()
    }

    pub fn soft_failures(&self) -> usize {
        self.assertions.iter().filter(|a| a.is_soft_failure()).count()
    }
}

// ---------------------------------------------------------------------------
// Scope stack
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct ScopeState {
    id: u64,
    name: String,
    assertions: RefCell<Vec<Assertion>>,
    closed: Cell<bool>,
}

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static SCOPES: RefCell<Vec<Rc<ScopeState>>> = const { RefCell::new(Vec::new()) };
}

fn push_scope(state: Rc<ScopeState>) {
    SCOPES.with(|scopes| scopes.borrow_mut().push(state));
}

fn pop_scope(id: u64) {
    // try_with: the guard may be dropped while thread-locals are torn down
    let _ = SCOPES.try_with(|scopes| scopes.borrow_mut().retain(|s| s.id != id));
}

/// Handle to the innermost active scope of the calling thread.
#[derive(Debug, Clone)]
pub struct ScopeHandle {
    state: Rc<ScopeState>,
}

impl ScopeHandle {
    pub fn name(&self) -> &str {
        &self.state.name
    }

    /// Append an assertion. Fails once the scope has closed.
    pub fn record(&self, assertion: Assertion) -> Result<()> {
        if self.state.closed.get() {
            return Err(TracecheckError::NoActiveManager);
        }
        obs::emit_assertion_recorded(
            &assertion.kind.to_string(),
            assertion.passed,
            assertion.addresses.len(),
        );
        self.state.assertions.borrow_mut().push(assertion);
        Ok(())
    }

    /// Snapshot of the assertions recorded so far.
    pub fn assertions(&self) -> Vec<Assertion> {
        self.state.assertions.borrow().clone()
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Entry points for assertion scopes.
pub struct Manager;

impl Manager {
    /// Open a scope over `trace` with configuration from the environment.
    pub fn enter<'t>(trace: &'t Trace, name: Option<&str>) -> Result<ScopeGuard<'t>> {
        Self::enter_with_config(trace, name, Config::from_env()?)
    }

    /// Open a scope over `trace`. Fails with `TraceAlreadyBound` if another
    /// scope holds the trace.
    pub fn enter_with_config<'t>(
        trace: &'t Trace,
        name: Option<&str>,
        config: Config,
    ) -> Result<ScopeGuard<'t>> {
        trace.bind()?;
        let name = resolve_test_name(name);
        let span = ScopeSpan::enter(&name);
        let state = Rc::new(ScopeState {
            id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
            name,
            assertions: RefCell::new(Vec::new()),
            closed: Cell::new(false),
        });
        push_scope(Rc::clone(&state));
        obs::emit_scope_entered(&state.name, trace.len());
        Ok(ScopeGuard {
            trace,
            state,
            config,
            store: None,
            finished: false,
            _span: span,
        })
    }

    /// Innermost active scope of the calling thread.
    pub fn current() -> Option<ScopeHandle> {
        SCOPES
            .try_with(|scopes| scopes.borrow().last().cloned())
            .ok()
            .flatten()
            .map(|state| ScopeHandle { state })
    }
}

/// Explicit name, else the thread name (the test harness names threads
/// after tests), else [`UNKNOWN_TEST`].
fn resolve_test_name(explicit: Option<&str>) -> String {
    if let Some(name) = explicit.filter(|n| !n.is_empty()) {
        return name.to_string();
    }
    std::thread::current()
        .name()
        .map(|n| n.rsplit("::").next().unwrap_or(n).to_string())
        .unwrap_or_else(|| UNKNOWN_TEST.to_string())
}

/// Closes its scope on [`finish`](ScopeGuard::finish) or drop.
pub struct ScopeGuard<'t> {
    trace: &'t Trace,
    state: Rc<ScopeState>,
    config: Config,
    store: Option<&'t dyn TraceStore>,
    finished: bool,
    _span: ScopeSpan,
}

impl<'t> ScopeGuard<'t> {
    /// Push the trace and annotations to `store` on close when the config
    /// asks for it.
    pub fn with_store(mut self, store: &'t dyn TraceStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn trace(&self) -> &'t Trace {
        self.trace
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn handle(&self) -> ScopeHandle {
        ScopeHandle {
            state: Rc::clone(&self.state),
        }
    }

    /// Close the scope and return its outcome, or `HardAssertionsFailed`
    /// with the rendered report.
    pub fn finish(mut self) -> Result<TestOutcome> {
        let (outcome, report) = self.close();
        match report {
            Some(report) => Err(TracecheckError::HardAssertionsFailed {
                count: outcome.hard_failures(),
                report,
            }),
            None => Ok(outcome),
        }
    }

    fn close(&mut self) -> (TestOutcome, Option<String>) {
        self.finished = true;
        self.state.closed.set(true);
        pop_scope(self.state.id);
        self.trace.unbind();

        let assertions = self.state.assertions.take();
        let outcome = TestOutcome::from_assertions(self.state.name.clone(), assertions);

        let mut record = TestResultRecord::new(&outcome, self.trace);
        if self.config.push {
            record.explorer_url = self.push(&outcome);
        }
        if let Some(path) = self.config.results_file() {
            match append_result(&path, &record) {
                Ok(()) => obs::emit_result_persisted(&outcome.name, &path),
                Err(e) => obs::emit_result_persist_error(&outcome.name, &e),
            }
        }

        obs::emit_scope_exited(
            &outcome.name,
            outcome.passed,
            outcome.hard_failures(),
            outcome.soft_failures(),
        );

        let report = if outcome.passed {
            None
        } else {
            Some(render_failures(
                self.trace,
                &outcome,
                self.config.terminal_width,
            ))
        };
        (outcome, report)
    }

    fn push(&self, outcome: &TestOutcome) -> Option<String> {
        let store = self.store?;
        let request = PushTraceRequest {
            messages: self.trace.raw_messages(),
            annotations: annotations_from_outcome(outcome),
            metadata: self.trace.metadata(),
            dataset: &self.config.dataset_name,
        };
        match store.push_trace(&request) {
            Ok(pushed) => {
                obs::emit_trace_pushed(&outcome.name, &pushed.url);
                Some(pushed.url)
            }
            Err(e) => {
                obs::emit_trace_push_error(&outcome.name, &e);
                None
            }
        }
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let (outcome, report) = self.close();
        if let Some(report) = report {
            if !std::thread::panicking() {
                panic!(
                    "{} hard assertions failed in {}\n{}",
                    outcome.hard_failures(),
                    outcome.name,
                    report
                );
            }
        }
    }
}
