//! Assertion scopes end to end: recording, outcomes, persistence and push.

use std::sync::Mutex;

use serde_json::json;
use tempfile::TempDir;
use tracecheck_core::{
    assert_equals, assert_true, expect_true, read_results, Config, Manager, Provenance,
    PushTraceRequest, PushedTrace, Result, Trace, TraceStore, TracecheckError,
};

fn trace() -> Trace {
    Trace::new(vec![
        json!({"role": "user", "content": "Weather in Zurich?"}),
        json!({"role": "assistant", "content": "It is sunny in Zurich"}),
    ])
    .unwrap()
}

/// Records every push in memory.
#[derive(Default)]
struct FakeStore {
    pushed: Mutex<Vec<(String, usize)>>,
}

impl TraceStore for FakeStore {
    fn push_trace(&self, request: &PushTraceRequest<'_>) -> Result<PushedTrace> {
        self.pushed
            .lock()
            .unwrap()
            .push((request.dataset.to_string(), request.annotations.len()));
        Ok(PushedTrace {
            url: format!("https://explorer.invalid/{}", request.dataset),
        })
    }
}

#[test]
fn test_soft_failures_keep_test_passing() {
    let trace = trace();
    let guard = Manager::enter_with_config(&trace, Some("soft"), Config::without_persistence()).unwrap();
    let content = trace.message(1).unwrap().field("content").unwrap();
    let content = content.as_string().unwrap();

    assert_true(&content.contains("sunny").unwrap(), "is sunny").unwrap();
    expect_true(&content.contains("rain").unwrap(), "mentions rain").unwrap();
    expect_true(&content.contains("snow").unwrap(), "").unwrap();

    let outcome = guard.finish().unwrap();
    assert!(outcome.passed);
    assert_eq!(outcome.soft_failures(), 2);
    assert_eq!(outcome.assertions[0].addresses[0].to_string(), "1.content:6-11");
    // no match keeps the field's full range
    assert_eq!(outcome.assertions[1].addresses[0].to_string(), "1.content:0-21");
}

#[test]
fn test_hard_failure_fails_test_with_rendered_report() {
    let trace = trace();
    let guard = Manager::enter_with_config(&trace, Some("hard"), Config::without_persistence()).unwrap();
    let content = trace.message(1).unwrap().field("content").unwrap();

    assert_true(&content.as_string().unwrap().contains("sunny").unwrap(), "").unwrap();
    assert_equals(&json!("It is rainy"), &content, "forecast").unwrap();

    let err = guard.finish().unwrap_err();
    match err {
        TracecheckError::HardAssertionsFailed { count, report } => {
            assert_eq!(count, 1);
            assert!(report.starts_with("ASSERTION FAILED: forecast"));
            assert!(report.contains("#   [0] user: Weather in Zurich?"));
            assert!(report.contains(">   [1] assistant"));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(!trace.is_bound());
}

#[test]
fn test_results_are_appended_per_scope() {
    let dir = TempDir::new().unwrap();
    let config = Config::without_persistence()
        .with_dataset("weather")
        .with_results_dir(dir.path());
    let trace = trace();

    for name in ["first", "second"] {
        let guard = Manager::enter_with_config(&trace, Some(name), config.clone()).unwrap();
        let role = trace.message(0).unwrap().field("role").unwrap();
        assert_equals(&json!("user"), &role, "").unwrap();
        guard.finish().unwrap();
    }

    let records = read_results(&dir.path().join("results_for_weather.jsonl")).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].name, "first");
    assert_eq!(records[1].name, "second");
    assert!(records.iter().all(|r| r.passed));
    assert_eq!(records[0].trace.len(), 2);
    assert_eq!(records[0].assertions[0].addresses[0].to_string(), "0.role:0-4");
}

#[test]
fn test_push_attaches_explorer_url_and_annotations() {
    let dir = TempDir::new().unwrap();
    let mut config = Config::without_persistence()
        .with_dataset("pushed")
        .with_results_dir(dir.path());
    config.push = true;
    config.api_key = Some("key".to_string());

    let store = FakeStore::default();
    let trace = trace();
    let guard = Manager::enter_with_config(&trace, Some("push"), config)
        .unwrap()
        .with_store(&store);
    let content = trace.message(1).unwrap().field("content").unwrap();
    expect_true(&content.as_string().unwrap().contains("cloudy").unwrap(), "cloudy").unwrap();
    guard.finish().unwrap();

    assert_eq!(*store.pushed.lock().unwrap(), vec![("pushed".to_string(), 1)]);
    let records = read_results(&dir.path().join("results_for_pushed.jsonl")).unwrap();
    assert_eq!(
        records[0].explorer_url.as_deref(),
        Some("https://explorer.invalid/pushed")
    );
}

#[test]
fn test_scopes_are_thread_local() {
    let trace = trace();
    let _guard = Manager::enter_with_config(&trace, Some("main"), Config::without_persistence()).unwrap();

    std::thread::spawn(|| {
        assert!(Manager::current().is_none());
        let other = Trace::new(vec![json!({"role": "user", "content": "hi"})]).unwrap();
        let guard = Manager::enter_with_config(&other, Some("worker"), Config::without_persistence()).unwrap();
        assert_eq!(Manager::current().unwrap().name(), "worker");
        guard.finish().unwrap();
    })
    .join()
    .unwrap();

    assert_eq!(Manager::current().unwrap().name(), "main");
}

#[test]
fn test_error_between_enter_and_exit_still_releases_trace() {
    fn failing_check(trace: &Trace) -> Result<()> {
        trace.message(10)?;
        Ok(())
    }

    let trace = trace();
    let result = {
        let guard = Manager::enter_with_config(&trace, Some("err"), Config::without_persistence()).unwrap();
        let result = trace.run_assertions(&[failing_check]);
        guard.finish().unwrap();
        result
    };
    assert!(matches!(result, Err(TracecheckError::OutOfRange { index: 10, .. })));
    assert!(!trace.is_bound());
    assert!(Manager::current().is_none());
}

#[test]
fn test_values_keep_addresses_after_scope_closes() {
    let trace = trace();
    let content = {
        let guard = Manager::enter_with_config(&trace, Some("lifetime"), Config::without_persistence()).unwrap();
        let content = trace.message(1).unwrap().field("content").unwrap();
        guard.finish().unwrap();
        content
    };
    assert_eq!(content.addresses()[0].to_string(), "1.content:0-21");
}
