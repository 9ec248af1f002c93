//! Persisted test results.
//!
//! Each closed scope appends one JSON line to
//! `<results dir>/results_for_<dataset>.jsonl`. The summary printed at the
//! end of a run is computed from that file.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Result, TracecheckError};
use crate::manager::{Assertion, TestOutcome};
use crate::trace::Trace;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResultRecord {
    pub name: String,
    pub passed: bool,
    pub assertions: Vec<Assertion>,
    pub trace: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
}

impl TestResultRecord {
    pub fn new(outcome: &TestOutcome, trace: &Trace) -> Self {
        Self {
            name: outcome.name.clone(),
            passed: outcome.passed,
            assertions: outcome.assertions.clone(),
            trace: trace.raw_messages().to_vec(),
            explorer_url: None,
        }
    }
}

/// Append `record` as one JSON line, creating parent directories as needed.
pub fn append_result(path: &Path, record: &TestResultRecord) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut line = serde_json::to_string(record)?;
    line.push('\n');
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())?;
    Ok(())
}

/// All records of a results file. Blank lines are skipped.
pub fn read_results(path: &Path) -> Result<Vec<TestResultRecord>> {
    let raw = fs::read_to_string(path)?;
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str::<TestResultRecord>(line).map_err(TracecheckError::from))
        .collect()
}

/// Remove a results file left over from a previous run of the same dataset.
pub fn clear_results(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

pub fn summarize(records: &[TestResultRecord]) -> RunSummary {
    let passed = records.iter().filter(|r| r.passed).count();
    RunSummary {
        total: records.len(),
        passed,
        failed: records.len() - passed,
    }
}

/// Human-readable run summary, one numbered line per test.
pub fn render_summary(records: &[TestResultRecord], path: &Path) -> String {
    let summary = summarize(records);
    let mut out = String::new();
    out.push_str("Test summary\n");
    out.push_str(&format!("Test result saved to: {}\n", path.display()));
    out.push_str("------------\n");
    for (i, record) in records.iter().enumerate() {
        let verdict = if record.passed { "PASSED" } else { "FAILED" };
        out.push_str(&format!("{}. {}: {}\n", i + 1, record.name, verdict));
        if let Some(url) = &record.explorer_url {
            out.push_str(&format!("   {url}\n"));
        }
    }
    out.push_str(&format!("\nTotal tests: {}\n", summary.total));
    out.push_str(&format!("Passed: {}\n", summary.passed));
    out.push_str(&format!("Failed: {}\n", summary.failed));
    out.push_str("------------\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Address;
    use crate::manager::AssertionKind;
    use serde_json::json;
    use tempfile::TempDir;

    fn record(name: &str, passed: bool) -> TestResultRecord {
        TestResultRecord {
            name: name.to_string(),
            passed,
            assertions: vec![Assertion::new(
                AssertionKind::Hard,
                passed,
                vec![Address::parse("0.content:0-2").unwrap()],
                None,
            )],
            trace: vec![json!({"role": "user", "content": "hi"})],
            explorer_url: None,
        }
    }

    #[test]
    fn test_append_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("results_for_ci.jsonl");
        append_result(&path, &record("a", true)).unwrap();
        append_result(&path, &record("b", false)).unwrap();

        let records = read_results(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1], record("b", false));
        assert_eq!(
            summarize(&records),
            RunSummary {
                total: 2,
                passed: 1,
                failed: 1
            }
        );
    }

    #[test]
    fn test_clear_missing_file_is_ok() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results_for_none.jsonl");
        clear_results(&path).unwrap();
        append_result(&path, &record("a", true)).unwrap();
        clear_results(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_render_summary() {
        let rendered = render_summary(
            &[record("test_weather", true), record("test_city", false)],
            Path::new("/tmp/results_for_ci.jsonl"),
        );
        assert!(rendered.contains("Test result saved to: /tmp/results_for_ci.jsonl"));
        assert!(rendered.contains("1. test_weather: PASSED\n2. test_city: FAILED\n"));
        assert!(rendered.contains("Total tests: 2\nPassed: 1\nFailed: 1\n"));
    }
}
