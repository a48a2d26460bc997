//! Sweep outcomes and the persisted record format.
//!
//! A record is a flat JSON object: every unit key maps to an
//! `{exit_code, stdout, stderr}` object and the reserved
//! [`PROJECT_ROOT_KEY`] holds the absolute project root. Readers skip any
//! key whose value is not an outcome object, so the format can grow without
//! breaking older binaries.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AutofixError, Result};
use crate::paths::PROJECT_ROOT_KEY;

pub const TIMEOUT_STDERR: &str = "TimeoutExpired";

// ---------------------------------------------------------------------------
// ExecutionOutcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    #[serde(default, alias = "returncode")]
    pub exit_code: i32,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
}

impl ExecutionOutcome {
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn timed_out() -> Self {
        Self::new(-1, "", TIMEOUT_STDERR)
    }

    pub fn launch_failure(description: impl Into<String>) -> Self {
        Self::new(-1, "", description)
    }

    /// A unit fails on a non-zero exit or on any non-whitespace stderr.
    pub fn is_failing(&self) -> bool {
        self.exit_code != 0 || !self.stderr.trim().is_empty()
    }

    /// Text handed to the oracle as the failure description.
    pub fn error_text(&self) -> &str {
        if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        }
    }
}

// ---------------------------------------------------------------------------
// SweepResults
// ---------------------------------------------------------------------------

/// Outcomes of one sweep in execution order, keyed by relative unit path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepResults {
    entries: Vec<(String, ExecutionOutcome)>,
}

impl SweepResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `outcome` for `key`, replacing an earlier entry for the same key.
    pub fn insert(&mut self, key: impl Into<String>, outcome: ExecutionOutcome) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = outcome,
            None => self.entries.push((key, outcome)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ExecutionOutcome> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, o)| o)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ExecutionOutcome)> {
        self.entries.iter().map(|(k, o)| (k.as_str(), o))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn failing(&self) -> impl Iterator<Item = (&str, &ExecutionOutcome)> {
        self.iter().filter(|(_, o)| o.is_failing())
    }

    pub fn all_passing(&self) -> bool {
        self.entries.iter().all(|(_, o)| !o.is_failing())
    }
}

// ---------------------------------------------------------------------------
// SweepRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SweepRecord {
    pub project_root: PathBuf,
    pub results: SweepResults,
}

impl SweepRecord {
    pub fn new(project_root: impl Into<PathBuf>, results: SweepResults) -> Self {
        Self {
            project_root: project_root.into(),
            results,
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        let mut map = serde_json::Map::new();
        for (key, outcome) in self.results.iter() {
            map.insert(key.to_string(), serde_json::to_value(outcome)?);
        }
        map.insert(
            PROJECT_ROOT_KEY.to_string(),
            serde_json::Value::String(self.project_root.to_string_lossy().into_owned()),
        );
        Ok(serde_json::Value::Object(map))
    }

    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        let serde_json::Value::Object(map) = value else {
            return Err(AutofixError::InvalidRecord(
                "record is not a JSON object".to_string(),
            ));
        };

        let mut project_root = None;
        let mut results = SweepResults::new();
        for (key, value) in map {
            if key == PROJECT_ROOT_KEY {
                project_root = value.as_str().map(PathBuf::from);
                continue;
            }
            if !value.is_object() {
                continue;
            }
            if let Ok(outcome) = serde_json::from_value::<ExecutionOutcome>(value) {
                results.insert(key, outcome);
            }
        }

        let project_root = project_root
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| AutofixError::InvalidRecord(format!("missing '{PROJECT_ROOT_KEY}'")))?;
        Ok(Self {
            project_root,
            results,
        })
    }

    pub fn to_string_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_json()?)?)
    }

    pub fn parse(s: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(s).map_err(|e| AutofixError::InvalidRecord(e.to_string()))?;
        Self::from_json(value)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failing_classification() {
        assert!(!ExecutionOutcome::new(0, "hello", "").is_failing());
        assert!(!ExecutionOutcome::new(0, "", "   \n").is_failing());
        assert!(ExecutionOutcome::new(1, "", "").is_failing());
        assert!(ExecutionOutcome::new(0, "", "DeprecationWarning: x").is_failing());
        assert!(ExecutionOutcome::timed_out().is_failing());
        assert!(ExecutionOutcome::launch_failure("No such file").is_failing());
    }

    #[test]
    fn error_text_falls_back_to_stdout() {
        let silent = ExecutionOutcome::new(2, "assertion failed", "");
        assert_eq!(silent.error_text(), "assertion failed");
        let loud = ExecutionOutcome::new(1, "progress", "Traceback");
        assert_eq!(loud.error_text(), "Traceback");
    }

    #[test]
    fn record_keeps_unit_order_and_root_key() {
        let mut results = SweepResults::new();
        results.insert("main.py", ExecutionOutcome::new(0, "ok\n", ""));
        results.insert("a/b.py", ExecutionOutcome::new(1, "", "boom"));
        let record = SweepRecord::new("/abs/proj", results);

        let json = record.to_string_pretty().unwrap();
        let main_pos = json.find("\"main.py\"").unwrap();
        let ab_pos = json.find("\"a/b.py\"").unwrap();
        assert!(main_pos < ab_pos);
        assert!(json.contains("\"_project_root\": \"/abs/proj\""));
        assert!(json.contains("\"exit_code\": 1"));
    }

    #[test]
    fn parse_tolerates_legacy_and_unknown_keys() {
        let raw = r#"{
            "_project_root": "/abs/proj",
            "main.py": {"returncode": 1, "stdout": "", "stderr": "NameError"},
            "_schema": 2,
            "notes": "free text",
            "util.py": {"exit_code": 0}
        }"#;
        let record = SweepRecord::parse(raw).unwrap();
        assert_eq!(record.project_root(), Path::new("/abs/proj"));
        assert_eq!(record.results.len(), 2);
        assert_eq!(record.results.get("main.py").unwrap().exit_code, 1);
        assert!(!record.results.get("util.py").unwrap().is_failing());
    }

    #[test]
    fn parse_rejects_missing_root() {
        let err = SweepRecord::parse(r#"{"main.py": {"exit_code": 0}}"#).unwrap_err();
        assert!(matches!(err, AutofixError::InvalidRecord(_)));
        let err = SweepRecord::parse(r#"{"_project_root": 5}"#).unwrap_err();
        assert!(matches!(err, AutofixError::InvalidRecord(_)));
        let err = SweepRecord::parse("[1, 2]").unwrap_err();
        assert!(matches!(err, AutofixError::InvalidRecord(_)));
    }

    #[test]
    fn insert_replaces_existing_key() {
        let mut results = SweepResults::new();
        results.insert("x.py", ExecutionOutcome::new(1, "", "e"));
        results.insert("x.py", ExecutionOutcome::new(0, "", ""));
        assert_eq!(results.len(), 1);
        assert!(results.all_passing());
    }
}
