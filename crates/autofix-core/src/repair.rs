//! The repair pass: ask the oracle for a fix for every failing unit of a
//! record and apply it through the backup manager.

use serde::Serialize;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::backup::BackupManager;
use crate::normalize::strip_markdown;
use crate::oracle::RepairOracle;
use crate::paths;
use crate::record::SweepRecord;

/// What happened to one unit during a repair pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RepairAction {
    /// The unit was passing; nothing to do.
    Skipped,
    /// The unit file no longer exists on disk.
    Missing,
    /// The oracle produced nothing usable.
    NoFix { reason: String },
    /// Reading, backing up or writing the unit failed.
    WriteFailed { reason: String },
    Patched { backup: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitRepair {
    pub unit: String,
    #[serde(flatten)]
    pub action: RepairAction,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RepairReport {
    pub units: Vec<UnitRepair>,
}

impl RepairReport {
    pub fn patched(&self) -> usize {
        self.count(|a| matches!(a, RepairAction::Patched { .. }))
    }

    pub fn missing(&self) -> usize {
        self.count(|a| matches!(a, RepairAction::Missing))
    }

    pub fn no_fix(&self) -> usize {
        self.count(|a| matches!(a, RepairAction::NoFix { .. }))
    }

    pub fn write_failed(&self) -> usize {
        self.count(|a| matches!(a, RepairAction::WriteFailed { .. }))
    }

    pub fn get(&self, unit: &str) -> Option<&RepairAction> {
        self.units.iter().find(|u| u.unit == unit).map(|u| &u.action)
    }

    fn count(&self, pred: impl Fn(&RepairAction) -> bool) -> usize {
        self.units.iter().filter(|u| pred(&u.action)).count()
    }

    fn push(&mut self, unit: &str, action: RepairAction) {
        self.units.push(UnitRepair {
            unit: unit.to_string(),
            action,
        });
    }
}

pub struct RepairPass<'a> {
    oracle: &'a dyn RepairOracle,
    backups: BackupManager,
}

impl<'a> RepairPass<'a> {
    pub fn new(oracle: &'a dyn RepairOracle, backups: BackupManager) -> Self {
        Self { oracle, backups }
    }

    /// Attempt a fix for every failing unit in `record`.
    ///
    /// Per-unit problems are logged and recorded in the report; they never
    /// stop the pass.
    pub fn run(&self, record: &SweepRecord) -> RepairReport {
        let project_root = record.project_root();
        let project_name = paths::project_name(project_root);
        info!("repairing project {}", project_root.display());

        let mut report = RepairReport::default();
        for (key, outcome) in record.results.iter() {
            if !outcome.is_failing() {
                info!("no error detected for {key}, skipping");
                report.push(key, RepairAction::Skipped);
                continue;
            }

            let unit = project_root.join(key);
            if !unit.is_file() {
                warn!("unit to repair not found: {}", unit.display());
                report.push(key, RepairAction::Missing);
                continue;
            }

            info!("requesting fix for {key}");
            let original = match std::fs::read_to_string(&unit) {
                Ok(s) => s,
                Err(e) => {
                    warn!("could not read {}: {e}", unit.display());
                    report.push(
                        key,
                        RepairAction::WriteFailed {
                            reason: e.to_string(),
                        },
                    );
                    continue;
                }
            };

            let fixed = match self.oracle.request_fix(&original, outcome.error_text()) {
                Ok(answer) => strip_markdown(&answer),
                Err(e) => {
                    warn!("no fix obtained for {key}: {e}");
                    report.push(key, RepairAction::NoFix { reason: e.to_string() });
                    continue;
                }
            };
            if fixed.is_empty() {
                warn!("no fix obtained for {key}: answer was empty after cleanup");
                report.push(
                    key,
                    RepairAction::NoFix {
                        reason: "empty answer".to_string(),
                    },
                );
                continue;
            }

            match self
                .backups
                .backup_and_patch(&unit, &fixed, &project_name, project_root)
            {
                Ok(backup) => report.push(key, RepairAction::Patched { backup }),
                Err(e) => {
                    warn!("could not patch {key}: {e}");
                    report.push(key, RepairAction::WriteFailed { reason: e.to_string() });
                }
            }
        }

        info!(
            "repair pass done: {} patched, {} without fix, {} missing, {} write failure(s)",
            report.patched(),
            report.no_fix(),
            report.missing(),
            report.write_failed()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::OracleError;
    use crate::record::{ExecutionOutcome, SweepResults};
    use std::cell::RefCell;
    use std::path::Path;
    use tempfile::TempDir;

    /// Returns a fixed answer and remembers what it was asked.
    struct FixedOracle {
        answer: Option<String>,
        calls: RefCell<Vec<(String, String)>>,
    }

    impl FixedOracle {
        fn answering(answer: &str) -> Self {
            Self {
                answer: Some(answer.to_string()),
                calls: RefCell::new(Vec::new()),
            }
        }

        fn absent() -> Self {
            Self {
                answer: None,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl RepairOracle for FixedOracle {
        fn request_fix(&self, content: &str, error: &str) -> Result<String, OracleError> {
            self.calls
                .borrow_mut()
                .push((content.to_string(), error.to_string()));
            self.answer
                .clone()
                .ok_or(OracleError::Failed {
                    code: Some(1),
                    stderr: "model unavailable".to_string(),
                })
        }
    }

    fn project(dir: &TempDir) -> PathBuf {
        let root = dir.path().join("demo");
        std::fs::create_dir_all(root.join("lib")).unwrap();
        std::fs::write(root.join("main.py"), "print('ok')\n").unwrap();
        std::fs::write(root.join("lib/bad.py"), "print(x)\n").unwrap();
        root
    }

    fn record(root: &Path) -> SweepRecord {
        let mut results = SweepResults::new();
        results.insert("main.py", ExecutionOutcome::new(0, "ok\n", ""));
        results.insert(
            "lib/bad.py",
            ExecutionOutcome::new(1, "", "NameError: name 'x' is not defined\n"),
        );
        SweepRecord::new(root, results)
    }

    #[test]
    fn patches_failing_units_only() {
        let dir = TempDir::new().unwrap();
        let root = project(&dir);
        let oracle = FixedOracle::answering("```python\nx = 1\nprint(x)\n```");
        let pass = RepairPass::new(&oracle, BackupManager::new(dir.path().join("bk")));

        let report = pass.run(&record(&root));

        assert_eq!(report.patched(), 1);
        assert_eq!(report.get("main.py"), Some(&RepairAction::Skipped));
        assert_eq!(
            std::fs::read_to_string(root.join("lib/bad.py")).unwrap(),
            "x = 1\nprint(x)"
        );
        assert_eq!(std::fs::read_to_string(root.join("main.py")).unwrap(), "print('ok')\n");

        let calls = oracle.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "print(x)\n");
        assert!(calls[0].1.contains("NameError"));

        let Some(RepairAction::Patched { backup }) = report.get("lib/bad.py") else {
            panic!("expected Patched");
        };
        assert!(backup.starts_with(dir.path().join("bk/demo/lib")));
        assert_eq!(std::fs::read_to_string(backup).unwrap(), "print(x)\n");
    }

    #[test]
    fn absent_fix_leaves_unit_and_creates_no_backup() {
        let dir = TempDir::new().unwrap();
        let root = project(&dir);
        let oracle = FixedOracle::absent();
        let pass = RepairPass::new(&oracle, BackupManager::new(dir.path().join("bk")));

        let report = pass.run(&record(&root));

        assert_eq!(report.no_fix(), 1);
        assert_eq!(report.patched(), 0);
        assert_eq!(std::fs::read_to_string(root.join("lib/bad.py")).unwrap(), "print(x)\n");
        assert!(!dir.path().join("bk").exists());
    }

    #[test]
    fn deleted_unit_is_skipped_without_aborting() {
        let dir = TempDir::new().unwrap();
        let root = project(&dir);
        std::fs::write(root.join("other.py"), "raise SystemExit(3)\n").unwrap();

        let mut rec = record(&root);
        rec.results
            .insert("other.py", ExecutionOutcome::new(3, "", ""));
        std::fs::remove_file(root.join("lib/bad.py")).unwrap();

        let oracle = FixedOracle::answering("print('fixed')");
        let pass = RepairPass::new(&oracle, BackupManager::new(dir.path().join("bk")));
        let report = pass.run(&rec);

        assert_eq!(report.get("lib/bad.py"), Some(&RepairAction::Missing));
        assert!(matches!(
            report.get("other.py"),
            Some(RepairAction::Patched { .. })
        ));
        assert_eq!(
            std::fs::read_to_string(root.join("other.py")).unwrap(),
            "print('fixed')"
        );
        // Silent non-zero exit: stdout (empty here) is sent instead of stderr.
        assert_eq!(oracle.calls.borrow().len(), 1);
    }

    #[test]
    fn answer_empty_after_cleanup_is_no_fix() {
        let dir = TempDir::new().unwrap();
        let root = project(&dir);
        let oracle = FixedOracle::answering("```python\n\n```");
        let pass = RepairPass::new(&oracle, BackupManager::new(dir.path().join("bk")));
        let report = pass.run(&record(&root));
        assert_eq!(report.no_fix(), 1);
        assert_eq!(std::fs::read_to_string(root.join("lib/bad.py")).unwrap(), "print(x)\n");
    }

    #[test]
    fn report_serializes_with_action_tag() {
        let mut report = RepairReport::default();
        report.push("a.py", RepairAction::Missing);
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"unit\":\"a.py\""));
        assert!(json.contains("\"action\":\"missing\""));
    }
}
