use anyhow::Context;
use autofix_core::{
    backup::BackupManager,
    config::Config,
    oracle::CommandOracle,
    repair::{RepairAction, RepairPass},
    store::ResultStore,
};
use std::path::Path;

use crate::output::{print_json, print_table};

pub fn run(workspace: &Path, record_path: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(workspace).context("failed to load config")?;
    let record = ResultStore::load(record_path)
        .with_context(|| format!("cannot use record {}", record_path.display()))?;

    let oracle = CommandOracle::from_config(&config.oracle);
    let pass = RepairPass::new(&oracle, BackupManager::new(config.backup_root(workspace)));
    let report = pass.run(&record);

    if json {
        return print_json(&report);
    }

    let rows: Vec<Vec<String>> = report
        .units
        .iter()
        .filter(|u| u.action != RepairAction::Skipped)
        .map(|u| vec![u.unit.clone(), describe(&u.action)])
        .collect();
    if rows.is_empty() {
        println!("No failing scripts in {}.", record_path.display());
    } else {
        print_table(&["UNIT", "RESULT"], rows);
    }
    Ok(())
}

fn describe(action: &RepairAction) -> String {
    match action {
        RepairAction::Skipped => "skipped".to_string(),
        RepairAction::Missing => "missing on disk".to_string(),
        RepairAction::NoFix { reason } => format!("no fix: {reason}"),
        RepairAction::WriteFailed { reason } => format!("write failed: {reason}"),
        RepairAction::Patched { backup } => format!("patched (backup {})", backup.display()),
    }
}
