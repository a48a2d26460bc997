use anyhow::Context;
use autofix_core::{config::Config, paths, store::ResultStore, sweep::sweep};
use std::path::Path;

use crate::output::{print_json, print_table};

pub fn run(workspace: &Path, project_path: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(workspace).context("failed to load config")?;

    if !project_path.is_dir() {
        anyhow::bail!("project path is not a directory: {}", project_path.display());
    }
    let project_root = project_path
        .canonicalize()
        .with_context(|| format!("cannot resolve {}", project_path.display()))?;
    let project_name = paths::project_name(&project_root);

    let results = sweep(&project_root, &config.sweep_settings())
        .with_context(|| format!("sweep of {} failed", project_root.display()))?;

    let store = ResultStore::new(config.results_root(workspace), config.latest_strategy);
    let record = store
        .save(&project_name, &project_root, &results)
        .context("failed to save results")?;

    if json {
        let units: Vec<_> = results
            .iter()
            .map(|(unit, outcome)| {
                serde_json::json!({
                    "unit": unit,
                    "exit_code": outcome.exit_code,
                    "failing": outcome.is_failing(),
                })
            })
            .collect();
        print_json(&serde_json::json!({
            "project_root": project_root,
            "record": record,
            "units": units,
        }))?;
        return Ok(());
    }

    if results.is_empty() {
        println!("No scripts found in {}.", project_root.display());
    } else {
        let rows = results
            .iter()
            .map(|(unit, outcome)| {
                let status = if outcome.is_failing() { "FAIL" } else { "ok" };
                vec![
                    unit.to_string(),
                    outcome.exit_code.to_string(),
                    status.to_string(),
                ]
            })
            .collect();
        print_table(&["UNIT", "EXIT", "STATUS"], rows);
    }
    println!("\nResults saved to {}", record.display());
    Ok(())
}
