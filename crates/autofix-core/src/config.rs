use crate::error::Result;
use crate::orchestrator::LoopConfig;
use crate::paths;
use crate::runner::RunnerSettings;
use crate::store::LatestStrategy;
use crate::sweep::SweepSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// OracleConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Program and leading arguments; the composed prompt is appended last.
    #[serde(default = "default_oracle_command")]
    pub command: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_oracle_command() -> Vec<String> {
    vec![
        "ollama".to_string(),
        "run".to_string(),
        "llama3:latest".to_string(),
    ]
}

fn default_timeout_secs() -> u64 {
    300
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            command: default_oracle_command(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl OracleConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_sleep_between_ms")]
    pub sleep_between_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub exec_timeout_secs: u64,
    #[serde(default = "default_interpreter")]
    pub interpreter: Vec<String>,
    #[serde(default = "default_extension")]
    pub extension: String,
    #[serde(default = "default_entry_point")]
    pub entry_point: String,
    #[serde(default = "default_ignored_dirs")]
    pub ignored_dirs: Vec<String>,
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,
    #[serde(default)]
    pub latest_strategy: LatestStrategy,
    #[serde(default)]
    pub oracle: OracleConfig,
}

fn default_max_iterations() -> u32 {
    10
}

fn default_sleep_between_ms() -> u64 {
    1000
}

fn default_interpreter() -> Vec<String> {
    vec!["python3".to_string()]
}

fn default_extension() -> String {
    "py".to_string()
}

fn default_entry_point() -> String {
    "main.py".to_string()
}

fn default_ignored_dirs() -> Vec<String> {
    ["__pycache__", "venv", "env", "Scripts", ".venv", ".env"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_results_dir() -> PathBuf {
    PathBuf::from(paths::RESULTS_DIR)
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from(paths::BACKUP_DIR)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            sleep_between_ms: default_sleep_between_ms(),
            exec_timeout_secs: default_timeout_secs(),
            interpreter: default_interpreter(),
            extension: default_extension(),
            entry_point: default_entry_point(),
            ignored_dirs: default_ignored_dirs(),
            results_dir: default_results_dir(),
            backup_dir: default_backup_dir(),
            latest_strategy: LatestStrategy::default(),
            oracle: OracleConfig::default(),
        }
    }
}

impl Config {
    /// Load `<workspace>/autofix.yaml`, falling back to defaults when the
    /// file does not exist.
    pub fn load(workspace: &Path) -> Result<Self> {
        let path = paths::config_path(workspace);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn results_root(&self, workspace: &Path) -> PathBuf {
        paths::resolve_in(workspace, &self.results_dir)
    }

    pub fn backup_root(&self, workspace: &Path) -> PathBuf {
        paths::resolve_in(workspace, &self.backup_dir)
    }

    pub fn runner_settings(&self) -> RunnerSettings {
        RunnerSettings {
            interpreter: self.interpreter.clone(),
            timeout: Duration::from_secs(self.exec_timeout_secs),
        }
    }

    pub fn sweep_settings(&self) -> SweepSettings {
        SweepSettings {
            extension: self.extension.clone(),
            entry_point: self.entry_point.clone(),
            ignored_dirs: self.ignored_dirs.clone(),
            runner: self.runner_settings(),
        }
    }

    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            max_iterations: self.max_iterations,
            sleep_between: Duration::from_millis(self.sleep_between_ms),
        }
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut push = |level: WarnLevel, message: String| {
            warnings.push(ConfigWarning { level, message });
        };

        if self.max_iterations == 0 {
            push(
                WarnLevel::Error,
                "max_iterations is 0: the loop would never run a sweep".to_string(),
            );
        }
        if self.exec_timeout_secs == 0 {
            push(
                WarnLevel::Error,
                "exec_timeout_secs is 0: every unit would time out".to_string(),
            );
        }
        if self.oracle.timeout_secs == 0 {
            push(
                WarnLevel::Error,
                "oracle.timeout_secs is 0: every fix request would time out".to_string(),
            );
        }
        if self.extension.trim().is_empty() {
            push(WarnLevel::Error, "extension is empty".to_string());
        } else if !self
            .entry_point
            .ends_with(&format!(".{}", self.extension.trim_start_matches('.')))
        {
            push(
                WarnLevel::Warning,
                format!(
                    "entry_point '{}' does not use extension '{}' and will never be discovered",
                    self.entry_point, self.extension
                ),
            );
        }

        match self.interpreter.first() {
            None => push(WarnLevel::Error, "interpreter is empty".to_string()),
            Some(program) if which::which(program).is_err() => push(
                WarnLevel::Warning,
                format!("interpreter '{program}' not found on PATH"),
            ),
            Some(_) => {}
        }

        match self.oracle.command.first() {
            None => push(WarnLevel::Error, "oracle.command is empty".to_string()),
            Some(program) if which::which(program).is_err() => push(
                WarnLevel::Warning,
                format!("oracle program '{program}' not found on PATH"),
            ),
            Some(_) => {}
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_loads_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.max_iterations, 10);
        assert_eq!(cfg.exec_timeout_secs, 300);
        assert_eq!(cfg.oracle.timeout_secs, 300);
        assert_eq!(cfg.entry_point, "main.py");
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("autofix.yaml"),
            "max_iterations: 2\nsleep_between_ms: 0\noracle:\n  command: [sh, fix.sh]\n",
        )
        .unwrap();
        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg.max_iterations, 2);
        assert_eq!(cfg.sleep_between_ms, 0);
        assert_eq!(cfg.oracle.command, vec!["sh", "fix.sh"]);
        assert_eq!(cfg.oracle.timeout_secs, 300);
        assert_eq!(cfg.extension, "py");
        assert_eq!(cfg.latest_strategy, LatestStrategy::ModifiedTime);
    }

    #[test]
    fn printed_config_loads_back() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::default();
        cfg.latest_strategy = LatestStrategy::Sequence;
        cfg.ignored_dirs.push("node_modules".to_string());
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        assert!(yaml.contains("latest_strategy: sequence"));
        std::fs::write(dir.path().join("autofix.yaml"), yaml).unwrap();
        assert_eq!(Config::load(dir.path()).unwrap(), cfg);
    }

    #[test]
    fn loop_config_is_derived_not_global() {
        let cfg = Config {
            max_iterations: 2,
            sleep_between_ms: 0,
            ..Config::default()
        };
        let lc = cfg.loop_config();
        assert_eq!(lc.max_iterations, 2);
        assert_eq!(lc.sleep_between, Duration::ZERO);
    }

    #[test]
    fn relative_dirs_resolve_under_workspace() {
        let cfg = Config::default();
        let ws = Path::new("/ws");
        assert_eq!(cfg.results_root(ws), PathBuf::from("/ws/execution_results"));
        assert_eq!(cfg.backup_root(ws), PathBuf::from("/ws/backup_scripts"));

        let abs = Config {
            backup_dir: PathBuf::from("/var/backups"),
            ..Config::default()
        };
        assert_eq!(abs.backup_root(ws), PathBuf::from("/var/backups"));
    }

    #[test]
    fn validate_flags_errors() {
        let cfg = Config {
            max_iterations: 0,
            oracle: OracleConfig {
                command: vec![],
                timeout_secs: 300,
            },
            ..Config::default()
        };
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("max_iterations")));
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("oracle.command")));
    }

    #[test]
    fn validate_warns_on_unreachable_entry_point() {
        let cfg = Config {
            interpreter: vec!["sh".to_string()],
            extension: "sh".to_string(),
            oracle: OracleConfig {
                command: vec!["sh".to_string()],
                timeout_secs: 10,
            },
            ..Config::default()
        };
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].level, WarnLevel::Warning);
        assert!(warnings[0].message.contains("entry_point"));
    }
}
