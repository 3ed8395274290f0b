//! Updater configuration stored under `.updater/config.toml`.
//!
//! Loaded once at startup and static for the process lifetime; there is no
//! hot-reload.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::decision::RestartPolicy;
use crate::core::types::AuthorizedPrincipals;

pub const DEFAULT_CONFIG_PATH: &str = ".updater/config.toml";

/// Updater configuration (TOML).
///
/// Missing fields default to values that reproduce a plain
/// `git pull` + dependency fetch cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UpdaterConfig {
    /// Caller ids allowed to trigger an update.
    pub authorized_principals: Vec<String>,

    /// Destination for post-run notifications. Unset means unresolvable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_channel: Option<String>,

    /// Linked from the success notification when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_url: Option<String>,

    /// Working directory for every step command.
    pub workdir: PathBuf,

    /// Directory where the CLI host appends notification JSONL files.
    pub notify_dir: PathBuf,

    /// Per-command wall-clock budget in seconds.
    pub command_timeout_secs: u64,

    /// Truncate captured stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,

    /// Skip the restart when the dependency step failed.
    pub abort_on_dependency_failure: bool,

    pub steps: StepsConfig,

    pub restart: RestartConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StepsConfig {
    /// Command for the source sync step (e.g. `["git","pull"]`).
    pub source_sync: Vec<String>,
    /// Command for the dependency install step.
    pub dependency_install: Vec<String>,
}

impl Default for StepsConfig {
    fn default() -> Self {
        Self {
            source_sync: vec!["git".to_string(), "pull".to_string()],
            dependency_install: vec!["cargo".to_string(), "fetch".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct RestartConfig {
    pub mode: RestartMode,
}

/// How the restart trigger replaces the running process.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RestartMode {
    /// Replace the process image in place.
    #[default]
    Exec,
    /// Exit with `RESTART_REQUESTED` and let a supervisor relaunch.
    Exit,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            authorized_principals: Vec::new(),
            notification_channel: None,
            repository_url: None,
            workdir: PathBuf::from("."),
            notify_dir: PathBuf::from(".updater/notifications"),
            command_timeout_secs: 5 * 60,
            output_limit_bytes: 100_000,
            abort_on_dependency_failure: false,
            steps: StepsConfig::default(),
            restart: RestartConfig::default(),
        }
    }
}

impl UpdaterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.command_timeout_secs == 0 {
            return Err(anyhow!("command_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        validate_argv("steps.source_sync", &self.steps.source_sync)?;
        validate_argv("steps.dependency_install", &self.steps.dependency_install)?;
        if self
            .authorized_principals
            .iter()
            .any(|id| id.trim().is_empty())
        {
            return Err(anyhow!("authorized_principals must not contain blank ids"));
        }
        if let Some(channel) = &self.notification_channel
            && channel.trim().is_empty()
        {
            return Err(anyhow!("notification_channel must not be blank when set"));
        }
        Ok(())
    }

    pub fn principals(&self) -> AuthorizedPrincipals {
        self.authorized_principals.iter().cloned().collect()
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn restart_policy(&self) -> RestartPolicy {
        RestartPolicy {
            abort_on_dependency_failure: self.abort_on_dependency_failure,
        }
    }
}

fn validate_argv(name: &str, argv: &[String]) -> Result<()> {
    match argv.first() {
        Some(program) if !program.trim().is_empty() => Ok(()),
        _ => Err(anyhow!("{name} must be a non-empty array")),
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `UpdaterConfig::default()`.
pub fn load_config(path: &Path) -> Result<UpdaterConfig> {
    if !path.exists() {
        let cfg = UpdaterConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: UpdaterConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Write config unless it exists (or `force` is set). Returns true if written.
pub fn init_config(path: &Path, force: bool) -> Result<bool> {
    if !force && path.exists() {
        return Ok(false);
    }
    write_config(path, &UpdaterConfig::default())?;
    Ok(true)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &UpdaterConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
