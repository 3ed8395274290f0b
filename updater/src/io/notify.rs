//! Notification sinks for post-run update messages.
//!
//! The host owns channel resolution; a sink returns an error when the
//! destination cannot be resolved and the caller decides what to do with it.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use tracing::debug;

use crate::core::messages::Message;

pub trait NotificationSink {
    fn send(&self, destination: &str, message: &Message) -> Result<()>;
}

/// Appends each notification as one JSON line to `<dir>/<destination>.jsonl`.
#[derive(Debug, Clone)]
pub struct JsonlNotificationSink {
    dir: PathBuf,
}

impl JsonlNotificationSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Map a destination name to its file, rejecting names that could escape `dir`.
    pub fn resolve(&self, destination: &str) -> Result<PathBuf> {
        let valid = !destination.is_empty()
            && destination
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !destination.starts_with('.');
        if !valid {
            return Err(anyhow!("unknown notification channel '{destination}'"));
        }
        Ok(self.dir.join(format!("{destination}.jsonl")))
    }
}

impl NotificationSink for JsonlNotificationSink {
    fn send(&self, destination: &str, message: &Message) -> Result<()> {
        let path = self.resolve(destination)?;
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create notification dir {}", self.dir.display()))?;
        let mut line = serde_json::to_string(message).context("serialize notification")?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open {}", path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("append {}", path.display()))?;
        file.flush()
            .with_context(|| format!("flush {}", path.display()))?;
        debug!(path = %path.display(), "notification written");
        Ok(())
    }
}
