//! Structured messages sent to the caller and the notification channel.
//!
//! Rendering into a concrete chat format is left to the host; these are plain
//! data with deterministic text for each outcome.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::types::{Outcome, UpdateRun};

pub const ACK_TITLE: &str = "Updating...";
pub const ACK_DESCRIPTION: &str = "Pulling updates from the remote and restarting.";
pub const REJECTION_TEXT: &str = "This command is restricted to developers.";
pub const BUSY_TEXT: &str = "An update is already in progress.";
pub const NOTIFICATION_TITLE: &str = "Bot Updated";
pub const NOTIFICATION_DESCRIPTION: &str =
    "Pulled updates from the remote and processed the result.";

/// Title, description and optional status line plus extra fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub name: String,
    pub value: String,
}

impl Message {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            status: None,
            fields: Vec::new(),
            timestamp: None,
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(Field {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Every human-readable piece of the message joined by newlines.
    pub fn text(&self) -> String {
        let mut out = format!("{}\n{}", self.title, self.description);
        if let Some(status) = &self.status {
            out.push('\n');
            out.push_str(status);
        }
        for field in &self.fields {
            out.push_str(&format!("\n{}: {}", field.name, field.value));
        }
        out
    }
}

/// Kind of reply sent to the privileged caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyKind {
    Ack,
    Final,
    Rejection,
    Busy,
}

/// A reply routed to the caller's response channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub kind: ReplyKind,
    pub ephemeral: bool,
    pub message: Message,
}

impl Reply {
    pub fn ack() -> Self {
        Self {
            kind: ReplyKind::Ack,
            ephemeral: true,
            message: Message::new(ACK_TITLE, ACK_DESCRIPTION),
        }
    }

    pub fn rejection() -> Self {
        Self {
            kind: ReplyKind::Rejection,
            ephemeral: true,
            message: Message::new("Access denied", REJECTION_TEXT),
        }
    }

    pub fn busy() -> Self {
        Self {
            kind: ReplyKind::Busy,
            ephemeral: true,
            message: Message::new("Update busy", BUSY_TEXT),
        }
    }

    /// Final summary: the ack text followed by an outcome-specific line.
    pub fn summary(outcome: Outcome, run: &UpdateRun) -> Self {
        let description = format!("{ACK_DESCRIPTION}\n\n{}", summary_line(outcome));
        let mut message = Message::new(ACK_TITLE, description);
        if let Some(install) = run.dependency_install()
            && !install.succeeded
        {
            message = message.with_field(
                "Dependencies",
                "Dependency install failed; the new code may not match its manifest.",
            );
        }
        Self {
            kind: ReplyKind::Final,
            ephemeral: true,
            message,
        }
    }
}

/// Outcome-specific line appended to the final summary.
pub fn summary_line(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::NoChange => "No updates found. Cancelling the reboot...",
        Outcome::Conflict => "🚨 Error: Merge conflict or issue detected. Update failed!",
        Outcome::Success => "🔧 Updates applied successfully.",
        Outcome::Unknown => "⚠️ No source sync result was recorded. Cancelling the reboot...",
    }
}

/// Status line for the notification channel.
pub fn notification_status(outcome: Outcome, repository_url: Option<&str>) -> String {
    match outcome {
        Outcome::NoChange => "No updates found. The bot is running the latest version.".to_string(),
        Outcome::Conflict => {
            "Update failed: merge conflict or error reported by source sync.".to_string()
        }
        Outcome::Success => match repository_url {
            Some(url) => format!("Updates applied. Check {url}"),
            None => "Updates applied.".to_string(),
        },
        Outcome::Unknown => "No source sync response available.".to_string(),
    }
}

/// Notification sent after every run.
pub fn notification(outcome: Outcome, repository_url: Option<&str>, at: DateTime<Utc>) -> Message {
    Message::new(NOTIFICATION_TITLE, NOTIFICATION_DESCRIPTION)
        .with_status(notification_status(outcome, repository_url))
        .at(at)
}
