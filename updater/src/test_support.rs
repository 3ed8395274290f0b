//! Test-only fakes for the runner, responder, notification sink and restarter.
//!
//! Every fake is a cheap handle over shared state: clone it into the entry
//! point under test and keep the original for assertions. Fakes built with
//! `with_log` also append to a shared [`EventLog`] so tests can check the
//! relative order of side effects.

use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};

use crate::core::messages::{Message, Reply, ReplyKind};
use crate::core::types::CommandResult;
use crate::io::notify::NotificationSink;
use crate::io::process::CommandRunner;
use crate::io::responder::Responder;
use crate::io::restart::Restarter;

/// Ordered record of side effects shared between fakes.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    pub fn record(&self, event: impl Into<String>) {
        self.events.lock().expect("event log lock").push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().expect("event log lock").clone()
    }
}

fn record(log: &Option<EventLog>, event: impl Into<String>) {
    if let Some(log) = log {
        log.record(event);
    }
}

/// Command runner that returns queued results and records every argv.
///
/// Once the queue is drained it keeps returning a failure result, so an
/// unexpected extra call shows up in assertions instead of panicking.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRunner {
    results: Arc<Mutex<VecDeque<CommandResult>>>,
    calls: Arc<Mutex<Vec<Vec<String>>>>,
    log: Option<EventLog>,
}

impl ScriptedRunner {
    pub fn new(results: Vec<CommandResult>) -> Self {
        Self {
            results: Arc::new(Mutex::new(results.into())),
            calls: Arc::default(),
            log: None,
        }
    }

    /// Sync output followed by a successful install.
    pub fn with_sync_output(sync: &str) -> Self {
        Self::new(vec![
            CommandResult::success(sync),
            CommandResult::success("Requirements satisfied."),
        ])
    }

    pub fn with_log(mut self, log: &EventLog) -> Self {
        self.log = Some(log.clone());
        self
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, argv: &[String]) -> CommandResult {
        self.calls.lock().expect("calls lock").push(argv.to_vec());
        record(
            &self.log,
            format!("run:{}", argv.first().map(String::as_str).unwrap_or("")),
        );
        self.results
            .lock()
            .expect("results lock")
            .pop_front()
            .unwrap_or_else(|| CommandResult::failure("error: no scripted result left"))
    }
}

/// Responder that keeps every reply in order.
#[derive(Debug, Default)]
pub struct RecordingResponder {
    replies: Vec<Reply>,
    log: Option<EventLog>,
}

impl RecordingResponder {
    pub fn with_log(log: &EventLog) -> Self {
        Self {
            replies: Vec::new(),
            log: Some(log.clone()),
        }
    }

    pub fn replies(&self) -> &[Reply] {
        &self.replies
    }

    pub fn kinds(&self) -> Vec<ReplyKind> {
        self.replies.iter().map(|reply| reply.kind).collect()
    }

    pub fn last_text(&self) -> String {
        self.replies
            .last()
            .map(|reply| reply.message.text())
            .unwrap_or_default()
    }
}

impl Responder for RecordingResponder {
    fn reply(&mut self, reply: &Reply) -> Result<()> {
        let kind = serde_json::to_value(reply.kind)?;
        record(
            &self.log,
            format!("reply:{}", kind.as_str().unwrap_or_default()),
        );
        self.replies.push(reply.clone());
        Ok(())
    }
}

/// Notification sink that records deliveries; listed destinations fail to resolve.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    unresolvable: Arc<BTreeSet<String>>,
    sent: Arc<Mutex<Vec<(String, Message)>>>,
    log: Option<EventLog>,
}

impl RecordingSink {
    pub fn with_unresolvable(destinations: &[&str]) -> Self {
        Self {
            unresolvable: Arc::new(destinations.iter().map(|d| d.to_string()).collect()),
            ..Self::default()
        }
    }

    pub fn with_log(mut self, log: &EventLog) -> Self {
        self.log = Some(log.clone());
        self
    }

    pub fn sent(&self) -> Vec<(String, Message)> {
        self.sent.lock().expect("sent lock").clone()
    }
}

impl NotificationSink for RecordingSink {
    fn send(&self, destination: &str, message: &Message) -> Result<()> {
        if self.unresolvable.contains(destination) {
            record(&self.log, "notify:unresolved");
            return Err(anyhow!("unknown notification channel '{destination}'"));
        }
        record(&self.log, "notify");
        self.sent
            .lock()
            .expect("sent lock")
            .push((destination.to_string(), message.clone()));
        Ok(())
    }
}

/// Restarter that counts calls instead of replacing the process.
#[derive(Debug, Clone, Default)]
pub struct RecordingRestarter {
    count: Arc<AtomicUsize>,
    fail: Arc<AtomicBool>,
    log: Option<EventLog>,
}

impl RecordingRestarter {
    /// A restarter whose restart attempt fails, like a failed exec.
    pub fn failing() -> Self {
        let restarter = Self::default();
        restarter.fail.store(true, Ordering::SeqCst);
        restarter
    }

    pub fn with_log(mut self, log: &EventLog) -> Self {
        self.log = Some(log.clone());
        self
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl Restarter for RecordingRestarter {
    fn restart(&self) -> Result<()> {
        self.count.fetch_add(1, Ordering::SeqCst);
        record(&self.log, "restart");
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("exec failed: permission denied"));
        }
        Ok(())
    }
}
