//! End-to-end scenarios for the guarded update entry point.
//!
//! Each test wires `guarded(UpdateCommand)` with scripted fakes and checks
//! replies, notifications, runner calls and restart count.

use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread;

use updater::core::decision::RestartPolicy;
use updater::core::messages::{NOTIFICATION_TITLE, ReplyKind};
use updater::core::types::{AuthorizedPrincipals, CommandResult, Outcome, PrincipalId};
use updater::entry::{EntryPoint, Invocation};
use updater::io::process::CommandRunner;
use updater::test_support::{
    EventLog, RecordingResponder, RecordingRestarter, RecordingSink, ScriptedRunner,
};
use updater::update::{UpdateCommand, UpdateSettings, guarded};

const ADMIN: &str = "1234567890";

fn principals() -> AuthorizedPrincipals {
    [ADMIN].into_iter().collect()
}

fn settings() -> UpdateSettings {
    UpdateSettings {
        notification_channel: Some("updates".to_string()),
        repository_url: Some("https://github.com/owner/bot".to_string()),
        ..UpdateSettings::default()
    }
}

/// Handles kept by the test while clones live inside the entry point.
struct Fixture {
    entry: Box<dyn EntryPoint>,
    runner: ScriptedRunner,
    sink: RecordingSink,
    restarter: RecordingRestarter,
}

impl Fixture {
    fn with(runner: ScriptedRunner, sink: RecordingSink, settings: UpdateSettings) -> Self {
        let restarter = RecordingRestarter::default();
        let entry = guarded(
            principals(),
            UpdateCommand::new(settings, runner.clone(), sink.clone(), restarter.clone()),
        );
        Self {
            entry: Box::new(entry),
            runner,
            sink,
            restarter,
        }
    }

    fn new(runner: ScriptedRunner) -> Self {
        Self::with(runner, RecordingSink::default(), settings())
    }

    fn invoke(&self, caller: &str) -> (Invocation, RecordingResponder) {
        let mut responder = RecordingResponder::default();
        let invocation = self
            .entry
            .invoke(&PrincipalId::from(caller), &mut responder)
            .expect("invoke");
        (invocation, responder)
    }
}

/// Scenario A: already current, no restart.
#[test]
fn already_up_to_date_cancels_reboot() {
    let fx = Fixture::new(ScriptedRunner::with_sync_output("Already up to date."));
    let (invocation, responder) = fx.invoke(ADMIN);

    assert_eq!(
        invocation,
        Invocation::Completed {
            outcome: Outcome::NoChange,
            restarted: false
        }
    );
    assert_eq!(responder.kinds(), vec![ReplyKind::Ack, ReplyKind::Final]);
    assert!(responder.last_text().contains("No updates found"));
    assert_eq!(fx.restarter.count(), 0);

    let sent = fx.sink.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "updates");
    assert_eq!(sent[0].1.title, NOTIFICATION_TITLE);
    assert_eq!(
        sent[0].1.status.as_deref(),
        Some("No updates found. The bot is running the latest version.")
    );
}

/// Scenario B: real changes pulled, restart exactly once.
#[test]
fn pulled_changes_restart_once() {
    let fx = Fixture::new(ScriptedRunner::with_sync_output("Updated 3 files."));
    let (invocation, responder) = fx.invoke(ADMIN);

    assert_eq!(
        invocation,
        Invocation::Completed {
            outcome: Outcome::Success,
            restarted: true
        }
    );
    assert_eq!(fx.restarter.count(), 1);
    assert!(responder.last_text().contains("Updates applied successfully"));
    let sent = fx.sink.sent();
    assert_eq!(
        sent[0].1.status.as_deref(),
        Some("Updates applied. Check https://github.com/owner/bot")
    );
}

#[test]
fn side_effects_run_in_order_ack_notify_final_restart() {
    let log = EventLog::default();
    let runner = ScriptedRunner::with_sync_output("Updated 3 files.").with_log(&log);
    let sink = RecordingSink::default().with_log(&log);
    let restarter = RecordingRestarter::default().with_log(&log);
    let entry = guarded(
        principals(),
        UpdateCommand::new(settings(), runner, sink, restarter),
    );

    let mut responder = RecordingResponder::with_log(&log);
    entry
        .invoke(&PrincipalId::from(ADMIN), &mut responder)
        .expect("invoke");

    assert_eq!(
        log.events(),
        vec![
            "reply:ack",
            "run:git",
            "run:cargo",
            "notify",
            "reply:final",
            "restart"
        ]
    );
}

/// Scenario C: merge conflict flags an error and keeps running.
#[test]
fn merge_conflict_reports_failure() {
    let fx = Fixture::new(ScriptedRunner::new(vec![
        CommandResult::failure("CONFLICT (content): merge conflict in x.py"),
        CommandResult::success("installed"),
    ]));
    let (invocation, responder) = fx.invoke(ADMIN);

    assert_eq!(
        invocation,
        Invocation::Completed {
            outcome: Outcome::Conflict,
            restarted: false
        }
    );
    assert!(responder.last_text().contains("Error"));
    assert_eq!(fx.restarter.count(), 0);
}

/// Scenario D: unknown caller gets a single rejection and nothing runs.
#[test]
fn unauthorized_caller_runs_nothing() {
    let fx = Fixture::new(ScriptedRunner::with_sync_output("Updated 3 files."));
    let (invocation, responder) = fx.invoke("999");

    assert_eq!(invocation, Invocation::Rejected);
    assert_eq!(responder.kinds(), vec![ReplyKind::Rejection]);
    assert!(fx.runner.calls().is_empty());
    assert!(fx.sink.sent().is_empty());
    assert_eq!(fx.restarter.count(), 0);
}

/// Scenario E: install fails after a successful sync; default policy still restarts.
#[test]
fn dependency_failure_still_restarts_by_default() {
    let fx = Fixture::new(ScriptedRunner::new(vec![
        CommandResult::success("Fast-forward\n 2 files changed"),
        CommandResult::failure("resolver: package not found"),
    ]));
    let (invocation, responder) = fx.invoke(ADMIN);

    assert_eq!(
        invocation,
        Invocation::Completed {
            outcome: Outcome::Success,
            restarted: true
        }
    );
    assert_eq!(fx.restarter.count(), 1);
    let final_reply = responder.replies().last().expect("final reply");
    assert_eq!(final_reply.message.fields[0].name, "Dependencies");
}

#[test]
fn dependency_failure_aborts_when_configured() {
    let settings = UpdateSettings {
        policy: RestartPolicy {
            abort_on_dependency_failure: true,
        },
        ..settings()
    };
    let fx = Fixture::with(
        ScriptedRunner::new(vec![
            CommandResult::success("Fast-forward"),
            CommandResult::failure("resolver: package not found"),
        ]),
        RecordingSink::default(),
        settings,
    );
    let (invocation, _responder) = fx.invoke(ADMIN);

    assert_eq!(
        invocation,
        Invocation::Completed {
            outcome: Outcome::Success,
            restarted: false
        }
    );
    assert_eq!(fx.restarter.count(), 0);
}

#[test]
fn unresolvable_channel_is_non_fatal() {
    let fx = Fixture::with(
        ScriptedRunner::with_sync_output("Updated 3 files."),
        RecordingSink::with_unresolvable(&["updates"]),
        settings(),
    );
    let (invocation, responder) = fx.invoke(ADMIN);

    assert!(matches!(
        invocation,
        Invocation::Completed {
            restarted: true,
            ..
        }
    ));
    assert!(fx.sink.sent().is_empty());
    assert_eq!(responder.kinds(), vec![ReplyKind::Ack, ReplyKind::Final]);
}

#[test]
fn launch_failure_on_sync_is_conflict() {
    let fx = Fixture::new(ScriptedRunner::new(vec![
        CommandResult::failure("error: failed to launch `git`: No such file or directory"),
        CommandResult::success("installed"),
    ]));
    let (invocation, _responder) = fx.invoke(ADMIN);
    assert!(matches!(
        invocation,
        Invocation::Completed {
            outcome: Outcome::Conflict,
            restarted: false
        }
    ));
}

#[test]
fn each_invocation_runs_both_steps_once() {
    let fx = Fixture::new(ScriptedRunner::new(vec![
        CommandResult::success("Already up to date."),
        CommandResult::success("installed"),
        CommandResult::success("Already up to date."),
        CommandResult::success("installed"),
    ]));
    fx.invoke(ADMIN);
    fx.invoke(ADMIN);

    let calls = fx.runner.calls();
    assert_eq!(calls.len(), 4);
    assert_eq!(calls[0], vec!["git".to_string(), "pull".to_string()]);
    assert_eq!(calls[2], calls[0]);
}

/// Runner that parks its first call until the test releases it.
struct GatedRunner {
    scripted: ScriptedRunner,
    entered: Mutex<Option<SyncSender<()>>>,
    release: Mutex<Receiver<()>>,
}

impl CommandRunner for GatedRunner {
    fn run(&self, argv: &[String]) -> CommandResult {
        if let Some(entered) = self.entered.lock().expect("entered lock").take() {
            entered.send(()).expect("signal entered");
            self.release
                .lock()
                .expect("release lock")
                .recv()
                .expect("wait release");
        }
        self.scripted.run(argv)
    }
}

#[test]
fn overlapping_update_is_busy_and_runs_nothing() {
    let (entered_tx, entered_rx) = mpsc::sync_channel(1);
    let (release_tx, release_rx) = mpsc::sync_channel(1);
    let scripted = ScriptedRunner::with_sync_output("Already up to date.");
    let sink = RecordingSink::default();
    let restarter = RecordingRestarter::default();
    let runner = GatedRunner {
        scripted: scripted.clone(),
        entered: Mutex::new(Some(entered_tx)),
        release: Mutex::new(release_rx),
    };
    let entry = Arc::new(guarded(
        principals(),
        UpdateCommand::new(settings(), runner, sink.clone(), restarter.clone()),
    ));

    let first = {
        let entry = Arc::clone(&entry);
        thread::spawn(move || {
            let mut responder = RecordingResponder::default();
            entry
                .invoke(&PrincipalId::from(ADMIN), &mut responder)
                .expect("first invoke")
        })
    };
    entered_rx.recv().expect("first run entered");

    let mut responder = RecordingResponder::default();
    let second = entry
        .invoke(&PrincipalId::from(ADMIN), &mut responder)
        .expect("second invoke");
    assert_eq!(second, Invocation::Busy);
    assert_eq!(responder.kinds(), vec![ReplyKind::Busy]);
    assert!(scripted.calls().is_empty(), "busy call must not reach the runner");

    release_tx.send(()).expect("release first run");
    let first = first.join().expect("first thread");
    assert!(matches!(first, Invocation::Completed { .. }));
    assert_eq!(scripted.calls().len(), 2);
    assert_eq!(sink.sent().len(), 1);
    assert_eq!(restarter.count(), 0);
}
