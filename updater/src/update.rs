//! The update command: acknowledge, sequence, classify, notify, restart.

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{error, info, instrument, warn};

use crate::core::classifier::classify_run;
use crate::core::decision::{RestartPolicy, dependency_failed, should_restart};
use crate::core::messages::{Reply, notification};
use crate::core::types::{AuthorizedPrincipals, Outcome, PrincipalId, UpdateRun};
use crate::entry::{AuthGate, EntryPoint, Invocation, SingleRun, send_reply};
use crate::io::config::{StepsConfig, UpdaterConfig};
use crate::io::notify::NotificationSink;
use crate::io::process::CommandRunner;
use crate::io::responder::Responder;
use crate::io::restart::Restarter;
use crate::sequencer::run_update;

/// Static settings for the update command, taken from config at startup.
#[derive(Debug, Clone, Default)]
pub struct UpdateSettings {
    pub steps: StepsConfig,
    pub notification_channel: Option<String>,
    pub repository_url: Option<String>,
    pub policy: RestartPolicy,
}

impl From<&UpdaterConfig> for UpdateSettings {
    fn from(cfg: &UpdaterConfig) -> Self {
        Self {
            steps: cfg.steps.clone(),
            notification_channel: cfg.notification_channel.clone(),
            repository_url: cfg.repository_url.clone(),
            policy: cfg.restart_policy(),
        }
    }
}

/// Unguarded update entry point. Wrap it with [`guarded`] before exposing it.
pub struct UpdateCommand<R, N, S> {
    settings: UpdateSettings,
    runner: R,
    sink: N,
    restarter: S,
}

impl<R, N, S> UpdateCommand<R, N, S>
where
    R: CommandRunner,
    N: NotificationSink,
    S: Restarter,
{
    pub fn new(settings: UpdateSettings, runner: R, sink: N, restarter: S) -> Self {
        Self {
            settings,
            runner,
            sink,
            restarter,
        }
    }

    fn notify(&self, outcome: Outcome) {
        let Some(channel) = self.settings.notification_channel.as_deref() else {
            error!("update channel not configured; skipping notification");
            return;
        };
        let message = notification(outcome, self.settings.repository_url.as_deref(), Utc::now());
        if let Err(err) = self.sink.send(channel, &message) {
            error!(channel, err = %format!("{err:#}"), "update channel not found");
        }
    }
}

impl<R, N, S> EntryPoint for UpdateCommand<R, N, S>
where
    R: CommandRunner,
    N: NotificationSink,
    S: Restarter,
{
    #[instrument(skip_all, fields(caller = %caller))]
    fn invoke(&self, caller: &PrincipalId, responder: &mut dyn Responder) -> Result<Invocation> {
        send_reply(responder, &Reply::ack());

        let run: UpdateRun = run_update(&self.runner, &self.settings.steps);
        let outcome = classify_run(&run);
        info!(outcome = %outcome, "update run classified");
        if outcome == Outcome::Success && dependency_failed(&run) {
            warn!("dependency install failed after a successful source sync");
        }

        self.notify(outcome);
        send_reply(responder, &Reply::summary(outcome, &run));

        if !should_restart(outcome, &run, self.settings.policy) {
            return Ok(Invocation::Completed {
                outcome,
                restarted: false,
            });
        }

        info!("rebooting after update");
        self.restarter.restart().context("restart process")?;
        Ok(Invocation::Completed {
            outcome,
            restarted: true,
        })
    }
}

/// Compose the update command with authorization and single-run middleware.
pub fn guarded<E: EntryPoint>(principals: AuthorizedPrincipals, inner: E) -> AuthGate<SingleRun<E>> {
    AuthGate::new(principals, SingleRun::new(inner))
}
