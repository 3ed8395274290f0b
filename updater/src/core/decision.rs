//! Restart decision for a classified run.

use crate::core::types::{Outcome, UpdateRun};

/// Policy knobs for the restart decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestartPolicy {
    /// Suppress the restart when the dependency step failed.
    ///
    /// Off by default: a successful sync restarts even if the install failed.
    pub abort_on_dependency_failure: bool,
}

/// Decide whether a run should end in a process restart.
///
/// Only `Outcome::Success` restarts. The dependency step is consulted solely
/// when the policy opts in.
pub fn should_restart(outcome: Outcome, run: &UpdateRun, policy: RestartPolicy) -> bool {
    if outcome != Outcome::Success {
        return false;
    }
    if policy.abort_on_dependency_failure && dependency_failed(run) {
        return false;
    }
    true
}

/// True if the run recorded a failed dependency step.
pub fn dependency_failed(run: &UpdateRun) -> bool {
    run.dependency_install()
        .is_some_and(|result| !result.succeeded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{CommandResult, StepName, StepResult};

    fn run(install_ok: bool) -> UpdateRun {
        let install = if install_ok {
            CommandResult::success("installed")
        } else {
            CommandResult::failure("resolver failed")
        };
        UpdateRun::from_results([
            StepResult::new(StepName::SourceSync, CommandResult::success("Updated 3 files.")),
            StepResult::new(StepName::DependencyInstall, install),
        ])
    }

    #[test]
    fn only_success_restarts() {
        let policy = RestartPolicy::default();
        assert!(should_restart(Outcome::Success, &run(true), policy));
        assert!(!should_restart(Outcome::NoChange, &run(true), policy));
        assert!(!should_restart(Outcome::Conflict, &run(true), policy));
        assert!(!should_restart(Outcome::Unknown, &run(true), policy));
    }

    #[test]
    fn dependency_failure_restarts_by_default() {
        assert!(should_restart(
            Outcome::Success,
            &run(false),
            RestartPolicy::default()
        ));
    }

    #[test]
    fn dependency_failure_aborts_when_opted_in() {
        let policy = RestartPolicy {
            abort_on_dependency_failure: true,
        };
        assert!(!should_restart(Outcome::Success, &run(false), policy));
        assert!(should_restart(Outcome::Success, &run(true), policy));
    }
}
