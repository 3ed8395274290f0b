//! Update sequencer: source sync, then dependency install.

use tracing::{debug, info, instrument};

use crate::core::types::{StepName, StepResult, UpdateRun};
use crate::io::config::StepsConfig;
use crate::io::process::CommandRunner;

/// Run every step in fixed order and collect the results.
///
/// Steps never run concurrently: the install must see the synced tree. The
/// sequencer does not interpret results; a failed sync still proceeds to the
/// install step.
#[instrument(skip_all)]
pub fn run_update<R: CommandRunner + ?Sized>(runner: &R, steps: &StepsConfig) -> UpdateRun {
    let mut results = Vec::with_capacity(StepName::ALL.len());
    for step in StepName::ALL {
        let argv = step_argv(steps, step);
        info!(step = %step, command = %argv.join(" "), "running update step");
        let result = StepResult::new(step, runner.run(argv));
        debug!(step = %step, succeeded = result.succeeded, "update step finished");
        results.push(result);
    }
    UpdateRun::from_results(results)
}

fn step_argv(steps: &StepsConfig, step: StepName) -> &[String] {
    match step {
        StepName::SourceSync => &steps.source_sync,
        StepName::DependencyInstall => &steps.dependency_install,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::CommandResult;
    use crate::test_support::ScriptedRunner;

    #[test]
    fn runs_sync_then_install() {
        let runner = ScriptedRunner::new(vec![
            CommandResult::success("Already up to date."),
            CommandResult::success("installed"),
        ]);
        let run = run_update(&runner, &StepsConfig::default());

        assert_eq!(
            runner.calls(),
            vec![
                vec!["git".to_string(), "pull".to_string()],
                vec!["cargo".to_string(), "fetch".to_string()],
            ]
        );
        assert_eq!(run.steps().len(), 2);
        assert_eq!(
            run.source_sync().expect("sync").raw_output,
            "Already up to date."
        );
        assert_eq!(run.dependency_install().expect("install").raw_output, "installed");
    }

    #[test]
    fn failed_sync_still_installs() {
        let runner = ScriptedRunner::new(vec![
            CommandResult::failure("fatal: not a git repository"),
            CommandResult::success("installed"),
        ]);
        let run = run_update(&runner, &StepsConfig::default());
        assert_eq!(runner.calls().len(), 2);
        assert!(!run.source_sync().expect("sync").succeeded);
    }
}
