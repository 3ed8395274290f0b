//! Restart trigger: replace the running process with a fresh instance.

use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::exit_codes;
use crate::io::config::RestartMode;

/// Replaces the current process.
///
/// Real implementations do not return on success; any return from
/// [`Restarter::restart`] on a production restarter carries the failure.
pub trait Restarter {
    fn restart(&self) -> Result<()>;
}

/// Restarts with the same executable and argument vector that started us.
#[derive(Debug, Clone)]
pub struct ProcessRestarter {
    mode: RestartMode,
    program: PathBuf,
    args: Vec<OsString>,
}

impl ProcessRestarter {
    pub fn new(mode: RestartMode, program: impl Into<PathBuf>, args: Vec<OsString>) -> Self {
        Self {
            mode,
            program: program.into(),
            args,
        }
    }

    /// Capture the current invocation (executable path and arguments).
    pub fn from_env(mode: RestartMode) -> Result<Self> {
        let program = std::env::current_exe().context("resolve current executable")?;
        let args = std::env::args_os().skip(1).collect();
        Ok(Self::new(mode, program, args))
    }

    pub fn mode(&self) -> RestartMode {
        self.mode
    }

    /// Command that relaunches this process.
    pub fn relaunch_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

impl Restarter for ProcessRestarter {
    #[instrument(skip_all, fields(mode = ?self.mode, program = %self.program.display()))]
    fn restart(&self) -> Result<()> {
        // Nothing runs after this point in the old process.
        flush_stdio();
        match self.mode {
            RestartMode::Exec => exec_in_place(self.relaunch_command()),
            RestartMode::Exit => {
                info!(code = exit_codes::RESTART_REQUESTED, "exiting for supervisor restart");
                std::process::exit(exit_codes::RESTART_REQUESTED)
            }
        }
    }
}

#[cfg(unix)]
fn exec_in_place(mut cmd: Command) -> Result<()> {
    use std::os::unix::process::CommandExt;

    info!("replacing process image");
    let err = cmd.exec();
    Err(err).context("exec current executable")
}

#[cfg(not(unix))]
fn exec_in_place(_cmd: Command) -> Result<()> {
    info!(
        code = exit_codes::RESTART_REQUESTED,
        "in-place exec unavailable, exiting for supervisor restart"
    );
    std::process::exit(exit_codes::RESTART_REQUESTED)
}

fn flush_stdio() {
    let _ = std::io::stdout().flush();
    let _ = std::io::stderr().flush();
}
