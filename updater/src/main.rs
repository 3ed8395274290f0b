//! Self-update host CLI.
//!
//! Wires the update command from `.updater/config.toml` with real child
//! processes, a JSONL notification sink and an in-place restarter.

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use updater::core::classifier::classify_sync_output;
use updater::core::types::PrincipalId;
use updater::entry::{AuthGate, EntryPoint, Invocation, SingleRun};
use updater::exit_codes;
use updater::io::config::{
    DEFAULT_CONFIG_PATH, RestartMode, UpdaterConfig, init_config, load_config,
};
use updater::io::notify::JsonlNotificationSink;
use updater::io::process::SystemCommandRunner;
use updater::io::responder::JsonlResponder;
use updater::io::restart::ProcessRestarter;
use updater::logging;
use updater::serve::serve;
use updater::update::{UpdateCommand, UpdateSettings, guarded};

type HostEntry =
    AuthGate<SingleRun<UpdateCommand<SystemCommandRunner, JsonlNotificationSink, ProcessRestarter>>>;

#[derive(Parser)]
#[command(
    name = "updater",
    version,
    about = "Pull, reinstall and restart on operator request"
)]
struct Cli {
    /// Path to the updater config file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default config file if missing.
    Init {
        /// Overwrite an existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Classify source-sync output read from stdin.
    Classify,
    /// Run the privileged update entry point once.
    Update {
        /// Caller identifier checked against `authorized_principals`.
        #[arg(long)]
        caller: String,
    },
    /// Read `<caller> update` lines from stdin and dispatch them.
    Serve,
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { force } => cmd_init(&cli.config, force),
        Command::Classify => cmd_classify(),
        Command::Update { caller } => cmd_update(&cli.config, &caller),
        Command::Serve => cmd_serve(&cli.config),
    }
}

fn cmd_init(config_path: &Path, force: bool) -> Result<i32> {
    if init_config(config_path, force)? {
        println!("wrote {}", config_path.display());
    } else {
        println!("{} already exists", config_path.display());
    }
    Ok(exit_codes::OK)
}

fn cmd_classify() -> Result<i32> {
    let mut text = String::new();
    io::stdin()
        .read_to_string(&mut text)
        .context("read sync output from stdin")?;
    println!("{}", classify_sync_output(&text));
    Ok(exit_codes::OK)
}

fn cmd_update(config_path: &Path, caller: &str) -> Result<i32> {
    let entry = build_entry(config_path, Host::OneShot)?;
    let mut responder = JsonlResponder::new(io::stdout().lock());
    let invocation = entry.invoke(&PrincipalId::new(caller), &mut responder)?;
    Ok(exit_code(invocation))
}

fn cmd_serve(config_path: &Path) -> Result<i32> {
    let entry = build_entry(config_path, Host::Serve)?;
    let mut responder = JsonlResponder::new(io::stdout().lock());
    info!("serving update requests on stdin");
    let invocations = serve(&entry, request_input()?, &mut responder)?;
    info!(handled = invocations.len(), "input closed");
    Ok(exit_codes::OK)
}

/// Unbuffered handle on stdin, so unread requests survive an exec restart.
#[cfg(unix)]
fn request_input() -> Result<std::fs::File> {
    use std::os::fd::AsFd;

    let fd = io::stdin()
        .as_fd()
        .try_clone_to_owned()
        .context("duplicate stdin")?;
    Ok(std::fs::File::from(fd))
}

#[cfg(not(unix))]
fn request_input() -> Result<io::Stdin> {
    Ok(io::stdin())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Host {
    /// `update`: one invocation, then exit.
    OneShot,
    /// `serve`: long-running request loop.
    Serve,
}

/// Restart mode for the host. Relaunching a one-shot `update` with its own
/// argv would run the update again, so it always exits for the supervisor.
fn restart_mode(host: Host, configured: RestartMode) -> RestartMode {
    match host {
        Host::OneShot => RestartMode::Exit,
        Host::Serve => configured,
    }
}

fn build_entry(config_path: &Path, host: Host) -> Result<HostEntry> {
    let cfg: UpdaterConfig = load_config(config_path)?;
    let runner =
        SystemCommandRunner::new(&cfg.workdir, cfg.command_timeout(), cfg.output_limit_bytes);
    let sink = JsonlNotificationSink::new(&cfg.notify_dir);
    let restarter = ProcessRestarter::from_env(restart_mode(host, cfg.restart.mode))?;
    if restarter.mode() != cfg.restart.mode {
        debug!(configured = ?cfg.restart.mode, "one-shot update exits for its supervisor");
    }
    info!(
        principals = cfg.authorized_principals.len(),
        workdir = %cfg.workdir.display(),
        "loaded updater config"
    );
    let command = UpdateCommand::new(UpdateSettings::from(&cfg), runner, sink, restarter);
    Ok(guarded(cfg.principals(), command))
}

fn exit_code(invocation: Invocation) -> i32 {
    match invocation {
        Invocation::Rejected => exit_codes::UNAUTHORIZED,
        Invocation::Busy => exit_codes::BUSY,
        Invocation::Completed { .. } => exit_codes::OK,
    }
}
