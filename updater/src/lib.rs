//! Self-update orchestrator for a chat-bot host.
//!
//! An authorized operator triggers one update run: sync source, install
//! dependencies, classify the sync output, notify, and restart in place when
//! the run pulled real changes. The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (classification, restart
//!   decision, message text). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting adapters (child processes, config, notification
//!   sinks, responders, process restart). Each sits behind a trait so tests can
//!   swap in fakes.
//!
//! Orchestration modules ([`sequencer`], [`update`], [`entry`], [`serve`])
//! coordinate core logic with I/O to implement the privileged entry point.

pub mod core;
pub mod entry;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod sequencer;
pub mod serve;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod update;
