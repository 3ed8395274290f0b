//! Side-effecting adapters: processes, config, notifications, restart.

pub mod config;
pub mod notify;
pub mod process;
pub mod responder;
pub mod restart;
