//! Deterministic, pure logic shared by the update pipeline.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod classifier;
pub mod decision;
pub mod messages;
pub mod types;
