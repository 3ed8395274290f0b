//! Deterministic classification of source-sync output.
//!
//! The restart decision hangs entirely off this text match. It is kept in one
//! pure function so a structural signal (exit code, diff count) can replace it
//! without touching the pipeline.

use crate::core::types::{Outcome, UpdateRun};

const NO_CHANGE_PHRASE: &str = "already up to date";
const FAILURE_TOKENS: [&str; 2] = ["error", "conflict"];

/// Classify raw source-sync text into an [`Outcome`].
///
/// Checked in order, case-insensitive:
/// - `NoChange` if the text contains "already up to date".
/// - `Conflict` if it contains "error" or "conflict".
/// - `Success` otherwise, including empty or unrecognized text.
pub fn classify_sync_output(raw_output: &str) -> Outcome {
    let text = raw_output.to_lowercase();
    if text.contains(NO_CHANGE_PHRASE) {
        return Outcome::NoChange;
    }
    if FAILURE_TOKENS.iter().any(|token| text.contains(token)) {
        return Outcome::Conflict;
    }
    Outcome::Success
}

/// Classify a whole run. Only the source-sync step is consulted.
pub fn classify_run(run: &UpdateRun) -> Outcome {
    match run.source_sync() {
        Some(result) => classify_sync_output(&result.raw_output),
        None => Outcome::Unknown,
    }
}
