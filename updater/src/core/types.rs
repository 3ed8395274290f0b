//! Shared deterministic types for the update pipeline.
//!
//! These types are plain data: results of external commands are folded into
//! text and flags before they reach this layer, so everything here is free of
//! I/O and stable across runs.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Named step of an update run.
///
/// Ordering follows pipeline order: source sync always precedes dependency
/// install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    SourceSync,
    DependencyInstall,
}

impl StepName {
    /// Every step in execution order.
    pub const ALL: [StepName; 2] = [StepName::SourceSync, StepName::DependencyInstall];

    pub fn as_str(self) -> &'static str {
        match self {
            StepName::SourceSync => "source_sync",
            StepName::DependencyInstall => "dependency_install",
        }
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized output of a single external command.
///
/// `raw_output` is stdout on a zero exit and stderr otherwise; launch
/// failures and timeouts are rendered as `error: ...` text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub raw_output: String,
    pub succeeded: bool,
}

impl CommandResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            raw_output: output.into(),
            succeeded: true,
        }
    }

    pub fn failure(output: impl Into<String>) -> Self {
        Self {
            raw_output: output.into(),
            succeeded: false,
        }
    }
}

/// Result of one named step inside an [`UpdateRun`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    pub step: StepName,
    pub raw_output: String,
    pub succeeded: bool,
}

impl StepResult {
    pub fn new(step: StepName, result: CommandResult) -> Self {
        Self {
            step,
            raw_output: result.raw_output,
            succeeded: result.succeeded,
        }
    }
}

/// Ordered step results of exactly one sequencer invocation.
///
/// Built once by the sequencer and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateRun {
    steps: Vec<StepResult>,
}

impl UpdateRun {
    /// Build a run from results; a later result for the same step replaces
    /// the earlier one.
    pub fn from_results(results: impl IntoIterator<Item = StepResult>) -> Self {
        let mut steps: Vec<StepResult> = Vec::new();
        for result in results {
            if let Some(existing) = steps.iter_mut().find(|s| s.step == result.step) {
                *existing = result;
            } else {
                steps.push(result);
            }
        }
        Self { steps }
    }

    pub fn get(&self, step: StepName) -> Option<&StepResult> {
        self.steps.iter().find(|result| result.step == step)
    }

    pub fn source_sync(&self) -> Option<&StepResult> {
        self.get(StepName::SourceSync)
    }

    pub fn dependency_install(&self) -> Option<&StepResult> {
        self.get(StepName::DependencyInstall)
    }

    pub fn steps(&self) -> &[StepResult] {
        &self.steps
    }
}

/// Classification of an update run, derived only from source-sync text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The working copy was already current.
    NoChange,
    /// Source sync reported an error or merge conflict.
    Conflict,
    /// Something was pulled and no error token appeared.
    Success,
    /// The run carried no source-sync result.
    Unknown,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::NoChange => "no_change",
            Outcome::Conflict => "conflict",
            Outcome::Success => "success",
            Outcome::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque caller identifier supplied by the host.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(String);

impl PrincipalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PrincipalId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Fixed set of principals allowed to trigger an update.
///
/// Loaded once at startup; there is no way to mutate it afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizedPrincipals {
    ids: BTreeSet<PrincipalId>,
}

impl AuthorizedPrincipals {
    pub fn new(ids: impl IntoIterator<Item = PrincipalId>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    pub fn contains(&self, id: &PrincipalId) -> bool {
        self.ids.contains(id)
    }
}

impl<S: Into<String>> FromIterator<S> for AuthorizedPrincipals {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(PrincipalId::new))
    }
}
