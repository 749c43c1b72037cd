//! Session phases and the run gate.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{ClusterType, ExecutionContext, ExecutionMode, LabConfig};
use crate::models::{Bindings, Diagnostic};

/// Where the session state machine stands.
///
/// ```text
/// Idle ─▶ Editing ─▶ Executing ─┬──────────────────────────▶ Succeeded | Failed ─▶ Editing
///                               └─▶ Submitted ─▶ Polling ──▶ Succeeded | Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Editing,
    Executing,
    Submitted,
    Polling,
    Succeeded,
    Failed,
}

impl Phase {
    /// A run finished and its outcome is on display.
    pub fn is_settled(self) -> bool {
        matches!(self, Phase::Succeeded | Phase::Failed)
    }

    /// A request or a job is outstanding.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Phase::Executing | Phase::Submitted | Phase::Polling)
    }
}

/// How a session executes its script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// One request to the context's endpoint, answered with the result.
    Sync(ExecutionContext),
    /// Submit a job, then poll it.
    Job { mode: ExecutionMode, cluster: ClusterType },
}

impl Backend {
    /// Job backend with the mode and cluster of `config`.
    pub fn job(config: &LabConfig) -> Self {
        Backend::Job { mode: config.mode, cluster: config.cluster }
    }

    /// Context whose binding strategy a case uses on this backend.
    pub fn binding_context(self) -> ExecutionContext {
        match self {
            Backend::Sync(context) => context,
            Backend::Job { cluster, .. } => match cluster {
                ClusterType::Local => ExecutionContext::SparkLocal,
                ClusterType::ClusterStatic => ExecutionContext::SparkStatic,
                ClusterType::ClusterKubernetes => ExecutionContext::SparkKube,
            },
        }
    }
}

/// Why the run action is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisabledReason {
    SyntaxErrors(usize),
    EmptyScript,
    NoBindings,
}

impl fmt::Display for DisabledReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisabledReason::SyntaxErrors(1) => write!(f, "script has 1 syntax error"),
            DisabledReason::SyntaxErrors(n) => write!(f, "script has {} syntax errors", n),
            DisabledReason::EmptyScript => write!(f, "script is empty"),
            DisabledReason::NoBindings => write!(f, "no bindings configured"),
        }
    }
}

/// State of the run action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunGate {
    pub enabled: bool,
    pub reason: Option<DisabledReason>,
}

impl RunGate {
    /// Enabled iff no error diagnostics, a non-empty script and at least one binding.
    pub fn evaluate(diagnostics: &[Diagnostic], script: &str, bindings: &Bindings) -> Self {
        let errors = diagnostics.iter().filter(|d| d.is_error()).count();
        let reason = if errors > 0 {
            Some(DisabledReason::SyntaxErrors(errors))
        } else if script.is_empty() {
            Some(DisabledReason::EmptyScript)
        } else if bindings.is_empty() {
            Some(DisabledReason::NoBindings)
        } else {
            None
        };
        Self { enabled: reason.is_none(), reason }
    }
}
