//! Pipeline lifecycle.

use serde::{Deserialize, Serialize};
use std::fmt;

/// `Idle -> Running -> (Draining | Failed) -> Terminated`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Idle,
    Running,
    /// Input exhausted, flushing the window
    Draining,
    /// A fatal error stopped the run
    Failed,
    Terminated,
}

impl PipelineState {
    /// Whether `next` may follow `self`.
    pub fn can_transition_to(self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Idle, Running)
                | (Running, Draining)
                | (Running, Failed)
                | (Draining, Failed)
                | (Draining, Terminated)
                | (Failed, Terminated)
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Failed => "failed",
            Self::Terminated => "terminated",
        };
        f.write_str(s)
    }
}
