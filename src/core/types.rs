//! Core identifier and lifecycle types for the job engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    /// Create a new JobId from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the underlying string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a job.
///
/// A job moves through these states in one direction only; `Concluded` is
/// terminal and a concluded job never resumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    /// Built but not yet started.
    Created,
    /// The work function is runnable on the event loop.
    Running,
    /// Parked at a pause point until resumed.
    Paused,
    /// Suspended at a yield or timed sleep, waiting for a wake-up.
    Waiting,
    /// Cancellation has been requested; the work function has not yet
    /// observed it and returned.
    Cancelling,
    /// The work function has returned; finalization is pending on the
    /// event loop.
    Concluding,
    /// Finalized: result fixed, resource released, callback fired.
    Concluded,
}

impl JobState {
    /// Whether the job has reached its terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Concluded)
    }

    /// Whether the job's task may still be resumed by the event loop.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            JobState::Running | JobState::Paused | JobState::Waiting | JobState::Cancelling
        )
    }
}

/// Terminal outcome of a job, assigned exactly once at finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobOutcome {
    /// The driver ran to completion without error or cancellation.
    Success,
    /// The driver reported an operational error code.
    Failure(i32),
    /// Cancellation was requested and observed before finalization.
    ///
    /// This overrides whatever the driver itself returned: a job that
    /// finished its work but was cancelled in the same instant is still
    /// reported as cancelled.
    Cancelled,
}

impl JobOutcome {
    /// Whether this outcome is `Success`.
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Success)
    }

    /// Whether this outcome is `Cancelled`.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, JobOutcome::Cancelled)
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobOutcome::Success => write!(f, "success"),
            JobOutcome::Failure(code) => write!(f, "failure (code {})", code),
            JobOutcome::Cancelled => write!(f, "cancelled"),
        }
    }
}
