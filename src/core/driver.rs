//! Job driver trait and operational error type.
//!
//! A `JobDriver` is the capability set a concrete job kind supplies: the
//! work function plus a few optional hooks. The engine never inspects
//! driver-specific state; it only calls through this interface.

use async_trait::async_trait;
use thiserror::Error;

use super::job::Job;

/// Operational errors a driver's work function can report.
///
/// These become the job's `Failure(code)` outcome; they are distinct from
/// API-misuse errors, which are reported synchronously as
/// [`JobError`](super::job::JobError).
#[derive(Debug, Error)]
pub enum DriverError {
    /// I/O error against the underlying resource.
    #[error("I/O error (code {0})")]
    Io(i32),

    /// Work failed with a message.
    #[error("work failed: {0}")]
    Failed(String),

    /// Generic error wrapper.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl DriverError {
    /// The numeric code carried into the job's `Failure` outcome.
    pub fn code(&self) -> i32 {
        match self {
            DriverError::Io(code) => *code,
            DriverError::Failed(_) | DriverError::Other(_) => 1,
        }
    }
}

/// The capability interface a concrete job kind implements.
///
/// # Example
///
/// ```ignore
/// use joblet::{DriverError, Job, JobDriver};
/// use async_trait::async_trait;
/// use std::time::Duration;
///
/// struct CopyDriver {
///     chunks: u32,
/// }
///
/// #[async_trait]
/// impl JobDriver for CopyDriver {
///     fn kind(&self) -> &str {
///         "copy"
///     }
///
///     async fn run(&self, job: Job) -> Result<(), DriverError> {
///         for _ in 0..self.chunks {
///             // ... copy one chunk ...
///             job.sleep(Duration::ZERO).await;
///             if job.is_cancelled() {
///                 break;
///             }
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait JobDriver: Send + Sync {
    /// Short name of the job kind, for logging.
    fn kind(&self) -> &str;

    /// The work function, run as the job's resumable task.
    ///
    /// The body must suspend only via [`Job::sleep`] or [`Job::yield_now`]
    /// and must check [`Job::is_cancelled`] at those suspension points,
    /// unwinding early when it is set. On return the engine hands the
    /// verdict to completion dispatch; the driver never finalizes the job
    /// itself.
    async fn run(&self, job: Job) -> Result<(), DriverError>;

    /// Called when the host wants the job quiescent without cancelling it,
    /// e.g. at shutdown. Default: nothing.
    async fn drain(&self, _job: &Job) {}

    /// Called when an externally paused job is resumed, so the driver can
    /// restore its invariants. Default: nothing.
    fn on_resume(&self, _job: &Job) {}

    /// Release driver-specific state after the job has concluded.
    /// Default: nothing.
    fn free(&self) {}
}
