//! joblet: cancellable background jobs with transactional grouping.
//!
//! A [`Job`] is one long-lived, cooperative unit of work run against a
//! managed resource. Jobs can be grouped into a [`JobTxn`]: if any member
//! concludes with a non-success outcome, every other still-running member
//! is cancelled before the concluding job's completion callback returns.
//!
//! The work itself is supplied by a [`JobDriver`]; the engine only owns the
//! lifecycle: start, cooperative suspension, cancellation, deferred
//! completion, and resource release.

pub mod core;
pub mod events;
pub mod scheduler;

pub use core::driver::{DriverError, JobDriver};
pub use core::job::{Job, JobBuilder, JobError};
pub use core::resource::{Permissions, Resource, ResourceRef};
pub use core::txn::JobTxn;
pub use core::types::{JobId, JobOutcome, JobState};
pub use events::{Event, EventBus, EventHandler};
pub use scheduler::{BoxedTask, Scheduler, TokioScheduler};
