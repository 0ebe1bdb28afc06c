//! Binding to the host event loop.
//!
//! The engine drives jobs through this narrow interface: run a resumable
//! task, run a deferred callback outside any task context, and build timer
//! futures for timed sleeps. The default binding runs on tokio; tests and
//! embedders can supply their own.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// A boxed resumable task or deferred callback.
pub type BoxedTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Abstraction over a cooperative event loop.
pub trait Scheduler: Send + Sync {
    /// Run `task` as a resumable task on the event loop.
    fn spawn(&self, task: BoxedTask);

    /// Run `callback` later, outside the execution context that scheduled
    /// it. Completion dispatch relies on this: a job task must never
    /// finalize itself while it is the active context.
    fn defer(&self, callback: BoxedTask);

    /// A future that completes after `delay`. A zero delay completes on
    /// the event loop's next pass, not immediately, so a zero-delay sleep
    /// still yields.
    fn timer(&self, delay: Duration) -> BoxedTask;
}

/// Scheduler binding backed by the ambient tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn spawn(&self, task: BoxedTask) {
        tokio::spawn(task);
    }

    fn defer(&self, callback: BoxedTask) {
        // A freshly spawned task is always polled outside the spawning
        // task's context.
        tokio::spawn(callback);
    }

    fn timer(&self, delay: Duration) -> BoxedTask {
        if delay.is_zero() {
            Box::pin(tokio::task::yield_now())
        } else {
            Box::pin(tokio::time::sleep(delay))
        }
    }
}
