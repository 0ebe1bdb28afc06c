//! Job lifecycle: state machine, cooperative suspension, cancellation, and
//! completion dispatch.
//!
//! A job's work function runs as one resumable task on the scheduler
//! binding. It may suspend only at [`Job::sleep`] and [`Job::yield_now`],
//! and it observes cancellation cooperatively at those points. When the
//! work function returns, finalization is deferred to the event loop: a
//! task must never tear itself down while it is the active execution
//! context.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;

use crate::core::driver::{DriverError, JobDriver};
use crate::core::resource::ResourceRef;
use crate::core::txn::JobTxn;
use crate::core::types::{JobId, JobOutcome, JobState};
use crate::events::{Event, EventBus};
use crate::scheduler::{Scheduler, TokioScheduler};

/// API-misuse errors, reported synchronously to the caller.
///
/// These never affect any other job or transaction.
#[derive(Debug, Error)]
pub enum JobError {
    /// The job was already started.
    #[error("job {0} has already been started")]
    AlreadyStarted(JobId),

    /// The job is already attached to a transaction.
    #[error("job {0} is already attached to a transaction")]
    AlreadyInTransaction(JobId),

    /// The job was built without a resource reference.
    #[error("job {0} was built without a resource reference")]
    MissingResource(JobId),
}

type CompletionFn = Box<dyn FnOnce(JobOutcome) + Send>;

pub(crate) struct JobInner {
    id: JobId,
    driver: Arc<dyn JobDriver>,
    scheduler: Arc<dyn Scheduler>,
    events: Option<Arc<EventBus>>,
    state: Mutex<JobState>,
    started: AtomicBool,
    cancel_requested: AtomicBool,
    force_cancel: AtomicBool,
    pause_requested: AtomicBool,
    result: Mutex<Option<JobOutcome>>,
    resource: Mutex<Option<ResourceRef>>,
    txn: Mutex<Option<JobTxn>>,
    callback: Mutex<Option<CompletionFn>>,
    wake: Notify,
}

/// One cancellable, resumable unit of background work.
///
/// `Job` is a cheap handle; clones refer to the same underlying job. The
/// handle passed to the driver's work function is the same type, so the
/// driver can query cancellation and suspend through it.
#[derive(Clone)]
pub struct Job {
    inner: Arc<JobInner>,
}

/// Builder for a [`Job`].
///
/// A resource reference is required; a transaction, completion callback,
/// scheduler binding, and event bus are optional. The scheduler defaults
/// to [`TokioScheduler`].
pub struct JobBuilder {
    id: JobId,
    driver: Arc<dyn JobDriver>,
    resource: Option<ResourceRef>,
    txn: Option<JobTxn>,
    callback: Option<CompletionFn>,
    scheduler: Arc<dyn Scheduler>,
    events: Option<Arc<EventBus>>,
}

impl JobBuilder {
    /// Start building a job of the given driver kind.
    pub fn new(id: impl Into<JobId>, driver: Arc<dyn JobDriver>) -> Self {
        Self {
            id: id.into(),
            driver,
            resource: None,
            txn: None,
            callback: None,
            scheduler: Arc::new(TokioScheduler),
            events: None,
        }
    }

    /// The resource reference this job owns. Required.
    pub fn resource(mut self, resource: ResourceRef) -> Self {
        self.resource = Some(resource);
        self
    }

    /// Attach the job to a transaction at creation.
    pub fn txn(mut self, txn: &JobTxn) -> Self {
        self.txn = Some(txn.clone());
        self
    }

    /// One-shot callback invoked with the final outcome, after the
    /// resource reference has been released.
    pub fn on_complete(mut self, callback: impl FnOnce(JobOutcome) + Send + 'static) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Use a custom scheduler binding instead of [`TokioScheduler`].
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Emit lifecycle events on the given bus.
    pub fn events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Build the job and, if requested, attach it to its transaction.
    pub fn build(self) -> Result<Job, JobError> {
        let resource = self
            .resource
            .ok_or_else(|| JobError::MissingResource(self.id.clone()))?;

        let job = Job {
            inner: Arc::new(JobInner {
                id: self.id,
                driver: self.driver,
                scheduler: self.scheduler,
                events: self.events,
                state: Mutex::new(JobState::Created),
                started: AtomicBool::new(false),
                cancel_requested: AtomicBool::new(false),
                force_cancel: AtomicBool::new(false),
                pause_requested: AtomicBool::new(false),
                result: Mutex::new(None),
                resource: Mutex::new(Some(resource)),
                txn: Mutex::new(None),
                callback: Mutex::new(self.callback),
                wake: Notify::new(),
            }),
        };

        if let Some(txn) = self.txn {
            txn.add(&job)?;
        }

        Ok(job)
    }
}

impl Job {
    /// The job's identifier.
    pub fn id(&self) -> &JobId {
        &self.inner.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> JobState {
        *self.inner.state.lock().unwrap()
    }

    /// Whether cancellation has been requested. Pure query, never blocks.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel_requested.load(Ordering::SeqCst)
    }

    /// Whether the cancel request permitted aborting work that is unsafe
    /// to interrupt. Advisory; queried by drivers only.
    pub fn force_cancel_requested(&self) -> bool {
        self.inner.force_cancel.load(Ordering::SeqCst)
    }

    /// Start the job: schedules the driver's work function as a resumable
    /// task on the event loop.
    pub fn start(&self) -> Result<(), JobError> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Err(JobError::AlreadyStarted(self.inner.id.clone()));
        }
        {
            let mut state = self.inner.state.lock().unwrap();
            *state = if self.is_cancelled() {
                JobState::Cancelling
            } else {
                JobState::Running
            };
        }
        tracing::debug!(
            job_id = %self.inner.id,
            kind = self.inner.driver.kind(),
            "job started"
        );
        let job = self.clone();
        self.inner
            .scheduler
            .spawn(Box::pin(async move { job.run_to_conclusion().await }));
        Ok(())
    }

    /// Kick a suspended job.
    ///
    /// Redundant kicks coalesce: the wake-up slot holds at most one
    /// pending permit, so two back-to-back enters resume the task once. A
    /// kick delivered to a job that has already concluded is ignored,
    /// which tolerates wake-ups still queued after a sibling's completion
    /// cancelled this job.
    pub fn enter(&self) {
        if self.state() == JobState::Concluded {
            return;
        }
        self.inner.wake.notify_one();
    }

    /// Request cancellation.
    ///
    /// Sets the flag unconditionally (idempotent if already set) and wakes
    /// a waiting task so it observes the flag promptly. Advisory: a
    /// running task sees it only at its next suspension check. No-op on a
    /// concluded job. `force` is recorded for the driver to query and has
    /// no further effect inside the engine.
    pub fn cancel(&self, force: bool) {
        {
            // The result mutex decides the race against finalization: a
            // fixed result means the outcome has already been resolved and
            // a flag set now could no longer be observed.
            let result = self.inner.result.lock().unwrap();
            if result.is_some() {
                return;
            }
            if force {
                self.inner.force_cancel.store(true, Ordering::SeqCst);
            }
            let already = self.inner.cancel_requested.swap(true, Ordering::SeqCst);
            if !already {
                let mut state = self.inner.state.lock().unwrap();
                if state.is_active() {
                    *state = JobState::Cancelling;
                }
                tracing::debug!(job_id = %self.inner.id, force, "cancellation requested");
            }
        }
        self.inner.wake.notify_one();
    }

    /// Request an external pause. Takes effect at the job's next
    /// suspension point; idempotent, no-op once concluded.
    pub fn pause(&self) {
        if self.state() == JobState::Concluded {
            return;
        }
        self.inner.pause_requested.store(true, Ordering::SeqCst);
        self.inner.wake.notify_one();
    }

    /// Resume an externally paused job: clears the pause request, invokes
    /// the driver's `on_resume` hook, and wakes the task. No-op if the job
    /// was not paused or has concluded.
    pub fn resume(&self) {
        if self.state() == JobState::Concluded {
            return;
        }
        if !self.inner.pause_requested.swap(false, Ordering::SeqCst) {
            return;
        }
        self.inner.driver.on_resume(self);
        self.inner.wake.notify_one();
    }

    /// Push the job toward quiescence without cancelling it: invokes the
    /// driver's `drain` hook, then kicks the task.
    pub async fn drain(&self) {
        if self.state() == JobState::Concluded {
            return;
        }
        let driver = Arc::clone(&self.inner.driver);
        driver.drain(self).await;
        self.enter();
    }

    /// Timed sleep; a suspension point of the work function.
    ///
    /// A zero delay yields to the event loop and resumes on its next pass.
    /// An `enter` or `cancel` wakes the sleep early.
    pub async fn sleep(&self, delay: Duration) {
        self.suspend(Some(delay)).await;
    }

    /// Unconditional yield; a suspension point of the work function,
    /// resumed only by an explicit [`Job::enter`] (or a cancellation
    /// wake-up).
    pub async fn yield_now(&self) {
        self.suspend(None).await;
    }

    async fn suspend(&self, delay: Option<Duration>) {
        self.begin_wait();
        match delay {
            Some(delay) => {
                let timer = self.inner.scheduler.timer(delay);
                tokio::select! {
                    _ = timer => {}
                    _ = self.inner.wake.notified() => {}
                }
            }
            None => self.inner.wake.notified().await,
        }
        self.pause_point().await;
        self.end_wait();
    }

    /// Park while an external pause is requested and cancellation is not.
    async fn pause_point(&self) {
        if !self.inner.pause_requested.load(Ordering::SeqCst) || self.is_cancelled() {
            return;
        }
        {
            let mut state = self.inner.state.lock().unwrap();
            if *state == JobState::Waiting {
                *state = JobState::Paused;
            }
        }
        tracing::debug!(job_id = %self.inner.id, "job paused");
        if let Some(bus) = &self.inner.events {
            bus.emit(Event::job_paused(self.inner.id.clone())).await;
        }
        while self.inner.pause_requested.load(Ordering::SeqCst) && !self.is_cancelled() {
            self.inner.wake.notified().await;
        }
        if !self.is_cancelled() {
            tracing::debug!(job_id = %self.inner.id, "job resumed");
            if let Some(bus) = &self.inner.events {
                bus.emit(Event::job_resumed(self.inner.id.clone())).await;
            }
        }
    }

    fn begin_wait(&self) {
        let mut state = self.inner.state.lock().unwrap();
        if *state == JobState::Running {
            *state = JobState::Waiting;
        }
    }

    fn end_wait(&self) {
        let mut state = self.inner.state.lock().unwrap();
        if matches!(*state, JobState::Waiting | JobState::Paused) {
            *state = JobState::Running;
        }
    }

    /// Task body: run the work function, then defer finalization off this
    /// task's execution context.
    async fn run_to_conclusion(self) {
        if let Some(bus) = &self.inner.events {
            bus.emit(Event::job_started(self.inner.id.clone())).await;
        }
        let driver = Arc::clone(&self.inner.driver);
        let verdict = driver.run(self.clone()).await;
        *self.inner.state.lock().unwrap() = JobState::Concluding;
        tracing::trace!(job_id = %self.inner.id, "work function returned, deferring finalization");
        let job = self.clone();
        self.inner
            .scheduler
            .defer(Box::pin(async move { job.finalize(verdict).await }));
    }

    /// Completion dispatch. Runs outside any job task context.
    async fn finalize(&self, verdict: Result<(), DriverError>) {
        // Cancellation observed at finalization overrides the driver's
        // verdict, including for jobs that finished their work in the same
        // instant. Resolving the outcome and storing it happen under the
        // result mutex, so a concurrent `cancel` either set the flag
        // before this critical section (and is honored here) or observes
        // the fixed result and is a no-op.
        let outcome = {
            let mut result = self.inner.result.lock().unwrap();
            if result.is_some() {
                // Double finalization is a scheduler or caller bug.
                debug_assert!(false, "job finalized twice");
                tracing::error!(job_id = %self.inner.id, "duplicate finalization ignored");
                return;
            }
            let outcome = if self.is_cancelled() {
                JobOutcome::Cancelled
            } else {
                match verdict {
                    Ok(()) => JobOutcome::Success,
                    Err(err) => JobOutcome::Failure(err.code()),
                }
            };
            *result = Some(outcome);
            outcome
        };
        *self.inner.state.lock().unwrap() = JobState::Concluded;
        tracing::debug!(job_id = %self.inner.id, %outcome, "job concluded");

        if let Some(resource) = self.inner.resource.lock().unwrap().take() {
            resource.release();
        }

        // Leaving the transaction with a non-success outcome cancels every
        // member that has not yet concluded, before our own callback runs.
        let txn = self.inner.txn.lock().unwrap().take();
        if let Some(txn) = txn {
            txn.conclude_member(self, outcome);
        }

        let callback = self.inner.callback.lock().unwrap().take();
        if let Some(callback) = callback {
            callback(outcome);
        }

        if let Some(bus) = &self.inner.events {
            bus.emit(Event::job_concluded(self.inner.id.clone(), outcome))
                .await;
        }
        self.inner.driver.free();
    }

    /// Final outcome, if the job has concluded.
    pub fn outcome(&self) -> Option<JobOutcome> {
        *self.inner.result.lock().unwrap()
    }

    pub(crate) fn member_ref(&self) -> Weak<JobInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn from_member_ref(member: &Weak<JobInner>) -> Option<Job> {
        member.upgrade().map(|inner| Job { inner })
    }

    /// Record transaction membership. Fails once started or if already
    /// attached; membership is fixed before start.
    pub(crate) fn attach(&self, txn: JobTxn) -> Result<(), JobError> {
        if self.inner.started.load(Ordering::SeqCst) {
            return Err(JobError::AlreadyStarted(self.inner.id.clone()));
        }
        let mut slot = self.inner.txn.lock().unwrap();
        if slot.is_some() {
            return Err(JobError::AlreadyInTransaction(self.inner.id.clone()));
        }
        *slot = Some(txn);
        Ok(())
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("cancel_requested", &self.is_cancelled())
            .finish()
    }
}
