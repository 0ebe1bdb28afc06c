//! Common test utilities shared across integration tests.

use async_trait::async_trait;
use joblet::{
    DriverError, Job, JobBuilder, JobDriver, JobOutcome, JobState, JobTxn, Permissions, Resource,
    ResourceRef,
};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::sync::oneshot;

static TRACING: Once = Once::new();
static JOB_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Stand-in for the managed resource; the engine treats it as opaque.
pub struct NullResource;

impl Resource for NullResource {
    fn name(&self) -> &str {
        "null"
    }
}

/// Acquire a fresh reference to a null resource with full permissions.
pub fn null_resource() -> ResourceRef {
    ResourceRef::acquire(Arc::new(NullResource), Permissions::ALL)
}

/// Driver that suspends once per iteration and then returns the configured
/// verdict: `Ok` for a zero code, `Io(code)` otherwise.
///
/// Iterations either sleep on a timer (zero delay unless overridden) or
/// yield unconditionally, so they advance only on explicit enters or
/// cancellation wake-ups. Hook invocations are counted so tests can assert
/// on them.
pub struct TestDriver {
    iterations: u32,
    use_timer: bool,
    delay: Duration,
    rc: i32,
    pub drains: AtomicU32,
    pub resumes: AtomicU32,
}

impl TestDriver {
    pub fn new(iterations: u32, use_timer: bool, rc: i32) -> Arc<Self> {
        Arc::new(Self {
            iterations,
            use_timer,
            delay: Duration::ZERO,
            rc,
            drains: AtomicU32::new(0),
            resumes: AtomicU32::new(0),
        })
    }

    /// Timer-driven iterations with a specific delay per iteration.
    pub fn with_delay(iterations: u32, delay: Duration, rc: i32) -> Arc<Self> {
        Arc::new(Self {
            iterations,
            use_timer: true,
            delay,
            rc,
            drains: AtomicU32::new(0),
            resumes: AtomicU32::new(0),
        })
    }

    pub fn drain_count(&self) -> u32 {
        self.drains.load(Ordering::SeqCst)
    }

    pub fn resume_count(&self) -> u32 {
        self.resumes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobDriver for TestDriver {
    fn kind(&self) -> &str {
        "test"
    }

    async fn run(&self, job: Job) -> Result<(), DriverError> {
        for _ in 0..self.iterations {
            if self.use_timer {
                job.sleep(self.delay).await;
            } else {
                job.yield_now().await;
            }
            if job.is_cancelled() {
                break;
            }
        }
        if self.rc == 0 {
            Ok(())
        } else {
            Err(DriverError::Io(self.rc))
        }
    }

    async fn drain(&self, _job: &Job) {
        self.drains.fetch_add(1, Ordering::SeqCst);
    }

    fn on_resume(&self, _job: &Job) {
        self.resumes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Build (but do not start) a test job whose final outcome is delivered on
/// the returned channel by its completion callback.
pub fn test_job(
    driver: Arc<TestDriver>,
    txn: Option<&JobTxn>,
) -> (Job, oneshot::Receiver<JobOutcome>) {
    init_tracing();
    let (tx, rx) = oneshot::channel();
    let id = format!("job{}", JOB_COUNTER.fetch_add(1, Ordering::SeqCst));
    let mut builder = JobBuilder::new(id, driver as Arc<dyn JobDriver>)
        .resource(null_resource())
        .on_complete(move |outcome| {
            let _ = tx.send(outcome);
        });
    if let Some(txn) = txn {
        builder = builder.txn(txn);
    }
    (builder.build().unwrap(), rx)
}

/// Wait for a job to reach an expected state, polling.
///
/// More reliable than fixed sleeps since interleaving can vary. Polls
/// every millisecond and panics if the timeout is reached first.
pub async fn wait_for_state(job: &Job, expected: JobState, timeout: Duration) {
    let start = tokio::time::Instant::now();
    loop {
        if job.state() == expected {
            return;
        }
        if start.elapsed() > timeout {
            panic!(
                "Timeout waiting for job {} to reach {:?}, current state: {:?}",
                job.id(),
                expected,
                job.state()
            );
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}
