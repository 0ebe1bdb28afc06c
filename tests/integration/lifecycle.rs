//! Lifecycle details: wake-up coalescing, resource release ordering,
//! callback exactly-once, pause/resume, drain, and event emission.

use crate::common::{null_resource, test_job, wait_for_state, NullResource, TestDriver};
use async_trait::async_trait;
use joblet::{
    Event, EventBus, EventHandler, JobBuilder, JobDriver, JobOutcome, JobState, Permissions,
    Resource, ResourceRef,
};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Poll a condition until it holds, panicking after the timeout.
async fn wait_until(mut cond: impl FnMut() -> bool, timeout: Duration) {
    let start = tokio::time::Instant::now();
    while !cond() {
        if start.elapsed() > timeout {
            panic!("Timeout waiting for condition");
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

#[tokio::test]
async fn test_double_enter_does_not_double_resume() {
    // One iteration on a long timer: only the enter can wake it promptly.
    let (job, rx) = test_job(TestDriver::with_delay(1, Duration::from_secs(60), 0), None);
    job.start().unwrap();
    wait_for_state(&job, JobState::Waiting, Duration::from_secs(1)).await;

    job.enter();
    job.enter();

    // Result matches the single-enter case; the redundant kick coalesced.
    assert_eq!(rx.await.unwrap(), JobOutcome::Success);
    assert_eq!(job.state(), JobState::Concluded);
}

#[tokio::test]
async fn test_resource_released_before_callback() {
    let handle = Arc::new(NullResource);
    let observer = Arc::downgrade(&handle);
    let resource = ResourceRef::acquire(handle.clone() as Arc<dyn Resource>, Permissions::WRITE);

    let callback_ran = Arc::new(AtomicBool::new(false));
    let seen = callback_ran.clone();
    let job = JobBuilder::new(
        "releasing",
        TestDriver::new(1, true, 0) as Arc<dyn JobDriver>,
    )
    .resource(resource)
    .on_complete(move |outcome| {
        assert_eq!(outcome, JobOutcome::Success);
        // Only the test's own handle remains: the job's reference was
        // released before this callback ran.
        assert_eq!(observer.strong_count(), 1);
        seen.store(true, Ordering::SeqCst);
    })
    .build()
    .unwrap();
    job.start().unwrap();

    wait_until(|| callback_ran.load(Ordering::SeqCst), Duration::from_secs(1)).await;
    assert_eq!(Arc::strong_count(&handle), 1);
}

#[tokio::test]
async fn test_callback_fires_exactly_once() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let job = JobBuilder::new("once", TestDriver::new(1, true, 0) as Arc<dyn JobDriver>)
        .resource(null_resource())
        .on_complete(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .unwrap();
    job.start().unwrap();

    wait_until(|| calls.load(Ordering::SeqCst) > 0, Duration::from_secs(1)).await;

    // Stray wake-ups after conclusion must not re-run finalization.
    job.enter();
    job.cancel(false);
    tokio::task::yield_now().await;
    tokio::task::yield_now().await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(job.outcome(), Some(JobOutcome::Success));
}

#[tokio::test]
async fn test_pause_parks_and_resume_restores() {
    let driver = TestDriver::new(3, true, 0);
    let (job, rx) = test_job(driver.clone(), None);
    job.pause();
    job.start().unwrap();

    wait_for_state(&job, JobState::Paused, Duration::from_secs(1)).await;
    assert_eq!(driver.resume_count(), 0);

    job.resume();

    assert_eq!(rx.await.unwrap(), JobOutcome::Success);
    assert_eq!(driver.resume_count(), 1);
}

#[tokio::test]
async fn test_resume_without_pause_is_a_noop() {
    let driver = TestDriver::new(1, true, 0);
    let (job, rx) = test_job(driver.clone(), None);
    job.start().unwrap();
    job.resume();

    assert_eq!(rx.await.unwrap(), JobOutcome::Success);
    assert_eq!(driver.resume_count(), 0);
}

#[tokio::test]
async fn test_cancel_wakes_a_paused_job() {
    let driver = TestDriver::new(3, true, 0);
    let (job, rx) = test_job(driver.clone(), None);
    job.pause();
    job.start().unwrap();
    wait_for_state(&job, JobState::Paused, Duration::from_secs(1)).await;

    job.cancel(false);

    assert_eq!(rx.await.unwrap(), JobOutcome::Cancelled);
}

#[tokio::test]
async fn test_drain_invokes_hook_and_kicks_the_job() {
    let driver = TestDriver::new(1, false, 0);
    let (job, rx) = test_job(driver.clone(), None);
    job.start().unwrap();
    wait_for_state(&job, JobState::Waiting, Duration::from_secs(1)).await;

    job.drain().await;

    assert_eq!(rx.await.unwrap(), JobOutcome::Success);
    assert_eq!(driver.drain_count(), 1);
}

/// Records lifecycle events for assertions.
struct RecordingHandler {
    events: Mutex<Vec<Event>>,
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn handle(&self, event: &Event) {
        self.events.lock().await.push(event.clone());
    }
}

#[tokio::test]
async fn test_lifecycle_events_are_emitted() {
    let bus = Arc::new(EventBus::new());
    let handler = Arc::new(RecordingHandler {
        events: Mutex::new(Vec::new()),
    });
    bus.register(handler.clone()).await;

    let done = Arc::new(AtomicBool::new(false));
    let seen = done.clone();
    let job = JobBuilder::new("observed", TestDriver::new(1, true, 5) as Arc<dyn JobDriver>)
        .resource(null_resource())
        .events(bus)
        .on_complete(move |_| {
            seen.store(true, Ordering::SeqCst);
        })
        .build()
        .unwrap();
    job.start().unwrap();

    wait_until(|| done.load(Ordering::SeqCst), Duration::from_secs(1)).await;
    // The concluded event is emitted after the callback; give the deferred
    // finalization task a chance to finish.
    tokio::task::yield_now().await;

    let events = handler.events.lock().await;
    assert!(matches!(events.first(), Some(Event::JobStarted { .. })));
    match events.last() {
        Some(Event::JobConcluded { outcome, .. }) => {
            assert_eq!(*outcome, JobOutcome::Failure(5));
        }
        other => panic!("Expected JobConcluded last, got {:?}", other),
    }
}
