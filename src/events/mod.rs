//! Lifecycle events and event handling.
//!
//! This module provides event emission for job lifecycle transitions,
//! enabling observability into the engine without coupling it to any
//! particular reporting surface.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use crate::core::types::{JobId, JobOutcome};

/// Lifecycle events emitted while jobs run.
#[derive(Debug, Clone)]
pub enum Event {
    /// A job's work function has entered the event loop.
    JobStarted { job_id: JobId, timestamp: Instant },

    /// A job has parked at a pause point.
    JobPaused { job_id: JobId, timestamp: Instant },

    /// An externally paused job has been resumed.
    JobResumed { job_id: JobId, timestamp: Instant },

    /// A job has been finalized with its terminal outcome.
    JobConcluded {
        job_id: JobId,
        outcome: JobOutcome,
        timestamp: Instant,
    },
}

impl Event {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> Instant {
        match self {
            Event::JobStarted { timestamp, .. } => *timestamp,
            Event::JobPaused { timestamp, .. } => *timestamp,
            Event::JobResumed { timestamp, .. } => *timestamp,
            Event::JobConcluded { timestamp, .. } => *timestamp,
        }
    }

    /// Create a JobStarted event.
    pub fn job_started(job_id: JobId) -> Self {
        Event::JobStarted {
            job_id,
            timestamp: Instant::now(),
        }
    }

    /// Create a JobPaused event.
    pub fn job_paused(job_id: JobId) -> Self {
        Event::JobPaused {
            job_id,
            timestamp: Instant::now(),
        }
    }

    /// Create a JobResumed event.
    pub fn job_resumed(job_id: JobId) -> Self {
        Event::JobResumed {
            job_id,
            timestamp: Instant::now(),
        }
    }

    /// Create a JobConcluded event.
    pub fn job_concluded(job_id: JobId, outcome: JobOutcome) -> Self {
        Event::JobConcluded {
            job_id,
            outcome,
            timestamp: Instant::now(),
        }
    }
}

/// Handler for receiving lifecycle events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle an event.
    async fn handle(&self, event: &Event);
}

/// Event bus for distributing events to registered handlers.
pub struct EventBus {
    handlers: RwLock<Vec<Arc<dyn EventHandler>>>,
}

impl EventBus {
    /// Create a new event bus with no handlers.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Register an event handler.
    pub async fn register(&self, handler: Arc<dyn EventHandler>) {
        let mut handlers = self.handlers.write().await;
        handlers.push(handler);
    }

    /// Emit an event to all registered handlers.
    pub async fn emit(&self, event: Event) {
        let handlers = self.handlers.read().await;
        for handler in handlers.iter() {
            handler.handle(&event).await;
        }
    }

    /// Get the number of registered handlers.
    pub async fn handler_count(&self) -> usize {
        self.handlers.read().await.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
