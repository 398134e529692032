//! # Bounded Task Queue
//!
//! Ordered handoff of (handler, event) pairs from the ingestion path to the
//! worker loop. Capacity is fixed at construction; when the queue is full
//! the producer suspends until space frees up, so a burst of inbound events
//! stalls ingestion instead of exhausting memory or silently dropping
//! events. Items are consumed exactly once, in FIFO order.

use crate::error::{EngineError, EngineResult};
use crate::events::InboundEvent;
use crate::worker::ShutdownSignal;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Cloneable handle to the async handler a task item will run.
pub type TaskHandler =
    Arc<dyn Fn(InboundEvent, ShutdownSignal) -> BoxFuture<'static, EngineResult<()>> + Send + Sync>;

/// One unit of work: which handler to run, for which event.
pub struct TaskItem {
    pub handler: TaskHandler,
    pub event: InboundEvent,
    pub enqueued_at: DateTime<Utc>,
}

/// Producer half; cheap to clone, one per ingestion path.
#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::Sender<TaskItem>,
}

/// Consumer half, owned by the single worker loop.
pub struct TaskReceiver {
    rx: mpsc::Receiver<TaskItem>,
}

/// Create a bounded queue. `capacity` must be at least 1.
pub fn bounded(capacity: usize) -> (TaskQueue, TaskReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (TaskQueue { tx }, TaskReceiver { rx })
}

impl TaskQueue {
    /// Enqueue a task, suspending while the queue is full (backpressure).
    /// Fails only once the consumer half has been dropped.
    pub async fn enqueue(&self, handler: TaskHandler, event: InboundEvent) -> EngineResult<()> {
        let item = TaskItem {
            handler,
            event,
            enqueued_at: Utc::now(),
        };
        self.tx
            .send(item)
            .await
            .map_err(|_| EngineError::QueueClosed)
    }

    /// Non-suspending enqueue for callers that prefer a `QueueFull` signal
    /// over waiting.
    pub fn try_enqueue(&self, handler: TaskHandler, event: InboundEvent) -> EngineResult<()> {
        let item = TaskItem {
            handler,
            event,
            enqueued_at: Utc::now(),
        };
        self.tx.try_send(item).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EngineError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => EngineError::QueueClosed,
        })
    }

    /// Remaining capacity before `enqueue` would suspend.
    pub fn remaining_capacity(&self) -> usize {
        self.tx.capacity()
    }
}

impl TaskReceiver {
    /// Blocking read racing the queue against the shutdown signal. Returns
    /// `None` on shutdown or once all producers are gone; items still
    /// queued at shutdown are discarded.
    pub async fn dequeue(&mut self, shutdown: &ShutdownSignal) -> Option<TaskItem> {
        let mut shutdown = shutdown.clone();
        tokio::select! {
            item = self.rx.recv() => item,
            () = shutdown.cancelled() => None,
        }
    }
}
