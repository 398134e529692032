//! # Worker Loop and Shutdown Signalling
//!
//! A single long-lived consumer drains the task queue, which serializes all
//! transition firing across every session: tasks run strictly in enqueue
//! order and never overlap. The loop's core correctness property is failure
//! isolation: a handler that returns an error (or panics) is logged and
//! the loop moves on to the next item.
//!
//! Shutdown is cooperative: the signal stops the loop between tasks and is
//! threaded into in-flight handlers, which are never forcibly cancelled.

use crate::queue::TaskReceiver;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Sender side of the shutdown signal, owned by the engine host.
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

/// Receiver side, threaded into the worker loop and every handler.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownHandle {
    pub fn new() -> (Self, ShutdownSignal) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, ShutdownSignal { rx })
    }

    /// Request shutdown. Level-triggered: signals obtained before or after
    /// this call both observe it.
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }

    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl ShutdownSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Suspend until shutdown is requested. A dropped handle counts as a
    /// shutdown request.
    pub async fn cancelled(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// The single consumer of the task queue.
pub struct WorkerLoop {
    receiver: TaskReceiver,
    shutdown: ShutdownSignal,
    tasks_started: u64,
}

impl WorkerLoop {
    pub fn new(receiver: TaskReceiver, shutdown: ShutdownSignal) -> Self {
        Self {
            receiver,
            shutdown,
            tasks_started: 0,
        }
    }

    /// Run until shutdown or until every producer handle is dropped.
    pub async fn run(mut self) {
        info!("worker loop running");

        while !self.shutdown.is_cancelled() {
            let Some(item) = self.receiver.dequeue(&self.shutdown).await else {
                break;
            };

            self.tasks_started += 1;
            let task_id = self.tasks_started;
            let kind = item.event.kind();
            let session_key = item.event.session_key().unwrap_or("-").to_owned();
            let queued_ms = (chrono::Utc::now() - item.enqueued_at).num_milliseconds();

            debug!(task_id, kind, queued_ms, "task starting");

            let future = (item.handler)(item.event, self.shutdown.clone());
            match AssertUnwindSafe(future).catch_unwind().await {
                Ok(Ok(())) => debug!(task_id, kind, "task complete"),
                Ok(Err(e)) => {
                    // Isolated: log and keep draining the queue.
                    error!(task_id, kind, session_key = %session_key, error = %e, "task failed");
                }
                Err(_) => {
                    error!(task_id, kind, session_key = %session_key, "task panicked");
                }
            }
        }

        info!(tasks_started = self.tasks_started, "worker loop stopped");
    }
}
