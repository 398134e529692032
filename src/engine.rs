//! # Session Engine
//!
//! Composition root tying the pipeline together: ingestion enqueues events
//! into the bounded task queue, the single worker loop drains it, and every
//! dequeued event runs through the session manager. Collaborators (session
//! store, workflow) are injected at construction; nothing registers itself
//! globally, and the host owns the start/stop lifecycle.

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::events::InboundEvent;
use crate::queue::{bounded, TaskHandler, TaskQueue, TaskReceiver};
use crate::session::SessionManager;
use crate::state_machine::TransitionTable;
use crate::store::SessionStore;
use crate::worker::{ShutdownHandle, WorkerLoop};
use crate::workflow::Workflow;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub struct SessionEngine {
    queue: TaskQueue,
    handler: TaskHandler,
    shutdown: ShutdownHandle,
    receiver: Mutex<Option<TaskReceiver>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SessionEngine {
    /// Build an engine around the standard conversation table.
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn SessionStore>,
        workflow: Arc<dyn Workflow>,
    ) -> Self {
        Self::with_table(config, store, workflow, TransitionTable::conversation())
    }

    /// Build an engine around a caller-supplied (already validated) table.
    pub fn with_table(
        config: EngineConfig,
        store: Arc<dyn SessionStore>,
        workflow: Arc<dyn Workflow>,
        table: TransitionTable,
    ) -> Self {
        let manager = Arc::new(SessionManager::new(
            store,
            workflow,
            Arc::new(table),
            config.command_prefix,
            config.session_namespace.clone(),
        ));
        let (queue, receiver) = bounded(config.queue_capacity);
        let (shutdown, _signal) = ShutdownHandle::new();

        let handler: TaskHandler = Arc::new(move |event, signal| {
            let manager = manager.clone();
            Box::pin(async move { manager.process(event, signal).await })
        });

        Self {
            queue,
            handler,
            shutdown,
            receiver: Mutex::new(Some(receiver)),
            worker: Mutex::new(None),
        }
    }

    /// Spawn the worker loop. Idempotent; the second and later calls are
    /// no-ops.
    pub fn start(&self) {
        let Some(receiver) = self.receiver.lock().take() else {
            warn!("engine already started");
            return;
        };
        let worker = WorkerLoop::new(receiver, self.shutdown.signal());
        *self.worker.lock() = Some(tokio::spawn(worker.run()));
        info!("session engine started");
    }

    /// Hand an inbound event to the pipeline. Suspends while the queue is
    /// full; fails only after `stop`.
    pub async fn ingest(&self, event: InboundEvent) -> EngineResult<()> {
        self.queue.enqueue(self.handler.clone(), event).await
    }

    /// Non-suspending variant of [`ingest`](Self::ingest).
    pub fn try_ingest(&self, event: InboundEvent) -> EngineResult<()> {
        self.queue.try_enqueue(self.handler.clone(), event)
    }

    /// Signal shutdown and wait for the worker to finish its in-flight
    /// task. Events still queued are discarded.
    pub async fn stop(&self) -> EngineResult<()> {
        self.shutdown.shutdown();
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            worker
                .await
                .map_err(|e| EngineError::internal(format!("worker join failed: {e}")))?;
        }
        info!("session engine stopped");
        Ok(())
    }
}
