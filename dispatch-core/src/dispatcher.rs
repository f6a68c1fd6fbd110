//! The dispatcher: composes the root router, the two middleware
//! chains, the bounded pool, and the stream-data bundle behind one
//! ingress, `listen`.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info_span, warn, Instrument};

use crate::error::DispatchError;
use crate::middleware::{MiddlewareManager, Terminal};
use crate::model::{Command, DataBundle, Metadata, ServiceMessage, TaskMessage, TaskStatus};
use crate::pool::TaskPool;
use crate::router::Router;

/// Root of the dispatch engine. Configure the router and middleware
/// chains via `router_mut`/`outer_mut`/`inner_mut` before wrapping in
/// an `Arc` and driving it with `listen`.
pub struct Dispatcher {
    root: Router,
    outer: MiddlewareManager,
    inner: MiddlewareManager,
    pool: TaskPool,
    stream_data: Mutex<DataBundle>,
}

impl Dispatcher {
    /// `max_pool_size` must be supplied explicitly; `0` means
    /// unbounded (§10.3 — this is the dispatcher's only construction
    /// time configuration).
    pub fn new(max_pool_size: usize) -> Self {
        Self {
            root: Router::new(),
            outer: MiddlewareManager::new(),
            inner: MiddlewareManager::new(),
            pool: TaskPool::new(max_pool_size),
            stream_data: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn router_mut(&mut self) -> &mut Router {
        &mut self.root
    }

    pub fn outer_middleware_mut(&mut self) -> &mut MiddlewareManager {
        &mut self.outer
    }

    pub fn inner_middleware_mut(&mut self) -> &mut MiddlewareManager {
        &mut self.inner
    }

    /// Indexed assignment into the stream-data bundle (§6). Every task
    /// snapshots this bundle at admission time; later writes never
    /// leak into tasks already in flight.
    pub async fn set_stream_data(&self, key: impl Into<String>, value: Value) {
        self.stream_data.lock().await.insert(key.into(), value);
    }

    pub async fn pool_full(&self) -> bool {
        self.pool.full().await
    }

    pub async fn pool_len(&self) -> usize {
        self.pool.len().await
    }

    /// The pool's view of `uuid`: `RUNNING` iff a pipeline is currently
    /// admitted under that identifier, else `UNKNOWN`. This is what a
    /// `GET_STATUS` service message reports.
    pub async fn pool_status(&self, uuid: &str) -> TaskStatus {
        self.pool.status(uuid).await
    }

    /// Single ingress. Service messages are processed detached and
    /// never occupy pool capacity; task messages are admitted to the
    /// pool and run through the full pipeline.
    pub async fn listen(self: &Arc<Self>, metadata: Metadata) {
        match metadata {
            Metadata::Service(service) => {
                let this = self.clone();
                tokio::spawn(async move { this.service_processing(service).await });
            }
            Metadata::Task(task) => {
                let uuid = task.uuid.clone();
                let (admitted_tx, admitted_rx) = tokio::sync::oneshot::channel();

                let this = self.clone();
                let pipeline = tokio::spawn(
                    async move {
                        // Wait for the pool insertion below before running any
                        // user code, so a concurrent GET_STATUS can never
                        // observe this uuid as UNKNOWN while it is in fact
                        // running.
                        let _ = admitted_rx.await;
                        this.task_pipeline(task).await
                    }
                    .instrument(info_span!("task", uuid = %uuid)),
                );

                self.pool.insert(uuid.clone(), pipeline.abort_handle()).await;
                let _ = admitted_tx.send(());

                let this = self.clone();
                tokio::spawn(async move {
                    let _ = pipeline.await;
                    this.pool.remove(&uuid).await;
                });
            }
        }
    }

    async fn task_pipeline(self: Arc<Self>, metadata: TaskMessage) {
        let data = self.stream_data.lock().await.clone();

        let this = self.clone();
        let terminal: Terminal = Arc::new(move |metadata, data| {
            let this = this.clone();
            Box::pin(async move { this.message_pipeline(metadata, data).await })
        });

        if let Err(err) = self.outer.run(Metadata::Task(metadata), data, terminal).await
            && !matches!(err, DispatchError::Cancelled { .. })
        {
            warn!(error = %err, "task pipeline failed");
        }
    }

    async fn message_pipeline(
        self: Arc<Self>,
        metadata: Metadata,
        data: DataBundle,
    ) -> Result<(), DispatchError> {
        let factory = self.root.find_handler(&metadata, &data).await?;

        let terminal: Terminal = Arc::new(move |metadata, data| {
            let factory = factory.clone();
            Box::pin(async move {
                let task = metadata
                    .as_task()
                    .expect("message_pipeline only runs for task messages")
                    .clone();
                let handler = factory(&task, &data);
                crate::handler::invoke_handler(task.uuid.clone(), handler, task, data).await
            })
        });

        self.inner.run(metadata, data, terminal).await
    }

    /// `GET_STATUS` reports the pool's view of `uuid` (logged at debug
    /// level; this crate does not mandate a reply channel back to the
    /// broker). `CLOSING` cancels the running task if present, else
    /// warns and continues (§9 open question (a)).
    async fn service_processing(self: Arc<Self>, service: ServiceMessage) {
        match service.command {
            Command::GetStatus => {
                let status = self.pool.status(&service.uuid).await;
                debug!(uuid = %service.uuid, status = ?status_label(status), "status report");
            }
            Command::Closing => {
                if !self.pool.cancel(&service.uuid).await {
                    warn!(uuid = %service.uuid, "CLOSING for unknown uuid");
                }
            }
        }
    }
}

fn status_label(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Running => "RUNNING",
        TaskStatus::Unknown => "UNKNOWN",
    }
}
