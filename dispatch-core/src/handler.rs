//! Handler wrapper: uniformizes class-style and callable-style handlers
//! behind one trait, and implements the five-step invocation protocol
//! (spawn, arm timers, await, teardown) described in the design.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::error::DispatchError;
use crate::model::{DataBundle, TaskMessage};
use crate::timer::TimerManager;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A registered `on_execution_timeout`/`on_close` callback for a
/// callable-style handler.
pub type TimeoutCallback = Arc<dyn Fn(String) -> BoxFuture<'static, ()> + Send + Sync>;

/// The shape every handler presents to the dispatcher, regardless of
/// whether it started life as a class or a bare callable.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Run the user's task body.
    async fn handle(
        &self,
        uuid: &str,
        metadata: &TaskMessage,
        data: &DataBundle,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Soft deadline: advisory only, never cancels `handle`.
    fn execution_timeout(&self) -> Option<Duration> {
        None
    }

    /// Hard deadline: cancels `handle` when it fires.
    fn close_timeout(&self) -> Option<Duration> {
        None
    }

    /// Runs when the execution timeout fires. The default emits a
    /// debug log, matching the "still running" fallback in the spec.
    async fn on_execution_timeout(&self, uuid: &str) {
        debug!(uuid, "still running");
    }

    /// Runs when the close timeout fires, immediately before `handle`
    /// is cancelled.
    async fn on_close(&self, _uuid: &str) {}
}

/// Produces a handler instance for a given task. The callable-style
/// registration path builds a factory that ignores its arguments and
/// returns a clone of one shared instance; the class-style path builds
/// a factory that constructs a fresh instance per task from the task's
/// own metadata and data snapshot.
pub type HandlerFactory =
    Arc<dyn Fn(&TaskMessage, &DataBundle) -> Arc<dyn Handler> + Send + Sync>;

/// Adapts a bare async closure into the [`Handler`] shape, carrying the
/// timeout/callback attributes supplied at registration. One instance
/// is shared across every task that matches its binding.
pub struct CallableHandler<F> {
    body: F,
    execution_timeout: Option<Duration>,
    close_timeout: Option<Duration>,
    on_execution_timeout: Option<TimeoutCallback>,
    on_close: Option<TimeoutCallback>,
}

impl<F> CallableHandler<F> {
    pub fn new(
        body: F,
        execution_timeout: Option<Duration>,
        close_timeout: Option<Duration>,
        on_execution_timeout: Option<TimeoutCallback>,
        on_close: Option<TimeoutCallback>,
    ) -> Self {
        Self {
            body,
            execution_timeout,
            close_timeout,
            on_execution_timeout,
            on_close,
        }
    }
}

#[async_trait]
impl<F, Fut> Handler for CallableHandler<F>
where
    F: Fn(String, TaskMessage, DataBundle) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<(), Box<dyn std::error::Error + Send + Sync>>>
        + Send
        + 'static,
{
    async fn handle(
        &self,
        uuid: &str,
        metadata: &TaskMessage,
        data: &DataBundle,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (self.body)(uuid.to_string(), metadata.clone(), data.clone()).await
    }

    fn execution_timeout(&self) -> Option<Duration> {
        self.execution_timeout
    }

    fn close_timeout(&self) -> Option<Duration> {
        self.close_timeout
    }

    async fn on_execution_timeout(&self, uuid: &str) {
        match &self.on_execution_timeout {
            Some(callback) => callback(uuid.to_string()).await,
            None => debug!(uuid, "still running"),
        }
    }

    async fn on_close(&self, uuid: &str) {
        if let Some(callback) = &self.on_close {
            callback(uuid.to_string()).await;
        }
    }
}

/// Run the five-step invocation protocol for one admitted task:
/// spawn the user `handle` as a cancellable task, arm the execution
/// and close timers, and tear both down as soon as the task ends by
/// any means.
pub async fn invoke_handler(
    uuid: String,
    handler: Arc<dyn Handler>,
    metadata: TaskMessage,
    data: DataBundle,
) -> Result<(), DispatchError> {
    let execution_timeout = handler.execution_timeout();
    let close_timeout = handler.close_timeout();

    let task_handle = {
        let handler = handler.clone();
        let uuid = uuid.clone();
        tokio::spawn(async move { handler.handle(&uuid, &metadata, &data).await })
    };
    let abort_handle = task_handle.abort_handle();

    let mut timers = TimerManager::new();

    {
        let handler = handler.clone();
        let uuid = uuid.clone();
        timers.start_timer(execution_timeout, move || async move {
            handler.on_execution_timeout(&uuid).await;
        });
    }
    {
        let handler = handler.clone();
        let uuid = uuid.clone();
        timers.start_timer(close_timeout, move || async move {
            handler.on_close(&uuid).await;
            abort_handle.abort();
        });
    }

    let outcome = task_handle.await;
    // Completion hook: tear down every armed timer now that the task
    // has ended, by whatever means.
    timers.cancel_timers();

    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(source)) => {
            error!(uuid, error = %source, "handler failed");
            Err(DispatchError::HandlerFailure { uuid, source })
        }
        Err(join_err) if join_err.is_cancelled() => Err(DispatchError::Cancelled { uuid }),
        Err(join_err) => Err(DispatchError::HandlerFailure {
            uuid,
            source: Box::new(join_err),
        }),
    }
}
