//! Ordered, filter-gated interceptor chains. Two independent managers
//! are used by the dispatcher: one running before route lookup, one
//! running after it but before the handler call.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::DispatchError;
use crate::filter::FilterSet;
use crate::model::{DataBundle, Metadata};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The continuation a middleware must invoke to keep the chain moving.
/// Not calling it short-circuits everything after this middleware.
pub type Next =
    Box<dyn FnOnce(Metadata, DataBundle) -> BoxFuture<'static, Result<(), DispatchError>> + Send>;

/// The call terminating a chain: route lookup for the outer manager,
/// the handler invocation for the inner one.
pub type Terminal = Arc<
    dyn Fn(Metadata, DataBundle) -> BoxFuture<'static, Result<(), DispatchError>> + Send + Sync,
>;

/// One interceptor in a chain. May inspect or mutate `data` and must
/// call `next` to continue; the result of the last invoked middleware
/// (or the terminal) is the chain's result.
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    async fn call(
        &self,
        metadata: Metadata,
        data: DataBundle,
        next: Next,
    ) -> Result<(), DispatchError>;
}

#[derive(Clone)]
struct Chain {
    entries: Arc<Vec<(Arc<dyn Middleware>, FilterSet)>>,
    index: usize,
    terminal: Terminal,
}

impl Chain {
    fn invoke(self, metadata: Metadata, data: DataBundle) -> BoxFuture<'static, Result<(), DispatchError>> {
        Box::pin(async move {
            let Some((middleware, filters)) = self.entries.get(self.index).cloned() else {
                return (self.terminal)(metadata, data).await;
            };

            let rest = Chain {
                entries: self.entries.clone(),
                index: self.index + 1,
                terminal: self.terminal.clone(),
            };

            if filters.matches(&metadata, &data).await {
                let next: Next = Box::new(move |m, d| rest.invoke(m, d));
                middleware.call(metadata, data, next).await
            } else {
                rest.invoke(metadata, data).await
            }
        })
    }
}

/// An ordered, filter-gated chain. First registered is outermost.
#[derive(Default)]
pub struct MiddlewareManager {
    entries: Vec<(Arc<dyn Middleware>, FilterSet)>,
}

impl MiddlewareManager {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register a middleware gated by `filters`. Registration order is
    /// chain order: the first middleware registered runs outermost.
    pub fn add(&mut self, middleware: Arc<dyn Middleware>, filters: FilterSet) {
        self.entries.push((middleware, filters));
    }

    /// Run every matching middleware in registration order, terminating
    /// in `terminal`. A middleware whose filters don't match this
    /// metadata is skipped as though it had never been registered.
    pub async fn run(
        &self,
        metadata: Metadata,
        data: DataBundle,
        terminal: Terminal,
    ) -> Result<(), DispatchError> {
        let chain = Chain {
            entries: Arc::new(self.entries.clone()),
            index: 0,
            terminal,
        };
        chain.invoke(metadata, data).await
    }
}
