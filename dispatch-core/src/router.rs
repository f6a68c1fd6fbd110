//! The n-ary routing tree. Each router holds its own handler bindings
//! and child routers, each gated by a filter set; `find_handler` walks
//! the tree depth-first and returns the first match.

use std::sync::Arc;
use std::time::Duration;

use crate::error::DispatchError;
use crate::filter::FilterSet;
use crate::handler::{CallableHandler, Handler, HandlerFactory, TimeoutCallback};
use crate::model::{DataBundle, Metadata, TaskMessage};

/// One node of the routing tree.
#[derive(Default)]
pub struct Router {
    handlers: Vec<(HandlerFactory, FilterSet)>,
    children: Vec<(Router, FilterSet)>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Mount a child router, gated by `filters`. Insertion order is
    /// precedence order among siblings.
    pub fn include_router(&mut self, router: Router, filters: FilterSet) {
        self.children.push((router, filters));
    }

    /// Register a bare async callable as a handler. One handler
    /// instance is built at registration and shared across every task
    /// that matches `filters`. `on_execution_timeout`/`on_close`
    /// override the trait's default no-op/debug-log behavior, same as
    /// a hand-implemented `Handler` would.
    #[allow(clippy::too_many_arguments)]
    pub fn include_handler<F, Fut>(
        &mut self,
        filters: FilterSet,
        body: F,
        execution_timeout: Option<Duration>,
        close_timeout: Option<Duration>,
        on_execution_timeout: Option<TimeoutCallback>,
        on_close: Option<TimeoutCallback>,
    ) where
        F: Fn(String, TaskMessage, DataBundle) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), Box<dyn std::error::Error + Send + Sync>>>
            + Send
            + 'static,
    {
        let shared: Arc<dyn Handler> = Arc::new(CallableHandler::new(
            body,
            execution_timeout,
            close_timeout,
            on_execution_timeout,
            on_close,
        ));
        let factory: HandlerFactory = Arc::new(move |_metadata, _data| shared.clone());
        self.handlers.push((factory, filters));
    }

    /// Register a per-task factory, gated by `filters`. The factory is
    /// invoked fresh for every task whose filters match, receiving that
    /// task's own metadata and data snapshot.
    pub fn include_class_handler(&mut self, filters: FilterSet, factory: HandlerFactory) {
        self.handlers.push((factory, filters));
    }

    /// Depth-first search: own handlers first (insertion order), then
    /// child routers (insertion order, recursing into each). Returns
    /// `None` at any non-root level when nothing matches; the caller
    /// (the dispatcher, via the root router) turns a root-level `None`
    /// into `HandlerNotFound`.
    pub async fn find(&self, metadata: &Metadata, data: &DataBundle) -> Option<HandlerFactory> {
        for (factory, filters) in &self.handlers {
            if filters.matches(metadata, data).await {
                return Some(factory.clone());
            }
        }
        for (child, filters) in &self.children {
            if filters.matches(metadata, data).await
                && let Some(found) = Box::pin(child.find(metadata, data)).await
            {
                return Some(found);
            }
        }
        None
    }

    /// `find`, raising `HandlerNotFound` when nothing matches. Intended
    /// for the root router only.
    pub async fn find_handler(
        &self,
        metadata: &Metadata,
        data: &DataBundle,
    ) -> Result<HandlerFactory, DispatchError> {
        self.find(metadata, data).await.ok_or_else(|| {
            let (uuid, type_event) = match metadata {
                Metadata::Task(t) => (t.uuid.clone(), t.type_event.clone()),
                Metadata::Service(s) => (s.uuid.clone(), String::from("<service>")),
            };
            DispatchError::HandlerNotFound { uuid, type_event }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use crate::model::{Command, ServiceMessage};

    fn task(type_event: &str) -> Metadata {
        Metadata::Task(TaskMessage {
            uuid: "a".into(),
            type_event: type_event.into(),
            data: None,
        })
    }

    #[tokio::test]
    async fn first_matching_handler_wins() {
        let mut router = Router::new();
        router.include_handler(
            FilterSet::new(vec![Filter::predicate(|m, _| {
                m.as_task().map(|t| t.type_event.as_str()) == Some("T")
            })]),
            |_uuid, _m, _d| async { Ok(()) },
            None,
            None,
            None,
            None,
        );
        router.include_handler(
            FilterSet::always(),
            |_uuid, _m, _d| async { Err("should not reach".into()) },
            None,
            None,
            None,
            None,
        );

        let found = router.find(&task("T"), &DataBundle::new()).await;
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn falls_through_to_child_router() {
        let mut child = Router::new();
        child.include_handler(
            FilterSet::always(),
            |_, _, _| async { Ok(()) },
            None,
            None,
            None,
            None,
        );

        let mut root = Router::new();
        root.include_router(
            child,
            FilterSet::new(vec![Filter::predicate(|m, _| {
                m.as_task().map(|t| t.type_event.as_str()) == Some("Child")
            })]),
        );

        assert!(root.find(&task("Child"), &DataBundle::new()).await.is_some());
        assert!(root.find(&task("Other"), &DataBundle::new()).await.is_none());
    }

    #[tokio::test]
    async fn root_search_miss_is_handler_not_found() {
        let router = Router::new();
        let result = router.find_handler(&task("T"), &DataBundle::new()).await;
        assert!(matches!(result, Err(DispatchError::HandlerNotFound { .. })));
    }

    #[tokio::test]
    async fn empty_filters_match_everything() {
        let mut router = Router::new();
        router.include_handler(
            FilterSet::always(),
            |_, _, _| async { Ok(()) },
            None,
            None,
            None,
            None,
        );

        let service = Metadata::Service(ServiceMessage {
            uuid: "a".into(),
            command: Command::GetStatus,
        });
        assert!(router.find(&service, &DataBundle::new()).await.is_some());
    }
}
