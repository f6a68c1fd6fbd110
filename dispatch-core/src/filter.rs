//! Filters gate routers, handlers, and middlewares: a tuple of
//! predicates that must all evaluate truthy for the enclosing binding
//! to match a given task.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::model::{DataBundle, Metadata};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A single filter element: a fixed boolean, a synchronous predicate,
/// or an async predicate over the metadata + data bundle.
#[derive(Clone)]
pub enum Filter {
    /// A raw boolean, used directly.
    Bool(bool),
    /// A synchronous predicate closure.
    Predicate(Arc<dyn Fn(&Metadata, &DataBundle) -> bool + Send + Sync>),
    /// An async predicate closure.
    AsyncPredicate(Arc<dyn Fn(&Metadata, &DataBundle) -> BoxFuture<'static, bool> + Send + Sync>),
}

impl Filter {
    /// Build a filter from a synchronous closure.
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Metadata, &DataBundle) -> bool + Send + Sync + 'static,
    {
        Filter::Predicate(Arc::new(f))
    }

    /// Build a filter from an async closure.
    pub fn async_predicate<F, Fut>(f: F) -> Self
    where
        F: Fn(&Metadata, &DataBundle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        Filter::AsyncPredicate(Arc::new(move |m, d| Box::pin(f(m, d))))
    }

    async fn evaluate(&self, metadata: &Metadata, data: &DataBundle) -> bool {
        match self {
            Filter::Bool(b) => *b,
            Filter::Predicate(p) => p(metadata, data),
            Filter::AsyncPredicate(p) => p(metadata, data).await,
        }
    }
}

impl From<bool> for Filter {
    fn from(b: bool) -> Self {
        Filter::Bool(b)
    }
}

/// An ordered tuple of filters. An empty set always matches, mirroring
/// the source semantics where an empty filter tuple registers as
/// `(true,)`.
#[derive(Clone, Default)]
pub struct FilterSet(Vec<Filter>);

impl FilterSet {
    pub fn new(filters: Vec<Filter>) -> Self {
        Self(filters)
    }

    pub fn always() -> Self {
        Self(Vec::new())
    }

    /// Evaluate every filter in order, short-circuiting on the first
    /// falsy element.
    pub async fn matches(&self, metadata: &Metadata, data: &DataBundle) -> bool {
        for filter in &self.0 {
            if !filter.evaluate(metadata, data).await {
                return false;
            }
        }
        true
    }
}

impl From<Vec<Filter>> for FilterSet {
    fn from(filters: Vec<Filter>) -> Self {
        Self(filters)
    }
}
