//! # dispatch-core
//!
//! In-process task dispatch engine for a durable message-stream broker.
//!
//! This crate contains:
//! - **Data model**: `TaskMessage`, `ServiceMessage`, `Metadata`, `TaskStatus`
//! - **Filter evaluator**: `Filter`, `FilterSet` — predicate tuples gating routers,
//!   handlers, and middlewares
//! - **Router tree**: `Router` — depth-first handler lookup by filter match
//! - **Handler wrapper**: `Handler`, `CallableHandler`, `invoke_handler` — the
//!   per-task invocation protocol (spawn, arm timers, await, teardown)
//! - **Middleware**: `Middleware`, `MiddlewareManager` — ordered, filter-gated
//!   interceptor chains
//! - **Timer manager**: `TimerManager` — per-task deferred callbacks
//! - **Bounded pool**: `TaskPool` — concurrency-safe map from uuid to in-flight task
//! - **Broker boundary**: `BrokerFrame` — the ack/nack contract the classifier drives
//! - **Classifier**: `classify_and_admit` — payload validation and admission gate
//! - **Dispatcher**: `Dispatcher` — composes everything behind `listen`
//! - **Error**: `DispatchError` — typed, `thiserror`-based error hierarchy

pub mod broker;
pub mod classifier;
pub mod dispatcher;
pub mod error;
pub mod filter;
pub mod handler;
pub mod middleware;
pub mod model;
pub mod pool;
pub mod router;
pub mod timer;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use broker::BrokerFrame;
pub use classifier::classify_and_admit;
pub use dispatcher::Dispatcher;
pub use error::DispatchError;
pub use filter::{Filter, FilterSet};
pub use handler::{CallableHandler, Handler, HandlerFactory, invoke_handler};
pub use middleware::{Middleware, MiddlewareManager};
pub use model::{Command, DataBundle, Metadata, RawPayload, ServiceMessage, TaskMessage, TaskStatus};
pub use pool::TaskPool;
pub use router::Router;
pub use timer::TimerManager;
