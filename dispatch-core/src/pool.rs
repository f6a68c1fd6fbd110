//! Bounded map from task `uuid` to its in-flight pipeline's abort
//! handle. The pipeline future itself runs elsewhere (spawned by the
//! dispatcher); a companion reaper task removes the entry once the
//! pipeline ends, by whatever means — see `dispatcher::Dispatcher::listen`.
//!
//! The pool is the dispatcher's only mutable shared structure; a
//! `tokio::sync::Mutex`-guarded map gives it atomic insert/remove/
//! contains without requiring single-threaded scheduling.

use std::collections::HashMap;

use tokio::sync::Mutex;
use tokio::task::AbortHandle;

use crate::model::TaskStatus;

/// A bounded map from task `uuid` to the `AbortHandle` of its running
/// pipeline. `max_size == 0` means unbounded.
pub struct TaskPool {
    max_size: usize,
    tasks: Mutex<HashMap<String, AbortHandle>>,
}

impl TaskPool {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    pub async fn insert(&self, uuid: String, handle: AbortHandle) {
        self.tasks.lock().await.insert(uuid, handle);
    }

    /// Remove `uuid`, returning its handle if present. Called from the
    /// pipeline's completion hook, and from `CLOSING` handling.
    pub async fn remove(&self, uuid: &str) -> Option<AbortHandle> {
        self.tasks.lock().await.remove(uuid)
    }

    pub async fn contains(&self, uuid: &str) -> bool {
        self.tasks.lock().await.contains_key(uuid)
    }

    pub async fn len(&self) -> usize {
        self.tasks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// True iff the pool is at or over capacity. A pool with
    /// `max_size == 0` is never full.
    pub async fn full(&self) -> bool {
        self.max_size > 0 && self.len().await >= self.max_size
    }

    pub async fn status(&self, uuid: &str) -> TaskStatus {
        if self.contains(uuid).await {
            TaskStatus::Running
        } else {
            TaskStatus::Unknown
        }
    }

    /// Cancel the running pipeline for `uuid`, if any. Returns whether
    /// a task was found and cancelled.
    pub async fn cancel(&self, uuid: &str) -> bool {
        match self.remove(uuid).await {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }
}
