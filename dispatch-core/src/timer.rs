//! Per-task deferred callbacks: the execution-timeout (advisory) and
//! close-timeout (authoritative) deadlines armed around a handler call.
//!
//! Each [`TimerManager`] owns an ordered set of spawned `tokio` tasks.
//! `cancel_timers` tears all of them down atomically and is idempotent.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Owns the deferred tasks attached to a single in-flight task.
#[derive(Default)]
pub struct TimerManager {
    timers: Vec<JoinHandle<()>>,
}

impl TimerManager {
    pub fn new() -> Self {
        Self { timers: Vec::new() }
    }

    /// If `timeout` is `Some`, spawn a task that sleeps for it and then
    /// runs `callback`, recording the spawned handle. A `None` timeout
    /// is a no-op.
    pub fn start_timer<F, Fut>(&mut self, timeout: Option<Duration>, callback: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let Some(duration) = timeout else {
            return;
        };

        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            callback().await;
        });
        self.timers.push(handle);
    }

    /// Cancel every recorded timer and empty the set. Idempotent: calling
    /// this on an empty manager is a no-op. After this returns, no
    /// recorded callback will still fire.
    pub fn cancel_timers(&mut self) {
        for timer in self.timers.drain(..) {
            timer.abort();
        }
    }
}

impl Drop for TimerManager {
    fn drop(&mut self) {
        self.cancel_timers();
    }
}
