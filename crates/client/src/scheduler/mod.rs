//! Request schedulers.
//!
//! A task is a re-invocable closure producing one attempt. Instead of throwing
//! a retry error, an attempt returns [`Attempt::RetryRequested`] carrying the
//! response that asked for the retry; retrying schedulers match on it.
//!
//! Schedulers compose by wrapping: the production lanes are
//! `RetryScheduler(MaxInFlightScheduler(BaseScheduler))`.

pub mod lanes;
pub mod max_in_flight;
pub mod retry;

pub use lanes::{Lane, RequestLanes};
pub use max_in_flight::MaxInFlightScheduler;
pub use retry::{RetryConfig, RetryScheduler};

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use revrest_core::Error;
use std::sync::Arc;

/// Result of one invocation of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T> {
    /// The task finished; no retry is wanted.
    Complete(T),
    /// The task asks to be run again; the payload is the result that triggered it.
    RetryRequested(T),
}

impl<T> Attempt<T> {
    /// The payload, whether or not a retry was requested.
    pub fn into_inner(self) -> T {
        match self {
            Attempt::Complete(value) | Attempt::RetryRequested(value) => value,
        }
    }

    pub fn is_retry_requested(&self) -> bool {
        matches!(self, Attempt::RetryRequested(_))
    }
}

pub type TaskFuture<T> = BoxFuture<'static, Result<Attempt<T>, Error>>;

/// Re-invocable unit of work handed to a scheduler.
pub type Task<T> = Arc<dyn Fn() -> TaskFuture<T> + Send + Sync>;

/// Decides when (and how often) a task runs.
#[async_trait]
pub trait Scheduler<T: Send + 'static>: Send + Sync {
    async fn schedule(&self, task: Task<T>) -> Result<Attempt<T>, Error>;
}

/// Runs every task immediately, exactly once.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaseScheduler;

#[async_trait]
impl<T: Send + 'static> Scheduler<T> for BaseScheduler {
    async fn schedule(&self, task: Task<T>) -> Result<Attempt<T>, Error> {
        task().await
    }
}
