//! Concurrency limit around another scheduler.

use async_trait::async_trait;
use revrest_core::Error;
use std::sync::Arc;
use tokio::sync::Semaphore;

use super::{Attempt, Scheduler, Task};

/// Lets at most `max_in_flight` tasks run inside the inner scheduler at once.
///
/// Waiting tasks are admitted in FIFO order.
pub struct MaxInFlightScheduler<T> {
    inner: Arc<dyn Scheduler<T>>,
    permits: Semaphore,
    max_in_flight: usize,
}

impl<T: Send + 'static> MaxInFlightScheduler<T> {
    pub fn new(inner: Arc<dyn Scheduler<T>>, max_in_flight: usize) -> Self {
        let max_in_flight = max_in_flight.max(1);
        Self { inner, permits: Semaphore::new(max_in_flight), max_in_flight }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Tasks currently running.
    #[cfg(test)]
    pub(crate) fn in_flight(&self) -> usize {
        self.max_in_flight - self.permits.available_permits()
    }
}

#[async_trait]
impl<T: Send + 'static> Scheduler<T> for MaxInFlightScheduler<T> {
    async fn schedule(&self, task: Task<T>) -> Result<Attempt<T>, Error> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| Error::Scheduler(format!("lane closed: {e}")))?;
        self.inner.schedule(task).await
    }
}
