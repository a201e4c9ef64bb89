//! Read, write and serial request lanes.

use futures_util::FutureExt;
use reqwest::{Method, StatusCode};
use revrest_core::{AppConfig, Error};
use std::future::Future;
use std::sync::Arc;

use super::{Attempt, BaseScheduler, MaxInFlightScheduler, RetryConfig, RetryScheduler, Scheduler, Task};
use crate::fetch::response::RestResponse;

pub const DEFAULT_READ_MAX_IN_FLIGHT: usize = 10;
pub const DEFAULT_WRITE_MAX_IN_FLIGHT: usize = 5;

/// Scheduling lane of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    Read,
    Write,
    /// One request at a time, for calls that must not overlap
    Serial,
}

impl Lane {
    /// Lane chosen for `method` when the request does not force one.
    pub fn for_method(method: &Method) -> Self {
        if *method == Method::PUT || *method == Method::POST || *method == Method::DELETE {
            Lane::Write
        } else {
            Lane::Read
        }
    }
}

/// The schedulers every network call goes through.
#[derive(Clone)]
pub struct RequestLanes {
    read: Arc<dyn Scheduler<RestResponse>>,
    write: Arc<dyn Scheduler<RestResponse>>,
    serial: Arc<dyn Scheduler<RestResponse>>,
}

impl RequestLanes {
    pub fn new(
        read: Arc<dyn Scheduler<RestResponse>>, write: Arc<dyn Scheduler<RestResponse>>,
        serial: Arc<dyn Scheduler<RestResponse>>,
    ) -> Self {
        Self { read, write, serial }
    }

    /// Retrying, bounded lanes with the given limits.
    pub fn bounded(read_max_in_flight: usize, write_max_in_flight: usize, retry: RetryConfig) -> Self {
        Self::new(lane(read_max_in_flight, retry), lane(write_max_in_flight, retry), lane(1, retry))
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::bounded(config.read_max_in_flight, config.write_max_in_flight, RetryConfig::from(config))
    }

    /// Run `call` on the lane for `method`.
    pub async fn schedule<F, Fut>(&self, method: &Method, call: F) -> Result<RestResponse, Error>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<RestResponse, Error>> + Send + 'static,
    {
        self.schedule_on(Lane::for_method(method), call).await
    }

    /// Run `call` on `lane`.
    ///
    /// A 429 response requests a retry. If retries run out the last 429
    /// response is returned as an ordinary response.
    pub async fn schedule_on<F, Fut>(&self, lane: Lane, call: F) -> Result<RestResponse, Error>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<RestResponse, Error>> + Send + 'static,
    {
        let task: Task<RestResponse> = Arc::new(move || {
            let pending = call();
            async move {
                let result: Result<RestResponse, Error> = pending.await;
                result.map(|response| {
                    if response.status == StatusCode::TOO_MANY_REQUESTS {
                        Attempt::RetryRequested(response)
                    } else {
                        Attempt::Complete(response)
                    }
                })
            }
            .boxed()
        });

        let scheduler = match lane {
            Lane::Read => &self.read,
            Lane::Write => &self.write,
            Lane::Serial => &self.serial,
        };
        Ok(scheduler.schedule(task).await?.into_inner())
    }
}

impl Default for RequestLanes {
    fn default() -> Self {
        Self::bounded(DEFAULT_READ_MAX_IN_FLIGHT, DEFAULT_WRITE_MAX_IN_FLIGHT, RetryConfig::default())
    }
}

fn lane(max_in_flight: usize, retry: RetryConfig) -> Arc<dyn Scheduler<RestResponse>> {
    let bounded = MaxInFlightScheduler::new(Arc::new(BaseScheduler), max_in_flight);
    Arc::new(RetryScheduler::new(Arc::new(bounded), retry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn fast_retry(max_retries: u32) -> RetryConfig {
        RetryConfig { max_retries, base_delay: Duration::from_millis(5), max_delay: Duration::from_millis(5) }
    }

    #[test]
    fn test_lane_for_method() {
        assert_eq!(Lane::for_method(&Method::GET), Lane::Read);
        assert_eq!(Lane::for_method(&Method::HEAD), Lane::Read);
        assert_eq!(Lane::for_method(&Method::PUT), Lane::Write);
        assert_eq!(Lane::for_method(&Method::POST), Lane::Write);
        assert_eq!(Lane::for_method(&Method::DELETE), Lane::Write);
        assert_eq!(Lane::for_method(&Method::PATCH), Lane::Read);
    }

    #[tokio::test(start_paused = true)]
    async fn test_429_is_retried() {
        let lanes = RequestLanes::bounded(2, 2, fast_retry(3));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let response = lanes
            .schedule(&Method::GET, move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    let status = if n == 0 { StatusCode::TOO_MANY_REQUESTS } else { StatusCode::OK };
                    Ok(RestResponse::new("/x", status, ""))
                }
            })
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_final_429_is_returned() {
        let lanes = RequestLanes::bounded(2, 2, fast_retry(1));
        let response = lanes
            .schedule_on(Lane::Serial, || async { Ok(RestResponse::new("/x", StatusCode::TOO_MANY_REQUESTS, "")) })
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_errors_are_not_retried() {
        let lanes = RequestLanes::bounded(2, 2, fast_retry(3));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let result = lanes
            .schedule(&Method::PUT, move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(Error::Network { url: "/x".into(), message: "refused".into() }) }
            })
            .await;

        assert!(matches!(result, Err(Error::Network { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
