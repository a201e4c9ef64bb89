//! Client code for revrest.
//!
//! This crate provides the REST access layer of the review UI: URL building,
//! the transport, request scheduling with 429 retries, error and timing
//! events, and the deduplicating, cached fetch helper.

pub mod events;
pub mod fetch;
pub mod scheduler;

#[cfg(test)]
mod testing;

pub use events::{ErrorReporter, EventBus, RestEvent};
pub use fetch::{
    HttpTransport, QueryParams, RequestBody, RestApiHelper, RestRequest, RestResponse, SharedCaches, Transport,
    TransportRequest,
};
pub use scheduler::{Attempt, Lane, RequestLanes, RetryConfig, Scheduler};
