//! Error and timing reports produced by the REST layer.
//!
//! The helper never talks to UI code directly. It hands events to an
//! [`ErrorReporter`]; in production that is an [`EventBus`] that logs each event
//! and fans it out to every subscriber.

use reqwest::Method;
use revrest_core::Error;
use tokio::sync::broadcast;

use crate::fetch::response::RestResponse;

/// Capacity of the default event bus.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// The request that produced a server error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSummary {
    pub method: Method,
    pub url: String,
    pub anonymized_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NetworkErrorEvent {
    pub url: String,
    pub error: Error,
}

#[derive(Debug, Clone)]
pub struct ServerErrorEvent {
    pub request: RequestSummary,
    pub response: RestResponse,
}

/// Timing of a call carrying an anonymized URL. Never contains the raw URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcLogEvent {
    pub status: u16,
    pub method: Method,
    pub elapsed_ms: u64,
    pub anonymized_url: String,
}

#[derive(Debug, Clone)]
pub enum RestEvent {
    NetworkError(NetworkErrorEvent),
    ServerError(ServerErrorEvent),
    RpcLog(RpcLogEvent),
}

/// Receives the process-wide events of the REST layer.
pub trait ErrorReporter: Send + Sync {
    fn network_error(&self, event: NetworkErrorEvent);

    fn server_error(&self, event: ServerErrorEvent);

    fn rpc_log(&self, event: RpcLogEvent);
}

/// Broadcast-backed reporter.
///
/// Events sent while nobody is subscribed are dropped. Slow subscribers lose
/// the oldest events once `capacity` is exceeded.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<RestEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RestEvent> {
        self.sender.subscribe()
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    fn publish(&self, event: RestEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl ErrorReporter for EventBus {
    fn network_error(&self, event: NetworkErrorEvent) {
        tracing::warn!(url = %event.url, error = %event.error, "network error");
        self.publish(RestEvent::NetworkError(event));
    }

    fn server_error(&self, event: ServerErrorEvent) {
        tracing::warn!(
            method = %event.request.method,
            url = event.request.anonymized_url.as_deref().unwrap_or(event.request.url.as_str()),
            status = event.response.status.as_u16(),
            "server error"
        );
        self.publish(RestEvent::ServerError(event));
    }

    fn rpc_log(&self, event: RpcLogEvent) {
        tracing::trace!(
            status = event.status,
            method = %event.method,
            elapsed_ms = event.elapsed_ms,
            url = %event.anonymized_url,
            "rpc log"
        );
        self.publish(RestEvent::RpcLog(event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    fn rpc(status: u16) -> RpcLogEvent {
        RpcLogEvent { status, method: Method::GET, elapsed_ms: 3, anonymized_url: "/changes/*~*".into() }
    }

    #[tokio::test]
    async fn test_event_bus_fans_out() {
        let bus = EventBus::default();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.rpc_log(rpc(200));

        for rx in [&mut first, &mut second] {
            match rx.recv().await.unwrap() {
                RestEvent::RpcLog(event) => assert_eq!(event, rpc(200)),
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(4);
        bus.network_error(NetworkErrorEvent {
            url: "/x".into(),
            error: Error::Network { url: "/x".into(), message: "refused".into() },
        });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_server_error_carries_response() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();
        bus.server_error(ServerErrorEvent {
            request: RequestSummary { method: Method::PUT, url: "/a".into(), anonymized_url: None },
            response: RestResponse::new("/a", StatusCode::FORBIDDEN, "nope"),
        });

        match rx.recv().await.unwrap() {
            RestEvent::ServerError(event) => {
                assert_eq!(event.request.method, Method::PUT);
                assert_eq!(event.response.status, StatusCode::FORBIDDEN);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
