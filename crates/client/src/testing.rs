//! In-crate stubs for the transport and reporter collaborators.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::events::{ErrorReporter, NetworkErrorEvent, RestEvent, RpcLogEvent, ServerErrorEvent};
use crate::fetch::response::RestResponse;
use crate::fetch::transport::{Transport, TransportError, TransportRequest};

#[derive(Debug, Clone)]
pub(crate) enum Scripted {
    Respond(StatusCode, String),
    Fail(String),
}

impl Scripted {
    /// A 200 response with the JSON prefix in front of `json`.
    pub(crate) fn json(json: &str) -> Self {
        Scripted::Respond(StatusCode::OK, format!(")]}}'{json}"))
    }

    pub(crate) fn status(status: u16) -> Self {
        Scripted::Respond(StatusCode::from_u16(status).unwrap(), String::new())
    }
}

/// Plays back scripted outcomes in order, repeating the last one.
pub(crate) struct ScriptedTransport {
    script: Mutex<VecDeque<Scripted>>,
    last: Mutex<Option<Scripted>>,
    requests: Mutex<Vec<TransportRequest>>,
    calls: AtomicUsize,
    delay: Duration,
    delays: Mutex<VecDeque<Duration>>,
}

impl ScriptedTransport {
    pub(crate) fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            delays: Mutex::new(VecDeque::new()),
        }
    }

    /// Sleep before answering, keeping requests in flight.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Per-call delays, used in order before falling back to the fixed one.
    pub(crate) fn with_delays(self, delays: Vec<Duration>) -> Self {
        *self.delays.lock().unwrap() = delays.into();
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self) -> Scripted {
        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            *last = Some(next);
        }
        last.clone().unwrap_or(Scripted::status(200))
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn fetch(&self, request: TransportRequest) -> Result<RestResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self.next();
        let url = request.url.clone();
        self.requests.lock().unwrap().push(request);

        let delay = self.delays.lock().unwrap().pop_front().unwrap_or(self.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match outcome {
            Scripted::Respond(status, body) => Ok(RestResponse::new(url, status, body)),
            Scripted::Fail(message) => Err(TransportError::Other(message)),
        }
    }
}

/// Records every event it receives.
#[derive(Default)]
pub(crate) struct RecordingReporter {
    events: Mutex<Vec<RestEvent>>,
}

impl RecordingReporter {
    pub(crate) fn events(&self) -> Vec<RestEvent> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn network_errors(&self) -> usize {
        self.count(|e| matches!(e, RestEvent::NetworkError(_)))
    }

    pub(crate) fn server_errors(&self) -> usize {
        self.count(|e| matches!(e, RestEvent::ServerError(_)))
    }

    pub(crate) fn rpc_logs(&self) -> Vec<RpcLogEvent> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RestEvent::RpcLog(event) => Some(event),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&RestEvent) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| pred(e)).count()
    }
}

impl ErrorReporter for RecordingReporter {
    fn network_error(&self, event: NetworkErrorEvent) {
        self.events.lock().unwrap().push(RestEvent::NetworkError(event));
    }

    fn server_error(&self, event: ServerErrorEvent) {
        self.events.lock().unwrap().push(RestEvent::ServerError(event));
    }

    fn rpc_log(&self, event: RpcLogEvent) {
        self.events.lock().unwrap().push(RestEvent::RpcLog(event));
    }
}
