//! The REST fetch helper.
//!
//! Every call UI code makes goes through [`RestApiHelper`]:
//!
//! ### Request building
//! - URLs are `server_url + canonical_path + path + ?query` (see [`url`])
//! - `X-Gerrit-Request-Origin` is added unless the caller set it
//! - Bodies default to `Content-Type: application/json`
//!
//! ### Scheduling
//! - GET and friends run on the read lane, PUT/POST/DELETE on the write lane
//! - 429 responses are retried by the lane; a final 429 is a normal response
//!
//! ### Caching
//! - [`RestApiHelper::fetch_cache_json`] deduplicates concurrent requests per
//!   cache key and memoizes successful payloads per site
//! - Failures and non-2xx responses are never cached

pub mod request;
pub mod response;
pub mod transport;
pub mod url;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use reqwest::StatusCode;
use reqwest::header::{self, HeaderName, HeaderValue};
use revrest_core::cache::{InFlight, Ticket, load_initial_data};
use revrest_core::{AppConfig, Error, FetchPromisesCache, SiteBasedCache};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

pub use request::{ErrorCallback, RequestBody, RestRequest};
pub use response::{JSON_PREFIX, ResponsePayload, RestResponse, parse_prefixed_json};
pub use transport::{HttpTransport, HttpTransportConfig, Transport, TransportError, TransportRequest};
pub use url::{ParamValue, QueryParams, encode, url_with_params};

use crate::events::{ErrorReporter, NetworkErrorEvent, RequestSummary, RpcLogEvent, ServerErrorEvent};
use crate::scheduler::{Lane, RequestLanes};

/// Header tagging first-party traffic.
pub static REQUEST_ORIGIN_HEADER: HeaderName = HeaderName::from_static("x-gerrit-request-origin");

pub const DEFAULT_REQUEST_ORIGIN: &str = "polygerrit";

const JSON_CONTENT_TYPE: &str = "application/json";

/// Pending outcome of a deduplicated request, shared by every waiter.
pub type PendingJson = Shared<BoxFuture<'static, Result<Option<Value>, Error>>>;

/// The process-wide caches, created once and handed to every helper.
#[derive(Clone, Default)]
pub struct SharedCaches {
    pub results: Arc<SiteBasedCache>,
    pub in_flight: Arc<FetchPromisesCache<PendingJson>>,
}

impl SharedCaches {
    pub fn new(site: impl Into<String>) -> Self {
        Self { results: Arc::new(SiteBasedCache::new(site)), in_flight: Arc::new(FetchPromisesCache::new()) }
    }
}

/// Orchestrates URL building, scheduling, payload parsing, caching and error
/// reporting for REST calls.
///
/// Cheap to clone; clones share caches, lanes and reporter.
#[derive(Clone)]
pub struct RestApiHelper {
    caches: SharedCaches,
    transport: Arc<dyn Transport>,
    lanes: RequestLanes,
    reporter: Arc<dyn ErrorReporter>,
    server_url: Arc<str>,
    request_origin: HeaderValue,
}

impl RestApiHelper {
    pub fn new(
        caches: SharedCaches, transport: Arc<dyn Transport>, lanes: RequestLanes, reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        Self {
            caches,
            transport,
            lanes,
            reporter,
            server_url: Arc::from(""),
            request_origin: HeaderValue::from_static(DEFAULT_REQUEST_ORIGIN),
        }
    }

    /// Build a helper with an HTTP transport, bounded lanes and a seeded cache.
    pub fn from_config(config: &AppConfig, reporter: Arc<dyn ErrorReporter>) -> Result<Self, Error> {
        let caches = SharedCaches::new(config.canonical_path.clone());
        if let Some(path) = &config.initial_data_path {
            caches.results.seed_initial_data(load_initial_data(path)?);
        }

        let transport = HttpTransport::new(HttpTransportConfig::from(config))?;
        Self::new(caches, Arc::new(transport), RequestLanes::from_config(config), reporter)
            .with_server_url(&config.server_url)
            .with_request_origin(&config.request_origin)
    }

    /// Origin prefixed to relative URLs, e.g. `https://review.example.org`.
    pub fn with_server_url(mut self, server_url: &str) -> Self {
        self.server_url = Arc::from(server_url.trim_end_matches('/'));
        self
    }

    pub fn with_request_origin(mut self, origin: &str) -> Result<Self, Error> {
        self.request_origin =
            HeaderValue::from_str(origin).map_err(|e| Error::InvalidInput(format!("invalid request origin: {e}")))?;
        Ok(self)
    }

    /// The active site, i.e. the canonical path.
    pub fn site(&self) -> String {
        self.caches.results.site()
    }

    /// Move to another site. URLs and cache lookups follow the new path.
    pub fn switch_site(&self, canonical_path: impl Into<String>) {
        self.caches.results.switch_site(canonical_path);
    }

    pub fn base_url(&self) -> String {
        self.base_url_for(&self.site())
    }

    fn base_url_for(&self, site: &str) -> String {
        format!("{}{site}", self.server_url)
    }

    pub fn url_with_params(&self, url: &str, params: Option<&QueryParams>) -> String {
        url_with_params(&self.base_url(), url, params)
    }

    /// Key under which `url` and `params` are deduplicated and cached.
    pub fn cache_key(&self, url: &str, params: Option<&QueryParams>) -> String {
        url_with_params(&self.site(), url, params)
    }

    /// The result cache, for callers that patch or drop single entries.
    pub fn cache(&self) -> &SiteBasedCache {
        &self.caches.results
    }

    pub fn in_flight(&self) -> &FetchPromisesCache<PendingJson> {
        &self.caches.in_flight
    }

    /// Send `req` and return the response whatever its status.
    ///
    /// Transport failures are reported and returned as errors. Non-2xx
    /// responses are reported only when `report_server_error` is set.
    pub async fn fetch(&self, req: &RestRequest) -> Result<RestResponse, Error> {
        let url = self.url_with_params(&req.url, req.params.as_ref());
        self.execute(req, url, req.report_server_error.unwrap_or(false)).await
    }

    /// [`fetch`](Self::fetch) asking for JSON, without interpreting the status.
    pub async fn fetch_raw_json(&self, req: &RestRequest) -> Result<RestResponse, Error> {
        let req = with_accept_json(req.clone());
        self.fetch(&req).await
    }

    /// Fetch and parse a JSON payload.
    ///
    /// Returns `Ok(None)` for non-2xx responses, which are reported unless the
    /// request opted out. A payload without the JSON prefix is an error.
    pub async fn fetch_json(&self, req: &RestRequest, no_accept_header: bool) -> Result<Option<Value>, Error> {
        let url = self.url_with_params(&req.url, req.params.as_ref());
        self.fetch_json_at(req, url, no_accept_header).await
    }

    /// [`fetch_json`](Self::fetch_json) against an already built URL.
    async fn fetch_json_at(&self, req: &RestRequest, url: String, no_accept_header: bool) -> Result<Option<Value>, Error> {
        let req = if no_accept_header { req.clone() } else { with_accept_json(req.clone()) };
        let report_server_error = req.report_server_error.unwrap_or(true);

        let response = self.execute(&req, url, report_server_error).await?;
        if !response.ok() {
            return Ok(None);
        }
        self.get_response_object(&response).map(Some)
    }

    /// Deduplicated, cached [`fetch_json`](Self::fetch_json).
    ///
    /// A request already pending for the same cache key is joined; a cached
    /// success is returned without touching the network. Otherwise the request
    /// is claimed and runs on its own task, so dropping this future never
    /// cancels it.
    ///
    /// The URL, the cache key and the partition the result lands in are all
    /// fixed from the site active at the call. A result is stored only if no
    /// invalidation or newer claim replaced the request while it was pending.
    pub async fn fetch_cache_json(&self, req: &RestRequest) -> Result<Option<Value>, Error> {
        let site = self.site();
        let key = url_with_params(&site, &req.url, req.params.as_ref());

        let claimed = self.caches.in_flight.join_or_claim(&key, |ticket| match self.caches.results.get(&key) {
            Some(cached) => Err(cached),
            None => {
                let url = url_with_params(&self.base_url_for(&site), &req.url, req.params.as_ref());
                let claim = Release::new(Arc::clone(&self.caches.in_flight), key.clone(), ticket);
                Ok(self.spawn_cached_fetch(req.clone(), url, site.clone(), claim))
            }
        });

        match claimed {
            Err(cached) => {
                tracing::trace!(key = %key, "result cache hit");
                Ok(Some(cached))
            }
            Ok(InFlight::Joined(pending)) => {
                tracing::trace!(key = %key, "joined pending request");
                pending.await
            }
            Ok(InFlight::Claimed(pending)) => pending.await,
        }
    }

    fn spawn_cached_fetch(&self, req: RestRequest, url: String, site: String, mut claim: Release) -> PendingJson {
        let helper = self.clone();
        let task = tokio::spawn(async move {
            let result = helper.fetch_json_at(&req, url, false).await;
            let stored = claim.settle(|key| {
                if let Ok(Some(value)) = &result {
                    helper.caches.results.set_for_site(&site, key, value.clone());
                }
            });
            if !stored {
                tracing::debug!(key = %claim.key, "request superseded while pending; result not cached");
            }
            result
        });

        async move { task.await.unwrap_or_else(|e| Err(Error::Scheduler(format!("fetch task failed: {e}")))) }
            .boxed()
            .shared()
    }

    /// Forget pending requests and cached results under `prefix` in the active site.
    pub fn invalidate_fetch_promises_prefix(&self, prefix: &str) {
        let prefix = format!("{}{prefix}", self.site());
        self.caches.in_flight.invalidate_prefix(&prefix);
        self.caches.results.invalidate_prefix(&prefix);
    }

    /// Log a finished call. Call right after the response arrives.
    pub fn log_call(&self, request: &TransportRequest, start: Instant, status: StatusCode) {
        log_call(self.reporter.as_ref(), request, start, status);
    }

    /// Send a write request.
    ///
    /// URLs starting with `http` are used as given. Non-2xx responses are
    /// reported unless the request opted out, and returned either way.
    pub async fn send(&self, req: &RestRequest) -> Result<RestResponse, Error> {
        let url = if req.url.starts_with("http") {
            ::url::Url::parse(&req.url).map_err(|e| Error::InvalidUrl(format!("{}: {e}", req.url)))?;
            url_with_params("", &req.url, req.params.as_ref())
        } else {
            self.url_with_params(&req.url, req.params.as_ref())
        };
        self.execute(req, url, req.report_server_error.unwrap_or(true)).await
    }

    /// [`send`](Self::send), then parse the payload of a 2xx response.
    ///
    /// `Ok(None)` for non-2xx responses and for empty bodies.
    pub async fn send_json(&self, req: &RestRequest) -> Result<Option<Value>, Error> {
        let response = self.send(req).await?;
        if !response.ok() || response.body.is_empty() {
            return Ok(None);
        }
        self.get_response_object(&response).map(Some)
    }

    /// Parse a response body strictly.
    pub fn get_response_object(&self, response: &RestResponse) -> Result<Value, Error> {
        response::response_object(response)
    }

    /// Read a response body, tolerating malformed JSON.
    pub fn read_response_payload(&self, response: &RestResponse) -> ResponsePayload {
        response::read_payload(response)
    }

    async fn execute(&self, req: &RestRequest, url: String, report_server_error: bool) -> Result<RestResponse, Error> {
        let request = self.transport_request(req, url)?;
        let lane = req.lane.unwrap_or_else(|| Lane::for_method(&request.method));
        let summary = RequestSummary {
            method: request.method.clone(),
            url: request.url.clone(),
            anonymized_url: request.anonymized_url.clone(),
        };

        let transport = Arc::clone(&self.transport);
        let reporter = Arc::clone(&self.reporter);
        let scheduled = self
            .lanes
            .schedule_on(lane, move || {
                let transport = Arc::clone(&transport);
                let reporter = Arc::clone(&reporter);
                let request = request.clone();
                async move {
                    let start = Instant::now();
                    match transport.fetch(request.clone()).await {
                        Ok(response) => {
                            log_call(reporter.as_ref(), &request, start, response.status);
                            Ok(response)
                        }
                        Err(e) => Err(Error::network(request.url.as_str(), &e)),
                    }
                }
            })
            .await;

        let response = match scheduled {
            Ok(response) => response,
            Err(error) => {
                match &req.err_fn {
                    Some(err_fn) => err_fn(None, Some(&error)),
                    None => self.reporter.network_error(NetworkErrorEvent { url: summary.url, error: error.clone() }),
                }
                return Err(error);
            }
        };

        if report_server_error && !response.ok() {
            match &req.err_fn {
                Some(err_fn) => err_fn(Some(&response), None),
                None => self.reporter.server_error(ServerErrorEvent { request: summary, response: response.clone() }),
            }
        }
        Ok(response)
    }

    fn transport_request(&self, req: &RestRequest, url: String) -> Result<TransportRequest, Error> {
        let mut headers = req.headers.clone();
        if !headers.contains_key(&REQUEST_ORIGIN_HEADER) {
            headers.insert(REQUEST_ORIGIN_HEADER.clone(), self.request_origin.clone());
        }

        let body = req.body.clone().map(RequestBody::into_bytes).transpose()?;
        if body.is_some() && !headers.contains_key(header::CONTENT_TYPE) {
            let content_type = req.content_type.as_deref().unwrap_or(JSON_CONTENT_TYPE);
            let value = HeaderValue::from_str(content_type)
                .map_err(|e| Error::InvalidInput(format!("invalid content type {content_type:?}: {e}")))?;
            headers.insert(header::CONTENT_TYPE, value);
        }

        let anonymized_url = if req.report_url_as_is { Some(url.clone()) } else { req.anonymized_url.clone() };
        Ok(TransportRequest { url, method: req.method.clone(), headers, body, anonymized_url })
    }
}

fn with_accept_json(mut req: RestRequest) -> RestRequest {
    req.headers.insert(header::ACCEPT, HeaderValue::from_static(JSON_CONTENT_TYPE));
    req
}

fn log_call(reporter: &dyn ErrorReporter, request: &TransportRequest, start: Instant, status: StatusCode) {
    let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    let url = request.anonymized_url.as_deref().unwrap_or(&request.url);
    tracing::debug!("HTTP {} {} {}ms {}", status.as_u16(), request.method, elapsed_ms, url);

    if let Some(anonymized_url) = &request.anonymized_url {
        reporter.rpc_log(RpcLogEvent {
            status: status.as_u16(),
            method: request.method.clone(),
            elapsed_ms,
            anonymized_url: anonymized_url.clone(),
        });
    }
}

/// A claimed in-flight entry, cleared when the request settles however it ends.
struct Release {
    in_flight: Arc<FetchPromisesCache<PendingJson>>,
    key: String,
    ticket: Ticket,
    settled: bool,
}

impl Release {
    fn new(in_flight: Arc<FetchPromisesCache<PendingJson>>, key: String, ticket: Ticket) -> Self {
        Self { in_flight, key, ticket, settled: false }
    }

    /// Run `store` and clear the entry if the claim still owns its key.
    fn settle(&mut self, store: impl FnOnce(&str)) -> bool {
        self.settled = true;
        let key = self.key.as_str();
        self.in_flight.settle(key, self.ticket, || store(key))
    }
}

impl Drop for Release {
    fn drop(&mut self) {
        if !self.settled && !self.in_flight.release(&self.key, self.ticket) {
            tracing::trace!(key = %self.key, "in-flight entry already replaced");
        }
    }
}
