//! Request descriptors accepted by the helper.

use bytes::Bytes;
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use revrest_core::Error;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use super::response::RestResponse;
use super::url::QueryParams;
use crate::scheduler::Lane;

/// Caller-supplied error handler.
///
/// Called with the response for server errors and with the error for transport
/// failures. When present it replaces the process-wide error event.
pub type ErrorCallback = Arc<dyn Fn(Option<&RestResponse>, Option<&Error>) + Send + Sync>;

/// Body of a write request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Serialized with serde_json before sending.
    Json(Value),
    /// Sent verbatim.
    Raw(Bytes),
}

impl RequestBody {
    pub fn into_bytes(self) -> Result<Bytes, Error> {
        match self {
            RequestBody::Json(value) => serde_json::to_vec(&value)
                .map(Bytes::from)
                .map_err(|e| Error::InvalidInput(format!("failed to serialize body: {e}"))),
            RequestBody::Raw(bytes) => Ok(bytes),
        }
    }
}

/// A REST call as issued by UI code.
///
/// Headers and body never take part in the cache key; only the URL and params do.
#[derive(Clone, Default)]
pub struct RestRequest {
    /// Path below the site base URL, or an absolute `http(s)` URL
    pub url: String,
    /// HTTP method (default: GET)
    pub method: Method,
    pub params: Option<QueryParams>,
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
    /// Content-Type for the body (default: application/json)
    pub content_type: Option<String>,
    pub err_fn: Option<ErrorCallback>,
    /// Report non-2xx responses; unset means the entry point's default
    pub report_server_error: Option<bool>,
    /// Telemetry-safe form of the URL
    pub anonymized_url: Option<String>,
    /// Use the final URL itself as the anonymized URL
    pub report_url_as_is: bool,
    /// Force a scheduling lane instead of choosing by method
    pub lane: Option<Lane>,
}

impl RestRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self { url: url.into(), method, ..Default::default() }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn with_params(mut self, params: QueryParams) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Serialize `body` as the JSON request body.
    pub fn with_json<T: Serialize>(mut self, body: &T) -> Result<Self, Error> {
        let value = serde_json::to_value(body).map_err(|e| Error::InvalidInput(format!("invalid body: {e}")))?;
        self.body = Some(RequestBody::Json(value));
        Ok(self)
    }

    pub fn with_body(mut self, body: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        self.body = Some(RequestBody::Raw(body.into()));
        self.content_type = Some(content_type.into());
        self
    }

    pub fn on_error(mut self, err_fn: ErrorCallback) -> Self {
        self.err_fn = Some(err_fn);
        self
    }

    pub fn report_server_error(mut self, report: bool) -> Self {
        self.report_server_error = Some(report);
        self
    }

    pub fn anonymized(mut self, anonymized_url: impl Into<String>) -> Self {
        self.anonymized_url = Some(anonymized_url.into());
        self
    }

    pub fn report_url_as_is(mut self) -> Self {
        self.report_url_as_is = true;
        self
    }

    pub fn on_lane(mut self, lane: Lane) -> Self {
        self.lane = Some(lane);
        self
    }
}

impl fmt::Debug for RestRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestRequest")
            .field("url", &self.url)
            .field("method", &self.method)
            .field("params", &self.params)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("content_type", &self.content_type)
            .field("err_fn", &self.err_fn.as_ref().map(|_| "<callback>"))
            .field("report_server_error", &self.report_server_error)
            .field("anonymized_url", &self.anonymized_url)
            .field("report_url_as_is", &self.report_url_as_is)
            .field("lane", &self.lane)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let req = RestRequest::get("/changes/");
        assert_eq!(req.method, Method::GET);
        assert!(req.params.is_none());
        assert!(req.body.is_none());
        assert!(req.report_server_error.is_none());
        assert!(!req.report_url_as_is);
    }

    #[test]
    fn test_with_json_body() {
        let req = RestRequest::new(Method::PUT, "/accounts/self/name").with_json(&json!({"name": "x"})).unwrap();
        let bytes = req.body.unwrap().into_bytes().unwrap();
        assert_eq!(&bytes[..], br#"{"name":"x"}"#);
    }

    #[test]
    fn test_raw_body_kept_verbatim() {
        let req = RestRequest::new(Method::PUT, "/x").with_body("plain text", "text/plain");
        assert_eq!(req.content_type.as_deref(), Some("text/plain"));
        assert_eq!(&req.body.unwrap().into_bytes().unwrap()[..], b"plain text");
    }

    #[test]
    fn test_debug_hides_callback() {
        let req = RestRequest::get("/x").on_error(Arc::new(|_, _| {}));
        let rendered = format!("{req:?}");
        assert!(rendered.contains("<callback>"));
    }
}
