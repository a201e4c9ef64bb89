//! Buffered responses and the prefixed JSON wire format.
//!
//! Every JSON body the server returns starts with `)]}'` to defeat JSON
//! hijacking. The prefix must be present and is stripped before parsing.

use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use revrest_core::Error;
use serde_json::Value;

/// Anti-JSON-hijacking prefix of every JSON response body.
pub const JSON_PREFIX: &str = ")]}'";

/// A fully buffered HTTP response.
#[derive(Debug, Clone)]
pub struct RestResponse {
    /// The URL the request was sent to
    pub url: String,
    /// HTTP status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body bytes
    pub body: Bytes,
}

impl RestResponse {
    pub fn new(url: impl Into<String>, status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self { url: url.into(), status, headers: HeaderMap::new(), body: body.into() }
    }

    /// True for 2xx statuses.
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Body of a response read both raw and, when well formed, parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponsePayload {
    /// Parsed JSON, `None` when the body was malformed
    pub parsed: Option<Value>,
    /// Body text as received
    pub raw: String,
}

/// Strip the JSON prefix from `source` and parse the remainder.
pub fn parse_prefixed_json(source: &str) -> Result<Value, Error> {
    let json = source.strip_prefix(JSON_PREFIX).ok_or_else(|| {
        let head: String = source.chars().take(16).collect();
        Error::MalformedPayload(format!("response does not start with {JSON_PREFIX:?}: {head:?}"))
    })?;
    Ok(serde_json::from_str(json)?)
}

/// Parse a response body strictly: a missing prefix or bad JSON is an error.
pub fn response_object(response: &RestResponse) -> Result<Value, Error> {
    parse_prefixed_json(&response.text())
}

/// Read a response body leniently, keeping the raw text alongside.
pub fn read_payload(response: &RestResponse) -> ResponsePayload {
    let raw = response.text();
    let parsed = parse_prefixed_json(&raw).ok();
    ResponsePayload { parsed, raw }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_prefixed_json() {
        let value = parse_prefixed_json(")]}'\n{\"_number\": 42}").unwrap();
        assert_eq!(value, json!({"_number": 42}));
    }

    #[test]
    fn test_missing_prefix_is_malformed() {
        let result = parse_prefixed_json("{\"_number\": 42}");
        assert!(matches!(result, Err(Error::MalformedPayload(_))));
    }

    #[test]
    fn test_wrong_prefix_is_malformed() {
        let result = parse_prefixed_json(")]}\n[]");
        assert!(matches!(result, Err(Error::MalformedPayload(_))));
    }

    #[test]
    fn test_bad_json_after_prefix() {
        let result = parse_prefixed_json(")]}'\n{\"a\":");
        assert!(matches!(result, Err(Error::JsonParse(_))));
    }

    #[test]
    fn test_response_ok() {
        assert!(RestResponse::new("/a", StatusCode::NO_CONTENT, "").ok());
        assert!(!RestResponse::new("/a", StatusCode::NOT_FOUND, "").ok());
        assert!(!RestResponse::new("/a", StatusCode::TOO_MANY_REQUESTS, "").ok());
    }

    #[test]
    fn test_read_payload_lenient() {
        let response = RestResponse::new("/a", StatusCode::OK, "Not found");
        let payload = read_payload(&response);
        assert_eq!(payload.parsed, None);
        assert_eq!(payload.raw, "Not found");

        let response = RestResponse::new("/a", StatusCode::OK, ")]}'\n[1]");
        assert_eq!(read_payload(&response).parsed, Some(json!([1])));
        assert_eq!(response_object(&response).unwrap(), json!([1]));
    }
}
