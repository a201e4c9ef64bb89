//! Unified error types for revrest.
//!
//! The `Display` output of every variant starts with a stable upper-case code
//! so that log lines and CLI output can be grepped reliably.

/// Unified error type for the REST access layer.
///
/// Cloneable so one settled outcome can be handed to every caller waiting on a
/// deduplicated request.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., a body that cannot be serialized).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// A request URL could not be built or parsed.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// The transport failed before any HTTP status was received.
    #[error("NETWORK_ERROR: {url}: {message}")]
    Network { url: String, message: String },

    /// The response body did not start with the anti-hijacking prefix.
    #[error("MALFORMED_PAYLOAD: {0}")]
    MalformedPayload(String),

    /// The response body had the prefix but the remainder is not JSON.
    #[error("JSON_PARSE: {0}")]
    JsonParse(String),

    /// A scheduled task was lost before it produced a response.
    #[error("SCHEDULER: {0}")]
    Scheduler(String),

    /// The initial-data payload could not be loaded.
    #[error("INITIAL_DATA: {0}")]
    InitialData(String),
}

impl Error {
    /// Wrap a transport failure, keeping the whole source chain in the message.
    pub fn network(url: impl Into<String>, err: &(dyn std::error::Error + 'static)) -> Self {
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Error::Network { url: url.into(), message }
    }

    /// True for failures of the transport itself, as opposed to bad payloads.
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Network { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::JsonParse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("outer")]
    struct Outer(#[source] Inner);

    #[derive(Debug, thiserror::Error)]
    #[error("connection refused")]
    struct Inner;

    #[test]
    fn test_error_display() {
        let err = Error::MalformedPayload("missing prefix".to_string());
        assert!(err.to_string().starts_with("MALFORMED_PAYLOAD"));
        assert!(err.to_string().contains("missing prefix"));
    }

    #[test]
    fn test_network_keeps_source_chain() {
        let err = Error::network("http://host/a", &Outer(Inner));
        assert!(err.is_network());
        assert_eq!(err.to_string(), "NETWORK_ERROR: http://host/a: outer: connection refused");
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::JsonParse(_)));
        assert!(!err.is_network());
    }
}
