//! Request URL building and query-string encoding.
//!
//! Query values are encoded like `encodeURIComponent`, with `'`, `(`, `)` and
//! `*` additionally escaped (RFC 5987). This matches the server's own query
//! canonicalization, so equivalent requests always produce the same cache key.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Characters left as-is: ASCII alphanumerics and `-_.!~`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'!').remove(b'~');

/// Value of a single query parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// Emits only the encoded key, e.g. `?verbose`.
    Flag,
    /// Emits one `key=value` pair.
    One(String),
    /// Emits one `key=value` pair per element, in order.
    Many(Vec<String>),
}

/// Ordered query parameters. Insertion order is the serialization order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, ParamValue)>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`, replacing an earlier value in place.
    pub fn insert(&mut self, key: impl Into<String>, value: ParamValue) {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn flag(mut self, key: impl Into<String>) -> Self {
        self.insert(key, ParamValue::Flag);
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.insert(key, ParamValue::One(value.to_string()));
        self
    }

    pub fn params<I, V>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        self.insert(key, ParamValue::Many(values.into_iter().map(|v| v.to_string()).collect()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Serialize to `k=v&k2` form without the leading `?`.
    pub fn to_query_string(&self) -> String {
        let mut pairs = Vec::new();
        for (key, value) in self.iter() {
            let key = encode(key);
            match value {
                ParamValue::Flag => pairs.push(key),
                ParamValue::One(v) => pairs.push(format!("{key}={}", encode(v))),
                ParamValue::Many(values) => pairs.extend(values.iter().map(|v| format!("{key}={}", encode(v)))),
            }
        }
        pairs.join("&")
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for QueryParams {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        iter.into_iter().fold(Self::new(), |params, (k, v)| params.param(k, v))
    }
}

/// Percent-encode a single query key or value.
pub fn encode(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

/// Build `base + url`, appending `?query` when there are parameters.
pub fn url_with_params(base: &str, url: &str, params: Option<&QueryParams>) -> String {
    match params {
        Some(params) if !params.is_empty() => format!("{base}{url}?{}", params.to_query_string()),
        _ => format!("{base}{url}"),
    }
}
