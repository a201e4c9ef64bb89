//! Seeding the result cache from an initial-data payload.
//!
//! The payload is a JSON object mapping cache keys to the parsed response that
//! would have been fetched for them, e.g. `{"/config/server/info": {...}}`.

use super::SiteBasedCache;
use crate::Error;
use serde_json::{Map, Value};
use std::path::Path;

/// Read an initial-data payload from a JSON file.
pub fn load_initial_data(path: impl AsRef<Path>) -> Result<Map<String, Value>, Error> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::InitialData(format!("failed to read {}: {}", path.display(), e)))?;
    parse_initial_data(&contents)
}

/// Parse an initial-data payload. The top level must be a JSON object.
pub fn parse_initial_data(contents: &str) -> Result<Map<String, Value>, Error> {
    match serde_json::from_str::<Value>(contents)? {
        Value::Object(entries) => Ok(entries),
        other => Err(Error::InitialData(format!("expected a JSON object, got {}", kind_of(&other)))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl SiteBasedCache<Value> {
    /// Seed the current partition with every entry of an initial-data payload.
    pub fn seed_initial_data(&self, entries: Map<String, Value>) {
        let count = entries.len();
        self.seed(entries);
        tracing::debug!(count, site = %self.site(), "seeded result cache from initial data");
    }
}
