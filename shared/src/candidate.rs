//! Lenient field access over untrusted model output.
//!
//! Completions are expected to be a JSON object but nothing about their fields can be
//! trusted. [`Candidate::parse`] is the single parse step; the accessors never fail and
//! return `None`/empty for missing, null, blank or mistyped fields.

use serde_json::{Map, Value};

use crate::{Error, Result};

/// A parsed JSON object from a completion.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate(Map<String, Value>);

impl Candidate {
    /// Parse completion text into a JSON object.
    ///
    /// A surrounding Markdown code fence is tolerated. Anything that is not a JSON
    /// object is an error.
    pub fn parse(text: &str) -> Result<Self> {
        let body = strip_code_fence(text.trim());
        match serde_json::from_str::<Value>(body)? {
            Value::Object(map) => Ok(Self(map)),
            other => Err(Error::Validation(format!(
                "completion is not a JSON object (found {})",
                kind(&other)
            ))),
        }
    }

    /// Trimmed, non-blank string field.
    pub fn text(&self, key: &str) -> Option<String> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    pub fn flag(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    /// Non-negative integer field; numeric strings are accepted.
    pub fn count(&self, key: &str) -> Option<u32> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// List of non-blank strings. A lone string is read as a one-element list.
    pub fn strings(&self, key: &str) -> Vec<String> {
        let values: Vec<&Value> = match self.0.get(key) {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(v @ Value::String(_)) => vec![v],
            _ => Vec::new(),
        };
        values
            .into_iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// List of nested objects. A bare string element becomes `{"name": <string>}`.
    pub fn items(&self, key: &str) -> Vec<Candidate> {
        let Some(Value::Array(items)) = self.0.get(key) else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|item| match item {
                Value::Object(map) => Some(Candidate(map.clone())),
                Value::String(name) => {
                    let mut map = Map::new();
                    map.insert("name".to_string(), Value::String(name.clone()));
                    Some(Candidate(map))
                }
                _ => None,
            })
            .collect()
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(inner) = text.strip_prefix("```") else {
        return text;
    };
    // drop an optional language tag on the opening fence
    let inner = match inner.find('\n') {
        Some(newline) => &inner[newline + 1..],
        None => inner,
    };
    inner.trim_end().strip_suffix("```").unwrap_or(inner).trim()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
