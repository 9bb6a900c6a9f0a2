//! Presence checks run before any backend call.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::TaskfyError;

/// Collects `(field, value)` pairs pulled from the path and body and fails
/// with one combined message naming every missing field.
#[derive(Debug, Default)]
pub struct RequiredFields<'a> {
    entries: Vec<(&'a str, Option<&'a str>)>,
}

impl<'a> RequiredFields<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &'a str, value: Option<&'a str>) -> Self {
        self.entries.push((name, value));
        self
    }

    pub fn validate(self) -> Result<ValidatedFields, TaskfyError> {
        let missing: Vec<&str> = self
            .entries
            .iter()
            .filter(|(_, v)| v.map_or(true, str::is_empty))
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(TaskfyError::Validation(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }
        Ok(ValidatedFields {
            values: self
                .entries
                .into_iter()
                .filter_map(|(name, v)| v.map(|v| (name.to_string(), v.to_string())))
                .collect(),
        })
    }
}

/// Field values that passed [`RequiredFields::validate`].
#[derive(Debug, Clone, Default)]
pub struct ValidatedFields {
    values: HashMap<String, String>,
}

impl ValidatedFields {
    pub fn get(&self, name: &str) -> &str {
        self.values.get(name).map(String::as_str).unwrap_or_default()
    }
}

/// Pull a string field out of a JSON body. Non-string values count as absent.
pub fn body_str<'a>(body: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    body.get(name).and_then(Value::as_str)
}

/// Parse a request body into a JSON object. An empty body is an empty object.
pub fn parse_body(raw: &[u8]) -> Result<Map<String, Value>, TaskfyError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(TaskfyError::Validation(
            "request body must be a JSON object".into(),
        )),
        Err(e) => Err(TaskfyError::Validation(format!("invalid JSON body: {e}"))),
    }
}

/// Check that backend settings are present. Names of missing settings go
/// into the error detail, which is logged but not returned to clients.
pub fn require_settings(settings: &[(&str, Option<&str>)]) -> Result<(), TaskfyError> {
    let missing: Vec<&str> = settings
        .iter()
        .filter(|(_, v)| v.map_or(true, str::is_empty))
        .map(|(name, _)| *name)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(TaskfyError::Config(format!(
            "missing settings: {}",
            missing.join(", ")
        )))
    }
}
