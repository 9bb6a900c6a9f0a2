use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::TaskfyError;

/// The JSON body every handler answers with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub success: bool,
    pub message: String,
    #[serde(default = "empty_object")]
    pub data: Value,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl Envelope {
    /// Successful envelope. `data` that does not serialize to a JSON object
    /// is replaced by `{}`.
    pub fn ok<T: Serialize>(message: impl Into<String>, data: T) -> Self {
        let data = match serde_json::to_value(data) {
            Ok(v @ Value::Object(_)) => v,
            _ => empty_object(),
        };
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: empty_object(),
        }
    }
}

impl From<&TaskfyError> for Envelope {
    fn from(e: &TaskfyError) -> Self {
        Envelope::failure(e.client_message())
    }
}
