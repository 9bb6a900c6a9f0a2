use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use taskfy_core::{Envelope, TaskfyError};

/// What every JSON handler answers with, on success and on failure.
pub type Reply = (StatusCode, Json<Envelope>);

pub fn reply<T: Serialize>(status: StatusCode, message: impl Into<String>, data: T) -> Reply {
    (status, Json(Envelope::ok(message, data)))
}

/// Turn an error into its envelope. Server-side detail is logged here and
/// never leaves the process.
pub fn to_error(e: TaskfyError) -> Reply {
    if e.is_server_error() {
        tracing::error!("{e}");
    } else {
        tracing::warn!("{e}");
    }
    let status =
        StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(Envelope::from(&e)))
}

/// Classify an extractor rejection: bodies over the size limit are 413, every
/// other malformed body is a validation error.
pub fn body_error(status: StatusCode, context: &str, detail: String) -> TaskfyError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        TaskfyError::PayloadTooLarge(format!("{context}: request body is too large"))
    } else {
        TaskfyError::Validation(format!("{context}: {detail}"))
    }
}
