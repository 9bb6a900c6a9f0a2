use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskfyError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl TaskfyError {
    pub fn status_code(&self) -> u16 {
        match self {
            TaskfyError::Validation(_) => 400,
            TaskfyError::Forbidden(_) => 403,
            TaskfyError::NotFound(_) => 404,
            TaskfyError::PayloadTooLarge(_) => 413,
            TaskfyError::Config(_) | TaskfyError::Backend(_) | TaskfyError::Internal(_) => 500,
        }
    }

    /// Message safe to hand back to a client.
    ///
    /// Server-side variants carry diagnostic detail that only goes to the log.
    pub fn client_message(&self) -> String {
        match self {
            TaskfyError::Validation(msg)
            | TaskfyError::Forbidden(msg)
            | TaskfyError::NotFound(msg)
            | TaskfyError::PayloadTooLarge(msg) => msg.clone(),
            TaskfyError::Config(_) => "server configuration is incomplete".into(),
            TaskfyError::Backend(_) => "error communicating with the backend".into(),
            TaskfyError::Internal(_) => "internal server error".into(),
        }
    }

    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}
