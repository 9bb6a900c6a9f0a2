use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use serde::Deserialize;
use taskfy_core::TaskfyError;
use taskfy_store::content_type_for_key;

use super::response::{to_error, Reply};
use super::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/blob/{*path}", get(read_blob))
}

#[derive(Debug, Deserialize)]
struct SignedQuery {
    expires: Option<String>,
    signature: Option<String>,
}

/// Serve an object behind a locally signed URL: `/blob/{bucket}/{key}`.
async fn read_blob(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(q): Query<SignedQuery>,
) -> Result<Response, Reply> {
    let store = state.files.store();
    let key = path
        .split_once('/')
        .filter(|(bucket, _)| *bucket == store.bucket())
        .map(|(_, key)| key)
        .ok_or_else(|| to_error(TaskfyError::NotFound("file not found".into())))?;

    let expires = q.expires.as_deref().and_then(|e| e.parse::<i64>().ok());
    let (Some(expires), Some(signature)) = (expires, q.signature.as_deref()) else {
        return Err(to_error(TaskfyError::Forbidden("missing URL signature".into())));
    };
    store
        .verify_signed_url(key, expires, signature)
        .map_err(|e| to_error(e.into()))?;

    let data = store.get(key).await.map_err(|e| to_error(e.into()))?;
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for_key(key))
        .header(header::CONTENT_DISPOSITION, "inline")
        .body(Body::from(data))
        .map_err(|e| to_error(TaskfyError::Internal(e.to_string())))
}
