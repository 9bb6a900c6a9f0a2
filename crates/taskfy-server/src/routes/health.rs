use axum::{extract::State, http::StatusCode, routing::get, Router};
use serde_json::json;

use super::response::{reply, to_error, Reply};
use super::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/health", get(health))
}

async fn health(State(state): State<AppState>) -> Result<Reply, Reply> {
    state.documents.health_check().await.map_err(to_error)?;
    Ok(reply(StatusCode::OK, "ok", json!({ "database": "ok" })))
}
