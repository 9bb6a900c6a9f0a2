pub mod blobs;
pub mod documents;
pub mod files;
pub mod health;
pub mod response;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    Router,
};
use taskfy_core::TaskfyError;
use taskfy_service::{DocumentService, FileService};
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use response::{to_error, Reply};

pub struct InnerAppState {
    pub documents: DocumentService,
    pub files: FileService,
    pub max_upload_bytes: usize,
}

pub type AppState = Arc<InnerAppState>;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .merge(health::routes())
        .merge(documents::routes())
        .merge(files::routes())
        .merge(blobs::routes())
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found() -> Reply {
    to_error(TaskfyError::NotFound("route not found".into()))
}
