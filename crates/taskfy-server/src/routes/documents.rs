use axum::{
    extract::{rejection::BytesRejection, Path, State},
    http::StatusCode,
    routing::get,
    Router,
};
use bytes::Bytes;
use serde_json::{Map, Value};
use taskfy_core::validate::parse_body;
use taskfy_core::{Comment, Resource, Task};

use super::response::{body_error, reply, to_error, Reply};
use super::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/project/{project_id}/comment",
            get(list::<Comment>).post(create::<Comment>),
        )
        .route(
            "/project/{project_id}/task",
            get(list::<Task>).post(create::<Task>),
        )
}

async fn create<R: Resource + 'static>(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Reply, Reply> {
    let body = body
        .map_err(|e| to_error(body_error(e.status(), "invalid request body", e.body_text())))?;
    let body = parse_body(&body).map_err(to_error)?;
    let record = state
        .documents
        .create::<R>(Some(&project_id), &body)
        .await
        .map_err(to_error)?;
    Ok(reply(
        StatusCode::CREATED,
        format!("{} created", R::KIND),
        record,
    ))
}

async fn list<R: Resource + 'static>(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<Reply, Reply> {
    let items = state
        .documents
        .list::<R>(Some(&project_id))
        .await
        .map_err(to_error)?;

    let mut data = Map::new();
    data.insert("projectId".into(), Value::String(project_id));
    data.insert(R::LIST_KEY.into(), Value::Array(items));
    Ok(reply(
        StatusCode::OK,
        format!("{} retrieved", R::LIST_KEY),
        data,
    ))
}
