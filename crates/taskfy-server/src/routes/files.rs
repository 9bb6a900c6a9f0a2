use axum::{
    extract::{multipart::MultipartRejection, Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use serde_json::json;
use taskfy_core::TaskfyError;
use taskfy_service::IncomingFile;

use super::response::{body_error, reply, to_error, Reply};
use super::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/upload_file/{project_id}", post(upload_file))
        .route("/document/project/{project_id}/upload", post(upload_files))
        .route("/document/project/{project_id}/upload/", post(upload_files))
        .route("/document/project/{project_id}", get(list_files))
        .route("/document/project/{project_id}/", get(list_files))
}

/// Collect every part named `field` that carries a file.
async fn read_files(
    multipart: Result<Multipart, MultipartRejection>,
    field: &str,
) -> Result<Vec<IncomingFile>, TaskfyError> {
    let mut multipart = multipart
        .map_err(|e| body_error(e.status(), "expected a multipart/form-data body", e.body_text()))?;

    let mut files = Vec::new();
    while let Some(part) = multipart
        .next_field()
        .await
        .map_err(|e| body_error(e.status(), "invalid multipart body", e.body_text()))?
    {
        if part.name() != Some(field) {
            continue;
        }
        let filename = part.file_name().map(str::to_string);
        let content_type = part.content_type().map(str::to_string);
        let data = part
            .bytes()
            .await
            .map_err(|e| body_error(e.status(), "invalid multipart body", e.body_text()))?;
        files.push(IncomingFile {
            filename,
            content_type,
            data,
        });
    }
    Ok(files)
}

async fn upload_file(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Reply, Reply> {
    let file = read_files(multipart, "file")
        .await
        .map_err(to_error)?
        .into_iter()
        .next();
    let uploaded = state
        .files
        .upload_one(Some(&project_id), file)
        .await
        .map_err(to_error)?;
    Ok(reply(StatusCode::OK, "upload completed", uploaded))
}

async fn upload_files(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Reply, Reply> {
    let files = read_files(multipart, "files").await.map_err(to_error)?;
    let uploaded = state
        .files
        .upload_many(Some(&project_id), files)
        .await
        .map_err(to_error)?;
    Ok(reply(
        StatusCode::OK,
        "upload completed",
        json!({ "files": uploaded }),
    ))
}

async fn list_files(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<Reply, Reply> {
    let listing = state
        .files
        .list(Some(&project_id))
        .await
        .map_err(to_error)?;
    Ok(reply(StatusCode::OK, "files retrieved", listing))
}
