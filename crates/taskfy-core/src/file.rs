//! Upload rules and the shapes returned by the file handlers.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::TaskfyError;

pub const ALLOWED_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".pdf", ".txt", ".docx"];

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Extension of `filename` including the leading dot, as written (`".PDF"`).
/// Empty when there is none.
pub fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default()
}

/// Check `filename` against [`ALLOWED_EXTENSIONS`], ignoring case.
pub fn check_extension(filename: &str) -> Result<(), TaskfyError> {
    let ext = extension_of(filename);
    if ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
        Ok(())
    } else {
        Err(TaskfyError::Validation(format!(
            "extension '{ext}' of '{filename}' is not allowed; expected one of: {}",
            ALLOWED_EXTENSIONS.join(", ")
        )))
    }
}

/// A project id must be a single key segment, or one project's root could
/// nest inside another's.
pub fn check_project_id(project_id: &str) -> Result<(), TaskfyError> {
    if project_id.contains(['/', '\\']) || matches!(project_id, "." | "..") {
        return Err(TaskfyError::Validation(format!(
            "invalid projectId '{project_id}': must not contain '/' or '\\' or be '.' or '..'"
        )));
    }
    Ok(())
}

/// Key root under which all of a project's objects live. Always ends in `/`
/// so one project's root is never a prefix of another's.
pub fn project_root(prefix: &str, project_id: &str) -> Result<String, TaskfyError> {
    check_project_id(project_id)?;
    Ok(format!("{prefix}{project_id}/"))
}

/// `{root}{uuid}{ext}` for the single-file upload path.
pub fn unique_key(root: &str, filename: &str) -> String {
    format!("{root}{}{}", Uuid::new_v4().simple(), extension_of(filename))
}

/// `{root}{sanitized filename}` for the multi-file upload path.
pub fn sanitized_key(root: &str, filename: &str) -> String {
    format!("{root}{}", sanitize_filename(filename))
}

pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            ' ' | ':' | '\\' | '/' => '_',
            other => other,
        })
        .collect()
}

/// Content type for an upload: what the client declared, else what the bytes
/// look like, else [`DEFAULT_CONTENT_TYPE`].
pub fn detect_content_type(declared: Option<&str>, data: &[u8]) -> String {
    if let Some(ct) = declared.map(str::trim).filter(|ct| !ct.is_empty()) {
        return ct.to_string();
    }
    infer::get(data)
        .map(|kind| kind.mime_type().to_string())
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string())
}

/// One stored object as reported by the listing handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub id: String,
    pub name: String,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
    pub size: u64,
    pub url: String,
}

/// One accepted upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub blob_name: String,
    pub url: String,
    pub content_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectFiles {
    pub id: String,
    pub files: Vec<FileEntry>,
}
