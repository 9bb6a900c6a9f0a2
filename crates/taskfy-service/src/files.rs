use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use taskfy_core::file::{
    check_extension, check_project_id, detect_content_type, project_root, sanitized_key,
    unique_key, FileEntry, ProjectFiles, UploadedFile,
};
use taskfy_core::validate::{require_settings, RequiredFields};
use taskfy_core::TaskfyError;
use taskfy_store::ObjectStore;

use crate::env_opt;

pub const DEFAULT_URL_EXPIRY: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
pub struct FileSettings {
    /// Prepended to every project's key root (`{prefix}{projectId}/`).
    pub project_prefix: Option<String>,
    pub url_expiry: Duration,
}

impl FileSettings {
    pub fn from_env() -> Self {
        Self {
            project_prefix: env_opt("TASKFY_PROJECT_PREFIX")
                .or_else(|| env_opt("FUNCTION_PROJECT_PREFIX")),
            url_expiry: DEFAULT_URL_EXPIRY,
        }
    }
}

/// One file part of an upload request.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl IncomingFile {
    pub fn new(filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            filename: Some(filename.into()),
            content_type: None,
            data: data.into(),
        }
    }
}

/// How an upload names its objects under the project root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPolicy {
    /// `{uuid}{ext}`; never collides.
    Unique,
    /// The original filename with separators replaced; overwrites.
    Sanitized,
}

/// Upload, list and sign project files in the object store.
pub struct FileService {
    store: Arc<dyn ObjectStore>,
    settings: FileSettings,
}

impl FileService {
    pub fn new(store: Arc<dyn ObjectStore>, settings: FileSettings) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    fn prefix(&self) -> Result<&str, TaskfyError> {
        require_settings(&[("TASKFY_PROJECT_PREFIX", self.settings.project_prefix.as_deref())])?;
        Ok(self.settings.project_prefix.as_deref().unwrap_or_default())
    }

    /// Store one file under a fresh unique name.
    pub async fn upload_one(
        &self,
        project_id: Option<&str>,
        file: Option<IncomingFile>,
    ) -> Result<UploadedFile, TaskfyError> {
        RequiredFields::new()
            .field("projectId", project_id)
            .field("file", file.as_ref().and_then(|f| f.filename.as_deref()))
            .validate()?;
        check_project_id(project_id.unwrap_or_default())?;
        let files: Vec<IncomingFile> = file.into_iter().collect();
        let mut uploaded = self
            .upload(project_id.unwrap_or_default(), files, KeyPolicy::Unique)
            .await?;
        uploaded
            .pop()
            .ok_or_else(|| TaskfyError::Internal("upload produced no file".into()))
    }

    /// Store every file under its sanitized original name. Nothing is written
    /// unless every file passes validation.
    pub async fn upload_many(
        &self,
        project_id: Option<&str>,
        files: Vec<IncomingFile>,
    ) -> Result<Vec<UploadedFile>, TaskfyError> {
        RequiredFields::new()
            .field("projectId", project_id)
            .field("files", files.first().and_then(|f| f.filename.as_deref()))
            .validate()?;
        check_project_id(project_id.unwrap_or_default())?;
        self.upload(project_id.unwrap_or_default(), files, KeyPolicy::Sanitized)
            .await
    }

    async fn upload(
        &self,
        project_id: &str,
        files: Vec<IncomingFile>,
        policy: KeyPolicy,
    ) -> Result<Vec<UploadedFile>, TaskfyError> {
        let root = project_root(self.prefix()?, project_id)?;

        let mut planned = Vec::with_capacity(files.len());
        for file in files {
            let filename = file
                .filename
                .as_deref()
                .filter(|name| !name.is_empty())
                .ok_or_else(|| TaskfyError::Validation("every file needs a filename".into()))?;
            check_extension(filename)?;
            let key = match policy {
                KeyPolicy::Unique => unique_key(&root, filename),
                KeyPolicy::Sanitized => sanitized_key(&root, filename),
            };
            let content_type = detect_content_type(file.content_type.as_deref(), &file.data);
            planned.push((key, content_type, file.data));
        }

        self.store.create_bucket_if_absent().await?;

        let mut uploaded = Vec::with_capacity(planned.len());
        for (key, content_type, data) in planned {
            let size = data.len();
            self.store.put(&key, data, &content_type).await?;
            let url = self.store.signed_url(&key, self.settings.url_expiry).await?;
            tracing::info!("uploaded {key} ({size} bytes, {content_type})");
            uploaded.push(UploadedFile {
                blob_name: key,
                url,
                content_type,
            });
        }
        Ok(uploaded)
    }

    /// Every object under the project's root, each with a signed URL.
    pub async fn list(&self, project_id: Option<&str>) -> Result<ProjectFiles, TaskfyError> {
        RequiredFields::new()
            .field("projectId", project_id)
            .validate()?;
        let project_id = project_id.unwrap_or_default();
        check_project_id(project_id)?;
        let root = project_root(self.prefix()?, project_id)?;

        if !self.store.bucket_exists().await? {
            return Err(TaskfyError::NotFound(format!(
                "container {} not found",
                self.store.bucket()
            )));
        }

        let mut files = Vec::new();
        for object in self.store.list(&root).await? {
            let name = object
                .key
                .strip_prefix(&root)
                .unwrap_or(&object.key)
                .to_string();
            let url = self
                .store
                .signed_url(&object.key, self.settings.url_expiry)
                .await?;
            files.push(FileEntry {
                id: name.clone(),
                name,
                uploaded_at: object.created_at,
                last_modified: object.last_modified,
                size: object.size,
                url,
            });
        }
        Ok(ProjectFiles {
            id: project_id.to_string(),
            files,
        })
    }

    /// A signed URL per key, or `None` for keys with no object behind them.
    pub async fn signed_urls(
        &self,
        keys: &[String],
    ) -> Result<Vec<(String, Option<String>)>, TaskfyError> {
        let mut urls = Vec::with_capacity(keys.len());
        for key in keys {
            let url = if self.store.exists(key).await? {
                Some(self.store.signed_url(key, self.settings.url_expiry).await?)
            } else {
                None
            };
            urls.push((key.clone(), url));
        }
        Ok(urls)
    }
}
