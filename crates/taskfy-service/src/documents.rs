use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use taskfy_core::validate::{body_str, require_settings, RequiredFields};
use taskfy_core::{Comment, Resource, Task, TaskfyError};
use taskfy_db::{CollectionSpec, Database};
use uuid::Uuid;

use crate::env_opt;

/// Where documents live inside the document database.
#[derive(Debug, Clone, Default)]
pub struct DocumentSettings {
    pub database: Option<String>,
    /// Collection overrides keyed by [`Resource::KIND`].
    pub collections: HashMap<String, String>,
}

impl DocumentSettings {
    pub fn from_env() -> Self {
        Self {
            database: env_opt("TASKFY_DATABASE").or_else(|| env_opt("DATABASE_NAME")),
            collections: HashMap::new(),
        }
        .collection_from_env::<Comment>()
        .collection_from_env::<Task>()
    }

    pub fn with_database(database: impl Into<String>) -> Self {
        Self {
            database: Some(database.into()),
            ..Default::default()
        }
    }

    /// Store `R`'s documents in `collection` instead of its default.
    pub fn with_collection<R: Resource>(mut self, collection: impl Into<String>) -> Self {
        self.collections.insert(R::KIND.to_string(), collection.into());
        self
    }

    fn collection_from_env<R: Resource>(self) -> Self {
        match env_opt(R::COLLECTION_ENV) {
            Some(collection) => self.with_collection::<R>(collection),
            None => self,
        }
    }

    pub fn collection_for<R: Resource>(&self) -> &str {
        self.collections
            .get(R::KIND)
            .map(String::as_str)
            .unwrap_or(R::DEFAULT_COLLECTION)
    }
}

/// Create and list project-scoped documents of any [`Resource`] kind.
pub struct DocumentService {
    db: Arc<dyn Database>,
    settings: DocumentSettings,
}

impl DocumentService {
    pub fn new(db: Arc<dyn Database>, settings: DocumentSettings) -> Self {
        Self { db, settings }
    }

    pub fn settings(&self) -> &DocumentSettings {
        &self.settings
    }

    /// Resolve and provision the database and collection for `R`.
    async fn collection<R: Resource>(&self) -> Result<(&str, &str), TaskfyError> {
        require_settings(&[("TASKFY_DATABASE", self.settings.database.as_deref())])?;
        let database = self.settings.database.as_deref().unwrap_or_default();
        let collection = self.settings.collection_for::<R>();

        self.db.create_database_if_absent(database).await?;
        self.db
            .create_collection_if_absent(
                database,
                &CollectionSpec::new(collection, R::partition_key_path()),
            )
            .await?;
        Ok((database, collection))
    }

    /// Validate the project id and `R::BODY_FIELDS`, then insert a new record.
    pub async fn create<R: Resource>(
        &self,
        project_id: Option<&str>,
        body: &Map<String, Value>,
    ) -> Result<R, TaskfyError> {
        let fields = R::BODY_FIELDS
            .iter()
            .fold(
                RequiredFields::new().field("projectId", project_id),
                |required, name| required.field(name, body_str(body, name)),
            )
            .validate()?;
        let project_id = project_id.unwrap_or_default();

        let (database, collection) = self.collection::<R>().await?;

        let record = R::build(Uuid::new_v4(), Utc::now(), project_id, &fields);
        let doc = serde_json::to_value(&record)
            .map_err(|e| TaskfyError::Internal(format!("serialize {}: {e}", R::KIND)))?;
        self.db.create_item(database, collection, &doc).await?;

        let id = doc.get("id").and_then(Value::as_str).unwrap_or_default();
        tracing::info!("created {} {id} in project {project_id} ({collection})", R::KIND);
        Ok(record)
    }

    /// Every record of the project, re-projected onto `R::FIELDS`.
    pub async fn list<R: Resource>(&self, project_id: Option<&str>) -> Result<Vec<Value>, TaskfyError> {
        RequiredFields::new()
            .field("projectId", project_id)
            .validate()?;
        let project_id = project_id.unwrap_or_default();

        let (database, collection) = self.collection::<R>().await?;
        let docs = self
            .db
            .query_partition(database, collection, project_id)
            .await?;
        Ok(docs.iter().map(R::project).collect())
    }

    pub async fn health_check(&self) -> Result<(), TaskfyError> {
        Ok(self.db.health_check().await?)
    }
}
