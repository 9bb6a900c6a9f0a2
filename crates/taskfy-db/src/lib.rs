#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub use postgres::PostgresDatabase;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use taskfy_core::TaskfyError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Internal(String),
}

/// The database is only reached after collections are provisioned, so every
/// failure here is the backend's, except documents the caller built wrong.
impl From<DbError> for TaskfyError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::InvalidDocument(msg) => TaskfyError::Internal(msg),
            other => TaskfyError::Backend(other.to_string()),
        }
    }
}

/// A collection and the JSON pointer to the field its documents are
/// partitioned by (`/project_id`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    pub name: String,
    pub partition_key: String,
}

impl CollectionSpec {
    pub fn new(name: impl Into<String>, partition_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            partition_key: partition_key.into(),
        }
    }
}

/// Document database with logical databases, partitioned collections and
/// partition-scoped queries.
///
/// `SqliteDatabase` is the default backend; `PostgresDatabase` is available
/// behind the `postgres` feature.
#[async_trait]
pub trait Database: Send + Sync {
    /// Create a logical database. No-op if it already exists.
    async fn create_database_if_absent(&self, database: &str) -> Result<(), DbError>;

    /// Create a collection inside `database`. No-op if it exists with the same
    /// partition key; `DbError::Conflict` if it exists with a different one.
    async fn create_collection_if_absent(
        &self,
        database: &str,
        spec: &CollectionSpec,
    ) -> Result<(), DbError>;

    /// Insert a new document. The document must carry a string `id` and a
    /// string value at the collection's partition key.
    async fn create_item(
        &self,
        database: &str,
        collection: &str,
        item: &Value,
    ) -> Result<(), DbError>;

    /// All documents whose partition value equals `partition_value`, oldest first.
    async fn query_partition(
        &self,
        database: &str,
        collection: &str,
        partition_value: &str,
    ) -> Result<Vec<Value>, DbError>;

    async fn health_check(&self) -> Result<(), DbError>;
}

/// Pull the `id` and partition value out of a document.
pub(crate) fn document_keys(item: &Value, partition_key: &str) -> Result<(String, String), DbError> {
    let id = item
        .get("id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DbError::InvalidDocument("document has no string id".into()))?;
    let partition = item
        .pointer(partition_key)
        .and_then(Value::as_str)
        .ok_or_else(|| {
            DbError::InvalidDocument(format!(
                "document {id} has no string value at partition key {partition_key}"
            ))
        })?;
    Ok((id.to_string(), partition.to_string()))
}

pub(crate) fn check_partition_key(spec: &CollectionSpec) -> Result<(), DbError> {
    if spec.partition_key.starts_with('/') && spec.partition_key.len() > 1 {
        Ok(())
    } else {
        Err(DbError::InvalidDocument(format!(
            "partition key must be a path like /field, got '{}'",
            spec.partition_key
        )))
    }
}

// -- Configuration --

/// Which backend to open and where.
#[derive(Debug, Clone, Default)]
pub struct DbConfig {
    /// Postgres connection URL. When set to a `postgres://` URL, Postgres is used.
    pub database_url: Option<String>,
    /// SQLite file path (used when no Postgres URL is configured).
    pub sqlite_path: Option<String>,
}

impl DbConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("TASKFY_DATABASE_URL")
                .or_else(|_| std::env::var("DATABASE_URL"))
                .ok()
                .filter(|s| !s.is_empty()),
            sqlite_path: std::env::var("TASKFY_SQLITE_PATH")
                .ok()
                .filter(|s| !s.is_empty()),
        }
    }

    pub fn is_postgres(&self) -> bool {
        self.database_url
            .as_deref()
            .is_some_and(|u| u.starts_with("postgres://") || u.starts_with("postgresql://"))
    }
}

/// Default data directory: `$XDG_DATA_HOME/taskfy` or `~/.local/share/taskfy`.
pub fn data_dir() -> PathBuf {
    let base = if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg)
    } else if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".local/share")
    } else {
        PathBuf::from(".")
    };
    base.join("taskfy")
}

// -- Factory --

/// Open the configured backend.
pub async fn open_database(config: &DbConfig) -> Result<Arc<dyn Database>, DbError> {
    if config.is_postgres() {
        #[cfg(feature = "postgres")]
        {
            let url = config.database_url.as_deref().unwrap_or_default();
            Ok(Arc::new(PostgresDatabase::connect(url).await?))
        }
        #[cfg(not(feature = "postgres"))]
        {
            Err(DbError::Internal(
                "Postgres URL configured but the 'postgres' feature is not enabled".into(),
            ))
        }
    } else {
        #[cfg(feature = "sqlite")]
        {
            Ok(Arc::new(SqliteDatabase::open(config)?))
        }
        #[cfg(not(feature = "sqlite"))]
        {
            Err(DbError::Internal(
                "no Postgres URL configured and the 'sqlite' feature is not enabled".into(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn document_keys_reads_id_and_partition() {
        let doc = json!({ "id": "c1", "project_id": "p1" });
        let (id, part) = document_keys(&doc, "/project_id").unwrap();
        assert_eq!(id, "c1");
        assert_eq!(part, "p1");
    }

    #[test]
    fn document_keys_rejects_missing_values() {
        let err = document_keys(&json!({ "project_id": "p1" }), "/project_id").unwrap_err();
        assert!(matches!(err, DbError::InvalidDocument(_)));

        // partition field present under another name
        let err = document_keys(&json!({ "id": "t1", "projectId": "p1" }), "/project_id")
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidDocument(_)));

        let err = document_keys(&json!({ "id": "t1", "project_id": 7 }), "/project_id")
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidDocument(_)));
    }

    #[test]
    fn db_errors_map_to_server_errors() {
        let err: TaskfyError = DbError::Conflict("document 1".into()).into();
        assert!(matches!(err, TaskfyError::Backend(_)));
        assert_eq!(err.status_code(), 500);

        let err: TaskfyError = DbError::InvalidDocument("no id".into()).into();
        assert!(matches!(err, TaskfyError::Internal(_)));
    }

    #[test]
    fn partition_key_must_be_a_path() {
        assert!(check_partition_key(&CollectionSpec::new("c", "/project_id")).is_ok());
        assert!(check_partition_key(&CollectionSpec::new("c", "project_id")).is_err());
        assert!(check_partition_key(&CollectionSpec::new("c", "/")).is_err());
    }

    #[test]
    fn db_config_selects_backend_by_url() {
        let config = DbConfig {
            database_url: Some("postgres://u:p@localhost/taskfy".into()),
            sqlite_path: None,
        };
        assert!(config.is_postgres());

        let config = DbConfig {
            database_url: Some("postgresql://localhost/taskfy".into()),
            sqlite_path: None,
        };
        assert!(config.is_postgres());

        let config = DbConfig {
            database_url: Some("sqlite://taskfy.db".into()),
            sqlite_path: None,
        };
        assert!(!config.is_postgres());

        assert!(!DbConfig::default().is_postgres());
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn open_database_defaults_to_sqlite() {
        let tmp = tempfile::tempdir().unwrap();
        let config = DbConfig {
            database_url: None,
            sqlite_path: Some(tmp.path().join("t.db").to_string_lossy().to_string()),
        };
        let db = open_database(&config).await.unwrap();
        db.health_check().await.unwrap();
    }
}
