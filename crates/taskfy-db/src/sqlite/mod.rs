pub(crate) mod migrations;
pub mod queries;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::Connection;
use serde_json::Value;

use crate::{CollectionSpec, Database, DbConfig, DbError};

/// Extension trait that converts `rusqlite::Result<T>` into `Result<T, DbError>`.
pub(crate) trait SqliteResultExt<T> {
    fn to_db(self) -> Result<T, DbError>;
}

impl<T> SqliteResultExt<T> for rusqlite::Result<T> {
    fn to_db(self) -> Result<T, DbError> {
        self.map_err(map_sqlite_err)
    }
}

#[derive(Clone)]
pub struct SqliteDatabase {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDatabase {
    pub fn open(config: &DbConfig) -> Result<Self, DbError> {
        let path = config
            .sqlite_path
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| crate::data_dir().join("taskfy.db"));
        std::fs::create_dir_all(path.parent().unwrap_or(Path::new(".")))?;
        Self::open_path(&path)
    }

    pub fn open_path(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path).to_db()?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;",
        )
        .to_db()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        tracing::info!("opened sqlite document store at {}", path.display());
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory().to_db()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;").to_db()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    pub(crate) fn with_conn<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Connection) -> Result<T, DbError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|_| DbError::Internal("lock poisoned".into()))?;
        f(&conn)
    }

    fn run_migrations(&self) -> Result<(), DbError> {
        self.with_conn(|conn| {
            migrations::run(conn)?;
            Ok(())
        })
    }

    async fn blocking<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&SqliteDatabase) -> Result<T, DbError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }
}

/// Map a `rusqlite::Error` into a `DbError::Internal`.
pub(crate) fn map_sqlite_err(e: rusqlite::Error) -> DbError {
    DbError::Internal(e.to_string())
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn create_database_if_absent(&self, database: &str) -> Result<(), DbError> {
        let database = database.to_string();
        self.blocking(move |db| db.create_database_sync(&database))
            .await
    }

    async fn create_collection_if_absent(
        &self,
        database: &str,
        spec: &CollectionSpec,
    ) -> Result<(), DbError> {
        let database = database.to_string();
        let spec = spec.clone();
        self.blocking(move |db| db.create_collection_sync(&database, &spec))
            .await
    }

    async fn create_item(
        &self,
        database: &str,
        collection: &str,
        item: &Value,
    ) -> Result<(), DbError> {
        let database = database.to_string();
        let collection = collection.to_string();
        let item = item.clone();
        self.blocking(move |db| db.create_item_sync(&database, &collection, &item))
            .await
    }

    async fn query_partition(
        &self,
        database: &str,
        collection: &str,
        partition_value: &str,
    ) -> Result<Vec<Value>, DbError> {
        let database = database.to_string();
        let collection = collection.to_string();
        let partition_value = partition_value.to_string();
        self.blocking(move |db| db.query_partition_sync(&database, &collection, &partition_value))
            .await
    }

    async fn health_check(&self) -> Result<(), DbError> {
        self.blocking(|db| {
            db.with_conn(|conn| {
                conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                    .to_db()?;
                Ok(())
            })
        })
        .await
    }
}
