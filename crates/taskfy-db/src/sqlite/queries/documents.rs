use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use serde_json::Value;

use super::super::{SqliteDatabase, SqliteResultExt};
use crate::{check_partition_key, document_keys, CollectionSpec, DbError};

fn collection_partition_key(
    conn: &Connection,
    database: &str,
    collection: &str,
) -> Result<Option<String>, DbError> {
    conn.query_row(
        "SELECT partition_key FROM collections WHERE database = ?1 AND name = ?2",
        params![database, collection],
        |row| row.get(0),
    )
    .optional()
    .to_db()
}

fn require_collection(
    conn: &Connection,
    database: &str,
    collection: &str,
) -> Result<String, DbError> {
    collection_partition_key(conn, database, collection)?
        .ok_or_else(|| DbError::NotFound(format!("collection {database}/{collection}")))
}

impl SqliteDatabase {
    pub fn create_database_sync(&self, database: &str) -> Result<(), DbError> {
        self.with_conn(|conn| {
            let inserted = conn
                .execute(
                    "INSERT OR IGNORE INTO databases (name, created_at) VALUES (?1, ?2)",
                    params![database, Utc::now()],
                )
                .to_db()?;
            if inserted > 0 {
                tracing::info!("created database {database}");
            }
            Ok(())
        })
    }

    pub fn create_collection_sync(
        &self,
        database: &str,
        spec: &CollectionSpec,
    ) -> Result<(), DbError> {
        check_partition_key(spec)?;
        self.with_conn(|conn| {
            let db_exists: bool = conn
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM databases WHERE name = ?1)",
                    params![database],
                    |row| row.get(0),
                )
                .to_db()?;
            if !db_exists {
                return Err(DbError::NotFound(format!("database {database}")));
            }

            match collection_partition_key(conn, database, &spec.name)? {
                Some(existing) if existing == spec.partition_key => Ok(()),
                Some(existing) => Err(DbError::Conflict(format!(
                    "collection {database}/{} is partitioned by {existing}, not {}",
                    spec.name, spec.partition_key
                ))),
                None => {
                    conn.execute(
                        "INSERT INTO collections (database, name, partition_key, created_at)
                         VALUES (?1, ?2, ?3, ?4)",
                        params![database, spec.name, spec.partition_key, Utc::now()],
                    )
                    .to_db()?;
                    tracing::info!(
                        "created collection {database}/{} (partition key {})",
                        spec.name,
                        spec.partition_key
                    );
                    Ok(())
                }
            }
        })
    }

    pub fn create_item_sync(
        &self,
        database: &str,
        collection: &str,
        item: &Value,
    ) -> Result<(), DbError> {
        self.with_conn(|conn| {
            let partition_key = require_collection(conn, database, collection)?;
            let (id, partition_value) = document_keys(item, &partition_key)?;
            let body = serde_json::to_string(item)
                .map_err(|e| DbError::InvalidDocument(e.to_string()))?;
            conn.execute(
                "INSERT INTO documents (database, collection, id, partition_value, body, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![database, collection, id, partition_value, body, Utc::now()],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, _)
                    if err.code == ErrorCode::ConstraintViolation =>
                {
                    DbError::Conflict(format!("document {id} already exists in {collection}"))
                }
                other => DbError::Internal(other.to_string()),
            })?;
            Ok(())
        })
    }

    pub fn query_partition_sync(
        &self,
        database: &str,
        collection: &str,
        partition_value: &str,
    ) -> Result<Vec<Value>, DbError> {
        self.with_conn(|conn| {
            require_collection(conn, database, collection)?;
            let mut stmt = conn
                .prepare(
                    "SELECT body FROM documents
                     WHERE database = ?1 AND collection = ?2 AND partition_value = ?3
                     ORDER BY created_at, rowid",
                )
                .to_db()?;
            let bodies = stmt
                .query_map(params![database, collection, partition_value], |row| {
                    row.get::<_, String>(0)
                })
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            bodies
                .iter()
                .map(|body| {
                    serde_json::from_str(body).map_err(|e| DbError::Internal(e.to_string()))
                })
                .collect()
        })
    }
}
