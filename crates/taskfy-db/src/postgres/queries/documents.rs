use serde_json::Value;
use sqlx::types::Json;

use super::super::{pg_err, PostgresDatabase};
use crate::{check_partition_key, document_keys, CollectionSpec, DbError};

impl PostgresDatabase {
    async fn pg_collection_partition_key(
        &self,
        database: &str,
        collection: &str,
    ) -> Result<Option<String>, DbError> {
        sqlx::query_scalar(
            "SELECT partition_key FROM collections WHERE database = $1 AND name = $2",
        )
        .bind(database)
        .bind(collection)
        .fetch_optional(&self.pool)
        .await
        .map_err(pg_err)
    }

    async fn pg_require_collection(
        &self,
        database: &str,
        collection: &str,
    ) -> Result<String, DbError> {
        self.pg_collection_partition_key(database, collection)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("collection {database}/{collection}")))
    }

    pub(crate) async fn pg_create_database(&self, database: &str) -> Result<(), DbError> {
        let result = sqlx::query("INSERT INTO databases (name) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(database)
            .execute(&self.pool)
            .await
            .map_err(pg_err)?;
        if result.rows_affected() > 0 {
            tracing::info!("created database {database}");
        }
        Ok(())
    }

    pub(crate) async fn pg_create_collection(
        &self,
        database: &str,
        spec: &CollectionSpec,
    ) -> Result<(), DbError> {
        check_partition_key(spec)?;
        let db_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM databases WHERE name = $1)")
                .bind(database)
                .fetch_one(&self.pool)
                .await
                .map_err(pg_err)?;
        if !db_exists {
            return Err(DbError::NotFound(format!("database {database}")));
        }

        sqlx::query(
            "INSERT INTO collections (database, name, partition_key) VALUES ($1, $2, $3)
             ON CONFLICT DO NOTHING",
        )
        .bind(database)
        .bind(&spec.name)
        .bind(&spec.partition_key)
        .execute(&self.pool)
        .await
        .map_err(pg_err)?;

        let existing = self.pg_require_collection(database, &spec.name).await?;
        if existing != spec.partition_key {
            return Err(DbError::Conflict(format!(
                "collection {database}/{} is partitioned by {existing}, not {}",
                spec.name, spec.partition_key
            )));
        }
        Ok(())
    }

    pub(crate) async fn pg_create_item(
        &self,
        database: &str,
        collection: &str,
        item: &Value,
    ) -> Result<(), DbError> {
        let partition_key = self.pg_require_collection(database, collection).await?;
        let (id, partition_value) = document_keys(item, &partition_key)?;

        sqlx::query(
            "INSERT INTO documents (database, collection, id, partition_value, body)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(database)
        .bind(collection)
        .bind(&id)
        .bind(&partition_value)
        .bind(Json(item))
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                DbError::Conflict(format!("document {id} already exists in {collection}"))
            }
            other => pg_err(other),
        })?;
        Ok(())
    }

    pub(crate) async fn pg_query_partition(
        &self,
        database: &str,
        collection: &str,
        partition_value: &str,
    ) -> Result<Vec<Value>, DbError> {
        self.pg_require_collection(database, collection).await?;
        let rows: Vec<Json<Value>> = sqlx::query_scalar(
            "SELECT body FROM documents
             WHERE database = $1 AND collection = $2 AND partition_value = $3
             ORDER BY created_at, seq",
        )
        .bind(database)
        .bind(collection)
        .bind(partition_value)
        .fetch_all(&self.pool)
        .await
        .map_err(pg_err)?;

        Ok(rows.into_iter().map(|Json(v)| v).collect())
    }
}
