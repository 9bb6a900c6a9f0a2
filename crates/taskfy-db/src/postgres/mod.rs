pub(crate) mod migrations;
pub mod queries;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::{CollectionSpec, Database, DbError};

/// Map a sqlx::Error into a DbError::Internal.
pub(crate) fn pg_err(e: sqlx::Error) -> DbError {
    DbError::Internal(e.to_string())
}

#[derive(Clone)]
pub struct PostgresDatabase {
    pub(crate) pool: PgPool,
}

impl PostgresDatabase {
    /// Connect to a Postgres database and run migrations.
    pub async fn connect(url: &str) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .map_err(pg_err)?;

        let db = Self { pool };
        migrations::run(&db.pool).await?;
        tracing::info!("connected to postgres document store");
        Ok(db)
    }
}

#[async_trait]
impl Database for PostgresDatabase {
    async fn create_database_if_absent(&self, database: &str) -> Result<(), DbError> {
        self.pg_create_database(database).await
    }

    async fn create_collection_if_absent(
        &self,
        database: &str,
        spec: &CollectionSpec,
    ) -> Result<(), DbError> {
        self.pg_create_collection(database, spec).await
    }

    async fn create_item(
        &self,
        database: &str,
        collection: &str,
        item: &Value,
    ) -> Result<(), DbError> {
        self.pg_create_item(database, collection, item).await
    }

    async fn query_partition(
        &self,
        database: &str,
        collection: &str,
        partition_value: &str,
    ) -> Result<Vec<Value>, DbError> {
        self.pg_query_partition(database, collection, partition_value)
            .await
    }

    async fn health_check(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(pg_err)?;
        Ok(())
    }
}
