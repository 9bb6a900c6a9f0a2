use sqlx::{PgConnection, PgPool};

use super::pg_err;
use crate::DbError;

/// Fixed key for the advisory lock that serialises migration runs.
const MIGRATION_LOCK_KEY: i64 = 0x7461736B_66790001; // "taskfy" + version slot

const V1_INITIAL: &str = "
CREATE TABLE IF NOT EXISTS databases (
    name        TEXT PRIMARY KEY,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS collections (
    database      TEXT NOT NULL REFERENCES databases(name) ON DELETE CASCADE,
    name          TEXT NOT NULL,
    partition_key TEXT NOT NULL,
    created_at    TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (database, name)
);

CREATE TABLE IF NOT EXISTS documents (
    seq             BIGSERIAL,
    database        TEXT NOT NULL,
    collection      TEXT NOT NULL,
    id              TEXT NOT NULL,
    partition_value TEXT NOT NULL,
    body            JSONB NOT NULL,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (database, collection, id),
    FOREIGN KEY (database, collection)
        REFERENCES collections(database, name) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_documents_partition
    ON documents(database, collection, partition_value);

INSERT INTO schema_version (version, applied_at) VALUES (1, now());
";

/// Apply pending migrations. The advisory lock is session-scoped, so lock,
/// migrate and unlock all run on one pooled connection.
pub async fn run(pool: &PgPool) -> Result<(), DbError> {
    let mut conn = pool.acquire().await.map_err(pg_err)?;

    sqlx::query("SELECT pg_advisory_lock($1)")
        .bind(MIGRATION_LOCK_KEY)
        .execute(&mut *conn)
        .await
        .map_err(pg_err)?;

    let result = run_inner(&mut conn).await;

    let unlocked = sqlx::query("SELECT pg_advisory_unlock($1)")
        .bind(MIGRATION_LOCK_KEY)
        .execute(&mut *conn)
        .await;
    if let Err(e) = unlocked {
        tracing::warn!("failed to release migration lock: {e}");
        // drop the session rather than return it to the pool still locked
        drop(conn.detach());
    }

    result
}

async fn run_inner(conn: &mut PgConnection) -> Result<(), DbError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version    INTEGER PRIMARY KEY,
            applied_at TIMESTAMPTZ NOT NULL
        )",
    )
    .execute(&mut *conn)
    .await
    .map_err(pg_err)?;

    let current: i32 = sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
        .fetch_one(&mut *conn)
        .await
        .map_err(pg_err)?;

    if current < 1 {
        sqlx::raw_sql(V1_INITIAL)
            .execute(&mut *conn)
            .await
            .map_err(pg_err)?;
    }

    Ok(())
}
