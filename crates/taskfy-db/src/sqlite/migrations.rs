use rusqlite::Connection;

use super::SqliteResultExt;
use crate::DbError;

pub fn run(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );",
    )
    .to_db()?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .to_db()?;

    if current_version < 1 {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS databases (
                name        TEXT PRIMARY KEY,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS collections (
                database      TEXT NOT NULL REFERENCES databases(name) ON DELETE CASCADE,
                name          TEXT NOT NULL,
                partition_key TEXT NOT NULL,
                created_at    TEXT NOT NULL,
                PRIMARY KEY (database, name)
            );

            CREATE TABLE IF NOT EXISTS documents (
                database        TEXT NOT NULL,
                collection      TEXT NOT NULL,
                id              TEXT NOT NULL,
                partition_value TEXT NOT NULL,
                body            TEXT NOT NULL,
                created_at      TEXT NOT NULL,
                PRIMARY KEY (database, collection, id),
                FOREIGN KEY (database, collection)
                    REFERENCES collections(database, name) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_documents_partition
                ON documents(database, collection, partition_value);
            ",
        )
        .to_db()?;

        conn.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (1, datetime('now'))",
            [],
        )
        .to_db()?;
    }

    Ok(())
}
