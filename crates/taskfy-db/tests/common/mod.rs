// Backend-agnostic integration tests for the Database trait.
//
// Each public async function accepts `&dyn Database` so that the same logic
// can be exercised against both the SQLite and Postgres backends.

use serde_json::{json, Value};
use taskfy_db::{CollectionSpec, Database, DbError};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn comments() -> CollectionSpec {
    CollectionSpec::new("ProjectComments", "/project_id")
}

fn tasks() -> CollectionSpec {
    CollectionSpec::new("ProjectTasks", "/projectId")
}

async fn setup(db: &dyn Database, database: &str) {
    db.create_database_if_absent(database).await.unwrap();
    db.create_collection_if_absent(database, &comments())
        .await
        .unwrap();
    db.create_collection_if_absent(database, &tasks())
        .await
        .unwrap();
}

fn comment(id: &str, project: &str, description: &str) -> Value {
    json!({
        "id": id,
        "project_id": project,
        "username": "ana",
        "description": description,
        "created_at": "2024-05-01T12:00:00Z",
    })
}

fn ids(docs: &[Value]) -> Vec<&str> {
    docs.iter().map(|d| d["id"].as_str().unwrap()).collect()
}

// ---------------------------------------------------------------------------
// Provisioning
// ---------------------------------------------------------------------------

/// Creating databases and collections twice is a no-op.
pub async fn test_provisioning_is_idempotent(db: &dyn Database, database: &str) {
    setup(db, database).await;
    setup(db, database).await;

    let docs = db
        .query_partition(database, "ProjectComments", "p1")
        .await
        .unwrap();
    assert!(docs.is_empty());
}

/// A collection cannot be re-declared with another partition key.
pub async fn test_partition_key_conflict(db: &dyn Database, database: &str) {
    setup(db, database).await;
    let err = db
        .create_collection_if_absent(database, &CollectionSpec::new("ProjectComments", "/projectId"))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Conflict(_)));
}

/// Collections need an existing database; reads and writes need an existing collection.
pub async fn test_missing_parents_are_not_found(db: &dyn Database, database: &str) {
    let err = db
        .create_collection_if_absent(database, &comments())
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NotFound(_)));

    db.create_database_if_absent(database).await.unwrap();
    let err = db
        .create_item(database, "ProjectComments", &comment("c1", "p1", "x"))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NotFound(_)));

    let err = db
        .query_partition(database, "ProjectComments", "p1")
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NotFound(_)));
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// Documents come back whole, scoped to their partition, oldest first.
pub async fn test_partition_query(db: &dyn Database, database: &str) {
    setup(db, database).await;
    db.create_item(database, "ProjectComments", &comment("c1", "p1", "first"))
        .await
        .unwrap();
    db.create_item(database, "ProjectComments", &comment("c2", "p2", "other"))
        .await
        .unwrap();
    db.create_item(database, "ProjectComments", &comment("c3", "p1", "second"))
        .await
        .unwrap();

    let docs = db
        .query_partition(database, "ProjectComments", "p1")
        .await
        .unwrap();
    assert_eq!(ids(&docs), vec!["c1", "c3"]);
    assert_eq!(docs[0], comment("c1", "p1", "first"));

    let docs = db
        .query_partition(database, "ProjectComments", "p2")
        .await
        .unwrap();
    assert_eq!(ids(&docs), vec!["c2"]);
}

/// The same partition value in two collections stays separate.
pub async fn test_collections_are_isolated(db: &dyn Database, database: &str) {
    setup(db, database).await;
    db.create_item(database, "ProjectComments", &comment("c1", "p1", "comment"))
        .await
        .unwrap();
    db.create_item(
        database,
        "ProjectTasks",
        &json!({
            "id": "t1",
            "projectId": "p1",
            "description": "task",
            "createdAt": "2024-05-01T12:00:00Z",
            "status": "ToDo",
        }),
    )
    .await
    .unwrap();

    let comments = db
        .query_partition(database, "ProjectComments", "p1")
        .await
        .unwrap();
    let tasks = db
        .query_partition(database, "ProjectTasks", "p1")
        .await
        .unwrap();
    assert_eq!(ids(&comments), vec!["c1"]);
    assert_eq!(ids(&tasks), vec!["t1"]);
    assert_eq!(tasks[0]["status"], "ToDo");
}

/// Ids are unique per collection.
pub async fn test_duplicate_id_conflicts(db: &dyn Database, database: &str) {
    setup(db, database).await;
    db.create_item(database, "ProjectComments", &comment("c1", "p1", "x"))
        .await
        .unwrap();
    let err = db
        .create_item(database, "ProjectComments", &comment("c1", "p2", "y"))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Conflict(_)));

    let docs = db
        .query_partition(database, "ProjectComments", "p2")
        .await
        .unwrap();
    assert!(docs.is_empty());
}

/// Documents without an id or partition value are rejected.
pub async fn test_invalid_documents_rejected(db: &dyn Database, database: &str) {
    setup(db, database).await;
    let err = db
        .create_item(database, "ProjectComments", &json!({ "project_id": "p1" }))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidDocument(_)));

    // task-shaped document in the comment collection
    let err = db
        .create_item(database, "ProjectComments", &json!({ "id": "t1", "projectId": "p1" }))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidDocument(_)));
}

pub async fn test_health_check(db: &dyn Database) {
    db.health_check().await.unwrap();
}
