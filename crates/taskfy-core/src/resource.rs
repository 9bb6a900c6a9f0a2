use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::validate::ValidatedFields;

/// A project-scoped document kind stored in the document database.
///
/// Each impl describes its own field set and partition key; the create/list
/// flow that drives it lives in one place (`taskfy_service::DocumentService`).
pub trait Resource: Serialize + Send + Sync {
    /// Singular name used in messages and logs ("comment").
    const KIND: &'static str;
    /// Key under which list results appear in the response data.
    const LIST_KEY: &'static str;
    /// Document field holding the project id.
    const PARTITION_FIELD: &'static str;
    /// Body fields required on create, in reporting order.
    const BODY_FIELDS: &'static [&'static str];
    /// Fields returned by list, in output order.
    const FIELDS: &'static [&'static str];
    /// Collection the documents live in unless overridden.
    const DEFAULT_COLLECTION: &'static str;
    /// Environment variable that overrides [`Resource::DEFAULT_COLLECTION`].
    const COLLECTION_ENV: &'static str;

    fn build(id: Uuid, created_at: DateTime<Utc>, project_id: &str, fields: &ValidatedFields) -> Self;

    /// Partition key path as the database expects it (`/project_id`).
    fn partition_key_path() -> String {
        format!("/{}", Self::PARTITION_FIELD)
    }

    /// Re-project a stored document onto [`Resource::FIELDS`]. Missing fields
    /// become `null`; anything else stored alongside is dropped.
    fn project(doc: &Value) -> Value {
        let mut out = Map::with_capacity(Self::FIELDS.len());
        for field in Self::FIELDS {
            out.insert(
                (*field).to_string(),
                doc.get(*field).cloned().unwrap_or(Value::Null),
            );
        }
        Value::Object(out)
    }
}
