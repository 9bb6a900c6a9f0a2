use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::resource::Resource;
use crate::validate::ValidatedFields;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub project_id: String,
    pub username: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Resource for Comment {
    const KIND: &'static str = "comment";
    const LIST_KEY: &'static str = "comments";
    const PARTITION_FIELD: &'static str = "project_id";
    const BODY_FIELDS: &'static [&'static str] = &["description", "username"];
    const FIELDS: &'static [&'static str] =
        &["id", "project_id", "username", "description", "created_at"];
    const DEFAULT_COLLECTION: &'static str = "ProjectComments";
    const COLLECTION_ENV: &'static str = "TASKFY_COMMENT_COLLECTION";

    fn build(id: Uuid, created_at: DateTime<Utc>, project_id: &str, fields: &ValidatedFields) -> Self {
        Comment {
            id: id.to_string(),
            project_id: project_id.to_string(),
            username: fields.get("username").to_string(),
            description: fields.get("description").to_string(),
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::RequiredFields;
    use serde_json::json;

    #[test]
    fn build_fills_every_field() {
        let fields = RequiredFields::new()
            .field("description", Some("looks good"))
            .field("username", Some("ana"))
            .validate()
            .unwrap();
        let id = Uuid::new_v4();
        let now = Utc::now();
        let c = Comment::build(id, now, "proj-1", &fields);
        assert_eq!(c.id, id.to_string());
        assert_eq!(c.project_id, "proj-1");
        assert_eq!(c.username, "ana");
        assert_eq!(c.description, "looks good");
        assert_eq!(c.created_at, now);
    }

    #[test]
    fn project_drops_extra_fields_and_nulls_missing() {
        let stored = json!({
            "id": "c1",
            "project_id": "p",
            "username": "ana",
            "created_at": "2024-01-01T00:00:00Z",
            "_etag": "abc"
        });
        let projected = Comment::project(&stored);
        assert_eq!(
            projected,
            json!({
                "id": "c1",
                "project_id": "p",
                "username": "ana",
                "description": null,
                "created_at": "2024-01-01T00:00:00Z"
            })
        );
    }

    #[test]
    fn partition_path() {
        assert_eq!(Comment::partition_key_path(), "/project_id");
    }
}
