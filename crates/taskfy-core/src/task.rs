use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::resource::Resource;
use crate::validate::ValidatedFields;

/// Only the initial status exists; nothing transitions a task out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    ToDo,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::ToDo => "ToDo",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub project_id: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub status: TaskStatus,
}

impl Resource for Task {
    const KIND: &'static str = "task";
    const LIST_KEY: &'static str = "tasks";
    const PARTITION_FIELD: &'static str = "projectId";
    const BODY_FIELDS: &'static [&'static str] = &["description"];
    const FIELDS: &'static [&'static str] =
        &["id", "projectId", "description", "createdAt", "status"];
    const DEFAULT_COLLECTION: &'static str = "ProjectTasks";
    const COLLECTION_ENV: &'static str = "TASKFY_TASK_COLLECTION";

    fn build(id: Uuid, created_at: DateTime<Utc>, project_id: &str, fields: &ValidatedFields) -> Self {
        Task {
            id: id.to_string(),
            project_id: project_id.to_string(),
            description: fields.get("description").to_string(),
            created_at,
            status: TaskStatus::ToDo,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::RequiredFields;
    use serde_json::json;

    #[test]
    fn new_task_starts_in_todo() {
        let fields = RequiredFields::new()
            .field("description", Some("write docs"))
            .validate()
            .unwrap();
        let task = Task::build(Uuid::new_v4(), Utc::now(), "p9", &fields);
        assert_eq!(task.status, TaskStatus::ToDo);
        assert_eq!(task.project_id, "p9");
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let fields = RequiredFields::new()
            .field("description", Some("d"))
            .validate()
            .unwrap();
        let task = Task::build(Uuid::new_v4(), Utc::now(), "p9", &fields);
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["projectId"], "p9");
        assert_eq!(value["status"], "ToDo");
        assert!(value.get("createdAt").is_some());
        assert!(value.get("project_id").is_none());
    }

    #[test]
    fn projection_keeps_status() {
        let stored = json!({
            "id": "t1",
            "projectId": "p9",
            "description": "d",
            "createdAt": "2024-05-01T10:00:00Z",
            "status": "ToDo",
            "ttl": 60
        });
        let projected = Task::project(&stored);
        assert_eq!(projected["status"], "ToDo");
        assert!(projected.get("ttl").is_none());
        assert_eq!(Task::partition_key_path(), "/projectId");
    }
}
