//! `task_files_json` tool — lets the reporter worker query the Artifact
//! Store's index for the task it's summarizing.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use wk_artifacts::ArtifactStore;
use wk_domain::error::{Error, Result};
use wk_domain::task::TaskId;

use crate::registry::Tool;

pub struct TaskFilesTool {
    store: Arc<ArtifactStore>,
}

impl TaskFilesTool {
    pub fn new(store: Arc<ArtifactStore>) -> Self {
        Self { store }
    }
}

#[derive(Debug, Deserialize)]
struct TaskFilesArgs {
    task_id: String,
}

#[async_trait::async_trait]
impl Tool for TaskFilesTool {
    fn name(&self) -> &str {
        "task_files_json"
    }
    fn description(&self) -> &str {
        "Return the index of artifacts (plan, worker summaries, final report) written for a task."
    }
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "task_id": {"type": "string"},
            },
            "required": ["task_id"],
        })
    }
    async fn invoke(&self, arguments: Value) -> Result<Value> {
        let args: TaskFilesArgs = serde_json::from_value(arguments)?;
        if !TaskId::is_filesystem_safe(&args.task_id) {
            return Err(Error::Tool {
                tool: "task_files_json".into(),
                message: format!("invalid task id: {}", args.task_id),
            });
        }
        // Round-trip through serde to reuse `TaskId`'s existing
        // (de)serialization rather than adding a second constructor path.
        let task_id: TaskId = serde_json::from_value(Value::String(args.task_id.clone()))?;

        let index = self.store.index(&task_id)?;
        serde_json::to_value(index).map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wk_artifacts::title::NullTitleGenerator;

    #[tokio::test]
    async fn reports_empty_index_for_fresh_task() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ArtifactStore::new(dir.path(), Arc::new(NullTitleGenerator)));
        let task = TaskId::new();
        store.create(&task).unwrap();

        let tool = TaskFilesTool::new(store);
        let out = tool
            .invoke(serde_json::json!({"task_id": task.as_str()}))
            .await
            .unwrap();
        assert!(out["plan"].is_null());
        assert_eq!(out["summaries"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn rejects_path_traversal_task_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ArtifactStore::new(dir.path(), Arc::new(NullTitleGenerator)));
        let tool = TaskFilesTool::new(store);
        let out = tool.invoke(serde_json::json!({"task_id": "../escape"})).await;
        assert!(out.is_err());
    }
}
