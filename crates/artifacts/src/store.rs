use std::collections::HashMap;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use wk_domain::error::{Error, Result};
use wk_domain::state::SummaryRef;
use wk_domain::task::TaskId;

use crate::title::{preview, sanitize_title, TitleGenerator};

const PLAN_FILENAME: &str = "plan.md";
const FINAL_FILENAME: &str = "final_integration.md";

/// `index(task_id)` response: what's on disk for a task, grouped by kind.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ArtifactIndex {
    pub plan: Option<PathBuf>,
    pub summaries: Vec<SummaryRef>,
    pub final_report: Option<PathBuf>,
}

/// Durable, per-task record of plan / worker-summary / final-report
/// artifacts. Writes within a task are serialized through a per-task lock;
/// writes across tasks (disjoint directories) are independent.
pub struct ArtifactStore {
    root: PathBuf,
    title_gen: Arc<dyn TitleGenerator>,
    locks: Mutex<HashMap<TaskId, Arc<Mutex<()>>>>,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>, title_gen: Arc<dyn TitleGenerator>) -> Self {
        Self {
            root: root.into(),
            title_gen,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn task_lock(&self, task_id: &TaskId) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(task_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// `<root>/<task_id>/`, never the store root itself.
    pub fn task_dir(&self, task_id: &TaskId) -> Result<PathBuf> {
        if !TaskId::is_filesystem_safe(task_id.as_str()) {
            return Err(Error::Artifact(format!(
                "refusing unsafe task id: {}",
                task_id.as_str()
            )));
        }
        Ok(self.root.join(task_id.as_str()))
    }

    /// Idempotent `mkdir -p`.
    pub fn create(&self, task_id: &TaskId) -> Result<PathBuf> {
        let dir = self.task_dir(task_id)?;
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn write_plan(&self, task_id: &TaskId, plan_json: &str) -> Result<PathBuf> {
        let dir = self.create(task_id)?;
        let _guard = self.task_lock(task_id);
        let _guard = _guard.lock();

        let path = dir.join(PLAN_FILENAME);
        let body = format!(
            "<!-- generated {} -->\n\n```json\n{}\n```\n",
            Utc::now().to_rfc3339(),
            plan_json
        );
        atomic_write(&path, &body)?;
        Ok(path)
    }

    pub fn write_final(&self, task_id: &TaskId, content: &str) -> Result<PathBuf> {
        let dir = self.create(task_id)?;
        let _guard = self.task_lock(task_id);
        let _guard = _guard.lock();

        let path = dir.join(FINAL_FILENAME);
        atomic_write(&path, content)?;
        Ok(path)
    }

    /// title-generate -> sanitize -> collision-avoid -> atomic write.
    ///
    /// `content` is written to disk in full regardless of how the preview
    /// sent to the title generator was truncated.
    pub async fn write_summary(
        &self,
        task_id: &TaskId,
        worker: &str,
        content: &str,
    ) -> Result<SummaryRef> {
        let dir = self.create(task_id)?;

        let fallback = format!("{worker}_summary");
        let generated = self
            .title_gen
            .generate_title(worker, &preview(content))
            .await
            .ok()
            .map(|t| sanitize_title(&t))
            .filter(|t| !t.is_empty());

        let base_title = generated.unwrap_or(fallback);

        // Collision avoidance and the write itself must be serialized
        // against any other write in flight for this task.
        let lock = self.task_lock(task_id);
        let _guard = lock.lock();

        let path = unique_path(&dir, &base_title)?;
        atomic_write(&path, content)?;

        Ok(SummaryRef {
            worker: worker.to_string(),
            path,
            timestamp: Utc::now(),
        })
    }

    /// Ordered by file mtime, oldest first.
    pub fn list_summaries(&self, task_id: &TaskId) -> Result<Vec<SummaryRef>> {
        let dir = self.task_dir(task_id)?;
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if !is_summary_file(&path) {
                continue;
            }
            let meta = entry.metadata()?;
            let mtime = meta.modified()?;
            entries.push((path, mtime));
        }
        entries.sort_by_key(|(_, mtime)| *mtime);

        Ok(entries
            .into_iter()
            .map(|(path, mtime)| SummaryRef {
                worker: worker_from_path(&path),
                path,
                timestamp: chrono::DateTime::<Utc>::from(mtime),
            })
            .collect())
    }

    pub fn index(&self, task_id: &TaskId) -> Result<ArtifactIndex> {
        let dir = self.task_dir(task_id)?;
        let plan = dir.join(PLAN_FILENAME);
        let final_report = dir.join(FINAL_FILENAME);

        Ok(ArtifactIndex {
            plan: plan.exists().then_some(plan),
            summaries: self.list_summaries(task_id)?,
            final_report: final_report.exists().then_some(final_report),
        })
    }
}

fn is_summary_file(path: &Path) -> bool {
    match path.file_name().and_then(|n| n.to_str()) {
        Some(PLAN_FILENAME) | Some(FINAL_FILENAME) => false,
        Some(name) => name.ends_with(".md"),
        None => false,
    }
}

/// Best-effort recovery of the worker name stashed at write time isn't
/// possible from the filename alone once a title has replaced it, so this
/// only reports the title stem; callers that need the worker back read it
/// from `SessionState.summaries` instead.
fn worker_from_path(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string()
}

/// Appends `_2`, `_3`, ... on clash. Applies even when `base_title` is
/// already the `<worker_name>_summary` fallback.
fn unique_path(dir: &Path, base_title: &str) -> Result<PathBuf> {
    let mut candidate = dir.join(format!("{base_title}.md"));
    let mut n = 2;
    while candidate.exists() {
        candidate = dir.join(format!("{base_title}_{n}.md"));
        n += 1;
    }
    Ok(candidate)
}

fn atomic_write(path: &Path, content: &str) -> Result<()> {
    let dir = path.parent().ok_or_else(|| {
        Error::Artifact(format!("artifact path has no parent: {}", path.display()))
    })?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.flush()?;
    tmp.persist(path)
        .map_err(|e| Error::Artifact(format!("atomic rename failed: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::title::NullTitleGenerator;

    fn store(dir: &tempfile::TempDir) -> ArtifactStore {
        ArtifactStore::new(dir.path(), Arc::new(NullTitleGenerator))
    }

    #[test]
    fn create_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(&dir);
        let task = TaskId::new();
        let p1 = s.create(&task).unwrap();
        let p2 = s.create(&task).unwrap();
        assert_eq!(p1, p2);
        assert!(p1.is_dir());
    }

    #[test]
    fn write_plan_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(&dir);
        let task = TaskId::new();
        let path = s.write_plan(&task, r#"{"steps":[]}"#).unwrap();
        let body = fs::read_to_string(path).unwrap();
        assert!(body.contains("\"steps\":[]"));
    }

    #[tokio::test]
    async fn write_summary_falls_back_on_null_generator() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(&dir);
        let task = TaskId::new();
        s.create(&task).unwrap();

        let summary = s.write_summary(&task, "researcher", "findings").await.unwrap();
        assert_eq!(
            summary.path.file_name().unwrap().to_str().unwrap(),
            "researcher_summary.md"
        );
    }

    #[tokio::test]
    async fn write_summary_collision_avoidance_applies_to_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(&dir);
        let task = TaskId::new();
        s.create(&task).unwrap();

        let first = s.write_summary(&task, "researcher", "a").await.unwrap();
        let second = s.write_summary(&task, "researcher", "b").await.unwrap();
        assert_ne!(first.path, second.path);
        assert_eq!(
            second.path.file_name().unwrap().to_str().unwrap(),
            "researcher_summary_2.md"
        );
    }

    #[test]
    fn index_excludes_plan_and_final_by_filename() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(&dir);
        let task = TaskId::new();
        s.write_plan(&task, "{}").unwrap();
        s.write_final(&task, "done").unwrap();

        let dir_path = s.task_dir(&task).unwrap();
        fs::write(dir_path.join("note.md"), "hi").unwrap();

        let idx = s.index(&task).unwrap();
        assert!(idx.plan.is_some());
        assert!(idx.final_report.is_some());
        assert_eq!(idx.summaries.len(), 1);
        assert_eq!(idx.summaries[0].path.file_name().unwrap(), "note.md");
    }

    #[test]
    fn rejects_path_traversal_task_id() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(&dir);
        // Construct via round-trip since TaskId has no public unsafe ctor.
        let unsafe_id: TaskId = serde_json::from_str("\"../escape\"").unwrap();
        assert!(s.create(&unsafe_id).is_err());
    }
}
