use serde::{Deserialize, Serialize};

use crate::event::Step;
use crate::message::Message;
use crate::task::TaskId;
use crate::worker::WorkerName;

/// A validated plan: an ordered sequence of steps, each naming a worker
/// and describing its assignment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<Step>,
}

/// Per-call options threaded from the HTTP edge into the facade.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Options {
    #[serde(default)]
    pub deep_thinking: bool,
    #[serde(default)]
    pub search_before_planning: bool,
    #[serde(default)]
    pub debug: bool,
}

/// One completed worker-turn summary on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryRef {
    pub worker: String,
    pub path: std::path::PathBuf,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Mutable record passed between graph nodes for the lifetime of one task.
///
/// Invariants (enforced by the methods below, not by the caller):
/// - `cursor <= plan_steps.len()` always.
/// - `task_id`/`output_dir` are set exactly once, by the coordinator.
/// - every `summaries` entry names a file that exists under `output_dir`.
/// - `next_worker` is either `None`, `Some(Finish)`, or a registered worker.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub messages: Vec<Message>,
    pub plan: Plan,
    pub cursor: usize,
    pub next_worker: Option<crate::worker::RouteDecision>,
    pub options: Options,
    pub task_id: Option<TaskId>,
    pub output_dir: Option<std::path::PathBuf>,
    pub summaries: Vec<SummaryRef>,
}

impl SessionState {
    pub fn new(messages: Vec<Message>, options: Options) -> Self {
        Self {
            messages,
            plan: Plan::default(),
            cursor: 0,
            next_worker: None,
            options,
            task_id: None,
            output_dir: None,
            summaries: Vec::new(),
        }
    }

    /// Set once by the coordinator. Panics (a programmer error, not a
    /// runtime condition) if called twice with a different id — the graph
    /// engine never invokes the coordinator node more than once per task.
    pub fn set_task(&mut self, task_id: TaskId, output_dir: std::path::PathBuf) {
        if let Some(existing) = &self.task_id {
            assert_eq!(existing, &task_id, "task_id must not change within a session");
            return;
        }
        self.task_id = Some(task_id);
        self.output_dir = Some(output_dir);
    }

    pub fn set_plan(&mut self, plan: Plan) {
        self.plan = plan;
        self.cursor = 0;
    }

    /// The step the cursor currently points at, if any.
    pub fn current_step(&self) -> Option<&Step> {
        self.plan.steps.get(self.cursor)
    }

    /// Advance the cursor only when `worker` matches the step at the
    /// cursor — otherwise the plan is advisory and the cursor holds.
    pub fn advance_if_matches(&mut self, worker: WorkerName) -> bool {
        let matches = self
            .current_step()
            .map(|s| s.worker_name == worker.as_str())
            .unwrap_or(false);
        if matches {
            self.cursor += 1;
        }
        matches
    }

    pub fn push_summary(&mut self, summary: SummaryRef) {
        self.summaries.push(summary);
    }

    pub fn append_worker_response(&mut self, worker: WorkerName, text: impl Into<String>) {
        self.messages.push(Message::worker_response(worker.as_str(), text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::WorkerName;

    fn plan_with(workers: &[&str]) -> Plan {
        Plan {
            steps: workers
                .iter()
                .map(|w| Step {
                    worker_name: w.to_string(),
                    description: "do it".into(),
                })
                .collect(),
        }
    }

    #[test]
    fn cursor_advances_only_on_match() {
        let mut st = SessionState::new(vec![], Options::default());
        st.set_plan(plan_with(&["researcher", "coder"]));
        assert!(!st.advance_if_matches(WorkerName::Coder));
        assert_eq!(st.cursor, 0);
        assert!(st.advance_if_matches(WorkerName::Researcher));
        assert_eq!(st.cursor, 1);
    }

    #[test]
    fn cursor_never_exceeds_plan_len() {
        let mut st = SessionState::new(vec![], Options::default());
        st.set_plan(plan_with(&["researcher"]));
        st.advance_if_matches(WorkerName::Researcher);
        assert_eq!(st.cursor, 1);
        assert!(st.cursor <= st.plan.steps.len());
        assert!(st.current_step().is_none());
    }

    #[test]
    fn task_id_set_once_is_idempotent_for_same_id() {
        let mut st = SessionState::new(vec![], Options::default());
        let id = TaskId::new();
        st.set_task(id.clone(), "/tmp/x".into());
        st.set_task(id.clone(), "/tmp/x".into());
        assert_eq!(st.task_id, Some(id));
    }
}
