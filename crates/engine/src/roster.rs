//! The worker roster: per-worker tool subset, LLM role, and prompt
//! template. Workers are just differently-parameterised instances of the
//! same [`Worker`] struct, not distinct types — the roster is where that
//! parameterization lives.

use std::collections::HashMap;
use std::sync::Arc;

use wk_domain::capability::ModelRole;
use wk_domain::worker::WorkerName;
use wk_tools::ToolRegistry;

use crate::worker::Worker;

/// Tool names bound to each worker. A worker never sees a tool outside
/// this list.
fn tool_names_for(name: WorkerName) -> &'static [&'static str] {
    match name {
        WorkerName::Researcher => &["web_search", "crawl"],
        WorkerName::Coder => &["python_repl", "shell"],
        WorkerName::DbAnalyst => &["db_table_info", "db_query", "db_relations"],
        WorkerName::DocumentParser => &["document_analyze"],
        WorkerName::ChartGenerator => &["python_repl"],
        WorkerName::Reporter => &["task_files_json"],
    }
}

/// Every registered worker resolves to the `basic` role; only the
/// planner's role selection is dynamic (driven by `deep_thinking`). See
/// DESIGN.md for why worker roles aren't independently configurable.
fn role_for(_name: WorkerName) -> ModelRole {
    ModelRole::Basic
}

fn default_prompt_for(name: WorkerName) -> String {
    format!(
        "You are the {name} agent in a multi-agent workflow. \
         The current time is <<CURRENT_TIME>>. \
         Complete the assignment described in the conversation using only \
         the tools made available to you, then return a final written \
         response (no further tool call) summarizing what you did and found.",
    )
}

pub struct WorkerRoster {
    workers: HashMap<WorkerName, Arc<Worker>>,
}

impl WorkerRoster {
    /// Build the roster, binding each of the six registered workers
    /// (see DESIGN.md for why there is no seventh `browser` worker) to
    /// its tool subset out of the full `registry`.
    pub fn build(registry: &ToolRegistry) -> Self {
        let mut workers = HashMap::new();
        for name in WorkerName::ALL {
            let tools = registry.subset(tool_names_for(name));
            let worker = Worker {
                name,
                role: role_for(name),
                tools,
                prompt_template: default_prompt_for(name),
            };
            workers.insert(name, Arc::new(worker));
        }
        Self { workers }
    }

    pub fn get(&self, name: WorkerName) -> Arc<Worker> {
        self.workers
            .get(&name)
            .cloned()
            .unwrap_or_else(|| panic!("worker roster missing registered worker {name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roster_covers_all_six_workers() {
        let roster = WorkerRoster::build(&ToolRegistry::new());
        for name in WorkerName::ALL {
            let w = roster.get(name);
            assert_eq!(w.name, name);
        }
    }

    #[test]
    fn researcher_is_scoped_to_search_tools_only() {
        let roster = WorkerRoster::build(&ToolRegistry::new());
        let researcher = roster.get(WorkerName::Researcher);
        assert!(!researcher.tools.contains("db_query"));
    }
}
