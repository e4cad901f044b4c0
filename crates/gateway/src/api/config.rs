//! Read-only configuration introspection: `GET /v1/health`,
//! `GET /config/agents`, `GET /config/providers`. The worker roster is a
//! fixed set of six, so this lists it rather than a dynamic registry.

use axum::extract::State;
use axum::response::{IntoResponse, Json};
use serde::Serialize;

use wk_domain::worker::WorkerName;

use crate::state::AppState;

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Serialize)]
struct AgentInfo {
    name: &'static str,
    role: String,
    tools: Vec<String>,
}

pub async fn list_agents(State(state): State<AppState>) -> impl IntoResponse {
    let roster = state.engine.roster();
    let agents: Vec<AgentInfo> = WorkerName::ALL
        .into_iter()
        .map(|name| {
            let worker = roster.get(name);
            AgentInfo {
                name: name.as_str(),
                role: format!("{:?}", worker.role),
                tools: worker.tools.names().into_iter().map(str::to_string).collect(),
            }
        })
        .collect();
    Json(serde_json::json!({ "agents": agents }))
}

pub async fn list_providers(State(state): State<AppState>) -> impl IntoResponse {
    let registry = state.engine.router().registry();
    Json(serde_json::json!({
        "providers": registry.list_providers(),
        "roles": registry.list_roles(),
    }))
}
