//! Process entrypoint library for `workflow-kerneld`: config loading, the
//! HTTP/SSE edge, and the CLI surface around the orchestration kernel in
//! `wk-engine`.

pub mod api;
pub mod cli;
pub mod state;
