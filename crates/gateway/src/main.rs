use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wk_domain::config::{Config, ConfigSeverity};
use wk_engine::Engine;
use wk_gateway::api;
use wk_gateway::cli::{Cli, Command, ConfigCommand};
use wk_gateway::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Default to serve when no subcommand is given.
        None | Some(Command::Serve) => {
            init_tracing();
            let (config, _config_path) = wk_gateway::cli::load_config()?;
            run_server(Arc::new(config)).await
        }
        Some(Command::Doctor) => {
            let (config, config_path) = wk_gateway::cli::load_config()?;
            let passed = wk_gateway::cli::doctor::run(&config, &config_path).await?;
            if !passed {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, config_path) = wk_gateway::cli::load_config()?;
            let valid = wk_gateway::cli::config::validate(&config, &config_path);
            if !valid {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _config_path) = wk_gateway::cli::load_config()?;
            wk_gateway::cli::config::show(&config);
            Ok(())
        }
        Some(Command::Version) => {
            println!("workflow-kerneld {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Initialize structured JSON tracing (only for the `serve` command).
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,wk_gateway=debug")),
        )
        .json()
        .init();
}

/// Start the gateway server with the given configuration.
async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("workflow-kernel starting");

    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if Config::has_fatal_errors(&issues) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── LLM Gateway (C3) ──────────────────────────────────────────────
    let router = wk_providers::LlmRouter::from_config(&config.llm)
        .context("initializing LLM provider registry")?;
    tracing::info!(
        providers = router.registry().len(),
        "LLM provider registry ready"
    );

    // ── Artifact Store (C1) ───────────────────────────────────────────
    let title_router = wk_providers::LlmRouter::from_config(&config.llm)
        .context("initializing title-generator LLM router")?;
    let title_gen = Arc::new(wk_engine::title_adapter::RouterTitleGenerator::new(
        title_router,
    ));
    let artifacts = Arc::new(wk_artifacts::ArtifactStore::new(
        config.artifacts.root.clone(),
        title_gen,
    ));
    tracing::info!(root = %config.artifacts.root.display(), "artifact store ready");

    // ── Tool Registry (C4) ────────────────────────────────────────────
    let tools = build_tool_registry(artifacts.clone());
    tracing::info!(tools = tools.len(), "tool registry ready");

    // ── Engine (C2/C5/C6/C7) ──────────────────────────────────────────
    let engine = Engine::from_shared(router, artifacts, tools, config.engine.clone());

    let state = AppState {
        config: config.clone(),
        engine,
    };

    // ── Router ───────────────────────────────────────────────────────
    let app = api::router().with_state(state);

    // ── Bind ─────────────────────────────────────────────────────────
    let addr = &config.server.bind_addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;

    tracing::info!(addr = %addr, "workflow-kernel listening");

    axum::serve(listener, app)
        .await
        .context("axum server error")?;

    Ok(())
}

/// Every canonical tool, constructed from environment configuration. A
/// tool whose required env var is unset is skipped rather than aborting
/// startup -- the worker that needs it will surface a tool-call error on
/// first use, the same way a missing LLM provider fails lazily under
/// `allow_none`.
fn build_tool_registry(artifacts: Arc<wk_artifacts::ArtifactStore>) -> wk_tools::ToolRegistry {
    let mut registry = wk_tools::ToolRegistry::new();

    match wk_tools::search::WebSearchTool::from_env() {
        Ok(tool) => {
            registry.register(Arc::new(tool));
        }
        Err(e) => tracing::warn!(error = %e, "web_search tool unavailable"),
    }
    match wk_tools::search::CrawlTool::from_env() {
        Ok(tool) => {
            registry.register(Arc::new(tool));
        }
        Err(e) => tracing::warn!(error = %e, "crawl tool unavailable"),
    }

    registry.register(Arc::new(wk_tools::PythonReplTool));
    registry.register(Arc::new(wk_tools::ShellTool));

    match wk_tools::db::DbTool::from_env() {
        Ok(tool) => {
            registry.register(Arc::new(tool));
        }
        Err(e) => tracing::warn!(error = %e, "db_table_info tool unavailable"),
    }
    match wk_tools::db::DbQueryTool::from_env() {
        Ok(tool) => {
            registry.register(Arc::new(tool));
        }
        Err(e) => tracing::warn!(error = %e, "db_query tool unavailable"),
    }
    match wk_tools::db::DbRelationsTool::from_env() {
        Ok(tool) => {
            registry.register(Arc::new(tool));
        }
        Err(e) => tracing::warn!(error = %e, "db_relations tool unavailable"),
    }

    registry.register(Arc::new(wk_tools::document::DocumentAnalyzeTool::from_env()));

    registry.register(Arc::new(wk_tools::task_files::TaskFilesTool::new(artifacts)));

    registry
}
