use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use wk_domain::error::Result;
use wk_domain::message::ToolDefinition;

/// A named, callable tool invokable from inside a worker's reason-act loop.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema for the tool's parameters, handed to the LLM Gateway
    /// verbatim as part of `ToolDefinition`.
    fn parameters_schema(&self) -> Value;

    /// Invoke the tool. Wall-clock enforcement is the caller's
    /// responsibility (the worker loop wraps this in a timeout) — a tool
    /// never times out itself.
    async fn invoke(&self, arguments: Value) -> Result<Value>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Registry of every tool the process knows how to run. Workers are
/// instantiated with a `subset()` naming only the tools that worker is
/// allowed to call.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> &mut Self {
        self.tools.insert(tool.name().to_string(), tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Build a worker-scoped registry containing only the named tools.
    /// Unknown names are silently skipped — workers are configured with a
    /// static, reviewed tool list, so a typo there is a deploy-time bug
    /// surfaced by `doctor`, not a runtime error.
    pub fn subset(&self, names: &[&str]) -> ToolRegistry {
        let mut out = ToolRegistry::new();
        for name in names {
            if let Some(tool) = self.tools.get(*name) {
                out.tools.insert(name.to_string(), tool.clone());
            }
        }
        out
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait::async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes its input"
        }
        fn parameters_schema(&self) -> Value {
            serde_json::json!({"type": "object"})
        }
        async fn invoke(&self, arguments: Value) -> Result<Value> {
            Ok(arguments)
        }
    }

    #[tokio::test]
    async fn register_and_invoke_round_trips() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool));

        let tool = reg.get("echo").expect("tool registered");
        let out = tool.invoke(serde_json::json!({"x": 1})).await.unwrap();
        assert_eq!(out, serde_json::json!({"x": 1}));
    }

    #[test]
    fn subset_keeps_only_named_tools() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool));

        let scoped = reg.subset(&["echo", "nonexistent"]);
        assert_eq!(scoped.len(), 1);
        assert!(scoped.contains("echo"));
        assert!(!scoped.contains("nonexistent"));
    }

    #[test]
    fn definitions_reflect_registered_tools() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool));
        let defs = reg.definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");
    }
}
