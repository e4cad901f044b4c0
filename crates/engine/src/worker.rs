//! Worker Runtime (C5): the reason-act loop for one worker on one turn.
//! Calls the LLM, dispatches any resulting tool calls concurrently, and
//! loops until a final non-tool response or the step cap is hit. Unlike
//! the coordinator node, a worker turn's LLM call goes through the
//! non-streaming `invoke_with_tools` so tool calls are visible up front;
//! its full response is surfaced to the caller as a single `message`
//! event rather than token-level deltas. See DESIGN.md.

use std::collections::HashMap;
use std::time::Duration;

use futures_util::future::join_all;
use uuid::Uuid;

use wk_domain::error::{Error, Result};
use wk_domain::event::Event;
use wk_domain::message::{ContentPart, Message, MessageContent, ToolCall};
use wk_domain::worker::WorkerName;
use wk_providers::{InvokeOptions, LlmRouter};
use wk_tools::ToolRegistry;

use crate::bus::EventBus;
use crate::cancel::CancelToken;
use crate::prompt;

pub struct Worker {
    pub name: WorkerName,
    pub role: wk_domain::capability::ModelRole,
    pub tools: ToolRegistry,
    pub prompt_template: String,
}

pub struct WorkerOutcome {
    pub text: String,
}

impl Worker {
    /// Run one turn: render the prompt, call the LLM, dispatch any tool
    /// calls concurrently, loop until a non-tool response or `step_cap` is
    /// exceeded (fatal).
    pub async fn run_turn(
        &self,
        router: &LlmRouter,
        history: &[Message],
        events: &EventBus,
        cancel: &CancelToken,
        tool_timeout: Duration,
        step_cap: u32,
    ) -> Result<WorkerOutcome> {
        let agent_id = Uuid::new_v4().to_string();
        let agent_name = self.name.as_str().to_string();

        if !events
            .send(
                Event::StartOfAgent {
                    agent_name: agent_name.clone(),
                    agent_id: agent_id.clone(),
                },
                cancel,
            )
            .await
        {
            return Err(Error::Other("disconnected before agent start".into()));
        }

        let outcome = self
            .run_loop(router, history, events, cancel, tool_timeout, step_cap, &agent_name)
            .await;

        let _ = events
            .send(
                Event::EndOfAgent {
                    agent_name,
                    agent_id,
                },
                cancel,
            )
            .await;

        outcome
    }

    async fn run_loop(
        &self,
        router: &LlmRouter,
        history: &[Message],
        events: &EventBus,
        cancel: &CancelToken,
        tool_timeout: Duration,
        step_cap: u32,
        agent_name: &str,
    ) -> Result<WorkerOutcome> {
        let mut vars = HashMap::new();
        vars.insert("CURRENT_TIME".to_string(), prompt::current_time());
        let system_prompt = prompt::render(&self.prompt_template, &vars);

        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(Message::system(system_prompt));
        messages.extend_from_slice(history);

        let opts = InvokeOptions {
            tools: self.tools.definitions(),
            temperature: None,
            max_tokens: None,
        };

        for step in 0..step_cap {
            if cancel.is_cancelled() {
                return Err(Error::Other("cancelled before llm call".into()));
            }

            if !events
                .send(
                    Event::StartOfLlm {
                        agent_name: agent_name.to_string(),
                    },
                    cancel,
                )
                .await
            {
                return Err(Error::Other("disconnected before llm call".into()));
            }

            let resp = router.invoke_with_tools(self.role, messages.clone(), &opts).await?;

            if !events
                .send(
                    Event::EndOfLlm {
                        agent_name: agent_name.to_string(),
                    },
                    cancel,
                )
                .await
            {
                return Err(Error::Other("disconnected after llm call".into()));
            }

            if resp.tool_calls.is_empty() {
                if !resp.content.is_empty() {
                    let ok = events
                        .send(
                            Event::Message {
                                message_id: Uuid::new_v4().to_string(),
                                delta: wk_domain::event::MessageDelta {
                                    content: Some(resp.content.clone()),
                                    reasoning_content: None,
                                },
                            },
                            cancel,
                        )
                        .await;
                    if !ok {
                        return Err(Error::Other("disconnected while sending final message".into()));
                    }
                }
                return Ok(WorkerOutcome { text: resp.content });
            }

            messages.push(assistant_tool_use_message(&resp.tool_calls));

            for tc in &resp.tool_calls {
                if !events
                    .send(
                        Event::ToolCall {
                            tool_call_id: tc.call_id.clone(),
                            tool_name: tc.tool_name.clone(),
                            tool_input: tc.arguments.clone(),
                        },
                        cancel,
                    )
                    .await
                {
                    return Err(Error::Other("disconnected before tool dispatch".into()));
                }
            }

            if cancel.is_cancelled() {
                return Err(Error::Other("cancelled before tool dispatch".into()));
            }

            let futures = resp.tool_calls.iter().map(|tc| self.dispatch_one(tc, tool_timeout));
            let results = join_all(futures).await;

            for (tc, result) in resp.tool_calls.iter().zip(results) {
                let (result_json, is_error) = match result {
                    Ok(v) => (v, false),
                    Err(e) => (serde_json::Value::String(e.to_string()), true),
                };
                let _ = events
                    .send(
                        Event::ToolCallResult {
                            tool_call_id: tc.call_id.clone(),
                            tool_name: tc.tool_name.clone(),
                            tool_result: result_json.clone(),
                        },
                        cancel,
                    )
                    .await;

                let content = if is_error {
                    result_json.as_str().map(str::to_string).unwrap_or_else(|| result_json.to_string())
                } else {
                    serde_json::to_string(&result_json).unwrap_or_default()
                };
                messages.push(Message {
                    role: wk_domain::message::Role::Tool,
                    content: MessageContent::Parts(vec![ContentPart::ToolResult {
                        tool_use_id: tc.call_id.clone(),
                        content,
                        is_error,
                    }]),
                    name: None,
                });
            }

            if step + 1 == step_cap {
                return Err(Error::Other(format!(
                    "worker '{agent_name}' exceeded step cap ({step_cap}) without a final response"
                )));
            }
        }

        unreachable!("loop always returns before exhausting step_cap iterations")
    }

    async fn dispatch_one(&self, tc: &ToolCall, timeout: Duration) -> Result<serde_json::Value> {
        let tool = self
            .tools
            .get(&tc.tool_name)
            .ok_or_else(|| Error::Tool {
                tool: tc.tool_name.clone(),
                message: "tool not available to this worker".into(),
            })?;

        match tokio::time::timeout(timeout, tool.invoke(tc.arguments.clone())).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!("tool '{}' timed out after {}ms", tc.tool_name, timeout.as_millis()))),
        }
    }
}

fn assistant_tool_use_message(tool_calls: &[ToolCall]) -> Message {
    let parts = tool_calls
        .iter()
        .map(|tc| ContentPart::ToolUse {
            id: tc.call_id.clone(),
            name: tc.tool_name.clone(),
            input: tc.arguments.clone(),
        })
        .collect();
    Message {
        role: wk_domain::message::Role::Assistant,
        content: MessageContent::Parts(parts),
        name: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use wk_domain::config::RoleConfig;
    use wk_providers::registry::ProviderRegistry;
    use wk_providers::traits::{ChatRequest, ChatResponse, LlmProvider};
    use wk_tools::Tool;

    struct StubProvider;

    #[async_trait]
    impl LlmProvider for StubProvider {
        async fn chat(&self, _req: &ChatRequest) -> Result<ChatResponse> {
            Ok(ChatResponse {
                content: "done".into(),
                tool_calls: vec![],
                usage: None,
                model: "stub".into(),
                finish_reason: Some("stop".into()),
            })
        }
        async fn chat_stream(&self, _req: &ChatRequest) -> Result<wk_domain::stream::BoxStream<'static, Result<wk_domain::stream::Chunk>>> {
            unimplemented!("worker turns never stream")
        }
        fn capabilities(&self) -> &wk_domain::capability::LlmCapabilities {
            static CAPS: wk_domain::capability::LlmCapabilities = wk_domain::capability::LlmCapabilities {
                supports_tools: wk_domain::capability::ToolSupport::Basic,
                supports_streaming: false,
                supports_json_mode: true,
                context_window_tokens: None,
            };
            &CAPS
        }
        fn provider_id(&self) -> &str {
            "stub"
        }
    }

    struct EchoTool;
    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echo"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn invoke(&self, arguments: serde_json::Value) -> Result<serde_json::Value> {
            Ok(arguments)
        }
    }

    fn router_with_stub() -> LlmRouter {
        let mut roles = HashMap::new();
        roles.insert(
            "basic".to_string(),
            RoleConfig {
                model: "stub/model".into(),
                require_tools: false,
                require_json: false,
                fallbacks: vec![],
            },
        );
        let mut providers: HashMap<String, std::sync::Arc<dyn LlmProvider>> = HashMap::new();
        providers.insert("stub".to_string(), std::sync::Arc::new(StubProvider));
        let registry = ProviderRegistry::from_providers(providers);
        LlmRouter::new(registry, roles, 20_000, 2)
    }

    #[tokio::test]
    async fn worker_turn_without_tool_calls_returns_final_text() {
        let router = router_with_stub();
        let mut tools = ToolRegistry::new();
        tools.register(std::sync::Arc::new(EchoTool));

        let worker = Worker {
            name: WorkerName::Researcher,
            role: wk_domain::capability::ModelRole::Basic,
            tools,
            prompt_template: "act now".into(),
        };

        let (bus, mut rx) = crate::bus::channel(16);
        let cancel = CancelToken::new();
        let history = vec![Message::user("do the thing")];

        let outcome = worker
            .run_turn(&router, &history, &bus, &cancel, Duration::from_secs(1), 5)
            .await
            .unwrap();
        assert_eq!(outcome.text, "done");

        let mut kinds = Vec::new();
        while let Ok(Some(event)) = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await {
            kinds.push(event.kind());
        }
        assert_eq!(kinds.first(), Some(&"start_of_agent"));
        assert_eq!(kinds.last(), Some(&"end_of_agent"));
        assert!(kinds.contains(&"start_of_llm"));
        assert!(kinds.contains(&"end_of_llm"));
        assert!(kinds.contains(&"message"));
    }
}
