//! The agent reasoning loop: model + tool-call round trips.

use std::sync::Arc;

use async_trait::async_trait;
use functionsdo_core::message::{Conversation, Message};
use functionsdo_core::provider::{Provider, ProviderRequest};
use functionsdo_core::tool::{ToolCall, ToolRegistry};
use functionsdo_dispatch::agentic::{AgenticRunError, AgenticRunOutput, AgenticRunner};
use tracing::{debug, warn};

/// Runs the plan/act/observe cycle for one agentic function invocation.
pub struct AgentLoop {
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    max_steps: u32,
}

impl AgentLoop {
    pub fn new(model: impl Into<String>, temperature: f32, max_steps: u32) -> Self {
        Self {
            model: model.into(),
            temperature,
            max_tokens: None,
            max_steps,
        }
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }
}

#[async_trait]
impl AgenticRunner for AgentLoop {
    async fn run(
        &self,
        goal: &str,
        provider: Arc<dyn Provider>,
        registry: Arc<ToolRegistry>,
        input: serde_json::Value,
    ) -> Result<AgenticRunOutput, AgenticRunError> {
        let mut conversation = Conversation::new();
        conversation.push(Message::system(goal));
        conversation.push(Message::user(input.to_string()));

        let tool_definitions = registry.definitions();
        let mut step = 0u32;
        let mut tool_calls_made = 0u32;

        loop {
            step += 1;
            if step > self.max_steps {
                warn!(steps = step, "agentic loop hit max steps, returning partial result");
                return Ok(AgenticRunOutput {
                    output: serde_json::json!({
                        "text": "max steps reached before a final answer",
                        "partial": true,
                    }),
                    steps: step - 1,
                    tool_calls: tool_calls_made,
                });
            }

            let request = ProviderRequest {
                model: self.model.clone(),
                messages: conversation.messages.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: tool_definitions.clone(),
                stream: false,
                stop: vec![],
            };

            let response = provider
                .complete(request)
                .await
                .map_err(|e| AgenticRunError::Failed(e.to_string()))?;

            if response.message.tool_calls.is_empty() {
                let text = response.message.content.clone();
                return Ok(AgenticRunOutput {
                    output: serde_json::json!({ "text": text }),
                    steps: step,
                    tool_calls: tool_calls_made,
                });
            }

            debug!(count = response.message.tool_calls.len(), step, "executing tool calls");
            let requested = response.message.tool_calls.clone();
            conversation.push(response.message);

            for tc in &requested {
                let call = ToolCall {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    arguments: serde_json::from_str(&tc.arguments).unwrap_or_default(),
                };
                tool_calls_made += 1;

                match registry.execute(&call).await {
                    Ok(result) => conversation.push(Message::tool_result(&tc.id, &result.output)),
                    Err(e) => conversation.push(Message::tool_result(&tc.id, format!("Error: {e}"))),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use functionsdo_core::error::{ProviderError, ToolError};
    use functionsdo_core::provider::{ProviderResponse, Usage};
    use functionsdo_core::tool::{Tool, ToolResult};

    struct ScriptedProvider {
        responses: std::sync::Mutex<Vec<Message>>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<Message>) -> Self {
            Self { responses: std::sync::Mutex::new(responses) }
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }
        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            let message = self.responses.lock().unwrap().remove(0);
            Ok(ProviderResponse {
                message,
                usage: Some(Usage { prompt_tokens: 1, completion_tokens: 1, total_tokens: 2 }),
                model: "scripted-model".into(),
                metadata: serde_json::Map::new(),
            })
        }
    }

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes input"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({ "type": "object" })
        }
        async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
            Ok(ToolResult {
                call_id: String::new(),
                success: true,
                output: arguments.to_string(),
                data: None,
            })
        }
    }

    fn assistant_with_tool_call() -> Message {
        let mut msg = Message::assistant("");
        msg.tool_calls = vec![functionsdo_core::message::MessageToolCall {
            id: "call_1".into(),
            name: "echo".into(),
            arguments: "{}".into(),
        }];
        msg
    }

    #[tokio::test]
    async fn text_only_response_returns_immediately() {
        let provider: Arc<dyn Provider> = Arc::new(ScriptedProvider::new(vec![Message::assistant("done")]));
        let registry = Arc::new(ToolRegistry::new());
        let agent = AgentLoop::new("test-model", 0.0, 5);

        let result = agent.run("goal", provider, registry, serde_json::json!({})).await.unwrap();
        assert_eq!(result.steps, 1);
        assert_eq!(result.tool_calls, 0);
        assert_eq!(result.output["text"], "done");
    }

    #[tokio::test]
    async fn tool_call_then_final_answer() {
        let provider: Arc<dyn Provider> =
            Arc::new(ScriptedProvider::new(vec![assistant_with_tool_call(), Message::assistant("final")]));
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let agent = AgentLoop::new("test-model", 0.0, 5);

        let result = agent
            .run("goal", provider, Arc::new(registry), serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(result.steps, 2);
        assert_eq!(result.tool_calls, 1);
        assert_eq!(result.output["text"], "final");
    }

    #[tokio::test]
    async fn max_steps_returns_partial_result() {
        let provider: Arc<dyn Provider> = Arc::new(ScriptedProvider::new(vec![
            assistant_with_tool_call(),
            assistant_with_tool_call(),
        ]));
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let agent = AgentLoop::new("test-model", 0.0, 1);

        let result = agent
            .run("goal", provider, Arc::new(registry), serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(result.output["partial"], true);
    }

    #[tokio::test]
    async fn provider_error_propagates() {
        struct FailingProvider;
        #[async_trait]
        impl Provider for FailingProvider {
            fn name(&self) -> &str {
                "failing"
            }
            async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
                Err(ProviderError::Network("boom".into()))
            }
        }

        let provider: Arc<dyn Provider> = Arc::new(FailingProvider);
        let registry = Arc::new(ToolRegistry::new());
        let agent = AgentLoop::new("test-model", 0.0, 5);

        let err = agent.run("goal", provider, registry, serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, AgenticRunError::Failed(_)));
    }
}
