//! Slack send tool — posts a message to a configured incoming webhook.
//!
//! Without a configured webhook URL the tool degrades to a structured
//! "not available" result rather than failing the whole call.

use async_trait::async_trait;
use functionsdo_core::error::ToolError;
use functionsdo_core::tool::{Tool, ToolResult};

pub struct SlackSendTool {
    client: reqwest::Client,
    webhook_url: Option<String>,
}

impl SlackSendTool {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url,
        }
    }

    pub fn unavailable() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl Tool for SlackSendTool {
    fn name(&self) -> &str {
        "slack_send"
    }

    fn description(&self) -> &str {
        "Post a message to Slack via the configured incoming webhook."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "channel": { "type": "string", "description": "Channel name, e.g. #alerts" },
                "text": { "type": "string" }
            },
            "required": ["text"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let text = arguments["text"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'text' argument".into()))?;
        let channel = arguments["channel"].as_str();

        let Some(webhook_url) = &self.webhook_url else {
            return Ok(ToolResult {
                call_id: String::new(),
                success: false,
                output: "slack_send not available in this environment".into(),
                data: None,
            });
        };

        let mut payload = serde_json::json!({ "text": text });
        if let Some(channel) = channel {
            payload["channel"] = serde_json::json!(channel);
        }

        let response = self
            .client
            .post(webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "slack_send".into(),
                reason: e.to_string(),
            })?;

        let success = response.status().is_success();
        let status = response.status().as_u16();
        Ok(ToolResult {
            call_id: String::new(),
            success,
            output: format!("slack webhook returned status {status}"),
            data: Some(serde_json::json!({ "status_code": status })),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unavailable_without_webhook() {
        let tool = SlackSendTool::unavailable();
        let result = tool.execute(serde_json::json!({"text": "hi"})).await.unwrap();
        assert!(!result.success);
        assert!(result.output.contains("not available"));
    }

    #[tokio::test]
    async fn missing_text_rejected() {
        let tool = SlackSendTool::unavailable();
        let result = tool.execute(serde_json::json!({})).await;
        assert!(result.is_err());
    }
}
