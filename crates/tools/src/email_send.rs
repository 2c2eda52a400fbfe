//! Email send tool — POSTs a message to a configured transactional email API.
//!
//! Without a configured endpoint the tool degrades to a structured
//! "not available" result rather than failing the whole call.

use async_trait::async_trait;
use functionsdo_core::error::ToolError;
use functionsdo_core::tool::{Tool, ToolResult};

pub struct EmailSendTool {
    client: reqwest::Client,
    api_url: Option<String>,
    api_key: Option<String>,
}

impl EmailSendTool {
    pub fn new(api_url: Option<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            api_key,
        }
    }

    pub fn unavailable() -> Self {
        Self::new(None, None)
    }
}

#[async_trait]
impl Tool for EmailSendTool {
    fn name(&self) -> &str {
        "email_send"
    }

    fn description(&self) -> &str {
        "Send an email via the configured transactional email provider."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "to": { "type": "string", "description": "Recipient email address" },
                "subject": { "type": "string" },
                "body": { "type": "string" }
            },
            "required": ["to", "subject", "body"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let to = arguments["to"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'to' argument".into()))?;
        let subject = arguments["subject"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'subject' argument".into()))?;
        let body = arguments["body"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'body' argument".into()))?;

        let Some(api_url) = &self.api_url else {
            return Ok(ToolResult {
                call_id: String::new(),
                success: false,
                output: "email_send not available in this environment".into(),
                data: None,
            });
        };

        let mut request = self.client.post(api_url).json(&serde_json::json!({
            "to": to,
            "subject": subject,
            "body": body,
        }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| ToolError::ExecutionFailed {
            tool_name: "email_send".into(),
            reason: e.to_string(),
        })?;

        let success = response.status().is_success();
        let status = response.status().as_u16();
        Ok(ToolResult {
            call_id: String::new(),
            success,
            output: format!("email send returned status {status}"),
            data: Some(serde_json::json!({ "status_code": status })),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unavailable_without_endpoint() {
        let tool = EmailSendTool::unavailable();
        let result = tool
            .execute(serde_json::json!({"to": "a@example.com", "subject": "hi", "body": "hello"}))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.output.contains("not available"));
    }

    #[tokio::test]
    async fn missing_fields_rejected() {
        let tool = EmailSendTool::unavailable();
        let result = tool.execute(serde_json::json!({"to": "a@example.com"})).await;
        assert!(result.is_err());
    }
}
