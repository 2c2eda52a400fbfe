//! Web fetch tool — retrieve a URL's contents over HTTP(S).
//!
//! This tool performs the actual network call; the agentic dispatcher wraps
//! every lookup of `web_fetch` in an SSRF check before it ever reaches here,
//! so this implementation trusts the URL it's handed.

use async_trait::async_trait;
use functionsdo_core::error::ToolError;
use functionsdo_core::tool::{Tool, ToolResult};

pub struct WebFetchTool {
    client: reqwest::Client,
}

impl WebFetchTool {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("failed to build reqwest client"),
        }
    }
}

impl Default for WebFetchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebFetchTool {
    fn name(&self) -> &str {
        "web_fetch"
    }

    fn description(&self) -> &str {
        "Fetch the contents of a URL over HTTP or HTTPS and return the response body as text."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to fetch"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let url = arguments["url"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'url' argument".into()))?;

        let response = self.client.get(url).send().await.map_err(|e| ToolError::ExecutionFailed {
            tool_name: "web_fetch".into(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| ToolError::ExecutionFailed {
            tool_name: "web_fetch".into(),
            reason: e.to_string(),
        })?;

        Ok(ToolResult {
            call_id: String::new(),
            success: status.is_success(),
            output: body,
            data: Some(serde_json::json!({ "status_code": status.as_u16() })),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_definition() {
        let tool = WebFetchTool::new();
        assert_eq!(tool.name(), "web_fetch");
        let schema = tool.parameters_schema();
        assert_eq!(schema["required"], serde_json::json!(["url"]));
    }

    #[tokio::test]
    async fn missing_url_returns_error() {
        let tool = WebFetchTool::new();
        let result = tool.execute(serde_json::json!({})).await;
        assert!(result.is_err());
    }
}
