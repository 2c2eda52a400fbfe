//! File write tool — write or create files with path validation.

use async_trait::async_trait;
use functionsdo_core::error::ToolError;
use functionsdo_core::tool::{Tool, ToolResult};

pub struct FileWriteTool {
    /// Allowed root directories. Empty = allow all.
    pub allowed_roots: Vec<String>,
    /// Forbidden path prefixes.
    pub forbidden_paths: Vec<String>,
}

impl FileWriteTool {
    /// Create a file write tool with no path restrictions.
    pub fn new() -> Self {
        Self {
            allowed_roots: Vec::new(),
            forbidden_paths: Vec::new(),
        }
    }

    /// Create a file write tool with path restrictions.
    pub fn with_restrictions(allowed_roots: Vec<String>, forbidden_paths: Vec<String>) -> Self {
        Self {
            allowed_roots,
            forbidden_paths,
        }
    }
}

impl Default for FileWriteTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "file_write"
    }

    fn description(&self) -> &str {
        "Write content to a file. Creates the file if it doesn't exist, overwrites if it does."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to write to"
                },
                "content": {
                    "type": "string",
                    "description": "The content to write"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;

        let content = arguments["content"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'content' argument".into()))?;

        // Validate path against security policy
        if let Err(e) =
            functionsdo_security::validate_path(path, &self.allowed_roots, &self.forbidden_paths)
        {
            return Err(ToolError::PermissionDenied {
                tool_name: "file_write".into(),
                reason: e.to_string(),
            });
        }

        // Ensure parent directory exists
        if let Some(parent) = std::path::Path::new(path).parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            return Ok(ToolResult {
                call_id: String::new(),
                success: false,
                output: format!("Failed to create directory: {e}"),
                data: None,
            });
        }

        match tokio::fs::write(path, content).await {
            Ok(()) => Ok(ToolResult {
                call_id: String::new(),
                success: true,
                output: format!("Successfully wrote {} bytes to {path}", content.len()),
                data: None,
            }),
            Err(e) => Ok(ToolResult {
                call_id: String::new(),
                success: false,
                output: format!("Failed to write file: {e}"),
                data: None,
            }),
        }
    }
}
