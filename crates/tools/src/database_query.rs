//! Database query tool — delegates to an injected query executor.
//!
//! No SQL engine ships with this crate; a deployment wires in whatever
//! backend it actually has (Postgres, SQLite, a read replica, …) by
//! implementing [`QueryExecutor`]. Without one, the tool degrades to a
//! structured "not available" result instead of failing the whole call.

use async_trait::async_trait;
use functionsdo_core::error::ToolError;
use functionsdo_core::tool::{Tool, ToolResult};

#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn query(&self, sql: &str, params: Vec<serde_json::Value>) -> Result<serde_json::Value, String>;
}

pub struct DatabaseQueryTool {
    executor: Option<std::sync::Arc<dyn QueryExecutor>>,
}

impl DatabaseQueryTool {
    pub fn new(executor: Option<std::sync::Arc<dyn QueryExecutor>>) -> Self {
        Self { executor }
    }

    pub fn unavailable() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl Tool for DatabaseQueryTool {
    fn name(&self) -> &str {
        "database_query"
    }

    fn description(&self) -> &str {
        "Run a parameterized SQL query against the configured database and return the rows."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "sql": {
                    "type": "string",
                    "description": "The SQL query to run"
                },
                "params": {
                    "type": "array",
                    "description": "Positional query parameters",
                    "items": {}
                }
            },
            "required": ["sql"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let sql = arguments["sql"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'sql' argument".into()))?;

        let Some(executor) = &self.executor else {
            return Ok(ToolResult {
                call_id: String::new(),
                success: false,
                output: "database_query not available in this environment".into(),
                data: None,
            });
        };

        let params = arguments["params"].as_array().cloned().unwrap_or_default();

        match executor.query(sql, params).await {
            Ok(rows) => Ok(ToolResult {
                call_id: String::new(),
                success: true,
                output: serde_json::to_string_pretty(&rows).unwrap_or_default(),
                data: Some(rows),
            }),
            Err(e) => Ok(ToolResult {
                call_id: String::new(),
                success: false,
                output: format!("query failed: {e}"),
                data: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct ScriptedExecutor(serde_json::Value);

    #[async_trait]
    impl QueryExecutor for ScriptedExecutor {
        async fn query(&self, _sql: &str, _params: Vec<serde_json::Value>) -> Result<serde_json::Value, String> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn unavailable_without_executor() {
        let tool = DatabaseQueryTool::unavailable();
        let result = tool.execute(serde_json::json!({"sql": "select 1"})).await.unwrap();
        assert!(!result.success);
        assert!(result.output.contains("not available"));
    }

    #[tokio::test]
    async fn delegates_to_executor() {
        let tool = DatabaseQueryTool::new(Some(Arc::new(ScriptedExecutor(serde_json::json!([{"id": 1}])))));
        let result = tool
            .execute(serde_json::json!({"sql": "select * from users", "params": []}))
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.output.contains("\"id\""));
    }

    #[tokio::test]
    async fn missing_sql_argument() {
        let tool = DatabaseQueryTool::unavailable();
        let result = tool.execute(serde_json::json!({})).await;
        assert!(result.is_err());
    }
}
