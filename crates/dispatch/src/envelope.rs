//! The single envelope shape every tier executor returns, so the router and
//! the cascade engine never need to special-case a tier's body.

use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerativeExecutionMeta {
    pub model: String,
    pub tokens: TokenUsage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_latency_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TokenUsage {
    pub input: u32,
    pub output: u32,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeExecutionMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_used_bytes: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgenticExecutionMeta {
    pub steps: u32,
    pub tool_calls: u32,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HumanExecutionMeta {
    pub assignees: Vec<String>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    pub duration_ms: u64,
    pub executor_type: String,
    pub tier: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_execution: Option<CodeExecutionMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generative_execution: Option<GenerativeExecutionMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agentic_execution: Option<AgenticExecutionMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub human_execution: Option<HumanExecutionMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tiers_attempted: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps_executed: Option<u32>,
}

/// `{ status, body: { output fields..., taskId?, taskUrl?, taskStatus?, error?, _meta } }`.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchResult {
    pub status: u16,
    pub body: DispatchBody,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchBody {
    #[serde(flatten)]
    pub output: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "_meta")]
    pub meta: Meta,
}

impl DispatchResult {
    pub fn success(status: u16, output: Value, tier: u8, executor_type: &str, duration_ms: u64) -> Self {
        let output = match output {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("output".to_string(), other);
                map
            }
        };
        Self {
            status,
            body: DispatchBody {
                output,
                meta: Meta {
                    duration_ms,
                    executor_type: executor_type.to_string(),
                    tier,
                    ..Default::default()
                },
                ..Default::default()
            },
        }
    }

    pub fn error(status: u16, message: impl Into<String>, tier: u8, executor_type: &str) -> Self {
        Self {
            status,
            body: DispatchBody {
                error: Some(message.into()),
                meta: Meta {
                    duration_ms: 0,
                    executor_type: executor_type.to_string(),
                    tier,
                    ..Default::default()
                },
                ..Default::default()
            },
        }
    }

    pub fn is_error(&self) -> bool {
        self.status >= 400
    }

    /// The piped input for the next cascade step: this step's body with
    /// `_meta` stripped.
    pub fn piped_body(&self) -> Value {
        let mut value = serde_json::to_value(&self.body).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut value {
            map.remove("_meta");
        }
        value
    }
}
