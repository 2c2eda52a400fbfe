//! Function metadata, code, and the tagged variants that drive tier dispatch.
//!
//! `FunctionKind` and `ToolImplementation` are deliberately modeled as tagged
//! enums rather than trait objects with inheritance — dispatch is a
//! `match`, not a vtable.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};

use crate::ids::FunctionId;

/// The four execution tiers, plus the `cascade` meta-tier.
///
/// Absence of `type` on stored metadata means `Code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionKind {
    Code,
    Generative,
    Agentic,
    Human,
    Cascade,
}

impl FunctionKind {
    /// The tier number used in the dispatch envelope's `_meta.tier`.
    pub fn tier_number(self) -> u8 {
        match self {
            FunctionKind::Code => 1,
            FunctionKind::Generative => 2,
            FunctionKind::Agentic => 3,
            FunctionKind::Human => 4,
            // Cascade has no single tier number; callers should special-case it.
            FunctionKind::Cascade => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FunctionKind::Code => "code",
            FunctionKind::Generative => "generative",
            FunctionKind::Agentic => "agentic",
            FunctionKind::Human => "human",
            FunctionKind::Cascade => "cascade",
        }
    }
}

impl Default for FunctionKind {
    fn default() -> Self {
        FunctionKind::Code
    }
}

/// A step of an agentic tool invocation, or of a cascade — how a tool's
/// (or a cascade step's) implementation is actually carried out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolImplementation {
    /// A concrete handler shipped with the gateway (web_search, file_read, …).
    Builtin { name: String },
    /// POST the tool's input JSON to an external endpoint.
    Api { endpoint: String },
    /// Recursive dispatch to another deployed function.
    Function { function_id: String },
    /// Dynamic inline code — always rejected.
    Inline { source: String },
}

/// A tool available to an agentic function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_schema")]
    pub parameters: serde_json::Value,
    pub implementation: ToolImplementation,
}

fn default_schema() -> serde_json::Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

/// How a cascade should react to a failing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorHandling {
    FailFast,
    Fallback,
    Continue,
}

impl Default for ErrorHandling {
    fn default() -> Self {
        ErrorHandling::FailFast
    }
}

/// One step of a cascade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeStep {
    pub function_id: String,
    pub tier: FunctionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_to: Option<String>,
}

/// The UI form attached to a human task, checked on `respond`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HumanUiForm {
    /// Field names that must be present (and non-null) in a submitted response.
    #[serde(default)]
    pub required_fields: Vec<String>,
    /// Arbitrary rendering hints passed through to the assignee's client.
    #[serde(default)]
    pub layout: serde_json::Value,
}

/// Deploy-time metadata for a function, keyed by `(tenant, functionId)` with
/// an optional `version` dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionMetadata {
    pub id: FunctionId,
    pub version: Version,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub entry_point: String,
    #[serde(default, rename = "type")]
    pub kind: Option<FunctionKind>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    // --- generative ---
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<serde_json::Value>,

    // --- agentic ---
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    #[serde(default)]
    pub tools: Vec<ToolSpec>,

    // --- human ---
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interaction_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui: Option<HumanUiForm>,
    #[serde(default)]
    pub assignees: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sla: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,

    // --- cascade ---
    #[serde(default)]
    pub steps: Vec<CascadeStep>,
    #[serde(default)]
    pub error_handling: ErrorHandling,
}

fn default_language() -> String {
    "typescript".into()
}

impl FunctionMetadata {
    /// The function kind, defaulting to `code` when absent.
    pub fn kind(&self) -> FunctionKind {
        self.kind.unwrap_or(FunctionKind::Code)
    }
}

/// Source + compiled artifact for a function, per `(tenant, functionId, version?)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCode {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compiled: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_map: Option<String>,
}

impl FunctionCode {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            compiled: None,
            source_map: None,
        }
    }
}

/// A version-history entry recorded by a rollback: `{from, to, at}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackRecord {
    pub from: Option<Version>,
    pub to: Version,
    pub at: DateTime<Utc>,
}

/// Extra per-invocation parameters threaded into tier execution —
/// e.g. a per-call `callback_url` override for human tasks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvocationOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_defaults_to_code() {
        let meta = sample_metadata();
        assert_eq!(meta.kind(), FunctionKind::Code);
    }

    #[test]
    fn tier_numbers_follow_the_execution_ladder() {
        assert_eq!(FunctionKind::Code.tier_number(), 1);
        assert_eq!(FunctionKind::Generative.tier_number(), 2);
        assert_eq!(FunctionKind::Agentic.tier_number(), 3);
        assert_eq!(FunctionKind::Human.tier_number(), 4);
    }

    fn sample_metadata() -> FunctionMetadata {
        FunctionMetadata {
            id: FunctionId::parse("my-fn").unwrap(),
            version: Version::new(1, 0, 0),
            language: "typescript".into(),
            entry_point: "index.ts".into(),
            kind: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            model: None,
            system_prompt: None,
            schema: None,
            goal: None,
            tools: vec![],
            interaction_type: None,
            ui: None,
            assignees: vec![],
            sla: None,
            timeout: None,
            callback_url: None,
            steps: vec![],
            error_handling: ErrorHandling::default(),
        }
    }
}
