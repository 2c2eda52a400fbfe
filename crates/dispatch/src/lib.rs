//! The tier dispatcher: routes one function invocation to its executor.
//!
//! `metadata.type` selects the tier (absent means `code`); `cascade` is
//! handled one layer up, by the cascade engine, which calls back into this
//! dispatcher per step.

pub mod agentic;
pub mod code;
pub mod envelope;
pub mod generative;
pub mod human;
pub mod ssrf;

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use functionsdo_config::TierConfig;
use functionsdo_core::model::{FunctionKind, FunctionMetadata};
use functionsdo_core::provider::Provider;
use functionsdo_tasks::TaskStore;

use agentic::{AgenticPool, AgenticRunner};
use code::CodeExecutor;
use envelope::DispatchResult;

/// The collaborators a dispatch call needs; any tier's collaborator may be
/// absent, in which case that tier's executions fail with an
/// executor-unavailable status rather than panicking.
pub struct Dispatcher {
    pub code_executor: Option<Arc<dyn CodeExecutor>>,
    pub generative_provider: Option<Arc<dyn Provider>>,
    pub agentic_provider: Option<Arc<dyn Provider>>,
    pub agentic_pool: Arc<AgenticPool>,
    pub agentic_runner: Arc<dyn AgenticRunner>,
    pub task_store: Arc<TaskStore>,
    pub tiers: TierConfig,
}

impl Dispatcher {
    pub async fn dispatch(
        &self,
        metadata: &FunctionMetadata,
        code: Option<&str>,
        input: serde_json::Value,
        callback_override: Option<String>,
    ) -> DispatchResult {
        match metadata.kind() {
            FunctionKind::Code => {
                code::dispatch_code(
                    self.code_executor.as_deref(),
                    code,
                    &metadata.entry_point,
                    input,
                    Duration::from_millis(self.tiers.code_timeout_ms),
                )
                .await
            }
            FunctionKind::Generative => {
                generative::dispatch_generative(
                    self.generative_provider.as_deref(),
                    metadata.model.as_deref().unwrap_or("default"),
                    metadata.system_prompt.as_deref(),
                    input,
                    Duration::from_millis(self.tiers.generative_timeout_ms),
                )
                .await
            }
            FunctionKind::Agentic => {
                agentic::dispatch_agentic(
                    &self.agentic_pool,
                    self.agentic_runner.as_ref(),
                    self.agentic_provider.clone(),
                    metadata.id.as_str(),
                    metadata.goal.as_deref().unwrap_or(""),
                    &metadata.tools,
                    input,
                    Duration::from_millis(self.tiers.agentic_timeout_ms),
                )
                .await
            }
            FunctionKind::Human => {
                human::dispatch_human(
                    &self.task_store,
                    metadata.id.clone(),
                    metadata.interaction_type.clone(),
                    metadata.ui.clone(),
                    metadata.assignees.clone(),
                    input,
                    metadata.timeout.clone(),
                    callback_override.or_else(|| metadata.callback_url.clone()),
                    ChronoDuration::milliseconds(self.tiers.human_timeout_ms as i64),
                )
                .await
            }
            FunctionKind::Cascade => DispatchResult::error(
                500,
                "cascade functions must be dispatched through the cascade engine",
                0,
                "cascade",
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use functionsdo_core::ids::FunctionId;
    use functionsdo_tasks::{WebhookDelivery, WebhookSender};
    use semver::Version;

    struct NoopSender;
    #[async_trait]
    impl WebhookSender for NoopSender {
        async fn send(&self, _url: &str, _body: &serde_json::Value) -> Result<(), String> {
            Ok(())
        }
    }

    struct NoBuiltins;
    impl agentic::BuiltinTools for NoBuiltins {
        fn get(&self, _name: &str) -> Option<Arc<dyn functionsdo_core::tool::Tool>> {
            None
        }
    }

    struct NoopApiClient;
    #[async_trait]
    impl agentic::ApiToolClient for NoopApiClient {
        async fn post(&self, _endpoint: &str, _input: &serde_json::Value) -> Result<serde_json::Value, String> {
            Ok(serde_json::Value::Null)
        }
    }

    struct NoopFunctionDispatch;
    #[async_trait]
    impl agentic::FunctionDispatch for NoopFunctionDispatch {
        async fn dispatch_function(&self, _function_id: &str, _input: serde_json::Value) -> serde_json::Value {
            serde_json::Value::Null
        }
    }

    struct NeverRunner;
    #[async_trait]
    impl AgenticRunner for NeverRunner {
        async fn run(
            &self,
            _goal: &str,
            _provider: Arc<dyn Provider>,
            _registry: Arc<functionsdo_core::tool::ToolRegistry>,
            _input: serde_json::Value,
        ) -> Result<agentic::AgenticRunOutput, agentic::AgenticRunError> {
            Err(agentic::AgenticRunError::Failed("unused in this test".into()))
        }
    }

    fn dispatcher() -> Dispatcher {
        let factory = agentic::ToolFactory::new(Arc::new(NoBuiltins), Arc::new(NoopApiClient), Arc::new(NoopFunctionDispatch));
        Dispatcher {
            code_executor: None,
            generative_provider: None,
            agentic_provider: None,
            agentic_pool: Arc::new(AgenticPool::new(factory)),
            agentic_runner: Arc::new(NeverRunner),
            task_store: Arc::new(TaskStore::new("https://fn.example", WebhookDelivery::spawn(NoopSender, 1))),
            tiers: TierConfig::default(),
        }
    }

    fn metadata(kind: Option<FunctionKind>) -> FunctionMetadata {
        FunctionMetadata {
            id: FunctionId::parse("my-fn").unwrap(),
            version: Version::new(1, 0, 0),
            language: "typescript".into(),
            entry_point: "index.ts".into(),
            kind,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            model: None,
            system_prompt: None,
            schema: None,
            goal: None,
            tools: vec![],
            interaction_type: None,
            ui: None,
            assignees: vec!["alice".into()],
            sla: None,
            timeout: None,
            callback_url: None,
            steps: vec![],
            error_handling: Default::default(),
        }
    }

    #[tokio::test]
    async fn absent_type_dispatches_as_code() {
        let d = dispatcher();
        let result = d.dispatch(&metadata(None), None, serde_json::json!({}), None).await;
        assert_eq!(result.status, 404);
        assert_eq!(result.body.meta.tier, 1);
    }

    #[tokio::test]
    async fn generative_without_provider_is_503() {
        let d = dispatcher();
        let result = d.dispatch(&metadata(Some(FunctionKind::Generative)), None, serde_json::json!({}), None).await;
        assert_eq!(result.status, 503);
    }

    #[tokio::test]
    async fn human_tier_returns_202_with_task() {
        let d = dispatcher();
        let result = d.dispatch(&metadata(Some(FunctionKind::Human)), None, serde_json::json!({}), None).await;
        assert_eq!(result.status, 202);
        assert!(result.body.task_id.is_some());
    }

    #[tokio::test]
    async fn cascade_type_is_rejected_by_the_tier_dispatcher() {
        let d = dispatcher();
        let result = d.dispatch(&metadata(Some(FunctionKind::Cascade)), None, serde_json::json!({}), None).await;
        assert_eq!(result.status, 500);
    }
}
