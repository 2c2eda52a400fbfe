//! Tier 3: agentic execution. Tool handlers are produced by a factory keyed
//! on the tool's implementation kind and pooled per function id — executors
//! register handlers but cache no execution state between invocations.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use functionsdo_core::error::ToolError;
use functionsdo_core::model::{ToolImplementation, ToolSpec};
use functionsdo_core::provider::Provider;
use functionsdo_core::tool::{Tool, ToolRegistry, ToolResult};
use tokio::sync::RwLock;

use crate::envelope::{AgenticExecutionMeta, DispatchResult, Meta};
use crate::ssrf::validate_fetch_url;

/// Supplies concrete implementations for `builtin` tools (web_search,
/// file_read, shell_exec, ...). A tool absent from the backing set is not an
/// error — it surfaces to the model as "not available in this environment".
pub trait BuiltinTools: Send + Sync {
    fn get(&self, name: &str) -> Option<Arc<dyn Tool>>;
}

/// Recursive dispatch target for `function`-kind tools: invoke another
/// deployed function by id and hand back its body with `_meta` stripped.
#[async_trait]
pub trait FunctionDispatch: Send + Sync {
    async fn dispatch_function(&self, function_id: &str, input: serde_json::Value) -> serde_json::Value;
}

/// Posts a tool's input JSON to an external endpoint for `api`-kind tools.
#[async_trait]
pub trait ApiToolClient: Send + Sync {
    async fn post(&self, endpoint: &str, input: &serde_json::Value) -> Result<serde_json::Value, String>;
}

pub struct ReqwestApiToolClient {
    client: reqwest::Client,
}

impl ReqwestApiToolClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ApiToolClient for ReqwestApiToolClient {
    async fn post(&self, endpoint: &str, input: &serde_json::Value) -> Result<serde_json::Value, String> {
        let response = self
            .client
            .post(endpoint)
            .json(input)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("endpoint returned {}", response.status()));
        }
        match response.json::<serde_json::Value>().await {
            Ok(v) => Ok(v),
            Err(_) => Ok(serde_json::Value::Null),
        }
    }
}

/// Runs the agentic loop itself (model + tool-call round trips); lives in
/// the agent crate, which implements this trait against a pooled registry.
#[async_trait]
pub trait AgenticRunner: Send + Sync {
    async fn run(
        &self,
        goal: &str,
        provider: Arc<dyn Provider>,
        registry: Arc<ToolRegistry>,
        input: serde_json::Value,
    ) -> Result<AgenticRunOutput, AgenticRunError>;
}

pub struct AgenticRunOutput {
    pub output: serde_json::Value,
    pub steps: u32,
    pub tool_calls: u32,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum AgenticRunError {
    #[error("{0}")]
    Failed(String),
}

struct DelegatingTool(Arc<dyn Tool>);

#[async_trait]
impl Tool for DelegatingTool {
    fn name(&self) -> &str {
        self.0.name()
    }
    fn description(&self) -> &str {
        self.0.description()
    }
    fn parameters_schema(&self) -> serde_json::Value {
        self.0.parameters_schema()
    }
    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        self.0.execute(arguments).await
    }
}

struct UnavailableTool {
    name: String,
}

#[async_trait]
impl Tool for UnavailableTool {
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> &str {
        "unavailable in this environment"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object" })
    }
    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        Ok(ToolResult {
            call_id: String::new(),
            success: false,
            output: format!("{} not available in this environment", self.name),
            data: None,
        })
    }
}

struct ApiTool {
    name: String,
    description: String,
    endpoint: String,
    client: Arc<dyn ApiToolClient>,
}

#[async_trait]
impl Tool for ApiTool {
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> &str {
        &self.description
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object" })
    }
    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        match self.client.post(&self.endpoint, &arguments).await {
            Ok(value) => Ok(ToolResult {
                call_id: String::new(),
                success: true,
                output: value.to_string(),
                data: Some(value),
            }),
            Err(reason) => Err(ToolError::ExecutionFailed { tool_name: self.name.clone(), reason }),
        }
    }
}

struct FunctionTool {
    name: String,
    description: String,
    function_id: String,
    dispatcher: Arc<dyn FunctionDispatch>,
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> &str {
        &self.description
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object" })
    }
    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let value = self.dispatcher.dispatch_function(&self.function_id, arguments).await;
        Ok(ToolResult {
            call_id: String::new(),
            success: true,
            output: value.to_string(),
            data: Some(value),
        })
    }
}

struct InlineTool {
    name: String,
}

#[async_trait]
impl Tool for InlineTool {
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> &str {
        "inline implementations are not allowed"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object" })
    }
    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        Err(ToolError::InvalidArguments(
            "inline tool implementations are not allowed; deploy the handler as a function and reference it via `function`".into(),
        ))
    }
}

/// web_fetch is the one builtin the dispatcher itself guards (SSRF), so it
/// wraps whatever the backing `BuiltinTools` set provides — or a direct
/// reqwest fetch when none is registered — behind the validator.
struct WebFetchTool {
    inner: Option<Arc<dyn Tool>>,
}

#[async_trait]
impl Tool for WebFetchTool {
    fn name(&self) -> &str {
        "web_fetch"
    }
    fn description(&self) -> &str {
        "Fetch a URL's contents (http/https only, private networks blocked)"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": { "url": { "type": "string" } },
            "required": ["url"],
        })
    }
    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let url = arguments.get("url").and_then(|v| v.as_str()).unwrap_or_default();
        if let Err(rejection) = validate_fetch_url(url) {
            return Ok(ToolResult {
                call_id: String::new(),
                success: false,
                output: rejection.to_string(),
                data: Some(serde_json::json!({ "error": rejection.to_string(), "blocked": true })),
            });
        }
        match &self.inner {
            Some(tool) => tool.execute(arguments).await,
            None => Ok(ToolResult {
                call_id: String::new(),
                success: false,
                output: "web_fetch not available in this environment".into(),
                data: None,
            }),
        }
    }
}

pub struct ToolFactory {
    builtins: Arc<dyn BuiltinTools>,
    api_client: Arc<dyn ApiToolClient>,
    dispatcher: Arc<dyn FunctionDispatch>,
}

impl ToolFactory {
    pub fn new(builtins: Arc<dyn BuiltinTools>, api_client: Arc<dyn ApiToolClient>, dispatcher: Arc<dyn FunctionDispatch>) -> Self {
        Self { builtins, api_client, dispatcher }
    }

    pub fn build(&self, spec: &ToolSpec) -> Box<dyn Tool> {
        match &spec.implementation {
            ToolImplementation::Builtin { name } if name == "web_fetch" => {
                Box::new(WebFetchTool { inner: self.builtins.get(name) })
            }
            ToolImplementation::Builtin { name } => self
                .builtins
                .get(name)
                .map(|t| Box::new(DelegatingTool(t)) as Box<dyn Tool>)
                .unwrap_or_else(|| Box::new(UnavailableTool { name: name.clone() })),
            ToolImplementation::Api { endpoint } => Box::new(ApiTool {
                name: spec.name.clone(),
                description: spec.description.clone(),
                endpoint: endpoint.clone(),
                client: self.api_client.clone(),
            }),
            ToolImplementation::Function { function_id } => Box::new(FunctionTool {
                name: spec.name.clone(),
                description: spec.description.clone(),
                function_id: function_id.clone(),
                dispatcher: self.dispatcher.clone(),
            }),
            ToolImplementation::Inline { .. } => Box::new(InlineTool { name: spec.name.clone() }),
        }
    }
}

/// Caches a built `ToolRegistry` per function id so repeated invocations of
/// the same agentic function reuse their handler set.
pub struct AgenticPool {
    registries: RwLock<HashMap<String, Arc<ToolRegistry>>>,
    factory: ToolFactory,
}

impl AgenticPool {
    pub fn new(factory: ToolFactory) -> Self {
        Self { registries: RwLock::new(HashMap::new()), factory }
    }

    pub async fn registry_for(&self, function_id: &str, tools: &[ToolSpec]) -> Arc<ToolRegistry> {
        if let Some(existing) = self.registries.read().await.get(function_id) {
            return existing.clone();
        }
        let mut registry = ToolRegistry::new();
        for spec in tools {
            registry.register(self.factory.build(spec));
        }
        let registry = Arc::new(registry);
        self.registries.write().await.insert(function_id.to_string(), registry.clone());
        registry
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn dispatch_agentic(
    pool: &AgenticPool,
    runner: &dyn AgenticRunner,
    provider: Option<Arc<dyn Provider>>,
    function_id: &str,
    goal: &str,
    tools: &[ToolSpec],
    input: serde_json::Value,
    timeout: Duration,
) -> DispatchResult {
    let Some(provider) = provider else {
        return DispatchResult::error(503, "No agentic provider configured", 3, "agentic");
    };

    let registry = pool.registry_for(function_id, tools).await;
    let started = Instant::now();

    match tokio::time::timeout(timeout, runner.run(goal, provider, registry, input)).await {
        Err(_) => DispatchResult::error(408, "Agentic execution timed out", 3, "agentic"),
        Ok(Err(e)) => DispatchResult::error(500, e.to_string(), 3, "agentic"),
        Ok(Ok(run)) => {
            let mut result = DispatchResult::success(
                200,
                serde_json::json!({ "output": run.output }),
                3,
                "agentic",
                started.elapsed().as_millis() as u64,
            );
            result.body.meta = Meta {
                agentic_execution: Some(AgenticExecutionMeta { steps: run.steps, tool_calls: run.tool_calls }),
                ..result.body.meta
            };
            result
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use functionsdo_core::error::ProviderError;
    use functionsdo_core::provider::{ProviderRequest, ProviderResponse};

    struct NoBuiltins;
    impl BuiltinTools for NoBuiltins {
        fn get(&self, _name: &str) -> Option<Arc<dyn Tool>> {
            None
        }
    }

    struct NoopApiClient;
    #[async_trait]
    impl ApiToolClient for NoopApiClient {
        async fn post(&self, _endpoint: &str, _input: &serde_json::Value) -> Result<serde_json::Value, String> {
            Ok(serde_json::Value::Null)
        }
    }

    struct NoopDispatch;
    #[async_trait]
    impl FunctionDispatch for NoopDispatch {
        async fn dispatch_function(&self, _function_id: &str, _input: serde_json::Value) -> serde_json::Value {
            serde_json::Value::Null
        }
    }

    struct StubProvider;
    #[async_trait]
    impl Provider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }
        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            unreachable!("runner is faked in these tests")
        }
    }

    struct ScriptedRunner {
        result: Result<(), ()>,
    }

    #[async_trait]
    impl AgenticRunner for ScriptedRunner {
        async fn run(
            &self,
            _goal: &str,
            _provider: Arc<dyn Provider>,
            _registry: Arc<ToolRegistry>,
            _input: serde_json::Value,
        ) -> Result<AgenticRunOutput, AgenticRunError> {
            match self.result {
                Ok(()) => Ok(AgenticRunOutput { output: serde_json::json!("done"), steps: 2, tool_calls: 1 }),
                Err(()) => Err(AgenticRunError::Failed("agent crashed".into())),
            }
        }
    }

    fn pool() -> AgenticPool {
        AgenticPool::new(ToolFactory::new(Arc::new(NoBuiltins), Arc::new(NoopApiClient), Arc::new(NoopDispatch)))
    }

    #[tokio::test]
    async fn missing_provider_is_503() {
        let pool = pool();
        let runner = ScriptedRunner { result: Ok(()) };
        let result = dispatch_agentic(&pool, &runner, None, "fn1", "goal", &[], serde_json::json!({}), Duration::from_secs(1)).await;
        assert_eq!(result.status, 503);
    }

    #[tokio::test]
    async fn success_populates_agentic_meta() {
        let pool = pool();
        let runner = ScriptedRunner { result: Ok(()) };
        let provider: Arc<dyn Provider> = Arc::new(StubProvider);
        let result = dispatch_agentic(&pool, &runner, Some(provider), "fn1", "goal", &[], serde_json::json!({}), Duration::from_secs(1)).await;
        assert_eq!(result.status, 200);
        let meta = result.body.meta.agentic_execution.unwrap();
        assert_eq!(meta.steps, 2);
        assert_eq!(meta.tool_calls, 1);
    }

    #[tokio::test]
    async fn runner_failure_is_500() {
        let pool = pool();
        let runner = ScriptedRunner { result: Err(()) };
        let provider: Arc<dyn Provider> = Arc::new(StubProvider);
        let result = dispatch_agentic(&pool, &runner, Some(provider), "fn1", "goal", &[], serde_json::json!({}), Duration::from_secs(1)).await;
        assert_eq!(result.status, 500);
    }

    #[tokio::test]
    async fn inline_tool_always_errors() {
        let factory = ToolFactory::new(Arc::new(NoBuiltins), Arc::new(NoopApiClient), Arc::new(NoopDispatch));
        let spec = ToolSpec {
            name: "dyn".into(),
            description: String::new(),
            parameters: serde_json::json!({}),
            implementation: ToolImplementation::Inline { source: "console.log(1)".into() },
        };
        let tool = factory.build(&spec);
        let err = tool.execute(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn unavailable_builtin_does_not_throw() {
        let factory = ToolFactory::new(Arc::new(NoBuiltins), Arc::new(NoopApiClient), Arc::new(NoopDispatch));
        let spec = ToolSpec {
            name: "shell_exec".into(),
            description: String::new(),
            parameters: serde_json::json!({}),
            implementation: ToolImplementation::Builtin { name: "shell_exec".into() },
        };
        let tool = factory.build(&spec);
        let result = tool.execute(serde_json::json!({})).await.unwrap();
        assert!(!result.success);
        assert!(result.output.contains("not available"));
    }

    #[tokio::test]
    async fn web_fetch_blocks_private_targets() {
        let factory = ToolFactory::new(Arc::new(NoBuiltins), Arc::new(NoopApiClient), Arc::new(NoopDispatch));
        let spec = ToolSpec {
            name: "web_fetch".into(),
            description: String::new(),
            parameters: serde_json::json!({}),
            implementation: ToolImplementation::Builtin { name: "web_fetch".into() },
        };
        let tool = factory.build(&spec);
        let result = tool.execute(serde_json::json!({"url": "http://169.254.169.254/latest"})).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.data.unwrap()["blocked"], true);
    }

    #[tokio::test]
    async fn registry_for_is_cached_per_function_id() {
        let pool = pool();
        let tools = vec![ToolSpec {
            name: "dyn".into(),
            description: String::new(),
            parameters: serde_json::json!({}),
            implementation: ToolImplementation::Inline { source: String::new() },
        }];
        let first = pool.registry_for("fn1", &tools).await;
        let second = pool.registry_for("fn1", &tools).await;
        assert!(Arc::ptr_eq(&first, &second));
    }
}
