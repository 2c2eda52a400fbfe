//! Shared application state: every collaborator a handler or middleware
//! might need, built once at startup and handed out behind `Arc`.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use functionsdo_classifier::{Classifier, FunctionTier};
use functionsdo_compiler::esbuild::{CliEsbuildCompiler, EsbuildCompiler, EsbuildOptions, Format, Loader, NullEsbuildCompiler};
use functionsdo_config::AppConfig;
use functionsdo_core::model::FunctionKind;
use functionsdo_core::provider::Provider;
use functionsdo_core::tool::Tool;
use functionsdo_dispatch::agentic::{AgenticPool, BuiltinTools, FunctionDispatch, ReqwestApiToolClient, ToolFactory};
use functionsdo_dispatch::Dispatcher;
use functionsdo_ratelimit::RateLimiter;
use functionsdo_security::CsrfPolicy;
use functionsdo_storage::{Coordinator, StorageFacade};
use functionsdo_tasks::{ReqwestSender, TaskStore, WebhookDelivery};

/// Verifies an OAuth bearer token (tokens not matching the API-key prefix
/// family). No collaborator ships with this gateway — configuring one is
/// left to the deployment, matching the code tier's sandbox being an
/// external, interface-only collaborator.
#[async_trait]
pub trait OAuthValidator: Send + Sync {
    async fn validate(&self, token: &str) -> Option<functionsdo_core::route::AuthContext>;
}

pub struct AppState {
    pub config: AppConfig,
    pub storage: Arc<StorageFacade>,
    pub dispatcher: Arc<Dispatcher>,
    pub classifier: Option<Arc<Classifier>>,
    pub rate_limiter: Arc<RateLimiter>,
    pub csrf: CsrfPolicy,
    pub task_store: Arc<TaskStore>,
    pub esbuild: Arc<dyn EsbuildCompiler>,
    pub esbuild_options: EsbuildOptions,
    pub oauth: Option<Arc<dyn OAuthValidator>>,
    pub started_at: std::time::Instant,
}

/// Recursive dispatch for `function`-kind tools: looks the target function up
/// in the default tenant coordinator and runs it through the same
/// dispatcher. Built once at startup alongside the agentic tool registry, so
/// it has no per-request tenant context — recursive tool-triggered function
/// calls always resolve against the default coordinator.
struct GatewayFunctionDispatch {
    dispatcher: Weak<Dispatcher>,
    storage: Arc<StorageFacade>,
}

#[async_trait]
impl FunctionDispatch for GatewayFunctionDispatch {
    async fn dispatch_function(&self, function_id: &str, input: serde_json::Value) -> serde_json::Value {
        let Some(dispatcher) = self.dispatcher.upgrade() else {
            return serde_json::json!({ "error": "dispatcher unavailable" });
        };
        let Ok(coordinator) = self.storage.coordinator_for(None) else {
            return serde_json::json!({ "error": "storage not configured" });
        };
        let metadata = match coordinator.registry.get("default", function_id).await {
            Ok(m) => m,
            Err(e) => return serde_json::json!({ "error": e.to_string() }),
        };
        let code = coordinator.code.get("default", function_id).await.ok();
        let result = dispatcher
            .dispatch(&metadata, code.as_ref().map(|c| c.source.as_str()), input, None)
            .await;
        result.piped_body()
    }
}

/// Builtin agentic tools, addressed by `Arc` so the same instance can be
/// shared across every pooled registry rather than rebuilt per function.
struct GatewayBuiltins {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl BuiltinTools for GatewayBuiltins {
    fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }
}

fn builtin_tools(config: &functionsdo_tools::BuiltinConfig) -> HashMap<String, Arc<dyn Tool>> {
    let mut tools: HashMap<String, Arc<dyn Tool>> = HashMap::new();
    tools.insert("shell_exec".into(), Arc::new(functionsdo_tools::shell::ShellTool::new(config.shell_allowed_commands.clone())));
    tools.insert(
        "file_read".into(),
        Arc::new(functionsdo_tools::file_read::FileReadTool::with_restrictions(
            config.file_allowed_roots.clone(),
            config.file_forbidden_paths.clone(),
        )),
    );
    tools.insert(
        "file_write".into(),
        Arc::new(functionsdo_tools::file_write::FileWriteTool::with_restrictions(
            config.file_allowed_roots.clone(),
            config.file_forbidden_paths.clone(),
        )),
    );
    tools.insert("web_search".into(), Arc::new(functionsdo_tools::web_search::WebSearchTool));
    tools.insert("web_fetch".into(), Arc::new(functionsdo_tools::web_fetch::WebFetchTool::new()));
    tools.insert(
        "database_query".into(),
        Arc::new(functionsdo_tools::database_query::DatabaseQueryTool::new(config.database_executor.clone())),
    );
    tools.insert(
        "email_send".into(),
        Arc::new(functionsdo_tools::email_send::EmailSendTool::new(config.email_api_url.clone(), config.email_api_key.clone())),
    );
    tools.insert("slack_send".into(), Arc::new(functionsdo_tools::slack_send::SlackSendTool::new(config.slack_webhook_url.clone())));
    tools
}

pub fn classifier_tier_to_kind(tier: FunctionTier) -> FunctionKind {
    match tier {
        FunctionTier::Code => FunctionKind::Code,
        FunctionTier::Generative => FunctionKind::Generative,
        FunctionTier::Agentic => FunctionKind::Agentic,
        FunctionTier::Human => FunctionKind::Human,
    }
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let provider_router = functionsdo_providers::build_from_config(&config);
        let default_provider: Option<Arc<dyn Provider>> = provider_router.default();

        let classifier = if config.classifier.enabled {
            let mut providers: Vec<(Arc<dyn Provider>, String)> = Vec::new();
            if let Some(p) = &default_provider {
                providers.push((p.clone(), config.default_model.clone()));
            }
            for name in &config.classifier.fallback_providers {
                if let Some(p) = provider_router.get(name) {
                    providers.push((p, config.default_model.clone()));
                }
            }
            if providers.is_empty() {
                None
            } else {
                Classifier::new(providers, config.classifier.max_retries_per_provider, config.classifier.cache_capacity)
                    .ok()
                    .map(Arc::new)
            }
        } else {
            None
        };

        let webhook = WebhookDelivery::spawn(ReqwestSender::new(reqwest::Client::new()), 5);
        let task_store = Arc::new(TaskStore::new(format!("http://{}:{}", config.gateway.host, config.gateway.port), webhook));

        let storage = Arc::new(StorageFacade::new().with_default({
            let mem = Arc::new(functionsdo_storage::MemoryStorage::new());
            Coordinator { registry: mem.clone(), code: mem.clone(), api_keys: Some(mem) }
        }));

        let builtins = Arc::new(GatewayBuiltins { tools: builtin_tools(&functionsdo_tools::BuiltinConfig::default()) });
        let api_client = Arc::new(ReqwestApiToolClient::new(reqwest::Client::new()));
        let tiers = config.tiers.clone();
        let task_store_for_dispatch = task_store.clone();
        let storage_for_dispatch = storage.clone();

        let dispatcher = Arc::new_cyclic(|weak: &Weak<Dispatcher>| {
            let function_dispatch = Arc::new(GatewayFunctionDispatch {
                dispatcher: weak.clone(),
                storage: storage_for_dispatch,
            });
            let factory = ToolFactory::new(builtins, api_client, function_dispatch);
            Dispatcher {
                code_executor: None,
                generative_provider: default_provider.clone(),
                agentic_provider: default_provider.clone(),
                agentic_pool: Arc::new(AgenticPool::new(factory)),
                agentic_runner: Arc::new(functionsdo_agent::AgentLoop::new(
                    config.default_model.clone(),
                    config.default_temperature,
                    32,
                ).with_max_tokens(config.default_max_tokens)),
                task_store: task_store_for_dispatch,
                tiers,
            }
        });

        let esbuild: Arc<dyn EsbuildCompiler> = match &config.compiler.esbuild_path {
            Some(path) => Arc::new(CliEsbuildCompiler::new(path.clone())),
            None => Arc::new(NullEsbuildCompiler),
        };

        Self {
            rate_limiter: Arc::new(RateLimiter::new()),
            csrf: CsrfPolicy::new(config.csrf.cookie_name.clone(), config.csrf.exclude_patterns.clone()),
            esbuild_options: EsbuildOptions { loader: Loader::Ts, target: "es2022".into(), format: Format::Esm, jsx: None, sourcemap: false },
            esbuild,
            task_store,
            storage,
            dispatcher,
            classifier,
            oauth: None,
            started_at: std::time::Instant::now(),
            config,
        }
    }
}
