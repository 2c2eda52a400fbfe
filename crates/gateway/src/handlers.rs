//! HTTP handlers: health/status, function CRUD, invoke, cascade, logs, human
//! tasks, and auth introspection.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::Extension;
use chrono::Utc;
use functionsdo_core::error::ErrorCode;
use functionsdo_core::ids::FunctionId;
use functionsdo_core::model::{FunctionCode, FunctionKind, FunctionMetadata};
use functionsdo_core::route::RouteContext;
use functionsdo_dispatch::envelope::DispatchResult;
use functionsdo_tasks::{CreateTaskRequest, TaskStatus};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{bad_request, error_response, internal, not_found, unauthenticated};
use crate::middleware::CorrelationId;
use crate::state::{classifier_tier_to_kind, AppState};

fn correlation(ext: &axum::http::Extensions) -> String {
    ext.get::<CorrelationId>().map(|c| c.0.clone()).unwrap_or_default()
}

fn tenant_of(ctx: &RouteContext) -> Option<String> {
    ctx.auth.as_ref().map(|a| a.current_org.clone().unwrap_or_else(|| a.user_id.clone()))
}

fn parse_function_id(raw: &str, correlation_id: &str) -> Result<FunctionId, Response> {
    FunctionId::parse(raw).map_err(|e| bad_request(ErrorCode::InvalidFunctionId, e.to_string(), correlation_id))
}

fn dispatch_result_to_response(result: DispatchResult) -> Response {
    let status = StatusCode::from_u16(result.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(result.body)).into_response()
}

/// Parses an invocation body: empty body is `null`; JSON content-type (or
/// none) is parsed as JSON, any other content-type is wrapped as `{text}`.
fn parse_invoke_body(headers: &HeaderMap, bytes: &[u8], correlation_id: &str) -> Result<Value, Response> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    let content_type = headers.get(axum::http::header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).unwrap_or("");
    if content_type.is_empty() || content_type.contains("json") {
        serde_json::from_slice(bytes).map_err(|_| bad_request(ErrorCode::InvalidJson, "Invalid JSON body", correlation_id))
    } else {
        Ok(json!({ "text": String::from_utf8_lossy(bytes) }))
    }
}

pub async fn health_handler() -> Response {
    (StatusCode::OK, Json(json!({ "status": "ok", "service": "Functions.do" }))).into_response()
}

pub async fn status_handler(State(state): State<Arc<AppState>>) -> Response {
    let uptime = state.started_at.elapsed().as_secs();
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION"), "uptimeSeconds": uptime })),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    cursor: Option<String>,
    limit: Option<usize>,
}

pub async fn list_functions(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RouteContext>,
    Query(query): Query<ListQuery>,
    ext: axum::http::Extensions,
) -> Response {
    let correlation_id = correlation(&ext);
    let Some(tenant) = tenant_of(&ctx) else {
        return unauthenticated("missing authenticated tenant", &correlation_id);
    };
    let coordinator = match state.storage.coordinator_for(ctx.auth.as_ref().map(|a| a.user_id.as_str())) {
        Ok(c) => c,
        Err(e) => return internal(e.to_string(), &correlation_id),
    };
    match coordinator.registry.list(&tenant, query.cursor.as_deref(), query.limit.unwrap_or(100)).await {
        Ok(page) => (StatusCode::OK, Json(json!({ "items": page.items, "nextCursor": page.next_cursor }))).into_response(),
        Err(e) => internal(e.to_string(), &correlation_id),
    }
}

#[derive(Debug, Deserialize)]
pub struct DeployRequest {
    pub id: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub entry_point: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<FunctionKind>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub schema: Option<Value>,
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default)]
    pub tools: Vec<functionsdo_core::model::ToolSpec>,
    #[serde(default)]
    pub interaction_type: Option<String>,
    #[serde(default)]
    pub ui: Option<functionsdo_core::model::HumanUiForm>,
    #[serde(default)]
    pub assignees: Vec<String>,
    #[serde(default)]
    pub timeout: Option<String>,
    #[serde(default)]
    pub callback_url: Option<String>,
    #[serde(default)]
    pub steps: Vec<functionsdo_core::model::CascadeStep>,
    #[serde(default)]
    pub error_handling: functionsdo_core::model::ErrorHandling,
}

pub async fn deploy_function(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RouteContext>,
    ext: axum::http::Extensions,
    Json(req): Json<DeployRequest>,
) -> Response {
    let correlation_id = correlation(&ext);
    let Some(tenant) = tenant_of(&ctx) else {
        return unauthenticated("missing authenticated tenant", &correlation_id);
    };
    let function_id = match parse_function_id(&req.id, &correlation_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let coordinator = match state.storage.coordinator_for(ctx.auth.as_ref().map(|a| a.user_id.as_str())) {
        Ok(c) => c,
        Err(e) => return internal(e.to_string(), &correlation_id),
    };

    let now = Utc::now();
    let metadata = FunctionMetadata {
        id: function_id.clone(),
        version: semver::Version::new(1, 0, 0),
        language: req.language.unwrap_or_else(|| "typescript".into()),
        entry_point: req.entry_point.unwrap_or_else(|| "index".into()),
        kind: req.kind,
        created_at: now,
        updated_at: now,
        model: req.model,
        system_prompt: req.system_prompt,
        schema: req.schema,
        goal: req.goal,
        tools: req.tools,
        interaction_type: req.interaction_type,
        ui: req.ui,
        assignees: req.assignees,
        sla: None,
        timeout: req.timeout,
        callback_url: req.callback_url,
        steps: req.steps,
        error_handling: req.error_handling,
    };

    if let Err(e) = coordinator.registry.put(&tenant, metadata.clone()).await {
        return internal(e.to_string(), &correlation_id);
    }

    if let Some(source) = req.code {
        let compiled = if metadata.language == "typescript" {
            let result = functionsdo_compiler::compile(&source, state.esbuild.as_ref(), &state.esbuild_options, state.config.compiler.force_regex).await;
            if !result.success {
                return bad_request(ErrorCode::InvalidJson, format!("compile failed: {:?}", result.errors), &correlation_id);
            }
            Some(result.code)
        } else {
            None
        };
        let mut code = FunctionCode::new(source);
        code.compiled = compiled;
        if let Err(e) = coordinator.code.put(&tenant, function_id.as_str(), code).await {
            return internal(e.to_string(), &correlation_id);
        }
    }

    (StatusCode::OK, Json(metadata)).into_response()
}

pub async fn get_function(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RouteContext>,
    Path(id): Path<String>,
    ext: axum::http::Extensions,
) -> Response {
    let correlation_id = correlation(&ext);
    let Some(tenant) = tenant_of(&ctx) else {
        return unauthenticated("missing authenticated tenant", &correlation_id);
    };
    let function_id = match parse_function_id(&id, &correlation_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let coordinator = match state.storage.coordinator_for(ctx.auth.as_ref().map(|a| a.user_id.as_str())) {
        Ok(c) => c,
        Err(e) => return internal(e.to_string(), &correlation_id),
    };
    match coordinator.registry.get(&tenant, function_id.as_str()).await {
        Ok(meta) => (StatusCode::OK, Json(meta)).into_response(),
        Err(_) => not_found("Function not found", &correlation_id),
    }
}

pub async fn patch_function(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RouteContext>,
    Path(id): Path<String>,
    ext: axum::http::Extensions,
    Json(patch): Json<Value>,
) -> Response {
    let correlation_id = correlation(&ext);
    let Some(tenant) = tenant_of(&ctx) else {
        return unauthenticated("missing authenticated tenant", &correlation_id);
    };
    let function_id = match parse_function_id(&id, &correlation_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let coordinator = match state.storage.coordinator_for(ctx.auth.as_ref().map(|a| a.user_id.as_str())) {
        Ok(c) => c,
        Err(e) => return internal(e.to_string(), &correlation_id),
    };
    let existing = match coordinator.registry.get(&tenant, function_id.as_str()).await {
        Ok(meta) => meta,
        Err(_) => return not_found("Function not found", &correlation_id),
    };
    let mut merged = match serde_json::to_value(&existing) {
        Ok(v) => v,
        Err(e) => return internal(e.to_string(), &correlation_id),
    };
    if let (Value::Object(base), Value::Object(patch)) = (&mut merged, patch) {
        for (k, v) in patch {
            base.insert(k, v);
        }
    }
    let mut updated: FunctionMetadata = match serde_json::from_value(merged) {
        Ok(m) => m,
        Err(e) => return bad_request(ErrorCode::InvalidJson, e.to_string(), &correlation_id),
    };
    updated.updated_at = Utc::now();
    match coordinator.registry.update(&tenant, updated.clone()).await {
        Ok(()) => (StatusCode::OK, Json(updated)).into_response(),
        Err(e) => internal(e.to_string(), &correlation_id),
    }
}

pub async fn delete_function(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RouteContext>,
    Path(id): Path<String>,
    ext: axum::http::Extensions,
) -> Response {
    let correlation_id = correlation(&ext);
    let Some(tenant) = tenant_of(&ctx) else {
        return unauthenticated("missing authenticated tenant", &correlation_id);
    };
    let function_id = match parse_function_id(&id, &correlation_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let coordinator = match state.storage.coordinator_for(ctx.auth.as_ref().map(|a| a.user_id.as_str())) {
        Ok(c) => c,
        Err(e) => return internal(e.to_string(), &correlation_id),
    };
    match coordinator.registry.delete(&tenant, function_id.as_str()).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(_) => not_found("Function not found", &correlation_id),
    }
}

pub async fn invoke_function(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RouteContext>,
    Path(id): Path<String>,
    headers: HeaderMap,
    ext: axum::http::Extensions,
    bytes: Bytes,
) -> Response {
    let correlation_id = correlation(&ext);
    let function_id = match parse_function_id(&id, &correlation_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let input = match parse_invoke_body(&headers, &bytes, &correlation_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let tenant = tenant_of(&ctx).unwrap_or_else(|| "default".to_string());
    let coordinator = match state.storage.coordinator_for(ctx.auth.as_ref().map(|a| a.user_id.as_str())) {
        Ok(c) => c,
        Err(e) => return internal(e.to_string(), &correlation_id),
    };

    let mut metadata = match coordinator.registry.get(&tenant, function_id.as_str()).await {
        Ok(meta) => meta,
        Err(_) => return not_found("Function not found", &correlation_id),
    };

    if metadata.kind == Some(FunctionKind::Cascade) {
        return run_cascade_invocation(&state, coordinator, &tenant, &metadata, input).await;
    }

    if metadata.kind.is_none() {
        if let Some(classifier) = &state.classifier {
            let entry = classifier.classify(metadata.id.as_str(), None, metadata.schema.as_ref()).await;
            metadata.kind = Some(classifier_tier_to_kind(entry.kind));
        }
    }

    let code = match metadata.kind() {
        FunctionKind::Code => match coordinator.code.get(&tenant, function_id.as_str()).await {
            Ok(code) => Some(code.compiled.unwrap_or(code.source)),
            Err(_) => return not_found("Function code not found", &correlation_id),
        },
        _ => None,
    };

    let result = state.dispatcher.dispatch(&metadata, code.as_deref(), input, None).await;
    dispatch_result_to_response(result)
}

async fn run_cascade_invocation(
    state: &AppState,
    coordinator: &functionsdo_storage::Coordinator,
    tenant: &str,
    metadata: &FunctionMetadata,
    input: Value,
) -> Response {
    let step_dispatcher = RequestStepDispatcher { dispatcher: &state.dispatcher, coordinator, tenant };
    let result = functionsdo_cascade::run_cascade(&step_dispatcher, &metadata.steps, metadata.error_handling, input, state.config.max_cascade_steps).await;
    dispatch_result_to_response(result)
}

struct RequestStepDispatcher<'a> {
    dispatcher: &'a functionsdo_dispatch::Dispatcher,
    coordinator: &'a functionsdo_storage::Coordinator,
    tenant: &'a str,
}

#[async_trait::async_trait]
impl<'a> functionsdo_cascade::StepDispatcher for RequestStepDispatcher<'a> {
    async fn dispatch_step(&self, function_id: &str, tier: FunctionKind, input: Value) -> DispatchResult {
        let metadata = match self.coordinator.registry.get(self.tenant, function_id).await {
            Ok(mut meta) => {
                meta.kind = Some(tier);
                meta
            }
            Err(_) => return DispatchResult::error(404, "Function not found", tier.tier_number(), tier.as_str()),
        };
        let code = match tier {
            FunctionKind::Code => match self.coordinator.code.get(self.tenant, function_id).await {
                Ok(code) => Some(code.compiled.unwrap_or(code.source)),
                Err(_) => return DispatchResult::error(404, "Function code not found", tier.tier_number(), tier.as_str()),
            },
            _ => None,
        };
        self.dispatcher.dispatch(&metadata, code.as_deref(), input, None).await
    }
}

pub async fn cascade_invoke(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RouteContext>,
    Path(id): Path<String>,
    headers: HeaderMap,
    ext: axum::http::Extensions,
    bytes: Bytes,
) -> Response {
    let correlation_id = correlation(&ext);
    let function_id = match parse_function_id(&id, &correlation_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let input = match parse_invoke_body(&headers, &bytes, &correlation_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let tenant = tenant_of(&ctx).unwrap_or_else(|| "default".to_string());
    let coordinator = match state.storage.coordinator_for(ctx.auth.as_ref().map(|a| a.user_id.as_str())) {
        Ok(c) => c,
        Err(e) => return internal(e.to_string(), &correlation_id),
    };
    let metadata = match coordinator.registry.get(&tenant, function_id.as_str()).await {
        Ok(meta) => meta,
        Err(_) => return not_found("Function not found", &correlation_id),
    };
    if metadata.kind != Some(FunctionKind::Cascade) {
        return bad_request(ErrorCode::MissingRequired, "function is not a cascade", &correlation_id);
    }
    run_cascade_invocation(&state, coordinator, &tenant, &metadata, input).await
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub since: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub cursor: Option<String>,
}

/// No log storage collaborator ships with this gateway; logs always report
/// unavailable rather than fabricating an empty success.
pub async fn logs_handler(Path(_id): Path<String>, Query(_query): Query<LogsQuery>, ext: axum::http::Extensions) -> Response {
    let correlation_id = correlation(&ext);
    error_response(StatusCode::SERVICE_UNAVAILABLE, ErrorCode::ServiceUnavailable, "log backend not configured", &correlation_id)
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskBody {
    pub function_id: String,
    #[serde(default)]
    pub interaction_type: Option<String>,
    #[serde(default)]
    pub ui: Option<functionsdo_core::model::HumanUiForm>,
    #[serde(default)]
    pub assignees: Vec<String>,
    #[serde(default)]
    pub invocation_data: Value,
    #[serde(default)]
    pub timeout: Option<String>,
    #[serde(default)]
    pub callback_url: Option<String>,
}

pub async fn create_task(State(state): State<Arc<AppState>>, ext: axum::http::Extensions, Json(body): Json<CreateTaskBody>) -> Response {
    let correlation_id = correlation(&ext);
    let function_id = match parse_function_id(&body.function_id, &correlation_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let req = CreateTaskRequest {
        function_id,
        interaction_type: body.interaction_type,
        ui: body.ui,
        assignees: body.assignees,
        invocation_data: body.invocation_data,
        timeout: body.timeout,
        callback_url: body.callback_url,
    };
    let default_timeout = chrono::Duration::milliseconds(state.config.tiers.human_timeout_ms as i64);
    match state.task_store.create(req, default_timeout).await {
        Ok(created) => (StatusCode::ACCEPTED, Json(created)).into_response(),
        Err(e) => bad_request(ErrorCode::MissingRequired, e.to_string(), &correlation_id),
    }
}

pub async fn get_task(State(state): State<Arc<AppState>>, Path(task_id): Path<String>, ext: axum::http::Extensions) -> Response {
    let correlation_id = correlation(&ext);
    match state.task_store.get(&task_id).await {
        Ok(task) => (StatusCode::OK, Json(task)).into_response(),
        Err(_) => not_found("task not found", &correlation_id),
    }
}

pub async fn respond_task(State(state): State<Arc<AppState>>, Path(task_id): Path<String>, ext: axum::http::Extensions, Json(response): Json<Value>) -> Response {
    let correlation_id = correlation(&ext);
    match state.task_store.respond(&task_id, response).await {
        Ok(task) => (StatusCode::OK, Json(task)).into_response(),
        Err(functionsdo_core::error::TaskError::NotFound) => not_found("task not found", &correlation_id),
        Err(functionsdo_core::error::TaskError::Expired) => {
            error_response(StatusCode::GONE, ErrorCode::TaskExpired, "task expired", &correlation_id)
        }
        Err(functionsdo_core::error::TaskError::Terminal) => {
            bad_request(ErrorCode::MissingRequired, "task already completed", &correlation_id)
        }
        Err(e) => bad_request(ErrorCode::MissingRequired, e.to_string(), &correlation_id),
    }
}

pub async fn cancel_task(State(state): State<Arc<AppState>>, Path(task_id): Path<String>, ext: axum::http::Extensions) -> Response {
    let correlation_id = correlation(&ext);
    match state.task_store.cancel(&task_id).await {
        Ok(task) => (StatusCode::OK, Json(task)).into_response(),
        Err(functionsdo_core::error::TaskError::NotFound) => not_found("task not found", &correlation_id),
        Err(e) => bad_request(ErrorCode::MissingRequired, e.to_string(), &correlation_id),
    }
}

#[derive(Debug, Deserialize)]
pub struct ListTasksQuery {
    #[serde(default)]
    pub function_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

pub async fn list_tasks(State(state): State<Arc<AppState>>, Query(query): Query<ListTasksQuery>) -> Response {
    let status = query.status.as_deref().and_then(parse_task_status);
    let tasks = state.task_store.list(query.function_id.as_deref(), status).await;
    (StatusCode::OK, Json(tasks)).into_response()
}

fn parse_task_status(raw: &str) -> Option<TaskStatus> {
    match raw {
        "pending" => Some(TaskStatus::Pending),
        "assigned" => Some(TaskStatus::Assigned),
        "in_progress" => Some(TaskStatus::InProgress),
        "completed" => Some(TaskStatus::Completed),
        "cancelled" => Some(TaskStatus::Cancelled),
        "expired" => Some(TaskStatus::Expired),
        _ => None,
    }
}

pub async fn auth_validate(Extension(ctx): Extension<RouteContext>, ext: axum::http::Extensions) -> Response {
    let correlation_id = correlation(&ext);
    match ctx.auth {
        Some(auth) => (StatusCode::OK, Json(json!({ "valid": true, "userId": auth.user_id }))).into_response(),
        None => unauthenticated("not authenticated", &correlation_id),
    }
}

pub async fn auth_me(Extension(ctx): Extension<RouteContext>, ext: axum::http::Extensions) -> Response {
    let correlation_id = correlation(&ext);
    match ctx.auth {
        Some(auth) => (StatusCode::OK, Json(auth)).into_response(),
        None => unauthenticated("not authenticated", &correlation_id),
    }
}

pub async fn auth_orgs(Extension(ctx): Extension<RouteContext>, ext: axum::http::Extensions) -> Response {
    let correlation_id = correlation(&ext);
    match ctx.auth {
        Some(auth) => (StatusCode::OK, Json(json!({ "organizations": auth.organizations.unwrap_or_default() }))).into_response(),
        None => unauthenticated("not authenticated", &correlation_id),
    }
}

pub async fn not_found_fallback(ext: axum::http::Extensions) -> Response {
    let correlation_id = correlation(&ext);
    error_response(StatusCode::NOT_FOUND, ErrorCode::FunctionNotFound, "no matching route", &correlation_id)
}
