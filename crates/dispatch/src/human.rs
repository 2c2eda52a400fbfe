//! Tier 4: human task creation. Actual task lifecycle (respond/cancel/expire)
//! lives in `functionsdo-tasks`; dispatch only owns turning a task creation
//! into the standard envelope.

use chrono::Duration as ChronoDuration;
use functionsdo_core::ids::FunctionId;
use functionsdo_core::model::HumanUiForm;
use functionsdo_tasks::{CreateTaskRequest, TaskStore};

use crate::envelope::{DispatchResult, HumanExecutionMeta, Meta};

#[allow(clippy::too_many_arguments)]
pub async fn dispatch_human(
    store: &TaskStore,
    function_id: FunctionId,
    interaction_type: Option<String>,
    ui: Option<HumanUiForm>,
    assignees: Vec<String>,
    invocation_data: serde_json::Value,
    timeout_override: Option<String>,
    callback_url: Option<String>,
    default_timeout: ChronoDuration,
) -> DispatchResult {
    let assignees_for_meta = assignees.clone();
    let request = CreateTaskRequest {
        function_id,
        interaction_type,
        ui,
        assignees,
        invocation_data,
        timeout: timeout_override,
        callback_url,
    };

    match store.create(request, default_timeout).await {
        Ok(created) => {
            let mut result = DispatchResult::success(202, serde_json::Value::Null, 4, "human", 0);
            result.body.task_id = Some(created.task_id);
            result.body.task_url = Some(created.task_url);
            result.body.task_status = Some(created.task_status.as_str().to_string());
            result.body.meta = Meta {
                human_execution: Some(HumanExecutionMeta {
                    assignees: assignees_for_meta,
                    expires_at: created.expires_at,
                }),
                ..result.body.meta
            };
            result
        }
        Err(e) => DispatchResult::error(500, e.to_string(), 4, "human"),
    }
}
