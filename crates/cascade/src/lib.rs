//! The cascade engine: runs a function whose `metadata.type` is `cascade`
//! by walking its `steps[]` through the tier dispatcher, piping each
//! successful step's output into the next.

use async_trait::async_trait;
use functionsdo_core::model::{CascadeStep, ErrorHandling, FunctionKind};
use functionsdo_dispatch::envelope::DispatchResult;
use tracing::warn;

/// What the cascade engine needs from the tier dispatcher: invoke one step
/// by function id and tier, given the current piped input.
#[async_trait]
pub trait StepDispatcher: Send + Sync {
    async fn dispatch_step(&self, function_id: &str, tier: FunctionKind, input: serde_json::Value) -> DispatchResult;
}

/// Runs every step in order, honoring `error_handling`, and returns the
/// cascade's own envelope: the last successful step's body with `_meta`
/// rewritten to carry `tiersAttempted`/`stepsExecuted` and
/// `executorType: "cascade"`.
pub async fn run_cascade(
    dispatcher: &dyn StepDispatcher,
    steps: &[CascadeStep],
    error_handling: ErrorHandling,
    initial_input: serde_json::Value,
    max_steps: usize,
) -> DispatchResult {
    let mut tiers_attempted = Vec::new();
    let mut steps_executed: u32 = 0;
    let mut current_input = initial_input;
    let mut last_success: Option<DispatchResult> = None;

    for step in steps.iter().take(max_steps) {
        tiers_attempted.push(step.tier.as_str().to_string());

        let result = dispatcher.dispatch_step(&step.function_id, step.tier, current_input.clone()).await;

        if result.is_error() {
            warn!(function_id = %step.function_id, status = result.status, "cascade step failed");
            match error_handling {
                ErrorHandling::FailFast => {
                    return finalize(result, tiers_attempted, steps_executed);
                }
                ErrorHandling::Fallback => {
                    if let Some(fallback_to) = &step.fallback_to {
                        tiers_attempted.push(format!("fallback:{fallback_to}"));
                    }
                    continue;
                }
                ErrorHandling::Continue => continue,
            }
        }

        steps_executed += 1;
        current_input = result.piped_body();
        last_success = Some(result);
    }

    match last_success {
        Some(result) => finalize(result, tiers_attempted, steps_executed),
        None => finalize(
            DispatchResult::error(500, "Cascade completed with no successful steps", 0, "cascade"),
            tiers_attempted,
            steps_executed,
        ),
    }
}

fn finalize(mut result: DispatchResult, tiers_attempted: Vec<String>, steps_executed: u32) -> DispatchResult {
    result.body.meta.executor_type = "cascade".to_string();
    result.body.meta.tiers_attempted = Some(tiers_attempted);
    result.body.meta.steps_executed = Some(steps_executed);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ScriptedDispatcher {
        replies: Mutex<Vec<DispatchResult>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl StepDispatcher for ScriptedDispatcher {
        async fn dispatch_step(&self, _function_id: &str, _tier: FunctionKind, _input: serde_json::Value) -> DispatchResult {
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies.lock().unwrap()[i].clone()
        }
    }

    fn step(id: &str, fallback_to: Option<&str>) -> CascadeStep {
        CascadeStep {
            function_id: id.into(),
            tier: FunctionKind::Code,
            fallback_to: fallback_to.map(String::from),
        }
    }

    fn ok(value: serde_json::Value) -> DispatchResult {
        DispatchResult::success(200, value, 1, "code", 1)
    }

    fn failing(status: u16) -> DispatchResult {
        DispatchResult::error(status, "boom", 1, "code")
    }

    #[tokio::test]
    async fn all_steps_succeed_pipes_input_forward() {
        let dispatcher = ScriptedDispatcher {
            replies: Mutex::new(vec![ok(serde_json::json!({"step": 1})), ok(serde_json::json!({"step": 2}))]),
            calls: AtomicUsize::new(0),
        };
        let steps = vec![step("a", None), step("b", None)];
        let result = run_cascade(&dispatcher, &steps, ErrorHandling::FailFast, serde_json::json!({}), 10).await;
        assert_eq!(result.status, 200);
        assert_eq!(result.body.meta.executor_type, "cascade");
        assert_eq!(result.body.meta.steps_executed, Some(2));
        assert_eq!(result.body.output.get("step").unwrap(), 2);
    }

    #[tokio::test]
    async fn fail_fast_returns_immediately_on_first_error() {
        let dispatcher = ScriptedDispatcher {
            replies: Mutex::new(vec![ok(serde_json::json!({})), failing(500)]),
            calls: AtomicUsize::new(0),
        };
        let steps = vec![step("a", None), step("b", None), step("c", None)];
        let result = run_cascade(&dispatcher, &steps, ErrorHandling::FailFast, serde_json::json!({}), 10).await;
        assert_eq!(result.status, 500);
        assert_eq!(result.body.meta.steps_executed, Some(1));
    }

    #[tokio::test]
    async fn continue_mode_skips_failures_and_returns_last_success() {
        let dispatcher = ScriptedDispatcher {
            replies: Mutex::new(vec![ok(serde_json::json!({"v": 1})), failing(500), ok(serde_json::json!({"v": 2}))]),
            calls: AtomicUsize::new(0),
        };
        let steps = vec![step("a", None), step("b", None), step("c", None)];
        let result = run_cascade(&dispatcher, &steps, ErrorHandling::Continue, serde_json::json!({}), 10).await;
        assert_eq!(result.status, 200);
        assert_eq!(result.body.output.get("v").unwrap(), 2);
        assert_eq!(result.body.meta.steps_executed, Some(2));
    }

    #[tokio::test]
    async fn fallback_mode_records_fallback_marker() {
        let dispatcher = ScriptedDispatcher {
            replies: Mutex::new(vec![failing(500), ok(serde_json::json!({"v": 1}))]),
            calls: AtomicUsize::new(0),
        };
        let steps = vec![step("a", Some("b")), step("b", None)];
        let result = run_cascade(&dispatcher, &steps, ErrorHandling::Fallback, serde_json::json!({}), 10).await;
        assert_eq!(result.status, 200);
        let attempted = result.body.meta.tiers_attempted.unwrap();
        assert!(attempted.contains(&"fallback:b".to_string()));
    }

    #[tokio::test]
    async fn no_successful_step_yields_500() {
        let dispatcher = ScriptedDispatcher {
            replies: Mutex::new(vec![failing(500), failing(502)]),
            calls: AtomicUsize::new(0),
        };
        let steps = vec![step("a", None), step("b", None)];
        let result = run_cascade(&dispatcher, &steps, ErrorHandling::Continue, serde_json::json!({}), 10).await;
        assert_eq!(result.status, 500);
        assert!(result.body.error.as_deref().unwrap().contains("no successful steps"));
    }

    #[tokio::test]
    async fn max_steps_caps_execution() {
        let dispatcher = ScriptedDispatcher {
            replies: Mutex::new(vec![ok(serde_json::json!({"v": 1})), ok(serde_json::json!({"v": 2}))]),
            calls: AtomicUsize::new(0),
        };
        let steps = vec![step("a", None), step("b", None)];
        let result = run_cascade(&dispatcher, &steps, ErrorHandling::FailFast, serde_json::json!({}), 1).await;
        assert_eq!(result.body.meta.steps_executed, Some(1));
        assert_eq!(result.body.output.get("v").unwrap(), 1);
    }
}
