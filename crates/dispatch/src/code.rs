//! Tier 1: code execution. Delegates to a sandbox collaborator; the
//! dispatcher itself only owns the timeout/error-taxonomy contract.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;

use crate::envelope::DispatchResult;

#[derive(Debug, Clone, thiserror::Error)]
pub enum CodeExecutionError {
    #[error("{0}")]
    Failed(String),
}

/// The sandbox collaborator that actually runs compiled function code.
#[async_trait]
pub trait CodeExecutor: Send + Sync {
    async fn execute(
        &self,
        code: &str,
        entry_point: &str,
        input: Value,
    ) -> Result<Value, CodeExecutionError>;
}

pub async fn dispatch_code(
    executor: Option<&dyn CodeExecutor>,
    code: Option<&str>,
    entry_point: &str,
    input: Value,
    timeout: Duration,
) -> DispatchResult {
    let Some(code) = code else {
        return DispatchResult::error(404, "Function code not found", 1, "code");
    };
    let Some(executor) = executor else {
        return DispatchResult::error(501, "No code executor configured", 1, "code");
    };

    let started = Instant::now();
    match tokio::time::timeout(timeout, executor.execute(code, entry_point, input)).await {
        Err(_) => DispatchResult::error(408, "Code execution timed out", 1, "code"),
        Ok(Err(e)) => DispatchResult::error(500, e.to_string(), 1, "code"),
        Ok(Ok(output)) => {
            DispatchResult::success(200, output, 1, "code", started.elapsed().as_millis() as u64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoExecutor;

    #[async_trait]
    impl CodeExecutor for EchoExecutor {
        async fn execute(&self, _code: &str, _entry_point: &str, input: Value) -> Result<Value, CodeExecutionError> {
            Ok(input)
        }
    }

    struct FailingExecutor;

    #[async_trait]
    impl CodeExecutor for FailingExecutor {
        async fn execute(&self, _code: &str, _entry_point: &str, _input: Value) -> Result<Value, CodeExecutionError> {
            Err(CodeExecutionError::Failed("boom".into()))
        }
    }

    struct HangingExecutor;

    #[async_trait]
    impl CodeExecutor for HangingExecutor {
        async fn execute(&self, _code: &str, _entry_point: &str, _input: Value) -> Result<Value, CodeExecutionError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Value::Null)
        }
    }

    #[tokio::test]
    async fn missing_code_is_404() {
        let result = dispatch_code(None, None, "index.ts", Value::Null, Duration::from_secs(1)).await;
        assert_eq!(result.status, 404);
    }

    #[tokio::test]
    async fn missing_executor_is_501() {
        let result = dispatch_code(None, Some("src"), "index.ts", Value::Null, Duration::from_secs(1)).await;
        assert_eq!(result.status, 501);
    }

    #[tokio::test]
    async fn success_merges_output() {
        let executor = EchoExecutor;
        let result = dispatch_code(
            Some(&executor),
            Some("src"),
            "index.ts",
            serde_json::json!({"sum": 3}),
            Duration::from_secs(1),
        )
        .await;
        assert_eq!(result.status, 200);
        assert_eq!(result.body.output.get("sum").unwrap(), 3);
    }

    #[tokio::test]
    async fn executor_failure_is_500() {
        let executor = FailingExecutor;
        let result = dispatch_code(Some(&executor), Some("src"), "index.ts", Value::Null, Duration::from_secs(1)).await;
        assert_eq!(result.status, 500);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_408() {
        let executor = HangingExecutor;
        let result = dispatch_code(Some(&executor), Some("src"), "index.ts", Value::Null, Duration::from_millis(10)).await;
        assert_eq!(result.status, 408);
    }
}
