//! Tier 2: generative execution via an LLM provider's `complete` call.

use std::time::{Duration, Instant};

use functionsdo_core::message::Message;
use functionsdo_core::provider::{Provider, ProviderRequest};

use crate::envelope::{DispatchResult, GenerativeExecutionMeta, Meta, TokenUsage};

pub async fn dispatch_generative(
    provider: Option<&dyn Provider>,
    model: &str,
    system_prompt: Option<&str>,
    input: serde_json::Value,
    timeout: Duration,
) -> DispatchResult {
    let Some(provider) = provider else {
        return DispatchResult::error(503, "No generative provider configured", 2, "generative");
    };

    let mut messages = Vec::new();
    if let Some(system) = system_prompt {
        messages.push(Message::system(system));
    }
    messages.push(Message::user(&input.to_string()));

    let request = ProviderRequest {
        model: model.to_string(),
        messages,
        temperature: 0.7,
        max_tokens: None,
        tools: vec![],
        stream: false,
        stop: vec![],
    };

    let started = Instant::now();
    let outcome = tokio::time::timeout(timeout, provider.complete(request)).await;
    let model_latency_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Err(_) => DispatchResult::error(408, "Generative execution timed out", 2, "generative"),
        Ok(Err(e)) => DispatchResult::error(500, e.to_string(), 2, "generative"),
        Ok(Ok(response)) => {
            let meta = GenerativeExecutionMeta {
                model: response.model.clone(),
                tokens: TokenUsage {
                    input: response.usage.as_ref().map(|u| u.prompt_tokens).unwrap_or(0),
                    output: response.usage.as_ref().map(|u| u.completion_tokens).unwrap_or(0),
                },
                cached: None,
                stop_reason: None,
                model_latency_ms: Some(model_latency_ms),
            };
            let mut result = DispatchResult::success(
                200,
                serde_json::json!({ "output": response.message.content }),
                2,
                "generative",
                model_latency_ms,
            );
            result.body.meta = Meta {
                generative_execution: Some(meta),
                ..result.body.meta
            };
            result
        }
    }
}
