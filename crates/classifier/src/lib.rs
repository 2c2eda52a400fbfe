//! Multi-provider function classifier.
//!
//! Strategy: check the LRU cache, then try providers in order with
//! per-provider retries (capped backoff), parsing replies by unwrapping any
//! fenced code block and validating the result; fall back to a keyword
//! heuristic when every provider fails or returns garbage.

pub mod cache;
pub mod heuristic;
pub mod parse;

use std::sync::Arc;
use std::time::Duration;

use functionsdo_core::message::Message;
use functionsdo_core::provider::{Provider, ProviderRequest};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use cache::{cache_key, ClassificationCache};

/// The four function tiers a classifier can assign (cascade is never a
/// classification result — it's always explicit metadata).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionTier {
    Code,
    Generative,
    Agentic,
    Human,
}

impl FunctionTier {
    pub fn as_str(self) -> &'static str {
        match self {
            FunctionTier::Code => "code",
            FunctionTier::Generative => "generative",
            FunctionTier::Agentic => "agentic",
            FunctionTier::Human => "human",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "code" => Some(FunctionTier::Code),
            "generative" => Some(FunctionTier::Generative),
            "agentic" => Some(FunctionTier::Agentic),
            "human" => Some(FunctionTier::Human),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationEntry {
    #[serde(rename = "type")]
    pub kind: FunctionTier,
    pub confidence: f64,
    pub reasoning: String,
    pub provider: String,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ClassifierError {
    #[error("classifier requires at least one provider")]
    EmptyProviderList,
}

/// One provider entry in the classification chain.
struct ProviderEntry {
    provider: Arc<dyn Provider>,
    model: String,
}

/// Classifies unlabeled functions into one of the four tiers, backed by a
/// bounded cache and an ordered provider chain with per-provider retries.
pub struct Classifier {
    providers: Vec<ProviderEntry>,
    max_retries_per_provider: u32,
    cache: Mutex<ClassificationCache>,
}

impl Classifier {
    /// Rejects empty provider lists — a classifier with nothing to ask is a
    /// misconfiguration, not a degraded-but-working state.
    pub fn new(
        providers: Vec<(Arc<dyn Provider>, String)>,
        max_retries_per_provider: u32,
        cache_capacity: usize,
    ) -> Result<Self, ClassifierError> {
        if providers.is_empty() {
            return Err(ClassifierError::EmptyProviderList);
        }
        Ok(Self {
            providers: providers
                .into_iter()
                .map(|(provider, model)| ProviderEntry { provider, model })
                .collect(),
            max_retries_per_provider,
            cache: Mutex::new(ClassificationCache::new(cache_capacity)),
        })
    }

    pub async fn classify(
        &self,
        name: &str,
        description: Option<&str>,
        input_schema: Option<&serde_json::Value>,
    ) -> ClassificationEntry {
        let key = cache_key(name, description, input_schema);

        if let Some(cached) = self.cache.lock().await.get(&key) {
            return cached;
        }

        let entry = self.classify_uncached(name, description).await;
        self.cache.lock().await.insert(key, entry.clone());
        entry
    }

    async fn classify_uncached(&self, name: &str, description: Option<&str>) -> ClassificationEntry {
        let prompt = classification_prompt(name, description);

        for entry in &self.providers {
            let mut backoff = Duration::from_millis(100);
            for attempt in 0..=self.max_retries_per_provider {
                let started = std::time::Instant::now();
                let request = ProviderRequest {
                    model: entry.model.clone(),
                    messages: vec![Message::user(&prompt)],
                    temperature: 0.0,
                    max_tokens: Some(256),
                    tools: vec![],
                    stream: false,
                    stop: vec![],
                };

                match entry.provider.complete(request).await {
                    Ok(response) => {
                        let latency_ms = started.elapsed().as_millis() as u64;
                        if let Some(classified) = classify_from_reply(&response.message.content, entry.provider.name(), latency_ms) {
                            return classified;
                        }
                        warn!(provider = entry.provider.name(), "classifier reply unusable, trying next provider");
                        break;
                    }
                    Err(e) => {
                        warn!(
                            provider = entry.provider.name(),
                            attempt = attempt + 1,
                            error = %e,
                            "classifier provider call failed"
                        );
                        if attempt < self.max_retries_per_provider {
                            tokio::time::sleep(backoff).await;
                            backoff = (backoff * 2).min(Duration::from_secs(2));
                        }
                    }
                }
            }
        }

        info!("all classifier providers exhausted, falling back to heuristic");
        heuristic::classify_heuristic(name, description)
    }
}

fn classification_prompt(name: &str, description: Option<&str>) -> String {
    format!(
        "Classify the following function into exactly one of: code, generative, agentic, human.\n\
         Respond with JSON: {{\"type\": ..., \"confidence\": 0-1, \"reasoning\": \"...\"}}.\n\
         Name: {name}\n\
         Description: {}",
        description.unwrap_or("(none)")
    )
}

fn classify_from_reply(reply: &str, provider_name: &str, latency_ms: u64) -> Option<ClassificationEntry> {
    let parsed = parse::parse_reply(reply).or_else(|| parse::infer_from_substring(reply))?;
    Some(ClassificationEntry {
        kind: parsed.kind,
        confidence: parsed.confidence,
        reasoning: parsed.reasoning,
        provider: provider_name.to_string(),
        latency_ms,
    })
}
