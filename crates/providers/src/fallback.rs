//! Provider fallback — ordered retry chain with per-provider timeouts.
//!
//! When a provider fails (timeout, rate limit, error), automatically tries the next
//! provider in the configured fallback chain.

use async_trait::async_trait;
use functionsdo_core::error::ProviderError;
use functionsdo_core::provider::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// A provider that wraps an ordered list of providers and falls back on failure.
pub struct FallbackProvider {
    name: String,
    chain: Vec<FallbackEntry>,
}

/// A single entry in the fallback chain.
struct FallbackEntry {
    provider: Arc<dyn functionsdo_core::Provider>,
    timeout: Duration,
}

impl FallbackProvider {
    /// Create a new fallback provider with no entries.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            chain: Vec::new(),
        }
    }

    /// Add a provider to the fallback chain with a custom timeout.
    pub fn add(mut self, provider: Arc<dyn functionsdo_core::Provider>, timeout: Duration) -> Self {
        self.chain.push(FallbackEntry { provider, timeout });
        self
    }

    /// Add a provider with the default timeout (120s).
    pub fn add_default(self, provider: Arc<dyn functionsdo_core::Provider>) -> Self {
        self.add(provider, Duration::from_secs(120))
    }

    /// Number of providers in the chain.
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }
}

#[async_trait]
impl functionsdo_core::Provider for FallbackProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let mut last_error = ProviderError::NotConfigured("No providers in fallback chain".into());

        for (i, entry) in self.chain.iter().enumerate() {
            let provider_name = entry.provider.name().to_string();

            info!(
                provider = %provider_name,
                attempt = i + 1,
                total = self.chain.len(),
                "Fallback: trying provider"
            );

            match tokio::time::timeout(entry.timeout, entry.provider.complete(request.clone()))
                .await
            {
                Ok(Ok(response)) => return Ok(response),
                Ok(Err(e)) => {
                    warn!(
                        provider = %provider_name,
                        error = %e,
                        "Fallback: provider failed, trying next"
                    );
                    last_error = e;
                }
                Err(_) => {
                    warn!(
                        provider = %provider_name,
                        timeout_secs = entry.timeout.as_secs(),
                        "Fallback: provider timed out, trying next"
                    );
                    last_error = ProviderError::Timeout(format!(
                        "Provider '{}' timed out after {}s",
                        provider_name,
                        entry.timeout.as_secs()
                    ));
                }
            }
        }

        Err(last_error)
    }

    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<StreamChunk, ProviderError>>,
        ProviderError,
    > {
        let mut last_error = ProviderError::NotConfigured("No providers in fallback chain".into());

        for (i, entry) in self.chain.iter().enumerate() {
            let provider_name = entry.provider.name().to_string();

            info!(
                provider = %provider_name,
                attempt = i + 1,
                total = self.chain.len(),
                "Fallback: trying provider (streaming)"
            );

            match tokio::time::timeout(entry.timeout, entry.provider.stream(request.clone())).await
            {
                Ok(Ok(rx)) => return Ok(rx),
                Ok(Err(e)) => {
                    warn!(
                        provider = %provider_name,
                        error = %e,
                        "Fallback: provider stream failed, trying next"
                    );
                    last_error = e;
                }
                Err(_) => {
                    warn!(
                        provider = %provider_name,
                        timeout_secs = entry.timeout.as_secs(),
                        "Fallback: provider stream timed out, trying next"
                    );
                    last_error = ProviderError::Timeout(format!(
                        "Provider '{}' stream timed out after {}s",
                        provider_name,
                        entry.timeout.as_secs()
                    ));
                }
            }
        }

        Err(last_error)
    }

    async fn list_models(&self) -> std::result::Result<Vec<String>, ProviderError> {
        let mut all_models = Vec::new();
        for entry in &self.chain {
            if let Ok(models) = entry.provider.list_models().await {
                all_models.extend(models);
            }
        }
        Ok(all_models)
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        for entry in &self.chain {
            if let Ok(true) = entry.provider.health_check().await {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
