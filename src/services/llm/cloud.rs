use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::{timeout, Instant};
use tracing::{error, warn};

use super::client::{ChatCompletionsClient, GenerationRequest, TextGenerator};
use crate::kernel::config::CloudProviderSettings;

/// One provider in the failover chain. `model` overrides the request's model id.
#[derive(Clone)]
pub struct CloudProvider {
    pub name: String,
    pub model: String,
    pub generator: Arc<dyn TextGenerator>,
}

/// Multi-provider cloud generator. Providers are tried in priority order;
/// the first non-empty answer wins. All providers share one deadline.
#[derive(Clone, Default)]
pub struct CloudClient {
    providers: Vec<CloudProvider>,
}

impl CloudClient {
    pub fn new(providers: Vec<CloudProvider>) -> Self {
        Self { providers }
    }

    /// Builds HTTP providers for every configured entry that has an api key.
    pub fn from_settings(settings: &[CloudProviderSettings]) -> Self {
        let providers = settings
            .iter()
            .filter(|p| !p.api_key.is_empty())
            .map(|p| CloudProvider {
                name: p.name.clone(),
                model: p.model.clone(),
                generator: Arc::new(ChatCompletionsClient::new(
                    p.base_url.clone(),
                    Some(p.api_key.clone()),
                )) as Arc<dyn TextGenerator>,
            })
            .collect();
        Self { providers }
    }

    pub fn available_providers(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name.as_str()).collect()
    }
}

#[async_trait]
impl TextGenerator for CloudClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<Option<String>> {
        let deadline = Instant::now() + request.timeout;

        for provider in &self.providers {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!("Cloud deadline exhausted before trying {}", provider.name);
                break;
            }

            let mut attempt = request.clone();
            attempt.model = provider.model.clone();
            attempt.timeout = remaining;

            match timeout(remaining, provider.generator.generate(&attempt)).await {
                Ok(Ok(Some(text))) if !text.trim().is_empty() => return Ok(Some(text)),
                Ok(Ok(_)) => warn!("Cloud provider {} returned nothing, trying next", provider.name),
                Ok(Err(e)) => warn!("Cloud provider {} failed, trying next: {:#}", provider.name, e),
                Err(_) => warn!("Cloud provider {} timed out", provider.name),
            }
        }

        error!("All cloud providers failed");
        Ok(None)
    }
}
