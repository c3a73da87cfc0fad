//! Model Provider Listing
//!
//! Outbound clients for model-serving endpoints. Each client returns the
//! provider's models normalized to bare `{id}` descriptors; callers wrap the
//! call in [`RetryPolicy`] so rate limiting is absorbed before the listing is
//! used.

use crate::config::{ProviderConfig, ProviderType};
use crate::error::ProviderError;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const OLLAMA_DEFAULT_ENDPOINT: &str = "http://localhost:11434";
const GEMINI_DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";
const OPENAI_DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";

const PROVIDER_HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const PROVIDER_HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One model offered by a provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
}

/// Model listing capability
#[async_trait]
pub trait ModelLister: Send + Sync {
    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, ProviderError>;

    fn provider_name(&self) -> &str;
}

/// Strip a `models/` path prefix and a `name:tag` version suffix.
///
/// `models/gemini-1.5-pro` → `gemini-1.5-pro`, `llama3:latest` → `llama3`.
/// Fine-tuned ids (`ft:` prefix, or more than one `:`) name distinct models
/// and are kept whole.
pub fn normalize_model_id(raw: &str) -> String {
    let id = raw.trim();
    let id = id.strip_prefix("models/").unwrap_or(id);
    if id.starts_with("ft:") {
        return id.to_string();
    }
    match id.split_once(':') {
        Some((name, tag)) if !name.is_empty() && !tag.contains(':') => name.to_string(),
        _ => id.to_string(),
    }
}

/// Normalize raw identifiers and drop duplicates, keeping first-seen order
pub fn normalize_listing<I, S>(raw_ids: I) -> Vec<ModelDescriptor>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    raw_ids
        .into_iter()
        .map(|raw| normalize_model_id(raw.as_ref()))
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .map(|id| ModelDescriptor { id })
        .collect()
}

/// List models through `policy`, retrying rate-limited failures
pub async fn list_models_with_retry(
    lister: &dyn ModelLister,
    policy: &RetryPolicy,
) -> Result<Vec<ModelDescriptor>, ProviderError> {
    debug!(provider = lister.provider_name(), "Listing models");
    let models = policy.execute(|| lister.list_models()).await?;
    info!(
        provider = lister.provider_name(),
        count = models.len(),
        "Listed models"
    );
    Ok(models)
}

fn map_http_error(error: reqwest::Error) -> ProviderError {
    if let Some(status) = error.status() {
        ProviderError::Status {
            status: status.as_u16(),
            body: error.to_string(),
        }
    } else if error.is_timeout() {
        ProviderError::Timeout(error.to_string())
    } else if error.is_connect() {
        ProviderError::Connection(error.to_string())
    } else if error.is_decode() {
        ProviderError::InvalidResponse(error.to_string())
    } else {
        ProviderError::Connection(format!("HTTP error: {}", error))
    }
}

fn build_provider_http_client() -> Result<Client, ProviderError> {
    Client::builder()
        .no_proxy()
        .connect_timeout(PROVIDER_HTTP_CONNECT_TIMEOUT)
        .timeout(PROVIDER_HTTP_REQUEST_TIMEOUT)
        .build()
        .map_err(|e| ProviderError::Connection(format!("Failed to create HTTP client: {}", e)))
}

/// Turn a non-2xx response into [`ProviderError::Status`] carrying its body
async fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(ProviderError::Status {
        status: status.as_u16(),
        body,
    })
}

fn trim_endpoint(endpoint: Option<String>, default: &str) -> String {
    endpoint
        .unwrap_or_else(|| default.to_string())
        .trim_end_matches('/')
        .to_string()
}

/// Ollama (`GET /api/tags`)
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: Option<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_provider_http_client()?,
            base_url: trim_endpoint(base_url, OLLAMA_DEFAULT_ENDPOINT),
        })
    }
}

#[async_trait]
impl ModelLister for OllamaClient {
    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, ProviderError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.client.get(&url).send().await.map_err(map_http_error)?;
        let response = check_status(response).await?;

        #[derive(Deserialize)]
        struct TagsResponse {
            models: Vec<ModelInfo>,
        }
        #[derive(Deserialize)]
        struct ModelInfo {
            name: String,
        }

        let tags: TagsResponse = response.json().await.map_err(|e| {
            ProviderError::InvalidResponse(format!("Failed to parse models response: {}", e))
        })?;

        Ok(normalize_listing(tags.models.into_iter().map(|m| m.name)))
    }

    fn provider_name(&self) -> &str {
        "ollama"
    }
}

/// Google Gemini (`GET /v1beta/models?key=…`)
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: String, base_url: Option<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_provider_http_client()?,
            base_url: trim_endpoint(base_url, GEMINI_DEFAULT_ENDPOINT),
            api_key,
        })
    }
}

#[async_trait]
impl ModelLister for GeminiClient {
    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, ProviderError> {
        let url = format!("{}/v1beta/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(map_http_error)?;
        let response = check_status(response).await?;

        #[derive(Deserialize)]
        struct ModelsResponse {
            #[serde(default)]
            models: Vec<ModelInfo>,
        }
        #[derive(Deserialize)]
        struct ModelInfo {
            name: String,
        }

        let listing: ModelsResponse = response.json().await.map_err(|e| {
            ProviderError::InvalidResponse(format!("Failed to parse models response: {}", e))
        })?;

        Ok(normalize_listing(listing.models.into_iter().map(|m| m.name)))
    }

    fn provider_name(&self) -> &str {
        "gemini"
    }
}

/// Any server exposing the OpenAI-style `GET /models`
pub struct OpenAICompatibleClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl OpenAICompatibleClient {
    pub fn new(endpoint: Option<String>, api_key: Option<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_provider_http_client()?,
            endpoint: trim_endpoint(endpoint, OPENAI_DEFAULT_ENDPOINT),
            api_key,
        })
    }
}

#[async_trait]
impl ModelLister for OpenAICompatibleClient {
    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, ProviderError> {
        let url = format!("{}/models", self.endpoint);
        let mut request_builder = self.client.get(&url);
        if let Some(api_key) = &self.api_key {
            request_builder = request_builder.bearer_auth(api_key);
        }

        let response = request_builder.send().await.map_err(map_http_error)?;
        let response = check_status(response).await?;

        #[derive(Deserialize)]
        struct ModelsResponse {
            data: Vec<ModelInfo>,
        }
        #[derive(Deserialize)]
        struct ModelInfo {
            id: String,
        }

        let models: ModelsResponse = response.json().await.map_err(|e| {
            ProviderError::InvalidResponse(format!("Failed to parse models response: {}", e))
        })?;

        Ok(normalize_listing(models.data.into_iter().map(|m| m.id)))
    }

    fn provider_name(&self) -> &str {
        "openai_compatible"
    }
}

/// Builds a [`ModelLister`] from configuration
pub struct ProviderFactory;

impl ProviderFactory {
    pub fn create_client(config: &ProviderConfig) -> Result<Arc<dyn ModelLister>, ProviderError> {
        match config.provider_type {
            ProviderType::Ollama => Ok(Arc::new(OllamaClient::new(config.endpoint.clone())?)),
            ProviderType::Gemini => {
                let api_key = config
                    .api_key
                    .clone()
                    .filter(|key| !key.is_empty())
                    .ok_or_else(|| {
                        ProviderError::NotConfigured("Gemini requires an API key".to_string())
                    })?;
                Ok(Arc::new(GeminiClient::new(api_key, config.endpoint.clone())?))
            }
            ProviderType::OpenaiCompatible => Ok(Arc::new(OpenAICompatibleClient::new(
                config.endpoint.clone(),
                config.api_key.clone(),
            )?)),
        }
    }
}
