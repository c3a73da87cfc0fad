//! Configuration System
//!
//! Layered configuration for the controller, store, retry policy and model
//! provider. Sources are merged lowest to highest: built-in defaults, the
//! global config file, an explicit config file, then `TABRELAY__*` environment
//! variables.

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod merge;
mod sources;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub surface: SurfaceConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Durable store location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

/// Platform data directory, falling back to a relative path when the
/// platform has no home directory.
pub fn default_store_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "tabrelay")
        .map(|dirs| dirs.data_dir().join("store"))
        .unwrap_or_else(|| PathBuf::from(".tabrelay/store"))
}

/// Retry policy settings for outbound calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    crate::retry::DEFAULT_MAX_ATTEMPTS
}

fn default_base_delay_ms() -> u64 {
    crate::retry::DEFAULT_BASE_DELAY.as_millis() as u64
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

/// Model provider kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    #[default]
    Ollama,
    Gemini,
    OpenaiCompatible,
}

impl ProviderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::Ollama => "ollama",
            ProviderType::Gemini => "gemini",
            ProviderType::OpenaiCompatible => "openai_compatible",
        }
    }
}

/// Model-listing endpoint settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub provider_type: ProviderType,

    /// Base URL; each provider type has its own default
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,
}

impl ProviderConfig {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(endpoint) = &self.endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(format!(
                    "Endpoint '{}' must start with http:// or https://",
                    endpoint
                ));
            }
        }

        if self.provider_type == ProviderType::Gemini
            && self.api_key.as_deref().map_or(true, str::is_empty)
        {
            return Err("Gemini provider requires an api_key".to_string());
        }

        Ok(())
    }
}

/// Surface injection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceConfig {
    /// Resource loaded into a tab when its surface is missing
    #[serde(default = "default_surface_resource")]
    pub resource: String,
}

fn default_surface_resource() -> String {
    "content.js".to_string()
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            resource: default_surface_resource(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Retry(String),
    Provider(String),
    Surface(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Retry(msg) => write!(f, "Retry: {}", msg),
            ValidationError::Provider(msg) => write!(f, "Provider: {}", msg),
            ValidationError::Surface(msg) => write!(f, "Surface: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl RelayConfig {
    /// Validate the entire configuration, collecting every violation
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.retry.max_attempts == 0 {
            errors.push(ValidationError::Retry(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        if let Err(e) = self.provider.validate() {
            errors.push(ValidationError::Provider(e));
        }

        if self.surface.resource.trim().is_empty() {
            errors.push(ValidationError::Surface(
                "resource cannot be empty".to_string(),
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate and fold all violations into one error
    pub fn validated(self) -> Result<Self, ApiError> {
        self.validate().map_err(|errors| {
            let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                msgs.join("\n")
            ))
        })?;
        Ok(self)
    }
}

/// Loads [`RelayConfig`] from layered sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load defaults, the global config file, `explicit` (if given) and the
    /// environment.
    pub fn load(explicit: Option<&Path>) -> Result<RelayConfig, ApiError> {
        let mut builder = merge::merge_policy::builder_with_defaults()?;
        builder = sources::global_file::add_to_builder(builder)?;
        if let Some(path) = explicit {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = sources::environment::add_to_builder(builder);

        let config: RelayConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Load defaults, one file and the environment; the global file is skipped.
    pub fn load_from_file(path: &Path) -> Result<RelayConfig, ApiError> {
        let builder = merge::merge_policy::builder_with_defaults()?
            .add_source(config::File::from(path).required(true));
        let builder = sources::environment::add_to_builder(builder);

        let config: RelayConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Path of the global config file, if a home directory is known
    pub fn global_config_path() -> Option<PathBuf> {
        sources::global_file::global_config_path()
    }
}
