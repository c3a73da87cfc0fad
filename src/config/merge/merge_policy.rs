//! Merge rules: defaults, override order, conflict handling.

use config::builder::DefaultState;
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let store_path = crate::config::default_store_path();
    Config::builder()
        .set_default("storage.path", store_path.to_string_lossy().to_string())?
        .set_default("retry.max_attempts", crate::retry::DEFAULT_MAX_ATTEMPTS as i64)?
        .set_default(
            "retry.base_delay_ms",
            crate::retry::DEFAULT_BASE_DELAY.as_millis() as i64,
        )?
        .set_default("provider.provider_type", "ollama")?
        .set_default("surface.resource", "content.js")
}
