//! Merge rules: defaults first, every later source overrides key by key.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("provider.provider_type", "openai")?
        .set_default("provider.model", "gpt-4o")?
        .set_default("pipeline.max_attempts", 3)?
        .set_default("pipeline.retry_base_delay_ms", 1000)?
        .set_default("pipeline.request_timeout_secs", 120)?
        .set_default("storage.projects_dir", "projects")
}
