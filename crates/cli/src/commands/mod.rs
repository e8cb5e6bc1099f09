//! Subcommand implementations.

pub mod chat;
pub mod init;
pub mod patterns;
pub mod prompts;
pub mod stats;

use inkwell_agent::Orchestrator;
use inkwell_config::AppConfig;
use inkwell_core::provider::Provider;
use inkwell_providers::OpenAiCompatProvider;
use std::sync::Arc;
use std::time::Duration;

pub(crate) fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

/// Build an orchestrator over the configured store.
///
/// With `needs_llm` unset the provider is never called, so a missing API key
/// is tolerated and inspection commands work offline.
pub(crate) fn build_orchestrator(
    config: AppConfig,
    needs_llm: bool,
) -> Result<Orchestrator, Box<dyn std::error::Error>> {
    let provider: Arc<dyn Provider> = if needs_llm {
        Arc::new(OpenAiCompatProvider::from_config(&config.provider)?)
    } else {
        Arc::new(OpenAiCompatProvider::new(
            "offline",
            &config.provider.api_url,
            config.provider.api_key.clone().unwrap_or_default(),
            &config.provider.model,
            Duration::from_secs(config.provider.request_timeout_secs),
        )?)
    };
    let registry = Arc::new(inkwell_tools::default_registry());
    let store = inkwell_memory::create_store(&config.memory);
    tracing::debug!(store = store.name(), provider = provider.name(), "Orchestrator ready");
    Ok(Orchestrator::new(config, provider, registry, store))
}
