pub mod chat;
pub mod doctor;
pub mod onboard;
pub mod tools;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use ferrite_config::AppConfig;
use ferrite_core::provider::Provider;
use ferrite_core::tool::ToolRegistry;
use ferrite_providers::OpenAiCompatProvider;

/// Build the provider selected by configuration.
pub fn build_provider(config: &AppConfig) -> anyhow::Result<Arc<dyn Provider>> {
    let name = config.default_provider.as_str();
    let provider_config = config.providers.get(name);
    let api_key = provider_config
        .and_then(|p| p.api_key.clone())
        .or_else(|| config.api_key.clone());

    let provider = match name {
        "openrouter" => OpenAiCompatProvider::openrouter(
            api_key.context("no API key configured (set FERRITE_API_KEY or api_key)")?,
        ),
        "openai" => OpenAiCompatProvider::openai(
            api_key.context("no API key configured (set FERRITE_API_KEY or api_key)")?,
        ),
        "ollama" => {
            OpenAiCompatProvider::ollama(provider_config.and_then(|p| p.api_url.as_deref()))
        }
        other => {
            let url = provider_config
                .and_then(|p| p.api_url.clone())
                .with_context(|| {
                    format!("provider '{other}' needs api_url under [providers.{other}]")
                })?;
            OpenAiCompatProvider::new(other, url, api_key.unwrap_or_default())
        }
    };

    Ok(Arc::new(provider))
}

/// Build the tool registry from configuration.
pub fn build_registry(config: &AppConfig) -> ToolRegistry {
    let commands = if config.tools.allowed_commands.is_empty() {
        ferrite_tools::safe_commands()
    } else {
        config.tools.allowed_commands.clone()
    };
    let forbidden = if config.tools.forbidden_paths.is_empty() {
        ferrite_tools::path_guard::default_forbidden()
    } else {
        config.tools.forbidden_paths.clone()
    };

    ferrite_tools::registry_with(commands, forbidden)
        .with_timeout(Duration::from_secs(config.tools.timeout_secs))
}

/// The model to use, honoring a per-provider override.
pub fn resolve_model(config: &AppConfig) -> String {
    config
        .providers
        .get(&config.default_provider)
        .and_then(|p| p.default_model.clone())
        .unwrap_or_else(|| config.default_model.clone())
}
