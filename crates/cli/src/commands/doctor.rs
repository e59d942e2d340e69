//! Diagnose configuration and provider health.

use ferrite_config::AppConfig;
use ferrite_core::provider::Provider as _;

pub async fn run() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    println!("provider: {}", config.default_provider);
    println!("model:    {}", super::resolve_model(&config));
    println!(
        "api key:  {}",
        if config.has_api_key() { "configured" } else { "missing" }
    );

    let provider = match super::build_provider(&config) {
        Ok(provider) => provider,
        Err(e) => {
            println!("provider: cannot construct — {e}");
            return Ok(());
        }
    };

    match provider.health_check().await {
        Ok(true) => println!("health:   reachable"),
        Ok(false) => println!("health:   endpoint responded with an error"),
        Err(e) => println!("health:   unreachable — {e}"),
    }

    match provider.list_models().await {
        Ok(models) if models.is_empty() => println!("models:   none listed"),
        Ok(models) => println!("models:   {} available", models.len()),
        Err(e) => println!("models:   listing failed — {e}"),
    }

    Ok(())
}
