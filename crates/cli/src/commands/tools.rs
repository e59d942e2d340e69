//! List registered tools.

use ferrite_config::AppConfig;

pub async fn run() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let registry = super::build_registry(&config);

    let mut descriptions = registry.descriptions();
    descriptions.sort_by(|a, b| a.0.cmp(&b.0));

    for (name, description) in &descriptions {
        println!("{name}\n    {description}");
    }

    if !config.tools.enabled.is_empty() {
        println!("\nEnabled for the model: {}", config.tools.enabled.join(", "));
    }
    Ok(())
}
