//! `functionsdo config` — configuration management commands.

use functionsdo_config::AppConfig;

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("  config parsed successfully");

            let mut warnings = Vec::new();
            if config.api_key.is_none() && config.providers.values().all(|p| p.api_key.is_none()) {
                warnings.push("no API key set (FUNCTIONSDO_API_KEY, OPENROUTER_API_KEY, OPENAI_API_KEY, ANTHROPIC_API_KEY, or config.providers.*.api_key)");
            }
            if config.default_temperature < 0.0 || config.default_temperature > 2.0 {
                warnings.push("default_temperature out of range (0.0-2.0)");
            }
            if config.max_cascade_steps == 0 {
                warnings.push("max_cascade_steps must be > 0");
            }

            if warnings.is_empty() {
                println!("  all checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("  warning: {w}");
                }
            }

            println!();
            println!("  provider:   {}", config.default_provider);
            println!("  model:      {}", config.default_model);
            println!("  gateway:    {}:{}", config.gateway.host, config.gateway.port);
            println!("  storage:    {}", config.storage.backend);
        }
        Err(e) => {
            println!("  config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("failed to load config: {e}"))?;
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", AppConfig::config_dir().join("config.toml").display());
    Ok(())
}

#[cfg(test)]
mod tests {
    #[test]
    fn config_path_is_valid() {
        let path = functionsdo_config::AppConfig::config_dir().join("config.toml");
        assert!(path.to_str().unwrap().contains("config.toml"));
    }
}
