//! `functionsdo status` — show resolved configuration and, if reachable, the
//! running gateway's live status.

use functionsdo_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("failed to load config: {e}"))?;

    println!("Functions.do Status");
    println!("====================");
    println!("  config file:       {}", AppConfig::config_dir().join("config.toml").display());
    println!("  provider:          {}", config.default_provider);
    println!("  model:             {}", config.default_model);
    println!("  gateway:           {}:{}", config.gateway.host, config.gateway.port);
    println!("  classifier:        {}", if config.classifier.enabled { "enabled" } else { "disabled" });
    println!("  storage backend:   {}", config.storage.backend);
    println!(
        "  rate limit (ip):   {} req / {} ms",
        config.rate_limit.ip_capacity, config.rate_limit.ip_window_ms
    );
    println!(
        "  rate limit (fn):   {} req / {} ms",
        config.rate_limit.function_capacity, config.rate_limit.function_window_ms
    );
    println!("  max cascade steps: {}", config.max_cascade_steps);

    let url = format!("http://{}:{}/api/status", config.gateway.host, config.gateway.port);
    match reqwest::get(&url).await {
        Ok(resp) if resp.status().is_success() => {
            let body: serde_json::Value = resp.json().await.unwrap_or_default();
            println!();
            println!("  live gateway: reachable at {url}");
            println!("  {}", serde_json::to_string_pretty(&body)?);
        }
        Ok(resp) => println!("\n  live gateway: responded with status {}", resp.status()),
        Err(_) => println!("\n  live gateway: not reachable at {url}"),
    }

    Ok(())
}
