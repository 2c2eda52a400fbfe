//! `functionsdo gateway` — start the HTTP API server.

use functionsdo_config::AppConfig;

pub async fn run(port_override: Option<u16>, host_override: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }
    if let Some(host) = host_override {
        config.gateway.host = host;
    }

    println!("Functions.do Gateway");
    println!("  listening:  {}:{}", config.gateway.host, config.gateway.port);
    println!("  provider:   {}", config.default_provider);
    println!("  classifier: {}", if config.classifier.enabled { "enabled" } else { "disabled" });
    println!("  storage:    {}", config.storage.backend);

    functionsdo_gateway::start(config).await?;
    Ok(())
}
