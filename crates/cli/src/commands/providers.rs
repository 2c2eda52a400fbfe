//! `functionsdo providers` — list supported LLM providers for the generative
//! and classifier tiers.

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("Supported LLM providers");
    println!("========================");
    println!();
    println!("  native Anthropic API:");
    println!("    anthropic");
    println!();
    println!("  OpenAI-compatible (any base URL works):");
    println!("    openrouter, openai, groq, deepseek, together, fireworks, mistral, xai, perplexity, ollama");
    println!();
    println!("  Configure in config.toml:");
    println!("    default_provider = \"openrouter\"");
    println!("    [providers.openrouter]");
    println!("    api_url = \"https://openrouter.ai/api/v1\"");
    println!("    api_key = \"your-key\"");
    println!();
    println!("  Environment variables (checked in order):");
    println!("    FUNCTIONSDO_API_KEY, OPENROUTER_API_KEY, OPENAI_API_KEY, ANTHROPIC_API_KEY");
    println!("    FUNCTIONSDO_PROVIDER, FUNCTIONSDO_MODEL");

    Ok(())
}
