//! Functions.do CLI — local operation for the gateway.
//!
//! Commands:
//! - `gateway`      — start the HTTP API server
//! - `compile`      — run the TypeScript compile service standalone
//! - `status`       — show resolved config and live gateway status
//! - `tasks`        — inspect human task state on a running gateway
//! - `config`       — configuration management
//! - `providers`    — list supported LLM providers
//! - `completions`  — generate shell completions
//! - `version`      — show detailed version info

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};

mod commands;

#[derive(Parser)]
#[command(
    name = "functionsdo",
    about = "Functions.do — multi-tenant function execution gateway CLI",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Gateway {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
        /// Override the host (e.g. 0.0.0.0 for containers)
        #[arg(long)]
        host: Option<String>,
    },

    /// Compile a TypeScript source file standalone
    Compile {
        /// Path to the .ts source file
        path: String,
        /// Force the regex type-stripper even if esbuild is configured
        #[arg(long)]
        force_regex: bool,
    },

    /// Show resolved configuration and live gateway status
    Status,

    /// Inspect human task state on a running gateway
    Tasks {
        /// Filter by function id
        #[arg(long)]
        function_id: Option<String>,
        /// Filter by status (pending, assigned, in_progress, completed, cancelled, expired)
        #[arg(long)]
        status: Option<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// List supported LLM providers
    Providers,

    /// Generate shell completion scripts
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Show detailed version and build info
    Version,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate the current configuration
    Validate,
    /// Show the resolved configuration
    Show,
    /// Show the config file path
    Path,
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)))
        .with_target(false)
        .init();

    match cli.command {
        Commands::Gateway { port, host } => commands::gateway::run(port, host).await?,
        Commands::Compile { path, force_regex } => commands::compile::run(&path, force_regex).await?,
        Commands::Status => commands::status::run().await?,
        Commands::Tasks { function_id, status } => commands::tasks::list(function_id, status).await?,

        Commands::Config { action } => match action {
            ConfigAction::Validate => commands::config_cmd::validate().await?,
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
        },

        Commands::Providers => commands::providers::run().await?,

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "functionsdo", &mut std::io::stdout());
        }

        Commands::Version => {
            println!("Functions.do CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("  arch: {}", std::env::consts::ARCH);
            println!("  os:   {}", std::env::consts::OS);
            println!("  license: MIT");
        }
    }

    Ok(())
}
