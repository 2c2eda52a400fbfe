//! Built-in tool implementations for Functions.do.
//!
//! These are the concrete handlers behind an agentic function's `builtin`
//! tool implementation: `web_search`, `web_fetch`, `file_read`, `file_write`,
//! `shell_exec`, `database_query`, `email_send`, `slack_send`. A tool with
//! no backing configuration (no database executor, no email/Slack endpoint)
//! degrades to a structured "not available" result rather than failing.

pub mod database_query;
pub mod email_send;
pub mod file_read;
pub mod file_write;
pub mod shell;
pub mod slack_send;
pub mod web_fetch;
pub mod web_search;

use functionsdo_core::tool::ToolRegistry;

/// Every builtin name this crate can satisfy, keyed by the name an agentic
/// function's `{builtin(name)}` implementation would ask for.
pub struct BuiltinConfig {
    pub database_executor: Option<std::sync::Arc<dyn database_query::QueryExecutor>>,
    pub email_api_url: Option<String>,
    pub email_api_key: Option<String>,
    pub slack_webhook_url: Option<String>,
    /// If non-empty, `shell_exec` only allows these base commands.
    pub shell_allowed_commands: Vec<String>,
    pub file_allowed_roots: Vec<String>,
    pub file_forbidden_paths: Vec<String>,
}

impl Default for BuiltinConfig {
    fn default() -> Self {
        Self {
            database_executor: None,
            email_api_url: None,
            email_api_key: None,
            slack_webhook_url: None,
            shell_allowed_commands: vec![
                "ls".into(),
                "cat".into(),
                "head".into(),
                "tail".into(),
                "echo".into(),
                "pwd".into(),
                "date".into(),
                "whoami".into(),
                "wc".into(),
                "grep".into(),
                "find".into(),
                "which".into(),
                "git".into(),
            ],
            file_allowed_roots: Vec::new(),
            file_forbidden_paths: Vec::new(),
        }
    }
}

/// Create a tool registry with every builtin tool a `builtin`-implemented
/// tool spec can name, configured per `config`.
pub fn default_registry(config: BuiltinConfig) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(shell::ShellTool::new(config.shell_allowed_commands)));
    registry.register(Box::new(file_read::FileReadTool::with_restrictions(
        config.file_allowed_roots.clone(),
        config.file_forbidden_paths.clone(),
    )));
    registry.register(Box::new(file_write::FileWriteTool::with_restrictions(
        config.file_allowed_roots,
        config.file_forbidden_paths,
    )));
    registry.register(Box::new(web_search::WebSearchTool));
    registry.register(Box::new(web_fetch::WebFetchTool::new()));
    registry.register(Box::new(database_query::DatabaseQueryTool::new(config.database_executor)));
    registry.register(Box::new(email_send::EmailSendTool::new(config.email_api_url, config.email_api_key)));
    registry.register(Box::new(slack_send::SlackSendTool::new(config.slack_webhook_url)));
    registry
}
