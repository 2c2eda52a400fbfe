//! `functionsdo tasks` — inspect human task state on a running gateway.

use functionsdo_config::AppConfig;

pub async fn list(function_id: Option<String>, status: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("failed to load config: {e}"))?;
    let mut url = reqwest::Url::parse(&format!("http://{}:{}/api/tasks", config.gateway.host, config.gateway.port))?;
    {
        let mut query = url.query_pairs_mut();
        if let Some(fid) = &function_id {
            query.append_pair("function_id", fid);
        }
        if let Some(s) = &status {
            query.append_pair("status", s);
        }
    }

    let resp = reqwest::get(url).await.map_err(|e| format!("gateway unreachable: {e}"))?;
    if !resp.status().is_success() {
        return Err(format!("gateway returned {}", resp.status()).into());
    }

    let tasks: Vec<serde_json::Value> = resp.json().await?;
    if tasks.is_empty() {
        println!("No tasks found.");
        return Ok(());
    }

    println!("{:<38} {:<12} {:<24} {:<10}", "task id", "status", "function", "assignees");
    for task in &tasks {
        println!(
            "{:<38} {:<12} {:<24} {:<10}",
            task.get("task_id").and_then(|v| v.as_str()).unwrap_or("-"),
            task.get("status").and_then(|v| v.as_str()).unwrap_or("-"),
            task.get("function_id").and_then(|v| v.as_str()).unwrap_or("-"),
            task.get("assignees").and_then(|v| v.as_array()).map(|a| a.len()).unwrap_or(0),
        );
    }

    Ok(())
}
