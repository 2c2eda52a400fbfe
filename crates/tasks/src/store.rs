//! The human task store: create/assign/claim/respond/cancel/expire, each
//! task's transitions serialized through its own mutex (same per-key
//! isolation idiom as the rate limiter's per-bucket lock).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use functionsdo_core::error::TaskError;
use functionsdo_core::ids::FunctionId;
use functionsdo_core::model::HumanUiForm;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::timeout::parse_timeout;
use crate::webhook::{WebhookDelivery, WebhookJob};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Assigned,
    InProgress,
    Completed,
    Cancelled,
    Expired,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Cancelled | TaskStatus::Expired)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Assigned => "assigned",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanTask {
    pub task_id: String,
    pub function_id: FunctionId,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interaction_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui: Option<HumanUiForm>,
    pub assignees: Vec<String>,
    pub invocation_data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expired_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

impl HumanTask {
    fn expire_if_due(&mut self, now: DateTime<Utc>) {
        if !self.status.is_terminal() && now >= self.expires_at {
            self.status = TaskStatus::Expired;
            self.expired_at = Some(now);
        }
    }
}

/// What a caller asks to create a new human task with.
pub struct CreateTaskRequest {
    pub function_id: FunctionId,
    pub interaction_type: Option<String>,
    pub ui: Option<HumanUiForm>,
    pub assignees: Vec<String>,
    pub invocation_data: serde_json::Value,
    /// Per-invocation timeout override (`"30m"` etc); falls back to the
    /// function's registered `timeout`, then to `default_timeout`.
    pub timeout: Option<String>,
    /// Per-invocation callback override; falls back to the function's
    /// registered `callback_url`.
    pub callback_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskCreated {
    pub task_id: String,
    pub task_url: String,
    pub task_status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    pub expires_at: DateTime<Utc>,
}

pub struct TaskStore {
    tasks: RwLock<HashMap<String, Arc<Mutex<HumanTask>>>>,
    base_url: String,
    webhook: WebhookDelivery,
}

impl TaskStore {
    pub fn new(base_url: impl Into<String>, webhook: WebhookDelivery) -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            base_url: base_url.into(),
            webhook,
        }
    }

    fn task_url(&self, task_id: &str) -> String {
        format!("{}/tasks/{}", self.base_url.trim_end_matches('/'), task_id)
    }

    pub async fn create(
        &self,
        req: CreateTaskRequest,
        default_timeout: ChronoDuration,
    ) -> Result<TaskCreated, TaskError> {
        let now = Utc::now();
        let ttl = match req.timeout.as_deref() {
            Some(s) => parse_timeout(s).map_err(|_| TaskError::MissingField("timeout".into()))?,
            None => default_timeout,
        };
        let task_id = Uuid::new_v4().to_string();
        let task = HumanTask {
            task_id: task_id.clone(),
            function_id: req.function_id,
            status: TaskStatus::Pending,
            interaction_type: req.interaction_type,
            ui: req.ui,
            assignees: req.assignees,
            invocation_data: req.invocation_data,
            response: None,
            created_at: now,
            assigned_at: None,
            completed_at: None,
            cancelled_at: None,
            expired_at: None,
            expires_at: now + ttl,
            callback_url: req.callback_url,
        };

        let created = TaskCreated {
            task_id: task.task_id.clone(),
            task_url: self.task_url(&task_id),
            task_status: task.status,
            callback_url: task.callback_url.clone(),
            expires_at: task.expires_at,
        };

        self.tasks.write().await.insert(task_id, Arc::new(Mutex::new(task)));
        Ok(created)
    }

    async fn lookup(&self, task_id: &str) -> Result<Arc<Mutex<HumanTask>>, TaskError> {
        self.tasks.read().await.get(task_id).cloned().ok_or(TaskError::NotFound)
    }

    pub async fn get(&self, task_id: &str) -> Result<HumanTask, TaskError> {
        let slot = self.lookup(task_id).await?;
        let mut task = slot.lock().await;
        task.expire_if_due(Utc::now());
        Ok(task.clone())
    }

    pub async fn assign(&self, task_id: &str) -> Result<HumanTask, TaskError> {
        let slot = self.lookup(task_id).await?;
        let mut task = slot.lock().await;
        task.expire_if_due(Utc::now());
        if task.status.is_terminal() {
            return Err(TaskError::Terminal);
        }
        if task.status != TaskStatus::Pending {
            return Err(TaskError::Terminal);
        }
        task.status = TaskStatus::Assigned;
        task.assigned_at = Some(Utc::now());
        Ok(task.clone())
    }

    pub async fn claim(&self, task_id: &str) -> Result<HumanTask, TaskError> {
        let slot = self.lookup(task_id).await?;
        let mut task = slot.lock().await;
        task.expire_if_due(Utc::now());
        if task.status.is_terminal() {
            return Err(TaskError::Terminal);
        }
        task.status = TaskStatus::InProgress;
        Ok(task.clone())
    }

    pub async fn respond(&self, task_id: &str, response: serde_json::Value) -> Result<HumanTask, TaskError> {
        let slot = self.lookup(task_id).await?;
        let mut task = slot.lock().await;
        task.expire_if_due(Utc::now());

        if task.status == TaskStatus::Expired {
            return Err(TaskError::Expired);
        }
        if task.status.is_terminal() {
            return Err(TaskError::Terminal);
        }

        if let Some(ui) = &task.ui {
            let obj = response.as_object();
            for field in &ui.required_fields {
                let present = obj.and_then(|o| o.get(field)).is_some_and(|v| !v.is_null());
                if !present {
                    return Err(TaskError::MissingField(field.clone()));
                }
            }
        }

        let now = Utc::now();
        task.response = Some(response);
        task.status = TaskStatus::Completed;
        task.completed_at = Some(now);

        if let Some(url) = task.callback_url.clone() {
            let body = serde_json::to_value(&*task).unwrap_or_default();
            self.webhook.enqueue(WebhookJob { url, body }).await;
        }

        Ok(task.clone())
    }

    pub async fn cancel(&self, task_id: &str) -> Result<HumanTask, TaskError> {
        let slot = self.lookup(task_id).await?;
        let mut task = slot.lock().await;
        task.expire_if_due(Utc::now());
        if task.status.is_terminal() {
            return Err(TaskError::Terminal);
        }
        task.status = TaskStatus::Cancelled;
        task.cancelled_at = Some(Utc::now());
        Ok(task.clone())
    }

    /// Transitions every overdue non-terminal task to `expired`. Intended to
    /// be driven by a periodic scheduler, independent of lazy per-call checks.
    pub async fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut count = 0;
        for slot in self.tasks.read().await.values() {
            let mut task = slot.lock().await;
            if !task.status.is_terminal() && now >= task.expires_at {
                task.status = TaskStatus::Expired;
                task.expired_at = Some(now);
                count += 1;
            }
        }
        count
    }

    pub async fn list(&self, function_id: Option<&str>, status: Option<TaskStatus>) -> Vec<HumanTask> {
        let mut out = Vec::new();
        for slot in self.tasks.read().await.values() {
            let mut task = slot.lock().await;
            task.expire_if_due(Utc::now());
            if let Some(fid) = function_id {
                if task.function_id.as_str() != fid {
                    continue;
                }
            }
            if let Some(st) = status {
                if task.status != st {
                    continue;
                }
            }
            out.push(task.clone());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::webhook::WebhookSender;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSender {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl WebhookSender for CountingSender {
        async fn send(&self, _url: &str, _body: &serde_json::Value) -> Result<(), String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn store() -> TaskStore {
        let webhook = WebhookDelivery::spawn(CountingSender { calls: Arc::new(AtomicUsize::new(0)) }, 1);
        TaskStore::new("https://fn.example", webhook)
    }

    fn req() -> CreateTaskRequest {
        CreateTaskRequest {
            function_id: FunctionId::parse("approve-refund").unwrap(),
            interaction_type: Some("approval".into()),
            ui: Some(HumanUiForm { required_fields: vec!["approved".into()], layout: serde_json::json!({}) }),
            assignees: vec!["alice@example.com".into()],
            invocation_data: serde_json::json!({"amount": 42}),
            timeout: None,
            callback_url: Some("https://caller.example/cb".into()),
        }
    }

    #[tokio::test]
    async fn create_returns_pending_task_with_embedded_id() {
        let store = store();
        let created = store.create(req(), ChronoDuration::hours(1)).await.unwrap();
        assert_eq!(created.task_status, TaskStatus::Pending);
        assert!(created.task_url.contains(&created.task_id));
    }

    #[tokio::test]
    async fn get_unknown_task_is_not_found() {
        let store = store();
        assert!(matches!(store.get("missing").await, Err(TaskError::NotFound)));
    }

    #[tokio::test]
    async fn full_lifecycle_assign_claim_respond() {
        let store = store();
        let created = store.create(req(), ChronoDuration::hours(1)).await.unwrap();
        store.assign(&created.task_id).await.unwrap();
        let claimed = store.claim(&created.task_id).await.unwrap();
        assert_eq!(claimed.status, TaskStatus::InProgress);

        let completed = store
            .respond(&created.task_id, serde_json::json!({"approved": true}))
            .await
            .unwrap();
        assert_eq!(completed.status, TaskStatus::Completed);
        assert!(completed.completed_at.is_some());
    }

    #[tokio::test]
    async fn respond_directly_from_pending_is_allowed() {
        let store = store();
        let created = store.create(req(), ChronoDuration::hours(1)).await.unwrap();
        let completed = store
            .respond(&created.task_id, serde_json::json!({"approved": false}))
            .await
            .unwrap();
        assert_eq!(completed.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn respond_missing_required_field_rejected() {
        let store = store();
        let created = store.create(req(), ChronoDuration::hours(1)).await.unwrap();
        let err = store.respond(&created.task_id, serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, TaskError::MissingField(f) if f == "approved"));
    }

    #[tokio::test]
    async fn respond_after_completion_is_terminal() {
        let store = store();
        let created = store.create(req(), ChronoDuration::hours(1)).await.unwrap();
        store.respond(&created.task_id, serde_json::json!({"approved": true})).await.unwrap();
        let err = store.respond(&created.task_id, serde_json::json!({"approved": true})).await.unwrap_err();
        assert!(matches!(err, TaskError::Terminal));
    }

    #[tokio::test]
    async fn cancel_rejects_already_terminal_task() {
        let store = store();
        let created = store.create(req(), ChronoDuration::hours(1)).await.unwrap();
        store.cancel(&created.task_id).await.unwrap();
        let err = store.cancel(&created.task_id).await.unwrap_err();
        assert!(matches!(err, TaskError::Terminal));
    }

    #[tokio::test]
    async fn expired_task_rejects_response_as_expired() {
        let store = store();
        let created = store.create(req(), ChronoDuration::seconds(-1)).await.unwrap();
        let err = store.respond(&created.task_id, serde_json::json!({"approved": true})).await.unwrap_err();
        assert!(matches!(err, TaskError::Expired));
    }

    #[tokio::test]
    async fn sweep_expired_transitions_overdue_tasks() {
        let store = store();
        store.create(req(), ChronoDuration::seconds(-1)).await.unwrap();
        let swept = store.sweep_expired().await;
        assert_eq!(swept, 1);
    }

    #[tokio::test]
    async fn list_filters_by_function_id_and_status() {
        let store = store();
        let created_a = store.create(req(), ChronoDuration::hours(1)).await.unwrap();
        let mut other = req();
        other.function_id = FunctionId::parse("send-invoice").unwrap();
        store.create(other, ChronoDuration::hours(1)).await.unwrap();

        store.cancel(&created_a.task_id).await.unwrap();

        let cancelled = store.list(Some("approve-refund"), Some(TaskStatus::Cancelled)).await;
        assert_eq!(cancelled.len(), 1);

        let all_for_invoice = store.list(Some("send-invoice"), None).await;
        assert_eq!(all_for_invoice.len(), 1);
    }
}
