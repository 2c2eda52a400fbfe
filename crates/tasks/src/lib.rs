//! The human task store: functions classified (or declared) as `human` route
//! here instead of to a model or tool — a task is created for one or more
//! assignees, and the function's invocation blocks (or returns a pending
//! handle) until a response arrives, the task is cancelled, or it expires.

pub mod store;
pub mod timeout;
pub mod webhook;

pub use store::{CreateTaskRequest, HumanTask, TaskCreated, TaskStatus, TaskStore};
pub use timeout::{parse_timeout, TimeoutParseError};
pub use webhook::{ReqwestSender, WebhookDelivery, WebhookJob, WebhookSender};
