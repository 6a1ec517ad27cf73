//! Tasks delegated to domain experts and their terminal results.

use super::{ExpertDomainError, ParseTaskStatusError, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Tool invoked to submit a task to an expert.
pub const SUBMIT_TASK_TOOL: &str = "submit_task";
/// Tool invoked to read a task's status.
pub const TASK_STATUS_TOOL: &str = "get_task_status";
/// Tool invoked to fetch a terminal task result.
pub const TASK_RESULT_TOOL: &str = "get_task_result";
/// Tool invoked to cancel a running task.
pub const CANCEL_TASK_TOOL: &str = "cancel_task";

/// Error marker carried by results of tasks that exceeded their deadline.
pub const TIMEOUT_ERROR: &str = "timeout";
/// Error marker carried by results of tasks cancelled by the caller.
pub const CANCELLED_ERROR: &str = "cancelled";

/// Scheduling priority hint forwarded to the expert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    /// Background work.
    Low,
    /// Default priority.
    Normal,
    /// User-visible work.
    High,
    /// Work that blocks a user turn.
    Critical,
}

/// Optional limits attached to a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskConstraints {
    /// Absolute time after which the caller stops waiting.
    pub deadline: Option<DateTime<Utc>>,
    /// Upper bound on tokens the expert may spend.
    pub max_tokens: Option<u32>,
    /// Priority hint.
    pub priority_level: Option<TaskPriority>,
    /// Retries the expert may attempt internally.
    pub max_retries: Option<u32>,
}

/// A unit of work delegated to a domain expert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    #[serde(rename = "type")]
    task_type: String,
    content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    context: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    constraints: Option<TaskConstraints>,
    #[serde(default)]
    metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    origin_request: Option<String>,
}

impl Task {
    /// Creates a task with a fresh identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ExpertDomainError::EmptyTaskType`] when `task_type` is blank.
    pub fn new(task_type: impl Into<String>, content: Value) -> Result<Self, ExpertDomainError> {
        let normalized_type = task_type.into().trim().to_owned();
        if normalized_type.is_empty() {
            return Err(ExpertDomainError::EmptyTaskType);
        }

        Ok(Self {
            id: TaskId::new(),
            task_type: normalized_type,
            content,
            context: None,
            constraints: None,
            metadata: Map::new(),
            origin_request: None,
        })
    }

    /// Attaches conversational context.
    #[must_use]
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    /// Attaches limits.
    #[must_use]
    pub fn with_constraints(mut self, constraints: TaskConstraints) -> Self {
        self.constraints = Some(constraints);
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Binds the task to the request that spawned it.
    #[must_use]
    pub fn with_origin_request(mut self, request_id: impl Into<String>) -> Self {
        self.origin_request = Some(request_id.into());
        self
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the task type.
    #[must_use]
    pub fn task_type(&self) -> &str {
        &self.task_type
    }

    /// Returns the task payload.
    #[must_use]
    pub const fn content(&self) -> &Value {
        &self.content
    }

    /// Returns the optional context.
    #[must_use]
    pub const fn context(&self) -> Option<&Value> {
        self.context.as_ref()
    }

    /// Returns the optional limits.
    #[must_use]
    pub const fn constraints(&self) -> Option<&TaskConstraints> {
        self.constraints.as_ref()
    }

    /// Returns the deadline, if one was set.
    #[must_use]
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.constraints.as_ref().and_then(|limits| limits.deadline)
    }

    /// Returns the metadata map.
    #[must_use]
    pub const fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Returns the originating request identifier, if bound.
    #[must_use]
    pub fn origin_request(&self) -> Option<&str> {
        self.origin_request.as_deref()
    }
}

/// Status of a task as reported by the expert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Accepted but not started.
    Pending,
    /// Being worked on.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Cancelled before finishing.
    Cancelled,
}

impl TaskStatus {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns whether polling may stop.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TaskStatus {
    type Error = ParseTaskStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "pending" | "queued" => Ok(Self::Pending),
            "running" | "in_progress" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            _ => Err(ParseTaskStatusError(value.to_owned())),
        }
    }
}

/// Execution metrics reported alongside a task result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMetrics {
    /// Wall time spent by the expert.
    pub duration_ms: Option<u64>,
    /// Tokens consumed by the expert.
    pub tokens_used: Option<u64>,
    /// Status polls issued by the delegating side.
    pub polls: Option<u32>,
}

/// Terminal value for a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    /// Task the result belongs to.
    pub task_id: TaskId,
    /// Whether the task succeeded.
    pub success: bool,
    /// Result payload on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error description on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Optional execution metrics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<TaskMetrics>,
}

impl TaskResult {
    /// Creates a successful result.
    #[must_use]
    pub const fn succeeded(task_id: TaskId, result: Value) -> Self {
        Self {
            task_id,
            success: true,
            result: Some(result),
            error: None,
            metrics: None,
        }
    }

    /// Creates a failed result.
    #[must_use]
    pub fn failed(task_id: TaskId, error: impl Into<String>) -> Self {
        Self {
            task_id,
            success: false,
            result: None,
            error: Some(error.into()),
            metrics: None,
        }
    }

    /// Creates the result of a task that exceeded its deadline.
    #[must_use]
    pub fn timed_out(task_id: TaskId) -> Self {
        Self::failed(task_id, TIMEOUT_ERROR)
    }

    /// Creates the result of a task whose request was cancelled.
    #[must_use]
    pub fn cancelled(task_id: TaskId) -> Self {
        Self::failed(task_id, CANCELLED_ERROR)
    }

    /// Attaches metrics.
    #[must_use]
    pub const fn with_metrics(mut self, metrics: TaskMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Returns whether this result records a deadline overrun.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.error.as_deref() == Some(TIMEOUT_ERROR)
    }
}
