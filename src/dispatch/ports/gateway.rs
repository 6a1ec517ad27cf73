//! Gateway port: the task protocol surface of the integration hub.

use crate::expert::{
    domain::{ExpertName, Task, TaskId, TaskResult, TaskStatus},
    services::HubResult,
};
use async_trait::async_trait;

/// Task protocol operations the dispatcher needs from domain experts.
#[async_trait]
pub trait ExpertGateway: Send + Sync {
    /// Returns whether an expert is registered under `name`.
    fn contains(&self, name: &ExpertName) -> bool;

    /// Submits a task and returns the identifier the expert tracks it by.
    async fn submit_task(&self, name: &ExpertName, task: &Task) -> HubResult<TaskId>;

    /// Reads the status of a submitted task.
    async fn task_status(&self, name: &ExpertName, task_id: TaskId) -> HubResult<TaskStatus>;

    /// Fetches the result of a terminal task.
    async fn task_result(&self, name: &ExpertName, task_id: TaskId) -> HubResult<TaskResult>;

    /// Asks the expert to stop working on a task.
    async fn cancel_task(&self, name: &ExpertName, task_id: TaskId) -> HubResult<()>;
}
