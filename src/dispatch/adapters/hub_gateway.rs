//! [`ExpertGateway`] backed by the integration hub.

use crate::dispatch::ports::ExpertGateway;
use crate::expert::{
    domain::{ExpertName, Task, TaskId, TaskResult, TaskStatus},
    services::{HubResult, IntegrationHub},
};
use async_trait::async_trait;
use mockable::Clock;

#[async_trait]
impl<C> ExpertGateway for IntegrationHub<C>
where
    C: Clock + Send + Sync + 'static,
{
    fn contains(&self, name: &ExpertName) -> bool {
        Self::contains(self, name)
    }

    async fn submit_task(&self, name: &ExpertName, task: &Task) -> HubResult<TaskId> {
        Self::submit_task(self, name, task).await
    }

    async fn task_status(&self, name: &ExpertName, task_id: TaskId) -> HubResult<TaskStatus> {
        Self::task_status(self, name, task_id).await
    }

    async fn task_result(&self, name: &ExpertName, task_id: TaskId) -> HubResult<TaskResult> {
        Self::task_result(self, name, task_id).await
    }

    async fn cancel_task(&self, name: &ExpertName, task_id: TaskId) -> HubResult<()> {
        Self::cancel_task(self, name, task_id).await
    }
}
