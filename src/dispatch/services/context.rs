//! Context handed to request handlers.

use super::delegation::{RequestBinding, TaskDelegator};
use crate::delivery::services::{DeliveryError, DeliveryReport};
use crate::dispatch::{domain::RequestId, ports::EventSink};
use crate::expert::domain::{Task, TaskResult};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Per-request capabilities available to a handler.
#[derive(Clone)]
pub struct HandlerContext {
    binding: RequestBinding,
    delegator: Arc<TaskDelegator>,
    sink: Arc<dyn EventSink>,
}

impl HandlerContext {
    pub(super) const fn new(
        binding: RequestBinding,
        delegator: Arc<TaskDelegator>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            binding,
            delegator,
            sink,
        }
    }

    /// Returns the identifier of the request being handled.
    #[must_use]
    pub const fn request_id(&self) -> &RequestId {
        self.binding.request_id()
    }

    /// Returns the request's cancellation token.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        self.binding.token()
    }

    /// Returns whether the request has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.binding.token().is_cancelled()
    }

    /// Delegates a task on behalf of this request.
    ///
    /// The task is bound to the request unless it already names an origin.
    pub async fn delegate(&self, expert: &str, task: Task) -> TaskResult {
        let bound = if task.origin_request().is_some() {
            task
        } else {
            task.with_origin_request(self.request_id().as_str())
        };
        self.delegator
            .delegate(expert, bound, Some(&self.binding))
            .await
    }

    /// Publishes an application event, for example a streamed chunk.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError`] when the key or event type is rejected.
    pub fn publish(
        &self,
        channel_type: &str,
        resource_id: &str,
        event_type: &str,
        data: Value,
    ) -> Result<DeliveryReport, DeliveryError> {
        self.sink
            .publish(channel_type, resource_id, event_type, data)
    }
}
