//! Domain model for domain expert integration.
//!
//! Expert names and endpoints, connection and circuit breaker state machines,
//! health snapshots, tool metadata and the task protocol values live here.
//! Time is always supplied by the caller through a [`mockable::Clock`].

mod breaker;
mod connection;
mod descriptor;
mod endpoint;
mod error;
mod health;
mod ids;
mod task;
mod tool;

pub use breaker::{
    Admission, BreakerSettings, BreakerSnapshot, CircuitBreaker, CircuitState,
    DEFAULT_COOL_DOWN, DEFAULT_FAILURE_RATE_PERCENT, DEFAULT_FAILURE_THRESHOLD,
    DEFAULT_MINIMUM_CALLS, DEFAULT_WINDOW,
};
pub use connection::ConnectionState;
pub use descriptor::{ExpertDescriptor, ExpertStatus};
pub use endpoint::{ExpertEndpoint, ExpertEndpointSpec};
pub use error::{
    ExpertDomainError, ParseCircuitStateError, ParseConnectionStateError, ParseTaskStatusError,
};
pub use health::{ExpertHealthSnapshot, ExpertHealthStatus};
pub use ids::{ExpertName, TaskId};
pub use task::{
    CANCEL_TASK_TOOL, CANCELLED_ERROR, SUBMIT_TASK_TOOL, TASK_RESULT_TOOL, TASK_STATUS_TOOL,
    TIMEOUT_ERROR, Task, TaskConstraints, TaskMetrics, TaskPriority, TaskResult, TaskStatus,
};
pub use tool::{ResourceContent, ToolDefinition, ToolListing};
