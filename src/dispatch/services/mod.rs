//! Services for request dispatch.

mod context;
mod delegation;
mod dispatcher;
mod registry;


pub use context::HandlerContext;
pub use delegation::{
    DEFAULT_MAX_POLL_FAILURES, DEFAULT_MAX_POLL_INTERVAL, DEFAULT_POLL_BACKOFF_PERCENT,
    DEFAULT_POLL_INTERVAL, DEFAULT_TASK_TIMEOUT, DelegationSettings, MAX_TASK_WAIT,
    RequestBinding, TaskDelegator,
};
pub use dispatcher::{
    CANCELLATION_GRACE, CANCELLED_MESSAGE, DispatchSettings, Dispatcher, RESPONSE_EVENT_TYPE,
    SESSION_CHANNEL,
};
pub use registry::HandlerRegistry;
