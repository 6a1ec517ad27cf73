//! Task delegation: submit to an expert, poll with backoff, collect the result.

use crate::dispatch::{domain::RequestId, ports::ExpertGateway};
use crate::expert::domain::{ExpertName, Task, TaskId, TaskMetrics, TaskResult};
use dashmap::{DashMap, mapref::entry::Entry};
use mockable::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep_until, timeout_at};
use tokio_util::sync::CancellationToken;

/// Default delay before the first status poll.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Default ceiling for the poll delay.
pub const DEFAULT_MAX_POLL_INTERVAL: Duration = Duration::from_secs(10);
/// Default growth of the poll delay, in percent per poll.
pub const DEFAULT_POLL_BACKOFF_PERCENT: u32 = 150;
/// Default wait for tasks without a deadline.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(300);
/// Default number of consecutive failed status polls tolerated.
pub const DEFAULT_MAX_POLL_FAILURES: u32 = 3;
/// Longest a single delegation waits, whatever its deadline or timeout.
pub const MAX_TASK_WAIT: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Polling behaviour for delegated tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegationSettings {
    /// Delay before the first status poll.
    pub poll_interval: Duration,
    /// Ceiling for the poll delay.
    pub max_poll_interval: Duration,
    /// Growth of the poll delay in percent; values below 100 keep it fixed.
    pub poll_backoff_percent: u32,
    /// Wait applied when a task carries no deadline.
    pub default_task_timeout: Duration,
    /// Consecutive failed status polls tolerated before giving up.
    pub max_poll_failures: u32,
}

impl Default for DelegationSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_interval: DEFAULT_MAX_POLL_INTERVAL,
            poll_backoff_percent: DEFAULT_POLL_BACKOFF_PERCENT,
            default_task_timeout: DEFAULT_TASK_TIMEOUT,
            max_poll_failures: DEFAULT_MAX_POLL_FAILURES,
        }
    }
}

impl DelegationSettings {
    /// Returns the delay that follows `current`.
    #[must_use]
    pub fn next_poll_interval(&self, current: Duration) -> Duration {
        current
            .saturating_mul(self.poll_backoff_percent.max(100))
            .checked_div(100)
            .map_or(self.max_poll_interval, |next| next.min(self.max_poll_interval))
    }
}

/// Ties a delegation to the request that issued it.
#[derive(Debug, Clone)]
pub struct RequestBinding {
    request_id: RequestId,
    token: CancellationToken,
    exclusive: bool,
}

impl RequestBinding {
    /// Creates a binding.
    #[must_use]
    pub const fn new(request_id: RequestId, token: CancellationToken, exclusive: bool) -> Self {
        Self {
            request_id,
            token,
            exclusive,
        }
    }

    /// Returns the bound request identifier.
    #[must_use]
    pub const fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// Returns the request's cancellation token.
    #[must_use]
    pub const fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Returns whether the request allows one outstanding task per expert.
    #[must_use]
    pub const fn is_exclusive(&self) -> bool {
        self.exclusive
    }
}

type ClaimKey = (RequestId, ExpertName);

/// Marks a task outstanding for an exclusive request until dropped.
struct ExclusiveClaim {
    outstanding: Arc<DashMap<ClaimKey, TaskId>>,
    key: ClaimKey,
}

impl ExclusiveClaim {
    fn acquire(
        outstanding: &Arc<DashMap<ClaimKey, TaskId>>,
        key: ClaimKey,
        task_id: TaskId,
    ) -> Option<Self> {
        match outstanding.entry(key.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(task_id);
                Some(Self {
                    outstanding: Arc::clone(outstanding),
                    key,
                })
            }
        }
    }
}

impl Drop for ExclusiveClaim {
    fn drop(&mut self) {
        self.outstanding.remove(&self.key);
    }
}

enum PollOutcome {
    Finished(TaskResult),
    Failed(String),
    TimedOut,
    Cancelled,
}

/// Delegates tasks to domain experts through an [`ExpertGateway`].
///
/// Every delegation ends in a [`TaskResult`]; failures are reported in the
/// result rather than as errors.
pub struct TaskDelegator {
    gateway: Arc<dyn ExpertGateway>,
    clock: Arc<dyn Clock + Send + Sync>,
    settings: DelegationSettings,
    outstanding: Arc<DashMap<ClaimKey, TaskId>>,
}

impl TaskDelegator {
    /// Creates a delegator.
    #[must_use]
    pub fn new(
        gateway: Arc<dyn ExpertGateway>,
        clock: Arc<dyn Clock + Send + Sync>,
        settings: DelegationSettings,
    ) -> Self {
        Self {
            gateway,
            clock,
            settings,
            outstanding: Arc::new(DashMap::new()),
        }
    }

    /// Returns the polling settings.
    #[must_use]
    pub const fn settings(&self) -> &DelegationSettings {
        &self.settings
    }

    /// Returns how many tasks exclusive requests currently hold.
    #[must_use]
    pub fn outstanding_count(&self) -> usize {
        self.outstanding.len()
    }

    /// Submits `task` to `expert` and waits for its terminal result.
    ///
    /// With a binding, the wait stops as soon as the request is cancelled,
    /// and exclusive requests may hold only one outstanding task per expert.
    pub async fn delegate(
        &self,
        expert: &str,
        task: Task,
        binding: Option<&RequestBinding>,
    ) -> TaskResult {
        let task_id = task.id();
        let Some(name) = ExpertName::new(expert)
            .ok()
            .filter(|candidate| self.gateway.contains(candidate))
        else {
            tracing::warn!(expert, %task_id, "delegation to unknown domain expert");
            return TaskResult::failed(task_id, format!("unknown expert: {expert}"));
        };

        let token = binding.map_or_else(CancellationToken::new, |bound| bound.token().clone());
        if token.is_cancelled() {
            return TaskResult::cancelled(task_id);
        }

        let _claim = match binding.filter(|bound| bound.is_exclusive()) {
            Some(bound) => {
                let key = (bound.request_id().clone(), name.clone());
                let Some(claim) = ExclusiveClaim::acquire(&self.outstanding, key, task_id) else {
                    tracing::warn!(
                        request_id = %bound.request_id(),
                        expert = %name,
                        %task_id,
                        "exclusive request already has an outstanding task"
                    );
                    return TaskResult::failed(
                        task_id,
                        format!("task already in flight for expert {name}"),
                    );
                };
                Some(claim)
            }
            None => None,
        };

        let deadline = instant_after(self.wait_budget(&task));
        let submitted = tokio::select! {
            biased;
            () = token.cancelled() => return TaskResult::cancelled(task_id),
            submitted = timeout_at(deadline, self.gateway.submit_task(&name, &task)) => submitted,
        };
        let remote_id = match submitted {
            Ok(Ok(remote_id)) => remote_id,
            Ok(Err(err)) => {
                tracing::warn!(expert = %name, %task_id, error = %err, "task submission failed");
                return TaskResult::failed(task_id, err.to_string());
            }
            Err(_elapsed) => return TaskResult::timed_out(task_id),
        };
        tracing::debug!(expert = %name, %task_id, %remote_id, "task submitted");

        match self.poll(&name, remote_id, &token, deadline).await {
            PollOutcome::Finished(mut result) => {
                result.task_id = task_id;
                result
            }
            PollOutcome::Failed(message) => TaskResult::failed(task_id, message),
            PollOutcome::TimedOut => {
                tracing::warn!(expert = %name, %task_id, "task exceeded its deadline");
                self.cancel_remote(name, remote_id);
                TaskResult::timed_out(task_id)
            }
            PollOutcome::Cancelled => {
                tracing::info!(expert = %name, %task_id, "task abandoned by cancelled request");
                self.cancel_remote(name, remote_id);
                TaskResult::cancelled(task_id)
            }
        }
    }

    fn wait_budget(&self, task: &Task) -> Duration {
        task.deadline()
            .map_or(self.settings.default_task_timeout, |deadline| {
                (deadline - self.clock.utc())
                    .to_std()
                    .unwrap_or(Duration::ZERO)
            })
    }

    async fn poll(
        &self,
        name: &ExpertName,
        remote_id: TaskId,
        token: &CancellationToken,
        deadline: Instant,
    ) -> PollOutcome {
        let mut interval = self.settings.poll_interval;
        let mut failures = 0_u32;
        let mut polls = 0_u32;
        loop {
            let wake = instant_after(interval).min(deadline);
            tokio::select! {
                biased;
                () = token.cancelled() => return PollOutcome::Cancelled,
                () = sleep_until(wake) => {}
            }
            if Instant::now() >= deadline {
                return PollOutcome::TimedOut;
            }

            polls = polls.saturating_add(1);
            let status = tokio::select! {
                biased;
                () = token.cancelled() => return PollOutcome::Cancelled,
                status = timeout_at(deadline, self.gateway.task_status(name, remote_id)) => status,
            };
            match status {
                Ok(Ok(current)) if current.is_terminal() => {
                    return self
                        .fetch_result(name, remote_id, token, deadline, polls)
                        .await;
                }
                Ok(Ok(current)) => {
                    tracing::debug!(expert = %name, %remote_id, status = %current, "task still running");
                    failures = 0;
                }
                Ok(Err(err)) => {
                    failures = failures.saturating_add(1);
                    tracing::warn!(
                        expert = %name,
                        %remote_id,
                        failures,
                        error = %err,
                        "task status poll failed"
                    );
                    if failures > self.settings.max_poll_failures {
                        return PollOutcome::Failed(err.to_string());
                    }
                }
                Err(_elapsed) => return PollOutcome::TimedOut,
            }
            interval = self.settings.next_poll_interval(interval);
        }
    }

    async fn fetch_result(
        &self,
        name: &ExpertName,
        remote_id: TaskId,
        token: &CancellationToken,
        deadline: Instant,
        polls: u32,
    ) -> PollOutcome {
        let fetched = tokio::select! {
            biased;
            () = token.cancelled() => return PollOutcome::Cancelled,
            fetched = timeout_at(deadline, self.gateway.task_result(name, remote_id)) => fetched,
        };
        match fetched {
            Ok(Ok(mut result)) => {
                let metrics = result.metrics.unwrap_or_default();
                result.metrics = Some(TaskMetrics {
                    polls: Some(polls),
                    ..metrics
                });
                PollOutcome::Finished(result)
            }
            Ok(Err(err)) => PollOutcome::Failed(err.to_string()),
            Err(_elapsed) => PollOutcome::TimedOut,
        }
    }

    fn cancel_remote(&self, name: ExpertName, remote_id: TaskId) {
        let gateway = Arc::clone(&self.gateway);
        tokio::spawn(async move {
            if let Err(err) = gateway.cancel_task(&name, remote_id).await {
                tracing::debug!(expert = %name, %remote_id, error = %err, "remote task cancel failed");
            }
        });
    }
}

/// Returns the instant `wait` from now, capped at [`MAX_TASK_WAIT`].
fn instant_after(wait: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(wait.min(MAX_TASK_WAIT)).unwrap_or(now)
}
