//! Event publisher fanning events out to subscribed connections.

use super::registry::ConnectionRegistry;
use crate::delivery::domain::{
    ChannelType, DeliveryDomainError, Event, HEARTBEAT_EVENT_TYPE, ResourceId,
};
use mockable::Clock;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Default period between heartbeats.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(20);

/// Errors returned when publishing an application event.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// The event type is reserved for publisher heartbeats.
    #[error("event type '{0}' is reserved")]
    ReservedEventType(String),

    /// The event failed validation.
    #[error(transparent)]
    Domain(#[from] DeliveryDomainError),
}

/// Per-call delivery accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Connections subscribed to the stream.
    pub matched: usize,
    /// Connections whose queue now holds the event.
    pub delivered: usize,
    /// Connections that lost an event to overflow.
    pub overflowed: usize,
}

struct HeartbeatTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Publishes events and owns the single heartbeat task.
pub struct EventPublisher<C>
where
    C: Clock + Send + Sync + 'static,
{
    registry: Arc<ConnectionRegistry<C>>,
    heartbeat_interval: Duration,
    heartbeat: Mutex<Option<HeartbeatTask>>,
}

impl<C> EventPublisher<C>
where
    C: Clock + Send + Sync + 'static,
{
    /// Creates a publisher over `registry`.
    #[must_use]
    pub const fn new(registry: Arc<ConnectionRegistry<C>>, heartbeat_interval: Duration) -> Self {
        Self {
            registry,
            heartbeat_interval,
            heartbeat: Mutex::new(None),
        }
    }

    /// Returns the registry this publisher delivers through.
    #[must_use]
    pub const fn registry(&self) -> &Arc<ConnectionRegistry<C>> {
        &self.registry
    }

    /// Enqueues an event on every connection subscribed to the stream.
    ///
    /// Each queue is handled independently; overflow on one connection is
    /// logged and counted but never affects the others.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::ReservedEventType`] for `heartbeat` and
    /// [`DeliveryError::Domain`] for a blank event type.
    pub fn send_event(
        &self,
        channel_type: &ChannelType,
        resource_id: &ResourceId,
        event_type: &str,
        data: Value,
    ) -> Result<DeliveryReport, DeliveryError> {
        if event_type.trim() == HEARTBEAT_EVENT_TYPE {
            return Err(DeliveryError::ReservedEventType(event_type.trim().to_owned()));
        }
        let event = Event::new(
            event_type,
            channel_type.clone(),
            resource_id.clone(),
            data,
            self.registry.clock().utc(),
        )?;

        let subscribers = self.registry.subscribers(channel_type, resource_id);
        let mut report = DeliveryReport {
            matched: subscribers.len(),
            ..DeliveryReport::default()
        };
        for subscriber in subscribers {
            let outcome = subscriber.queue.push(event.clone());
            if outcome.is_enqueued() {
                report.delivered += 1;
            }
            if outcome.is_overflow() {
                report.overflowed += 1;
                tracing::warn!(
                    connection_id = %subscriber.connection_id,
                    event_type = event.event_type(),
                    policy = ?outcome,
                    dropped_total = subscriber.queue.dropped_count(),
                    "connection queue full, event dropped"
                );
            }
        }

        tracing::debug!(
            channel_type = %channel_type,
            resource_id = %resource_id,
            event_type = event.event_type(),
            matched = report.matched,
            delivered = report.delivered,
            "event published"
        );
        Ok(report)
    }

    /// Starts the heartbeat task unless it is already running.
    ///
    /// Returns whether a new task was started.
    pub fn start_heartbeat(&self) -> bool {
        let mut slot = self.lock_heartbeat();
        if slot.as_ref().is_some_and(|task| !task.handle.is_finished()) {
            return false;
        }

        let token = CancellationToken::new();
        let handle = tokio::spawn(run_heartbeat(
            Arc::clone(&self.registry),
            self.heartbeat_interval,
            token.clone(),
        ));
        *slot = Some(HeartbeatTask { token, handle });
        tracing::info!(interval = ?self.heartbeat_interval, "heartbeat started");
        true
    }

    /// Returns whether the heartbeat task is running.
    #[must_use]
    pub fn heartbeat_running(&self) -> bool {
        self.lock_heartbeat()
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Stops the heartbeat task and waits for it to exit.
    pub async fn shutdown(&self) {
        let task = self.lock_heartbeat().take();
        let Some(HeartbeatTask { token, handle }) = task else {
            return;
        };
        token.cancel();
        if let Err(err) = handle.await {
            tracing::warn!(error = %err, "heartbeat task ended abnormally");
        }
        tracing::info!("heartbeat stopped");
    }

    fn lock_heartbeat(&self) -> MutexGuard<'_, Option<HeartbeatTask>> {
        self.heartbeat.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn run_heartbeat<C>(
    registry: Arc<ConnectionRegistry<C>>,
    period: Duration,
    token: CancellationToken,
) where
    C: Clock + Send + Sync + 'static,
{
    let tick_period = period.max(Duration::from_millis(1));
    let mut ticker =
        tokio::time::interval_at(tokio::time::Instant::now() + tick_period, tick_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            () = token.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let now = registry.clock().utc();
        let mut delivered = 0_usize;
        let mut overflowed = 0_usize;
        for (key, subscriber) in registry.all_subscribers() {
            let heartbeat = Event::heartbeat(key.channel_type, key.resource_id, now);
            let outcome = subscriber.queue.push(heartbeat);
            if outcome.is_enqueued() {
                delivered += 1;
            }
            if outcome.is_overflow() {
                overflowed += 1;
                tracing::warn!(
                    connection_id = %subscriber.connection_id,
                    policy = ?outcome,
                    dropped_total = subscriber.queue.dropped_count(),
                    "connection queue full during heartbeat"
                );
            }
        }
        tracing::trace!(connections = delivered, overflowed, "heartbeat sent");
    }
}
