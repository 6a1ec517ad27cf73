//! Background health probing and reconnection for domain expert clients.

use super::client::{ClientInner, DomainExpertClient};
use crate::expert::domain::{ConnectionState, ExpertHealthSnapshot};
use mockable::Clock;
use rand::Rng;
use std::sync::Weak;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Spawns the periodic health loop for one client.
///
/// The loop holds a weak reference so a dropped client stops probing.
pub(super) fn spawn_health_loop<C>(client: Weak<ClientInner<C>>, token: CancellationToken)
where
    C: Clock + Send + Sync + 'static,
{
    tokio::spawn(async move {
        loop {
            let period = match client.upgrade() {
                Some(inner) => jittered(inner.settings.health_interval, inner.settings.health_jitter),
                None => return,
            };
            tokio::select! {
                () = token.cancelled() => return,
                () = tokio::time::sleep(period) => {}
            }
            let Some(inner) = client.upgrade() else {
                return;
            };
            DomainExpertClient { inner }.check_health(&token).await;
        }
    });
}

/// Returns `interval` shifted by a random offset within `±jitter`.
pub(super) fn jittered(interval: Duration, jitter: Duration) -> Duration {
    let jitter_ms = u64::try_from(jitter.as_millis()).unwrap_or(u64::MAX);
    let spread = jitter_ms.saturating_mul(2);
    if spread == 0 {
        return interval;
    }
    let offset = rand::rng().random_range(0..=spread);
    interval
        .saturating_sub(jitter)
        .saturating_add(Duration::from_millis(offset))
}

impl<C> DomainExpertClient<C>
where
    C: Clock + Send + Sync + 'static,
{
    /// Runs one health check and schedules a reconnect when it fails.
    pub(super) async fn check_health(&self, token: &CancellationToken) {
        match self.state() {
            ConnectionState::Connected => {}
            ConnectionState::Error => {
                if self.transition(ConnectionState::Reconnecting) {
                    tracing::info!(expert = %self.name(), "retrying domain expert after earlier failure");
                    self.spawn_reconnect(token.child_token());
                }
                return;
            }
            ConnectionState::Disconnected
            | ConnectionState::Connecting
            | ConnectionState::Reconnecting => return,
        }

        let bound = self.inner.settings.call_timeout;
        let checked = tokio::time::timeout(bound, self.inner.transport.discover()).await;
        let now = self.inner.clock.utc();
        let failure = match checked {
            Ok(Ok(_)) => {
                self.record_health(ExpertHealthSnapshot::healthy(now));
                return;
            }
            Ok(Err(err)) => err.to_string(),
            Err(_) => format!("health check timed out after {bound:?}"),
        };

        tracing::warn!(expert = %self.name(), error = %failure, "domain expert health check failed");
        self.record_health(ExpertHealthSnapshot::unhealthy(now, failure));
        if self.transition(ConnectionState::Reconnecting) {
            self.spawn_reconnect(token.child_token());
        }
    }

    fn spawn_reconnect(&self, token: CancellationToken) {
        let client = self.clone();
        tokio::spawn(async move { client.reconnect(token).await });
    }

    async fn reconnect(&self, token: CancellationToken) {
        let settings = &self.inner.settings;
        let mut delay = settings.reconnect_base_delay;
        for attempt in 1..=settings.max_reconnect_attempts {
            tokio::select! {
                () = token.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }

            let outcome = {
                let _serialised = self.inner.connect_lock.lock().await;
                if self.is_closed() || self.state() != ConnectionState::Reconnecting {
                    return;
                }
                self.open_transport().await
            };
            match outcome {
                Ok(()) => {
                    self.transition(ConnectionState::Connected);
                    self.record_health(ExpertHealthSnapshot::healthy(self.inner.clock.utc()));
                    tracing::info!(expert = %self.name(), attempt, "domain expert reconnected");
                    return;
                }
                Err(err) => {
                    tracing::debug!(expert = %self.name(), attempt, error = %err, "reconnect attempt failed");
                }
            }
            delay = delay.saturating_mul(2).min(settings.reconnect_max_delay);
        }

        if !token.is_cancelled() && self.transition(ConnectionState::Error) {
            tracing::warn!(
                expert = %self.name(),
                attempts = settings.max_reconnect_attempts,
                "domain expert reconnect gave up"
            );
        }
    }
}
