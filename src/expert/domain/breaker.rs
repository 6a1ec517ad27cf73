//! Circuit breaker gating outbound calls to a single domain expert.
//!
//! The breaker is a standalone state machine with no network knowledge. The
//! owning client asks [`CircuitBreaker::allow`] before each call and reports
//! the outcome through [`CircuitBreaker::record_success`] or
//! [`CircuitBreaker::record_failure`]. Time is read from the injected clock so
//! cool-down behaviour is deterministic under test.

use super::ParseCircuitStateError;
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Default number of consecutive failures that opens the breaker.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
/// Default cool-down before an open breaker admits a trial call.
pub const DEFAULT_COOL_DOWN: Duration = Duration::from_secs(30);
/// Default rolling window for failure-rate tracking.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);
/// Default failure percentage within the window that opens the breaker.
pub const DEFAULT_FAILURE_RATE_PERCENT: u8 = 50;
/// Default number of windowed outcomes required before the rate applies.
pub const DEFAULT_MINIMUM_CALLS: usize = 10;

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls flow normally.
    Closed,
    /// Calls are rejected without a network attempt.
    Open,
    /// A single trial call decides the next state.
    HalfOpen,
}

impl CircuitState {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for CircuitState {
    type Error = ParseCircuitStateError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "closed" => Ok(Self::Closed),
            "open" => Ok(Self::Open),
            "half_open" | "half-open" => Ok(Self::HalfOpen),
            _ => Err(ParseCircuitStateError(value.to_owned())),
        }
    }
}

/// Tuning parameters for a [`CircuitBreaker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerSettings {
    /// Consecutive failures that open a closed breaker.
    pub failure_threshold: u32,
    /// Time an open breaker waits before admitting a trial call.
    pub cool_down: Duration,
    /// Rolling window used for failure-rate tracking.
    pub window: Duration,
    /// Failure percentage within the window that opens the breaker; `0`
    /// disables rate-based opening.
    pub failure_rate_percent: u8,
    /// Minimum windowed outcomes before the failure rate is evaluated.
    pub minimum_calls: usize,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            cool_down: DEFAULT_COOL_DOWN,
            window: DEFAULT_WINDOW,
            failure_rate_percent: DEFAULT_FAILURE_RATE_PERCENT,
            minimum_calls: DEFAULT_MINIMUM_CALLS,
        }
    }
}

/// Point-in-time view of breaker counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerSnapshot {
    /// Current state.
    pub state: CircuitState,
    /// Consecutive failures observed while closed.
    pub failure_count: u32,
    /// When the breaker last opened.
    pub opened_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<DateTime<Utc>>,
    trial_in_flight: bool,
    trial_generation: u64,
    outcomes: VecDeque<(DateTime<Utc>, bool)>,
}

impl BreakerInner {
    const fn closed(trial_generation: u64) -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            trial_in_flight: false,
            trial_generation,
            outcomes: VecDeque::new(),
        }
    }

    fn close(&mut self) {
        *self = Self::closed(self.trial_generation);
    }

    const fn admit_trial(&mut self) -> Admission {
        self.trial_in_flight = true;
        self.trial_generation = self.trial_generation.wrapping_add(1);
        Admission {
            trial: Some(self.trial_generation),
        }
    }
}

/// Permission to attempt one call, returned by [`CircuitBreaker::admit`].
///
/// A half-open breaker admits a single trial call. When the trial is dropped
/// before its outcome is recorded, hand the admission back through
/// [`CircuitBreaker::abandon`] so another trial can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    trial: Option<u64>,
}

impl Admission {
    /// Returns whether this admission holds the half-open trial slot.
    #[must_use]
    pub const fn is_trial(self) -> bool {
        self.trial.is_some()
    }
}

/// Failure-rate tracker gating whether new calls are attempted.
///
/// All counters live behind one mutex owned by the breaker; readers use
/// [`CircuitBreaker::state`] or [`CircuitBreaker::snapshot`].
#[derive(Debug)]
pub struct CircuitBreaker {
    settings: BreakerSettings,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Creates a closed breaker.
    #[must_use]
    pub const fn new(settings: BreakerSettings) -> Self {
        Self {
            settings,
            inner: Mutex::new(BreakerInner::closed(0)),
        }
    }

    /// Returns the breaker settings.
    #[must_use]
    pub const fn settings(&self) -> &BreakerSettings {
        &self.settings
    }

    /// Decides whether a call may be attempted now.
    ///
    /// An open breaker whose cool-down has elapsed moves to half-open and
    /// admits exactly one trial call; further calls are refused until the
    /// trial outcome is recorded.
    pub fn allow(&self, clock: &impl Clock) -> bool {
        self.admit(clock).is_some()
    }

    /// Admits a call, or returns `None` when the breaker refuses it.
    ///
    /// Behaves like [`Self::allow`] but returns the [`Admission`] needed to
    /// release an abandoned trial.
    pub fn admit(&self, clock: &impl Clock) -> Option<Admission> {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => Some(Admission { trial: None }),
            CircuitState::Open => {
                let now = clock.utc();
                let cooled_down = inner.opened_at.is_none_or(|opened_at| {
                    (now - opened_at)
                        .to_std()
                        .is_ok_and(|elapsed| elapsed >= self.settings.cool_down)
                });
                if !cooled_down {
                    return None;
                }
                inner.state = CircuitState::HalfOpen;
                tracing::debug!("circuit breaker half-open, admitting trial call");
                Some(inner.admit_trial())
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    return None;
                }
                Some(inner.admit_trial())
            }
        }
    }

    /// Releases the trial slot held by an admission whose call ended without
    /// an outcome.
    ///
    /// Admissions that are not the current trial are ignored.
    pub fn abandon(&self, admission: Admission) {
        let Some(trial) = admission.trial else {
            return;
        };
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen
            && inner.trial_in_flight
            && inner.trial_generation == trial
        {
            inner.trial_in_flight = false;
            tracing::debug!("trial call abandoned, half-open slot released");
        }
    }

    /// Records a successful call.
    pub fn record_success(&self, clock: &impl Clock) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
                self.push_outcome(&mut inner, clock.utc(), true);
            }
            CircuitState::HalfOpen => {
                inner.close();
                tracing::info!("circuit breaker closed after successful trial call");
            }
            // A call admitted before the breaker opened; its outcome no
            // longer matters.
            CircuitState::Open => {}
        }
    }

    /// Records a failed or timed-out call.
    pub fn record_failure(&self, clock: &impl Clock) {
        let now = clock.utc();
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
                self.push_outcome(&mut inner, now, false);
                if inner.consecutive_failures >= self.settings.failure_threshold
                    || self.rate_exceeded(&inner)
                {
                    Self::open(&mut inner, now);
                    tracing::warn!(
                        failures = inner.consecutive_failures,
                        "circuit breaker opened"
                    );
                }
            }
            CircuitState::HalfOpen => {
                Self::open(&mut inner, now);
                tracing::warn!("circuit breaker reopened after failed trial call");
            }
            CircuitState::Open => {}
        }
    }

    /// Returns the stored state without advancing the cool-down.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Returns a snapshot of the breaker counters.
    #[must_use]
    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            state: inner.state,
            failure_count: inner.consecutive_failures,
            opened_at: inner.opened_at,
        }
    }

    /// Forces the breaker back to closed and clears all counters.
    pub fn reset(&self) {
        self.lock().close();
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open(inner: &mut BreakerInner, now: DateTime<Utc>) {
        inner.state = CircuitState::Open;
        inner.opened_at = Some(now);
        inner.trial_in_flight = false;
    }

    fn push_outcome(&self, inner: &mut BreakerInner, now: DateTime<Utc>, success: bool) {
        inner.outcomes.push_back((now, success));
        let window = self.settings.window;
        inner.outcomes.retain(|(recorded_at, _)| {
            (now - *recorded_at)
                .to_std()
                .map_or(true, |age| age <= window)
        });
    }

    fn rate_exceeded(&self, inner: &BreakerInner) -> bool {
        let percent = usize::from(self.settings.failure_rate_percent);
        let total = inner.outcomes.len();
        if percent == 0 || total < self.settings.minimum_calls.max(1) {
            return false;
        }
        let failures = inner
            .outcomes
            .iter()
            .filter(|(_, success)| !success)
            .count();
        failures.saturating_mul(100) >= total.saturating_mul(percent)
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(BreakerSettings::default())
    }
}
