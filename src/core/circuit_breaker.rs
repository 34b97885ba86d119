//! # Circuit Breaker Implementation
//!
//! Per-upstream circuit breaker preventing cascade failures when a fronted
//! service degrades. State machine with three states:
//!
//! - **Closed**: calls pass through; completions are counted in a rolling
//!   window and the failure ratio is evaluated against a threshold.
//! - **Open**: calls short-circuit immediately without touching the network
//!   until a cool-down elapses.
//! - **HalfOpen**: exactly one probe call is admitted; success closes the
//!   circuit, failure re-opens it. Concurrent arrivals while the probe is in
//!   flight are treated as still-Open.
//!
//! Every call is bounded by a per-call deadline enforced with
//! `tokio::time::timeout`; an expired call is abandoned and recorded as a
//! failure. State lives behind one `parking_lot::Mutex` per breaker and is
//! mutated only by call outcomes — no background poller. Transitions are
//! published on a broadcast channel and logged for monitoring.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::core::config::CircuitBreakerSettings;
use crate::core::types::UpstreamResponse;

/// Classification hook for call results
///
/// A completed call may still count against the breaker (an upstream 5xx is
/// a failure even though the caller receives the response verbatim).
pub trait CallOutcome {
    fn counts_as_failure(&self) -> bool;
}

impl CallOutcome for UpstreamResponse {
    fn counts_as_failure(&self) -> bool {
        self.is_upstream_failure()
    }
}

/// Errors surfaced by [`CircuitBreaker::call`]
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// Short-circuited without any upstream traffic
    #[error("circuit open for service {service}")]
    Open { service: String },

    /// The call exceeded the per-call deadline and was abandoned
    #[error("call to {service} timed out after {timeout:?}")]
    Timeout { service: String, timeout: Duration },

    /// The underlying call failed (transport error), recorded and propagated
    #[error("call to service failed")]
    Inner(#[source] E),
}

/// Public state summary, used by the status surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// A state transition, broadcast to monitoring subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerTransition {
    pub service: String,
    pub from: BreakerState,
    pub to: BreakerState,
}

/// Rolling sample window for the Closed state
#[derive(Debug, Clone, Copy)]
struct WindowStats {
    started_at: Instant,
    requests: u32,
    failures: u32,
}

impl WindowStats {
    fn fresh(now: Instant) -> Self {
        Self { started_at: now, requests: 0, failures: 0 }
    }

    /// Roll the window over when its duration has elapsed
    fn roll(&mut self, now: Instant, window: Duration) {
        if now.duration_since(self.started_at) >= window {
            *self = Self::fresh(now);
        }
    }

    fn failure_ratio(&self) -> f64 {
        if self.requests == 0 {
            return 0.0;
        }
        f64::from(self.failures) / f64::from(self.requests)
    }
}

/// Internal state machine
#[derive(Debug, Clone, Copy)]
enum State {
    Closed { window: WindowStats },
    Open { opened_at: Instant },
    HalfOpen { probe_in_flight: bool },
}

/// Lifetime counters, lock-free so the status surface never contends with
/// the request path
#[derive(Debug, Default)]
pub struct BreakerMetrics {
    pub total_calls: AtomicU64,
    pub successful_calls: AtomicU64,
    pub failed_calls: AtomicU64,
    pub short_circuited: AtomicU64,
    pub times_opened: AtomicU64,
    pub times_closed: AtomicU64,
}

/// Immutable snapshot reported by the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub service: String,
    pub state: BreakerState,
    pub window_requests: u32,
    pub window_failures: u32,
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub short_circuited: u64,
    pub times_opened: u64,
    pub times_closed: u64,
}

/// Ticket handed out by `admit`, consumed by [`Admission::record`]
///
/// Dropping an unrecorded probe ticket releases the half-open slot: a
/// cancelled probe (client disconnect drops the call future) carries no
/// outcome, so the next arriving call becomes the probe instead of every
/// call short-circuiting forever.
struct Admission<'a> {
    breaker: &'a CircuitBreaker,
    is_probe: bool,
    recorded: bool,
}

impl Admission<'_> {
    fn record(mut self, succeeded: bool) {
        self.recorded = true;
        self.breaker.apply_outcome(self.is_probe, succeeded);
    }
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        if !self.recorded && self.is_probe {
            self.breaker.release_probe();
        }
    }
}

/// Per-upstream circuit breaker
///
/// Shared across request tasks as `Arc<CircuitBreaker>`; all interior state
/// is behind the mutex or atomics. A breaker's transitions depend only on
/// its own window, never on another upstream's health.
pub struct CircuitBreaker {
    service: String,
    settings: CircuitBreakerSettings,
    state: Mutex<State>,
    metrics: BreakerMetrics,
    transitions: broadcast::Sender<BreakerTransition>,
}

impl CircuitBreaker {
    pub fn new(service: impl Into<String>, settings: CircuitBreakerSettings) -> Self {
        let (transitions, _) = broadcast::channel(16);
        Self {
            service: service.into(),
            settings,
            state: Mutex::new(State::Closed { window: WindowStats::fresh(Instant::now()) }),
            metrics: BreakerMetrics::default(),
            transitions,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Subscribe to state transitions (monitoring only)
    pub fn subscribe(&self) -> broadcast::Receiver<BreakerTransition> {
        self.transitions.subscribe()
    }

    /// Execute `fut` under this breaker's policy
    ///
    /// Short-circuits when Open (or HalfOpen with the probe already claimed),
    /// bounds the call with the configured deadline, classifies the outcome,
    /// and updates the state machine. The result of a completed call is
    /// returned verbatim even when it counted as a failure.
    pub async fn call<T, E, F>(&self, fut: F) -> Result<T, BreakerError<E>>
    where
        T: CallOutcome,
        F: Future<Output = Result<T, E>>,
    {
        let admission = self.admit().ok_or_else(|| {
            self.metrics.short_circuited.fetch_add(1, Ordering::Relaxed);
            debug!(service = %self.service, "breaker short-circuited call");
            BreakerError::Open { service: self.service.clone() }
        })?;

        self.metrics.total_calls.fetch_add(1, Ordering::Relaxed);

        match tokio::time::timeout(self.settings.call_timeout, fut).await {
            Ok(Ok(outcome)) => {
                let succeeded = !outcome.counts_as_failure();
                admission.record(succeeded);
                Ok(outcome)
            }
            Ok(Err(err)) => {
                admission.record(false);
                Err(BreakerError::Inner(err))
            }
            Err(_) => {
                // The in-flight future is dropped here; its result is discarded.
                admission.record(false);
                warn!(
                    service = %self.service,
                    timeout_ms = self.settings.call_timeout.as_millis() as u64,
                    "upstream call abandoned after deadline"
                );
                Err(BreakerError::Timeout {
                    service: self.service.clone(),
                    timeout: self.settings.call_timeout,
                })
            }
        }
    }

    /// Decide whether a call may proceed, claiming the probe slot if Half-Open
    fn admit(&self) -> Option<Admission<'_>> {
        let mut state = self.state.lock();
        let now = Instant::now();

        match *state {
            State::Closed { .. } => {
                Some(Admission { breaker: self, is_probe: false, recorded: false })
            }
            State::Open { opened_at } => {
                if now.duration_since(opened_at) >= self.settings.cool_down {
                    // Cool-down elapsed: this call becomes the probe.
                    *state = State::HalfOpen { probe_in_flight: true };
                    self.emit(BreakerState::Open, BreakerState::HalfOpen);
                    Some(Admission { breaker: self, is_probe: true, recorded: false })
                } else {
                    None
                }
            }
            State::HalfOpen { probe_in_flight } => {
                if probe_in_flight {
                    None
                } else {
                    *state = State::HalfOpen { probe_in_flight: true };
                    Some(Admission { breaker: self, is_probe: true, recorded: false })
                }
            }
        }
    }

    /// Release a claimed probe slot whose call never produced an outcome
    fn release_probe(&self) {
        let mut state = self.state.lock();
        if let State::HalfOpen { probe_in_flight: true } = *state {
            *state = State::HalfOpen { probe_in_flight: false };
            debug!(service = %self.service, "probe cancelled, slot released");
        }
    }

    /// Apply a call outcome to the state machine
    fn apply_outcome(&self, is_probe: bool, succeeded: bool) {
        if succeeded {
            self.metrics.successful_calls.fetch_add(1, Ordering::Relaxed);
        } else {
            self.metrics.failed_calls.fetch_add(1, Ordering::Relaxed);
        }

        let mut state = self.state.lock();
        let now = Instant::now();

        match *state {
            State::Closed { mut window } => {
                window.roll(now, self.settings.window);
                window.requests += 1;
                if !succeeded {
                    window.failures += 1;
                }
                if window.requests >= self.settings.min_samples
                    && window.failure_ratio() > self.settings.failure_ratio
                {
                    *state = State::Open { opened_at: now };
                    self.metrics.times_opened.fetch_add(1, Ordering::Relaxed);
                    self.emit(BreakerState::Closed, BreakerState::Open);
                } else {
                    *state = State::Closed { window };
                }
            }
            State::HalfOpen { .. } => {
                if is_probe {
                    if succeeded {
                        *state = State::Closed { window: WindowStats::fresh(now) };
                        self.metrics.times_closed.fetch_add(1, Ordering::Relaxed);
                        self.emit(BreakerState::HalfOpen, BreakerState::Closed);
                    } else {
                        *state = State::Open { opened_at: now };
                        self.metrics.times_opened.fetch_add(1, Ordering::Relaxed);
                        self.emit(BreakerState::HalfOpen, BreakerState::Open);
                    }
                }
                // A non-probe outcome arriving in HalfOpen was admitted before
                // the circuit opened; it carries stale information, skip it.
            }
            State::Open { .. } => {
                // Straggler from a call admitted under an earlier state.
            }
        }
    }

    fn emit(&self, from: BreakerState, to: BreakerState) {
        match to {
            BreakerState::Open => {
                warn!(service = %self.service, ?from, "circuit opened");
            }
            BreakerState::HalfOpen => {
                info!(service = %self.service, "circuit half-open, admitting probe");
            }
            BreakerState::Closed => {
                info!(service = %self.service, "circuit closed");
            }
        }
        // Delivery is best-effort; nobody listening is fine.
        let _ = self.transitions.send(BreakerTransition {
            service: self.service.clone(),
            from,
            to,
        });
    }

    /// Current state summary
    pub fn state(&self) -> BreakerState {
        match *self.state.lock() {
            State::Closed { .. } => BreakerState::Closed,
            State::Open { .. } => BreakerState::Open,
            State::HalfOpen { .. } => BreakerState::HalfOpen,
        }
    }

    /// Snapshot for the status surface
    pub fn snapshot(&self) -> BreakerSnapshot {
        let (state, window_requests, window_failures) = {
            let state = self.state.lock();
            match *state {
                State::Closed { window } => (BreakerState::Closed, window.requests, window.failures),
                State::Open { .. } => (BreakerState::Open, 0, 0),
                State::HalfOpen { .. } => (BreakerState::HalfOpen, 0, 0),
            }
        };
        BreakerSnapshot {
            service: self.service.clone(),
            state,
            window_requests,
            window_failures,
            total_calls: self.metrics.total_calls.load(Ordering::Relaxed),
            successful_calls: self.metrics.successful_calls.load(Ordering::Relaxed),
            failed_calls: self.metrics.failed_calls.load(Ordering::Relaxed),
            short_circuited: self.metrics.short_circuited.load(Ordering::Relaxed),
            times_opened: self.metrics.times_opened.load(Ordering::Relaxed),
            times_closed: self.metrics.times_closed.load(Ordering::Relaxed),
        }
    }
}

/// The pair of breakers shared by every request task, one per upstream
#[derive(Clone)]
pub struct BreakerSet {
    pub identity: Arc<CircuitBreaker>,
    pub orders: Arc<CircuitBreaker>,
}

impl BreakerSet {
    pub fn new(settings: &CircuitBreakerSettings) -> Self {
        Self {
            identity: Arc::new(CircuitBreaker::new("identity", settings.clone())),
            orders: Arc::new(CircuitBreaker::new("orders", settings.clone())),
        }
    }

    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        vec![self.identity.snapshot(), self.orders.snapshot()]
    }
}
