//! Circuit breaker guarding calls to the upstream source.
//!
//! # State Transitions
//! ```text
//! Closed → Open: failures among the last `window_size` calls reach `failure_threshold`
//! Open → HalfOpen: `cooldown` elapsed since the circuit opened
//! HalfOpen → Closed: a trial call succeeds
//! HalfOpen → Open: a trial call fails (cooldown restarts)
//! ```
//!
//! Only transient failures count. A client error means upstream answered,
//! so it is recorded as a healthy outcome and returned to the caller
//! without engaging the fallback.

use crate::core::config::BreakerConfig;
use crate::core::error::{FetchError, GatewayError};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// How a guarded call was answered.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// The wrapped operation succeeded.
    Primary(T),
    /// The fallback answered instead.
    Degraded(T),
}

impl<T> Outcome<T> {
    pub fn into_inner(self) -> T {
        match self {
            Outcome::Primary(value) | Outcome::Degraded(value) => value,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Outcome::Degraded(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Permit {
    Call,
    Trial,
}

/// An admitted call. A trial dropped before its outcome is recorded (the
/// caller's future was cancelled) gives its slot back.
struct Admission<'a> {
    breaker: &'a CircuitBreaker,
    permit: Permit,
    settled: bool,
}

impl Admission<'_> {
    fn settle(mut self, failed: bool) {
        self.settled = true;
        self.breaker.record(self.permit, failed);
    }
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        if !self.settled && self.permit == Permit::Trial {
            self.breaker.release_trial();
        }
    }
}

struct Inner {
    state: BreakerState,
    /// Most recent outcomes while closed, `true` for a failure.
    outcomes: VecDeque<bool>,
    transitioned_at: Instant,
    trials_started: u32,
}

pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: &str, config: BreakerConfig) -> Self {
        Self {
            name: name.to_string(),
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                outcomes: VecDeque::with_capacity(config.window_size as usize),
                transitioned_at: Instant::now(),
                trials_started: 0,
            }),
        }
    }

    /// Current state, with an elapsed cooldown already applied.
    pub fn state(&self) -> BreakerState {
        let mut inner = self.lock();
        self.refresh(&mut inner);
        inner.state
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("circuit breaker mutex poisoned")
    }

    fn transition(&self, inner: &mut Inner, to: BreakerState) {
        if inner.state == to {
            return;
        }
        match to {
            BreakerState::Open => warn!(circuit = %self.name, from = ?inner.state, "Circuit opened"),
            _ => info!(circuit = %self.name, from = ?inner.state, to = ?to, "Circuit state changed"),
        }
        inner.state = to;
        inner.transitioned_at = Instant::now();
        inner.trials_started = 0;
        if to == BreakerState::Closed {
            inner.outcomes.clear();
        }
    }

    fn refresh(&self, inner: &mut Inner) {
        if inner.state == BreakerState::Open
            && inner.transitioned_at.elapsed() >= self.config.cooldown()
        {
            self.transition(inner, BreakerState::HalfOpen);
        }
    }

    fn acquire(&self) -> Option<Admission<'_>> {
        let mut inner = self.lock();
        self.refresh(&mut inner);
        let permit = match inner.state {
            BreakerState::Closed => Permit::Call,
            BreakerState::Open => return None,
            BreakerState::HalfOpen if inner.trials_started < self.config.half_open_trials => {
                inner.trials_started += 1;
                Permit::Trial
            }
            BreakerState::HalfOpen => return None,
        };
        Some(Admission {
            breaker: self,
            permit,
            settled: false,
        })
    }

    fn release_trial(&self) {
        let mut inner = self.lock();
        if inner.state == BreakerState::HalfOpen && inner.trials_started > 0 {
            inner.trials_started -= 1;
            debug!(circuit = %self.name, "Abandoned trial released");
        }
    }

    fn record(&self, permit: Permit, failed: bool) {
        let mut inner = self.lock();
        match (permit, inner.state) {
            (Permit::Call, BreakerState::Closed) => {
                inner.outcomes.push_back(failed);
                while inner.outcomes.len() > self.config.window_size as usize {
                    inner.outcomes.pop_front();
                }
                let failures = inner.outcomes.iter().filter(|f| **f).count() as u32;
                if failures >= self.config.failure_threshold {
                    self.transition(&mut inner, BreakerState::Open);
                }
            }
            (Permit::Trial, BreakerState::HalfOpen) => {
                let to = if failed {
                    BreakerState::Open
                } else {
                    BreakerState::Closed
                };
                self.transition(&mut inner, to);
            }
            // The circuit moved on while this call was in flight
            _ => debug!(circuit = %self.name, ?permit, "Ignoring stale outcome"),
        }
    }

    /// Runs `operation` if the circuit admits it, otherwise (or on a
    /// transient failure) answers with `fallback`, which receives the cause.
    /// Only client errors are returned as `Err`.
    pub async fn execute<T, Op, OpFut, Fb, FbFut>(
        &self,
        operation: Op,
        fallback: Fb,
    ) -> Result<Outcome<T>, FetchError>
    where
        Op: FnOnce() -> OpFut,
        OpFut: Future<Output = Result<T, FetchError>>,
        Fb: FnOnce(GatewayError) -> FbFut,
        FbFut: Future<Output = T>,
    {
        let Some(admission) = self.acquire() else {
            debug!(circuit = %self.name, "Call not permitted, serving fallback");
            let cause = GatewayError::CircuitOpen {
                circuit: self.name.clone(),
            };
            return Ok(Outcome::Degraded(fallback(cause).await));
        };

        match operation().await {
            Ok(value) => {
                admission.settle(false);
                Ok(Outcome::Primary(value))
            }
            Err(err) if err.is_transient() => {
                admission.settle(true);
                Ok(Outcome::Degraded(fallback(err.into()).await))
            }
            Err(err) => {
                admission.settle(false);
                Err(err)
            }
        }
    }
}
