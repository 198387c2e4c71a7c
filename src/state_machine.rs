use std::fmt::{self, Display};
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, info, warn};

use super::backoff::HybridBackoff;
use super::clock::Clock;
use super::instrument::Instrument;
use super::status::Status;

/// States of the state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize),
    serde(rename_all = "snake_case")
)]
pub enum State {
    /// A closed breaker is operating normally and allowing calls.
    Closed,
    /// An open breaker has tripped and refuses calls until its recovery timeout elapsed.
    Open,
    /// The recovery timeout elapsed, a single trial call decides between `Closed` and `Open`.
    HalfOpen,
}

/// A circuit breaker's state machine.
///
/// It is implemented via a finite state machine with three states: `Closed`, `Open` and
/// `HalfOpen`. The state machine does not know anything about the backend's state by itself,
/// but uses the information provided via `on_success` and `on_error`. Before communicating with
/// the backend, the permission to do so must be obtained via `try_acquire`.
///
/// Every failure increments one consecutive failure counter, any success clears it. When the
/// counter reaches `failure_threshold` the circuit opens for a recovery timeout taken from the
/// `HybridBackoff` schedule; the schedule advances with every failed trial call and restarts
/// after a recovery.
///
/// After the recovery timeout has elapsed, the next call attempt moves the circuit to
/// `HalfOpen` and is let through as the trial. Concurrent attempts are rejected until the trial
/// reports back.
#[derive(Debug)]
pub struct StateMachine<CLOCK, RNG, INSTRUMENT> {
    failure_threshold: u32,
    backoff: HybridBackoff,
    clock: CLOCK,
    rng: RNG,
    instrument: INSTRUMENT,
    state: State,
    failure_count: u32,
    consecutive_breaks: u32,
    last_failure: Option<Instant>,
    // Drawn once per open period.
    recovery_timeout: u64,
    trial_in_flight: bool,
}

impl State {
    /// Returns a string value for the state identifier.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Open => "open",
            State::Closed => "closed",
            State::HalfOpen => "half_open",
        }
    }
}

impl Display for State {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "{}", self.as_str())
    }
}

impl<CLOCK, RNG, INSTRUMENT> StateMachine<CLOCK, RNG, INSTRUMENT> {
    /// Current state.
    #[inline]
    pub fn state(&self) -> State {
        self.state
    }

    /// Consecutive failures since the last success.
    #[inline]
    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    /// Times the circuit opened since the last recovery.
    #[inline]
    pub fn consecutive_breaks(&self) -> u32 {
        self.consecutive_breaks
    }

    /// When the last failure was recorded.
    #[inline]
    pub fn last_failure(&self) -> Option<Instant> {
        self.last_failure
    }

    /// Configured failure threshold.
    #[inline]
    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    /// Configured recovery timeout schedule.
    #[inline]
    pub fn backoff(&self) -> &HybridBackoff {
        &self.backoff
    }

    /// Releases the trial slot of a call that never reported its outcome.
    pub fn on_abandoned(&mut self) {
        if self.trial_in_flight {
            debug!("trial call abandoned");
            self.trial_in_flight = false;
        }
    }
}

impl<CLOCK, RNG, INSTRUMENT> StateMachine<CLOCK, RNG, INSTRUMENT>
where
    CLOCK: Clock,
    RNG: Rng,
    INSTRUMENT: Instrument,
{
    /// Creates a closed state machine.
    pub fn new(
        failure_threshold: u32,
        backoff: HybridBackoff,
        clock: CLOCK,
        rng: RNG,
        instrument: INSTRUMENT,
    ) -> Self {
        StateMachine {
            failure_threshold,
            recovery_timeout: backoff.base_interval_minutes,
            backoff,
            clock,
            rng,
            instrument,
            state: State::Closed,
            failure_count: 0,
            consecutive_breaks: 0,
            last_failure: None,
            trial_in_flight: false,
        }
    }

    /// Reports whether a call would be admitted right now.
    ///
    /// An open circuit whose recovery timeout elapsed moves to `HalfOpen`. Unlike `try_acquire`
    /// this does not take the trial slot.
    pub fn is_call_permitted(&mut self) -> bool {
        self.admit().is_ok()
    }

    /// Requests permission to call the backend.
    ///
    /// Returns `Ok(true)` when the caller became the trial call of a `HalfOpen` circuit; its
    /// outcome must be reported via `on_success`, `on_error` or `on_abandoned`. Calls admitted
    /// while `Closed` get `Ok(false)` and report failures via `on_late_error` once the circuit
    /// is no longer closed. On rejection returns the time left until a trial is permitted; zero
    /// while another trial call is in flight.
    pub fn try_acquire(&mut self) -> Result<bool, Duration> {
        match self.admit() {
            Ok(()) => {
                let trial = self.state == State::HalfOpen;
                if trial {
                    self.trial_in_flight = true;
                }
                Ok(trial)
            }
            Err(retry_in) => {
                debug!(state = %self.state, ?retry_in, "call rejected");
                self.instrument.on_call_rejected();
                Err(retry_in)
            }
        }
    }

    /// Records a successful call.
    ///
    /// Any success is a full recovery: both counters are cleared and the circuit closes.
    pub fn on_success(&mut self) {
        self.recover();
    }

    /// Records a failed call.
    ///
    /// In `HalfOpen` the failure is taken as the outcome of the trial call.
    pub fn on_error(&mut self) {
        self.record_error(true);
    }

    /// Records a failed call that was not the trial call.
    ///
    /// Only the counters are updated while the circuit is open or half open: the open period,
    /// the schedule position and the trial slot stay as they are.
    pub fn on_late_error(&mut self) {
        self.record_error(false);
    }

    /// Returns the circuit breaker to its initial closed state, losing statistics.
    #[inline]
    pub fn reset(&mut self) {
        self.recover();
    }

    /// Computes the recovery timeout in minutes for the current number of circuit breaks.
    ///
    /// With jitter enabled every call draws a new value.
    pub fn recovery_timeout(&mut self) -> u64 {
        self.backoff
            .timeout_minutes(self.consecutive_breaks, &mut self.rng)
    }

    /// Takes a snapshot for monitoring.
    ///
    /// Never changes the state, an elapsed recovery timeout is only acted on by the next call.
    /// Only the random source advances, when a fresh timeout has to be drawn.
    pub fn status(&mut self) -> Status {
        let (recovery_timeout_minutes, retry_in_minutes) = match (self.state, self.last_failure) {
            (State::Open, Some(at)) => {
                let elapsed = self.clock.now().saturating_duration_since(at);
                let left = self.recovery_timeout as f64 - elapsed.as_secs_f64() / 60.0;
                (self.recovery_timeout, Some(left.max(0.0)))
            }
            (State::Open, None) => (self.recovery_timeout, None),
            _ => (self.recovery_timeout(), None),
        };

        Status {
            state: self.state,
            failure_count: self.failure_count,
            consecutive_breaks: self.consecutive_breaks,
            retry_phase: self.backoff.phase(self.consecutive_breaks),
            recovery_timeout_minutes,
            retry_in_minutes,
            config: self.backoff,
        }
    }

    fn record_error(&mut self, trial: bool) {
        self.failure_count = self.failure_count.saturating_add(1);
        self.last_failure = Some(self.clock.now());

        match self.state {
            // A call admitted before the circuit opened; the current open period stands.
            State::Open => {}
            State::HalfOpen if !trial => {
                debug!("late failure while the trial call is in flight");
            }
            State::HalfOpen if self.failure_count >= self.failure_threshold => {
                self.consecutive_breaks = self.consecutive_breaks.saturating_add(1);
                self.transit_to_open();
            }
            State::Closed if self.failure_count >= self.failure_threshold => {
                self.consecutive_breaks = 1;
                self.transit_to_open();
            }
            State::Closed | State::HalfOpen => {}
        }

        if trial {
            self.trial_in_flight = false;
        }
    }

    fn admit(&mut self) -> Result<(), Duration> {
        match self.state {
            State::Closed => Ok(()),
            State::HalfOpen if self.trial_in_flight => Err(Duration::ZERO),
            State::HalfOpen => Ok(()),
            State::Open => {
                let retry_in = self.retry_in();
                if retry_in.is_zero() {
                    self.transit_to_half_open();
                    Ok(())
                } else {
                    Err(retry_in)
                }
            }
        }
    }

    fn retry_in(&self) -> Duration {
        match self.last_failure {
            Some(at) => {
                let elapsed = self.clock.now().saturating_duration_since(at);
                minutes(self.recovery_timeout).saturating_sub(elapsed)
            }
            None => Duration::ZERO,
        }
    }

    fn recover(&mut self) {
        let was = self.state;

        self.failure_count = 0;
        self.consecutive_breaks = 0;
        self.trial_in_flight = false;
        self.state = State::Closed;

        if was != State::Closed {
            info!(from = %was, "circuit breaker closed");
            self.instrument.on_closed();
        }
    }

    #[inline]
    fn transit_to_half_open(&mut self) {
        debug!(
            consecutive_breaks = self.consecutive_breaks,
            "circuit breaker half open"
        );
        self.state = State::HalfOpen;
        self.trial_in_flight = false;
        self.instrument.on_half_open();
    }

    #[inline]
    fn transit_to_open(&mut self) {
        self.recovery_timeout = self.recovery_timeout();
        self.state = State::Open;

        warn!(
            failure_count = self.failure_count,
            consecutive_breaks = self.consecutive_breaks,
            recovery_timeout_minutes = self.recovery_timeout,
            "circuit breaker opened"
        );
        self.instrument.on_open(&minutes(self.recovery_timeout));
    }
}

#[inline]
fn minutes(minutes: u64) -> Duration {
    Duration::from_secs(minutes.saturating_mul(60))
}
