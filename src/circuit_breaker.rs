use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::Rng;

use super::clock::{Clock, SystemClock};
use super::config::Config;
use super::error::Error;
use super::failure_predicate::{self, FailurePredicate};
use super::instrument::{Instrument, NoopInstrument};
use super::state_machine::{State, StateMachine};
use super::status::Status;

/// A thread safe circuit breaker.
///
/// Clones share the same state, so one breaker guarding one operation can be handed to every
/// thread calling that operation. The guarded call itself runs without holding the lock.
#[derive(Debug)]
pub struct CircuitBreaker<CLOCK = SystemClock, RNG = StdRng, INSTRUMENT = NoopInstrument> {
    state_machine: Arc<Mutex<StateMachine<CLOCK, RNG, INSTRUMENT>>>,
}

/// A circuit breaker's public interface.
pub trait Callable {
    /// Requests permission to call.
    ///
    /// It returns `true` if a call is allowed, or `false` if prohibited.
    fn is_call_permitted(&self) -> bool;

    /// Executes a given function within circuit breaker.
    ///
    /// Depending on function result value, the call will be recorded as success or failure.
    #[inline]
    fn call<F, E, R>(&self, f: F) -> Result<R, Error<E>>
    where
        F: FnOnce() -> Result<R, E>,
    {
        self.call_with(failure_predicate::Any, f)
    }

    /// Executes a given function within circuit breaker.
    ///
    /// Depending on function result value, the call will be recorded as success or failure.
    /// It also checks error by the provided predicate. If the predicate returns `true` for the
    /// error, the call is recorded as failure otherwise considered this error as a success.
    fn call_with<P, F, E, R>(&self, predicate: P, f: F) -> Result<R, Error<E>>
    where
        F: FnOnce() -> Result<R, E>,
        P: FailurePredicate<E>;
}

/// Admission of a single call. Dropping the trial call's permit unreported releases the trial
/// slot.
#[derive(Debug)]
pub(crate) struct Permit<CLOCK, RNG, INSTRUMENT> {
    state_machine: Arc<Mutex<StateMachine<CLOCK, RNG, INSTRUMENT>>>,
    trial: bool,
    pending: bool,
}

impl CircuitBreaker<(), (), ()> {
    /// Returns a circuit breaker's builder.
    pub fn builder() -> Config<SystemClock, StdRng, NoopInstrument> {
        Config::new()
    }
}

impl Default for CircuitBreaker<SystemClock, StdRng, NoopInstrument> {
    fn default() -> Self {
        CircuitBreaker::builder().build()
    }
}

impl<CLOCK, RNG, INSTRUMENT> CircuitBreaker<CLOCK, RNG, INSTRUMENT>
where
    CLOCK: Clock,
    RNG: Rng,
    INSTRUMENT: Instrument,
{
    /// Creates a new circuit breaker using given state machine.
    pub(crate) fn new(state_machine: StateMachine<CLOCK, RNG, INSTRUMENT>) -> Self {
        Self {
            state_machine: Arc::new(Mutex::new(state_machine)),
        }
    }

    /// Current state.
    pub fn state(&self) -> State {
        self.state_machine.lock().state()
    }

    /// Recovery timeout in minutes for the current number of circuit breaks.
    pub fn recovery_timeout(&self) -> u64 {
        self.state_machine.lock().recovery_timeout()
    }

    /// Takes a snapshot for monitoring.
    pub fn status(&self) -> Status {
        self.state_machine.lock().status()
    }

    /// Forces the breaker back to the closed state.
    pub fn reset(&self) {
        self.state_machine.lock().reset();
    }

    pub(crate) fn acquire(&self) -> Result<Permit<CLOCK, RNG, INSTRUMENT>, Duration> {
        let trial = self.state_machine.lock().try_acquire()?;
        Ok(Permit {
            state_machine: self.state_machine.clone(),
            trial,
            pending: true,
        })
    }
}

impl<CLOCK, RNG, INSTRUMENT> Callable for CircuitBreaker<CLOCK, RNG, INSTRUMENT>
where
    CLOCK: Clock,
    RNG: Rng,
    INSTRUMENT: Instrument,
{
    #[inline]
    fn is_call_permitted(&self) -> bool {
        self.state_machine.lock().is_call_permitted()
    }

    fn call_with<P, F, E, R>(&self, predicate: P, f: F) -> Result<R, Error<E>>
    where
        F: FnOnce() -> Result<R, E>,
        P: FailurePredicate<E>,
    {
        let permit = self
            .acquire()
            .map_err(|retry_in| Error::Rejected { retry_in })?;

        match f() {
            Ok(ok) => {
                permit.success();
                Ok(ok)
            }
            Err(err) => {
                permit.report(predicate.is_err(&err));
                Err(Error::Inner(err))
            }
        }
    }
}

impl<CLOCK, RNG, INSTRUMENT> Clone for CircuitBreaker<CLOCK, RNG, INSTRUMENT> {
    fn clone(&self) -> Self {
        Self {
            state_machine: self.state_machine.clone(),
        }
    }
}

impl<CLOCK, RNG, INSTRUMENT> Permit<CLOCK, RNG, INSTRUMENT>
where
    CLOCK: Clock,
    RNG: Rng,
    INSTRUMENT: Instrument,
{
    pub(crate) fn success(self) {
        self.report(false)
    }

    pub(crate) fn report(mut self, is_failure: bool) {
        self.pending = false;

        let mut state_machine = self.state_machine.lock();
        match (is_failure, self.trial) {
            (false, _) => state_machine.on_success(),
            (true, true) => state_machine.on_error(),
            (true, false) => state_machine.on_late_error(),
        }
    }
}

impl<CLOCK, RNG, INSTRUMENT> Drop for Permit<CLOCK, RNG, INSTRUMENT> {
    fn drop(&mut self) {
        if self.pending && self.trial {
            self.state_machine.lock().on_abandoned();
        }
    }
}
