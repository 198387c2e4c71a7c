use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::backoff::HybridBackoff;
use super::circuit_breaker::CircuitBreaker;
use super::clock::{Clock, SystemClock};
use super::instrument::{Instrument, NoopInstrument};
use super::state_machine::StateMachine;

/// A `CircuitBreaker`'s configuration.
///
/// Defaults: open after 5 consecutive failures, wait 5 minutes for the first 3 circuit breaks,
/// then grow the wait for up to 5 exponential steps, with jitter.
#[derive(Debug)]
pub struct Config<CLOCK, RNG, INSTRUMENT> {
    pub(crate) failure_threshold: u32,
    pub(crate) backoff: HybridBackoff,
    pub(crate) clock: CLOCK,
    pub(crate) rng: RNG,
    pub(crate) instrument: INSTRUMENT,
}

impl Config<(), (), ()> {
    /// Creates a new circuit breaker's default configuration.
    pub fn new() -> Config<SystemClock, StdRng, NoopInstrument> {
        Config {
            failure_threshold: 5,
            backoff: HybridBackoff::default(),
            clock: SystemClock,
            rng: StdRng::from_entropy(),
            instrument: NoopInstrument,
        }
    }
}

impl<CLOCK, RNG, INSTRUMENT> Config<CLOCK, RNG, INSTRUMENT> {
    /// Consecutive failures which open the circuit.
    pub fn failure_threshold(mut self, failure_threshold: u32) -> Self {
        self.failure_threshold = failure_threshold;
        self
    }

    /// The flat recovery wait, also the growth factor of the exponential phase.
    pub fn base_interval_minutes(mut self, minutes: u64) -> Self {
        self.backoff.base_interval_minutes = minutes;
        self
    }

    /// How many circuit breaks wait the flat base interval before the wait starts growing.
    pub fn fixed_interval_retries(mut self, retries: u32) -> Self {
        self.backoff.fixed_interval_retries = retries;
        self
    }

    /// Cap on exponential growth steps.
    pub fn max_exponential_retries(mut self, retries: u32) -> Self {
        self.backoff.max_exponential_retries = retries;
        self
    }

    /// Enables or disables jitter of the recovery timeout.
    pub fn jitter(mut self, enabled: bool) -> Self {
        self.backoff.jitter_enabled = enabled;
        self
    }

    /// Replaces the whole recovery timeout schedule.
    pub fn backoff(mut self, backoff: HybridBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Configures the time source.
    pub fn clock<T>(self, clock: T) -> Config<T, RNG, INSTRUMENT>
    where
        T: Clock,
    {
        Config {
            failure_threshold: self.failure_threshold,
            backoff: self.backoff,
            clock,
            rng: self.rng,
            instrument: self.instrument,
        }
    }

    /// Configures the random source used for jitter.
    pub fn rng<T>(self, rng: T) -> Config<CLOCK, T, INSTRUMENT>
    where
        T: Rng,
    {
        Config {
            failure_threshold: self.failure_threshold,
            backoff: self.backoff,
            clock: self.clock,
            rng,
            instrument: self.instrument,
        }
    }

    /// Configures `Instrument` for a circuit breaker.
    pub fn instrument<T>(self, instrument: T) -> Config<CLOCK, RNG, T>
    where
        T: Instrument,
    {
        Config {
            failure_threshold: self.failure_threshold,
            backoff: self.backoff,
            clock: self.clock,
            rng: self.rng,
            instrument,
        }
    }

    /// Builds a bare state machine, for callers doing their own locking.
    pub fn state_machine(self) -> StateMachine<CLOCK, RNG, INSTRUMENT>
    where
        CLOCK: Clock,
        RNG: Rng,
        INSTRUMENT: Instrument,
    {
        StateMachine::new(
            self.failure_threshold,
            self.backoff,
            self.clock,
            self.rng,
            self.instrument,
        )
    }

    /// Builds a new circuit breaker instance.
    pub fn build(self) -> CircuitBreaker<CLOCK, RNG, INSTRUMENT>
    where
        CLOCK: Clock,
        RNG: Rng,
        INSTRUMENT: Instrument,
    {
        CircuitBreaker::new(self.state_machine())
    }
}
