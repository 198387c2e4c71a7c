//! A circuit breaker stops calling an operation that keeps failing, giving the backend time to
//! recover instead of piling more load onto it.
//!
//! After `failure_threshold` consecutive failures the circuit opens and calls are rejected
//! without being made. Once the recovery timeout elapsed a single trial call is let through: a
//! success closes the circuit, a failure opens it again for a longer timeout. Timeouts follow a
//! hybrid schedule, a few flat waits of `base_interval_minutes` followed by geometrically
//! growing ones, optionally jittered. See [`HybridBackoff`].
//!
//! # Example
//!
//! ```
//! use tripwire::{Callable, CircuitBreaker, Error};
//!
//! fn dangerous_call(n: u32) -> Result<u32, String> {
//!     if n < 4 {
//!         return Err(format!("{} failed", n));
//!     }
//!     Ok(n)
//! }
//!
//! let circuit_breaker = CircuitBreaker::builder()
//!     .failure_threshold(2)
//!     .base_interval_minutes(1)
//!     .build();
//!
//! for n in 0..10 {
//!     match circuit_breaker.call(|| dangerous_call(n)) {
//!         Ok(_) => {}
//!         Err(Error::Inner(_)) => {}
//!         Err(Error::Rejected { retry_in }) => println!("open, retry in {:?}", retry_in),
//!     }
//! }
//!
//! let status = circuit_breaker.status();
//! assert_eq!(tripwire::State::Open, status.state);
//! assert_eq!("fixed-interval (attempt 1/3)", status.retry_phase.to_string());
//! ```
//!
//! See https://martinfowler.com/bliki/CircuitBreaker.html

#![deny(missing_debug_implementations)]
#![deny(missing_docs)]
#![cfg_attr(test, deny(warnings))]

mod circuit_breaker;
mod config;
mod error;
mod failure_predicate;
mod instrument;
mod state_machine;
mod status;

pub mod backoff;
pub mod clock;
#[cfg(feature = "futures-support")]
pub mod futures;

pub use self::backoff::{HybridBackoff, RetryPhase};
pub use self::circuit_breaker::{Callable, CircuitBreaker};
pub use self::clock::{Clock, MockClock, SystemClock};
pub use self::config::Config;
pub use self::error::Error;
pub use self::failure_predicate::{Any, FailurePredicate};
pub use self::instrument::{Instrument, NoopInstrument};
pub use self::state_machine::{State, StateMachine};
pub use self::status::Status;
