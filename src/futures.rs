//! Futures aware circuit breaker.
//!
//! # Example
//!
//! ```
//! use tripwire::{CircuitBreaker, Error};
//!
//! async fn fetch_quote(symbol: &str) -> Result<u64, std::io::Error> {
//!     Ok(symbol.len() as u64)
//! }
//!
//! # futures::executor::block_on(async {
//! let circuit_breaker = CircuitBreaker::default();
//!
//! match circuit_breaker.call_async(fetch_quote("ACME")).await {
//!     Ok(quote) => assert_eq!(4, quote),
//!     Err(Error::Inner(err)) => eprintln!("fetch failed: {}", err),
//!     Err(Error::Rejected { retry_in }) => eprintln!("backend down, retry in {:?}", retry_in),
//! }
//! # });
//! ```

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use pin_project_lite::pin_project;
use rand::Rng;

use super::circuit_breaker::{CircuitBreaker, Permit};
use super::clock::Clock;
use super::error::Error;
use super::failure_predicate::{self, FailurePredicate};
use super::instrument::Instrument;

impl<CLOCK, RNG, INSTRUMENT> CircuitBreaker<CLOCK, RNG, INSTRUMENT>
where
    CLOCK: Clock,
    RNG: Rng,
    INSTRUMENT: Instrument,
{
    /// Executes a given future within circuit breaker.
    ///
    /// Permission is requested on the first poll. Depending on future result value, the call
    /// will be recorded as success or failure.
    #[inline]
    pub fn call_async<F>(
        &self,
        future: F,
    ) -> ResponseFuture<F, failure_predicate::Any, CLOCK, RNG, INSTRUMENT> {
        self.call_async_with(failure_predicate::Any, future)
    }

    /// Executes a given future within circuit breaker, classifying errors by `predicate`.
    ///
    /// An error for which the predicate returns `false` is recorded as a success.
    pub fn call_async_with<F, P>(
        &self,
        predicate: P,
        future: F,
    ) -> ResponseFuture<F, P, CLOCK, RNG, INSTRUMENT> {
        ResponseFuture {
            future,
            circuit_breaker: self.clone(),
            predicate,
            permit: None,
            asked: false,
        }
    }
}

pin_project! {
    /// A circuit breaker's future.
    ///
    /// Dropping it while the guarded future is still running gives up the call; a trial call
    /// abandoned this way frees the trial slot for the next caller.
    #[allow(missing_debug_implementations)]
    pub struct ResponseFuture<FUTURE, PREDICATE, CLOCK, RNG, INSTRUMENT> {
        #[pin]
        future: FUTURE,
        circuit_breaker: CircuitBreaker<CLOCK, RNG, INSTRUMENT>,
        predicate: PREDICATE,
        permit: Option<Permit<CLOCK, RNG, INSTRUMENT>>,
        asked: bool,
    }
}

impl<FUTURE, T, E, PREDICATE, CLOCK, RNG, INSTRUMENT> Future
    for ResponseFuture<FUTURE, PREDICATE, CLOCK, RNG, INSTRUMENT>
where
    FUTURE: Future<Output = Result<T, E>>,
    PREDICATE: FailurePredicate<E>,
    CLOCK: Clock,
    RNG: Rng,
    INSTRUMENT: Instrument,
{
    type Output = Result<T, Error<E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        if !*this.asked {
            *this.asked = true;
            match this.circuit_breaker.acquire() {
                Ok(permit) => *this.permit = Some(permit),
                Err(retry_in) => return Poll::Ready(Err(Error::Rejected { retry_in })),
            }
        }

        match this.future.poll(cx) {
            Poll::Ready(Ok(ok)) => {
                if let Some(permit) = this.permit.take() {
                    permit.success();
                }
                Poll::Ready(Ok(ok))
            }
            Poll::Ready(Err(err)) => {
                if let Some(permit) = this.permit.take() {
                    permit.report(this.predicate.is_err(&err));
                }
                Poll::Ready(Err(Error::Inner(err)))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
