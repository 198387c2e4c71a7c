use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rand::SeedableRng;
use rand_xorshift::XorShiftRng;
use tripwire::{Callable, CircuitBreaker, Error, MockClock, NoopInstrument, State};

#[derive(Debug, PartialEq)]
struct QuoteError(&'static str);

impl fmt::Display for QuoteError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "quote service: {}", self.0)
    }
}

impl std::error::Error for QuoteError {}

#[derive(Debug, PartialEq)]
struct Quote {
    symbol: String,
    cents: Vec<u64>,
}

#[test]
fn default_breaker() {
    let circuit_breaker = CircuitBreaker::default();
    let status = circuit_breaker.status();

    assert_eq!(State::Closed, status.state);
    assert_eq!("closed", status.retry_phase.to_string());
    assert_eq!(None, status.retry_in_minutes);
    assert_eq!(5, status.config.base_interval_minutes);
    assert_eq!(3, status.config.fixed_interval_retries);
    assert_eq!(5, status.config.max_exponential_retries);
    assert!(status.config.jitter_enabled);
    // Jittered around the 5 minute base.
    assert!((4..=6).contains(&status.recovery_timeout_minutes));
}

#[test]
fn results_and_errors_pass_through() {
    let circuit_breaker = new_circuit_breaker(5, MockClock::new());

    let quote = circuit_breaker
        .call(|| {
            Ok::<_, QuoteError>(Quote {
                symbol: "ACME".to_owned(),
                cents: vec![1, 2, 3],
            })
        })
        .unwrap();
    assert_eq!(
        Quote {
            symbol: "ACME".to_owned(),
            cents: vec![1, 2, 3],
        },
        quote
    );

    let add = |x: u64, y: u64| Ok::<_, QuoteError>(x + y);
    assert_eq!(Ok(8), circuit_breaker.call(|| add(5, 3)));

    let err = circuit_breaker
        .call(|| Err::<Quote, _>(QuoteError("maintenance")))
        .unwrap_err();
    assert_eq!("quote service: maintenance", err.to_string());
    assert_eq!(Some(QuoteError("maintenance")), err.into_inner());
}

#[test]
fn opens_after_threshold_and_rejects() {
    let clock = MockClock::new();
    let circuit_breaker = new_circuit_breaker(2, clock.clone());
    let calls = AtomicUsize::new(0);
    let failing = || {
        calls.fetch_add(1, Ordering::SeqCst);
        Err::<(), _>(QuoteError("down"))
    };

    assert!(matches!(circuit_breaker.call(failing), Err(Error::Inner(_))));
    assert_eq!(State::Closed, circuit_breaker.state());
    assert_eq!(1, circuit_breaker.status().failure_count);

    assert!(matches!(circuit_breaker.call(failing), Err(Error::Inner(_))));
    assert_eq!(State::Open, circuit_breaker.state());
    let status = circuit_breaker.status();
    assert_eq!(2, status.failure_count);
    assert_eq!(1, status.consecutive_breaks);

    clock.advance(Duration::from_secs(120));
    let err = circuit_breaker.call(failing).unwrap_err();
    assert!(err.is_rejected());
    assert_eq!(Some(3.0), err.retry_in_minutes());
    assert_eq!(
        "circuit breaker is open, next retry in 3.0 minutes",
        err.to_string()
    );
    assert_eq!(2, calls.load(Ordering::SeqCst));
}

#[test]
fn partial_failures_then_success() {
    let circuit_breaker = new_circuit_breaker(3, MockClock::new());

    for _ in 0..2 {
        circuit_breaker.call(|| Err::<(), _>(QuoteError("flaky"))).unwrap_err();
    }
    assert_eq!(State::Closed, circuit_breaker.state());
    assert_eq!(2, circuit_breaker.status().failure_count);

    assert_eq!(Ok("ok"), circuit_breaker.call(|| Ok::<_, QuoteError>("ok")));
    assert_eq!(0, circuit_breaker.status().failure_count);
}

#[test]
fn failed_trial_reopens_with_longer_timeout() {
    let clock = MockClock::new();
    let circuit_breaker = new_circuit_breaker(1, clock.clone());

    circuit_breaker.call(|| Err::<(), _>(QuoteError("down"))).unwrap_err();
    assert_eq!(5, circuit_breaker.status().recovery_timeout_minutes);

    // 1 fixed interval retry, then 5 * 5 minutes.
    clock.advance(Duration::from_secs(300));
    circuit_breaker.call(|| Err::<(), _>(QuoteError("still down"))).unwrap_err();
    let status = circuit_breaker.status();
    assert_eq!(State::Open, status.state);
    assert_eq!(2, status.consecutive_breaks);
    assert_eq!(25, status.recovery_timeout_minutes);
    assert_eq!("exponential-interval (attempt 1/2)", status.retry_phase.to_string());

    clock.advance(Duration::from_secs(24 * 60));
    assert!(circuit_breaker.call(|| Ok::<_, QuoteError>(())).unwrap_err().is_rejected());

    clock.advance(Duration::from_secs(60));
    assert_eq!(Ok(()), circuit_breaker.call(|| Ok::<_, QuoteError>(())));
    assert_eq!(State::Closed, circuit_breaker.state());
}

#[test]
fn alternating_outcomes() {
    let circuit_breaker = new_circuit_breaker(5, MockClock::new());

    let results = (0..50)
        .map(|i| {
            circuit_breaker.call(|| {
                if i % 3 == 0 {
                    Err(QuoteError("every third call"))
                } else {
                    Ok("success")
                }
            })
        })
        .collect::<Vec<_>>();

    assert!(results.iter().any(|r| r.is_ok()));
    assert!(results.iter().any(|r| matches!(r, Err(Error::Inner(_)))));
    assert!(results.iter().all(|r| !matches!(r, Err(Error::Rejected { .. }))));
    assert_eq!(State::Closed, circuit_breaker.state());
}

#[test]
fn shared_between_threads() {
    let clock = MockClock::new();
    let circuit_breaker = new_circuit_breaker(3, clock.clone());
    let calls = Arc::new(AtomicUsize::new(0));

    let handles = (0..8)
        .map(|_| {
            let circuit_breaker = circuit_breaker.clone();
            let calls = calls.clone();
            thread::spawn(move || {
                for _ in 0..100 {
                    let _ = circuit_breaker.call(|| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err::<(), _>(QuoteError("down"))
                    });
                }
            })
        })
        .collect::<Vec<_>>();

    for handle in handles {
        handle.join().unwrap();
    }

    // Only calls admitted before the circuit opened reached the backend.
    assert!(calls.load(Ordering::SeqCst) < 8 * 100);
    assert_eq!(State::Open, circuit_breaker.state());
    assert_eq!(1, circuit_breaker.status().consecutive_breaks);
}

#[test]
fn breakers_are_independent() {
    let clock = MockClock::new();
    let quotes = new_circuit_breaker(1, clock.clone());
    let orders = new_circuit_breaker(1, clock);

    quotes.call(|| Err::<(), _>(QuoteError("down"))).unwrap_err();

    assert_eq!(State::Open, quotes.state());
    assert_eq!(State::Closed, orders.state());
    assert_eq!(Ok(1), orders.call(|| Ok::<_, QuoteError>(1)));
}

fn new_circuit_breaker(
    failure_threshold: u32,
    clock: MockClock,
) -> CircuitBreaker<MockClock, XorShiftRng, NoopInstrument> {
    CircuitBreaker::builder()
        .failure_threshold(failure_threshold)
        .base_interval_minutes(5)
        .fixed_interval_retries(1)
        .max_exponential_retries(2)
        .jitter(false)
        .clock(clock)
        .rng(XorShiftRng::seed_from_u64(3))
        .build()
}
