use super::backoff::{HybridBackoff, RetryPhase};
use super::state_machine::State;

/// A point-in-time view of a circuit breaker, for monitoring.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Status {
    /// Current state.
    pub state: State,
    /// Consecutive failures since the last success.
    pub failure_count: u32,
    /// Times the circuit opened since the last recovery.
    pub consecutive_breaks: u32,
    /// Position in the recovery timeout schedule.
    pub retry_phase: RetryPhase,
    /// Recovery timeout of the current open period, or the one the next open period would
    /// get.
    pub recovery_timeout_minutes: u64,
    /// Minutes until a trial call is permitted, only while open.
    pub retry_in_minutes: Option<f64>,
    /// The recovery timeout schedule.
    pub config: HybridBackoff,
}
