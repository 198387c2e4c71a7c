use std::time::Duration;

/// Observes breaker transitions, e.g. to feed metrics.
///
/// Hooks run while the breaker's lock is held and must not call back into the breaker.
pub trait Instrument {
    /// A call was refused without being made.
    fn on_call_rejected(&self);

    /// The circuit opened and blocks calls for `recovery_timeout`.
    fn on_open(&self, recovery_timeout: &Duration);

    /// The recovery timeout elapsed and a trial call is allowed.
    fn on_half_open(&self);

    /// A broken circuit recovered.
    fn on_closed(&self);
}

/// Ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopInstrument;

impl Instrument for NoopInstrument {
    fn on_call_rejected(&self) {}

    fn on_open(&self, _: &Duration) {}

    fn on_half_open(&self) {}

    fn on_closed(&self) {}
}

impl Instrument for () {
    fn on_call_rejected(&self) {}

    fn on_open(&self, _: &Duration) {}

    fn on_half_open(&self) {}

    fn on_closed(&self) {}
}
