//! Resilience primitives: circuit breaking, retry with backoff, and the
//! clock/jitter seams that make them deterministic under test.

mod circuit_breaker;
pub(crate) mod clock;
mod retry;

pub use circuit_breaker::{BreakerSettings, CircuitBreaker, CircuitState, ProviderState};
pub use clock::{Clock, JitterSource, RandomJitter, SystemClock};
pub use retry::{RetryConfig, RetryError, RetryPolicy, RetryScope, RetrySuccess};

#[cfg(test)]
pub use clock::mock::{FixedJitter, ManualClock};
