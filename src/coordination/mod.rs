//! Coordination with the outside world: external circuit breakers and
//! process shutdown.

pub mod circuit_breaker;
pub mod shutdown;

pub use circuit_breaker::{CircuitBreakerRecord, CircuitBreakerView, CircuitState};
pub use shutdown::shutdown_signal;
