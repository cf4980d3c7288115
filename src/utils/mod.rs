pub mod circuit_breaker;
pub mod keyed_lock;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState};
pub use keyed_lock::{KeyedGuard, KeyedLocks};
pub use retry::{retry_on_transient, IsTransient, RetryConfig, RetryResult};
