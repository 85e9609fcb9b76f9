//! # Resilience Module
//!
//! Circuit breaker patterns protecting the upstream GitHub API. Repeated
//! transient failures against one logical endpoint group (repository reads,
//! user reads, search) open that group's circuit so the client fails fast
//! instead of hammering an unhealthy upstream.
//!
//! ## Architecture
//!
//! - **Circuit Breakers**: One per endpoint group, three-state (closed,
//!   open, half-open) with a single trial call during recovery
//! - **Manager**: Lazily creates and shares breakers across concurrent calls
//! - **Metrics**: Call counts and state snapshots for observability

pub mod circuit_breaker;
pub mod manager;

pub use circuit_breaker::{CircuitMetrics, CircuitOpenError, CircuitState, EndpointCircuit};
pub use manager::CircuitBreakerManager;
