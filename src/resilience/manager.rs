//! # Circuit Breaker Manager
//!
//! Lazily creates and shares one [`EndpointCircuit`] per logical endpoint
//! group. All calls flowing through the resilient client for the same group
//! observe the same breaker state.

use crate::config::CircuitBreakerSettings;
use crate::resilience::circuit_breaker::{CircuitMetrics, EndpointCircuit};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Shared registry of per-endpoint-group circuit breakers
#[derive(Debug)]
pub struct CircuitBreakerManager {
    settings: CircuitBreakerSettings,
    circuits: DashMap<String, Arc<EndpointCircuit>>,
}

impl CircuitBreakerManager {
    /// Create a manager applying the same settings to every endpoint group
    pub fn new(settings: CircuitBreakerSettings) -> Self {
        Self {
            settings,
            circuits: DashMap::new(),
        }
    }

    /// Get or create the circuit breaker for an endpoint group
    pub fn circuit_for(&self, endpoint_group: &str) -> Arc<EndpointCircuit> {
        self.circuits
            .entry(endpoint_group.to_string())
            .or_insert_with(|| {
                Arc::new(EndpointCircuit::new(
                    endpoint_group.to_string(),
                    self.settings.clone(),
                ))
            })
            .clone()
    }

    /// Snapshot metrics across all known endpoint groups
    pub async fn metrics(&self) -> HashMap<String, CircuitMetrics> {
        let mut out = HashMap::new();
        for entry in self.circuits.iter() {
            out.insert(entry.key().clone(), entry.value().metrics().await);
        }
        out
    }
}
