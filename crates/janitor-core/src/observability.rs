//! Observability context: warning/error counters and latency extremes.
//!
//! One `Observability` is built at startup and handed to every component as an
//! `Arc`. There is no process-wide registry; dropping the context drops the
//! numbers.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::domain::{Component, Operation};

const EPSILON: f64 = 1.0e-8;

/// Lowest and highest observed latency of one operation, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyMinMax {
    pub low: f64,
    pub high: f64,
}

impl LatencyMinMax {
    fn first(latency: f64) -> Self {
        Self {
            low: latency,
            high: latency,
        }
    }

    fn update(&mut self, latency: f64) {
        if latency - self.high > EPSILON {
            self.high = latency;
        }
        if self.low - latency > EPSILON {
            self.low = latency;
        }
    }
}

/// A started latency measurement. Hand it back to [`Observability::observe`].
#[must_use]
#[derive(Debug)]
pub struct LatencyTimer {
    operation: Operation,
    started: Instant,
}

#[derive(Debug, Default)]
pub struct Observability {
    warnings: DashMap<Component, AtomicU64>,
    errors: DashMap<Component, AtomicU64>,
    latencies: DashMap<Operation, LatencyMinMax>,
}

impl Observability {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&self, component: Component) {
        self.warnings
            .entry(component)
            .or_default()
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn error(&self, component: Component) {
        self.errors
            .entry(component)
            .or_default()
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn warnings(&self, component: Component) -> u64 {
        self.warnings
            .get(&component)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn errors(&self, component: Component) -> u64 {
        self.errors
            .get(&component)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn start(&self, operation: Operation) -> LatencyTimer {
        LatencyTimer {
            operation,
            started: Instant::now(),
        }
    }

    /// Finish a measurement and fold it into the operation's extremes.
    pub fn observe(&self, timer: LatencyTimer) -> Duration {
        let elapsed = timer.started.elapsed();
        self.record_latency(timer.operation, elapsed);
        elapsed
    }

    pub fn record_latency(&self, operation: Operation, latency: Duration) {
        let secs = latency.as_secs_f64();
        self.latencies
            .entry(operation)
            .and_modify(|l| l.update(secs))
            .or_insert_with(|| LatencyMinMax::first(secs));
    }

    pub fn latency(&self, operation: Operation) -> Option<LatencyMinMax> {
        self.latencies.get(&operation).map(|l| *l)
    }

    pub fn snapshot(&self) -> ObservabilitySnapshot {
        ObservabilitySnapshot {
            warnings: collect_counters(&self.warnings),
            errors: collect_counters(&self.errors),
            latencies: self
                .latencies
                .iter()
                .map(|entry| (*entry.key(), *entry.value()))
                .collect(),
        }
    }
}

fn collect_counters(counters: &DashMap<Component, AtomicU64>) -> BTreeMap<Component, u64> {
    counters
        .iter()
        .map(|entry| (*entry.key(), entry.value().load(Ordering::Relaxed)))
        .collect()
}

/// Point-in-time copy of all counters, suitable for reporting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservabilitySnapshot {
    pub warnings: BTreeMap<Component, u64>,
    pub errors: BTreeMap<Component, u64>,
    pub latencies: BTreeMap<Operation, LatencyMinMax>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_per_component() {
        let obs = Observability::new();
        obs.warn(Component::CorrelationRegistry);
        obs.warn(Component::CorrelationRegistry);
        obs.error(Component::CleanupDriver);

        assert_eq!(obs.warnings(Component::CorrelationRegistry), 2);
        assert_eq!(obs.warnings(Component::CleanupDriver), 0);
        assert_eq!(obs.errors(Component::CleanupDriver), 1);
    }

    #[test]
    fn latency_tracks_low_and_high() {
        let obs = Observability::new();
        obs.record_latency(Operation::DeleteBuild, Duration::from_millis(200));
        obs.record_latency(Operation::DeleteBuild, Duration::from_millis(50));
        obs.record_latency(Operation::DeleteBuild, Duration::from_millis(120));

        let l = obs.latency(Operation::DeleteBuild).unwrap();
        assert!((l.low - 0.05).abs() < 1e-9);
        assert!((l.high - 0.2).abs() < 1e-9);
        assert!(obs.latency(Operation::DeleteGroupBuild).is_none());
    }

    #[test]
    fn snapshot_serializes_with_typed_keys() {
        let obs = Observability::new();
        obs.warn(Component::VerificationEngine);
        let timer = obs.start(Operation::Verify);
        obs.observe(timer);

        let v = serde_json::to_value(obs.snapshot()).unwrap();
        assert_eq!(v["warnings"]["verification_engine"], 1);
        assert!(v["latencies"]["verify"]["high"].is_number());
    }
}
