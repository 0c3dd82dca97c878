//! Named concurrency gates
//!
//! Some remote APIs only tolerate a handful of concurrent mutations per
//! account (for example custom key store connections). A
//! [`SemaphoreRegistry`] hands out one shared [`Semaphore`] per name. The
//! registry is an ordinary value owned by the process or test harness and
//! passed to whoever needs it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Semaphore;

#[derive(Debug, Default)]
pub struct SemaphoreRegistry {
    gates: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl SemaphoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the semaphore registered under `name`, creating it with
    /// `capacity` permits on first use
    ///
    /// The first capacity registered for a name wins; later calls with a
    /// different capacity get the existing gate.
    pub fn get_or_create(&self, name: &str, capacity: usize) -> Arc<Semaphore> {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(gate) = gates.get(name) {
            return Arc::clone(gate);
        }

        let capacity = capacity.clamp(1, Semaphore::MAX_PERMITS);
        tracing::debug!(name, capacity, "created concurrency gate");
        let gate = Arc::new(Semaphore::new(capacity));
        gates.insert(name.to_string(), Arc::clone(&gate));
        gate
    }

    pub fn get(&self, name: &str) -> Option<Arc<Semaphore>> {
        self.gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read a gate capacity from the environment variable `var`
///
/// Anything other than a positive integer falls back to `default`.
pub fn capacity_from_env(var: &str, default: usize) -> usize {
    std::env::var(var)
        .ok()
        .and_then(|raw| raw.trim().parse::<usize>().ok())
        .filter(|capacity| *capacity > 0)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_same_name_same_gate() {
        let registry = SemaphoreRegistry::new();
        let a = registry.get_or_create("custom-key-store", 2);
        let b = registry.get_or_create("custom-key-store", 5);

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.available_permits(), 2);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_distinct_names() {
        let registry = SemaphoreRegistry::new();
        registry.get_or_create("a", 1);
        registry.get_or_create("b", 1);

        assert_eq!(registry.len(), 2);
        assert!(registry.get("a").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let registry = SemaphoreRegistry::new();
        assert_eq!(registry.get_or_create("zero", 0).available_permits(), 1);
    }

    #[test]
    fn test_capacity_from_env() {
        assert_eq!(capacity_from_env("CLOUDWAIT_TEST_UNSET_LIMIT", 4), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gate_limits_concurrency() {
        let registry = Arc::new(SemaphoreRegistry::new());
        let in_flight = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let peak = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let registry = Arc::clone(&registry);
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                let gate = registry.get_or_create("connect", 2);
                let _permit = gate.acquire().await.unwrap();
                let now = in_flight.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
                peak.fetch_max(now, std::sync::atomic::Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(1)).await;
                in_flight.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(peak.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
