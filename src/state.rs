use dashmap::DashMap;

use crate::metrics::Derivation;

/// Derivations written by worker threads, keyed by the flow's input index.
#[derive(Default)]
pub struct DerivationStore {
    results: DashMap<usize, Derivation>,
}

impl DerivationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, index: usize, derivation: Derivation) {
        self.results.insert(index, derivation);
    }

    pub fn completed(&self) -> usize {
        self.results.len()
    }

    /// Drains the store back into input order. Indices that never reported
    /// come back empty.
    pub fn into_ordered(self, count: usize) -> Vec<Derivation> {
        (0..count)
            .map(|i| self.results.remove(&i).map(|(_, d)| d).unwrap_or_default())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RatePoint;
    use std::sync::Arc;
    use std::thread;

    fn derivation(v: f64) -> Derivation {
        Derivation { points: vec![RatePoint::new(1.0, v)], faults: Vec::new() }
    }

    #[test]
    fn drains_in_input_order() {
        let store = DerivationStore::new();
        store.insert(2, derivation(2.0));
        store.insert(0, derivation(0.0));
        store.insert(1, derivation(1.0));
        let out = store.into_ordered(3);
        let values: Vec<f64> = out.iter().map(|d| d.points[0].value).collect();
        assert_eq!(values, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn missing_index_is_empty() {
        let store = DerivationStore::new();
        store.insert(1, derivation(1.0));
        let out = store.into_ordered(2);
        assert!(out[0].points.is_empty());
        assert_eq!(out[1].points.len(), 1);
    }

    #[test]
    fn concurrent_writers() {
        let store = Arc::new(DerivationStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.insert(i, derivation(i as f64)))
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.completed(), 8);
    }
}
