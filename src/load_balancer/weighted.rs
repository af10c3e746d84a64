//! Weighted-random load balancing strategy.

use std::sync::Arc;

use rand::Rng;

use crate::config::WEIGHT_TOTAL;
use crate::load_balancer::{backend::Backend, LoadBalancer};

/// Weighted-random selector.
/// Draws an integer in `[0, 100)` and walks the cumulative weights in order.
#[derive(Debug, Default)]
pub struct WeightedRandom;

impl WeightedRandom {
    pub fn new() -> Self {
        Self
    }

    /// Resolve a draw against the cumulative weights.
    ///
    /// The first backend whose running total exceeds `draw` wins.
    pub fn candidate_for(draw: u32, backends: &[Arc<Backend>]) -> Option<Arc<Backend>> {
        let mut sum = 0;
        for backend in backends {
            sum += backend.weight;
            if sum > draw {
                return Some(backend.clone());
            }
        }
        None
    }
}

impl LoadBalancer for WeightedRandom {
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>> {
        if backends.is_empty() {
            return None;
        }
        let draw = rand::thread_rng().gen_range(0..WEIGHT_TOTAL);
        Self::candidate_for(draw, backends)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(weights: &[u32]) -> Vec<Arc<Backend>> {
        weights
            .iter()
            .enumerate()
            .map(|(i, w)| Arc::new(Backend::new(format!("b{}", i), "127.0.0.1", *w).unwrap()))
            .collect()
    }

    #[test]
    fn test_cumulative_boundaries() {
        let backends = pool(&[25, 25, 25, 25]);
        let id = |draw| WeightedRandom::candidate_for(draw, &backends).unwrap().id.clone();
        assert_eq!(id(0), "b0");
        assert_eq!(id(24), "b0");
        assert_eq!(id(25), "b1");
        assert_eq!(id(74), "b2");
        assert_eq!(id(99), "b3");
    }

    #[test]
    fn test_zero_weight_never_chosen() {
        let backends = pool(&[0, 100]);
        for draw in 0..100 {
            assert_eq!(WeightedRandom::candidate_for(draw, &backends).unwrap().id, "b1");
        }
    }

    #[test]
    fn test_weighted_distribution() {
        let lb = WeightedRandom::new();
        let backends = pool(&[10, 60, 30]);
        let mut counts = [0usize; 3];
        let samples = 20_000;
        for _ in 0..samples {
            let b = lb.next_server(&backends).unwrap();
            let i = backends.iter().position(|x| x.id == b.id).unwrap();
            counts[i] += 1;
        }
        let expected = [0.10, 0.60, 0.30];
        for (count, want) in counts.iter().zip(expected) {
            let got = *count as f64 / samples as f64;
            assert!((got - want).abs() < 0.03, "got {got}, want {want}");
        }
    }
}
