//! Pluggable randomness
//!
//! Node type selection, chaos targets and synthetic pod usage all draw from a
//! [`RandomSource`]. Production code uses [`ThreadRandom`]; tests replay a
//! fixed sequence with [`ScriptedRandom`].

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub trait RandomSource: Send {
    /// Uniform value in `[0, 1)`
    fn next_f64(&mut self) -> f64;

    /// `true` with probability `p`
    fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Uniform index into a collection of `len` items
    fn pick(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let index = (self.next_f64() * len as f64) as usize;
        Some(index.min(len - 1))
    }

    /// Uniform value in `[low, high)`
    fn between(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.next_f64()
    }
}

/// Owned random source handed to a component
pub type BoxedRandom = Box<dyn RandomSource>;

/// Entropy-seeded source backed by [`StdRng`]
pub struct ThreadRandom {
    rng: StdRng,
}

impl ThreadRandom {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn boxed() -> BoxedRandom {
        Box::new(Self::new())
    }
}

impl Default for ThreadRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for ThreadRandom {
    fn next_f64(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

/// Replays a fixed sequence of values, wrapping around at the end
#[derive(Debug, Clone)]
pub struct ScriptedRandom {
    values: Vec<f64>,
    cursor: usize,
}

impl ScriptedRandom {
    pub fn new(values: impl Into<Vec<f64>>) -> Self {
        let values = values.into();
        assert!(!values.is_empty(), "scripted sequence must not be empty");
        Self { values, cursor: 0 }
    }

    pub fn boxed(values: impl Into<Vec<f64>>) -> BoxedRandom {
        Box::new(Self::new(values))
    }
}

impl RandomSource for ScriptedRandom {
    fn next_f64(&mut self) -> f64 {
        let value = self.values[self.cursor % self.values.len()];
        self.cursor += 1;
        value.clamp(0.0, 1.0 - f64::EPSILON)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_random_replays_and_wraps() {
        let mut rng = ScriptedRandom::new(vec![0.1, 0.9]);
        assert_eq!(rng.next_f64(), 0.1);
        assert_eq!(rng.next_f64(), 0.9);
        assert_eq!(rng.next_f64(), 0.1);
    }

    #[test]
    fn test_pick_bounds() {
        let mut rng = ScriptedRandom::new(vec![0.0, 0.5, 0.999]);
        assert_eq!(rng.pick(0), None);
        assert_eq!(rng.pick(4), Some(0));
        assert_eq!(rng.pick(4), Some(2));
        assert_eq!(rng.pick(4), Some(3));
    }

    #[test]
    fn test_chance_threshold() {
        let mut rng = ScriptedRandom::new(vec![0.49, 0.5]);
        assert!(rng.chance(0.5));
        assert!(!rng.chance(0.5));
    }

    #[test]
    fn test_thread_random_in_range() {
        let mut rng = ThreadRandom::seeded(42);
        for _ in 0..100 {
            let v = rng.between(0.5, 1.0);
            assert!((0.5..1.0).contains(&v));
        }
    }
}
