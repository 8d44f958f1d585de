//! Random reviewer selection.
//!
//! The engine never calls `rand` directly; it asks a [`ReviewerPicker`] to
//! draw from the eligible candidates. Production uses the thread-local RNG,
//! tests inject a seeded picker to get reproducible draws.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::Mutex;

/// Draws up to `limit` distinct candidates uniformly at random.
pub trait ReviewerPicker: Send + Sync {
    /// Returns `min(limit, candidates.len())` distinct entries of `candidates`.
    fn pick(&self, candidates: Vec<String>, limit: usize) -> Vec<String>;
}

/// Picker backed by `rand::thread_rng()`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngPicker;

impl ReviewerPicker for ThreadRngPicker {
    fn pick(&self, candidates: Vec<String>, limit: usize) -> Vec<String> {
        let mut rng = rand::thread_rng();
        candidates
            .choose_multiple(&mut rng, limit)
            .cloned()
            .collect()
    }
}

/// Deterministic picker for tests and reproducible runs.
#[derive(Debug)]
pub struct SeededPicker {
    rng: Mutex<StdRng>,
}

impl SeededPicker {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl ReviewerPicker for SeededPicker {
    fn pick(&self, candidates: Vec<String>, limit: usize) -> Vec<String> {
        // A poisoned lock only means another draw panicked; the RNG is still usable.
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        candidates
            .choose_multiple(&mut *rng, limit)
            .cloned()
            .collect()
    }
}
