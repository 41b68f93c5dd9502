//! Chunked shuffling of dialogue segments.
//!
//! Runs of consecutive segments are lifted out of a pool in original order. A run
//! keeps growing with probability `continue_chance` per segment, so run lengths
//! follow a geometric distribution and tune how jumpy the result sounds.

use rand::Rng;

use super::error::ShuffleError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkShuffler {
    continue_chance: f64,
}

impl ChunkShuffler {
    pub const DEFAULT_CONTINUE_CHANCE: f64 = 0.7;

    pub fn new(continue_chance: f64) -> Result<Self, ShuffleError> {
        if !(continue_chance > 0.0 && continue_chance < 1.0) {
            return Err(ShuffleError::InvalidContinueChance(continue_chance));
        }
        Ok(Self { continue_chance })
    }

    /// Build from the chance of jumping to a new random run instead.
    pub fn from_jump_chance(jump_chance: f64) -> Result<Self, ShuffleError> {
        Self::new(1.0 - jump_chance)
    }

    pub fn continue_chance(&self) -> f64 {
        self.continue_chance
    }

    pub fn expected_run_length(&self) -> f64 {
        self.continue_chance / (1.0 - self.continue_chance)
    }

    /// Return a permutation of `segments`. The pool is sorted first, so a
    /// seeded `rng` always produces the same order.
    pub fn shuffle<T, R>(&self, segments: &[T], rng: &mut R) -> Vec<T>
    where
        T: Ord + Clone,
        R: Rng,
    {
        self.shuffle_runs(segments, rng).into_iter().flatten().collect()
    }

    /// The runs behind [`ChunkShuffler::shuffle`], in output order. A run that
    /// failed its first continuation draw is kept as an empty run.
    pub fn shuffle_runs<T, R>(&self, segments: &[T], rng: &mut R) -> Vec<Vec<T>>
    where
        T: Ord + Clone,
        R: Rng,
    {
        let mut pool = segments.to_vec();
        pool.sort();
        let mut runs = Vec::new();

        while !pool.is_empty() {
            let cursor = rng.gen_range(0..pool.len());
            let mut run = Vec::new();
            // after a removal the next neighbour slides into `cursor`
            while cursor < pool.len() && rng.gen_bool(self.continue_chance) {
                run.push(pool.remove(cursor));
            }
            runs.push(run);
        }

        runs
    }
}

impl Default for ChunkShuffler {
    fn default() -> Self {
        Self {
            continue_chance: Self::DEFAULT_CONTINUE_CHANCE,
        }
    }
}
