//! Determinism testing utilities.
//!
//! Provides a harness for verifying that a game session produces identical
//! results given identical inputs.
//!
//! # Testing Strategy
//!
//! A seed must reproduce a whole game: the map, every AI decision, and every
//! roll of the turn pipeline. Sources of non-determinism include:
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   The core keeps its tables in `BTreeMap`s and iterates in id order.
//!
//! - **System randomness**: Only [`tribes_core::worldgen::NewGameConfig`]
//!   without a seed touches the thread RNG. Everything else draws from the
//!   ChaCha stream stored in the snapshot.
//!
//! - **Floating-point math**: Confined to map generation, which runs once
//!   per game on one machine.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual stage determinism (food, disease, combat)
//! 2. **Property tests**: Random inputs must still produce deterministic outputs
//! 3. **Integration tests**: Whole AI sessions are reproducible
//! 4. **Parallel tests**: Running N sessions on threads all match

use std::thread;

use tribes_core::state::WorldState;

use crate::fixtures::{ai_game, play, step_owner};

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of steps simulated.
    pub steps: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic session).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the session was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Session is non-deterministic!\n\
                 Runs: {}\n\
                 Steps: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.steps,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a session multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the session
/// * `steps` - Number of steps per run
/// * `setup` - Function to create the initial state
/// * `step` - Function to advance the state by one step
/// * `hash` - Function to compute the state hash
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    steps: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(S) -> S,
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();
        for _ in 0..steps {
            state = step(state);
        }
        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        steps,
    }
}

/// Play an all-AI game from `seed` twice and compare the final hashes.
#[must_use]
pub fn verify_session_determinism(seed: &str, opponents: u32, owner_turns: u64) -> DeterminismResult {
    verify_determinism(
        2,
        owner_turns,
        || ai_game(seed, opponents),
        |state| step_owner(&state),
        WorldState::state_hash,
    )
}

/// Result of parallel session runs.
#[derive(Debug, Clone)]
pub struct ParallelSessionResult {
    /// Final state hash from each session.
    pub hashes: Vec<u64>,
    /// Owner turns each session ran.
    pub owner_turns: usize,
}

impl ParallelSessionResult {
    /// Check if all sessions produced identical results.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }
}

/// Play the same all-AI game on `sessions` scoped threads.
///
/// # Panics
///
/// Panics if a session thread panics.
#[must_use]
pub fn run_parallel_sessions(
    seed: &str,
    opponents: u32,
    sessions: usize,
    owner_turns: usize,
) -> ParallelSessionResult {
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..sessions)
            .map(|_| s.spawn(|| play(&ai_game(seed, opponents), owner_turns).state_hash()))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("session thread panicked"))
            .collect()
    });

    ParallelSessionResult {
        hashes,
        owner_turns,
    }
}

/// Step two copies of a state side by side and report the first step at
/// which their hashes differ.
#[must_use]
pub fn find_first_divergence(initial: &WorldState, steps: u64) -> Option<u64> {
    let mut a = initial.clone();
    let mut b = initial.clone();
    for step in 1..=steps {
        a = step_owner(&a);
        b = step_owner(&b);
        if a.state_hash() != b.state_hash() {
            return Some(step);
        }
    }
    None
}

/// Check that a snapshot survives a bincode round trip with the same hash,
/// and that play continues identically from the restored copy.
#[must_use]
pub fn verify_serialization_determinism(initial: &WorldState, steps: usize) -> bool {
    let Ok(bytes) = initial.to_bytes() else {
        return false;
    };
    let Ok(restored) = WorldState::from_bytes(&bytes) else {
        return false;
    };
    restored.state_hash() == initial.state_hash()
        && play(&restored, steps).state_hash() == play(initial, steps).state_hash()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_determinism_detects_divergence() {
        use std::cell::Cell;
        let counter = Cell::new(0u64);
        let result = verify_determinism(
            3,
            1,
            || {
                counter.set(counter.get() + 1);
                counter.get()
            },
            |s| s,
            |s| *s,
        );
        assert!(!result.is_deterministic);
        assert_eq!(result.unique_hashes().len(), 3);
    }

    #[test]
    fn test_session_is_deterministic() {
        verify_session_determinism("determinism", 2, 8).assert_deterministic();
    }

    #[test]
    fn test_parallel_sessions_match() {
        let result = run_parallel_sessions("threads", 2, 3, 6);
        assert!(result.is_deterministic(), "{result:?}");
    }

    #[test]
    fn test_no_divergence_and_round_trip() {
        let game = ai_game("bytes", 3);
        assert_eq!(find_first_divergence(&game, 6), None);
        assert!(verify_serialization_determinism(&game, 6));
    }
}
