//! Headless game runner for AI-only sessions and determinism checks.
//!
//! This crate plays games without graphics or input:
//!
//! - **Simulation runs**: every seat is driven by the AI (human seats pass)
//!   and battles are auto-resolved
//! - **Determinism checks**: the same seed is played several times and the
//!   final state hashes compared
//! - **Map previews**: generated maps rendered as ASCII
//!
//! # Output
//!
//! - **stdout**: one JSON object per line (see [`protocol`])
//! - **stderr**: human-readable logs
//!
//! # Example
//!
//! ```bash
//! # Play the bundled skirmish
//! cargo run -p tribes_headless -- run --scenario crates/tribes_headless/scenarios/skirmish.ron
//!
//! # Verify determinism
//! cargo run -p tribes_headless -- verify --seed abc --runs 5
//!
//! # Preview a map
//! cargo run -p tribes_headless -- map --width 32 --height 20 --seed abc
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod protocol;
pub mod runner;
pub mod scenario;

pub use protocol::{terrain_glyph, Output, PlayerSummary, StopReason};
pub use runner::{run_scenario, verify_scenario, GameRunner, RunOutcome};
pub use scenario::{Scenario, ScenarioError};
