//! # Tribes Core
//!
//! Simulation core for a turn-based hex strategy game about stone-age
//! tribes: settlements and roaming war-bands gather, grow, fall sick, fight
//! and drift culturally, one owner's turn at a time.
//!
//! This crate contains **only** simulation logic:
//! - No rendering
//! - No IO (apart from optionally reading a rules file)
//! - No system randomness after setup: every roll comes from the seeded
//!   session RNG stored in the snapshot
//! - Fixed-point combat ratios; floating point is only used once, to
//!   generate the map
//!
//! Every mutation takes a [`WorldState`](state::WorldState) and returns a
//! new one. Snapshots share their tables behind `Arc`s, so keeping old ones
//! around (for undo, replays, or a renderer) is cheap.
//!
//! ## Crate Structure
//!
//! - [`hex`] - Axial coordinates, ranges, and a min-priority queue
//! - [`terrain`], [`units`], [`buildings`], [`technology`], [`culture`] - Static content tables
//! - [`worldgen`] - Map generation and new-game setup
//! - [`state`], [`container`] - The snapshot and the holdings inside it
//! - [`commands`] - Every player action as a [`Command`](commands::Command)
//! - [`turn`] - The end-of-turn pipeline
//! - [`pathfinding`] - Movement range and attack targets
//! - [`combat`] - Battle forecasts and resolution
//! - [`ai`] - Greedy opponents

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]

pub mod ai;
pub mod buildings;
pub mod combat;
pub mod commands;
pub mod container;
pub mod culture;
pub mod economy;
pub mod error;
pub mod hex;
pub mod math;
pub mod pathfinding;
pub mod player;
pub mod population;
pub mod resources;
pub mod rules;
pub mod state;
pub mod technology;
pub mod terrain;
pub mod turn;
pub mod units;
pub mod worldgen;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::ai::run_ai_turn;
    pub use crate::buildings::BuildingKind;
    pub use crate::combat::{forecast, BattleReport, Forecast};
    pub use crate::commands::{BattleChoice, Command};
    pub use crate::container::{
        Container, ContainerRef, ProductionItem, Settlement, SettlementId, WarBand, WarBandId,
    };
    pub use crate::culture::{Culture, CultureTrait};
    pub use crate::error::{GameError, Result};
    pub use crate::hex::{HexCoord, TileKey};
    pub use crate::math::Fixed;
    pub use crate::pathfinding::{attack_targets, reachable_tiles};
    pub use crate::player::{AiPersonality, Player, PlayerId};
    pub use crate::resources::{Resource, Resources};
    pub use crate::rules::GameRules;
    pub use crate::state::{Tile, WorldState};
    pub use crate::technology::TechId;
    pub use crate::terrain::Terrain;
    pub use crate::turn::{end_turn, run_stage, Stage};
    pub use crate::units::{Unit, UnitId, UnitKind};
    pub use crate::worldgen::{new_game, seed_from_str, NewGameConfig};
}
