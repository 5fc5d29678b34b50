//! JSON output protocol.
//!
//! The runner writes one JSON object per line to stdout. Every object
//! carries a `type` tag:
//!
//! ```text
//! <- {"type":"started","scenario":"Skirmish","seed":"skirmish","width":24,...}
//! <- {"type":"battle","round":3,"report":{...}}
//! <- {"type":"round","round":3,"players":[...]}
//! <- {"type":"game_over","round":17,"reason":"conquest","winner":{...}}
//! ```
//!
//! Logs never go to stdout, so the stream can be piped straight into a
//! JSON-lines consumer.

use serde::{Deserialize, Serialize};
use tribes_core::combat::BattleReport;
use tribes_core::player::PlayerId;
use tribes_core::state::WorldState;
use tribes_core::terrain::Terrain;

/// Messages written by the runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Output {
    /// A game was set up.
    Started {
        /// Scenario name.
        scenario: String,
        /// Seed text the map was generated from.
        seed: String,
        /// Map width.
        width: u32,
        /// Map height.
        height: u32,
        /// Seated players.
        players: Vec<PlayerSummary>,
    },

    /// A battle was resolved.
    Battle {
        /// Round in which it happened.
        round: u32,
        /// Full battle record.
        report: BattleReport,
    },

    /// A round finished.
    Round {
        /// The round that just ended.
        round: u32,
        /// Standings after the round.
        players: Vec<PlayerSummary>,
    },

    /// The run stopped.
    GameOver {
        /// Round the run stopped in.
        round: u32,
        /// Why the run stopped.
        reason: StopReason,
        /// Last player standing, if any.
        winner: Option<PlayerSummary>,
        /// Hash of the final snapshot.
        state_hash: u64,
    },

    /// Result of a determinism check.
    Verify {
        /// Seed text.
        seed: String,
        /// Number of runs compared.
        runs: u32,
        /// Rounds each run played.
        rounds: u32,
        /// All runs ended in the same state.
        deterministic: bool,
        /// Final state hash of every run.
        hashes: Vec<u64>,
    },

    /// An ASCII rendering of a generated map.
    Map {
        /// Seed text.
        seed: String,
        /// Map width.
        width: u32,
        /// Map height.
        height: u32,
        /// One string per row; odd rows are shifted half a hex right.
        rows: Vec<String>,
    },

    /// Something went wrong.
    Error {
        /// Error message.
        message: String,
    },
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// At most one player has holdings left.
    Conquest,
    /// The configured number of rounds was played.
    RoundLimit,
    /// Owner turns stopped advancing the game.
    Stalled,
}

/// Standing of one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSummary {
    /// Player index.
    pub id: u8,
    /// Display name.
    pub name: String,
    /// Human-controlled.
    pub human: bool,
    /// Gold.
    pub gold: u32,
    /// Settlements owned.
    pub settlements: usize,
    /// War-bands owned, encamped or not.
    pub war_bands: usize,
    /// Living units.
    pub units: usize,
    /// Technologies known.
    pub techs: usize,
    /// Tiles claimed by settlements and camps.
    pub territory: usize,
    /// No holdings remain.
    pub eliminated: bool,
}

impl PlayerSummary {
    /// Summarise `id` in `state`.
    #[must_use]
    pub fn of(state: &WorldState, id: PlayerId) -> Option<Self> {
        let player = state.player(id)?;
        Some(Self {
            id: id.0,
            name: player.name.clone(),
            human: player.is_human,
            gold: player.gold,
            settlements: state.settlements().filter(|s| s.owner == id).count(),
            war_bands: state.war_bands().filter(|b| b.owner == id).count(),
            units: state.units().filter(|u| u.owner == id).count(),
            techs: player.techs.len(),
            territory: state.owner_territory(id).len(),
            eliminated: player.eliminated,
        })
    }

    /// Summaries of every seated player, in turn order.
    #[must_use]
    pub fn all(state: &WorldState) -> Vec<Self> {
        state
            .players()
            .iter()
            .filter_map(|p| Self::of(state, p.id))
            .collect()
    }
}

/// Single-character glyph for a terrain.
#[must_use]
pub const fn terrain_glyph(terrain: Terrain) -> char {
    match terrain {
        Terrain::Ocean => '~',
        Terrain::Lake => '-',
        Terrain::Plains => '.',
        Terrain::Steppe => ',',
        Terrain::Desert => ':',
        Terrain::Swamp => '%',
        Terrain::Forest => 'T',
        Terrain::Hills => 'n',
        Terrain::Mountains => '^',
        Terrain::Volcano => 'V',
    }
}

/// Serialize an output message as one JSON line (without the newline).
pub fn to_json_line(output: &Output) -> Result<String, serde_json::Error> {
    serde_json::to_string(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_is_tagged_snake_case() {
        let json = to_json_line(&Output::GameOver {
            round: 4,
            reason: StopReason::RoundLimit,
            winner: None,
            state_hash: 7,
        })
        .expect("serialize");
        assert!(json.starts_with(r#"{"type":"game_over""#), "{json}");
        assert!(json.contains(r#""reason":"round_limit""#), "{json}");
    }

    #[test]
    fn test_output_round_trips_through_json() {
        let msg = Output::Map {
            seed: "abc".to_string(),
            width: 2,
            height: 1,
            rows: vec!["~.".to_string()],
        };
        let json = to_json_line(&msg).expect("serialize");
        let back: Output = serde_json::from_str(&json).expect("parse");
        assert_eq!(back, msg);
    }

    #[test]
    fn test_glyphs_are_distinct() {
        let mut glyphs: Vec<char> = Terrain::ALL.iter().map(|t| terrain_glyph(*t)).collect();
        glyphs.sort_unstable();
        glyphs.dedup();
        assert_eq!(glyphs.len(), Terrain::ALL.len());
    }
}
