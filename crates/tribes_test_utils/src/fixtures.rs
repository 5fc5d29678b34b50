//! Test fixtures and helpers.
//!
//! Pre-built worlds and small setups for consistent testing.

use fixed::types::I32F32;
use tribes_core::commands::{BattleChoice, Command};
use tribes_core::container::WarBandId;
use tribes_core::hex::HexCoord;
use tribes_core::player::{AiPersonality, Player, PlayerId};
use tribes_core::rules::GameRules;
use tribes_core::state::WorldState;
use tribes_core::terrain::Terrain;
use tribes_core::units::UnitKind;
use tribes_core::worldgen::{new_game, NewGameConfig};

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// An all-plains world with the given players, in seat order.
///
/// Each entry is `(name, is_human)`; AI players cycle through the
/// personalities.
#[must_use]
pub fn plains_world(width: u32, height: u32, seed: u64, players: &[(&str, bool)]) -> WorldState {
    let mut world = WorldState::blank(width, height, Terrain::Plains, seed, GameRules::default());
    for (i, &(name, human)) in players.iter().enumerate() {
        let personality = AiPersonality::ALL[i % AiPersonality::ALL.len()];
        world.add_player(Player::new(PlayerId(0), name, human).with_personality(personality));
    }
    world
}

/// Two warrior bands facing each other on open plains.
///
/// Player 0 is human and owns the attacker; player 1 is an AI and owns the
/// defender, one hex east.
///
/// # Panics
///
/// Panics if the fixture cannot be built, which means the core is broken.
#[must_use]
pub fn duel(attackers: &[UnitKind], defenders: &[UnitKind]) -> (WorldState, WarBandId, WarBandId) {
    let mut world = plains_world(10, 10, 7, &[("Red", true), ("Blue", false)]);
    let left = HexCoord::from_offset(4, 4);
    let a = world
        .spawn_war_band(PlayerId(0), left, attackers)
        .expect("attacker band");
    let d = world
        .spawn_war_band(PlayerId(1), left.neighbor(0), defenders)
        .expect("defender band");
    (world, a, d)
}

/// A generated game with only AI players.
///
/// # Panics
///
/// Panics if the seed cannot produce a playable map.
#[must_use]
pub fn ai_game(seed: &str, opponents: u32) -> WorldState {
    new_game(&NewGameConfig {
        width: 20,
        height: 16,
        humans: 0,
        opponents,
        seed: Some(seed.to_string()),
        rules: GameRules::default(),
    })
    .expect("ai game")
}

/// Advance one owner's turn: AI players decide for themselves, humans just
/// end their turn, and pending battles are auto-resolved.
#[must_use]
pub fn step_owner(state: &WorldState) -> WorldState {
    let mut next = if state.pending_battle().is_some() {
        state.apply(&Command::ResolveBattle {
            choice: BattleChoice::AutoResolve,
        })
    } else {
        state.clone()
    };
    let human = next.current_player().is_some_and(|p| p.is_human);
    next = if human {
        tribes_core::turn::end_turn(&next)
    } else {
        tribes_core::ai::run_ai_turn(&next)
    };
    next
}

/// Play `owner_turns` owner turns with [`step_owner`].
#[must_use]
pub fn play(state: &WorldState, owner_turns: usize) -> WorldState {
    let mut current = state.clone();
    for _ in 0..owner_turns {
        current = step_owner(&current);
    }
    current
}
