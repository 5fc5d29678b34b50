//! The end-of-turn resolution pipeline.
//!
//! Ending a turn runs nine stages, in order, over the holdings of the player
//! whose turn it is. The last stage hands the turn to the next player that
//! has not been eliminated and, when the order wraps, advances the round.
//!
//! Each stage can also be run on its own with [`run_stage`].

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::commands::Command;
use crate::container::{ContainerRef, WarBandId};
use crate::culture::TurnActions;
use crate::economy;
use crate::population;
use crate::state::WorldState;

/// One stage of the turn pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Clear transient flags, recompute storage and food capacity.
    Capacity,
    /// Forage, pay upkeep, starve.
    Food,
    /// Advance production queues and gather resources.
    Production,
    /// Maturity, births, camp experience.
    Population,
    /// Stagnation, disease risk, outbreaks.
    Disease,
    /// Income, research, culture, healing, repairs.
    Economy,
    /// Remove dead units and empty war-bands.
    Cleanup,
    /// Move the culture axes and unlock traits.
    CulturalDrift,
    /// Hand the turn to the next player.
    TurnAdvance,
}

impl Stage {
    /// Stages in pipeline order.
    pub const ALL: [Self; 9] = [
        Self::Capacity,
        Self::Food,
        Self::Production,
        Self::Population,
        Self::Disease,
        Self::Economy,
        Self::Cleanup,
        Self::CulturalDrift,
        Self::TurnAdvance,
    ];
}

/// Run a single stage for the current player.
#[must_use]
pub fn run_stage(state: &WorldState, stage: Stage) -> WorldState {
    let mut next = state.clone();
    apply_stage(&mut next, stage);
    next
}

/// End the current player's turn.
///
/// Returns the state unchanged while a battle is pending.
#[must_use]
pub fn end_turn(state: &WorldState) -> WorldState {
    state.apply(&Command::EndTurn)
}

/// Run every stage in order.
pub(crate) fn run_turn_pipeline(state: &mut WorldState) {
    for stage in Stage::ALL {
        apply_stage(state, stage);
    }
}

pub(crate) fn apply_stage(state: &mut WorldState, stage: Stage) {
    let owner = state.current_player_id();
    debug!(?stage, player = %owner, turn = state.turn(), "running stage");
    match stage {
        Stage::Capacity => economy::recompute_capacity(state, owner),
        Stage::Food => economy::feed(state, owner),
        Stage::Production => economy::produce_and_gather(state, owner),
        Stage::Population => population::grow(state, owner),
        Stage::Disease => population::spread_disease(state, owner),
        Stage::Economy => economy::collect_and_heal(state, owner),
        Stage::Cleanup => {
            let removed = state.purge_dead();
            if removed > 0 {
                debug!(removed, "dead units removed");
            }
        }
        Stage::CulturalDrift => drift_culture(state),
        Stage::TurnAdvance => advance_turn(state),
    }
}

fn drift_culture(state: &mut WorldState) {
    let owner = state.current_player_id();
    let rates = state.rules().drift_rates();
    let Some(player) = state.player_mut(owner) else {
        return;
    };
    let actions = player.actions;
    let unlocked = player.culture.drift(&actions, rates);
    for t in &unlocked {
        info!(player = owner.0, culture_trait = ?t, "culture trait unlocked");
    }
    if !unlocked.is_empty() {
        let bands: Vec<WarBandId> = state
            .war_bands()
            .filter(|b| b.owner == owner)
            .map(|b| b.id)
            .collect();
        for id in bands {
            state.refresh_band_movement(id);
        }
    }
}

fn advance_turn(state: &mut WorldState) {
    let current = state.current_player_id();
    if let Some(p) = state.player_mut(current) {
        p.actions = TurnActions::default();
    }
    state.set_pending_battle(None);

    let count = state.players().len();
    if count == 0 {
        return;
    }
    let start = current.0 as usize;
    let mut next = start;
    let mut wrapped = false;
    for step in 1..=count {
        let candidate = (start + step) % count;
        if start + step >= count {
            wrapped = true;
        }
        if !state.players()[candidate].eliminated {
            next = candidate;
            break;
        }
    }

    if wrapped {
        state.increment_turn();
        let pct = state.rules().regrowth_pct;
        for tile in state.tiles_mut() {
            tile.regrow(pct);
        }
    }
    state.set_current_player(next);

    let owner = state.current_player_id();
    let bands: Vec<WarBandId> = state
        .war_bands()
        .filter(|b| b.owner == owner)
        .map(|b| b.id)
        .collect();
    for id in bands {
        state.refresh_band_movement(id);
        if let Some(band) = state.war_band_mut(id) {
            band.movement = band.max_movement;
            band.moved_this_turn = false;
        }
    }

    // Only the new owner's idle bands keep their stagnation. Tiles left
    // without a band lose any count a destroyed band left behind.
    let stale: Vec<_> = state
        .tiles()
        .iter()
        .filter(|t| t.turns_occupied > 0)
        .filter(|t| match t.occupant {
            Some(ContainerRef::WarBand(id)) => {
                state.war_band(id).map_or(true, |b| b.owner != owner)
            }
            _ => true,
        })
        .map(|t| t.coord)
        .collect();
    for coord in stale {
        if let Some(tile) = state.tile_mut(coord) {
            tile.turns_occupied = 0;
        }
    }

    info!(turn = state.turn(), player = %owner, "turn advanced");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ContainerRef;
    use crate::hex::HexCoord;
    use crate::player::{Player, PlayerId};
    use crate::resources::Resources;
    use crate::rules::GameRules;
    use crate::terrain::Terrain;
    use crate::units::UnitKind;

    fn world() -> WorldState {
        let mut w = WorldState::blank(8, 8, Terrain::Plains, 2, GameRules::default());
        w.add_player(Player::new(PlayerId(0), "A", true));
        w.add_player(Player::new(PlayerId(0), "B", false));
        w.add_player(Player::new(PlayerId(0), "C", false));
        w
    }

    #[test]
    fn test_turn_order_wraps_and_skips_eliminated() {
        let mut w = world();
        for (i, col) in [1, 4, 6].into_iter().enumerate() {
            w.spawn_war_band(
                PlayerId(i as u8),
                HexCoord::from_offset(col, 2),
                &[UnitKind::Warrior],
            )
            .expect("spawn");
        }
        w.player_mut(PlayerId(1)).expect("player").eliminated = true;

        let w = end_turn(&w);
        assert_eq!(w.current_player_id(), PlayerId(2));
        assert_eq!(w.turn(), 1);
        let w = end_turn(&w);
        assert_eq!(w.current_player_id(), PlayerId(0));
        assert_eq!(w.turn(), 2);
    }

    #[test]
    fn test_regrowth_on_wrap_only() {
        let mut w = WorldState::blank(4, 4, Terrain::Plains, 2, GameRules::default());
        w.add_player(Player::new(PlayerId(0), "Solo", false));
        w.spawn_war_band(PlayerId(0), HexCoord::from_offset(0, 0), &[UnitKind::Juvenile])
            .expect("spawn");
        let far = HexCoord::from_offset(3, 3);
        w.tile_mut(far).expect("tile").pools = Resources::ZERO;
        let next = run_stage(&w, Stage::TurnAdvance);
        assert_eq!(next.turn(), 2);
        let pools = next.tile(far).map(|t| t.pools).expect("tile");
        assert_eq!(pools.food, 1);
        assert_eq!(pools.hides, 1);
        assert_eq!(pools.stone, 0);
    }

    #[test]
    fn test_new_owner_bands_replenished() {
        let mut w = world();
        let band = w
            .spawn_war_band(PlayerId(1), HexCoord::from_offset(3, 3), &[UnitKind::Warrior])
            .expect("spawn");
        {
            let b = w.war_band_mut(band).expect("band");
            b.movement = 0;
            b.moved_this_turn = true;
        }
        let next = run_stage(&w, Stage::TurnAdvance);
        assert_eq!(next.current_player_id(), PlayerId(1));
        let b = next.war_band(band).expect("band");
        assert_eq!(b.movement, 2);
        assert!(!b.moved_this_turn);
    }

    #[test]
    fn test_stagnation_reset_under_other_owners_bands() {
        let mut w = world();
        let previous = HexCoord::from_offset(3, 3);
        let incoming = HexCoord::from_offset(5, 5);
        let empty = HexCoord::from_offset(6, 6);
        w.spawn_war_band(PlayerId(0), previous, &[UnitKind::Warrior])
            .expect("spawn");
        w.spawn_war_band(PlayerId(1), incoming, &[UnitKind::Warrior])
            .expect("spawn");
        for coord in [previous, incoming, empty] {
            w.tile_mut(coord).expect("tile").turns_occupied = 4;
        }

        let next = run_stage(&w, Stage::TurnAdvance);
        assert_eq!(next.current_player_id(), PlayerId(1));
        assert_eq!(next.tile(previous).map(|t| t.turns_occupied), Some(0));
        assert_eq!(next.tile(incoming).map(|t| t.turns_occupied), Some(4));
        assert_eq!(next.tile(empty).map(|t| t.turns_occupied), Some(0));
    }

    #[test]
    fn test_stagnation_kept_when_turn_returns_to_same_owner() {
        let mut w = WorldState::blank(6, 6, Terrain::Plains, 2, GameRules::default());
        w.add_player(Player::new(PlayerId(0), "Solo", false));
        let pos = HexCoord::from_offset(2, 2);
        w.spawn_war_band(PlayerId(0), pos, &[UnitKind::Warrior])
            .expect("spawn");
        w.tile_mut(pos).expect("tile").turns_occupied = 3;

        let next = run_stage(&w, Stage::TurnAdvance);
        assert_eq!(next.tile(pos).map(|t| t.turns_occupied), Some(3));
    }

    #[test]
    fn test_starvation_stage() {
        let mut w = world();
        let pos = HexCoord::from_offset(3, 3);
        let band = w
            .spawn_war_band(PlayerId(0), pos, &[UnitKind::Warrior, UnitKind::Warrior])
            .expect("spawn");
        w.tile_mut(pos).expect("tile").pools.food = 0;
        let next = run_stage(&w, Stage::Food);
        for u in next.units_in(ContainerRef::WarBand(band)) {
            assert_eq!(u.hp, 18);
            assert!(u.starved);
        }
        assert!(next.tile(pos).is_some_and(|t| t.starving_last_turn));
    }

    #[test]
    fn test_full_pipeline_clears_action_counters() {
        let mut w = world();
        w.spawn_war_band(PlayerId(0), HexCoord::from_offset(3, 3), &[UnitKind::Warrior])
            .expect("spawn");
        w.player_mut(PlayerId(0)).expect("player").actions.attacks = 2;
        let next = end_turn(&w);
        let p = next.player(PlayerId(0)).expect("player");
        assert_eq!(p.actions, TurnActions::default());
        assert_eq!(p.culture.axes.militarism, 6);
    }
}
