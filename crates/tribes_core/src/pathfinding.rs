//! Movement reachability and attack targeting on the hex grid.
//!
//! Reachability is a uniform-cost search bounded by the band's remaining
//! movement. Entering a tile costs its terrain's movement cost; tiles the
//! owner lacks the technology for, impassable tiles, and tiles a large unit
//! cannot enter are never expanded.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::container::{ContainerRef, WarBandId};
use crate::hex::{HexCoord, MinQueue};
use crate::player::Player;
use crate::state::WorldState;

/// Tiles a war-band can move to this turn.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Reachability {
    /// Valid destinations.
    pub tiles: BTreeSet<HexCoord>,
    /// Minimum movement cost to each destination.
    pub costs: BTreeMap<HexCoord, u32>,
    /// Adjacent enterable tiles of a band with no movement left. Shown to
    /// players at zero cost; never valid destinations.
    pub exhausted_neighbors: BTreeSet<HexCoord>,
}

impl Reachability {
    /// Cost to reach `coord`, if reachable.
    #[must_use]
    pub fn cost(&self, coord: HexCoord) -> Option<u32> {
        self.costs.get(&coord).copied()
    }

    /// Whether nothing can be reached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

/// Movement cost for `player` to enter `coord`, or `None` if it cannot.
#[must_use]
pub fn entry_cost(
    state: &WorldState,
    player: &Player,
    has_large_unit: bool,
    coord: HexCoord,
) -> Option<u32> {
    let terrain = state.tile(coord)?.terrain;
    if !player.knows(terrain.required_tech()) {
        return None;
    }
    if has_large_unit && !terrain.allows_large_units() {
        return None;
    }
    terrain.movement_cost()
}

/// Tiles the band can end a move on this turn.
///
/// Occupied tiles may be passed through but are never destinations.
/// Encamped and unknown bands reach nothing.
#[must_use]
pub fn reachable_tiles(state: &WorldState, band_id: WarBandId) -> Reachability {
    let mut out = Reachability::default();
    let Some(band) = state.war_band(band_id) else {
        return out;
    };
    if band.is_encamped() {
        return out;
    }
    let Some(player) = state.player(band.owner) else {
        return out;
    };
    let large = state.band_has_large_unit(band_id);
    let budget = band.movement;
    let start = band.position;

    if budget == 0 {
        out.exhausted_neighbors = start
            .neighbors()
            .into_iter()
            .filter(|&n| {
                entry_cost(state, player, large, n).is_some()
                    && state.tile(n).is_some_and(|t| t.occupant.is_none())
            })
            .collect();
        return out;
    }

    let mut best: BTreeMap<HexCoord, u32> = BTreeMap::new();
    let mut open = MinQueue::new();
    best.insert(start, 0);
    open.push(start, 0);

    while let Some((current, cost)) = open.pop() {
        if best.get(&current).is_some_and(|&b| b < cost) {
            continue;
        }
        for next in current.neighbors() {
            let Some(step) = entry_cost(state, player, large, next) else {
                continue;
            };
            let total = cost + step;
            if total > budget {
                continue;
            }
            if best.get(&next).map_or(true, |&b| total < b) {
                best.insert(next, total);
                open.push(next, total);
            }
        }
    }

    for (coord, cost) in best {
        if coord == start {
            continue;
        }
        if state.tile(coord).is_some_and(|t| t.occupant.is_some()) {
            continue;
        }
        out.tiles.insert(coord);
        out.costs.insert(coord, cost);
    }
    out
}

/// Enemy holdings adjacent to the band that it may attack this turn.
///
/// Empty if the band is encamped or has no movement left.
#[must_use]
pub fn attack_targets(state: &WorldState, band_id: WarBandId) -> Vec<ContainerRef> {
    let Some(band) = state.war_band(band_id) else {
        return Vec::new();
    };
    if band.is_encamped() || band.movement == 0 || band.holding.units.is_empty() {
        return Vec::new();
    }
    band.position
        .neighbors()
        .into_iter()
        .filter_map(|n| state.tile(n).and_then(|t| t.occupant))
        .filter(|&r| {
            state
                .container(r)
                .is_some_and(|c| c.owner() != band.owner)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::PlayerId;
    use crate::rules::GameRules;
    use crate::technology::TechId;
    use crate::terrain::Terrain;
    use crate::units::UnitKind;

    fn world() -> WorldState {
        let mut w = WorldState::blank(10, 10, Terrain::Plains, 1, GameRules::default());
        w.add_player(Player::new(PlayerId(0), "A", true));
        w.add_player(Player::new(PlayerId(0), "B", false));
        w
    }

    fn center() -> HexCoord {
        HexCoord::from_offset(5, 5)
    }

    #[test]
    fn test_plains_reach_radius_equals_movement() {
        let mut w = world();
        let id = w
            .spawn_war_band(PlayerId(0), center(), &[UnitKind::Warrior])
            .expect("spawn");
        let reach = reachable_tiles(&w, id);
        // Movement 2 on cost-1 terrain: the ring of radius 2 minus the start.
        assert_eq!(reach.tiles.len(), 18);
        for (coord, cost) in &reach.costs {
            assert_eq!(*cost, center().distance(*coord));
        }
    }

    #[test]
    fn test_water_needs_boats() {
        let mut w = world();
        for n in center().neighbors() {
            w.set_terrain(n, Terrain::Lake).expect("terrain");
        }
        let id = w
            .spawn_war_band(PlayerId(0), center(), &[UnitKind::Warrior])
            .expect("spawn");
        assert!(reachable_tiles(&w, id).is_empty());

        w.player_mut(PlayerId(0))
            .expect("player")
            .techs
            .insert(TechId::Boats);
        let reach = reachable_tiles(&w, id);
        assert_eq!(reach.tiles.len(), 6);
        assert!(reach.costs.values().all(|&c| c == 2));
    }

    #[test]
    fn test_large_units_blocked_by_forest() {
        let mut w = world();
        for n in center().neighbors() {
            w.set_terrain(n, Terrain::Forest).expect("terrain");
        }
        let id = w
            .spawn_war_band(PlayerId(0), center(), &[UnitKind::MammothRider])
            .expect("spawn");
        assert!(reachable_tiles(&w, id).is_empty());
    }

    #[test]
    fn test_occupied_tiles_traversed_not_entered() {
        let mut w = world();
        let id = w
            .spawn_war_band(PlayerId(0), center(), &[UnitKind::Warrior])
            .expect("spawn");
        let blocker = center().neighbor(0);
        w.spawn_war_band(PlayerId(0), blocker, &[UnitKind::Male])
            .expect("spawn");
        let reach = reachable_tiles(&w, id);
        assert!(!reach.tiles.contains(&blocker));
        assert!(reach.tiles.contains(&blocker.neighbor(0)));
    }

    #[test]
    fn test_zero_movement_reports_exhausted_neighbors() {
        let mut w = world();
        let id = w
            .spawn_war_band(PlayerId(0), center(), &[UnitKind::Warrior])
            .expect("spawn");
        w.war_band_mut(id).expect("band").movement = 0;
        let reach = reachable_tiles(&w, id);
        assert!(reach.tiles.is_empty());
        assert!(reach.costs.is_empty());
        assert_eq!(reach.exhausted_neighbors.len(), 6);
    }

    #[test]
    fn test_attack_targets_adjacent_enemies_only() {
        let mut w = world();
        let id = w
            .spawn_war_band(PlayerId(0), center(), &[UnitKind::Warrior])
            .expect("spawn");
        let friend = center().neighbor(1);
        let foe = center().neighbor(2);
        let far = center().neighbor(2).neighbor(2);
        w.spawn_war_band(PlayerId(0), friend, &[UnitKind::Male])
            .expect("spawn");
        let foe_id = w
            .spawn_war_band(PlayerId(1), foe, &[UnitKind::Male])
            .expect("spawn");
        w.spawn_war_band(PlayerId(1), far, &[UnitKind::Male])
            .expect("spawn");

        assert_eq!(
            attack_targets(&w, id),
            vec![ContainerRef::WarBand(foe_id)]
        );

        w.war_band_mut(id).expect("band").movement = 0;
        assert!(attack_targets(&w, id).is_empty());
    }
}
