//! Greedy opponent decisions.
//!
//! The AI looks at the current snapshot only: it never plans beyond the
//! turn in hand. Each decision is issued as a [`Command`], exactly as a
//! human player's would be, so the AI can never do anything a player could
//! not.

use rand::Rng;
use tracing::{debug, warn};

use crate::buildings::BuildingKind;
use crate::combat::forecast;
use crate::commands::{execute, Command};
use crate::container::{Container, ContainerRef, ProductionItem, SettlementId, WarBandId};
use crate::hex::HexCoord;
use crate::math::Fixed;
use crate::pathfinding::{attack_targets, entry_cost, reachable_tiles};
use crate::player::{AiPersonality, PlayerId};
use crate::state::WorldState;
use crate::technology::TechId;
use crate::units::{UnitId, UnitKind};

/// Combatants in order of preference.
const COMBATANTS: [UnitKind; 3] = [UnitKind::MammothRider, UnitKind::Warrior, UnitKind::Hunter];

/// Research order for a personality.
#[must_use]
pub const fn research_order(personality: AiPersonality) -> [TechId; 8] {
    match personality {
        AiPersonality::Aggressive => [
            TechId::Archery,
            TechId::Domestication,
            TechId::Masonry,
            TechId::Climbing,
            TechId::Boats,
            TechId::Pottery,
            TechId::Spirituality,
            TechId::Trade,
        ],
        AiPersonality::Balanced => [
            TechId::Pottery,
            TechId::Archery,
            TechId::Spirituality,
            TechId::Masonry,
            TechId::Boats,
            TechId::Climbing,
            TechId::Domestication,
            TechId::Trade,
        ],
        AiPersonality::Defensive => [
            TechId::Masonry,
            TechId::Pottery,
            TechId::Spirituality,
            TechId::Archery,
            TechId::Trade,
            TechId::Boats,
            TechId::Climbing,
            TechId::Domestication,
        ],
    }
}

/// Camp building order for a personality.
#[must_use]
pub const fn building_order(personality: AiPersonality) -> [BuildingKind; 7] {
    match personality {
        AiPersonality::Aggressive => [
            BuildingKind::Palisade,
            BuildingKind::Storehouse,
            BuildingKind::HealersHut,
            BuildingKind::Granary,
            BuildingKind::Well,
            BuildingKind::Totem,
            BuildingKind::Market,
        ],
        AiPersonality::Balanced => [
            BuildingKind::Granary,
            BuildingKind::HealersHut,
            BuildingKind::Storehouse,
            BuildingKind::Well,
            BuildingKind::Palisade,
            BuildingKind::Totem,
            BuildingKind::Market,
        ],
        AiPersonality::Defensive => [
            BuildingKind::Palisade,
            BuildingKind::HealersHut,
            BuildingKind::Well,
            BuildingKind::Granary,
            BuildingKind::Storehouse,
            BuildingKind::Totem,
            BuildingKind::Market,
        ],
    }
}

/// Play the current player's turn if it is AI-controlled.
///
/// The turn is ended afterwards unless an attack on a human is waiting for
/// that human's decision. Human players and states with a pending battle are
/// returned unchanged.
#[must_use]
pub fn run_ai_turn(state: &WorldState) -> WorldState {
    let mut next = state.clone();
    let owner = next.current_player_id();
    let Some(player) = next.player(owner) else {
        return next;
    };
    if player.is_human || next.pending_battle().is_some() {
        return next;
    }
    let personality = player.personality;
    debug!(player = owner.0, ?personality, turn = next.turn(), "AI turn");

    if !player.eliminated {
        choose_research(&mut next, owner, personality);

        let settlements: Vec<SettlementId> = next
            .settlements()
            .filter(|s| s.owner == owner)
            .map(|s| s.id)
            .collect();
        for id in settlements {
            manage_settlement(&mut next, id, personality);
        }

        let bands: Vec<WarBandId> = next
            .war_bands()
            .filter(|b| b.owner == owner)
            .map(|b| b.id)
            .collect();
        for id in bands {
            manage_band(&mut next, id, owner, personality);
            if next.pending_battle().is_some() {
                debug!(player = owner.0, "AI turn halted by pending battle");
                return next;
            }
        }
    }

    issue(&mut next, &Command::EndTurn);
    next
}

/// Issue a decision the AI has already validated.
fn issue(state: &mut WorldState, command: &Command) -> bool {
    match execute(state, command) {
        Ok(()) => true,
        Err(e) => {
            warn!(?command, error = %e, "AI decision rejected");
            false
        }
    }
}

/// Try a decision that may legitimately be unaffordable.
fn attempt(state: &mut WorldState, command: &Command) -> bool {
    execute(state, command).is_ok()
}

fn choose_research(state: &mut WorldState, owner: PlayerId, personality: AiPersonality) {
    let Some(player) = state.player(owner) else {
        return;
    };
    if player.research.is_some() {
        return;
    }
    let pick = research_order(personality)
        .into_iter()
        .find(|t| t.is_available(&player.techs));
    if let Some(tech) = pick {
        issue(state, &Command::SetResearch { tech });
    }
}

/// Health of a holding's units as a percentage of their maximum.
fn health_pct(state: &WorldState, r: ContainerRef) -> u32 {
    let (hp, max) = state
        .units_in(r)
        .iter()
        .fold((0u64, 0u64), |(h, m), u| {
            (h + u64::from(u.hp), m + u64::from(u.max_hp))
        });
    if max == 0 {
        return 0;
    }
    (hp * 100 / max) as u32
}

/// First adjacent tile the given units could be deployed onto.
fn free_neighbor(state: &WorldState, owner: PlayerId, center: HexCoord, units: &[UnitId]) -> Option<HexCoord> {
    let player = state.player(owner)?;
    let large = units
        .iter()
        .filter_map(|id| state.unit(*id))
        .any(|u| u.kind.is_large());
    center.neighbors().into_iter().find(|&n| {
        state.tile(n).is_some_and(|t| t.occupant.is_none())
            && entry_cost(state, player, large, n).is_some()
    })
}

fn manage_settlement(state: &mut WorldState, id: SettlementId, personality: AiPersonality) {
    let r = ContainerRef::Settlement(id);
    let Some(settlement) = state.settlement(id) else {
        return;
    };
    let owner = settlement.owner;
    let position = settlement.position;
    let garrison = settlement.holding.units.len() as u32;
    let idle_queue = settlement.holding.queue.is_empty();

    if garrison >= state.rules().ai_split_threshold {
        let mut strongest: Vec<(u32, u32, UnitId)> = state
            .units_in(r)
            .iter()
            .map(|u| (u.stats().attack, u.hp, u.id))
            .collect();
        strongest.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)).then(a.2.cmp(&b.2)));
        let units: Vec<UnitId> = strongest.into_iter().take(2).map(|s| s.2).collect();
        if let Some(to) = free_neighbor(state, owner, position, &units) {
            issue(state, &Command::DeployArmy { from: r, units, to });
        }
        return;
    }

    if !idle_queue {
        return;
    }

    let military = state.rng_mut().gen_range(0..100) < personality.military_bias_pct();
    if military {
        for kind in COMBATANTS {
            let cmd = Command::EnqueueProduction {
                holder: r,
                item: ProductionItem::Unit(kind),
            };
            if attempt(state, &cmd) {
                return;
            }
        }
    }

    let (males, females) = state.units_in(r).iter().fold((0, 0), |(m, f), u| match u.kind {
        UnitKind::Male => (m + 1, f),
        UnitKind::Female => (m, f + 1),
        _ => (m, f),
    });
    let laborer = if males < females {
        UnitKind::Male
    } else {
        UnitKind::Female
    };
    attempt(
        state,
        &Command::EnqueueProduction {
            holder: r,
            item: ProductionItem::Unit(laborer),
        },
    );
}

fn manage_band(state: &mut WorldState, id: WarBandId, owner: PlayerId, personality: AiPersonality) {
    let r = ContainerRef::WarBand(id);
    let Some(band) = state.war_band(id) else {
        return;
    };
    if band.holding.units.is_empty() {
        return;
    }
    let encamped = band.is_encamped();
    let size = band.holding.units.len() as u32;
    let idle_queue = band.holding.queue.is_empty();
    let movement = band.movement;
    let health = health_pct(state, r);
    let rules = state.rules();
    let (break_health, break_size, camp_health) = (
        rules.ai_break_camp_health_pct,
        rules.ai_break_camp_size,
        rules.ai_camp_health_pct,
    );

    if encamped {
        if health >= break_health && size >= break_size {
            issue(state, &Command::BreakCamp { band: id });
        } else if idle_queue {
            for kind in building_order(personality) {
                let cmd = Command::EnqueueProduction {
                    holder: r,
                    item: ProductionItem::Building(kind),
                };
                if attempt(state, &cmd) {
                    break;
                }
            }
        }
        return;
    }

    if health < camp_health {
        if movement > 0 {
            issue(state, &Command::FoundCamp { band: id });
        }
        return;
    }

    let mut best: Option<(Fixed, ContainerRef)> = None;
    for target in attack_targets(state, id) {
        if let Some(f) = forecast(state, id, target) {
            if best.map_or(true, |(odds, _)| f.odds > odds) {
                best = Some((f.odds, target));
            }
        }
    }
    if let Some((odds, target)) = best {
        if odds >= personality.attack_threshold() {
            debug!(band = id.0, %target, odds = %odds, "AI attacks");
            issue(state, &Command::Attack { band: id, target });
            return;
        }
    }

    advance_toward_enemy(state, id, owner);
}

/// Positions of the holdings a band should head for: humans first, any
/// rival when there are no humans.
fn enemy_positions(state: &WorldState, owner: PlayerId) -> Vec<HexCoord> {
    let rivals: Vec<PlayerId> = state
        .players()
        .iter()
        .filter(|p| p.id != owner && !p.eliminated)
        .map(|p| p.id)
        .collect();
    let humans: Vec<PlayerId> = rivals
        .iter()
        .copied()
        .filter(|id| state.player(*id).is_some_and(|p| p.is_human))
        .collect();
    let targets = if humans.is_empty() { rivals } else { humans };
    targets
        .into_iter()
        .flat_map(|p| state.holdings_of(p))
        .filter_map(|r| state.container(r).map(|c| c.position()))
        .collect()
}

fn advance_toward_enemy(state: &mut WorldState, id: WarBandId, owner: PlayerId) {
    let Some(from) = state.war_band(id).map(|b| b.position) else {
        return;
    };
    let Some(goal) = enemy_positions(state, owner)
        .into_iter()
        .min_by_key(|p| (from.distance(*p), *p))
    else {
        return;
    };
    let current = from.distance(goal);
    let reach = reachable_tiles(state, id);
    let step = reach
        .costs
        .iter()
        .map(|(coord, cost)| (coord.distance(goal), *cost, *coord))
        .min();
    if let Some((distance, _, to)) = step {
        if distance < current {
            issue(state, &Command::MoveWarBand { band: id, to });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::Player;
    use crate::resources::Resources;
    use crate::rules::GameRules;
    use crate::terrain::Terrain;

    fn world(human_rival: bool) -> WorldState {
        let mut w = WorldState::blank(12, 12, Terrain::Plains, 11, GameRules::default());
        w.add_player(Player::new(PlayerId(0), "Ai", false).with_personality(AiPersonality::Aggressive));
        w.add_player(Player::new(PlayerId(0), "Rival", human_rival));
        w
    }

    #[test]
    fn test_human_turn_untouched() {
        let mut w = world(true);
        w.set_current_player(1);
        assert_eq!(run_ai_turn(&w), w);
    }

    #[test]
    fn test_ai_picks_research_and_ends_turn() {
        let mut w = world(false);
        w.spawn_war_band(PlayerId(0), HexCoord::from_offset(1, 1), &[UnitKind::Juvenile])
            .expect("spawn");
        w.spawn_war_band(PlayerId(1), HexCoord::from_offset(10, 10), &[UnitKind::Juvenile])
            .expect("spawn");
        let next = run_ai_turn(&w);
        assert_eq!(
            next.player(PlayerId(0)).and_then(|p| p.research),
            Some(TechId::Archery)
        );
        assert_eq!(next.current_player_id(), PlayerId(1));
    }

    #[test]
    fn test_ai_steps_toward_rival() {
        let mut w = world(true);
        let start = HexCoord::from_offset(1, 5);
        let band = w
            .spawn_war_band(PlayerId(0), start, &[UnitKind::Warrior, UnitKind::Warrior])
            .expect("spawn");
        let goal = HexCoord::from_offset(10, 5);
        w.spawn_war_band(PlayerId(1), goal, &[UnitKind::Male])
            .expect("spawn");
        let next = run_ai_turn(&w);
        let pos = next.war_band(band).map(|b| b.position).expect("band");
        assert_eq!(pos.distance(goal), start.distance(goal) - 2);
    }

    #[test]
    fn test_ai_attack_on_human_halts_turn() {
        let mut w = world(true);
        let pos = HexCoord::from_offset(5, 5);
        let band = w
            .spawn_war_band(PlayerId(0), pos, &[UnitKind::Warrior; 3])
            .expect("spawn");
        w.spawn_war_band(PlayerId(1), pos.neighbor(0), &[UnitKind::Male])
            .expect("spawn");
        let next = run_ai_turn(&w);
        let pending = next.pending_battle().expect("pending battle");
        assert_eq!(pending.attacker, band);
        assert_eq!(next.current_player_id(), PlayerId(0));
        // Ending the turn is refused until the human decides.
        assert_eq!(crate::turn::end_turn(&next), next);
    }

    #[test]
    fn test_ai_attack_on_ai_resolves() {
        let mut w = world(false);
        let pos = HexCoord::from_offset(5, 5);
        let band = w
            .spawn_war_band(PlayerId(0), pos, &[UnitKind::Warrior; 3])
            .expect("spawn");
        let victim = w
            .spawn_war_band(PlayerId(1), pos.neighbor(0), &[UnitKind::Male])
            .expect("spawn");
        w.found_settlement(PlayerId(1), "Far", HexCoord::from_offset(10, 10), 0)
            .expect("found");
        let next = run_ai_turn(&w);
        assert!(next.war_band(victim).is_none());
        assert_eq!(
            next.war_band(band).map(|b| b.position),
            Some(pos.neighbor(0))
        );
        assert_eq!(next.current_player_id(), PlayerId(1));
    }

    #[test]
    fn test_wounded_band_makes_camp() {
        let mut w = world(false);
        let band = w
            .spawn_war_band(PlayerId(0), HexCoord::from_offset(3, 3), &[UnitKind::Warrior])
            .expect("spawn");
        let unit = w.war_band(band).expect("band").holding.units[0];
        w.unit_mut(unit).expect("unit").hp = 5;
        w.spawn_war_band(PlayerId(1), HexCoord::from_offset(10, 10), &[UnitKind::Male])
            .expect("spawn");
        let next = run_ai_turn(&w);
        assert!(next.war_band(band).is_some_and(|b| b.is_encamped()));
    }

    #[test]
    fn test_large_garrison_splits() {
        let mut w = world(false);
        let home = HexCoord::from_offset(5, 5);
        let s = w
            .found_settlement(PlayerId(0), "Home", home, 1)
            .expect("found");
        w.add_units(
            ContainerRef::Settlement(s),
            &[
                UnitKind::Male,
                UnitKind::Male,
                UnitKind::Female,
                UnitKind::Female,
                UnitKind::Warrior,
                UnitKind::Hunter,
            ],
        )
        .expect("units");
        w.spawn_war_band(PlayerId(1), HexCoord::from_offset(11, 11), &[UnitKind::Male])
            .expect("spawn");
        let next = run_ai_turn(&w);
        let deployed = next
            .war_bands()
            .find(|b| b.owner == PlayerId(0))
            .expect("new band");
        let kinds: Vec<UnitKind> = next
            .units_in(ContainerRef::WarBand(deployed.id))
            .iter()
            .map(|u| u.kind)
            .collect();
        assert_eq!(kinds, vec![UnitKind::Warrior, UnitKind::Hunter]);
    }

    #[test]
    fn test_idle_settlement_orders_laborer_when_poor() {
        let mut w = world(false);
        w.player_mut(PlayerId(0)).expect("player").personality = AiPersonality::Defensive;
        let s = w
            .found_settlement(PlayerId(0), "Home", HexCoord::from_offset(5, 5), 1)
            .expect("found");
        let r = ContainerRef::Settlement(s);
        w.add_units(r, &[UnitKind::Male, UnitKind::Female, UnitKind::Female])
            .expect("units");
        w.holding_mut(r).expect("holding").stockpile = Resources::new(10, 0, 0, 0, 0);
        w.spawn_war_band(PlayerId(1), HexCoord::from_offset(11, 11), &[UnitKind::Male])
            .expect("spawn");
        let next = run_ai_turn(&w);
        // No wood for a warrior, so whatever the coin says a male is ordered.
        let h = next.holding(r).expect("holding");
        let queued: Vec<ProductionItem> = h.queue.iter().map(|o| o.item).collect();
        let produced_male = queued == vec![ProductionItem::Unit(UnitKind::Male)]
            || h.units.len() == 4;
        assert!(produced_male);
    }
}
