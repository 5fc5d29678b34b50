//! Capacity, food, production, gathering, income, research and healing.
//!
//! Each function here is the body of one turn-pipeline stage, applied to
//! every holding of one player.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::container::{Container, ContainerRef, ProductionItem};
use crate::culture::CultureTrait;
use crate::hex::{HexCoord, TileKey};
use crate::player::PlayerId;
use crate::resources::Resource;
use crate::state::WorldState;
use crate::units::UnitId;

/// Workforce bonus per holding for pragmatic players.
pub const PRAGMATIC_WORKFORCE: u32 = 2;
/// Gold bonus per settlement for sedentary players.
pub const SEDENTARY_GOLD: u32 = 2;
/// Research bonus for mystic players.
pub const MYSTIC_RESEARCH: u32 = 2;
/// Healing bonus for pacifist players.
pub const PACIFIST_HEAL: u32 = 1;

// ============================================================================
// Tile drawing
// ============================================================================

/// Territory tiles ordered by their `resource` pool, largest first.
fn tiles_by_pool(state: &WorldState, territory: &BTreeSet<TileKey>, resource: Resource) -> Vec<HexCoord> {
    let mut tiles: Vec<(u32, TileKey)> = territory
        .iter()
        .filter_map(|&k| state.tile_by_key(k).map(|t| (t.pools.get(resource), k)))
        .filter(|(pool, _)| *pool > 0)
        .collect();
    tiles.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    tiles.into_iter().map(|(_, k)| k.coord()).collect()
}

/// Take up to `amount` of `resource` from the territory, largest pool
/// first. Returns what was taken.
pub fn draw_from_territory(
    state: &mut WorldState,
    territory: &BTreeSet<TileKey>,
    resource: Resource,
    amount: u32,
) -> u32 {
    let mut taken = 0;
    for coord in tiles_by_pool(state, territory, resource) {
        if taken == amount {
            break;
        }
        if let Some(tile) = state.tile_mut(coord) {
            taken += tile.take(resource, amount - taken);
        }
    }
    taken
}

// ============================================================================
// Stage 1: capacity
// ============================================================================

/// Clear transient unit flags and recompute every holding's capacity.
pub fn recompute_capacity(state: &mut WorldState, owner: PlayerId) {
    let flagged: Vec<UnitId> = state
        .units()
        .filter(|u| u.owner == owner && (u.sick || u.starved))
        .map(|u| u.id)
        .collect();
    for id in flagged {
        if let Some(unit) = state.unit_mut(id) {
            unit.sick = false;
            unit.starved = false;
        }
    }
    for r in state.holdings_of(owner) {
        state.refresh_capacity(r);
    }
}

// ============================================================================
// Stage 2: food
// ============================================================================

/// Forage, pool food, pay upkeep, and starve holdings that cannot.
pub fn feed(state: &mut WorldState, owner: PlayerId) {
    let damage = state.rules().starvation_damage;
    for r in state.holdings_of(owner) {
        let Some(container) = state.container(r) else {
            continue;
        };
        let position = container.position();
        let territory = container.holding().territory.clone();
        let stocked = container.holding().stockpile.food;
        let food_capacity = container.holding().food_capacity;
        let units: Vec<(UnitId, u32, u32, u32, u32)> = state
            .units_in(r)
            .iter()
            .map(|u| {
                let s = u.stats();
                (u.id, s.forage, s.upkeep, s.carry, u.carried_food)
            })
            .collect();
        if units.is_empty() {
            continue;
        }

        let forage: u32 = units.iter().map(|u| u.1).sum();
        let upkeep: u32 = units.iter().map(|u| u.2).sum();
        let carried: u32 = units.iter().map(|u| u.4).sum();
        let gathered = draw_from_territory(state, &territory, Resource::Food, forage);
        let available = gathered + carried + stocked;

        if available < upkeep {
            for (id, ..) in &units {
                if let Some(unit) = state.unit_mut(*id) {
                    unit.carried_food = 0;
                    unit.damage(damage);
                    unit.starved = true;
                }
            }
            if let Some(h) = state.holding_mut(r) {
                h.stockpile.food = 0;
            }
            if let Some(tile) = state.tile_mut(position) {
                tile.starving_last_turn = true;
            }
            debug!(holder = %r, available, upkeep, "starvation");
            continue;
        }

        let mut surplus = available - upkeep;
        let mut carriers: Vec<(u32, UnitId)> = units.iter().map(|u| (u.3, u.0)).collect();
        carriers.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        for (carry, id) in carriers {
            let load = carry.min(surplus);
            surplus -= load;
            if let Some(unit) = state.unit_mut(id) {
                unit.carried_food = load;
            }
        }
        if let Some(h) = state.holding_mut(r) {
            h.stockpile.food = surplus.min(food_capacity);
        }
        if let Some(tile) = state.tile_mut(position) {
            tile.starving_last_turn = false;
        }
    }
}

// ============================================================================
// Stage 3: production and gathering
// ============================================================================

/// Split each holding's workforce between its production queue and
/// gathering from its territory.
pub fn produce_and_gather(state: &mut WorldState, owner: PlayerId) {
    let pragmatic = state
        .player(owner)
        .is_some_and(|p| p.culture.has(CultureTrait::Pragmatic));
    let rules = state.rules().clone();

    for r in state.holdings_of(owner) {
        let Some(holding) = state.holding(r) else {
            continue;
        };
        let pct = u32::from(holding.focus.production_pct.min(100));
        let gather = holding.focus.gather.clone();
        let territory = holding.territory.clone();
        let labor: u32 = state.units_in(r).iter().map(|u| u.stats().production).sum();
        let workforce = labor + if pragmatic { PRAGMATIC_WORKFORCE } else { 0 };
        let production = workforce * pct / 100;
        let gathering = workforce - production;

        // Production
        let completed = state
            .holding_mut(r)
            .and_then(|h| h.queue.advance(production));
        if let Some(order) = completed {
            match order.item {
                ProductionItem::Unit(kind) => {
                    let id = state.create_unit(owner, kind);
                    if let Some(h) = state.holding_mut(r) {
                        h.units.push(id);
                    }
                    if let ContainerRef::WarBand(band) = r {
                        state.refresh_band_movement(band);
                    }
                }
                ProductionItem::Building(kind) => {
                    if let Some(b) = state.container_mut(r).and_then(|c| c.buildings_mut()) {
                        b.insert(kind);
                    }
                }
            }
            let gained = state
                .container_mut(r)
                .and_then(|c| c.growth_mut())
                .map_or(0, |g| g.add_experience(rules.experience_per_completion, &rules));
            if let Some(h) = state.holding_mut(r) {
                h.pending_expansions += gained;
            }
            state.refresh_capacity(r);
            debug!(holder = %r, item = ?order.item, "production completed");
        }

        // Gathering
        if gather.is_empty() || gathering == 0 {
            continue;
        }
        let count = gather.len() as u32;
        let share = gathering / count;
        let extra = gathering % count;
        for (i, resource) in gather.into_iter().enumerate() {
            let want = if i == 0 { share + extra } else { share };
            let Some(h) = state.holding(r) else {
                break;
            };
            let room = if resource == Resource::Food {
                h.food_capacity.saturating_sub(h.stockpile.food)
            } else {
                h.storage_capacity.saturating_sub(h.stockpile.non_food_total())
            };
            let amount = want.min(room);
            if amount == 0 {
                continue;
            }
            let got = draw_from_territory(state, &territory, resource, amount);
            if let Some(h) = state.holding_mut(r) {
                *h.stockpile.get_mut(resource) += got;
            }
        }
    }
}

// ============================================================================
// Stage 6: income, research, healing
// ============================================================================

/// Gold income, research and culture yield, healing, settlement repair.
pub fn collect_and_heal(state: &mut WorldState, owner: PlayerId) {
    let rules = state.rules().clone();
    let Some(player) = state.player(owner) else {
        return;
    };
    let sedentary = player.culture.has(CultureTrait::Sedentary);
    let mystic = player.culture.has(CultureTrait::Mystic);
    let pacifist = player.culture.has(CultureTrait::Pacifist);
    let holdings = state.holdings_of(owner);

    let mut gold = 0;
    for s in state.settlements().filter(|s| s.owner == owner) {
        gold += rules.settlement_base_income
            + rules.income_per_level * (s.growth.level - 1)
            + s.buildings.iter().map(|b| b.gold_income()).sum::<u32>()
            + if sedentary { SEDENTARY_GOLD } else { 0 };
    }

    let mut research = if mystic { MYSTIC_RESEARCH } else { 0 };
    let mut culture = 0;
    for &r in &holdings {
        for u in state.units_in(r) {
            research += u.stats().research;
            culture += u.stats().culture;
        }
        if let Some(buildings) = state.container(r).and_then(|c| c.buildings()) {
            research += buildings.iter().map(|b| b.research_yield()).sum::<u32>();
            culture += buildings.iter().map(|b| b.culture_yield()).sum::<u32>();
        }
    }

    if let Some(p) = state.player_mut(owner) {
        p.gold += gold;
        p.culture.points += culture;
        p.actions.culture_produced += culture;
        if let Some(done) = p.add_research(research) {
            info!(player = owner.0, tech = ?done, "research completed");
        }
    }

    let territory = state.owner_territory(owner);
    for &r in &holdings {
        let Some(container) = state.container(r) else {
            continue;
        };
        if !territory.contains(&container.position().key()) {
            continue;
        }
        let hut: u32 = container
            .buildings()
            .map_or(0, |b| b.iter().map(|k| k.heal_bonus()).sum());
        let units = state.units_in(r);
        let healers = units
            .iter()
            .filter(|u| u.kind.is_healer())
            .count()
            .min(rules.max_counted_healers as usize) as u32;
        let amount = rules.base_heal
            + healers * rules.healer_heal_bonus
            + hut
            + if pacifist { PACIFIST_HEAL } else { 0 };
        let patients: Vec<UnitId> = units
            .iter()
            .filter(|u| !u.starved && !u.sick && u.hp < u.max_hp)
            .map(|u| u.id)
            .collect();
        for id in patients {
            if let Some(unit) = state.unit_mut(id) {
                unit.heal(amount);
            }
        }
    }

    let damaged: Vec<_> = state
        .settlements()
        .filter(|s| s.owner == owner && s.hp < s.max_hp)
        .map(|s| s.id)
        .collect();
    for id in damaged {
        if let Some(s) = state.settlement_mut(id) {
            s.hp = (s.hp + rules.settlement_repair).min(s.max_hp);
        }
    }
}
