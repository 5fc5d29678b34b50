//! Mutation entry points.
//!
//! Every change a player (human or AI) makes to the world is a [`Command`].
//! [`WorldState::apply`] clones the snapshot, runs the command against the
//! clone and returns it; a rejected command returns the input unchanged.
//! Handlers validate everything before they write, so a rejection never
//! leaves a half-applied change behind.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::combat::resolve_battle;
use crate::container::{
    Camp, Container, ContainerRef, Growth, ProductionItem, ProductionQueue, QueuedOrder,
    WarBandId,
};
use crate::error::{GameError, Result};
use crate::hex::HexCoord;
use crate::pathfinding::{attack_targets, entry_cost, reachable_tiles};
use crate::player::PlayerId;
use crate::resources::Resource;
use crate::state::{missing_container, PendingBattle, WorldState};
use crate::technology::TechId;
use crate::terrain::Terrain;
use crate::turn;
use crate::units::UnitId;

/// Longest allowed holding name, in characters.
pub const MAX_NAME_LEN: usize = 32;

/// How a human settles a pending battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BattleChoice {
    /// Fight it out.
    AutoResolve,
    /// Call the attack off. Only the attacking human may retreat.
    Retreat,
}

/// A player action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Move a war-band to a reachable tile.
    MoveWarBand {
        /// Band to move.
        band: WarBandId,
        /// Destination.
        to: HexCoord,
    },
    /// Spend a pending influence expansion on an adjacent tile.
    ClaimTile {
        /// Settlement or camp claiming.
        holder: ContainerRef,
        /// Tile to claim.
        tile: HexCoord,
    },
    /// Turn a war-band into a stationary camp.
    FoundCamp {
        /// Band to encamp.
        band: WarBandId,
    },
    /// Break camp; camp buildings are lost.
    BreakCamp {
        /// Encamped band.
        band: WarBandId,
    },
    /// Split units off into a new war-band on an adjacent tile.
    DeployArmy {
        /// Source holding.
        from: ContainerRef,
        /// Units to split off.
        units: Vec<UnitId>,
        /// Adjacent free tile.
        to: HexCoord,
    },
    /// Move units between two holdings of the same owner.
    TransferUnits {
        /// Source holding.
        from: ContainerRef,
        /// Destination holding, on the same or an adjacent tile.
        to: ContainerRef,
        /// Units to move.
        units: Vec<UnitId>,
    },
    /// Pay for and queue a unit or building.
    EnqueueProduction {
        /// Producing holding.
        holder: ContainerRef,
        /// What to produce.
        item: ProductionItem,
    },
    /// Remove a queued order, refunding it.
    CancelProduction {
        /// Producing holding.
        holder: ContainerRef,
        /// Queue position.
        index: usize,
    },
    /// Buy an adjacent tile with gold.
    BuyTerritory {
        /// Settlement or camp buying.
        holder: ContainerRef,
        /// Tile to buy.
        tile: HexCoord,
    },
    /// Choose the technology to research.
    SetResearch {
        /// Technology.
        tech: TechId,
    },
    /// Rename a holding.
    Rename {
        /// Holding.
        target: ContainerRef,
        /// New name.
        name: String,
    },
    /// Change a holding's workforce split.
    UpdateFocus {
        /// Holding.
        holder: ContainerRef,
        /// Percent of workforce put into production.
        production_pct: u8,
        /// Resources to gather.
        gather: BTreeSet<Resource>,
    },
    /// Return stockpiled resources to the holding's tile.
    DropResource {
        /// Holding.
        holder: ContainerRef,
        /// Resource.
        resource: Resource,
        /// Amount.
        amount: u32,
    },
    /// Attack an adjacent enemy holding.
    Attack {
        /// Attacking band.
        band: WarBandId,
        /// Enemy holding.
        target: ContainerRef,
    },
    /// Finish the current player's turn and run the turn pipeline.
    EndTurn,
    /// Settle the pending battle.
    ResolveBattle {
        /// Decision.
        choice: BattleChoice,
    },
}

impl WorldState {
    /// Apply a command, returning the new snapshot.
    ///
    /// Rejected commands return an unchanged copy of `self`.
    #[must_use]
    pub fn apply(&self, command: &Command) -> Self {
        match self.try_apply(command) {
            Ok(next) => next,
            Err(e) => {
                debug!(?command, error = %e, "command rejected");
                self.clone()
            }
        }
    }

    /// Apply a command, reporting why it was rejected.
    pub fn try_apply(&self, command: &Command) -> Result<Self> {
        let mut next = self.clone();
        execute(&mut next, command)?;
        Ok(next)
    }
}

/// Run `command` against `state` in place.
///
/// On error `state` is unchanged.
pub fn execute(state: &mut WorldState, command: &Command) -> Result<()> {
    if state.pending_battle().is_some() && !matches!(command, Command::ResolveBattle { .. }) {
        return Err(GameError::rejected("a battle is awaiting resolution"));
    }
    debug!(?command, player = %state.current_player_id(), "applying command");
    match command {
        Command::MoveWarBand { band, to } => move_war_band(state, *band, *to),
        Command::ClaimTile { holder, tile } => claim_tile(state, *holder, *tile),
        Command::FoundCamp { band } => found_camp(state, *band),
        Command::BreakCamp { band } => break_camp(state, *band),
        Command::DeployArmy { from, units, to } => deploy_army(state, *from, units, *to),
        Command::TransferUnits { from, to, units } => transfer_units(state, *from, *to, units),
        Command::EnqueueProduction { holder, item } => enqueue_production(state, *holder, *item),
        Command::CancelProduction { holder, index } => cancel_production(state, *holder, *index),
        Command::BuyTerritory { holder, tile } => buy_territory(state, *holder, *tile),
        Command::SetResearch { tech } => set_research(state, *tech),
        Command::Rename { target, name } => rename(state, *target, name),
        Command::UpdateFocus {
            holder,
            production_pct,
            gather,
        } => update_focus(state, *holder, *production_pct, gather),
        Command::DropResource {
            holder,
            resource,
            amount,
        } => drop_resource(state, *holder, *resource, *amount),
        Command::Attack { band, target } => attack(state, *band, *target),
        Command::EndTurn => {
            turn::run_turn_pipeline(state);
            Ok(())
        }
        Command::ResolveBattle { choice } => resolve_pending(state, *choice),
    }
}

// ============================================================================
// Validation helpers
// ============================================================================

/// Owner of `r`, which must belong to the player whose turn it is.
fn own(state: &WorldState, r: ContainerRef) -> Result<PlayerId> {
    let owner = state
        .container(r)
        .map(|c| c.owner())
        .ok_or_else(|| missing_container(r))?;
    if owner != state.current_player_id() {
        return Err(GameError::rejected(format!(
            "{r} belongs to {owner}, not {}",
            state.current_player_id()
        )));
    }
    Ok(owner)
}

fn own_fixed(state: &WorldState, r: ContainerRef) -> Result<PlayerId> {
    let owner = own(state, r)?;
    if !state.container(r).is_some_and(|c| c.is_fixed()) {
        return Err(GameError::rejected(format!(
            "{r} is not a settlement or camp"
        )));
    }
    Ok(owner)
}

/// An unclaimed land tile next to `holder`'s territory.
fn check_claimable(state: &WorldState, holder: ContainerRef, coord: HexCoord) -> Result<()> {
    let tile = state
        .tile(coord)
        .ok_or_else(|| GameError::TileNotFound(coord.to_string()))?;
    if tile.terrain.is_water() || tile.terrain == Terrain::Volcano {
        return Err(GameError::rejected(format!(
            "{coord} ({:?}) cannot be claimed",
            tile.terrain
        )));
    }
    if let Some(other) = state.territory_owner(coord.key()) {
        return Err(GameError::rejected(format!(
            "{coord} already belongs to {other}"
        )));
    }
    let territory = &state
        .holding(holder)
        .ok_or_else(|| missing_container(holder))?
        .territory;
    if !coord.neighbors().iter().any(|n| territory.contains(&n.key())) {
        return Err(GameError::rejected(format!(
            "{coord} does not border the territory of {holder}"
        )));
    }
    Ok(())
}

fn check_units_held(state: &WorldState, from: ContainerRef, units: &[UnitId]) -> Result<()> {
    if units.is_empty() {
        return Err(GameError::rejected("no units selected"));
    }
    let holding = state.holding(from).ok_or_else(|| missing_container(from))?;
    let distinct: BTreeSet<&UnitId> = units.iter().collect();
    if distinct.len() != units.len() {
        return Err(GameError::rejected("unit listed twice"));
    }
    if let Some(missing) = units.iter().find(|u| !holding.contains(**u)) {
        return Err(GameError::UnitNotFound(missing.0));
    }
    Ok(())
}

/// Delete `r` if it is a war-band left with no units and no camp.
fn drop_if_empty(state: &mut WorldState, r: ContainerRef) {
    if let ContainerRef::WarBand(id) = r {
        let empty = state
            .war_band(id)
            .is_some_and(|b| !b.is_encamped() && b.holding.units.is_empty());
        if empty {
            debug!(band = id.0, "war-band emptied");
            state.remove_war_band(id);
        }
    }
}

/// Push stock a holding can no longer store back into its units and tile.
///
/// Food goes into unit carry first (largest free carry first); whatever is
/// left returns to the tile.
fn spill_excess(state: &mut WorldState, r: ContainerRef) {
    let Some(holding) = state.holding(r).cloned() else {
        return;
    };
    let Some(position) = state.container(r).map(|c| c.position()) else {
        return;
    };
    let mut stock = holding.stockpile;
    let mut returned = crate::resources::Resources::ZERO;

    if stock.food > holding.food_capacity {
        let mut excess = stock.food - holding.food_capacity;
        stock.food = holding.food_capacity;
        let mut carriers: Vec<(u32, UnitId)> = state
            .units_in(r)
            .iter()
            .map(|u| (u.stats().carry.saturating_sub(u.carried_food), u.id))
            .filter(|(free, _)| *free > 0)
            .collect();
        carriers.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        for (free, id) in carriers {
            if excess == 0 {
                break;
            }
            let load = free.min(excess);
            if let Some(unit) = state.unit_mut(id) {
                unit.carried_food += load;
            }
            excess -= load;
        }
        returned.food = excess;
    }

    let mut over = stock.non_food_total().saturating_sub(holding.storage_capacity);
    for resource in [
        Resource::Obsidian,
        Resource::Hides,
        Resource::Stone,
        Resource::Wood,
    ] {
        if over == 0 {
            break;
        }
        let slot = stock.get_mut(resource);
        let shed = (*slot).min(over);
        *slot -= shed;
        *returned.get_mut(resource) += shed;
        over -= shed;
    }

    if let Some(h) = state.holding_mut(r) {
        h.stockpile = stock;
    }
    if !returned.is_empty() {
        if let Some(tile) = state.tile_mut(position) {
            for resource in Resource::ALL {
                tile.give(resource, returned.get(resource));
            }
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

fn move_war_band(state: &mut WorldState, id: WarBandId, to: HexCoord) -> Result<()> {
    let r = ContainerRef::WarBand(id);
    let owner = own(state, r)?;
    let reach = reachable_tiles(state, id);
    let cost = reach
        .cost(to)
        .ok_or_else(|| GameError::rejected(format!("{to} is not reachable by {r}")))?;
    let from = state
        .war_band(id)
        .map(|b| b.position)
        .ok_or(GameError::WarBandNotFound(id.0))?;

    state.vacate(from, r);
    state.occupy(to, r);
    for coord in [from, to] {
        if let Some(tile) = state.tile_mut(coord) {
            tile.turns_occupied = 0;
        }
    }
    if let Some(band) = state.war_band_mut(id) {
        band.position = to;
        band.movement -= cost;
        band.moved_this_turn = true;
        band.holding.territory = std::iter::once(to.key()).collect();
    }
    if let Some(player) = state.player_mut(owner) {
        player.actions.moves += 1;
    }
    debug!(band = id.0, %from, %to, cost, "war-band moved");
    Ok(())
}

fn claim_tile(state: &mut WorldState, holder: ContainerRef, coord: HexCoord) -> Result<()> {
    own_fixed(state, holder)?;
    let pending = state
        .holding(holder)
        .map_or(0, |h| h.pending_expansions);
    if pending == 0 {
        return Err(GameError::rejected(format!(
            "{holder} has no pending expansions"
        )));
    }
    check_claimable(state, holder, coord)?;
    if let Some(h) = state.holding_mut(holder) {
        h.pending_expansions -= 1;
        h.territory.insert(coord.key());
    }
    Ok(())
}

fn found_camp(state: &mut WorldState, id: WarBandId) -> Result<()> {
    let r = ContainerRef::WarBand(id);
    let owner = own(state, r)?;
    let band = state.war_band(id).ok_or(GameError::WarBandNotFound(id.0))?;
    if band.is_encamped() {
        return Err(GameError::rejected(format!("{r} is already encamped")));
    }
    if band.movement == 0 {
        return Err(GameError::rejected(format!("{r} has no movement left")));
    }
    if band.holding.units.is_empty() {
        return Err(GameError::rejected(format!("{r} has no units")));
    }
    let position = band.position;
    let territory = state.claimable_around(position, 1);
    let slots = state.rules().starting_building_slots;

    if let Some(band) = state.war_band_mut(id) {
        band.camp = Some(Camp {
            growth: Growth::new(slots),
            buildings: BTreeSet::new(),
        });
        band.movement = 0;
        band.holding.territory = territory;
        band.holding.pending_expansions = 0;
    }
    state.refresh_capacity(r);
    if let Some(player) = state.player_mut(owner) {
        player.actions.camps_founded += 1;
    }
    debug!(band = id.0, %position, "camp founded");
    Ok(())
}

fn break_camp(state: &mut WorldState, id: WarBandId) -> Result<()> {
    let r = ContainerRef::WarBand(id);
    let owner = own(state, r)?;
    let band = state.war_band(id).ok_or(GameError::WarBandNotFound(id.0))?;
    if !band.is_encamped() {
        return Err(GameError::rejected(format!("{r} is not encamped")));
    }
    let position = band.position;
    if let Some(band) = state.war_band_mut(id) {
        band.camp = None;
        band.holding.territory = std::iter::once(position.key()).collect();
        band.holding.pending_expansions = 0;
        // A mobile band cannot finish buildings; their orders are refunded.
        let orders: Vec<QueuedOrder> = band.holding.queue.iter().cloned().collect();
        let mut queue = ProductionQueue::default();
        for order in orders {
            match order.item {
                ProductionItem::Unit(_) => queue.push(order),
                ProductionItem::Building(_) => band.holding.stockpile.add(&order.paid),
            }
        }
        band.holding.queue = queue;
    }
    state.refresh_band_movement(id);
    state.refresh_capacity(r);
    spill_excess(state, r);
    if let Some(player) = state.player_mut(owner) {
        player.actions.camps_broken += 1;
    }
    debug!(band = id.0, %position, "camp broken");
    Ok(())
}

fn deploy_army(
    state: &mut WorldState,
    from: ContainerRef,
    units: &[UnitId],
    to: HexCoord,
) -> Result<()> {
    let owner = own(state, from)?;
    check_units_held(state, from, units)?;
    let origin = state
        .container(from)
        .map(|c| c.position())
        .ok_or_else(|| missing_container(from))?;
    if !origin.is_adjacent(to) {
        return Err(GameError::rejected(format!(
            "{to} is not adjacent to {from}"
        )));
    }
    let tile = state
        .tile(to)
        .ok_or_else(|| GameError::TileNotFound(to.to_string()))?;
    if let Some(occupant) = tile.occupant {
        return Err(GameError::rejected(format!(
            "{to} already occupied by {occupant}"
        )));
    }
    let large = units
        .iter()
        .filter_map(|id| state.unit(*id))
        .any(|u| u.kind.is_large());
    let player = state
        .player(owner)
        .ok_or(GameError::PlayerNotFound(owner.0))?;
    if entry_cost(state, player, large, to).is_none() {
        return Err(GameError::rejected(format!("{to} cannot be entered")));
    }

    if let Some(h) = state.holding_mut(from) {
        h.units.retain(|u| !units.contains(u));
    }
    let band = state.insert_war_band(owner, to, units.to_vec());
    if let ContainerRef::WarBand(id) = from {
        state.refresh_band_movement(id);
    }
    state.refresh_capacity(from);
    spill_excess(state, from);
    drop_if_empty(state, from);
    debug!(%from, band = band.0, %to, count = units.len(), "army deployed");
    Ok(())
}

fn transfer_units(
    state: &mut WorldState,
    from: ContainerRef,
    to: ContainerRef,
    units: &[UnitId],
) -> Result<()> {
    if from == to {
        return Err(GameError::rejected("source and destination are the same"));
    }
    own(state, from)?;
    own(state, to)?;
    check_units_held(state, from, units)?;
    let a = state
        .container(from)
        .map(|c| c.position())
        .ok_or_else(|| missing_container(from))?;
    let b = state
        .container(to)
        .map(|c| c.position())
        .ok_or_else(|| missing_container(to))?;
    if a.distance(b) > 1 {
        return Err(GameError::rejected(format!(
            "{from} and {to} are not adjacent"
        )));
    }

    if let Some(h) = state.holding_mut(from) {
        h.units.retain(|u| !units.contains(u));
    }
    if let Some(h) = state.holding_mut(to) {
        h.units.extend(units.iter().copied());
    }
    for r in [from, to] {
        if let ContainerRef::WarBand(id) = r {
            state.refresh_band_movement(id);
        }
        state.refresh_capacity(r);
    }
    spill_excess(state, from);
    drop_if_empty(state, from);
    Ok(())
}

fn enqueue_production(state: &mut WorldState, holder: ContainerRef, item: ProductionItem) -> Result<()> {
    let owner = own(state, holder)?;
    let cost = item
        .cost()
        .ok_or_else(|| GameError::rejected(format!("{item:?} cannot be ordered")))?;
    let player = state
        .player(owner)
        .ok_or(GameError::PlayerNotFound(owner.0))?;
    if !player.knows(item.required_tech()) {
        return Err(GameError::rejected(format!(
            "{item:?} requires {:?}",
            item.required_tech()
        )));
    }
    let container = state
        .container(holder)
        .ok_or_else(|| missing_container(holder))?;
    let holding = container.holding();

    let mut sacrifice = None;
    match item {
        ProductionItem::Building(kind) => {
            let (Some(buildings), Some(growth)) = (container.buildings(), container.growth()) else {
                return Err(GameError::rejected(format!(
                    "{holder} cannot construct buildings"
                )));
            };
            if buildings.contains(&kind) || holding.queue.contains_building(kind) {
                return Err(GameError::rejected(format!(
                    "{kind:?} already built or queued at {holder}"
                )));
            }
            let used = buildings.len() + holding.queue.queued_buildings();
            if used as u32 >= growth.building_slots {
                return Err(GameError::rejected(format!(
                    "{holder} has no free building slot"
                )));
            }
        }
        ProductionItem::Unit(kind) => {
            if let Some(needed) = kind.stats().sacrifice {
                sacrifice = holding
                    .units
                    .iter()
                    .filter_map(|id| state.unit(*id))
                    .filter(|u| u.kind == needed)
                    .map(|u| u.id)
                    .min();
                if sacrifice.is_none() {
                    return Err(GameError::rejected(format!(
                        "{kind:?} requires a {needed:?} at {holder}"
                    )));
                }
            }
        }
    }
    if !holding.stockpile.covers(&cost.resources) {
        return Err(GameError::rejected(format!(
            "{holder} cannot afford {item:?}"
        )));
    }

    let sacrificed = sacrifice.and_then(|id| state.take_unit(id));
    if let Some(h) = state.holding_mut(holder) {
        h.stockpile.try_spend(&cost.resources);
        if let Some(unit) = &sacrificed {
            h.remove_unit(unit.id);
        }
        h.queue.push(QueuedOrder {
            item,
            progress: 0,
            paid: cost.resources,
            sacrificed,
        });
    }
    if let ContainerRef::WarBand(id) = holder {
        state.refresh_band_movement(id);
    }
    state.refresh_capacity(holder);
    debug!(%holder, ?item, "production queued");
    Ok(())
}

fn cancel_production(state: &mut WorldState, holder: ContainerRef, index: usize) -> Result<()> {
    own(state, holder)?;
    let len = state.holding(holder).map_or(0, |h| h.queue.len());
    if index >= len {
        return Err(GameError::rejected(format!(
            "{holder} has no order at position {index}"
        )));
    }
    let order = state
        .holding_mut(holder)
        .and_then(|h| h.queue.remove(index))
        .ok_or_else(|| missing_container(holder))?;
    let restored = order.sacrificed.clone();
    if let Some(h) = state.holding_mut(holder) {
        h.stockpile.add(&order.paid);
        if let Some(unit) = &restored {
            h.units.push(unit.id);
        }
    }
    if let Some(unit) = restored {
        state.insert_unit(unit);
    }
    if let ContainerRef::WarBand(id) = holder {
        state.refresh_band_movement(id);
    }
    state.refresh_capacity(holder);
    debug!(%holder, item = ?order.item, "production cancelled");
    Ok(())
}

fn buy_territory(state: &mut WorldState, holder: ContainerRef, coord: HexCoord) -> Result<()> {
    let owner = own_fixed(state, holder)?;
    check_claimable(state, holder, coord)?;
    let owned = state
        .holding(holder)
        .map_or(0, |h| h.territory.len() as u32);
    let price = state.rules().territory_price(owned);
    let gold = state.player(owner).map_or(0, |p| p.gold);
    if gold < price {
        return Err(GameError::rejected(format!(
            "{coord} costs {price} gold, {owner} has {gold}"
        )));
    }
    if let Some(p) = state.player_mut(owner) {
        p.gold -= price;
    }
    if let Some(h) = state.holding_mut(holder) {
        h.territory.insert(coord.key());
    }
    debug!(%holder, %coord, price, "territory bought");
    Ok(())
}

fn set_research(state: &mut WorldState, tech: TechId) -> Result<()> {
    let id = state.current_player_id();
    let player = state.player(id).ok_or(GameError::PlayerNotFound(id.0))?;
    if player.research == Some(tech) {
        return Err(GameError::rejected(format!("already researching {tech:?}")));
    }
    if !tech.is_available(&player.techs) {
        return Err(GameError::rejected(format!("{tech:?} is not available")));
    }
    let Some(player) = state.player_mut(id) else {
        return Err(GameError::PlayerNotFound(id.0));
    };
    // Progress on an abandoned technology is kept as free research.
    player.free_research += player.research_progress;
    player.research_progress = 0;
    player.research = Some(tech);
    let banked = std::mem::take(&mut player.free_research);
    if let Some(done) = player.add_research(banked) {
        info!(player = id.0, tech = ?done, "research completed");
    }
    Ok(())
}

fn rename(state: &mut WorldState, target: ContainerRef, name: &str) -> Result<()> {
    own(state, target)?;
    let name = name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(GameError::rejected(format!(
            "name must be 1 to {MAX_NAME_LEN} characters"
        )));
    }
    if let Some(c) = state.container_mut(target) {
        c.set_name(name.to_string());
    }
    Ok(())
}

fn update_focus(
    state: &mut WorldState,
    holder: ContainerRef,
    production_pct: u8,
    gather: &BTreeSet<Resource>,
) -> Result<()> {
    own(state, holder)?;
    if production_pct > 100 {
        return Err(GameError::rejected(format!(
            "production share {production_pct} is above 100"
        )));
    }
    if let Some(h) = state.holding_mut(holder) {
        h.focus.production_pct = production_pct;
        h.focus.gather = gather.clone();
    }
    Ok(())
}

fn drop_resource(
    state: &mut WorldState,
    holder: ContainerRef,
    resource: Resource,
    amount: u32,
) -> Result<()> {
    own(state, holder)?;
    let (stock, position) = state
        .container(holder)
        .map(|c| (c.holding().stockpile.get(resource), c.position()))
        .ok_or_else(|| missing_container(holder))?;
    if amount == 0 || amount > stock {
        return Err(GameError::rejected(format!(
            "{holder} holds {stock} {resource:?}, cannot drop {amount}"
        )));
    }
    if let Some(h) = state.holding_mut(holder) {
        *h.stockpile.get_mut(resource) -= amount;
    }
    if let Some(tile) = state.tile_mut(position) {
        tile.give(resource, amount);
    }
    Ok(())
}

fn attack(state: &mut WorldState, band: WarBandId, target: ContainerRef) -> Result<()> {
    let attacker = ContainerRef::WarBand(band);
    let owner = own(state, attacker)?;
    if !attack_targets(state, band).contains(&target) {
        return Err(GameError::rejected(format!(
            "{attacker} cannot attack {target}"
        )));
    }
    let defender_owner = state
        .container(target)
        .map(|c| c.owner())
        .ok_or_else(|| missing_container(target))?;
    let human_involved = [owner, defender_owner]
        .iter()
        .any(|p| state.player(*p).is_some_and(|p| p.is_human));

    if human_involved {
        state.set_pending_battle(Some(PendingBattle {
            attacker: band,
            defender: target,
        }));
        info!(%attacker, %target, "battle pending");
        Ok(())
    } else {
        resolve_battle(state, band, target).map(|_| ())
    }
}

fn resolve_pending(state: &mut WorldState, choice: BattleChoice) -> Result<()> {
    let pending = *state
        .pending_battle()
        .ok_or_else(|| GameError::rejected("no battle is pending"))?;
    match choice {
        BattleChoice::AutoResolve => {
            resolve_battle(state, pending.attacker, pending.defender)?;
        }
        BattleChoice::Retreat => {
            let attacker_human = state
                .war_band(pending.attacker)
                .and_then(|b| state.player(b.owner))
                .is_some_and(|p| p.is_human);
            if !attacker_human {
                return Err(GameError::rejected("a defender cannot retreat"));
            }
            state.set_pending_battle(None);
            if let Some(b) = state.war_band_mut(pending.attacker) {
                b.movement = 0;
            }
            info!(attacker = pending.attacker.0, "attack called off");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buildings::BuildingKind;
    use crate::player::Player;
    use crate::resources::Resources;
    use crate::rules::GameRules;
    use crate::units::UnitKind;

    fn world() -> WorldState {
        let mut w = WorldState::blank(10, 10, Terrain::Plains, 5, GameRules::default());
        w.add_player(Player::new(PlayerId(0), "Human", true));
        w.add_player(Player::new(PlayerId(0), "Ai", false));
        w
    }

    fn home() -> HexCoord {
        HexCoord::from_offset(4, 4)
    }

    fn settlement(w: &mut WorldState) -> ContainerRef {
        let id = w
            .found_settlement(PlayerId(0), "Home", home(), 1)
            .expect("found");
        ContainerRef::Settlement(id)
    }

    #[test]
    fn test_rejected_command_returns_unchanged_state() {
        let w = world();
        let next = w.apply(&Command::MoveWarBand {
            band: WarBandId(999),
            to: home(),
        });
        assert_eq!(next, w);
        assert!(matches!(
            w.try_apply(&Command::MoveWarBand {
                band: WarBandId(999),
                to: home()
            }),
            Err(GameError::WarBandNotFound(999))
        ));
    }

    #[test]
    fn test_move_spends_movement() {
        let mut w = world();
        let band = w
            .spawn_war_band(PlayerId(0), home(), &[UnitKind::Warrior])
            .expect("spawn");
        let to = home().neighbor(0);
        let next = w
            .try_apply(&Command::MoveWarBand { band, to })
            .expect("move");
        let b = next.war_band(band).expect("band");
        assert_eq!(b.position, to);
        assert_eq!(b.movement, 1);
        assert!(b.moved_this_turn);
        assert_eq!(next.tile(home()).and_then(|t| t.occupant), None);
        assert_eq!(
            next.tile(to).and_then(|t| t.occupant),
            Some(ContainerRef::WarBand(band))
        );
        assert_eq!(next.player(PlayerId(0)).map(|p| p.actions.moves), Some(1));
        // The input snapshot is untouched.
        assert_eq!(w.war_band(band).map(|b| b.position), Some(home()));
    }

    #[test]
    fn test_cannot_command_other_players_units() {
        let mut w = world();
        let band = w
            .spawn_war_band(PlayerId(1), home(), &[UnitKind::Warrior])
            .expect("spawn");
        let result = w.try_apply(&Command::MoveWarBand {
            band,
            to: home().neighbor(0),
        });
        assert!(matches!(result, Err(GameError::CommandRejected(_))));
    }

    #[test]
    fn test_claim_tile_consumes_expansion() {
        let mut w = world();
        let s = settlement(&mut w);
        w.holding_mut(s).expect("holding").pending_expansions = 1;
        let target = home().neighbor(0).neighbor(0);
        let before = w.clone();
        let next = w
            .try_apply(&Command::ClaimTile {
                holder: s,
                tile: target,
            })
            .expect("claim");
        let h = next.holding(s).expect("holding");
        assert_eq!(h.pending_expansions, 0);
        assert!(h.territory.contains(&target.key()));
        assert_eq!(h.territory.len(), 8);

        // A second claim has no expansion left to spend.
        let again = next.try_apply(&Command::ClaimTile {
            holder: s,
            tile: home().neighbor(3).neighbor(3),
        });
        assert!(again.is_err());
        assert_eq!(before.holding(s).map(|h| h.territory.len()), Some(7));
    }

    #[test]
    fn test_enqueue_and_cancel_restores_everything() {
        let mut w = world();
        let s = settlement(&mut w);
        w.add_units(s, &[UnitKind::Male, UnitKind::Male])
            .expect("units");
        w.holding_mut(s).expect("holding").stockpile = Resources::new(0, 10, 0, 0, 0);
        let before = w.clone();

        let queued = w
            .try_apply(&Command::EnqueueProduction {
                holder: s,
                item: ProductionItem::Unit(UnitKind::Warrior),
            })
            .expect("enqueue");
        let h = queued.holding(s).expect("holding");
        assert_eq!(h.units.len(), 1, "one male sacrificed");
        assert_eq!(h.stockpile.wood, 0);
        assert_eq!(h.queue.len(), 1);

        let cancelled = queued
            .try_apply(&Command::CancelProduction {
                holder: s,
                index: 0,
            })
            .expect("cancel");
        let h = cancelled.holding(s).expect("holding");
        assert_eq!(h.stockpile.wood, 10);
        assert!(h.queue.is_empty());
        let mut units = h.units.clone();
        units.sort();
        let mut original = before.holding(s).expect("holding").units.clone();
        original.sort();
        assert_eq!(units, original);
        for id in &units {
            assert_eq!(cancelled.unit(*id), before.unit(*id));
        }
    }

    #[test]
    fn test_enqueue_unaffordable_is_noop() {
        let mut w = world();
        let s = settlement(&mut w);
        w.add_units(s, &[UnitKind::Male]).expect("units");
        let next = w.apply(&Command::EnqueueProduction {
            holder: s,
            item: ProductionItem::Unit(UnitKind::Warrior),
        });
        assert_eq!(next, w);
    }

    #[test]
    fn test_building_slots_and_tech() {
        let mut w = world();
        let s = settlement(&mut w);
        w.holding_mut(s).expect("holding").stockpile = Resources::new(100, 100, 100, 100, 100);
        // Granary needs pottery.
        assert!(w
            .try_apply(&Command::EnqueueProduction {
                holder: s,
                item: ProductionItem::Building(BuildingKind::Granary),
            })
            .is_err());
        let w = w
            .try_apply(&Command::EnqueueProduction {
                holder: s,
                item: ProductionItem::Building(BuildingKind::Storehouse),
            })
            .expect("storehouse");
        assert!(w
            .try_apply(&Command::EnqueueProduction {
                holder: s,
                item: ProductionItem::Building(BuildingKind::Storehouse),
            })
            .is_err());
        let w = w
            .try_apply(&Command::EnqueueProduction {
                holder: s,
                item: ProductionItem::Building(BuildingKind::Well),
            })
            .expect("well");
        // Two slots are used.
        assert!(w
            .try_apply(&Command::EnqueueProduction {
                holder: s,
                item: ProductionItem::Building(BuildingKind::HealersHut),
            })
            .is_err());
    }

    #[test]
    fn test_buy_territory_charges_gold() {
        let mut w = world();
        let s = settlement(&mut w);
        w.player_mut(PlayerId(0)).expect("player").gold = 20;
        let target = home().neighbor(1).neighbor(1);
        // Seven tiles owned: the next costs 10 + 5 * 7 = 45.
        assert!(w
            .try_apply(&Command::BuyTerritory {
                holder: s,
                tile: target,
            })
            .is_err());
        w.player_mut(PlayerId(0)).expect("player").gold = 45;
        let next = w
            .try_apply(&Command::BuyTerritory {
                holder: s,
                tile: target,
            })
            .expect("buy");
        assert_eq!(next.player(PlayerId(0)).map(|p| p.gold), Some(0));
        assert!(next
            .holding(s)
            .is_some_and(|h| h.territory.contains(&target.key())));
    }

    #[test]
    fn test_found_and_break_camp() {
        let mut w = world();
        let pos = HexCoord::from_offset(7, 7);
        let band = w
            .spawn_war_band(PlayerId(0), pos, &[UnitKind::Male, UnitKind::Female])
            .expect("spawn");
        let camped = w
            .try_apply(&Command::FoundCamp { band })
            .expect("camp");
        let b = camped.war_band(band).expect("band");
        assert!(b.is_encamped());
        assert_eq!(b.movement, 0);
        assert_eq!(b.holding.territory.len(), 7);
        assert_eq!(b.holding.storage_capacity, 30 + 12);
        assert!(reachable_tiles(&camped, band).is_empty());

        let broken = camped
            .try_apply(&Command::BreakCamp { band })
            .expect("break");
        let b = broken.war_band(band).expect("band");
        assert!(!b.is_encamped());
        assert_eq!(b.holding.territory.len(), 1);
        let p = broken.player(PlayerId(0)).expect("player");
        assert_eq!(p.actions.camps_founded, 1);
        assert_eq!(p.actions.camps_broken, 1);
    }

    #[test]
    fn test_deploy_army_creates_band_without_movement() {
        let mut w = world();
        let s = settlement(&mut w);
        let ids = w
            .add_units(s, &[UnitKind::Warrior, UnitKind::Warrior, UnitKind::Male])
            .expect("units");
        let to = home().neighbor(2);
        let next = w
            .try_apply(&Command::DeployArmy {
                from: s,
                units: ids[..2].to_vec(),
                to,
            })
            .expect("deploy");
        let band = next
            .war_bands()
            .find(|b| b.position == to)
            .expect("new band");
        assert_eq!(band.holding.units, ids[..2].to_vec());
        assert_eq!(band.movement, 0);
        assert_eq!(band.max_movement, 2);
        assert_eq!(next.holding(s).map(|h| h.units.clone()), Some(vec![ids[2]]));

        // Not adjacent.
        assert!(w
            .try_apply(&Command::DeployArmy {
                from: s,
                units: vec![ids[2]],
                to: to.neighbor(2),
            })
            .is_err());
    }

    #[test]
    fn test_transfer_empties_and_deletes_band() {
        let mut w = world();
        let s = settlement(&mut w);
        let pos = home().neighbor(0);
        let band = w
            .spawn_war_band(PlayerId(0), pos, &[UnitKind::Warrior])
            .expect("spawn");
        let unit = w.war_band(band).expect("band").holding.units[0];
        let next = w
            .try_apply(&Command::TransferUnits {
                from: ContainerRef::WarBand(band),
                to: s,
                units: vec![unit],
            })
            .expect("transfer");
        assert!(next.war_band(band).is_none());
        assert_eq!(next.tile(pos).and_then(|t| t.occupant), None);
        assert!(next.holding(s).is_some_and(|h| h.contains(unit)));
    }

    #[test]
    fn test_set_research_applies_banked_points() {
        let mut w = world();
        w.player_mut(PlayerId(0)).expect("player").free_research = 18;
        let next = w
            .try_apply(&Command::SetResearch {
                tech: TechId::Pottery,
            })
            .expect("research");
        let p = next.player(PlayerId(0)).expect("player");
        assert!(p.techs.contains(&TechId::Pottery));
        assert_eq!(p.free_research, 3);
        assert_eq!(p.research, None);
        // Prerequisite missing.
        assert!(next
            .try_apply(&Command::SetResearch {
                tech: TechId::Domestication
            })
            .is_err());
    }

    #[test]
    fn test_rename_and_focus_validation() {
        let mut w = world();
        let s = settlement(&mut w);
        let next = w
            .try_apply(&Command::Rename {
                target: s,
                name: "  Riverside ".into(),
            })
            .expect("rename");
        assert_eq!(next.container(s).map(|c| c.name().to_string()), Some("Riverside".into()));
        assert!(w
            .try_apply(&Command::Rename {
                target: s,
                name: "   ".into()
            })
            .is_err());
        assert!(w
            .try_apply(&Command::UpdateFocus {
                holder: s,
                production_pct: 101,
                gather: BTreeSet::new(),
            })
            .is_err());
    }

    #[test]
    fn test_drop_resource_capped_at_tile_max() {
        let mut w = world();
        let s = settlement(&mut w);
        w.holding_mut(s).expect("holding").stockpile.food = 30;
        w.tile_mut(home()).expect("tile").pools.food = 5;
        let next = w
            .try_apply(&Command::DropResource {
                holder: s,
                resource: Resource::Food,
                amount: 20,
            })
            .expect("drop");
        assert_eq!(next.holding(s).map(|h| h.stockpile.food), Some(10));
        assert_eq!(next.tile(home()).map(|t| t.pools.food), Some(12));
    }

    #[test]
    fn test_attack_on_human_waits_for_decision() {
        let mut w = world();
        // Player 1 (AI) attacks player 0 (human).
        w.set_current_player(1);
        let a_pos = HexCoord::from_offset(2, 2);
        let attacker = w
            .spawn_war_band(PlayerId(1), a_pos, &[UnitKind::Warrior])
            .expect("spawn");
        let target = w
            .spawn_war_band(PlayerId(0), a_pos.neighbor(0), &[UnitKind::Male])
            .expect("spawn");
        let pending = w
            .try_apply(&Command::Attack {
                band: attacker,
                target: ContainerRef::WarBand(target),
            })
            .expect("attack");
        assert!(pending.pending_battle().is_some());
        assert!(pending.try_apply(&Command::EndTurn).is_err());
        // The human defender may not retreat.
        assert!(pending
            .try_apply(&Command::ResolveBattle {
                choice: BattleChoice::Retreat
            })
            .is_err());
        let resolved = pending
            .try_apply(&Command::ResolveBattle {
                choice: BattleChoice::AutoResolve,
            })
            .expect("resolve");
        assert!(resolved.pending_battle().is_none());
        assert!(resolved.last_battle().is_some());
    }

    #[test]
    fn test_ai_versus_ai_resolves_immediately() {
        let mut w = WorldState::blank(10, 10, Terrain::Plains, 5, GameRules::default());
        w.add_player(Player::new(PlayerId(0), "A", false));
        w.add_player(Player::new(PlayerId(0), "B", false));
        let a_pos = HexCoord::from_offset(2, 2);
        let attacker = w
            .spawn_war_band(PlayerId(0), a_pos, &[UnitKind::Warrior])
            .expect("spawn");
        let target = w
            .spawn_war_band(PlayerId(1), a_pos.neighbor(0), &[UnitKind::Male])
            .expect("spawn");
        let next = w
            .try_apply(&Command::Attack {
                band: attacker,
                target: ContainerRef::WarBand(target),
            })
            .expect("attack");
        assert!(next.pending_battle().is_none());
        assert!(next.last_battle().is_some());
    }

    #[test]
    fn test_human_attacker_may_retreat() {
        let mut w = world();
        let a_pos = HexCoord::from_offset(2, 2);
        let attacker = w
            .spawn_war_band(PlayerId(0), a_pos, &[UnitKind::Warrior])
            .expect("spawn");
        let target = w
            .spawn_war_band(PlayerId(1), a_pos.neighbor(0), &[UnitKind::Male])
            .expect("spawn");
        let pending = w
            .try_apply(&Command::Attack {
                band: attacker,
                target: ContainerRef::WarBand(target),
            })
            .expect("attack");
        let retreated = pending
            .try_apply(&Command::ResolveBattle {
                choice: BattleChoice::Retreat,
            })
            .expect("retreat");
        assert!(retreated.pending_battle().is_none());
        assert_eq!(retreated.war_band(attacker).map(|b| b.movement), Some(0));
        assert!(retreated.war_band(target).is_some());
    }
}
