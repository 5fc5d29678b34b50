//! The authoritative world snapshot.
//!
//! A [`WorldState`] is a value: every mutation entry point takes a snapshot
//! and returns a new one. The large tables sit behind [`Arc`] so cloning a
//! snapshot is cheap and a mutation only copies the tables it touches
//! (`Arc::make_mut`).
//!
//! Tables are `BTreeMap`s keyed by id so that every iteration is in a
//! deterministic order.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::sync::Arc;

use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::combat::BattleReport;
use crate::container::{
    Container, ContainerRef, Growth, Holding, Settlement, SettlementId, WarBand, WarBandId,
};
use crate::culture::CultureTrait;
use crate::error::{GameError, Result};
use crate::hex::{HexCoord, TileKey};
use crate::math::{fnv1a_64_extend, FNV_OFFSET_BASIS};
use crate::player::{Player, PlayerId};
use crate::resources::{Resource, Resources};
use crate::rules::GameRules;
use crate::terrain::Terrain;
use crate::units::{Unit, UnitId, UnitKind};

// ============================================================================
// Tile
// ============================================================================

/// One hex of the map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    /// Axial coordinate.
    pub coord: HexCoord,
    /// Terrain.
    pub terrain: Terrain,
    /// Settlement or war-band standing here.
    pub occupant: Option<ContainerRef>,
    /// Resource pools; each within `[0, terrain max]`.
    pub pools: Resources,
    /// The holding here could not pay upkeep last food stage.
    pub starving_last_turn: bool,
    /// Disease struck the holding here last disease stage.
    pub sick_last_turn: bool,
    /// Consecutive turns a war-band has sat here without moving.
    pub turns_occupied: u32,
}

impl Tile {
    /// A tile with full resource pools.
    #[must_use]
    pub fn new(coord: HexCoord, terrain: Terrain) -> Self {
        Self {
            coord,
            terrain,
            occupant: None,
            pools: terrain.resource_max(),
            starving_last_turn: false,
            sick_last_turn: false,
            turns_occupied: 0,
        }
    }

    /// Change terrain and reset pools to the new maxima.
    pub fn set_terrain(&mut self, terrain: Terrain) {
        self.terrain = terrain;
        self.pools = terrain.resource_max();
    }

    /// Regrow renewable pools by `pct` percent of their maximum (at least 1).
    pub fn regrow(&mut self, pct: u32) {
        let max = self.terrain.resource_max();
        for r in Resource::ALL {
            if !r.is_renewable() {
                continue;
            }
            let cap = max.get(r);
            if cap == 0 {
                continue;
            }
            let step = (cap * pct / 100).max(1);
            let slot = self.pools.get_mut(r);
            *slot = (*slot + step).min(cap);
        }
    }

    /// Take up to `amount` of `resource`; returns what was taken.
    pub fn take(&mut self, resource: Resource, amount: u32) -> u32 {
        let slot = self.pools.get_mut(resource);
        let taken = (*slot).min(amount);
        *slot -= taken;
        taken
    }

    /// Return `amount` of `resource`, capped at the terrain maximum.
    pub fn give(&mut self, resource: Resource, amount: u32) {
        let cap = self.terrain.max_of(resource);
        let slot = self.pools.get_mut(resource);
        *slot = (*slot + amount).min(cap);
    }
}

/// A battle involving a human player, awaiting that player's decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingBattle {
    /// Attacking war-band.
    pub attacker: WarBandId,
    /// Defending holding.
    pub defender: ContainerRef,
}

// ============================================================================
// WorldState
// ============================================================================

/// Complete game snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    width: u32,
    height: u32,
    tiles: Arc<Vec<Tile>>,
    units: Arc<BTreeMap<UnitId, Unit>>,
    settlements: Arc<BTreeMap<SettlementId, Settlement>>,
    war_bands: Arc<BTreeMap<WarBandId, WarBand>>,
    players: Arc<Vec<Player>>,
    current_player: usize,
    turn: u32,
    pending_battle: Option<PendingBattle>,
    last_battle: Option<Arc<BattleReport>>,
    next_id: u32,
    seed: u64,
    rng: ChaCha8Rng,
    rules: Arc<GameRules>,
}

impl WorldState {
    /// Build a snapshot from a generated grid.
    ///
    /// `tiles` must be in row-major odd-row offset order.
    pub fn from_tiles(
        width: u32,
        height: u32,
        tiles: Vec<Tile>,
        seed: u64,
        rng: ChaCha8Rng,
        rules: GameRules,
    ) -> Result<Self> {
        if tiles.len() != (width as usize) * (height as usize) {
            return Err(GameError::InvalidState(format!(
                "grid has {} tiles, expected {}x{}",
                tiles.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            tiles: Arc::new(tiles),
            units: Arc::default(),
            settlements: Arc::default(),
            war_bands: Arc::default(),
            players: Arc::default(),
            current_player: 0,
            turn: 1,
            pending_battle: None,
            last_battle: None,
            next_id: 1,
            seed,
            rng,
            rules: Arc::new(rules),
        })
    }

    /// A map of uniform terrain with no players. Used for scenarios.
    #[must_use]
    pub fn blank(width: u32, height: u32, terrain: Terrain, seed: u64, rules: GameRules) -> Self {
        use rand::SeedableRng;

        let tiles = offset_coords(width, height)
            .map(|c| Tile::new(c, terrain))
            .collect();
        Self {
            width,
            height,
            tiles: Arc::new(tiles),
            units: Arc::default(),
            settlements: Arc::default(),
            war_bands: Arc::default(),
            players: Arc::default(),
            current_player: 0,
            turn: 1,
            pending_battle: None,
            last_battle: None,
            next_id: 1,
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
            rules: Arc::new(rules),
        }
    }

    // ------------------------------------------------------------------
    // Read access
    // ------------------------------------------------------------------

    /// Map width in columns.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Map height in rows.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Round counter, starting at 1.
    #[must_use]
    pub const fn turn(&self) -> u32 {
        self.turn
    }

    /// Seed the session was started with.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Game rules.
    #[must_use]
    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    /// Battle awaiting a human decision.
    #[must_use]
    pub const fn pending_battle(&self) -> Option<&PendingBattle> {
        self.pending_battle.as_ref()
    }

    /// Report of the most recently resolved battle.
    #[must_use]
    pub fn last_battle(&self) -> Option<&BattleReport> {
        self.last_battle.as_deref()
    }

    /// All tiles in row-major offset order.
    #[must_use]
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Tile at `coord`.
    #[must_use]
    pub fn tile(&self, coord: HexCoord) -> Option<&Tile> {
        self.index_of(coord).map(|i| &self.tiles[i])
    }

    /// Tile by packed key.
    #[must_use]
    pub fn tile_by_key(&self, key: TileKey) -> Option<&Tile> {
        self.tile(key.coord())
    }

    /// Whether `coord` is on the map.
    #[must_use]
    pub fn in_bounds(&self, coord: HexCoord) -> bool {
        self.index_of(coord).is_some()
    }

    /// Players in turn order.
    #[must_use]
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// Player by id.
    #[must_use]
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(id.0 as usize)
    }

    /// Player whose turn it is.
    #[must_use]
    pub fn current_player(&self) -> Option<&Player> {
        self.players.get(self.current_player)
    }

    /// Id of the player whose turn it is.
    #[must_use]
    pub fn current_player_id(&self) -> PlayerId {
        PlayerId(u8::try_from(self.current_player).unwrap_or(u8::MAX))
    }

    /// Unit by id.
    #[must_use]
    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(&id)
    }

    /// All units in id order.
    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    /// Settlement by id.
    #[must_use]
    pub fn settlement(&self, id: SettlementId) -> Option<&Settlement> {
        self.settlements.get(&id)
    }

    /// All settlements in id order.
    pub fn settlements(&self) -> impl Iterator<Item = &Settlement> {
        self.settlements.values()
    }

    /// War-band by id.
    #[must_use]
    pub fn war_band(&self, id: WarBandId) -> Option<&WarBand> {
        self.war_bands.get(&id)
    }

    /// All war-bands in id order.
    pub fn war_bands(&self) -> impl Iterator<Item = &WarBand> {
        self.war_bands.values()
    }

    /// Settlement or war-band by reference.
    #[must_use]
    pub fn container(&self, r: ContainerRef) -> Option<&dyn Container> {
        match r {
            ContainerRef::Settlement(id) => self.settlements.get(&id).map(|s| s as &dyn Container),
            ContainerRef::WarBand(id) => self.war_bands.get(&id).map(|b| b as &dyn Container),
        }
    }

    /// Holding record by reference.
    #[must_use]
    pub fn holding(&self, r: ContainerRef) -> Option<&Holding> {
        self.container(r).map(|c| c.holding())
    }

    /// Units of a holding, in holding order.
    #[must_use]
    pub fn units_in(&self, r: ContainerRef) -> Vec<&Unit> {
        self.holding(r)
            .map(|h| h.units.iter().filter_map(|id| self.units.get(id)).collect())
            .unwrap_or_default()
    }

    /// All holdings of `owner`: settlements first, then war-bands, each in id order.
    #[must_use]
    pub fn holdings_of(&self, owner: PlayerId) -> Vec<ContainerRef> {
        let settlements = self
            .settlements
            .values()
            .filter(|s| s.owner == owner)
            .map(|s| ContainerRef::Settlement(s.id));
        let bands = self
            .war_bands
            .values()
            .filter(|b| b.owner == owner)
            .map(|b| ContainerRef::WarBand(b.id));
        settlements.chain(bands).collect()
    }

    /// Settlement or camp whose territory includes `key`.
    #[must_use]
    pub fn territory_owner(&self, key: TileKey) -> Option<ContainerRef> {
        if let Some(s) = self
            .settlements
            .values()
            .find(|s| s.holding.territory.contains(&key))
        {
            return Some(ContainerRef::Settlement(s.id));
        }
        self.war_bands
            .values()
            .find(|b| b.is_encamped() && b.holding.territory.contains(&key))
            .map(|b| ContainerRef::WarBand(b.id))
    }

    /// Union of the territories of `owner`'s settlements and camps.
    #[must_use]
    pub fn owner_territory(&self, owner: PlayerId) -> BTreeSet<TileKey> {
        let mut out = BTreeSet::new();
        for s in self.settlements.values().filter(|s| s.owner == owner) {
            out.extend(s.holding.territory.iter().copied());
        }
        for b in self
            .war_bands
            .values()
            .filter(|b| b.owner == owner && b.is_encamped())
        {
            out.extend(b.holding.territory.iter().copied());
        }
        out
    }

    /// Whether any unit of the band is large.
    #[must_use]
    pub fn band_has_large_unit(&self, id: WarBandId) -> bool {
        self.units_in(ContainerRef::WarBand(id))
            .iter()
            .any(|u| u.kind.is_large())
    }

    // ------------------------------------------------------------------
    // Write access (copy-on-write)
    // ------------------------------------------------------------------

    /// Mutable tile at `coord`.
    pub fn tile_mut(&mut self, coord: HexCoord) -> Option<&mut Tile> {
        let index = self.index_of(coord)?;
        Some(&mut Arc::make_mut(&mut self.tiles)[index])
    }

    /// Mutable access to every tile.
    pub fn tiles_mut(&mut self) -> &mut [Tile] {
        Arc::make_mut(&mut self.tiles).as_mut_slice()
    }

    /// Change the terrain of a tile, resetting its pools.
    pub fn set_terrain(&mut self, coord: HexCoord, terrain: Terrain) -> Result<()> {
        self.tile_mut(coord)
            .ok_or_else(|| GameError::TileNotFound(coord.to_string()))?
            .set_terrain(terrain);
        Ok(())
    }

    /// Mutable player by id.
    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        Arc::make_mut(&mut self.players).get_mut(id.0 as usize)
    }

    /// Mutable unit by id.
    pub fn unit_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        if !self.units.contains_key(&id) {
            return None;
        }
        Arc::make_mut(&mut self.units).get_mut(&id)
    }

    /// Mutable settlement by id.
    pub fn settlement_mut(&mut self, id: SettlementId) -> Option<&mut Settlement> {
        if !self.settlements.contains_key(&id) {
            return None;
        }
        Arc::make_mut(&mut self.settlements).get_mut(&id)
    }

    /// Mutable war-band by id.
    pub fn war_band_mut(&mut self, id: WarBandId) -> Option<&mut WarBand> {
        if !self.war_bands.contains_key(&id) {
            return None;
        }
        Arc::make_mut(&mut self.war_bands).get_mut(&id)
    }

    /// Mutable settlement or war-band by reference.
    pub fn container_mut(&mut self, r: ContainerRef) -> Option<&mut dyn Container> {
        match r {
            ContainerRef::Settlement(id) => self
                .settlement_mut(id)
                .map(|s| s as &mut dyn Container),
            ContainerRef::WarBand(id) => self.war_band_mut(id).map(|b| b as &mut dyn Container),
        }
    }

    /// Mutable holding record by reference.
    pub fn holding_mut(&mut self, r: ContainerRef) -> Option<&mut Holding> {
        self.container_mut(r).map(|c| c.holding_mut())
    }

    pub(crate) fn rng_mut(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    pub(crate) fn set_pending_battle(&mut self, pending: Option<PendingBattle>) {
        self.pending_battle = pending;
    }

    pub(crate) fn set_last_battle(&mut self, report: BattleReport) {
        self.last_battle = Some(Arc::new(report));
    }

    pub(crate) fn set_current_player(&mut self, index: usize) {
        self.current_player = index;
    }

    pub(crate) fn increment_turn(&mut self) {
        self.turn += 1;
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // ------------------------------------------------------------------
    // Setup
    // ------------------------------------------------------------------

    /// Add a player at the end of the turn order.
    pub fn add_player(&mut self, mut player: Player) -> PlayerId {
        let id = PlayerId(u8::try_from(self.players.len()).unwrap_or(u8::MAX));
        player.id = id;
        Arc::make_mut(&mut self.players).push(player);
        id
    }

    /// Create a unit that belongs to no holding yet.
    pub(crate) fn create_unit(&mut self, owner: PlayerId, kind: UnitKind) -> UnitId {
        let id = UnitId(self.allocate_id());
        Arc::make_mut(&mut self.units).insert(id, Unit::new(id, kind, owner));
        id
    }

    /// Put a unit record (e.g. a restored sacrifice) back into the table.
    pub(crate) fn insert_unit(&mut self, unit: Unit) {
        Arc::make_mut(&mut self.units).insert(unit.id, unit);
    }

    /// Remove a unit from the unit table only.
    pub(crate) fn take_unit(&mut self, id: UnitId) -> Option<Unit> {
        if !self.units.contains_key(&id) {
            return None;
        }
        Arc::make_mut(&mut self.units).remove(&id)
    }

    /// Add new full-health units of `kinds` to an existing holding.
    pub fn add_units(&mut self, r: ContainerRef, kinds: &[UnitKind]) -> Result<Vec<UnitId>> {
        let owner = self
            .container(r)
            .map(|c| c.owner())
            .ok_or_else(|| missing_container(r))?;
        let ids: Vec<UnitId> = kinds.iter().map(|&k| self.create_unit(owner, k)).collect();
        self.holding_mut(r)
            .ok_or_else(|| missing_container(r))?
            .units
            .extend(ids.iter().copied());
        if let ContainerRef::WarBand(id) = r {
            self.refresh_band_movement(id);
        }
        self.refresh_capacity(r);
        Ok(ids)
    }

    /// Found a settlement at `position`, claiming every unclaimed land tile
    /// within `radius`.
    pub fn found_settlement(
        &mut self,
        owner: PlayerId,
        name: impl Into<String>,
        position: HexCoord,
        radius: u32,
    ) -> Result<SettlementId> {
        self.check_free(position)?;
        self.player(owner)
            .ok_or(GameError::PlayerNotFound(owner.0))?;

        let id = SettlementId(self.allocate_id());
        let territory = self.claimable_around(position, radius);
        let rules = Arc::clone(&self.rules);
        let settlement = Settlement {
            id,
            owner,
            name: name.into(),
            position,
            hp: rules.settlement_max_hp,
            max_hp: rules.settlement_max_hp,
            growth: Growth::new(rules.starting_building_slots),
            buildings: BTreeSet::new(),
            holding: Holding {
                territory,
                ..Holding::default()
            },
        };
        Arc::make_mut(&mut self.settlements).insert(id, settlement);
        self.occupy(position, ContainerRef::Settlement(id));
        self.refresh_capacity(ContainerRef::Settlement(id));
        debug!(settlement = id.0, owner = owner.0, %position, "settlement founded");
        Ok(id)
    }

    /// Create a war-band of new units at `position`, ready to move.
    pub fn spawn_war_band(
        &mut self,
        owner: PlayerId,
        position: HexCoord,
        kinds: &[UnitKind],
    ) -> Result<WarBandId> {
        self.check_free(position)?;
        self.player(owner)
            .ok_or(GameError::PlayerNotFound(owner.0))?;
        let units: Vec<UnitId> = kinds.iter().map(|&k| self.create_unit(owner, k)).collect();
        let id = self.insert_war_band(owner, position, units);
        if let Some(band) = self.war_band_mut(id) {
            band.movement = band.max_movement;
        }
        Ok(id)
    }

    /// Create a war-band from existing unit ids. The caller removes them
    /// from their previous holding. The band starts with no movement left.
    pub(crate) fn insert_war_band(
        &mut self,
        owner: PlayerId,
        position: HexCoord,
        units: Vec<UnitId>,
    ) -> WarBandId {
        let id = WarBandId(self.allocate_id());
        let band = WarBand {
            id,
            owner,
            name: format!("Band {}", id.0),
            position,
            movement: 0,
            max_movement: 0,
            moved_this_turn: false,
            camp: None,
            holding: Holding {
                units,
                territory: std::iter::once(position.key()).collect(),
                ..Holding::default()
            },
        };
        Arc::make_mut(&mut self.war_bands).insert(id, band);
        self.occupy(position, ContainerRef::WarBand(id));
        self.refresh_band_movement(id);
        self.refresh_capacity(ContainerRef::WarBand(id));
        id
    }

    fn check_free(&self, position: HexCoord) -> Result<()> {
        let tile = self
            .tile(position)
            .ok_or_else(|| GameError::TileNotFound(position.to_string()))?;
        if let Some(occupant) = tile.occupant {
            return Err(GameError::rejected(format!(
                "{position} already occupied by {occupant}"
            )));
        }
        Ok(())
    }

    /// Land tiles within `radius` of `center` not yet in any territory.
    pub(crate) fn claimable_around(&self, center: HexCoord, radius: u32) -> BTreeSet<TileKey> {
        center
            .range(radius)
            .into_iter()
            .filter(|&c| {
                self.tile(c)
                    .is_some_and(|t| !t.terrain.is_water() && t.terrain != Terrain::Volcano)
            })
            .map(HexCoord::key)
            .filter(|&k| self.territory_owner(k).is_none())
            .collect()
    }

    /// Mark `position` as occupied by `r`.
    pub(crate) fn occupy(&mut self, position: HexCoord, r: ContainerRef) {
        if let Some(tile) = self.tile_mut(position) {
            tile.occupant = Some(r);
        }
    }

    /// Clear the occupant of `position` if it is `r`.
    pub(crate) fn vacate(&mut self, position: HexCoord, r: ContainerRef) {
        if self.tile(position).and_then(|t| t.occupant) == Some(r) {
            if let Some(tile) = self.tile_mut(position) {
                tile.occupant = None;
            }
        }
    }

    // ------------------------------------------------------------------
    // Derived values
    // ------------------------------------------------------------------

    /// Recompute a band's maximum movement from its slowest member, clamping
    /// the movement left this turn.
    pub fn refresh_band_movement(&mut self, id: WarBandId) {
        let Some(band) = self.war_band(id) else {
            return;
        };
        let nomadic = self
            .player(band.owner)
            .is_some_and(|p| p.culture.has(CultureTrait::Nomadic));
        let slowest = self
            .units_in(ContainerRef::WarBand(id))
            .iter()
            .map(|u| u.stats().movement)
            .min()
            .unwrap_or(0);
        let max = if slowest > 0 && nomadic {
            slowest + 1
        } else {
            slowest
        };
        if let Some(band) = self.war_band_mut(id) {
            band.max_movement = max;
            band.movement = band.movement.min(max);
        }
    }

    /// Recompute storage and food capacity of a holding.
    pub fn refresh_capacity(&mut self, r: ContainerRef) {
        let carry: u32 = self.units_in(r).iter().map(|u| u.stats().carry).sum();
        let rules = Arc::clone(&self.rules);
        let Some(container) = self.container_mut(r) else {
            return;
        };
        let (storage_bonus, food_bonus) = container.buildings().map_or((0, 0), |b| {
            b.iter().fold((0, 0), |(s, f), k| {
                (s + k.storage_bonus(), f + k.food_capacity_bonus())
            })
        });
        let storage = container.base_storage(&rules) + carry + storage_bonus;
        let food = container.base_food_capacity(&rules) + food_bonus;
        let holding = container.holding_mut();
        holding.storage_capacity = storage;
        holding.food_capacity = food;
    }

    // ------------------------------------------------------------------
    // Removal and cleanup
    // ------------------------------------------------------------------

    /// Delete a war-band and every unit it still holds.
    pub(crate) fn remove_war_band(&mut self, id: WarBandId) -> Option<WarBand> {
        if !self.war_bands.contains_key(&id) {
            return None;
        }
        let band = Arc::make_mut(&mut self.war_bands).remove(&id)?;
        for unit in &band.holding.units {
            self.take_unit(*unit);
        }
        self.vacate(band.position, ContainerRef::WarBand(id));
        if self.pending_battle.is_some_and(|p| {
            p.attacker == id || p.defender == ContainerRef::WarBand(id)
        }) {
            self.pending_battle = None;
        }
        Some(band)
    }

    /// Delete a settlement and every unit it still holds.
    pub(crate) fn remove_settlement(&mut self, id: SettlementId) -> Option<Settlement> {
        if !self.settlements.contains_key(&id) {
            return None;
        }
        let settlement = Arc::make_mut(&mut self.settlements).remove(&id)?;
        for unit in &settlement.holding.units {
            self.take_unit(*unit);
        }
        self.vacate(settlement.position, ContainerRef::Settlement(id));
        if self
            .pending_battle
            .is_some_and(|p| p.defender == ContainerRef::Settlement(id))
        {
            self.pending_battle = None;
        }
        Some(settlement)
    }

    /// Delete a holding of either kind.
    pub(crate) fn remove_container(&mut self, r: ContainerRef) {
        match r {
            ContainerRef::Settlement(id) => {
                self.remove_settlement(id);
            }
            ContainerRef::WarBand(id) => {
                self.remove_war_band(id);
            }
        }
    }

    /// Remove dead units everywhere, delete empty non-encamped war-bands,
    /// and mark players without holdings as eliminated.
    ///
    /// Idempotent. Returns the number of units removed.
    pub fn purge_dead(&mut self) -> usize {
        let dead: Vec<UnitId> = self
            .units
            .values()
            .filter(|u| !u.is_alive())
            .map(|u| u.id)
            .collect();

        if !dead.is_empty() {
            let units = Arc::make_mut(&mut self.units);
            for id in &dead {
                units.remove(id);
            }
        }

        let touched: Vec<ContainerRef> = self
            .settlements
            .values()
            .filter(|s| s.holding.units.iter().any(|u| dead.contains(u)))
            .map(|s| ContainerRef::Settlement(s.id))
            .chain(
                self.war_bands
                    .values()
                    .filter(|b| b.holding.units.iter().any(|u| dead.contains(u)))
                    .map(|b| ContainerRef::WarBand(b.id)),
            )
            .collect();
        for r in &touched {
            if let Some(holding) = self.holding_mut(*r) {
                holding.units.retain(|u| !dead.contains(u));
            }
            if let ContainerRef::WarBand(id) = r {
                self.refresh_band_movement(*id);
            }
        }

        let empty: Vec<WarBandId> = self
            .war_bands
            .values()
            .filter(|b| !b.is_encamped() && b.holding.units.is_empty())
            .map(|b| b.id)
            .collect();
        for id in empty {
            debug!(band = id.0, "removing empty war-band");
            self.remove_war_band(id);
        }

        self.refresh_eliminations();
        dead.len()
    }

    /// Mark players that hold nothing as eliminated.
    pub(crate) fn refresh_eliminations(&mut self) {
        let out: Vec<PlayerId> = self
            .players
            .iter()
            .filter(|p| !p.eliminated && self.holdings_of(p.id).is_empty())
            .map(|p| p.id)
            .collect();
        for id in out {
            if let Some(p) = self.player_mut(id) {
                p.eliminated = true;
                info!(player = id.0, name = %p.name, "player eliminated");
            }
        }
    }

    // ------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------

    /// Encode the snapshot with bincode.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| GameError::Serialization(format!("Failed to serialize world: {e}")))
    }

    /// Decode a snapshot produced by [`WorldState::to_bytes`].
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data)
            .map_err(|e| GameError::Serialization(format!("Failed to deserialize world: {e}")))
    }

    /// Stable hash of the full snapshot, for determinism checks.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut writer = HashWriter::default();
        if let Err(e) = bincode::serialize_into(&mut writer, self) {
            warn!(error = %e, "state hash computed over a partial encoding");
        }
        writer.finish()
    }

    fn index_of(&self, coord: HexCoord) -> Option<usize> {
        let (col, row) = coord.to_offset();
        let col = u32::try_from(col).ok()?;
        let row = u32::try_from(row).ok()?;
        (col < self.width && row < self.height)
            .then(|| (row as usize) * (self.width as usize) + col as usize)
    }
}

/// Not-found error for a holding reference.
pub(crate) fn missing_container(r: ContainerRef) -> GameError {
    match r {
        ContainerRef::Settlement(id) => GameError::SettlementNotFound(id.0),
        ContainerRef::WarBand(id) => GameError::WarBandNotFound(id.0),
    }
}

/// Axial coordinates of a `width` x `height` map in row-major offset order.
pub fn offset_coords(width: u32, height: u32) -> impl Iterator<Item = HexCoord> {
    (0..height as i32).flat_map(move |row| {
        (0..width as i32).map(move |col| HexCoord::from_offset(col, row))
    })
}

/// Streams everything written to it through FNV-1a.
struct HashWriter {
    hash: u64,
}

impl Default for HashWriter {
    fn default() -> Self {
        Self {
            hash: FNV_OFFSET_BASIS,
        }
    }
}

impl HashWriter {
    const fn finish(&self) -> u64 {
        self.hash
    }
}

impl io::Write for HashWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.hash = fnv1a_64_extend(self.hash, buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
