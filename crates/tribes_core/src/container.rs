//! Settlements and war-bands, the two kinds of unit holding.
//!
//! Both share a [`Holding`] record (units, production queue, stockpile,
//! capacities, workforce focus, territory, disease report). Camp-only data
//! lives in [`Camp`], present on a war-band only while it is encamped.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::buildings::BuildingKind;
use crate::hex::{HexCoord, TileKey};
use crate::player::PlayerId;
use crate::resources::{Resource, Resources};
use crate::rules::GameRules;
use crate::technology::TechId;
use crate::units::{OrderCost, Unit, UnitId, UnitKind};

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier of a settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SettlementId(pub u32);

/// Unique identifier of a war-band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WarBandId(pub u32);

/// Reference to either kind of holding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContainerRef {
    /// A settlement.
    Settlement(SettlementId),
    /// A war-band or camp.
    WarBand(WarBandId),
}

impl fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Settlement(id) => write!(f, "settlement#{}", id.0),
            Self::WarBand(id) => write!(f, "band#{}", id.0),
        }
    }
}

// ============================================================================
// Production
// ============================================================================

/// Something a holding can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductionItem {
    /// A unit.
    Unit(UnitKind),
    /// A building.
    Building(BuildingKind),
}

impl ProductionItem {
    /// Cost of the item, `None` if it cannot be ordered.
    #[must_use]
    pub const fn cost(self) -> Option<OrderCost> {
        match self {
            Self::Unit(kind) => kind.stats().cost,
            Self::Building(kind) => Some(kind.cost()),
        }
    }

    /// Technology required.
    #[must_use]
    pub const fn required_tech(self) -> Option<TechId> {
        match self {
            Self::Unit(kind) => kind.stats().required_tech,
            Self::Building(kind) => kind.required_tech(),
        }
    }
}

/// An order in a production queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedOrder {
    /// What is being produced.
    pub item: ProductionItem,
    /// Production points invested so far.
    pub progress: u32,
    /// Resources paid at enqueue; refunded on cancel.
    pub paid: Resources,
    /// Unit consumed at enqueue; restored on cancel.
    pub sacrificed: Option<Unit>,
}

/// FIFO production queue; only the head receives production points.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProductionQueue {
    orders: VecDeque<QueuedOrder>,
}

impl ProductionQueue {
    /// Orders, head first.
    pub fn iter(&self) -> impl Iterator<Item = &QueuedOrder> {
        self.orders.iter()
    }

    /// Number of orders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Whether `kind` is already queued.
    #[must_use]
    pub fn contains_building(&self, kind: BuildingKind) -> bool {
        self.orders
            .iter()
            .any(|o| o.item == ProductionItem::Building(kind))
    }

    /// Number of queued buildings.
    #[must_use]
    pub fn queued_buildings(&self) -> usize {
        self.orders
            .iter()
            .filter(|o| matches!(o.item, ProductionItem::Building(_)))
            .count()
    }

    /// Append an order.
    pub fn push(&mut self, order: QueuedOrder) {
        self.orders.push_back(order);
    }

    /// Remove the order at `index`.
    pub fn remove(&mut self, index: usize) -> Option<QueuedOrder> {
        self.orders.remove(index)
    }

    /// Invest `points` in the head order. Returns the order if it completed.
    /// Points beyond the head's remaining cost are discarded.
    pub fn advance(&mut self, points: u32) -> Option<QueuedOrder> {
        let head = self.orders.front_mut()?;
        let needed = head.item.cost().map_or(0, |c| c.points);
        head.progress = (head.progress + points).min(needed);
        if head.progress >= needed {
            self.orders.pop_front()
        } else {
            None
        }
    }
}

// ============================================================================
// Holding
// ============================================================================

/// How a holding's workforce is split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkforceFocus {
    /// Percent of workforce put into production; the rest gathers.
    pub production_pct: u8,
    /// Resources to gather.
    pub gather: BTreeSet<Resource>,
}

impl Default for WorkforceFocus {
    fn default() -> Self {
        Self {
            production_pct: 50,
            gather: [Resource::Food, Resource::Wood].into_iter().collect(),
        }
    }
}

/// Labelled contribution to a holding's disease risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiseaseFactor {
    /// Base risk of the terrain.
    Terrain,
    /// War-band has not moved for several turns.
    Stagnation,
    /// Too many units in one place.
    Overcrowding,
    /// Flat reduction from a healers' hut.
    HealersHut,
    /// Percentage reduction from a well.
    Well,
    /// Diminishing reduction from healers.
    Healers,
}

/// Disease risk breakdown from the last disease stage.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiseaseReport {
    /// Final risk in percent.
    pub risk_pct: u32,
    /// Signed contribution of each factor.
    pub factors: Vec<(DiseaseFactor, i32)>,
}

/// Record shared by settlements and war-bands.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Holding {
    /// Units held.
    pub units: Vec<UnitId>,
    /// Production queue.
    pub queue: ProductionQueue,
    /// Stockpiled resources.
    pub stockpile: Resources,
    /// Non-food storage limit.
    pub storage_capacity: u32,
    /// Food storage limit.
    pub food_capacity: u32,
    /// Production/gathering split.
    pub focus: WorkforceFocus,
    /// Tiles resources are drawn from.
    pub territory: BTreeSet<TileKey>,
    /// Tiles that may still be claimed for free.
    pub pending_expansions: u32,
    /// Last disease evaluation.
    pub disease: DiseaseReport,
}

impl Holding {
    /// Whether `unit` is held here.
    #[must_use]
    pub fn contains(&self, unit: UnitId) -> bool {
        self.units.contains(&unit)
    }

    /// Remove `unit` if present.
    pub fn remove_unit(&mut self, unit: UnitId) -> bool {
        let before = self.units.len();
        self.units.retain(|&u| u != unit);
        self.units.len() != before
    }
}

/// Level and experience of a settlement or camp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Growth {
    /// Current level, starting at 1.
    pub level: u32,
    /// Experience toward the next level.
    pub experience: u32,
    /// Number of buildings allowed.
    pub building_slots: u32,
}

impl Growth {
    /// Level 1 growth with `slots` building slots.
    #[must_use]
    pub const fn new(slots: u32) -> Self {
        Self {
            level: 1,
            experience: 0,
            building_slots: slots,
        }
    }

    /// Add experience and return how many levels were gained. Each level
    /// adds one building slot.
    pub fn add_experience(&mut self, amount: u32, rules: &GameRules) -> u32 {
        self.experience += amount;
        let mut gained = 0;
        loop {
            let needed = rules.experience_threshold(self.level);
            if self.experience < needed {
                break;
            }
            self.experience -= needed;
            self.level += 1;
            self.building_slots += 1;
            gained += 1;
        }
        gained
    }
}

// ============================================================================
// Settlement and war-band
// ============================================================================

/// A permanent town.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Identifier.
    pub id: SettlementId,
    /// Owning player.
    pub owner: PlayerId,
    /// Display name.
    pub name: String,
    /// Tile.
    pub position: HexCoord,
    /// Hit points; the settlement falls at 0.
    pub hp: u32,
    /// Maximum hit points.
    pub max_hp: u32,
    /// Level and slots.
    pub growth: Growth,
    /// Completed buildings.
    pub buildings: BTreeSet<BuildingKind>,
    /// Shared holding data.
    pub holding: Holding,
}

/// Data a war-band gains while encamped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Camp {
    /// Level and slots.
    pub growth: Growth,
    /// Completed buildings; lost when the camp is broken.
    pub buildings: BTreeSet<BuildingKind>,
}

/// A mobile stack of units, optionally encamped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarBand {
    /// Identifier.
    pub id: WarBandId,
    /// Owning player.
    pub owner: PlayerId,
    /// Display name.
    pub name: String,
    /// Tile.
    pub position: HexCoord,
    /// Movement left this turn.
    pub movement: u32,
    /// Movement at the start of a turn.
    pub max_movement: u32,
    /// Moved at least once this turn.
    pub moved_this_turn: bool,
    /// Present while encamped.
    pub camp: Option<Camp>,
    /// Shared holding data.
    pub holding: Holding,
}

impl WarBand {
    /// Whether the band is a stationary camp.
    #[must_use]
    pub const fn is_encamped(&self) -> bool {
        self.camp.is_some()
    }
}

/// Common access to settlements and war-bands.
pub trait Container {
    /// Reference to this holding.
    fn container_ref(&self) -> ContainerRef;
    /// Owning player.
    fn owner(&self) -> PlayerId;
    /// Display name.
    fn name(&self) -> &str;
    /// Rename.
    fn set_name(&mut self, name: String);
    /// Tile.
    fn position(&self) -> HexCoord;
    /// Shared holding data.
    fn holding(&self) -> &Holding;
    /// Mutable shared holding data.
    fn holding_mut(&mut self) -> &mut Holding;
    /// Growth, for settlements and camps.
    fn growth(&self) -> Option<&Growth>;
    /// Mutable growth, for settlements and camps.
    fn growth_mut(&mut self) -> Option<&mut Growth>;
    /// Buildings, for settlements and camps.
    fn buildings(&self) -> Option<&BTreeSet<BuildingKind>>;
    /// Mutable buildings, for settlements and camps.
    fn buildings_mut(&mut self) -> Option<&mut BTreeSet<BuildingKind>>;
    /// Base non-food storage before unit carry and buildings.
    fn base_storage(&self, rules: &GameRules) -> u32;
    /// Base food capacity before buildings.
    fn base_food_capacity(&self, rules: &GameRules) -> u32;

    /// Whether the holding stays put (a settlement or a camp).
    fn is_fixed(&self) -> bool {
        self.growth().is_some()
    }

    /// Whether `kind` has been built here.
    fn has_building(&self, kind: BuildingKind) -> bool {
        self.buildings().is_some_and(|b| b.contains(&kind))
    }
}

impl Container for Settlement {
    fn container_ref(&self) -> ContainerRef {
        ContainerRef::Settlement(self.id)
    }
    fn owner(&self) -> PlayerId {
        self.owner
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn set_name(&mut self, name: String) {
        self.name = name;
    }
    fn position(&self) -> HexCoord {
        self.position
    }
    fn holding(&self) -> &Holding {
        &self.holding
    }
    fn holding_mut(&mut self) -> &mut Holding {
        &mut self.holding
    }
    fn growth(&self) -> Option<&Growth> {
        Some(&self.growth)
    }
    fn growth_mut(&mut self) -> Option<&mut Growth> {
        Some(&mut self.growth)
    }
    fn buildings(&self) -> Option<&BTreeSet<BuildingKind>> {
        Some(&self.buildings)
    }
    fn buildings_mut(&mut self) -> Option<&mut BTreeSet<BuildingKind>> {
        Some(&mut self.buildings)
    }
    fn base_storage(&self, rules: &GameRules) -> u32 {
        rules.settlement_base_storage
    }
    fn base_food_capacity(&self, rules: &GameRules) -> u32 {
        rules.settlement_base_food_capacity
    }
}

impl Container for WarBand {
    fn container_ref(&self) -> ContainerRef {
        ContainerRef::WarBand(self.id)
    }
    fn owner(&self) -> PlayerId {
        self.owner
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn set_name(&mut self, name: String) {
        self.name = name;
    }
    fn position(&self) -> HexCoord {
        self.position
    }
    fn holding(&self) -> &Holding {
        &self.holding
    }
    fn holding_mut(&mut self) -> &mut Holding {
        &mut self.holding
    }
    fn growth(&self) -> Option<&Growth> {
        self.camp.as_ref().map(|c| &c.growth)
    }
    fn growth_mut(&mut self) -> Option<&mut Growth> {
        self.camp.as_mut().map(|c| &mut c.growth)
    }
    fn buildings(&self) -> Option<&BTreeSet<BuildingKind>> {
        self.camp.as_ref().map(|c| &c.buildings)
    }
    fn buildings_mut(&mut self) -> Option<&mut BTreeSet<BuildingKind>> {
        self.camp.as_mut().map(|c| &mut c.buildings)
    }
    fn base_storage(&self, rules: &GameRules) -> u32 {
        if self.is_encamped() {
            rules.camp_base_storage
        } else {
            0
        }
    }
    fn base_food_capacity(&self, rules: &GameRules) -> u32 {
        if self.is_encamped() {
            rules.camp_base_food_capacity
        } else {
            0
        }
    }
}
