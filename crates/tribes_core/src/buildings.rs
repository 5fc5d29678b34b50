//! Buildings available to settlements and camps.

use serde::{Deserialize, Serialize};

use crate::resources::Resources;
use crate::technology::TechId;
use crate::units::OrderCost;

/// A building kind. A holding has at most one of each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BuildingKind {
    /// Raises food capacity.
    Granary,
    /// Raises storage capacity.
    Storehouse,
    /// Fortifies the defenders.
    Palisade,
    /// Cuts disease risk and speeds healing.
    HealersHut,
    /// Cuts disease risk by a percentage.
    Well,
    /// Produces research and culture.
    Totem,
    /// Produces gold.
    Market,
}

impl BuildingKind {
    /// All building kinds.
    pub const ALL: [Self; 7] = [
        Self::Granary,
        Self::Storehouse,
        Self::Palisade,
        Self::HealersHut,
        Self::Well,
        Self::Totem,
        Self::Market,
    ];

    /// Production points and resources needed.
    #[must_use]
    pub const fn cost(self) -> OrderCost {
        let (points, resources) = match self {
            Self::Granary => (15, Resources::new(0, 10, 5, 0, 0)),
            Self::Storehouse => (12, Resources::new(0, 15, 0, 0, 0)),
            Self::Palisade => (20, Resources::new(0, 20, 10, 0, 0)),
            Self::HealersHut => (15, Resources::new(0, 10, 0, 5, 0)),
            Self::Well => (10, Resources::new(0, 0, 10, 0, 0)),
            Self::Totem => (18, Resources::new(0, 10, 5, 0, 2)),
            Self::Market => (25, Resources::new(0, 15, 10, 5, 0)),
        };
        OrderCost { points, resources }
    }

    /// Technology needed to build.
    #[must_use]
    pub const fn required_tech(self) -> Option<TechId> {
        match self {
            Self::Granary => Some(TechId::Pottery),
            Self::Palisade => Some(TechId::Masonry),
            Self::Totem => Some(TechId::Spirituality),
            Self::Market => Some(TechId::Trade),
            Self::Storehouse | Self::HealersHut | Self::Well => None,
        }
    }

    /// Added non-food storage capacity.
    #[must_use]
    pub const fn storage_bonus(self) -> u32 {
        match self {
            Self::Storehouse => 60,
            _ => 0,
        }
    }

    /// Added food capacity.
    #[must_use]
    pub const fn food_capacity_bonus(self) -> u32 {
        match self {
            Self::Granary => 60,
            _ => 0,
        }
    }

    /// Per-unit effective HP bonus for defenders.
    #[must_use]
    pub const fn fortification(self) -> u32 {
        match self {
            Self::Palisade => 3,
            _ => 0,
        }
    }

    /// Flat disease risk reduction, in percentage points.
    #[must_use]
    pub const fn disease_flat_reduction(self) -> u32 {
        match self {
            Self::HealersHut => 5,
            _ => 0,
        }
    }

    /// Relative disease risk reduction, in percent of the current risk.
    #[must_use]
    pub const fn disease_pct_reduction(self) -> u32 {
        match self {
            Self::Well => 30,
            _ => 0,
        }
    }

    /// Extra hit points healed per turn.
    #[must_use]
    pub const fn heal_bonus(self) -> u32 {
        match self {
            Self::HealersHut => 2,
            _ => 0,
        }
    }

    /// Research points per turn.
    #[must_use]
    pub const fn research_yield(self) -> u32 {
        match self {
            Self::Totem => 2,
            _ => 0,
        }
    }

    /// Culture points per turn.
    #[must_use]
    pub const fn culture_yield(self) -> u32 {
        match self {
            Self::Totem => 2,
            _ => 0,
        }
    }

    /// Gold per turn.
    #[must_use]
    pub const fn gold_income(self) -> u32 {
        match self {
            Self::Market => 3,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_building_costs_something() {
        for b in BuildingKind::ALL {
            let cost = b.cost();
            assert!(cost.points > 0);
            assert!(!cost.resources.is_empty(), "{b:?}");
        }
    }

    #[test]
    fn test_each_building_has_an_effect() {
        for b in BuildingKind::ALL {
            let total = b.storage_bonus()
                + b.food_capacity_bonus()
                + b.fortification()
                + b.disease_flat_reduction()
                + b.disease_pct_reduction()
                + b.heal_bonus()
                + b.research_yield()
                + b.culture_yield()
                + b.gold_income();
            assert!(total > 0, "{b:?} does nothing");
        }
    }
}
