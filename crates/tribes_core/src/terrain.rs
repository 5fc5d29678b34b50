//! Terrain types and their static properties.

use serde::{Deserialize, Serialize};

use crate::resources::{Resource, Resources};
use crate::technology::TechId;

/// Terrain of a single hex.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum Terrain {
    /// Sea connected to the map edge.
    Ocean,
    /// Enclosed water.
    Lake,
    /// Open grassland.
    #[default]
    Plains,
    /// Dry grassland, rich in game.
    Steppe,
    /// Sparse and slow.
    Desert,
    /// Wet lowland; unhealthy.
    Swamp,
    /// Woodland.
    Forest,
    /// Broken high ground.
    Hills,
    /// Requires climbing.
    Mountains,
    /// Impassable.
    Volcano,
}

impl Terrain {
    /// All terrains in declaration order.
    pub const ALL: [Self; 10] = [
        Self::Ocean,
        Self::Lake,
        Self::Plains,
        Self::Steppe,
        Self::Desert,
        Self::Swamp,
        Self::Forest,
        Self::Hills,
        Self::Mountains,
        Self::Volcano,
    ];

    /// Movement points needed to enter, or `None` if never passable.
    #[must_use]
    pub const fn movement_cost(self) -> Option<u32> {
        match self {
            Self::Plains | Self::Steppe => Some(1),
            Self::Ocean | Self::Lake | Self::Desert | Self::Forest | Self::Hills => Some(2),
            Self::Swamp | Self::Mountains => Some(3),
            Self::Volcano => None,
        }
    }

    /// Technology a player must know before entering.
    #[must_use]
    pub const fn required_tech(self) -> Option<TechId> {
        match self {
            Self::Ocean | Self::Lake => Some(TechId::Boats),
            Self::Mountains => Some(TechId::Climbing),
            _ => None,
        }
    }

    /// Whether large units (mounts) may enter.
    #[must_use]
    pub const fn allows_large_units(self) -> bool {
        matches!(
            self,
            Self::Plains | Self::Steppe | Self::Desert | Self::Hills
        )
    }

    /// Per-unit effective HP bonus for a defender standing here.
    #[must_use]
    pub const fn defense_bonus(self) -> u32 {
        match self {
            Self::Swamp => 1,
            Self::Forest => 2,
            Self::Hills => 3,
            Self::Mountains => 5,
            _ => 0,
        }
    }

    /// Base disease risk in percent.
    #[must_use]
    pub const fn disease_risk(self) -> u32 {
        match self {
            Self::Ocean => 0,
            Self::Lake | Self::Steppe | Self::Mountains => 2,
            Self::Plains | Self::Hills => 3,
            Self::Desert => 4,
            Self::Volcano => 5,
            Self::Forest => 6,
            Self::Swamp => 15,
        }
    }

    /// Maximum pool of each resource a tile of this terrain holds.
    #[must_use]
    pub const fn resource_max(self) -> Resources {
        match self {
            Self::Ocean => Resources::new(6, 0, 0, 0, 0),
            Self::Lake => Resources::new(8, 0, 0, 0, 0),
            Self::Plains => Resources::new(12, 2, 1, 6, 0),
            Self::Steppe => Resources::new(8, 1, 2, 10, 0),
            Self::Desert => Resources::new(2, 0, 4, 1, 0),
            Self::Swamp => Resources::new(6, 4, 0, 2, 0),
            Self::Forest => Resources::new(6, 15, 1, 8, 0),
            Self::Hills => Resources::new(4, 3, 10, 3, 4),
            Self::Mountains => Resources::new(1, 1, 15, 1, 8),
            Self::Volcano => Resources::new(0, 0, 12, 0, 20),
        }
    }

    /// Maximum pool of a single resource.
    #[must_use]
    pub const fn max_of(self, resource: Resource) -> u32 {
        self.resource_max().get(resource)
    }

    /// Ocean or lake.
    #[must_use]
    pub const fn is_water(self) -> bool {
        matches!(self, Self::Ocean | Self::Lake)
    }

    /// Flat land that can turn into swamp or hills during generation.
    #[must_use]
    pub const fn is_lowland(self) -> bool {
        matches!(self, Self::Plains | Self::Steppe | Self::Desert)
    }

    /// Land a settlement may be founded on.
    #[must_use]
    pub const fn is_settleable(self) -> bool {
        matches!(self, Self::Plains | Self::Steppe | Self::Forest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volcano_impassable() {
        assert_eq!(Terrain::Volcano.movement_cost(), None);
        for t in Terrain::ALL {
            if t != Terrain::Volcano {
                assert!(t.movement_cost().is_some(), "{t:?} should be passable");
            }
        }
    }

    #[test]
    fn test_water_needs_boats() {
        assert_eq!(Terrain::Ocean.required_tech(), Some(TechId::Boats));
        assert_eq!(Terrain::Lake.required_tech(), Some(TechId::Boats));
        assert_eq!(Terrain::Mountains.required_tech(), Some(TechId::Climbing));
        assert_eq!(Terrain::Plains.required_tech(), None);
    }

    #[test]
    fn test_obsidian_only_in_high_ground() {
        for t in Terrain::ALL {
            let has = t.max_of(Resource::Obsidian) > 0;
            assert_eq!(
                has,
                matches!(t, Terrain::Hills | Terrain::Mountains | Terrain::Volcano)
            );
        }
    }
}
