//! Resource kinds and resource bundles.
//!
//! The same [`Resources`] bundle is used for tile pools, holding stockpiles
//! and production costs.

use serde::{Deserialize, Serialize};

/// A gatherable resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Resource {
    /// Consumed as unit upkeep.
    Food,
    /// Building material.
    Wood,
    /// Building material.
    Stone,
    /// Used for clothing and mounts.
    Hides,
    /// Volcanic glass; never regrows.
    Obsidian,
}

impl Resource {
    /// All resources in canonical order.
    pub const ALL: [Self; 5] = [
        Self::Food,
        Self::Wood,
        Self::Stone,
        Self::Hides,
        Self::Obsidian,
    ];

    /// Whether tile pools of this resource regrow each round.
    #[must_use]
    pub const fn is_renewable(self) -> bool {
        matches!(self, Self::Food | Self::Wood | Self::Hides)
    }
}

/// An amount of each resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Resources {
    /// Food.
    pub food: u32,
    /// Wood.
    pub wood: u32,
    /// Stone.
    pub stone: u32,
    /// Hides.
    pub hides: u32,
    /// Obsidian.
    pub obsidian: u32,
}

impl Resources {
    /// The empty bundle.
    pub const ZERO: Self = Self::new(0, 0, 0, 0, 0);

    /// Create a bundle.
    #[must_use]
    pub const fn new(food: u32, wood: u32, stone: u32, hides: u32, obsidian: u32) -> Self {
        Self {
            food,
            wood,
            stone,
            hides,
            obsidian,
        }
    }

    /// Amount of `resource`.
    #[must_use]
    pub const fn get(&self, resource: Resource) -> u32 {
        match resource {
            Resource::Food => self.food,
            Resource::Wood => self.wood,
            Resource::Stone => self.stone,
            Resource::Hides => self.hides,
            Resource::Obsidian => self.obsidian,
        }
    }

    /// Mutable amount of `resource`.
    pub fn get_mut(&mut self, resource: Resource) -> &mut u32 {
        match resource {
            Resource::Food => &mut self.food,
            Resource::Wood => &mut self.wood,
            Resource::Stone => &mut self.stone,
            Resource::Hides => &mut self.hides,
            Resource::Obsidian => &mut self.obsidian,
        }
    }

    /// Sum of all non-food resources; this is what storage capacity limits.
    #[must_use]
    pub const fn non_food_total(&self) -> u32 {
        self.wood + self.stone + self.hides + self.obsidian
    }

    /// Whether every amount in `cost` is available.
    #[must_use]
    pub fn covers(&self, cost: &Self) -> bool {
        Resource::ALL.iter().all(|&r| self.get(r) >= cost.get(r))
    }

    /// Remove `cost`; returns `false` and leaves `self` untouched if it does
    /// not cover the cost.
    pub fn try_spend(&mut self, cost: &Self) -> bool {
        if !self.covers(cost) {
            return false;
        }
        for r in Resource::ALL {
            *self.get_mut(r) -= cost.get(r);
        }
        true
    }

    /// Add every amount in `other`.
    pub fn add(&mut self, other: &Self) {
        for r in Resource::ALL {
            let slot = self.get_mut(r);
            *slot = slot.saturating_add(other.get(r));
        }
    }

    /// Whether every amount is zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spend_and_refund() {
        let mut stock = Resources::new(10, 5, 0, 2, 0);
        let cost = Resources::new(4, 5, 0, 0, 0);
        assert!(stock.try_spend(&cost));
        assert_eq!(stock, Resources::new(6, 0, 0, 2, 0));
        assert!(!stock.try_spend(&cost));
        assert_eq!(stock, Resources::new(6, 0, 0, 2, 0));
        stock.add(&cost);
        assert_eq!(stock, Resources::new(10, 5, 0, 2, 0));
    }

    #[test]
    fn test_non_food_total() {
        let stock = Resources::new(100, 1, 2, 3, 4);
        assert_eq!(stock.non_food_total(), 10);
    }

    #[test]
    fn test_renewable() {
        assert!(Resource::Food.is_renewable());
        assert!(!Resource::Stone.is_renewable());
        assert!(!Resource::Obsidian.is_renewable());
    }
}
