//! The technology tree.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A researchable technology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TechId {
    /// Unlocks hunters.
    Archery,
    /// Allows crossing water.
    Boats,
    /// Allows entering mountains.
    Climbing,
    /// Unlocks granaries.
    Pottery,
    /// Unlocks shamans and totems.
    Spirituality,
    /// Unlocks mammoth riders.
    Domestication,
    /// Unlocks palisades.
    Masonry,
    /// Unlocks markets.
    Trade,
}

impl TechId {
    /// All technologies in tree order.
    pub const ALL: [Self; 8] = [
        Self::Archery,
        Self::Boats,
        Self::Climbing,
        Self::Pottery,
        Self::Spirituality,
        Self::Domestication,
        Self::Masonry,
        Self::Trade,
    ];

    /// Research points required.
    #[must_use]
    pub const fn cost(self) -> u32 {
        match self {
            Self::Pottery => 15,
            Self::Archery | Self::Spirituality => 20,
            Self::Boats | Self::Climbing => 25,
            Self::Masonry => 30,
            Self::Trade => 35,
            Self::Domestication => 40,
        }
    }

    /// Technologies that must be known before this one can be researched.
    #[must_use]
    pub const fn prerequisites(self) -> &'static [Self] {
        match self {
            Self::Domestication => &[Self::Archery],
            Self::Trade => &[Self::Pottery],
            _ => &[],
        }
    }

    /// Whether `known` satisfies every prerequisite.
    #[must_use]
    pub fn is_available(self, known: &BTreeSet<Self>) -> bool {
        !known.contains(&self) && self.prerequisites().iter().all(|p| known.contains(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prerequisites_gate_availability() {
        let mut known = BTreeSet::new();
        assert!(TechId::Archery.is_available(&known));
        assert!(!TechId::Domestication.is_available(&known));
        known.insert(TechId::Archery);
        assert!(TechId::Domestication.is_available(&known));
        assert!(!TechId::Archery.is_available(&known), "already known");
    }

    #[test]
    fn test_costs_positive() {
        assert!(TechId::ALL.iter().all(|t| t.cost() > 0));
    }
}
