//! Unit kinds, their stat table, and unit instances.

use serde::{Deserialize, Serialize};

use crate::player::PlayerId;
use crate::resources::Resources;
use crate::technology::TechId;

/// Unique identifier of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub u32);

/// Footprint class; large units are barred from rough terrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitSize {
    /// People on foot.
    Small,
    /// Mounted units.
    Large,
}

/// Kind of unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UnitKind {
    /// Adult laborer; required for births.
    Male,
    /// Adult laborer; bears children.
    Female,
    /// Child; matures into a laborer.
    Juvenile,
    /// Basic fighter.
    Warrior,
    /// Fast forager and skirmisher.
    Hunter,
    /// Healer and researcher.
    Shaman,
    /// Heavy mounted fighter.
    MammothRider,
}

/// Cost of ordering a unit or building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCost {
    /// Production points to complete.
    pub points: u32,
    /// Resources paid when the order is queued.
    pub resources: Resources,
}

/// Static stats of a unit kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitStats {
    /// Maximum hit points.
    pub max_hp: u32,
    /// Attack contribution.
    pub attack: u32,
    /// Defense contribution to effective HP.
    pub defense: u32,
    /// Movement points per turn.
    pub movement: u32,
    /// Food eaten per turn.
    pub upkeep: u32,
    /// Carry capacity (food carried and storage contribution).
    pub carry: u32,
    /// Production points contributed to the workforce.
    pub production: u32,
    /// Food foraged per turn.
    pub forage: u32,
    /// Research points per turn.
    pub research: u32,
    /// Culture points per turn.
    pub culture: u32,
    /// Footprint.
    pub size: UnitSize,
    /// Order cost, `None` for kinds that cannot be ordered.
    pub cost: Option<OrderCost>,
    /// Technology needed to order.
    pub required_tech: Option<TechId>,
    /// Unit consumed when ordering.
    pub sacrifice: Option<UnitKind>,
}

impl UnitKind {
    /// All unit kinds.
    pub const ALL: [Self; 7] = [
        Self::Male,
        Self::Female,
        Self::Juvenile,
        Self::Warrior,
        Self::Hunter,
        Self::Shaman,
        Self::MammothRider,
    ];

    /// Stat table.
    #[must_use]
    pub const fn stats(self) -> UnitStats {
        match self {
            Self::Male => UnitStats {
                max_hp: 10,
                attack: 2,
                defense: 1,
                movement: 2,
                upkeep: 2,
                carry: 6,
                production: 2,
                forage: 2,
                research: 0,
                culture: 0,
                size: UnitSize::Small,
                cost: Some(OrderCost {
                    points: 8,
                    resources: Resources::new(10, 0, 0, 0, 0),
                }),
                required_tech: None,
                sacrifice: None,
            },
            Self::Female => UnitStats {
                max_hp: 10,
                attack: 1,
                defense: 1,
                movement: 2,
                upkeep: 2,
                carry: 6,
                production: 2,
                forage: 3,
                research: 0,
                culture: 1,
                size: UnitSize::Small,
                cost: Some(OrderCost {
                    points: 8,
                    resources: Resources::new(10, 0, 0, 0, 0),
                }),
                required_tech: None,
                sacrifice: None,
            },
            Self::Juvenile => UnitStats {
                max_hp: 5,
                attack: 0,
                defense: 0,
                movement: 2,
                upkeep: 1,
                carry: 2,
                production: 0,
                forage: 1,
                research: 0,
                culture: 0,
                size: UnitSize::Small,
                cost: None,
                required_tech: None,
                sacrifice: None,
            },
            Self::Warrior => UnitStats {
                max_hp: 20,
                attack: 6,
                defense: 3,
                movement: 2,
                upkeep: 3,
                carry: 4,
                production: 1,
                forage: 1,
                research: 0,
                culture: 0,
                size: UnitSize::Small,
                cost: Some(OrderCost {
                    points: 12,
                    resources: Resources::new(0, 10, 0, 0, 0),
                }),
                required_tech: None,
                sacrifice: Some(Self::Male),
            },
            Self::Hunter => UnitStats {
                max_hp: 14,
                attack: 4,
                defense: 2,
                movement: 3,
                upkeep: 2,
                carry: 8,
                production: 1,
                forage: 4,
                research: 0,
                culture: 0,
                size: UnitSize::Small,
                cost: Some(OrderCost {
                    points: 12,
                    resources: Resources::new(0, 6, 4, 0, 0),
                }),
                required_tech: Some(TechId::Archery),
                sacrifice: Some(Self::Male),
            },
            Self::Shaman => UnitStats {
                max_hp: 12,
                attack: 1,
                defense: 1,
                movement: 2,
                upkeep: 2,
                carry: 3,
                production: 0,
                forage: 0,
                research: 2,
                culture: 2,
                size: UnitSize::Small,
                cost: Some(OrderCost {
                    points: 15,
                    resources: Resources::new(0, 0, 0, 8, 0),
                }),
                required_tech: Some(TechId::Spirituality),
                sacrifice: Some(Self::Female),
            },
            Self::MammothRider => UnitStats {
                max_hp: 40,
                attack: 10,
                defense: 5,
                movement: 3,
                upkeep: 6,
                carry: 12,
                production: 1,
                forage: 2,
                research: 0,
                culture: 0,
                size: UnitSize::Large,
                cost: Some(OrderCost {
                    points: 25,
                    resources: Resources::new(20, 0, 0, 10, 0),
                }),
                required_tech: Some(TechId::Domestication),
                sacrifice: Some(Self::Warrior),
            },
        }
    }

    /// Fighters the AI considers military.
    #[must_use]
    pub const fn is_combatant(self) -> bool {
        matches!(self, Self::Warrior | Self::Hunter | Self::MammothRider)
    }

    /// Male or female laborers.
    #[must_use]
    pub const fn is_laborer(self) -> bool {
        matches!(self, Self::Male | Self::Female)
    }

    /// Units that reduce disease risk and speed healing.
    #[must_use]
    pub const fn is_healer(self) -> bool {
        matches!(self, Self::Shaman)
    }

    /// Whether this kind is barred from terrain that disallows large units.
    #[must_use]
    pub const fn is_large(self) -> bool {
        matches!(self.stats().size, UnitSize::Large)
    }
}

/// A single unit instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// Identifier.
    pub id: UnitId,
    /// Kind.
    pub kind: UnitKind,
    /// Owning player.
    pub owner: PlayerId,
    /// Current hit points; the unit dies at 0.
    pub hp: u32,
    /// Maximum hit points.
    pub max_hp: u32,
    /// Food carried by this unit.
    pub carried_food: u32,
    /// Turns lived, tracked only for juveniles.
    pub age: Option<u32>,
    /// Took disease damage this turn.
    pub sick: bool,
    /// Took starvation damage this turn.
    pub starved: bool,
}

impl Unit {
    /// A fresh unit at full health.
    #[must_use]
    pub fn new(id: UnitId, kind: UnitKind, owner: PlayerId) -> Self {
        let max_hp = kind.stats().max_hp;
        Self {
            id,
            kind,
            owner,
            hp: max_hp,
            max_hp,
            carried_food: 0,
            age: matches!(kind, UnitKind::Juvenile).then_some(0),
            sick: false,
            starved: false,
        }
    }

    /// Whether the unit still has hit points.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Static stats of this unit's kind.
    #[must_use]
    pub const fn stats(&self) -> UnitStats {
        self.kind.stats()
    }

    /// Apply damage, saturating at zero.
    pub fn damage(&mut self, amount: u32) {
        self.hp = self.hp.saturating_sub(amount);
    }

    /// Restore hit points up to the maximum.
    pub fn heal(&mut self, amount: u32) {
        self.hp = (self.hp + amount).min(self.max_hp);
    }

    /// Grow a juvenile into `adult`, keeping the damage it has taken.
    pub fn mature_into(&mut self, adult: UnitKind) {
        let new_max = adult.stats().max_hp;
        let missing = self.max_hp.saturating_sub(self.hp);
        self.kind = adult;
        self.max_hp = new_max;
        self.hp = new_max.saturating_sub(missing).max(1);
        self.age = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_juveniles_have_age() {
        let child = Unit::new(UnitId(1), UnitKind::Juvenile, PlayerId(0));
        let adult = Unit::new(UnitId(2), UnitKind::Female, PlayerId(0));
        assert_eq!(child.age, Some(0));
        assert_eq!(adult.age, None);
    }

    #[test]
    fn test_juveniles_cannot_be_ordered() {
        assert!(UnitKind::Juvenile.stats().cost.is_none());
        for kind in UnitKind::ALL {
            if kind != UnitKind::Juvenile {
                assert!(kind.stats().cost.is_some(), "{kind:?}");
            }
        }
    }

    #[test]
    fn test_mature_keeps_damage() {
        let mut child = Unit::new(UnitId(1), UnitKind::Juvenile, PlayerId(0));
        child.damage(2);
        child.mature_into(UnitKind::Male);
        assert_eq!(child.kind, UnitKind::Male);
        assert_eq!(child.max_hp, 10);
        assert_eq!(child.hp, 8);
        assert_eq!(child.age, None);
    }

    #[test]
    fn test_damage_and_heal_saturate() {
        let mut u = Unit::new(UnitId(1), UnitKind::Warrior, PlayerId(0));
        u.damage(100);
        assert!(!u.is_alive());
        u.heal(500);
        assert_eq!(u.hp, u.max_hp);
    }

    #[test]
    fn test_mammoth_is_large() {
        assert!(UnitKind::MammothRider.is_large());
        assert!(!UnitKind::Warrior.is_large());
    }
}
