//! Combat matchup tables.
//!
//! Battles are deterministic, so balance can be checked exhaustively rather
//! than by sampling: every pairing of unit kinds is resolved once with the
//! pure exchange formula.

use tribes_core::combat::{exchange, CombatSide, CombatUnit, Exchange};
use tribes_core::units::{UnitId, UnitKind};

/// Combatants and laborers that appear in matchup tables.
pub const MATCHUP_KINDS: [UnitKind; 6] = [
    UnitKind::Male,
    UnitKind::Female,
    UnitKind::Warrior,
    UnitKind::Hunter,
    UnitKind::Shaman,
    UnitKind::MammothRider,
];

/// A side of `count` full-health units of `kind`.
#[must_use]
pub fn side(kind: UnitKind, count: u32, bonus_per_unit: u32) -> CombatSide {
    let stats = kind.stats();
    CombatSide {
        units: (0..count)
            .map(|i| CombatUnit {
                id: UnitId(i + 1),
                kind,
                hp: stats.max_hp,
                attack: stats.attack,
                defense: stats.defense,
            })
            .collect(),
        bonus_per_unit,
        base_hp: 0,
    }
}

/// One row of a matchup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Matchup {
    /// Attacking kind.
    pub attacker: UnitKind,
    /// Defending kind.
    pub defender: UnitKind,
    /// Casualty exchange for one unit against one unit.
    pub exchange: Exchange,
}

impl Matchup {
    /// Whether the attacker takes a smaller share of losses.
    #[must_use]
    pub fn attacker_favoured(&self) -> bool {
        self.exchange.attacker_ratio < self.exchange.defender_ratio
    }
}

/// One-on-one exchange for every attacker/defender pair on open ground.
#[must_use]
pub fn matchup_table() -> Vec<Matchup> {
    MATCHUP_KINDS
        .iter()
        .flat_map(|&a| {
            MATCHUP_KINDS.iter().map(move |&d| Matchup {
                attacker: a,
                defender: d,
                exchange: exchange(&side(a, 1, 0), &side(d, 1, 0)),
            })
        })
        .collect()
}

/// Smallest number of `attacker` units that is favoured against `count`
/// `defender` units with the given per-unit bonus, up to `limit`.
#[must_use]
pub fn units_to_win(
    attacker: UnitKind,
    defender: UnitKind,
    count: u32,
    bonus_per_unit: u32,
    limit: u32,
) -> Option<u32> {
    let defence = side(defender, count, bonus_per_unit);
    (1..=limit).find(|&n| {
        let e = exchange(&side(attacker, n, 0), &defence);
        e.attacker_ratio < e.defender_ratio
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirror_matches_are_even() {
        for m in matchup_table().iter().filter(|m| m.attacker == m.defender) {
            assert_eq!(m.exchange.attacker_ratio, m.exchange.defender_ratio);
            assert!(!m.attacker_favoured());
        }
    }

    #[test]
    fn test_warriors_beat_laborers() {
        let table = matchup_table();
        let m = table
            .iter()
            .find(|m| m.attacker == UnitKind::Warrior && m.defender == UnitKind::Male)
            .expect("row");
        assert!(m.attacker_favoured());
    }

    #[test]
    fn test_fortification_costs_attackers() {
        let open = units_to_win(UnitKind::Warrior, UnitKind::Warrior, 3, 0, 20).expect("open");
        let walled = units_to_win(UnitKind::Warrior, UnitKind::Warrior, 3, 30, 20).expect("walled");
        assert_eq!(open, 4);
        assert!(walled > open);
    }
}
