//! Cultural axes, traits, and per-turn drift.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Lowest and highest value of any axis.
pub const AXIS_LIMIT: i32 = 100;

/// Axis value at which a trait unlocks.
pub const TRAIT_THRESHOLD: i32 = 50;

/// Position of a tribe on the three cultural axes, each in `[-100, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CultureAxes {
    /// Warlike (+) versus pacifist (-).
    pub militarism: i32,
    /// Nomadic (+) versus sedentary (-).
    pub mobility: i32,
    /// Mystic (+) versus pragmatic (-).
    pub spirituality: i32,
}

impl CultureAxes {
    /// Clamp every axis into range.
    pub fn clamp(&mut self) {
        self.militarism = self.militarism.clamp(-AXIS_LIMIT, AXIS_LIMIT);
        self.mobility = self.mobility.clamp(-AXIS_LIMIT, AXIS_LIMIT);
        self.spirituality = self.spirituality.clamp(-AXIS_LIMIT, AXIS_LIMIT);
    }
}

/// Permanent trait unlocked by pushing an axis far enough.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CultureTrait {
    /// +1 attack per fighter.
    Warlike,
    /// +1 healing per turn.
    Pacifist,
    /// +1 war-band movement.
    Nomadic,
    /// +2 gold per settlement.
    Sedentary,
    /// +2 research per turn.
    Mystic,
    /// +2 workforce per holding.
    Pragmatic,
}

impl CultureTrait {
    /// All traits.
    pub const ALL: [Self; 6] = [
        Self::Warlike,
        Self::Pacifist,
        Self::Nomadic,
        Self::Sedentary,
        Self::Mystic,
        Self::Pragmatic,
    ];

    /// Whether the axes currently satisfy this trait's requirement.
    #[must_use]
    pub const fn is_satisfied(self, axes: &CultureAxes) -> bool {
        match self {
            Self::Warlike => axes.militarism >= TRAIT_THRESHOLD,
            Self::Pacifist => axes.militarism <= -TRAIT_THRESHOLD,
            Self::Nomadic => axes.mobility >= TRAIT_THRESHOLD,
            Self::Sedentary => axes.mobility <= -TRAIT_THRESHOLD,
            Self::Mystic => axes.spirituality >= TRAIT_THRESHOLD,
            Self::Pragmatic => axes.spirituality <= -TRAIT_THRESHOLD,
        }
    }
}

/// What a player did this turn; cleared at turn advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TurnActions {
    /// Attacks launched.
    pub attacks: u32,
    /// War-band moves.
    pub moves: u32,
    /// Camps founded.
    pub camps_founded: u32,
    /// Camps broken.
    pub camps_broken: u32,
    /// Culture points produced.
    pub culture_produced: u32,
}

/// Drift magnitudes, taken from the game rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriftRates {
    /// Militarism gained per attack.
    pub per_attack: i32,
    /// Militarism lost on a turn without attacks.
    pub peace_decay: i32,
    /// Mobility change per camp founded or broken.
    pub per_camp_event: i32,
}

/// A player's culture: axes, unlocked traits, and accumulated points.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Culture {
    /// Axis positions.
    pub axes: CultureAxes,
    /// Traits unlocked so far. Traits are never lost.
    pub traits: BTreeSet<CultureTrait>,
    /// Accumulated culture points.
    pub points: u32,
}

impl Culture {
    /// Whether `t` is unlocked.
    #[must_use]
    pub fn has(&self, t: CultureTrait) -> bool {
        self.traits.contains(&t)
    }

    /// Drift the axes from this turn's actions and return any newly
    /// unlocked traits.
    pub fn drift(&mut self, actions: &TurnActions, rates: DriftRates) -> Vec<CultureTrait> {
        let axes = &mut self.axes;

        if actions.attacks > 0 {
            axes.militarism += rates.per_attack * actions.attacks as i32;
        } else {
            axes.militarism -= rates.peace_decay;
        }

        axes.mobility += rates.per_camp_event * actions.camps_broken as i32;
        axes.mobility -= rates.per_camp_event * actions.camps_founded as i32;
        axes.mobility += if actions.moves > 0 { 1 } else { -1 };

        if actions.culture_produced > 0 {
            axes.spirituality += 1;
        } else {
            axes.spirituality -= axes.spirituality.signum();
        }

        axes.clamp();

        let mut unlocked = Vec::new();
        for t in CultureTrait::ALL {
            if t.is_satisfied(&self.axes) && self.traits.insert(t) {
                unlocked.push(t);
            }
        }
        unlocked
    }
}
