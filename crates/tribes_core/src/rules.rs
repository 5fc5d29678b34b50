//! Tunable game rules.
//!
//! Every number the turn pipeline and AI use that is not intrinsic to a
//! unit, building, or terrain lives here, so balance can be changed per game
//! from a RON file without touching code. Missing fields fall back to the
//! defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::culture::DriftRates;
use crate::error::{GameError, Result};

/// Pipeline, economy, and AI tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameRules {
    // Capacity
    /// Base non-food storage of a settlement.
    pub settlement_base_storage: u32,
    /// Base non-food storage of a camp.
    pub camp_base_storage: u32,
    /// Base food capacity of a settlement.
    pub settlement_base_food_capacity: u32,
    /// Base food capacity of a camp.
    pub camp_base_food_capacity: u32,

    // Food
    /// Damage every unit takes when its holding cannot pay upkeep.
    pub starvation_damage: u32,

    // Production and growth
    /// Experience granted when a production item completes.
    pub experience_per_completion: u32,
    /// Experience a camp earns every turn.
    pub camp_passive_experience: u32,
    /// Experience needed for level 2; each later level needs 1.5x more.
    pub base_level_experience: u32,
    /// Building slots of a new settlement or camp.
    pub starting_building_slots: u32,

    // Population
    /// Turns a juvenile needs to mature.
    pub juvenile_maturity_turns: u32,
    /// Percent chance per adult female per turn of a birth.
    pub birth_chance_pct: u32,

    // Disease
    /// Damage dealt to the unit hit by disease.
    pub disease_damage: u32,
    /// Risk added per turn a war-band stays on the same tile.
    pub stagnation_risk_per_turn: u32,
    /// Cap on the stagnation risk term.
    pub stagnation_risk_cap: u32,
    /// Units a holding can hold before overcrowding adds risk.
    pub overcrowding_threshold: u32,
    /// Risk added per unit above the threshold.
    pub overcrowding_risk_per_unit: u32,
    /// Risk removed by the first healer; each further healer removes half
    /// as much as the previous one.
    pub healer_risk_reduction: u32,
    /// Cap on the total healer reduction.
    pub healer_risk_reduction_cap: u32,
    /// Upper bound on disease risk.
    pub disease_risk_cap: u32,

    // Economy and healing
    /// Gold each settlement produces.
    pub settlement_base_income: u32,
    /// Extra gold per settlement level above 1.
    pub income_per_level: u32,
    /// Hit points units heal on friendly territory.
    pub base_heal: u32,
    /// Extra healing per healer in the holding.
    pub healer_heal_bonus: u32,
    /// Cap on the number of healers counted for healing.
    pub max_counted_healers: u32,
    /// Hit points a settlement regains per turn.
    pub settlement_repair: u32,
    /// Gold price of the first purchased tile.
    pub territory_base_price: u32,
    /// Extra gold per tile already owned.
    pub territory_price_step: u32,

    // Regrowth
    /// Percent of the terrain maximum renewable pools regrow each round.
    pub regrowth_pct: u32,

    // Combat
    /// Settlement hit points.
    pub settlement_max_hp: u32,
    /// Per-unit effective HP bonus for an encamped defender.
    pub camp_fortification: u32,

    // Culture
    /// Militarism gained per attack.
    pub militarism_per_attack: i32,
    /// Militarism lost on a peaceful turn.
    pub militarism_peace_decay: i32,
    /// Mobility change per camp founded or broken.
    pub mobility_per_camp_event: i32,

    // AI
    /// Settlement garrison size at which the AI splits off a war-band.
    pub ai_split_threshold: u32,
    /// Minimum encamped band size before the AI breaks camp.
    pub ai_break_camp_size: u32,
    /// Minimum health percent before the AI breaks camp.
    pub ai_break_camp_health_pct: u32,
    /// Health percent below which a mobile AI band makes camp.
    pub ai_camp_health_pct: u32,

    // Setup
    /// Gold every player starts with.
    pub starting_gold: u32,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            settlement_base_storage: 60,
            camp_base_storage: 30,
            settlement_base_food_capacity: 40,
            camp_base_food_capacity: 20,
            starvation_damage: 2,
            experience_per_completion: 5,
            camp_passive_experience: 3,
            base_level_experience: 20,
            starting_building_slots: 2,
            juvenile_maturity_turns: 6,
            birth_chance_pct: 15,
            disease_damage: 3,
            stagnation_risk_per_turn: 2,
            stagnation_risk_cap: 20,
            overcrowding_threshold: 10,
            overcrowding_risk_per_unit: 1,
            healer_risk_reduction: 4,
            healer_risk_reduction_cap: 10,
            disease_risk_cap: 95,
            settlement_base_income: 2,
            income_per_level: 1,
            base_heal: 2,
            healer_heal_bonus: 1,
            max_counted_healers: 3,
            settlement_repair: 5,
            territory_base_price: 10,
            territory_price_step: 5,
            regrowth_pct: 10,
            settlement_max_hp: 50,
            camp_fortification: 2,
            militarism_per_attack: 3,
            militarism_peace_decay: 1,
            mobility_per_camp_event: 2,
            ai_split_threshold: 6,
            ai_break_camp_size: 4,
            ai_break_camp_health_pct: 80,
            ai_camp_health_pct: 50,
            starting_gold: 20,
        }
    }
}

impl GameRules {
    /// Parse rules from RON text.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        ron::from_str(text).map_err(|e| GameError::RulesParseError(e.to_string()))
    }

    /// Read rules from a RON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| GameError::RulesParseError(format!("{}: {e}", path.display())))?;
        Self::from_ron_str(&text)
    }

    /// Render rules as pretty RON text.
    pub fn to_ron_string(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| GameError::Serialization(e.to_string()))
    }

    /// Culture drift magnitudes.
    #[must_use]
    pub const fn drift_rates(&self) -> DriftRates {
        DriftRates {
            per_attack: self.militarism_per_attack,
            peace_decay: self.militarism_peace_decay,
            per_camp_event: self.mobility_per_camp_event,
        }
    }

    /// Experience needed to go from `level` to `level + 1`.
    ///
    /// `base × 1.5^(level − 1)`, computed in integers.
    #[must_use]
    pub fn experience_threshold(&self, level: u32) -> u32 {
        let mut threshold = u64::from(self.base_level_experience.max(1));
        for _ in 1..level {
            threshold = threshold * 3 / 2;
            if threshold > u64::from(u32::MAX) {
                return u32::MAX;
            }
        }
        threshold as u32
    }

    /// Gold price of the next tile for a holding that owns `owned` tiles.
    #[must_use]
    pub const fn territory_price(&self, owned: u32) -> u32 {
        self.territory_base_price + self.territory_price_step * owned
    }
}
