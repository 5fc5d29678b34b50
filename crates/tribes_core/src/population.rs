//! Births, maturity, camp growth and disease.

use rand::Rng;
use tracing::debug;

use crate::container::{Container, ContainerRef, DiseaseFactor, DiseaseReport};
use crate::player::PlayerId;
use crate::rules::GameRules;
use crate::state::WorldState;
use crate::terrain::Terrain;
use crate::units::{UnitId, UnitKind};

// ============================================================================
// Stage 4: population
// ============================================================================

/// Age juveniles, roll births, and grow camps.
pub fn grow(state: &mut WorldState, owner: PlayerId) {
    let rules = state.rules().clone();
    for r in state.holdings_of(owner) {
        let members: Vec<(UnitId, UnitKind, Option<u32>)> = state
            .units_in(r)
            .iter()
            .map(|u| (u.id, u.kind, u.age))
            .collect();

        for &(id, _, age) in &members {
            let Some(age) = age else {
                continue;
            };
            let age = age + 1;
            let adult = if age >= rules.juvenile_maturity_turns {
                Some(if state.rng_mut().gen_bool(0.5) {
                    UnitKind::Male
                } else {
                    UnitKind::Female
                })
            } else {
                None
            };
            if let Some(unit) = state.unit_mut(id) {
                match adult {
                    Some(kind) => {
                        unit.mature_into(kind);
                        debug!(unit = id.0, ?kind, "juvenile matured");
                    }
                    None => unit.age = Some(age),
                }
            }
        }

        let has_male = members.iter().any(|m| m.1 == UnitKind::Male);
        if has_male {
            let females = members.iter().filter(|m| m.1 == UnitKind::Female).count();
            let mut births = 0;
            for _ in 0..females {
                if state.rng_mut().gen_range(0..100) < rules.birth_chance_pct {
                    births += 1;
                }
            }
            for _ in 0..births {
                let child = state.create_unit(owner, UnitKind::Juvenile);
                if let Some(h) = state.holding_mut(r) {
                    h.units.push(child);
                }
            }
            if births > 0 {
                debug!(holder = %r, births, "births");
            }
        }

        let encamped = matches!(r, ContainerRef::WarBand(id)
            if state.war_band(id).is_some_and(|b| b.is_encamped()));
        if encamped {
            let gained = state
                .container_mut(r)
                .and_then(|c| c.growth_mut())
                .map_or(0, |g| g.add_experience(rules.camp_passive_experience, &rules));
            if let Some(h) = state.holding_mut(r) {
                h.pending_expansions += gained;
            }
        }

        if let ContainerRef::WarBand(id) = r {
            state.refresh_band_movement(id);
        }
        state.refresh_capacity(r);
    }
}

// ============================================================================
// Stage 5: disease
// ============================================================================

/// Inputs to a disease risk evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiseaseInputs {
    /// Terrain of the holding's tile.
    pub terrain: Terrain,
    /// Turns a mobile band has stayed put; zero for settlements and camps.
    pub turns_stagnant: u32,
    /// Units in the holding.
    pub population: u32,
    /// Flat reduction from buildings.
    pub flat_reduction: u32,
    /// Percentage reduction from buildings.
    pub pct_reduction: u32,
    /// Healers in the holding.
    pub healers: u32,
}

/// Compute disease risk and its breakdown.
#[must_use]
pub fn disease_risk(inputs: &DiseaseInputs, rules: &GameRules) -> DiseaseReport {
    let mut factors = Vec::new();
    let mut push = |factor, value: i32| {
        if value != 0 {
            factors.push((factor, value));
        }
    };

    let terrain = inputs.terrain.disease_risk() as i32;
    push(DiseaseFactor::Terrain, terrain);
    let stagnation = (inputs.turns_stagnant * rules.stagnation_risk_per_turn)
        .min(rules.stagnation_risk_cap) as i32;
    push(DiseaseFactor::Stagnation, stagnation);
    let crowding = (inputs.population.saturating_sub(rules.overcrowding_threshold)
        * rules.overcrowding_risk_per_unit) as i32;
    push(DiseaseFactor::Overcrowding, crowding);

    let mut risk = terrain + stagnation + crowding;

    let flat = (inputs.flat_reduction as i32).min(risk);
    push(DiseaseFactor::HealersHut, -flat);
    risk -= flat;

    let pct = risk * inputs.pct_reduction.min(100) as i32 / 100;
    push(DiseaseFactor::Well, -pct);
    risk -= pct;

    let mut healer_total = 0;
    let mut step = rules.healer_risk_reduction;
    for _ in 0..inputs.healers {
        healer_total += step;
        step /= 2;
    }
    let healers = (healer_total.min(rules.healer_risk_reduction_cap) as i32).min(risk);
    push(DiseaseFactor::Healers, -healers);
    risk -= healers;

    DiseaseReport {
        risk_pct: (risk.max(0) as u32).min(rules.disease_risk_cap),
        factors,
    }
}

/// Tick stagnation, evaluate risk, and roll for an outbreak in each holding.
pub fn spread_disease(state: &mut WorldState, owner: PlayerId) {
    let rules = state.rules().clone();
    for r in state.holdings_of(owner) {
        let mobile_idle = match r {
            ContainerRef::WarBand(id) => state
                .war_band(id)
                .is_some_and(|b| !b.is_encamped() && !b.moved_this_turn),
            ContainerRef::Settlement(_) => false,
        };
        let Some(position) = state.container(r).map(|c| c.position()) else {
            continue;
        };
        if mobile_idle {
            if let Some(tile) = state.tile_mut(position) {
                tile.turns_occupied += 1;
            }
        }

        let Some(container) = state.container(r) else {
            continue;
        };
        let (flat_reduction, pct_reduction) = container.buildings().map_or((0, 0), |b| {
            b.iter().fold((0, 0), |(f, p), k| {
                (f + k.disease_flat_reduction(), p + k.disease_pct_reduction())
            })
        });
        let units = state.units_in(r);
        let ids: Vec<UnitId> = units.iter().map(|u| u.id).collect();
        let inputs = DiseaseInputs {
            terrain: state.tile(position).map_or_else(Terrain::default, |t| t.terrain),
            turns_stagnant: match r {
                ContainerRef::WarBand(id)
                    if state.war_band(id).is_some_and(|b| !b.is_encamped()) =>
                {
                    state.tile(position).map_or(0, |t| t.turns_occupied)
                }
                _ => 0,
            },
            population: ids.len() as u32,
            flat_reduction,
            pct_reduction,
            healers: units.iter().filter(|u| u.kind.is_healer()).count() as u32,
        };
        let report = disease_risk(&inputs, &rules);
        let risk = report.risk_pct;
        if let Some(h) = state.holding_mut(r) {
            h.disease = report;
        }

        let mut struck = false;
        if !ids.is_empty() && risk > 0 && state.rng_mut().gen_range(0..100) < risk {
            let victim = ids[state.rng_mut().gen_range(0..ids.len())];
            if let Some(unit) = state.unit_mut(victim) {
                unit.damage(rules.disease_damage);
                unit.sick = true;
            }
            struck = true;
            debug!(holder = %r, unit = victim.0, risk, "disease outbreak");
        }
        if let Some(tile) = state.tile_mut(position) {
            tile.sick_last_turn = struck;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hex::HexCoord;
    use crate::player::Player;

    #[test]
    fn test_risk_breakdown() {
        let rules = GameRules::default();
        let inputs = DiseaseInputs {
            terrain: Terrain::Swamp,
            turns_stagnant: 3,
            population: 12,
            flat_reduction: 5,
            pct_reduction: 30,
            healers: 2,
        };
        let report = disease_risk(&inputs, &rules);
        // 15 + 6 + 2 = 23; -5 = 18; -30% (5) = 13; healers 4 + 2 = 6 -> 7.
        assert_eq!(report.risk_pct, 7);
        assert_eq!(
            report.factors,
            vec![
                (DiseaseFactor::Terrain, 15),
                (DiseaseFactor::Stagnation, 6),
                (DiseaseFactor::Overcrowding, 2),
                (DiseaseFactor::HealersHut, -5),
                (DiseaseFactor::Well, -5),
                (DiseaseFactor::Healers, -6),
            ]
        );
    }

    #[test]
    fn test_risk_caps() {
        let rules = GameRules::default();
        let many_healers = DiseaseInputs {
            terrain: Terrain::Plains,
            healers: 10,
            ..DiseaseInputs::default()
        };
        assert_eq!(disease_risk(&many_healers, &rules).risk_pct, 0);

        let stagnant = DiseaseInputs {
            terrain: Terrain::Ocean,
            turns_stagnant: 100,
            ..DiseaseInputs::default()
        };
        assert_eq!(disease_risk(&stagnant, &rules).risk_pct, 20);

        let crowded = DiseaseInputs {
            terrain: Terrain::Swamp,
            population: 500,
            ..DiseaseInputs::default()
        };
        assert_eq!(disease_risk(&crowded, &rules).risk_pct, 95);
    }

    fn world(rules: GameRules) -> WorldState {
        let mut w = WorldState::blank(8, 8, Terrain::Plains, 4, rules);
        w.add_player(Player::new(PlayerId(0), "A", false));
        w
    }

    #[test]
    fn test_juveniles_mature() {
        let rules = GameRules {
            juvenile_maturity_turns: 2,
            birth_chance_pct: 0,
            ..GameRules::default()
        };
        let mut w = world(rules);
        let band = w
            .spawn_war_band(PlayerId(0), HexCoord::from_offset(3, 3), &[UnitKind::Juvenile])
            .expect("spawn");
        let child = w.war_band(band).expect("band").holding.units[0];
        grow(&mut w, PlayerId(0));
        assert_eq!(w.unit(child).and_then(|u| u.age), Some(1));
        grow(&mut w, PlayerId(0));
        let adult = w.unit(child).expect("unit");
        assert!(adult.kind.is_laborer());
        assert_eq!(adult.age, None);
        assert_eq!(adult.hp, 10);
    }

    #[test]
    fn test_births_need_a_male() {
        let rules = GameRules {
            birth_chance_pct: 100,
            ..GameRules::default()
        };
        let mut w = world(rules);
        let lonely = w
            .spawn_war_band(PlayerId(0), HexCoord::from_offset(1, 1), &[UnitKind::Female])
            .expect("spawn");
        let couple = w
            .spawn_war_band(
                PlayerId(0),
                HexCoord::from_offset(5, 5),
                &[UnitKind::Female, UnitKind::Male],
            )
            .expect("spawn");
        grow(&mut w, PlayerId(0));
        assert_eq!(w.war_band(lonely).map(|b| b.holding.units.len()), Some(1));
        assert_eq!(w.war_band(couple).map(|b| b.holding.units.len()), Some(3));
    }

    #[test]
    fn test_certain_outbreak_flags_unit_and_tile() {
        let rules = GameRules {
            stagnation_risk_per_turn: 100,
            stagnation_risk_cap: 100,
            disease_risk_cap: 100,
            ..GameRules::default()
        };
        let mut w = world(rules);
        let pos = HexCoord::from_offset(3, 3);
        let band = w
            .spawn_war_band(PlayerId(0), pos, &[UnitKind::Warrior])
            .expect("spawn");
        spread_disease(&mut w, PlayerId(0));
        let unit = w.war_band(band).expect("band").holding.units[0];
        let u = w.unit(unit).expect("unit");
        assert!(u.sick);
        assert_eq!(u.hp, 17);
        assert!(w.tile(pos).is_some_and(|t| t.sick_last_turn && t.turns_occupied == 1));
        assert_eq!(w.holding(ContainerRef::WarBand(band)).map(|h| h.disease.risk_pct), Some(100));
    }
}
