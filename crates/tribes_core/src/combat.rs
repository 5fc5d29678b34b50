//! Deterministic proportional-casualty combat.
//!
//! Each side has an attack power (sum of unit attack) and an effective HP
//! (hit points plus defense plus positional bonuses, plus a settlement's own
//! hit points). A side's power is `attack × effective HP`. Each side loses
//! `round(effective HP × opposing power / total power)` hit points, removed
//! from its weakest unit first.
//!
//! No randomness is involved: the same armies always produce the same result.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::container::{Container, ContainerRef, WarBandId};
use crate::culture::CultureTrait;
use crate::error::{GameError, Result};
use crate::hex::HexCoord;
use crate::math::{fixed_serde, mul_div_round, ratio, Fixed};
use crate::player::PlayerId;
use crate::state::WorldState;
use crate::units::{UnitId, UnitKind};

// ============================================================================
// Pure resolution
// ============================================================================

/// A unit as seen by the combat resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CombatUnit {
    /// Unit id; breaks hit-point ties when assigning damage.
    pub id: UnitId,
    /// Kind, for reporting.
    pub kind: UnitKind,
    /// Current hit points.
    pub hp: u32,
    /// Attack, including trait bonuses.
    pub attack: u32,
    /// Defense.
    pub defense: u32,
}

/// One side of a battle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CombatSide {
    /// Participating units.
    pub units: Vec<CombatUnit>,
    /// Effective HP added per unit (terrain and fortification; defender only).
    pub bonus_per_unit: u32,
    /// Settlement hit points, zero for war-bands.
    pub base_hp: u32,
}

impl CombatSide {
    /// Sum of unit attack.
    #[must_use]
    pub fn attack_power(&self) -> u64 {
        self.units.iter().map(|u| u64::from(u.attack)).sum()
    }

    /// Sum of unit hp, defense, and bonus, plus the settlement's hit points.
    #[must_use]
    pub fn effective_hp(&self) -> u64 {
        let units: u64 = self
            .units
            .iter()
            .map(|u| u64::from(u.hp) + u64::from(u.defense) + u64::from(self.bonus_per_unit))
            .sum();
        units + u64::from(self.base_hp)
    }

    /// `attack × effective HP`.
    #[must_use]
    pub fn power(&self) -> u64 {
        self.attack_power().saturating_mul(self.effective_hp())
    }

    /// Remove `amount` hit points, lowest-hp unit first (ties by id). Whatever
    /// the units cannot absorb comes off `base_hp`. Dead units are dropped.
    pub fn absorb(&mut self, amount: u64) {
        let mut left = amount;
        self.units.sort_by_key(|u| (u.hp, u.id));
        for unit in &mut self.units {
            if left == 0 {
                break;
            }
            let taken = left.min(u64::from(unit.hp));
            unit.hp -= taken as u32;
            left -= taken;
        }
        self.units.retain(|u| u.hp > 0);
        let base_loss = left.min(u64::from(self.base_hp));
        self.base_hp -= base_loss as u32;
    }
}

/// Hit points each side loses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exchange {
    /// Fraction of the attacker's effective HP lost.
    pub attacker_ratio: Fixed,
    /// Hit points removed from the attacker.
    pub attacker_loss: u64,
    /// Fraction of the defender's effective HP lost.
    pub defender_ratio: Fixed,
    /// Hit points removed from the defender.
    pub defender_loss: u64,
}

/// Compute the casualty exchange between two sides.
#[must_use]
pub fn exchange(attacker: &CombatSide, defender: &CombatSide) -> Exchange {
    let a_power = attacker.power();
    let d_power = defender.power();
    let total = a_power.saturating_add(d_power);
    Exchange {
        attacker_ratio: ratio(d_power, total),
        attacker_loss: mul_div_round(attacker.effective_hp(), d_power, total),
        defender_ratio: ratio(a_power, total),
        defender_loss: mul_div_round(defender.effective_hp(), a_power, total),
    }
}

// ============================================================================
// Reports
// ============================================================================

/// Outcome for one side of a battle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideReport {
    /// Holding that fought.
    pub holder: ContainerRef,
    /// Owning player.
    pub owner: PlayerId,
    /// Units by kind before the battle.
    pub initial: BTreeMap<UnitKind, u32>,
    /// Units by kind killed.
    pub losses: BTreeMap<UnitKind, u32>,
    /// Units by kind alive after the battle.
    pub survivors: BTreeMap<UnitKind, u32>,
    /// Effective HP going in.
    pub effective_hp: u64,
    /// Combat power going in.
    pub power: u64,
    /// Fraction of effective HP lost.
    #[serde(with = "fixed_serde")]
    pub loss_ratio: Fixed,
    /// Hit points removed.
    pub hp_removed: u64,
    /// Whether this side won.
    pub won: bool,
}

/// Full record of a resolved battle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleReport {
    /// Round in which the battle happened.
    pub turn: u32,
    /// Defender's tile.
    pub location: HexCoord,
    /// Attacking side.
    pub attacker: SideReport,
    /// Defending side.
    pub defender: SideReport,
    /// Hit points the defending settlement lost.
    pub settlement_hp_lost: u32,
}

/// Power comparison used to decide whether to attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Forecast {
    /// Attacker power.
    pub attacker_power: u64,
    /// Defender power.
    pub defender_power: u64,
    /// `attacker_power / defender_power`.
    #[serde(with = "fixed_serde")]
    pub odds: Fixed,
}

// ============================================================================
// Resolution against the world
// ============================================================================

/// Build the combat view of a holding.
#[must_use]
pub fn build_side(state: &WorldState, r: ContainerRef, defending: bool) -> Option<CombatSide> {
    let container = state.container(r)?;
    let warlike = state
        .player(container.owner())
        .is_some_and(|p| p.culture.has(CultureTrait::Warlike));

    let units = state
        .units_in(r)
        .into_iter()
        .map(|u| {
            let stats = u.stats();
            let bonus = u32::from(warlike && u.kind.is_combatant());
            CombatUnit {
                id: u.id,
                kind: u.kind,
                hp: u.hp,
                attack: stats.attack + bonus,
                defense: stats.defense,
            }
        })
        .collect();

    let mut side = CombatSide {
        units,
        ..CombatSide::default()
    };

    if defending {
        let terrain = state
            .tile(container.position())
            .map_or(0, |t| t.terrain.defense_bonus());
        let buildings: u32 = container
            .buildings()
            .map_or(0, |b| b.iter().map(|k| k.fortification()).sum());
        let camp = match r {
            ContainerRef::WarBand(id) if state.war_band(id).is_some_and(|b| b.is_encamped()) => {
                state.rules().camp_fortification
            }
            _ => 0,
        };
        side.bonus_per_unit = terrain + buildings + camp;
        if let ContainerRef::Settlement(id) = r {
            side.base_hp = state.settlement(id).map_or(0, |s| s.hp);
        }
    }
    Some(side)
}

/// Compare the powers of an attacker and a defender without fighting.
#[must_use]
pub fn forecast(state: &WorldState, attacker: WarBandId, defender: ContainerRef) -> Option<Forecast> {
    let a = build_side(state, ContainerRef::WarBand(attacker), false)?;
    let d = build_side(state, defender, true)?;
    let (attacker_power, defender_power) = (a.power(), d.power());
    Some(Forecast {
        attacker_power,
        defender_power,
        odds: ratio(attacker_power, defender_power),
    })
}

fn count_kinds(units: &[CombatUnit]) -> BTreeMap<UnitKind, u32> {
    let mut out = BTreeMap::new();
    for u in units {
        *out.entry(u.kind).or_insert(0) += 1;
    }
    out
}

fn losses(initial: &BTreeMap<UnitKind, u32>, survivors: &BTreeMap<UnitKind, u32>) -> BTreeMap<UnitKind, u32> {
    initial
        .iter()
        .filter_map(|(kind, &n)| {
            let lost = n - survivors.get(kind).copied().unwrap_or(0);
            (lost > 0).then_some((*kind, lost))
        })
        .collect()
}

/// Fight a battle and apply the outcome to `state`.
///
/// The attacker spends all of its movement. A defender with no units left
/// is defeated (an encamped band only if it was empty to begin with), as is
/// a settlement whose hit points reach zero. A defeated defender is deleted
/// and the surviving attacker moves onto its tile; a defeated attacker is
/// deleted. The report is also stored as the state's last battle.
pub fn resolve_battle(
    state: &mut WorldState,
    attacker: WarBandId,
    defender: ContainerRef,
) -> Result<BattleReport> {
    let attacker_ref = ContainerRef::WarBand(attacker);
    let mut a_side =
        build_side(state, attacker_ref, false).ok_or(GameError::WarBandNotFound(attacker.0))?;
    let mut d_side = build_side(state, defender, true)
        .ok_or_else(|| crate::state::missing_container(defender))?;

    let attacker_owner = state
        .war_band(attacker)
        .map(|b| b.owner)
        .ok_or(GameError::WarBandNotFound(attacker.0))?;
    let (defender_owner, location) = state
        .container(defender)
        .map(|c| (c.owner(), c.position()))
        .ok_or_else(|| crate::state::missing_container(defender))?;
    let defender_encamped = match defender {
        ContainerRef::WarBand(id) => state.war_band(id).is_some_and(|b| b.is_encamped()),
        ContainerRef::Settlement(_) => false,
    };

    let a_initial = count_kinds(&a_side.units);
    let d_initial = count_kinds(&d_side.units);
    let (a_eff, d_eff) = (a_side.effective_hp(), d_side.effective_hp());
    let (a_power, d_power) = (a_side.power(), d_side.power());
    let settlement_hp_before = d_side.base_hp;

    let ex = exchange(&a_side, &d_side);
    a_side.absorb(ex.attacker_loss);
    d_side.absorb(ex.defender_loss);

    // Write surviving hit points back and drop the dead from their holdings.
    for (r, side) in [(attacker_ref, &a_side), (defender, &d_side)] {
        let alive: Vec<UnitId> = side.units.iter().map(|u| u.id).collect();
        let before: Vec<UnitId> = state.holding(r).map(|h| h.units.clone()).unwrap_or_default();
        for id in &before {
            if let Some(cu) = side.units.iter().find(|u| u.id == *id) {
                if let Some(unit) = state.unit_mut(*id) {
                    unit.hp = cu.hp;
                }
            } else {
                state.take_unit(*id);
            }
        }
        if let Some(holding) = state.holding_mut(r) {
            holding.units.retain(|id| alive.contains(id));
        }
    }
    if let ContainerRef::Settlement(id) = defender {
        if let Some(s) = state.settlement_mut(id) {
            s.hp = d_side.base_hp;
        }
    }

    let attacker_defeated = a_side.units.is_empty();
    // A camp is not taken by killing its defenders, only by walking into
    // one that was already empty.
    let defender_defeated = match defender {
        ContainerRef::Settlement(_) => d_side.base_hp == 0 || d_side.units.is_empty(),
        ContainerRef::WarBand(_) if defender_encamped => d_initial.is_empty(),
        ContainerRef::WarBand(_) => d_side.units.is_empty(),
    };

    if defender_defeated {
        state.remove_container(defender);
    }
    if attacker_defeated {
        state.remove_war_band(attacker);
    } else {
        let old = state.war_band(attacker).map(|b| b.position);
        if defender_defeated {
            if let Some(old) = old {
                state.vacate(old, attacker_ref);
                if let Some(tile) = state.tile_mut(old) {
                    tile.turns_occupied = 0;
                }
            }
            state.occupy(location, attacker_ref);
            if let Some(tile) = state.tile_mut(location) {
                tile.turns_occupied = 0;
            }
        }
        if let Some(band) = state.war_band_mut(attacker) {
            if defender_defeated {
                band.position = location;
                band.holding.territory = std::iter::once(location.key()).collect();
                band.moved_this_turn = true;
            }
            band.movement = 0;
        }
        state.refresh_band_movement(attacker);
    }
    if let ContainerRef::WarBand(id) = defender {
        state.refresh_band_movement(id);
    }
    state.refresh_capacity(attacker_ref);
    state.refresh_capacity(defender);

    if let Some(player) = state.player_mut(attacker_owner) {
        player.culture.axes.militarism += 1;
        player.culture.axes.clamp();
        player.actions.attacks += 1;
    }
    if state
        .pending_battle()
        .is_some_and(|p| p.attacker == attacker && p.defender == defender)
    {
        state.set_pending_battle(None);
    }
    state.purge_dead();

    let a_survivors = count_kinds(&a_side.units);
    let d_survivors = count_kinds(&d_side.units);
    let report = BattleReport {
        turn: state.turn(),
        location,
        attacker: SideReport {
            holder: attacker_ref,
            owner: attacker_owner,
            losses: losses(&a_initial, &a_survivors),
            initial: a_initial,
            survivors: a_survivors,
            effective_hp: a_eff,
            power: a_power,
            loss_ratio: ex.attacker_ratio,
            hp_removed: ex.attacker_loss,
            won: defender_defeated && !attacker_defeated,
        },
        defender: SideReport {
            holder: defender,
            owner: defender_owner,
            losses: losses(&d_initial, &d_survivors),
            initial: d_initial,
            survivors: d_survivors,
            effective_hp: d_eff,
            power: d_power,
            loss_ratio: ex.defender_ratio,
            hp_removed: ex.defender_loss,
            won: attacker_defeated && !defender_defeated,
        },
        settlement_hp_lost: settlement_hp_before - d_side.base_hp,
    };

    info!(
        attacker = %attacker_ref,
        defender = %defender,
        %location,
        attacker_lost = report.attacker.hp_removed,
        defender_lost = report.defender.hp_removed,
        attacker_won = report.attacker.won,
        defender_won = report.defender.won,
        "battle resolved"
    );
    state.set_last_battle(report.clone());
    Ok(report)
}
