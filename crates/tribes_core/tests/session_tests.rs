//! Multi-turn sessions: turn order, pending battles, growth, research, and
//! whole-game determinism.

use std::collections::BTreeSet;

use tribes_core::commands::{BattleChoice, Command};
use tribes_core::container::{Container, ContainerRef};
use tribes_core::hex::HexCoord;
use tribes_core::player::{Player, PlayerId};
use tribes_core::rules::GameRules;
use tribes_core::state::WorldState;
use tribes_core::technology::TechId;
use tribes_core::terrain::Terrain;
use tribes_core::turn::end_turn;
use tribes_core::units::UnitKind;
use tribes_test_utils::determinism::verify_session_determinism;
use tribes_test_utils::fixtures::{ai_game, duel, play};

#[test]
fn test_pending_battle_blocks_end_turn() {
    let (mut world, attacker, defender) = duel(&[UnitKind::Warrior; 3], &[UnitKind::Male]);
    // A second band keeps the defender in the game after losing the first.
    world
        .spawn_war_band(PlayerId(1), HexCoord::from_offset(8, 8), &[UnitKind::Male])
        .expect("reserve band");
    let pending = world.apply(&Command::Attack {
        band: attacker,
        target: ContainerRef::WarBand(defender),
    });
    assert!(pending.pending_battle().is_some());

    let blocked = end_turn(&pending);
    assert_eq!(blocked, pending);
    assert_eq!(blocked.current_player_id(), PlayerId(0));

    let resolved = pending.apply(&Command::ResolveBattle {
        choice: BattleChoice::AutoResolve,
    });
    assert!(resolved.pending_battle().is_none());
    assert!(resolved.last_battle().is_some());
    let next = end_turn(&resolved);
    assert_eq!(next.current_player_id(), PlayerId(1));
}

#[test]
fn test_eliminated_defender_is_skipped_after_battle() {
    let (world, attacker, defender) = duel(&[UnitKind::Warrior; 3], &[UnitKind::Male]);
    let resolved = world
        .apply(&Command::Attack {
            band: attacker,
            target: ContainerRef::WarBand(defender),
        })
        .apply(&Command::ResolveBattle {
            choice: BattleChoice::AutoResolve,
        });
    assert!(resolved.war_band(defender).is_none());
    assert!(resolved.player(PlayerId(1)).is_some_and(|p| p.eliminated));

    let next = end_turn(&resolved);
    assert_eq!(next.current_player_id(), PlayerId(0));
    assert_eq!(next.turn(), resolved.turn() + 1);
}

#[test]
fn test_juvenile_grows_up_over_turns() {
    let rules = GameRules {
        juvenile_maturity_turns: 2,
        birth_chance_pct: 0,
        disease_risk_cap: 0,
        ..GameRules::default()
    };
    let mut world = WorldState::blank(8, 8, Terrain::Plains, 12, rules);
    world.add_player(Player::new(PlayerId(0), "Family", true));
    let band = world
        .spawn_war_band(PlayerId(0), HexCoord::from_offset(3, 3), &[UnitKind::Juvenile])
        .expect("spawn");
    let child = world.war_band(band).expect("band").holding.units[0];

    let once = end_turn(&world);
    assert_eq!(once.unit(child).map(|u| u.kind), Some(UnitKind::Juvenile));
    let twice = end_turn(&once);
    let adult = twice.unit(child).expect("unit");
    assert!(matches!(adult.kind, UnitKind::Male | UnitKind::Female));
    assert_eq!(adult.hp, adult.max_hp);
    assert_eq!(twice.turn(), 3);
}

#[test]
fn test_research_overflow_carries_to_next_tech() {
    let mut world = WorldState::blank(8, 8, Terrain::Plains, 13, GameRules::default());
    world.add_player(Player::new(PlayerId(0), "Seer", true));
    world
        .spawn_war_band(
            PlayerId(0),
            HexCoord::from_offset(3, 3),
            &[UnitKind::Shaman, UnitKind::Hunter],
        )
        .expect("spawn");
    {
        let p = world.player_mut(PlayerId(0)).expect("player");
        p.research = Some(TechId::Pottery);
        p.research_progress = 14;
    }

    let next = end_turn(&world);
    let p = next.player(PlayerId(0)).expect("player");
    assert!(p.techs.contains(&TechId::Pottery));
    assert_eq!(p.research, None);
    assert_eq!(p.free_research, 1);

    let researching = next.apply(&Command::SetResearch {
        tech: TechId::Archery,
    });
    let p = researching.player(PlayerId(0)).expect("player");
    assert_eq!(p.research, Some(TechId::Archery));
    assert_eq!(p.research_progress, 1);
    assert_eq!(p.free_research, 0);
}

#[test]
fn test_whole_sessions_are_deterministic() {
    verify_session_determinism("session", 3, 12).assert_deterministic();
}

#[test]
fn test_long_ai_game_keeps_references_consistent() {
    let game = play(&ai_game("endurance", 3), 45);
    assert!(game.turn() > 1);

    let mut claimed = BTreeSet::new();
    for owner in game.players().iter().map(|p| p.id) {
        for r in game.holdings_of(owner) {
            let container = game.container(r).expect("holding");
            assert_eq!(container.owner(), owner);
            assert_eq!(
                game.tile(container.position()).and_then(|t| t.occupant),
                Some(r)
            );
            for unit in game.units_in(r) {
                assert!(unit.hp > 0);
                assert_eq!(unit.owner, owner);
            }
            // A roaming band only forages its own tile; claims are made by
            // settlements and camps and never overlap.
            if container.is_fixed() {
                for key in &container.holding().territory {
                    assert!(claimed.insert(*key), "tile {key} claimed twice");
                }
            }
        }
    }
    for tile in game.tiles() {
        assert!(tile.terrain.resource_max().covers(&tile.pools));
        if let Some(r) = tile.occupant {
            assert!(game.container(r).is_some());
        }
    }
}
