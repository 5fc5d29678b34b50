//! Drives a game to completion without a human at the keyboard.
//!
//! AI owners play through [`run_ai_turn`]; human seats simply end their
//! turn. Battles that would wait for a human decision are auto-resolved so
//! the game never blocks.

use tracing::{debug, info, warn};
use tribes_core::ai::run_ai_turn;
use tribes_core::combat::BattleReport;
use tribes_core::commands::{BattleChoice, Command};
use tribes_core::player::PlayerId;
use tribes_core::state::WorldState;
use tribes_core::turn::end_turn;
use tribes_core::worldgen::new_game;

use crate::protocol::{Output, PlayerSummary, StopReason};
use crate::scenario::{Scenario, ScenarioError};

/// Consecutive owner turns without any change before a run is abandoned.
pub const STALL_LIMIT: u32 = 16;

/// Final result of a run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Final snapshot.
    pub state: WorldState,
    /// Why the run stopped.
    pub reason: StopReason,
    /// Surviving player when the game was won outright.
    pub winner: Option<PlayerId>,
    /// Battles resolved during the run.
    pub battles: u32,
}

/// Headless game loop over a single session.
pub struct GameRunner {
    state: WorldState,
    max_rounds: u32,
    battles: u32,
    stalled: u32,
}

impl GameRunner {
    /// Set up a new game from a scenario.
    pub fn from_scenario(scenario: &Scenario) -> Result<Self, ScenarioError> {
        let state = new_game(&scenario.game)?;
        Ok(Self::new(state, scenario.rounds))
    }

    /// Wrap an existing snapshot; the run ends once round `max_rounds` is
    /// complete.
    #[must_use]
    pub const fn new(state: WorldState, max_rounds: u32) -> Self {
        Self {
            state,
            max_rounds,
            battles: 0,
            stalled: 0,
        }
    }

    /// Current snapshot.
    #[must_use]
    pub const fn state(&self) -> &WorldState {
        &self.state
    }

    /// Players that still hold something.
    #[must_use]
    pub fn survivors(&self) -> Vec<PlayerId> {
        self.state
            .players()
            .iter()
            .filter(|p| !p.eliminated)
            .map(|p| p.id)
            .collect()
    }

    /// Why the run should stop now, if it should.
    #[must_use]
    pub fn stop_reason(&self) -> Option<StopReason> {
        if self.survivors().len() <= 1 {
            Some(StopReason::Conquest)
        } else if self.state.turn() > self.max_rounds {
            Some(StopReason::RoundLimit)
        } else if self.stalled >= STALL_LIMIT {
            Some(StopReason::Stalled)
        } else {
            None
        }
    }

    /// Play one owner turn, reporting battles and finished rounds to `emit`.
    pub fn step(&mut self, emit: &mut impl FnMut(Output)) {
        let before = self.state.clone();
        let round = before.turn();

        let mut next = if before.pending_battle().is_some() {
            debug!("auto-resolving pending battle");
            before.apply(&Command::ResolveBattle {
                choice: BattleChoice::AutoResolve,
            })
        } else {
            before.clone()
        };
        self.report_battle(before.last_battle(), &next, round, emit);

        let resolved = next.clone();
        next = match next.current_player().map(|p| p.is_human) {
            Some(true) => end_turn(&next),
            Some(false) => run_ai_turn(&next),
            None => next,
        };
        self.report_battle(resolved.last_battle(), &next, round, emit);

        if next == before {
            self.stalled += 1;
            warn!(stalled = self.stalled, "owner turn made no progress");
        } else {
            self.stalled = 0;
        }
        if next.turn() > round {
            info!(round, "round complete");
            emit(Output::Round {
                round,
                players: PlayerSummary::all(&next),
            });
        }
        self.state = next;
    }

    fn report_battle(
        &mut self,
        previous: Option<&BattleReport>,
        next: &WorldState,
        round: u32,
        emit: &mut impl FnMut(Output),
    ) {
        if let Some(report) = next.last_battle() {
            if previous != Some(report) {
                self.battles += 1;
                emit(Output::Battle {
                    round,
                    report: report.clone(),
                });
            }
        }
    }

    /// Play until the game is won, the round limit passes, or play stalls.
    pub fn run(mut self, emit: &mut impl FnMut(Output)) -> RunOutcome {
        let reason = loop {
            if let Some(reason) = self.stop_reason() {
                break reason;
            }
            self.step(emit);
        };
        let winner = match (reason, self.survivors().as_slice()) {
            (StopReason::Conquest, [only]) => Some(*only),
            _ => None,
        };
        info!(?reason, ?winner, battles = self.battles, "run finished");
        RunOutcome {
            state: self.state,
            reason,
            winner,
            battles: self.battles,
        }
    }
}

/// Play a scenario start to finish, streaming every message to `emit`.
pub fn run_scenario(
    scenario: &Scenario,
    emit: &mut impl FnMut(Output),
) -> Result<RunOutcome, ScenarioError> {
    let runner = GameRunner::from_scenario(scenario)?;
    let state = runner.state();
    emit(Output::Started {
        scenario: scenario.name.clone(),
        seed: scenario.game.seed.clone().unwrap_or_default(),
        width: state.width(),
        height: state.height(),
        players: PlayerSummary::all(state),
    });

    let outcome = runner.run(emit);
    let round = outcome.state.turn().min(scenario.rounds.max(1));
    emit(Output::GameOver {
        round,
        reason: outcome.reason,
        winner: outcome
            .winner
            .and_then(|id| PlayerSummary::of(&outcome.state, id)),
        state_hash: outcome.state.state_hash(),
    });
    Ok(outcome)
}

/// Play the same scenario `runs` times and compare the final state hashes.
pub fn verify_scenario(scenario: &Scenario, runs: u32) -> Result<Output, ScenarioError> {
    let mut hashes = Vec::new();
    for run in 0..runs {
        let outcome = GameRunner::from_scenario(scenario)?.run(&mut |_| {});
        let hash = outcome.state.state_hash();
        debug!(run, hash, "verification run finished");
        hashes.push(hash);
    }
    let deterministic = hashes.windows(2).all(|w| w[0] == w[1]);
    if !deterministic {
        warn!(?hashes, "runs diverged");
    }
    Ok(Output::Verify {
        seed: scenario.game.seed.clone().unwrap_or_default(),
        runs,
        rounds: scenario.rounds,
        deterministic,
        hashes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tribes_core::container::ContainerRef;
    use tribes_core::units::UnitKind;
    use tribes_test_utils::fixtures::{ai_game, duel};

    fn tiny(seed: &str, rounds: u32) -> Scenario {
        let mut s = Scenario::skirmish().with_seed(seed).with_rounds(rounds);
        s.game.width = 16;
        s.game.height = 12;
        s.game.opponents = 2;
        s
    }

    #[test]
    fn test_run_stops_at_round_limit_and_reports_each_round() {
        let mut out = Vec::new();
        let outcome = run_scenario(&tiny("limit", 3), &mut |o| out.push(o)).expect("run");

        assert!(matches!(out.first(), Some(Output::Started { .. })));
        assert!(matches!(out.last(), Some(Output::GameOver { .. })));
        let rounds: Vec<u32> = out
            .iter()
            .filter_map(|o| match o {
                Output::Round { round, .. } => Some(*round),
                _ => None,
            })
            .collect();
        if outcome.reason == StopReason::RoundLimit {
            assert_eq!(rounds, vec![1, 2, 3]);
            assert_eq!(outcome.state.turn(), 4);
        }
    }

    #[test]
    fn test_pending_battle_is_auto_resolved() {
        let (world, attacker, defender) = duel(&[UnitKind::Warrior; 3], &[UnitKind::Male]);
        let pending = world.apply(&Command::Attack {
            band: attacker,
            target: ContainerRef::WarBand(defender),
        });
        assert!(pending.pending_battle().is_some());

        let mut runner = GameRunner::new(pending, 5);
        let mut battles = 0;
        runner.step(&mut |o| {
            if matches!(o, Output::Battle { .. }) {
                battles += 1;
            }
        });
        assert_eq!(battles, 1);
        assert!(runner.state().pending_battle().is_none());
    }

    #[test]
    fn test_single_survivor_is_conquest() {
        let (mut lone, _, _) = duel(&[UnitKind::Warrior], &[UnitKind::Male]);
        lone.player_mut(PlayerId(1)).expect("player").eliminated = true;

        let outcome = GameRunner::new(lone, 10).run(&mut |_| {});
        assert_eq!(outcome.reason, StopReason::Conquest);
        assert_eq!(outcome.winner, Some(PlayerId(0)));
    }

    #[test]
    fn test_runner_plays_generated_game() {
        let state = ai_game("runner", 2);
        let outcome = GameRunner::new(state, 2).run(&mut |_| {});
        assert!(outcome.state.turn() >= 2);
    }

    #[test]
    fn test_verify_same_seed_is_deterministic() {
        match verify_scenario(&tiny("verify", 4), 3).expect("verify") {
            Output::Verify {
                deterministic,
                hashes,
                ..
            } => {
                assert!(deterministic);
                assert_eq!(hashes.len(), 3);
            }
            other => panic!("unexpected output {other:?}"),
        }
    }
}
