//! Scenario loading and configuration.
//!
//! A scenario is a [`NewGameConfig`] plus how long to play it. Scenarios are
//! stored as RON; rules may be inlined or read from a separate rules file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tribes_core::error::GameError;
use tribes_core::rules::GameRules;
use tribes_core::worldgen::NewGameConfig;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// The rules file or the game setup was rejected by the core.
    #[error("Invalid game setup: {0}")]
    Game(#[from] GameError),
}

/// A complete scenario configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Game setup.
    pub game: NewGameConfig,
    /// Rules file that replaces `game.rules`, relative to the scenario file.
    pub rules_file: Option<PathBuf>,
    /// Rounds to play before stopping.
    pub rounds: u32,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::skirmish()
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let mut scenario = Self::from_ron_str(&contents)?;
        if let Some(rules_file) = scenario.rules_file.take() {
            let rules_path = path
                .parent()
                .map_or_else(|| rules_file.clone(), |dir| dir.join(&rules_file));
            scenario.game.rules = GameRules::load(rules_path)?;
        }
        Ok(scenario)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// Three AI tribes on a medium map.
    #[must_use]
    pub fn skirmish() -> Self {
        Self {
            name: "Skirmish".to_string(),
            description: "Three AI tribes, one of each personality".to_string(),
            game: NewGameConfig {
                width: 24,
                height: 18,
                humans: 0,
                opponents: 3,
                seed: Some("skirmish".to_string()),
                rules: GameRules::default(),
            },
            rules_file: None,
            rounds: 40,
        }
    }

    /// Override the seed.
    #[must_use]
    pub fn with_seed(mut self, seed: impl Into<String>) -> Self {
        self.game.seed = Some(seed.into());
        self
    }

    /// Override the number of rounds.
    #[must_use]
    pub fn with_rounds(mut self, rounds: u32) -> Self {
        self.rounds = rounds;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_scenario_uses_defaults() {
        let s = Scenario::from_ron_str("(name: \"Tiny\", rounds: 3)").expect("parse");
        assert_eq!(s.name, "Tiny");
        assert_eq!(s.rounds, 3);
        assert_eq!(s.game, Scenario::skirmish().game);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Scenario::load("/nonexistent/scenario.ron"),
            Err(ScenarioError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_rules_file_is_resolved_next_to_scenario() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut rules = std::fs::File::create(dir.path().join("harsh.ron")).expect("rules");
        writeln!(rules, "(starvation_damage: 9)").expect("write");
        let scenario_path = dir.path().join("harsh_scenario.ron");
        std::fs::write(&scenario_path, "(name: \"Harsh\", rules_file: Some(\"harsh.ron\"))")
            .expect("write");

        let s = Scenario::load(&scenario_path).expect("load");
        assert_eq!(s.game.rules.starvation_damage, 9);
        assert_eq!(s.rules_file, None);
    }

    #[test]
    fn test_bundled_scenarios_parse() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("scenarios");
        for name in ["skirmish.ron", "duel.ron", "crowded.ron"] {
            let s = Scenario::load(dir.join(name)).expect(name);
            assert!(s.rounds > 0, "{name}");
        }
    }
}
