//! Players: treasury, research, culture, and AI personality.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::culture::{Culture, TurnActions};
use crate::math::{ratio, Fixed};
use crate::technology::TechId;

/// Player identifier; also the player's index in the turn order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct PlayerId(pub u8);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// How an AI owner weighs risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AiPersonality {
    /// Attacks at poor odds, favours fighters.
    Aggressive,
    /// Middle of the road.
    #[default]
    Balanced,
    /// Attacks only at overwhelming odds, favours laborers.
    Defensive,
}

impl AiPersonality {
    /// Personalities in the order they are handed out to opponents.
    pub const ALL: [Self; 3] = [Self::Aggressive, Self::Balanced, Self::Defensive];

    /// Minimum own-power to target-power ratio before attacking.
    #[must_use]
    pub fn attack_threshold(self) -> Fixed {
        match self {
            Self::Aggressive => ratio(4, 5),
            Self::Balanced => ratio(6, 5),
            Self::Defensive => ratio(2, 1),
        }
    }

    /// Percent chance of ordering a fighter rather than a laborer.
    #[must_use]
    pub const fn military_bias_pct(self) -> u32 {
        match self {
            Self::Aggressive => 70,
            Self::Balanced => 50,
            Self::Defensive => 30,
        }
    }
}

/// One participant in the game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Identifier.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Human-controlled; AI owners never act for humans.
    pub is_human: bool,
    /// Decision style when AI-controlled.
    pub personality: AiPersonality,
    /// Gold.
    pub gold: u32,
    /// Known technologies.
    pub techs: BTreeSet<TechId>,
    /// Technology being researched.
    pub research: Option<TechId>,
    /// Points invested in the active research.
    pub research_progress: u32,
    /// Research points banked while nothing was being researched, or as
    /// overflow from a completed technology.
    pub free_research: u32,
    /// Culture.
    pub culture: Culture,
    /// This turn's action counters.
    pub actions: TurnActions,
    /// No holdings remain; skipped in the turn order.
    pub eliminated: bool,
}

impl Player {
    /// A new player with an empty treasury and no technologies.
    #[must_use]
    pub fn new(id: PlayerId, name: impl Into<String>, is_human: bool) -> Self {
        Self {
            id,
            name: name.into(),
            is_human,
            personality: AiPersonality::default(),
            gold: 0,
            techs: BTreeSet::new(),
            research: None,
            research_progress: 0,
            free_research: 0,
            culture: Culture::default(),
            actions: TurnActions::default(),
            eliminated: false,
        }
    }

    /// Builder: set the AI personality.
    #[must_use]
    pub fn with_personality(mut self, personality: AiPersonality) -> Self {
        self.personality = personality;
        self
    }

    /// Whether `tech` is known (`None` counts as known).
    #[must_use]
    pub fn knows(&self, tech: Option<TechId>) -> bool {
        tech.map_or(true, |t| self.techs.contains(&t))
    }

    /// Add research points; completes the active technology when the cost
    /// is reached and banks any overflow. Returns the completed technology.
    pub fn add_research(&mut self, points: u32) -> Option<TechId> {
        let Some(tech) = self.research else {
            self.free_research += points;
            return None;
        };
        self.research_progress += points;
        if self.research_progress < tech.cost() {
            return None;
        }
        self.free_research += self.research_progress - tech.cost();
        self.research_progress = 0;
        self.research = None;
        self.techs.insert(tech);
        Some(tech)
    }
}
