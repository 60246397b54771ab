//! Bot personalities and difficulty presets.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Deserialize};

use crate::core::fixed::{to_fixed, Fixed};
use crate::game::actor::{ActorType, SNIPER, SOLIDER};

/// How likely a bot is to coordinate targets with nearby teammates.
pub const TEAMWORK: Fixed = to_fixed(0.8);

// =============================================================================
// PERSONALITY
// =============================================================================

/// Tactical movement policy of a bot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Personality {
    /// Closes distance, strafes up close.
    Aggressive,
    /// Backs off toward cover.
    Defensive,
    /// Keeps a middle range, strafes occasionally.
    Tactical,
    /// Holds a long range band.
    Sniper,
}

impl Personality {
    pub const ALL: [Personality; 4] = [
        Personality::Aggressive,
        Personality::Defensive,
        Personality::Tactical,
        Personality::Sniper,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Aggressive => "aggressive",
            Self::Defensive => "defensive",
            Self::Tactical => "tactical",
            Self::Sniper => "sniper",
        }
    }

    /// Preferred weapons, best first.
    pub fn weapon_preferences(self) -> &'static [&'static str] {
        match self {
            Self::Aggressive => &["uzi", "shotgun", "mp5"],
            Self::Defensive | Self::Tactical => &["m4", "ak47", "mp5"],
            Self::Sniper => &["sniper", "m4"],
        }
    }

    pub fn actor_type(self) -> &'static ActorType {
        match self {
            Self::Sniper => &SNIPER,
            _ => &SOLIDER,
        }
    }

    fn name_templates(self) -> &'static [&'static str; 5] {
        match self {
            Self::Aggressive => &["Rambo", "Striker", "Blitz", "Fury", "Berserker"],
            Self::Defensive => &["Guardian", "Shield", "Fortress", "Bastion", "Sentinel"],
            Self::Tactical => &["Alpha", "Bravo", "Charlie", "Delta", "Echo"],
            Self::Sniper => &["Eagle", "Hawk", "Phantom", "Ghost", "Shadow"],
        }
    }

    /// Display name for the `index`-th bot (1-based).
    ///
    /// Names cycle through the template list; past the end of the list a
    /// numeric suffix keeps them apart.
    pub fn bot_name(self, index: usize) -> String {
        let names = self.name_templates();
        let base = names[index % names.len()];
        if index > names.len() {
            format!("{}{}", base, index - names.len() + 1)
        } else {
            base.to_string()
        }
    }
}

impl fmt::Display for Personality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Personality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown personality: {}", s))
    }
}

// =============================================================================
// DIFFICULTY
// =============================================================================

/// Tuning of one difficulty level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DifficultyPreset {
    /// Delay between engaging a target and the first shot.
    pub reaction_ms: u64,
    pub accuracy: Fixed,
    pub aggression: Fixed,
    /// Minimum game time between two AI updates outside `engage`.
    pub update_interval_ms: u64,
}

/// Named difficulty level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Novice,
    #[default]
    Intermediate,
    Expert,
    Elite,
}

impl Difficulty {
    pub const ALL: [Difficulty; 4] = [
        Difficulty::Novice,
        Difficulty::Intermediate,
        Difficulty::Expert,
        Difficulty::Elite,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Novice => "novice",
            Self::Intermediate => "intermediate",
            Self::Expert => "expert",
            Self::Elite => "elite",
        }
    }

    pub const fn preset(self) -> DifficultyPreset {
        match self {
            Self::Novice => DifficultyPreset {
                reaction_ms: 800,
                accuracy: to_fixed(0.3),
                aggression: to_fixed(0.3),
                update_interval_ms: 150,
            },
            Self::Intermediate => DifficultyPreset {
                reaction_ms: 500,
                accuracy: to_fixed(0.6),
                aggression: to_fixed(0.5),
                update_interval_ms: 120,
            },
            Self::Expert => DifficultyPreset {
                reaction_ms: 300,
                accuracy: to_fixed(0.8),
                aggression: to_fixed(0.7),
                update_interval_ms: 100,
            },
            Self::Elite => DifficultyPreset {
                reaction_ms: 150,
                accuracy: to_fixed(0.95),
                aggression: to_fixed(0.8),
                update_interval_ms: 80,
            },
        }
    }

    /// One level up, if any.
    pub fn harder(self) -> Option<Self> {
        match self {
            Self::Novice => Some(Self::Intermediate),
            Self::Intermediate => Some(Self::Expert),
            Self::Expert => Some(Self::Elite),
            Self::Elite => None,
        }
    }

    /// Label for a raw accuracy value.
    pub fn from_accuracy(accuracy: Fixed) -> Self {
        if accuracy >= to_fixed(0.9) {
            Self::Elite
        } else if accuracy >= to_fixed(0.75) {
            Self::Expert
        } else if accuracy >= to_fixed(0.5) {
            Self::Intermediate
        } else {
            Self::Novice
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| format!("unknown difficulty: {}", s))
    }
}
