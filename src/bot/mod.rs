//! Bot AI
//!
//! Server-side players. Each bot runs a small state machine over the
//! world's actors and writes intents through the same controller a human
//! client would send.
//!
//! - `profile`: Personalities and difficulty presets
//! - `controller`: Per-bot idle / patrol / engage / search state machine
//! - `manager`: Bot roster, spawning, throttled updates, statistics

pub mod profile;
pub mod controller;
pub mod manager;

pub use profile::{Difficulty, DifficultyPreset, Personality};
pub use controller::{BotController, BotPerformance, BotState};
pub use manager::{Bot, BotError, BotInfo, BotManager, BotStats, ManagerPerformance};
