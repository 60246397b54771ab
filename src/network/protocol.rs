//! Protocol Messages
//!
//! Every message is `{"action": ..., "data": ...}` JSON. The only binary
//! frame is a bincode-encoded `Controller`, the hot path from clients.

use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};

use crate::bot::manager::{BotInfo, BotStats, ManagerPerformance};
use crate::bot::profile::{Difficulty, Personality};
use crate::game::actor::{ActorId, Team};
use crate::game::controller::Controller;
use crate::game::session::SessionPhase;

use super::sync::{LevelSnapshot, TickDelta};

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Ask for the full level snapshot.
    GetLevelState,

    /// Join the match.
    RegisterPlayer(RegisterRequest),

    /// Replace the sender's intents.
    UpdateActorController(Controller),

    AddBot(AddBotRequest),

    RemoveBot { id: ActorId },

    GetBotStats,

    ToggleBots { enabled: bool },
}

/// Registration request.
///
/// The team is kept as text so an invalid value can be reported rather
/// than dropped during decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub weapon: String,
    pub team: String,
}

/// Bot creation request. Omitted fields are picked by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddBotRequest {
    pub team: Team,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub personality: Option<Personality>,
    #[serde(default)]
    pub weapon: Option<String>,
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Full snapshot, sent on request and after a restart.
    LevelState(Box<LevelSnapshot>),

    RegisterSuccess { id: ActorId },

    PlayerConnected(PlayerInfo),

    PlayerDisconnected { id: ActorId },

    SpawnActor(SpawnInfo),

    /// Per-tick delta.
    TickUpdate(TickDelta),

    GameSessionState(SessionPhase),

    SessionScore(ScoreInfo),

    BotStats(BotStatsReport),

    BotsToggled { enabled: bool },

    /// A bot request was refused.
    BotError { message: String },
}

/// A player or bot joined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    pub id: ActorId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_bot: Option<bool>,
}

/// An actor entered the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnInfo {
    pub id: ActorId,
    pub team: Team,
    pub x: f32,
    pub y: f32,
    pub weapon_key: String,
    pub actor_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_bot: Option<bool>,
}

/// End-of-round result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreInfo {
    pub win_team: Team,
    pub scores: BTreeMap<ActorId, u32>,
}

/// Reply to `getBotStats`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotStatsReport {
    pub stats: BotStats,
    pub performance: ManagerPerformance,
    pub bots: Vec<BotInfo>,
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Action name, for logs.
    pub fn action(&self) -> &'static str {
        match self {
            Self::LevelState(_) => "levelState",
            Self::RegisterSuccess { .. } => "registerSuccess",
            Self::PlayerConnected(_) => "playerConnected",
            Self::PlayerDisconnected { .. } => "playerDisconnected",
            Self::SpawnActor(_) => "spawnActor",
            Self::TickUpdate(_) => "tickUpdate",
            Self::GameSessionState(_) => "gameSessionState",
            Self::SessionScore(_) => "sessionScore",
            Self::BotStats(_) => "botStats",
            Self::BotsToggled { .. } => "botsToggled",
            Self::BotError { .. } => "botError",
        }
    }
}

// Tagged enums do not survive bincode, so binary frames carry the flat
// controller struct only.

/// Encode a controller as a binary frame.
pub fn encode_controller(controller: &Controller) -> Result<Vec<u8>, bincode::Error> {
    bincode::serialize(controller)
}

/// Decode a binary controller frame.
pub fn decode_controller(data: &[u8]) -> Result<Controller, bincode::Error> {
    bincode::deserialize(data)
}
