//! Network Layer
//!
//! WebSocket server, `{action, data}` messages and the match host.
//! This layer is **non-deterministic** (wall-clock timers, connection
//! order); all game logic runs through `game/` and `bot/`.

pub mod protocol;
pub mod sync;
pub mod client;
pub mod session;
pub mod server;

pub use protocol::{
    AddBotRequest, BotStatsReport, ClientMessage, PlayerInfo, RegisterRequest, ScoreInfo,
    ServerMessage, SpawnInfo, decode_controller, encode_controller,
};
pub use sync::{LevelSnapshot, TickDelta, PROJECTILE_BUFFER};
pub use client::{IntentSender, LevelMirror};
pub use session::{ConnectionId, Envelope, MatchSession, RegisterError, SessionError};
pub use server::{GameServer, GameServerError};
