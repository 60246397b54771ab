//! # Tile Skirmish Server
//!
//! Authoritative tick-based server for a 2D top-down team shooter on a tile
//! grid. Two teams fight on a layered block map; rounds end when one team
//! has no living actors, then the level is rebuilt and a new round starts.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   TILE SKIRMISH SERVER                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── fixed.rs    - Q16.16 fixed-point arithmetic             │
//! │  ├── vec2.rs     - 2D vector with fixed-point                │
//! │  ├── rng.rs      - Deterministic Xorshift128+ PRNG           │
//! │  └── hash.rs     - State hashing for verification            │
//! │                                                              │
//! │  world/          - Tile map (deterministic)                  │
//! │  ├── block.rs    - Block groups and catalog                  │
//! │  ├── schema.rs   - Map types, layouts, layered schema        │
//! │  ├── collision.rs- Collision/hit grids and resolvers         │
//! │  └── level.rs    - Schema + grids + spawns + block updates   │
//! │                                                              │
//! │  game/           - Game logic (deterministic)                │
//! │  ├── actor.rs    - Actors, teams, movement                   │
//! │  ├── weapon.rs   - Weapons, cooldowns, firing                │
//! │  ├── projectile.rs - Sub-stepped projectile flight           │
//! │  ├── world.rs    - Authoritative tick                        │
//! │  ├── tick.rs     - Overlap-dropping scheduler                │
//! │  └── session.rs  - Lobby / play / finish                     │
//! │                                                              │
//! │  bot/            - Server-side players (deterministic)       │
//! │                                                              │
//! │  network/        - Networking (non-deterministic)            │
//! │  ├── server.rs   - WebSocket server + match task             │
//! │  ├── session.rs  - Match host, message handling              │
//! │  ├── protocol.rs - {action, data} messages                   │
//! │  ├── sync.rs     - Snapshots and tick deltas                 │
//! │  └── client.rs   - Client-side intent sender and mirror      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism
//!
//! `core/`, `world/`, `game/` and `bot/` never read the clock and draw all
//! randomness from seeded Xorshift128+ streams. Ordered maps (BTreeMap)
//! keep iteration stable, so a round replays exactly from its seed and
//! the sequence of controller intents.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod world;
pub mod game;
pub mod bot;
pub mod network;
pub mod config;

// Re-export commonly used types
pub use crate::core::fixed::{Fixed, FIXED_ONE, FIXED_HALF, FIXED_SCALE};
pub use crate::core::vec2::FixedVec2;
pub use crate::core::rng::DeterministicRng;
pub use config::{LevelParams, ServerConfig};
pub use game::{ActorId, Controller, Team, World};
pub use network::{GameServer, MatchSession};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Milliseconds between two simulation ticks.
pub const GAME_TICK_MS: u64 = 15;
