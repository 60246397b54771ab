//! Game Logic Module
//!
//! Entity simulation and match flow. Deterministic given a seed and the
//! stream of controller intents.
//!
//! ## Module Structure
//!
//! - `controller`: Actor intents (human or bot)
//! - `actor`: Actor types, teams, per-actor stepping
//! - `weapon`: Weapon catalog, fire and reload cooldowns
//! - `projectile`: Projectile catalog, sub-stepped flight
//! - `events`: Kill, damage and block events
//! - `world`: Level + actors + projectiles, the authoritative tick
//! - `tick`: Reentrancy-guarded tick scheduler
//! - `session`: Lobby / play / finish state machine

pub mod controller;
pub mod actor;
pub mod weapon;
pub mod projectile;
pub mod events;
pub mod world;
pub mod tick;
pub mod session;

// Re-export key types
pub use controller::{Controller, Direction};
pub use actor::{Actor, ActorId, ActorType, Team};
pub use weapon::{Weapon, WeaponType};
pub use projectile::{Projectile, ProjectileType};
pub use events::{GameEvent, GameEventData};
pub use world::{TickResult, World};
pub use tick::{TickOutcome, TickScheduler};
pub use session::{GameSession, SessionPhase, SessionTransition};
