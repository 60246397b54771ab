//! World Model
//!
//! The tile grid the match is played on.
//!
//! ## Module Structure
//!
//! - `block`: block groups and the block type catalog
//! - `schema`: map types, layouts and the layered schema
//! - `collision`: collision/hit grids and the position/projectile resolvers
//! - `level`: schema + grids + spawn points + pending block updates

pub mod block;
pub mod schema;
pub mod collision;
pub mod level;

use crate::core::fixed::{to_fixed, Fixed};

/// Side of one grid cell in world units.
pub const UNITS_PER_BLOCK: i32 = 32;

/// Side of one grid cell as a fixed-point value.
pub const BLOCK_UNITS: Fixed = to_fixed(UNITS_PER_BLOCK as f64);

/// Actor hit box edges, relative to the actor's top-left corner.
pub const ACTOR_HITBOX_FROM: Fixed = to_fixed(5.0);
pub const ACTOR_HITBOX_TO: Fixed = to_fixed(27.0);

/// Offset from an actor's corner to its centre.
pub const ACTOR_CENTER_OFFSET: Fixed = to_fixed(16.0);

// Re-export key types
pub use block::{Block, BlockGroup, BlockType, Layer};
pub use schema::{MapError, MapLayout, MapType, Schema};
pub use collision::{CollisionGrid, CollisionMaps, ProjectileHit, resolve_position, resolve_projectile_hit};
pub use level::{BlockUpdates, Level};
