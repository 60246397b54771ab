//! Snapshot and delta builders.
//!
//! Converts the fixed-point world into the float shapes clients render.
//! The projectile list always has `PROJECTILE_BUFFER` slots so the delta
//! keeps a constant shape; unused slots are zeroed.

use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};

use crate::config::LevelParams;
use crate::core::fixed::to_float;
use crate::game::actor::{Actor, ActorId, Team};
use crate::game::projectile::Projectile;
use crate::game::world::World;
use crate::world::block::{Block, Layer};
use crate::world::level::BlockUpdates;
use crate::world::schema::Schema;

/// Projectile slots in every snapshot and delta.
pub const PROJECTILE_BUFFER: usize = 100;

/// One block as clients see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedBlock {
    pub texture: String,
    pub max_health: i32,
    pub health: i32,
    /// Layer the block sits on.
    pub level: Layer,
}

impl From<&Block> for SerializedBlock {
    fn from(block: &Block) -> Self {
        Self {
            texture: block.kind.texture.to_string(),
            max_health: block.kind.max_health,
            health: block.health,
            level: block.layer(),
        }
    }
}

/// One actor as clients see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedActor {
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub is_dead: bool,
    pub health: i32,
    pub max_health: i32,
    pub ammo: i32,
    pub max_ammo: i32,
    /// Sprite block id of the held weapon.
    pub texture: String,
    pub team: Team,
}

impl From<&Actor> for SerializedActor {
    fn from(actor: &Actor) -> Self {
        Self {
            x: to_float(actor.position.x),
            y: to_float(actor.position.y),
            rotation: to_float(actor.rotation),
            is_dead: actor.is_dead,
            health: actor.health,
            max_health: actor.max_health(),
            ammo: actor.weapon.ammo,
            max_ammo: actor.weapon.kind.max_ammo,
            texture: actor.weapon.kind.sprite.to_string(),
            team: actor.team,
        }
    }
}

/// One projectile slot. All zero when unused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SerializedProjectile {
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub length: f32,
}

impl From<&Projectile> for SerializedProjectile {
    fn from(projectile: &Projectile) -> Self {
        Self {
            x: to_float(projectile.position.x),
            y: to_float(projectile.position.y),
            rotation: to_float(projectile.rotation),
            length: to_float(projectile.length),
        }
    }
}

/// Schema rows (`y`), then cells (`x`), then blocks by layer.
pub type SerializedSchema = Vec<Vec<BTreeMap<Layer, SerializedBlock>>>;

/// Full level snapshot (`levelState`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelSnapshot {
    pub schema: SerializedSchema,
    pub map_width: i32,
    pub map_height: i32,
    pub projectiles: Vec<SerializedProjectile>,
    pub level_params: LevelParams,
    pub available_weapons: Vec<String>,
    pub actors: BTreeMap<ActorId, SerializedActor>,
}

/// Per-tick delta (`tickUpdate`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickDelta {
    pub block_updates: BlockUpdates,
    pub projectiles: Vec<SerializedProjectile>,
    pub actors: BTreeMap<ActorId, SerializedActor>,
}

pub fn serialize_schema(schema: &Schema) -> SerializedSchema {
    schema
        .rows()
        .map(|row| {
            row.iter()
                .map(|cell| cell.iter().map(|(&layer, block)| (layer, SerializedBlock::from(block))).collect())
                .collect()
        })
        .collect()
}

/// Fixed-size projectile list: live projectiles first, then zeroed slots.
///
/// Projectiles past the buffer size are not sent.
pub fn projectile_buffer(projectiles: &[Projectile]) -> Vec<SerializedProjectile> {
    let mut buffer: Vec<SerializedProjectile> = projectiles
        .iter()
        .take(PROJECTILE_BUFFER)
        .map(SerializedProjectile::from)
        .collect();
    buffer.resize(PROJECTILE_BUFFER, SerializedProjectile::default());
    buffer
}

pub fn serialize_actors(world: &World) -> BTreeMap<ActorId, SerializedActor> {
    world.actors().iter().map(|(&id, actor)| (id, SerializedActor::from(actor))).collect()
}

/// Build the full snapshot. Pending block updates are left untouched.
pub fn level_state(world: &World, params: &LevelParams) -> LevelSnapshot {
    let level = world.level();
    LevelSnapshot {
        schema: serialize_schema(level.schema()),
        map_width: level.width(),
        map_height: level.height(),
        projectiles: projectile_buffer(world.projectiles()),
        level_params: params.clone(),
        available_weapons: params.available_weapons().iter().map(|w| w.id.to_string()).collect(),
        actors: serialize_actors(world),
    }
}

/// Build the delta and drain the level's pending block updates.
pub fn tick_update(world: &mut World) -> TickDelta {
    TickDelta {
        block_updates: world.level_mut().take_block_updates(),
        projectiles: projectile_buffer(world.projectiles()),
        actors: serialize_actors(world),
    }
}
