//! Playable level: schema, derived grids, spawn points and block updates.
//!
//! Block edits go through `hit_block`, which records the new health in the
//! pending `BlockUpdates` and refreshes the collision grids once per batch of
//! removals. The network layer drains the updates once per tick.

use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::core::fixed::from_int;
use crate::core::rng::DeterministicRng;
use crate::core::vec2::FixedVec2;
use crate::game::actor::Team;

use super::block::{Layer, MARKER_TEAM_START_BLUE, MARKER_TEAM_START_RED};
use super::collision::{block_to_unit, CollisionMaps};
use super::schema::{MapError, MapLayout, MarkerPoint, Schema};
use super::UNITS_PER_BLOCK;

// =============================================================================
// BLOCK UPDATES
// =============================================================================

/// Block health changes since the last drain, keyed `y -> x -> layer`.
///
/// A value of `0` means the block was removed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockUpdates(BTreeMap<i32, BTreeMap<i32, BTreeMap<Layer, i32>>>);

impl BlockUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest health of a block.
    pub fn record(&mut self, x: i32, y: i32, layer: Layer, health: i32) {
        self.0.entry(y).or_default().entry(x).or_default().insert(layer, health.max(0));
    }

    pub fn get(&self, x: i32, y: i32, layer: Layer) -> Option<i32> {
        self.0.get(&y)?.get(&x)?.get(&layer).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate `(x, y, layer, health)`.
    pub fn iter(&self) -> impl Iterator<Item = (i32, i32, Layer, i32)> + '_ {
        self.0.iter().flat_map(|(&y, row)| {
            row.iter().flat_map(move |(&x, layers)| {
                layers.iter().map(move |(&layer, &health)| (x, y, layer, health))
            })
        })
    }
}

// =============================================================================
// LEVEL
// =============================================================================

/// Result of a projectile hitting a cell.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockHit {
    /// Layers whose blocks took damage and survived.
    pub damaged: Vec<Layer>,
    /// Layers whose blocks were destroyed.
    pub destroyed: Vec<Layer>,
}

/// Schema plus everything derived from it.
#[derive(Clone, Debug)]
pub struct Level {
    layout: MapLayout,
    schema: Schema,
    collisions: CollisionMaps,
    bounds: FixedVec2,
    red_starts: Vec<MarkerPoint>,
    blue_starts: Vec<MarkerPoint>,
    block_updates: BlockUpdates,
}

impl Level {
    /// Build a level from a layout.
    pub fn new(layout: MapLayout) -> Result<Self, MapError> {
        let schema = Schema::build(&layout)?;
        let collisions = CollisionMaps::compute(&schema);
        let bounds = FixedVec2::new(
            from_int(schema.width() as i32 * UNITS_PER_BLOCK - UNITS_PER_BLOCK),
            from_int(schema.height() as i32 * UNITS_PER_BLOCK - UNITS_PER_BLOCK),
        );
        let red_starts = schema.find_blocks(MARKER_TEAM_START_RED);
        let blue_starts = schema.find_blocks(MARKER_TEAM_START_BLUE);

        Ok(Self {
            layout,
            schema,
            collisions,
            bounds,
            red_starts,
            blue_starts,
            block_updates: BlockUpdates::new(),
        })
    }

    /// Rebuild schema and grids from the layout it was built from.
    pub fn reset(&mut self) -> Result<(), MapError> {
        *self = Self::new(self.layout.clone())?;
        Ok(())
    }

    #[inline]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    #[inline]
    pub fn collisions(&self) -> &CollisionMaps {
        &self.collisions
    }

    #[inline]
    pub fn layout(&self) -> &MapLayout {
        &self.layout
    }

    /// Largest valid actor position.
    #[inline]
    pub fn bounds(&self) -> FixedVec2 {
        self.bounds
    }

    /// Width in blocks.
    pub fn width(&self) -> i32 {
        self.schema.width() as i32
    }

    /// Height in blocks.
    pub fn height(&self) -> i32 {
        self.schema.height() as i32
    }

    /// Start markers of a team.
    pub fn start_points(&self, team: Team) -> &[MarkerPoint] {
        match team {
            Team::Red => &self.red_starts,
            Team::Blue => &self.blue_starts,
        }
    }

    /// Pick a random start marker of a team, as a unit position.
    pub fn spawn_point(&self, team: Team, rng: &mut DeterministicRng) -> Option<FixedVec2> {
        rng.choose(self.start_points(team))
            .map(|&(x, y)| FixedVec2::new(block_to_unit(x), block_to_unit(y)))
    }

    /// Damage every destructible block of a cell.
    ///
    /// Destroyed blocks are removed from the schema and the grids are
    /// recomputed once after the whole cell is processed.
    pub fn hit_block(&mut self, x: i32, y: i32, damage: i32) -> BlockHit {
        let mut hit = BlockHit::default();
        let Some(cell) = self.schema.cell_mut(x, y) else {
            return hit;
        };

        for (&layer, block) in cell.iter_mut() {
            if !block.group().is_destructible() {
                continue;
            }
            block.health -= damage;
            if block.health <= 0 {
                hit.destroyed.push(layer);
            } else {
                hit.damaged.push(layer);
            }
            self.block_updates.record(x, y, layer, block.health);
        }

        for &layer in &hit.destroyed {
            if let Some(block) = cell.remove(&layer) {
                debug!(x, y, layer, block = block.kind.id, "block destroyed");
            }
        }

        if !hit.destroyed.is_empty() {
            self.refresh_collisions();
        }

        hit
    }

    /// Recompute the collision and hit grids from the schema.
    pub fn refresh_collisions(&mut self) {
        self.collisions = CollisionMaps::compute(&self.schema);
    }

    /// Block updates recorded since the last call.
    pub fn take_block_updates(&mut self) -> BlockUpdates {
        std::mem::take(&mut self.block_updates)
    }

    /// Pending updates without draining them.
    pub fn block_updates(&self) -> &BlockUpdates {
        &self.block_updates
    }
}

// =============================================================================
// TESTS
// =============================================================================
