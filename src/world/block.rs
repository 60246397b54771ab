//! Blocks, block groups and the block type catalog.
//!
//! A block type is immutable catalog data; a `Block` is one placed instance
//! with its own health. The group decides how a block interacts with
//! movement and projectiles and which layer of a cell it occupies.

use serde::{Serialize, Deserialize};

/// Stacked occupancy level inside one grid cell.
pub type Layer = u8;

/// Layer the default floor of a map lives on.
pub const FLOOR_LAYER: Layer = 1;

/// Behaviour shared by every block type of a group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockGroup {
    /// Team start markers.
    Marker,
    /// Water floors.
    Water,
    /// Walkable floors.
    Floor,
    /// Walls.
    Wall,
    /// Roofs drawn above actors.
    Roof,
    /// Actor sprites.
    Actor,
    /// Doors.
    Door,
    /// Barrels, boxes and other props.
    Asset,
    /// Ground decoration.
    Decor,
}

impl BlockGroup {
    /// Can an actor stand on this block.
    pub const fn is_walkable(self) -> bool {
        matches!(self, Self::Marker | Self::Floor | Self::Roof | Self::Decor)
    }

    /// Does this block stop movement even when the floor is walkable.
    pub const fn is_collide(self) -> bool {
        matches!(self, Self::Wall | Self::Actor | Self::Asset)
    }

    /// Do projectiles hit and damage this block.
    pub const fn is_destructible(self) -> bool {
        matches!(self, Self::Wall | Self::Actor | Self::Door | Self::Asset)
    }

    /// Layer this group occupies.
    pub const fn layer(self) -> Layer {
        match self {
            Self::Water | Self::Floor => 1,
            Self::Marker | Self::Decor => 2,
            Self::Actor => 3,
            Self::Wall | Self::Door | Self::Asset => 4,
            Self::Roof => 5,
        }
    }

    /// A cell holding this block blocks movement.
    #[inline]
    pub const fn is_blocking(self) -> bool {
        !self.is_walkable() || self.is_collide()
    }
}

/// Static block definition.
#[derive(Debug, PartialEq, Eq)]
pub struct BlockType {
    /// Catalog key, also used in saved layouts.
    pub id: &'static str,
    /// Behaviour group.
    pub group: BlockGroup,
    /// Starting health (0 for indestructible decoration).
    pub max_health: i32,
    /// Texture name for renderers.
    pub texture: &'static str,
}

impl BlockType {
    const fn new(id: &'static str, group: BlockGroup, max_health: i32, texture: &'static str) -> Self {
        Self { id, group, max_health, texture }
    }

    /// Layer this block occupies.
    #[inline]
    pub fn layer(&self) -> Layer {
        self.group.layer()
    }
}

/// Red team start marker.
pub const MARKER_TEAM_START_RED: &str = "marker_team_start_red";
/// Blue team start marker.
pub const MARKER_TEAM_START_BLUE: &str = "marker_team_start_blue";

/// Every block type known to the server.
pub static BLOCK_TYPES: &[BlockType] = &[
    // Markers
    BlockType::new(MARKER_TEAM_START_RED, BlockGroup::Marker, 0, "team_start_red"),
    BlockType::new(MARKER_TEAM_START_BLUE, BlockGroup::Marker, 0, "team_start_blue"),
    // Floors
    BlockType::new("floor_water", BlockGroup::Water, 0, "water"),
    BlockType::new("floor_water_2", BlockGroup::Water, 0, "water_2"),
    BlockType::new("floor_dirt", BlockGroup::Floor, 0, "dirt"),
    BlockType::new("floor_sand", BlockGroup::Floor, 0, "sand"),
    BlockType::new("floor_grass", BlockGroup::Floor, 0, "grass"),
    BlockType::new("floor_stone", BlockGroup::Floor, 0, "stone"),
    BlockType::new("floor_wood", BlockGroup::Floor, 0, "wood"),
    BlockType::new("floor_wood_2", BlockGroup::Floor, 0, "wood_2"),
    BlockType::new("floor_wood_3", BlockGroup::Floor, 0, "wood_3"),
    // Walls
    BlockType::new("wall_wood", BlockGroup::Wall, 100, "wall_wood"),
    BlockType::new("wall_wood_2", BlockGroup::Wall, 150, "wall_wood_2"),
    BlockType::new("wall_stone", BlockGroup::Wall, 500, "wall_stone"),
    BlockType::new("wall_brick", BlockGroup::Wall, 500, "wall_brick"),
    BlockType::new("wall_glass", BlockGroup::Wall, 10, "wall_glass"),
    // Roof
    BlockType::new("roof_metal", BlockGroup::Roof, 0, "roof_metal"),
    // Actor sprites
    BlockType::new("actor_solider_pistol", BlockGroup::Actor, 1, "actor_solider_pistol"),
    BlockType::new("actor_solider_rifle", BlockGroup::Actor, 1, "actor_solider_rifle"),
    BlockType::new("actor_solider_sniper", BlockGroup::Actor, 1, "actor_solider_sniper"),
    // Doors
    BlockType::new("door_wood", BlockGroup::Door, 20, "door_wood"),
    // Assets
    BlockType::new("asset_barrel", BlockGroup::Asset, 50, "barrel"),
    BlockType::new("asset_logs", BlockGroup::Asset, 75, "logs"),
    BlockType::new("asset_bin_closed", BlockGroup::Asset, 15, "bin_closed"),
    BlockType::new("asset_bin_opened", BlockGroup::Asset, 15, "bin_opened"),
    BlockType::new("asset_box_wood", BlockGroup::Asset, 50, "box_wood"),
    BlockType::new("asset_box_wood_2", BlockGroup::Asset, 75, "box_wood_2"),
    BlockType::new("asset_stone_1", BlockGroup::Asset, 100, "asset_stone_1"),
    // Decoration
    BlockType::new("decor_grave", BlockGroup::Decor, 0, "grave_1"),
    BlockType::new("decor_carpet_1", BlockGroup::Decor, 0, "carpet_1"),
    BlockType::new("decor_grass_1", BlockGroup::Decor, 0, "grass_1"),
    BlockType::new("decor_grass_2", BlockGroup::Decor, 0, "grass_2"),
    BlockType::new("decor_grass_3", BlockGroup::Decor, 0, "grass_3"),
    BlockType::new("decor_grass_4", BlockGroup::Decor, 0, "grass_4"),
    BlockType::new("decor_grass_5", BlockGroup::Decor, 0, "grass_5"),
    BlockType::new("decor_grass_6", BlockGroup::Decor, 0, "grass_6"),
    BlockType::new("decor_stone_1", BlockGroup::Decor, 0, "stone_1"),
    BlockType::new("decor_stone_2", BlockGroup::Decor, 0, "stone_2"),
    BlockType::new("decor_log_1", BlockGroup::Decor, 0, "log_1"),
];

/// Look up a block type by id.
pub fn block_type(id: &str) -> Option<&'static BlockType> {
    BLOCK_TYPES.iter().find(|t| t.id == id)
}

/// A placed block with mutable health.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Catalog entry.
    pub kind: &'static BlockType,
    /// Remaining health.
    pub health: i32,
}

impl Block {
    /// New block at full health.
    pub fn new(kind: &'static BlockType) -> Self {
        Self { kind, health: kind.max_health }
    }

    /// Layer this block occupies.
    #[inline]
    pub fn layer(&self) -> Layer {
        self.kind.layer()
    }

    /// Behaviour group.
    #[inline]
    pub fn group(&self) -> BlockGroup {
        self.kind.group
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_table() {
        // (walkable, collide, destructible, layer)
        let table = [
            (BlockGroup::Marker, true, false, false, 2),
            (BlockGroup::Water, false, false, false, 1),
            (BlockGroup::Floor, true, false, false, 1),
            (BlockGroup::Wall, false, true, true, 4),
            (BlockGroup::Roof, true, false, false, 5),
            (BlockGroup::Actor, false, true, true, 3),
            (BlockGroup::Door, false, false, true, 4),
            (BlockGroup::Asset, false, true, true, 4),
            (BlockGroup::Decor, true, false, false, 2),
        ];
        for (group, walkable, collide, destructible, layer) in table {
            assert_eq!(group.is_walkable(), walkable, "{:?}", group);
            assert_eq!(group.is_collide(), collide, "{:?}", group);
            assert_eq!(group.is_destructible(), destructible, "{:?}", group);
            assert_eq!(group.layer(), layer, "{:?}", group);
        }
    }

    #[test]
    fn test_blocking_groups() {
        assert!(BlockGroup::Water.is_blocking());
        assert!(BlockGroup::Door.is_blocking());
        assert!(BlockGroup::Wall.is_blocking());
        assert!(!BlockGroup::Floor.is_blocking());
        assert!(!BlockGroup::Roof.is_blocking());
    }

    #[test]
    fn test_catalog_lookup() {
        let wall = block_type("wall_stone").unwrap();
        assert_eq!(wall.max_health, 500);
        assert_eq!(wall.layer(), 4);
        assert_eq!(block_type("wall_glass").unwrap().max_health, 10);
        assert_eq!(block_type("door_wood").unwrap().max_health, 20);
        assert!(block_type("no_such_block").is_none());
    }

    #[test]
    fn test_catalog_ids_unique() {
        for (i, a) in BLOCK_TYPES.iter().enumerate() {
            for b in &BLOCK_TYPES[i + 1..] {
                assert_ne!(a.id, b.id);
            }
        }
    }

    #[test]
    fn test_new_block_full_health() {
        let block = Block::new(block_type("asset_barrel").unwrap());
        assert_eq!(block.health, 50);
        assert_eq!(block.group(), BlockGroup::Asset);
    }
}
