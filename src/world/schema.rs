//! Map types, map layouts and the layered block schema.
//!
//! A `MapLayout` is what an editor saves: a map type plus a list of placed
//! blocks. `Schema::build` turns it into the full grid, filling every cell's
//! default layer with the map type's default floor.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Serialize, Deserialize};
use thiserror::Error;

use super::block::{block_type, Block, BlockType, Layer, MARKER_TEAM_START_BLUE, MARKER_TEAM_START_RED};

// =============================================================================
// ERRORS
// =============================================================================

/// Map construction errors. All of them abort level initialization.
#[derive(Debug, Error)]
pub enum MapError {
    #[error("wrong map size {width}x{height}")]
    WrongMapSize { width: i32, height: i32 },

    #[error("unknown map type '{0}'")]
    UnknownMapType(String),

    #[error("unknown block type '{0}'")]
    UnknownBlockType(String),

    #[error("block '{id}' at ({x}, {y}) lies outside the {width}x{height} map")]
    OutOfBounds { id: String, x: i32, y: i32, width: i32, height: i32 },

    #[error("failed to read map layout: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid map layout: {0}")]
    Parse(#[from] serde_json::Error),
}

// =============================================================================
// MAP TYPES
// =============================================================================

/// Built-in map types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapType {
    /// 56x24 dirt field.
    Dirt,
    /// 28x24 swamp, water by default.
    Swamp,
}

impl MapType {
    /// Parse a map type key.
    pub fn from_key(key: &str) -> Result<Self, MapError> {
        match key.trim().to_ascii_lowercase().as_str() {
            "dirt" | "default" => Ok(Self::Dirt),
            "swamp" => Ok(Self::Swamp),
            other => Err(MapError::UnknownMapType(other.to_string())),
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Dirt => "Dirt",
            Self::Swamp => "Swamp",
        }
    }

    pub fn width(self) -> i32 {
        match self {
            Self::Dirt => 56,
            Self::Swamp => 28,
        }
    }

    pub fn height(self) -> i32 {
        24
    }

    /// Block filling every empty default layer.
    pub fn default_block(self) -> &'static BlockType {
        let id = match self {
            Self::Dirt => "floor_dirt",
            Self::Swamp => "floor_water_2",
        };
        // Both ids are in the static catalog.
        block_type(id).unwrap_or(&super::block::BLOCK_TYPES[4])
    }
}

// =============================================================================
// LAYOUTS
// =============================================================================

/// One placed block as saved by the editor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedBlock {
    pub x: i32,
    pub y: i32,
    pub id: String,
}

impl PlacedBlock {
    pub fn new(x: i32, y: i32, id: impl Into<String>) -> Self {
        Self { x, y, id: id.into() }
    }
}

/// A map type plus the blocks placed on it.
///
/// `width`/`height` default to the map type's size.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapLayout {
    pub map_type: MapType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<i32>,
    #[serde(default)]
    pub blocks: Vec<PlacedBlock>,
}

impl MapLayout {
    /// Empty layout of a map type.
    pub fn empty(map_type: MapType) -> Self {
        Self { map_type, width: None, height: None, blocks: Vec::new() }
    }

    /// Grid width in blocks.
    pub fn width(&self) -> i32 {
        self.width.unwrap_or_else(|| self.map_type.width())
    }

    /// Grid height in blocks.
    pub fn height(&self) -> i32 {
        self.height.unwrap_or_else(|| self.map_type.height())
    }

    pub fn place(&mut self, x: i32, y: i32, id: &str) {
        self.blocks.push(PlacedBlock::new(x, y, id));
    }

    /// Parse a layout from JSON.
    ///
    /// Accepts either a full layout object or the bare `[{x, y, id}]` list
    /// the editor saves, in which case `map_type` is used.
    pub fn from_json(json: &str, map_type: MapType) -> Result<Self, MapError> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Saved {
            Layout(MapLayout),
            Blocks(Vec<PlacedBlock>),
        }

        Ok(match serde_json::from_str::<Saved>(json)? {
            Saved::Layout(layout) => layout,
            Saved::Blocks(blocks) => Self { blocks, ..Self::empty(map_type) },
        })
    }

    /// Read a layout file.
    pub fn load(path: &Path, map_type: MapType) -> Result<Self, MapError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json, map_type)
    }

    /// The built-in skirmish layout.
    ///
    /// Team start columns at both ends, staggered cover walls, a stone centre
    /// and a few props in between. On maps whose default floor is not
    /// walkable the playable area is paved with grass, leaving a one cell
    /// water border.
    pub fn skirmish(map_type: MapType) -> Self {
        let mut layout = Self::empty(map_type);
        let w = layout.width();
        let h = layout.height();

        if map_type.default_block().group.is_blocking() {
            for y in 1..h - 1 {
                for x in 1..w - 1 {
                    layout.place(x, y, "floor_grass");
                }
            }
        }

        // Start markers
        let mid = h / 2;
        for y in mid - 3..mid + 3 {
            for x in [2, 3] {
                layout.place(x, y, MARKER_TEAM_START_RED);
            }
            for x in [w - 4, w - 3] {
                layout.place(x, y, MARKER_TEAM_START_BLUE);
            }
        }

        // Cover walls in front of each spawn
        let red_cover = w / 4;
        let blue_cover = w - 1 - w / 4;
        for y in (3..mid - 4).chain(mid + 4..h - 3) {
            layout.place(red_cover, y, "wall_wood");
            layout.place(blue_cover, y, "wall_wood_2");
        }

        // Centre
        let cx = w / 2 - 1;
        for y in (mid - 6..mid - 2).chain(mid + 2..mid + 6) {
            layout.place(cx, y, "wall_stone");
            layout.place(cx + 1, y, "wall_brick");
        }
        layout.place(cx, mid - 1, "wall_glass");
        layout.place(cx + 1, mid, "wall_glass");
        layout.place(cx, mid, "decor_carpet_1");

        // Props
        let props = [
            (red_cover + 2, mid - 2, "asset_barrel"),
            (blue_cover - 2, mid + 1, "asset_barrel"),
            (red_cover + 3, 2, "asset_box_wood"),
            (blue_cover - 3, h - 3, "asset_box_wood_2"),
            (red_cover + 1, h - 3, "asset_logs"),
            (blue_cover - 1, 2, "asset_stone_1"),
            (red_cover - 2, mid + 5, "decor_grass_1"),
            (blue_cover + 2, mid - 5, "decor_stone_1"),
        ];
        for (x, y, id) in props {
            layout.place(x, y, id);
        }

        layout
    }
}

// =============================================================================
// SCHEMA
// =============================================================================

/// Blocks of one cell keyed by layer.
pub type Cell = BTreeMap<Layer, Block>;

/// Full grid of blocks by coordinate and layer.
#[derive(Clone, Debug)]
pub struct Schema {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

/// Coordinates of a team start marker.
pub type MarkerPoint = (i32, i32);

impl Schema {
    /// Build the schema of a layout.
    ///
    /// Later placements replace earlier ones on the same layer. Every cell
    /// gets the default floor on the default block's layer when nothing else
    /// occupies it.
    pub fn build(layout: &MapLayout) -> Result<Self, MapError> {
        let width = layout.width();
        let height = layout.height();
        let area = width
            .checked_mul(height)
            .filter(|_| width > 0 && height > 0)
            .ok_or(MapError::WrongMapSize { width, height })?;

        let mut schema = Self {
            width: width as usize,
            height: height as usize,
            cells: vec![Cell::new(); area as usize],
        };

        for placed in &layout.blocks {
            let kind = block_type(&placed.id)
                .ok_or_else(|| MapError::UnknownBlockType(placed.id.clone()))?;
            let index = schema.index(placed.x, placed.y).ok_or_else(|| MapError::OutOfBounds {
                id: placed.id.clone(),
                x: placed.x,
                y: placed.y,
                width,
                height,
            })?;
            schema.cells[index].insert(kind.layer(), Block::new(kind));
        }

        let default_block = layout.map_type.default_block();
        for cell in &mut schema.cells {
            cell.entry(default_block.layer()).or_insert_with(|| Block::new(default_block));
        }

        Ok(schema)
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            None
        } else {
            Some(y as usize * self.width + x as usize)
        }
    }

    /// Blocks at a cell, `None` outside the grid.
    pub fn cell(&self, x: i32, y: i32) -> Option<&Cell> {
        self.index(x, y).map(|i| &self.cells[i])
    }

    pub fn cell_mut(&mut self, x: i32, y: i32) -> Option<&mut Cell> {
        self.index(x, y).map(move |i| &mut self.cells[i])
    }

    /// Remove the block on one layer of a cell.
    pub fn remove_block(&mut self, x: i32, y: i32, layer: Layer) -> Option<Block> {
        self.cell_mut(x, y).and_then(|cell| cell.remove(&layer))
    }

    /// Iterate `(x, y, cell)` in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (i32, i32, &Cell)> + '_ {
        let width = self.width;
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, cell)| ((i % width) as i32, (i / width) as i32, cell))
    }

    /// Rows of cells, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> + '_ {
        self.cells.chunks(self.width)
    }

    /// Cells holding a block of the given id, in row-major order.
    pub fn find_blocks(&self, id: &str) -> Vec<MarkerPoint> {
        self.cells()
            .filter(|(_, _, cell)| cell.values().any(|b| b.kind.id == id))
            .map(|(x, y, _)| (x, y))
            .collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================
