//! Collision grids and the movement / projectile resolvers.
//!
//! Both resolvers are pure functions over boolean grids derived from the
//! schema. `resolve_position` does a constant number of lookups no matter
//! how large the map is.

use crate::core::fixed::Fixed;
use crate::core::vec2::FixedVec2;
use crate::game::actor::{Actor, ActorId};

use super::schema::Schema;
use super::{ACTOR_HITBOX_FROM, ACTOR_HITBOX_TO, BLOCK_UNITS};

// =============================================================================
// GRIDS
// =============================================================================

/// Boolean grid over map cells. Out-of-range lookups read as free.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollisionGrid {
    width: i32,
    height: i32,
    cells: Vec<bool>,
}

impl CollisionGrid {
    /// Empty (all free) grid.
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        Self { width, height, cells: vec![false; (width * height) as usize] }
    }

    /// Mark every cell in which any block satisfies `predicate`.
    pub fn from_schema<F>(schema: &Schema, predicate: F) -> Self
    where
        F: Fn(&super::block::Block) -> bool,
    {
        let mut grid = Self::new(schema.width() as i32, schema.height() as i32);
        for (x, y, cell) in schema.cells() {
            if cell.values().any(&predicate) {
                grid.set(x, y, true);
            }
        }
        grid
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.height
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            None
        } else {
            Some((y * self.width + x) as usize)
        }
    }

    /// Is the cell marked.
    #[inline]
    pub fn get(&self, x: i32, y: i32) -> bool {
        self.index(x, y).map(|i| self.cells[i]).unwrap_or(false)
    }

    pub fn set(&mut self, x: i32, y: i32, value: bool) {
        if let Some(i) = self.index(x, y) {
            self.cells[i] = value;
        }
    }

    /// Number of marked cells.
    pub fn count(&self) -> usize {
        self.cells.iter().filter(|c| **c).count()
    }
}

/// Both derived grids of a schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollisionMaps {
    /// Cells that stop movement.
    pub movement: CollisionGrid,
    /// Cells projectiles hit and damage.
    pub hit: CollisionGrid,
}

impl CollisionMaps {
    /// Derive both grids from the current schema.
    pub fn compute(schema: &Schema) -> Self {
        Self {
            movement: CollisionGrid::from_schema(schema, |b| b.group().is_blocking()),
            hit: CollisionGrid::from_schema(schema, |b| b.group().is_destructible()),
        }
    }
}

// =============================================================================
// GRID COORDINATES
// =============================================================================

/// Floor and ceil cell index of a unit coordinate.
#[inline]
fn cell_span(v: Fixed) -> (i32, i32) {
    let floor = v.div_euclid(BLOCK_UNITS);
    let ceil = if v.rem_euclid(BLOCK_UNITS) == 0 { floor } else { floor + 1 };
    (floor, ceil)
}

/// Unit coordinate of a cell edge.
#[inline]
pub fn block_to_unit(block: i32) -> Fixed {
    block * BLOCK_UNITS
}

/// Cell containing a unit coordinate.
#[inline]
pub fn unit_to_block(v: Fixed) -> i32 {
    v.div_euclid(BLOCK_UNITS)
}

/// Does a block-sized box at `pos` overlap any marked cell.
pub fn box_blocked(grid: &CollisionGrid, pos: FixedVec2) -> bool {
    let (nx, cx) = cell_span(pos.x);
    let (ny, cy) = cell_span(pos.y);
    grid.get(nx, ny) || grid.get(cx, ny) || grid.get(nx, cy) || grid.get(cx, cy)
}

// =============================================================================
// MOVEMENT
// =============================================================================

/// One blocked corner and the cell edges it can slide to.
struct Corner {
    /// Blocked cell.
    cell: (i32, i32),
    /// Column to slide to along x.
    slide_x: i32,
    /// Row to slide to along y.
    slide_y: i32,
    /// Distance to `slide_x`, in raw units.
    diff_x: Fixed,
    /// Distance to `slide_y`, in raw units.
    diff_y: Fixed,
}

impl Corner {
    fn resolve(&self, grid: &CollisionGrid, pos: &mut FixedVec2) {
        let (bx, by) = self.cell;
        let x_free = !grid.get(self.slide_x, by);
        let y_free = !grid.get(bx, self.slide_y);

        let (slide_x, slide_y) = if self.diff_x < self.diff_y {
            if x_free {
                (true, false)
            } else if y_free {
                (false, true)
            } else {
                (true, true)
            }
        } else if y_free {
            (false, true)
        } else if x_free {
            (true, false)
        } else {
            (true, true)
        };

        if slide_x {
            pos.x = block_to_unit(self.slide_x);
        }
        if slide_y {
            pos.y = block_to_unit(self.slide_y);
        }
    }
}

/// Resolve a desired actor position against the movement grid.
///
/// The position is clamped to `[0, bounds]`, then each of the four cells
/// under the actor's box that is blocking pushes the box to the nearer free
/// cell edge, trying the other axis when the preferred one is blocked and
/// snapping both when neither is free. If the box still overlaps a blocking
/// cell after that, the nearest free cell-aligned position around it wins.
pub fn resolve_position(grid: &CollisionGrid, bounds: FixedVec2, desired: FixedVec2) -> FixedVec2 {
    let clamped = desired.clamp_to(bounds);
    let mut pos = clamped;

    let (nx, cx) = cell_span(clamped.x);
    let (ny, cy) = cell_span(clamped.y);
    let (x, y) = (clamped.x, clamped.y);

    let corners = [
        // top-left
        Corner {
            cell: (nx, ny),
            slide_x: cx,
            slide_y: cy,
            diff_x: block_to_unit(cx) - x,
            diff_y: block_to_unit(cy) - y,
        },
        // top-right
        Corner {
            cell: (cx, ny),
            slide_x: nx,
            slide_y: cy,
            diff_x: x - block_to_unit(nx),
            diff_y: block_to_unit(cy) - y,
        },
        // bottom-left
        Corner {
            cell: (nx, cy),
            slide_x: cx,
            slide_y: ny,
            diff_x: block_to_unit(cx) - x,
            diff_y: y - block_to_unit(ny),
        },
        // bottom-right
        Corner {
            cell: (cx, cy),
            slide_x: nx,
            slide_y: ny,
            diff_x: x - block_to_unit(nx),
            diff_y: y - block_to_unit(ny),
        },
    ];

    for corner in &corners {
        if grid.get(corner.cell.0, corner.cell.1) {
            corner.resolve(grid, &mut pos);
        }
    }

    if !box_blocked(grid, pos) {
        return pos;
    }

    nearest_free_cell(grid, bounds, clamped).unwrap_or(pos)
}

/// Nearest free cell-aligned position in the 4x4 cells around `pos`.
fn nearest_free_cell(grid: &CollisionGrid, bounds: FixedVec2, pos: FixedVec2) -> Option<FixedVec2> {
    let (nx, _) = cell_span(pos.x);
    let (ny, _) = cell_span(pos.y);
    let max_col = unit_to_block(bounds.x);
    let max_row = unit_to_block(bounds.y);

    let mut best: Option<(i64, FixedVec2)> = None;
    for row in ny - 1..=ny + 2 {
        for col in nx - 1..=nx + 2 {
            if col < 0 || row < 0 || col > max_col || row > max_row || grid.get(col, row) {
                continue;
            }
            let candidate = FixedVec2::new(block_to_unit(col), block_to_unit(row));
            let distance = candidate.distance_squared(pos);
            if best.map_or(true, |(d, _)| distance < d) {
                best = Some((distance, candidate));
            }
        }
    }
    best.map(|(_, p)| p)
}

// =============================================================================
// PROJECTILES
// =============================================================================

/// What a projectile hit at one step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProjectileHit {
    /// A live actor other than the owner.
    Actor(ActorId),
    /// A destructible cell.
    Block { x: i32, y: i32 },
    /// Nothing.
    None,
}

/// Is a point inside an actor's hit box.
#[inline]
pub fn in_hitbox(actor_pos: FixedVec2, point: FixedVec2) -> bool {
    point.x > actor_pos.x + ACTOR_HITBOX_FROM
        && point.x < actor_pos.x + ACTOR_HITBOX_TO
        && point.y > actor_pos.y + ACTOR_HITBOX_FROM
        && point.y < actor_pos.y + ACTOR_HITBOX_TO
}

/// Resolve what a projectile at `point` hits.
///
/// Actors are checked first, in iteration order, skipping dead actors and
/// the projectile's owner. Then the hit grid cell under the point.
pub fn resolve_projectile_hit<'a, I>(
    hit_grid: &CollisionGrid,
    actors: I,
    owner: Option<ActorId>,
    point: FixedVec2,
) -> ProjectileHit
where
    I: IntoIterator<Item = (&'a ActorId, &'a Actor)>,
{
    for (id, actor) in actors {
        if actor.is_dead || Some(*id) == owner {
            continue;
        }
        if in_hitbox(actor.position, point) {
            return ProjectileHit::Actor(*id);
        }
    }

    let x = unit_to_block(point.x);
    let y = unit_to_block(point.y);
    if hit_grid.get(x, y) {
        return ProjectileHit::Block { x, y };
    }

    ProjectileHit::None
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use proptest::prelude::*;
    use uuid::Uuid;
    use crate::core::fixed::{from_int, to_fixed};
    use crate::game::actor::{ActorType, Team};
    use crate::game::weapon::WeaponType;

    fn grid_with(width: i32, height: i32, blocked: &[(i32, i32)]) -> CollisionGrid {
        let mut grid = CollisionGrid::new(width, height);
        for &(x, y) in blocked {
            grid.set(x, y, true);
        }
        grid
    }

    fn bounds(width: i32, height: i32) -> FixedVec2 {
        FixedVec2::from_ints(width * 32 - 32, height * 32 - 32)
    }

    fn actor_at(x: i32, y: i32) -> Actor {
        let mut actor = Actor::new(ActorType::solider(), WeaponType::pistol(), Team::Red);
        actor.position = FixedVec2::from_ints(x, y);
        actor
    }

    #[test]
    fn test_grid_out_of_range_is_free() {
        let grid = grid_with(4, 4, &[(0, 0)]);
        assert!(grid.get(0, 0));
        assert!(!grid.get(-1, 0));
        assert!(!grid.get(4, 0));
        assert_eq!(grid.count(), 1);
    }

    #[test]
    fn test_clamps_to_bounds() {
        let grid = CollisionGrid::new(10, 10);
        let result = resolve_position(&grid, bounds(10, 10), FixedVec2::from_ints(-50, 400));
        assert_eq!(result, FixedVec2::from_ints(0, 288));
    }

    #[test]
    fn test_free_position_untouched() {
        let grid = grid_with(10, 10, &[(5, 5)]);
        let desired = FixedVec2::new(to_fixed(40.5), to_fixed(70.25));
        assert_eq!(resolve_position(&grid, bounds(10, 10), desired), desired);
    }

    #[test]
    fn test_slides_along_smaller_axis() {
        // Wall at column 3: moving right into it from x=70 pushes back to x=64.
        let grid = grid_with(10, 10, &[(3, 2)]);
        let desired = FixedVec2::new(to_fixed(70.0), from_int(64));
        let result = resolve_position(&grid, bounds(10, 10), desired);
        assert_eq!(result, FixedVec2::from_ints(64, 64));
    }

    #[test]
    fn test_slides_to_other_axis_when_preferred_blocked() {
        // Box at (70, 60) overlaps cols 2..3 and rows 1..2; (3,2) blocked.
        // x distance back to col 2 is 6, y distance back to row 1 is 28;
        // col 2 row 2 is blocked too, so the box must move up to row 1.
        let grid = grid_with(10, 10, &[(3, 2), (2, 2)]);
        let desired = FixedVec2::from_ints(70, 60);
        let result = resolve_position(&grid, bounds(10, 10), desired);
        assert!(!box_blocked(&grid, result));
        assert_eq!(result.y, from_int(32));
    }

    #[test]
    fn test_never_inside_blocked_cell_corner_pocket() {
        let grid = grid_with(10, 10, &[(1, 1), (2, 1), (1, 2)]);
        let result = resolve_position(&grid, bounds(10, 10), FixedVec2::from_ints(40, 40));
        assert!(!box_blocked(&grid, result));
    }

    #[test]
    fn test_projectile_hits_actor_before_block() {
        let grid = grid_with(10, 10, &[(1, 1)]);
        let mut actors = BTreeMap::new();
        let id = ActorId(Uuid::from_u128(1));
        actors.insert(id, actor_at(32, 32));

        let point = FixedVec2::from_ints(48, 48);
        assert_eq!(resolve_projectile_hit(&grid, &actors, None, point), ProjectileHit::Actor(id));

        // The owner is never hit by its own projectile.
        assert_eq!(
            resolve_projectile_hit(&grid, &actors, Some(id), point),
            ProjectileHit::Block { x: 1, y: 1 }
        );

        // Dead actors are ignored.
        actors.get_mut(&id).unwrap().is_dead = true;
        assert_eq!(
            resolve_projectile_hit(&grid, &actors, None, point),
            ProjectileHit::Block { x: 1, y: 1 }
        );
    }

    #[test]
    fn test_hitbox_is_strict_interior() {
        let actor = FixedVec2::from_ints(0, 0);
        assert!(!in_hitbox(actor, FixedVec2::from_ints(5, 16)));
        assert!(in_hitbox(actor, FixedVec2::new(to_fixed(5.01), from_int(16))));
        assert!(!in_hitbox(actor, FixedVec2::from_ints(27, 16)));
        assert!(!in_hitbox(actor, FixedVec2::from_ints(2, 2)));
    }

    #[test]
    fn test_projectile_miss_outside_map() {
        let grid = grid_with(4, 4, &[(0, 0)]);
        let actors: BTreeMap<ActorId, Actor> = BTreeMap::new();
        let point = FixedVec2::from_ints(-3, 10);
        assert_eq!(resolve_projectile_hit(&grid, &actors, None, point), ProjectileHit::None);
    }

    #[test]
    fn test_maps_follow_schema_groups() {
        use crate::world::schema::{MapLayout, MapType};

        let mut layout = MapLayout::empty(MapType::Dirt);
        layout.place(1, 0, "door_wood");
        layout.place(2, 0, "wall_wood");
        layout.place(3, 0, "decor_grass_1");
        let schema = Schema::build(&layout).unwrap();
        let maps = CollisionMaps::compute(&schema);

        assert!(maps.movement.get(1, 0) && maps.hit.get(1, 0));
        assert!(maps.movement.get(2, 0) && maps.hit.get(2, 0));
        assert!(!maps.movement.get(3, 0) && !maps.hit.get(3, 0));
        assert_eq!(maps.movement.count(), 2);
    }

    proptest! {
        #[test]
        fn prop_resolved_box_never_overlaps_blocking_cell(
            blocked in proptest::collection::vec((0i32..8, 0i32..8), 0..12),
            dx in -40_000_000i32..40_000_000,
            dy in -40_000_000i32..40_000_000,
        ) {
            let grid = grid_with(8, 8, &blocked);
            let desired = FixedVec2::new(dx, dy);
            let result = resolve_position(&grid, bounds(8, 8), desired);

            // Only meaningful when some free cell exists near the target.
            let clamped = desired.clamp_to(bounds(8, 8));
            prop_assume!(nearest_free_cell(&grid, bounds(8, 8), clamped).is_some());

            prop_assert!(!box_blocked(&grid, result));
            prop_assert!(result.x >= 0 && result.x <= bounds(8, 8).x);
            prop_assert!(result.y >= 0 && result.y <= bounds(8, 8).y);
        }
    }
}
