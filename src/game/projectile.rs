//! Projectile types and ballistic motion.
//!
//! A projectile's per-tick speed can be several cells long, so motion is
//! split into fixed sub-steps with a hit check at each one.

use std::collections::BTreeMap;

use crate::core::fixed::{fixed_floor_int, fixed_mul, from_int, to_fixed, Fixed};
use crate::core::vec2::FixedVec2;
use crate::world::collision::{resolve_projectile_hit, ProjectileHit};
use crate::world::level::{BlockHit, Level};

use super::actor::{Actor, ActorId};

/// Sub-step length of projectile motion.
pub const SUB_STEP: Fixed = to_fixed(16.0);

/// Projectiles slower than this are destroyed.
pub const MIN_SPEED: Fixed = to_fixed(10.0);

/// Life of a projectile type that does not set one, in sub-steps.
pub const DEFAULT_LIFE: u32 = 120;

/// Slowdown of a projectile type that does not set one.
pub const DEFAULT_SLOWDOWN: Fixed = to_fixed(0.96);

// =============================================================================
// TYPES
// =============================================================================

/// Static projectile definition.
#[derive(Debug, PartialEq, Eq)]
pub struct ProjectileType {
    pub id: &'static str,
    pub damage: i32,
    /// Base speed in units per tick.
    pub speed: Fixed,
    /// Random extra speed, uniform in `[0, speed_rnd)`.
    pub speed_rnd: Fixed,
    /// Trail length for renderers.
    pub length: Fixed,
    /// Sub-steps before the projectile expires.
    pub life: u32,
    /// Per-tick speed and length decay factor.
    pub slowdown: Fixed,
}

impl ProjectileType {
    const fn new(id: &'static str, damage: i32, speed: f64, speed_rnd: f64, length: f64) -> Self {
        Self {
            id,
            damage,
            speed: to_fixed(speed),
            speed_rnd: to_fixed(speed_rnd),
            length: to_fixed(length),
            life: DEFAULT_LIFE,
            slowdown: DEFAULT_SLOWDOWN,
        }
    }

    const fn with_life(mut self, life: u32) -> Self {
        self.life = life;
        self
    }

    const fn with_slowdown(mut self, slowdown: f64) -> Self {
        self.slowdown = to_fixed(slowdown);
        self
    }
}

pub static DUMMY: ProjectileType = ProjectileType::new("dummy", 1, 1.0, 1.0, 10.0);
pub static P9X19: ProjectileType = ProjectileType::new("9x19", 6, 50.0, 3.0, 20.0);
pub static P556X45: ProjectileType = ProjectileType::new("5.56x45", 5, 60.0, 3.0, 40.0);
pub static P762X39: ProjectileType = ProjectileType::new("7.62x39", 7, 63.0, 5.0, 47.0).with_slowdown(0.98);
pub static G12: ProjectileType = ProjectileType::new("g12", 2, 45.0, 3.0, 20.0).with_life(40);
pub static P308_LAPUA: ProjectileType = ProjectileType::new("308lapua", 8, 65.0, 0.0, 48.0);

/// Every projectile type.
pub static PROJECTILE_TYPES: [&ProjectileType; 6] = [&DUMMY, &P9X19, &P556X45, &P762X39, &G12, &P308_LAPUA];

/// Look up a projectile type by id.
pub fn projectile_type(id: &str) -> Option<&'static ProjectileType> {
    PROJECTILE_TYPES.iter().copied().find(|t| t.id == id)
}

// =============================================================================
// PROJECTILE
// =============================================================================

/// What happened to a projectile during one advance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProjectileFate {
    /// Still flying.
    Flying,
    /// Hit an actor and was destroyed.
    HitActor {
        target: ActorId,
        damage: i32,
        killed: bool,
    },
    /// Hit a cell and was destroyed.
    HitBlock { x: i32, y: i32, hit: BlockHit },
    /// Ran out of life or speed.
    Expired,
}

impl ProjectileFate {
    /// Should the projectile be removed.
    #[inline]
    pub fn is_destroyed(&self) -> bool {
        !matches!(self, Self::Flying)
    }
}

/// A projectile in flight.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Projectile {
    pub kind: &'static ProjectileType,
    pub position: FixedVec2,
    pub rotation: Fixed,
    pub speed: Fixed,
    pub length: Fixed,
    pub damage: i32,
    /// Remaining sub-steps.
    pub life: u32,
    /// Shooter, for kill attribution only.
    pub owner: Option<ActorId>,
}

impl Projectile {
    /// New projectile of a type at a position.
    pub fn new(kind: &'static ProjectileType, position: FixedVec2, rotation: Fixed, speed: Fixed) -> Self {
        Self {
            kind,
            position,
            rotation,
            speed,
            length: kind.length,
            damage: kind.damage,
            life: kind.life,
            owner: None,
        }
    }

    /// Scale damage, speed and length by a weapon multiplier.
    pub fn scaled(mut self, multiplier: Fixed) -> Self {
        self.damage = fixed_floor_int(fixed_mul(from_int(self.damage), multiplier));
        self.speed = fixed_mul(self.speed, multiplier);
        self.length = fixed_mul(self.length, multiplier);
        self
    }

    pub fn owned_by(mut self, owner: ActorId) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Advance one tick.
    ///
    /// Moves in `SUB_STEP` increments, checking for hits after each one.
    /// Actor damage is applied directly; block damage goes through the level.
    /// Without a hit, speed and length decay by the type's slowdown.
    pub fn advance(&mut self, level: &mut Level, actors: &mut BTreeMap<ActorId, Actor>) -> ProjectileFate {
        let mut remaining = self.speed;
        while remaining > SUB_STEP {
            if let Some(fate) = self.step(SUB_STEP, level, actors) {
                return fate;
            }
            remaining -= SUB_STEP;
        }
        if let Some(fate) = self.step(remaining, level, actors) {
            return fate;
        }

        self.speed = fixed_mul(self.speed, self.kind.slowdown);
        self.length = fixed_mul(self.length, self.kind.slowdown);
        if self.speed <= MIN_SPEED {
            return ProjectileFate::Expired;
        }
        ProjectileFate::Flying
    }

    fn step(
        &mut self,
        distance: Fixed,
        level: &mut Level,
        actors: &mut BTreeMap<ActorId, Actor>,
    ) -> Option<ProjectileFate> {
        if self.life == 0 {
            return Some(ProjectileFate::Expired);
        }

        self.position = self.position - FixedVec2::from_angle(self.rotation, distance);

        match resolve_projectile_hit(&level.collisions().hit, actors.iter(), self.owner, self.position) {
            ProjectileHit::Actor(target) => {
                let killed = actors
                    .get_mut(&target)
                    .map(|actor| actor.take_damage(self.damage))
                    .unwrap_or(false);
                Some(ProjectileFate::HitActor { target, damage: self.damage, killed })
            }
            ProjectileHit::Block { x, y } => {
                let hit = level.hit_block(x, y, self.damage);
                Some(ProjectileFate::HitBlock { x, y, hit })
            }
            ProjectileHit::None => {
                self.life -= 1;
                None
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
