//! Actors: identity, teams, actor types and per-actor simulation.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Deserialize};
use uuid::Uuid;

use crate::core::fixed::{fixed_atan2, to_fixed, Fixed};
use crate::core::rng::DeterministicRng;
use crate::core::vec2::FixedVec2;
use crate::world::collision::{box_blocked, resolve_position, CollisionGrid};
use crate::world::ACTOR_CENTER_OFFSET;

use super::controller::{Controller, Direction};
use super::projectile::Projectile;
use super::weapon::{Muzzle, Stance, Weapon, WeaponType};

// =============================================================================
// IDENTITY
// =============================================================================

/// Unique actor identifier. Players and bots share the id space.
///
/// Serializes as a plain UUID string so it can key JSON maps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub Uuid);

impl ActorId {
    /// Fresh random id.
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Match side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Red,
    Blue,
}

impl Team {
    pub const ALL: [Team; 2] = [Team::Red, Team::Blue];

    pub fn opponent(self) -> Self {
        match self {
            Self::Red => Self::Blue,
            Self::Blue => Self::Red,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Blue => "blue",
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Team {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "red" => Ok(Self::Red),
            "blue" => Ok(Self::Blue),
            other => Err(format!("unknown team '{}'", other)),
        }
    }
}

// =============================================================================
// ACTOR TYPES
// =============================================================================

/// Static actor definition. Speeds are in units per tick.
#[derive(Debug, PartialEq, Eq)]
pub struct ActorType {
    pub id: &'static str,
    pub max_health: i32,
    pub walk_speed: Fixed,
    pub run_speed: Fixed,
    pub sprint_speed: Fixed,
}

pub static SOLIDER: ActorType = ActorType {
    id: "solider",
    max_health: 14,
    walk_speed: to_fixed(1.5),
    run_speed: to_fixed(2.5),
    sprint_speed: to_fixed(4.0),
};

pub static SNIPER: ActorType = ActorType {
    id: "sniper",
    max_health: 10,
    walk_speed: to_fixed(1.0),
    run_speed: to_fixed(2.0),
    sprint_speed: to_fixed(3.5),
};

pub static ACTOR_TYPES: [&ActorType; 2] = [&SOLIDER, &SNIPER];

/// Look up an actor type by id.
pub fn actor_type(id: &str) -> Option<&'static ActorType> {
    ACTOR_TYPES.iter().copied().find(|t| t.id == id)
}

impl ActorType {
    pub fn solider() -> &'static Self {
        &SOLIDER
    }

    pub fn sniper() -> &'static Self {
        &SNIPER
    }
}

// =============================================================================
// ACTOR
// =============================================================================

/// A player or bot body in the world.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    pub kind: &'static ActorType,
    pub team: Team,
    /// Top-left corner of the actor's square.
    pub position: FixedVec2,
    /// Angle of the vector from the aim point to the actor.
    pub rotation: Fixed,
    pub health: i32,
    pub is_dead: bool,
    pub controller: Controller,
    pub weapon: Weapon,
}

impl Actor {
    /// New actor at the origin with full health and a loaded weapon.
    pub fn new(kind: &'static ActorType, weapon: &'static WeaponType, team: Team) -> Self {
        Self {
            kind,
            team,
            position: FixedVec2::ZERO,
            rotation: 0,
            health: kind.max_health,
            is_dead: false,
            controller: Controller::default(),
            weapon: Weapon::new(weapon),
        }
    }

    #[inline]
    pub fn max_health(&self) -> i32 {
        self.kind.max_health
    }

    /// Centre of the actor's square.
    #[inline]
    pub fn center(&self) -> FixedVec2 {
        self.position + FixedVec2::new(ACTOR_CENTER_OFFSET, ACTOR_CENTER_OFFSET)
    }

    /// Speed for a movement direction.
    ///
    /// Forward runs, or sprints with the sprint intent. Every other
    /// direction walks.
    pub fn speed(&self, direction: Direction) -> Fixed {
        match direction {
            Direction::Forward if self.controller.is_sprinting => self.kind.sprint_speed,
            Direction::Forward => self.kind.run_speed,
            _ => self.kind.walk_speed,
        }
    }

    /// Take one step in a direction relative to the current rotation.
    ///
    /// The target goes through the collision resolver; a result that still
    /// overlaps a blocking cell is not committed.
    pub fn step(&mut self, direction: Direction, grid: &CollisionGrid, bounds: FixedVec2) {
        let angle = self.rotation + direction.relative_angle();
        let desired = self.position - FixedVec2::from_angle(angle, self.speed(direction));
        let resolved = resolve_position(grid, bounds, desired);

        if box_blocked(grid, resolved) && !box_blocked(grid, self.position) {
            return;
        }
        self.position = resolved;
    }

    /// Turn so that forward heads toward the controller's aim point.
    pub fn face_from_controller_aim(&mut self) {
        let aim = self.controller.facing();
        self.rotation = fixed_atan2(self.position.y - aim.y, self.position.x - aim.x);
    }

    /// Advance weapon cooldowns.
    #[inline]
    pub fn tick_cooldowns(&mut self) {
        self.weapon.tick_cooldown();
    }

    /// Fire the weapon. Dead actors never fire.
    pub fn fire(&mut self, id: ActorId, rng: &mut DeterministicRng) -> Vec<Projectile> {
        if self.is_dead {
            return Vec::new();
        }
        let muzzle = Muzzle {
            owner: id,
            origin: self.center(),
            rotation: self.rotation,
            stance: Stance::of(&self.controller),
        };
        self.weapon.fire(&muzzle, rng)
    }

    /// Start a reload. The reload intent is one-shot and always cleared.
    pub fn reload(&mut self) {
        self.controller.is_reloading = false;
        if !self.is_dead {
            self.weapon.reload();
        }
    }

    /// Apply damage. Returns `true` if this hit killed the actor.
    pub fn take_damage(&mut self, damage: i32) -> bool {
        if self.is_dead {
            return false;
        }
        let health = self.health - damage;
        if health <= 0 {
            self.health = 0;
            self.is_dead = true;
            true
        } else {
            self.health = health;
            false
        }
    }

    /// Bring the actor back for a new round.
    pub fn respawn(&mut self, position: FixedVec2) {
        self.position = position;
        self.rotation = 0;
        self.health = self.kind.max_health;
        self.is_dead = false;
        self.controller = Controller::default();
        self.weapon = Weapon::new(self.weapon.kind);
    }
}

// =============================================================================
// TESTS
// =============================================================================
