//! World
//!
//! The level plus everything living in it: actors, projectiles and the
//! match RNG. `World::tick` is the authoritative simulation step.

use std::collections::BTreeMap;

use tracing::info;

use crate::core::hash::{StateHash, StateHasher};
use crate::core::rng::DeterministicRng;
use crate::core::vec2::FixedVec2;
use crate::world::level::Level;
use crate::world::schema::MapError;

use super::actor::{Actor, ActorId, ActorType, Team};
use super::controller::Controller;
use super::events::{GameEvent, GameEventData};
use super::projectile::{Projectile, ProjectileFate};
use super::weapon::WeaponType;

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Tick number that produced these events.
    pub tick: u64,
    /// Events generated this tick, sorted.
    pub events: Vec<GameEvent>,
}

impl TickResult {
    /// Kill events only.
    pub fn kills(&self) -> impl Iterator<Item = &GameEvent> {
        self.events
            .iter()
            .filter(|e| matches!(e.data, GameEventData::ActorKilled { .. }))
    }
}

/// Level, actors and projectiles of one match.
#[derive(Clone, Debug)]
pub struct World {
    level: Level,
    actors: BTreeMap<ActorId, Actor>,
    projectiles: Vec<Projectile>,
    rng: DeterministicRng,
    seed: u64,
    tick: u64,
}

impl World {
    /// New world over a level.
    pub fn new(level: Level, seed: u64) -> Self {
        Self {
            level,
            actors: BTreeMap::new(),
            projectiles: Vec::new(),
            rng: DeterministicRng::new(seed),
            seed,
            tick: 0,
        }
    }

    pub fn level(&self) -> &Level {
        &self.level
    }

    pub fn level_mut(&mut self) -> &mut Level {
        &mut self.level
    }

    /// Ticks simulated so far.
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Game time in milliseconds at the current tick.
    pub fn game_time_ms(&self) -> u64 {
        self.tick * crate::GAME_TICK_MS
    }

    pub fn rng_mut(&mut self) -> &mut DeterministicRng {
        &mut self.rng
    }

    // =========================================================================
    // Actors
    // =========================================================================

    /// Insert an actor as-is.
    pub fn insert_actor(&mut self, id: ActorId, actor: Actor) {
        self.actors.insert(id, actor);
    }

    /// Create an actor at a random start marker of its team.
    ///
    /// Returns the spawn position, or `None` when the team has no markers.
    pub fn spawn_actor(
        &mut self,
        id: ActorId,
        kind: &'static ActorType,
        weapon: &'static WeaponType,
        team: Team,
    ) -> Option<FixedVec2> {
        let position = self.level.spawn_point(team, &mut self.rng)?;
        let mut actor = Actor::new(kind, weapon, team);
        actor.position = position;
        self.actors.insert(id, actor);
        Some(position)
    }

    /// Respawn an existing actor at a fresh start marker.
    pub fn respawn_actor(&mut self, id: &ActorId) -> Option<FixedVec2> {
        let team = self.actors.get(id)?.team;
        let position = self.level.spawn_point(team, &mut self.rng)?;
        self.actors.get_mut(id)?.respawn(position);
        Some(position)
    }

    pub fn remove_actor(&mut self, id: &ActorId) -> Option<Actor> {
        self.actors.remove(id)
    }

    pub fn actor(&self, id: &ActorId) -> Option<&Actor> {
        self.actors.get(id)
    }

    pub fn actor_mut(&mut self, id: &ActorId) -> Option<&mut Actor> {
        self.actors.get_mut(id)
    }

    /// All actors in id order.
    pub fn actors(&self) -> &BTreeMap<ActorId, Actor> {
        &self.actors
    }

    /// Replace an actor's intents. Returns `false` for unknown actors.
    pub fn set_controller(&mut self, id: &ActorId, controller: Controller) -> bool {
        match self.actors.get_mut(id) {
            Some(actor) => {
                actor.controller = controller;
                true
            }
            None => false,
        }
    }

    /// Living actors of a team.
    pub fn alive_count(&self, team: Team) -> usize {
        self.actors
            .values()
            .filter(|a| a.team == team && !a.is_dead)
            .count()
    }

    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    /// Rebuild the level from its layout and drop projectiles in flight.
    pub fn reset_level(&mut self) -> Result<(), MapError> {
        self.level.reset()?;
        self.projectiles.clear();
        Ok(())
    }

    // =========================================================================
    // Simulation
    // =========================================================================

    /// Run one simulation tick.
    ///
    /// Order:
    /// 1. Advance every projectile (hits apply damage and destroy blocks)
    /// 2. For every living actor: cooldowns, movement intents in
    ///    forward/right/left/back order, facing, then reload or fire
    pub fn tick(&mut self) -> TickResult {
        self.tick += 1;

        let mut result = TickResult {
            tick: self.tick,
            events: Vec::new(),
        };

        self.advance_projectiles(&mut result.events);
        self.update_actors();

        result.events.sort();
        result
    }

    fn advance_projectiles(&mut self, events: &mut Vec<GameEvent>) {
        let tick = self.tick;
        let level = &mut self.level;
        let actors = &mut self.actors;

        self.projectiles.retain_mut(|projectile| {
            let fate = projectile.advance(level, actors);
            match &fate {
                ProjectileFate::HitActor { target, damage, killed } => {
                    events.push(GameEvent::actor_damaged(tick, *target, projectile.owner, *damage));
                    if *killed {
                        if let Some(victim) = actors.get(target) {
                            info!(target = %target, team = %victim.team, killer = ?projectile.owner, "actor killed");
                            events.push(GameEvent::actor_killed(tick, *target, victim.team, projectile.owner));
                        }
                    }
                }
                ProjectileFate::HitBlock { x, y, hit } => {
                    for &layer in &hit.destroyed {
                        events.push(GameEvent::block_destroyed(tick, *x, *y, layer));
                    }
                }
                ProjectileFate::Flying | ProjectileFate::Expired => {}
            }
            !fate.is_destroyed()
        });
    }

    fn update_actors(&mut self) {
        let grid = &self.level.collisions().movement;
        let bounds = self.level.bounds();

        for (id, actor) in self.actors.iter_mut() {
            if actor.is_dead {
                continue;
            }

            actor.tick_cooldowns();

            let controller = actor.controller;
            for direction in controller.directions() {
                actor.step(direction, grid, bounds);
            }
            actor.face_from_controller_aim();

            if controller.is_reloading {
                actor.reload();
            } else if controller.is_firing {
                self.projectiles.extend(actor.fire(*id, &mut self.rng));
            }
        }
    }

    /// Hash of everything the simulation depends on.
    pub fn compute_hash(&self) -> StateHash {
        let mut hasher = StateHasher::world(self.tick, self.seed);

        for (id, actor) in &self.actors {
            hasher
                .write(&id.0)
                .write(&actor.position)
                .write(&actor.rotation)
                .write(&actor.health)
                .write(&actor.is_dead)
                .write(&actor.weapon.ammo)
                .write(&actor.weapon.cooldown)
                .write(&actor.weapon.reload_cooldown);
        }

        hasher.write(&(self.projectiles.len() as u32));
        for projectile in &self.projectiles {
            hasher
                .write(&projectile.position)
                .write(&projectile.rotation)
                .write(&projectile.speed)
                .write(&projectile.life);
        }

        for (x, y, cell) in self.level.schema().cells() {
            for (layer, block) in cell {
                hasher.write(&x).write(&y).write(layer).write(&block.health);
            }
        }

        let [s0, s1] = self.rng.state();
        hasher.write(&s0).write(&s1);
        hasher.finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use crate::core::fixed::from_int;
    use crate::game::actor::SOLIDER;
    use crate::game::weapon::PISTOL;
    use crate::world::schema::{MapLayout, MapType};

    fn id(n: u128) -> ActorId {
        ActorId(Uuid::from_u128(n))
    }

    fn open_world() -> World {
        World::new(Level::new(MapLayout::empty(MapType::Dirt)).unwrap(), 7)
    }

    fn place(world: &mut World, actor_id: ActorId, team: Team, x: i32, y: i32) {
        let mut actor = Actor::new(&SOLIDER, &PISTOL, team);
        actor.position = FixedVec2::from_ints(x, y);
        world.insert_actor(actor_id, actor);
    }

    fn aim_at(world: &mut World, actor_id: ActorId, x: i32, y: i32, fire: bool) {
        let mut controller = Controller { is_firing: fire, ..Default::default() };
        controller.set_facing(FixedVec2::from_ints(x, y));
        assert!(world.set_controller(&actor_id, controller));
    }

    #[test]
    fn test_shot_kills_target_once() {
        let mut world = open_world();
        let (red, blue) = (id(1), id(2));
        place(&mut world, red, Team::Red, 100, 100);
        place(&mut world, blue, Team::Blue, 200, 100);
        world.actor_mut(&blue).unwrap().health = 1;
        aim_at(&mut world, red, 216, 100, true);

        let mut kills = Vec::new();
        for _ in 0..10 {
            let result = world.tick();
            kills.extend(result.kills().cloned());
        }

        assert_eq!(kills.len(), 1);
        match &kills[0].data {
            GameEventData::ActorKilled { target, target_team, killer } => {
                assert_eq!(*target, blue);
                assert_eq!(*target_team, Team::Blue);
                assert_eq!(*killer, Some(red));
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(world.actor(&blue).unwrap().is_dead);
        assert_eq!(world.alive_count(Team::Blue), 0);
        assert_eq!(world.alive_count(Team::Red), 1);
    }

    #[test]
    fn test_dead_actors_do_not_move() {
        let mut world = open_world();
        let a = id(1);
        place(&mut world, a, Team::Red, 300, 300);
        aim_at(&mut world, a, 0, 300, false);
        world.actor_mut(&a).unwrap().controller.is_moving_forward = true;
        world.actor_mut(&a).unwrap().is_dead = true;

        world.tick();
        assert_eq!(world.actor(&a).unwrap().position, FixedVec2::from_ints(300, 300));
    }

    #[test]
    fn test_forward_moves_toward_aim_point() {
        let mut world = open_world();
        let a = id(1);
        place(&mut world, a, Team::Red, 300, 300);
        aim_at(&mut world, a, 0, 300, false);
        world.actor_mut(&a).unwrap().controller.is_moving_forward = true;

        // First tick only turns; afterwards every tick runs forward.
        world.tick();
        let before = world.actor(&a).unwrap().position;
        world.tick();
        let after = world.actor(&a).unwrap().position;
        assert!(after.x < before.x);
        assert!((after.y - before.y).abs() < from_int(1));
    }

    #[test]
    fn test_reload_wins_over_fire() {
        let mut world = open_world();
        let a = id(1);
        place(&mut world, a, Team::Red, 300, 300);
        world.actor_mut(&a).unwrap().weapon.ammo = 3;
        let controller = Controller { is_firing: true, is_reloading: true, ..Default::default() };
        world.set_controller(&a, controller);

        world.tick();
        let actor = world.actor(&a).unwrap();
        assert!(world.projectiles().is_empty());
        assert!(actor.weapon.is_reloading());
        assert!(!actor.controller.is_reloading);
    }

    #[test]
    fn test_same_seed_same_hash() {
        let run = || {
            let mut world = open_world();
            place(&mut world, id(1), Team::Red, 100, 100);
            place(&mut world, id(2), Team::Blue, 400, 300);
            aim_at(&mut world, id(1), 416, 316, true);
            aim_at(&mut world, id(2), 116, 116, true);
            for _ in 0..50 {
                world.tick();
            }
            world.compute_hash()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_spawn_and_respawn_at_team_markers() {
        let level = Level::new(MapLayout::skirmish(MapType::Dirt)).unwrap();
        let mut world = World::new(level, 3);
        let a = id(9);

        let spawn = world.spawn_actor(a, &SOLIDER, &PISTOL, Team::Blue).unwrap();
        let markers: Vec<FixedVec2> = world
            .level()
            .start_points(Team::Blue)
            .iter()
            .map(|&(x, y)| FixedVec2::from_ints(x * 32, y * 32))
            .collect();
        assert!(markers.contains(&spawn));

        world.actor_mut(&a).unwrap().take_damage(100);
        let again = world.respawn_actor(&a).unwrap();
        assert!(markers.contains(&again));
        assert!(!world.actor(&a).unwrap().is_dead);
        assert_eq!(world.alive_count(Team::Blue), 1);
    }

    #[test]
    fn test_spawn_without_markers_fails() {
        let mut world = open_world();
        assert!(world.spawn_actor(id(1), &SOLIDER, &PISTOL, Team::Red).is_none());
        assert!(world.actors().is_empty());
    }

    #[test]
    fn test_reset_level_clears_projectiles() {
        let mut world = open_world();
        place(&mut world, id(1), Team::Red, 300, 300);
        aim_at(&mut world, id(1), 900, 300, true);
        world.tick();
        assert!(!world.projectiles().is_empty());

        world.reset_level().unwrap();
        assert!(world.projectiles().is_empty());
    }
}
