//! Bot Manager
//!
//! Owns every bot of a match: creation within the team limits, spawning
//! into the world, the throttled AI update loop and bot statistics.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::{Serialize, Deserialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::fixed::to_fixed;
use crate::core::rng::DeterministicRng;
use crate::core::vec2::FixedVec2;
use crate::game::actor::{ActorId, ActorType, Team};
use crate::game::weapon::{weapon_type, WeaponType};
use crate::game::world::World;

use super::controller::{BotController, BotPerformance};
use super::profile::{Difficulty, Personality};

/// Bots per match.
pub const MAX_BOTS: usize = 8;

/// Bots per team.
pub const MAX_BOTS_PER_TEAM: usize = 4;

/// Game time between performance counter resets.
const PERFORMANCE_WINDOW_MS: u64 = 60_000;

/// Bot management errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BotError {
    /// Match-wide bot limit reached.
    #[error("maximum number of bots reached ({0})")]
    TooManyBots(usize),

    /// Per-team bot limit reached.
    #[error("maximum bots for team {0} reached")]
    TeamFull(Team),

    /// Weapon unknown or not available in this match.
    #[error("weapon not available: {0}")]
    UnknownWeapon(String),

    /// The level has no start marker for the team.
    #[error("no spawn point for team {0}")]
    NoSpawnPoint(Team),

    /// No bot with this id.
    #[error("unknown bot: {0}")]
    UnknownBot(ActorId),
}

/// One bot: its identity, loadout and AI.
#[derive(Clone, Debug)]
pub struct Bot {
    pub id: ActorId,
    pub name: String,
    pub team: Team,
    pub difficulty: Difficulty,
    pub personality: Personality,
    pub weapon: &'static WeaponType,
    pub actor_type: &'static ActorType,
    pub controller: BotController,
    /// Has an actor in the world.
    pub spawned: bool,
}

/// Bot as announced to clients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotInfo {
    pub id: ActorId,
    pub name: String,
    pub team: Team,
    pub difficulty: Difficulty,
    pub personality: Personality,
    pub weapon_type: String,
    pub actor_type: String,
    pub is_bot: bool,
}

impl From<&Bot> for BotInfo {
    fn from(bot: &Bot) -> Self {
        Self {
            id: bot.id,
            name: bot.name.clone(),
            team: bot.team,
            difficulty: bot.difficulty,
            personality: bot.personality,
            weapon_type: bot.weapon.id.to_string(),
            actor_type: bot.actor_type.id.to_string(),
            is_bot: true,
        }
    }
}

/// Bot counts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotStats {
    pub total: usize,
    pub by_team: BTreeMap<Team, usize>,
    pub by_difficulty: BTreeMap<Difficulty, usize>,
    pub by_personality: BTreeMap<Personality, usize>,
}

/// Cost of the AI update loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerPerformance {
    pub total_updates: u64,
    /// Mean wall time of one `update` call in microseconds.
    pub average_update_us: f64,
    pub active_bots: usize,
    pub total_bots: usize,
    pub is_enabled: bool,
}

#[derive(Clone, Debug, Default)]
struct UpdateCounters {
    total_updates: u64,
    update_time: Duration,
    last_reset_ms: u64,
}

/// All bots of a match.
#[derive(Clone, Debug)]
pub struct BotManager {
    bots: Vec<Bot>,
    enabled: bool,
    rng: DeterministicRng,
    available_weapons: Vec<&'static WeaponType>,
    counters: UpdateCounters,
}

impl BotManager {
    /// New, disabled manager choosing among `available_weapons`.
    pub fn new(rng: DeterministicRng, available_weapons: Vec<&'static WeaponType>) -> Self {
        Self {
            bots: Vec::new(),
            enabled: false,
            rng,
            available_weapons,
            counters: UpdateCounters::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Stop updating and remove every bot. Returns the removed ids.
    pub fn disable(&mut self, world: &mut World) -> Vec<ActorId> {
        self.enabled = false;
        self.remove_all_bots(world)
    }

    pub fn bots(&self) -> &[Bot] {
        &self.bots
    }

    pub fn bot(&self, id: &ActorId) -> Option<&Bot> {
        self.bots.iter().find(|b| b.id == *id)
    }

    fn bot_mut(&mut self, id: &ActorId) -> Option<&mut Bot> {
        self.bots.iter_mut().find(|b| b.id == *id)
    }

    pub fn is_bot(&self, id: &ActorId) -> bool {
        self.bot(id).is_some()
    }

    pub fn infos(&self) -> Vec<BotInfo> {
        self.bots.iter().map(BotInfo::from).collect()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Create a bot and try to spawn it.
    ///
    /// A missing personality is picked at random, a missing weapon from the
    /// personality's preferences. A spawn failure is logged and leaves the
    /// bot registered but unspawned.
    pub fn add_bot(
        &mut self,
        world: &mut World,
        team: Team,
        difficulty: Difficulty,
        personality: Option<Personality>,
        weapon: Option<&str>,
    ) -> Result<ActorId, BotError> {
        if self.bots.len() >= MAX_BOTS {
            return Err(BotError::TooManyBots(MAX_BOTS));
        }
        if self.bots.iter().filter(|b| b.team == team).count() >= MAX_BOTS_PER_TEAM {
            return Err(BotError::TeamFull(team));
        }

        let personality = match personality {
            Some(p) => p,
            None => *self.rng.choose(&Personality::ALL).unwrap_or(&Personality::Tactical),
        };
        let weapon = match weapon {
            Some(key) => self.available_weapon(key).ok_or_else(|| BotError::UnknownWeapon(key.to_string()))?,
            None => self
                .weapon_for(personality)
                .ok_or_else(|| BotError::UnknownWeapon(String::from("<none available>")))?,
        };

        let id = ActorId(Uuid::from_u128(
            ((self.rng.next_u64() as u128) << 64) | self.rng.next_u64() as u128,
        ));
        let name = personality.bot_name(self.bots.len() + 1);

        self.bots.push(Bot {
            id,
            name: name.clone(),
            team,
            difficulty,
            personality,
            weapon,
            actor_type: personality.actor_type(),
            controller: BotController::new(personality, difficulty.preset()),
            spawned: false,
        });
        info!(bot = %id, name = %name, team = %team, difficulty = %difficulty, personality = %personality, "bot added");

        if let Err(e) = self.spawn_bot(world, &id) {
            warn!(bot = %id, error = %e, "bot spawn failed");
        }

        Ok(id)
    }

    /// Put a bot's actor into the world at a team start marker.
    pub fn spawn_bot(&mut self, world: &mut World, id: &ActorId) -> Result<FixedVec2, BotError> {
        let bot = self.bot_mut(id).ok_or(BotError::UnknownBot(*id))?;
        let position = world
            .spawn_actor(bot.id, bot.actor_type, bot.weapon, bot.team)
            .ok_or(BotError::NoSpawnPoint(bot.team))?;
        bot.spawned = true;
        debug!(bot = %bot.id, x = %position.x, y = %position.y, "bot spawned");
        Ok(position)
    }

    /// Retry every unspawned bot. Returns the bots spawned now.
    pub fn spawn_pending(&mut self, world: &mut World) -> Vec<ActorId> {
        let pending: Vec<ActorId> = self.bots.iter().filter(|b| !b.spawned).map(|b| b.id).collect();
        pending
            .into_iter()
            .filter(|id| match self.spawn_bot(world, id) {
                Ok(_) => true,
                Err(e) => {
                    warn!(bot = %id, error = %e, "bot spawn failed");
                    false
                }
            })
            .collect()
    }

    /// Remove a bot and its actor.
    pub fn remove_bot(&mut self, world: &mut World, id: &ActorId) -> bool {
        let Some(index) = self.bots.iter().position(|b| b.id == *id) else {
            return false;
        };
        let bot = self.bots.remove(index);
        world.remove_actor(&bot.id);
        info!(bot = %bot.id, name = %bot.name, "bot removed");
        true
    }

    pub fn remove_all_bots(&mut self, world: &mut World) -> Vec<ActorId> {
        let ids: Vec<ActorId> = self.bots.iter().map(|b| b.id).collect();
        for id in &ids {
            self.remove_bot(world, id);
        }
        ids
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Run the AI of every living, spawned bot that is due.
    pub fn update(&mut self, world: &mut World, now: u64) {
        if !self.enabled {
            return;
        }

        let started = Instant::now();

        for bot in &mut self.bots {
            if !bot.spawned || !bot.controller.is_due(now) {
                continue;
            }
            let alive = world.actor(&bot.id).map_or(false, |a| !a.is_dead);
            if !alive {
                continue;
            }
            if let Some(controller) = bot.controller.update(bot.id, world.actors(), now, &mut self.rng) {
                world.set_controller(&bot.id, controller);
            }
        }

        self.counters.total_updates += 1;
        self.counters.update_time += started.elapsed();

        if now.saturating_sub(self.counters.last_reset_ms) > PERFORMANCE_WINDOW_MS {
            for bot in &mut self.bots {
                bot.controller.adapt();
            }
            self.counters = UpdateCounters {
                last_reset_ms: now,
                ..Default::default()
            };
        }
    }

    /// Feed a kill to the bots involved.
    pub fn on_kill(&mut self, target: &ActorId, killer: Option<&ActorId>, now: u64) {
        if let Some(bot) = killer.and_then(|k| self.bot_mut(k)) {
            bot.controller.on_kill();
        }
        if let Some(bot) = self.bot_mut(target) {
            bot.controller.on_death(now);
        }
    }

    pub fn on_damage(&mut self, attacker: &ActorId, damage: i32) {
        if let Some(bot) = self.bot_mut(attacker) {
            bot.controller.on_damage_dealt(damage);
        }
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    pub fn stats(&self) -> BotStats {
        let mut stats = BotStats {
            total: self.bots.len(),
            ..Default::default()
        };
        for team in Team::ALL {
            stats.by_team.insert(team, 0);
        }
        for bot in &self.bots {
            *stats.by_team.entry(bot.team).or_default() += 1;
            *stats.by_difficulty.entry(bot.difficulty).or_default() += 1;
            *stats.by_personality.entry(bot.personality).or_default() += 1;
        }
        stats
    }

    pub fn performance(&self, world: &World) -> ManagerPerformance {
        let average_update_us = if self.counters.total_updates == 0 {
            0.0
        } else {
            self.counters.update_time.as_secs_f64() * 1e6 / self.counters.total_updates as f64
        };
        let active_bots = self
            .bots
            .iter()
            .filter(|b| b.spawned && world.actor(&b.id).map_or(false, |a| !a.is_dead))
            .count();

        ManagerPerformance {
            total_updates: self.counters.total_updates,
            average_update_us,
            active_bots,
            total_bots: self.bots.len(),
            is_enabled: self.enabled,
        }
    }

    /// Telemetry of one bot.
    pub fn bot_performance(&self, id: &ActorId) -> Option<BotPerformance> {
        self.bot(id).map(|b| b.controller.performance())
    }

    // =========================================================================
    // Balancing
    // =========================================================================

    /// Move one random bot from the larger team when the teams differ by
    /// more than one. Returns `(removed, added)`.
    pub fn balance_teams(&mut self, world: &mut World) -> Option<(ActorId, ActorId)> {
        let red = self.bots.iter().filter(|b| b.team == Team::Red).count();
        let blue = self.bots.len() - red;
        if red.abs_diff(blue) <= 1 {
            return None;
        }

        let larger = if red > blue { Team::Red } else { Team::Blue };
        let candidates: Vec<ActorId> = self.bots.iter().filter(|b| b.team == larger).map(|b| b.id).collect();
        let moved = *self.rng.choose(&candidates)?;
        let bot = self.bot(&moved)?.clone();

        self.remove_bot(world, &moved);
        let added = self
            .add_bot(world, larger.opponent(), bot.difficulty, Some(bot.personality), Some(bot.weapon.id))
            .ok()?;
        info!(from = %larger, to = %larger.opponent(), "bot moved to balance teams");
        Some((moved, added))
    }

    /// Give every non-elite bot a 10% chance to move up one difficulty.
    pub fn adjust_difficulty(&mut self) -> Vec<(ActorId, Difficulty)> {
        let mut upgraded = Vec::new();
        for bot in &mut self.bots {
            let Some(next) = bot.difficulty.harder() else {
                continue;
            };
            if !self.rng.next_bool(to_fixed(0.1)) {
                continue;
            }
            bot.difficulty = next;
            bot.controller.apply_preset(next.preset());
            info!(bot = %bot.id, name = %bot.name, difficulty = %next, "bot upgraded");
            upgraded.push((bot.id, next));
        }
        upgraded
    }

    // =========================================================================
    // Loadout
    // =========================================================================

    fn available_weapon(&self, key: &str) -> Option<&'static WeaponType> {
        let weapon = weapon_type(key)?;
        self.available_weapons.iter().any(|w| w.id == weapon.id).then_some(weapon)
    }

    /// Random preferred weapon, or the first available one.
    fn weapon_for(&mut self, personality: Personality) -> Option<&'static WeaponType> {
        let preferred: Vec<&'static WeaponType> = personality
            .weapon_preferences()
            .iter()
            .filter_map(|key| self.available_weapon(key))
            .collect();

        match self.rng.choose(&preferred) {
            Some(weapon) => Some(*weapon),
            None => self.available_weapons.first().copied(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::actor::{Actor, SOLIDER};
    use crate::game::weapon::{PISTOL, WEAPON_TYPES};
    use crate::world::block::{MARKER_TEAM_START_BLUE, MARKER_TEAM_START_RED};
    use crate::world::level::Level;
    use crate::world::schema::{MapLayout, MapType};

    fn skirmish_world() -> World {
        World::new(Level::new(MapLayout::skirmish(MapType::Dirt)).unwrap(), 5)
    }

    fn manager() -> BotManager {
        BotManager::new(DeterministicRng::new(77), WEAPON_TYPES.to_vec())
    }

    #[test]
    fn test_team_and_total_limits() {
        let mut world = skirmish_world();
        let mut bots = manager();

        for _ in 0..MAX_BOTS_PER_TEAM {
            bots.add_bot(&mut world, Team::Red, Difficulty::Novice, None, None).unwrap();
        }
        assert_eq!(
            bots.add_bot(&mut world, Team::Red, Difficulty::Novice, None, None),
            Err(BotError::TeamFull(Team::Red))
        );

        for _ in 0..MAX_BOTS_PER_TEAM {
            bots.add_bot(&mut world, Team::Blue, Difficulty::Novice, None, None).unwrap();
        }
        assert_eq!(
            bots.add_bot(&mut world, Team::Blue, Difficulty::Novice, None, None),
            Err(BotError::TooManyBots(MAX_BOTS))
        );
        assert_eq!(world.actors().len(), MAX_BOTS);
    }

    #[test]
    fn test_sniper_loadout() {
        let mut world = skirmish_world();
        let mut bots = manager();
        let id = bots
            .add_bot(&mut world, Team::Blue, Difficulty::Elite, Some(Personality::Sniper), None)
            .unwrap();

        let bot = bots.bot(&id).unwrap();
        assert!(bot.spawned);
        assert_eq!(bot.actor_type.id, "sniper");
        assert!(["sniper", "m4"].contains(&bot.weapon.id));
        assert_eq!(bot.name, "Hawk");
        assert_eq!(world.actor(&id).unwrap().team, Team::Blue);

        let info = BotInfo::from(bot);
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["isBot"], true);
        assert_eq!(json["actorType"], "sniper");
    }

    #[test]
    fn test_weapon_must_be_available() {
        let mut world = skirmish_world();
        let mut bots = BotManager::new(DeterministicRng::new(1), vec![&PISTOL]);

        assert_eq!(
            bots.add_bot(&mut world, Team::Red, Difficulty::Novice, None, Some("m4")),
            Err(BotError::UnknownWeapon("m4".into()))
        );
        assert!(bots.add_bot(&mut world, Team::Red, Difficulty::Novice, None, Some("laser")).is_err());

        // Preferences filtered out entirely: falls back to the first available weapon.
        let id = bots
            .add_bot(&mut world, Team::Red, Difficulty::Novice, Some(Personality::Aggressive), None)
            .unwrap();
        assert_eq!(bots.bot(&id).unwrap().weapon.id, "pistol");
    }

    #[test]
    fn test_spawn_failure_keeps_bot_pending() {
        let mut layout = MapLayout::empty(MapType::Dirt);
        layout.place(2, 2, MARKER_TEAM_START_RED);
        let mut world = World::new(Level::new(layout).unwrap(), 1);
        let mut bots = manager();

        let id = bots.add_bot(&mut world, Team::Blue, Difficulty::Novice, None, None).unwrap();
        assert!(!bots.bot(&id).unwrap().spawned);
        assert!(world.actor(&id).is_none());
        assert!(bots.spawn_pending(&mut world).is_empty());
        assert_eq!(bots.spawn_bot(&mut world, &id), Err(BotError::NoSpawnPoint(Team::Blue)));

        let mut layout = MapLayout::empty(MapType::Dirt);
        layout.place(2, 2, MARKER_TEAM_START_RED);
        layout.place(9, 9, MARKER_TEAM_START_BLUE);
        *world.level_mut() = Level::new(layout).unwrap();
        assert_eq!(bots.spawn_pending(&mut world), vec![id]);
        assert!(bots.bot(&id).unwrap().spawned);
    }

    #[test]
    fn test_remove_and_disable() {
        let mut world = skirmish_world();
        let mut bots = manager();
        bots.enable();
        let a = bots.add_bot(&mut world, Team::Red, Difficulty::Expert, None, None).unwrap();
        let b = bots.add_bot(&mut world, Team::Blue, Difficulty::Expert, None, None).unwrap();

        assert!(bots.remove_bot(&mut world, &a));
        assert!(!bots.remove_bot(&mut world, &a));
        assert!(world.actor(&a).is_none());

        assert_eq!(bots.disable(&mut world), vec![b]);
        assert!(!bots.is_enabled());
        assert!(bots.bots().is_empty());
        assert!(world.actors().is_empty());
    }

    #[test]
    fn test_update_drives_controllers() {
        let mut world = skirmish_world();
        let mut bots = manager();
        bots.enable();
        let id = bots
            .add_bot(&mut world, Team::Red, Difficulty::Elite, Some(Personality::Aggressive), None)
            .unwrap();

        let mut enemy = Actor::new(&SOLIDER, &PISTOL, Team::Blue);
        enemy.position = world.actor(&id).unwrap().position + FixedVec2::from_ints(120, 0);
        let enemy_id = ActorId(Uuid::from_u128(42));
        world.insert_actor(enemy_id, enemy);

        bots.update(&mut world, 100);
        assert_eq!(bots.bot(&id).unwrap().controller.state(), crate::bot::controller::BotState::Engage);
        assert_eq!(bots.bot(&id).unwrap().controller.target(), Some(enemy_id));

        bots.disable(&mut world);
        bots.update(&mut world, 10_000);
        assert!(world.actor(&id).is_none());
        assert_eq!(bots.performance(&world).total_updates, 1);
    }

    #[test]
    fn test_kill_feedback_and_stats() {
        let mut world = skirmish_world();
        let mut bots = manager();
        let a = bots.add_bot(&mut world, Team::Red, Difficulty::Novice, Some(Personality::Tactical), None).unwrap();
        let b = bots.add_bot(&mut world, Team::Blue, Difficulty::Elite, Some(Personality::Sniper), None).unwrap();

        bots.on_damage(&a, 6);
        bots.on_kill(&b, Some(&a), 500);
        assert_eq!(bots.bot_performance(&a).unwrap().kill_count, 1);
        assert_eq!(bots.bot_performance(&a).unwrap().damage_dealt, 6);
        assert_eq!(bots.bot_performance(&b).unwrap().death_count, 1);

        let stats = bots.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_team[&Team::Red], 1);
        assert_eq!(stats.by_difficulty[&Difficulty::Elite], 1);
        assert_eq!(stats.by_personality[&Personality::Tactical], 1);

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["byTeam"]["blue"], 1);

        let perf = bots.performance(&world);
        assert_eq!(perf.total_bots, 2);
        assert_eq!(perf.active_bots, 2);
    }

    #[test]
    fn test_balance_moves_one_bot() {
        let mut world = skirmish_world();
        let mut bots = manager();
        for _ in 0..3 {
            bots.add_bot(&mut world, Team::Red, Difficulty::Novice, None, None).unwrap();
        }

        let (removed, added) = bots.balance_teams(&mut world).unwrap();
        assert!(bots.bot(&removed).is_none());
        assert_eq!(bots.bot(&added).unwrap().team, Team::Blue);
        assert_eq!(bots.stats().by_team[&Team::Red], 2);
        assert!(bots.balance_teams(&mut world).is_none());
    }

    #[test]
    fn test_adjust_difficulty_only_moves_up() {
        let mut world = skirmish_world();
        let mut bots = manager();
        let novice = bots.add_bot(&mut world, Team::Red, Difficulty::Novice, None, None).unwrap();
        let elite = bots.add_bot(&mut world, Team::Blue, Difficulty::Elite, None, None).unwrap();

        let mut upgrades = Vec::new();
        for _ in 0..200 {
            upgrades.extend(bots.adjust_difficulty());
        }
        assert!(upgrades.iter().all(|(id, _)| *id == novice));
        assert_eq!(bots.bot(&novice).unwrap().difficulty, Difficulty::Elite);
        assert_eq!(bots.bot(&elite).unwrap().difficulty, Difficulty::Elite);
        assert_eq!(
            bots.bot(&novice).unwrap().controller.update_interval(),
            Difficulty::Elite.preset().update_interval_ms
        );
    }
}
