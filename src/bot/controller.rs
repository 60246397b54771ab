//! Bot Controller
//!
//! Per-bot AI: a four state machine (`idle`, `patrol`, `engage`, `search`)
//! that reads the world and writes a `Controller`, exactly the intents a
//! human client would send.
//!
//! All timing is game time in milliseconds and all randomness comes from the
//! caller's `DeterministicRng`, so bot behaviour replays with the match.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use serde::{Serialize, Deserialize};

use crate::core::fixed::{
    fixed_div, fixed_mul, fixed_sin, from_int, normalize_angle, to_float, to_fixed, Fixed,
    FIXED_ONE, FIXED_PI, FIXED_QUARTER_PI, FIXED_THREE_QUARTER_PI,
};
use crate::core::rng::DeterministicRng;
use crate::core::vec2::FixedVec2;
use crate::game::actor::{Actor, ActorId};
use crate::game::controller::{Controller, Direction};

use super::profile::{Difficulty, DifficultyPreset, Personality, TEAMWORK};

/// Enemies further than this are invisible.
pub const VISION_RANGE: Fixed = to_fixed(300.0);

const PATROL_HALF_RANGE: Fixed = to_fixed(100.0);
const PATROL_REACHED: Fixed = to_fixed(20.0);
const SEARCH_REACHED: Fixed = to_fixed(30.0);
const SEARCH_TIMEOUT_MS: u64 = 5000;
const MIN_MOVE_DISTANCE: Fixed = to_fixed(5.0);

const TEAMMATE_RANGE: Fixed = to_fixed(200.0);
const ENGAGED_RANGE: Fixed = to_fixed(250.0);
const COVER_DISTANCE: Fixed = to_fixed(150.0);

const ACCURACY_HISTORY: usize = 20;

const ENGAGE_COOLDOWN_MS: u64 = 500;
const SEARCH_COOLDOWN_MS: u64 = 1000;
const ROUTINE_COOLDOWN_MS: u64 = 200;

/// AI state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotState {
    #[default]
    Idle,
    Patrol,
    Engage,
    Search,
}

impl BotState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Patrol => "patrol",
            Self::Engage => "engage",
            Self::Search => "search",
        }
    }

    /// Minimum time before the next transition once this state is entered.
    fn transition_cooldown(self) -> u64 {
        match self {
            Self::Engage => ENGAGE_COOLDOWN_MS,
            Self::Search => SEARCH_COOLDOWN_MS,
            Self::Idle | Self::Patrol => ROUTINE_COOLDOWN_MS,
        }
    }
}

impl fmt::Display for BotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Telemetry of one bot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotPerformance {
    pub kill_count: u32,
    pub death_count: u32,
    pub damage_dealt: i32,
    /// Share of sampled shots that would have hit. Statistics only.
    pub current_accuracy: f32,
    pub state: BotState,
    pub personality: Personality,
    pub difficulty: Difficulty,
}

/// Everything one update reads and writes.
struct Frame<'a> {
    actor: &'a Actor,
    actors: &'a BTreeMap<ActorId, Actor>,
    me: ActorId,
    now: u64,
    controller: Controller,
}

impl Frame<'_> {
    fn distance_to(&self, point: FixedVec2) -> Fixed {
        self.actor.position.distance(point)
    }

    fn can_see(&self, other: &Actor) -> bool {
        !other.is_dead && self.distance_to(other.position) < VISION_RANGE
    }
}

/// AI state of one bot.
#[derive(Clone, Debug)]
pub struct BotController {
    pub personality: Personality,
    state: BotState,
    target: Option<ActorId>,
    last_update: u64,
    update_interval: u64,
    reaction_ms: u64,
    accuracy: Fixed,
    aggression: Fixed,
    teamwork: Fixed,

    patrol_target: Option<FixedVec2>,
    engage_start: u64,
    last_known_position: Option<FixedVec2>,
    search_timer: u64,

    transition_cooldown: u64,
    last_state_change: u64,

    kills: u32,
    deaths: u32,
    damage_dealt: i32,
    accuracy_history: VecDeque<bool>,
}

impl BotController {
    pub fn new(personality: Personality, preset: DifficultyPreset) -> Self {
        Self {
            personality,
            state: BotState::Idle,
            target: None,
            last_update: 0,
            update_interval: preset.update_interval_ms,
            reaction_ms: preset.reaction_ms,
            accuracy: preset.accuracy,
            aggression: preset.aggression,
            teamwork: TEAMWORK,
            patrol_target: None,
            engage_start: 0,
            last_known_position: None,
            search_timer: 0,
            transition_cooldown: 0,
            last_state_change: 0,
            kills: 0,
            deaths: 0,
            damage_dealt: 0,
            accuracy_history: VecDeque::with_capacity(ACCURACY_HISTORY),
        }
    }

    /// Swap in the tuning of another difficulty.
    pub fn apply_preset(&mut self, preset: DifficultyPreset) {
        self.update_interval = preset.update_interval_ms;
        self.reaction_ms = preset.reaction_ms;
        self.accuracy = preset.accuracy;
        self.aggression = preset.aggression;
    }

    pub fn state(&self) -> BotState {
        self.state
    }

    pub fn target(&self) -> Option<ActorId> {
        self.target
    }

    pub fn accuracy(&self) -> Fixed {
        self.accuracy
    }

    pub fn aggression(&self) -> Fixed {
        self.aggression
    }

    pub fn update_interval(&self) -> u64 {
        self.update_interval
    }

    /// Should the bot think this tick. Engaged bots think every tick.
    pub fn is_due(&self, now: u64) -> bool {
        self.state == BotState::Engage || now.saturating_sub(self.last_update) >= self.update_interval
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Run one AI update for the bot's actor `me`.
    ///
    /// Returns the new intents, or `None` when the actor is missing or dead.
    pub fn update(
        &mut self,
        me: ActorId,
        actors: &BTreeMap<ActorId, Actor>,
        now: u64,
        rng: &mut DeterministicRng,
    ) -> Option<Controller> {
        let actor = actors.get(&me)?;
        if actor.is_dead {
            return None;
        }
        self.last_update = now;

        let mut frame = Frame {
            actor,
            actors,
            me,
            now,
            controller: actor.controller,
        };

        match self.state {
            BotState::Idle => self.update_idle(&mut frame, rng),
            BotState::Patrol => self.update_patrol(&mut frame, rng),
            BotState::Engage => self.update_engage(&mut frame, rng),
            BotState::Search => self.update_search(&mut frame, rng),
        }

        Some(frame.controller)
    }

    fn update_idle(&mut self, frame: &mut Frame<'_>, rng: &mut DeterministicRng) {
        if let Some((id, position)) = self.find_nearest_enemy(frame, rng) {
            self.engage_target(id, position, frame);
            return;
        }
        self.transition(BotState::Patrol, frame);
    }

    fn update_patrol(&mut self, frame: &mut Frame<'_>, rng: &mut DeterministicRng) {
        if let Some((id, position)) = self.find_nearest_enemy(frame, rng) {
            self.engage_target(id, position, frame);
            return;
        }

        let waypoint = match self.patrol_target {
            Some(waypoint) => waypoint,
            None => self.pick_patrol_target(frame, rng),
        };
        move_towards(frame, waypoint, true);

        if frame.distance_to(waypoint) < PATROL_REACHED {
            self.pick_patrol_target(frame, rng);
        }
    }

    fn update_engage(&mut self, frame: &mut Frame<'_>, rng: &mut DeterministicRng) {
        let actors = frame.actors;
        let target = self
            .target
            .and_then(|id| actors.get(&id))
            .filter(|target| frame.can_see(target));
        let Some(target) = target else {
            self.transition(BotState::Search, frame);
            return;
        };

        self.last_known_position = Some(target.position);

        self.aim_at(target, frame, rng);
        self.fire_at(target, frame, rng);

        let weapon = &frame.actor.weapon;
        if weapon.ammo <= 0 && !weapon.is_reloading() {
            frame.controller.is_reloading = true;
            frame.controller.is_firing = false;
        }

        self.tactical_movement(target, frame, rng);
    }

    fn update_search(&mut self, frame: &mut Frame<'_>, rng: &mut DeterministicRng) {
        self.search_timer += self.update_interval;

        if let Some((id, position)) = self.find_nearest_enemy(frame, rng) {
            self.engage_target(id, position, frame);
            return;
        }

        if let Some(position) = self.last_known_position {
            move_towards(frame, position, true);
            // Nothing at the last sighting: give up. The position is kept
            // while the search cooldown holds the transition back.
            if frame.distance_to(position) < SEARCH_REACHED && self.transition(BotState::Patrol, frame) {
                self.last_known_position = None;
                return;
            }
        }

        if self.search_timer > SEARCH_TIMEOUT_MS {
            self.transition(BotState::Patrol, frame);
        }
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Change state unless the last change is still cooling down.
    fn set_state(&mut self, state: BotState, now: u64) -> bool {
        if now.saturating_sub(self.last_state_change) < self.transition_cooldown {
            return false;
        }
        self.state = state;
        self.search_timer = 0;
        self.last_state_change = now;
        self.transition_cooldown = state.transition_cooldown();
        true
    }

    fn transition(&mut self, state: BotState, frame: &mut Frame<'_>) -> bool {
        let changed = self.set_state(state, frame.now);
        if changed {
            frame.controller.clear_movement();
        }
        changed
    }

    /// Switch to engage on `target`. The target is only taken when the
    /// switch happens.
    fn engage_target(&mut self, target: ActorId, position: FixedVec2, frame: &mut Frame<'_>) -> bool {
        if !self.transition(BotState::Engage, frame) {
            return false;
        }
        self.target = Some(target);
        self.last_known_position = Some(position);
        self.engage_start = frame.now;
        true
    }

    // =========================================================================
    // Targeting
    // =========================================================================

    /// Best visible enemy by priority over distance.
    ///
    /// With coordination, enemies already near several of our teammates get
    /// a lower priority. Ties keep the first enemy in id order.
    fn find_nearest_enemy(&self, frame: &Frame<'_>, rng: &mut DeterministicRng) -> Option<(ActorId, FixedVec2)> {
        let mut best: Option<(Fixed, ActorId, FixedVec2)> = None;

        for (id, other) in frame.actors {
            if *id == frame.me || other.is_dead || other.team == frame.actor.team {
                continue;
            }
            if !frame.can_see(other) {
                continue;
            }

            let distance = frame.distance_to(other.position).max(FIXED_ONE);
            let priority = if self.should_coordinate(rng) {
                team_target_priority(frame, other.position)
            } else {
                1
            };
            let score = fixed_div(from_int(priority * 100), distance);

            if best.map_or(true, |(top, _, _)| score > top) {
                best = Some((score, *id, other.position));
            }
        }

        best.map(|(_, id, position)| (id, position))
    }

    fn should_coordinate(&self, rng: &mut DeterministicRng) -> bool {
        self.teamwork > FIXED_ONE / 2 && rng.next_bool(self.teamwork)
    }

    /// Point the aim at a target, with lead and accuracy-scaled noise.
    fn aim_at(&self, target: &Actor, frame: &mut Frame<'_>, rng: &mut DeterministicRng) {
        let mut aim = target.position;

        if self.accuracy > to_fixed(0.7) && target.controller.is_moving() {
            let speed = target.kind.walk_speed;
            let velocity = target
                .controller
                .directions()
                .map(|d| FixedVec2::from_angle(target.rotation + d.relative_angle(), speed).negate())
                .fold(FixedVec2::ZERO, |acc, v| acc + v);
            aim = aim + velocity.scale(to_fixed(0.1));
        }

        let distance = frame.distance_to(target.position);
        let base = fixed_mul(FIXED_ONE - self.accuracy, from_int(40));
        let range = ((distance - from_int(100)) / 10).max(0);
        let spread = base + range;

        let offset = FixedVec2::new(rng.next_centered(spread / 2), rng.next_centered(spread / 2));
        frame.controller.set_facing(aim + offset);
    }

    /// Hold the trigger once the reaction delay has passed.
    ///
    /// Each trigger pull samples a would-hit value into the accuracy history.
    /// The sample never changes where projectiles go.
    fn fire_at(&mut self, target: &Actor, frame: &mut Frame<'_>, rng: &mut DeterministicRng) {
        if frame.now.saturating_sub(self.engage_start) < self.reaction_ms {
            return;
        }

        let pulled = !frame.controller.is_firing;
        frame.controller.is_firing = true;

        if pulled {
            let distance = frame.distance_to(target.position);
            let expected = (self.accuracy - distance / 1000).max(to_fixed(0.1));
            self.accuracy_history.push_back(rng.next_bool(expected));
            if self.accuracy_history.len() > ACCURACY_HISTORY {
                self.accuracy_history.pop_front();
            }
        }
    }

    fn tactical_movement(&mut self, target: &Actor, frame: &mut Frame<'_>, rng: &mut DeterministicRng) {
        let distance = frame.distance_to(target.position);
        let hurt = frame.actor.health * 10 < frame.actor.max_health() * 3;
        let personality = if hurt { Personality::Defensive } else { self.personality };

        match personality {
            Personality::Aggressive => {
                if distance > to_fixed(80.0) {
                    move_towards(frame, target.position, false);
                } else {
                    strafe(frame);
                }
            }
            Personality::Defensive => {
                if distance < to_fixed(200.0) {
                    match find_cover(frame, target.position) {
                        Some(cover) => move_towards(frame, cover, false),
                        None => move_away(frame, target.position),
                    }
                } else {
                    strafe(frame);
                }
            }
            Personality::Sniper => {
                if distance < to_fixed(250.0) {
                    move_away(frame, target.position);
                } else if distance > to_fixed(400.0) {
                    move_towards(frame, target.position, false);
                } else {
                    frame.controller.clear_directions();
                }
            }
            Personality::Tactical => {
                if distance > to_fixed(220.0) {
                    move_towards(frame, target.position, false);
                } else if distance < to_fixed(120.0) {
                    move_away(frame, target.position);
                } else if rng.next_bool(to_fixed(0.3)) {
                    strafe(frame);
                }
            }
        }
    }

    fn pick_patrol_target(&mut self, frame: &Frame<'_>, rng: &mut DeterministicRng) -> FixedVec2 {
        let offset = FixedVec2::new(
            rng.next_centered(PATROL_HALF_RANGE),
            rng.next_centered(PATROL_HALF_RANGE),
        );
        let waypoint = frame.actor.position + offset;
        self.patrol_target = Some(waypoint);
        waypoint
    }

    // =========================================================================
    // Telemetry
    // =========================================================================

    pub fn on_kill(&mut self) {
        self.kills += 1;
    }

    /// The bot's actor died: forget the target and go idle.
    pub fn on_death(&mut self, now: u64) {
        self.deaths += 1;
        self.set_state(BotState::Idle, now);
        self.target = None;
        self.last_known_position = None;
    }

    pub fn on_damage_dealt(&mut self, amount: i32) {
        self.damage_dealt += amount;
    }

    /// Share of sampled shots that would have hit.
    pub fn sampled_accuracy(&self) -> Fixed {
        if self.accuracy_history.is_empty() {
            return 0;
        }
        let hits = self.accuracy_history.iter().filter(|&&hit| hit).count() as i32;
        fixed_div(from_int(hits), from_int(self.accuracy_history.len() as i32))
    }

    pub fn performance(&self) -> BotPerformance {
        BotPerformance {
            kill_count: self.kills,
            death_count: self.deaths,
            damage_dealt: self.damage_dealt,
            current_accuracy: to_float(self.sampled_accuracy()),
            state: self.state,
            personality: self.personality,
            difficulty: Difficulty::from_accuracy(self.accuracy),
        }
    }

    /// Nudge aggression toward how well the bot has been shooting.
    pub fn adapt(&mut self) {
        let accuracy = self.sampled_accuracy();

        if accuracy < to_fixed(0.3) && self.aggression > to_fixed(0.3) {
            self.aggression = (self.aggression - to_fixed(0.1)).max(to_fixed(0.1));
        }
        if accuracy > to_fixed(0.8) && self.aggression < to_fixed(0.9) {
            self.aggression = (self.aggression + to_fixed(0.05)).min(FIXED_ONE);
        }
    }
}

// =============================================================================
// MOVEMENT
// =============================================================================

/// 3 for an unengaged target, down to 1 once teammates crowd it.
///
/// Only living teammates within `TEAMMATE_RANGE` of the bot count.
fn team_target_priority(frame: &Frame<'_>, target: FixedVec2) -> i32 {
    let engaging = frame
        .actors
        .iter()
        .filter(|(id, mate)| {
            **id != frame.me
                && mate.team == frame.actor.team
                && !mate.is_dead
                && frame.distance_to(mate.position) < TEAMMATE_RANGE
                && mate.position.distance(target) < ENGAGED_RANGE
        })
        .count() as i32;
    (3 - engaging).max(1)
}

/// The furthest of eight points around the bot that is further from the
/// threat than the bot is now.
fn find_cover(frame: &Frame<'_>, threat: FixedVec2) -> Option<FixedVec2> {
    let current = frame.distance_to(threat);
    let mut best: Option<(Fixed, FixedVec2)> = None;

    for step in 0..8 {
        let angle = FIXED_QUARTER_PI * step;
        let candidate = frame.actor.position + FixedVec2::from_angle(angle, COVER_DISTANCE);
        let distance = candidate.distance(threat);
        if distance > current && best.map_or(true, |(top, _)| distance > top) {
            best = Some((distance, candidate));
        }
    }

    best.map(|(_, point)| point)
}

/// Pick the direction intent whose travel direction is closest to `angle`.
///
/// Forward travels along `rotation + π` (toward the aim point), right a
/// quarter turn clockwise of that, left counter-clockwise.
fn steer(frame: &mut Frame<'_>, angle: Fixed) {
    let heading = frame.actor.rotation + FIXED_PI;
    let diff = normalize_angle(angle - heading);

    let direction = if diff.abs() < FIXED_QUARTER_PI {
        Direction::Forward
    } else if diff.abs() > FIXED_THREE_QUARTER_PI {
        Direction::Back
    } else if diff > 0 {
        Direction::Right
    } else {
        Direction::Left
    };
    frame.controller.set_direction(direction);
}

/// Head for a point, optionally turning the aim toward it.
fn move_towards(frame: &mut Frame<'_>, goal: FixedVec2, face: bool) {
    let delta = goal - frame.actor.position;
    if delta.length() > MIN_MOVE_DISTANCE {
        steer(frame, delta.angle());
        if face {
            frame.controller.set_facing(goal);
        }
    }
}

/// Back off from a point while keeping the aim where it is.
fn move_away(frame: &mut Frame<'_>, threat: FixedVec2) {
    let delta = frame.actor.position - threat;
    if delta != FixedVec2::ZERO {
        steer(frame, delta.angle());
    }
}

/// Side-step, switching sides every half period of `sin(2t)`.
fn strafe(frame: &mut Frame<'_>) {
    // 2t in radians, folded into one period (2π s = 6283 ms).
    let phase_ms = (frame.now * 2) % 6283;
    let angle = ((phase_ms as i64 * FIXED_ONE as i64) / 1000) as Fixed;
    let direction = if fixed_sin(angle) > 0 { Direction::Right } else { Direction::Left };
    frame.controller.set_direction(direction);
}

// =============================================================================
// TESTS
// =============================================================================
