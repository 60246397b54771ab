//! Match Session
//!
//! The single owner of a running match: world, round state machine, tick
//! scheduler, bots and the connection table. Every method runs to
//! completion on the match task, so no game state is shared or locked.
//!
//! Outgoing messages go through one broadcast channel of `Envelope`s. An
//! envelope is either for everyone or for one connection; connection tasks
//! drop envelopes addressed to someone else. One channel keeps replies and
//! broadcasts in the order they were produced.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::bot::manager::{BotError, BotManager};
use crate::config::{ConfigError, LevelParams, ServerConfig};
use crate::core::fixed::to_float;
use crate::core::rng::{derive_round_seed, derive_stream};
use crate::game::actor::{ActorId, Team, SOLIDER};
use crate::game::controller::Controller;
use crate::game::events::GameEventData;
use crate::game::session::{GameSession, SessionPhase, SessionTransition};
use crate::game::tick::{TickOutcome, TickScheduler};
use crate::game::weapon::{weapon_type, WeaponType};
use crate::game::world::{TickResult, World};
use crate::world::level::Level;
use crate::world::schema::{MapError, MapLayout};

use super::protocol::{
    AddBotRequest, BotStatsReport, ClientMessage, PlayerInfo, RegisterRequest, ScoreInfo,
    ServerMessage, SpawnInfo,
};
use super::sync;

/// Transport connection identifier, assigned by the server.
pub type ConnectionId = u64;

/// Errors building a match.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid map: {0}")]
    Map(#[from] MapError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Refused registration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegisterError {
    #[error("player name is empty")]
    EmptyName,

    #[error("unknown team: {0}")]
    UnknownTeam(String),

    #[error("weapon not available: {0}")]
    UnknownWeapon(String),

    #[error("server full ({0} players)")]
    ServerFull(usize),

    #[error("connection already registered as {0}")]
    AlreadyRegistered(ActorId),

    #[error("unknown connection {0}")]
    UnknownConnection(ConnectionId),
}

/// An outgoing message and its recipient.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// `None` for every connection.
    pub to: Option<ConnectionId>,
    pub message: Arc<ServerMessage>,
}

impl Envelope {
    pub fn all(message: ServerMessage) -> Self {
        Self { to: None, message: Arc::new(message) }
    }

    pub fn to(connection: ConnectionId, message: ServerMessage) -> Self {
        Self { to: Some(connection), message: Arc::new(message) }
    }

    pub fn is_for(&self, connection: ConnectionId) -> bool {
        self.to.map_or(true, |to| to == connection)
    }
}

/// A registered human player.
#[derive(Debug, Clone)]
struct Player {
    name: String,
    team: Team,
    weapon: &'static WeaponType,
    connection: ConnectionId,
    last_control_ms: Option<u64>,
}

/// One running match.
pub struct MatchSession {
    params: LevelParams,
    control_debounce_ms: u64,
    world: World,
    game: GameSession,
    scheduler: TickScheduler,
    bots: BotManager,
    connections: BTreeMap<ConnectionId, Option<ActorId>>,
    players: BTreeMap<ActorId, Player>,
    outbox: broadcast::Sender<Envelope>,
    round: u32,
}

impl MatchSession {
    /// Build a match on a layout. The scheduler starts stopped.
    pub fn new(
        config: &ServerConfig,
        layout: MapLayout,
        seed: u64,
        outbox: broadcast::Sender<Envelope>,
    ) -> Result<Self, SessionError> {
        config.level.validate()?;
        let level = Level::new(layout)?;
        let world = World::new(level, derive_round_seed(seed, 0));

        let mut bots = BotManager::new(derive_stream(seed, b"bots"), config.level.available_weapons());
        if config.bots_enabled {
            bots.enable();
        }

        let mut scheduler = TickScheduler::new();
        let tick_outbox = outbox.clone();
        scheduler.on_tick(move |world: &mut World, _result: &TickResult| {
            let delta = sync::tick_update(world);
            let _ = tick_outbox.send(Envelope::all(ServerMessage::TickUpdate(delta)));
        });

        info!(seed, width = world.level().width(), height = world.level().height(), "match created");

        Ok(Self {
            params: config.level.clone(),
            control_debounce_ms: config.control_debounce_ms,
            world,
            game: GameSession::new(),
            scheduler,
            bots,
            connections: BTreeMap::new(),
            players: BTreeMap::new(),
            outbox,
            round: 0,
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn game(&self) -> &GameSession {
        &self.game
    }

    pub fn bots(&self) -> &BotManager {
        &self.bots
    }

    pub fn scheduler(&self) -> &TickScheduler {
        &self.scheduler
    }

    pub fn params(&self) -> &LevelParams {
        &self.params
    }

    /// Completed rounds.
    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Actor of a connection, once registered.
    pub fn player_of(&self, connection: ConnectionId) -> Option<ActorId> {
        self.connections.get(&connection).copied().flatten()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.outbox.subscribe()
    }

    fn broadcast(&self, message: ServerMessage) {
        let _ = self.outbox.send(Envelope::all(message));
    }

    fn reply(&self, connection: ConnectionId, message: ServerMessage) {
        let _ = self.outbox.send(Envelope::to(connection, message));
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Start ticking.
    pub fn start(&mut self) {
        if self.scheduler.start() {
            info!(round = self.round, "match ticking");
        }
    }

    /// Stop ticking and polling.
    pub fn stop(&mut self) {
        self.scheduler.stop();
        self.game.stop();
    }

    /// Run the bots, then one world tick.
    pub fn tick(&mut self) -> TickOutcome {
        if self.scheduler.is_running() {
            let now = self.world.game_time_ms();
            self.bots.update(&mut self.world, now);
        }

        let outcome = self.scheduler.try_tick(&mut self.world);
        if let TickOutcome::Completed(result) = &outcome {
            self.apply_events(result);
        }
        outcome
    }

    fn apply_events(&mut self, result: &TickResult) {
        let now = self.world.game_time_ms();
        for event in &result.events {
            match &event.data {
                GameEventData::ActorKilled { target, killer, .. } => {
                    self.game.handle_kill(target, killer.as_ref());
                    self.bots.on_kill(target, killer.as_ref(), now);
                }
                GameEventData::ActorDamaged { attacker: Some(attacker), damage, .. } => {
                    self.bots.on_damage(attacker, *damage);
                }
                _ => {}
            }
        }
    }

    /// One poll of the round state machine.
    ///
    /// Finishing stops the tick scheduler until `restart`.
    pub fn poll_session(&mut self) -> Option<SessionTransition> {
        let transition = self.game.poll()?;
        match transition {
            SessionTransition::Started => {
                self.broadcast(ServerMessage::GameSessionState(SessionPhase::Play));
            }
            SessionTransition::Finished { win_team } => {
                self.scheduler.stop();
                info!(
                    round = self.round,
                    %win_team,
                    ticks = self.world.tick_count(),
                    state_hash = %hex::encode(self.world.compute_hash()),
                    "round finished"
                );
                self.broadcast(ServerMessage::GameSessionState(SessionPhase::Finish));
                self.broadcast(ServerMessage::SessionScore(ScoreInfo {
                    win_team,
                    scores: self.game.scores().clone(),
                }));
            }
        }
        Some(transition)
    }

    /// Rebuild the level, re-spawn everyone and open a new lobby.
    pub fn restart(&mut self) -> Result<(), MapError> {
        self.world.reset_level()?;
        self.round += 1;

        for (id, difficulty) in self.bots.adjust_difficulty() {
            debug!(bot = %id, difficulty = %difficulty, "bot difficulty raised");
        }
        if let Some((removed, added)) = self.bots.balance_teams(&mut self.world) {
            self.game.remove_player(&removed, true);
            self.broadcast(ServerMessage::PlayerDisconnected { id: removed });
            self.announce_bot(added);
        }

        let humans: Vec<(ActorId, Team, &'static WeaponType)> =
            self.players.iter().map(|(&id, p)| (id, p.team, p.weapon)).collect();
        for (id, team, weapon) in humans {
            let spawned = match self.world.respawn_actor(&id) {
                Some(position) => Some(position),
                None => self.world.spawn_actor(id, &SOLIDER, weapon, team),
            };
            if spawned.is_none() {
                warn!(player = %id, team = %team, "no spawn point on restart");
            }
        }

        let bots: Vec<(ActorId, bool)> = self.bots.bots().iter().map(|b| (b.id, b.spawned)).collect();
        for (id, spawned) in bots {
            if spawned {
                self.world.respawn_actor(&id);
            } else if let Err(e) = self.bots.spawn_bot(&mut self.world, &id) {
                warn!(bot = %id, error = %e, "bot spawn failed");
            }
        }

        self.game = self.game.next_round();
        let alive: Vec<(ActorId, Team)> = self
            .world
            .actors()
            .iter()
            .filter(|(id, _)| !self.game.is_registered(id))
            .map(|(&id, actor)| (id, actor.team))
            .collect();
        for (id, team) in alive {
            self.game.register_player(id, team);
        }

        self.scheduler.start();
        info!(round = self.round, "match restarted");

        self.broadcast(ServerMessage::LevelState(Box::new(sync::level_state(&self.world, &self.params))));
        self.broadcast(ServerMessage::GameSessionState(SessionPhase::Lobby));
        Ok(())
    }

    // =========================================================================
    // Connections
    // =========================================================================

    pub fn connect(&mut self, connection: ConnectionId) {
        self.connections.insert(connection, None);
        debug!(connection, "connection attached");
    }

    /// Drop a connection and its player. Returns the removed player.
    pub fn disconnect(&mut self, connection: ConnectionId) -> Option<ActorId> {
        let id = self.connections.remove(&connection).flatten()?;
        let player = self.players.remove(&id)?;

        let was_dead = self.world.actor(&id).map_or(true, |a| a.is_dead);
        self.game.remove_player(&id, was_dead);
        self.world.remove_actor(&id);

        info!(player = %id, name = %player.name, connection, "player left");
        self.broadcast(ServerMessage::PlayerDisconnected { id });
        Some(id)
    }

    /// Dispatch one decoded client message.
    pub fn handle_message(&mut self, connection: ConnectionId, message: ClientMessage, now_ms: u64) {
        match message {
            ClientMessage::GetLevelState => self.send_level_state(connection),
            ClientMessage::RegisterPlayer(request) => {
                if let Err(e) = self.register_player(connection, request) {
                    warn!(connection, error = %e, "registration refused");
                }
            }
            ClientMessage::UpdateActorController(controller) => {
                self.apply_controller(connection, controller, now_ms);
            }
            ClientMessage::AddBot(request) => {
                if let Err(e) = self.add_bot(request) {
                    warn!(connection, error = %e, "bot refused");
                    self.reply(connection, ServerMessage::BotError { message: e.to_string() });
                }
            }
            ClientMessage::RemoveBot { id } => {
                if !self.remove_bot(&id) {
                    self.reply(connection, ServerMessage::BotError { message: BotError::UnknownBot(id).to_string() });
                }
            }
            ClientMessage::GetBotStats => {
                let report = self.bot_stats();
                self.reply(connection, ServerMessage::BotStats(report));
            }
            ClientMessage::ToggleBots { enabled } => self.toggle_bots(enabled),
        }
    }

    /// Snapshot plus one `playerConnected`/`spawnActor` pair per actor, to
    /// the requester only.
    pub fn send_level_state(&self, connection: ConnectionId) {
        self.reply(connection, ServerMessage::LevelState(Box::new(sync::level_state(&self.world, &self.params))));

        for (&id, player) in &self.players {
            self.reply(connection, ServerMessage::PlayerConnected(PlayerInfo {
                id,
                name: Some(player.name.clone()),
                is_bot: None,
            }));
            if let Some(spawn) = self.spawn_message(id) {
                self.reply(connection, spawn);
            }
        }
        for bot in self.bots.bots() {
            self.reply(connection, ServerMessage::PlayerConnected(PlayerInfo {
                id: bot.id,
                name: Some(bot.name.clone()),
                is_bot: Some(true),
            }));
            if let Some(spawn) = self.spawn_message(bot.id) {
                self.reply(connection, spawn);
            }
        }
    }

    fn spawn_message(&self, id: ActorId) -> Option<ServerMessage> {
        let actor = self.world.actor(&id)?;
        Some(ServerMessage::SpawnActor(SpawnInfo {
            id,
            team: actor.team,
            x: to_float(actor.position.x),
            y: to_float(actor.position.y),
            weapon_key: actor.weapon.kind.id.to_string(),
            actor_key: actor.kind.id.to_string(),
            is_bot: self.bots.is_bot(&id).then_some(true),
        }))
    }

    // =========================================================================
    // Players
    // =========================================================================

    /// Validate and register a human player, then spawn their actor.
    pub fn register_player(
        &mut self,
        connection: ConnectionId,
        request: RegisterRequest,
    ) -> Result<ActorId, RegisterError> {
        match self.connections.get(&connection) {
            None => return Err(RegisterError::UnknownConnection(connection)),
            Some(Some(id)) => return Err(RegisterError::AlreadyRegistered(*id)),
            Some(None) => {}
        }

        let name = request.name.trim();
        if name.is_empty() {
            return Err(RegisterError::EmptyName);
        }
        let team = match request.team.trim().to_ascii_lowercase().as_str() {
            "red" => Team::Red,
            "blue" => Team::Blue,
            _ => return Err(RegisterError::UnknownTeam(request.team)),
        };
        let weapon = weapon_type(&request.weapon)
            .filter(|w| self.params.weapons.iter().any(|key| key == w.id))
            .ok_or_else(|| RegisterError::UnknownWeapon(request.weapon.clone()))?;
        if self.players.len() >= self.params.max_players {
            return Err(RegisterError::ServerFull(self.params.max_players));
        }

        let id = ActorId::new_v4();
        self.players.insert(id, Player {
            name: name.to_string(),
            team,
            weapon,
            connection,
            last_control_ms: None,
        });
        self.connections.insert(connection, Some(id));
        info!(player = %id, name, team = %team, weapon = weapon.id, "player registered");

        self.reply(connection, ServerMessage::RegisterSuccess { id });
        self.broadcast(ServerMessage::PlayerConnected(PlayerInfo {
            id,
            name: Some(name.to_string()),
            is_bot: None,
        }));

        match self.world.spawn_actor(id, &SOLIDER, weapon, team) {
            Some(_) => {
                self.game.register_player(id, team);
                if let Some(spawn) = self.spawn_message(id) {
                    self.broadcast(spawn);
                }
            }
            None => warn!(player = %id, team = %team, "no spawn point"),
        }

        Ok(id)
    }

    /// Apply a client's intents, at most once per debounce window.
    pub fn apply_controller(&mut self, connection: ConnectionId, controller: Controller, now_ms: u64) -> bool {
        let Some(id) = self.player_of(connection) else {
            return false;
        };
        let Some(player) = self.players.get_mut(&id) else {
            return false;
        };
        if let Some(last) = player.last_control_ms {
            if now_ms.saturating_sub(last) < self.control_debounce_ms {
                return false;
            }
        }
        player.last_control_ms = Some(now_ms);
        self.world.set_controller(&id, controller)
    }

    /// Connection of a registered player.
    pub fn connection_of(&self, id: &ActorId) -> Option<ConnectionId> {
        self.players.get(id).map(|p| p.connection)
    }

    // =========================================================================
    // Bots
    // =========================================================================

    /// Add a bot, turning the bot manager on if needed.
    pub fn add_bot(&mut self, request: AddBotRequest) -> Result<ActorId, BotError> {
        let id = self.bots.add_bot(
            &mut self.world,
            request.team,
            request.difficulty.unwrap_or_default(),
            request.personality,
            request.weapon.as_deref(),
        )?;
        if !self.bots.is_enabled() {
            self.bots.enable();
            info!("bots enabled by add request");
        }
        self.announce_bot(id);
        Ok(id)
    }

    fn announce_bot(&mut self, id: ActorId) {
        let Some(bot) = self.bots.bot(&id) else {
            return;
        };
        let (name, team, spawned) = (bot.name.clone(), bot.team, bot.spawned);

        self.broadcast(ServerMessage::PlayerConnected(PlayerInfo {
            id,
            name: Some(name),
            is_bot: Some(true),
        }));
        if spawned {
            if !self.game.is_registered(&id) {
                self.game.register_player(id, team);
            }
            if let Some(spawn) = self.spawn_message(id) {
                self.broadcast(spawn);
            }
        }
    }

    pub fn remove_bot(&mut self, id: &ActorId) -> bool {
        let was_dead = self.world.actor(id).map_or(true, |a| a.is_dead);
        if !self.bots.remove_bot(&mut self.world, id) {
            return false;
        }
        self.game.remove_player(id, was_dead);
        self.broadcast(ServerMessage::PlayerDisconnected { id: *id });
        true
    }

    pub fn toggle_bots(&mut self, enabled: bool) {
        if enabled {
            self.bots.enable();
            for id in self.bots.spawn_pending(&mut self.world) {
                if let Some(bot) = self.bots.bot(&id) {
                    let team = bot.team;
                    self.game.register_player(id, team);
                }
                if let Some(spawn) = self.spawn_message(id) {
                    self.broadcast(spawn);
                }
            }
        } else {
            let states: Vec<(ActorId, bool)> = self
                .bots
                .bots()
                .iter()
                .map(|b| (b.id, self.world.actor(&b.id).map_or(true, |a| a.is_dead)))
                .collect();
            self.bots.disable(&mut self.world);
            for (id, was_dead) in states {
                self.game.remove_player(&id, was_dead);
                self.broadcast(ServerMessage::PlayerDisconnected { id });
            }
        }
        info!(enabled, "bots toggled");
        self.broadcast(ServerMessage::BotsToggled { enabled });
    }

    pub fn bot_stats(&self) -> BotStatsReport {
        BotStatsReport {
            stats: self.bots.stats(),
            performance: self.bots.performance(&self.world),
            bots: self.bots.infos(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
