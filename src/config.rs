//! Server configuration.
//!
//! `ServerConfig` holds transport and timer settings read from the
//! environment (with `.env` support); `LevelParams` is the match
//! configuration clients see in the level snapshot.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Serialize, Deserialize};
use tracing::warn;
use uuid::Uuid;

use crate::game::actor::Team;
use crate::game::weapon::{weapon_type, WeaponType, WEAPON_TYPES};
use crate::world::schema::{MapError, MapLayout, MapType};

/// Invalid match configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("max players must be at least 1")]
    NoPlayers,

    #[error("team {0} has an empty name")]
    EmptyTeamName(Team),

    #[error("no weapons available")]
    NoWeapons,

    #[error("unknown weapon: {0}")]
    UnknownWeapon(String),
}

// =============================================================================
// LEVEL PARAMS
// =============================================================================

/// Match configuration shared with clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelParams {
    /// Human players allowed at once. Bots do not count.
    pub max_players: usize,
    pub red_team: String,
    pub blue_team: String,
    /// Weapon keys players and bots may pick.
    pub weapons: Vec<String>,
}

impl Default for LevelParams {
    fn default() -> Self {
        Self {
            max_players: 8,
            red_team: String::from("Red"),
            blue_team: String::from("Blue"),
            weapons: WEAPON_TYPES.iter().map(|w| w.id.to_string()).collect(),
        }
    }
}

impl LevelParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_players == 0 {
            return Err(ConfigError::NoPlayers);
        }
        if self.red_team.trim().is_empty() {
            return Err(ConfigError::EmptyTeamName(Team::Red));
        }
        if self.blue_team.trim().is_empty() {
            return Err(ConfigError::EmptyTeamName(Team::Blue));
        }
        if self.weapons.is_empty() {
            return Err(ConfigError::NoWeapons);
        }
        if let Some(unknown) = self.weapons.iter().find(|w| weapon_type(w).is_none()) {
            return Err(ConfigError::UnknownWeapon(unknown.clone()));
        }
        Ok(())
    }

    /// Catalog entries of the configured weapons, unknown keys skipped.
    pub fn available_weapons(&self) -> Vec<&'static WeaponType> {
        self.weapons.iter().filter_map(|w| weapon_type(w)).collect()
    }

    pub fn team_name(&self, team: Team) -> &str {
        match team {
            Team::Red => &self.red_team,
            Team::Blue => &self.blue_team,
        }
    }
}

// =============================================================================
// SERVER CONFIG
// =============================================================================

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub max_connections: usize,
    pub tick_ms: u64,
    pub session_poll_ms: u64,
    /// Delay between a finished round and the next lobby.
    pub restart_delay_ms: u64,
    /// Minimum time between two applied controller updates per player.
    pub control_debounce_ms: u64,
    pub map: MapType,
    /// Layout JSON; the built-in skirmish layout when unset.
    pub map_file: Option<PathBuf>,
    /// Match seed; random when unset.
    pub seed: Option<u64>,
    pub bots_enabled: bool,
    pub level: LevelParams,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 64,
            tick_ms: crate::GAME_TICK_MS,
            session_poll_ms: crate::game::session::SESSION_POLL_MS,
            restart_delay_ms: 5000,
            control_debounce_ms: 20,
            map: MapType::Dirt,
            map_file: None,
            seed: None,
            bots_enabled: false,
            level: LevelParams::default(),
        }
    }
}

impl ServerConfig {
    /// Load `.env` if present, then read `SKIRMISH_*` variables.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from a key lookup. Unparseable values keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let read = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let map = match read("SKIRMISH_MAP") {
            Some(key) => MapType::from_key(&key).unwrap_or_else(|e| {
                warn!(key = "SKIRMISH_MAP", error = %e, "invalid value, using default");
                defaults.map
            }),
            None => defaults.map,
        };

        let mut level = defaults.level.clone();
        level.max_players = parse_or(read("SKIRMISH_MAX_PLAYERS"), "SKIRMISH_MAX_PLAYERS", level.max_players);
        if let Some(name) = read("SKIRMISH_RED_TEAM") {
            level.red_team = name;
        }
        if let Some(name) = read("SKIRMISH_BLUE_TEAM") {
            level.blue_team = name;
        }
        if let Some(list) = read("SKIRMISH_WEAPONS") {
            level.weapons = list
                .split(',')
                .map(|w| w.trim().to_ascii_lowercase())
                .filter(|w| !w.is_empty())
                .collect();
        }

        Self {
            bind_addr: parse_or(read("SKIRMISH_BIND_ADDR"), "SKIRMISH_BIND_ADDR", defaults.bind_addr),
            max_connections: parse_or(read("SKIRMISH_MAX_CONNECTIONS"), "SKIRMISH_MAX_CONNECTIONS", defaults.max_connections),
            tick_ms: parse_or(read("SKIRMISH_TICK_MS"), "SKIRMISH_TICK_MS", defaults.tick_ms).max(1),
            session_poll_ms: parse_or(read("SKIRMISH_SESSION_POLL_MS"), "SKIRMISH_SESSION_POLL_MS", defaults.session_poll_ms).max(1),
            restart_delay_ms: parse_or(read("SKIRMISH_RESTART_DELAY_MS"), "SKIRMISH_RESTART_DELAY_MS", defaults.restart_delay_ms),
            control_debounce_ms: parse_or(read("SKIRMISH_CONTROL_DEBOUNCE_MS"), "SKIRMISH_CONTROL_DEBOUNCE_MS", defaults.control_debounce_ms),
            map,
            map_file: read("SKIRMISH_MAP_FILE").map(PathBuf::from),
            seed: read("SKIRMISH_SEED").and_then(|v| match v.parse() {
                Ok(seed) => Some(seed),
                Err(_) => {
                    warn!(key = "SKIRMISH_SEED", value = %v, "invalid value, using a random seed");
                    None
                }
            }),
            bots_enabled: parse_or(read("SKIRMISH_BOTS"), "SKIRMISH_BOTS", defaults.bots_enabled),
            level,
        }
    }

    /// The configured layout file, or the built-in skirmish layout.
    pub fn load_layout(&self) -> Result<MapLayout, MapError> {
        match &self.map_file {
            Some(path) => MapLayout::load(path, self.map),
            None => Ok(MapLayout::skirmish(self.map)),
        }
    }

    /// The configured seed, or a fresh random one.
    pub fn resolve_seed(&self) -> u64 {
        self.seed.unwrap_or_else(|| Uuid::new_v4().as_u128() as u64)
    }
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> T {
    match value {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "invalid value, using default");
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: BTreeMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(|_| None);
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.tick_ms, 15);
        assert_eq!(config.session_poll_ms, 1000);
        assert_eq!(config.restart_delay_ms, 5000);
        assert_eq!(config.control_debounce_ms, 20);
        assert_eq!(config.map, MapType::Dirt);
        assert!(!config.bots_enabled);
        assert_eq!(config.level.weapons.len(), WEAPON_TYPES.len());
        assert!(config.level.validate().is_ok());
    }

    #[test]
    fn test_reads_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("SKIRMISH_BIND_ADDR", "127.0.0.1:9000"),
            ("SKIRMISH_MAP", "swamp"),
            ("SKIRMISH_SEED", "42"),
            ("SKIRMISH_BOTS", "true"),
            ("SKIRMISH_WEAPONS", "pistol, M4"),
            ("SKIRMISH_RED_TEAM", "Foxes"),
        ]));
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.map, MapType::Swamp);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.resolve_seed(), 42);
        assert!(config.bots_enabled);
        assert_eq!(config.level.weapons, vec!["pistol", "m4"]);
        assert_eq!(config.level.team_name(Team::Red), "Foxes");
        assert_eq!(config.level.available_weapons().len(), 2);
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("SKIRMISH_TICK_MS", "fast"),
            ("SKIRMISH_MAP", "moon"),
            ("SKIRMISH_SEED", "-"),
            ("SKIRMISH_MAX_PLAYERS", "-3"),
        ]));
        assert_eq!(config.tick_ms, 15);
        assert_eq!(config.map, MapType::Dirt);
        assert_eq!(config.seed, None);
        assert_eq!(config.level.max_players, 8);
    }

    #[test]
    fn test_level_params_validation() {
        let mut params = LevelParams::default();
        params.max_players = 0;
        assert_eq!(params.validate(), Err(ConfigError::NoPlayers));

        let mut params = LevelParams::default();
        params.blue_team = "  ".into();
        assert_eq!(params.validate(), Err(ConfigError::EmptyTeamName(Team::Blue)));

        let mut params = LevelParams::default();
        params.weapons.clear();
        assert_eq!(params.validate(), Err(ConfigError::NoWeapons));

        params.weapons.push("railgun".into());
        assert_eq!(params.validate(), Err(ConfigError::UnknownWeapon("railgun".into())));
    }

    #[test]
    fn test_default_layout_is_skirmish() {
        let config = ServerConfig::default();
        assert_eq!(config.load_layout().unwrap(), MapLayout::skirmish(MapType::Dirt));
    }
}
