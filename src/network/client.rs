//! Client-side sync.
//!
//! `IntentSender` decides when a local controller change goes out;
//! `LevelMirror` keeps a client's copy of the level from snapshots and
//! deltas.

use std::collections::BTreeMap;

use tracing::trace;

use crate::game::actor::ActorId;
use crate::game::controller::Controller;

use super::protocol::{ClientMessage, ServerMessage};
use super::sync::{LevelSnapshot, SerializedActor, SerializedProjectile, SerializedSchema, TickDelta};

/// Default time between two intent sends.
pub const INTENT_DEBOUNCE_MS: u64 = 20;

// =============================================================================
// INTENT SENDER
// =============================================================================

/// Debounced, change-only controller sender.
#[derive(Debug, Clone)]
pub struct IntentSender {
    debounce_ms: u64,
    last_sent: Option<Controller>,
    last_send_ms: Option<u64>,
}

impl Default for IntentSender {
    fn default() -> Self {
        Self::new(INTENT_DEBOUNCE_MS)
    }
}

impl IntentSender {
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            debounce_ms,
            last_sent: None,
            last_send_ms: None,
        }
    }

    /// The message to send for `controller` at `now`, if any.
    ///
    /// Nothing goes out when the controller equals the last one sent or the
    /// debounce window is still open. A change held back by the window is
    /// sent by a later poll.
    pub fn poll(&mut self, controller: &Controller, now: u64) -> Option<ClientMessage> {
        if self.last_sent.as_ref() == Some(controller) {
            return None;
        }
        if let Some(last) = self.last_send_ms {
            if now.saturating_sub(last) < self.debounce_ms {
                trace!(now, last, "intent held back");
                return None;
            }
        }

        self.last_sent = Some(*controller);
        self.last_send_ms = Some(now);
        Some(ClientMessage::UpdateActorController(*controller))
    }

    pub fn last_sent(&self) -> Option<&Controller> {
        self.last_sent.as_ref()
    }
}

// =============================================================================
// LEVEL MIRROR
// =============================================================================

/// A client's copy of the level.
#[derive(Debug, Clone, Default)]
pub struct LevelMirror {
    pub schema: SerializedSchema,
    pub map_width: i32,
    pub map_height: i32,
    pub projectiles: Vec<SerializedProjectile>,
    pub actors: BTreeMap<ActorId, SerializedActor>,
}

impl LevelMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a server message. Returns whether the mirror changed.
    pub fn apply(&mut self, message: &ServerMessage) -> bool {
        match message {
            ServerMessage::LevelState(snapshot) => {
                self.apply_level_state(snapshot);
                true
            }
            ServerMessage::TickUpdate(delta) => {
                self.apply_tick_update(delta);
                true
            }
            ServerMessage::PlayerDisconnected { id } => self.actors.remove(id).is_some(),
            _ => false,
        }
    }

    /// Replace everything with a snapshot.
    pub fn apply_level_state(&mut self, snapshot: &LevelSnapshot) {
        self.schema = snapshot.schema.clone();
        self.map_width = snapshot.map_width;
        self.map_height = snapshot.map_height;
        self.projectiles = snapshot.projectiles.clone();
        self.actors = snapshot.actors.clone();
    }

    /// Apply block health changes, replace projectiles, merge actors.
    ///
    /// A health of `0` removes the block's layer from the cell.
    pub fn apply_tick_update(&mut self, delta: &TickDelta) {
        for (x, y, layer, health) in delta.block_updates.iter() {
            let Some(cell) = self
                .schema
                .get_mut(y as usize)
                .and_then(|row| row.get_mut(x as usize))
            else {
                continue;
            };
            if health == 0 {
                cell.remove(&layer);
            } else if let Some(block) = cell.get_mut(&layer) {
                block.health = health;
            }
        }

        self.projectiles = delta.projectiles.clone();
        for (id, actor) in &delta.actors {
            self.actors.insert(*id, actor.clone());
        }
    }
}
