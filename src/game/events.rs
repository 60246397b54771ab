//! Game Events
//!
//! Events emitted by the simulation during a tick. The match host drains
//! them after each tick and feeds kills to the session and bot manager.

use serde::{Serialize, Deserialize};

use crate::world::block::Layer;

use super::actor::{ActorId, Team};

/// Priority for event processing order.
///
/// Lower value = processed first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventPriority {
    /// Kills decide the session, so they go first
    Kill = 0,
    /// Then damage bookkeeping
    Damage = 1,
    /// Then map changes
    Block = 2,
}

/// Game event data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEventData {
    /// An actor's health dropped to zero.
    ActorKilled {
        target: ActorId,
        target_team: Team,
        /// Shooter, if the projectile had one.
        killer: Option<ActorId>,
    },

    /// A projectile hit an actor.
    ActorDamaged {
        target: ActorId,
        attacker: Option<ActorId>,
        damage: i32,
    },

    /// A block was destroyed and removed from the schema.
    BlockDestroyed {
        x: i32,
        y: i32,
        layer: Layer,
    },
}

/// A game event with timing and priority.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameEvent {
    /// Tick when event occurred
    pub tick: u64,

    /// Processing priority
    pub priority: EventPriority,

    /// Actor involved (for tie-breaking)
    pub actor_id: Option<ActorId>,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(tick: u64, priority: EventPriority, data: GameEventData) -> Self {
        let actor_id = match &data {
            GameEventData::ActorKilled { target, .. } => Some(*target),
            GameEventData::ActorDamaged { target, .. } => Some(*target),
            GameEventData::BlockDestroyed { .. } => None,
        };

        Self {
            tick,
            priority,
            actor_id,
            data,
        }
    }

    /// Create actor killed event.
    pub fn actor_killed(tick: u64, target: ActorId, target_team: Team, killer: Option<ActorId>) -> Self {
        Self::new(tick, EventPriority::Kill, GameEventData::ActorKilled { target, target_team, killer })
    }

    /// Create actor damaged event.
    pub fn actor_damaged(tick: u64, target: ActorId, attacker: Option<ActorId>, damage: i32) -> Self {
        Self::new(tick, EventPriority::Damage, GameEventData::ActorDamaged { target, attacker, damage })
    }

    /// Create block destroyed event.
    pub fn block_destroyed(tick: u64, x: i32, y: i32, layer: Layer) -> Self {
        Self::new(tick, EventPriority::Block, GameEventData::BlockDestroyed { x, y, layer })
    }
}

impl PartialEq for GameEvent {
    fn eq(&self, other: &Self) -> bool {
        self.tick == other.tick
            && self.priority == other.priority
            && self.actor_id == other.actor_id
    }
}

impl Eq for GameEvent {}

impl PartialOrd for GameEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GameEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Sort by: tick, then priority, then actor_id
        self.tick
            .cmp(&other.tick)
            .then(self.priority.cmp(&other.priority))
            .then(self.actor_id.cmp(&other.actor_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_event_ordering() {
        let id1 = ActorId(Uuid::from_u128(1));
        let id2 = ActorId(Uuid::from_u128(2));

        let kill1 = GameEvent::actor_killed(10, id1, Team::Red, None);
        let damage = GameEvent::actor_damaged(10, id1, None, 6);
        let kill2 = GameEvent::actor_killed(10, id2, Team::Blue, Some(id1));
        let block = GameEvent::block_destroyed(9, 1, 1, 4);

        // Same tick, but kill < damage
        assert!(kill1 < damage);

        // Same tick and priority, but id1 < id2
        assert!(kill1 < kill2);

        // Earlier tick first
        assert!(block < kill1);
    }
}
