//! Actor intents.
//!
//! Human input messages and the bot AI both produce a `Controller`; the tick
//! consumes it the same way regardless of source.

use serde::{Serialize, Deserialize};

use crate::core::fixed::{Fixed, FIXED_HALF_PI, FIXED_PI};
use crate::core::vec2::FixedVec2;

/// Intent flags plus an aim point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Controller {
    pub is_moving_forward: bool,
    pub is_moving_left: bool,
    pub is_moving_right: bool,
    pub is_moving_backwards: bool,
    pub is_firing: bool,
    pub is_reloading: bool,
    pub is_sprinting: bool,
    #[serde(with = "crate::core::fixed::as_float")]
    pub facing_x: Fixed,
    #[serde(with = "crate::core::fixed::as_float")]
    pub facing_y: Fixed,
}

impl Controller {
    /// Any movement intent set.
    #[inline]
    pub fn is_moving(&self) -> bool {
        self.is_moving_forward || self.is_moving_left || self.is_moving_right || self.is_moving_backwards
    }

    /// Running means moving forward.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.is_moving_forward
    }

    /// Aim point.
    #[inline]
    pub fn facing(&self) -> FixedVec2 {
        FixedVec2::new(self.facing_x, self.facing_y)
    }

    pub fn set_facing(&mut self, point: FixedVec2) {
        self.facing_x = point.x;
        self.facing_y = point.y;
    }

    /// Clear the four direction intents.
    pub fn clear_directions(&mut self) {
        self.is_moving_forward = false;
        self.is_moving_left = false;
        self.is_moving_right = false;
        self.is_moving_backwards = false;
    }

    /// Clear movement and fire intents.
    pub fn clear_movement(&mut self) {
        self.clear_directions();
        self.is_firing = false;
    }

    /// Set exactly one movement intent. Fire and reload intents are kept.
    pub fn set_direction(&mut self, direction: Direction) {
        self.clear_directions();
        match direction {
            Direction::Forward => self.is_moving_forward = true,
            Direction::Right => self.is_moving_right = true,
            Direction::Left => self.is_moving_left = true,
            Direction::Back => self.is_moving_backwards = true,
        }
    }

    /// Movement intents in the order the tick applies them.
    pub fn directions(&self) -> impl Iterator<Item = Direction> {
        [
            (self.is_moving_forward, Direction::Forward),
            (self.is_moving_right, Direction::Right),
            (self.is_moving_left, Direction::Left),
            (self.is_moving_backwards, Direction::Back),
        ]
        .into_iter()
        .filter_map(|(set, direction)| set.then_some(direction))
    }
}

/// Movement direction relative to the actor's facing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Right,
    Left,
    Back,
}

impl Direction {
    /// Angle added to the actor's rotation.
    pub const fn relative_angle(self) -> Fixed {
        match self {
            Self::Forward => 0,
            Self::Right => FIXED_HALF_PI,
            Self::Left => -FIXED_HALF_PI,
            Self::Back => FIXED_PI,
        }
    }
}
