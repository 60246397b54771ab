//! Fixed-point 2D vectors.
//!
//! Positions, aim points and projectile offsets. Lengths and distances go
//! through an `i64` path so map-scale values (a 56×24 map is 1792 units
//! wide) never overflow Q16.16 when squared.

use std::fmt;
use std::ops::{Add, Sub, Neg};
use serde::{Serialize, Deserialize};

use super::fixed::{
    Fixed, FIXED_SCALE,
    fixed_mul, fixed_sqrt_wide, fixed_clamp, fixed_cos, fixed_sin, fixed_atan2,
};

/// 2D vector with fixed-point components.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FixedVec2 {
    pub x: Fixed,
    pub y: Fixed,
}

impl FixedVec2 {
    pub const ZERO: Self = Self { x: 0, y: 0 };

    #[inline]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Create a vector from integer components.
    #[inline]
    pub const fn from_ints(x: i32, y: i32) -> Self {
        Self {
            x: x << FIXED_SCALE,
            y: y << FIXED_SCALE,
        }
    }

    /// Vector of the given length pointing along `angle`.
    #[inline]
    pub fn from_angle(angle: Fixed, length: Fixed) -> Self {
        Self {
            x: fixed_mul(fixed_cos(angle), length),
            y: fixed_mul(fixed_sin(angle), length),
        }
    }

    #[inline]
    pub fn add(self, other: Self) -> Self {
        Self {
            x: self.x.wrapping_add(other.x),
            y: self.y.wrapping_add(other.y),
        }
    }

    #[inline]
    pub fn sub(self, other: Self) -> Self {
        Self {
            x: self.x.wrapping_sub(other.x),
            y: self.y.wrapping_sub(other.y),
        }
    }

    /// Scale by a fixed-point scalar.
    #[inline]
    pub fn scale(self, scalar: Fixed) -> Self {
        Self {
            x: fixed_mul(self.x, scalar),
            y: fixed_mul(self.y, scalar),
        }
    }

    /// Squared length, widened to i64 (still Q16.16).
    #[inline]
    pub fn length_squared(self) -> i64 {
        let x = self.x as i64;
        let y = self.y as i64;
        (x * x + y * y) >> FIXED_SCALE
    }

    #[inline]
    pub fn length(self) -> Fixed {
        fixed_sqrt_wide(self.length_squared())
    }

    /// Squared distance to another point, widened to i64 (Q16.16).
    ///
    /// Compare against `threshold_squared` rather than taking the root.
    #[inline]
    pub fn distance_squared(self, other: Self) -> i64 {
        self.sub(other).length_squared()
    }

    #[inline]
    pub fn distance(self, other: Self) -> Fixed {
        fixed_sqrt_wide(self.distance_squared(other))
    }

    /// Angle of this vector, in (-π, π].
    #[inline]
    pub fn angle(self) -> Fixed {
        fixed_atan2(self.y, self.x)
    }

    /// Clamp each component into `[0, max]`.
    #[inline]
    pub fn clamp_to(self, max: Self) -> Self {
        Self {
            x: fixed_clamp(self.x, 0, max.x),
            y: fixed_clamp(self.y, 0, max.y),
        }
    }

    #[inline]
    pub fn negate(self) -> Self {
        Self {
            x: self.x.wrapping_neg(),
            y: self.y.wrapping_neg(),
        }
    }

    /// Convert to float tuple for the wire format.
    #[inline]
    pub fn to_floats(self) -> (f32, f32) {
        (
            super::fixed::to_float(self.x),
            super::fixed::to_float(self.y),
        )
    }
}

/// Square of a fixed-point threshold in the widened distance format.
#[inline]
pub fn threshold_squared(threshold: Fixed) -> i64 {
    let t = threshold as i64;
    (t * t) >> FIXED_SCALE
}

impl Add for FixedVec2 {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        FixedVec2::add(self, rhs)
    }
}

impl Sub for FixedVec2 {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        FixedVec2::sub(self, rhs)
    }
}

impl Neg for FixedVec2 {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        self.negate()
    }
}

impl fmt::Debug for FixedVec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (fx, fy) = self.to_floats();
        write!(f, "Vec2({:.3}, {:.3})", fx, fy)
    }
}

impl fmt::Display for FixedVec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (fx, fy) = self.to_floats();
        write!(f, "({:.3}, {:.3})", fx, fy)
    }
}

// =============================================================================
// TESTS
// =============================================================================
