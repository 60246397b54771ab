//! Q16.16 Fixed-Point Arithmetic
//!
//! Deterministic fixed-point math for the simulation. Positions, rotations,
//! speeds and spreads are all `Fixed`; floats only appear at the edges
//! (catalog constants and the wire format).
//!
//! ## Format: Q16.16
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Bit Layout: Q16.16 (32-bit signed integer)                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  [S][IIIIIIIIIIIIIIII][FFFFFFFFFFFFFFFF]                    │
//! │   │  └──── 16 bits ────┘└──── 16 bits ────┘                 │
//! │   └─ Sign bit                                               │
//! │                                                             │
//! │  Range: -32768.0 to +32767.99998 (approx)                   │
//! │  Precision: 1/65536 ≈ 0.000015 units                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The largest map is 56 × 32 = 1792 units wide, so positions never get
//! close to the range limit. Squared distances do, which is why
//! `FixedVec2::distance_squared` widens to `i64`.

/// Q16.16 fixed-point number stored as i32.
/// 16 bits integer, 16 bits fractional.
pub type Fixed = i32;

/// Number of fractional bits (16)
pub const FIXED_SCALE: i32 = 16;

/// 1.0 in fixed-point (65536)
pub const FIXED_ONE: Fixed = 1 << FIXED_SCALE; // 65536

/// 0.5 in fixed-point (32768)
pub const FIXED_HALF: Fixed = FIXED_ONE >> 1; // 32768

/// Mask of the fractional bits.
pub const FIXED_FRACTION_MASK: Fixed = FIXED_ONE - 1;

// =============================================================================
// ANGLE CONSTANTS (radians)
// =============================================================================

/// π = round(3.14159265 * 65536)
pub const FIXED_PI: Fixed = 205887;

/// π / 2
pub const FIXED_HALF_PI: Fixed = 102944;

/// π / 4
pub const FIXED_QUARTER_PI: Fixed = 51472;

/// 3π / 4
pub const FIXED_THREE_QUARTER_PI: Fixed = 154416;

/// 2π
pub const FIXED_TWO_PI: Fixed = 411775;

// =============================================================================
// CONVERSIONS
// =============================================================================

/// Convert a compile-time float to fixed-point.
///
/// # Warning
/// Only use at compile-time or initialization. NEVER in tick loop.
///
/// # Example
/// ```
/// use tile_skirmish::core::fixed::{to_fixed, FIXED_ONE};
/// const MY_VALUE: i32 = to_fixed(2.5);
/// assert_eq!(MY_VALUE, FIXED_ONE * 2 + FIXED_ONE / 2);
/// ```
#[inline]
pub const fn to_fixed(f: f64) -> Fixed {
    (f * (FIXED_ONE as f64)) as Fixed
}

/// Integer to fixed-point.
#[inline]
pub const fn from_int(i: i32) -> Fixed {
    i << FIXED_SCALE
}

/// Convert a float received from a client into fixed-point.
///
/// Non-finite input maps to 0; out-of-range input saturates.
#[inline]
pub fn from_float(f: f32) -> Fixed {
    if !f.is_finite() {
        return 0;
    }
    (f as f64 * FIXED_ONE as f64).round() as Fixed
}

/// Convert fixed-point to float for the wire format.
///
/// # Warning
/// Only use for client output. NEVER use result in game logic.
#[inline]
pub fn to_float(f: Fixed) -> f32 {
    f as f32 / FIXED_ONE as f32
}

/// Largest integer not above `f`.
#[inline]
pub const fn fixed_floor_int(f: Fixed) -> i32 {
    f >> FIXED_SCALE
}

// =============================================================================
// CORE OPERATIONS (All deterministic, wrapping semantics)
// =============================================================================

/// Multiply two fixed-point numbers.
///
/// Uses i64 intermediate to prevent overflow, then truncates.
#[inline]
pub fn fixed_mul(a: Fixed, b: Fixed) -> Fixed {
    let wide = (a as i64) * (b as i64);
    (wide >> FIXED_SCALE) as Fixed
}

/// Divide two fixed-point numbers.
///
/// Pre-shifts numerator to maintain precision.
/// Returns 0 on divide-by-zero.
#[inline]
pub fn fixed_div(a: Fixed, b: Fixed) -> Fixed {
    if b == 0 {
        return 0;
    }
    let wide = (a as i64) << FIXED_SCALE;
    (wide / b as i64) as Fixed
}

/// Exact integer square root (floor).
pub fn isqrt_u64(n: u64) -> u64 {
    if n < 2 {
        return n;
    }
    // Bit-by-bit method: no division, identical on every platform.
    let mut rem = n;
    let mut root = 0u64;
    let mut bit = 1u64 << ((63 - n.leading_zeros()) & !1);
    while bit != 0 {
        if rem >= root + bit {
            rem -= root + bit;
            root = (root >> 1) + bit;
        } else {
            root >>= 1;
        }
        bit >>= 2;
    }
    root
}

/// Square root of a widened Q16.16 value.
///
/// Returns 0 for non-positive inputs; saturates at `Fixed::MAX`.
#[inline]
pub fn fixed_sqrt_wide(x: i64) -> Fixed {
    if x <= 0 {
        return 0;
    }
    let root = isqrt_u64((x as u64) << FIXED_SCALE);
    root.min(Fixed::MAX as u64) as Fixed
}

/// Clamp a fixed-point number to a range.
#[inline]
pub fn fixed_clamp(value: Fixed, min: Fixed, max: Fixed) -> Fixed {
    value.max(min).min(max)
}

// =============================================================================
// TRIGONOMETRY
// =============================================================================

/// Wrap an angle into (-π, π].
#[inline]
pub fn normalize_angle(angle: Fixed) -> Fixed {
    let mut a = angle % FIXED_TWO_PI;
    if a > FIXED_PI {
        a -= FIXED_TWO_PI;
    } else if a <= -FIXED_PI {
        a += FIXED_TWO_PI;
    }
    a
}

/// Sine of an angle in radians.
///
/// Folds into [-π/2, π/2] and evaluates the Taylor series through x⁹ in
/// Horner form. Error stays below 1e-5.
pub fn fixed_sin(angle: Fixed) -> Fixed {
    let mut x = normalize_angle(angle);
    if x > FIXED_HALF_PI {
        x = FIXED_PI - x;
    } else if x < -FIXED_HALF_PI {
        x = -FIXED_PI - x;
    }

    let x2 = fixed_mul(x, x);
    let mut r = FIXED_ONE - x2 / 72;
    r = FIXED_ONE - fixed_mul(x2, r) / 42;
    r = FIXED_ONE - fixed_mul(x2, r) / 20;
    r = FIXED_ONE - fixed_mul(x2, r) / 6;
    fixed_mul(x, r)
}

/// Cosine of an angle in radians.
#[inline]
pub fn fixed_cos(angle: Fixed) -> Fixed {
    fixed_sin(normalize_angle(angle) + FIXED_HALF_PI)
}

const ATAN_C1: Fixed = to_fixed(0.999_866_0);
const ATAN_C3: Fixed = to_fixed(-0.330_299_5);
const ATAN_C5: Fixed = to_fixed(0.180_141_0);
const ATAN_C7: Fixed = to_fixed(-0.085_133_0);
const ATAN_C9: Fixed = to_fixed(0.020_835_1);

/// atan(z) for z in [0, 1].
#[inline]
fn atan_unit(z: Fixed) -> Fixed {
    let z2 = fixed_mul(z, z);
    let mut r = ATAN_C9;
    r = ATAN_C7 + fixed_mul(z2, r);
    r = ATAN_C5 + fixed_mul(z2, r);
    r = ATAN_C3 + fixed_mul(z2, r);
    r = ATAN_C1 + fixed_mul(z2, r);
    fixed_mul(z, r)
}

/// Four-quadrant arctangent, result in (-π, π].
///
/// `atan2(0, 0)` is 0.
pub fn fixed_atan2(y: Fixed, x: Fixed) -> Fixed {
    if x == 0 && y == 0 {
        return 0;
    }

    let ax = (x as i64).abs();
    let ay = (y as i64).abs();
    let swapped = ay > ax;
    let (num, den) = if swapped { (ax, ay) } else { (ay, ax) };
    let z = ((num << FIXED_SCALE) / den) as Fixed;

    let mut angle = atan_unit(z);
    if swapped {
        angle = FIXED_HALF_PI - angle;
    }
    if x < 0 {
        angle = FIXED_PI - angle;
    }
    if y < 0 {
        angle = -angle;
    }
    angle
}

// =============================================================================
// SERDE
// =============================================================================

/// Serialize a `Fixed` field as a plain float on the wire.
///
/// ```
/// use serde::{Serialize, Deserialize};
/// use tile_skirmish::core::fixed::{to_fixed, Fixed};
///
/// #[derive(Serialize, Deserialize)]
/// struct Aim {
///     #[serde(with = "tile_skirmish::core::fixed::as_float")]
///     x: Fixed,
/// }
///
/// let aim: Aim = serde_json::from_str(r#"{"x":2.5}"#).unwrap();
/// assert_eq!(aim.x, to_fixed(2.5));
/// ```
pub mod as_float {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{from_float, to_float, Fixed};

    pub fn serialize<S: Serializer>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f32(to_float(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Fixed, D::Error> {
        f32::deserialize(deserializer).map(from_float)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn close(a: Fixed, b: f64, tolerance: f64) -> bool {
        (to_float(a) as f64 - b).abs() <= tolerance
    }

    #[test]
    fn test_fixed_constants() {
        assert_eq!(FIXED_ONE, 65536);
        assert_eq!(FIXED_HALF, 32768);
        assert_eq!(FIXED_SCALE, 16);
        assert!(close(FIXED_PI, std::f64::consts::PI, 1e-5));
        assert!(close(FIXED_HALF_PI, std::f64::consts::FRAC_PI_2, 1e-5));
        assert!(close(FIXED_QUARTER_PI, std::f64::consts::FRAC_PI_4, 1e-5));
        assert!(close(FIXED_TWO_PI, std::f64::consts::TAU, 1e-5));
    }

    #[test]
    fn test_to_fixed() {
        assert_eq!(to_fixed(1.0), FIXED_ONE);
        assert_eq!(to_fixed(0.5), FIXED_HALF);
        assert_eq!(to_fixed(2.0), FIXED_ONE * 2);
        assert_eq!(to_fixed(-1.0), -FIXED_ONE);
        assert_eq!(from_int(32), 32 * FIXED_ONE);
    }

    #[test]
    fn test_from_float_rejects_non_finite() {
        assert_eq!(from_float(f32::NAN), 0);
        assert_eq!(from_float(f32::INFINITY), 0);
        assert_eq!(from_float(1.5), to_fixed(1.5));
    }

    #[test]
    fn test_floor_int() {
        assert_eq!(fixed_floor_int(to_fixed(2.5)), 2);
        assert_eq!(fixed_floor_int(from_int(3)), 3);
        assert_eq!(fixed_floor_int(to_fixed(-0.5)), -1);
    }

    #[test]
    fn test_fixed_mul() {
        assert_eq!(fixed_mul(to_fixed(2.0), to_fixed(3.0)), to_fixed(6.0));
        assert_eq!(fixed_mul(FIXED_HALF, FIXED_HALF), to_fixed(0.25));
        assert_eq!(fixed_mul(to_fixed(-2.0), to_fixed(3.0)), to_fixed(-6.0));
    }

    #[test]
    fn test_fixed_div() {
        assert_eq!(fixed_div(to_fixed(6.0), to_fixed(2.0)), to_fixed(3.0));
        assert_eq!(fixed_div(FIXED_ONE, to_fixed(4.0)), to_fixed(0.25));
        assert_eq!(fixed_div(FIXED_ONE, 0), 0);
    }

    #[test]
    fn test_fixed_sqrt_wide() {
        assert_eq!(fixed_sqrt_wide(to_fixed(4.0) as i64), to_fixed(2.0));
        assert_eq!(fixed_sqrt_wide(FIXED_ONE as i64), FIXED_ONE);
        assert_eq!(fixed_sqrt_wide(0), 0);
        assert_eq!(fixed_sqrt_wide(-(FIXED_ONE as i64)), 0);
        assert_eq!(isqrt_u64(99), 9);
        assert_eq!(isqrt_u64(100), 10);
        // Map-scale distance squared does not fit in Fixed.
        let wide = (1800i64 * 1800) << FIXED_SCALE;
        assert_eq!(fixed_sqrt_wide(wide), from_int(1800));
    }

    #[test]
    fn test_normalize_angle() {
        assert_eq!(normalize_angle(0), 0);
        assert_eq!(normalize_angle(FIXED_PI), FIXED_PI);
        assert_eq!(normalize_angle(-FIXED_PI), -FIXED_PI + FIXED_TWO_PI);
        assert!(close(normalize_angle(from_int(4)), 4.0 - std::f64::consts::TAU, 1e-4));
        assert!(close(normalize_angle(from_int(-7)), -7.0 + std::f64::consts::TAU, 1e-4));
    }

    #[test]
    fn test_sin_cos_key_angles() {
        assert!(close(fixed_sin(0), 0.0, 1e-4));
        assert!(close(fixed_sin(FIXED_HALF_PI), 1.0, 1e-4));
        assert!(close(fixed_sin(-FIXED_HALF_PI), -1.0, 1e-4));
        assert!(close(fixed_sin(FIXED_PI), 0.0, 1e-4));
        assert!(close(fixed_cos(0), 1.0, 1e-4));
        assert!(close(fixed_cos(FIXED_PI), -1.0, 1e-4));
        assert!(close(fixed_cos(FIXED_HALF_PI), 0.0, 1e-4));
    }

    #[test]
    fn test_atan2_quadrants() {
        let one = FIXED_ONE;
        assert!(close(fixed_atan2(0, one), 0.0, 1e-3));
        assert!(close(fixed_atan2(one, one), std::f64::consts::FRAC_PI_4, 1e-3));
        assert!(close(fixed_atan2(one, 0), std::f64::consts::FRAC_PI_2, 1e-3));
        assert!(close(fixed_atan2(one, -one), 3.0 * std::f64::consts::FRAC_PI_4, 1e-3));
        assert!(close(fixed_atan2(0, -one), std::f64::consts::PI, 1e-3));
        assert!(close(fixed_atan2(-one, -one), -3.0 * std::f64::consts::FRAC_PI_4, 1e-3));
        assert!(close(fixed_atan2(-one, 0), -std::f64::consts::FRAC_PI_2, 1e-3));
        assert_eq!(fixed_atan2(0, 0), 0);
    }

    #[test]
    fn test_fixed_determinism() {
        for _ in 0..1000 {
            let a = 12345678;
            let b = 87654321;
            assert_eq!(fixed_mul(a, b), fixed_mul(a, b));
            assert_eq!(fixed_div(a, b), fixed_div(a, b));
            assert_eq!(fixed_atan2(a, b), fixed_atan2(a, b));
        }
    }

    proptest! {
        #[test]
        fn prop_sin_cos_match_float(angle in -20.0f64..20.0) {
            let a = to_fixed(angle);
            let exact = to_float(a) as f64;
            prop_assert!(close(fixed_sin(a), exact.sin(), 2e-4));
            prop_assert!(close(fixed_cos(a), exact.cos(), 2e-4));
        }

        #[test]
        fn prop_atan2_matches_float(y in -2000.0f64..2000.0, x in -2000.0f64..2000.0) {
            prop_assume!(x.abs() > 0.01 || y.abs() > 0.01);
            let fy = to_fixed(y);
            let fx = to_fixed(x);
            let expected = (to_float(fy) as f64).atan2(to_float(fx) as f64);
            let got = to_float(fixed_atan2(fy, fx)) as f64;
            let diff = (got - expected).abs();
            // ±π are the same direction.
            let diff = diff.min((diff - std::f64::consts::TAU).abs());
            prop_assert!(diff < 1e-3, "atan2({}, {}) = {} expected {}", y, x, got, expected);
        }
    }
}
