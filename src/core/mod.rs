//! Core deterministic primitives.
//!
//! Fixed-point math, vectors, the seeded RNG and state hashing. Everything
//! the simulation computes is built on these so a round replays exactly.

pub mod fixed;
pub mod vec2;
pub mod rng;
pub mod hash;

// Re-export core types
pub use fixed::{Fixed, FIXED_ONE, FIXED_HALF, FIXED_SCALE};
pub use vec2::FixedVec2;
pub use rng::DeterministicRng;
pub use hash::{StateHash, StateHasher};
