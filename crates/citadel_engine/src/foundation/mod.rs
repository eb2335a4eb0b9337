//! Foundation utilities: math types, timing, deterministic randomness.

pub mod math;
pub mod rng;
pub mod time;
