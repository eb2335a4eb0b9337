//! Per-frame dynamic simulations.

pub mod waves;

pub use waves::Waves;
