//! Finite-field primitives: GF(256) scalar/bulk arithmetic, GF(2) bit-packed
//! row operations, and the lazily-initialised tables backing both plus the
//! PRNG layer.

pub mod gf2;
pub mod gf256;
pub mod tables;

pub use tables::SystematicParams;
