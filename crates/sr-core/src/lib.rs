//! sr-core: stable foundation for syrupramp.
//!
//! Contains:
//! - numeric (ramp interpolation and output grids)
//! - ids (tank and flow-channel tags, ordered upstream to downstream)

pub mod ids;
pub mod numeric;

// Re-exports: nice ergonomics for downstream crates
pub use ids::*;
pub use numeric::*;
