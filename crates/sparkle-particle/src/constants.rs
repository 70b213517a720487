//! Tuning constants for the sparkle effect
//!
//! The WGSL kernels declare the same values; the shader tests in `sparkle-simulation` check that
//! the two stay in sync.

/// Mass given to every particle created from pointer input
pub const DEFAULT_MASS: f32 = 1.0;

/// Starting radius of a new particle, in simulation units
pub const DEFAULT_RADIUS: f32 = 0.5;

/// Exponential velocity damping rate (per second, divided by mass)
pub const DRAG: f32 = 1.5;

/// How fast the radius decays, in radius units per second
pub const SHRINK_RATE: f32 = 0.25;

/// Pixels of quad size per unit of radius
pub const PIXELS_PER_RADIUS: f32 = 24.0;

/// Hue offset between a sparkle's core and its halo
pub const HALO_HUE_SHIFT: f32 = 0.08;

/// Halo opacity relative to the core
pub const HALO_ALPHA: f32 = 0.35;
