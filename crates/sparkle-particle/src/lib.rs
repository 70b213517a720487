//! # Sparkle Particles
//!
//! Plain-data records shared between the CPU and the GPU kernels, the byte layout of the
//! simulation state buffers, and CPU reference versions of the compute kernels.

pub mod constants;
pub mod draw_info;
pub mod kernels;
pub mod particle;

pub use constants::*;
pub use draw_info::*;
pub use kernels::*;
pub use particle::*;
