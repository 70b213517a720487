//! # Sparkle Renderer
//!
//! Rasterizes the draw-info buffer produced by the simulation as alpha-blended, instanced quads.

pub mod quad;
pub mod renderer;
pub mod viewport;

pub use quad::*;
pub use renderer::*;
pub use viewport::*;
