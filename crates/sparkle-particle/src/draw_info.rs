//! Renderer-facing record produced by the draw-info pass

use bytemuck::{Pod, Zeroable};

/// One instanced quad (64 bytes, matches `DrawInfo` in the WGSL kernels)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct DrawInfo {
    /// Quad center in screen pixels
    pub position: [f32; 2],
    /// Rotation in radians, aligned with the direction of travel
    pub rotation: f32,
    /// Quad edge length in pixels
    pub scale: f32,
    /// Core color, premultiplication is left to the blend state
    pub color: [f32; 4],
    /// Soft outer glow
    pub halo: [f32; 4],
    /// Velocity xy, speed, seed
    pub motion: [f32; 4],
}

/// Size of one draw-info record in bytes
pub const DRAW_INFO_SIZE: u64 = std::mem::size_of::<DrawInfo>() as u64;

const _: () = assert!(DRAW_INFO_SIZE == 64);

/// Size of a draw-info buffer covering `capacity` particles.
pub fn draw_info_buffer_size(capacity: u32) -> u64 {
    capacity as u64 * DRAW_INFO_SIZE
}
