//! Screen-space transform from pixel coordinates to clip space

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Vec2, Vec3};

/// Viewport uniform for GPU (64 bytes)
///
/// Particle positions are in window pixels with the origin at the top-left corner and y
/// pointing up, so the visible area spans `y` in `[-height, 0]`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ViewportUniform {
    /// Column-major 3x3 transform, each column padded to a vec4 (`mat3x4<f32>` in WGSL)
    pub transform: [[f32; 4]; 3],
    pub time: f32,
    pub _padding: [f32; 3],
}

pub const VIEWPORT_UNIFORM_SIZE: u64 = std::mem::size_of::<ViewportUniform>() as u64;

const _: () = assert!(VIEWPORT_UNIFORM_SIZE == 64);

/// Window size in physical pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1) as f32,
            height: height.max(1) as f32,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        *self = Self::new(width, height);
    }

    /// Pixel to clip space transform.
    pub fn transform(&self) -> Mat3 {
        Mat3::from_cols(
            Vec3::new(2.0 / self.width, 0.0, 0.0),
            Vec3::new(0.0, 2.0 / self.height, 0.0),
            Vec3::new(-1.0, 1.0, 1.0),
        )
    }

    pub fn to_clip(&self, pixel: Vec2) -> Vec2 {
        self.transform().transform_point2(pixel)
    }

    pub fn to_uniform(&self, time: f32) -> ViewportUniform {
        let columns = self.transform().to_cols_array_2d();
        ViewportUniform {
            transform: columns.map(|[x, y, z]| [x, y, z, 0.0]),
            time,
            _padding: [0.0; 3],
        }
    }
}
