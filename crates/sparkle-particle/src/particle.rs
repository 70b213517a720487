//! Particle record and simulation state buffer layout

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

use crate::constants::{DEFAULT_MASS, DEFAULT_RADIUS};

/// GPU-compatible particle structure
/// Aligned for WGSL struct compatibility (32 bytes)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Particle {
    /// Position in screen pixels
    pub position: [f32; 2],
    /// Velocity in pixels per second
    pub velocity: [f32; 2],
    /// Mass; zero marks a slot that was never written
    pub mass: f32,
    /// Per-particle random value in [0, 1), drives the hue
    pub seed: f32,
    /// Remaining radius, shrinks to zero over the particle's life
    pub radius: f32,
    pub _padding: f32,
}

impl Particle {
    /// Create a freshly spawned particle with the default mass and radius.
    pub fn new(position: Vec2, velocity: Vec2, seed: f32) -> Self {
        Self {
            position: position.to_array(),
            velocity: velocity.to_array(),
            mass: DEFAULT_MASS,
            seed,
            radius: DEFAULT_RADIUS,
            _padding: 0.0,
        }
    }

    /// True for slots the injection cursor has not reached yet.
    pub fn is_empty(&self) -> bool {
        self.mass <= 0.0
    }

    pub fn position(&self) -> Vec2 {
        Vec2::from_array(self.position)
    }

    pub fn velocity(&self) -> Vec2 {
        Vec2::from_array(self.velocity)
    }
}

/// Header at the start of every simulation state buffer
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct StateHeader {
    /// Number of particle slots following the header
    pub capacity: u32,
    pub _padding: u32,
}

impl StateHeader {
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            _padding: 0,
        }
    }
}

/// Size of one particle record in bytes
pub const PARTICLE_SIZE: u64 = std::mem::size_of::<Particle>() as u64;

/// Size of the state buffer header in bytes
pub const STATE_HEADER_SIZE: u64 = std::mem::size_of::<StateHeader>() as u64;

const _: () = assert!(PARTICLE_SIZE == 32);
const _: () = assert!(STATE_HEADER_SIZE == 8);

/// Byte offset of particle `index` inside a state buffer.
pub fn particle_offset(index: u32) -> u64 {
    STATE_HEADER_SIZE + index as u64 * PARTICLE_SIZE
}

/// Total size of a state buffer holding `capacity` particles.
pub fn state_buffer_size(capacity: u32) -> u64 {
    particle_offset(capacity)
}
