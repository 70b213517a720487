//! Per-step uniforms

use bytemuck::{Pod, Zeroable};

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct StepUniforms {
    // Seconds since the previous step
    pub delta_time: f32,
    // Uniform buffers are at least 16 bytes
    pub _padding: [f32; 3],
}

impl StepUniforms {
    pub fn new(delta_time: f32) -> Self {
        Self {
            delta_time,
            _padding: [0.0; 3],
        }
    }
}

pub const STEP_UNIFORMS_SIZE: u64 = std::mem::size_of::<StepUniforms>() as u64;

const _: () = assert!(STEP_UNIFORMS_SIZE == 16);
