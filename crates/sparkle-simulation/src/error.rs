//! Error types for the simulation core

use thiserror::Error;

use crate::pacing::StepPhase;

/// Invalid simulator configuration, detected before any GPU work is issued
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("particle capacity must be greater than zero")]
    ZeroCapacity,
    #[error("frames in flight must be greater than zero")]
    ZeroFramesInFlight,
    #[error("max steps in flight must be greater than zero")]
    ZeroStepsInFlight,
    #[error("state buffer for {capacity} particles exceeds the device limit of {limit} bytes")]
    CapacityTooLarge { capacity: u32, limit: u64 },
    #[error("{workgroups} workgroups exceed the device limit of {limit} per dimension")]
    TooManyWorkgroups { workgroups: u32, limit: u32 },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures reported by the device or the driver
#[derive(Debug, Error)]
pub enum GpuError {
    #[error("no suitable GPU adapter: {0}")]
    NoAdapter(#[from] wgpu::RequestAdapterError),
    #[error("failed to create GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),
    #[error("adapter does not support compute shaders")]
    ComputeUnsupported,
    #[error("GPU device lost: {0}")]
    DeviceLost(String),
    #[error("GPU validation failed during {context}: {message}")]
    Validation {
        context: &'static str,
        message: String,
    },
    #[error("buffer mapping failed: {0}")]
    BufferMapping(#[from] wgpu::BufferAsyncError),
    #[error("buffer mapping callback was dropped before it ran")]
    MappingAborted,
    #[error("device poll failed: {0}")]
    Poll(#[from] wgpu::PollError),
}

/// Everything a simulator operation can fail with
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("invalid simulator configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Gpu(#[from] GpuError),
    #[error("frame slot {key} was created as {existing} but requested as {requested}")]
    SlotDescriptorMismatch {
        key: String,
        existing: String,
        requested: String,
    },
    #[error("{pass} dispatched before its {binding} binding was set")]
    MissingBinding {
        pass: &'static str,
        binding: &'static str,
    },
    #[error("step started while the previous step is still {0:?}")]
    StepInProgress(StepPhase),
}

pub type Result<T, E = SimulationError> = std::result::Result<T, E>;
