//! Simulator configuration

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sparkle_particle::{draw_info_buffer_size, state_buffer_size};

use crate::error::ConfigError;

/// Threads per workgroup in both compute kernels (`@workgroup_size` in the WGSL)
pub const WORKGROUP_SIZE: u32 = 64;

/// Sizing of the simulator's GPU resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Number of particle slots in each state buffer
    pub capacity: u32,
    /// Replicas of every frame-scoped buffer
    pub frames_in_flight: u32,
    /// Submitted steps allowed to be unfinished when a new step begins
    pub max_steps_in_flight: u32,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            capacity: 8192,
            frames_in_flight: 2,
            max_steps_in_flight: 1,
        }
    }
}

impl SimulatorConfig {
    pub fn new(capacity: u32, frames_in_flight: u32) -> Self {
        Self {
            capacity,
            frames_in_flight,
            ..Self::default()
        }
    }

    /// Checks that hold regardless of the device.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.frames_in_flight == 0 {
            return Err(ConfigError::ZeroFramesInFlight);
        }
        if self.max_steps_in_flight == 0 {
            return Err(ConfigError::ZeroStepsInFlight);
        }
        Ok(())
    }

    /// [`validate`](Self::validate) plus the checks against the device limits.
    pub fn validate_for_limits(&self, limits: &wgpu::Limits) -> Result<(), ConfigError> {
        self.validate()?;

        // Both buffers are bound whole as storage; the draw-info buffer is the larger one.
        let limit = (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);
        let largest = state_buffer_size(self.capacity).max(draw_info_buffer_size(self.capacity));
        if largest > limit {
            return Err(ConfigError::CapacityTooLarge {
                capacity: self.capacity,
                limit,
            });
        }

        let workgroups = self.workgroup_count();
        if workgroups > limits.max_compute_workgroups_per_dimension {
            return Err(ConfigError::TooManyWorkgroups {
                workgroups,
                limit: limits.max_compute_workgroups_per_dimension,
            });
        }
        Ok(())
    }

    /// Workgroups needed to cover every particle slot once.
    pub fn workgroup_count(&self) -> u32 {
        self.capacity.div_ceil(WORKGROUP_SIZE)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        std::fs::read_to_string(path)?.parse()
    }
}

impl FromStr for SimulatorConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SimulatorConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.validate_for_limits(&wgpu::Limits::default()).is_ok());
        assert_eq!(config.workgroup_count(), 128);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = SimulatorConfig::new(0, 2).validate().unwrap_err();
        assert!(matches!(err, ConfigError::ZeroCapacity));
    }

    #[test]
    fn test_zero_frames_rejected() {
        let err = SimulatorConfig::new(16, 0).validate().unwrap_err();
        assert!(matches!(err, ConfigError::ZeroFramesInFlight));

        let config = SimulatorConfig {
            max_steps_in_flight: 0,
            ..SimulatorConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroStepsInFlight)
        ));
    }

    #[test]
    fn test_limits_enforced() {
        let limits = wgpu::Limits {
            max_storage_buffer_binding_size: 1024,
            ..wgpu::Limits::default()
        };
        let err = SimulatorConfig::new(64, 2)
            .validate_for_limits(&limits)
            .unwrap_err();
        assert!(matches!(err, ConfigError::CapacityTooLarge { capacity: 64, .. }));

        let limits = wgpu::Limits {
            max_compute_workgroups_per_dimension: 2,
            ..wgpu::Limits::default()
        };
        let err = SimulatorConfig::new(129, 2)
            .validate_for_limits(&limits)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::TooManyWorkgroups {
                workgroups: 3,
                limit: 2
            }
        ));
    }

    #[test]
    fn test_draw_info_buffer_counts_against_limits() {
        let limits = wgpu::Limits::downlevel_defaults();

        // The state buffer alone (32 bytes per particle) would fit here, the draw info
        // (64 bytes per particle) does not.
        assert!(state_buffer_size(3_000_000) < limits.max_storage_buffer_binding_size as u64);
        let err = SimulatorConfig::new(3_000_000, 2)
            .validate_for_limits(&limits)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::CapacityTooLarge {
                capacity: 3_000_000,
                ..
            }
        ));
        assert!(SimulatorConfig::new(2_000_000, 2)
            .validate_for_limits(&limits)
            .is_ok());

        let limits = wgpu::Limits {
            max_buffer_size: 1000,
            ..wgpu::Limits::default()
        };
        let err = SimulatorConfig::new(16, 2)
            .validate_for_limits(&limits)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::CapacityTooLarge {
                capacity: 16,
                limit: 1000
            }
        ));
    }

    #[test]
    fn test_workgroup_count_rounds_up() {
        assert_eq!(SimulatorConfig::new(1, 1).workgroup_count(), 1);
        assert_eq!(SimulatorConfig::new(64, 1).workgroup_count(), 1);
        assert_eq!(SimulatorConfig::new(65, 1).workgroup_count(), 2);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: SimulatorConfig = "capacity = 256".parse().unwrap();
        assert_eq!(config.capacity, 256);
        assert_eq!(config.frames_in_flight, 2);
        assert_eq!(config.max_steps_in_flight, 1);
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = SimulatorConfig {
            capacity: 12,
            frames_in_flight: 3,
            max_steps_in_flight: 2,
        };
        let text = toml::to_string(&config).unwrap();
        assert_eq!(text.parse::<SimulatorConfig>().unwrap(), config);
    }

    #[test]
    fn test_parse_error() {
        let err = "capacity = \"lots\"".parse::<SimulatorConfig>().unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
