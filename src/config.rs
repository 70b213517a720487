//! Demo configuration, loaded from an optional TOML file

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sparkle_simulation::{ConfigError, SimulatorConfig};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub simulator: SimulatorConfig,
    pub demo: DemoConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Particle velocity per pixel of pointer movement
    pub velocity_scale: f32,
    /// Upper bound on a single step, so a stalled frame does not launch particles off screen
    pub max_delta_seconds: f32,
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            velocity_scale: 8.0,
            max_delta_seconds: 0.1,
            title: "Cursor Sparkles".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config: Self = std::fs::read_to_string(path)?.parse()?;
        config.simulator.validate()?;
        Ok(config)
    }
}

impl FromStr for AppConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}
