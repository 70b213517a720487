//! # Sparkle Simulation
//!
//! GPU compute core of the cursor sparkle effect: double-buffered particle state, a ring-buffer
//! injection queue, per-frame resource slots and the two compute passes (physics step and
//! draw-info generation).
//!
//! ```no_run
//! # async fn demo() -> Result<(), sparkle_simulation::SimulationError> {
//! use sparkle_simulation::{Simulator, SimulatorConfig};
//!
//! let mut simulator = Simulator::create(SimulatorConfig::new(1024, 2)).await?;
//! simulator.add_particle(10.0, -20.0, 80.0, 0.0);
//! simulator.step(1.0 / 60.0)?;
//! let draw_info = simulator.generate_draw_info()?;
//! # let _ = draw_info;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod draw_info_pass;
pub mod error;
pub mod fence;
pub mod frame_slots;
pub mod gpu;
pub mod injection;
pub mod pacing;
pub mod params;
pub mod physics_pass;
pub mod ping_pong;
pub mod simulator;
pub mod state;

pub use config::*;
pub use error::*;
pub use fence::*;
pub use frame_slots::*;
pub use injection::*;
pub use pacing::*;
pub use params::*;
pub use ping_pong::*;
pub use simulator::*;
pub use state::*;
