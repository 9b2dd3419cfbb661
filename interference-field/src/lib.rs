//! Real-time damped scalar wave-field integrator.
//!
//! A [`WaveSimulation`] owns three rotating R×R buffers and advances them with a
//! damped leapfrog update over the 5-point stencil. Transient Gaussian
//! impulses are queued between steps and applied to exactly one step; static
//! obstacle cells are pinned to zero. Renderers pull the latest state through
//! [`WaveSimulation::current_field`].
//!
//! ```
//! use interference_field::{SimulationParameters, WaveSimulation};
//!
//! let mut sim = WaveSimulation::new(64, SimulationParameters::default()).unwrap();
//! sim.configure_obstacles(|u, v| (u - 0.5).abs() < 0.02 && (v - 0.5).abs() > 0.1);
//! sim.inject_impulse(0.25, 0.5, 0.05, 1.0).unwrap();
//! for _ in 0..10 {
//!     sim.step().unwrap();
//! }
//! assert!(sim.current_field().iter().any(|&v| v != 0.0));
//! ```

pub mod config;
pub mod error;
pub mod grid;
pub mod kernel;
pub mod obstacles;
pub mod simulation;
pub mod source;
pub mod wavefield;

pub use error::{FieldError, Result};
pub use grid::GridField;
pub use obstacles::{ObstacleMask, ObstacleShape};
pub use simulation::{
    FieldView, SimulationParameters, StepReport, WaveSimulation, MAX_STABLE_WAVE_SPEED,
    SOFT_CFL_FRACTION,
};
pub use source::{SourceImpulse, SourceInjector};
pub use wavefield::{BufferRoles, FieldBufferSet, Role};
