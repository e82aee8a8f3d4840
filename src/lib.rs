//! Real-time 2D SPH water tank simulation.
//!
//! The crate is framework-agnostic: `Simulation::step` advances the
//! fluid and the presentation layer reads back flat position/color
//! buffers and surface polygons to draw however it likes.
//!
//! ```no_run
//! use tanksim::Simulation;
//!
//! let mut sim = Simulation::new(1280.0, 720.0, 42);
//! loop {
//!     let stats = sim.step(1.0 / 60.0).expect("finite dt");
//!     let _positions = sim.particle_positions();
//!     let _surface = sim.surface_polygons();
//!     if stats.recovered_particles > 0 {
//!         eprintln!("recovered {} particles", stats.recovered_particles);
//!     }
//! }
//! ```

pub mod color;
pub mod foam;
pub mod grid;
pub mod kernels;
pub mod particle;
pub mod physics;
pub mod simulation;
pub mod surface;
pub mod tank;

pub use color::{ColorMode, Rgba};
pub use particle::{FoamParticle, Particle};
pub use simulation::{PointerState, SimParams, Simulation, StepError, StepStats, Toggles};
pub use surface::{SurfaceOptions, SurfacePolygon};
pub use tank::Tank;
