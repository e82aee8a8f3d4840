//! Unified physics constants for the SPH tank simulation.
//!
//! All simulation modules should use these constants instead of defining
//! their own. This prevents drift between subsystems and makes tuning
//! easier. Runtime-tunable values (stiffness, substeps, viscosity,
//! particle count, gravity) live in `SimParams`; these are their defaults
//! plus everything tuned directly in code.

/// Simulation gravity in pixels/s².
pub const GRAVITY: f32 = 980.0;

/// Interaction radius of a single particle in pixels.
///
/// Drives the minimum-separation constraint, the boundary force band and
/// (via `INITIAL_SPACING`) the smoothing radius.
pub const PARTICLE_RADIUS: f32 = 22.0;

/// Initial lattice spacing when spawning the particle block.
pub const INITIAL_SPACING: f32 = PARTICLE_RADIUS * 1.8;

/// SPH smoothing radius. Larger than the spawn spacing for stability
/// (each particle sees two rings of neighbors at rest).
pub const H: f32 = INITIAL_SPACING * 2.0;

/// `H * H`, precomputed for squared-distance compares.
pub const H_SQ: f32 = H * H;

/// Target rest density for the equation of state (dimensionless).
///
/// Particle mass is derived from this and the spawn spacing so that a
/// particle at rest in the lattice sits at density ratio ~1.
pub const TARGET_REST_DENSITY: f32 = 0.8;

/// Tait equation-of-state exponent (7 is the standard value for water).
pub const TAIT_GAMMA: f32 = 7.0;

/// Default Tait stiffness B. Runtime-tunable via `SimParams::tait_b`.
pub const DEFAULT_TAIT_B: f32 = 50_000.0;

/// Default substep count per frame.
pub const DEFAULT_SUBSTEPS: u32 = 20;

/// Default viscosity coefficient.
pub const DEFAULT_VISCOSITY: f32 = 0.05;

/// Density floor. Densities are clamped here before any division.
pub const MIN_DENSITY: f32 = 0.01;

/// Density ratio cap applied before exponentiation in the Tait EOS,
/// so a momentarily crushed particle cannot overflow `powf`.
pub const MAX_DENSITY_RATIO_FOR_POW: f32 = 50.0;

/// Repulsive penalty force at the tank walls (per unit penetration).
pub const BOUNDARY_FORCE: f32 = 500_000_000.0;

/// Distance from a wall at which the penalty force activates.
pub const BOUNDARY_DISTANCE: f32 = PARTICLE_RADIUS;

/// Extra multiplier on the bottom-wall penalty (the floor carries the
/// whole column's weight).
pub const FLOOR_FORCE_SCALE: f32 = 1.2;

/// Tangential velocity retained fraction is `1 - FRICTION` on wall hits.
pub const FRICTION: f32 = 0.2;

/// Normal velocity reflected fraction on wall hits. Nearly inelastic.
pub const RESTITUTION: f32 = 0.02;

/// Global per-substep multiplicative velocity damping.
pub const DAMPING_FACTOR: f32 = 0.001;

/// XSPH velocity-smoothing coefficient.
pub const XSPH_C: f32 = 0.01;

/// Minimum particle separation enforced by the constraint pass.
pub const MIN_PARTICLE_DISTANCE: f32 = PARTICLE_RADIUS;

/// Radius used for wall collision clamping. Half the drawn point size,
/// so particles never render outside the tank.
pub const VISUAL_RADIUS: f32 = 12.5;

/// Particle count limits for the pool.
pub const MIN_PARTICLES: usize = 100;
pub const MAX_PARTICLES: usize = 5_000;
pub const DEFAULT_PARTICLES: usize = 1_000;

/// Tank rectangle as fractions of the viewport.
pub const TANK_WIDTH_RATIO: f32 = 0.7;
pub const TANK_HEIGHT_RATIO: f32 = 0.8;
pub const TANK_TOP_OFFSET_RATIO: f32 = 0.05;

/// Pointer interaction: falloff radius and base strength. Repulsion
/// (secondary button) is `MOUSE_REPEL_SCALE` stronger than attraction.
pub const MOUSE_RADIUS: f32 = 200.0;
pub const MOUSE_STRENGTH: f32 = 5_000_000_000.0;
pub const MOUSE_REPEL_SCALE: f32 = 1.5;

/// Frame delta cap. Protects against runaway substep excursions after a
/// host stall (backgrounded tab, debugger pause).
pub const MAX_FRAME_DT: f32 = 1.0 / 30.0;

// --- Foam ---

/// Base foam lifespan in seconds (randomized ±20% at spawn).
pub const FOAM_LIFESPAN: f32 = 1.8;

/// Collision speed (pixels/s) above which wall hits spawn foam.
pub const FOAM_SPAWN_VELOCITY_THRESHOLD: f32 = 500.0;

/// Foam pool capacity = particle count × this multiplier.
pub const FOAM_PARTICLE_MULTIPLIER: usize = 3;

/// Per-frame multiplicative air drag on foam velocity.
pub const FOAM_DRAG: f32 = 0.985;

/// Foam feels this fraction of gravity.
pub const FOAM_GRAVITY_SCALE: f32 = 0.15;

/// Foam wall bounce restitution (floor hits kill the particle instead).
pub const FOAM_RESTITUTION: f32 = 0.1;

/// Half the drawn foam point size, used for wall clamping.
pub const FOAM_VISUAL_RADIUS: f32 = 2.5;

// --- Surface extraction ---

/// Scalar field cell size in pixels. Independent of the physics grid;
/// purely a rendering-detail knob.
pub const SURFACE_CELL_SIZE: f32 = 12.0;

/// Iso-contour threshold for marching squares.
pub const METABALL_THRESHOLD: f32 = 0.8;

/// Metaball influence radius before the 1.2 coverage widening.
pub const METABALL_RADIUS: f32 = H;

/// Peak field contribution of one particle.
pub const METABALL_STRENGTH: f32 = 1.5;

/// Weight applied to wall-mirrored particle contributions.
pub const MIRROR_WEIGHT: f32 = 0.6;

// --- Surface ripples ---

pub const RIPPLE_AMPLITUDE: f32 = 2.5;
pub const RIPPLE_FREQUENCY: f32 = 1.0;
pub const RIPPLE_SPEED: f32 = 0.8;
pub const RIPPLE_DETAIL: f32 = 1.3;

// --- Lighting ---

/// Fixed light direction (not normalized; normalized at use).
pub const LIGHT_DIRECTION: (f32, f32) = (0.2, -0.9);
pub const AMBIENT_LIGHT: f32 = 0.5;
pub const DIFFUSE_STRENGTH: f32 = 0.4;
pub const SPECULAR_STRENGTH: f32 = 0.3;
pub const SPECULAR_SHININESS: f32 = 12.0;
pub const NORMAL_STRENGTH: f32 = 1.8;
