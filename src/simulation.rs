//! The SPH simulation core.
//!
//! `Simulation` owns the particle pool, spatial grid, foam and RNG, and
//! advances everything with `step(dt)`. Each frame runs a fixed number
//! of substeps, and each substep executes four passes in order:
//!
//! 1. density + Tait pressure
//! 2. force accumulation (pressure, viscosity, pointer, walls)
//! 3. integration (acceleration clamp, semi-implicit Euler, XSPH,
//!    damping, velocity clamp)
//! 4. constraints (pairwise separation, wall collision, foam spawning)
//!
//! Passes 1-3 are embarrassingly parallel and use the map/collect +
//! apply pattern; pass 4 mutates particle pairs and drives the RNG, so
//! it stays serial. Numerical corruption (NaN/inf) is detected at pass
//! boundaries and recovered by resetting the offending particle.

use std::fmt;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::color::ColorMode;
use crate::foam::FoamPool;
use crate::grid::{NeighborLists, SpatialGrid};
use crate::kernels::{tait_pressure, SmoothingKernels};
use crate::particle::Particle;
use crate::surface::{SurfaceField, SurfaceOptions, SurfacePolygon};
use crate::physics::{
    BOUNDARY_DISTANCE, BOUNDARY_FORCE, DAMPING_FACTOR, DEFAULT_PARTICLES, DEFAULT_SUBSTEPS,
    DEFAULT_TAIT_B, DEFAULT_VISCOSITY, FLOOR_FORCE_SCALE, FOAM_PARTICLE_MULTIPLIER,
    FOAM_SPAWN_VELOCITY_THRESHOLD, FRICTION, GRAVITY, H, H_SQ, INITIAL_SPACING, MAX_FRAME_DT,
    MAX_PARTICLES, MIN_DENSITY, MIN_PARTICLES, MIN_PARTICLE_DISTANCE, MOUSE_RADIUS,
    MOUSE_REPEL_SCALE, MOUSE_STRENGTH, PARTICLE_RADIUS, RESTITUTION, TAIT_GAMMA,
    TARGET_REST_DENSITY, VISUAL_RADIUS, XSPH_C,
};
use crate::tank::Tank;

/// Runtime-tunable solver parameters.
#[derive(Clone, Copy, Debug)]
pub struct SimParams {
    /// Tait EOS stiffness B.
    pub tait_b: f32,
    /// Substeps per frame.
    pub substeps: u32,
    /// Viscosity coefficient (0 disables the viscosity force).
    pub viscosity: f32,
    /// Gravity in pixels/s². Positive is down.
    pub gravity: f32,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            tait_b: DEFAULT_TAIT_B,
            substeps: DEFAULT_SUBSTEPS,
            viscosity: DEFAULT_VISCOSITY,
            gravity: GRAVITY,
        }
    }
}

/// Feature toggles, all on by default except velocity coloring.
#[derive(Clone, Copy, Debug)]
pub struct Toggles {
    pub metaballs: bool,
    pub foam: bool,
    pub lighting: bool,
    pub ripples: bool,
    pub color_mode: ColorMode,
}

impl Default for Toggles {
    fn default() -> Self {
        Self {
            metaballs: true,
            foam: true,
            lighting: true,
            ripples: true,
            color_mode: ColorMode::Depth,
        }
    }
}

/// Pointer interaction state, fed in by the host each frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct PointerState {
    pub position: Vec2,
    /// Primary button: attract.
    pub attract: bool,
    /// Secondary button: repel (1.5x stronger).
    pub repel: bool,
}

/// Per-frame bookkeeping returned by `step`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepStats {
    pub substeps_run: u32,
    /// Particles reset after NaN/inf detection this frame.
    pub recovered_particles: u32,
    pub foam_spawned: u32,
}

/// Frame-level failures. Corrupted particles are recovered internally
/// and reported through `StepStats`, not through this error.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StepError {
    /// The host handed us a NaN or infinite frame delta.
    NonFiniteDt(f32),
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepError::NonFiniteDt(dt) => write!(f, "non-finite frame delta: {dt}"),
        }
    }
}

impl std::error::Error for StepError {}

/// Turbulence accumulator cell for area foam spawning.
struct TurbCell {
    pos: Vec2,
    count: u32,
    total_vel_sq: f32,
    near_boundary: bool,
}

pub struct Simulation {
    pub params: SimParams,
    pub toggles: Toggles,
    pub pointer: PointerState,

    viewport: Vec2,
    tank: Tank,
    kernels: SmoothingKernels,
    max_velocity: f32,

    particles: Vec<Particle>,
    grid: SpatialGrid,
    neighbors: NeighborLists,
    foam: FoamPool,
    rng: ChaCha8Rng,
    total_time: f32,
    surface: SurfaceField,

    /// Flat (x,y) pairs mirroring particle positions, rebuilt each frame.
    positions: Vec<f32>,
    foam_positions: Vec<f32>,
    foam_colors: Vec<f32>,

    // Scratch for the map/collect passes.
    density_scratch: Vec<(f32, f32, f32)>,
    accel_scratch: Vec<Vec2>,
    xsph_scratch: Vec<Vec2>,
}

impl Simulation {
    pub fn new(viewport_width: f32, viewport_height: f32, seed: u64) -> Self {
        let tank = Tank::from_viewport(viewport_width, viewport_height);
        let mut sim = Self {
            params: SimParams::default(),
            toggles: Toggles::default(),
            pointer: PointerState::default(),
            viewport: Vec2::new(viewport_width, viewport_height),
            tank,
            kernels: SmoothingKernels::new(H, INITIAL_SPACING, TARGET_REST_DENSITY),
            max_velocity: viewport_width.max(viewport_height) * 0.8,
            particles: Vec::new(),
            grid: SpatialGrid::new(H),
            neighbors: NeighborLists::default(),
            foam: FoamPool::new(DEFAULT_PARTICLES * FOAM_PARTICLE_MULTIPLIER),
            rng: ChaCha8Rng::seed_from_u64(seed),
            total_time: 0.0,
            surface: SurfaceField::new(),
            positions: Vec::new(),
            foam_positions: Vec::new(),
            foam_colors: Vec::new(),
            density_scratch: Vec::new(),
            accel_scratch: Vec::new(),
            xsph_scratch: Vec::new(),
        };
        sim.spawn_particles(DEFAULT_PARTICLES);
        sim
    }

    pub fn tank(&self) -> Tank {
        self.tank
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn total_time(&self) -> f32 {
        self.total_time
    }

    /// Flat (x,y) buffer for the presentation layer.
    pub fn particle_positions(&self) -> &[f32] {
        &self.positions
    }

    /// Flat (x,y) buffer for live foam.
    pub fn foam_positions(&self) -> &[f32] {
        &self.foam_positions
    }

    /// Flat RGBA (0-1 channels) buffer for live foam. Foam is white
    /// with per-particle alpha fading over its lifetime.
    pub fn foam_colors(&self) -> &[f32] {
        &self.foam_colors
    }

    pub fn foam_count(&self) -> usize {
        self.foam.len()
    }

    /// Average speed over live particles, for host HUDs.
    pub fn average_speed(&self) -> f32 {
        if self.particles.is_empty() {
            return 0.0;
        }
        let sum: f32 = self.particles.iter().map(|p| p.velocity.length()).sum();
        sum / self.particles.len() as f32
    }

    /// Average SPH density over live particles.
    pub fn average_density(&self) -> f32 {
        if self.particles.is_empty() {
            return 0.0;
        }
        let sum: f32 = self.particles.iter().map(|p| p.density).sum();
        sum / self.particles.len() as f32
    }

    /// Extract the water surface polygons for the current frame.
    /// Empty when the metaball surface is toggled off.
    pub fn surface_polygons(&mut self) -> &[SurfacePolygon] {
        if !self.toggles.metaballs {
            return &[];
        }
        let opts = SurfaceOptions {
            color_mode: self.toggles.color_mode,
            ripples: self.toggles.ripples,
            lighting: self.toggles.lighting,
            time: self.total_time,
        };
        self.surface
            .build(&self.particles, &self.tank, self.viewport, &opts)
    }

    /// Recompute the tank from a new viewport. Existing particles are
    /// clamped into the new tank so no one is stranded in a wall.
    pub fn resize(&mut self, viewport_width: f32, viewport_height: f32) {
        self.viewport = Vec2::new(viewport_width, viewport_height);
        self.tank = Tank::from_viewport(viewport_width, viewport_height);
        self.max_velocity = viewport_width.max(viewport_height) * 0.8;
        let tank = self.tank;
        for p in &mut self.particles {
            p.position.x = p
                .position
                .x
                .clamp(tank.min_x() + VISUAL_RADIUS, tank.max_x() - VISUAL_RADIUS);
            p.position.y = p
                .position
                .y
                .clamp(tank.min_y() + VISUAL_RADIUS, tank.max_y() - VISUAL_RADIUS);
        }
    }

    /// Change the particle count (clamped to the pool limits) and
    /// respawn the whole block. Foam capacity follows the new count.
    pub fn set_particle_count(&mut self, count: usize) {
        let count = count.clamp(MIN_PARTICLES, MAX_PARTICLES);
        self.spawn_particles(count);
        self.foam.set_capacity(count * FOAM_PARTICLE_MULTIPLIER);
        self.foam.clear();
    }

    /// Lay the particles out as a jittered lattice in the top half of
    /// the tank, centered horizontally, clamped inside the walls.
    fn spawn_particles(&mut self, count: usize) {
        self.particles.clear();
        let tank = self.tank;
        let spawn_width = tank.width;
        let spawn_height = tank.height * 0.5;

        let est_cols = ((spawn_width / INITIAL_SPACING).floor() as usize).max(1);
        let start_x = tank.x + spawn_width / 2.0 - (est_cols as f32 / 2.0) * INITIAL_SPACING;
        let start_y = tank.y + spawn_height * 0.2;

        let inset = PARTICLE_RADIUS + 1.0;
        for i in 0..count {
            let col = (i % est_cols) as f32;
            let row = (i / est_cols) as f32;
            let jitter_x = (self.rng.gen::<f32>() - 0.5) * INITIAL_SPACING * 0.1;
            let jitter_y = (self.rng.gen::<f32>() - 0.5) * INITIAL_SPACING * 0.1;
            let x = (start_x + col * INITIAL_SPACING + jitter_x)
                .clamp(tank.min_x() + inset, tank.max_x() - inset);
            let y = (start_y + row * INITIAL_SPACING + jitter_y)
                .clamp(tank.min_y() + inset, tank.max_y() - inset);
            self.particles.push(Particle::new(Vec2::new(x, y)));
        }
        self.sync_position_buffer();
        log::info!("spawned {} particles in tank {:?}", count, tank);
    }

    /// Safe position for numerically corrupted particles: top middle of
    /// the viewport, well inside the spawn region.
    fn recovery_position(&self) -> Vec2 {
        Vec2::new(self.viewport.x / 2.0, self.viewport.y / 5.0)
    }

    /// Advance the simulation by one frame.
    ///
    /// `dt` is clamped to `MAX_FRAME_DT`; zero or negative deltas make
    /// the frame a no-op (grid and physics untouched). A non-finite
    /// delta is the host's bug and comes back as an error.
    pub fn step(&mut self, dt: f32) -> Result<StepStats, StepError> {
        if !dt.is_finite() {
            return Err(StepError::NonFiniteDt(dt));
        }
        let dt = dt.min(MAX_FRAME_DT);
        let mut stats = StepStats::default();
        if dt <= 0.0 || self.params.substeps == 0 || self.particles.is_empty() {
            return Ok(stats);
        }
        self.total_time += dt;

        let sub_dt = dt / self.params.substeps as f32;
        for _ in 0..self.params.substeps {
            self.grid.rebuild(&self.particles);
            self.neighbors.rebuild(&self.grid, &self.particles, H);
            stats.recovered_particles += self.density_pressure_pass();
            stats.recovered_particles += self.force_pass();
            stats.recovered_particles += self.integrate_pass(sub_dt);
            stats.foam_spawned += self.constraint_pass();
            stats.substeps_run += 1;
        }

        if self.toggles.foam {
            self.foam.update(dt, &self.tank, self.params.gravity);
        }
        self.sync_position_buffer();
        self.sync_foam_buffers();
        Ok(stats)
    }

    /// Pass 1: SPH density (Poly6 over neighbors plus self term) and
    /// Tait pressure. Returns the number of recovered particles.
    fn density_pressure_pass(&mut self) -> u32 {
        let kernels = self.kernels;
        let tait_b = self.params.tait_b;
        let particles = &self.particles;
        let neighbors = &self.neighbors;

        self.density_scratch.clear();
        (0..particles.len())
            .into_par_iter()
            .map(|i| {
                let mut density = kernels.particle_mass * kernels.poly6_at_zero();
                for n in neighbors.of(i) {
                    if n.dist_sq < H_SQ {
                        density += kernels.particle_mass * kernels.poly6(n.dist_sq);
                    }
                }
                let density = density.max(MIN_DENSITY);
                let ratio = density / TARGET_REST_DENSITY;
                let compression = (ratio - 1.0).max(0.0);
                let pressure = tait_pressure(density, TARGET_REST_DENSITY, tait_b, TAIT_GAMMA);
                (density, pressure, compression)
            })
            .collect_into_vec(&mut self.density_scratch);

        let mut recovered = 0;
        for (i, p) in self.particles.iter_mut().enumerate() {
            let (density, pressure, compression) = self.density_scratch[i];
            if !density.is_finite() || !pressure.is_finite() {
                log::error!("invalid density/pressure for particle {i}, resetting fields");
                p.density = TARGET_REST_DENSITY;
                p.pressure = 0.0;
                p.compression = 0.0;
                recovered += 1;
                continue;
            }
            p.density = density;
            p.pressure = pressure;
            p.compression = compression;
        }
        recovered
    }

    /// Pass 2: accumulate pressure, viscosity, pointer and boundary
    /// forces into acceleration. Particles entering the pass with a
    /// corrupted state are reset first.
    fn force_pass(&mut self) -> u32 {
        let mut recovered = 0;
        let recovery_pos = self.recovery_position();
        for (i, p) in self.particles.iter_mut().enumerate() {
            if !p.is_finite() {
                log::error!("invalid state entering force pass for particle {i}, resetting");
                p.reset(recovery_pos);
                recovered += 1;
            }
        }

        let kernels = self.kernels;
        let params = self.params;
        let pointer = self.pointer;
        let tank = self.tank;
        let particles = &self.particles;
        let neighbors = &self.neighbors;

        self.accel_scratch.clear();
        (0..particles.len())
            .into_par_iter()
            .map(|i| {
                let p = &particles[i];
                let mut pressure_force = Vec2::ZERO;
                let mut viscosity_force = Vec2::ZERO;

                let p_density = p.density.max(MIN_DENSITY);
                let p_density_sq = p_density * p_density;

                for n in neighbors.of(i) {
                    let other = &particles[n.index];
                    if n.dist < 1e-6 || !other.is_finite() {
                        continue;
                    }
                    let n_density = other.density.max(MIN_DENSITY);

                    let h_minus_r = H - n.dist;
                    if h_minus_r > 0.0 {
                        let n_density_sq = n_density * n_density;
                        let pressure_term =
                            p.pressure / p_density_sq + other.pressure / n_density_sq;
                        let grad = kernels.spiky_grad_magnitude(n.dist);
                        let magnitude = kernels.particle_mass * pressure_term * grad;
                        let contrib = Vec2::new(n.dx, n.dy) * (magnitude / n.dist);
                        if contrib.is_finite() {
                            pressure_force -= contrib;
                        }
                    }

                    if params.viscosity > 0.0 && n.dist_sq < H_SQ {
                        let dv = other.velocity - p.velocity;
                        let w = kernels.poly6(n.dist_sq);
                        let avg_density =
                            (0.5 * (p_density + n_density)).max(MIN_DENSITY * 0.5);
                        let term = params.viscosity * kernels.particle_mass * w / avg_density;
                        if term.is_finite() {
                            viscosity_force += dv * term;
                        }
                    }
                }

                let mouse_force = pointer_force(p.position, pointer);
                let boundary_force = wall_penalty(p.position, tank);

                let mut accel = Vec2::new(0.0, params.gravity);
                let total = pressure_force + viscosity_force + mouse_force + boundary_force;
                if total.is_finite() {
                    accel += total / kernels.particle_mass;
                }
                if !accel.is_finite() {
                    accel = Vec2::new(0.0, params.gravity);
                }
                accel
            })
            .collect_into_vec(&mut self.accel_scratch);

        self.particles
            .par_iter_mut()
            .zip(self.accel_scratch.par_iter())
            .for_each(|(p, accel)| p.acceleration = *accel);
        recovered
    }

    /// Pass 3: clamp acceleration, semi-implicit Euler, XSPH velocity
    /// smoothing, global damping, velocity clamp, position update.
    ///
    /// XSPH reads the post-Euler velocities of all particles from an
    /// immutable snapshot, so the correction is order-independent.
    fn integrate_pass(&mut self, sub_dt: f32) -> u32 {
        let max_acc = 150.0 * self.params.gravity.abs() + 150_000.0;
        let max_acc_sq = max_acc * max_acc;

        self.particles.par_iter_mut().for_each(|p| {
            let mut acc = if p.acceleration.is_finite() {
                p.acceleration
            } else {
                Vec2::ZERO
            };
            let acc_sq = acc.length_squared();
            if acc_sq > max_acc_sq {
                let mag = acc_sq.sqrt();
                acc = if mag.is_finite() && mag > 1e-9 {
                    acc * (max_acc / mag)
                } else {
                    Vec2::ZERO
                };
            }
            p.acceleration = acc;
            p.velocity += acc * sub_dt;
        });

        let kernels = self.kernels;
        let particles = &self.particles;
        let neighbors = &self.neighbors;
        self.xsph_scratch.clear();
        (0..particles.len())
            .into_par_iter()
            .map(|i| {
                let p = &particles[i];
                let mut correction = Vec2::ZERO;
                for n in neighbors.of(i) {
                    let other = &particles[n.index];
                    if !other.velocity.is_finite() {
                        continue;
                    }
                    if n.dist_sq < H_SQ {
                        correction += (other.velocity - p.velocity) * kernels.poly6(n.dist_sq);
                    }
                }
                correction * XSPH_C
            })
            .collect_into_vec(&mut self.xsph_scratch);

        let max_velocity = self.max_velocity;
        let max_velocity_sq = max_velocity * max_velocity;
        let damping = 1.0 - DAMPING_FACTOR;
        let needs_reset: Vec<bool> = self
            .particles
            .par_iter_mut()
            .zip(self.xsph_scratch.par_iter())
            .map(|(p, correction)| {
                p.velocity += *correction;
                p.velocity *= damping;

                let vel_sq = p.velocity.length_squared();
                if vel_sq > max_velocity_sq {
                    let mag = vel_sq.sqrt();
                    p.velocity = if mag.is_finite() && mag > 1e-9 {
                        p.velocity * (max_velocity / mag)
                    } else {
                        Vec2::ZERO
                    };
                }
                if !p.velocity.is_finite() {
                    p.velocity = Vec2::ZERO;
                }

                let next = p.position + p.velocity * sub_dt;
                if !next.is_finite() {
                    return true;
                }
                p.position = next;
                false
            })
            .collect();

        let mut recovered = 0;
        let recovery_pos = self.recovery_position();
        for (i, reset) in needs_reset.iter().enumerate() {
            if *reset {
                log::error!("invalid position for particle {i} after integration, resetting");
                self.particles[i].reset(recovery_pos);
                recovered += 1;
            }
        }
        recovered
    }

    /// Pass 4: serial constraint resolution.
    ///
    /// Enforces the minimum inter-particle distance with symmetric
    /// half-overlap pushes plus a small normal impulse, resolves wall
    /// collisions with friction and restitution, and spawns foam from
    /// hard wall impacts, fast free particles and turbulent pockets.
    /// Returns the number of foam particles spawned.
    fn constraint_pass(&mut self) -> u32 {
        let tank = self.tank;
        let min_x = tank.min_x();
        let max_x = tank.max_x();
        let min_y = tank.min_y();
        let max_y = tank.max_y();
        if max_x <= min_x || max_y <= min_y {
            log::warn!("degenerate tank {tank:?}, skipping constraints");
            return 0;
        }

        let friction_factor = 1.0 - FRICTION.clamp(0.0, 1.0);
        let restitution = RESTITUTION.clamp(0.0, 1.0);
        let threshold_sq = FOAM_SPAWN_VELOCITY_THRESHOLD * FOAM_SPAWN_VELOCITY_THRESHOLD;
        let min_dist_sq = MIN_PARTICLE_DISTANCE * MIN_PARTICLE_DISTANCE;
        let foam_enabled = self.toggles.foam;
        let turb_cell_size = H * 1.5;
        let near_boundary_dist = H * 2.0;

        let mut turbulence: FxHashMap<(i32, i32), TurbCell> = FxHashMap::default();
        let mut foam_spawned = 0u32;

        let particles = &mut self.particles;
        let neighbors = &self.neighbors;
        let foam = &mut self.foam;
        let rng = &mut self.rng;

        for i in 0..particles.len() {
            let mut p = particles[i];
            if !p.position.is_finite() || !p.velocity.is_finite() {
                log::warn!("skipping constraints for corrupted particle {i}");
                continue;
            }

            if foam_enabled {
                let vel_sq = p.speed_sq();
                if vel_sq > threshold_sq * 0.5 {
                    let key = (
                        (p.position.x / turb_cell_size).floor() as i32,
                        (p.position.y / turb_cell_size).floor() as i32,
                    );
                    let cell = turbulence.entry(key).or_insert_with(|| TurbCell {
                        pos: p.position,
                        count: 0,
                        total_vel_sq: 0.0,
                        near_boundary: false,
                    });
                    cell.count += 1;
                    cell.total_vel_sq += vel_sq;
                    let wall = (p.position.x - min_x)
                        .min(max_x - p.position.x)
                        .min(p.position.y - min_y)
                        .min(max_y - p.position.y);
                    if wall < near_boundary_dist {
                        cell.near_boundary = true;
                    }
                }
            }

            // Minimum-distance enforcement. Offsets are recomputed from
            // live positions since earlier iterations may have moved
            // either particle.
            for n in neighbors.of(i) {
                let j = n.index;
                let mut q = particles[j];
                if !q.position.is_finite() {
                    continue;
                }
                let delta = q.position - p.position;
                let dist_sq = delta.length_squared();
                if dist_sq < min_dist_sq && dist_sq > 1e-12 {
                    let dist = dist_sq.sqrt();
                    let overlap = MIN_PARTICLE_DISTANCE - dist;
                    let normal = delta / dist;
                    let correction = normal * (overlap * 0.5);
                    p.position -= correction;
                    q.position += correction;

                    let p_vn = p.velocity.dot(normal);
                    let q_vn = q.velocity.dot(normal);
                    let impulse = (p_vn - q_vn) * 0.5;
                    if impulse.is_finite() {
                        p.velocity -= normal * impulse * 0.1;
                        q.velocity += normal * impulse * 0.1;
                    }
                    particles[j] = q;
                }
            }

            // Wall collision with friction on the tangent and
            // restitution on the normal. Corner hits use the larger of
            // the two axis speeds for foam intensity.
            let pre_collision_vel = p.velocity;
            let mut collided = false;
            let mut collision_speed = 0.0f32;
            let mut collision_normal = Vec2::ZERO;

            if p.position.x < min_x + VISUAL_RADIUS {
                collision_speed = p.velocity.x.abs();
                p.position.x = min_x + VISUAL_RADIUS;
                if p.velocity.x < 0.0 {
                    p.velocity.y *= friction_factor;
                    p.velocity.x *= -restitution;
                    collided = true;
                    collision_normal = Vec2::X;
                }
            } else if p.position.x > max_x - VISUAL_RADIUS {
                collision_speed = p.velocity.x.abs();
                p.position.x = max_x - VISUAL_RADIUS;
                if p.velocity.x > 0.0 {
                    p.velocity.y *= friction_factor;
                    p.velocity.x *= -restitution;
                    collided = true;
                    collision_normal = Vec2::NEG_X;
                }
            }

            if p.position.y < min_y + VISUAL_RADIUS {
                collision_speed = collision_speed.max(p.velocity.y.abs());
                p.position.y = min_y + VISUAL_RADIUS;
                if p.velocity.y < 0.0 {
                    p.velocity.x *= friction_factor;
                    p.velocity.y *= -restitution;
                    collided = true;
                    collision_normal = Vec2::Y;
                }
            } else if p.position.y > max_y - VISUAL_RADIUS {
                collision_speed = collision_speed.max(p.velocity.y.abs());
                p.position.y = max_y - VISUAL_RADIUS;
                if p.velocity.y > 0.0 {
                    p.velocity.x *= friction_factor;
                    p.velocity.y *= -restitution;
                    collided = true;
                    collision_normal = Vec2::NEG_Y;
                }
            }

            if !p.velocity.is_finite() {
                log::warn!("invalid velocity after wall response for particle {i}, zeroing");
                p.velocity = Vec2::ZERO;
            }

            if foam_enabled {
                if collided && collision_speed * collision_speed > threshold_sq {
                    let intensity =
                        (collision_speed / FOAM_SPAWN_VELOCITY_THRESHOLD).floor().min(10.0);
                    let count = 1 + (intensity * 0.5).floor() as usize;
                    foam_spawned += foam.spawn_directional(
                        p.position,
                        pre_collision_vel,
                        collision_normal,
                        count,
                        rng,
                    ) as u32;
                } else if p.speed_sq() > threshold_sq * 1.2 && rng.gen::<f32>() < 0.03 {
                    foam_spawned += foam.spawn(p.position, p.velocity, 1, rng) as u32;
                }
            }

            particles[i] = p;
        }

        // Area spawning from turbulent pockets: at least three fast
        // particles sharing a cell, with boundary-adjacent pockets both
        // likelier to fire and producing more foam.
        if foam_enabled {
            for cell in turbulence.values() {
                if cell.count < 3 {
                    continue;
                }
                let avg_vel_sq = cell.total_vel_sq / cell.count as f32;
                if avg_vel_sq <= threshold_sq * 0.8 {
                    continue;
                }
                let chance = if cell.near_boundary { 0.4 } else { 0.1 };
                if rng.gen::<f32>() < chance {
                    let speed = avg_vel_sq.sqrt() * 0.2;
                    let angle = rng.gen::<f32>() * std::f32::consts::TAU;
                    let vel = Vec2::new(
                        angle.cos() * speed,
                        angle.sin() * speed - speed * 0.5,
                    );
                    let count = if cell.near_boundary {
                        1 + (avg_vel_sq / threshold_sq).min(3.0) as usize
                    } else {
                        1
                    };
                    foam_spawned += foam.spawn(cell.pos, vel, count, rng) as u32;
                }
            }
        }
        foam_spawned
    }

    fn sync_position_buffer(&mut self) {
        self.positions.clear();
        self.positions.reserve(self.particles.len() * 2);
        for p in &self.particles {
            self.positions.push(p.position.x);
            self.positions.push(p.position.y);
        }
    }

    fn sync_foam_buffers(&mut self) {
        self.foam_positions.clear();
        self.foam_colors.clear();
        for f in self.foam.particles() {
            self.foam_positions.push(f.position.x);
            self.foam_positions.push(f.position.y);
            self.foam_colors.extend_from_slice(&[1.0, 1.0, 1.0, f.alpha]);
        }
    }
}

/// Radial pointer force: squared linear falloff over the pointer
/// radius, attraction toward the pointer on the primary button,
/// 1.5x repulsion on the secondary.
fn pointer_force(pos: Vec2, pointer: PointerState) -> Vec2 {
    if !pointer.attract && !pointer.repel {
        return Vec2::ZERO;
    }
    let delta = pos - pointer.position;
    let dist_sq = delta.length_squared();
    let radius_sq = MOUSE_RADIUS * MOUSE_RADIUS;
    if dist_sq >= radius_sq || dist_sq <= 1e-6 {
        return Vec2::ZERO;
    }
    let dist = dist_sq.sqrt();
    let factor = 1.0 - dist / MOUSE_RADIUS;
    let strength = MOUSE_STRENGTH * factor * factor;
    let magnitude = strength / (dist + 1e-6);
    let dir = delta / dist;
    if pointer.attract {
        -dir * magnitude
    } else {
        dir * magnitude * MOUSE_REPEL_SCALE
    }
}

/// Linear penalty force inside the boundary band of each wall. The
/// floor pushes back harder since it carries the column's weight.
fn wall_penalty(pos: Vec2, tank: Tank) -> Vec2 {
    let mut force = Vec2::ZERO;
    if tank.width <= 0.0 {
        return force;
    }
    let band = BOUNDARY_DISTANCE;
    if pos.x < tank.min_x() + band {
        let penetration = (tank.min_x() + band) - pos.x;
        force.x += BOUNDARY_FORCE * (penetration / band);
    }
    if pos.x > tank.max_x() - band {
        let penetration = pos.x - (tank.max_x() - band);
        force.x -= BOUNDARY_FORCE * (penetration / band);
    }
    if pos.y < tank.min_y() + band {
        let penetration = (tank.min_y() + band) - pos.y;
        force.y += BOUNDARY_FORCE * (penetration / band);
    }
    if pos.y > tank.max_y() - band {
        let penetration = pos.y - (tank.max_y() - band);
        force.y -= BOUNDARY_FORCE * (penetration / band) * FLOOR_FORCE_SCALE;
    }
    force
}
