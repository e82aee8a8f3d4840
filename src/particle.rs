//! Fluid and foam particle value types.
//!
//! Particles live in a fixed pool owned by `Simulation`; they are
//! mutated in place every substep and never individually destroyed.
//! Neighbor data is not stored here; it lives in the per-substep
//! `NeighborLists` arena keyed by particle index.

use glam::Vec2;

use crate::physics::TARGET_REST_DENSITY;

/// A single SPH water particle.
#[derive(Clone, Copy, Debug)]
pub struct Particle {
    /// Position in viewport pixel coordinates.
    pub position: Vec2,
    pub velocity: Vec2,
    /// Acceleration accumulated by the force pass, consumed by integration.
    pub acceleration: Vec2,
    /// Smoothed density from the last density pass (≥ MIN_DENSITY).
    pub density: f32,
    /// Tait EOS pressure (≥ 0).
    pub pressure: f32,
    /// max(0, density/rest - 1). Diagnostic, not fed back into forces.
    pub compression: f32,
}

impl Particle {
    pub fn new(position: Vec2) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            acceleration: Vec2::ZERO,
            density: TARGET_REST_DENSITY,
            pressure: 0.0,
            compression: 0.0,
        }
    }

    /// Reset to a deterministic safe state at `position`.
    ///
    /// Postcondition: zero velocity and acceleration, rest density,
    /// zero pressure and compression. Used for numerical-corruption
    /// recovery and leaves the particle indistinguishable from a
    /// freshly spawned one.
    pub fn reset(&mut self, position: Vec2) {
        *self = Self::new(position);
    }

    /// True when every dynamic field is finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.position.is_finite()
            && self.velocity.is_finite()
            && self.density.is_finite()
            && self.pressure.is_finite()
    }

    #[inline]
    pub fn speed_sq(&self) -> f32 {
        self.velocity.length_squared()
    }
}

/// A foam particle: position, velocity and remaining lifespan.
///
/// Foam is purely decorative; it never feeds back into the SPH solve.
#[derive(Clone, Copy, Debug)]
pub struct FoamParticle {
    pub position: Vec2,
    pub velocity: Vec2,
    /// Remaining lifespan in seconds. ≤ 0 means dead.
    pub life: f32,
    /// Alpha handed to the presentation layer (foam is white).
    pub alpha: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_postcondition() {
        let mut p = Particle::new(Vec2::new(10.0, 20.0));
        p.velocity = Vec2::new(500.0, -300.0);
        p.acceleration = Vec2::new(1.0, 2.0);
        p.density = f32::NAN;
        p.pressure = f32::INFINITY;
        p.compression = 3.0;

        p.reset(Vec2::new(64.0, 32.0));

        assert_eq!(p.position, Vec2::new(64.0, 32.0));
        assert_eq!(p.velocity, Vec2::ZERO);
        assert_eq!(p.acceleration, Vec2::ZERO);
        assert_eq!(p.density, TARGET_REST_DENSITY);
        assert_eq!(p.pressure, 0.0);
        assert_eq!(p.compression, 0.0);
        assert!(p.is_finite());
    }

    #[test]
    fn test_is_finite_detects_corruption() {
        let mut p = Particle::new(Vec2::ZERO);
        assert!(p.is_finite());
        p.velocity.x = f32::NAN;
        assert!(!p.is_finite());
    }
}
