//! 2D SPH smoothing kernels and the Tait equation of state.
//!
//! Kernel normalization factors depend only on the smoothing radius H,
//! so they are derived once per configuration instead of per call:
//! - Poly6 2D:          W(r) = (4 / (pi * h^8)) * (h^2 - r^2)^3
//! - Spiky gradient 2D: |∇W(r)| factor = -(30 / (pi * h^5)) * (h - r)^2
//!
//! Particle mass is area-based: mass = rest_density * spacing^2, so a
//! particle at rest in the spawn lattice accumulates density ≈ rest.

use std::f32::consts::PI;

use crate::physics::{MAX_DENSITY_RATIO_FOR_POW, MIN_DENSITY};

/// Precomputed kernel constants for a fixed smoothing radius.
#[derive(Clone, Copy, Debug)]
pub struct SmoothingKernels {
    pub h: f32,
    pub h_sq: f32,
    pub poly6_factor: f32,
    pub spiky_grad_factor: f32,
    pub particle_mass: f32,
}

impl SmoothingKernels {
    /// Derive kernel factors and particle mass.
    ///
    /// A degenerate radius (< 1e-9) or non-positive rest density is a
    /// configuration fault: factors zero out and mass falls back to 1.0
    /// so the pipeline keeps running with inert kernels.
    pub fn new(h: f32, spacing: f32, rest_density: f32) -> Self {
        if h < 1e-9 {
            log::error!("smoothing radius {h} is degenerate, kernels disabled");
            return Self {
                h,
                h_sq: h * h,
                poly6_factor: 0.0,
                spiky_grad_factor: 0.0,
                particle_mass: 1.0,
            };
        }

        let particle_area = spacing * spacing;
        let particle_mass = if rest_density <= 0.0 || particle_area <= 0.0 {
            log::error!(
                "invalid rest density {rest_density} or spacing {spacing}, mass falls back to 1.0"
            );
            1.0
        } else {
            rest_density * particle_area
        };

        Self {
            h,
            h_sq: h * h,
            poly6_factor: 4.0 / (PI * h.powi(8)),
            spiky_grad_factor: -30.0 / (PI * h.powi(5)),
            particle_mass,
        }
    }

    /// Poly6 kernel evaluated from a squared distance. Zero outside H.
    #[inline]
    pub fn poly6(&self, dist_sq: f32) -> f32 {
        if dist_sq >= self.h_sq {
            return 0.0;
        }
        let term = self.h_sq - dist_sq;
        self.poly6_factor * term * term * term
    }

    /// Poly6 at zero distance: 4 / (pi * h^2). The self-density term.
    #[inline]
    pub fn poly6_at_zero(&self) -> f32 {
        if self.h_sq < 1e-18 {
            return 0.0;
        }
        4.0 / (PI * self.h_sq)
    }

    /// Magnitude of the Spiky kernel gradient at distance `r`
    /// (positive; the caller applies direction and sign).
    #[inline]
    pub fn spiky_grad_magnitude(&self, r: f32) -> f32 {
        if r >= self.h {
            return 0.0;
        }
        let term = self.h - r;
        -self.spiky_grad_factor * term * term
    }
}

/// Tait equation of state: p = B * ((density/rest)^gamma - 1), clamped
/// to zero for ratios ≤ 1 (water carries no tensile pressure here).
///
/// The ratio is capped before exponentiation so a corrupted density
/// cannot overflow.
#[inline]
pub fn tait_pressure(density: f32, rest_density: f32, b: f32, gamma: f32) -> f32 {
    let ratio = density.max(MIN_DENSITY) / rest_density;
    if ratio <= 1.0 {
        return 0.0;
    }
    let clamped = ratio.min(MAX_DENSITY_RATIO_FOR_POW);
    (b * (clamped.powf(gamma) - 1.0)).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{H, INITIAL_SPACING, TAIT_GAMMA, TARGET_REST_DENSITY};

    #[test]
    fn test_poly6_at_zero_matches_closed_form() {
        let k = SmoothingKernels::new(H, INITIAL_SPACING, TARGET_REST_DENSITY);
        let expected = 4.0 / (PI * H * H);
        assert!(
            (k.poly6_at_zero() - expected).abs() < expected * 1e-6,
            "W(0) = {} expected {}",
            k.poly6_at_zero(),
            expected
        );
        // Limit of the general kernel as r -> 0 agrees.
        assert!((k.poly6(0.0) - expected).abs() < expected * 1e-5);
    }

    #[test]
    fn test_mass_is_area_based() {
        let k = SmoothingKernels::new(H, INITIAL_SPACING, TARGET_REST_DENSITY);
        let expected = TARGET_REST_DENSITY * INITIAL_SPACING * INITIAL_SPACING;
        assert_eq!(k.particle_mass, expected);
    }

    #[test]
    fn test_poly6_compact_support() {
        let k = SmoothingKernels::new(H, INITIAL_SPACING, TARGET_REST_DENSITY);
        assert_eq!(k.poly6(H_SQ_PLUS), 0.0);
        assert!(k.poly6(H * H * 0.25) > 0.0);
    }

    const H_SQ_PLUS: f32 = H * H + 1.0;

    #[test]
    fn test_spiky_gradient_sign_and_support() {
        let k = SmoothingKernels::new(H, INITIAL_SPACING, TARGET_REST_DENSITY);
        assert!(k.spiky_grad_magnitude(H * 0.5) > 0.0);
        assert_eq!(k.spiky_grad_magnitude(H), 0.0);
        assert!(k.spiky_grad_factor < 0.0, "raw factor is negative");
    }

    #[test]
    fn test_degenerate_radius_falls_back() {
        let k = SmoothingKernels::new(0.0, INITIAL_SPACING, TARGET_REST_DENSITY);
        assert_eq!(k.poly6_factor, 0.0);
        assert_eq!(k.spiky_grad_factor, 0.0);
        assert_eq!(k.particle_mass, 1.0);
        assert_eq!(k.poly6(1.0), 0.0);
    }

    #[test]
    fn test_tait_pressure_nonnegative() {
        // At or below rest: exactly zero.
        for ratio in [0.1, 0.5, 0.99, 1.0] {
            let p = tait_pressure(TARGET_REST_DENSITY * ratio, TARGET_REST_DENSITY, 50_000.0, TAIT_GAMMA);
            assert_eq!(p, 0.0, "ratio {ratio} should give zero pressure");
        }
        // Compressed: positive and monotonic in density.
        let p1 = tait_pressure(TARGET_REST_DENSITY * 1.05, TARGET_REST_DENSITY, 50_000.0, TAIT_GAMMA);
        let p2 = tait_pressure(TARGET_REST_DENSITY * 1.20, TARGET_REST_DENSITY, 50_000.0, TAIT_GAMMA);
        assert!(p1 > 0.0);
        assert!(p2 > p1);
    }

    #[test]
    fn test_tait_pressure_ratio_clamp() {
        // Absurd density must not produce inf.
        let p = tait_pressure(1e30, TARGET_REST_DENSITY, 50_000.0, TAIT_GAMMA);
        assert!(p.is_finite());
        let capped = tait_pressure(
            TARGET_REST_DENSITY * MAX_DENSITY_RATIO_FOR_POW,
            TARGET_REST_DENSITY,
            50_000.0,
            TAIT_GAMMA,
        );
        assert_eq!(p, capped, "ratios beyond the cap collapse to the cap");
    }
}
