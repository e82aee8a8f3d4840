//! Water color policy.
//!
//! Colors are computed per surface polygon (or per particle when the
//! surface is off) from either speed or depth. Everything here is pure
//! math on normalized inputs; the presentation layer just consumes RGBA.

/// Which quantity drives the water color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ColorMode {
    None,
    Velocity,
    #[default]
    Depth,
}

impl ColorMode {
    /// Cycle order used by the UI shortcut: Depth -> Velocity -> None.
    pub fn next(self) -> Self {
        match self {
            ColorMode::Depth => ColorMode::Velocity,
            ColorMode::Velocity => ColorMode::None,
            ColorMode::None => ColorMode::Depth,
        }
    }
}

/// RGBA color, channels 0-255 and alpha 0-1.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn lerp(self, other: Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        Self {
            r: self.r + (other.r - self.r) * t,
            g: self.g + (other.g - self.g) * t,
            b: self.b + (other.b - self.b) * t,
            a: self.a + (other.a - self.a) * t,
        }
    }

    /// Scale the color channels by a lighting factor and add a white
    /// specular term. Channels clamp to [0,255], alpha is untouched.
    pub fn lit(self, diffuse: f32, specular: f32) -> Self {
        let spec = specular * 255.0;
        Self {
            r: (self.r * diffuse + spec).clamp(0.0, 255.0),
            g: (self.g * diffuse + spec).clamp(0.0, 255.0),
            b: (self.b * diffuse + spec).clamp(0.0, 255.0),
            a: self.a,
        }
    }
}

/// Speed at which velocity coloring saturates (pixels/s).
pub const MAX_VELOCITY_COLOR: f32 = 500.0;

const VELOCITY_SLOW: Rgba = Rgba::new(20.0, 50.0, 120.0, 0.95);
const VELOCITY_MEDIUM: Rgba = Rgba::new(100.0, 150.0, 220.0, 0.9);
const VELOCITY_FAST: Rgba = Rgba::new(230.0, 240.0, 255.0, 0.85);

const DEPTH_SHALLOW: Rgba = Rgba::new(120.0, 190.0, 235.0, 0.9);
const DEPTH_MEDIUM: Rgba = Rgba::new(60.0, 140.0, 200.0, 0.92);
const DEPTH_DEEP: Rgba = Rgba::new(15.0, 75.0, 165.0, 0.95);

/// Fallback water color when no coloring mode is active.
pub const BASE_WATER: Rgba = VELOCITY_SLOW;

/// Three-stop ramp over normalized speed: dark blue through medium blue
/// to near white, with the first stop ending at t = 0.4.
pub fn velocity_color(normalized_speed: f32) -> Rgba {
    let t = normalized_speed.clamp(0.0, 1.0);
    if t < 0.4 {
        VELOCITY_SLOW.lerp(VELOCITY_MEDIUM, t / 0.4)
    } else {
        VELOCITY_MEDIUM.lerp(VELOCITY_FAST, (t - 0.4) / 0.6)
    }
}

/// Depth ramp: light blue at the surface darkening toward the floor.
/// The input is 0 at the water surface, 1 at the tank bottom; a power
/// curve (exponent 1.2) adds contrast before the two-segment lerp.
pub fn depth_color(normalized_depth: f32) -> Rgba {
    let depth_curve = normalized_depth.clamp(0.0, 1.0).powf(1.2);
    if depth_curve < 0.4 {
        DEPTH_SHALLOW.lerp(DEPTH_MEDIUM, depth_curve / 0.4)
    } else {
        DEPTH_MEDIUM.lerp(DEPTH_DEEP, (depth_curve - 0.4) / 0.6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_velocity_ramp_endpoints() {
        assert_eq!(velocity_color(0.0), VELOCITY_SLOW);
        assert_eq!(velocity_color(1.0), VELOCITY_FAST);
        assert_eq!(velocity_color(-2.0), VELOCITY_SLOW, "clamped below");
        assert_eq!(velocity_color(7.0), VELOCITY_FAST, "clamped above");
    }

    #[test]
    fn test_velocity_ramp_midpoint_is_medium() {
        let c = velocity_color(0.4);
        assert!((c.r - VELOCITY_MEDIUM.r).abs() < 1e-3);
        assert!((c.a - VELOCITY_MEDIUM.a).abs() < 1e-5);
    }

    #[test]
    fn test_depth_darkens_monotonically() {
        let mut prev = depth_color(0.0);
        for i in 1..=10 {
            let c = depth_color(i as f32 / 10.0);
            assert!(c.b <= prev.b + 1e-3, "blue channel should not brighten with depth");
            assert!(c.r <= prev.r + 1e-3);
            prev = c;
        }
        assert_eq!(depth_color(0.0), DEPTH_SHALLOW);
        assert_eq!(depth_color(1.0), DEPTH_DEEP);
    }

    #[test]
    fn test_lit_clamps_channels() {
        let c = Rgba::new(200.0, 200.0, 200.0, 0.9).lit(2.0, 1.0);
        assert_eq!(c.r, 255.0);
        assert_eq!(c.a, 0.9, "alpha unaffected by lighting");
        let dark = Rgba::new(100.0, 100.0, 100.0, 0.9).lit(0.5, 0.0);
        assert_eq!(dark.r, 50.0);
    }

    #[test]
    fn test_color_mode_cycle() {
        assert_eq!(ColorMode::Depth.next(), ColorMode::Velocity);
        assert_eq!(ColorMode::Velocity.next(), ColorMode::None);
        assert_eq!(ColorMode::None.next(), ColorMode::Depth);
    }
}
