//! Virtual tank rectangle.
//!
//! The tank is derived from the viewport by fixed ratios and defines
//! both the spawn region and every boundary force/collision. It is
//! recomputed on resize and immutable for the rest of the frame.

use glam::Vec2;

use crate::physics::{TANK_HEIGHT_RATIO, TANK_TOP_OFFSET_RATIO, TANK_WIDTH_RATIO};

/// Axis-aligned tank rectangle in viewport pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tank {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Tank {
    /// Derive the tank from a viewport: 70% of the width, 80% of the
    /// height, horizontally centered, offset 5% from the top.
    /// Idempotent: same viewport in, same tank out.
    pub fn from_viewport(viewport_width: f32, viewport_height: f32) -> Self {
        let width = viewport_width * TANK_WIDTH_RATIO;
        let height = viewport_height * TANK_HEIGHT_RATIO;
        Self {
            x: (viewport_width - width) / 2.0,
            y: viewport_height * TANK_TOP_OFFSET_RATIO,
            width,
            height,
        }
    }

    #[inline]
    pub fn min_x(&self) -> f32 {
        self.x
    }

    #[inline]
    pub fn max_x(&self) -> f32 {
        self.x + self.width
    }

    #[inline]
    pub fn min_y(&self) -> f32 {
        self.y
    }

    #[inline]
    pub fn max_y(&self) -> f32 {
        self.y + self.height
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Distance from `p` to the nearest wall (negative outside).
    pub fn wall_distance(&self, p: Vec2) -> f32 {
        let dx = (p.x - self.min_x()).min(self.max_x() - p.x);
        let dy = (p.y - self.min_y()).min(self.max_y() - p.y);
        dx.min(dy)
    }

    /// True when `p` lies inside the tank inflated by `margin`.
    #[inline]
    pub fn contains_with_margin(&self, p: Vec2, margin: f32) -> bool {
        p.x >= self.min_x() - margin
            && p.x <= self.max_x() + margin
            && p.y >= self.min_y() - margin
            && p.y <= self.max_y() + margin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tank_ratios() {
        let t = Tank::from_viewport(1000.0, 800.0);
        assert_eq!(t.width, 700.0);
        assert_eq!(t.height, 640.0);
        assert_eq!(t.x, 150.0, "horizontally centered");
        assert_eq!(t.y, 40.0, "5% top offset");
    }

    #[test]
    fn test_from_viewport_is_idempotent() {
        let a = Tank::from_viewport(1920.0, 1080.0);
        let b = Tank::from_viewport(1920.0, 1080.0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_wall_distance() {
        let t = Tank::from_viewport(1000.0, 800.0);
        let inside = Vec2::new(t.x + 10.0, t.center().y);
        assert!((t.wall_distance(inside) - 10.0).abs() < 1e-4);
        let outside = Vec2::new(t.x - 5.0, t.center().y);
        assert!(t.wall_distance(outside) < 0.0);
    }
}
