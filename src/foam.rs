//! Decorative foam particle pool.
//!
//! Foam spawns where the fluid is violent (wall impacts, turbulent
//! pockets) and follows trivial ballistic motion with air drag. It never
//! feeds back into the SPH solve. The pool is bounded at three foam
//! particles per fluid particle; spawns past the cap are dropped.

use glam::Vec2;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::particle::FoamParticle;
use crate::physics::{
    FOAM_DRAG, FOAM_GRAVITY_SCALE, FOAM_LIFESPAN, FOAM_RESTITUTION, FOAM_VISUAL_RADIUS,
};
use crate::tank::Tank;

pub struct FoamPool {
    particles: Vec<FoamParticle>,
    capacity: usize,
}

impl FoamPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            particles: Vec::with_capacity(capacity.min(4096)),
            capacity,
        }
    }

    /// Resize the cap (e.g. after a particle-count change). Excess live
    /// foam is dropped oldest-first.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        let excess = self.particles.len().saturating_sub(capacity);
        if excess > 0 {
            self.particles.drain(..excess);
        }
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    #[inline]
    pub fn particles(&self) -> &[FoamParticle] {
        &self.particles
    }

    /// Spawn foam at a point, inheriting a tenth of the source particle
    /// velocity plus a random spread within ±45° of horizontal.
    pub fn spawn(&mut self, pos: Vec2, source_vel: Vec2, count: usize, rng: &mut ChaCha8Rng) -> usize {
        let mut spawned = 0;
        for _ in 0..count {
            if self.particles.len() >= self.capacity {
                break;
            }
            let spread_angle = (rng.gen::<f32>() - 0.5) * std::f32::consts::PI * 0.5;
            let spread_speed = rng.gen::<f32>() * 50.0 + 20.0;
            let velocity = source_vel * 0.1
                + Vec2::new(spread_angle.cos(), spread_angle.sin()) * spread_speed;
            self.particles.push(FoamParticle {
                position: pos,
                velocity,
                life: FOAM_LIFESPAN * (0.8 + rng.gen::<f32>() * 0.4),
                alpha: 0.85 * (0.8 + rng.gen::<f32>() * 0.2),
            });
            spawned += 1;
        }
        spawned
    }

    /// Spawn foam off a wall impact, biased along the wall normal.
    ///
    /// The spray direction is the normal rotated by a random ±36° plus a
    /// tenth of the reflected impact velocity, and the spawn point is
    /// nudged 2-5 px along the normal so foam never starts inside the
    /// wall. Boundary foam lives 20% longer and starts more opaque.
    pub fn spawn_directional(
        &mut self,
        pos: Vec2,
        source_vel: Vec2,
        normal: Vec2,
        count: usize,
        rng: &mut ChaCha8Rng,
    ) -> usize {
        let len = normal.length();
        if len < 1e-6 {
            return self.spawn(pos, source_vel, count, rng);
        }
        let n = normal / len;
        let reflected = source_vel - 2.0 * source_vel.dot(n) * n;

        let mut spawned = 0;
        for _ in 0..count {
            if self.particles.len() >= self.capacity {
                break;
            }
            let spread_angle = (rng.gen::<f32>() - 0.5) * std::f32::consts::PI * 0.4;
            let spread_speed = rng.gen::<f32>() * 60.0 + 40.0;
            let (sin, cos) = spread_angle.sin_cos();
            let dir = Vec2::new(n.x * cos - n.y * sin, n.x * sin + n.y * cos);
            let velocity = dir * spread_speed + reflected * 0.1;
            let offset = 2.0 + rng.gen::<f32>() * 3.0;
            self.particles.push(FoamParticle {
                position: pos + n * offset,
                velocity,
                life: FOAM_LIFESPAN * (0.8 + rng.gen::<f32>() * 0.4) * 1.2,
                alpha: 0.9 * (0.9 + rng.gen::<f32>() * 0.1),
            });
            spawned += 1;
        }
        spawned
    }

    /// Advance all foam by `dt`: drag, weak gravity, tank collision.
    /// Side and top walls give a gentle bounce; the floor kills foam.
    /// Dead particles are removed with order preserved.
    pub fn update(&mut self, dt: f32, tank: &Tank, gravity: f32) {
        if dt <= 0.0 {
            return;
        }
        let min_x = tank.min_x() + FOAM_VISUAL_RADIUS;
        let max_x = tank.max_x() - FOAM_VISUAL_RADIUS;
        let min_y = tank.min_y() + FOAM_VISUAL_RADIUS;
        let max_y = tank.max_y() - FOAM_VISUAL_RADIUS;

        self.particles.retain_mut(|p| {
            p.velocity *= FOAM_DRAG;
            p.velocity.y += gravity * FOAM_GRAVITY_SCALE * dt;
            p.position += p.velocity * dt;
            p.life -= dt;

            if p.position.x < min_x {
                p.position.x = min_x;
                p.velocity.x *= -FOAM_RESTITUTION;
            }
            if p.position.x > max_x {
                p.position.x = max_x;
                p.velocity.x *= -FOAM_RESTITUTION;
            }
            if p.position.y < min_y {
                p.position.y = min_y;
                p.velocity.y *= -FOAM_RESTITUTION;
            }
            if p.position.y > max_y {
                return false;
            }
            p.life > 0.0
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(7)
    }

    fn tank() -> Tank {
        Tank::from_viewport(1000.0, 800.0)
    }

    #[test]
    fn test_capacity_is_a_hard_cap() {
        let mut pool = FoamPool::new(5);
        let mut rng = rng();
        let n = pool.spawn(tank().center(), Vec2::ZERO, 20, &mut rng);
        assert_eq!(n, 5);
        assert_eq!(pool.len(), 5);
        assert_eq!(pool.spawn(tank().center(), Vec2::ZERO, 1, &mut rng), 0);
    }

    #[test]
    fn test_foam_expires() {
        let mut pool = FoamPool::new(16);
        let mut rng = rng();
        pool.spawn(tank().center(), Vec2::ZERO, 4, &mut rng);
        // Lifespan is at most 1.2x base even for boundary foam.
        for _ in 0..300 {
            pool.update(FOAM_LIFESPAN / 60.0, &tank(), 0.0);
        }
        assert!(pool.is_empty(), "all foam should expire");
    }

    #[test]
    fn test_floor_kills_foam() {
        let t = tank();
        let mut pool = FoamPool::new(4);
        pool.particles.push(FoamParticle {
            position: Vec2::new(t.center().x, t.max_y() - 1.0),
            velocity: Vec2::new(0.0, 500.0),
            life: 10.0,
            alpha: 0.85,
        });
        pool.update(0.1, &t, 980.0);
        assert!(pool.is_empty(), "foam reaching the floor dies");
    }

    #[test]
    fn test_side_walls_bounce() {
        let t = tank();
        let mut pool = FoamPool::new(4);
        pool.particles.push(FoamParticle {
            position: Vec2::new(t.min_x() + 1.0, t.center().y),
            velocity: Vec2::new(-400.0, 0.0),
            life: 10.0,
            alpha: 0.85,
        });
        pool.update(0.05, &t, 0.0);
        assert_eq!(pool.len(), 1);
        let p = pool.particles()[0];
        assert!(p.position.x >= t.min_x(), "clamped inside");
        assert!(p.velocity.x > 0.0, "reflected");
        assert!(p.velocity.x.abs() < 400.0 * 0.2, "bounce is gentle");
    }

    #[test]
    fn test_compaction_preserves_order() {
        let t = tank();
        let mut pool = FoamPool::new(8);
        for (i, life) in [10.0_f32, 0.001, 10.0, 0.001, 10.0].iter().enumerate() {
            pool.particles.push(FoamParticle {
                position: t.center() + Vec2::new(i as f32, 0.0),
                velocity: Vec2::ZERO,
                life: *life,
                alpha: 0.85,
            });
        }
        pool.update(0.01, &t, 0.0);
        assert_eq!(pool.len(), 3);
        let xs: Vec<f32> = pool
            .particles()
            .iter()
            .map(|p| p.position.x - t.center().x)
            .collect();
        assert_eq!(xs, vec![0.0, 2.0, 4.0], "survivors keep relative order");
    }

    #[test]
    fn test_set_capacity_drops_oldest() {
        let mut pool = FoamPool::new(6);
        let mut rng = rng();
        pool.spawn(tank().center(), Vec2::ZERO, 6, &mut rng);
        pool.set_capacity(2);
        assert_eq!(pool.len(), 2);
    }
}
