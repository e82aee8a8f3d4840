//! Metaball scalar field and marching-squares surface extraction.
//!
//! The field is sampled at cell centers over the whole viewport. Each
//! particle splats a squared-falloff metaball into the cells its
//! influence radius touches; particles near a tank wall also splat a
//! mirrored copy (at reduced weight) so the surface meets the wall flat
//! instead of beading away from it. An optional ripple pass perturbs
//! near-threshold cells with layered sine waves, then the field is
//! max-normalized and contoured with the 16-case marching squares
//! table. Saddle cells (5 and 10) split into two triangles.
//!
//! Output is a list of filled polygons with per-cell color and optional
//! Blinn-Phong lighting; rasterization is the presentation layer's job.

use glam::Vec2;

use crate::color::{self, ColorMode, Rgba, MAX_VELOCITY_COLOR};
use crate::particle::Particle;
use crate::physics::{
    AMBIENT_LIGHT, DIFFUSE_STRENGTH, H, LIGHT_DIRECTION, METABALL_RADIUS, METABALL_STRENGTH,
    METABALL_THRESHOLD, MIRROR_WEIGHT, NORMAL_STRENGTH, RIPPLE_AMPLITUDE, RIPPLE_DETAIL,
    RIPPLE_FREQUENCY, RIPPLE_SPEED, SPECULAR_SHININESS, SPECULAR_STRENGTH, SURFACE_CELL_SIZE,
};
use crate::tank::Tank;

/// One filled contour piece: a convex vertex loop and its fill color.
#[derive(Clone, Debug)]
pub struct SurfacePolygon {
    pub points: Vec<Vec2>,
    pub color: Rgba,
}

/// Per-build options, a snapshot of the relevant toggles.
#[derive(Clone, Copy, Debug)]
pub struct SurfaceOptions {
    pub color_mode: ColorMode,
    pub ripples: bool,
    pub lighting: bool,
    /// Accumulated simulation time, drives the ripple phase.
    pub time: f32,
}

/// Reusable scalar-field buffers plus the polygon output list.
#[derive(Default)]
pub struct SurfaceField {
    cols: usize,
    rows: usize,
    cell_size: f32,
    field: Vec<f32>,
    velocity: Vec<f32>,
    depth: Vec<f32>,
    polygons: Vec<SurfacePolygon>,
}

impl SurfaceField {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the field and extract the surface polygons.
    ///
    /// Fewer than three particles, or a degenerate influence radius,
    /// yields an empty surface.
    pub fn build(
        &mut self,
        particles: &[Particle],
        tank: &Tank,
        viewport: Vec2,
        opts: &SurfaceOptions,
    ) -> &[SurfacePolygon] {
        self.polygons.clear();
        if particles.len() < 3 {
            return &self.polygons;
        }

        let widened = METABALL_RADIUS * 1.2;
        let influence = widened * widened;
        if influence <= 0.0 {
            log::warn!("metaball radius is degenerate, skipping surface extraction");
            return &self.polygons;
        }

        self.cell_size = SURFACE_CELL_SIZE.max(1.0);
        self.cols = (viewport.x / self.cell_size).ceil() as usize + 1;
        self.rows = (viewport.y / self.cell_size).ceil() as usize + 1;
        let len = self.cols * self.rows;
        self.field.clear();
        self.field.resize(len, 0.0);
        self.velocity.clear();
        self.depth.clear();
        match opts.color_mode {
            ColorMode::Velocity => self.velocity.resize(len, 0.0),
            ColorMode::Depth => self.depth.resize(len, 0.0),
            ColorMode::None => {}
        }

        self.splat_particles(particles, tank, widened, influence, opts.color_mode);
        if opts.ripples {
            self.apply_ripples(tank, viewport, opts.time);
        }
        self.normalize(tank, opts.color_mode);
        self.march(opts);
        &self.polygons
    }

    fn splat_particles(
        &mut self,
        particles: &[Particle],
        tank: &Tank,
        widened: f32,
        influence: f32,
        color_mode: ColorMode,
    ) {
        let buffer = METABALL_RADIUS;
        for p in particles {
            if !tank.contains_with_margin(p.position, buffer) {
                continue;
            }
            self.splat(p.position, p.velocity, tank, widened, influence, 1.0, color_mode);

            // Mirror near-wall particles across the wall so the field
            // stays dense right up to the boundary.
            if p.position.x < tank.min_x() + buffer {
                let mirror = Vec2::new(tank.min_x() + (tank.min_x() - p.position.x), p.position.y);
                self.splat(mirror, p.velocity, tank, widened, influence, MIRROR_WEIGHT, color_mode);
            } else if p.position.x > tank.max_x() - buffer {
                let mirror = Vec2::new(tank.max_x() + (tank.max_x() - p.position.x), p.position.y);
                self.splat(mirror, p.velocity, tank, widened, influence, MIRROR_WEIGHT, color_mode);
            }
            if p.position.y < tank.min_y() + buffer {
                let mirror = Vec2::new(p.position.x, tank.min_y() + (tank.min_y() - p.position.y));
                self.splat(mirror, p.velocity, tank, widened, influence, MIRROR_WEIGHT, color_mode);
            } else if p.position.y > tank.max_y() - buffer {
                let mirror = Vec2::new(p.position.x, tank.max_y() + (tank.max_y() - p.position.y));
                self.splat(mirror, p.velocity, tank, widened, influence, MIRROR_WEIGHT, color_mode);
            }
        }
    }

    /// Add one metaball's contribution over its bounding box of cells.
    fn splat(
        &mut self,
        pos: Vec2,
        vel: Vec2,
        tank: &Tank,
        widened: f32,
        influence: f32,
        weight: f32,
        color_mode: ColorMode,
    ) {
        let cs = self.cell_size;
        let start_row = (((pos.y - widened) / cs).floor().max(0.0)) as usize;
        let end_row = (((pos.y + widened) / cs).floor() as usize).min(self.rows - 1);
        let start_col = (((pos.x - widened) / cs).floor().max(0.0)) as usize;
        let end_col = (((pos.x + widened) / cs).floor() as usize).min(self.cols - 1);

        let speed = vel.length();
        let depth = ((pos.y - tank.min_y()) / tank.height).clamp(0.0, 1.0);

        for r in start_row..=end_row {
            for c in start_col..=end_col {
                let center = Vec2::new(c as f32 * cs + cs / 2.0, r as f32 * cs + cs / 2.0);
                let dist_sq = (center - pos).length_squared();
                if dist_sq < influence {
                    let t = 1.0 - dist_sq / influence;
                    let falloff = t * t * weight;
                    let index = r * self.cols + c;
                    self.field[index] += falloff * METABALL_STRENGTH;
                    match color_mode {
                        ColorMode::Velocity => self.velocity[index] += speed * falloff,
                        ColorMode::Depth => self.depth[index] += depth * falloff,
                        ColorMode::None => {}
                    }
                }
            }
        }
    }

    /// Perturb near-threshold cells with layered sine waves: two radial
    /// waves from the viewport center, one diagonal traveling wave, and
    /// wall-hugging waves within 3H of each tank wall. The perturbation
    /// fades quadratically with distance from the iso-threshold so only
    /// the visible surface band moves.
    fn apply_ripples(&mut self, tank: &Tank, viewport: Vec2, time: f32) {
        let cs = self.cell_size;
        let wave_time = time * RIPPLE_SPEED;
        let boundary_range = H * 3.0;

        for r in 0..self.rows {
            for c in 0..self.cols {
                let index = r * self.cols + c;
                let value = self.field[index];
                if value <= 0.01 || value >= METABALL_THRESHOLD * 1.8 {
                    continue;
                }
                let gx = c as f32 * cs + cs / 2.0;
                let gy = r as f32 * cs + cs / 2.0;

                let dist = Vec2::new(gx - viewport.x / 2.0, gy - viewport.y / 2.0).length();
                let wave1 = (dist * RIPPLE_FREQUENCY * 0.008 + wave_time).sin();
                let wave2 = (dist * RIPPLE_FREQUENCY * 0.015 - wave_time * 0.7).sin();
                let wave3 =
                    ((gx * 0.8 + gy * 1.2) * RIPPLE_FREQUENCY * 0.004 + wave_time * 0.5).sin();

                let mut boundary = 0.0;
                let d_left = (gx - tank.min_x()).abs();
                let d_right = (gx - tank.max_x()).abs();
                let d_top = (gy - tank.min_y()).abs();
                let d_bottom = (gy - tank.max_y()).abs();
                if d_left < boundary_range {
                    boundary += (gy * 0.1 + wave_time * 1.2).sin() * (1.0 - d_left / boundary_range);
                }
                if d_right < boundary_range {
                    boundary +=
                        (gy * 0.1 - wave_time * 1.3).sin() * (1.0 - d_right / boundary_range);
                }
                if d_top < boundary_range {
                    boundary += (gx * 0.1 + wave_time).sin() * (1.0 - d_top / boundary_range);
                }
                if d_bottom < boundary_range {
                    boundary +=
                        (gx * 0.1 - wave_time * 0.9).sin() * (1.0 - d_bottom / boundary_range);
                }

                let main = (wave1 + wave2 * 0.6 + wave3 * 0.4) * 0.6;
                let combined = (main + boundary * 0.4) * RIPPLE_AMPLITUDE * 0.01;

                let dist_to_threshold = (value - METABALL_THRESHOLD).abs();
                let ripple_influence = (1.0 - (dist_to_threshold * 5.0).powi(2)).max(0.0);
                self.field[index] += combined * ripple_influence * RIPPLE_DETAIL;
            }
        }
    }

    /// Max-normalize the color fields against the strongest field cell.
    /// Cells below 15% of the max are zeroed; depth cells within 3H of
    /// a wall get boosted up to 1.5x so the edge keeps its hue.
    fn normalize(&mut self, tank: &Tank, color_mode: ColorMode) {
        let mut max_field = 0.001f32;
        let mut max_vel = 0.001f32;
        let mut max_depth = 0.001f32;
        for (i, &v) in self.field.iter().enumerate() {
            if v > 0.01 {
                max_field = max_field.max(v);
                if color_mode == ColorMode::Velocity {
                    max_vel = max_vel.max(self.velocity[i]);
                }
                if color_mode == ColorMode::Depth {
                    max_depth = max_depth.max(self.depth[i]);
                }
            }
        }

        let field_threshold = max_field * 0.15;
        let cs = self.cell_size;
        let boundary_range = H * 3.0;
        for i in 0..self.field.len() {
            if self.field[i] > field_threshold {
                let weight = (self.field[i] / max_field).min(1.0).powf(0.8);
                match color_mode {
                    ColorMode::Velocity if self.velocity[i] > 0.0 => {
                        self.velocity[i] = ((self.velocity[i] / max_vel) * weight).min(1.0);
                    }
                    ColorMode::Depth if self.depth[i] > 0.0 => {
                        self.depth[i] = ((self.depth[i] / max_depth) * weight).min(1.0);
                        let cx = (i % self.cols) as f32 * cs + cs / 2.0;
                        let cy = (i / self.cols) as f32 * cs + cs / 2.0;
                        let wall = (cx - tank.min_x())
                            .abs()
                            .min((cx - tank.max_x()).abs())
                            .min((cy - tank.min_y()).abs())
                            .min((cy - tank.max_y()).abs());
                        if wall < boundary_range {
                            let factor = 1.0 - wall / boundary_range;
                            let boosted = (self.depth[i] * (1.0 + factor * 0.5)).min(1.0);
                            self.depth[i] = self.depth[i].max(boosted);
                        }
                    }
                    _ => {}
                }
            } else {
                if !self.velocity.is_empty() {
                    self.velocity[i] = 0.0;
                }
                if !self.depth.is_empty() {
                    self.depth[i] = 0.0;
                }
            }
        }
    }

    fn march(&mut self, opts: &SurfaceOptions) {
        let cs = self.cell_size;
        for r in 0..self.rows - 1 {
            for c in 0..self.cols - 1 {
                let i0 = r * self.cols + c;
                let i1 = r * self.cols + c + 1;
                let i2 = (r + 1) * self.cols + c;
                let i3 = (r + 1) * self.cols + c + 1;

                let corners = CellCorners {
                    s0: self.field[i0],
                    s1: self.field[i1],
                    s2: self.field[i2],
                    s3: self.field[i3],
                    p0: Vec2::new(c as f32 * cs, r as f32 * cs),
                    p1: Vec2::new((c + 1) as f32 * cs, r as f32 * cs),
                    p2: Vec2::new(c as f32 * cs, (r + 1) as f32 * cs),
                    p3: Vec2::new((c + 1) as f32 * cs, (r + 1) as f32 * cs),
                };
                if corners.case() == 0 {
                    continue;
                }

                let base = self.cell_color([i0, i1, i2, i3], &corners, opts.color_mode);
                let color = if opts.lighting {
                    let normal = self.normal_at(r, c);
                    apply_lighting(base, normal)
                } else {
                    base
                };

                let mut polys = corners.polygons();
                for points in polys.drain(..) {
                    self.polygons.push(SurfacePolygon { points, color });
                }
            }
        }
    }

    fn cell_color(&self, idx: [usize; 4], corners: &CellCorners, mode: ColorMode) -> Rgba {
        let inside = [
            corners.s0 > METABALL_THRESHOLD,
            corners.s1 > METABALL_THRESHOLD,
            corners.s2 > METABALL_THRESHOLD,
            corners.s3 > METABALL_THRESHOLD,
        ];
        let inside_count = inside.iter().filter(|&&b| b).count();
        match mode {
            ColorMode::Depth => {
                let sum: f32 = idx
                    .iter()
                    .zip(inside.iter())
                    .filter(|(_, &b)| b)
                    .map(|(&i, _)| self.depth[i])
                    .sum();
                let depth = if inside_count > 0 {
                    sum / inside_count as f32
                } else {
                    self.depth[idx[0]]
                };
                color::depth_color(depth)
            }
            ColorMode::Velocity => {
                let sum: f32 = idx
                    .iter()
                    .zip(inside.iter())
                    .filter(|(_, &b)| b)
                    .map(|(&i, _)| self.velocity[i])
                    .sum();
                let vel = if inside_count > 0 {
                    sum / inside_count as f32
                } else {
                    idx.iter().map(|&i| self.velocity[i]).sum::<f32>() / 4.0
                };
                color::velocity_color(vel.min(1.0))
            }
            ColorMode::None => color::BASE_WATER,
        }
    }

    /// Sobel gradient of the field at a cell, negated so the normal
    /// points from water toward air. Not unit length: the strength
    /// factor exaggerates it for more visible shading.
    fn normal_at(&self, r: usize, c: usize) -> Vec2 {
        let up = r.saturating_sub(1);
        let down = (r + 1).min(self.rows - 1);
        let left = c.saturating_sub(1);
        let right = (c + 1).min(self.cols - 1);
        let f = |r: usize, c: usize| self.field[r * self.cols + c];

        let h_grad = (f(up, right) - f(up, left))
            + (f(r, right) - f(r, left)) * 2.0
            + (f(down, right) - f(down, left));
        let v_grad = (f(down, left) - f(up, left))
            + (f(down, c) - f(up, c)) * 2.0
            + (f(down, right) - f(up, right));

        let grad = Vec2::new(h_grad, v_grad) / (8.0 * self.cell_size);
        let len = grad.length();
        if len < 1e-8 {
            Vec2::new(0.0, -1.0)
        } else {
            -grad / len * NORMAL_STRENGTH
        }
    }
}

/// Speed normalization helper for per-particle coloring when the
/// surface is off.
pub fn normalized_speed(speed: f32) -> f32 {
    (speed / MAX_VELOCITY_COLOR).clamp(0.0, 1.0)
}

/// Ambient + Lambert diffuse + Blinn-Phong specular against a fixed
/// directional light. The view direction is straight out of the screen.
fn apply_lighting(base: Rgba, normal: Vec2) -> Rgba {
    let light = Vec2::new(LIGHT_DIRECTION.0, LIGHT_DIRECTION.1).normalize();
    let diffuse = normal.dot(light).max(0.0) * DIFFUSE_STRENGTH;

    let halfway_len = (light.x * light.x + light.y * light.y + 1.0).sqrt();
    let spec_dot = (normal.x * light.x / halfway_len + normal.y * light.y / halfway_len).max(0.0);
    let specular = spec_dot.powf(SPECULAR_SHININESS) * SPECULAR_STRENGTH;

    base.lit(AMBIENT_LIGHT + diffuse, specular)
}

/// One marching-squares cell: four corner samples and positions.
/// Corner layout: p0 top-left, p1 top-right, p2 bottom-left, p3
/// bottom-right. Case bits: TL=1, TR=2, BR=4, BL=8.
struct CellCorners {
    s0: f32,
    s1: f32,
    s2: f32,
    s3: f32,
    p0: Vec2,
    p1: Vec2,
    p2: Vec2,
    p3: Vec2,
}

impl CellCorners {
    fn case(&self) -> u8 {
        let mut case = 0u8;
        if self.s0 > METABALL_THRESHOLD {
            case |= 1;
        }
        if self.s1 > METABALL_THRESHOLD {
            case |= 2;
        }
        if self.s3 > METABALL_THRESHOLD {
            case |= 4;
        }
        if self.s2 > METABALL_THRESHOLD {
            case |= 8;
        }
        case
    }

    /// Contour polygons for this cell: empty, one, or (saddles) two.
    fn polygons(&self) -> Vec<Vec<Vec2>> {
        let case = self.case();
        if case == 0 {
            return Vec::new();
        }

        // Edge crossings: a top, b right, c bottom, d left.
        let crosses = |bit_a: u8, bit_b: u8| ((case & bit_a) != 0) != ((case & bit_b) != 0);
        let a = crosses(1, 2).then(|| interpolate(self.s0, self.s1, self.p0, self.p1));
        let b = crosses(2, 4).then(|| interpolate(self.s1, self.s3, self.p1, self.p3));
        let c = crosses(4, 8).then(|| interpolate(self.s3, self.s2, self.p3, self.p2));
        let d = crosses(8, 1).then(|| interpolate(self.s2, self.s0, self.p2, self.p0));

        let (p0, p1, p2, p3) = (self.p0, self.p1, self.p2, self.p3);
        match case {
            1 => vec![vec![p0, a.unwrap(), d.unwrap()]],
            2 => vec![vec![p1, b.unwrap(), a.unwrap()]],
            3 => vec![vec![p0, p1, b.unwrap(), d.unwrap()]],
            4 => vec![vec![p3, c.unwrap(), b.unwrap()]],
            5 => vec![
                vec![p0, a.unwrap(), d.unwrap()],
                vec![p3, c.unwrap(), b.unwrap()],
            ],
            6 => vec![vec![p1, p3, c.unwrap(), a.unwrap()]],
            7 => vec![vec![p0, p1, p3, c.unwrap(), d.unwrap()]],
            8 => vec![vec![p2, d.unwrap(), c.unwrap()]],
            9 => vec![vec![p0, a.unwrap(), c.unwrap(), p2]],
            10 => vec![
                vec![p1, b.unwrap(), a.unwrap()],
                vec![p2, d.unwrap(), c.unwrap()],
            ],
            11 => vec![vec![p0, p1, b.unwrap(), c.unwrap(), p2]],
            12 => vec![vec![p3, p2, d.unwrap(), b.unwrap()]],
            13 => vec![vec![p0, a.unwrap(), b.unwrap(), p3, p2]],
            14 => vec![vec![p1, p3, p2, d.unwrap(), a.unwrap()]],
            _ => vec![vec![p0, p1, p3, p2]],
        }
    }
}

/// Where the iso-contour crosses the edge between two samples. Nearly
/// equal samples collapse to the first endpoint.
fn interpolate(v0: f32, v1: f32, a: Vec2, b: Vec2) -> Vec2 {
    if (v0 - v1).abs() < 1e-6 {
        return a;
    }
    let t = (METABALL_THRESHOLD - v0) / (v1 - v0);
    a + (b - a) * t
}
