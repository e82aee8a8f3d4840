//! Spatial acceleration for fixed-radius neighbor search.
//!
//! A sparse uniform grid keyed by integer (col,row) buckets particle
//! indices; cell size equals the smoothing radius H so a 3×3 cell scan
//! covers the full interaction radius. The grid is rebuilt from scratch
//! every substep, with no incremental maintenance.
//!
//! Neighbor results go into a pre-sized per-particle arena
//! (`NeighborLists`) so the hot loop allocates nothing once warm.

use glam::Vec2;
use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::particle::Particle;

/// Coincident-point guard: pairs closer than this (squared) are skipped
/// so force directions never divide by ~zero.
const MIN_DIST_SQ: f32 = 1e-12;

/// One cached neighbor relation. `dx`/`dy` point from the owning
/// particle toward the neighbor.
#[derive(Clone, Copy, Debug)]
pub struct Neighbor {
    pub index: usize,
    pub dx: f32,
    pub dy: f32,
    pub dist_sq: f32,
    pub dist: f32,
}

/// Sparse uniform grid over particle indices.
pub struct SpatialGrid {
    cell_size: f32,
    cells: FxHashMap<(i32, i32), Vec<usize>>,
}

impl SpatialGrid {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: cell_size.max(1.0),
            cells: FxHashMap::default(),
        }
    }

    #[inline]
    fn cell_of(&self, p: Vec2) -> (i32, i32) {
        (
            (p.x / self.cell_size).floor() as i32,
            (p.y / self.cell_size).floor() as i32,
        )
    }

    /// Negative coordinates are clamped to zero in the key. This can
    /// merge distinct cells left of / above the origin into one bucket;
    /// the tank sits in positive viewport space so in practice only
    /// transient escapees land there, and a fat bucket only costs a few
    /// extra distance checks.
    #[inline]
    fn key(cell: (i32, i32)) -> (i32, i32) {
        (cell.0.max(0), cell.1.max(0))
    }

    /// Clear and re-insert every particle. Non-finite positions are
    /// skipped; the caller is expected to have reset those already.
    pub fn rebuild(&mut self, particles: &[Particle]) {
        for bucket in self.cells.values_mut() {
            bucket.clear();
        }
        for (i, p) in particles.iter().enumerate() {
            if !p.position.is_finite() {
                continue;
            }
            let key = Self::key(self.cell_of(p.position));
            self.cells.entry(key).or_default().push(i);
        }
    }

    /// Visit every candidate index in the 3×3 cell block around `p`.
    /// Clamping can collapse several block cells onto the same key, so
    /// already-visited keys are skipped to avoid duplicate candidates.
    #[inline]
    fn for_each_candidate(&self, p: Vec2, mut visit: impl FnMut(usize)) {
        let (col, row) = self.cell_of(p);
        let mut seen = [(i32::MIN, i32::MIN); 9];
        let mut seen_len = 0;
        for d_col in -1..=1 {
            for d_row in -1..=1 {
                let key = Self::key((col + d_col, row + d_row));
                if seen[..seen_len].contains(&key) {
                    continue;
                }
                seen[seen_len] = key;
                seen_len += 1;
                if let Some(bucket) = self.cells.get(&key) {
                    for &j in bucket {
                        visit(j);
                    }
                }
            }
        }
    }

    /// Collect neighbors of particle `i` within `radius` into `out`.
    /// Excludes `i` itself and near-coincident points.
    pub fn query_neighbors(
        &self,
        particles: &[Particle],
        i: usize,
        radius: f32,
        out: &mut Vec<Neighbor>,
    ) {
        out.clear();
        let radius_sq = radius * radius;
        if radius_sq <= 0.0 {
            return;
        }
        let pos = particles[i].position;
        self.for_each_candidate(pos, |j| {
            if j == i {
                return;
            }
            let other = particles[j].position;
            let dx = other.x - pos.x;
            let dy = other.y - pos.y;
            let dist_sq = dx * dx + dy * dy;
            if dist_sq < radius_sq && dist_sq > MIN_DIST_SQ {
                out.push(Neighbor {
                    index: j,
                    dx,
                    dy,
                    dist_sq,
                    dist: dist_sq.sqrt(),
                });
            }
        });
    }
}

/// Per-particle neighbor arena, rebuilt every substep.
///
/// The outer Vec is keyed by particle index and the inner Vecs keep
/// their capacity across rebuilds, so steady-state frames do not
/// allocate.
#[derive(Default)]
pub struct NeighborLists {
    lists: Vec<Vec<Neighbor>>,
}

impl NeighborLists {
    /// Rebuild all lists from a freshly rebuilt grid.
    pub fn rebuild(&mut self, grid: &SpatialGrid, particles: &[Particle], radius: f32) {
        self.lists.resize_with(particles.len(), Vec::new);
        self.lists
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, list)| grid.query_neighbors(particles, i, radius, list));
    }

    #[inline]
    pub fn of(&self, i: usize) -> &[Neighbor] {
        &self.lists[i]
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::H;

    fn particle_at(x: f32, y: f32) -> Particle {
        Particle::new(Vec2::new(x, y))
    }

    #[test]
    fn test_neighbor_symmetry() {
        let particles = vec![
            particle_at(100.0, 100.0),
            particle_at(100.0 + H * 0.5, 100.0),
            particle_at(100.0, 100.0 + H * 0.9),
            particle_at(100.0 + H * 3.0, 100.0), // out of range
        ];
        let mut grid = SpatialGrid::new(H);
        grid.rebuild(&particles);
        let mut lists = NeighborLists::default();
        lists.rebuild(&grid, &particles, H);

        for i in 0..particles.len() {
            for n in lists.of(i) {
                let back = lists
                    .of(n.index)
                    .iter()
                    .find(|m| m.index == i)
                    .unwrap_or_else(|| panic!("{} missing from {}'s list", i, n.index));
                assert!(
                    (back.dist_sq - n.dist_sq).abs() < 1e-6,
                    "asymmetric dist_sq for pair ({i},{})",
                    n.index
                );
            }
        }
        assert!(lists.of(0).iter().all(|n| n.index != 3), "far particle excluded");
    }

    #[test]
    fn test_excludes_self_and_coincident() {
        let particles = vec![particle_at(50.0, 50.0), particle_at(50.0, 50.0)];
        let mut grid = SpatialGrid::new(H);
        grid.rebuild(&particles);
        let mut lists = NeighborLists::default();
        lists.rebuild(&grid, &particles, H);
        assert!(lists.of(0).is_empty(), "coincident pair is skipped");
        assert!(lists.of(1).is_empty());
    }

    #[test]
    fn test_cached_offsets_match_positions() {
        let particles = vec![particle_at(10.0, 10.0), particle_at(25.0, 30.0)];
        let mut grid = SpatialGrid::new(H);
        grid.rebuild(&particles);
        let mut lists = NeighborLists::default();
        lists.rebuild(&grid, &particles, H);
        let n = &lists.of(0)[0];
        assert_eq!(n.index, 1);
        assert_eq!(n.dx, 15.0);
        assert_eq!(n.dy, 20.0);
        assert!((n.dist - (15.0f32 * 15.0 + 20.0 * 20.0).sqrt()).abs() < 1e-5);
    }

    #[test]
    fn test_nonfinite_position_is_not_inserted() {
        let mut particles = vec![particle_at(40.0, 40.0), particle_at(45.0, 40.0)];
        particles[1].position.x = f32::NAN;
        let mut grid = SpatialGrid::new(H);
        grid.rebuild(&particles);
        let mut lists = NeighborLists::default();
        lists.rebuild(&grid, &particles, H);
        assert!(lists.of(0).is_empty(), "NaN particle never appears as a neighbor");
    }

    #[test]
    fn test_negative_cells_clamp_into_origin_bucket() {
        // Known simplification: cells left of the origin share the
        // column-zero bucket. Both particles still find each other.
        let particles = vec![particle_at(-5.0, 20.0), particle_at(5.0, 20.0)];
        let mut grid = SpatialGrid::new(H);
        grid.rebuild(&particles);
        let mut lists = NeighborLists::default();
        lists.rebuild(&grid, &particles, H);
        assert_eq!(lists.of(0).len(), 1);
        assert_eq!(lists.of(1).len(), 1);
    }

    #[test]
    fn test_rebuild_clears_previous_frame() {
        let mut particles = vec![particle_at(100.0, 100.0), particle_at(110.0, 100.0)];
        let mut grid = SpatialGrid::new(H);
        grid.rebuild(&particles);
        // Move one far away and rebuild; stale bucket entries must be gone.
        particles[1].position = Vec2::new(2000.0, 2000.0);
        grid.rebuild(&particles);
        let mut lists = NeighborLists::default();
        lists.rebuild(&grid, &particles, H);
        assert!(lists.of(0).is_empty());
    }
}
