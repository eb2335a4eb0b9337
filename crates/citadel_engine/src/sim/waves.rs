//! Wave height-field simulation over a fixed grid.
//!
//! Discretized wave equation solved with finite differences. The solver is
//! deterministic for a given disturbance and timestep sequence, and the vertex
//! count never changes, so the per-frame GPU buffers can be sized once.

use crate::foundation::math::Vec3;

/// Dynamic wave height field.
pub struct Waves {
    num_rows: usize,
    num_cols: usize,
    vertex_count: usize,
    triangle_count: usize,

    // Simulation constants derived from speed/damping/steps.
    k1: f32,
    k2: f32,
    k3: f32,

    time_step: f32,
    spatial_step: f32,
    accumulated: f32,

    prev_solution: Vec<Vec3>,
    curr_solution: Vec<Vec3>,
    normals: Vec<Vec3>,
}

impl Waves {
    /// Create an `m` x `n` grid with spatial step `dx`, solver timestep `dt`,
    /// wave speed and damping factor.
    pub fn new(m: usize, n: usize, dx: f32, dt: f32, speed: f32, damping: f32) -> Self {
        let d = damping * dt + 2.0;
        let e = (speed * speed) * (dt * dt) / (dx * dx);

        let half_width = 0.5 * (n - 1) as f32 * dx;
        let half_depth = 0.5 * (m - 1) as f32 * dx;

        let mut curr_solution = Vec::with_capacity(m * n);
        for i in 0..m {
            let z = half_depth - i as f32 * dx;
            for j in 0..n {
                let x = -half_width + j as f32 * dx;
                curr_solution.push(Vec3::new(x, 0.0, z));
            }
        }

        Self {
            num_rows: m,
            num_cols: n,
            vertex_count: m * n,
            triangle_count: (m - 1) * (n - 1) * 2,
            k1: (damping * dt - 2.0) / d,
            k2: (4.0 - 8.0 * e) / d,
            k3: (2.0 * e) / d,
            time_step: dt,
            spatial_step: dx,
            accumulated: 0.0,
            prev_solution: curr_solution.clone(),
            curr_solution,
            normals: vec![Vec3::new(0.0, 1.0, 0.0); m * n],
        }
    }

    pub fn row_count(&self) -> usize {
        self.num_rows
    }

    pub fn column_count(&self) -> usize {
        self.num_cols
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn triangle_count(&self) -> usize {
        self.triangle_count
    }

    /// Total grid width along x.
    pub fn width(&self) -> f32 {
        (self.num_cols - 1) as f32 * self.spatial_step
    }

    /// Total grid depth along z.
    pub fn depth(&self) -> f32 {
        (self.num_rows - 1) as f32 * self.spatial_step
    }

    /// Current position of vertex `i`.
    pub fn position(&self, i: usize) -> Vec3 {
        self.curr_solution[i]
    }

    /// Current unit normal of vertex `i`.
    pub fn normal(&self, i: usize) -> Vec3 {
        self.normals[i]
    }

    /// Displace one interior cell and splash half the magnitude onto its four
    /// neighbors. Disturbing a boundary cell is a caller bug.
    pub fn disturb(&mut self, i: usize, j: usize, magnitude: f32) {
        assert!(i >= 1 && i < self.num_rows - 1, "disturb row out of interior");
        assert!(j >= 1 && j < self.num_cols - 1, "disturb column out of interior");

        let n = self.num_cols;
        let half = 0.5 * magnitude;
        self.curr_solution[i * n + j].y += magnitude;
        self.curr_solution[i * n + j + 1].y += half;
        self.curr_solution[i * n + j - 1].y += half;
        self.curr_solution[(i + 1) * n + j].y += half;
        self.curr_solution[(i - 1) * n + j].y += half;
    }

    /// Advance the simulation. The solver only steps once the accumulated
    /// time reaches its fixed internal timestep, so arbitrary frame deltas
    /// never destabilize the finite-difference scheme.
    pub fn update(&mut self, dt: f32) {
        self.accumulated += dt;

        if self.accumulated < self.time_step {
            return;
        }
        self.accumulated = 0.0;

        let m = self.num_rows;
        let n = self.num_cols;

        // Update interior points only; boundary stays pinned at zero.
        for i in 1..m - 1 {
            for j in 1..n - 1 {
                // After this update, prev holds the next solution; the swap
                // below promotes it without copying.
                self.prev_solution[i * n + j].y = self.k1 * self.prev_solution[i * n + j].y
                    + self.k2 * self.curr_solution[i * n + j].y
                    + self.k3
                        * (self.curr_solution[(i + 1) * n + j].y
                            + self.curr_solution[(i - 1) * n + j].y
                            + self.curr_solution[i * n + j + 1].y
                            + self.curr_solution[i * n + j - 1].y);
            }
        }
        std::mem::swap(&mut self.prev_solution, &mut self.curr_solution);

        // Rebuild normals from central differences.
        for i in 1..m - 1 {
            for j in 1..n - 1 {
                let left = self.curr_solution[i * n + j - 1].y;
                let right = self.curr_solution[i * n + j + 1].y;
                let top = self.curr_solution[(i - 1) * n + j].y;
                let bottom = self.curr_solution[(i + 1) * n + j].y;

                let normal = Vec3::new(left - right, 2.0 * self.spatial_step, bottom - top);
                self.normals[i * n + j] = normal.normalize();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_waves() -> Waves {
        Waves::new(128, 128, 1.0, 0.03, 4.0, 0.2)
    }

    #[test]
    fn test_vertex_count_is_constant() {
        let mut waves = demo_waves();
        let count = waves.vertex_count();
        assert_eq!(count, 128 * 128);
        assert_eq!(waves.triangle_count(), 127 * 127 * 2);

        waves.disturb(20, 30, 0.4);
        for _ in 0..10 {
            waves.update(0.03);
        }
        assert_eq!(waves.vertex_count(), count);
    }

    #[test]
    fn test_disturb_then_advance_is_deterministic() {
        let run = || {
            let mut waves = demo_waves();
            waves.disturb(40, 50, 0.35);
            waves.update(0.03);
            waves.disturb(10, 100, 0.21);
            for _ in 0..25 {
                waves.update(0.03);
            }
            (0..waves.vertex_count())
                .map(|i| waves.position(i).y.to_bits())
                .collect::<Vec<_>>()
        };

        assert_eq!(run(), run());
    }

    #[test]
    fn test_update_below_timestep_does_not_step() {
        let mut waves = demo_waves();
        waves.disturb(64, 64, 0.5);
        let before = waves.position(64 * 128 + 64);
        waves.update(0.01);
        let after = waves.position(64 * 128 + 64);
        assert_eq!(before.y.to_bits(), after.y.to_bits());
    }

    #[test]
    fn test_disturbance_propagates_and_damps() {
        let mut waves = demo_waves();
        waves.disturb(64, 64, 0.5);
        assert!(waves.position(64 * 128 + 64).y > 0.4);

        for _ in 0..200 {
            waves.update(0.03);
        }
        // Energy spreads out and damps; the epicenter is no longer the peak it was.
        assert!(waves.position(64 * 128 + 64).y.abs() < 0.5);

        // Boundary stays pinned.
        assert_eq!(waves.position(0).y, 0.0);
        assert_eq!(waves.position(127).y, 0.0);
    }

    #[test]
    fn test_texcoord_domain_matches_grid_extent() {
        let waves = demo_waves();
        assert!((waves.width() - 127.0).abs() < 1e-6);
        assert!((waves.depth() - 127.0).abs() < 1e-6);
        // Corner vertices sit at +-width/2, +-depth/2.
        let corner = waves.position(0);
        assert!((corner.x + waves.width() * 0.5).abs() < 1e-4);
        assert!((corner.z - waves.depth() * 0.5).abs() < 1e-4);
    }
}
