//! DDA pixel traversal used by scene ray casts.
//!
//! Steps through grid cells along a ray, visiting every pixel the ray
//! crosses exactly once. The scene-level casts in `scene.rs` wrap this with
//! their per-pixel predicates.

use crate::core::math::Vec2;

/// Cap on DDA steps to avoid extremely long casts on degenerate input.
pub const MAX_RAYCAST_STEPS: u32 = 512;

/// Iterator over the pixels a ray crosses, start pixel excluded.
pub struct DdaRay {
    cx: i32,
    cy: i32,
    step_x: i32,
    step_y: i32,
    t_max_x: f32,
    t_max_y: f32,
    t_delta_x: f32,
    t_delta_y: f32,
    steps_left: u32,
}

impl DdaRay {
    /// Ray from `start` along `ray` (both in pixels). A zero or non-finite
    /// ray yields no pixels.
    pub fn new(start: Vec2, ray: Vec2) -> Self {
        let dx = ray.x;
        let dy = ray.y;

        let degenerate = !dx.is_finite() || !dy.is_finite() || (dx == 0.0 && dy == 0.0);

        let cx = start.x.floor() as i32;
        let cy = start.y.floor() as i32;

        let step_x = if dx > 0.0 { 1 } else if dx < 0.0 { -1 } else { 0 };
        let step_y = if dy > 0.0 { 1 } else if dy < 0.0 { -1 } else { 0 };

        let inv_dx = if dx != 0.0 { 1.0 / dx.abs() } else { f32::INFINITY };
        let inv_dy = if dy != 0.0 { 1.0 / dy.abs() } else { f32::INFINITY };

        let next_boundary_x = if step_x > 0 { (cx + 1) as f32 } else { cx as f32 };
        let next_boundary_y = if step_y > 0 { (cy + 1) as f32 } else { cy as f32 };

        let t_max_x = if step_x != 0 {
            (next_boundary_x - start.x).abs() * inv_dx
        } else {
            f32::INFINITY
        };
        let t_max_y = if step_y != 0 {
            (next_boundary_y - start.y).abs() * inv_dy
        } else {
            f32::INFINITY
        };

        let steps_left = if degenerate {
            0
        } else {
            ((dx.abs() + dy.abs()).ceil() as u32).clamp(1, MAX_RAYCAST_STEPS)
        };

        Self {
            cx,
            cy,
            step_x,
            step_y,
            t_max_x,
            t_max_y,
            t_delta_x: inv_dx,
            t_delta_y: inv_dy,
            steps_left,
        }
    }
}

impl Iterator for DdaRay {
    type Item = (i32, i32);

    fn next(&mut self) -> Option<(i32, i32)> {
        if self.steps_left == 0 {
            return None;
        }
        self.steps_left -= 1;

        if self.t_max_x < self.t_max_y {
            self.cx += self.step_x;
            self.t_max_x += self.t_delta_x;
        } else {
            self.cy += self.step_y;
            self.t_max_y += self.t_delta_y;
        }

        // Past the end of the ray.
        if self.t_max_x.min(self.t_max_y) > 1.0 {
            self.steps_left = 0;
        }

        Some((self.cx, self.cy))
    }
}
