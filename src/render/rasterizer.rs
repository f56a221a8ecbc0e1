//! Triangle rasterization into the Braille cell buffer.
//!
//! The rasterizer walks the cells of a triangle's bounding box and tests
//! each of the eight sub-dots of a cell against the triangle with affine
//! barycentric coordinates. Coverage is tracked per dot, but interpolation
//! and fragment shading run once per cell, at the first covered dot: at
//! this resolution the interpolants of neighbouring dots differ
//! imperceptibly, and shading dominates the cost.
//!
//! Coordinates arriving here are clip-space positions whose `x` and `y`
//! have already been divided by `z`; `z` and `w` are carried along for
//! perspective-correct interpolation and depth.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::math::{Vec2, Vec3, Vec4};
use crate::render::framebuffer::{FrameBuffer, CELL_HEIGHT, CELL_WIDTH, MAX_DEPTH};
use crate::render::present::{Presenter, RenderCallback};
use crate::render::shader::{Shader, ShaderProgram};
use crate::render::RenderError;

/// Dot bit for sub-position `[row][column]` within a cell. The glyph for a
/// pattern is the Braille base code point plus the sum of its set dots:
///
/// ```text
/// [ +1][  +8]
/// [ +2][ +16]
/// [ +4][ +32]
/// [+64][+128]
/// ```
const DOT_VALUES: [[u8; 2]; 4] = [[1, 8], [2, 16], [4, 32], [64, 128]];

/// Dot masks for brightness buckets 0..=8; dots light up roughly uniformly
/// across the cell as the bucket grows.
const SHADING_PATTERNS: [u8; 9] = [0x00, 0x20, 0x21, 0x2A, 0x6A, 0x6B, 0x7D, 0xFD, 0xFF];

/// Highest brightness bucket.
const MAX_BRIGHT: f32 = 8.0;

/// Coverage tolerance. Dots within this band of an edge count as inside on
/// both sides, closing the seam between triangles that share the edge.
const EDGE_TOLERANCE: f32 = -0.001;

/// Below this absolute barycentric denominator the projected triangle has
/// no usable area.
const DEGENERATE_AREA: f32 = 1e-6;

/// Affine barycentric coordinates of `(x, y)` relative to the projected
/// triangle, with the shared denominator factored out.
fn barycentric(x: f32, y: f32, p1: Vec2, p2: Vec2, p3: Vec2, inv_denom: f32) -> Vec3 {
    let b1 = ((p2.y - p3.y) * (x - p3.x) + (p3.x - p2.x) * (y - p3.y)) * inv_denom;
    let b2 = ((p3.y - p1.y) * (x - p3.x) + (p1.x - p3.x) * (y - p3.y)) * inv_denom;
    Vec3::new(b1, b2, 1.0 - b1 - b2)
}

/// A dot is covered when all three coordinates fall on the same side of
/// the tolerance.
fn covered(b: Vec3) -> bool {
    let one = b.x < EDGE_TOLERANCE;
    let two = b.y < EDGE_TOLERANCE;
    let three = b.z < EDGE_TOLERANCE;
    one == two && two == three
}

/// Perspective-correct interpolation weights: affine weights divided by
/// per-vertex `z`, renormalised through the per-vertex `w`.
fn perspective_weights(b: Vec3, v1: Vec4, v2: Vec4, v3: Vec4) -> (f32, f32, f32) {
    let k = b.x / v1.w + b.y / v2.w + b.z / v3.w;
    ((b.x / v1.z) / k, (b.y / v2.z) / k, (b.z / v3.z) / k)
}

/// Cell depth: `z/w` blended with the affine weights, scaled into the
/// 16-bit depth range and clamped so out-of-range depths cannot wrap.
fn cell_depth(b: Vec3, v1: Vec4, v2: Vec4, v3: Vec4) -> u16 {
    let z = (v1.z / v1.w) * b.x + (v2.z / v2.w) * b.y + (v3.z / v3.w) * b.z;
    (f32::from(MAX_DEPTH) * z)
        .round()
        .clamp(0.0, f32::from(MAX_DEPTH)) as u16
}

/// Owns the frame buffer pair and the presenter; triangles are composed
/// into the back buffer until [`Rasterizer::present_frame`] swaps it out.
pub struct Rasterizer {
    frames: [Arc<Mutex<FrameBuffer>>; 2],
    /// Index of the frame currently being composed.
    current: usize,
    presenter: Presenter,
    width: u32,
    height: u32,
}

impl Rasterizer {
    /// Create the buffer pair and start the presenter thread. `callback`
    /// runs on that thread with each presented frame.
    pub fn new(width: u32, height: u32, callback: RenderCallback) -> Result<Self, RenderError> {
        Ok(Self {
            frames: [
                Arc::new(Mutex::new(FrameBuffer::new(width, height)?)),
                Arc::new(Mutex::new(FrameBuffer::new(width, height)?)),
            ],
            current: 0,
            presenter: Presenter::spawn(callback)?,
            width,
            height,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Clear the frame being composed.
    pub fn clear_frame(&mut self) {
        self.frames[self.current].lock().unwrap().clear(0);
    }

    /// Exchange the composition and presentation buffers.
    pub fn swap_buffers(&mut self) {
        self.current ^= 1;
    }

    /// Hand the just-composed frame to the presenter. Blocks only until
    /// the previous presentation has completed; the new presentation runs
    /// while the caller composes the next frame.
    pub fn present_frame(&mut self) {
        self.swap_buffers();
        self.presenter
            .submit(Arc::clone(&self.frames[self.current ^ 1]));
    }

    /// Recreate both buffers for a new terminal geometry. Contents are
    /// undefined until the next clear.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        self.presenter.wait_idle();
        for frame in &self.frames {
            frame.lock().unwrap().recreate(width, height)?;
        }
        self.width = width;
        self.height = height;
        log::debug!("frame buffers resized to {width}x{height} cells");
        Ok(())
    }

    /// Read access to the frame currently being composed.
    pub fn back_frame(&self) -> MutexGuard<'_, FrameBuffer> {
        self.frames[self.current].lock().unwrap()
    }

    /// Rasterize one triangle into the back buffer.
    ///
    /// `v1..v3` are clip-space positions with `x`/`y` already divided by
    /// `z`. Back-facing, degenerate, and fully off-screen triangles are
    /// silent no-ops; a pass-stream schema mismatch fails the triangle.
    pub fn rasterize_triangle<S: Shader>(
        &mut self,
        v1: Vec4,
        v2: Vec4,
        v3: Vec4,
        program: &mut ShaderProgram<S>,
    ) -> Result<(), RenderError> {
        let mut frame = self.frames[self.current].lock().unwrap();
        let fb = &mut *frame;

        // Project onto the sub-dot grid. The y flip makes screen up
        // positive; the half extents follow the buffer's cell geometry.
        let half_w = (fb.width() / 2 * CELL_WIDTH) as f32;
        let half_h = (fb.height() / 2 * CELL_HEIGHT) as f32;
        let p1 = Vec2::new(v1.x * half_w + half_w, -v1.y * half_h + half_h);
        let p2 = Vec2::new(v2.x * half_w + half_w, -v2.y * half_h + half_h);
        let p3 = Vec2::new(v3.x * half_w + half_w, -v3.y * half_h + half_h);

        // Front faces wind such that this cross is strictly negative in
        // the flipped screen system.
        if (p2 - p1).cross(p3 - p2) >= 0.0 {
            return Ok(());
        }

        if !program.pass.schema_matches() {
            let [s1, s2, s3] = &program.pass.vertex;
            return Err(RenderError::SchemaMismatch {
                v1: s1.location_count(),
                v2: s2.location_count(),
                v3: s3.location_count(),
            });
        }
        program.pass.prepare_out();

        let denom = (p2.y - p3.y) * (p1.x - p3.x) + (p3.x - p2.x) * (p1.y - p3.y);
        if !denom.is_finite() || denom.abs() < DEGENERATE_AREA {
            return Ok(());
        }
        let inv_denom = 1.0 / denom;

        let min_x = p1.x.min(p2.x).min(p3.x);
        let min_y = p1.y.min(p2.y).min(p3.y);
        let max_x = p1.x.max(p2.x).max(p3.x);
        let max_y = p1.y.max(p2.y).max(p3.y);

        // Bounding box in cells, clamped to the viewport. An empty range
        // makes the triangle a no-op.
        let min_col = ((min_x / CELL_WIDTH as f32).floor() as i64).clamp(0, fb.width() as i64);
        let min_row = ((min_y / CELL_HEIGHT as f32).floor() as i64).clamp(0, fb.height() as i64);
        let max_col = ((max_x / CELL_WIDTH as f32).floor() as i64 + 1).clamp(0, fb.width() as i64);
        let max_row =
            ((max_y / CELL_HEIGHT as f32).floor() as i64 + 1).clamp(0, fb.height() as i64);

        for row in min_row as u32..max_row as u32 {
            for col in min_col as u32..max_col as u32 {
                update_cell(fb, col, row, [v1, v2, v3], [p1, p2, p3], inv_denom, program);
            }
        }

        Ok(())
    }
}

/// Accumulate one triangle's coverage of one cell and composite it.
fn update_cell<S: Shader>(
    fb: &mut FrameBuffer,
    col: u32,
    row: u32,
    clip: [Vec4; 3],
    projected: [Vec2; 3],
    inv_denom: f32,
    program: &mut ShaderProgram<S>,
) {
    let [v1, v2, v3] = clip;
    let [p1, p2, p3] = projected;

    let mut fill: u8 = 0;
    let mut pattern: u8 = 0;
    let mut depth: u16 = 0;

    for off_x in 0..CELL_WIDTH {
        for off_y in 0..CELL_HEIGHT {
            let dot_x = (CELL_WIDTH * col + off_x) as f32;
            let dot_y = (CELL_HEIGHT * row + off_y) as f32;
            let b = barycentric(dot_x, dot_y, p1, p2, p3, inv_denom);
            if !covered(b) {
                continue;
            }

            // First covered dot: interpolate attributes, compute depth,
            // run the fragment stage. Later dots only extend the fill.
            if fill == 0 {
                let (c1, c2, c3) = perspective_weights(b, v1, v2, v3);
                program.pass.interpolate(c1, c2, c3);
                depth = cell_depth(b, v1, v2, v3);

                let mut fragment_out = Vec4::ZERO;
                let brightness = program.shader.fragment(
                    &program.uniforms,
                    &program.pass.out,
                    &mut fragment_out,
                );
                let bucket = (MAX_BRIGHT * brightness).round().clamp(0.0, MAX_BRIGHT) as usize;
                pattern = SHADING_PATTERNS[bucket];
            }

            fill |= DOT_VALUES[off_y as usize][off_x as usize];
        }
    }

    if fill != 0 {
        fb.set_pattern(col, row, pattern, depth, fill);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::attributes::AttributeStream;
    use crate::render::shader::Uniforms;
    use approx::assert_relative_eq;
    use std::cell::Cell;

    /// Vertex stage is never exercised when triangles are submitted
    /// directly; the fragment stage returns a configurable brightness.
    struct FixedBright(f32);

    impl Shader for FixedBright {
        fn vertex(
            &self,
            _uniforms: &Uniforms,
            _vertices: &[f32],
            _index: usize,
            _out: &mut AttributeStream,
        ) -> Vec4 {
            Vec4::ZERO
        }

        fn fragment(
            &self,
            _uniforms: &Uniforms,
            _attributes: &AttributeStream,
            _out: &mut Vec4,
        ) -> f32 {
            self.0
        }
    }

    fn rasterizer(width: u32, height: u32) -> Rasterizer {
        Rasterizer::new(width, height, Box::new(|_| {})).expect("rasterizer")
    }

    fn program(brightness: f32) -> ShaderProgram<FixedBright> {
        let mut program = ShaderProgram::new(FixedBright(brightness), 0);
        for stream in &mut program.pass.vertex {
            stream.push_scalar(1.0);
        }
        program
    }

    /// A front-facing triangle whose projection covers the whole 4x4-cell
    /// viewport, with `z/w = 0.25` at every vertex.
    fn covering_triangle() -> (Vec4, Vec4, Vec4) {
        (
            Vec4::new(-6.0, 3.5, 1.0, 4.0),
            Vec4::new(-6.0, -6.5, 1.0, 4.0),
            Vec4::new(14.0, 3.5, 1.0, 4.0),
        )
    }

    #[test]
    fn covering_triangle_fills_every_cell() {
        let mut r = rasterizer(4, 4);
        let mut p = program(1.0);
        let (v1, v2, v3) = covering_triangle();
        r.rasterize_triangle(v1, v2, v3, &mut p).expect("draw");

        let frame = r.back_frame();
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(frame.pattern(x, y), 0xFF, "cell ({x},{y})");
                assert_eq!(frame.fill(x, y), 0xFF, "cell ({x},{y})");
                assert_eq!(frame.depth(x, y), 0x4000, "cell ({x},{y})");
            }
        }
    }

    #[test]
    fn reversed_winding_writes_nothing() {
        let mut r = rasterizer(4, 4);
        let mut p = program(1.0);
        let (v1, v2, v3) = covering_triangle();
        r.rasterize_triangle(v1, v3, v2, &mut p).expect("draw");

        let frame = r.back_frame();
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(frame.pattern(x, y), 0);
                assert_eq!(frame.depth(x, y), MAX_DEPTH);
            }
        }
    }

    #[test]
    fn brightness_selects_the_shading_bucket() {
        let mut r = rasterizer(4, 4);
        let mut p = program(0.5);
        let (v1, v2, v3) = covering_triangle();
        r.rasterize_triangle(v1, v2, v3, &mut p).expect("draw");
        // round(8 * 0.5) = 4
        assert_eq!(r.back_frame().pattern(0, 0), SHADING_PATTERNS[4]);
    }

    #[test]
    fn zero_brightness_claims_dots_without_showing_any() {
        let mut r = rasterizer(4, 4);
        let mut p = program(0.0);
        let (v1, v2, v3) = covering_triangle();
        r.rasterize_triangle(v1, v2, v3, &mut p).expect("draw");

        let frame = r.back_frame();
        assert_eq!(frame.pattern(1, 1), 0x00);
        assert_eq!(frame.fill(1, 1), 0xFF);
    }

    #[test]
    fn depth_is_clamped_into_the_16_bit_range() {
        let far = |z: f32, w: f32| {
            let mut r = rasterizer(4, 4);
            let mut p = program(1.0);
            let (mut v1, mut v2, mut v3) = covering_triangle();
            for v in [&mut v1, &mut v2, &mut v3] {
                v.z = z;
                v.w = w;
            }
            r.rasterize_triangle(v1, v2, v3, &mut p).expect("draw");
            let frame = r.back_frame();
            frame.depth(2, 2)
        };

        // z/w = 2 would overflow u16 without the clamp.
        assert_eq!(far(2.0, 1.0), MAX_DEPTH);
        // z/w < 0 would wrap without the clamp.
        assert_eq!(far(-1.0, 2.0), 0);
    }

    #[test]
    fn offscreen_triangle_is_a_no_op() {
        let mut r = rasterizer(4, 4);
        let mut p = program(1.0);
        // Entirely left of the viewport.
        let v1 = Vec4::new(-3.0, 0.5, 1.0, 1.0);
        let v2 = Vec4::new(-3.0, -0.5, 1.0, 1.0);
        let v3 = Vec4::new(-2.0, 0.5, 1.0, 1.0);
        r.rasterize_triangle(v1, v2, v3, &mut p).expect("draw");

        let frame = r.back_frame();
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(frame.fill(x, y), 0);
            }
        }
    }

    #[test]
    fn collapsed_triangle_writes_nothing() {
        let mut r = rasterizer(4, 4);
        let mut p = program(1.0);
        let v = Vec4::new(0.25, 0.25, 1.0, 1.0);
        r.rasterize_triangle(v, v, v, &mut p).expect("draw");
        assert_eq!(r.back_frame().fill(2, 1), 0);
    }

    #[test]
    fn schema_mismatch_fails_the_triangle_and_leaves_the_frame_untouched() {
        let mut r = rasterizer(4, 4);
        let mut p = program(1.0);
        p.pass.vertex[1].push_scalar(2.0);
        let (v1, v2, v3) = covering_triangle();

        let result = r.rasterize_triangle(v1, v2, v3, &mut p);
        assert!(matches!(result, Err(RenderError::SchemaMismatch { .. })));
        assert_eq!(r.back_frame().fill(0, 0), 0);
    }

    #[test]
    fn perspective_weights_favor_the_near_vertex() {
        // Two vertices at depths 1 and 10, sampled halfway in screen
        // space: the interpolant must land at the perspective-correct
        // 200/11, not the affine 55.
        let near = Vec4::new(0.0, 0.0, 1.0, 1.0);
        let far = Vec4::new(0.0, 0.0, 10.0, 10.0);
        let unused = Vec4::new(0.0, 0.0, 1.0, 1.0);
        let (c1, c2, c3) = perspective_weights(Vec3::new(0.5, 0.5, 0.0), near, far, unused);

        let interpolated = 10.0 * c1 + 100.0 * c2 + 0.0 * c3;
        assert_relative_eq!(interpolated, 200.0 / 11.0, epsilon = 1e-4);
        assert_relative_eq!(c1 + c2 + c3, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn interpolation_runs_once_per_cell() {
        struct CountingShader(Cell<u32>);

        impl Shader for CountingShader {
            fn vertex(
                &self,
                _uniforms: &Uniforms,
                _vertices: &[f32],
                _index: usize,
                _out: &mut AttributeStream,
            ) -> Vec4 {
                Vec4::ZERO
            }

            fn fragment(
                &self,
                _uniforms: &Uniforms,
                _attributes: &AttributeStream,
                _out: &mut Vec4,
            ) -> f32 {
                self.0.set(self.0.get() + 1);
                1.0
            }
        }

        let mut r = rasterizer(4, 4);
        let mut p = ShaderProgram::new(CountingShader(Cell::new(0)), 0);
        for stream in &mut p.pass.vertex {
            stream.push_scalar(1.0);
        }
        let (v1, v2, v3) = covering_triangle();
        r.rasterize_triangle(v1, v2, v3, &mut p).expect("draw");

        // 16 covered cells, one fragment invocation each.
        assert_eq!(p.shader().0.get(), 16);
    }

    #[test]
    fn disjoint_triangles_compose_identically_in_either_order() {
        // Two small front-facing triangles in opposite viewport corners.
        let a = (
            Vec4::new(-0.9, 0.9, 1.0, 2.0),
            Vec4::new(-0.9, 0.4, 1.0, 2.0),
            Vec4::new(-0.4, 0.9, 1.0, 2.0),
        );
        let b = (
            Vec4::new(0.4, -0.4, 1.0, 4.0),
            Vec4::new(0.4, -0.9, 1.0, 4.0),
            Vec4::new(0.9, -0.4, 1.0, 4.0),
        );

        let draw = |order: [&(Vec4, Vec4, Vec4); 2]| {
            let mut r = rasterizer(8, 8);
            let mut p = program(1.0);
            for (v1, v2, v3) in order.into_iter().copied() {
                r.rasterize_triangle(v1, v2, v3, &mut p).expect("draw");
            }
            let frame = r.back_frame();
            let mut cells = Vec::new();
            for y in 0..8 {
                for x in 0..8 {
                    cells.push((frame.pattern(x, y), frame.fill(x, y), frame.depth(x, y)));
                }
            }
            cells
        };

        assert_eq!(draw([&a, &b]), draw([&b, &a]));
    }
}
