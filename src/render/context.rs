//! Draw-call orchestration.
//!
//! [`RenderContext`] owns the [`Rasterizer`] and turns an indexed vertex
//! stream into triangle submissions: for every index triple it runs the
//! vertex stage three times, applies the perspective divide, and hands the
//! triangle on.

use crate::math::Vec4;
use crate::render::present::RenderCallback;
use crate::render::rasterizer::Rasterizer;
use crate::render::shader::{Shader, ShaderProgram};
use crate::render::RenderError;

/// An indexed vertex stream: flat interleaved per-vertex floats plus an
/// index array read as consecutive triples. The vertex stage owns the
/// layout of the flat buffer; nothing here interprets it.
#[derive(Clone, Copy, Debug)]
pub struct VertexInput<'a> {
    vertices: &'a [f32],
    indices: &'a [u32],
}

impl<'a> VertexInput<'a> {
    pub fn new(vertices: &'a [f32], indices: &'a [u32]) -> Self {
        Self { vertices, indices }
    }

    pub fn vertices(&self) -> &'a [f32] {
        self.vertices
    }

    pub fn indices(&self) -> &'a [u32] {
        self.indices
    }
}

pub struct RenderContext {
    rasterizer: Rasterizer,
}

impl RenderContext {
    /// Build a context with a `width x height` cell viewport. `callback`
    /// runs on the presenter thread with every presented frame.
    pub fn new(width: u32, height: u32, callback: RenderCallback) -> Result<Self, RenderError> {
        Ok(Self {
            rasterizer: Rasterizer::new(width, height, callback)?,
        })
    }

    pub fn rasterizer(&self) -> &Rasterizer {
        &self.rasterizer
    }

    pub fn rasterizer_mut(&mut self) -> &mut Rasterizer {
        &mut self.rasterizer
    }

    /// Clear the frame being composed.
    pub fn clear_frame(&mut self) {
        self.rasterizer.clear_frame();
    }

    /// Swap buffers and hand the finished frame to the presenter.
    pub fn present_frame(&mut self) {
        self.rasterizer.present_frame();
    }

    /// Recreate the frame buffers for a new terminal geometry.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        self.rasterizer.resize(width, height)
    }

    /// Draw every triangle of `input` with `program` into the back buffer.
    ///
    /// Per-triangle anomalies (back-facing, degenerate, off-screen) are
    /// skipped silently. A pass-stream schema mismatch skips the affected
    /// triangles, is reported once, and fails the draw call after the
    /// remaining triangles have been processed.
    pub fn draw_indexed<S: Shader>(
        &mut self,
        program: &mut ShaderProgram<S>,
        input: &VertexInput<'_>,
    ) -> Result<(), RenderError> {
        program.prepare();
        program.pass.clear_all();

        let mut schema_error = None;

        for triple in input.indices().chunks_exact(3) {
            program.pass.clear_all();

            let mut positions = [Vec4::ZERO; 3];
            for (corner, &index) in triple.iter().enumerate() {
                let clip = program.shader.vertex(
                    &program.uniforms,
                    input.vertices(),
                    index as usize,
                    &mut program.pass.vertex[corner],
                );
                positions[corner] = clip;
            }

            // Perspective divide; z and w ride along for interpolation.
            for position in &mut positions {
                position.x /= position.z;
                position.y /= position.z;
            }

            let [v1, v2, v3] = positions;
            match self.rasterizer.rasterize_triangle(v1, v2, v3, program) {
                Ok(()) => {}
                Err(error @ RenderError::SchemaMismatch { .. }) => {
                    if schema_error.is_none() {
                        log::warn!("{error}; skipping affected triangles for this draw");
                        schema_error = Some(error);
                    }
                }
                Err(error) => return Err(error),
            }
        }

        match schema_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
