//! The programmable shading surface.
//!
//! A draw call binds a [`ShaderProgram`]: a user-supplied [`Shader`] (the
//! vertex and fragment stages), a fixed-capacity array of uniform scalars,
//! and the four attribute pass streams the pipeline shuttles vertex outputs
//! through. The rasterizer is fixed-function; everything a triangle looks
//! like comes from these two stages.

use std::ops::{Deref, DerefMut};

use crate::math::Vec4;
use crate::render::attributes::AttributeStream;

/// Fixed-capacity array of uniform scalars shared by both stages.
///
/// The capacity is declared when the program is built and never changes;
/// `prepare` is the hook where an application refreshes the values once per
/// draw call. Derefs to `[f32]` for indexing.
#[derive(Clone, Debug)]
pub struct Uniforms {
    values: Box<[f32]>,
}

impl Uniforms {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: vec![0.0; capacity].into_boxed_slice(),
        }
    }
}

impl Deref for Uniforms {
    type Target = [f32];

    fn deref(&self) -> &Self::Target {
        &self.values
    }
}

impl DerefMut for Uniforms {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.values
    }
}

/// A vertex stage plus a fragment stage.
///
/// The vertex stage is called once per triangle corner: it reads its vertex
/// out of the flat input buffer, pushes any number of attribute locations
/// into `out`, and returns the clip-space position. The fragment stage is
/// called with the perspective-correct interpolation of those attributes
/// and returns a brightness in `[0, 1]` that picks the Braille shading
/// pattern.
pub trait Shader {
    /// Hook to refresh uniforms, run once per draw call before any vertex.
    fn prepare(&mut self, _uniforms: &mut Uniforms) {}

    fn vertex(
        &self,
        uniforms: &Uniforms,
        vertices: &[f32],
        index: usize,
        out: &mut AttributeStream,
    ) -> Vec4;

    /// `out` is reserved for additional per-dot outputs; the returned
    /// brightness is what selects the glyph.
    fn fragment(
        &self,
        _uniforms: &Uniforms,
        _attributes: &AttributeStream,
        _out: &mut Vec4,
    ) -> f32 {
        1.0
    }
}

/// The four parallel streams accompanying a draw: one per triangle corner
/// plus the interpolation target handed to the fragment stage. All four
/// share one schema within a triangle.
#[derive(Clone, Debug)]
pub struct PassBuffers {
    pub(crate) vertex: [AttributeStream; 3],
    pub(crate) out: AttributeStream,
}

impl Default for PassBuffers {
    fn default() -> Self {
        Self {
            vertex: std::array::from_fn(|_| AttributeStream::new()),
            out: AttributeStream::new(),
        }
    }
}

impl PassBuffers {
    pub(crate) fn clear_all(&mut self) {
        for stream in &mut self.vertex {
            stream.clear();
        }
        self.out.clear();
    }

    /// Whether the three corner streams agree on location count and widths.
    pub(crate) fn schema_matches(&self) -> bool {
        let [v1, v2, v3] = &self.vertex;
        v1.location_sizes() == v2.location_sizes() && v2.location_sizes() == v3.location_sizes()
    }

    /// Rebuild the interpolation target with the corner schema, zeroed.
    pub(crate) fn prepare_out(&mut self) {
        self.out.clear();
        for i in 0..self.vertex[0].location_count() {
            self.out.bind(None, self.vertex[0].location_size(i));
        }
    }

    /// Blend the three corner streams into the target with the given
    /// weights, scalar by scalar across all locations.
    pub(crate) fn interpolate(&mut self, c1: f32, c2: f32, c3: f32) {
        let [v1, v2, v3] = &self.vertex;
        for i in 0..self.out.raw_len() {
            let value = v1.raw_value(i) * c1 + v2.raw_value(i) * c2 + v3.raw_value(i) * c3;
            self.out.set_raw_value(i, value);
        }
    }
}

/// A [`Shader`] bound together with its uniforms and pass streams.
pub struct ShaderProgram<S: Shader> {
    pub(crate) shader: S,
    pub(crate) uniforms: Uniforms,
    pub(crate) pass: PassBuffers,
}

impl<S: Shader> ShaderProgram<S> {
    /// Bind `shader` with `uniform_capacity` scalars of uniform storage.
    pub fn new(shader: S, uniform_capacity: usize) -> Self {
        Self {
            shader,
            uniforms: Uniforms::new(uniform_capacity),
            pass: PassBuffers::default(),
        }
    }

    pub fn shader(&self) -> &S {
        &self.shader
    }

    pub fn shader_mut(&mut self) -> &mut S {
        &mut self.shader
    }

    pub fn uniforms(&self) -> &Uniforms {
        &self.uniforms
    }

    pub fn uniforms_mut(&mut self) -> &mut Uniforms {
        &mut self.uniforms
    }

    /// The pass streams in their fixed order: the three triangle corners,
    /// then the interpolation target.
    pub fn pass_buffers(&self) -> [&AttributeStream; 4] {
        let [v1, v2, v3] = &self.pass.vertex;
        [v1, v2, v3, &self.pass.out]
    }

    /// Mutable view of the pass streams, for callers that submit triangles
    /// to the rasterizer directly instead of through a draw call.
    pub fn pass_buffers_mut(&mut self) -> [&mut AttributeStream; 4] {
        let [v1, v2, v3] = &mut self.pass.vertex;
        [v1, v2, v3, &mut self.pass.out]
    }

    pub(crate) fn prepare(&mut self) {
        self.shader.prepare(&mut self.uniforms);
    }
}
