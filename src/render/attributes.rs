//! Per-vertex attribute storage.
//!
//! A vertex stage emits an arbitrary list of outputs (color, normal, UV, a
//! lone brightness scalar) that the rasterizer later interpolates across the
//! triangle. [`AttributeStream`] stores that list as a column store: one
//! flat `f32` buffer plus a sidecar of per-location widths. Interpolation
//! never cares about location boundaries, so it runs over the flat buffer;
//! shaders that want structure read back whole locations.

use crate::math::{Vec2, Vec3, Vec4};

/// Append-only column store of fixed-width float tuples ("locations").
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttributeStream {
    values: Vec<f32>,
    widths: Vec<usize>,
}

impl AttributeStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one location of `width` scalars. When `src` is given, its
    /// first `width` values initialise the location; otherwise it is zeroed.
    pub fn bind(&mut self, src: Option<&[f32]>, width: usize) {
        match src {
            Some(values) => self.values.extend_from_slice(&values[..width]),
            None => self.values.resize(self.values.len() + width, 0.0),
        }
        self.widths.push(width);
    }

    /// Drop every location, keeping the allocation for reuse.
    pub fn clear(&mut self) {
        self.values.clear();
        self.widths.clear();
    }

    /// Number of locations bound so far.
    pub fn location_count(&self) -> usize {
        self.widths.len()
    }

    /// Scalar width of location `i`.
    pub fn location_size(&self, i: usize) -> usize {
        self.widths[i]
    }

    /// Per-location widths, in bind order.
    pub fn location_sizes(&self) -> &[usize] {
        &self.widths
    }

    /// Total scalar count across all locations.
    pub fn raw_len(&self) -> usize {
        self.values.len()
    }

    /// The `i`-th scalar of the concatenation of all locations.
    #[inline]
    pub fn raw_value(&self, i: usize) -> f32 {
        self.values[i]
    }

    #[inline]
    pub fn set_raw_value(&mut self, i: usize, value: f32) {
        self.values[i] = value;
    }

    /// The scalars of location `i` as a slice.
    pub fn location(&self, i: usize) -> &[f32] {
        let start: usize = self.widths[..i].iter().sum();
        &self.values[start..start + self.widths[i]]
    }

    pub fn push_scalar(&mut self, value: f32) {
        self.bind(Some(&[value]), 1);
    }

    pub fn push_vec2(&mut self, v: Vec2) {
        self.bind(Some(&[v.x, v.y]), 2);
    }

    pub fn push_vec3(&mut self, v: Vec3) {
        self.bind(Some(&[v.x, v.y, v.z]), 3);
    }

    pub fn push_vec4(&mut self, v: Vec4) {
        self.bind(Some(&[v.x, v.y, v.z, v.w]), 4);
    }
}
