//! The rasterization pipeline.
//!
//! A draw call flows through here as: [`context::RenderContext`] fetches
//! indexed vertices and runs the vertex stage, [`rasterizer::Rasterizer`]
//! turns each triangle into per-cell dot coverage and fragment shading, and
//! [`framebuffer::FrameBuffer`] composites the result. Presentation is
//! double buffered through [`present`].

pub mod attributes;
pub mod context;
pub mod framebuffer;
pub mod present;
pub mod rasterizer;
pub mod shader;

pub use attributes::AttributeStream;
pub use context::{RenderContext, VertexInput};
pub use framebuffer::FrameBuffer;
pub use present::RenderCallback;
pub use rasterizer::Rasterizer;
pub use shader::{Shader, ShaderProgram, Uniforms};

use std::collections::TryReserveError;
use std::fmt;
use std::io;

/// Errors a draw call or buffer operation can surface. Per-triangle
/// anomalies (back-facing, degenerate, off-screen) are not errors; the
/// rasterizer skips those silently.
#[derive(Debug)]
pub enum RenderError {
    /// A frame-buffer allocation failed.
    ResourceExhaustion(TryReserveError),
    /// The presenter thread could not be started.
    PresenterSpawn(io::Error),
    /// The three vertex pass streams disagree on location count or widths,
    /// so interpolation is undefined for the triangle.
    SchemaMismatch { v1: usize, v2: usize, v3: usize },
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::ResourceExhaustion(e) => {
                write!(f, "failed to allocate frame buffer: {}", e)
            }
            RenderError::PresenterSpawn(e) => {
                write!(f, "failed to spawn presenter thread: {}", e)
            }
            RenderError::SchemaMismatch { v1, v2, v3 } => write!(
                f,
                "vertex pass streams disagree on schema ({}/{}/{} locations or unequal widths)",
                v1, v2, v3
            ),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::ResourceExhaustion(e) => Some(e),
            RenderError::PresenterSpawn(e) => Some(e),
            RenderError::SchemaMismatch { .. } => None,
        }
    }
}
