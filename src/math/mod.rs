//! Vector and matrix math for the rendering pipeline.
//!
//! All types are 32-bit float based. [`Vec2`] carries the scalar 2D cross
//! product used for back-face culling, [`Vec4`] holds clip-space positions,
//! and [`Mat4`] provides the usual model/view/projection constructors.

pub mod mat4;
pub mod vec2;
pub mod vec3;
pub mod vec4;

pub use mat4::Mat4;
pub use vec2::Vec2;
pub use vec3::Vec3;
pub use vec4::Vec4;
