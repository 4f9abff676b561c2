//! Software 3D pipeline
//!
//! Features:
//! - Homogeneous transform and fixed composition order for every object
//! - Frustum or screen-frame clipping that produces new geometry
//! - Painter's algorithm over a stable z-sort (no z-buffer)
//! - Perspective-correct, mipmapped, alpha-blended and fogged span fills,
//!   in floating point or fixed point
//!
//! # Module Organization
//!
//! - `math` - Vec2, Vec3, Vec4, Mat4, Plane, compose_transform
//! - `fixed` - 16.16 and 2.30 fixed-point formats
//! - `types` - Color, RenderFlags, Fog
//! - `texture` - Texture, mipmaps, TextureSource, TextureBank
//! - `geometry` - Mesh, BillboardSet, Transform
//! - `camera` - Camera producing the view matrix
//! - `buffers` - VertexBuffer, Triangle, TriangleList (z-sort)
//! - `clip` - Single-plane triangle clipping and plane sets
//! - `renderer` - Geometry pipeline into a TriangleList
//! - `framebuffer` - RGBA pixel sink
//! - `filler` - Span fillers (float, float-wide, fixed)
//! - `raster` - Rasterizer: sort and scan conversion

pub mod buffers;
pub mod camera;
pub mod clip;
pub mod filler;
pub mod fixed;
pub mod framebuffer;
pub mod geometry;
pub mod math;
pub mod raster;
pub mod renderer;
pub mod texture;
pub mod types;

// =============================================================================
// Convenience re-exports for commonly used items
// =============================================================================

pub use buffers::{TriVertex, Triangle, TriangleList, VertexBuffer};
pub use camera::Camera;
pub use clip::{clip_triangle, ClipResult, CLIP_EPSILON};
pub use filler::{FillMode, FixedFiller, FloatFiller, Span, SpanFiller, WideFiller};
pub use framebuffer::Framebuffer;
pub use geometry::{Billboard, BillboardSet, Mesh, MeshTriangle, Transform};
pub use math::{
    compose_transform, mat4_identity, mat4_inverse, mat4_mul, mat4_transform_point, Mat4, Plane,
    Vec2, Vec3, Vec4,
};
pub use raster::{RasterOutcome, RasterStats, Rasterizer};
pub use renderer::{Drawable, RenderError, RenderStats, Renderer, ViewportPoint};
pub use texture::{Texture, TextureBank, TextureError, TextureSlot, TextureSource};
pub use types::{Color, Fog, RenderFlags};
