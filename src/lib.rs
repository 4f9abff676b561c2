//! bonnie-raster: a fixed-budget software 3D pipeline
//!
//! `Renderer` turns meshes and billboard sets into clipped, projected,
//! back-face culled triangles in a `TriangleList`; `Rasterizer` sorts that
//! list back to front and scan-converts it into an RGBA framebuffer.
//! Everything runs on the calling thread with storage allocated up front.

pub mod config;
pub mod rasterizer;

pub use config::{Arithmetic, ClipMode, ConfigError, RenderConfig};
