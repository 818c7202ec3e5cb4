//! SSR Render Passes
//!
//! Each pass owns the render targets it writes and records its GPU commands
//! into a per-eye [`CommandSequence`](super::command::CommandSequence):
//!
//! - [`HiZGenerator`]: hierarchical depth pyramid (compute or shader path)
//! - [`ScreenColorHistory`]: reprojected, blurred screen-color mip chain
//! - [`SsrTracer`]: trace, hit-distance blur, normals-aware blur and compose
//! - [`OceanCombine`]: optional fusion of an external ocean G-buffer

pub mod hiz;
pub mod ocean;
pub mod screen_color;
pub mod ssr_trace;

pub use hiz::HiZGenerator;
pub use ocean::OceanCombine;
pub use screen_color::ScreenColorHistory;
pub use ssr_trace::SsrTracer;

use glam::{UVec2, Vec4};

/// Pixel dimensions as a shader vector `(w, h, 0, 0)`.
#[inline]
pub(crate) fn size_vector(size: UVec2) -> Vec4 {
    Vec4::new(size.x as f32, size.y as f32, 0.0, 0.0)
}
