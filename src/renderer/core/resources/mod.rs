//! Render-target resources
//!
//! Split by responsibility:
//! - texture.rs: RenderTargetSpec and its sampling/dimension enums
//! - pool.rs: RenderTargetPool and the TextureAllocator backend trait
//! - history.rs: HistoryManager (flip-flop / VR / cubemap indexing)
//! - wgpu_allocator.rs: TextureAllocator backed by a wgpu::Device

mod history;
mod pool;
mod texture;
mod wgpu_allocator;

pub use history::{Eye, HistoryAxes, HistoryManager, HistorySlot};
pub use pool::{RenderTargetPool, TextureAllocator, TextureHandle};
pub use texture::{CUBE_FACE_COUNT, RenderTargetSpec, TargetDimension, TargetFilter};
pub use wgpu_allocator::{WgpuRenderTarget, WgpuTextureAllocator};
