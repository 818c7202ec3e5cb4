//! Frame Hook Trait
//!
//! Per-camera callbacks the [`RenderPipelineManager`] invokes around each
//! rendered eye.
//!
//! [`RenderPipelineManager`]: crate::renderer::manager::RenderPipelineManager

use crate::renderer::capabilities::CapabilityContext;
use crate::renderer::core::resources::{RenderTargetPool, TextureAllocator};
use crate::renderer::host::{CameraFrame, CameraHooks, ShaderRegistry};
use crate::settings::SsrSettings;

/// Everything a frame callback may read or mutate.
pub struct FrameContext<'a, A> {
    pub frame: &'a CameraFrame,
    pub caps: &'a CapabilityContext,
    pub settings: &'a SsrSettings,
    pub pool: &'a mut RenderTargetPool<A>,
    pub shaders: &'a dyn ShaderRegistry,
    pub hooks: &'a mut dyn CameraHooks,
}

/// Camera frame callbacks.
///
/// # Ordering
/// For every rendered eye the manager calls `on_frame_begin`, lets the host
/// render, then calls `on_frame_end`. Stereo cameras run the pair once per
/// eye, left before right.
///
/// # Design Principles
/// - `on_frame_begin` may rebuild resources and record command sequences,
///   then attaches this eye's sequences
/// - `on_frame_end` only retracts what `on_frame_begin` attached
/// - Neither callback waits on the GPU
pub trait FrameHook {
    /// Name for logging.
    fn name(&self) -> &str;

    /// Pre-render callback for one eye.
    fn on_frame_begin<A: TextureAllocator>(&mut self, ctx: &mut FrameContext<'_, A>);

    /// Post-render callback for one eye.
    fn on_frame_end<A: TextureAllocator>(&mut self, ctx: &mut FrameContext<'_, A>);
}
