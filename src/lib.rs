#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

//! Screen-space reflection orchestration for deferred renderers.
//!
//! The crate is the control plane of a hierarchical-Z SSR effect: it sizes
//! and allocates the render targets, picks the pipeline topology from the
//! platform and camera state, and records the per-eye GPU command sequences
//! the host replays at its camera events. Shader code and the actual GPU
//! submission stay with the host.

pub mod errors;
pub mod renderer;
pub mod settings;

pub use errors::{Result, SsrError};
pub use renderer::capabilities::{CapabilityContext, GraphicsApi};
pub use renderer::core::resources::{
    Eye, HistoryAxes, HistoryManager, HistorySlot, RenderTargetPool, RenderTargetSpec,
    TextureAllocator, TextureHandle, WgpuTextureAllocator,
};
pub use renderer::graph::{CommandSequence, FrameHook, GpuCommand};
pub use renderer::host::{
    CameraEvent, CameraFrame, CameraHooks, CameraId, ShaderLibrary, ShaderRegistry, StereoEye,
};
pub use renderer::manager::{ExternalCompositing, RenderPipelineManager};
pub use renderer::ssr::{PipelineState, ScreenSpaceReflections};
pub use settings::SsrSettings;
