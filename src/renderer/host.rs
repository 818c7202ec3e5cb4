//! Host Interfaces
//!
//! The SSR core never talks to a scene graph or a window. Everything it needs
//! from the host engine arrives through the types in this module:
//!
//! - [`CameraFrame`]: a per-frame snapshot of one camera (size, HDR, stereo
//!   eye, projection)
//! - [`ShaderRegistry`]: name-based lookup of GPU programs and compute kernels
//! - [`CameraHooks`]: the camera event insertion points, plus the few
//!   uniforms the core sets directly
//!
//! The host owns the actual GPU objects and replays the recorded
//! [`CommandSequence`]s at the event they were attached to.

use std::sync::Arc;

use glam::{Mat4, UVec2};
use rustc_hash::FxHashMap;

use crate::renderer::core::resources::Eye;
use crate::renderer::graph::command::{CommandSequence, SequenceId};

/// Identity of a host camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CameraId(pub u64);

/// Named pipeline insertion points of a host camera.
///
/// Ordering relative to other systems attached at the same event is decided
/// by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraEvent {
    /// The depth buffer is complete and resolved.
    DepthReady,
    /// Opaque and deferred lighting are done, transparents are next.
    BeforeTransparency,
    AfterTransparency,
    /// Final image is complete, before it is presented.
    BeforePresent,
}

/// Which eye the host is currently rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StereoEye {
    #[default]
    Mono,
    Left,
    Right,
}

impl StereoEye {
    /// History eye that stores this eye's resources. Mono rendering uses the
    /// left-eye slot.
    #[inline]
    #[must_use]
    pub fn history_eye(self) -> Eye {
        match self {
            Self::Mono | Self::Left => Eye::Left,
            Self::Right => Eye::Right,
        }
    }

    /// Returns `true` if no further eye of this camera renders this frame.
    #[inline]
    #[must_use]
    pub fn is_last_eye(self) -> bool {
        matches!(self, Self::Mono | Self::Right)
    }
}

/// Snapshot of a camera's state for one frame, provided by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraFrame {
    /// Size of the window or screen the camera presents to.
    pub screen_size: UVec2,
    /// Size of the camera's target texture, when it renders off-screen.
    pub target_size: Option<UVec2>,
    /// Per-eye texture size while a VR device is active.
    pub vr_eye_size: Option<UVec2>,
    pub hdr: bool,
    pub stereo_eye: StereoEye,
    /// GPU projection matrix for the eye being rendered.
    pub projection: Mat4,
}

impl CameraFrame {
    /// A mono, LDR frame rendering straight to a screen of `width × height`.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            screen_size: UVec2::new(width, height),
            target_size: None,
            vr_eye_size: None,
            hdr: false,
            stereo_eye: StereoEye::Mono,
            projection: Mat4::IDENTITY,
        }
    }

    #[must_use]
    pub fn with_hdr(mut self, hdr: bool) -> Self {
        self.hdr = hdr;
        self
    }

    #[must_use]
    pub fn with_target_size(mut self, width: u32, height: u32) -> Self {
        self.target_size = Some(UVec2::new(width, height));
        self
    }

    /// Enables VR rendering with per-eye textures of `width × height`.
    #[must_use]
    pub fn with_vr(mut self, width: u32, height: u32, eye: StereoEye) -> Self {
        self.vr_eye_size = Some(UVec2::new(width, height));
        self.stereo_eye = eye;
        self
    }

    #[must_use]
    pub fn with_projection(mut self, projection: Mat4) -> Self {
        self.projection = projection;
        self
    }

    /// A VR device is active for this camera.
    #[inline]
    #[must_use]
    pub fn vr_enabled(&self) -> bool {
        self.vr_eye_size.is_some()
    }

    /// Size the camera actually renders at: the VR eye texture, then the
    /// camera target texture, then the screen.
    #[must_use]
    pub fn render_dimensions(&self) -> UVec2 {
        self.vr_eye_size
            .or(self.target_size)
            .unwrap_or(self.screen_size)
    }
}

// ============================================================================
// Shader Registry
// ============================================================================

/// Opaque id of a full-screen GPU program (material/shader).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u32);

/// Opaque id of a compute kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KernelId(pub u32);

/// Either kind of GPU program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramRef {
    Program(ProgramId),
    Kernel(KernelId),
}

/// Name-based lookup of GPU programs.
///
/// Lookups return `None` for unknown names; the core degrades instead of
/// failing.
pub trait ShaderRegistry {
    fn find_program(&self, name: &str) -> Option<ProgramId>;

    fn find_kernel(&self, name: &str) -> Option<KernelId>;

    /// Returns `false` once a previously resolved program has been unloaded.
    fn is_alive(&self, _program: ProgramRef) -> bool {
        true
    }
}

/// Map-backed [`ShaderRegistry`].
#[derive(Debug, Default, Clone)]
pub struct ShaderLibrary {
    programs: FxHashMap<String, ProgramId>,
    kernels: FxHashMap<String, KernelId>,
    next_id: u32,
}

impl ShaderLibrary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a program under `name`, returning its id.
    pub fn add_program(&mut self, name: impl Into<String>) -> ProgramId {
        let id = ProgramId(self.bump());
        self.programs.insert(name.into(), id);
        id
    }

    /// Registers a compute kernel under `name`, returning its id.
    pub fn add_kernel(&mut self, name: impl Into<String>) -> KernelId {
        let id = KernelId(self.bump());
        self.kernels.insert(name.into(), id);
        id
    }

    /// Unloads a program. Sequences referencing it stop being attached.
    pub fn remove_program(&mut self, name: &str) -> Option<ProgramId> {
        self.programs.remove(name)
    }

    pub fn remove_kernel(&mut self, name: &str) -> Option<KernelId> {
        self.kernels.remove(name)
    }

    fn bump(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

impl ShaderRegistry for ShaderLibrary {
    fn find_program(&self, name: &str) -> Option<ProgramId> {
        self.programs.get(name).copied()
    }

    fn find_kernel(&self, name: &str) -> Option<KernelId> {
        self.kernels.get(name).copied()
    }

    fn is_alive(&self, program: ProgramRef) -> bool {
        match program {
            ProgramRef::Program(id) => self.programs.values().any(|p| *p == id),
            ProgramRef::Kernel(id) => self.kernels.values().any(|k| *k == id),
        }
    }
}

// ============================================================================
// Camera Hooks
// ============================================================================

/// Camera-side operations the core invokes during frame callbacks.
pub trait CameraHooks {
    /// Inserts `sequence` at `event` of `camera` for the current frame.
    fn attach(&mut self, camera: CameraId, event: CameraEvent, sequence: Arc<CommandSequence>);

    /// Retracts a previously attached sequence.
    fn detach(&mut self, camera: CameraId, event: CameraEvent, sequence: SequenceId);

    /// Sets a global integer uniform visible to every shader.
    fn set_global_int(&mut self, name: &'static str, value: i32);

    /// Sets a matrix uniform on one program.
    fn set_program_matrix(&mut self, program: ProgramId, name: &'static str, value: Mat4);

    /// Enables or disables a shader keyword (variant switch) on one program.
    fn set_program_keyword(&mut self, program: ProgramId, keyword: &'static str, enabled: bool);
}
