//! GPU Command Sequences
//!
//! A [`CommandSequence`] is the recorded, ordered list of GPU operations one
//! eye of one camera submits at one [`CameraEvent`]. Sequences are recorded
//! once per pipeline build and replayed unmodified by the host every frame
//! until the next rebuild replaces them.
//!
//! Commands reference render targets by [`TextureHandle`] and programs by the
//! ids the [`ShaderRegistry`](crate::renderer::host::ShaderRegistry) handed
//! out, so the recording is backend-neutral; the host translates each command
//! into its own API.

use std::sync::atomic::{AtomicU64, Ordering};

use glam::Vec4;
use smallvec::SmallVec;

use crate::renderer::core::resources::{Eye, TextureHandle};
use crate::renderer::host::{CameraEvent, KernelId, ProgramId, ProgramRef};

/// Globally unique sequence id source.
static NEXT_SEQUENCE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a recorded sequence, used to retract it from a camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SequenceId(u64);

impl SequenceId {
    fn next() -> Self {
        Self(NEXT_SEQUENCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// A texture a command reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSource {
    /// A render target owned by the pool.
    Target(TextureHandle),
    /// The camera's current color output.
    CameraTarget,
    /// The camera's resolved (non-MSAA) depth buffer.
    ResolvedDepth,
}

impl From<TextureHandle> for TextureSource {
    fn from(handle: TextureHandle) -> Self {
        Self::Target(handle)
    }
}

/// A texture together with the mip level a command binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureBinding {
    pub source: TextureSource,
    pub mip: u32,
}

impl TextureBinding {
    #[inline]
    #[must_use]
    pub fn new(source: impl Into<TextureSource>, mip: u32) -> Self {
        Self {
            source: source.into(),
            mip,
        }
    }

    /// Mip 0 of `source`.
    #[inline]
    #[must_use]
    pub fn base(source: impl Into<TextureSource>) -> Self {
        Self::new(source, 0)
    }
}

/// A shader uniform value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShaderValue {
    Int(i32),
    Float(f32),
    Vector(Vec4),
}

/// One recorded GPU operation.
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCommand {
    /// Bind one or more color attachments (multiple render targets).
    SetRenderTargets {
        colors: SmallVec<[TextureBinding; 2]>,
    },
    /// Set a global uniform visible to every subsequent draw.
    SetGlobal {
        name: &'static str,
        value: ShaderValue,
    },
    /// Bind a texture globally under `name`.
    SetGlobalTexture {
        name: &'static str,
        texture: TextureSource,
    },
    /// Set a uniform on a compute kernel.
    SetComputeParam {
        kernel: KernelId,
        name: &'static str,
        value: ShaderValue,
    },
    /// Bind one mip of a texture to a compute kernel entry point.
    SetComputeTexture {
        kernel: KernelId,
        entry: u32,
        name: &'static str,
        texture: TextureBinding,
    },
    /// Dispatch a compute kernel entry point.
    DispatchCompute {
        kernel: KernelId,
        entry: u32,
        groups: [u32; 3],
    },
    /// Draw a full-screen triangle with one pass of a program.
    DrawFullscreen { program: ProgramId, pass: u32 },
    /// Copy `source` into `destination`, resampling if sizes differ.
    Blit {
        source: TextureSource,
        destination: TextureBinding,
    },
    /// Copy one mip level between two same-sized textures.
    CopyMip {
        source: TextureBinding,
        destination: TextureBinding,
    },
}

/// An ordered list of GPU commands for one camera event and one eye.
#[derive(Debug, Clone)]
pub struct CommandSequence {
    id: SequenceId,
    name: &'static str,
    event: CameraEvent,
    eye: Eye,
    commands: Vec<GpuCommand>,
}

impl CommandSequence {
    #[must_use]
    pub fn new(name: &'static str, event: CameraEvent, eye: Eye) -> Self {
        Self {
            id: SequenceId::next(),
            name,
            event,
            eye,
            commands: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> SequenceId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    #[must_use]
    pub fn event(&self) -> CameraEvent {
        self.event
    }

    #[inline]
    #[must_use]
    pub fn eye(&self) -> Eye {
        self.eye
    }

    #[inline]
    #[must_use]
    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Every program and kernel the sequence invokes, deduplicated.
    #[must_use]
    pub fn referenced_programs(&self) -> SmallVec<[ProgramRef; 8]> {
        let mut programs: SmallVec<[ProgramRef; 8]> = SmallVec::new();
        for command in &self.commands {
            let program = match *command {
                GpuCommand::DrawFullscreen { program, .. } => ProgramRef::Program(program),
                GpuCommand::DispatchCompute { kernel, .. }
                | GpuCommand::SetComputeParam { kernel, .. }
                | GpuCommand::SetComputeTexture { kernel, .. } => ProgramRef::Kernel(kernel),
                _ => continue,
            };
            if !programs.contains(&program) {
                programs.push(program);
            }
        }
        programs
    }

    /// Every pool target the sequence touches, deduplicated.
    #[must_use]
    pub fn referenced_targets(&self) -> Vec<TextureHandle> {
        let mut handles = Vec::new();
        let mut push = |source: TextureSource| {
            if let TextureSource::Target(handle) = source {
                if !handles.contains(&handle) {
                    handles.push(handle);
                }
            }
        };
        for command in &self.commands {
            match command {
                GpuCommand::SetRenderTargets { colors } => {
                    colors.iter().for_each(|c| push(c.source));
                }
                GpuCommand::SetGlobalTexture { texture, .. } => push(*texture),
                GpuCommand::SetComputeTexture { texture, .. } => push(texture.source),
                GpuCommand::Blit {
                    source,
                    destination,
                } => {
                    push(*source);
                    push(destination.source);
                }
                GpuCommand::CopyMip {
                    source,
                    destination,
                } => {
                    push(source.source);
                    push(destination.source);
                }
                _ => {}
            }
        }
        handles
    }

    // ── Recording ──────────────────────────────────────────────────────────

    pub fn push(&mut self, command: GpuCommand) {
        self.commands.push(command);
    }

    pub fn set_render_target(&mut self, target: TextureBinding) {
        self.push(GpuCommand::SetRenderTargets {
            colors: smallvec::smallvec![target],
        });
    }

    pub fn set_render_targets(&mut self, targets: impl IntoIterator<Item = TextureBinding>) {
        self.push(GpuCommand::SetRenderTargets {
            colors: targets.into_iter().collect(),
        });
    }

    pub fn set_global_int(&mut self, name: &'static str, value: i32) {
        self.push(GpuCommand::SetGlobal {
            name,
            value: ShaderValue::Int(value),
        });
    }

    pub fn set_global_float(&mut self, name: &'static str, value: f32) {
        self.push(GpuCommand::SetGlobal {
            name,
            value: ShaderValue::Float(value),
        });
    }

    pub fn set_global_vector(&mut self, name: &'static str, value: Vec4) {
        self.push(GpuCommand::SetGlobal {
            name,
            value: ShaderValue::Vector(value),
        });
    }

    pub fn set_global_texture(&mut self, name: &'static str, texture: impl Into<TextureSource>) {
        self.push(GpuCommand::SetGlobalTexture {
            name,
            texture: texture.into(),
        });
    }

    pub fn set_compute_int(&mut self, kernel: KernelId, name: &'static str, value: i32) {
        self.push(GpuCommand::SetComputeParam {
            kernel,
            name,
            value: ShaderValue::Int(value),
        });
    }

    pub fn set_compute_vector(&mut self, kernel: KernelId, name: &'static str, value: Vec4) {
        self.push(GpuCommand::SetComputeParam {
            kernel,
            name,
            value: ShaderValue::Vector(value),
        });
    }

    pub fn set_compute_texture(
        &mut self,
        kernel: KernelId,
        entry: u32,
        name: &'static str,
        texture: TextureBinding,
    ) {
        self.push(GpuCommand::SetComputeTexture {
            kernel,
            entry,
            name,
            texture,
        });
    }

    pub fn dispatch(&mut self, kernel: KernelId, entry: u32, groups: [u32; 3]) {
        self.push(GpuCommand::DispatchCompute {
            kernel,
            entry,
            groups,
        });
    }

    pub fn draw_fullscreen(&mut self, program: ProgramId, pass: u32) {
        self.push(GpuCommand::DrawFullscreen { program, pass });
    }

    pub fn blit(&mut self, source: impl Into<TextureSource>, destination: TextureBinding) {
        self.push(GpuCommand::Blit {
            source: source.into(),
            destination,
        });
    }

    pub fn copy_mip(&mut self, source: TextureBinding, destination: TextureBinding) {
        self.push(GpuCommand::CopyMip {
            source,
            destination,
        });
    }
}
