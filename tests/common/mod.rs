//! Shared test doubles: a counting texture allocator, a recording camera-hook
//! sink and a shader library with every SSR program loaded.

#![allow(dead_code)]

use std::sync::Arc;

use glam::Mat4;
use rustc_hash::FxHashSet;

use deferred_ssr::renderer::graph::command::{CommandSequence, SequenceId};
use deferred_ssr::renderer::host::{CameraEvent, CameraHooks, CameraId, ProgramId, ShaderLibrary};
use deferred_ssr::renderer::ssr::programs::{
    BLUR_PROGRAM, HIZ_KERNEL, HIZ_PROGRAM, OCEAN_COMBINE_PROGRAM, REPROJECT_PROGRAM, SSR_PROGRAM,
};
use deferred_ssr::{
    CapabilityContext, GraphicsApi, RenderPipelineManager, RenderTargetSpec, SsrError,
    SsrSettings, TextureAllocator, TextureHandle,
};

// ============================================================================
// Counting Allocator
// ============================================================================

/// Allocator that only tracks which handles are live.
#[derive(Default)]
pub struct CountingAllocator {
    pub live: FxHashSet<TextureHandle>,
    pub specs: Vec<RenderTargetSpec>,
    /// Remaining successful allocations; `None` never fails.
    pub budget: Option<usize>,
}

impl CountingAllocator {
    pub fn failing_after(allocations: usize) -> Self {
        Self {
            budget: Some(allocations),
            ..Self::default()
        }
    }
}

impl TextureAllocator for CountingAllocator {
    fn allocate(
        &mut self,
        handle: TextureHandle,
        spec: &RenderTargetSpec,
    ) -> deferred_ssr::Result<()> {
        if let Some(budget) = &mut self.budget {
            if *budget == 0 {
                return Err(SsrError::TextureAllocation {
                    label: spec.label,
                    reason: "out of video memory".into(),
                });
            }
            *budget -= 1;
        }
        assert!(self.live.insert(handle), "handle allocated twice");
        self.specs.push(spec.clone());
        Ok(())
    }

    fn release(&mut self, handle: TextureHandle) {
        assert!(self.live.remove(&handle), "handle released twice");
    }
}

// ============================================================================
// Recording Hooks
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum HookCall {
    Attach(CameraId, CameraEvent, SequenceId),
    Detach(CameraId, CameraEvent, SequenceId),
    GlobalInt(&'static str, i32),
    ProgramMatrix(ProgramId, &'static str, Mat4),
    Keyword(ProgramId, &'static str, bool),
}

/// Records every hook call and keeps the currently attached sequences.
#[derive(Default)]
pub struct RecordingHooks {
    pub calls: Vec<HookCall>,
    pub attached: Vec<(CameraId, CameraEvent, Arc<CommandSequence>)>,
}

impl RecordingHooks {
    pub fn clear(&mut self) {
        self.calls.clear();
    }

    pub fn attached_at(&self, event: CameraEvent) -> Vec<Arc<CommandSequence>> {
        self.attached
            .iter()
            .filter(|(_, e, _)| *e == event)
            .map(|(_, _, seq)| Arc::clone(seq))
            .collect()
    }

    pub fn last_global(&self, name: &str) -> Option<i32> {
        self.calls.iter().rev().find_map(|call| match call {
            HookCall::GlobalInt(n, value) if *n == name => Some(*value),
            _ => None,
        })
    }

    pub fn keyword(&self, program: ProgramId, keyword: &str) -> Option<bool> {
        self.calls.iter().rev().find_map(|call| match call {
            HookCall::Keyword(p, k, enabled) if *p == program && *k == keyword => Some(*enabled),
            _ => None,
        })
    }

    pub fn attach_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, HookCall::Attach(..)))
            .count()
    }
}

impl CameraHooks for RecordingHooks {
    fn attach(&mut self, camera: CameraId, event: CameraEvent, sequence: Arc<CommandSequence>) {
        self.calls.push(HookCall::Attach(camera, event, sequence.id()));
        self.attached.push((camera, event, sequence));
    }

    fn detach(&mut self, camera: CameraId, event: CameraEvent, sequence: SequenceId) {
        self.calls.push(HookCall::Detach(camera, event, sequence));
        self.attached
            .retain(|(c, e, s)| !(*c == camera && *e == event && s.id() == sequence));
    }

    fn set_global_int(&mut self, name: &'static str, value: i32) {
        self.calls.push(HookCall::GlobalInt(name, value));
    }

    fn set_program_matrix(&mut self, program: ProgramId, name: &'static str, value: Mat4) {
        self.calls.push(HookCall::ProgramMatrix(program, name, value));
    }

    fn set_program_keyword(&mut self, program: ProgramId, keyword: &'static str, enabled: bool) {
        self.calls.push(HookCall::Keyword(program, keyword, enabled));
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Library with every SSR program and kernel loaded.
pub fn shader_library() -> ShaderLibrary {
    let mut library = ShaderLibrary::new();
    library.add_program(SSR_PROGRAM);
    library.add_program(BLUR_PROGRAM);
    library.add_program(REPROJECT_PROGRAM);
    library.add_program(HIZ_PROGRAM);
    library.add_program(OCEAN_COMBINE_PROGRAM);
    library.add_kernel(HIZ_KERNEL);
    library
}

pub fn compute_caps() -> CapabilityContext {
    CapabilityContext::new(true, GraphicsApi::Direct3D11)
}

pub fn manager(caps: CapabilityContext) -> RenderPipelineManager<CountingAllocator> {
    RenderPipelineManager::new(caps, SsrSettings::default(), CountingAllocator::default())
}

/// Runs begin and end for one eye.
pub fn render_eye(
    manager: &mut RenderPipelineManager<CountingAllocator>,
    camera: CameraId,
    frame: &deferred_ssr::CameraFrame,
    shaders: &ShaderLibrary,
    hooks: &mut RecordingHooks,
) {
    manager.on_frame_begin(camera, frame, shaders, hooks);
    manager.on_frame_end(camera, frame, shaders, hooks);
}
