//! Screen-Space Reflections Orchestrator
//!
//! One [`ScreenSpaceReflections`] instance drives SSR for one camera. It
//! decides the pipeline topology from the camera and platform state, owns
//! every render target the passes need, and records one command sequence per
//! eye and camera event.
//!
//! # Frame Lifecycle
//!
//! ```text
//!   on_frame_begin(eye)                          on_frame_end(eye)
//!   ┌───────────────────────────────────┐        ┌────────────────────────────┐
//!   │ resolve PipelineState             │        │ detach attached sequences  │
//!   │ changed? ──► full rebuild         │ render │ last eye? ssrEnabled = 0   │
//!   │ push textureSpaceProjectionMatrix │ ─────► │                            │
//!   │ ssrEnabled = 1                    │        │                            │
//!   │ attach eye's live sequences       │        │                            │
//!   └───────────────────────────────────┘        └────────────────────────────┘
//! ```
//!
//! # Rebuild
//!
//! A rebuild never patches. It releases every texture, re-allocates for the
//! new [`PipelineState`], resolves programs, applies keywords and re-records
//! every eye's sequences, so no handle from before the rebuild survives.
//!
//! # Failure Handling
//!
//! - Missing programs: the main sequence is not recorded; the camera keeps
//!   rendering without reflections.
//! - Programs unloaded after a rebuild: sequences referencing them are
//!   skipped at attach time.
//! - Render targets released behind the orchestrator's back: sequences
//!   referencing them are skipped and the pipeline rebuilds on the next frame.
//! - Allocation or recording failure: everything is released and SSR is
//!   disabled on this camera until [`ScreenSpaceReflections::enable`] is
//!   called again.

pub mod programs;
pub mod state;

use std::sync::Arc;

use smallvec::SmallVec;

pub use programs::{HiZProgram, SsrKeywords, SsrPrograms};
pub use state::{
    PipelineState, calculate_mip_count, normals_aware_blur_iterations, texture_space_projection,
};

use crate::errors::{Result, SsrError};
use crate::renderer::core::resources::{
    Eye, HistoryManager, HistorySlot, RenderTargetPool, TextureAllocator,
};
use crate::renderer::graph::command::{CommandSequence, SequenceId};
use crate::renderer::graph::node::{FrameContext, FrameHook};
use crate::renderer::graph::passes::{HiZGenerator, OceanCombine, ScreenColorHistory, SsrTracer};
use crate::renderer::host::{CameraEvent, CameraHooks, CameraId};
use crate::settings::SsrSettings;

/// Event the main SSR sequence is attached to.
pub const SSR_EVENT: CameraEvent = CameraEvent::BeforeTransparency;
/// Event the screen-color history copy is attached to.
pub const HISTORY_COPY_EVENT: CameraEvent = CameraEvent::BeforePresent;

/// Recorded sequences of one eye.
#[derive(Debug, Clone, Default)]
pub struct EyeSequences {
    /// Trace, blur and compose. `None` while a required program is missing.
    pub main: Option<Arc<CommandSequence>>,
    /// End-of-frame copy into the screen-color history.
    pub history_copy: Option<Arc<CommandSequence>>,
}

impl EyeSequences {
    pub fn iter(&self) -> impl Iterator<Item = &Arc<CommandSequence>> {
        self.main.iter().chain(self.history_copy.iter())
    }
}

/// Render targets of every pass.
#[derive(Default)]
struct PipelineResources {
    hiz: HiZGenerator,
    screen_color: ScreenColorHistory,
    tracer: SsrTracer,
    ocean: Option<OceanCombine>,
}

impl PipelineResources {
    fn allocate<A: TextureAllocator>(
        pool: &mut RenderTargetPool<A>,
        state: &PipelineState,
    ) -> Result<Self> {
        let mut resources = Self::default();
        if let Err(err) = resources.fill(pool, state) {
            resources.release(pool);
            return Err(err);
        }
        Ok(resources)
    }

    fn fill<A: TextureAllocator>(
        &mut self,
        pool: &mut RenderTargetPool<A>,
        state: &PipelineState,
    ) -> Result<()> {
        self.hiz = HiZGenerator::allocate(pool, state)?;
        self.screen_color = ScreenColorHistory::allocate(pool, state)?;
        self.tracer = SsrTracer::allocate(pool, state)?;
        if state.precombined_ocean {
            self.ocean = Some(OceanCombine::allocate(pool, state)?);
        }
        Ok(())
    }

    fn record_main(
        &self,
        eye: Eye,
        state: &PipelineState,
        programs: &SsrPrograms,
    ) -> Result<CommandSequence> {
        let mut seq = CommandSequence::new("Deferred screenspace reflections", SSR_EVENT, eye);

        if let (Some(ocean), Some(program)) = (&self.ocean, programs.ocean_combine) {
            ocean.record(&mut seq, eye, program)?;
        }
        self.hiz.record(&mut seq, eye, state, programs.hiz)?;
        self.screen_color.record(&mut seq, eye, state, programs)?;

        let hiz = self.hiz.texture(eye).ok_or(SsrError::UnknownTexture)?;
        self.tracer.record(&mut seq, eye, state, programs, hiz)?;

        log::debug!("Recorded '{}' for {eye:?}: {} commands", seq.name(), seq.len());
        Ok(seq)
    }

    fn record_history_copy(&self, eye: Eye) -> Result<CommandSequence> {
        let mut seq = CommandSequence::new("SSR screen color history", HISTORY_COPY_EVENT, eye);
        self.screen_color.record_history_copy(&mut seq, eye)?;
        Ok(seq)
    }

    fn texture_count(&self) -> usize {
        self.hiz.texture_count()
            + self.screen_color.texture_count()
            + self.tracer.texture_count()
            + self.ocean.as_ref().map_or(0, OceanCombine::texture_count)
    }

    fn release<A: TextureAllocator>(&mut self, pool: &mut RenderTargetPool<A>) {
        self.hiz.release(pool);
        self.screen_color.release(pool);
        self.tracer.release(pool);
        if let Some(ocean) = &mut self.ocean {
            ocean.release(pool);
        }
    }
}

/// Screen-space reflections for one camera.
pub struct ScreenSpaceReflections {
    camera: CameraId,
    enabled: bool,
    failed: bool,
    half_resolution_tracing: bool,
    precombined_ocean: bool,
    /// Forces a rebuild on the next frame.
    dirty: bool,

    state: Option<PipelineState>,
    programs: Option<SsrPrograms>,
    resources: Option<PipelineResources>,
    sequences: HistoryManager<EyeSequences>,

    /// Sequences attached since the last `on_frame_end`.
    attached: SmallVec<[(CameraEvent, SequenceId); 2]>,
}

impl ScreenSpaceReflections {
    /// Creates an unbuilt orchestrator. Resources are allocated on the first
    /// frame.
    #[must_use]
    pub fn new(camera: CameraId, settings: &SsrSettings) -> Self {
        Self {
            camera,
            enabled: settings.enabled,
            failed: false,
            half_resolution_tracing: settings.half_resolution_tracing,
            precombined_ocean: false,
            dirty: true,
            state: None,
            programs: None,
            resources: None,
            sequences: HistoryManager::default(),
            attached: SmallVec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn camera(&self) -> CameraId {
        self.camera
    }

    // ── Toggles ────────────────────────────────────────────────────────────

    /// Enables SSR, retrying a pipeline that previously failed to build.
    pub fn enable(&mut self) {
        self.enabled = true;
        if self.failed {
            self.failed = false;
            self.dirty = true;
        }
    }

    /// Disables SSR. Resources stay allocated until released.
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns `true` if SSR is switched off or failed to build.
    #[inline]
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        !self.enabled || self.failed
    }

    /// Returns `true` if the last build failed to acquire a GPU resource.
    #[inline]
    #[must_use]
    pub fn has_failed(&self) -> bool {
        self.failed
    }

    #[inline]
    #[must_use]
    pub fn half_resolution_tracing(&self) -> bool {
        self.half_resolution_tracing
    }

    /// Switches half-resolution tracing; takes effect on the next frame.
    pub fn set_half_resolution_tracing(&mut self, enabled: bool) {
        if self.half_resolution_tracing != enabled {
            self.half_resolution_tracing = enabled;
            self.dirty = true;
        }
    }

    #[inline]
    #[must_use]
    pub fn precombined_ocean(&self) -> bool {
        self.precombined_ocean
    }

    /// Switches the ocean G-buffer combine; takes effect on the next frame.
    pub(crate) fn set_precombined_ocean(&mut self, enabled: bool) {
        if self.precombined_ocean != enabled {
            self.precombined_ocean = enabled;
            self.dirty = true;
        }
    }

    /// Forces a full rebuild on the next frame.
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    // ── Queries ────────────────────────────────────────────────────────────

    /// State of the current build, if any.
    #[must_use]
    pub fn pipeline_state(&self) -> Option<&PipelineState> {
        self.state.as_ref()
    }

    /// Programs resolved by the current build; `None` if one was missing.
    #[must_use]
    pub fn programs(&self) -> Option<&SsrPrograms> {
        self.programs.as_ref()
    }

    /// Number of render targets currently owned.
    #[must_use]
    pub fn texture_count(&self) -> usize {
        self.resources
            .as_ref()
            .map_or(0, PipelineResources::texture_count)
    }

    /// Recorded sequences of `eye`.
    #[must_use]
    pub fn sequences(&self, eye: Eye) -> Option<&EyeSequences> {
        self.sequences.get(HistorySlot::Current, eye, 0)
    }

    /// Number of sequences attached and not yet retracted.
    #[must_use]
    pub fn attached_count(&self) -> usize {
        self.attached.len()
    }

    // ── Lifecycle ──────────────────────────────────────────────────────────

    /// Tears down and rebuilds the whole pipeline for `state`.
    fn rebuild<A: TextureAllocator>(
        &mut self,
        ctx: &mut FrameContext<'_, A>,
        state: PipelineState,
    ) -> Result<()> {
        self.release(ctx.pool);

        let tracing = state.tracing_size();
        log::info!(
            "Building SSR pipeline for camera {:?}: {}x{}, tracing {}x{}, {} Hi-Z levels ({}), \
             {} blur iterations, hdr={}, vr={}, ocean={}",
            self.camera,
            state.width,
            state.height,
            tracing.x,
            tracing.y,
            state.hiz_mip_count(),
            if state.compute_hiz { "compute" } else { "shader" },
            state.blur_iterations(),
            state.hdr,
            state.vr,
            state.precombined_ocean,
        );

        let resources = self
            .resources
            .insert(PipelineResources::allocate(ctx.pool, &state)?);
        self.state = Some(state);
        self.dirty = false;

        self.programs =
            match SsrPrograms::resolve(ctx.shaders, state.compute_hiz, state.precombined_ocean) {
                Ok(programs) => Some(programs),
                Err(err) => {
                    log::warn!(
                        "{err}; reflections are skipped on camera {:?} until the next rebuild",
                        self.camera
                    );
                    None
                }
            };

        if let Some(programs) = &self.programs {
            apply_keywords(ctx.hooks, programs, state.keywords());
        }

        let axes = state.history_axes(false);
        self.sequences = HistoryManager::new(axes);
        for &eye in axes.eyes() {
            let main = match &self.programs {
                Some(programs) => Some(Arc::new(resources.record_main(eye, &state, programs)?)),
                None => None,
            };
            let history_copy = Some(Arc::new(resources.record_history_copy(eye)?));
            self.sequences.set(
                HistorySlot::Current,
                eye,
                0,
                EyeSequences { main, history_copy },
            );
        }
        Ok(())
    }

    /// Releases every render target and recorded sequence. The next frame
    /// rebuilds from scratch.
    pub fn release<A: TextureAllocator>(&mut self, pool: &mut RenderTargetPool<A>) {
        if let Some(mut resources) = self.resources.take() {
            resources.release(pool);
        }
        self.sequences = HistoryManager::default();
        self.programs = None;
        self.state = None;
    }

    /// Detaches every sequence still attached to the camera.
    pub fn retract(&mut self, hooks: &mut dyn CameraHooks) {
        for (event, id) in self.attached.drain(..) {
            hooks.detach(self.camera, event, id);
        }
    }
}

impl FrameHook for ScreenSpaceReflections {
    fn name(&self) -> &str {
        "ScreenSpaceReflections"
    }

    fn on_frame_begin<A: TextureAllocator>(&mut self, ctx: &mut FrameContext<'_, A>) {
        if self.is_disabled() {
            return;
        }

        let next = PipelineState::resolve(
            ctx.caps,
            ctx.settings,
            ctx.frame,
            self.half_resolution_tracing,
            self.precombined_ocean,
        );
        let needs_rebuild = match &self.state {
            None => true,
            Some(current) => {
                self.dirty || current.requires_rebuild(&next, ctx.settings.rebuild_on_resize)
            }
        };

        if needs_rebuild {
            if let Err(err) = self.rebuild(ctx, next) {
                log::error!(
                    "Disabling screen-space reflections on camera {:?}: {err}",
                    self.camera
                );
                self.release(ctx.pool);
                self.failed = true;
                return;
            }
        }

        let Some(state) = self.state else {
            return;
        };

        if let Some(programs) = &self.programs {
            let matrix = texture_space_projection(ctx.frame.projection, state.legacy_depth_range);
            ctx.hooks
                .set_program_matrix(programs.ssr, "textureSpaceProjectionMatrix", matrix);
        }

        let eye = ctx.frame.stereo_eye.history_eye();
        let Some(sequences) = self.sequences.get(HistorySlot::Current, eye, 0) else {
            return;
        };

        for sequence in sequences.iter() {
            let alive = sequence
                .referenced_programs()
                .iter()
                .all(|program| ctx.shaders.is_alive(*program));
            if !alive {
                log::debug!(
                    "Skipping '{}' on camera {:?}: a program is no longer loaded",
                    sequence.name(),
                    self.camera
                );
                continue;
            }

            let stale = sequence
                .referenced_targets()
                .into_iter()
                .any(|handle| !ctx.pool.contains(handle));
            if stale {
                log::warn!(
                    "Skipping '{}' on camera {:?}: a render target was released outside a \
                     rebuild; rebuilding next frame",
                    sequence.name(),
                    self.camera
                );
                self.dirty = true;
                continue;
            }

            if sequence.event() == SSR_EVENT {
                ctx.hooks.set_global_int("ssrEnabled", 1);
            }
            ctx.hooks
                .attach(self.camera, sequence.event(), Arc::clone(sequence));
            self.attached.push((sequence.event(), sequence.id()));
        }
    }

    fn on_frame_end<A: TextureAllocator>(&mut self, ctx: &mut FrameContext<'_, A>) {
        self.retract(ctx.hooks);
        if ctx.frame.stereo_eye.is_last_eye() {
            ctx.hooks.set_global_int("ssrEnabled", 0);
        }
    }
}

/// Enables each keyword on the programs that declare it.
fn apply_keywords(hooks: &mut dyn CameraHooks, programs: &SsrPrograms, keywords: SsrKeywords) {
    for (name, flag) in SsrKeywords::all().iter_names() {
        let enabled = keywords.contains(flag);
        hooks.set_program_keyword(programs.ssr, name, enabled);
        if SsrKeywords::BLUR.contains(flag) {
            hooks.set_program_keyword(programs.blur, name, enabled);
        }
    }
}
