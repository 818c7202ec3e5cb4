//! Screen-Color History & Reprojection Pass
//!
//! Keeps last frame's final image per eye and turns it into this frame's
//! blurred screen-color mip chain, which the tracer samples for content the
//! depth buffer does not know about (transparents, forward-shaded objects).
//!
//! # Data Flow
//!
//! ```text
//!  BeforePresent (frame N-1)         BeforeTransparency (frame N)
//!  ┌─────────────────────────┐       ┌──────────────────────────────────────┐
//!  │ CameraTarget ──blit──►  │       │ Previous ─┐                          │
//!  │        Previous mip 0   │ ───►  │           ├─ reproject ──► Current 0 │
//!  └─────────────────────────┘       │ Camera ───┘                          │
//!                                    │ for k in 1..mips:                    │
//!                                    │   Current k-1 ──H──► scratch k       │
//!                                    │   scratch k   ──V──► Current k       │
//!                                    └──────────────────────────────────────┘
//! ```

use glam::UVec2;

use super::size_vector;

use crate::errors::{Result, SsrError};
use crate::renderer::core::resources::{
    Eye, HistoryManager, HistorySlot, RenderTargetPool, RenderTargetSpec, TargetFilter,
    TextureAllocator, TextureHandle,
};
use crate::renderer::graph::command::{CommandSequence, TextureBinding, TextureSource};
use crate::renderer::ssr::programs::{SsrPrograms, blur_pass};
use crate::renderer::ssr::state::PipelineState;

/// Screen-color history pair and blur scratch for every eye.
#[derive(Default)]
pub struct ScreenColorHistory {
    history: HistoryManager<TextureHandle>,
    scratch: HistoryManager<TextureHandle>,
    mip_count: u32,
}

impl ScreenColorHistory {
    pub fn allocate<A: TextureAllocator>(
        pool: &mut RenderTargetPool<A>,
        state: &PipelineState,
    ) -> Result<Self> {
        let mip_count = state.screen_mip_count();
        let spec = RenderTargetSpec::new(
            "ssr.screen_color",
            state.width,
            state.height,
            state.color_format(),
        )
        .with_mips(mip_count)
        .with_filter(TargetFilter::Trilinear)
        .with_wrap(wgpu::AddressMode::ClampToEdge)
        .with_anisotropy(state.screen_color_anisotropy);

        let mut history = pool.create_history(state.history_axes(true), &spec)?;

        let scratch_spec = RenderTargetSpec {
            label: "ssr.screen_color.scratch",
            ..spec
        };
        let scratch = match pool.create_history(state.history_axes(false), &scratch_spec) {
            Ok(scratch) => scratch,
            Err(err) => {
                pool.release_history(&mut history);
                return Err(err);
            }
        };

        Ok(Self {
            history,
            scratch,
            mip_count,
        })
    }

    #[must_use]
    pub fn texture(&self, slot: HistorySlot, eye: Eye) -> Option<TextureHandle> {
        self.history.at(slot, eye, 0)
    }

    #[must_use]
    pub fn mip_count(&self) -> u32 {
        self.mip_count
    }

    /// Records reprojection and the mip-chain blur, then publishes the result
    /// as `ScreenColor`.
    pub fn record(
        &self,
        seq: &mut CommandSequence,
        eye: Eye,
        state: &PipelineState,
        programs: &SsrPrograms,
    ) -> Result<()> {
        let current = self
            .texture(HistorySlot::Current, eye)
            .ok_or(SsrError::UnknownTexture)?;
        let previous = self
            .texture(HistorySlot::Previous, eye)
            .ok_or(SsrError::UnknownTexture)?;
        let scratch = self
            .scratch
            .at(HistorySlot::Current, eye, 0)
            .ok_or(SsrError::UnknownTexture)?;

        seq.set_global_texture("lastFrameColor", previous);
        seq.set_global_texture("currentFrameColor", TextureSource::CameraTarget);
        seq.set_render_target(TextureBinding::base(current));
        seq.draw_fullscreen(programs.reproject, 0);

        record_mip_chain_blur(
            seq,
            programs,
            current,
            scratch,
            state.camera_size(),
            self.mip_count,
        );

        seq.set_global_texture("ScreenColor", current);
        Ok(())
    }

    /// Records the end-of-frame copy of the camera output into the Previous
    /// slot, read back by the next frame's reprojection.
    pub fn record_history_copy(&self, seq: &mut CommandSequence, eye: Eye) -> Result<()> {
        let previous = self
            .texture(HistorySlot::Previous, eye)
            .ok_or(SsrError::UnknownTexture)?;
        seq.blit(TextureSource::CameraTarget, TextureBinding::base(previous));
        Ok(())
    }

    #[must_use]
    pub fn texture_count(&self) -> usize {
        self.history.populated() + self.scratch.populated()
    }

    pub fn release<A: TextureAllocator>(&mut self, pool: &mut RenderTargetPool<A>) {
        pool.release_history(&mut self.history);
        pool.release_history(&mut self.scratch);
    }
}

/// Separable downsample-and-blur over mips `1..mip_count` of `chain`.
///
/// Each level blurs horizontally from `chain` mip k-1 into `scratch` mip k,
/// then vertically from `scratch` back into `chain` mip k.
pub(crate) fn record_mip_chain_blur(
    seq: &mut CommandSequence,
    programs: &SsrPrograms,
    chain: TextureHandle,
    scratch: TextureHandle,
    base_size: UVec2,
    mip_count: u32,
) {
    let mut size = base_size;
    seq.set_global_int("mipLevelToRead", 0);

    for mip in 1..mip_count {
        size = (size / 2).max(UVec2::ONE);
        seq.set_global_int("currentMipLevel", mip as i32);
        seq.set_global_vector("currentMipLevelDimensions", size_vector(size));

        seq.set_render_target(TextureBinding::new(scratch, mip));
        seq.set_global_texture("colorBuffer", chain);
        seq.draw_fullscreen(programs.blur, blur_pass::HORIZONTAL_DOWNSAMPLE);

        seq.set_global_int("mipLevelToRead", mip as i32);

        seq.set_render_target(TextureBinding::new(chain, mip));
        seq.set_global_texture("colorBuffer", scratch);
        seq.draw_fullscreen(programs.blur, blur_pass::VERTICAL);
    }
}
