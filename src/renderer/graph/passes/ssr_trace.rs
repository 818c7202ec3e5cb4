//! SSR Trace, Blur & Compose Pass
//!
//! Marches reflection rays through the Hi-Z pyramid, widens the result for
//! rough surfaces and composites it onto the camera target.
//!
//! # Sub-passes
//!
//! 1. **Trace**: MRT write of hit color + confidence and hit distance.
//! 2. **Hit-distance blur**: separable downsample-and-blur over the
//!    hit-distance mip chain.
//! 3. **Normals-aware blur**: `ceil(log2(coverage · max(w, h)))` iterations,
//!    each doubling the offset and flip-flopping between the two color
//!    buffers. Under half-resolution tracing the first iteration blurs
//!    vertically only; the horizontal axis was already filtered by tracing at
//!    half width.
//! 4. **Compose**: blends the blurred reflections onto the camera target.

use glam::Vec4;

use super::screen_color::record_mip_chain_blur;

use crate::errors::{Result, SsrError};
use crate::renderer::core::resources::{
    Eye, HistoryManager, HistorySlot, RenderTargetPool, RenderTargetSpec, TextureAllocator,
    TextureHandle,
};
use crate::renderer::graph::command::{CommandSequence, TextureBinding, TextureSource};
use crate::renderer::ssr::programs::{SsrPrograms, blur_pass, ssr_pass};
use crate::renderer::ssr::state::{DEPTH_CHAIN_FORMAT, PipelineState};

/// Reflection color and hit-distance buffers for every eye.
#[derive(Default)]
pub struct SsrTracer {
    color: HistoryManager<TextureHandle>,
    hit_distance: HistoryManager<TextureHandle>,
    hit_distance_mips: u32,
}

impl SsrTracer {
    pub fn allocate<A: TextureAllocator>(
        pool: &mut RenderTargetPool<A>,
        state: &PipelineState,
    ) -> Result<Self> {
        let size = state.tracing_size();
        let axes = state.history_axes(true);

        let color_spec = RenderTargetSpec::new("ssr.color", size.x, size.y, state.color_format())
            .with_wrap(wgpu::AddressMode::ClampToEdge);
        let mut color = pool.create_history(axes, &color_spec)?;

        let hit_distance_mips = state.hit_distance_mip_count();
        let hit_spec =
            RenderTargetSpec::new("ssr.hit_distance", size.x, size.y, DEPTH_CHAIN_FORMAT)
                .with_mips(hit_distance_mips)
                .with_wrap(wgpu::AddressMode::ClampToEdge);
        let hit_distance = match pool.create_history(axes, &hit_spec) {
            Ok(hit_distance) => hit_distance,
            Err(err) => {
                pool.release_history(&mut color);
                return Err(err);
            }
        };

        Ok(Self {
            color,
            hit_distance,
            hit_distance_mips,
        })
    }

    /// Records trace, both blurs and compose for `eye`.
    ///
    /// Expects the Hi-Z pyramid and `ScreenColor` to be recorded earlier in
    /// the same sequence.
    pub fn record(
        &self,
        seq: &mut CommandSequence,
        eye: Eye,
        state: &PipelineState,
        programs: &SsrPrograms,
        hiz: TextureHandle,
    ) -> Result<()> {
        let lookup = |history: &HistoryManager<TextureHandle>, slot| {
            history.at(slot, eye, 0).ok_or(SsrError::UnknownTexture)
        };
        let color = [
            lookup(&self.color, HistorySlot::Current)?,
            lookup(&self.color, HistorySlot::Previous)?,
        ];
        let hit_current = lookup(&self.hit_distance, HistorySlot::Current)?;
        let hit_scratch = lookup(&self.hit_distance, HistorySlot::Previous)?;

        // --- Trace ---
        let camera = state.camera_size().as_vec2();
        seq.set_global_texture("hiZTexture", hiz);
        seq.set_global_int("hiZMipLevelCount", state.screen_mip_count() as i32);
        seq.set_global_vector("BufferSize", Vec4::new(camera.x, camera.y, 0.0, 0.0));

        seq.set_render_targets([
            TextureBinding::base(color[0]),
            TextureBinding::base(hit_current),
        ]);
        seq.draw_fullscreen(programs.ssr, ssr_pass::TRACE);

        seq.set_global_texture("ssrColor", color[0]);
        seq.set_global_texture("ssrHitDistance", hit_current);

        // --- Hit-distance blur ---
        record_mip_chain_blur(
            seq,
            programs,
            hit_current,
            hit_scratch,
            state.tracing_size(),
            self.hit_distance_mips,
        );

        // --- Normals-aware blur ---
        let output = record_normals_aware_blur(seq, programs, state, color);

        // --- Compose ---
        seq.set_global_texture("ssrOutput", output);
        seq.set_render_target(TextureBinding::base(TextureSource::CameraTarget));
        seq.draw_fullscreen(programs.ssr, ssr_pass::COMPOSE);
        Ok(())
    }

    #[must_use]
    pub fn texture_count(&self) -> usize {
        self.color.populated() + self.hit_distance.populated()
    }

    pub fn release<A: TextureAllocator>(&mut self, pool: &mut RenderTargetPool<A>) {
        pool.release_history(&mut self.color);
        pool.release_history(&mut self.hit_distance);
    }
}

/// Records the iterated normals-aware blur over the color pair `[current,
/// previous]` and returns the texture holding the final result.
fn record_normals_aware_blur(
    seq: &mut CommandSequence,
    programs: &SsrPrograms,
    state: &PipelineState,
    color: [TextureHandle; 2],
) -> TextureHandle {
    let slot_texture = |slot: HistorySlot| match slot {
        HistorySlot::Current => color[0],
        HistorySlot::Previous => color[1],
    };

    let mut output = color[0];
    seq.set_global_int("isFirstIteration", 1);

    for iteration in 0..state.blur_iterations() {
        // Iteration 0 reads the trace result in Current and writes Previous.
        let target_slot = HistorySlot::for_iteration(iteration).other();
        let target = slot_texture(target_slot);
        let source = slot_texture(target_slot.other());

        seq.set_global_float("blurOffset", 2_f32.powi(iteration as i32));
        seq.set_global_float("prevBlurOffset", 2_f32.powi(iteration as i32 - 1));

        seq.set_render_target(TextureBinding::base(target));
        seq.set_global_texture("colorBuffer", source);

        let pass = if iteration == 0 && state.half_resolution_tracing {
            blur_pass::NORMALS_AWARE_VERTICAL
        } else {
            blur_pass::NORMALS_AWARE
        };
        seq.draw_fullscreen(programs.blur, pass);

        if iteration == 0 {
            seq.set_global_int("isFirstIteration", 0);
        }
        output = target;
    }

    seq.set_global_texture("ssrColor", output);
    output
}
