//! Ocean G-Buffer Combine Pass
//!
//! While an external water renderer is registered on a camera, its per-pixel
//! normals and smoothness are fused with the G-buffer before tracing. The
//! combined buffers are published as globals the SSR program samples when
//! `PRECOMBINED_OCEAN_GBUFFER` is enabled.

use crate::errors::{Result, SsrError};
use crate::renderer::core::resources::{
    Eye, HistoryManager, HistorySlot, RenderTargetPool, RenderTargetSpec, TextureAllocator,
    TextureHandle,
};
use crate::renderer::graph::command::{CommandSequence, TextureBinding};
use crate::renderer::host::ProgramId;
use crate::renderer::ssr::state::PipelineState;

const NORMALS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgb10a2Unorm;
const SMOOTHNESS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;

/// Combined ocean normals and smoothness for every eye.
#[derive(Default)]
pub struct OceanCombine {
    normals: HistoryManager<TextureHandle>,
    smoothness: HistoryManager<TextureHandle>,
}

impl OceanCombine {
    pub fn allocate<A: TextureAllocator>(
        pool: &mut RenderTargetPool<A>,
        state: &PipelineState,
    ) -> Result<Self> {
        let axes = state.history_axes(false);

        let normals_spec =
            RenderTargetSpec::new("ssr.ocean.normals", state.width, state.height, NORMALS_FORMAT);
        let mut normals = pool.create_history(axes, &normals_spec)?;

        let smoothness_spec = RenderTargetSpec::new(
            "ssr.ocean.smoothness",
            state.width,
            state.height,
            SMOOTHNESS_FORMAT,
        );
        let smoothness = match pool.create_history(axes, &smoothness_spec) {
            Ok(smoothness) => smoothness,
            Err(err) => {
                pool.release_history(&mut normals);
                return Err(err);
            }
        };

        Ok(Self {
            normals,
            smoothness,
        })
    }

    pub fn record(&self, seq: &mut CommandSequence, eye: Eye, program: ProgramId) -> Result<()> {
        let normals = self
            .normals
            .at(HistorySlot::Current, eye, 0)
            .ok_or(SsrError::UnknownTexture)?;
        let smoothness = self
            .smoothness
            .at(HistorySlot::Current, eye, 0)
            .ok_or(SsrError::UnknownTexture)?;

        seq.set_render_targets([TextureBinding::base(normals), TextureBinding::base(smoothness)]);
        seq.draw_fullscreen(program, 0);
        seq.set_global_texture("combinedOceanGBufferNormals", normals);
        seq.set_global_texture("combinedOceanGBufferSmoothness", smoothness);
        Ok(())
    }

    #[must_use]
    pub fn texture_count(&self) -> usize {
        self.normals.populated() + self.smoothness.populated()
    }

    pub fn release<A: TextureAllocator>(&mut self, pool: &mut RenderTargetPool<A>) {
        pool.release_history(&mut self.normals);
        pool.release_history(&mut self.smoothness);
    }
}
