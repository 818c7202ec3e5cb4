//! Hierarchical-Z Pyramid Pass
//!
//! Builds a conservative depth pyramid from the camera's resolved depth
//! buffer. Mip 0 of the pyramid sits at half the camera size; the camera
//! depth buffer itself stands in for the full-resolution level.
//!
//! # Data Flow
//!
//! ```text
//! Compute path (one texture per eye):
//!
//!   ResolvedDepth ──► mip 0 ──► mip 1 ──► … ──► mip N-1      (same texture,
//!                      ▲  read k-1, write k  ▲                 one dispatch
//!                      └─────────────────────┘                 per level)
//!
//! Shader path (flip-flop pair per eye):
//!
//!   level:     0         1         2         3
//!   writes:  Current  Previous  Current  Previous
//!   reads:    depth   Current   Previous Current
//!                       │                  │
//!                       └─ copy-back ──────┴──► Current (canonical)
//! ```
//!
//! The shader path cannot sample mip k-1 while rendering into mip k of the
//! same texture, so levels alternate between the two textures and every level
//! written into the Previous texture is copied back. Downstream passes always
//! sample the Current texture.

use glam::UVec2;

use super::size_vector;

use crate::errors::{Result, SsrError};
use crate::renderer::core::resources::{
    Eye, HistoryManager, HistorySlot, RenderTargetPool, RenderTargetSpec, TargetFilter,
    TextureAllocator, TextureHandle,
};
use crate::renderer::graph::command::{CommandSequence, TextureBinding, TextureSource};
use crate::renderer::ssr::programs::HiZProgram;
use crate::renderer::ssr::state::{DEPTH_CHAIN_FORMAT, PipelineState};

/// Compute threads per workgroup along each axis.
const HIZ_GROUP_SIZE: u32 = 8;

/// Hi-Z pyramid textures and the recording logic for one camera.
#[derive(Default)]
pub struct HiZGenerator {
    textures: HistoryManager<TextureHandle>,
    levels: u32,
}

impl HiZGenerator {
    /// Allocates the pyramid for every eye of `state`.
    ///
    /// The compute path uses one random-write texture per eye, the shader
    /// path a flip-flop pair.
    pub fn allocate<A: TextureAllocator>(
        pool: &mut RenderTargetPool<A>,
        state: &PipelineState,
    ) -> Result<Self> {
        let size = state.hiz_size();
        let levels = state.hiz_mip_count();
        let spec = RenderTargetSpec::new("ssr.hiz", size.x, size.y, DEPTH_CHAIN_FORMAT)
            .with_mips(levels)
            .with_filter(TargetFilter::Point)
            .with_wrap(wgpu::AddressMode::ClampToEdge)
            .with_random_write(state.compute_hiz);

        let textures = pool.create_history(state.history_axes(!state.compute_hiz), &spec)?;
        Ok(Self { textures, levels })
    }

    /// Canonical pyramid texture of `eye`.
    #[must_use]
    pub fn texture(&self, eye: Eye) -> Option<TextureHandle> {
        self.textures.at(HistorySlot::Current, eye, 0)
    }

    /// Records the pyramid build for `eye` into `seq`.
    pub fn record(
        &self,
        seq: &mut CommandSequence,
        eye: Eye,
        state: &PipelineState,
        program: HiZProgram,
    ) -> Result<()> {
        match program {
            HiZProgram::Compute(kernel) => {
                let target = self.texture(eye).ok_or(SsrError::UnknownTexture)?;

                seq.set_compute_int(kernel, "usingReverseZ", i32::from(state.reversed_z));
                seq.set_compute_int(kernel, "firstIteration", 1);
                seq.set_compute_texture(
                    kernel,
                    0,
                    "DepthTexture",
                    TextureBinding::base(TextureSource::ResolvedDepth),
                );

                for (level, previous, current) in level_dimensions(state.camera_size(), self.levels)
                {
                    seq.set_compute_texture(
                        kernel,
                        0,
                        "WriteRT",
                        TextureBinding::new(target, level),
                    );
                    seq.set_compute_texture(
                        kernel,
                        0,
                        "ReadRT",
                        TextureBinding::new(target, level.saturating_sub(1)),
                    );
                    seq.set_compute_vector(
                        kernel,
                        "hiZPreviousMipLevelDimensions",
                        size_vector(previous),
                    );
                    seq.set_compute_vector(
                        kernel,
                        "hiZCurrentMipLevelDimensions",
                        size_vector(current),
                    );
                    seq.dispatch(
                        kernel,
                        0,
                        [
                            current.x.div_ceil(HIZ_GROUP_SIZE),
                            current.y.div_ceil(HIZ_GROUP_SIZE),
                            1,
                        ],
                    );

                    if level == 0 {
                        seq.set_compute_int(kernel, "firstIteration", 0);
                    }
                }
            }
            HiZProgram::Shader(program) => {
                let canonical = self.texture(eye).ok_or(SsrError::UnknownTexture)?;
                let scratch = self
                    .textures
                    .at(HistorySlot::Previous, eye, 0)
                    .ok_or(SsrError::UnknownTexture)?;

                for (level, previous, current) in level_dimensions(state.camera_size(), self.levels)
                {
                    let slot = HistorySlot::for_iteration(level);
                    let (write, read) = match slot {
                        HistorySlot::Current => (canonical, scratch),
                        HistorySlot::Previous => (scratch, canonical),
                    };
                    let source = if level == 0 {
                        TextureSource::ResolvedDepth
                    } else {
                        TextureSource::Target(read)
                    };

                    seq.set_render_target(TextureBinding::new(write, level));
                    seq.set_global_texture("PreviousHiZTexture", source);
                    seq.set_global_vector("hiZPreviousMipLevelDimensions", size_vector(previous));
                    seq.set_global_vector("hiZCurrentMipLevelDimensions", size_vector(current));
                    seq.set_global_int("hiZPreviousMipLevel", level.saturating_sub(1) as i32);
                    seq.set_global_int("hiZCurrentMipLevel", level as i32);
                    seq.set_global_int(
                        "previousTextureIsFullResDepthBuffer",
                        i32::from(level == 0),
                    );
                    seq.draw_fullscreen(program, 0);

                    if slot == HistorySlot::Previous {
                        seq.copy_mip(
                            TextureBinding::new(scratch, level),
                            TextureBinding::new(canonical, level),
                        );
                    }
                }
            }
        }
        Ok(())
    }

    /// Number of render targets owned.
    #[must_use]
    pub fn texture_count(&self) -> usize {
        self.textures.populated()
    }

    /// Releases every pyramid texture.
    pub fn release<A: TextureAllocator>(&mut self, pool: &mut RenderTargetPool<A>) {
        pool.release_history(&mut self.textures);
    }
}

/// `(level, previous dimensions, current dimensions)` for each pyramid
/// level. Level 0 halves the camera size.
fn level_dimensions(camera: UVec2, levels: u32) -> impl Iterator<Item = (u32, UVec2, UVec2)> {
    let mut current = camera;
    (0..levels).map(move |level| {
        let previous = current;
        current = (current / 2).max(UVec2::ONE);
        (level, previous, current)
    })
}
