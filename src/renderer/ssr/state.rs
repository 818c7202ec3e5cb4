//! Pipeline State
//!
//! [`PipelineState`] is the snapshot of every value that shapes a camera's
//! SSR pipeline: resource sizes, formats, shader keywords and the layout of
//! the recorded command sequences. It is resolved once per rebuild and never
//! patched in place; any change that matters produces a new state and a full
//! teardown.

use glam::{Mat4, UVec2, Vec4};

use super::programs::SsrKeywords;
use crate::renderer::capabilities::CapabilityContext;
use crate::renderer::core::resources::HistoryAxes;
use crate::renderer::host::CameraFrame;
use crate::settings::SsrSettings;

/// Color format of the screen-color history and the traced reflections.
const HDR_COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
const LDR_COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Format of the Hi-Z pyramid and the hit-distance chain.
pub const DEPTH_CHAIN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;

/// Everything a rebuild derives the pipeline topology from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineState {
    pub width: u32,
    pub height: u32,
    pub half_resolution_tracing: bool,
    pub vr: bool,
    pub hdr: bool,
    pub compute_hiz: bool,
    pub legacy_depth_range: bool,
    pub reversed_z: bool,
    pub precombined_ocean: bool,

    // --- Sizing parameters captured from settings ---
    pub hiz_target_size: u32,
    pub hit_distance_mip_count: u32,
    pub max_blur_screen_coverage: f32,
    pub screen_color_anisotropy: u16,
}

impl PipelineState {
    /// Resolves the state for `frame` under the given capabilities and
    /// settings.
    #[must_use]
    pub fn resolve(
        caps: &CapabilityContext,
        settings: &SsrSettings,
        frame: &CameraFrame,
        half_resolution_tracing: bool,
        precombined_ocean: bool,
    ) -> Self {
        let size = frame.render_dimensions().max(UVec2::ONE);
        Self {
            width: size.x,
            height: size.y,
            half_resolution_tracing,
            vr: frame.vr_enabled(),
            hdr: frame.hdr,
            compute_hiz: caps.compute_shaders_supported,
            legacy_depth_range: caps.uses_legacy_depth_range(),
            reversed_z: caps.reversed_z,
            precombined_ocean,
            hiz_target_size: settings.hiz_target_size.max(1),
            hit_distance_mip_count: settings.hit_distance_mip_count.max(1),
            max_blur_screen_coverage: settings.max_blur_screen_coverage,
            screen_color_anisotropy: settings.screen_color_anisotropy,
        }
    }

    #[inline]
    #[must_use]
    pub fn camera_size(&self) -> UVec2 {
        UVec2::new(self.width, self.height)
    }

    /// Size of the trace and blur buffers. Half-resolution tracing halves the
    /// width only.
    #[must_use]
    pub fn tracing_size(&self) -> UVec2 {
        if self.half_resolution_tracing {
            UVec2::new((self.width / 2).max(1), self.height)
        } else {
            self.camera_size()
        }
    }

    /// Base size of the Hi-Z pyramid: half the camera in both axes.
    #[must_use]
    pub fn hiz_size(&self) -> UVec2 {
        UVec2::new((self.width / 2).max(1), (self.height / 2).max(1))
    }

    /// Mip count of the screen-color history.
    #[must_use]
    pub fn screen_mip_count(&self) -> u32 {
        calculate_mip_count(self.width, self.height, self.hiz_target_size).max(1)
    }

    /// Levels of the Hi-Z pyramid. The camera depth buffer stands in for the
    /// first level, so the pyramid has one level less than the screen color.
    #[must_use]
    pub fn hiz_mip_count(&self) -> u32 {
        calculate_mip_count(self.width, self.height, self.hiz_target_size)
            .saturating_sub(1)
            .max(1)
    }

    /// Mip count of the hit-distance chain, limited to what the tracing size
    /// can hold.
    #[must_use]
    pub fn hit_distance_mip_count(&self) -> u32 {
        let size = self.tracing_size();
        let max_mips = 32 - size.x.max(size.y).leading_zeros();
        self.hit_distance_mip_count.min(max_mips)
    }

    #[must_use]
    pub fn blur_iterations(&self) -> u32 {
        normals_aware_blur_iterations(self.width, self.height, self.max_blur_screen_coverage)
    }

    #[must_use]
    pub fn color_format(&self) -> wgpu::TextureFormat {
        if self.hdr {
            HDR_COLOR_FORMAT
        } else {
            LDR_COLOR_FORMAT
        }
    }

    /// Shader keywords enabled on the SSR programs.
    #[must_use]
    pub fn keywords(&self) -> SsrKeywords {
        let mut keywords = SsrKeywords::empty();
        keywords.set(
            SsrKeywords::HALF_RESOLUTION_TRACING,
            self.half_resolution_tracing,
        );
        keywords.set(
            SsrKeywords::PRECOMBINED_OCEAN_GBUFFER,
            self.precombined_ocean,
        );
        keywords
    }

    /// History axes for a per-eye resource, with or without a flip-flop pair.
    #[must_use]
    pub fn history_axes(&self, flip_flop: bool) -> HistoryAxes {
        HistoryAxes::new(flip_flop, self.vr, false)
    }

    /// Returns `true` if going from `self` to `next` requires a rebuild.
    ///
    /// HDR, VR and ocean-mode changes always do; a size change only when
    /// `rebuild_on_resize` is set.
    #[must_use]
    pub fn requires_rebuild(&self, next: &Self, rebuild_on_resize: bool) -> bool {
        self.hdr != next.hdr
            || self.vr != next.vr
            || self.precombined_ocean != next.precombined_ocean
            || (rebuild_on_resize && self.camera_size() != next.camera_size())
    }
}

/// Number of times `width × height` halves before its larger edge reaches
/// `target_size`.
///
/// This is the smallest `m` with `target_size · 2^m ≥ max(width, height)`,
/// i.e. `ceil(log2(max / target_size))`, clamped so that mip `m` of the
/// larger edge is still at least one pixel.
#[must_use]
pub fn calculate_mip_count(width: u32, height: u32, target_size: u32) -> u32 {
    let max_edge = u64::from(width.max(height).max(1));
    let target = u64::from(target_size.max(1));

    let mut mips = 0_u32;
    while target << mips < max_edge {
        mips += 1;
    }

    let max_level = 63 - max_edge.leading_zeros();
    mips.min(max_level)
}

/// Iterations of the normals-aware blur: `ceil(log2(coverage · max(w, h)))`,
/// never negative.
///
/// Each iteration doubles the blur offset, so the radius reaches
/// `coverage · max(w, h)` pixels on the last one.
#[must_use]
pub fn normals_aware_blur_iterations(width: u32, height: u32, coverage: f32) -> u32 {
    let pixels = coverage * width.max(height) as f32;
    if pixels.is_nan() || pixels <= 1.0 {
        return 0;
    }
    pixels.log2().ceil() as u32
}

/// Maps clip space into `[0, 1]` texture space, including depth.
///
/// Backends with a `[-1, 1]` clip depth range remap z as well; the others
/// pass it through.
#[must_use]
pub fn texture_space_projection(projection: Mat4, legacy_depth_range: bool) -> Mat4 {
    let depth_row = if legacy_depth_range {
        Vec4::new(0.0, 0.0, 0.5, 0.5)
    } else {
        Vec4::new(0.0, 0.0, 1.0, 0.0)
    };

    let to_texture = Mat4::from_cols(
        Vec4::new(0.5, 0.0, 0.0, 0.5),
        Vec4::new(0.0, 0.5, 0.0, 0.5),
        depth_row,
        Vec4::W,
    )
    .transpose();

    to_texture * projection
}
