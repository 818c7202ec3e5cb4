//! Render Target Descriptions
//!
//! [`RenderTargetSpec`] describes a GPU render target completely. A spec is
//! immutable once its target exists: a resize goes through
//! [`RenderTargetPool::recreate`](super::pool::RenderTargetPool::recreate),
//! which destroys the old target before creating the new one.

use crate::errors::{Result, SsrError};

/// Number of faces of a cube render target.
pub const CUBE_FACE_COUNT: u32 = 6;

/// Highest anisotropy a sampler accepts.
const MAX_ANISOTROPY: u16 = 16;

/// Sampling filter of a render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TargetFilter {
    /// Nearest texel, nearest mip.
    Point,
    /// Linear within a mip, nearest mip.
    #[default]
    Bilinear,
    /// Linear within and across mips.
    Trilinear,
}

impl TargetFilter {
    /// Minification / magnification filter for sampler creation.
    #[inline]
    #[must_use]
    pub fn texel_filter(self) -> wgpu::FilterMode {
        match self {
            Self::Point => wgpu::FilterMode::Nearest,
            Self::Bilinear | Self::Trilinear => wgpu::FilterMode::Linear,
        }
    }

    /// Returns `true` if sampling blends between mip levels.
    #[inline]
    #[must_use]
    pub fn blends_mips(self) -> bool {
        matches!(self, Self::Trilinear)
    }

    /// Mip filter for sampler creation.
    #[inline]
    #[must_use]
    pub fn mip_filter(self) -> wgpu::MipmapFilterMode {
        if self.blends_mips() {
            wgpu::MipmapFilterMode::Linear
        } else {
            wgpu::MipmapFilterMode::Nearest
        }
    }
}

/// Dimensionality of a render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TargetDimension {
    #[default]
    D2,
    Cube,
}

/// Full description of a render target.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTargetSpec {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    /// The target carries a mip chain.
    pub use_mips: bool,
    /// Number of mip levels (1 when `use_mips` is false).
    pub mip_count: u32,
    pub filter: TargetFilter,
    pub wrap: wgpu::AddressMode,
    pub anisotropy: u16,
    /// Compute shaders may write to the target (storage binding).
    pub random_write: bool,
    pub dimension: TargetDimension,
    /// Array depth; 0 for plain 2D targets.
    pub volume_depth: u32,
}

impl RenderTargetSpec {
    /// A single-mip, bilinear 2D target.
    #[must_use]
    pub fn new(label: &'static str, width: u32, height: u32, format: wgpu::TextureFormat) -> Self {
        Self {
            label,
            width,
            height,
            format,
            use_mips: false,
            mip_count: 1,
            filter: TargetFilter::Bilinear,
            wrap: wgpu::AddressMode::Repeat,
            anisotropy: 0,
            random_write: false,
            dimension: TargetDimension::D2,
            volume_depth: 0,
        }
    }

    /// Enables a mip chain of `mip_count` levels (at least one).
    #[must_use]
    pub fn with_mips(mut self, mip_count: u32) -> Self {
        self.use_mips = true;
        self.mip_count = mip_count.max(1);
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: TargetFilter) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub fn with_wrap(mut self, wrap: wgpu::AddressMode) -> Self {
        self.wrap = wrap;
        self
    }

    #[must_use]
    pub fn with_anisotropy(mut self, anisotropy: u16) -> Self {
        self.anisotropy = anisotropy;
        self
    }

    /// Marks the target as compute-writable.
    ///
    /// Callers pass the capability flag here rather than a literal, so the
    /// flag always agrees with the algorithm chosen from the same capability.
    #[must_use]
    pub fn with_random_write(mut self, random_write: bool) -> Self {
        self.random_write = random_write;
        self
    }

    #[must_use]
    pub fn with_dimension(mut self, dimension: TargetDimension) -> Self {
        self.dimension = dimension;
        self
    }

    /// Number of array layers the GPU texture needs.
    #[inline]
    #[must_use]
    pub fn layer_count(&self) -> u32 {
        match self.dimension {
            TargetDimension::Cube => CUBE_FACE_COUNT,
            TargetDimension::D2 => self.volume_depth.max(1),
        }
    }

    /// Size of `mip` in pixels, clamped to one.
    #[inline]
    #[must_use]
    pub fn mip_size(&self, mip: u32) -> (u32, u32) {
        ((self.width >> mip).max(1), (self.height >> mip).max(1))
    }

    /// Texture usages required on a wgpu device.
    #[must_use]
    pub fn usages(&self) -> wgpu::TextureUsages {
        let mut usage = wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST;
        if self.random_write {
            usage |= wgpu::TextureUsages::STORAGE_BINDING;
        }
        usage
    }

    /// Sampler matching the target's filter, wrap and anisotropy.
    ///
    /// Anisotropy only applies to trilinear targets; every other filter
    /// samples with a clamp of 1.
    #[must_use]
    pub fn sampler_descriptor(&self) -> wgpu::SamplerDescriptor<'static> {
        let anisotropy_clamp = if self.filter == TargetFilter::Trilinear {
            self.anisotropy.clamp(1, MAX_ANISOTROPY)
        } else {
            1
        };
        let texel_filter = self.filter.texel_filter();

        wgpu::SamplerDescriptor {
            label: Some(self.label),
            address_mode_u: self.wrap,
            address_mode_v: self.wrap,
            address_mode_w: self.wrap,
            mag_filter: texel_filter,
            min_filter: texel_filter,
            mipmap_filter: self.filter.mip_filter(),
            anisotropy_clamp,
            ..Default::default()
        }
    }

    /// Rejects descriptions no backend can honour.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(SsrError::InvalidTargetSpec(format!(
                "'{}' has zero size {}x{}",
                self.label, self.width, self.height
            )));
        }
        if self.mip_count == 0 {
            return Err(SsrError::InvalidTargetSpec(format!(
                "'{}' has no mip levels",
                self.label
            )));
        }
        if !self.use_mips && self.mip_count != 1 {
            return Err(SsrError::InvalidTargetSpec(format!(
                "'{}' requests {} mips without a mip chain",
                self.label, self.mip_count
            )));
        }
        let max_mips = 32 - self.width.max(self.height).leading_zeros();
        if self.mip_count > max_mips {
            return Err(SsrError::InvalidTargetSpec(format!(
                "'{}' requests {} mips, {}x{} supports at most {}",
                self.label, self.mip_count, self.width, self.height, max_mips
            )));
        }
        if self.dimension == TargetDimension::Cube && self.width != self.height {
            return Err(SsrError::InvalidTargetSpec(format!(
                "cube target '{}' must be square",
                self.label
            )));
        }
        Ok(())
    }
}
