//! wgpu Texture Allocator
//!
//! [`TextureAllocator`] backed by a real `wgpu::Device`. The host resolves
//! the [`TextureHandle`]s found in recorded command sequences through
//! [`WgpuTextureAllocator::texture`], the per-mip views and the sampler
//! built from each target's filter, wrap and anisotropy.

use rustc_hash::FxHashMap;

use super::pool::{TextureAllocator, TextureHandle};
use super::texture::{RenderTargetSpec, TargetDimension};
use crate::errors::{Result, SsrError};

/// A GPU texture with its pre-built views and sampler.
pub struct WgpuRenderTarget {
    pub texture: wgpu::Texture,
    /// Default (all mips, all layers) view.
    pub default_view: wgpu::TextureView,
    /// Single-mip views, one per level.
    pub mip_views: Vec<wgpu::TextureView>,
    /// Sampler honouring the spec's filter, wrap and anisotropy.
    pub sampler: wgpu::Sampler,
}

impl WgpuRenderTarget {
    fn new(device: &wgpu::Device, spec: &RenderTargetSpec) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(spec.label),
            size: wgpu::Extent3d {
                width: spec.width,
                height: spec.height,
                depth_or_array_layers: spec.layer_count(),
            },
            mip_level_count: spec.mip_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: spec.format,
            usage: spec.usages(),
            view_formats: &[],
        });

        let view_dimension = match spec.dimension {
            TargetDimension::Cube => wgpu::TextureViewDimension::Cube,
            TargetDimension::D2 if spec.layer_count() > 1 => wgpu::TextureViewDimension::D2Array,
            TargetDimension::D2 => wgpu::TextureViewDimension::D2,
        };

        let default_view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(spec.label),
            dimension: Some(view_dimension),
            ..Default::default()
        });

        // Render and storage attachments bind one mip at a time
        let mip_views = (0..spec.mip_count)
            .map(|mip| {
                texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some(spec.label),
                    dimension: Some(view_dimension),
                    base_mip_level: mip,
                    mip_level_count: Some(1),
                    ..Default::default()
                })
            })
            .collect();

        let sampler = device.create_sampler(&spec.sampler_descriptor());

        Self {
            texture,
            default_view,
            mip_views,
            sampler,
        }
    }
}

/// Creates render targets on a wgpu device.
pub struct WgpuTextureAllocator {
    device: wgpu::Device,
    targets: FxHashMap<TextureHandle, WgpuRenderTarget>,
}

impl WgpuTextureAllocator {
    #[must_use]
    pub fn new(device: wgpu::Device) -> Self {
        Self {
            device,
            targets: FxHashMap::default(),
        }
    }

    /// GPU texture for a live handle.
    #[must_use]
    pub fn texture(&self, handle: TextureHandle) -> Option<&wgpu::Texture> {
        self.targets.get(&handle).map(|t| &t.texture)
    }

    /// Full-chain view for a live handle.
    #[must_use]
    pub fn view(&self, handle: TextureHandle) -> Option<&wgpu::TextureView> {
        self.targets.get(&handle).map(|t| &t.default_view)
    }

    /// Single-mip view for a live handle.
    #[must_use]
    pub fn mip_view(&self, handle: TextureHandle, mip: u32) -> Option<&wgpu::TextureView> {
        self.targets
            .get(&handle)
            .and_then(|t| t.mip_views.get(mip as usize))
    }

    /// Sampler of a live handle.
    #[must_use]
    pub fn sampler(&self, handle: TextureHandle) -> Option<&wgpu::Sampler> {
        self.targets.get(&handle).map(|t| &t.sampler)
    }

    #[must_use]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }
}

impl TextureAllocator for WgpuTextureAllocator {
    fn allocate(&mut self, handle: TextureHandle, spec: &RenderTargetSpec) -> Result<()> {
        let limits = self.device.limits();
        let max_edge = limits.max_texture_dimension_2d;
        if spec.width > max_edge || spec.height > max_edge {
            return Err(SsrError::TextureAllocation {
                label: spec.label,
                reason: format!(
                    "{}x{} exceeds the device limit of {max_edge}",
                    spec.width, spec.height
                ),
            });
        }
        if spec.layer_count() > limits.max_texture_array_layers {
            return Err(SsrError::TextureAllocation {
                label: spec.label,
                reason: format!(
                    "{} layers exceed the device limit of {}",
                    spec.layer_count(),
                    limits.max_texture_array_layers
                ),
            });
        }
        if spec.random_write
            && !self
                .device
                .features()
                .contains(wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES)
            && !matches!(
                spec.format,
                wgpu::TextureFormat::R32Float
                    | wgpu::TextureFormat::Rgba16Float
                    | wgpu::TextureFormat::Rgba32Float
                    | wgpu::TextureFormat::Rgba8Unorm
            )
        {
            return Err(SsrError::TextureAllocation {
                label: spec.label,
                reason: format!("{:?} is not a portable storage format", spec.format),
            });
        }

        let target = WgpuRenderTarget::new(&self.device, spec);
        self.targets.insert(handle, target);
        Ok(())
    }

    fn release(&mut self, handle: TextureHandle) {
        if let Some(target) = self.targets.remove(&handle) {
            target.texture.destroy();
        }
    }
}
