//! Platform Capabilities
//!
//! Read-only facts about the GPU and graphics backend that shape the SSR
//! pipeline topology. A [`CapabilityContext`] is built once by the host and
//! handed to the [`RenderPipelineManager`](super::manager::RenderPipelineManager);
//! every orchestrator reads it at rebuild time.

/// Graphics API family the host is rendering with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GraphicsApi {
    Direct3D11,
    Direct3D12,
    #[default]
    Vulkan,
    Metal,
    OpenGl,
    OpenGlEs,
    WebGpu,
    Unknown,
}

impl GraphicsApi {
    /// Returns `true` for backends whose clip-space depth spans `[-1, 1]`.
    ///
    /// Every other backend uses `[0, 1]`.
    #[inline]
    #[must_use]
    pub fn uses_legacy_depth_range(self) -> bool {
        matches!(self, Self::OpenGl | Self::OpenGlEs)
    }

    /// Parses a device version string such as `"OpenGL 4.5 (Core Profile)"`
    /// or `"Direct3D 11.0 [level 11.1]"`.
    #[must_use]
    pub fn from_device_version(version: &str) -> Self {
        if version.contains("OpenGL ES") {
            Self::OpenGlEs
        } else if version.contains("OpenGL") {
            Self::OpenGl
        } else if version.contains("Direct3D 12") {
            Self::Direct3D12
        } else if version.contains("Direct3D") {
            Self::Direct3D11
        } else if version.contains("Vulkan") {
            Self::Vulkan
        } else if version.contains("Metal") {
            Self::Metal
        } else {
            Self::Unknown
        }
    }
}

impl From<wgpu::Backend> for GraphicsApi {
    fn from(backend: wgpu::Backend) -> Self {
        match backend {
            wgpu::Backend::Vulkan => Self::Vulkan,
            wgpu::Backend::Metal => Self::Metal,
            wgpu::Backend::Dx12 => Self::Direct3D12,
            wgpu::Backend::Gl => Self::OpenGl,
            wgpu::Backend::BrowserWebGpu => Self::WebGpu,
            _ => Self::Unknown,
        }
    }
}

/// Hardware capabilities consulted when a pipeline is (re)built.
///
/// Passed explicitly instead of being cached in process-wide statics, so two
/// managers (or two tests) can run with different capabilities side by side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityContext {
    /// Compute shaders are available. This selects the compute Hi-Z path and
    /// the random-write flag of the Hi-Z target.
    pub compute_shaders_supported: bool,
    /// Active graphics backend.
    pub graphics_api: GraphicsApi,
    /// The depth buffer stores reversed Z (near = 1, far = 0).
    pub reversed_z: bool,
}

impl Default for CapabilityContext {
    fn default() -> Self {
        Self::new(true, GraphicsApi::default())
    }
}

impl CapabilityContext {
    /// Creates a context, deriving reversed-Z from the backend: every backend
    /// except the OpenGL family renders reversed.
    #[must_use]
    pub fn new(compute_shaders_supported: bool, graphics_api: GraphicsApi) -> Self {
        Self {
            compute_shaders_supported,
            graphics_api,
            reversed_z: !graphics_api.uses_legacy_depth_range(),
        }
    }

    /// Queries a wgpu adapter for its backend and compute support.
    #[must_use]
    pub fn from_adapter(adapter: &wgpu::Adapter) -> Self {
        let info = adapter.get_info();
        let downlevel = adapter.get_downlevel_capabilities();
        Self::new(
            downlevel
                .flags
                .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS),
            GraphicsApi::from(info.backend),
        )
    }

    /// Overrides the reversed-Z convention.
    #[must_use]
    pub fn with_reversed_z(mut self, reversed_z: bool) -> Self {
        self.reversed_z = reversed_z;
        self
    }

    #[inline]
    #[must_use]
    pub fn uses_legacy_depth_range(&self) -> bool {
        self.graphics_api.uses_legacy_depth_range()
    }
}
