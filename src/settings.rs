//! SSR Settings
//!
//! Pure configuration data for the screen-space reflection pipeline.
//!
//! Settings are read when a camera's pipeline is (re)built. Changing a value
//! on a running camera has no effect until the next rebuild, which can be
//! forced with [`ScreenSpaceReflections::invalidate`].
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use deferred_ssr::SsrSettings;
//!
//! // Defaults: half-resolution tracing, 5% screen blur coverage
//! let settings = SsrSettings::default();
//!
//! // Full-resolution tracing with a wider blur
//! let settings = SsrSettings {
//!     half_resolution_tracing: false,
//!     max_blur_screen_coverage: 0.1,
//!     ..Default::default()
//! };
//!
//! // From a JSON file (missing fields fall back to defaults)
//! let settings = SsrSettings::load("ssr.json")?;
//! ```
//!
//! [`ScreenSpaceReflections::invalidate`]: crate::renderer::ssr::ScreenSpaceReflections::invalidate

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Global configuration for screen-space reflections.
///
/// | Field                      | Description                                   | Default |
/// |----------------------------|-----------------------------------------------|---------|
/// | `enabled`                  | New cameras start with SSR enabled            | `true`  |
/// | `half_resolution_tracing`  | Trace at half horizontal resolution           | `true`  |
/// | `hiz_target_size`          | Smallest Hi-Z / screen-color mip edge (px)    | `8`     |
/// | `hit_distance_mip_count`   | Mip levels of the hit-distance blur chain     | `4`     |
/// | `max_blur_screen_coverage` | Normals-aware blur radius, fraction of screen | `0.05`  |
/// | `screen_color_anisotropy`  | Anisotropy of the screen-color history        | `16`    |
/// | `rebuild_on_resize`        | Rebuild when the camera size changes          | `false` |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsrSettings {
    /// Whether SSR starts enabled on newly attached cameras.
    pub enabled: bool,

    /// Trace reflections at half horizontal resolution.
    ///
    /// Only the width of the tracing buffers is halved. The first
    /// normals-aware blur iteration then runs vertically only, because the
    /// horizontal downsample already filtered that axis.
    pub half_resolution_tracing: bool,

    /// Target edge length, in pixels, of the coarsest Hi-Z and screen-color mip.
    pub hiz_target_size: u32,

    /// Number of mip levels in the hit-distance blur chain.
    pub hit_distance_mip_count: u32,

    /// Largest normals-aware blur radius as a fraction of the larger screen
    /// dimension.
    pub max_blur_screen_coverage: f32,

    /// Anisotropic filtering level of the screen-color history targets.
    pub screen_color_anisotropy: u16,

    /// Rebuild the pipeline whenever the camera render size changes.
    ///
    /// Off by default: only HDR and VR transitions trigger a rebuild, and a
    /// resized camera keeps its targets until [`invalidate`] is called.
    ///
    /// [`invalidate`]: crate::renderer::ssr::ScreenSpaceReflections::invalidate
    pub rebuild_on_resize: bool,
}

impl Default for SsrSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            half_resolution_tracing: true,
            hiz_target_size: 8,
            hit_distance_mip_count: 4,
            max_blur_screen_coverage: 0.05,
            screen_color_anisotropy: 16,
            rebuild_on_resize: false,
        }
    }
}

impl SsrSettings {
    /// Parses settings from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        Ok(settings.sanitized())
    }

    /// Loads settings from a JSON file on disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Serializes settings to pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Clamps values into their usable ranges.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        self.hiz_target_size = self.hiz_target_size.max(1);
        self.hit_distance_mip_count = self.hit_distance_mip_count.max(1);
        self.max_blur_screen_coverage = self.max_blur_screen_coverage.clamp(0.0, 1.0);
        self.screen_color_anisotropy = self.screen_color_anisotropy.clamp(1, 16);
        self
    }
}
