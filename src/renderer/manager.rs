//! Render Pipeline Manager
//!
//! Top-level owner of the SSR subsystem. Holds the platform capabilities, the
//! settings, the shared render-target pool and the camera registry, and
//! forwards the host's per-camera frame callbacks to the right orchestrator.
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut manager = RenderPipelineManager::new(caps, settings, allocator);
//! manager.attach_camera(camera)?;
//!
//! // Per camera, per eye, every frame:
//! manager.on_frame_begin(camera, &frame, &shaders, &mut hooks);
//! // ... host renders, replaying the attached sequences ...
//! manager.on_frame_end(camera, &frame, &shaders, &mut hooks);
//!
//! manager.detach_camera(camera, &mut hooks)?;
//! ```

use rustc_hash::FxHashMap;

use crate::errors::{Result, SsrError};
use crate::renderer::capabilities::CapabilityContext;
use crate::renderer::core::resources::{RenderTargetPool, TextureAllocator};
use crate::renderer::graph::node::{FrameContext, FrameHook};
use crate::renderer::host::{CameraFrame, CameraHooks, CameraId, ShaderRegistry};
use crate::renderer::ssr::ScreenSpaceReflections;
use crate::settings::SsrSettings;

/// Result of an external compositing registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExternalCompositing {
    /// The source is now the camera's single external writer.
    pub accepted: bool,
    /// The camera traces at half resolution, so the source should size its
    /// buffers accordingly.
    pub half_resolution_in_use: bool,
}

/// Owns capabilities, settings, render targets and per-camera orchestrators.
pub struct RenderPipelineManager<A: TextureAllocator> {
    caps: CapabilityContext,
    settings: SsrSettings,
    pool: RenderTargetPool<A>,
    cameras: FxHashMap<CameraId, ScreenSpaceReflections>,
}

impl<A: TextureAllocator> RenderPipelineManager<A> {
    #[must_use]
    pub fn new(caps: CapabilityContext, settings: SsrSettings, allocator: A) -> Self {
        Self {
            caps,
            settings: settings.sanitized(),
            pool: RenderTargetPool::new(allocator),
            cameras: FxHashMap::default(),
        }
    }

    // ── Camera registry ────────────────────────────────────────────────────

    /// Creates the SSR orchestrator for `camera`.
    ///
    /// A camera carries at most one orchestrator.
    pub fn attach_camera(&mut self, camera: CameraId) -> Result<&mut ScreenSpaceReflections> {
        if self.cameras.contains_key(&camera) {
            return Err(SsrError::CameraAlreadyBound(camera));
        }
        log::debug!("Attaching screen-space reflections to camera {camera:?}");
        Ok(self
            .cameras
            .entry(camera)
            .or_insert_with(|| ScreenSpaceReflections::new(camera, &self.settings)))
    }

    /// Destroys the orchestrator of `camera`, retracting its sequences and
    /// releasing every render target it owns.
    pub fn detach_camera(&mut self, camera: CameraId, hooks: &mut dyn CameraHooks) -> Result<()> {
        let mut ssr = self
            .cameras
            .remove(&camera)
            .ok_or(SsrError::UnknownCamera(camera))?;
        ssr.retract(hooks);
        ssr.release(&mut self.pool);
        log::debug!("Detached screen-space reflections from camera {camera:?}");
        Ok(())
    }

    #[must_use]
    pub fn camera(&self, camera: CameraId) -> Option<&ScreenSpaceReflections> {
        self.cameras.get(&camera)
    }

    pub fn camera_mut(&mut self, camera: CameraId) -> Option<&mut ScreenSpaceReflections> {
        self.cameras.get_mut(&camera)
    }

    pub fn cameras(&self) -> impl Iterator<Item = (&CameraId, &ScreenSpaceReflections)> {
        self.cameras.iter()
    }

    // ── Frame callbacks ────────────────────────────────────────────────────

    /// Pre-render callback for one eye of `camera`. Cameras without SSR are
    /// ignored.
    pub fn on_frame_begin(
        &mut self,
        camera: CameraId,
        frame: &CameraFrame,
        shaders: &dyn ShaderRegistry,
        hooks: &mut dyn CameraHooks,
    ) {
        let Some(ssr) = self.cameras.get_mut(&camera) else {
            return;
        };
        let mut ctx = FrameContext {
            frame,
            caps: &self.caps,
            settings: &self.settings,
            pool: &mut self.pool,
            shaders,
            hooks,
        };
        ssr.on_frame_begin(&mut ctx);
    }

    /// Post-render callback for one eye of `camera`.
    pub fn on_frame_end(
        &mut self,
        camera: CameraId,
        frame: &CameraFrame,
        shaders: &dyn ShaderRegistry,
        hooks: &mut dyn CameraHooks,
    ) {
        let Some(ssr) = self.cameras.get_mut(&camera) else {
            return;
        };
        let mut ctx = FrameContext {
            frame,
            caps: &self.caps,
            settings: &self.settings,
            pool: &mut self.pool,
            shaders,
            hooks,
        };
        ssr.on_frame_end(&mut ctx);
    }

    // ── External compositing ───────────────────────────────────────────────

    /// Registers an external water renderer as the compositing source of
    /// `camera`.
    ///
    /// Rejected when the camera has no SSR or another source is already
    /// registered. On success the camera rebuilds with the ocean combine pass
    /// on its next frame.
    pub fn register_external_compositing_source(
        &mut self,
        camera: CameraId,
    ) -> ExternalCompositing {
        let Some(ssr) = self.cameras.get_mut(&camera) else {
            log::warn!("External compositing source rejected: camera {camera:?} has no SSR");
            return ExternalCompositing::default();
        };

        let half_resolution_in_use = ssr.half_resolution_tracing();
        if ssr.precombined_ocean() {
            log::warn!(
                "External compositing source rejected: camera {camera:?} already has one registered"
            );
            return ExternalCompositing {
                accepted: false,
                half_resolution_in_use,
            };
        }

        ssr.set_precombined_ocean(true);
        ExternalCompositing {
            accepted: true,
            half_resolution_in_use,
        }
    }

    /// Removes the external compositing source of `camera`.
    ///
    /// Returns `false` if none was registered.
    pub fn unregister_external_compositing_source(&mut self, camera: CameraId) -> bool {
        match self.cameras.get_mut(&camera) {
            Some(ssr) if ssr.precombined_ocean() => {
                ssr.set_precombined_ocean(false);
                true
            }
            _ => false,
        }
    }

    // ── Accessors ──────────────────────────────────────────────────────────

    #[must_use]
    pub fn capabilities(&self) -> &CapabilityContext {
        &self.caps
    }

    #[must_use]
    pub fn settings(&self) -> &SsrSettings {
        &self.settings
    }

    /// Replaces the settings. Cameras pick them up on their next rebuild.
    pub fn set_settings(&mut self, settings: SsrSettings) {
        self.settings = settings.sanitized();
    }

    #[must_use]
    pub fn pool(&self) -> &RenderTargetPool<A> {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut RenderTargetPool<A> {
        &mut self.pool
    }
}

impl<A: TextureAllocator> Drop for RenderPipelineManager<A> {
    fn drop(&mut self) {
        for ssr in self.cameras.values_mut() {
            ssr.release(&mut self.pool);
        }
        self.cameras.clear();
    }
}
