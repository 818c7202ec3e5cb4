//! Error Types
//!
//! This module defines the error types used throughout the crate.
//!
//! # Overview
//!
//! The main error type [`SsrError`] covers the failure modes of the SSR
//! control plane:
//! - GPU render-target allocation failures
//! - Invalid render-target descriptions
//! - Missing shader programs
//! - Camera registry misuse
//! - Settings loading errors
//!
//! Most of these never reach the host. A missing program only drops the pass
//! that needs it, and a failed allocation disables SSR on that one camera. See
//! [`ScreenSpaceReflections`](crate::renderer::ssr::ScreenSpaceReflections).
//!
//! # Usage
//!
//! ```rust,ignore
//! use deferred_ssr::errors::{SsrError, Result};
//!
//! fn load() -> Result<()> {
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::renderer::host::CameraId;

/// The main error type for the SSR subsystem.
#[derive(Error, Debug)]
pub enum SsrError {
    // ========================================================================
    // GPU Resource Errors
    // ========================================================================
    /// The allocator could not create a render target.
    #[error("Failed to allocate render target '{label}': {reason}")]
    TextureAllocation {
        /// Debug label of the requested target
        label: &'static str,
        /// Backend-specific reason
        reason: String,
    },

    /// A render-target description was rejected before reaching the allocator.
    #[error("Invalid render target spec: {0}")]
    InvalidTargetSpec(String),

    /// A texture handle does not refer to a live render target.
    #[error("Unknown render target handle")]
    UnknownTexture,

    /// A shader program or compute kernel could not be found by name.
    #[error("Shader program not found: {0}")]
    MissingProgram(String),

    // ========================================================================
    // Camera Registry Errors
    // ========================================================================
    /// The camera already carries an SSR orchestrator.
    #[error("Camera {0:?} already has screen-space reflections attached")]
    CameraAlreadyBound(CameraId),

    /// The camera has no SSR orchestrator.
    #[error("Camera {0:?} has no screen-space reflections attached")]
    UnknownCamera(CameraId),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("Settings parse error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Alias for `Result<T, SsrError>`.
pub type Result<T> = std::result::Result<T, SsrError>;
