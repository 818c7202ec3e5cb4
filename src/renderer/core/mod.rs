//! Core GPU resource management
//!
//! Provides:
//! - resources: render-target specs, the render-target pool, history
//!   managers and the wgpu-backed allocator

pub mod resources;
