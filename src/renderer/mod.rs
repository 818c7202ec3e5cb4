//! SSR renderer
//!
//! Provides:
//! - capabilities: platform facts that shape the pipeline
//! - host: interfaces to the host engine (cameras, shaders, event hooks)
//! - core: render-target pool and history managers
//! - graph: command sequences, frame hooks and the SSR passes
//! - ssr: the per-camera orchestrator
//! - manager: camera registry and frame callback dispatch

pub mod capabilities;
pub mod core;
pub mod graph;
pub mod host;
pub mod manager;
pub mod ssr;
