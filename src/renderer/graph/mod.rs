//! Command Recording
//!
//! Provides:
//! - CommandSequence: recorded GPU command list per camera event and eye
//! - FrameHook / FrameContext: per-camera frame callbacks
//! - passes: the SSR passes that record into sequences

pub mod command;
pub mod node;
pub mod passes;

pub use command::{
    CommandSequence, GpuCommand, SequenceId, ShaderValue, TextureBinding, TextureSource,
};
pub use node::{FrameContext, FrameHook};
