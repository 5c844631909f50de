//! Frame synchronization for framesync
//!
//! This crate provides:
//! - [`FrameSync`]: groups of frames that move together, preserving the rigid
//!   offsets they had when they joined
//! - [`FrameHistory`]: undo/redo of frame edits, with merging of rapid edits
//! - Configuration types for both

pub mod config;
pub mod history;
pub mod sync;

pub use config::*;
pub use history::*;
pub use sync::*;
