//! # framesync
//!
//! Keep groups of 3D transform frames moving together.
//!
//! This is the umbrella crate that provides convenient access to all framesync
//! functionality. You can use this crate to get everything in one place, or use
//! the individual crates for more granular control over dependencies.
//!
//! ## Crates
//!
//! - **Core**: rigid transforms, the frame arena and its change notifications
//! - **Sync**: sync groups that propagate rigid motion between frames, and an
//!   undo/redo history of frame edits
//!
//! ## Quick Start
//!
//! ```rust
//! use framesync::prelude::*;
//!
//! let mut frames = FrameArena::new();
//! let a = frames.insert("A", RigidTransform::identity());
//! let b = frames.insert("B", RigidTransform::translation(1.0, 0.0, 0.0));
//!
//! let sync = FrameSync::new();
//! sync.add_frame(&mut frames, a, false);
//! sync.add_frame(&mut frames, b, false);
//!
//! // Move A one unit along X; B keeps its offset
//! frames.transform_by(a, &RigidTransform::translation(1.0, 0.0, 0.0)).unwrap();
//! assert!((frames.transform(b).unwrap().position().x - 2.0).abs() < 1e-12);
//! ```

// Re-export core functionality
pub use framesync_core::*;

pub use framesync_sync as sync;

/// Convenient imports for common use cases
pub mod prelude {
    pub use framesync_core::*;
    pub use framesync_sync::*;
}
