//! Core data structures and traits for framesync
//!
//! This crate provides the collaborators a frame synchronization group works
//! against: rigid transforms, an arena of named frames with synchronous change
//! notification, and the observer trait used to listen for changes.

pub mod transform;
pub mod frame;
pub mod traits;
pub mod error;

pub use transform::*;
pub use frame::*;
pub use traits::*;
pub use error::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Point3, Vector3, Matrix4, Isometry3, UnitQuaternion};
