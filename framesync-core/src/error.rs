//! Error types for framesync

use crate::frame::FrameHandle;
use thiserror::Error;

/// Main error type for framesync operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A strict lookup (removal, untracking) named a frame that is not a live member
    #[error("Frame not found: {0}")]
    NotFound(FrameHandle),

    #[error("Stale frame handle: {0}")]
    StaleFrame(FrameHandle),

    #[error("Invalid transform: {0}")]
    InvalidTransform(String),

    /// Raised by user-supplied observers, passed through to whoever triggered the notification
    #[error("Observer error: {0}")]
    Observer(String),
}

/// Result type alias for framesync operations
pub type Result<T> = std::result::Result<T, Error>;
