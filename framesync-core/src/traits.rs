//! Core traits for framesync

use crate::{error::Result, frame::{FrameArena, FrameHandle}};

/// Receives synchronous change notifications from frames in a [`FrameArena`].
///
/// The arena hands itself back mutably, so an observer may move other frames
/// (which notifies their observers in turn), subscribe, unsubscribe or destroy
/// frames from inside the callback. An error aborts the remaining
/// notifications for that change and is returned to whoever mutated the frame.
pub trait FrameObserver {
    /// Called after `frame`'s transform has been replaced
    fn frame_modified(&self, frames: &mut FrameArena, frame: FrameHandle) -> Result<()>;
}

impl<F> FrameObserver for F
where
    F: Fn(&mut FrameArena, FrameHandle) -> Result<()>,
{
    fn frame_modified(&self, frames: &mut FrameArena, frame: FrameHandle) -> Result<()> {
        self(frames, frame)
    }
}
