//! Undo/redo history for frame edits
//!
//! [`FrameHistory`] watches a set of frames and turns every change into an
//! undoable [`FrameEditCommand`] holding the transforms before and after the
//! edit. Rapid edits of the same kind to the same frame (dragging a widget,
//! spinning a property box) collapse into a single step.

use crate::config::HistoryConfig;
use framesync_core::{Error, FrameArena, FrameHandle, FrameObserver, Pose, Result, RigidTransform, SubscriptionId};
use log::{debug, trace};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

/// Description recorded for changes made directly to a frame
pub const TRANSFORM_DESCRIPTION: &str = "Transform frame";
/// Description recorded by [`FrameHistory::set_position`]
pub const POSITION_DESCRIPTION: &str = "Update Position";
/// Description recorded by [`FrameHistory::set_rpy_degrees`]
pub const RPY_DESCRIPTION: &str = "Update RPY (deg)";

/// A single undoable frame edit
#[derive(Debug, Clone, PartialEq)]
pub struct FrameEditCommand {
    pub frame: FrameHandle,
    pub before: RigidTransform,
    pub after: RigidTransform,
    pub description: String,
    pub timestamp: Instant,
}

impl FrameEditCommand {
    pub fn new(frame: FrameHandle, before: RigidTransform, after: RigidTransform, description: impl Into<String>) -> Self {
        Self {
            frame,
            before,
            after,
            description: description.into(),
            timestamp: Instant::now(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: Instant) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Fold a later edit into this one. Only edits of the same frame with the
    /// same description arriving within `window` merge; the merged command
    /// keeps this command's `before` and takes the other's `after`.
    pub fn merge_with(&mut self, other: &FrameEditCommand, window: Duration) -> bool {
        if other.frame != self.frame || other.description != self.description {
            return false;
        }
        if other.timestamp.saturating_duration_since(self.timestamp) > window {
            return false;
        }
        self.after = other.after;
        self.timestamp = other.timestamp;
        true
    }
}

/// Linear undo stack. Commands below `index` are done, the rest are redoable.
#[derive(Debug, Clone, Default)]
pub struct UndoStack {
    commands: Vec<FrameEditCommand>,
    index: usize,
    merge_window: Option<Duration>,
    max_commands: usize,
}

impl UndoStack {
    pub fn new(config: &HistoryConfig) -> Self {
        Self {
            commands: Vec::new(),
            index: 0,
            merge_window: config.merge_window(),
            max_commands: config.max_commands,
        }
    }

    /// Push a done command, discarding anything redoable
    pub fn push(&mut self, command: FrameEditCommand) {
        self.commands.truncate(self.index);

        if let (Some(window), Some(top)) = (self.merge_window, self.commands.last_mut()) {
            if top.merge_with(&command, window) {
                return;
            }
        }

        self.commands.push(command);
        if self.max_commands > 0 && self.commands.len() > self.max_commands {
            let excess = self.commands.len() - self.max_commands;
            self.commands.drain(..excess);
        }
        self.index = self.commands.len();
    }

    /// Step back, returning the command to revert
    pub fn undo_command(&mut self) -> Option<&FrameEditCommand> {
        if self.index == 0 {
            return None;
        }
        self.index -= 1;
        self.commands.get(self.index)
    }

    /// Step forward, returning the command to reapply
    pub fn redo_command(&mut self) -> Option<&FrameEditCommand> {
        let command = self.commands.get(self.index)?;
        self.index += 1;
        Some(command)
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index < self.commands.len()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.index
            .checked_sub(1)
            .and_then(|i| self.commands.get(i))
            .map(|c| c.description.as_str())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.commands.get(self.index).map(|c| c.description.as_str())
    }

    pub fn commands(&self) -> &[FrameEditCommand] {
        &self.commands
    }

    /// Number of done commands
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
        self.index = 0;
    }

    /// Drop commands whose frame has been destroyed
    pub fn discard_stale(&mut self, frames: &FrameArena) {
        let done = self.index;
        let mut index = done;
        let before = self.commands.len();
        let mut position = 0;
        self.commands.retain(|c| {
            let live = frames.contains(c.frame);
            if !live && position < done {
                index -= 1;
            }
            position += 1;
            live
        });
        if self.commands.len() != before {
            debug!("discarded {} edit(s) of destroyed frames", before - self.commands.len());
        }
        self.index = index;
    }
}

struct Tracked {
    subscription: SubscriptionId,
    last: RigidTransform,
}

struct HistoryState {
    stack: RefCell<UndoStack>,
    tracked: RefCell<BTreeMap<FrameHandle, Tracked>>,
    suspend_depth: Cell<usize>,
}

/// Records edits of tracked frames on an undo stack.
///
/// Cloning yields another handle to the same history.
#[derive(Clone)]
pub struct FrameHistory {
    state: Rc<HistoryState>,
}

impl FrameHistory {
    pub fn new() -> Self {
        Self::with_config(HistoryConfig::default())
    }

    pub fn with_config(config: HistoryConfig) -> Self {
        Self {
            state: Rc::new(HistoryState {
                stack: RefCell::new(UndoStack::new(&config)),
                tracked: RefCell::new(BTreeMap::new()),
                suspend_depth: Cell::new(0),
            }),
        }
    }

    /// Start recording edits of `frame`. Returns `false` if the handle is
    /// stale or the frame is already tracked.
    pub fn track(&self, frames: &mut FrameArena, frame: FrameHandle) -> bool {
        let Ok(last) = frames.transform(frame) else {
            return false;
        };

        let mut tracked = self.state.tracked.borrow_mut();
        tracked.retain(|handle, _| frames.contains(*handle));
        if tracked.contains_key(&frame) {
            return false;
        }

        let observer: Rc<dyn FrameObserver> = Rc::new(HistoryObserver {
            state: Rc::downgrade(&self.state),
        });
        let Ok(subscription) = frames.subscribe(frame, observer) else {
            return false;
        };
        tracked.insert(frame, Tracked { subscription, last });
        debug!("recording edits of {}", frame);
        true
    }

    /// Stop recording edits of `frame`; [`Error::NotFound`] if it is not tracked
    pub fn untrack(&self, frames: &mut FrameArena, frame: FrameHandle) -> Result<()> {
        let mut tracked = self.state.tracked.borrow_mut();
        tracked.retain(|handle, _| frames.contains(*handle));
        let entry = tracked.remove(&frame).ok_or(Error::NotFound(frame))?;
        frames.unsubscribe(frame, entry.subscription);
        Ok(())
    }

    pub fn is_tracked(&self, frames: &FrameArena, frame: FrameHandle) -> bool {
        frames.contains(frame) && self.state.tracked.borrow().contains_key(&frame)
    }

    /// Apply `transform` to a tracked frame and record it under `description`
    pub fn apply_edit(
        &self,
        frames: &mut FrameArena,
        frame: FrameHandle,
        transform: &RigidTransform,
        description: &str,
    ) -> Result<()> {
        let before = match self.state.tracked.borrow().get(&frame) {
            Some(entry) if frames.contains(frame) => entry.last,
            _ => return Err(Error::NotFound(frame)),
        };

        {
            let _suspended = Suspension::engage(&self.state.suspend_depth);
            frames.copy_transform_in(frame, transform)?;
        }

        let after = frames.transform(frame)?;
        self.state.record(FrameEditCommand::new(frame, before, after, description));
        Ok(())
    }

    /// Move a tracked frame to `position`, keeping its orientation
    pub fn set_position(&self, frames: &mut FrameArena, frame: FrameHandle, position: [f64; 3]) -> Result<()> {
        let pose = frames.transform(frame)?.to_pose();
        let edited = Pose { position, ..pose };
        self.apply_edit(frames, frame, &edited.to_transform(), POSITION_DESCRIPTION)
    }

    /// Rotate a tracked frame to `rpy_degrees`, keeping its position
    pub fn set_rpy_degrees(&self, frames: &mut FrameArena, frame: FrameHandle, rpy_degrees: [f64; 3]) -> Result<()> {
        let pose = frames.transform(frame)?.to_pose();
        let edited = Pose { rpy_degrees, ..pose };
        self.apply_edit(frames, frame, &edited.to_transform(), RPY_DESCRIPTION)
    }

    /// Revert the most recent edit. Returns `false` if there was nothing to undo.
    pub fn undo(&self, frames: &mut FrameArena) -> Result<bool> {
        let command = {
            let mut stack = self.state.stack.borrow_mut();
            stack.discard_stale(frames);
            match stack.undo_command() {
                Some(command) => command.clone(),
                None => return Ok(false),
            }
        };
        trace!("undo '{}' on {}", command.description, command.frame);
        self.replay(frames, command.frame, &command.before)?;
        Ok(true)
    }

    /// Reapply the most recently undone edit. Returns `false` if there was nothing to redo.
    pub fn redo(&self, frames: &mut FrameArena) -> Result<bool> {
        let command = {
            let mut stack = self.state.stack.borrow_mut();
            stack.discard_stale(frames);
            match stack.redo_command() {
                Some(command) => command.clone(),
                None => return Ok(false),
            }
        };
        trace!("redo '{}' on {}", command.description, command.frame);
        self.replay(frames, command.frame, &command.after)?;
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        self.state.stack.borrow().can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.state.stack.borrow().can_redo()
    }

    pub fn undo_description(&self) -> Option<String> {
        self.state.stack.borrow().undo_description().map(str::to_owned)
    }

    pub fn redo_description(&self) -> Option<String> {
        self.state.stack.borrow().redo_description().map(str::to_owned)
    }

    /// Number of commands on the stack, done and undone
    pub fn len(&self) -> usize {
        self.state.stack.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.stack.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.state.stack.borrow_mut().clear();
    }

    /// Whether recording is currently suspended by an undo, redo or edit in flight
    pub fn is_suspended(&self) -> bool {
        self.state.suspend_depth.get() > 0
    }

    fn replay(&self, frames: &mut FrameArena, frame: FrameHandle, transform: &RigidTransform) -> Result<()> {
        let _suspended = Suspension::engage(&self.state.suspend_depth);
        frames.copy_transform_in(frame, transform)
    }
}

impl Default for FrameHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FrameHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameHistory")
            .field("stack", &self.state.stack.try_borrow().map(|s| (s.index(), s.len())).ok())
            .field("suspend_depth", &self.state.suspend_depth.get())
            .finish()
    }
}

impl HistoryState {
    fn on_frame_modified(&self, frames: &FrameArena, frame: FrameHandle) -> Result<()> {
        let current = frames.transform(frame)?;
        let before = {
            let mut tracked = self.tracked.borrow_mut();
            let Some(entry) = tracked.get_mut(&frame) else {
                return Ok(());
            };
            std::mem::replace(&mut entry.last, current)
        };

        // Replays and explicit edits record themselves (or nothing)
        if self.suspend_depth.get() > 0 || before == current {
            return Ok(());
        }
        self.record(FrameEditCommand::new(frame, before, current, TRANSFORM_DESCRIPTION));
        Ok(())
    }

    fn record(&self, command: FrameEditCommand) {
        if let Some(entry) = self.tracked.borrow_mut().get_mut(&command.frame) {
            entry.last = command.after;
        }
        trace!("recorded '{}' on {}", command.description, command.frame);
        self.stack.borrow_mut().push(command);
    }
}

struct HistoryObserver {
    state: Weak<HistoryState>,
}

impl FrameObserver for HistoryObserver {
    fn frame_modified(&self, frames: &mut FrameArena, frame: FrameHandle) -> Result<()> {
        match self.state.upgrade() {
            Some(state) => state.on_frame_modified(frames, frame),
            None => Ok(()),
        }
    }
}

/// Suspends recording while alive; nests
struct Suspension<'a> {
    depth: &'a Cell<usize>,
}

impl<'a> Suspension<'a> {
    fn engage(depth: &'a Cell<usize>) -> Self {
        depth.set(depth.get() + 1);
        Self { depth }
    }
}

impl Drop for Suspension<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get() - 1);
    }
}
