//! Frame synchronization groups
//!
//! A [`FrameSync`] keeps a set of frames moving together: when one member's
//! transform changes, every other member is moved by the same rigid delta, so
//! the relative placement the members had when they joined is preserved.
//!
//! Each member stores a *base transform*, a snapshot of where it sits relative
//! to a reference origin shared by the whole group. When member `T` moves to
//! `current_T`, every other member `N` is placed at
//!
//! ```text
//! current_N = current_T * base_T^-1 * base_N
//! ```
//!
//! A frame joining a group that already has members is anchored to the same
//! origin through any live member `M`:
//!
//! ```text
//! base_new = base_M * current_M^-1 * current_new
//! ```
//!
//! which makes the bases independent of join order.
//!
//! Propagation moves the other members through [`FrameArena::copy_transform_in`],
//! which notifies their observers, including this group. A single re-entrancy
//! flag suppresses those echoes; one broadcast per external change is all the
//! protocol ever needs, so there is no per-pair cycle detection.
//!
//! The group never keeps frames alive. Members destroyed in the arena are
//! dropped lazily whenever the member table is walked.

use crate::config::SyncConfig;
use framesync_core::{Error, FrameArena, FrameHandle, FrameObserver, Result, RigidTransform, SubscriptionId};
use log::{debug, trace};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

/// Membership id, unique for the lifetime of a group and never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberId(u64);

impl MemberId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone)]
struct MemberRecord {
    frame: FrameHandle,
    base: RigidTransform,
    subscription: SubscriptionId,
    /// Leader members re-anchor on their own motion instead of dragging peers
    ignore_incoming: bool,
}

struct SyncState {
    members: RefCell<BTreeMap<MemberId, MemberRecord>>,
    propagating: Cell<bool>,
    next_id: Cell<u64>,
    passes: Cell<u64>,
    config: SyncConfig,
}

/// A group of frames kept in rigid lockstep.
///
/// Cloning is cheap and yields another handle to the same group. Once every
/// handle is dropped the group stops reacting to frame changes.
#[derive(Clone)]
pub struct FrameSync {
    state: Rc<SyncState>,
}

impl FrameSync {
    /// Create an empty group
    pub fn new() -> Self {
        Self::with_config(SyncConfig::default())
    }

    pub fn with_config(config: SyncConfig) -> Self {
        Self {
            state: Rc::new(SyncState {
                members: RefCell::new(BTreeMap::new()),
                propagating: Cell::new(false),
                next_id: Cell::new(0),
                passes: Cell::new(0),
                config,
            }),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.state.config
    }

    /// Add `frame` to the group.
    ///
    /// Returns the new membership id, or `None` when the call is a no-op:
    /// the handle is stale or the frame is already a member.
    pub fn add_frame(&self, frames: &mut FrameArena, frame: FrameHandle, ignore_incoming: bool) -> Option<MemberId> {
        if !frames.contains(frame) {
            trace!("ignoring add of stale {}", frame);
            return None;
        }

        let mut members = self.state.members.borrow_mut();
        prune_stale(&mut members, frames);
        if members.values().any(|m| m.frame == frame) {
            return None;
        }

        let current = frames.transform(frame).ok()?;
        let base = base_transform(&members, frames, frame, &current);

        let observer: Rc<dyn FrameObserver> = Rc::new(SyncObserver {
            state: Rc::downgrade(&self.state),
        });
        let subscription = frames.subscribe(frame, observer).ok()?;

        let id = MemberId(self.state.next_id.get());
        self.state.next_id.set(id.0 + 1);
        members.insert(
            id,
            MemberRecord {
                frame,
                base,
                subscription,
                ignore_incoming,
            },
        );

        debug!(
            "{} joined sync group as member {} (leader: {}, members: {})",
            frame,
            id.0,
            ignore_incoming,
            members.len()
        );
        Some(id)
    }

    /// Add a leader: its own motion re-anchors it instead of moving the others
    pub fn add_leader(&self, frames: &mut FrameArena, frame: FrameHandle) -> Option<MemberId> {
        self.add_frame(frames, frame, true)
    }

    /// Remove `frame` from the group.
    ///
    /// Unlike [`add_frame`](Self::add_frame) this is strict: a frame that is
    /// not a live member yields [`Error::NotFound`].
    pub fn remove_frame(&self, frames: &mut FrameArena, frame: FrameHandle) -> Result<()> {
        let mut members = self.state.members.borrow_mut();
        prune_stale(&mut members, frames);

        let id = members
            .iter()
            .find(|(_, m)| m.frame == frame)
            .map(|(id, _)| *id)
            .ok_or(Error::NotFound(frame))?;

        if let Some(record) = members.remove(&id) {
            frames.unsubscribe(frame, record.subscription);
        }
        debug!("{} left sync group (members: {})", frame, members.len());
        Ok(())
    }

    /// Detach every member
    pub fn clear(&self, frames: &mut FrameArena) {
        let members = std::mem::take(&mut *self.state.members.borrow_mut());
        for record in members.into_values() {
            frames.unsubscribe(record.frame, record.subscription);
        }
    }

    /// Whether `frame` is a live member
    pub fn contains(&self, frames: &FrameArena, frame: FrameHandle) -> bool {
        self.member_id(frames, frame).is_some()
    }

    pub fn member_id(&self, frames: &FrameArena, frame: FrameHandle) -> Option<MemberId> {
        let mut members = self.state.members.borrow_mut();
        prune_stale(&mut members, frames);
        members.iter().find(|(_, m)| m.frame == frame).map(|(id, _)| *id)
    }

    /// Number of live members
    pub fn len(&self, frames: &FrameArena) -> usize {
        let mut members = self.state.members.borrow_mut();
        prune_stale(&mut members, frames);
        members.len()
    }

    pub fn is_empty(&self, frames: &FrameArena) -> bool {
        self.len(frames) == 0
    }

    /// Number of propagation passes run so far
    pub fn propagation_passes(&self) -> u64 {
        self.state.passes.get()
    }

    /// Whether a propagation pass is currently running
    pub fn is_propagating(&self) -> bool {
        self.state.propagating.get()
    }
}

impl Default for FrameSync {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FrameSync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameSync")
            .field("members", &self.state.members.try_borrow().map(|m| m.len()).ok())
            .field("propagating", &self.state.propagating.get())
            .field("passes", &self.state.passes.get())
            .finish()
    }
}

impl SyncState {
    fn on_frame_modified(&self, frames: &mut FrameArena, frame: FrameHandle) -> Result<()> {
        if self.propagating.get() {
            trace!("suppressed re-entrant notification from {}", frame);
            return Ok(());
        }

        let updates = {
            let mut members = self.members.borrow_mut();
            prune_stale(&mut members, frames);

            let Some((&trigger_id, trigger)) = members.iter().find(|(_, m)| m.frame == frame) else {
                return Ok(());
            };
            let current = frames.transform(frame)?;

            if trigger.ignore_incoming {
                let base = base_transform(&members, frames, frame, &current);
                if let Some(record) = members.get_mut(&trigger_id) {
                    record.base = base;
                }
                trace!("re-anchored leader {}", frame);
                return Ok(());
            }

            let anchor = current.compose(&trigger.base.inverse());
            members
                .iter()
                .filter(|(id, _)| **id != trigger_id)
                .map(|(id, m)| (*id, m.frame, anchor.compose(&m.base)))
                .collect::<Vec<_>>()
        };

        self.passes.set(self.passes.get() + 1);
        if self.config.log_passes {
            debug!("propagating {} to {} member(s)", frame, updates.len());
        } else {
            trace!("propagating {} to {} member(s)", frame, updates.len());
        }

        let _guard = PropagationGuard::engage(&self.propagating);
        for (id, member, transform) in updates {
            // Another observer may have destroyed or detached the member mid-pass
            if !frames.contains(member) || !self.members.borrow().contains_key(&id) {
                trace!("skipping {} gone mid-pass", member);
                continue;
            }
            frames.copy_transform_in(member, &transform)?;
        }
        Ok(())
    }
}

/// The arena's link back to a group. Weak, so a dropped group goes quiet.
struct SyncObserver {
    state: Weak<SyncState>,
}

impl FrameObserver for SyncObserver {
    fn frame_modified(&self, frames: &mut FrameArena, frame: FrameHandle) -> Result<()> {
        match self.state.upgrade() {
            Some(state) => state.on_frame_modified(frames, frame),
            None => Ok(()),
        }
    }
}

/// Holds the re-entrancy flag for the duration of a pass; released on drop,
/// including early returns and unwinding.
struct PropagationGuard<'a> {
    flag: &'a Cell<bool>,
}

impl<'a> PropagationGuard<'a> {
    fn engage(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self { flag }
    }
}

impl Drop for PropagationGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

fn prune_stale(members: &mut BTreeMap<MemberId, MemberRecord>, frames: &FrameArena) {
    let before = members.len();
    members.retain(|_, m| frames.contains(m.frame));
    let pruned = before - members.len();
    if pruned > 0 {
        debug!("pruned {} destroyed sync member(s)", pruned);
    }
}

/// Anchor `frame`, currently at `current`, to the group's shared origin.
/// Any live member other than `frame` serves as the reference.
fn base_transform(
    members: &BTreeMap<MemberId, MemberRecord>,
    frames: &FrameArena,
    frame: FrameHandle,
    current: &RigidTransform,
) -> RigidTransform {
    let reference = members
        .values()
        .filter(|m| m.frame != frame)
        .find_map(|m| frames.transform(m.frame).ok().map(|t| (m.base, t)));

    match reference {
        Some((reference_base, reference_current)) => reference_base
            .compose(&reference_current.inverse())
            .compose(current),
        None => *current,
    }
}
