//! Frames and the arena that owns them
//!
//! A frame is a named rigid transform that notifies observers whenever the
//! transform is replaced. Frames live in a [`FrameArena`] and are referred to
//! by generational [`FrameHandle`]s: once a frame is removed its handle goes
//! stale and never aliases a frame inserted later into the same slot.

use crate::error::{Error, Result};
use crate::traits::FrameObserver;
use crate::transform::RigidTransform;
use log::trace;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// Stable identity of a frame in a [`FrameArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FrameHandle {
    index: u32,
    generation: u32,
}

impl FrameHandle {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for FrameHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame#{}v{}", self.index, self.generation)
    }
}

/// Token returned by [`FrameArena::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// A named rigid transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    name: String,
    transform: RigidTransform,
}

impl Frame {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transform(&self) -> &RigidTransform {
        &self.transform
    }
}

struct Occupant {
    frame: Frame,
    observers: Vec<(SubscriptionId, Rc<dyn FrameObserver>)>,
}

struct Slot {
    generation: u32,
    occupant: Option<Occupant>,
}

/// Owner of every frame in a scene.
///
/// All mutation goes through the arena, and change notifications are
/// delivered synchronously: when [`copy_transform_in`](Self::copy_transform_in)
/// returns, every observer of the frame (and anything they moved in turn)
/// has already run.
#[derive(Default)]
pub struct FrameArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
    next_subscription: u64,
}

impl FrameArena {
    /// Create an empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live frames
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Add a frame and return its handle
    pub fn insert(&mut self, name: impl Into<String>, transform: RigidTransform) -> FrameHandle {
        let occupant = Occupant {
            frame: Frame {
                name: name.into(),
                transform,
            },
            observers: Vec::new(),
        };
        self.len += 1;

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.occupant = Some(occupant);
            return FrameHandle {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            occupant: Some(occupant),
        });
        FrameHandle { index, generation: 0 }
    }

    /// Destroy a frame. Its observers are dropped without being notified and
    /// the handle becomes stale.
    pub fn remove(&mut self, handle: FrameHandle) -> Option<Frame> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let occupant = slot.occupant.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.len -= 1;
        trace!("removed {} ({})", handle, occupant.frame.name);
        Some(occupant.frame)
    }

    /// Whether `handle` refers to a live frame
    pub fn contains(&self, handle: FrameHandle) -> bool {
        self.occupant(handle).is_some()
    }

    pub fn get(&self, handle: FrameHandle) -> Option<&Frame> {
        self.occupant(handle).map(|o| &o.frame)
    }

    /// Handles of every live frame, in slot order
    pub fn handles(&self) -> impl Iterator<Item = FrameHandle> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.occupant.as_ref().map(|_| FrameHandle {
                index: index as u32,
                generation: slot.generation,
            })
        })
    }

    /// First live frame with the given name
    pub fn find_by_name(&self, name: &str) -> Option<FrameHandle> {
        self.handles()
            .find(|h| self.get(*h).is_some_and(|f| f.name == name))
    }

    /// Current transform of a frame
    pub fn transform(&self, handle: FrameHandle) -> Result<RigidTransform> {
        self.get(handle)
            .map(|f| f.transform)
            .ok_or(Error::StaleFrame(handle))
    }

    /// Replace a frame's transform with a copy of `transform`, then notify
    /// its observers in registration order before returning.
    pub fn copy_transform_in(&mut self, handle: FrameHandle, transform: &RigidTransform) -> Result<()> {
        let occupant = self
            .occupant_mut(handle)
            .ok_or(Error::StaleFrame(handle))?;
        occupant.frame.transform = *transform;
        self.notify(handle)
    }

    /// Move a frame by `delta`, expressed in the world frame (`delta * current`)
    pub fn transform_by(&mut self, handle: FrameHandle, delta: &RigidTransform) -> Result<()> {
        let current = self.transform(handle)?;
        self.copy_transform_in(handle, &delta.compose(&current))
    }

    /// Register an observer for changes to `handle`
    pub fn subscribe(&mut self, handle: FrameHandle, observer: Rc<dyn FrameObserver>) -> Result<SubscriptionId> {
        let id = SubscriptionId(self.next_subscription);
        let occupant = self
            .occupant_mut(handle)
            .ok_or(Error::StaleFrame(handle))?;
        occupant.observers.push((id, observer));
        self.next_subscription += 1;
        Ok(id)
    }

    /// Drop a subscription. Returns `false` if the frame or the subscription
    /// no longer exists.
    pub fn unsubscribe(&mut self, handle: FrameHandle, id: SubscriptionId) -> bool {
        let Some(occupant) = self.occupant_mut(handle) else {
            return false;
        };
        let before = occupant.observers.len();
        occupant.observers.retain(|(sub, _)| *sub != id);
        occupant.observers.len() != before
    }

    /// Number of observers currently subscribed to `handle`
    pub fn observer_count(&self, handle: FrameHandle) -> usize {
        self.occupant(handle).map_or(0, |o| o.observers.len())
    }

    fn is_subscribed(&self, handle: FrameHandle, id: SubscriptionId) -> bool {
        self.occupant(handle)
            .is_some_and(|o| o.observers.iter().any(|(sub, _)| *sub == id))
    }

    fn notify(&mut self, handle: FrameHandle) -> Result<()> {
        // Snapshot so observers can (un)subscribe or destroy frames mid-dispatch
        let observers: Vec<(SubscriptionId, Rc<dyn FrameObserver>)> = match self.occupant(handle) {
            Some(o) => o.observers.iter().map(|(id, obs)| (*id, Rc::clone(obs))).collect(),
            None => return Ok(()),
        };

        for (id, observer) in observers {
            if !self.contains(handle) {
                trace!("{} destroyed during notification", handle);
                break;
            }
            if !self.is_subscribed(handle, id) {
                continue;
            }
            observer.frame_modified(self, handle)?;
        }
        Ok(())
    }

    fn occupant(&self, handle: FrameHandle) -> Option<&Occupant> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.occupant.as_ref())
    }

    fn occupant_mut(&mut self, handle: FrameHandle) -> Option<&mut Occupant> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.occupant.as_mut())
    }
}

impl fmt::Debug for FrameArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameArena")
            .field("len", &self.len)
            .field("slots", &self.slots.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    fn counter() -> (Rc<Cell<usize>>, Rc<dyn FrameObserver>) {
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let observer: Rc<dyn FrameObserver> = Rc::new(move |_: &mut FrameArena, _: FrameHandle| -> Result<()> {
            c.set(c.get() + 1);
            Ok(())
        });
        (count, observer)
    }

    #[test]
    fn test_insert_and_get() {
        let mut frames = FrameArena::new();
        let a = frames.insert("a", RigidTransform::translation(1.0, 2.0, 3.0));

        assert_eq!(frames.len(), 1);
        assert_eq!(frames.get(a).unwrap().name(), "a");
        assert_eq!(frames.find_by_name("a"), Some(a));
        assert!(frames
            .transform(a)
            .unwrap()
            .approx_eq(&RigidTransform::translation(1.0, 2.0, 3.0), 0.0));
    }

    #[test]
    fn test_removed_handle_is_stale_after_slot_reuse() {
        let mut frames = FrameArena::new();
        let a = frames.insert("a", RigidTransform::identity());
        assert!(frames.remove(a).is_some());
        assert!(frames.remove(a).is_none());

        let b = frames.insert("b", RigidTransform::identity());
        assert_eq!(a.index(), b.index());
        assert_ne!(a, b);
        assert!(!frames.contains(a));
        assert!(frames.contains(b));
        assert_eq!(frames.transform(a), Err(Error::StaleFrame(a)));
        assert_eq!(frames.handles().collect::<Vec<_>>(), vec![b]);
    }

    #[test]
    fn test_copy_transform_in_notifies_once_per_call() {
        let mut frames = FrameArena::new();
        let a = frames.insert("a", RigidTransform::identity());
        let (count, observer) = counter();
        frames.subscribe(a, observer).unwrap();

        frames.copy_transform_in(a, &RigidTransform::translation(1.0, 0.0, 0.0)).unwrap();
        assert_eq!(count.get(), 1);
        frames.transform_by(a, &RigidTransform::translation(1.0, 0.0, 0.0)).unwrap();
        assert_eq!(count.get(), 2);
        assert!(frames
            .transform(a)
            .unwrap()
            .approx_eq(&RigidTransform::translation(2.0, 0.0, 0.0), 1e-12));
    }

    #[test]
    fn test_observers_run_in_registration_order() {
        let mut frames = FrameArena::new();
        let a = frames.insert("a", RigidTransform::identity());
        let log = Rc::new(RefCell::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let log = Rc::clone(&log);
            frames
                .subscribe(a, Rc::new(move |_: &mut FrameArena, _: FrameHandle| -> Result<()> {
                    log.borrow_mut().push(tag);
                    Ok(())
                }))
                .unwrap();
        }

        frames.copy_transform_in(a, &RigidTransform::identity()).unwrap();
        assert_eq!(*log.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_unsubscribe() {
        let mut frames = FrameArena::new();
        let a = frames.insert("a", RigidTransform::identity());
        let (count, observer) = counter();
        let id = frames.subscribe(a, observer).unwrap();

        assert!(frames.unsubscribe(a, id));
        assert!(!frames.unsubscribe(a, id));
        frames.copy_transform_in(a, &RigidTransform::identity()).unwrap();
        assert_eq!(count.get(), 0);
        assert_eq!(frames.observer_count(a), 0);
    }

    #[test]
    fn test_observer_error_stops_dispatch() {
        let mut frames = FrameArena::new();
        let a = frames.insert("a", RigidTransform::identity());
        frames
            .subscribe(a, Rc::new(|_: &mut FrameArena, _: FrameHandle| -> Result<()> {
                Err(Error::Observer("refused".into()))
            }))
            .unwrap();
        let (count, observer) = counter();
        frames.subscribe(a, observer).unwrap();

        let result = frames.copy_transform_in(a, &RigidTransform::identity());
        assert_eq!(result, Err(Error::Observer("refused".into())));
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_observer_may_destroy_frame_mid_dispatch() {
        let mut frames = FrameArena::new();
        let a = frames.insert("a", RigidTransform::identity());
        frames
            .subscribe(a, Rc::new(|frames: &mut FrameArena, frame: FrameHandle| -> Result<()> {
                frames.remove(frame);
                Ok(())
            }))
            .unwrap();
        let (count, observer) = counter();
        frames.subscribe(a, observer).unwrap();

        frames.copy_transform_in(a, &RigidTransform::identity()).unwrap();
        assert!(!frames.contains(a));
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_stale_handle_operations() {
        let mut frames = FrameArena::new();
        let a = frames.insert("a", RigidTransform::identity());
        frames.remove(a);

        let (_, observer) = counter();
        assert_eq!(frames.subscribe(a, observer).unwrap_err(), Error::StaleFrame(a));
        assert_eq!(
            frames.copy_transform_in(a, &RigidTransform::identity()),
            Err(Error::StaleFrame(a))
        );
        assert!(frames.is_empty());
    }
}
