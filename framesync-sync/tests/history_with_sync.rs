//! Undo/redo of frame edits inside sync groups

use approx::assert_relative_eq;
use framesync_core::{FrameArena, RigidTransform, Vector3};
use framesync_sync::{FrameHistory, FrameSync, HistoryConfig, POSITION_DESCRIPTION, RPY_DESCRIPTION, TRANSFORM_DESCRIPTION};

const TOLERANCE: f64 = 1e-9;

fn unmerged() -> HistoryConfig {
    HistoryConfig::default().with_merge_window_secs(0.0)
}

#[test]
fn test_undo_restores_parent_and_child_follows() {
    let mut frames = FrameArena::new();
    let parent = frames.insert("parent frame", RigidTransform::identity());
    let child = frames.insert(
        "child frame",
        RigidTransform::from_position_rpy_degrees([0.5, -1.0, 0.0], [0.0, 20.0, 45.0]),
    );
    let child_start = frames.transform(child).unwrap();

    let history = FrameHistory::with_config(unmerged());
    history.track(&mut frames, parent);
    let sync = FrameSync::new();
    sync.add_frame(&mut frames, parent, false);
    sync.add_leader(&mut frames, child);

    frames.transform_by(parent, &RigidTransform::translation(2.0, 0.0, 0.0)).unwrap();
    assert_relative_eq!(
        frames.transform(child).unwrap().position(),
        Vector3::new(2.5, -1.0, 0.0),
        epsilon = TOLERANCE
    );

    assert!(history.undo(&mut frames).unwrap());
    assert!(frames.transform(parent).unwrap().is_identity(TOLERANCE));
    assert!(frames.transform(child).unwrap().approx_eq(&child_start, TOLERANCE));

    // Replays are not themselves recorded
    assert_eq!(history.len(), 1);
    assert!(history.can_redo());

    assert!(history.redo(&mut frames).unwrap());
    assert_relative_eq!(
        frames.transform(child).unwrap().position(),
        Vector3::new(2.5, -1.0, 0.0),
        epsilon = TOLERANCE
    );
}

#[test]
fn test_rapid_edits_merge_into_one_step() {
    let mut frames = FrameArena::new();
    let frame = frames.insert("frame", RigidTransform::identity());
    let history = FrameHistory::with_config(HistoryConfig::default().with_merge_window_secs(60.0));
    history.track(&mut frames, frame);

    for _ in 0..5 {
        frames.transform_by(frame, &RigidTransform::translation(0.1, 0.0, 0.0)).unwrap();
    }
    assert_eq!(history.len(), 1);

    assert!(history.undo(&mut frames).unwrap());
    assert!(frames.transform(frame).unwrap().is_identity(TOLERANCE));
    assert!(!history.can_undo());
}

#[test]
fn test_edits_without_merge_window_stay_separate() {
    let mut frames = FrameArena::new();
    let frame = frames.insert("frame", RigidTransform::identity());
    let history = FrameHistory::with_config(unmerged());
    history.track(&mut frames, frame);

    for _ in 0..3 {
        frames.transform_by(frame, &RigidTransform::translation(1.0, 0.0, 0.0)).unwrap();
    }
    assert_eq!(history.len(), 3);

    history.undo(&mut frames).unwrap();
    assert_relative_eq!(frames.transform(frame).unwrap().position(), Vector3::new(2.0, 0.0, 0.0), epsilon = TOLERANCE);
}

#[test]
fn test_property_edits_record_their_description() {
    let mut frames = FrameArena::new();
    let frame = frames.insert(
        "frame",
        RigidTransform::from_position_rpy_degrees([0.0, 0.0, 0.0], [0.0, 0.0, 30.0]),
    );
    let history = FrameHistory::new();
    history.track(&mut frames, frame);

    history.set_position(&mut frames, frame, [1.0, 2.0, 3.0]).unwrap();
    let pose = frames.transform(frame).unwrap().to_pose();
    assert_relative_eq!(pose.rpy_degrees[2], 30.0, epsilon = TOLERANCE);
    assert_eq!(history.undo_description().as_deref(), Some(POSITION_DESCRIPTION));

    history.set_rpy_degrees(&mut frames, frame, [0.0, 0.0, 90.0]).unwrap();
    let pose = frames.transform(frame).unwrap().to_pose();
    assert_relative_eq!(pose.position[1], 2.0, epsilon = TOLERANCE);
    assert_eq!(history.undo_description().as_deref(), Some(RPY_DESCRIPTION));
    assert_eq!(history.len(), 2);

    history.undo(&mut frames).unwrap();
    history.undo(&mut frames).unwrap();
    let pose = frames.transform(frame).unwrap().to_pose();
    assert_relative_eq!(pose.position[0], 0.0, epsilon = TOLERANCE);
    assert_relative_eq!(pose.rpy_degrees[2], 30.0, epsilon = TOLERANCE);

    // A direct change after an explicit edit starts from the edited state
    history.redo(&mut frames).unwrap();
    frames.transform_by(frame, &RigidTransform::translation(0.0, 0.0, 1.0)).unwrap();
    assert_eq!(history.undo_description().as_deref(), Some(TRANSFORM_DESCRIPTION));
    history.undo(&mut frames).unwrap();
    assert_relative_eq!(frames.transform(frame).unwrap().position(), Vector3::new(1.0, 2.0, 3.0), epsilon = TOLERANCE);
}

#[test]
fn test_edit_of_untracked_frame_is_rejected() {
    let mut frames = FrameArena::new();
    let frame = frames.insert("frame", RigidTransform::identity());
    let history = FrameHistory::new();

    assert!(history
        .apply_edit(&mut frames, frame, &RigidTransform::translation(1.0, 0.0, 0.0), POSITION_DESCRIPTION)
        .is_err());
    assert!(frames.transform(frame).unwrap().is_identity(TOLERANCE));
}

#[test]
fn test_edits_of_destroyed_frames_are_skipped() {
    let mut frames = FrameArena::new();
    let a = frames.insert("a", RigidTransform::identity());
    let b = frames.insert("b", RigidTransform::identity());
    let history = FrameHistory::with_config(unmerged());
    history.track(&mut frames, a);
    history.track(&mut frames, b);

    frames.transform_by(a, &RigidTransform::translation(1.0, 0.0, 0.0)).unwrap();
    frames.transform_by(b, &RigidTransform::translation(1.0, 0.0, 0.0)).unwrap();
    frames.remove(b);

    assert!(history.undo(&mut frames).unwrap());
    assert!(frames.transform(a).unwrap().is_identity(TOLERANCE));
    assert!(!history.can_undo());
    assert_eq!(history.len(), 1);
}

#[test]
fn test_synced_peers_record_their_own_steps() {
    let mut frames = FrameArena::new();
    let a = frames.insert("a", RigidTransform::identity());
    let b = frames.insert("b", RigidTransform::translation(0.0, 1.0, 0.0));
    let history = FrameHistory::with_config(unmerged());
    history.track(&mut frames, a);
    history.track(&mut frames, b);
    let sync = FrameSync::new();
    sync.add_frame(&mut frames, a, false);
    sync.add_frame(&mut frames, b, false);

    frames.transform_by(a, &RigidTransform::translation(1.0, 0.0, 0.0)).unwrap();
    assert_eq!(history.len(), 2);

    // Undoing the peer's step drags the mover back too
    history.undo(&mut frames).unwrap();
    assert!(frames.transform(a).unwrap().is_identity(TOLERANCE));
    assert_relative_eq!(frames.transform(b).unwrap().position(), Vector3::new(0.0, 1.0, 0.0), epsilon = TOLERANCE);

    history.undo(&mut frames).unwrap();
    assert!(frames.transform(a).unwrap().is_identity(TOLERANCE));
    assert!(!history.can_undo());
}
