//! Frame edits with undo/redo
//!
//! A parent frame and a child frame are synced, with the child as a leader so
//! it can be repositioned relative to the parent. Edits of the parent are
//! recorded and replayed from an undo history; the child follows.

use framesync_core::{FrameArena, FrameHandle, RigidTransform};
use framesync_sync::{FrameHistory, FrameSync, HistoryConfig};

fn show(frames: &FrameArena, label: &str, handles: &[FrameHandle]) -> anyhow::Result<()> {
    println!("{label}");
    for handle in handles {
        let pose = frames.transform(*handle)?.to_pose();
        let name = frames.get(*handle).map(|f| f.name()).unwrap_or("?");
        println!("  {:<13} {:?}", name, pose);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut frames = FrameArena::new();
    let parent = frames.insert("parent frame", RigidTransform::identity());
    let child = frames.insert(
        "child frame",
        RigidTransform::from_position_rpy_degrees([0.5, -1.0, 0.0], [0.0, 20.0, 45.0]),
    );
    let both = [parent, child];

    let history = FrameHistory::with_config(HistoryConfig::default());
    history.track(&mut frames, parent);

    let sync = FrameSync::new();
    sync.add_frame(&mut frames, parent, false);
    sync.add_leader(&mut frames, child);
    show(&frames, "Initial:", &both)?;

    history.set_position(&mut frames, parent, [1.0, 0.0, 0.0])?;
    show(&frames, "\nAfter 'Update Position' on the parent:", &both)?;

    history.set_rpy_degrees(&mut frames, parent, [0.0, 0.0, 90.0])?;
    show(&frames, "\nAfter 'Update RPY (deg)' on the parent:", &both)?;

    // Reset the parent, as a toolbar button would
    frames.copy_transform_in(parent, &RigidTransform::identity())?;
    show(&frames, "\nAfter reset:", &both)?;

    while let Some(description) = history.undo_description() {
        history.undo(&mut frames)?;
        show(&frames, &format!("\nUndo '{description}':"), &both)?;
    }

    while let Some(description) = history.redo_description() {
        history.redo(&mut frames)?;
        show(&frames, &format!("\nRedo '{description}':"), &both)?;
    }

    log::info!("{} edit(s) on the undo stack", history.len());
    Ok(())
}
