//! Basic usage example for framesync
//!
//! This example demonstrates:
//! - Creating frames in an arena
//! - Grouping them so they move together
//! - A leader frame that can be repositioned without dragging its peers
//! - Destroyed frames dropping out of a group

use framesync_core::{FrameArena, FrameHandle, RigidTransform};
use framesync_sync::FrameSync;

fn print_frames(frames: &FrameArena, handles: &[FrameHandle]) {
    for handle in handles {
        match frames.get(*handle) {
            Some(frame) => {
                let pose = frame.transform().to_pose();
                println!(
                    "  {:<10} position [{:6.2} {:6.2} {:6.2}]  rpy [{:7.2} {:7.2} {:7.2}]",
                    frame.name(),
                    pose.position[0],
                    pose.position[1],
                    pose.position[2],
                    pose.rpy_degrees[0],
                    pose.rpy_degrees[1],
                    pose.rpy_degrees[2],
                );
            }
            None => println!("  {:<10} (destroyed)", handle),
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("framesync Basic Usage Example");
    println!("=============================");

    let mut frames = FrameArena::new();
    let a = frames.insert("A", RigidTransform::identity());
    let b = frames.insert("B", RigidTransform::translation(1.0, 0.0, 0.0));
    let c = frames.insert(
        "C",
        RigidTransform::from_position_rpy_degrees([0.0, 2.0, 0.0], [0.0, 0.0, 45.0]),
    );
    let all = [a, b, c];

    let sync = FrameSync::new();
    sync.add_frame(&mut frames, a, false);
    sync.add_frame(&mut frames, b, false);
    sync.add_leader(&mut frames, c);
    println!("\nGroup of {} frames:", sync.len(&frames));
    print_frames(&frames, &all);

    println!("\nMove A +1 along X:");
    frames.transform_by(a, &RigidTransform::translation(1.0, 0.0, 0.0))?;
    print_frames(&frames, &all);

    println!("\nRotate B 90 degrees about the world Z axis:");
    frames.transform_by(b, &RigidTransform::from_position_rpy_degrees([0.0; 3], [0.0, 0.0, 90.0]))?;
    print_frames(&frames, &all);

    println!("\nMove leader C on its own (peers stay put):");
    frames.transform_by(c, &RigidTransform::translation(0.0, 0.0, 1.0))?;
    print_frames(&frames, &all);

    println!("\nDestroy B, then move A back to the origin:");
    frames.remove(b);
    frames.copy_transform_in(a, &RigidTransform::identity())?;
    print_frames(&frames, &all);

    println!("\nGroup now has {} live frames", sync.len(&frames));
    println!("Propagation passes run: {}", sync.propagation_passes());

    if let Err(e) = sync.remove_frame(&mut frames, b) {
        log::warn!("expected failure removing a destroyed frame: {}", e);
    }

    Ok(())
}
