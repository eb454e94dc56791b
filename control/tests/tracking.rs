//! End-to-end tracking tests over synthetic camera frames.

use std::time::Duration;

use approx::assert_relative_eq;

use control::{CycleOutcome, TargetTracker, TrackerConfig, TrackerState};
use hardware::{RecordingArm, ScriptedCamera};
use kinematics::ArmGeometry;
use shared::{Frame, ImageSize, Joint, WarpMatrix, WorkspaceFrame};
use vision::{BlobFilters, ColorRange, PerceptionContext, UndistortionMap};

const TARGET_RGB: [u8; 3] = [200, 60, 20];

fn size() -> ImageSize {
    ImageSize::from_width_height(640, 480)
}

/// A synthetic workspace where physical x = 0.05 · pixel row and
/// physical y = 0.05 · pixel column.
fn test_workspace() -> WorkspaceFrame {
    WorkspaceFrame {
        x_offset: 0.0,
        x_per_row: 0.05,
        y_offset: 0.0,
        y_per_col: 0.05,
    }
}

fn perception() -> PerceptionContext {
    PerceptionContext {
        undistortion: UndistortionMap::identity(size()),
        warp: WarpMatrix::identity(),
        color_range: ColorRange::default(),
        filters: BlobFilters::default(),
        workspace: test_workspace(),
    }
}

fn fast_config() -> TrackerConfig {
    TrackerConfig {
        cycle_pause: Duration::from_millis(1),
        ..Default::default()
    }
}

fn blank_frame() -> Frame {
    Frame::zeros((size().height, size().width, 3))
}

/// Frame with a 31×31 target-colored square centered at (col, row).
fn frame_with_target(col: usize, row: usize) -> Frame {
    let mut frame = blank_frame();
    for y in row - 15..=row + 15 {
        for x in col - 15..=col + 15 {
            for ch in 0..3 {
                frame[[y, x, ch]] = TARGET_RGB[ch];
            }
        }
    }
    frame
}

#[test]
fn no_target_means_no_actuation() {
    let camera = ScriptedCamera::once(vec![blank_frame()], size());
    let mut tracker = TargetTracker::new(camera, RecordingArm::new(), perception(), fast_config());

    let outcome = tracker.step().unwrap();
    assert_eq!(outcome, CycleOutcome::NoTarget);
    assert!(tracker.into_arm().commands.is_empty());
}

#[test]
fn target_commands_smaller_shoulder_excursion() {
    // Target blob at column 60, row 100 → physical (5.0, 3.0)
    let camera = ScriptedCamera::once(vec![frame_with_target(60, 100)], size());
    let mut tracker = TargetTracker::new(camera, RecordingArm::new(), perception(), fast_config());

    let outcome = tracker.step().unwrap();
    let CycleOutcome::Commanded(angles) = outcome else {
        panic!("expected a commanded pose, got {outcome:?}");
    };

    // With previous shoulder at 0°, the loop must pick the solution with
    // the smaller |shoulder| of the two
    let solutions = kinematics::solve(5.0, 3.0, &ArmGeometry::default()).unwrap();
    let [a, b] = solutions.as_array();
    let expected = if a.shoulder.abs() <= b.shoulder.abs() { a } else { b };
    assert_relative_eq!(angles.shoulder, expected.shoulder, epsilon = 1e-9);
    assert_relative_eq!(angles.elbow, expected.elbow, epsilon = 1e-9);

    let arm = tracker.into_arm();
    assert_eq!(arm.last_angle(Joint::Shoulder), Some(Some(expected.shoulder)));
    assert_eq!(arm.last_angle(Joint::Elbow), Some(Some(expected.elbow)));
}

#[test]
fn single_axis_jitter_is_ignored() {
    // Second frame: the target moves 3 rows (0.15 in x) but only one
    // column (0.05 in y, below threshold) — both axes must exceed the
    // threshold for the arm to react
    let camera = ScriptedCamera::once(
        vec![frame_with_target(60, 100), frame_with_target(61, 103)],
        size(),
    );
    let mut tracker = TargetTracker::new(camera, RecordingArm::new(), perception(), fast_config());

    assert!(matches!(tracker.step().unwrap(), CycleOutcome::Commanded(_)));
    assert_eq!(tracker.step().unwrap(), CycleOutcome::Jitter);

    let arm = tracker.into_arm();
    // Only the first cycle's two commands were issued
    assert_eq!(arm.commands.len(), 2);
}

#[test]
fn unreachable_target_holds_position() {
    // Column 400, row 420 → physical (21.0, 20.0), far beyond max reach
    let camera = ScriptedCamera::once(vec![frame_with_target(400, 420)], size());
    let mut tracker = TargetTracker::new(camera, RecordingArm::new(), perception(), fast_config());

    assert_eq!(tracker.step().unwrap(), CycleOutcome::NoSolution);
    assert!(tracker.into_arm().commands.is_empty());
}

#[test]
fn cancellation_depowers_both_joints() {
    let camera = ScriptedCamera::cycle(vec![blank_frame()], size());
    let mut tracker = TargetTracker::new(camera, RecordingArm::new(), perception(), fast_config());

    let (tx, rx) = crossbeam_channel::bounded(1);
    tx.send(()).unwrap();
    tracker.run(&rx).unwrap();

    assert_eq!(tracker.state(), TrackerState::Terminated);
    let arm = tracker.into_arm();
    assert_eq!(arm.last_angle(Joint::Shoulder), Some(None));
    assert_eq!(arm.last_angle(Joint::Elbow), Some(None));
}

#[test]
fn device_error_still_depowers() {
    // Script exhausts immediately: the first capture raises a device error
    let camera = ScriptedCamera::once(vec![], size());
    let mut tracker = TargetTracker::new(camera, RecordingArm::new(), perception(), fast_config());

    let (_tx, rx) = crossbeam_channel::bounded::<()>(1);
    let result = tracker.run(&rx);
    assert!(result.is_err());
    assert_eq!(tracker.state(), TrackerState::Terminated);

    let arm = tracker.into_arm();
    assert_eq!(arm.last_angle(Joint::Shoulder), Some(None));
    assert_eq!(arm.last_angle(Joint::Elbow), Some(None));
}

#[test]
fn tracks_a_moving_target() {
    // Target hops well past the movement threshold on both axes each
    // frame: every frame is a fresh commanded pose
    let camera = ScriptedCamera::once(
        vec![
            frame_with_target(60, 100),
            frame_with_target(100, 140),
            frame_with_target(120, 80),
        ],
        size(),
    );
    let mut tracker = TargetTracker::new(camera, RecordingArm::new(), perception(), fast_config());

    let mut commanded = Vec::new();
    for _ in 0..3 {
        if let CycleOutcome::Commanded(angles) = tracker.step().unwrap() {
            commanded.push(angles);
        }
    }
    assert_eq!(commanded.len(), 3);
    // Consecutive poses differ: the arm actually followed the target
    assert_ne!(commanded[0], commanded[1]);
    assert_ne!(commanded[1], commanded[2]);
}
