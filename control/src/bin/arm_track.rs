//! Autonomous tracking demo over a synthetic camera.
//!
//! Replays a scripted moving target through the full perception and
//! control pipeline, logging every commanded pose. Wire a real camera and
//! servo driver in place of the mocks to run on the robot.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use control::{TargetTracker, TrackerConfig};
use hardware::{ArmInterface, RecordingArm, ScriptedCamera};
use shared::{ConfigStore, DeviceError, Frame, ImageSize, Joint, WarpMatrix, WorkspaceFrame};
use vision::{BlobFilters, ColorRange, FisheyeModel, PerceptionContext, UndistortionMap};

#[derive(Parser, Debug)]
#[command(author, version, about = "Autonomous SCARA arm tracking demo")]
struct Args {
    /// Config file holding the warp matrix and pulse calibration
    #[arg(short, long, default_value = "arm_config.txt")]
    config: String,

    /// Number of synthetic target positions to replay
    #[arg(long, default_value = "20")]
    frames: usize,

    /// Milliseconds between tracking cycles
    #[arg(long, default_value = "200")]
    cycle_ms: u64,

    /// Apply lens undistortion to the synthetic frames
    #[arg(long)]
    undistort: bool,
}

/// An arm that logs every command instead of driving servos.
struct LoggingArm(RecordingArm);

impl ArmInterface for LoggingArm {
    fn set_angle(&mut self, joint: Joint, angle: Option<f64>) -> Result<(), DeviceError> {
        match angle {
            Some(a) => info!("{joint} -> {a:.2}°"),
            None => info!("{joint} -> depowered"),
        }
        self.0.set_angle(joint, angle)
    }
}

const TARGET_RGB: [u8; 3] = [200, 60, 20];

/// Synthetic frames of a disk drifting diagonally across the workspace.
fn synthetic_frames(size: ImageSize, count: usize) -> Vec<Frame> {
    (0..count)
        .map(|i| {
            let col = 80 + (i * 17) % 400;
            let row = 90 + (i * 11) % 280;
            let mut frame = Frame::zeros((size.height, size.width, 3));
            for y in row - 15..=row + 15 {
                for x in col - 15..=col + 15 {
                    for ch in 0..3 {
                        frame[[y, x, ch]] = TARGET_RGB[ch];
                    }
                }
            }
            frame
        })
        .collect()
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let size = ImageSize::from_width_height(640, 480);

    let store = ConfigStore::new(&args.config);
    let config = store
        .load_or_default()
        .with_context(|| format!("loading config from {}", args.config))?;
    let warp = config.warp_matrix.unwrap_or_else(|| {
        info!("no stored perspective calibration; using identity warp");
        WarpMatrix::identity()
    });

    let undistortion = if args.undistort {
        info!("deriving undistortion map for {size}");
        FisheyeModel::default().undistortion_map(size, 0.0)
    } else {
        UndistortionMap::identity(size)
    };

    let perception = PerceptionContext {
        undistortion,
        warp,
        color_range: ColorRange::default(),
        filters: BlobFilters::default(),
        workspace: WorkspaceFrame::default(),
    };

    let camera = ScriptedCamera::once(synthetic_frames(size, args.frames), size);
    let tracker_config = TrackerConfig {
        cycle_pause: Duration::from_millis(args.cycle_ms),
        ..Default::default()
    };
    let mut tracker = TargetTracker::new(
        camera,
        LoggingArm(RecordingArm::new()),
        perception,
        tracker_config,
    );

    // The scripted camera errors out when its frames run dry, which ends
    // the demo through the same depower path a real device fault would
    let (_cancel_tx, cancel_rx) = crossbeam_channel::bounded::<()>(1);
    info!("replaying {} synthetic frames", args.frames);
    match tracker.run(&cancel_rx) {
        Ok(()) => info!("tracking cancelled"),
        Err(e) => info!("tracking ended: {e}"),
    }

    let arm = tracker.into_arm().0;
    let poses = arm
        .commands
        .iter()
        .filter(|c| c.angle.is_some())
        .count();
    info!("{} joint commands issued across the run", poses);
    Ok(())
}
