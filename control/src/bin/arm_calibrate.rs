//! Camera calibration demo over a synthetic camera.
//!
//! Replays frames of a calibration disk on each reference mark, runs the
//! calibration procedure, and persists the fitted warp matrix through the
//! config store — the same flow an operator walks through on the robot.

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;

use control::{run_calibration, REFERENCE_MARKS};
use hardware::ScriptedCamera;
use shared::{ConfigStore, Frame, ImageSize, PixelPoint, WorkspaceFrame};
use vision::{BlobFilters, ColorRange, UndistortionMap};

#[derive(Parser, Debug)]
#[command(author, version, about = "SCARA camera calibration demo")]
struct Args {
    /// Config file to write the fitted warp matrix into
    #[arg(short, long, default_value = "arm_config.txt")]
    config: String,

    /// Pixel offset simulating camera misalignment in the synthetic frames
    #[arg(long, default_value = "10.0")]
    offset: f64,
}

const TARGET_RGB: [u8; 3] = [200, 60, 20];

fn frame_with_disk(size: ImageSize, center: PixelPoint) -> Frame {
    let mut frame = Frame::zeros((size.height, size.width, 3));
    let cx = center.x.round() as i64;
    let cy = center.y.round() as i64;
    for row in (cy - 12)..=(cy + 12) {
        for col in (cx - 12)..=(cx + 12) {
            if row < 0 || col < 0 || row >= size.height as i64 || col >= size.width as i64 {
                continue;
            }
            for ch in 0..3 {
                frame[[row as usize, col as usize, ch]] = TARGET_RGB[ch];
            }
        }
    }
    frame
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let size = ImageSize::from_width_height(640, 480);
    let workspace = WorkspaceFrame::default();

    // Synthetic camera: every marker appears shifted by a fixed offset,
    // which the fitted warp must undo
    let frames: Vec<Frame> = REFERENCE_MARKS
        .iter()
        .map(|&mark| {
            let reference = workspace.to_pixel(mark);
            frame_with_disk(
                size,
                PixelPoint::new(reference.x + args.offset, reference.y + args.offset),
            )
        })
        .collect();
    let mut camera = ScriptedCamera::once(frames, size);

    let warp = match run_calibration(
        &mut camera,
        &UndistortionMap::identity(size),
        &ColorRange::default(),
        &BlobFilters::default(),
        &workspace,
        |index, mark| {
            info!(
                "place calibration disk on point {} at ({:.1}, {:.1})",
                index + 1,
                mark.x,
                mark.y
            );
        },
    ) {
        Ok(warp) => warp,
        Err(e) => bail!("calibration failed: {e}"),
    };

    let store = ConfigStore::new(&args.config);
    let mut config = store
        .load_or_default()
        .with_context(|| format!("loading config from {}", args.config))?;
    config.warp_matrix = Some(warp);
    store
        .save(&config)
        .with_context(|| format!("saving config to {}", args.config))?;
    info!("warp matrix persisted to {}", args.config);

    for &mark in &REFERENCE_MARKS {
        let reference = workspace.to_pixel(mark);
        let observed = PixelPoint::new(reference.x + args.offset, reference.y + args.offset);
        if let Some(corrected) = warp.apply(observed) {
            info!(
                "({:.1}, {:.1}): warp residual ({:+.3}, {:+.3}) px",
                mark.x,
                mark.y,
                corrected.x - reference.x,
                corrected.y - reference.y
            );
        }
    }
    Ok(())
}
