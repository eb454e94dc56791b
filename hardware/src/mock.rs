//! Mock devices for tests and demos.

use std::collections::VecDeque;

use shared::{DeviceError, Frame, FrameSource, ImageSize, Joint};

use crate::arm_interface::ArmInterface;

/// A frame source that replays a prepared sequence of frames.
#[derive(Debug, Clone)]
pub struct ScriptedCamera {
    frames: VecDeque<Frame>,
    resolution: ImageSize,
    /// When set, the script restarts from the beginning once exhausted;
    /// otherwise an exhausted script reports a device error.
    cycle: bool,
}

impl ScriptedCamera {
    /// Play the frames once; further captures fail with a device error.
    pub fn once(frames: Vec<Frame>, resolution: ImageSize) -> Self {
        Self {
            frames: frames.into(),
            resolution,
            cycle: false,
        }
    }

    /// Play the frames in an endless cycle.
    pub fn cycle(frames: Vec<Frame>, resolution: ImageSize) -> Self {
        assert!(!frames.is_empty(), "cycling camera needs at least one frame");
        Self {
            frames: frames.into(),
            resolution,
            cycle: true,
        }
    }

    /// Frames remaining in the current pass.
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for ScriptedCamera {
    fn capture(&mut self) -> Result<Frame, DeviceError> {
        let frame = self
            .frames
            .pop_front()
            .ok_or_else(|| DeviceError::new("frame script exhausted"))?;
        if self.cycle {
            self.frames.push_back(frame.clone());
        }
        Ok(frame)
    }

    fn resolution(&self) -> ImageSize {
        self.resolution
    }
}

/// One recorded actuation command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArmCommand {
    /// Addressed joint
    pub joint: Joint,
    /// Commanded angle, `None` for depower
    pub angle: Option<f64>,
}

/// An arm that records every command it receives.
#[derive(Debug, Default)]
pub struct RecordingArm {
    /// All commands, in order of receipt
    pub commands: Vec<ArmCommand>,
    /// When set, the command at this index (zero-based) fails
    pub fail_at: Option<usize>,
}

impl RecordingArm {
    /// A recording arm that never fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands addressed to one joint.
    pub fn commands_for(&self, joint: Joint) -> Vec<ArmCommand> {
        self.commands
            .iter()
            .copied()
            .filter(|c| c.joint == joint)
            .collect()
    }

    /// The last commanded angle per joint, if any command was received.
    pub fn last_angle(&self, joint: Joint) -> Option<Option<f64>> {
        self.commands_for(joint).last().map(|c| c.angle)
    }
}

impl ArmInterface for RecordingArm {
    fn set_angle(&mut self, joint: Joint, angle: Option<f64>) -> Result<(), DeviceError> {
        if self.fail_at == Some(self.commands.len()) {
            return Err(DeviceError::new("injected actuator fault"));
        }
        self.commands.push(ArmCommand { joint, angle });
        Ok(())
    }
}
