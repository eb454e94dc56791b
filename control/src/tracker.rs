//! Autonomous target-tracking loop.
//!
//! Polls perception at a fixed cadence, decides whether the target moved
//! enough to act, resolves the two-way inverse kinematics ambiguity in
//! favor of continuity with the previous pose, and commands the arm.
//! Every exit path releases motor power on both joints before returning.

use std::time::Duration;

use crossbeam_channel::{Receiver, TryRecvError};
use thiserror::Error;

use hardware::ArmInterface;
use kinematics::{ArmGeometry, IkSolutions};
use shared::{DeviceError, FrameSource, Joint, JointAngles, JointLimits, PhysicalPoint};
use vision::PerceptionContext;

/// Tracking loop state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    /// Waiting for a command
    Idle,
    /// Continuous autonomous operation
    Tracking {
        /// Cycles completed since entry
        cycles: u64,
    },
    /// Loop exited; arm depowered
    Terminated,
}

/// Tunable loop parameters.
#[derive(Debug, Clone, Copy)]
pub struct TrackerConfig {
    /// Minimum per-axis movement (workspace units) before the arm reacts.
    ///
    /// Both axes must exceed it: the loop is intentionally insensitive to
    /// sub-threshold jitter on either axis alone.
    pub move_threshold: f64,
    /// Pause between cycles, bounding camera and actuator load
    pub cycle_pause: Duration,
    /// Mechanical ranges used to validate IK solutions before commanding
    pub limits: JointLimits,
    /// Arm link lengths
    pub geometry: ArmGeometry,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            move_threshold: 0.1,
            cycle_pause: Duration::from_millis(200),
            limits: JointLimits::default(),
            geometry: ArmGeometry::default(),
        }
    }
}

/// Mutable per-loop state: the last commanded pose and last accepted
/// observation. Owned exclusively by the tracker, mutated once per
/// accepted cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlState {
    /// Last commanded joint angles
    pub commanded: JointAngles,
    /// Last accepted target coordinate
    pub accepted: PhysicalPoint,
}

impl ControlState {
    /// Neutral pose at the workspace origin; the loop entry state.
    pub fn neutral() -> Self {
        Self {
            commanded: JointAngles::neutral(),
            accepted: PhysicalPoint::new(0.0, 0.0),
        }
    }
}

/// Outcome of a single tracking cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CycleOutcome {
    /// No qualifying target in the frame
    NoTarget,
    /// Target moved less than the threshold on at least one axis
    Jitter,
    /// Target visible but no admissible joint solution this cycle
    NoSolution,
    /// Arm commanded to a new pose
    Commanded(JointAngles),
}

/// Fatal tracking loop failures.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Camera or actuator failure; the depower sequence has already run
    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// The closed-loop tracker: camera in, joint commands out.
pub struct TargetTracker<C: FrameSource, A: ArmInterface> {
    camera: C,
    arm: A,
    perception: PerceptionContext,
    config: TrackerConfig,
    state: TrackerState,
    control: ControlState,
}

impl<C: FrameSource, A: ArmInterface> TargetTracker<C, A> {
    /// Create an idle tracker.
    pub fn new(camera: C, arm: A, perception: PerceptionContext, config: TrackerConfig) -> Self {
        Self {
            camera,
            arm,
            perception,
            config,
            state: TrackerState::Idle,
            control: ControlState::neutral(),
        }
    }

    /// Current state machine state.
    pub fn state(&self) -> TrackerState {
        self.state
    }

    /// Current control state.
    pub fn control_state(&self) -> ControlState {
        self.control
    }

    /// Release the arm for reuse after the loop has terminated.
    pub fn into_arm(self) -> A {
        self.arm
    }

    /// Run until cancelled or a device fails.
    ///
    /// Control state resets to neutral on entry. Cancellation is observed
    /// at cycle boundaries only: any message on `cancel` (or a dropped
    /// sender) stops the loop. On every exit path, including device
    /// errors, both joints are depowered before this returns.
    pub fn run(&mut self, cancel: &Receiver<()>) -> Result<(), TrackerError> {
        self.control = ControlState::neutral();
        self.state = TrackerState::Tracking { cycles: 0 };
        log::info!("tracking started");

        let outcome = self.run_inner(cancel);
        let depower = self.depower();
        self.state = TrackerState::Terminated;
        log::info!("tracking terminated");

        match (outcome, depower) {
            (Err(e), _) => Err(e),
            (Ok(()), Err(e)) => Err(TrackerError::Device(e)),
            (Ok(()), Ok(())) => Ok(()),
        }
    }

    fn run_inner(&mut self, cancel: &Receiver<()>) -> Result<(), TrackerError> {
        loop {
            std::thread::sleep(self.config.cycle_pause);
            match cancel.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => return Ok(()),
                Err(TryRecvError::Empty) => {}
            }
            match self.step()? {
                CycleOutcome::NoTarget => log::trace!("no target this cycle"),
                CycleOutcome::Jitter => log::trace!("target within jitter threshold"),
                CycleOutcome::NoSolution => {}
                CycleOutcome::Commanded(angles) => {
                    log::info!(
                        "commanded shoulder {:.2}°, elbow {:.2}°",
                        angles.shoulder,
                        angles.elbow
                    );
                }
            }
        }
    }

    /// Execute one tracking cycle (without the inter-cycle pause).
    pub fn step(&mut self) -> Result<CycleOutcome, TrackerError> {
        let frame = self.camera.capture()?;
        let outcome = self.act_on(self.perception.locate(&frame))?;
        if let TrackerState::Tracking { cycles } = &mut self.state {
            *cycles += 1;
        }
        Ok(outcome)
    }

    fn act_on(&mut self, observation: Option<PhysicalPoint>) -> Result<CycleOutcome, TrackerError> {
        let Some(target) = observation else {
            return Ok(CycleOutcome::NoTarget);
        };

        let dx = (target.x - self.control.accepted.x).abs();
        let dy = (target.y - self.control.accepted.y).abs();
        if dx < self.config.move_threshold || dy < self.config.move_threshold {
            return Ok(CycleOutcome::Jitter);
        }

        let solutions = match kinematics::solve(target.x, target.y, &self.config.geometry) {
            Ok(solutions) => solutions,
            Err(e) => {
                log::error!("target ({:.2}, {:.2}) rejected: {e}", target.x, target.y);
                return Ok(CycleOutcome::NoSolution);
            }
        };

        // Prefer the solution continuing from the previous shoulder angle;
        // fall back to the alternate if the preferred pose is mechanically
        // inadmissible.
        let ordered = order_by_continuity(&solutions, self.control.commanded.shoulder);
        let chosen = ordered
            .into_iter()
            .find(|angles| self.config.limits.check(angles).is_ok());
        let Some(angles) = chosen else {
            log::error!(
                "no admissible pose for ({:.2}, {:.2}); holding position",
                target.x,
                target.y
            );
            return Ok(CycleOutcome::NoSolution);
        };

        self.arm.set_angle(Joint::Shoulder, Some(angles.shoulder))?;
        self.arm.set_angle(Joint::Elbow, Some(angles.elbow))?;
        self.control = ControlState {
            commanded: angles,
            accepted: target,
        };
        Ok(CycleOutcome::Commanded(angles))
    }

    /// Release motor power on both joints.
    fn depower(&mut self) -> Result<(), DeviceError> {
        let shoulder = self.arm.set_angle(Joint::Shoulder, None);
        let elbow = self.arm.set_angle(Joint::Elbow, None);
        shoulder.and(elbow)
    }
}

/// Order the two IK solutions by shoulder-angle distance from the
/// previously commanded shoulder angle.
pub fn order_by_continuity(solutions: &IkSolutions, previous_shoulder: f64) -> [JointAngles; 2] {
    let [first, second] = solutions.as_array();
    if (first.shoulder - previous_shoulder).abs() <= (second.shoulder - previous_shoulder).abs() {
        [first, second]
    } else {
        [second, first]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn solutions(shoulder_a: f64, shoulder_b: f64) -> IkSolutions {
        IkSolutions {
            elbow_down: JointAngles::new(shoulder_a, -40.0),
            elbow_up: JointAngles::new(shoulder_b, 40.0),
        }
    }

    #[test]
    fn continuity_prefers_nearby_shoulder() {
        let ordered = order_by_continuity(&solutions(12.0, 170.0), 10.0);
        assert_relative_eq!(ordered[0].shoulder, 12.0);
        assert_relative_eq!(ordered[1].shoulder, 170.0);
    }

    #[test]
    fn continuity_prefers_nearby_shoulder_reversed() {
        let ordered = order_by_continuity(&solutions(170.0, 12.0), 10.0);
        assert_relative_eq!(ordered[0].shoulder, 12.0);
    }

    #[test]
    fn continuity_tie_keeps_solution_order() {
        // Equidistant shoulders: the elbow-down solution stays first
        let ordered = order_by_continuity(&solutions(-5.0, 25.0), 10.0);
        assert_relative_eq!(ordered[0].shoulder, -5.0);
        assert_relative_eq!(ordered[0].elbow, -40.0);
    }
}
