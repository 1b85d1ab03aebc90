//! Wheel and steer joint dead reckoning

use crate::types::Timestamp;
use serde::Serialize;
use std::f64::consts::PI;

/// Joint names, in state order
pub const JOINT_NAMES: [&str; 6] = [
    "wheel_fl", "wheel_fr", "wheel_rl", "wheel_rr", "steer_fl", "steer_fr",
];

const STEER_FL: usize = 4;
const STEER_FR: usize = 5;

/// Updates further apart than this are not integrated
const MAX_INTEGRATION_STEP_S: f64 = 0.5;

/// Vehicle geometry for the Ackermann steer angles
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AckermannGeometry {
    pub wheelbase: f64,
    pub track: f64,
    pub steering_ratio: f64,
}

impl AckermannGeometry {
    /// Left and right road wheel angles for a steering wheel angle (rad)
    pub fn steer_angles(&self, steering_wheel_angle: f64) -> (f64, f64) {
        let l = self.wheelbase;
        let w = self.track;
        // Straight ahead gives an infinite radius and zero angles
        let r = l / (steering_wheel_angle / self.steering_ratio).tan();
        ((l / (r - w / 2.0)).atan(), (l / (r + w / 2.0)).atan())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JointSample {
    pub name: &'static str,
    pub position: f64,
    pub velocity: f64,
}

/// Snapshot of all joints
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JointState {
    pub timestamp: Timestamp,
    pub joints: Vec<JointSample>,
}

impl JointState {
    pub fn joint(&self, name: &str) -> Option<&JointSample> {
        self.joints.iter().find(|j| j.name == name)
    }
}

/// Integrates wheel rotation and tracks steer angles
#[derive(Debug, Clone)]
pub struct JointAccumulator {
    geometry: AckermannGeometry,
    position: [f64; 6],
    velocity: [f64; 6],
    last_stamp: Option<Timestamp>,
}

impl JointAccumulator {
    pub fn new(geometry: AckermannGeometry) -> Self {
        Self {
            geometry,
            position: [0.0; 6],
            velocity: [0.0; 6],
            last_stamp: None,
        }
    }

    /// New wheel angular speeds (rad/s, FL FR RL RR)
    pub fn update_wheels(&mut self, stamp: Timestamp, speeds: [f64; 4]) -> JointState {
        self.velocity[..4].copy_from_slice(&speeds);
        self.advance(stamp)
    }

    /// New steering wheel angle (rad)
    pub fn update_steering(&mut self, stamp: Timestamp, steering_wheel_angle: f64) -> JointState {
        let (left, right) = self.geometry.steer_angles(steering_wheel_angle);
        self.position[STEER_FL] = left;
        self.position[STEER_FR] = right;
        self.advance(stamp)
    }

    fn advance(&mut self, stamp: Timestamp) -> JointState {
        let dt = self
            .last_stamp
            .and_then(|last| (stamp - last).num_nanoseconds())
            .map(|ns| ns as f64 * 1e-9);

        match dt {
            Some(dt) if (0.0..MAX_INTEGRATION_STEP_S).contains(&dt) => {
                for i in 0..4 {
                    self.position[i] = (self.position[i] + dt * self.velocity[i]) % (2.0 * PI);
                }
            }
            Some(dt) => log::debug!("Joint update gap of {:.3}s, not integrating", dt),
            None => {}
        }

        self.last_stamp = Some(stamp);
        self.snapshot(stamp)
    }

    fn snapshot(&self, stamp: Timestamp) -> JointState {
        JointState {
            timestamp: stamp,
            joints: JOINT_NAMES
                .iter()
                .enumerate()
                .map(|(i, &name)| JointSample {
                    name,
                    position: self.position[i],
                    velocity: self.velocity[i],
                })
                .collect(),
        }
    }
}
