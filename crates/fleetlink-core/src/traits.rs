//! [`VehicleTraits`] – the fleet-wide kinematic model.
//!
//! One immutable record per fleet: velocity/acceleration limits plus the
//! footprint profile. The limits feed the travel-time maths; the profile
//! radii exist only so that planner-facing configuration stays in one
//! place — nothing in the bridge reads them for arrival estimates.

use serde::{Deserialize, Serialize};

/// A `(nominal_velocity, nominal_acceleration)` limit pair.
///
/// Linear limits are in m/s and m/s²; rotational limits in rad/s and
/// rad/s².
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Limits {
    pub nominal_velocity: f64,
    pub nominal_acceleration: f64,
}

/// Circular footprint radii used by upstream planners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Physical footprint radius (metres).
    pub footprint: f64,
    /// Vicinity radius other robots should keep clear of (metres).
    pub vicinity: f64,
}

/// Immutable per-fleet kinematic limits and geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VehicleTraits {
    pub linear: Limits,
    pub rotational: Limits,
    pub profile: Profile,
    /// Whether the drive train can reverse.
    pub reversible: bool,
}

impl VehicleTraits {
    /// Seconds to cover `distance` metres at nominal linear velocity.
    ///
    /// No acceleration ramp is modelled.
    pub fn travel_time(&self, distance: f64) -> f64 {
        distance / self.linear.nominal_velocity
    }

    /// Seconds to rotate through `angle_delta` radians at nominal angular
    /// velocity. The sign of the input carries through.
    pub fn turn_time(&self, angle_delta: f64) -> f64 {
        angle_delta / self.rotational.nominal_velocity
    }
}
