//! Arrival estimation – pure functions over a [`RobotRecord`] snapshot.
//!
//! Nothing here is cached: estimates are recomputed on every read from the
//! record's current contents and the fleet's kinematic limits.

use serde::Serialize;

use crate::store::RobotRecord;
use crate::traits::VehicleTraits;

/// Estimated time until the outstanding command's destination is reached.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ArrivalEstimate {
    /// Correlation id of the outstanding command.
    pub cmd_id: u64,
    /// Estimated remaining duration in seconds.
    pub duration: f64,
}

/// Estimate arrival at the commanded destination.
///
/// Returns `None` when the robot has no outstanding destination, has never
/// reported state, or the outstanding command's id is not numeric.
///
/// The heading term folds `|cur_yaw| - |dest_yaw|` into `[-π, π]` by
/// subtracting or adding `2π` once. The absolute-value difference is not a
/// true shortest-arc delta and can under- or over-estimate rotation for
/// mixed-sign headings; the behavior is kept exactly as the robots in the
/// field expect it.
pub fn destination_arrival(
    record: &RobotRecord,
    traits: &VehicleTraits,
    reference_offset: Option<(f64, f64)>,
) -> Option<ArrivalEstimate> {
    let state = record.reported_state.as_ref()?;
    let destination = record.commanded_destination.as_ref()?;
    let last_command = record.last_command.as_ref()?;
    let cmd_id: u64 = last_command.task_id.parse().ok()?;

    // Geodetic fleets measure from the cached planar fix with the
    // reference offset removed; planar fleets from the reported pose.
    let (x, y) = match (reference_offset, record.last_known_planar) {
        (Some((ox, oy)), Some(planar)) => (planar.x - ox, planar.y - oy),
        _ => (state.pose.x, state.pose.y),
    };
    let yaw = state.pose.yaw;

    let distance = ((x - destination.x).powi(2) + (y - destination.y).powi(2)).sqrt();

    let mut delta = (yaw.abs() - destination.yaw.abs()).abs();
    if delta > std::f64::consts::PI {
        delta -= 2.0 * std::f64::consts::PI;
    }
    if delta < -std::f64::consts::PI {
        delta += 2.0 * std::f64::consts::PI;
    }

    Some(ArrivalEstimate {
        cmd_id,
        duration: traits.travel_time(distance) + traits.turn_time(delta),
    })
}
