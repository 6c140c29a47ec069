//! Read-side status snapshots for the API layer.
//!
//! Derived entirely from a cloned [`RobotRecord`]; nothing here mutates
//! state or blocks on a lock.

use serde::Serialize;

use crate::estimator::{destination_arrival, ArrivalEstimate};
use crate::store::RobotRecord;
use crate::traits::VehicleTraits;
use fleetlink_types::{Pose, RobotMode};

/// One robot's externally visible state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RobotStatus {
    pub robot_name: String,
    pub map_name: String,
    pub position: Pose,
    pub battery: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_arrival: Option<ArrivalEstimate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_completed_request: Option<u64>,
    /// `true` when the robot's executing plan is no longer valid and the
    /// caller should request a re-dispatch.
    pub replan: bool,
}

/// Whether the reported mode invalidates the executing plan.
///
/// `Waiting` means another robot blocks the path; `AdapterError` means the
/// robot received a plan that made no sense. Either way the caller should
/// replan.
pub fn replan_required(record: &RobotRecord) -> bool {
    matches!(
        record.reported_state.as_ref().map(|s| s.mode),
        Some(RobotMode::Waiting) | Some(RobotMode::AdapterError)
    )
}

/// Build the status view of one robot.
///
/// Returns `None` until the robot's first state report arrives. Geodetic
/// fleets report the cached planar fix as the position (offset left in,
/// matching the frame the caller configured); the arrival estimate removes
/// the offset internally.
pub fn robot_status(
    record: &RobotRecord,
    traits: &VehicleTraits,
    reference_offset: Option<(f64, f64)>,
) -> Option<RobotStatus> {
    let state = record.reported_state.as_ref()?;

    let position = match (reference_offset, record.last_known_planar) {
        (Some(_), Some(planar)) => Pose::new(planar.x, planar.y, state.pose.yaw),
        _ => state.pose,
    };

    Some(RobotStatus {
        robot_name: record.name.clone(),
        map_name: state.map_name.clone(),
        position,
        battery: state.battery,
        destination_arrival: destination_arrival(record, traits, reference_offset),
        last_completed_request: record.last_completed_command,
        replan: replan_required(record),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RobotRecordStore;
    use crate::traits::{Limits, Profile};
    use fleetlink_types::StateReport;

    fn traits() -> VehicleTraits {
        VehicleTraits {
            linear: Limits {
                nominal_velocity: 0.5,
                nominal_acceleration: 0.75,
            },
            rotational: Limits {
                nominal_velocity: 0.6,
                nominal_acceleration: 2.0,
            },
            profile: Profile {
                footprint: 0.3,
                vicinity: 0.5,
            },
            reversible: true,
        }
    }

    fn report(mode: RobotMode) -> StateReport {
        StateReport {
            name: "tinyrobot1".to_string(),
            pose: Pose::new(4.0, 5.0, 0.1),
            map_name: "L1".to_string(),
            mode,
            battery: 0.72,
            path: vec![],
            task_id: String::new(),
        }
    }

    #[tokio::test]
    async fn no_report_means_no_status() {
        let store = RobotRecordStore::new(["tinyrobot1".to_string()]);
        let record = store.snapshot("tinyrobot1").await.unwrap();
        assert!(robot_status(&record, &traits(), None).is_none());
    }

    #[tokio::test]
    async fn uncommanded_robot_has_no_arrival_and_no_replan() {
        let store = RobotRecordStore::new(["tinyrobot1".to_string()]);
        let handle = store.get("tinyrobot1").unwrap();
        handle.lock().await.reported_state = Some(report(RobotMode::Idle));

        let record = store.snapshot("tinyrobot1").await.unwrap();
        let status = robot_status(&record, &traits(), None).unwrap();
        assert!(status.destination_arrival.is_none());
        assert!(status.last_completed_request.is_none());
        assert!(!status.replan);
        assert_eq!(status.map_name, "L1");
        assert_eq!(status.position, Pose::new(4.0, 5.0, 0.1));
        assert!((status.battery - 0.72).abs() < 1e-12);
    }

    #[tokio::test]
    async fn waiting_and_adapter_error_raise_replan() {
        let store = RobotRecordStore::new(["tinyrobot1".to_string()]);
        let handle = store.get("tinyrobot1").unwrap();

        for mode in [RobotMode::Waiting, RobotMode::AdapterError] {
            handle.lock().await.reported_state = Some(report(mode));
            let record = store.snapshot("tinyrobot1").await.unwrap();
            assert!(robot_status(&record, &traits(), None).unwrap().replan, "{mode:?}");
        }

        handle.lock().await.reported_state = Some(report(RobotMode::Moving));
        let record = store.snapshot("tinyrobot1").await.unwrap();
        assert!(!robot_status(&record, &traits(), None).unwrap().replan);
    }

    #[tokio::test]
    async fn status_serializes_without_absent_optionals() {
        let store = RobotRecordStore::new(["tinyrobot1".to_string()]);
        let handle = store.get("tinyrobot1").unwrap();
        handle.lock().await.reported_state = Some(report(RobotMode::Idle));

        let record = store.snapshot("tinyrobot1").await.unwrap();
        let status = robot_status(&record, &traits(), None).unwrap();
        let json = serde_json::to_string(&status).unwrap();
        assert!(!json.contains("destination_arrival"));
        assert!(!json.contains("last_completed_request"));
        assert!(json.contains("\"replan\":false"));
    }
}
