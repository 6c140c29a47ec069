use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A planar pose: position in metres plus heading in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, yaw: f64) -> Self {
        Self { x, y, yaw }
    }

    /// Straight-line distance to another pose (heading ignored).
    pub fn distance_to(&self, other: &Pose) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// One entry of a commanded path.
///
/// `t` is the estimated arrival time; it is only stamped on navigation
/// targets, never on activity-path waypoints. A positive `speed_limit`
/// asks the robot-side controller to cap its approach speed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<DateTime<Utc>>,
    pub level_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_limit: Option<f64>,
}

impl Waypoint {
    /// A waypoint at `pose` on map `level_name`, with no arrival estimate
    /// and no speed limit.
    pub fn at(pose: Pose, level_name: impl Into<String>) -> Self {
        Self {
            x: pose.x,
            y: pose.y,
            yaw: pose.yaw,
            t: None,
            level_name: level_name.into(),
            speed_limit: None,
        }
    }

    pub fn pose(&self) -> Pose {
        Pose::new(self.x, self.y, self.yaw)
    }
}

/// Operating mode reported by a robot.
///
/// `Waiting` means another robot is blocking the path; `AdapterError`
/// means the robot received a plan that made no sense (e.g. a start pose
/// far from its real position). Both invalidate the executing plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotMode {
    Idle,
    Charging,
    Moving,
    Waiting,
    PerformingAction,
    ActionCompleted,
    AdapterError,
}

/// Periodic telemetry published by a robot.
///
/// `task_id` names the command the robot is currently executing; it is
/// empty when the robot is idle and has never been commanded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateReport {
    pub name: String,
    pub pose: Pose,
    /// Map / level the pose is expressed on.
    #[serde(default)]
    pub map_name: String,
    pub mode: RobotMode,
    /// Battery charge as a fraction in `[0, 1]`.
    pub battery: f64,
    /// Waypoints the robot still has to visit.
    pub path: Vec<Waypoint>,
    pub task_id: String,
}

/// Outbound command asking a robot to follow a path.
///
/// A stop command is the degenerate case: the robot's current pose
/// repeated twice. `task_id` is the caller-supplied correlation id
/// rendered as a decimal string on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathRequest {
    pub fleet_name: String,
    pub robot_name: String,
    pub path: Vec<Waypoint>,
    pub task_id: String,
}

/// Outbound command asking a robot to switch operating mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeRequest {
    pub fleet_name: String,
    pub robot_name: String,
    pub mode: RobotMode,
    pub mode_request_id: u64,
    /// Named out-of-band action, e.g. `"attach_cart"`. Empty when the
    /// request is a plain mode switch.
    #[serde(default)]
    pub performing_action: String,
}

/// A named pre-recorded docking path announced on the side channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dock {
    pub name: String,
    pub path: Vec<Waypoint>,
}

/// Docking paths for one fleet, delivered on the dock-summary lane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DockSummary {
    pub fleet_name: String,
    pub docks: Vec<Dock>,
}

/// A named, pre-recorded multi-waypoint route associated with a
/// non-navigation task (docking, charging, teleop hand-off).
///
/// Stored in fleet configuration as bare `[x, y, yaw]` triples; the
/// dispatcher stamps the activity's map name onto every waypoint when it
/// builds the outbound command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityPath {
    pub map_name: String,
    pub path: Vec<[f64; 3]>,
}

/// A raw GPS fix for one robot, parsed out of [`BusPayload::GpsFix`].
///
/// Kept separate from [`StateReport`] because GPS fixes arrive on their
/// own feed with no delivery coupling to state reports.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    pub lat: f64,
    pub lon: f64,
}

/// Unified event wrapper routed over the fleet bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: BusPayload,
}

impl BusEvent {
    pub fn new(payload: BusPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Variants of traffic carried on the fleet bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BusPayload {
    StateReport(StateReport),
    PathRequest(PathRequest),
    ModeRequest(ModeRequest),
    /// "Action execution finished" notice, emitted when a robot reports
    /// [`RobotMode::ActionCompleted`].
    ActionNotice(ModeRequest),
    DockSummary(DockSummary),
    /// Untyped GPS message; the consumer validates the fields and drops
    /// malformed fixes without touching any robot record.
    GpsFix { robot_id: String, data: serde_json::Value },
}

/// Error taxonomy for the fleet bridge.
///
/// None of these are fatal: every write operation fails closed and every
/// per-robot failure is isolated to that robot's record.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FleetError {
    #[error("unknown robot '{0}'")]
    UnknownRobot(String),

    #[error("unknown activity '{0}'")]
    UnknownActivity(String),

    #[error("unknown label '{label}' for activity '{activity}'")]
    UnknownLabel { activity: String, label: String },

    #[error("navigate request carries no destination")]
    EmptyDestination,

    #[error("malformed telemetry: {0}")]
    MalformedTelemetry(String),

    #[error("bus channel error: {0}")]
    Channel(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn robot_mode_uses_snake_case_on_the_wire() {
        assert_eq!(
            serde_json::to_string(&RobotMode::PerformingAction).unwrap(),
            "\"performing_action\""
        );
        assert_eq!(
            serde_json::to_string(&RobotMode::AdapterError).unwrap(),
            "\"adapter_error\""
        );
        let back: RobotMode = serde_json::from_str("\"action_completed\"").unwrap();
        assert_eq!(back, RobotMode::ActionCompleted);
    }

    #[test]
    fn state_report_roundtrip() {
        let report = StateReport {
            name: "tinyrobot1".to_string(),
            pose: Pose::new(10.0, -2.5, 1.57),
            map_name: "L1".to_string(),
            mode: RobotMode::Moving,
            battery: 0.85,
            path: vec![Waypoint::at(Pose::new(12.0, 0.0, 0.0), "L1")],
            task_id: "42".to_string(),
        };
        let json = serde_json::to_string(&report).unwrap();
        let back: StateReport = serde_json::from_str(&json).unwrap();
        assert_eq!(report, back);
    }

    #[test]
    fn path_request_roundtrip() {
        let request = PathRequest {
            fleet_name: "tinyfleet".to_string(),
            robot_name: "tinyrobot1".to_string(),
            path: vec![
                Waypoint::at(Pose::new(0.0, 0.0, 0.0), "L1"),
                Waypoint {
                    speed_limit: Some(0.4),
                    ..Waypoint::at(Pose::new(5.0, 5.0, 0.0), "L1")
                },
            ],
            task_id: "7".to_string(),
        };
        let json = serde_json::to_string(&request).unwrap();
        let back: PathRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(request, back);
    }

    #[test]
    fn waypoint_omits_absent_optionals() {
        let wp = Waypoint::at(Pose::new(1.0, 2.0, 0.0), "L1");
        let json = serde_json::to_string(&wp).unwrap();
        assert!(!json.contains("\"t\""), "unset arrival time must be omitted: {json}");
        assert!(!json.contains("speed_limit"), "unset speed limit must be omitted: {json}");
    }

    #[test]
    fn pose_distance_is_euclidean() {
        let a = Pose::new(0.0, 0.0, 0.0);
        let b = Pose::new(3.0, 4.0, 1.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn fleet_error_display() {
        let err = FleetError::UnknownRobot("ghost".to_string());
        assert!(err.to_string().contains("ghost"));

        let err = FleetError::UnknownLabel {
            activity: "teleop".to_string(),
            label: "pickup".to_string(),
        };
        assert!(err.to_string().contains("teleop"));
        assert!(err.to_string().contains("pickup"));
    }

    #[test]
    fn bus_event_wraps_payload_with_fresh_id() {
        let a = BusEvent::new(BusPayload::DockSummary(DockSummary {
            fleet_name: "tinyfleet".to_string(),
            docks: vec![],
        }));
        let b = BusEvent::new(BusPayload::DockSummary(DockSummary {
            fleet_name: "tinyfleet".to_string(),
            docks: vec![],
        }));
        assert_ne!(a.id, b.id);
    }
}
