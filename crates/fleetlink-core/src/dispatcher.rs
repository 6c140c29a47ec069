//! [`CommandDispatcher`] – turns high-level intents into outbound commands.
//!
//! Every operation resolves the target robot in the
//! [`RobotRecordStore`][crate::store::RobotRecordStore], builds a
//! [`PathRequest`] or [`ModeRequest`] and publishes it on the fleet bus.
//! Publishes are fire-and-forget: the bus gives no delivery
//! acknowledgement, so success means "accepted for transmission", not
//! "received by the robot". Each operation replaces — never accumulates —
//! the record's outstanding-command state, which makes redispatching the
//! same intent idempotent.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use fleetlink_middleware::{FleetBus, Topic};
use fleetlink_types::{
    ActivityPath, BusEvent, BusPayload, FleetError, ModeRequest, PathRequest, Pose, RobotMode,
    Waypoint,
};
use tracing::{debug, info};

use crate::store::RobotRecordStore;
use crate::traits::VehicleTraits;

/// Activity table: activity name → label → path.
pub type ActivityTable = HashMap<String, HashMap<String, ActivityPath>>;

pub struct CommandDispatcher {
    fleet_name: String,
    bus: FleetBus,
    store: Arc<RobotRecordStore>,
    traits: VehicleTraits,
    activities: ActivityTable,
    /// When set, caller-supplied speed limits are discarded.
    ignore_speed_limit: bool,
    /// Geodetic reference offset `(x, y)`; subtracted from navigation
    /// targets on GPS-referenced fleets.
    reference_offset: Option<(f64, f64)>,
}

impl CommandDispatcher {
    pub fn new(
        fleet_name: impl Into<String>,
        bus: FleetBus,
        store: Arc<RobotRecordStore>,
        traits: VehicleTraits,
        activities: ActivityTable,
        ignore_speed_limit: bool,
        reference_offset: Option<(f64, f64)>,
    ) -> Self {
        Self {
            fleet_name: fleet_name.into(),
            bus,
            store,
            traits,
            activities,
            ignore_speed_limit,
            reference_offset,
        }
    }

    /// Command `robot` to drive to `destination` on `map_name`.
    ///
    /// Builds a two-waypoint path — current pose, then the target stamped
    /// with an arrival-time estimate — and records it as the outstanding
    /// command. The estimate truncates the travel and turn terms to whole
    /// seconds independently; the turn term uses the absolute-value
    /// heading difference `| |cur| - |target| |`.
    pub async fn navigate(
        &self,
        robot: &str,
        cmd_id: u64,
        destination: Pose,
        map_name: &str,
        speed_limit: Option<f64>,
    ) -> Result<(), FleetError> {
        let handle = self
            .store
            .get(robot)
            .ok_or_else(|| FleetError::UnknownRobot(robot.to_string()))?;
        let mut record = handle.lock().await;

        let state = record
            .reported_state
            .as_ref()
            .ok_or_else(|| FleetError::MalformedTelemetry(format!("robot '{robot}' has not reported state yet")))?;
        let current = state.pose;
        let current_map = state.map_name.clone();

        let mut target = destination;
        if let Some((ox, oy)) = self.reference_offset {
            target.x -= ox;
            target.y -= oy;
        }

        let speed_limit = if self.ignore_speed_limit {
            None
        } else {
            // Non-positive overrides are meaningless; treat as absent.
            speed_limit.filter(|limit| *limit > 0.0)
        };

        let travel = self.traits.travel_time(current.distance_to(&target));
        let turn = self
            .traits
            .turn_time((current.yaw.abs() - target.yaw.abs()).abs());
        let duration_secs = travel.trunc() as i64 + turn.trunc() as i64;

        let target_waypoint = Waypoint {
            x: target.x,
            y: target.y,
            yaw: target.yaw,
            t: Some(Utc::now() + chrono::Duration::seconds(duration_secs)),
            level_name: map_name.to_string(),
            speed_limit,
        };

        let request = PathRequest {
            fleet_name: self.fleet_name.clone(),
            robot_name: robot.to_string(),
            path: vec![Waypoint::at(current, current_map), target_waypoint.clone()],
            task_id: cmd_id.to_string(),
        };

        info!(robot, cmd_id, "dispatching navigate request");
        self.publish_path(request.clone());
        record.last_command = Some(request);
        record.commanded_destination = Some(target_waypoint);
        Ok(())
    }

    /// Command `robot` to hold position.
    ///
    /// The current pose appended twice is a degenerate path with zero
    /// displacement, which the robot-side controller reads as "stop". The
    /// stop request becomes the outstanding command so that staleness
    /// tracking follows it; any previous destination is cleared.
    pub async fn stop(&self, robot: &str, cmd_id: u64) -> Result<(), FleetError> {
        let handle = self
            .store
            .get(robot)
            .ok_or_else(|| FleetError::UnknownRobot(robot.to_string()))?;
        let mut record = handle.lock().await;

        let state = record
            .reported_state
            .as_ref()
            .ok_or_else(|| FleetError::MalformedTelemetry(format!("robot '{robot}' has not reported state yet")))?;
        let here = Waypoint::at(state.pose, state.map_name.clone());

        let request = PathRequest {
            fleet_name: self.fleet_name.clone(),
            robot_name: robot.to_string(),
            path: vec![here.clone(), here],
            task_id: cmd_id.to_string(),
        };

        info!(robot, cmd_id, "dispatching stop request");
        self.publish_path(request.clone());
        record.last_command = Some(request);
        record.commanded_destination = None;
        Ok(())
    }

    /// Command `robot` to run the pre-recorded path registered under
    /// `activity` / `label`.
    ///
    /// The robot's current pose is prepended so the controller starts from
    /// where the robot actually is; the final waypoint of the activity
    /// path becomes the commanded destination.
    pub async fn run_activity(
        &self,
        robot: &str,
        cmd_id: u64,
        activity: &str,
        label: &str,
    ) -> Result<(), FleetError> {
        let labels = self
            .activities
            .get(activity)
            .ok_or_else(|| FleetError::UnknownActivity(activity.to_string()))?;
        let activity_path = labels.get(label).ok_or_else(|| FleetError::UnknownLabel {
            activity: activity.to_string(),
            label: label.to_string(),
        })?;

        let handle = self
            .store
            .get(robot)
            .ok_or_else(|| FleetError::UnknownRobot(robot.to_string()))?;
        let mut record = handle.lock().await;

        let state = record
            .reported_state
            .as_ref()
            .ok_or_else(|| FleetError::MalformedTelemetry(format!("robot '{robot}' has not reported state yet")))?;

        let mut path = vec![Waypoint::at(state.pose, state.map_name.clone())];
        for [x, y, yaw] in &activity_path.path {
            path.push(Waypoint::at(
                Pose::new(*x, *y, *yaw),
                activity_path.map_name.clone(),
            ));
        }
        // The path always has at least the prepended current pose; an
        // empty activity path degrades to a hold-position command.
        let destination = path.last().cloned();

        let request = PathRequest {
            fleet_name: self.fleet_name.clone(),
            robot_name: robot.to_string(),
            path,
            task_id: cmd_id.to_string(),
        };

        info!(robot, cmd_id, activity, label, "dispatching activity request");
        self.publish_path(request.clone());
        record.last_command = Some(request);
        record.commanded_destination = destination;
        Ok(())
    }

    /// Look up the pre-recorded path registered under `activity` /
    /// `label` without dispatching anything.
    pub fn activity_path(&self, activity: &str, label: &str) -> Option<&ActivityPath> {
        self.activities.get(activity)?.get(label)
    }

    /// Suspend (or resume) staleness checks for `robot` while an
    /// out-of-band action is in progress.
    pub async fn set_action_mode(&self, robot: &str, enabled: bool) -> Result<(), FleetError> {
        let handle = self
            .store
            .get(robot)
            .ok_or_else(|| FleetError::UnknownRobot(robot.to_string()))?;
        handle.lock().await.action_mode = enabled;
        debug!(robot, enabled, "action mode toggled");
        Ok(())
    }

    /// Publish a mode-change command without touching any path state.
    pub async fn set_operating_mode(
        &self,
        robot: &str,
        cmd_id: u64,
        mode: RobotMode,
        action_label: &str,
    ) -> Result<(), FleetError> {
        if self.store.get(robot).is_none() {
            return Err(FleetError::UnknownRobot(robot.to_string()));
        }
        let request = self.make_mode_request(robot, cmd_id, mode, action_label);
        info!(robot, cmd_id, ?mode, action_label, "dispatching mode request");
        self.publish_mode(request);
        Ok(())
    }

    /// Ask `robot` to attach (`toggle = true`) or detach (`toggle =
    /// false`) its cart. Exactly one mode command is published either way.
    pub async fn toggle_attach(
        &self,
        robot: &str,
        cmd_id: u64,
        toggle: bool,
    ) -> Result<(), FleetError> {
        let action = if toggle { "attach_cart" } else { "detach_cart" };
        self.set_operating_mode(robot, cmd_id, RobotMode::PerformingAction, action)
            .await
    }

    fn make_mode_request(
        &self,
        robot: &str,
        cmd_id: u64,
        mode: RobotMode,
        action_label: &str,
    ) -> ModeRequest {
        ModeRequest {
            fleet_name: self.fleet_name.clone(),
            robot_name: robot.to_string(),
            mode,
            mode_request_id: cmd_id,
            performing_action: action_label.to_string(),
        }
    }

    fn publish_path(&self, request: PathRequest) {
        if let Err(e) = self
            .bus
            .publish_to(Topic::PathRequests, BusEvent::new(BusPayload::PathRequest(request)))
        {
            // Fire-and-forget: an unattached transport is not a caller error.
            debug!(error = %e, "path request published with no transport attached");
        }
    }

    fn publish_mode(&self, request: ModeRequest) {
        if let Err(e) = self
            .bus
            .publish_to(Topic::ModeRequests, BusEvent::new(BusPayload::ModeRequest(request)))
        {
            debug!(error = %e, "mode request published with no transport attached");
        }
    }
}
