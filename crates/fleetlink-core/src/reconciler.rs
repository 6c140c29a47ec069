//! [`StateReconciler`] – folds the inbound telemetry stream into the
//! robot records.
//!
//! The bus gives no per-command acknowledgement, so the reconciler infers
//! everything from the reports themselves:
//!
//! 1. **Staleness.** A report whose correlation id does not match the
//!    outstanding command describes an out-of-date execution context. The
//!    report is discarded and the outstanding command is republished
//!    verbatim — at-least-once delivery built from nothing but the state
//!    stream. Suspended while the robot's action mode is set.
//! 2. **State update.** Matching reports replace the record's
//!    `reported_state`.
//! 3. **Completion.** `idle`/`charging` + empty remaining path + an
//!    all-digit task id means the command finished. Edge-triggered:
//!    repeated idle reports with the same id do not re-signal.
//! 4. **Action-completed side effect.** An `action_completed` report makes
//!    the reconciler command the robot back to idle and announce the
//!    finished action on the dedicated notice lane.
//!
//! A robot that stops reporting entirely never triggers retransmission;
//! recovery is purely event-driven. That boundary is accepted, not a bug.

use std::sync::Arc;

use fleetlink_geo::GeoTransform;
use fleetlink_middleware::{FleetBus, Topic, TopicReceiver};
use fleetlink_types::{
    BusEvent, BusPayload, FleetError, GpsFix, ModeRequest, RobotMode, StateReport,
};
use tracing::{debug, info, warn};

use crate::store::RobotRecordStore;

/// Correlation id stamped on the fleet-internal "back to idle" command
/// synthesized after an action completes.
const ACTION_COMPLETED_CMD_ID: u64 = 0;

pub struct StateReconciler {
    fleet_name: String,
    bus: FleetBus,
    store: Arc<RobotRecordStore>,
    /// `Some` only for GPS-referenced fleets; planar fleets never touch
    /// the transform.
    geo: Option<GeoTransform>,
}

impl StateReconciler {
    pub fn new(
        fleet_name: impl Into<String>,
        bus: FleetBus,
        store: Arc<RobotRecordStore>,
        geo: Option<GeoTransform>,
    ) -> Self {
        Self {
            fleet_name: fleet_name.into(),
            bus,
            store,
            geo,
        }
    }

    /// Consume the inbound lanes until the bus shuts down.
    ///
    /// Each report is handled under its robot's record lock, so reports
    /// for different robots interleave freely while a single robot's
    /// read-modify-write sequence stays atomic.
    pub async fn run(self, mut reports: TopicReceiver, mut fixes: TopicReceiver) {
        loop {
            tokio::select! {
                event = reports.recv() => {
                    match event {
                        Some(BusEvent { payload: BusPayload::StateReport(report), .. }) => {
                            self.handle_report(report).await;
                        }
                        Some(other) => {
                            debug!(payload = ?other.payload, "unexpected payload on state lane");
                        }
                        None => break,
                    }
                }
                event = fixes.recv() => {
                    match event {
                        Some(BusEvent { payload: BusPayload::GpsFix { robot_id, data }, .. }) => {
                            if let Err(e) = self.handle_gps_fix(&robot_id, &data).await {
                                warn!(robot = %robot_id, error = %e, "dropping GPS fix");
                            }
                        }
                        Some(other) => {
                            debug!(payload = ?other.payload, "unexpected payload on GPS lane");
                        }
                        None => break,
                    }
                }
            }
        }
        info!("reconciler shutting down, bus closed");
    }

    /// Apply the reconciliation protocol to one state report.
    pub async fn handle_report(&self, report: StateReport) {
        let Some(handle) = self.store.get(&report.name) else {
            debug!(robot = %report.name, "report for robot outside the roster");
            return;
        };
        let mut record = handle.lock().await;

        // 1. Staleness: the robot is still executing (or has dropped) an
        // earlier command. Republish the outstanding command in case it
        // was lost; do not let the stale report overwrite current state.
        if !record.action_mode && !record.is_expected_task_id(&report.task_id) {
            if let Some(last) = record.last_command.clone() {
                debug!(
                    robot = %report.name,
                    expected = %last.task_id,
                    reported = %report.task_id,
                    "stale report, republishing outstanding command"
                );
                if let Err(e) = self
                    .bus
                    .publish_to(Topic::PathRequests, BusEvent::new(BusPayload::PathRequest(last)))
                {
                    debug!(error = %e, "retransmission had no transport attached");
                }
            }
            return;
        }

        // 2. The report is current (or an expected action-mode mismatch):
        // accept it.
        let mode = report.mode;
        record.reported_state = Some(report.clone());

        // 3. Completion detection.
        if matches!(mode, RobotMode::Idle | RobotMode::Charging)
            && report.path.is_empty()
            && !report.task_id.is_empty()
            && report.task_id.chars().all(|c| c.is_ascii_digit())
        {
            if let Ok(completed) = report.task_id.parse::<u64>() {
                record.commanded_destination = None;
                if record.last_completed_command != Some(completed) {
                    info!(robot = %report.name, cmd_id = completed, "command completed");
                    record.last_completed_command = Some(completed);
                }
            }
        }

        // 4. Action finished: command the robot back to idle and announce
        // the finished action. A side effect of observation, not of any
        // API call.
        if mode == RobotMode::ActionCompleted {
            info!(robot = %report.name, "robot completed performing its action");
            let request = ModeRequest {
                fleet_name: self.fleet_name.clone(),
                robot_name: report.name.clone(),
                mode: RobotMode::Idle,
                mode_request_id: ACTION_COMPLETED_CMD_ID,
                performing_action: String::new(),
            };
            if let Err(e) = self.bus.publish_to(
                Topic::ActionNotices,
                BusEvent::new(BusPayload::ActionNotice(request.clone())),
            ) {
                debug!(error = %e, "action notice had no subscribers");
            }
            if let Err(e) = self
                .bus
                .publish_to(Topic::ModeRequests, BusEvent::new(BusPayload::ModeRequest(request)))
            {
                debug!(error = %e, "idle request had no transport attached");
            }
        }
    }

    /// Project one raw GPS fix and cache the planar position on the
    /// robot's record.
    ///
    /// Malformed fixes fail with [`FleetError::MalformedTelemetry`] and
    /// leave the record untouched; reconciliation continues for
    /// subsequent messages.
    pub async fn handle_gps_fix(
        &self,
        robot_id: &str,
        data: &serde_json::Value,
    ) -> Result<(), FleetError> {
        let Some(geo) = &self.geo else {
            debug!(robot = %robot_id, "GPS fix on a planar fleet, ignoring");
            return Ok(());
        };
        let handle = self
            .store
            .get(robot_id)
            .ok_or_else(|| FleetError::UnknownRobot(robot_id.to_string()))?;

        let fix: GpsFix = serde_json::from_value(data.clone())
            .map_err(|e| FleetError::MalformedTelemetry(e.to_string()))?;

        handle.lock().await.last_known_planar = Some(geo.to_planar(fix.lat, fix.lon));
        Ok(())
    }
}
