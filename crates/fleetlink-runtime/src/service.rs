//! [`FleetService`] – wires the bus, the store, the dispatcher and the
//! reconciler together and exposes the synchronous command/query surface.
//!
//! One service per fleet. Construction spawns the background tasks
//! (reconciler loop, dock-summary fold); dropping the service aborts them.
//! Every public method resolves immediately from local state or publishes
//! a single bus message — nothing here waits for a robot to respond.

use std::collections::HashMap;
use std::sync::Arc;

use fleetlink_core::{
    robot_status, CommandDispatcher, RobotRecordStore, RobotStatus, StateReconciler,
    VehicleTraits,
};
use fleetlink_geo::GeoTransform;
use fleetlink_middleware::{FleetBus, Topic, TopicReceiver};
use fleetlink_types::{ActivityPath, BusEvent, BusPayload, FleetError, Pose, Waypoint};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::FleetlinkConfig;

/// Uniform command acknowledgement envelope.
///
/// Commands are fire-and-forget at the bus level, so `success` means
/// "accepted and dispatched", not "executed by the robot".
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

impl From<Result<(), FleetError>> for ApiResponse {
    fn from(result: Result<(), FleetError>) -> Self {
        match result {
            Ok(()) => Self {
                success: true,
                msg: None,
            },
            Err(e) => Self {
                success: false,
                msg: Some(e.to_string()),
            },
        }
    }
}

type DockTable = Arc<RwLock<HashMap<String, Vec<Waypoint>>>>;

pub struct FleetService {
    fleet_name: String,
    bus: FleetBus,
    store: Arc<RobotRecordStore>,
    dispatcher: CommandDispatcher,
    traits: VehicleTraits,
    reference_offset: Option<(f64, f64)>,
    docks: DockTable,
    tasks: Vec<JoinHandle<()>>,
}

impl FleetService {
    /// Build the service from a validated configuration and spawn its
    /// background tasks on the current tokio runtime.
    pub fn new(cfg: &FleetlinkConfig, bus: FleetBus) -> Self {
        let store = Arc::new(RobotRecordStore::new(cfg.fleet.robots.iter().cloned()));
        let traits = cfg.vehicle_traits();
        let reference_offset = cfg.reference_offset();
        let geo = reference_offset.map(|_| GeoTransform::new());

        let dispatcher = CommandDispatcher::new(
            cfg.fleet.name.clone(),
            bus.clone(),
            Arc::clone(&store),
            traits,
            cfg.manager.action_paths.clone(),
            cfg.manager.ignore_speed_limit,
            reference_offset,
        );

        let reconciler = StateReconciler::new(
            cfg.fleet.name.clone(),
            bus.clone(),
            Arc::clone(&store),
            geo,
        );
        let reports = bus.subscribe_to(Topic::StateReports);
        let fixes = bus.subscribe_to(Topic::GpsFixes);
        let reconciler_task = tokio::spawn(reconciler.run(reports, fixes));

        let docks: DockTable = Arc::new(RwLock::new(HashMap::new()));
        let dock_task = tokio::spawn(fold_dock_summaries(
            cfg.fleet.name.clone(),
            bus.subscribe_to(Topic::DockSummaries),
            Arc::clone(&docks),
        ));

        info!(fleet = %cfg.fleet.name, robots = cfg.fleet.robots.len(), "fleet service started");
        Self {
            fleet_name: cfg.fleet.name.clone(),
            bus,
            store,
            dispatcher,
            traits,
            reference_offset,
            docks,
            tasks: vec![reconciler_task, dock_task],
        }
    }

    pub fn fleet_name(&self) -> &str {
        &self.fleet_name
    }

    pub fn bus(&self) -> &FleetBus {
        &self.bus
    }

    pub fn store(&self) -> &Arc<RobotRecordStore> {
        &self.store
    }

    // ── Queries ──────────────────────────────────────────────────────────

    /// Status of one robot, or of the whole roster when `robot` is `None`.
    ///
    /// Fails closed: asking about a robot that has not yet reported is an
    /// error, not an empty answer, so callers cannot mistake "no data" for
    /// "idle".
    pub async fn status(&self, robot: Option<&str>) -> Result<Vec<RobotStatus>, FleetError> {
        let names = match robot {
            Some(name) => vec![name.to_string()],
            None => {
                let mut names = self.store.names();
                names.sort();
                names
            }
        };

        let mut out = Vec::with_capacity(names.len());
        for name in names {
            let record = self
                .store
                .snapshot(&name)
                .await
                .ok_or_else(|| FleetError::UnknownRobot(name.clone()))?;
            let status = robot_status(&record, &self.traits, self.reference_offset)
                .ok_or_else(|| {
                    FleetError::MalformedTelemetry(format!(
                        "robot '{name}' has not reported state yet"
                    ))
                })?;
            out.push(status);
        }
        Ok(out)
    }

    /// Docking path registered under `dock_name`, if the fleet has
    /// announced one.
    pub async fn dock_path(&self, dock_name: &str) -> Option<Vec<Waypoint>> {
        self.docks.read().await.get(dock_name).cloned()
    }

    /// Pre-recorded activity path registered under `activity` / `label`,
    /// without dispatching it.
    pub fn activity_path(&self, activity: &str, label: &str) -> Option<ActivityPath> {
        self.dispatcher.activity_path(activity, label).cloned()
    }

    // ── Commands ─────────────────────────────────────────────────────────

    /// Dispatch a navigation command. `destination` is the raw
    /// caller-supplied target; a request without one is rejected with
    /// [`FleetError::EmptyDestination`] before anything is published.
    pub async fn navigate(
        &self,
        robot: &str,
        cmd_id: u64,
        destination: Option<Pose>,
        map_name: &str,
        speed_limit: Option<f64>,
    ) -> ApiResponse {
        let Some(destination) = destination else {
            return ApiResponse::from(Err::<(), _>(FleetError::EmptyDestination));
        };
        self.dispatcher
            .navigate(robot, cmd_id, destination, map_name, speed_limit)
            .await
            .into()
    }

    pub async fn stop(&self, robot: &str, cmd_id: u64) -> ApiResponse {
        self.dispatcher.stop(robot, cmd_id).await.into()
    }

    pub async fn start_activity(
        &self,
        robot: &str,
        cmd_id: u64,
        activity: &str,
        label: &str,
    ) -> ApiResponse {
        self.dispatcher
            .run_activity(robot, cmd_id, activity, label)
            .await
            .into()
    }

    /// Suspend or resume staleness checks while an out-of-band action runs.
    pub async fn toggle_action_mode(&self, robot: &str, enabled: bool) -> ApiResponse {
        self.dispatcher.set_action_mode(robot, enabled).await.into()
    }

    pub async fn toggle_attach(&self, robot: &str, cmd_id: u64, toggle: bool) -> ApiResponse {
        self.dispatcher.toggle_attach(robot, cmd_id, toggle).await.into()
    }

    /// Abort the background tasks. Also runs on drop; explicit shutdown
    /// just makes the intent visible at the call site.
    pub fn shutdown(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for FleetService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Fold dock-summary announcements for `fleet_name` into `docks`.
///
/// Each announcement is a full snapshot, so the fold replaces entries
/// rather than merging them. Summaries for other fleets share the lane and
/// are skipped.
async fn fold_dock_summaries(fleet_name: String, mut rx: TopicReceiver, docks: DockTable) {
    while let Some(event) = rx.recv().await {
        let BusEvent {
            payload: BusPayload::DockSummary(summary),
            ..
        } = event
        else {
            debug!("unexpected payload on dock-summary lane");
            continue;
        };
        if summary.fleet_name != fleet_name {
            continue;
        }
        let mut table = docks.write().await;
        for dock in summary.docks {
            table.insert(dock.name, dock.path);
        }
    }
    debug!("dock-summary lane closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        FleetSection, FleetlinkConfig, LimitsSection, ManagerSection, ProfileSection,
    };
    use fleetlink_types::{Dock, DockSummary, RobotMode, StateReport};

    fn config() -> FleetlinkConfig {
        FleetlinkConfig {
            fleet: FleetSection {
                name: "tinyfleet".to_string(),
                robots: vec!["tinyrobot1".to_string(), "tinyrobot2".to_string()],
                limits: LimitsSection {
                    linear: [0.5, 0.75],
                    angular: [0.6, 2.0],
                },
                profile: ProfileSection {
                    footprint: 0.3,
                    vicinity: 0.5,
                },
                reversible: true,
            },
            manager: ManagerSection::default(),
        }
    }

    fn idle_report(name: &str) -> StateReport {
        StateReport {
            name: name.to_string(),
            pose: Pose::new(1.0, 2.0, 0.0),
            map_name: "L1".to_string(),
            mode: RobotMode::Idle,
            battery: 0.9,
            path: vec![],
            task_id: String::new(),
        }
    }

    async fn publish_report(bus: &FleetBus, report: StateReport) {
        bus.publish_to(
            Topic::StateReports,
            BusEvent::new(BusPayload::StateReport(report)),
        )
        .unwrap();
    }

    async fn wait_for_report(service: &FleetService, robot: &str) {
        for _ in 0..50 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            if let Some(record) = service.store().snapshot(robot).await
                && record.reported_state.is_some()
            {
                return;
            }
        }
        panic!("robot '{robot}' never reported");
    }

    #[tokio::test]
    async fn status_fails_closed_before_the_first_report() {
        let service = FleetService::new(&config(), FleetBus::default());
        let result = service.status(Some("tinyrobot1")).await;
        assert!(matches!(result, Err(FleetError::MalformedTelemetry(_))));

        let result = service.status(Some("ghost")).await;
        assert_eq!(result, Err(FleetError::UnknownRobot("ghost".to_string())));
    }

    #[tokio::test]
    async fn status_reflects_bus_reports() {
        let bus = FleetBus::default();
        let service = FleetService::new(&config(), bus.clone());

        publish_report(&bus, idle_report("tinyrobot1")).await;
        publish_report(&bus, idle_report("tinyrobot2")).await;
        wait_for_report(&service, "tinyrobot1").await;
        wait_for_report(&service, "tinyrobot2").await;

        let all = service.status(None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].robot_name, "tinyrobot1");
        assert_eq!(all[1].robot_name, "tinyrobot2");

        let one = service.status(Some("tinyrobot2")).await.unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].position, Pose::new(1.0, 2.0, 0.0));
    }

    #[tokio::test]
    async fn commands_round_trip_through_the_dispatcher() {
        let bus = FleetBus::default();
        let service = FleetService::new(&config(), bus.clone());
        let mut rx = bus.subscribe_to(Topic::PathRequests);

        publish_report(&bus, idle_report("tinyrobot1")).await;
        wait_for_report(&service, "tinyrobot1").await;

        let response = service
            .navigate("tinyrobot1", 5, Some(Pose::new(3.0, 4.0, 0.0)), "L1", None)
            .await;
        assert!(response.success, "{:?}", response.msg);

        let event = tokio::time::timeout(std::time::Duration::from_millis(200), rx.recv())
            .await
            .expect("timed out")
            .expect("lane closed");
        match event.payload {
            BusPayload::PathRequest(request) => assert_eq!(request.task_id, "5"),
            other => panic!("expected PathRequest, got {other:?}"),
        }

        let response = service.stop("ghost", 6).await;
        assert!(!response.success);
        assert!(response.msg.unwrap().contains("ghost"));
    }

    #[tokio::test]
    async fn navigate_without_destination_is_rejected_before_dispatch() {
        let bus = FleetBus::default();
        let service = FleetService::new(&config(), bus.clone());
        let mut rx = bus.subscribe_to(Topic::PathRequests);

        publish_report(&bus, idle_report("tinyrobot1")).await;
        wait_for_report(&service, "tinyrobot1").await;

        let response = service.navigate("tinyrobot1", 7, None, "L1", None).await;
        assert!(!response.success);
        assert!(response.msg.unwrap().contains("no destination"));

        let nothing =
            tokio::time::timeout(std::time::Duration::from_millis(50), rx.recv()).await;
        assert!(nothing.is_err(), "no command may be published");
    }

    #[tokio::test]
    async fn activity_paths_are_readable_without_dispatching() {
        let mut cfg = config();
        cfg.manager.action_paths.insert(
            "dock".to_string(),
            std::collections::HashMap::from([(
                "charger_1".to_string(),
                ActivityPath {
                    map_name: "L2".to_string(),
                    path: vec![[1.0, 1.0, 0.0], [2.0, 2.0, 1.5]],
                },
            )]),
        );
        let bus = FleetBus::default();
        let service = FleetService::new(&cfg, bus.clone());
        let mut rx = bus.subscribe_to(Topic::PathRequests);

        let path = service.activity_path("dock", "charger_1").expect("registered path");
        assert_eq!(path.map_name, "L2");
        assert_eq!(path.path.len(), 2);
        assert!(service.activity_path("dock", "charger_9").is_none());
        assert!(service.activity_path("teleop", "charger_1").is_none());

        let nothing =
            tokio::time::timeout(std::time::Duration::from_millis(50), rx.recv()).await;
        assert!(nothing.is_err(), "a lookup must not publish anything");
    }

    #[tokio::test]
    async fn dock_summaries_fold_into_the_dock_table() {
        let bus = FleetBus::default();
        let service = FleetService::new(&config(), bus.clone());

        let ours = DockSummary {
            fleet_name: "tinyfleet".to_string(),
            docks: vec![Dock {
                name: "charger_1".to_string(),
                path: vec![Waypoint::at(Pose::new(1.0, 1.0, 0.0), "L1")],
            }],
        };
        let theirs = DockSummary {
            fleet_name: "otherfleet".to_string(),
            docks: vec![Dock {
                name: "charger_9".to_string(),
                path: vec![],
            }],
        };
        for summary in [ours, theirs] {
            bus.publish_to(
                Topic::DockSummaries,
                BusEvent::new(BusPayload::DockSummary(summary)),
            )
            .unwrap();
        }

        let mut path = None;
        for _ in 0..50 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            path = service.dock_path("charger_1").await;
            if path.is_some() {
                break;
            }
        }
        assert_eq!(path.unwrap().len(), 1);
        assert!(
            service.dock_path("charger_9").await.is_none(),
            "other fleets' docks must not leak in"
        );
    }

    #[tokio::test]
    async fn api_response_carries_the_error_message() {
        let response: ApiResponse =
            Err::<(), _>(FleetError::UnknownRobot("ghost".to_string())).into();
        assert!(!response.success);
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("ghost"));

        let response: ApiResponse = Ok::<(), FleetError>(()).into();
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"success":true}"#);
    }

    #[tokio::test]
    async fn shutdown_aborts_background_tasks() {
        let mut service = FleetService::new(&config(), FleetBus::default());
        service.shutdown();
        assert!(service.tasks.is_empty());
    }
}
