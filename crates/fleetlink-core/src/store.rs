//! [`RobotRecordStore`] – the authoritative per-robot bookkeeping table.
//!
//! One [`RobotRecord`] per roster entry, created at startup and alive for
//! the process lifetime. The store itself is a pure data holder: it hands
//! out a per-record [`tokio::sync::Mutex`] handle and imposes no further
//! locking discipline. The reconciler and the dispatcher are the only
//! writers; the API layer only reads cloned snapshots. Holding exactly one
//! record's lock across each read-modify-write keeps the record invariants
//! intact while operations on different robots proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use fleetlink_geo::PlanarPosition;
use fleetlink_types::{PathRequest, StateReport, Waypoint};
use tokio::sync::Mutex;

/// Everything the bridge knows about one robot.
///
/// Invariants (enforced by the reconciler/dispatcher critical sections):
///
/// * at most one outstanding command is tracked — `last_command` is
///   replaced, never queued;
/// * `commanded_destination` is `Some` only while a navigation or activity
///   command is outstanding, and becomes `None` exactly when that command
///   completes or is superseded by a stop or a newer command.
#[derive(Debug, Clone)]
pub struct RobotRecord {
    pub name: String,
    /// Last accepted state report; `None` until the robot first reports.
    pub reported_state: Option<StateReport>,
    /// Target of the outstanding navigation/activity command, if any.
    pub commanded_destination: Option<Waypoint>,
    /// The last command sent to this robot, kept verbatim for
    /// retransmission and correlation-id recovery.
    pub last_command: Option<PathRequest>,
    /// Highest correlation id confirmed complete.
    pub last_completed_command: Option<u64>,
    /// `true` while an out-of-band action suspends staleness checks.
    pub action_mode: bool,
    /// Cached planar projection of the robot's latest GPS fix; only
    /// populated for geodetic fleets.
    pub last_known_planar: Option<PlanarPosition>,
}

impl RobotRecord {
    fn new(name: String) -> Self {
        Self {
            name,
            reported_state: None,
            commanded_destination: None,
            last_command: None,
            last_completed_command: None,
            action_mode: false,
            last_known_planar: None,
        }
    }

    /// Whether a report carrying `task_id` describes the outstanding
    /// command. Reports are always expected while no command has been
    /// issued.
    pub fn is_expected_task_id(&self, task_id: &str) -> bool {
        match &self.last_command {
            Some(request) => request.task_id == task_id,
            None => true,
        }
    }
}

/// Immutable-after-startup table of per-robot records.
pub struct RobotRecordStore {
    records: HashMap<String, Arc<Mutex<RobotRecord>>>,
}

impl RobotRecordStore {
    /// Build the table from the fleet roster. Every named robot gets a
    /// fresh record; duplicate names collapse to one.
    pub fn new(roster: impl IntoIterator<Item = String>) -> Self {
        let records = roster
            .into_iter()
            .map(|name| {
                let record = RobotRecord::new(name.clone());
                (name, Arc::new(Mutex::new(record)))
            })
            .collect();
        Self { records }
    }

    /// Handle to one robot's record, or `None` for names outside the
    /// roster.
    pub fn get(&self, name: &str) -> Option<Arc<Mutex<RobotRecord>>> {
        self.records.get(name).cloned()
    }

    /// All roster names, in no particular order.
    pub fn names(&self) -> Vec<String> {
        self.records.keys().cloned().collect()
    }

    /// Non-blocking-ish read: clone the record under its lock.
    pub async fn snapshot(&self, name: &str) -> Option<RobotRecord> {
        let handle = self.records.get(name)?;
        Some(handle.lock().await.clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
