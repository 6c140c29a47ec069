//! `fleetlink-core` – the reconciliation core.
//!
//! Keeps one authoritative view per robot of commanded intent versus
//! observed state, and derives everything the API layer reads from it.
//!
//! # Modules
//!
//! - [`traits`] – fleet-wide kinematic limits and footprint.
//! - [`store`] – per-robot records behind per-record locks.
//! - [`dispatcher`] – intent → outbound command construction.
//! - [`reconciler`] – the staleness / retransmission / completion protocol.
//! - [`estimator`] – on-read arrival estimation.
//! - [`status`] – read-side snapshots.

pub mod dispatcher;
pub mod estimator;
pub mod reconciler;
pub mod status;
pub mod store;
pub mod traits;

pub use dispatcher::{ActivityTable, CommandDispatcher};
pub use estimator::{destination_arrival, ArrivalEstimate};
pub use reconciler::StateReconciler;
pub use status::{replan_required, robot_status, RobotStatus};
pub use store::{RobotRecord, RobotRecordStore};
pub use traits::{Limits, Profile, VehicleTraits};
