//! `fleetlink-runtime` – process-level wiring.
//!
//! Loads configuration, initialises logging, and assembles the bus, the
//! record store, the dispatcher and the reconciler into one
//! [`FleetService`] with a synchronous command/query surface.
//!
//! ```no_run
//! use fleetlink_middleware::FleetBus;
//! use fleetlink_runtime::{config, service::FleetService, telemetry};
//!
//! # async fn run() -> Result<(), String> {
//! telemetry::init_tracing();
//! let cfg = config::load_from(std::path::Path::new("fleetlink.toml"))?
//!     .ok_or("missing fleetlink.toml")?;
//! let service = FleetService::new(&cfg, FleetBus::default());
//! # let _ = service;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod service;
pub mod telemetry;

pub use config::FleetlinkConfig;
pub use service::{ApiResponse, FleetService};
