//! `fleetlink-middleware` – the bus layer.
//!
//! Routes asynchronous traffic between the reconciliation core and the
//! external messaging transport without caring about its meaning.
//!
//! # Modules
//!
//! - [`bus`] – typed, topic-based publish/subscribe bus built on Tokio
//!   broadcast channels.
//! - [`adapter`] – the [`FleetTransport`][adapter::FleetTransport] seam and
//!   the pump that binds a transport to the bus.

pub mod adapter;
pub mod bus;

pub use adapter::{bind_transport, FleetTransport};
pub use bus::{FleetBus, Topic, TopicReceiver};
