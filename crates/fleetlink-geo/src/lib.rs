//! `fleetlink-geo` – coordinate conversion.
//!
//! A single-purpose crate: project WGS84 geodetic fixes onto the planar
//! frame the fleet bridge reasons in. Inert for fleets that already report
//! planar positions.

pub mod transform;

pub use transform::{GeoTransform, PlanarPosition};
