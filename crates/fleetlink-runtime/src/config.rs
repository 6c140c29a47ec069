//! Fleet configuration – reads `fleetlink.toml`.
//!
//! The bridge consumes configuration, it does not own it: the file is
//! written by the deployment, loaded once at startup, and never written
//! back. Environment variables override individual fields for container
//! deployments:
//!
//! | Variable | Config field |
//! |---|---|
//! | `FLEETLINK_FLEET_NAME` | `fleet.name` |
//! | `FLEETLINK_IGNORE_SPEED_LIMIT` | `manager.ignore_speed_limit` |

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use fleetlink_core::{Limits, Profile, VehicleTraits};
use fleetlink_types::ActivityPath;
use serde::{Deserialize, Serialize};

/// Top-level configuration file layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetlinkConfig {
    pub fleet: FleetSection,
    #[serde(default)]
    pub manager: ManagerSection,
}

/// The `[fleet]` section: roster and kinematics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetSection {
    pub name: String,
    /// Robot roster; records are created for exactly these names.
    pub robots: Vec<String>,
    pub limits: LimitsSection,
    pub profile: ProfileSection,
    #[serde(default)]
    pub reversible: bool,
}

/// `(nominal_velocity, nominal_acceleration)` pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsSection {
    pub linear: [f64; 2],
    pub angular: [f64; 2],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSection {
    pub footprint: f64,
    pub vicinity: f64,
}

/// The `[manager]` section: bridge behavior knobs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManagerSection {
    #[serde(default)]
    pub ignore_speed_limit: bool,
    /// Present only for GPS-referenced fleets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_coordinates: Option<ReferenceCoordinates>,
    /// Activity name → label → pre-recorded path.
    #[serde(default)]
    pub action_paths: HashMap<String, HashMap<String, ActivityPath>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceCoordinates {
    /// Planar offset `(x, y)` between the projected frame and the maps.
    pub offset: [f64; 2],
}

impl FleetlinkConfig {
    /// The fleet's kinematic model.
    pub fn vehicle_traits(&self) -> VehicleTraits {
        VehicleTraits {
            linear: Limits {
                nominal_velocity: self.fleet.limits.linear[0],
                nominal_acceleration: self.fleet.limits.linear[1],
            },
            rotational: Limits {
                nominal_velocity: self.fleet.limits.angular[0],
                nominal_acceleration: self.fleet.limits.angular[1],
            },
            profile: Profile {
                footprint: self.fleet.profile.footprint,
                vicinity: self.fleet.profile.vicinity,
            },
            reversible: self.fleet.reversible,
        }
    }

    /// Geodetic reference offset, when the fleet operates in GPS mode.
    pub fn reference_offset(&self) -> Option<(f64, f64)> {
        self.manager
            .reference_coordinates
            .as_ref()
            .map(|r| (r.offset[0], r.offset[1]))
    }

    /// Reject configurations the bridge cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.fleet.robots.is_empty() {
            return Err("fleet.robots must name at least one robot".to_string());
        }
        if self.fleet.limits.linear[0] <= 0.0 || self.fleet.limits.angular[0] <= 0.0 {
            return Err("nominal velocities must be positive".to_string());
        }
        Ok(())
    }
}

/// Load the config from `path`. Returns `None` if the file does not exist.
pub fn load_from(path: &Path) -> Result<Option<FleetlinkConfig>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("failed to read config at {}: {e}", path.display()))?;
    let mut cfg: FleetlinkConfig =
        toml::from_str(&raw).map_err(|e| format!("failed to parse config: {e}"))?;
    apply_env_overrides(&mut cfg);
    cfg.validate()?;
    Ok(Some(cfg))
}

/// Apply `FLEETLINK_*` environment variable overrides to `cfg`.
pub fn apply_env_overrides(cfg: &mut FleetlinkConfig) {
    if let Ok(v) = std::env::var("FLEETLINK_FLEET_NAME") {
        cfg.fleet.name = v;
    }
    if let Ok(v) = std::env::var("FLEETLINK_IGNORE_SPEED_LIMIT")
        && let Ok(flag) = v.parse::<bool>()
    {
        cfg.manager.ignore_speed_limit = flag;
    }
}

/// Save the config to `path`, creating parent directories as needed.
/// Used by deployment tooling and tests; the bridge itself never writes.
pub fn save_to(cfg: &FleetlinkConfig, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("failed to create config directory: {e}"))?;
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("failed to serialize config: {e}"))?;
    fs::write(path, raw).map_err(|e| format!("failed to write config at {}: {e}", path.display()))
}
