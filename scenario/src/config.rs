//! Runtime configuration: environment lookup and tunables.

use crate::error::ScenarioError;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SIMULATOR_HOST: &str = "127.0.0.1";
pub const DEFAULT_SIMULATOR_PORT: u16 = 8181;
pub const DEFAULT_BRIDGE_PORT: u16 = 9090;

/// Vehicle types NPCs are drawn from when the caller names none.
pub const DEFAULT_VEHICLE_POOL: [&str; 6] =
    ["Sedan", "SUV", "Jeep", "Hatchback", "SchoolBus", "BoxTruck"];

/// Inclusive range a generated seed is drawn from.
pub const SEED_MIN: i64 = -2_147_483_649;
pub const SEED_MAX: i64 = 2_147_483_647;

// ---------------------------------------------------------------------------
// Bridge
// ---------------------------------------------------------------------------

/// Where the ego vehicle's autonomy bridge listens, and how long to wait for it.
#[derive(Clone, Debug, PartialEq)]
pub struct BridgeConfig {
    pub host: String,
    pub port: u16,
    /// Give up (connectivity error) if not connected after this long
    pub timeout: Duration,
    /// Delay between `vehicle/bridge/connected` polls
    pub poll_interval: Duration,
}

impl BridgeConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(1),
        }
    }
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// Connection settings taken from the process environment.
///
/// | variable             | default      |
/// |----------------------|--------------|
/// | `SIMULATOR_HOST`     | `127.0.0.1`  |
/// | `SIMULATOR_PORT`     | `8181`       |
/// | `BRIDGE_HOST`        | unset (no bridge) |
/// | `BRIDGE_PORT`        | `9090`       |
/// | `SCENARIO_STORE_DIR` | `<tmp>/or`   |
#[derive(Clone, Debug, PartialEq)]
pub struct EnvConfig {
    pub simulator_host: String,
    pub simulator_port: u16,
    pub bridge: Option<BridgeConfig>,
    pub store_dir: Option<PathBuf>,
}

impl EnvConfig {
    pub fn from_env() -> Result<Self, ScenarioError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup (used by tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ScenarioError> {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let simulator_host =
            non_empty("SIMULATOR_HOST").unwrap_or_else(|| DEFAULT_SIMULATOR_HOST.to_owned());
        let simulator_port = match non_empty("SIMULATOR_PORT") {
            Some(raw) => parse_port("SIMULATOR_PORT", &raw)?,
            None => DEFAULT_SIMULATOR_PORT,
        };

        let bridge = match non_empty("BRIDGE_HOST") {
            Some(host) => {
                let port = match non_empty("BRIDGE_PORT") {
                    Some(raw) => parse_port("BRIDGE_PORT", &raw)?,
                    None => DEFAULT_BRIDGE_PORT,
                };
                Some(BridgeConfig::new(host, port))
            }
            None => None,
        };

        Ok(Self {
            simulator_host,
            simulator_port,
            bridge,
            store_dir: non_empty("SCENARIO_STORE_DIR").map(PathBuf::from),
        })
    }
}

fn parse_port(name: &str, raw: &str) -> Result<u16, ScenarioError> {
    match raw.trim().parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(ScenarioError::Configuration(format!(
            "{name} must be a port in 1..=65535, got {raw:?}"
        ))),
    }
}

/// Parse a user-supplied seed. Blank means "pick one at random".
pub fn parse_seed(raw: &str) -> Result<Option<i64>, ScenarioError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    match raw.parse::<i64>() {
        Ok(seed) if (SEED_MIN..=SEED_MAX).contains(&seed) => Ok(Some(seed)),
        _ => Err(ScenarioError::Configuration(format!(
            "seed must be an integer in {SEED_MIN}..={SEED_MAX}, got {raw:?}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Tunables
// ---------------------------------------------------------------------------

/// Knobs shared by the generator and the replayer.
#[derive(Clone, Debug)]
pub struct ScenarioConfig {
    /// Cruise speed given to every NPC following its lane (m/s)
    pub npc_max_speed: f64,
    /// Watchdog = grace + requested runtime
    pub watchdog_grace: Duration,
    /// Vehicle types that need the widened gap
    pub long_vehicle_types: Vec<String>,
    /// Gap multiplier when a long vehicle is involved
    pub long_gap_factor: f64,
    /// Backward shifts tried before a candidate spot is abandoned
    pub max_shift_attempts: u32,
    /// Max summed per-axis distance between a spot and its lane projection
    pub off_lane_tolerance: f64,
    /// Placement attempts allowed per requested NPC
    pub max_attempts_per_npc: usize,
    /// Optional autonomy bridge for the ego vehicle
    pub bridge: Option<BridgeConfig>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            npc_max_speed: 11.1, // ~40 km/h
            watchdog_grace: Duration::from_secs(15),
            long_vehicle_types: vec!["SchoolBus".into(), "BoxTruck".into()],
            long_gap_factor: 2.5,
            max_shift_attempts: 10,
            off_lane_tolerance: 3.0,
            max_attempts_per_npc: 10,
            bridge: None,
        }
    }
}
