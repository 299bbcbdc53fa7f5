//! The persisted scenario: NPC transforms, their types, run and weather info.

use serde::{Deserialize, Serialize};
use sim_client::{Transform, WeatherState};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Replay key
// ---------------------------------------------------------------------------

/// Replay key: an integer in `1..=9999`, written as 4 zero-padded digits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScenarioKey(u16);

impl ScenarioKey {
    pub const FIRST: ScenarioKey = ScenarioKey(1);
    pub const MAX: u16 = 9999;

    pub fn new(value: u32) -> Option<Self> {
        (1..=u32::from(Self::MAX))
            .contains(&value)
            .then_some(ScenarioKey(value as u16))
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for ScenarioKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("replay key must be 4 digits from 0001 to 9999, got {0:?}")]
pub struct InvalidKey(pub String);

impl FromStr for ScenarioKey {
    type Err = InvalidKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidKey(s.to_owned());
        if s.len() != 4 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let value: u32 = s.parse().map_err(|_| invalid())?;
        ScenarioKey::new(value).ok_or_else(invalid)
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// How the scenario was run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunInfo {
    /// Ego vehicle name
    pub vehicle_name: String,
    pub map: String,
    pub seed: i64,
    /// Simulated seconds
    pub runtime: f64,
    pub timescale: f64,
}

/// Environment the scenario was run in.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeatherInfo {
    pub rain: f64,
    pub fog: f64,
    pub wetness: f64,
    /// Hours, `[0, 24]`
    pub time_of_day: f64,
    /// Clock frozen at `time_of_day`
    pub fixed_time: bool,
}

impl WeatherInfo {
    pub fn weather_state(&self) -> WeatherState {
        WeatherState {
            rain: self.rain,
            fog: self.fog,
            wetness: self.wetness,
        }
    }
}

/// One generated scenario. `replayed_states[i]` is the spawn pose of an NPC
/// of type `npc_names[i]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRecord {
    pub replayed_states: Vec<Transform>,
    pub npc_names: Vec<String>,
    pub run_info: RunInfo,
    pub weather_info: WeatherInfo,
}

impl ScenarioRecord {
    pub fn new(run_info: RunInfo, weather_info: WeatherInfo) -> Self {
        Self {
            replayed_states: Vec::new(),
            npc_names: Vec::new(),
            run_info,
            weather_info,
        }
    }

    pub fn push_npc(&mut self, name: impl Into<String>, transform: Transform) {
        self.npc_names.push(name.into());
        self.replayed_states.push(transform);
    }

    /// NPCs in spawn order.
    pub fn npcs(&self) -> impl Iterator<Item = (&str, &Transform)> {
        self.npc_names
            .iter()
            .map(String::as_str)
            .zip(self.replayed_states.iter())
    }

    pub fn len(&self) -> usize {
        self.npc_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.npc_names.is_empty()
    }

    /// Check the name/transform pairing.
    pub fn validate(&self) -> Result<(), String> {
        if self.npc_names.len() != self.replayed_states.len() {
            return Err(format!(
                "{} NPC names but {} transforms",
                self.npc_names.len(),
                self.replayed_states.len()
            ));
        }
        Ok(())
    }
}
