//! Agent identifiers and state shared across the workspace.

use crate::geometry::{Transform, Vector};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Opaque agent handle assigned by the simulator on `simulator/add_agent`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentUid(pub String);

impl fmt::Display for AgentUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentUid {
    fn from(s: &str) -> Self {
        AgentUid(s.to_owned())
    }
}

/// Kind of agent to spawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentType {
    /// Vehicle under test
    Ego,
    /// Simulator-driven traffic vehicle
    Npc,
    Pedestrian,
}

impl AgentType {
    /// Integer code the simulator expects in `simulator/add_agent`.
    pub fn wire_value(self) -> u8 {
        match self {
            AgentType::Ego => 1,
            AgentType::Npc => 2,
            AgentType::Pedestrian => 3,
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Kinematic state of one agent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub transform: Transform,
    #[serde(default)]
    pub velocity: Vector,
    #[serde(default)]
    pub angular_velocity: Vector,
}

impl AgentState {
    /// A stationary agent at `transform`.
    pub fn at(transform: Transform) -> Self {
        Self {
            transform,
            ..Default::default()
        }
    }

    pub fn position(&self) -> Vector {
        self.transform.position
    }

    /// Scalar speed (m/s)
    pub fn speed(&self) -> f64 {
        self.velocity.magnitude()
    }
}

/// Precipitation and visibility, each in `[0, 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherState {
    pub rain: f64,
    pub fog: f64,
    pub wetness: f64,
}
