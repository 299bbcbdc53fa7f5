//! Simulation events delivered inside `simulator/run` responses.

use crate::geometry::Vector;
use crate::types::AgentUid;
use serde::Deserialize;
use serde_json::Value;

/// One entry of a response's `"events"` array.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    /// `agent` touched `other` (`None` for static obstacles) at `contact`.
    Collision {
        agent: AgentUid,
        #[serde(default)]
        other: Option<AgentUid>,
        #[serde(default)]
        contact: Option<Vector>,
    },
    WaypointReached {
        agent: AgentUid,
        index: usize,
    },
    StopLine {
        agent: AgentUid,
    },
    LaneChange {
        agent: AgentUid,
    },
    Custom {
        agent: AgentUid,
        kind: String,
        #[serde(default)]
        context: Value,
    },
}

impl SimEvent {
    /// Agent the event was raised for.
    pub fn agent(&self) -> &AgentUid {
        match self {
            SimEvent::Collision { agent, .. }
            | SimEvent::WaypointReached { agent, .. }
            | SimEvent::StopLine { agent }
            | SimEvent::LaneChange { agent }
            | SimEvent::Custom { agent, .. } => agent,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            SimEvent::Collision { .. } => EventKind::Collision,
            SimEvent::WaypointReached { .. } => EventKind::WaypointReached,
            SimEvent::StopLine { .. } => EventKind::StopLine,
            SimEvent::LaneChange { .. } => EventKind::LaneChange,
            SimEvent::Custom { .. } => EventKind::Custom,
        }
    }
}

/// Event tag without payload; used for subscriptions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Collision,
    WaypointReached,
    StopLine,
    LaneChange,
    Custom,
}

impl EventKind {
    /// Command that asks the simulator to start reporting this event.
    /// Custom events are always reported and need no registration.
    pub fn subscribe_command(self) -> Option<&'static str> {
        match self {
            EventKind::Collision => Some("agent/on_collision"),
            EventKind::WaypointReached => Some("agent/on_waypoint_reached"),
            EventKind::StopLine => Some("agent/on_stop_line"),
            EventKind::LaneChange => Some("agent/on_lane_change"),
            EventKind::Custom => None,
        }
    }
}
