//! Typed command surface over a [`Transport`], plus the run/event loop.
//!
//! # Run loop
//! `simulator/run` answers either `null` (the run is over) or an object that
//! may carry an `"events"` array. Events are drained in receipt order and
//! handed to the caller's handler when the agent subscribed to that kind.
//! The loop keeps asking `simulator/continue` until a `null` arrives or the
//! handler breaks, in which case the rest of the tick is dropped.

use crate::{
    error::{ClientError, Result},
    events::{EventKind, SimEvent},
    geometry::{Transform, Vector},
    remote::{TcpTransport, Transport},
    types::{AgentState, AgentType, AgentUid, WeatherState},
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::ops::ControlFlow;
use std::time::{Duration, Instant};

/// What the client knows about an agent it spawned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentInfo {
    pub name: String,
    pub agent_type: AgentType,
}

/// Outcome of one [`Simulator::run_until`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Events handed to the handler
    pub events_dispatched: usize,
    /// The handler asked to stop before the simulator finished
    pub stopped_early: bool,
}

/// Connected simulator session.
pub struct Simulator<T: Transport> {
    transport: T,
    agents: HashMap<AgentUid, AgentInfo>,
    subscriptions: HashMap<AgentUid, HashSet<EventKind>>,
    deadline: Option<Instant>,
}

impl Simulator<TcpTransport> {
    /// Open a TCP session to `host:port`.
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let transport = TcpTransport::connect(&format!("{host}:{port}"), timeout)?;
        Ok(Self::new(transport))
    }
}

impl<T: Transport> Simulator<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            agents: HashMap::new(),
            subscriptions: HashMap::new(),
            deadline: None,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Fail every command issued after `deadline` (`None` disarms).
    pub fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = deadline;
        self.transport.set_deadline(deadline);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Issue a raw command.
    pub fn command(&mut self, command: &str, arguments: Value) -> Result<Value> {
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(ClientError::DeadlineExceeded {
                    command: command.to_owned(),
                });
            }
        }
        tracing::trace!(command, %arguments, "simulator command");
        self.transport.request(command, arguments)
    }

    fn query<D: DeserializeOwned>(&mut self, command: &str, arguments: Value) -> Result<D> {
        let value = self.command(command, arguments)?;
        decode(command, value)
    }

    // -----------------------------------------------------------------------
    // Scene and environment
    // -----------------------------------------------------------------------

    /// Name of the loaded scene, `None` before anything was loaded.
    pub fn current_scene(&mut self) -> Result<Option<String>> {
        self.query("simulator/current_scene", json!({}))
    }

    /// Load `scene`; drops every known agent and subscription.
    pub fn load(&mut self, scene: &str, seed: Option<i64>) -> Result<()> {
        self.command("simulator/load_scene", json!({ "scene": scene, "seed": seed }))?;
        self.forget_agents();
        Ok(())
    }

    /// Reset the loaded scene to its initial state.
    pub fn reset(&mut self) -> Result<()> {
        self.command("simulator/reset", json!({}))?;
        self.forget_agents();
        Ok(())
    }

    pub fn set_weather(&mut self, weather: &WeatherState) -> Result<()> {
        self.command(
            "environment/weather/set",
            json!({ "rain": weather.rain, "fog": weather.fog, "wetness": weather.wetness }),
        )?;
        Ok(())
    }

    /// `time` is hours in `[0, 24]`; `fixed` stops the clock from advancing.
    pub fn set_time_of_day(&mut self, time: f64, fixed: bool) -> Result<()> {
        self.command("environment/time/set", json!({ "time": time, "fixed": fixed }))?;
        Ok(())
    }

    /// Designated spawn transforms of the loaded map.
    pub fn get_spawn(&mut self) -> Result<Vec<Transform>> {
        self.query("map/spawn/get", json!({}))
    }

    /// Nearest point on a drivable lane to `point`, oriented along the lane.
    pub fn map_point_on_lane(&mut self, point: Vector) -> Result<Transform> {
        self.query("map/point_on_lane", json!({ "point": point }))
    }

    // -----------------------------------------------------------------------
    // Agents
    // -----------------------------------------------------------------------

    pub fn add_agent(
        &mut self,
        name: &str,
        agent_type: AgentType,
        state: &AgentState,
    ) -> Result<AgentUid> {
        let uid: AgentUid = self.query(
            "simulator/add_agent",
            json!({
                "name": name,
                "type": agent_type.wire_value(),
                "state": state,
                "color": Vector::new(-1.0, -1.0, -1.0),
            }),
        )?;
        self.agents.insert(
            uid.clone(),
            AgentInfo {
                name: name.to_owned(),
                agent_type,
            },
        );
        Ok(uid)
    }

    pub fn agent(&self, uid: &AgentUid) -> Option<&AgentInfo> {
        self.agents.get(uid)
    }

    pub fn agent_name(&self, uid: &AgentUid) -> Option<&str> {
        self.agents.get(uid).map(|a| a.name.as_str())
    }

    pub fn agent_state(&mut self, uid: &AgentUid) -> Result<AgentState> {
        self.query("agent/state/get", json!({ "uid": uid }))
    }

    pub fn set_agent_state(&mut self, uid: &AgentUid, state: &AgentState) -> Result<()> {
        self.command("agent/state/set", json!({ "uid": uid, "state": state }))?;
        Ok(())
    }

    /// Make an NPC drive along the closest lane at up to `max_speed` m/s.
    pub fn follow_closest_lane(
        &mut self,
        uid: &AgentUid,
        follow: bool,
        max_speed: f64,
        lane_change: bool,
    ) -> Result<()> {
        self.command(
            "vehicle/follow_closest_lane",
            json!({
                "uid": uid,
                "follow": follow,
                "max_speed": max_speed,
                "isLaneChange": lane_change,
            }),
        )?;
        Ok(())
    }

    /// Ask an ego vehicle to connect to an autonomy bridge.
    pub fn connect_bridge(&mut self, uid: &AgentUid, host: &str, port: u16) -> Result<()> {
        self.command(
            "vehicle/bridge/connect",
            json!({ "uid": uid, "address": host, "port": port }),
        )?;
        Ok(())
    }

    pub fn bridge_connected(&mut self, uid: &AgentUid) -> Result<bool> {
        self.query("vehicle/bridge/connected", json!({ "uid": uid }))
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// Start receiving `kind` events for `uid` during [`Self::run_until`].
    pub fn subscribe(&mut self, uid: &AgentUid, kind: EventKind) -> Result<()> {
        if let Some(command) = kind.subscribe_command() {
            self.command(command, json!({ "uid": uid }))?;
        }
        self.subscriptions
            .entry(uid.clone())
            .or_default()
            .insert(kind);
        Ok(())
    }

    pub fn on_collision(&mut self, uid: &AgentUid) -> Result<()> {
        self.subscribe(uid, EventKind::Collision)
    }

    pub fn on_waypoint_reached(&mut self, uid: &AgentUid) -> Result<()> {
        self.subscribe(uid, EventKind::WaypointReached)
    }

    pub fn on_lane_change(&mut self, uid: &AgentUid) -> Result<()> {
        self.subscribe(uid, EventKind::LaneChange)
    }

    fn is_subscribed(&self, uid: &AgentUid, kind: EventKind) -> bool {
        self.subscriptions
            .get(uid)
            .is_some_and(|kinds| kinds.contains(&kind))
    }

    fn forget_agents(&mut self) {
        self.agents.clear();
        self.subscriptions.clear();
    }

    /// Run for `time_limit` simulated seconds (0 = until stopped), feeding
    /// subscribed events to `handler` until it breaks.
    pub fn run_until<F>(
        &mut self,
        time_limit: f64,
        time_scale: Option<f64>,
        mut handler: F,
    ) -> Result<RunSummary>
    where
        F: FnMut(&SimEvent) -> ControlFlow<()>,
    {
        let mut summary = RunSummary::default();
        let mut response = self.command(
            "simulator/run",
            json!({ "time_limit": time_limit, "time_scale": time_scale }),
        )?;

        while !response.is_null() {
            if let Some(Value::Array(events)) = response.get_mut("events").map(Value::take) {
                for raw in events {
                    let event: SimEvent = match serde_json::from_value(raw) {
                        Ok(event) => event,
                        Err(e) => {
                            tracing::warn!(error = %e, "skipping unrecognised simulator event");
                            continue;
                        }
                    };
                    if !self.is_subscribed(event.agent(), event.kind()) {
                        continue;
                    }
                    summary.events_dispatched += 1;
                    if handler(&event).is_break() {
                        summary.stopped_early = true;
                        return Ok(summary);
                    }
                }
            }
            response = self.command("simulator/continue", json!({}))?;
        }

        Ok(summary)
    }
}

fn decode<D: DeserializeOwned>(command: &str, value: Value) -> Result<D> {
    serde_json::from_value(value).map_err(|e| ClientError::UnexpectedResult {
        command: command.to_owned(),
        detail: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
