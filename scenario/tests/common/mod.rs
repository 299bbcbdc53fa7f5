//! In-process stand-in for the simulator.
//!
//! The map is a single straight road along the x axis (z = 0) spanning
//! `|x| <= lane_half_length`. Lane projection clamps x and zeroes y/z; every
//! lane point faces +x. The ego spawn is the origin.

#![allow(dead_code)]

use serde_json::{json, Value};
use sim_client::{ClientError, Result, Transform, Transport, Vector};
use std::collections::HashSet;
use std::thread;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub struct Spawned {
    pub uid: String,
    pub name: String,
    /// Wire agent type (1 ego, 2 npc)
    pub agent_type: u64,
    pub transform: Transform,
}

pub struct FakeSim {
    pub lane_half_length: f64,
    /// Ego vehicles the simulator knows about
    pub known_vehicles: HashSet<String>,
    /// Report a collision between the ego and the first NPC on `simulator/run`
    pub collide_with_first_npc: bool,
    /// Bridge reports connected after this many polls; `None` never connects
    pub bridge_after_polls: Option<usize>,
    /// Sleep inside every lane query
    pub lane_query_delay: Duration,
    /// Projection keeps the query's z plus this offset instead of snapping to z = 0
    pub lane_drift: Option<f64>,

    pub scene: Option<String>,
    pub loads: Vec<(String, Option<i64>)>,
    pub commands: Vec<String>,
    /// Agents alive in the current scene
    pub agents: Vec<Spawned>,
    /// Every agent ever spawned
    pub spawned: Vec<Spawned>,
    pub weather: Option<Value>,
    next_uid: usize,
    bridge_polls: usize,
}

pub const EGO_VEHICLE: &str = "Lincoln2017MKZ (Apollo 5.0)";
pub const MAP: &str = "BorregasAve";

impl FakeSim {
    pub fn new() -> Self {
        Self {
            lane_half_length: 600.0,
            known_vehicles: [EGO_VEHICLE.to_owned()].into_iter().collect(),
            collide_with_first_npc: false,
            bridge_after_polls: Some(0),
            lane_query_delay: Duration::ZERO,
            lane_drift: None,
            scene: None,
            loads: Vec::new(),
            commands: Vec::new(),
            agents: Vec::new(),
            spawned: Vec::new(),
            weather: None,
            next_uid: 0,
            bridge_polls: 0,
        }
    }

    pub fn count(&self, command: &str) -> usize {
        self.commands.iter().filter(|c| *c == command).count()
    }

    /// NPCs spawned so far, as (type name, transform).
    pub fn npc_spawns(&self) -> Vec<(String, Transform)> {
        self.spawned
            .iter()
            .filter(|a| a.agent_type == 2)
            .map(|a| (a.name.clone(), a.transform))
            .collect()
    }

    fn lane_transform(&self, point: Vector) -> Transform {
        let x = point.x.clamp(-self.lane_half_length, self.lane_half_length);
        let z = self.lane_drift.map_or(0.0, |d| point.z + d);
        Transform::new(Vector::new(x, 0.0, z), Vector::new(0.0, 90.0, 0.0))
    }

    fn ego_uid(&self) -> Option<&str> {
        self.agents
            .iter()
            .find(|a| a.agent_type == 1)
            .map(|a| a.uid.as_str())
    }

    fn remote(command: &str, message: &str) -> ClientError {
        ClientError::Remote {
            command: command.to_owned(),
            message: message.to_owned(),
        }
    }
}

impl Transport for FakeSim {
    fn request(&mut self, command: &str, arguments: Value) -> Result<Value> {
        self.commands.push(command.to_owned());
        match command {
            "simulator/current_scene" => Ok(json!(self.scene)),
            "simulator/load_scene" => {
                let scene = arguments["scene"].as_str().unwrap_or_default().to_owned();
                self.loads.push((scene.clone(), arguments["seed"].as_i64()));
                self.scene = Some(scene);
                self.agents.clear();
                Ok(Value::Null)
            }
            "simulator/reset" => {
                self.agents.clear();
                Ok(Value::Null)
            }
            "environment/weather/set" => {
                self.weather = Some(arguments);
                Ok(Value::Null)
            }
            "environment/time/set" | "agent/on_collision" | "vehicle/follow_closest_lane"
            | "vehicle/bridge/connect" => Ok(Value::Null),
            "map/spawn/get" => Ok(json!([Transform::new(
                Vector::ZERO,
                Vector::new(0.0, 90.0, 0.0)
            )])),
            "map/point_on_lane" => {
                thread::sleep(self.lane_query_delay);
                let point: Vector = serde_json::from_value(arguments["point"].clone())?;
                Ok(json!(self.lane_transform(point)))
            }
            "simulator/add_agent" => {
                let name = arguments["name"].as_str().unwrap_or_default().to_owned();
                let agent_type = arguments["type"].as_u64().unwrap_or_default();
                if agent_type == 1 && !self.known_vehicles.contains(&name) {
                    return Err(Self::remote(command, "vehicle not found"));
                }
                let transform: Transform =
                    serde_json::from_value(arguments["state"]["transform"].clone())?;
                self.next_uid += 1;
                let agent = Spawned {
                    uid: format!("agent-{}", self.next_uid),
                    name,
                    agent_type,
                    transform,
                };
                self.agents.push(agent.clone());
                self.spawned.push(agent.clone());
                Ok(json!(agent.uid))
            }
            "vehicle/bridge/connected" => {
                self.bridge_polls += 1;
                Ok(json!(self
                    .bridge_after_polls
                    .is_some_and(|n| self.bridge_polls > n)))
            }
            "simulator/run" => {
                let npc = self.agents.iter().find(|a| a.agent_type == 2);
                match (self.collide_with_first_npc, self.ego_uid(), npc) {
                    (true, Some(ego), Some(npc)) => Ok(json!({"events": [
                        {"type": "lane_change", "agent": npc.uid},
                        {
                            "type": "collision",
                            "agent": ego,
                            "other": npc.uid,
                            "contact": npc.transform.position,
                        },
                    ]})),
                    _ => Ok(json!({"events": []})),
                }
            }
            "simulator/continue" => Ok(Value::Null),
            other => Err(Self::remote(other, "unknown command")),
        }
    }
}
