//! Steps shared by generation and replay: scene setup, ego spawn, bridge
//! wait, and the collision-terminated run.

use crate::{config::ScenarioConfig, error::ScenarioError, record::WeatherInfo};
use sim_client::{
    AgentState, AgentType, AgentUid, ClientError, SimEvent, Simulator, Transform, Transport,
    Vector,
};
use std::fmt;
use std::ops::ControlFlow;
use std::time::Instant;

/// Label used for the ego vehicle in collision messages.
pub const EGO_LABEL: &str = "Ego";
/// Label used when the ego hits something that is not an agent.
pub const OBSTACLE_LABEL: &str = "OBSTACLE";

/// How a run ended.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// The ego touched `other`; the run was halted on the spot.
    Collision {
        agent: String,
        other: String,
        contact: Option<Vector>,
    },
    /// The full runtime elapsed without a collision.
    Completed,
}

impl Outcome {
    pub fn is_collision(&self) -> bool {
        matches!(self, Outcome::Collision { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Collision {
                agent,
                other,
                contact: Some(contact),
            } => write!(f, "{agent} collided with {other} at {contact}"),
            Outcome::Collision {
                agent,
                other,
                contact: None,
            } => {
                write!(f, "{agent} collided with {other} at unknown point")
            }
            Outcome::Completed => f.write_str("Simulation ended with no collisions"),
        }
    }
}

/// Reset the map if it is already loaded, load it otherwise, then apply
/// weather and time of day.
pub fn prepare_scene<T: Transport>(
    sim: &mut Simulator<T>,
    map: &str,
    seed: i64,
    weather: &WeatherInfo,
) -> Result<(), ScenarioError> {
    if sim.current_scene()?.as_deref() == Some(map) {
        tracing::debug!(map, "scene already loaded, resetting");
        sim.reset()?;
    } else {
        tracing::info!(map, seed, "loading scene");
        sim.load(map, Some(seed))?;
    }
    sim.set_weather(&weather.weather_state())?;
    sim.set_time_of_day(weather.time_of_day, weather.fixed_time)?;
    Ok(())
}

/// Spawn the ego at the map's first spawn point and, if configured, wait for
/// its autonomy bridge.
pub fn spawn_ego<T: Transport>(
    sim: &mut Simulator<T>,
    vehicle: &str,
    config: &ScenarioConfig,
) -> Result<(AgentUid, Transform), ScenarioError> {
    let spawn = sim
        .get_spawn()?
        .into_iter()
        .next()
        .ok_or_else(|| ScenarioError::NotFound("map has no spawn points".into()))?;

    let ego = match sim.add_agent(vehicle, AgentType::Ego, &AgentState::at(spawn)) {
        Ok(uid) => uid,
        Err(ClientError::Remote { message, .. }) => {
            tracing::warn!(vehicle, %message, "simulator rejected ego vehicle");
            return Err(ScenarioError::VehicleNotFound(vehicle.to_owned()));
        }
        Err(e) => return Err(e.into()),
    };
    tracing::info!(vehicle, uid = %ego, at = %spawn.position, "ego spawned");

    if let Some(bridge) = &config.bridge {
        sim.connect_bridge(&ego, &bridge.host, bridge.port)?;
        tracing::info!(host = %bridge.host, port = bridge.port, "waiting for bridge");
        let give_up = Instant::now() + bridge.timeout;
        while !sim.bridge_connected(&ego)? {
            if Instant::now() >= give_up {
                return Err(ScenarioError::Connectivity(format!(
                    "bridge {}:{} not connected after {:?}",
                    bridge.host, bridge.port, bridge.timeout
                )));
            }
            std::thread::sleep(bridge.poll_interval);
        }
        tracing::info!("bridge connected");
    }

    Ok((ego, spawn))
}

/// Run for `runtime` seconds, stopping at the first collision reported for a
/// subscribed agent.
pub fn run_until_collision<T: Transport>(
    sim: &mut Simulator<T>,
    runtime: f64,
    timescale: f64,
) -> Result<Outcome, ScenarioError> {
    let mut hit = None;
    let summary = sim.run_until(runtime, Some(timescale), |event| match event {
        SimEvent::Collision {
            agent,
            other,
            contact,
        } => {
            hit = Some((agent.clone(), other.clone(), *contact));
            ControlFlow::Break(())
        }
        _ => ControlFlow::Continue(()),
    })?;
    tracing::debug!(events = summary.events_dispatched, "run finished");

    Ok(match hit {
        Some((agent, other, contact)) => Outcome::Collision {
            agent: describe(sim, &agent),
            other: other
                .map(|uid| describe(sim, &uid))
                .unwrap_or_else(|| OBSTACLE_LABEL.to_owned()),
            contact,
        },
        None => Outcome::Completed,
    })
}

/// "Ego" for the ego, the vehicle type for NPCs, the raw uid otherwise.
pub fn describe<T: Transport>(sim: &Simulator<T>, uid: &AgentUid) -> String {
    match sim.agent(uid) {
        Some(info) if info.agent_type == AgentType::Ego => EGO_LABEL.to_owned(),
        Some(info) => info.name.clone(),
        None => uid.to_string(),
    }
}
