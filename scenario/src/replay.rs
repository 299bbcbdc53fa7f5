//! Deterministic replay of a stored scenario.
//!
//! The stored seed, weather and NPC transforms are re-applied as recorded.
//! A collision only ends the run; nothing is written back to the store.

use crate::{
    config::ScenarioConfig,
    error::ScenarioError,
    record::ScenarioKey,
    session::{self, Outcome},
    store::ScenarioStore,
};
use sim_client::{AgentState, AgentType, AgentUid, Simulator, Transport};
use std::fmt;

/// Result of a replay.
#[derive(Clone, Debug)]
pub struct ReplayReport {
    pub key: ScenarioKey,
    pub outcome: Outcome,
    /// NPCs re-spawned from the record
    pub npc_count: usize,
}

impl fmt::Display for ReplayReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\n Replayed Key: {} ({} NPCs)",
            self.outcome, self.key, self.npc_count
        )
    }
}

pub struct ScenarioReplayer {
    config: ScenarioConfig,
}

impl ScenarioReplayer {
    pub fn new(config: ScenarioConfig) -> Self {
        Self { config }
    }

    pub fn replay<T: Transport>(
        &self,
        sim: &mut Simulator<T>,
        store: &ScenarioStore,
        key: ScenarioKey,
    ) -> Result<ReplayReport, ScenarioError> {
        let record = store.read(key)?;
        let run = &record.run_info;
        tracing::info!(
            %key,
            vehicle = %run.vehicle_name,
            map = %run.map,
            seed = run.seed,
            npcs = record.len(),
            "replaying scenario"
        );

        session::prepare_scene(sim, &run.map, run.seed, &record.weather_info)?;
        let (ego, _) = session::spawn_ego(sim, &run.vehicle_name, &self.config)?;
        sim.on_collision(&ego)?;

        let mut npcs: Vec<AgentUid> = Vec::with_capacity(record.len());
        for (name, transform) in record.npcs() {
            let uid = sim.add_agent(name, AgentType::Npc, &AgentState::at(*transform))?;
            sim.follow_closest_lane(&uid, true, self.config.npc_max_speed, true)?;
            tracing::debug!(name, uid = %uid, at = %transform.position, "npc re-spawned");
            npcs.push(uid);
        }

        let outcome = session::run_until_collision(sim, run.runtime, run.timescale)?;
        tracing::info!(%key, "{outcome}");
        Ok(ReplayReport {
            key,
            outcome,
            npc_count: npcs.len(),
        })
    }
}
