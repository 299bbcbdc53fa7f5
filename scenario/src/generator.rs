//! Procedural scenario generation.
//!
//! # Flow
//! 1. Validate the request, pick the seed, seed the placement RNG
//! 2. Load/reset the map, apply weather, spawn the ego (+ bridge wait)
//! 3. Arm the watchdog (grace + runtime)
//! 4. Place NPCs on the sampling ring around the ego spawn
//! 5. Run until collision or runtime, persist the record, report
//!
//! The watchdog is disarmed on every exit path.

use crate::{
    config::{ScenarioConfig, DEFAULT_VEHICLE_POOL, SEED_MAX, SEED_MIN},
    error::ScenarioError,
    placement::{is_long_vehicle, is_on_lane, ring_point, PlacedVehicle, SpacingParams, SpacingRules},
    record::{RunInfo, ScenarioKey, ScenarioRecord, WeatherInfo},
    session::{self, Outcome},
    store::ScenarioStore,
};
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sim_client::{AgentState, AgentType, Simulator, Transform, Transport};
use std::f64::consts::PI;
use std::fmt;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Weather for a generated run. `None` fields are drawn at random and the
/// drawn value is recorded.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WeatherParams {
    pub rain: Option<f64>,
    pub fog: Option<f64>,
    pub wetness: Option<f64>,
    /// Hours, `[0, 24]`
    pub time_of_day: Option<f64>,
    pub fixed_time: bool,
}

impl WeatherParams {
    /// Fully specified weather (nothing random).
    pub fn fixed(rain: f64, fog: f64, wetness: f64, time_of_day: f64) -> Self {
        Self {
            rain: Some(rain),
            fog: Some(fog),
            wetness: Some(wetness),
            time_of_day: Some(time_of_day),
            fixed_time: true,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [("rain", self.rain), ("fog", self.fog), ("wetness", self.wetness)] {
            if let Some(v) = value {
                if !(0.0..=1.0).contains(&v) {
                    return Err(format!("{name} must be in [0, 1], got {v}"));
                }
            }
        }
        if let Some(t) = self.time_of_day {
            if !(0.0..=24.0).contains(&t) {
                return Err(format!("time_of_day must be in [0, 24], got {t}"));
            }
        }
        Ok(())
    }

    pub fn resolve(&self, rng: &mut impl Rng) -> WeatherInfo {
        let mut draw = |given: Option<f64>, max: f64| -> f64 {
            match given {
                Some(v) => v,
                None => round2(rng.gen_range(0.0..=max)),
            }
        };
        WeatherInfo {
            rain: draw(self.rain, 1.0),
            fog: draw(self.fog, 1.0),
            wetness: draw(self.wetness, 1.0),
            time_of_day: draw(self.time_of_day, 24.0),
            fixed_time: self.fixed_time,
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Everything needed to generate one scenario.
#[derive(Clone, Debug)]
pub struct GenerateRequest {
    /// Ego vehicle, as registered with the simulator
    pub vehicle_name: String,
    pub npc_count: usize,
    pub map: String,
    /// Simulated seconds
    pub runtime: f64,
    pub timescale: f64,
    /// `None` picks one in `SEED_MIN..=SEED_MAX`
    pub seed: Option<i64>,
    pub spacing: SpacingParams,
    /// NPC types to draw from, uniformly
    pub vehicle_pool: Vec<String>,
    pub weather: WeatherParams,
}

impl GenerateRequest {
    pub fn new(vehicle_name: impl Into<String>, map: impl Into<String>, npc_count: usize) -> Self {
        Self {
            vehicle_name: vehicle_name.into(),
            npc_count,
            map: map.into(),
            runtime: 30.0,
            timescale: 1.0,
            seed: None,
            spacing: SpacingParams::default(),
            vehicle_pool: DEFAULT_VEHICLE_POOL.iter().map(|s| s.to_string()).collect(),
            weather: WeatherParams::default(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.vehicle_name.trim().is_empty() {
            return Err("vehicle name is empty".into());
        }
        if self.map.trim().is_empty() {
            return Err("map name is empty".into());
        }
        if !(self.runtime.is_finite() && self.runtime > 0.0) {
            return Err(format!("runtime must be positive, got {}", self.runtime));
        }
        if Duration::try_from_secs_f64(self.runtime).is_err() {
            return Err(format!("runtime {} s is out of range", self.runtime));
        }
        if !(self.timescale.is_finite() && self.timescale > 0.0) {
            return Err(format!("timescale must be positive, got {}", self.timescale));
        }
        if let Some(seed) = self.seed {
            if !(SEED_MIN..=SEED_MAX).contains(&seed) {
                return Err(format!("seed must be in {SEED_MIN}..={SEED_MAX}, got {seed}"));
            }
        }
        if self.npc_count > 0 && self.vehicle_pool.is_empty() {
            return Err("vehicle pool is empty".into());
        }
        self.spacing.validate()?;
        self.weather.validate()
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Result of a successful generation (collision or not).
#[derive(Clone, Debug)]
pub struct GenerationReport {
    pub seed: i64,
    pub key: ScenarioKey,
    pub outcome: Outcome,
    /// What was persisted under `key`
    pub record: ScenarioRecord,
}

impl fmt::Display for GenerationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\n Seed: {}\n Replay Key: {}",
            self.outcome, self.seed, self.key
        )
    }
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

pub struct ScenarioGenerator {
    config: ScenarioConfig,
}

impl ScenarioGenerator {
    pub fn new(config: ScenarioConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    /// Generate, run and persist one scenario.
    pub fn generate<T: Transport>(
        &self,
        sim: &mut Simulator<T>,
        store: &ScenarioStore,
        request: &GenerateRequest,
    ) -> Result<GenerationReport, ScenarioError> {
        request.validate().map_err(ScenarioError::Configuration)?;

        let seed = request
            .seed
            .unwrap_or_else(|| rand::thread_rng().gen_range(SEED_MIN..=SEED_MAX));
        let mut rng = ChaCha8Rng::seed_from_u64(seed as u64);
        let weather = request.weather.resolve(&mut rng);
        tracing::info!(
            vehicle = %request.vehicle_name,
            map = %request.map,
            npcs = request.npc_count,
            seed,
            "generating scenario"
        );

        let result = self.run(sim, store, request, seed, weather, &mut rng);
        sim.set_deadline(None);
        result
    }

    fn run<T: Transport>(
        &self,
        sim: &mut Simulator<T>,
        store: &ScenarioStore,
        request: &GenerateRequest,
        seed: i64,
        weather: WeatherInfo,
        rng: &mut ChaCha8Rng,
    ) -> Result<GenerationReport, ScenarioError> {
        session::prepare_scene(sim, &request.map, seed, &weather)?;
        let (ego, spawn) = session::spawn_ego(sim, &request.vehicle_name, &self.config)?;
        sim.on_collision(&ego)?;

        let deadline = Duration::try_from_secs_f64(request.runtime)
            .ok()
            .and_then(|runtime| self.config.watchdog_grace.checked_add(runtime))
            .and_then(|watchdog| Instant::now().checked_add(watchdog))
            .ok_or_else(|| {
                ScenarioError::Configuration(format!(
                    "runtime {} s does not fit a watchdog deadline",
                    request.runtime
                ))
            })?;
        sim.set_deadline(Some(deadline));

        let mut record = ScenarioRecord::new(
            RunInfo {
                vehicle_name: request.vehicle_name.clone(),
                map: request.map.clone(),
                seed,
                runtime: request.runtime,
                timescale: request.timescale,
            },
            weather,
        );
        let ego_long = is_long_vehicle(&request.vehicle_name, &self.config.long_vehicle_types);
        self.place_npcs(sim, request, spawn, ego_long, rng, &mut record)?;

        let outcome = session::run_until_collision(sim, request.runtime, request.timescale)?;
        sim.set_deadline(None);
        let key = store.write(&record)?;

        match &outcome {
            Outcome::Collision { .. } => tracing::warn!(%key, "{outcome}"),
            Outcome::Completed => tracing::info!(%key, "{outcome}"),
        }
        Ok(GenerationReport {
            seed,
            key,
            outcome,
            record,
        })
    }

    /// Fill `record` with up to `npc_count` NPCs.
    ///
    /// A slot whose candidate cannot be spaced out is abandoned. A slot whose
    /// candidate drifted off the lane is retried. Total attempts are capped
    /// at `max_attempts_per_npc × npc_count`.
    fn place_npcs<T: Transport>(
        &self,
        sim: &mut Simulator<T>,
        request: &GenerateRequest,
        ego_spawn: Transform,
        ego_long: bool,
        rng: &mut ChaCha8Rng,
        record: &mut ScenarioRecord,
    ) -> Result<(), ScenarioError> {
        let rules = SpacingRules::new(&request.spacing, &self.config);
        let spacing = &request.spacing;
        let mut placed = vec![PlacedVehicle {
            transform: ego_spawn,
            long: ego_long,
        }];

        let budget = self.config.max_attempts_per_npc.saturating_mul(request.npc_count);
        let mut attempts = 0usize;
        let mut slot = 0usize;
        while slot < request.npc_count {
            if attempts >= budget {
                tracing::warn!(
                    placed = record.len(),
                    requested = request.npc_count,
                    attempts,
                    "placement attempt budget exhausted"
                );
                break;
            }
            attempts += 1;

            let name = request
                .vehicle_pool
                .choose(rng)
                .ok_or_else(|| ScenarioError::Configuration("vehicle pool is empty".into()))?;
            let long = is_long_vehicle(name, &self.config.long_vehicle_types);
            let angle = rng.gen_range(-PI..=0.0);
            let distance = rng.gen_range(spacing.spawn_radius_min..=spacing.spawn_radius_max);
            let candidate = sim.map_point_on_lane(ring_point(ego_spawn.position, angle, distance))?;

            let Some(spot) = rules.resolve(candidate, long, &placed) else {
                tracing::debug!(slot, name = %name, "no spaced spot found, slot abandoned");
                slot += 1;
                continue;
            };
            let projected = sim.map_point_on_lane(spot.position)?;
            if !is_on_lane(&spot, &projected, self.config.off_lane_tolerance) {
                tracing::debug!(slot, at = %spot.position, "spot left the lane, retrying slot");
                continue;
            }

            let uid = sim.add_agent(name, AgentType::Npc, &AgentState::at(spot))?;
            sim.follow_closest_lane(&uid, true, self.config.npc_max_speed, true)?;
            tracing::debug!(slot, name = %name, uid = %uid, at = %spot.position, "npc spawned");

            placed.push(PlacedVehicle {
                transform: spot,
                long,
            });
            record.push_npc(name.clone(), spot);
            slot += 1;
        }

        tracing::info!(placed = record.len(), attempts, "npc placement done");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults_are_valid() {
        let req = GenerateRequest::new("Lincoln2017MKZ", "BorregasAve", 3);
        assert!(req.validate().is_ok());
        assert_eq!(req.vehicle_pool.len(), 6);
        assert!(req.seed.is_none());
    }

    #[test]
    fn request_rejects_bad_numbers() {
        let base = GenerateRequest::new("Lincoln2017MKZ", "BorregasAve", 3);

        let mut req = base.clone();
        req.runtime = 0.0;
        assert!(req.validate().is_err());

        let mut req = base.clone();
        req.runtime = 1e30;
        assert!(req.validate().is_err());

        let mut req = base.clone();
        req.timescale = f64::NAN;
        assert!(req.validate().is_err());

        let mut req = base.clone();
        req.seed = Some(SEED_MAX + 1);
        assert!(req.validate().is_err());

        let mut req = base.clone();
        req.vehicle_pool.clear();
        assert!(req.validate().is_err());
        req.npc_count = 0;
        assert!(req.validate().is_ok());

        let mut req = base;
        req.weather.fog = Some(1.5);
        assert!(req.validate().is_err());
    }

    #[test]
    fn weather_draws_are_rounded_and_reproducible() {
        let params = WeatherParams {
            rain: Some(0.3),
            ..Default::default()
        };
        let a = params.resolve(&mut ChaCha8Rng::seed_from_u64(11));
        let b = params.resolve(&mut ChaCha8Rng::seed_from_u64(11));
        assert_eq!(a, b);
        assert_eq!(a.rain, 0.3);
        for v in [a.fog, a.wetness] {
            assert!((0.0..=1.0).contains(&v));
            assert_eq!(round2(v), v);
        }
        assert!((0.0..=24.0).contains(&a.time_of_day));
    }

    #[test]
    fn fixed_weather_is_passed_through() {
        let params = WeatherParams::fixed(0.1, 0.2, 0.3, 6.5);
        let info = params.resolve(&mut ChaCha8Rng::seed_from_u64(0));
        assert_eq!(
            info,
            WeatherInfo {
                rain: 0.1,
                fog: 0.2,
                wetness: 0.3,
                time_of_day: 6.5,
                fixed_time: true,
            }
        );
    }

    #[test]
    fn report_message_carries_seed_and_key() {
        let report = GenerationReport {
            seed: -17,
            key: ScenarioKey::new(3).unwrap(),
            outcome: Outcome::Completed,
            record: ScenarioRecord::new(
                RunInfo {
                    vehicle_name: "Lincoln2017MKZ".into(),
                    map: "BorregasAve".into(),
                    seed: -17,
                    runtime: 5.0,
                    timescale: 1.0,
                },
                WeatherParams::fixed(0.0, 0.0, 0.0, 12.0).resolve(&mut ChaCha8Rng::seed_from_u64(0)),
            ),
        };
        assert_eq!(
            report.to_string(),
            "Simulation ended with no collisions\n Seed: -17\n Replay Key: 0003"
        );
    }
}
