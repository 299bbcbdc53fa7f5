//! `scenario`: Random traffic scenario generation, persistence and replay.
//!
//! # Module layout
//! - [`config`]    Environment lookup, seed parsing, tunables
//! - [`record`]    Replay keys and the persisted `ScenarioRecord`
//! - [`store`]     Registry file + JSON blobs (write / read / export / import / clear)
//! - [`placement`] Spacing rules, ring sampling, lane check
//! - [`session`]   Scene setup, ego spawn, collision-terminated run
//! - [`generator`] Generate, run and persist a new scenario
//! - [`replay`]    Re-run a stored scenario
//! - [`error`]     Store and scenario error types

pub mod config;
pub mod error;
pub mod generator;
pub mod placement;
pub mod record;
pub mod replay;
pub mod session;
pub mod store;

pub use config::{BridgeConfig, EnvConfig, ScenarioConfig};
pub use error::{ScenarioError, StoreError};
pub use generator::{GenerateRequest, GenerationReport, ScenarioGenerator, WeatherParams};
pub use placement::SpacingParams;
pub use record::{RunInfo, ScenarioKey, ScenarioRecord, WeatherInfo};
pub use replay::{ReplayReport, ScenarioReplayer};
pub use session::Outcome;
pub use store::ScenarioStore;
