//! `sim_client`: Blocking command client for a remote driving simulator.
//!
//! # Module layout
//! - [`geometry`]  Vector / Transform / Quaternion / BoundingBox value types
//! - [`types`]     Agent ids, agent kinds, agent and weather state
//! - [`events`]    Events reported during a run (collision, waypoint, ...)
//! - [`remote`]    `Transport` seam and the newline-delimited JSON TCP transport
//! - [`simulator`] Typed commands and the run-until event loop
//! - [`error`]     Client error type

pub mod error;
pub mod events;
pub mod geometry;
pub mod remote;
pub mod simulator;
pub mod types;

pub use error::{ClientError, Result};
pub use events::{EventKind, SimEvent};
pub use geometry::{BoundingBox, Quaternion, Transform, Vector};
pub use remote::{TcpTransport, Transport};
pub use simulator::{AgentInfo, RunSummary, Simulator};
pub use types::{AgentState, AgentType, AgentUid, WeatherState};
