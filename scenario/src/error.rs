//! Error taxonomy for scenario generation, replay and storage.

use crate::record::ScenarioKey;
use sim_client::ClientError;
use std::path::PathBuf;
use thiserror::Error;

/// Failures of the on-disk scenario store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no scenario registry in {0}")]
    NoRegistry(PathBuf),

    #[error("replay key {0} not found")]
    KeyNotFound(ScenarioKey),

    #[error("all replay keys up to 9999 are taken")]
    KeysExhausted,

    #[error("corrupt registry line {line:?}")]
    CorruptRegistry { line: String },

    #[error("corrupt scenario blob {path}: {reason}")]
    CorruptBlob { path: PathBuf, reason: String },

    #[error("refusing to store an inconsistent record: {0}")]
    InvalidRecord(String),

    #[error("{path} cannot be imported: {reason}")]
    NotImportable { path: PathBuf, reason: String },

    #[error("{0} is the store's own directory")]
    OwnDirectory(PathBuf),

    #[error("scenario store i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("scenario encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NoRegistry(_) | StoreError::KeyNotFound(_))
    }
}

/// Failures of a generate or replay call.
///
/// A collision is not an error: it is reported through a successful result.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// Bad caller input; never retried.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Simulator or vehicle bridge unreachable.
    #[error("simulator unreachable: {0}")]
    Connectivity(String),

    /// The simulator does not know the requested ego vehicle.
    #[error("vehicle `{0}` is not available in the simulator")]
    VehicleNotFound(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The watchdog expired before the scenario finished spawning and running.
    #[error("failed to spawn: watchdog expired during `{0}`")]
    Timeout(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ScenarioError {
    pub fn is_not_found(&self) -> bool {
        match self {
            ScenarioError::NotFound(_) | ScenarioError::VehicleNotFound(_) => true,
            ScenarioError::Store(e) => e.is_not_found(),
            _ => false,
        }
    }
}

impl From<ClientError> for ScenarioError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::DeadlineExceeded { command } => ScenarioError::Timeout(command),
            other => ScenarioError::Connectivity(other.to_string()),
        }
    }
}
