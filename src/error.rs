use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the fallible library boundaries
///
/// Runtime sensing itself never fails outward: transient lookup misses are
/// silent skips and per-notification/per-query faults are logged and
/// contained.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("region {0} is already registered")]
    RegionExists(Uuid),

    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("failed to spawn region worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("failed to encode persisted sensor state: {0}")]
    PersistEncode(#[from] bincode::error::EncodeError),

    #[error("failed to decode persisted sensor state: {0}")]
    PersistDecode(#[from] bincode::error::DecodeError),
}
