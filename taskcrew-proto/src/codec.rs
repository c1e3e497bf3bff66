//! Binary snapshot codec.
//!
//! A [`Snapshot`] captures the task store and load registry so a
//! coordinator can be restarted without losing work. It is encoded with
//! postcard behind a small version tag.

use serde::{Deserialize, Serialize};

use crate::load::WorkerLoad;
use crate::task::Task;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u16 = 1;

/// Error type for codec encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// The snapshot was written by an incompatible format version.
    #[error("unsupported snapshot version {found} (expected {SNAPSHOT_VERSION})")]
    UnsupportedVersion { found: u16 },
}

/// Point-in-time copy of coordinator state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u16,
    /// Tasks in creation order.
    pub tasks: Vec<Task>,
    /// Load records in registration order.
    pub loads: Vec<WorkerLoad>,
}

impl Snapshot {
    #[must_use]
    pub const fn new(tasks: Vec<Task>, loads: Vec<WorkerLoad>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            tasks,
            loads,
        }
    }
}

/// Encodes a [`Snapshot`] into a byte vector using postcard.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the snapshot cannot be serialized.
pub fn encode(snapshot: &Snapshot) -> Result<Vec<u8>, CodecError> {
    postcard::to_allocvec(snapshot).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes a [`Snapshot`] from a byte slice using postcard.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the bytes cannot be deserialized,
/// or `CodecError::UnsupportedVersion` if the version tag does not match.
pub fn decode(bytes: &[u8]) -> Result<Snapshot, CodecError> {
    let snapshot: Snapshot =
        postcard::from_bytes(bytes).map_err(|e| CodecError::Serialization(e.to_string()))?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(CodecError::UnsupportedVersion {
            found: snapshot.version,
        });
    }
    Ok(snapshot)
}
