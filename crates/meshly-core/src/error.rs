//! Error types for the core layer.

use thiserror::Error;

/// Errors surfaced by the [`Controller`](crate::Controller) and command
/// dispatch.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Transport or hub-reported failure from the API layer.
    #[error(transparent)]
    Api(#[from] meshly_api::ApiError),

    /// A scan is already outstanding; wait for its results or a
    /// disconnect before starting another.
    #[error("a {kind} scan is already in progress")]
    ScanPending { kind: &'static str },

    /// A claim is already outstanding for another device.
    #[error("a claim is already in progress for uuid hash {0:#010x}")]
    ClaimPending(u32),

    /// The command referenced an id the store has never seen.
    #[error("unknown {entity} id {id}")]
    UnknownEntity { entity: &'static str, id: u16 },

    /// A malformed uuid hash was passed to a claim command.
    #[error("invalid uuid hash: {0:?}")]
    InvalidUuidHash(String),

    /// The controller is not connected to the hub's event stream.
    #[error("not connected")]
    NotConnected,
}

impl CoreError {
    /// Whether retrying the same operation later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Api(api) => api.is_transient(),
            Self::ScanPending { .. } | Self::ClaimPending(_) | Self::NotConnected => true,
            Self::UnknownEntity { .. } | Self::InvalidUuidHash(_) => false,
        }
    }
}
