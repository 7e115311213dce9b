use bridge_traits::BridgeError;
use core_library::LibraryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// The Track Source could not be queried. Merges treat this as a no-op.
    #[error("Track source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Malformed track record {track_id:?}: missing {field}")]
    MalformedRecord {
        track_id: Option<String>,
        field: String,
    },

    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Merge already in progress")]
    MergeInProgress,
}

impl From<BridgeError> for SyncError {
    fn from(err: BridgeError) -> Self {
        SyncError::SourceUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
