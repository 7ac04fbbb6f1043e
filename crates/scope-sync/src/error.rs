use derive_more::From;
use orion_error::{ErrorCode, StructError, UvsReason};

use crate::conflict::ConflictError;
use crate::state::StateError;
use crate::transport::TransportError;
use scope_core::CoreReason;

#[derive(Debug, Clone, PartialEq, thiserror::Error, From)]
pub enum SyncReason {
    #[error("{0}")]
    State(StateError),
    #[error("{0}")]
    Conflict(ConflictError),
    #[error("{0}")]
    Transport(TransportError),
    #[error("{0}")]
    Core(CoreReason),
    #[error("{0}")]
    Uvs(UvsReason),
}

impl ErrorCode for SyncReason {
    fn error_code(&self) -> i32 {
        match self {
            Self::State(_) => 2001,
            Self::Conflict(_) => 2002,
            Self::Transport(_) => 2003,
            Self::Core(c) => c.error_code(),
            Self::Uvs(u) => u.error_code(),
        }
    }
}

pub type SyncError = StructError<SyncReason>;
pub type SyncResult<T> = Result<T, SyncError>;

/// Lift a domain failure into a [`SyncError`] at a service boundary.
pub(crate) fn sync_err(reason: impl Into<SyncReason>) -> SyncError {
    StructError::from(reason.into())
}
