use derive_more::From;
use orion_error::{ErrorCode, StructError, UvsReason};

use crate::alias::AliasError;
use crate::aspect::AspectError;
use crate::context::ContextError;
use crate::repo::RepoError;
use crate::scope::HierarchyError;
use crate::value::ValueError;
use scope_filter::FilterError;

#[derive(Debug, Clone, PartialEq, thiserror::Error, From)]
pub enum CoreReason {
    #[error("{0}")]
    Value(ValueError),
    #[error("{0}")]
    Aspect(AspectError),
    #[error("{0}")]
    Filter(FilterError),
    #[error("{0}")]
    Hierarchy(HierarchyError),
    #[error("{0}")]
    Alias(AliasError),
    #[error("{0}")]
    Context(ContextError),
    #[error("{0}")]
    Repo(RepoError),
    #[error("{0}")]
    Uvs(UvsReason),
}

impl ErrorCode for CoreReason {
    fn error_code(&self) -> i32 {
        match self {
            Self::Value(_) => 1001,
            Self::Aspect(_) => 1002,
            Self::Filter(_) => 1003,
            Self::Hierarchy(_) => 1004,
            Self::Alias(_) => 1005,
            Self::Context(_) => 1006,
            Self::Repo(_) => 1007,
            Self::Uvs(u) => u.error_code(),
        }
    }
}

pub type CoreError = StructError<CoreReason>;
pub type CoreResult<T> = Result<T, CoreError>;

/// Lift a domain failure into a [`CoreError`] at a service boundary.
pub(crate) fn core_err(reason: impl Into<CoreReason>) -> CoreError {
    StructError::from(reason.into())
}
