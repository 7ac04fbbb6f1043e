mod active;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreReason, CoreResult, core_err};
use crate::ids::ContextViewId;
use crate::repo::{ContextViewRepository, RepoError};
use crate::value::ContextViewKey;
use scope_filter::{FilterError, FilterExpr, format_expr, parse_filter};

pub use active::{ActiveContextService, ContextStatus};

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    #[error("context name {name:?} is invalid: must be non-blank and at most {max} characters", max = ContextView::MAX_NAME_LEN)]
    NameInvalid { name: String },
    #[error("no context named {name:?}")]
    NotFound { name: String },
    #[error("a context with key {key:?} already exists")]
    KeyExists { key: ContextViewKey },
    #[error("a context named {name:?} already exists")]
    NameExists { name: String },
    #[error("invalid context filter: {0}")]
    Filter(#[from] FilterError),
}

// ---------------------------------------------------------------------------
// Context views
// ---------------------------------------------------------------------------

/// A saved, named filter expression over aspects.
///
/// The filter is stored in canonical printed form, so stored text parses
/// back to the same AST it was created from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextView {
    pub id: ContextViewId,
    pub key: ContextViewKey,
    pub name: String,
    pub filter: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContextView {
    pub const MAX_NAME_LEN: usize = 100;

    pub fn new(
        key: ContextViewKey,
        name: &str,
        filter: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, ContextError> {
        let name = valid_name(name)?;
        let expr = parse_filter(filter)?;
        Ok(Self {
            id: ContextViewId::generate(),
            key,
            name,
            filter: format_expr(&expr),
            created_at: now,
            updated_at: now,
        })
    }

    /// Reparse the stored filter. Stored text is canonical, so this cannot
    /// fail for views built through [`ContextView::new`].
    pub fn filter_expr(&self) -> Result<FilterExpr, FilterError> {
        parse_filter(&self.filter)
    }
}

fn valid_name(name: &str) -> Result<String, ContextError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.chars().count() > ContextView::MAX_NAME_LEN {
        return Err(ContextError::NameInvalid {
            name: name.to_string(),
        });
    }
    Ok(trimmed.to_string())
}

// ---------------------------------------------------------------------------
// ContextViewService
// ---------------------------------------------------------------------------

/// CRUD over saved context views with key/name uniqueness.
pub struct ContextViewService {
    views: Arc<dyn ContextViewRepository>,
}

impl ContextViewService {
    pub fn new(views: Arc<dyn ContextViewRepository>) -> Self {
        Self { views }
    }

    pub async fn create(
        &self,
        key: ContextViewKey,
        name: &str,
        filter: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<ContextView> {
        if self.views.exists_by_key(&key).await.map_err(repo)? {
            return Err(core_err(ContextError::KeyExists { key }));
        }
        let view = ContextView::new(key, name, filter, now).map_err(core_err)?;
        if self.views.exists_by_name(&view.name).await.map_err(repo)? {
            return Err(core_err(ContextError::NameExists { name: view.name }));
        }
        self.views.save(view.clone()).await.map_err(repo)?;
        Ok(view)
    }

    pub async fn list(&self) -> CoreResult<Vec<ContextView>> {
        self.views.all().await.map_err(repo)
    }

    pub async fn find_by_name(&self, name: &str) -> CoreResult<ContextView> {
        self.views
            .find_by_name(name)
            .await
            .map_err(repo)?
            .ok_or_else(|| {
                core_err(ContextError::NotFound {
                    name: name.to_string(),
                })
            })
    }

    pub async fn delete(&self, id: ContextViewId) -> CoreResult<bool> {
        self.views.delete_by_id(id).await.map_err(repo)
    }
}

fn repo(e: RepoError) -> CoreError {
    core_err(CoreReason::Repo(e))
}
