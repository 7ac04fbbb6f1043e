use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::{ContextError, ContextView, valid_name};
use crate::aspect::{self, AspectDefinition};
use crate::error::{CoreError, CoreReason, CoreResult, core_err};
use crate::repo::{AspectDefinitionRepository, ContextViewRepository, RepoError};
use crate::scope::Scope;
use crate::value::AspectKey;

// ---------------------------------------------------------------------------
// Active context
// ---------------------------------------------------------------------------

/// Snapshot of the active-context state.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextStatus {
    pub active: Option<ContextView>,
    pub total_views: usize,
}

/// Owns the process's single "active context" slot.
///
/// The slot lives behind a mutex so `get`/`set`/`clear`/`switch_by_name`
/// interleave linearizably. The service is an owned container handed to
/// whoever needs it, not a global.
pub struct ActiveContextService {
    views: Arc<dyn ContextViewRepository>,
    definitions: Arc<dyn AspectDefinitionRepository>,
    active: Mutex<Option<ContextView>>,
}

impl ActiveContextService {
    pub fn new(
        views: Arc<dyn ContextViewRepository>,
        definitions: Arc<dyn AspectDefinitionRepository>,
    ) -> Self {
        Self {
            views,
            definitions,
            active: Mutex::new(None),
        }
    }

    pub async fn get(&self) -> Option<ContextView> {
        self.active.lock().await.clone()
    }

    pub async fn set(&self, view: ContextView) {
        *self.active.lock().await = Some(view);
    }

    /// Clear the active context; returns the view that was active.
    pub async fn clear(&self) -> Option<ContextView> {
        self.active.lock().await.take()
    }

    /// Look a view up by name and make it active.
    pub async fn switch_by_name(&self, name: &str) -> CoreResult<ContextView> {
        let name = valid_name(name).map_err(core_err)?;
        let view = self
            .views
            .find_by_name(&name)
            .await
            .map_err(repo)?
            .ok_or_else(|| core_err(ContextError::NotFound { name }))?;
        *self.active.lock().await = Some(view.clone());
        Ok(view)
    }

    pub async fn status(&self) -> CoreResult<ContextStatus> {
        let total_views = self.views.all().await.map_err(repo)?.len();
        let active = self.active.lock().await.clone();
        Ok(ContextStatus {
            active,
            total_views,
        })
    }

    /// Narrow `scopes` through the active context's filter. With no active
    /// context every scope passes; ordering comparisons consult the
    /// registered aspect definitions.
    pub async fn list_matching(&self, scopes: Vec<Scope>) -> CoreResult<Vec<Scope>> {
        let Some(view) = self.get().await else {
            return Ok(scopes);
        };
        let expr = view.filter_expr().map_err(core_err)?;
        let defs: BTreeMap<AspectKey, AspectDefinition> = self
            .definitions
            .all()
            .await
            .map_err(repo)?
            .into_iter()
            .map(|d| (d.key.clone(), d))
            .collect();
        Ok(scopes
            .into_iter()
            .filter(|scope| aspect::evaluate(&expr, scope.aspects(), &defs))
            .collect())
    }
}

fn repo(e: RepoError) -> CoreError {
    core_err(CoreReason::Repo(e))
}
