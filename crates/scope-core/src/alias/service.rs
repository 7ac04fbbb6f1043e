use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::{AliasError, AliasKind, ScopeAlias, is_valid_kind_transition};
use crate::error::{CoreError, CoreReason, CoreResult, core_err};
use crate::event::{EventRecord, EventStore};
use crate::ids::{DeviceId, EventId, ScopeId};
use crate::repo::{ChangeTracker, RepoError, ScopeAliasRepository, ScopeRepository};
use crate::scope::{HierarchyError, Scope, ScopeEvent};
use crate::value::AliasName;

// ---------------------------------------------------------------------------
// AliasService
// ---------------------------------------------------------------------------

/// Application service for alias management.
///
/// Aliases live in their own registry rows, but membership is mirrored on
/// the scope aggregate, so every operation updates both and appends the
/// scope's alias event.
pub struct AliasService {
    scopes: Arc<dyn ScopeRepository>,
    aliases: Arc<dyn ScopeAliasRepository>,
    events: Arc<dyn EventStore>,
    device: DeviceId,
    tracker: Option<Arc<dyn ChangeTracker>>,
}

impl AliasService {
    pub fn new(
        scopes: Arc<dyn ScopeRepository>,
        aliases: Arc<dyn ScopeAliasRepository>,
        events: Arc<dyn EventStore>,
        device: DeviceId,
    ) -> Self {
        Self {
            scopes,
            aliases,
            events,
            device,
            tracker: None,
        }
    }

    /// Notify `tracker` of every committed local event, keeping per-device
    /// pending-change counters current.
    pub fn with_change_tracker(mut self, tracker: Arc<dyn ChangeTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    // -- queries ------------------------------------------------------------

    pub async fn resolve(&self, name: &AliasName) -> CoreResult<ScopeAlias> {
        self.aliases
            .find_by_name(name)
            .await
            .map_err(repo)?
            .ok_or_else(|| core_err(AliasError::NotFound { name: name.clone() }))
    }

    pub async fn list(&self, scope_id: ScopeId) -> CoreResult<Vec<ScopeAlias>> {
        self.aliases.find_by_scope(scope_id).await.map_err(repo)
    }

    pub async fn complete(&self, prefix: &str, limit: usize) -> CoreResult<Vec<ScopeAlias>> {
        self.aliases.find_by_prefix(prefix, limit).await.map_err(repo)
    }

    // -- mutation -----------------------------------------------------------

    /// Attach a custom alias to a scope. Names are unique across all scopes.
    pub async fn add(
        &self,
        scope_id: ScopeId,
        name: AliasName,
        now: DateTime<Utc>,
    ) -> CoreResult<ScopeAlias> {
        if let Some(existing) = self.aliases.find_by_name(&name).await.map_err(repo)? {
            return Err(core_err(AliasError::Duplicate {
                name,
                existing: existing.scope_id,
                attempted: scope_id,
            }));
        }
        let mut scope = self.load_scope(scope_id).await?;
        let row = ScopeAlias::new(scope_id, name.clone(), AliasKind::Custom, now);
        self.aliases.save(row.clone()).await.map_err(repo)?;
        let event = scope.add_custom_alias(name, now);
        self.commit(scope, event).await?;
        Ok(row)
    }

    /// Remove a custom alias. The canonical alias can only be replaced.
    pub async fn remove(&self, name: &AliasName, now: DateTime<Utc>) -> CoreResult<()> {
        let row = self.resolve(name).await?;
        if row.is_canonical() {
            return Err(core_err(AliasError::CannotRemoveCanonical {
                name: name.clone(),
            }));
        }
        let mut scope = self.load_scope(row.scope_id).await?;
        self.aliases.remove_by_name(name).await.map_err(repo)?;
        if let Some(event) = scope.remove_custom_alias(name, now) {
            self.commit(scope, event).await?;
        }
        Ok(())
    }

    /// Make `name` the canonical alias of `scope_id`, demoting the current
    /// canonical to custom. `name` may be new or one of the scope's
    /// existing custom aliases; a name held by another scope is rejected.
    pub async fn set_canonical(
        &self,
        scope_id: ScopeId,
        name: AliasName,
        now: DateTime<Utc>,
    ) -> CoreResult<ScopeAlias> {
        let existing = self.aliases.find_by_name(&name).await.map_err(repo)?;
        if let Some(ref row) = existing
            && row.scope_id != scope_id
        {
            return Err(core_err(AliasError::Duplicate {
                name,
                existing: row.scope_id,
                attempted: scope_id,
            }));
        }

        let mut scope = self.load_scope(scope_id).await?;
        if scope.canonical_alias() == &name {
            return self.resolve(&name).await;
        }

        let current = self
            .aliases
            .find_canonical(scope_id)
            .await
            .map_err(repo)?
            .ok_or_else(|| core_err(AliasError::NoCanonical { scope: scope_id }))?;

        // Demote the old canonical row, then install the new one.
        let mut demoted = current.clone();
        demoted.kind = AliasKind::Custom;
        demoted.updated_at = now;
        self.aliases.update(demoted).await.map_err(repo)?;

        let promoted = match existing {
            Some(mut row) => {
                if !is_valid_kind_transition(Some(row.kind), AliasKind::Canonical) {
                    return Err(core_err(AliasError::InvalidTransition {
                        from: row.kind,
                        to: AliasKind::Canonical,
                    }));
                }
                row.kind = AliasKind::Canonical;
                row.updated_at = now;
                self.aliases.update(row.clone()).await.map_err(repo)?;
                row
            }
            None => {
                let row = ScopeAlias::new(scope_id, name.clone(), AliasKind::Canonical, now);
                self.aliases.save(row.clone()).await.map_err(repo)?;
                row
            }
        };

        let event = scope.replace_canonical(name, now);
        self.commit(scope, event).await?;
        Ok(promoted)
    }

    /// Rename an alias. With `new` unused, the registry row moves
    /// atomically. With `new` already held by the same scope, the rows
    /// merge and the surviving row keeps `old`'s kind; held by another
    /// scope, the rename fails and nothing changes.
    pub async fn rename(
        &self,
        old: &AliasName,
        new: &AliasName,
        now: DateTime<Utc>,
    ) -> CoreResult<ScopeAlias> {
        let old_row = self.resolve(old).await?;
        let target = self.aliases.find_by_name(new).await.map_err(repo)?;

        let renamed = match target {
            Some(row) if row.scope_id != old_row.scope_id => {
                return Err(core_err(AliasError::Duplicate {
                    name: new.clone(),
                    existing: row.scope_id,
                    attempted: old_row.scope_id,
                }));
            }
            Some(mut row) => {
                // Same-scope merge: the row under `new` takes over `old`'s
                // kind, which must be a legal transition for it.
                if !is_valid_kind_transition(Some(row.kind), old_row.kind) {
                    return Err(core_err(AliasError::InvalidTransition {
                        from: row.kind,
                        to: old_row.kind,
                    }));
                }
                self.aliases.remove_by_name(old).await.map_err(repo)?;
                row.kind = old_row.kind;
                row.updated_at = now;
                self.aliases.update(row.clone()).await.map_err(repo)?;
                row
            }
            None => {
                self.aliases.rename(old, new).await.map_err(repo)?;
                let mut row = old_row.clone();
                row.name = new.clone();
                row.updated_at = now;
                self.aliases.update(row.clone()).await.map_err(repo)?;
                row
            }
        };

        let mut scope = self.load_scope(old_row.scope_id).await?;
        let event = scope.rename_alias(old.clone(), new.clone(), now);
        self.commit(scope, event).await?;
        Ok(renamed)
    }

    // -- plumbing -----------------------------------------------------------

    async fn load_scope(&self, id: ScopeId) -> CoreResult<Scope> {
        self.scopes
            .find_by_id(id)
            .await
            .map_err(repo)?
            .ok_or_else(|| core_err(HierarchyError::NotFound { id }))
    }

    async fn commit(&self, scope: Scope, event: ScopeEvent) -> CoreResult<()> {
        self.scopes.update(scope.clone()).await.map_err(repo)?;
        let clock = self
            .events
            .latest_clock()
            .await
            .map_err(repo)?
            .increment(&self.device);
        let record = EventRecord {
            event_id: EventId::generate(),
            aggregate_id: scope.id(),
            version: scope.version(),
            vector_clock: clock,
            recorded_at: event.at(),
            payload: event,
            origin: self.device.clone(),
        };
        self.events.append(record).await.map_err(repo)?;
        if let Some(tracker) = &self.tracker {
            tracker.record_local_changes(1).await.map_err(repo)?;
        }
        Ok(())
    }
}

fn repo(e: RepoError) -> CoreError {
    core_err(CoreReason::Repo(e))
}
