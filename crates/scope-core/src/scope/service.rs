use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use orion_error::StructError;

use super::hierarchy::{
    self, HierarchyError, HierarchyLimits, validate_children_limit, validate_depth,
    validate_parent_child,
};
use super::{Scope, ScopeEvent};
use crate::alias::{AliasError, AliasKind, MAX_GENERATION_RETRIES, ScopeAlias, generate_alias_name};
use crate::aspect::{AspectError, AspectMap, CustomPredicates};
use crate::error::{CoreError, CoreReason, CoreResult, core_err};
use crate::event::{EventRecord, EventStore};
use crate::ids::{AliasId, DeviceId, EventId, ScopeId};
use crate::repo::{
    AspectDefinitionRepository, ChangeTracker, RepoError, ScopeAliasRepository, ScopeRepository,
};
use crate::value::{AliasName, AspectKey, AspectValue, ScopeDescription, ScopeTitle};

// ---------------------------------------------------------------------------
// Accumulated creation validation
// ---------------------------------------------------------------------------

/// Validated inputs for a new scope.
#[derive(Debug, Clone, PartialEq)]
pub struct NewScope {
    pub title: ScopeTitle,
    pub description: Option<ScopeDescription>,
    pub parent_id: Option<ScopeId>,
}

/// Every validation failure found for one creation request, in input order.
/// Non-empty by construction; `first` gives the fail-fast view.
#[derive(Debug, Clone, PartialEq)]
pub struct CreationIssues {
    issues: Vec<CoreReason>,
}

impl CreationIssues {
    fn from_vec(issues: Vec<CoreReason>) -> Option<Self> {
        if issues.is_empty() {
            None
        } else {
            Some(Self { issues })
        }
    }

    pub fn first(&self) -> &CoreReason {
        &self.issues[0]
    }

    pub fn all(&self) -> &[CoreReason] {
        &self.issues
    }

    pub fn into_core_error(mut self) -> CoreError {
        let detail = self.to_string();
        StructError::from(self.issues.remove(0)).with_detail(detail)
    }
}

impl fmt::Display for CreationIssues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, issue) in self.issues.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CreationIssues {}

// ---------------------------------------------------------------------------
// ScopeService
// ---------------------------------------------------------------------------

/// Application service for scope aggregates: validates against the
/// hierarchy rules, persists through the repositories, and appends every
/// mutation to the event log under this device's vector clock.
pub struct ScopeService {
    scopes: Arc<dyn ScopeRepository>,
    aliases: Arc<dyn ScopeAliasRepository>,
    definitions: Arc<dyn AspectDefinitionRepository>,
    events: Arc<dyn EventStore>,
    device: DeviceId,
    limits: HierarchyLimits,
    customs: CustomPredicates,
    tracker: Option<Arc<dyn ChangeTracker>>,
}

impl ScopeService {
    pub fn new(
        scopes: Arc<dyn ScopeRepository>,
        aliases: Arc<dyn ScopeAliasRepository>,
        definitions: Arc<dyn AspectDefinitionRepository>,
        events: Arc<dyn EventStore>,
        device: DeviceId,
        limits: HierarchyLimits,
    ) -> Self {
        Self {
            scopes,
            aliases,
            definitions,
            events,
            device,
            limits,
            customs: CustomPredicates::new(),
            tracker: None,
        }
    }

    pub fn with_custom_predicates(mut self, customs: CustomPredicates) -> Self {
        self.customs = customs;
        self
    }

    /// Notify `tracker` of every committed local event, keeping per-device
    /// pending-change counters current.
    pub fn with_change_tracker(mut self, tracker: Arc<dyn ChangeTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    // -- creation -----------------------------------------------------------

    /// Validate a creation request, accumulating every failure rather than
    /// stopping at the first.
    pub async fn validate_creation(
        &self,
        title: &str,
        description: &str,
        parent_id: Option<ScopeId>,
    ) -> CoreResult<Result<NewScope, CreationIssues>> {
        let mut issues: Vec<CoreReason> = Vec::new();

        let parsed_title = match ScopeTitle::parse(title) {
            Ok(t) => Some(t),
            Err(e) => {
                issues.push(e.into());
                None
            }
        };
        let parsed_description = match ScopeDescription::parse_opt(description) {
            Ok(d) => d,
            Err(e) => {
                issues.push(e.into());
                None
            }
        };

        if let Some(parent) = parent_id {
            if !self.scopes.exists(parent).await.map_err(repo)? {
                issues.push(HierarchyError::ParentNotFound { id: parent }.into());
            } else {
                let depth = self.scopes.hierarchy_depth(parent).await.map_err(repo)?;
                if let Err(e) = validate_depth(depth, self.limits.max_depth) {
                    issues.push(e.into());
                }
                let count = self
                    .scopes
                    .count_children(Some(parent))
                    .await
                    .map_err(repo)?;
                if let Err(e) = validate_children_limit(count, self.limits.max_children) {
                    issues.push(e.into());
                }
            }
        }

        if let Some(ref t) = parsed_title {
            let normalized = t.normalized();
            let taken = self
                .scopes
                .exists_by_parent_and_title(parent_id, &normalized)
                .await
                .map_err(repo)?;
            if taken {
                issues.push(
                    HierarchyError::DuplicateTitle {
                        title: normalized,
                        parent: parent_id,
                    }
                    .into(),
                );
            }
        }

        Ok(match CreationIssues::from_vec(issues) {
            Some(issues) => Err(issues),
            None => Ok(NewScope {
                title: parsed_title.expect("no issues implies the title parsed"),
                description: parsed_description,
                parent_id,
            }),
        })
    }

    /// Create a scope with a generated canonical alias and append its
    /// `Created` event.
    pub async fn create(
        &self,
        title: &str,
        description: &str,
        parent_id: Option<ScopeId>,
        now: DateTime<Utc>,
    ) -> CoreResult<Scope> {
        let new = self
            .validate_creation(title, description, parent_id)
            .await?
            .map_err(CreationIssues::into_core_error)?;

        let (alias_id, alias_name) = self.unique_alias_name().await?;
        let id = ScopeId::generate();
        let (scope, event) = Scope::create(
            id,
            new.parent_id,
            new.title,
            new.description,
            alias_name.clone(),
            now,
        );

        self.scopes.save(scope.clone()).await.map_err(repo)?;
        let row = ScopeAlias {
            id: alias_id,
            scope_id: id,
            name: alias_name,
            kind: AliasKind::Canonical,
            created_at: now,
            updated_at: now,
        };
        self.aliases.save(row).await.map_err(repo)?;
        self.append(id, scope.version(), event).await?;
        Ok(scope)
    }

    /// Deterministic canonical-name generation with a bounded collision
    /// retry: a fresh `AliasId` reseeds each attempt.
    async fn unique_alias_name(&self) -> CoreResult<(AliasId, AliasName)> {
        for _ in 0..MAX_GENERATION_RETRIES {
            let alias_id = AliasId::generate();
            let name = generate_alias_name(alias_id);
            if self
                .aliases
                .find_by_name(&name)
                .await
                .map_err(repo)?
                .is_none()
            {
                return Ok((alias_id, name));
            }
        }
        Err(core_err(AliasError::GenerationFailed {
            attempts: MAX_GENERATION_RETRIES,
        }))
    }

    // -- lookup -------------------------------------------------------------

    pub async fn get(&self, id: ScopeId) -> CoreResult<Scope> {
        self.scopes
            .find_by_id(id)
            .await
            .map_err(repo)?
            .ok_or_else(|| core_err(HierarchyError::NotFound { id }))
    }

    /// Resolve a scope by id text or alias name.
    pub async fn resolve(&self, reference: &str) -> CoreResult<Scope> {
        if let Ok(id) = reference.parse::<ScopeId>()
            && let Some(scope) = self.scopes.find_by_id(id).await.map_err(repo)?
        {
            return Ok(scope);
        }
        let name = AliasName::parse(reference).map_err(core_err)?;
        let alias = self
            .aliases
            .find_by_name(&name)
            .await
            .map_err(repo)?
            .ok_or_else(|| core_err(AliasError::NotFound { name }))?;
        self.get(alias.scope_id).await
    }

    pub async fn children(&self, parent: ScopeId) -> CoreResult<Vec<Scope>> {
        self.scopes.find_children(parent).await.map_err(repo)
    }

    pub async fn roots(&self) -> CoreResult<Vec<Scope>> {
        self.scopes.all_roots().await.map_err(repo)
    }

    // -- mutation -----------------------------------------------------------

    pub async fn rename(
        &self,
        id: ScopeId,
        title: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<Scope> {
        let mut scope = self.get(id).await?;
        let title = ScopeTitle::parse(title).map_err(core_err)?;
        let normalized = title.normalized();
        if normalized != scope.title().normalized() {
            let taken = self
                .scopes
                .exists_by_parent_and_title(scope.parent_id(), &normalized)
                .await
                .map_err(repo)?;
            if taken {
                return Err(core_err(HierarchyError::DuplicateTitle {
                    title: normalized,
                    parent: scope.parent_id(),
                }));
            }
        }
        let event = scope.rename(title, now);
        self.commit(scope, event).await
    }

    pub async fn describe(
        &self,
        id: ScopeId,
        description: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<Scope> {
        let mut scope = self.get(id).await?;
        let description = ScopeDescription::parse_opt(description).map_err(core_err)?;
        let event = scope.describe(description, now);
        self.commit(scope, event).await
    }

    /// Set an aspect, validating against its definition when one exists.
    pub async fn set_aspect(
        &self,
        id: ScopeId,
        key: AspectKey,
        values: Vec<AspectValue>,
        now: DateTime<Utc>,
    ) -> CoreResult<Scope> {
        let mut scope = self.get(id).await?;
        if let Some(def) = self.definitions.find(&key).await.map_err(repo)? {
            let others = without_key(scope.aspects(), &key);
            def.validate_values(&values, &others, &self.customs)
                .map_err(core_err)?;
        }
        let event = scope.set_aspect(key, values, now);
        self.commit(scope, event).await
    }

    pub async fn remove_aspect(
        &self,
        id: ScopeId,
        key: &AspectKey,
        now: DateTime<Utc>,
    ) -> CoreResult<Scope> {
        let mut scope = self.get(id).await?;
        match scope.remove_aspect(key, now) {
            Some(event) => self.commit(scope, event).await,
            None => Ok(scope),
        }
    }

    /// Run every registered definition against a scope's aspects, including
    /// `Required` rules for absent keys. Returns all violations.
    pub async fn validate_aspects(&self, id: ScopeId) -> CoreResult<Vec<AspectError>> {
        let scope = self.get(id).await?;
        let mut violations = Vec::new();
        for def in self.definitions.all().await.map_err(repo)? {
            let values = scope
                .aspects()
                .get(&def.key)
                .cloned()
                .unwrap_or_default();
            let others = without_key(scope.aspects(), &def.key);
            if let Err(e) = def.validate_values(&values, &others, &self.customs) {
                violations.push(e);
            }
        }
        Ok(violations)
    }

    pub async fn move_scope(
        &self,
        id: ScopeId,
        new_parent: Option<ScopeId>,
        now: DateTime<Utc>,
    ) -> CoreResult<Scope> {
        let mut scope = self.get(id).await?;
        if scope.parent_id() == new_parent {
            return Ok(scope);
        }
        if let Some(parent) = new_parent {
            if !self.scopes.exists(parent).await.map_err(repo)? {
                return Err(core_err(HierarchyError::ParentNotFound { id: parent }));
            }
            let ancestors = self.scopes.ancestor_path(parent).await.map_err(repo)?;
            hierarchy::detect_circular_reference(&ancestors).map_err(core_err)?;
            validate_parent_child(parent, id, &ancestors).map_err(core_err)?;
            let depth = self.scopes.hierarchy_depth(parent).await.map_err(repo)?;
            validate_depth(depth, self.limits.max_depth).map_err(core_err)?;
            let count = self
                .scopes
                .count_children(Some(parent))
                .await
                .map_err(repo)?;
            validate_children_limit(count, self.limits.max_children).map_err(core_err)?;
        }
        let taken = self
            .scopes
            .exists_by_parent_and_title(new_parent, &scope.title().normalized())
            .await
            .map_err(repo)?;
        if taken {
            return Err(core_err(HierarchyError::DuplicateTitle {
                title: scope.title().normalized(),
                parent: new_parent,
            }));
        }
        let event = scope.move_to(new_parent, now);
        self.commit(scope, event).await
    }

    /// Delete a scope. Rejected while children exist; there is no cascade.
    pub async fn delete(&self, id: ScopeId, now: DateTime<Utc>) -> CoreResult<()> {
        let mut scope = self.get(id).await?;
        let count = self.scopes.count_children(Some(id)).await.map_err(repo)?;
        if count > 0 {
            return Err(core_err(HierarchyError::HasChildren { id, count }));
        }
        let event = scope.deleted(now);
        for alias in self.aliases.find_by_scope(id).await.map_err(repo)? {
            self.aliases
                .remove_by_name(&alias.name)
                .await
                .map_err(repo)?;
        }
        self.append(id, scope.version(), event).await?;
        self.scopes.delete(id).await.map_err(repo)
    }

    // -- event plumbing -----------------------------------------------------

    async fn commit(&self, scope: Scope, event: ScopeEvent) -> CoreResult<Scope> {
        self.scopes.update(scope.clone()).await.map_err(repo)?;
        self.append(scope.id(), scope.version(), event).await?;
        Ok(scope)
    }

    async fn append(&self, aggregate: ScopeId, version: u64, payload: ScopeEvent) -> CoreResult<()> {
        let clock = self
            .events
            .latest_clock()
            .await
            .map_err(repo)?
            .increment(&self.device);
        let record = EventRecord {
            event_id: EventId::generate(),
            aggregate_id: aggregate,
            version,
            vector_clock: clock,
            recorded_at: payload.at(),
            payload,
            origin: self.device.clone(),
        };
        self.events.append(record).await.map_err(repo)?;
        if let Some(tracker) = &self.tracker {
            tracker.record_local_changes(1).await.map_err(repo)?;
        }
        Ok(())
    }
}

/// Aspect map with one key removed — the "other aspects" seen by
/// conditional rules.
fn without_key(aspects: &AspectMap, key: &AspectKey) -> AspectMap {
    let mut others = aspects.clone();
    others.remove(key);
    others
}

fn repo(e: RepoError) -> CoreError {
    core_err(CoreReason::Repo(e))
}
