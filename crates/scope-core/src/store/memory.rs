use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::alias::ScopeAlias;
use crate::aspect::AspectDefinition;
use crate::clock::VectorClock;
use crate::context::ContextView;
use crate::event::{EventRecord, EventStore};
use crate::ids::{ContextViewId, EventId, ScopeId};
use crate::repo::{
    AspectDefinitionRepository, ContextViewRepository, RepoError, RepoResult,
    ScopeAliasRepository, ScopeRepository,
};
use crate::scope::Scope;
use crate::value::{AliasName, AspectKey, ContextViewKey};

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct State {
    scopes: BTreeMap<ScopeId, Scope>,
    aliases: BTreeMap<AliasName, ScopeAlias>,
    views: BTreeMap<ContextViewId, ContextView>,
    definitions: BTreeMap<AspectKey, AspectDefinition>,
    events: Vec<EventRecord>,
}

/// One struct satisfying every core repository contract, holding all state
/// under a single lock. Backs the tests and the CLI's snapshot persistence;
/// a database driver would implement the same traits instead.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializable copy of everything the store holds.
    pub async fn dump(&self) -> StoreSnapshot {
        let state = self.state.read().await;
        StoreSnapshot {
            scopes: state.scopes.values().cloned().collect(),
            aliases: state.aliases.values().cloned().collect(),
            views: state.views.values().cloned().collect(),
            definitions: state.definitions.values().cloned().collect(),
            events: state.events.clone(),
        }
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let state = State {
            scopes: snapshot.scopes.into_iter().map(|s| (s.id(), s)).collect(),
            aliases: snapshot
                .aliases
                .into_iter()
                .map(|a| (a.name.clone(), a))
                .collect(),
            views: snapshot.views.into_iter().map(|v| (v.id, v)).collect(),
            definitions: snapshot
                .definitions
                .into_iter()
                .map(|d| (d.key.clone(), d))
                .collect(),
            events: snapshot.events,
        };
        Self {
            state: RwLock::new(state),
        }
    }
}

/// Full store content in serializable form; the CLI writes this to disk as
/// one JSON document.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub scopes: Vec<Scope>,
    pub aliases: Vec<ScopeAlias>,
    pub views: Vec<ContextView>,
    pub definitions: Vec<AspectDefinition>,
    pub events: Vec<EventRecord>,
}

// ---------------------------------------------------------------------------
// ScopeRepository
// ---------------------------------------------------------------------------

#[async_trait]
impl ScopeRepository for MemoryStore {
    async fn find_by_id(&self, id: ScopeId) -> RepoResult<Option<Scope>> {
        Ok(self.state.read().await.scopes.get(&id).cloned())
    }

    async fn find_children(&self, parent: ScopeId) -> RepoResult<Vec<Scope>> {
        let state = self.state.read().await;
        Ok(state
            .scopes
            .values()
            .filter(|s| s.parent_id() == Some(parent))
            .cloned()
            .collect())
    }

    async fn all_roots(&self) -> RepoResult<Vec<Scope>> {
        let state = self.state.read().await;
        Ok(state
            .scopes
            .values()
            .filter(|s| s.parent_id().is_none())
            .cloned()
            .collect())
    }

    async fn ancestor_path(&self, id: ScopeId) -> RepoResult<Vec<ScopeId>> {
        let state = self.state.read().await;
        let mut path = Vec::new();
        let mut cursor = state.scopes.get(&id).and_then(Scope::parent_id);
        while let Some(ancestor) = cursor {
            // A repeat means the stored tree is corrupt; stop rather than
            // loop, and let the hierarchy validators surface it.
            if path.contains(&ancestor) {
                path.push(ancestor);
                break;
            }
            path.push(ancestor);
            cursor = state.scopes.get(&ancestor).and_then(Scope::parent_id);
        }
        Ok(path)
    }

    async fn hierarchy_depth(&self, id: ScopeId) -> RepoResult<u32> {
        let path = ScopeRepository::ancestor_path(self, id).await?;
        Ok(path.len() as u32 + 1)
    }

    async fn count_children(&self, parent: Option<ScopeId>) -> RepoResult<u32> {
        let state = self.state.read().await;
        Ok(state
            .scopes
            .values()
            .filter(|s| s.parent_id() == parent)
            .count() as u32)
    }

    async fn exists_by_parent_and_title(
        &self,
        parent: Option<ScopeId>,
        title: &str,
    ) -> RepoResult<bool> {
        let state = self.state.read().await;
        Ok(state
            .scopes
            .values()
            .any(|s| s.parent_id() == parent && s.title().normalized() == title))
    }

    async fn exists(&self, id: ScopeId) -> RepoResult<bool> {
        Ok(self.state.read().await.scopes.contains_key(&id))
    }

    async fn save(&self, scope: Scope) -> RepoResult<()> {
        self.state.write().await.scopes.insert(scope.id(), scope);
        Ok(())
    }

    async fn update(&self, scope: Scope) -> RepoResult<()> {
        let mut state = self.state.write().await;
        if !state.scopes.contains_key(&scope.id()) {
            return Err(RepoError::Database(format!(
                "update of unknown scope {}",
                scope.id()
            )));
        }
        state.scopes.insert(scope.id(), scope);
        Ok(())
    }

    async fn delete(&self, id: ScopeId) -> RepoResult<()> {
        self.state.write().await.scopes.remove(&id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ScopeAliasRepository
// ---------------------------------------------------------------------------

#[async_trait]
impl ScopeAliasRepository for MemoryStore {
    async fn find_by_name(&self, name: &AliasName) -> RepoResult<Option<ScopeAlias>> {
        Ok(self.state.read().await.aliases.get(name).cloned())
    }

    async fn find_by_scope(&self, scope: ScopeId) -> RepoResult<Vec<ScopeAlias>> {
        let state = self.state.read().await;
        Ok(state
            .aliases
            .values()
            .filter(|a| a.scope_id == scope)
            .cloned()
            .collect())
    }

    async fn find_canonical(&self, scope: ScopeId) -> RepoResult<Option<ScopeAlias>> {
        let state = self.state.read().await;
        Ok(state
            .aliases
            .values()
            .find(|a| a.scope_id == scope && a.is_canonical())
            .cloned())
    }

    async fn find_by_prefix(&self, prefix: &str, limit: usize) -> RepoResult<Vec<ScopeAlias>> {
        let state = self.state.read().await;
        Ok(state
            .aliases
            .values()
            .filter(|a| a.name.as_str().starts_with(prefix))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn save(&self, alias: ScopeAlias) -> RepoResult<()> {
        let mut state = self.state.write().await;
        if state.aliases.contains_key(&alias.name) {
            return Err(RepoError::Database(format!(
                "alias {:?} already exists",
                alias.name.as_str()
            )));
        }
        state.aliases.insert(alias.name.clone(), alias);
        Ok(())
    }

    async fn update(&self, alias: ScopeAlias) -> RepoResult<()> {
        let mut state = self.state.write().await;
        if !state.aliases.contains_key(&alias.name) {
            return Err(RepoError::Database(format!(
                "update of unknown alias {:?}",
                alias.name.as_str()
            )));
        }
        state.aliases.insert(alias.name.clone(), alias);
        Ok(())
    }

    async fn remove_by_name(&self, name: &AliasName) -> RepoResult<bool> {
        Ok(self.state.write().await.aliases.remove(name).is_some())
    }

    async fn rename(&self, old: &AliasName, new: &AliasName) -> RepoResult<()> {
        let mut state = self.state.write().await;
        if state.aliases.contains_key(new) {
            return Err(RepoError::Database(format!(
                "alias {:?} already exists",
                new.as_str()
            )));
        }
        let Some(mut row) = state.aliases.remove(old) else {
            return Err(RepoError::Database(format!(
                "rename of unknown alias {:?}",
                old.as_str()
            )));
        };
        row.name = new.clone();
        state.aliases.insert(new.clone(), row);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ContextViewRepository
// ---------------------------------------------------------------------------

#[async_trait]
impl ContextViewRepository for MemoryStore {
    async fn find_by_id(&self, id: ContextViewId) -> RepoResult<Option<ContextView>> {
        Ok(self.state.read().await.views.get(&id).cloned())
    }

    async fn find_by_key(&self, key: &ContextViewKey) -> RepoResult<Option<ContextView>> {
        let state = self.state.read().await;
        Ok(state.views.values().find(|v| &v.key == key).cloned())
    }

    async fn find_by_name(&self, name: &str) -> RepoResult<Option<ContextView>> {
        let state = self.state.read().await;
        Ok(state.views.values().find(|v| v.name == name).cloned())
    }

    async fn all(&self) -> RepoResult<Vec<ContextView>> {
        Ok(self.state.read().await.views.values().cloned().collect())
    }

    async fn exists_by_key(&self, key: &ContextViewKey) -> RepoResult<bool> {
        let state = self.state.read().await;
        Ok(state.views.values().any(|v| &v.key == key))
    }

    async fn exists_by_name(&self, name: &str) -> RepoResult<bool> {
        let state = self.state.read().await;
        Ok(state.views.values().any(|v| v.name == name))
    }

    async fn save(&self, view: ContextView) -> RepoResult<()> {
        self.state.write().await.views.insert(view.id, view);
        Ok(())
    }

    async fn delete_by_id(&self, id: ContextViewId) -> RepoResult<bool> {
        Ok(self.state.write().await.views.remove(&id).is_some())
    }
}

// ---------------------------------------------------------------------------
// AspectDefinitionRepository
// ---------------------------------------------------------------------------

#[async_trait]
impl AspectDefinitionRepository for MemoryStore {
    async fn find(&self, key: &AspectKey) -> RepoResult<Option<AspectDefinition>> {
        Ok(self.state.read().await.definitions.get(key).cloned())
    }

    async fn all(&self) -> RepoResult<Vec<AspectDefinition>> {
        Ok(self
            .state
            .read()
            .await
            .definitions
            .values()
            .cloned()
            .collect())
    }

    async fn save(&self, definition: AspectDefinition) -> RepoResult<()> {
        self.state
            .write()
            .await
            .definitions
            .insert(definition.key.clone(), definition);
        Ok(())
    }

    async fn remove(&self, key: &AspectKey) -> RepoResult<bool> {
        Ok(self.state.write().await.definitions.remove(key).is_some())
    }
}

// ---------------------------------------------------------------------------
// EventStore
// ---------------------------------------------------------------------------

#[async_trait]
impl EventStore for MemoryStore {
    async fn append(&self, record: EventRecord) -> RepoResult<()> {
        self.state.write().await.events.push(record);
        Ok(())
    }

    async fn events_for(
        &self,
        aggregate: ScopeId,
        since_version: u64,
    ) -> RepoResult<Vec<EventRecord>> {
        let state = self.state.read().await;
        let mut events: Vec<EventRecord> = state
            .events
            .iter()
            .filter(|e| e.aggregate_id == aggregate && e.version > since_version)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.version);
        Ok(events)
    }

    async fn events_ahead_of(&self, clock: &VectorClock) -> RepoResult<Vec<EventRecord>> {
        let state = self.state.read().await;
        Ok(state
            .events
            .iter()
            .filter(|e| {
                e.vector_clock != *clock && !e.vector_clock.happened_before(clock)
            })
            .cloned()
            .collect())
    }

    async fn latest_clock(&self) -> RepoResult<VectorClock> {
        let state = self.state.read().await;
        Ok(state
            .events
            .iter()
            .fold(VectorClock::new(), |acc, e| acc.merge(&e.vector_clock)))
    }

    async fn contains(&self, event_id: EventId) -> RepoResult<bool> {
        let state = self.state.read().await;
        Ok(state.events.iter().any(|e| e.event_id == event_id))
    }
}
