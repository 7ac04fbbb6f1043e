use async_trait::async_trait;

use crate::alias::ScopeAlias;
use crate::aspect::AspectDefinition;
use crate::context::ContextView;
use crate::ids::{ContextViewId, ScopeId};
use crate::scope::Scope;
use crate::value::{AliasName, AspectKey, ContextViewKey};

// ---------------------------------------------------------------------------
// Repository failures
// ---------------------------------------------------------------------------

/// Failure surfaced by a persistence collaborator. The core never looks at
/// the message; it only routes the kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepoError {
    #[error("store connection failed: {0}")]
    Connection(String),
    #[error("store operation failed: {0}")]
    Database(String),
    #[error("store operation timed out: {0}")]
    Timeout(String),
    #[error("store failure: {0}")]
    Unknown(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

// ---------------------------------------------------------------------------
// Scope repository
// ---------------------------------------------------------------------------

/// Persistence contract for scope aggregates. Hierarchy queries are served
/// here so the aggregate itself never holds child references.
#[async_trait]
pub trait ScopeRepository: Send + Sync {
    async fn find_by_id(&self, id: ScopeId) -> RepoResult<Option<Scope>>;
    async fn find_children(&self, parent: ScopeId) -> RepoResult<Vec<Scope>>;
    async fn all_roots(&self) -> RepoResult<Vec<Scope>>;
    /// Ancestor chain of `id`, nearest parent first, excluding `id` itself.
    async fn ancestor_path(&self, id: ScopeId) -> RepoResult<Vec<ScopeId>>;
    /// Depth of `id` in the tree; a root has depth 1.
    async fn hierarchy_depth(&self, id: ScopeId) -> RepoResult<u32>;
    async fn count_children(&self, parent: Option<ScopeId>) -> RepoResult<u32>;
    /// Sibling-title uniqueness probe; `title` is already normalized
    /// (trimmed + lowercased).
    async fn exists_by_parent_and_title(
        &self,
        parent: Option<ScopeId>,
        title: &str,
    ) -> RepoResult<bool>;
    async fn exists(&self, id: ScopeId) -> RepoResult<bool>;
    async fn save(&self, scope: Scope) -> RepoResult<()>;
    async fn update(&self, scope: Scope) -> RepoResult<()>;
    async fn delete(&self, id: ScopeId) -> RepoResult<()>;
}

// ---------------------------------------------------------------------------
// Alias repository
// ---------------------------------------------------------------------------

/// Persistence contract for alias records. Single-row operations are atomic;
/// `rename` moves a row to a new name in one step or not at all.
#[async_trait]
pub trait ScopeAliasRepository: Send + Sync {
    async fn find_by_name(&self, name: &AliasName) -> RepoResult<Option<ScopeAlias>>;
    async fn find_by_scope(&self, scope: ScopeId) -> RepoResult<Vec<ScopeAlias>>;
    async fn find_canonical(&self, scope: ScopeId) -> RepoResult<Option<ScopeAlias>>;
    async fn find_by_prefix(&self, prefix: &str, limit: usize) -> RepoResult<Vec<ScopeAlias>>;
    async fn save(&self, alias: ScopeAlias) -> RepoResult<()>;
    async fn update(&self, alias: ScopeAlias) -> RepoResult<()>;
    async fn remove_by_name(&self, name: &AliasName) -> RepoResult<bool>;
    /// Atomically re-key the row at `old` to `new`. Fails `Database` when
    /// `old` is missing or `new` is already taken; on failure neither row
    /// changes.
    async fn rename(&self, old: &AliasName, new: &AliasName) -> RepoResult<()>;
}

// ---------------------------------------------------------------------------
// Context view repository
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ContextViewRepository: Send + Sync {
    async fn find_by_id(&self, id: ContextViewId) -> RepoResult<Option<ContextView>>;
    async fn find_by_key(&self, key: &ContextViewKey) -> RepoResult<Option<ContextView>>;
    async fn find_by_name(&self, name: &str) -> RepoResult<Option<ContextView>>;
    async fn all(&self) -> RepoResult<Vec<ContextView>>;
    async fn exists_by_key(&self, key: &ContextViewKey) -> RepoResult<bool>;
    async fn exists_by_name(&self, name: &str) -> RepoResult<bool>;
    async fn save(&self, view: ContextView) -> RepoResult<()>;
    async fn delete_by_id(&self, id: ContextViewId) -> RepoResult<bool>;
}

// ---------------------------------------------------------------------------
// Change tracking
// ---------------------------------------------------------------------------

/// Observer of committed local mutations.
///
/// The application services call this once per event they append, so the
/// sync subsystem can keep per-remote-device pending-change counters live.
/// Implementations must tolerate being called before any device is known.
#[async_trait]
pub trait ChangeTracker: Send + Sync {
    async fn record_local_changes(&self, count: u32) -> RepoResult<()>;
}

// ---------------------------------------------------------------------------
// Aspect definition repository
// ---------------------------------------------------------------------------

#[async_trait]
pub trait AspectDefinitionRepository: Send + Sync {
    async fn find(&self, key: &AspectKey) -> RepoResult<Option<AspectDefinition>>;
    async fn all(&self) -> RepoResult<Vec<AspectDefinition>>;
    async fn save(&self, definition: AspectDefinition) -> RepoResult<()>;
    async fn remove(&self, key: &AspectKey) -> RepoResult<bool>;
}
