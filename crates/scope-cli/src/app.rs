use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use scope_config::ScopesConfig;
use scope_core::alias::AliasService;
use scope_core::context::{ActiveContextService, ContextViewService};
use scope_core::scope::{HierarchyLimits, ScopeService};
use scope_core::store::{MemoryStore, StoreSnapshot};
use scope_core::DeviceId;
use scope_sync::store::SyncSnapshot;
use scope_sync::MemorySyncStore;

// ---------------------------------------------------------------------------
// Snapshot file
// ---------------------------------------------------------------------------

/// Everything the CLI persists between invocations, as one JSON document
/// under `storage.dir`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct AppSnapshot {
    #[serde(default)]
    core: StoreSnapshot,
    #[serde(default)]
    sync: SyncSnapshot,
    /// Name of the active context view, if one is switched on.
    #[serde(default)]
    active_context: Option<String>,
}

// ---------------------------------------------------------------------------
// App context
// ---------------------------------------------------------------------------

/// Wiring for one CLI invocation: configuration, stores loaded from the
/// snapshot, and the services commands run against.
pub struct App {
    pub config: ScopesConfig,
    pub device: DeviceId,
    pub store: Arc<MemoryStore>,
    pub sync_store: Arc<MemorySyncStore>,
    pub active: ActiveContextService,
    snapshot_path: PathBuf,
}

impl App {
    pub async fn open(config: ScopesConfig) -> Result<Self> {
        let device = DeviceId::parse(&config.device.id)
            .map_err(|e| anyhow::anyhow!("config device.id: {e}"))?;
        let snapshot_path = config.snapshot_path();

        let snapshot = if snapshot_path.exists() {
            let text = std::fs::read_to_string(&snapshot_path)
                .with_context(|| format!("reading {}", snapshot_path.display()))?;
            serde_json::from_str::<AppSnapshot>(&text)
                .with_context(|| format!("parsing {}", snapshot_path.display()))?
        } else {
            AppSnapshot::default()
        };

        let store = Arc::new(MemoryStore::from_snapshot(snapshot.core));
        let sync_store = Arc::new(MemorySyncStore::from_snapshot(snapshot.sync));
        let active = ActiveContextService::new(store.clone(), store.clone());
        if let Some(name) = snapshot.active_context
            && active.switch_by_name(&name).await.is_err()
        {
            tracing::warn!(domain = "ctx", context = %name, "stored active context no longer resolves");
        }

        Ok(Self {
            config,
            device,
            store,
            sync_store,
            active,
            snapshot_path,
        })
    }

    /// Persist the stores back to the snapshot file.
    pub async fn save(&self) -> Result<()> {
        let snapshot = AppSnapshot {
            core: self.store.dump().await,
            sync: self.sync_store.dump().await,
            active_context: self.active.get().await.map(|view| view.name),
        };
        if let Some(parent) = self.snapshot_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let text = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(&self.snapshot_path, text)
            .with_context(|| format!("writing {}", self.snapshot_path.display()))?;
        Ok(())
    }

    // -- services -----------------------------------------------------------

    pub fn scopes(&self) -> ScopeService {
        ScopeService::new(
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.device.clone(),
            HierarchyLimits {
                max_depth: Some(self.config.hierarchy.max_depth),
                max_children: Some(self.config.hierarchy.max_children),
            },
        )
        .with_change_tracker(self.sync_store.clone())
    }

    pub fn aliases(&self) -> AliasService {
        AliasService::new(
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.device.clone(),
        )
        .with_change_tracker(self.sync_store.clone())
    }

    pub fn contexts(&self) -> ContextViewService {
        ContextViewService::new(self.store.clone())
    }
}

/// Load the remote side of a local file-to-file sync round.
pub fn load_remote_snapshot(path: &Path) -> Result<(Arc<MemoryStore>, AppSnapshotParts)> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading remote snapshot {}", path.display()))?;
    let snapshot: AppSnapshot =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    let sync = snapshot.sync;
    let active_context = snapshot.active_context;
    let store = Arc::new(MemoryStore::from_snapshot(snapshot.core));
    Ok((
        store,
        AppSnapshotParts {
            sync,
            active_context,
        },
    ))
}

/// Remote snapshot pieces preserved across a sync round so the rewrite
/// keeps what the round did not touch.
pub struct AppSnapshotParts {
    pub sync: SyncSnapshot,
    pub active_context: Option<String>,
}

/// Write the remote store back to its snapshot file after a round.
pub async fn save_remote_snapshot(
    path: &Path,
    store: &MemoryStore,
    parts: AppSnapshotParts,
) -> Result<()> {
    let snapshot = AppSnapshot {
        core: store.dump().await,
        sync: parts.sync,
        active_context: parts.active_context,
    };
    let text = serde_json::to_string_pretty(&snapshot)?;
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
