use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::logging::LoggingConfig;
use crate::types::HumanDuration;

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Identity of this installation in the sync mesh.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Device id used in vector clocks; must be non-blank and should be
    /// unique across the user's devices.
    pub id: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            id: "local".to_string(),
        }
    }
}

/// Where persisted state lives.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Data directory. A relative path is resolved against the config
    /// file's parent directory.
    pub dir: PathBuf,
    /// Snapshot file name inside `dir`.
    pub snapshot: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".scopes"),
            snapshot: "scopes.json".to_string(),
        }
    }
}

/// Overrides for the tree guards.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HierarchyConfig {
    pub max_depth: u32,
    pub max_children: u32,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            max_children: 100,
        }
    }
}

/// Conflict-handling policy for a sync round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncStrategy {
    LastWriteWins,
    KeepLocal,
    KeepRemote,
    Manual,
    Merge,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Conflict resolution strategy applied during a round.
    pub strategy: SyncStrategy,
    /// Per-operation transport timeout.
    pub transport_timeout: HumanDuration,
    /// Age after which a device's sync state counts as stale.
    pub stale_after: HumanDuration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            strategy: SyncStrategy::LastWriteWins,
            transport_timeout: HumanDuration::from(Duration::from_secs(30)),
            stale_after: HumanDuration::from(Duration::from_secs(3600)),
        }
    }
}

// ---------------------------------------------------------------------------
// ScopesConfig
// ---------------------------------------------------------------------------

/// Root of `scopes.toml`. Every section is optional; an empty file (or no
/// file at all) yields a fully defaulted configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScopesConfig {
    pub device: DeviceConfig,
    pub storage: StorageConfig,
    pub hierarchy: HierarchyConfig,
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

impl ScopesConfig {
    /// Load and validate a config file, resolving relative paths against
    /// the file's parent directory.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let mut config: Self = toml::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.device.id.trim().is_empty() {
            anyhow::bail!("device.id must not be blank");
        }
        if self.hierarchy.max_depth == 0 {
            anyhow::bail!("hierarchy.max_depth must be at least 1");
        }
        if self.hierarchy.max_children == 0 {
            anyhow::bail!("hierarchy.max_children must be at least 1");
        }
        if self.sync.transport_timeout.as_secs() == 0 {
            anyhow::bail!("sync.transport_timeout must be positive");
        }
        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        if self.storage.dir.is_relative() {
            self.storage.dir = base.join(&self.storage.dir);
        }
        if let Some(file) = &self.logging.file
            && file.is_relative()
        {
            self.logging.file = Some(base.join(file));
        }
    }

    /// Full path of the snapshot file.
    pub fn snapshot_path(&self) -> PathBuf {
        self.storage.dir.join(&self.storage.snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_is_fully_defaulted() {
        let config: ScopesConfig = toml::from_str("").unwrap();
        config.validate().unwrap();
        assert_eq!(config.device.id, "local");
        assert_eq!(config.hierarchy.max_depth, 10);
        assert_eq!(config.hierarchy.max_children, 100);
        assert_eq!(config.sync.strategy, SyncStrategy::LastWriteWins);
        assert_eq!(config.sync.transport_timeout.as_secs(), 30);
        assert_eq!(config.storage.snapshot, "scopes.json");
    }

    #[test]
    fn sections_parse_from_toml() {
        let config: ScopesConfig = toml::from_str(
            r#"
[device]
id = "laptop"

[storage]
dir = "/var/lib/scopes"

[hierarchy]
max_depth = 6
max_children = 20

[sync]
strategy = "keep-local"
transport_timeout = "5s"
stale_after = "2h"

[logging]
level = "debug"
format = "json"
"#,
        )
        .unwrap();
        assert_eq!(config.device.id, "laptop");
        assert_eq!(config.hierarchy.max_depth, 6);
        assert_eq!(config.sync.strategy, SyncStrategy::KeepLocal);
        assert_eq!(config.sync.stale_after.as_secs(), 7200);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(
            config.snapshot_path(),
            PathBuf::from("/var/lib/scopes/scopes.json")
        );
    }

    #[test]
    fn unknown_strategy_is_a_parse_error() {
        let err = toml::from_str::<ScopesConfig>("[sync]\nstrategy = \"coin-flip\"\n");
        assert!(err.is_err());
    }

    #[test]
    fn blank_device_id_fails_validation() {
        let config: ScopesConfig = toml::from_str("[device]\nid = \"  \"\n").unwrap();
        assert!(config.validate().is_err());
    }
}
