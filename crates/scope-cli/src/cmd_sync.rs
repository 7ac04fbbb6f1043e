use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Subcommand;
use tokio_util::sync::CancellationToken;

use crate::app::{App, load_remote_snapshot, save_remote_snapshot};
use scope_config::SyncStrategy;
use scope_core::DeviceId;
use scope_sync::{
    LoopbackTransport, ResolutionStrategy, SyncOrchestrator, SyncStateRepository, SyncStatus,
};

#[derive(Subcommand)]
pub enum SyncCmd {
    /// Run one sync round against another device's snapshot file
    Run {
        /// Remote device id
        #[arg(long)]
        device: String,
        /// Path to the remote device's snapshot file
        #[arg(long)]
        with: PathBuf,
    },
    /// Show per-device sync state
    Status,
}

fn strategy(config: SyncStrategy) -> ResolutionStrategy {
    match config {
        SyncStrategy::LastWriteWins => ResolutionStrategy::LastWriteWins,
        SyncStrategy::KeepLocal => ResolutionStrategy::KeepLocal,
        SyncStrategy::KeepRemote => ResolutionStrategy::KeepRemote,
        SyncStrategy::Manual => ResolutionStrategy::Manual,
        SyncStrategy::Merge => ResolutionStrategy::Merge,
    }
}

pub async fn run(app: &App, cmd: SyncCmd) -> Result<()> {
    match cmd {
        SyncCmd::Run { device, with } => run_round(app, &device, with).await,
        SyncCmd::Status => status(app).await,
    }
}

async fn run_round(app: &App, device: &str, with: PathBuf) -> Result<()> {
    let remote = DeviceId::parse(device).map_err(|e| anyhow::anyhow!("{e}"))?;
    let (remote_store, remote_parts) = load_remote_snapshot(&with)?;

    let orchestrator = SyncOrchestrator::new(
        app.sync_store.clone(),
        app.sync_store.clone(),
        app.store.clone(),
        app.store.clone(),
        app.store.clone(),
        Arc::new(LoopbackTransport::new(remote.clone(), remote_store.clone())),
        strategy(app.config.sync.strategy),
        app.config.sync.transport_timeout.as_duration(),
    );

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.cancel();
        }
    });

    let report = orchestrator
        .sync_device(&remote, cancel)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    // Persist what the push delivered to the remote side.
    save_remote_snapshot(&with, &remote_store, remote_parts).await?;

    println!(
        "{device}: {:?} (pushed {}, pulled {}, conflicts {} / resolved {} / deferred {})",
        report.status,
        report.pushed,
        report.pulled,
        report.conflicts_detected,
        report.conflicts_resolved,
        report.conflicts_deferred,
    );
    if report.status == SyncStatus::Failed {
        // Keep the Failed state on disk even though the command errors out.
        app.save().await?;
        anyhow::bail!("sync with {device} failed: {:?}", report.failure);
    }
    Ok(())
}

async fn status(app: &App) -> Result<()> {
    let states = app
        .sync_store
        .all()
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    if states.is_empty() {
        println!("no devices synced yet");
        return Ok(());
    }
    let stale_after = chrono::Duration::seconds(app.config.sync.stale_after.as_secs() as i64);
    let now = chrono::Utc::now();
    for state in states {
        let stale = if state.is_stale(stale_after, now) {
            " (stale)"
        } else {
            ""
        };
        println!(
            "{}: {:?}, pending {}, last sync {}{stale}",
            state.device_id(),
            state.status(),
            state.pending_changes(),
            state
                .last_sync_at()
                .map(|at| at.to_rfc3339())
                .unwrap_or_else(|| "never".to_string()),
        );
    }
    Ok(())
}
