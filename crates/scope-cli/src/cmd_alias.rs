use anyhow::Result;
use chrono::Utc;
use clap::Subcommand;

use crate::app::App;
use crate::cmd_scope::resolve_id;
use scope_core::AliasName;

#[derive(Subcommand)]
pub enum AliasCmd {
    /// Attach a custom alias to a scope
    Add { reference: String, name: String },
    /// Remove a custom alias
    Rm { name: String },
    /// Rename an alias
    Rename { old: String, new: String },
    /// Make an alias the scope's canonical name
    SetCanonical { reference: String, name: String },
    /// Show which scope an alias names
    Resolve { name: String },
    /// List a scope's aliases
    Ls { reference: String },
}

fn parse_name(s: &str) -> Result<AliasName> {
    AliasName::parse(s).map_err(|e| anyhow::anyhow!("{e}"))
}

pub async fn run(app: &App, cmd: AliasCmd) -> Result<()> {
    let service = app.aliases();
    match cmd {
        AliasCmd::Add { reference, name } => {
            let id = resolve_id(app, &reference).await?;
            let row = service
                .add(id, parse_name(&name)?, Utc::now())
                .await
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            println!("added {} -> {}", row.name, row.scope_id);
        }
        AliasCmd::Rm { name } => {
            service
                .remove(&parse_name(&name)?, Utc::now())
                .await
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            println!("removed {name}");
        }
        AliasCmd::Rename { old, new } => {
            let row = service
                .rename(&parse_name(&old)?, &parse_name(&new)?, Utc::now())
                .await
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            println!("renamed {old} -> {}", row.name);
        }
        AliasCmd::SetCanonical { reference, name } => {
            let id = resolve_id(app, &reference).await?;
            let row = service
                .set_canonical(id, parse_name(&name)?, Utc::now())
                .await
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            println!("canonical alias of {} is now {}", row.scope_id, row.name);
        }
        AliasCmd::Resolve { name } => {
            let row = service
                .resolve(&parse_name(&name)?)
                .await
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            println!("{} -> {} ({:?})", row.name, row.scope_id, row.kind);
        }
        AliasCmd::Ls { reference } => {
            let id = resolve_id(app, &reference).await?;
            let rows = service.list(id).await.map_err(|e| anyhow::anyhow!("{e}"))?;
            for row in rows {
                let marker = if row.is_canonical() { "*" } else { " " };
                println!("{marker} {}", row.name);
            }
        }
    }
    Ok(())
}
