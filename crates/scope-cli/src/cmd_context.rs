use anyhow::Result;
use chrono::Utc;
use clap::Subcommand;

use crate::app::App;
use scope_core::ContextViewKey;

#[derive(Subcommand)]
pub enum ContextCmd {
    /// Save a named filter view
    Create {
        key: String,
        name: String,
        /// Filter expression, e.g. `priority == "high" AND NOT blocked == "true"`
        filter: String,
    },
    /// List saved views
    Ls,
    /// Make a view the active context
    Switch { name: String },
    /// Show the active context
    Current,
    /// Clear the active context
    Clear,
}

pub async fn run(app: &App, cmd: ContextCmd) -> Result<()> {
    match cmd {
        ContextCmd::Create { key, name, filter } => {
            let key = ContextViewKey::parse(&key).map_err(|e| anyhow::anyhow!("{e}"))?;
            let view = app
                .contexts()
                .create(key, &name, &filter, Utc::now())
                .await
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            println!("created context {} ({})", view.name, view.key);
        }
        ContextCmd::Ls => {
            let views = app
                .contexts()
                .list()
                .await
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            if views.is_empty() {
                println!("no contexts");
                return Ok(());
            }
            let active = app.active.get().await;
            for view in views {
                let marker = if active.as_ref().is_some_and(|a| a.id == view.id) {
                    "*"
                } else {
                    " "
                };
                println!("{marker} {}  {}  {}", view.key, view.name, view.filter);
            }
        }
        ContextCmd::Switch { name } => {
            let view = app
                .active
                .switch_by_name(&name)
                .await
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            println!("switched to {} ({})", view.name, view.filter);
        }
        ContextCmd::Current => match app.active.get().await {
            Some(view) => println!("{}  {}", view.name, view.filter),
            None => println!("no active context"),
        },
        ContextCmd::Clear => {
            match app.active.clear().await {
                Some(view) => println!("cleared {}", view.name),
                None => println!("no active context"),
            };
        }
    }
    Ok(())
}
