mod app;
mod cmd_alias;
mod cmd_aspect;
mod cmd_context;
mod cmd_scope;
mod cmd_sync;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use app::App;
use scope_config::ScopesConfig;
use scope_sync::tracing_init::init_tracing;

#[derive(Parser)]
#[command(name = "scopes", about = "Local-first scope manager with device sync")]
struct Cli {
    /// Path to scopes.toml; defaults apply when absent.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a scope
    Create {
        title: String,
        /// Free-text description
        #[arg(short, long, default_value = "")]
        description: String,
        /// Parent scope (id or alias)
        #[arg(short, long)]
        parent: Option<String>,
    },
    /// Show one scope (by id or alias)
    Get { reference: String },
    /// List scopes; the active context's filter applies
    List {
        /// List children of this scope instead of roots
        #[arg(short, long)]
        parent: Option<String>,
    },
    /// Update title or description
    Update {
        reference: String,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Delete a scope (rejected while it has children)
    Delete { reference: String },
    /// Typed metadata on scopes
    #[command(subcommand)]
    Aspect(cmd_aspect::AspectCmd),
    /// Saved filter views and the active context
    #[command(subcommand)]
    Context(cmd_context::ContextCmd),
    /// Alias management
    #[command(subcommand)]
    Alias(cmd_alias::AliasCmd),
    /// Device synchronization
    #[command(subcommand)]
    Sync(cmd_sync::SyncCmd),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ScopesConfig::load(path)?,
        None => {
            let default = PathBuf::from("scopes.toml");
            if default.exists() {
                ScopesConfig::load(&default)?
            } else {
                ScopesConfig::default()
            }
        }
    };
    let _guard = init_tracing(&config.logging)?;

    let app = App::open(config).await?;
    match cli.command {
        Commands::Create {
            title,
            description,
            parent,
        } => cmd_scope::create(&app, &title, &description, parent.as_deref()).await?,
        Commands::Get { reference } => cmd_scope::get(&app, &reference).await?,
        Commands::List { parent } => cmd_scope::list(&app, parent.as_deref()).await?,
        Commands::Update {
            reference,
            title,
            description,
        } => cmd_scope::update(&app, &reference, title.as_deref(), description.as_deref()).await?,
        Commands::Delete { reference } => cmd_scope::delete(&app, &reference).await?,
        Commands::Aspect(cmd) => cmd_aspect::run(&app, cmd).await?,
        Commands::Context(cmd) => cmd_context::run(&app, cmd).await?,
        Commands::Alias(cmd) => cmd_alias::run(&app, cmd).await?,
        Commands::Sync(cmd) => cmd_sync::run(&app, cmd).await?,
    }
    app.save().await?;
    Ok(())
}
