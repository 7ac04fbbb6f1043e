use anyhow::Result;
use chrono::Utc;
use clap::Subcommand;

use crate::app::App;
use crate::cmd_scope::resolve_id;
use scope_core::aspect::{AspectDefinition, AspectType, parse_aspect_entry};
use scope_core::repo::AspectDefinitionRepository;
use scope_core::{AspectKey, AspectValue};

#[derive(Subcommand)]
pub enum AspectCmd {
    /// Set aspect values from key:value entries
    Set {
        reference: String,
        /// Entries like `priority:high` or `estimate=3`; repeating a key
        /// collects multiple values
        #[arg(required = true)]
        entries: Vec<String>,
    },
    /// Remove an aspect
    Rm { reference: String, key: String },
    /// Show a scope's aspects
    Show { reference: String },
    /// List registered aspect definitions
    Ls,
    /// Register an aspect definition
    Define {
        key: String,
        /// Value domain: ordered, numeric, boolean, text, duration
        #[arg(long = "type", value_name = "TYPE")]
        aspect_type: String,
        /// Allowed values, in order, for the ordered type
        #[arg(long, value_delimiter = ',')]
        values: Vec<String>,
        /// Allow multiple values per scope
        #[arg(long)]
        multiple: bool,
        #[arg(long)]
        description: Option<String>,
    },
    /// Check a scope against every registered definition
    Validate { reference: String },
}

pub async fn run(app: &App, cmd: AspectCmd) -> Result<()> {
    match cmd {
        AspectCmd::Set { reference, entries } => set(app, &reference, &entries).await,
        AspectCmd::Rm { reference, key } => rm(app, &reference, &key).await,
        AspectCmd::Show { reference } => show(app, &reference).await,
        AspectCmd::Ls => ls(app).await,
        AspectCmd::Define {
            key,
            aspect_type,
            values,
            multiple,
            description,
        } => define(app, &key, &aspect_type, values, multiple, description).await,
        AspectCmd::Validate { reference } => validate(app, &reference).await,
    }
}

async fn set(app: &App, reference: &str, entries: &[String]) -> Result<()> {
    let id = resolve_id(app, reference).await?;
    let service = app.scopes();

    // Group entries by key so `tag:a tag:b` becomes one multi-valued set.
    let mut grouped: Vec<(AspectKey, Vec<AspectValue>)> = Vec::new();
    for entry in entries {
        let (key, value) = parse_aspect_entry(entry).map_err(|e| anyhow::anyhow!("{e}"))?;
        match grouped.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => grouped.push((key, vec![value])),
        }
    }
    for (key, values) in grouped {
        service
            .set_aspect(id, key.clone(), values, Utc::now())
            .await
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        println!("set {key}");
    }
    Ok(())
}

async fn rm(app: &App, reference: &str, key: &str) -> Result<()> {
    let id = resolve_id(app, reference).await?;
    let key = AspectKey::parse(key).map_err(|e| anyhow::anyhow!("{e}"))?;
    app.scopes()
        .remove_aspect(id, &key, Utc::now())
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    println!("removed {key}");
    Ok(())
}

async fn show(app: &App, reference: &str) -> Result<()> {
    let scope = app
        .scopes()
        .resolve(reference)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    if scope.aspects().is_empty() {
        println!("no aspects");
        return Ok(());
    }
    for (key, values) in scope.aspects() {
        let joined: Vec<&str> = values.iter().map(|v| v.as_str()).collect();
        println!("{key}: {}", joined.join(", "));
    }
    Ok(())
}

async fn ls(app: &App) -> Result<()> {
    let defs = app.store.all().await.map_err(|e| anyhow::anyhow!("{e}"))?;
    if defs.is_empty() {
        println!("no aspect definitions");
        return Ok(());
    }
    for def in defs {
        let kind = match &def.aspect_type {
            AspectType::Ordered { values } => {
                let names: Vec<&str> = values.iter().map(|v| v.as_str()).collect();
                format!("ordered({})", names.join(" < "))
            }
            AspectType::Numeric => "numeric".to_string(),
            AspectType::Boolean => "boolean".to_string(),
            AspectType::Text => "text".to_string(),
            AspectType::Duration => "duration".to_string(),
        };
        let multi = if def.allow_multiple { ", multiple" } else { "" };
        println!("{}: {kind}{multi}", def.key);
    }
    Ok(())
}

async fn define(
    app: &App,
    key: &str,
    type_name: &str,
    values: Vec<String>,
    multiple: bool,
    description: Option<String>,
) -> Result<()> {
    let key = AspectKey::parse(key).map_err(|e| anyhow::anyhow!("{e}"))?;
    let aspect_type = match type_name {
        "ordered" => {
            if values.is_empty() {
                anyhow::bail!("--values is required for the ordered type");
            }
            let parsed: Result<Vec<AspectValue>, _> =
                values.iter().map(|v| AspectValue::parse(v)).collect();
            AspectType::Ordered {
                values: parsed.map_err(|e| anyhow::anyhow!("{e}"))?,
            }
        }
        "numeric" => AspectType::Numeric,
        "boolean" => AspectType::Boolean,
        "text" => AspectType::Text,
        "duration" => AspectType::Duration,
        other => anyhow::bail!("unknown aspect type {other:?} (expected ordered/numeric/boolean/text/duration)"),
    };
    let mut def = AspectDefinition::new(key.clone(), aspect_type);
    def.allow_multiple = multiple;
    def.description = description;
    app.store
        .save(def)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    println!("defined {key}");
    Ok(())
}

async fn validate(app: &App, reference: &str) -> Result<()> {
    let id = resolve_id(app, reference).await?;
    let violations = app
        .scopes()
        .validate_aspects(id)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    if violations.is_empty() {
        println!("ok");
        return Ok(());
    }
    for violation in &violations {
        println!("invalid: {violation}");
    }
    anyhow::bail!("{} aspect violation(s)", violations.len())
}
