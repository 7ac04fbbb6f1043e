use anyhow::Result;
use chrono::Utc;

use crate::app::App;
use scope_core::{Scope, ScopeId};

/// Resolve an id-or-alias reference to a scope id.
pub async fn resolve_id(app: &App, reference: &str) -> Result<ScopeId> {
    let scope = app
        .scopes()
        .resolve(reference)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    Ok(scope.id())
}

fn print_scope(scope: &Scope) {
    println!("{}  {}", scope.id(), scope.title().as_str());
    println!("  alias: {}", scope.canonical_alias());
    if let Some(parent) = scope.parent_id() {
        println!("  parent: {parent}");
    }
    if let Some(description) = scope.description() {
        println!("  description: {}", description.as_str());
    }
    for (key, values) in scope.aspects() {
        let joined: Vec<&str> = values.iter().map(|v| v.as_str()).collect();
        println!("  {key}: {}", joined.join(", "));
    }
    if !scope.custom_aliases().is_empty() {
        let names: Vec<&str> = scope.custom_aliases().iter().map(|a| a.as_str()).collect();
        println!("  aliases: {}", names.join(", "));
    }
}

pub async fn create(app: &App, title: &str, description: &str, parent: Option<&str>) -> Result<()> {
    let parent_id = match parent {
        Some(reference) => Some(resolve_id(app, reference).await?),
        None => None,
    };
    let scope = app
        .scopes()
        .create(title, description, parent_id, Utc::now())
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    println!("created {} ({})", scope.canonical_alias(), scope.id());
    Ok(())
}

pub async fn get(app: &App, reference: &str) -> Result<()> {
    let scope = app
        .scopes()
        .resolve(reference)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    print_scope(&scope);
    Ok(())
}

pub async fn list(app: &App, parent: Option<&str>) -> Result<()> {
    let service = app.scopes();
    let scopes = match parent {
        Some(reference) => {
            let id = resolve_id(app, reference).await?;
            service.children(id).await.map_err(|e| anyhow::anyhow!("{e}"))?
        }
        None => service.roots().await.map_err(|e| anyhow::anyhow!("{e}"))?,
    };

    // The active context narrows the listing through its filter.
    if let Some(view) = app.active.get().await {
        println!("context: {} ({})", view.name, view.filter);
    }
    let scopes = app
        .active
        .list_matching(scopes)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    if scopes.is_empty() {
        println!("no scopes");
        return Ok(());
    }
    for scope in &scopes {
        println!(
            "{}  {}  [{}]",
            scope.id(),
            scope.title().as_str(),
            scope.canonical_alias()
        );
    }
    Ok(())
}

pub async fn update(
    app: &App,
    reference: &str,
    title: Option<&str>,
    description: Option<&str>,
) -> Result<()> {
    let id = resolve_id(app, reference).await?;
    let service = app.scopes();
    if let Some(title) = title {
        service
            .rename(id, title, Utc::now())
            .await
            .map_err(|e| anyhow::anyhow!("{e}"))?;
    }
    if let Some(description) = description {
        service
            .describe(id, description, Utc::now())
            .await
            .map_err(|e| anyhow::anyhow!("{e}"))?;
    }
    println!("updated {id}");
    Ok(())
}

pub async fn delete(app: &App, reference: &str) -> Result<()> {
    let id = resolve_id(app, reference).await?;
    app.scopes()
        .delete(id, Utc::now())
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    println!("deleted {id}");
    Ok(())
}

