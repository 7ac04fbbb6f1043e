use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use super::*;
use crate::ids::DeviceId;
use crate::repo::ScopeAliasRepository;
use crate::scope::{HierarchyLimits, Scope, ScopeService};
use crate::store::MemoryStore;
use crate::value::AliasName;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
}

fn name(s: &str) -> AliasName {
    AliasName::parse(s).unwrap()
}

struct Fixture {
    store: Arc<MemoryStore>,
    scopes: ScopeService,
    aliases: AliasService,
}

fn setup() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let device = DeviceId::parse("laptop").unwrap();
    let scopes = ScopeService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        device.clone(),
        HierarchyLimits::default(),
    );
    let aliases = AliasService::new(store.clone(), store.clone(), store.clone(), device);
    Fixture {
        store,
        scopes,
        aliases,
    }
}

async fn make_scope(fx: &Fixture, title: &str) -> Scope {
    fx.scopes.create(title, "", None, now()).await.unwrap()
}

// -----------------------------------------------------------------------
// Kind transitions
// -----------------------------------------------------------------------

#[test]
fn kind_transition_table() {
    use AliasKind::*;
    assert!(is_valid_kind_transition(None, Canonical));
    assert!(is_valid_kind_transition(None, Custom));
    assert!(is_valid_kind_transition(Some(Canonical), Canonical));
    assert!(is_valid_kind_transition(Some(Custom), Custom));
    assert!(is_valid_kind_transition(Some(Custom), Canonical));
    assert!(!is_valid_kind_transition(Some(Canonical), Custom));
}

// -----------------------------------------------------------------------
// Add / remove
// -----------------------------------------------------------------------

#[tokio::test]
async fn custom_alias_names_are_globally_unique() {
    let fx = setup();
    let s1 = make_scope(&fx, "One").await;
    let s2 = make_scope(&fx, "Two").await;

    fx.aliases.add(s1.id(), name("shared"), now()).await.unwrap();
    assert!(fx.aliases.add(s2.id(), name("shared"), now()).await.is_err());
    // The scope aggregate mirrors the registry.
    let s1 = fx.scopes.get(s1.id()).await.unwrap();
    assert!(s1.custom_aliases().contains(&name("shared")));
}

#[tokio::test]
async fn canonical_cannot_be_removed_directly() {
    let fx = setup();
    let scope = make_scope(&fx, "One").await;
    let canonical = scope.canonical_alias().clone();
    assert!(fx.aliases.remove(&canonical, now()).await.is_err());
    // A custom alias removes fine.
    fx.aliases.add(scope.id(), name("extra"), now()).await.unwrap();
    fx.aliases.remove(&name("extra"), now()).await.unwrap();
    assert!(fx.aliases.resolve(&name("extra")).await.is_err());
}

// -----------------------------------------------------------------------
// Canonical replacement
// -----------------------------------------------------------------------

#[tokio::test]
async fn replacing_canonical_demotes_the_old_one() {
    let fx = setup();
    let scope = make_scope(&fx, "One").await;
    let old = scope.canonical_alias().clone();

    fx.aliases
        .set_canonical(scope.id(), name("primary"), now())
        .await
        .unwrap();

    let rows = fx.aliases.list(scope.id()).await.unwrap();
    let canonical: Vec<_> = rows.iter().filter(|r| r.is_canonical()).collect();
    assert_eq!(canonical.len(), 1);
    assert_eq!(canonical[0].name, name("primary"));
    assert!(
        rows.iter()
            .any(|r| r.name == old && r.kind == AliasKind::Custom)
    );

    let scope = fx.scopes.get(scope.id()).await.unwrap();
    assert_eq!(scope.canonical_alias(), &name("primary"));
    assert!(scope.custom_aliases().contains(&old));
}

#[tokio::test]
async fn promoting_an_existing_custom_alias_is_allowed() {
    let fx = setup();
    let scope = make_scope(&fx, "One").await;
    fx.aliases.add(scope.id(), name("handle"), now()).await.unwrap();

    fx.aliases
        .set_canonical(scope.id(), name("handle"), now())
        .await
        .unwrap();
    let row = fx.aliases.resolve(&name("handle")).await.unwrap();
    assert!(row.is_canonical());
}

#[tokio::test]
async fn canonical_taken_by_another_scope_is_rejected() {
    let fx = setup();
    let s1 = make_scope(&fx, "One").await;
    let s2 = make_scope(&fx, "Two").await;
    fx.aliases.add(s1.id(), name("taken"), now()).await.unwrap();
    assert!(
        fx.aliases
            .set_canonical(s2.id(), name("taken"), now())
            .await
            .is_err()
    );
}

// -----------------------------------------------------------------------
// Rename
// -----------------------------------------------------------------------

#[tokio::test]
async fn rename_to_a_name_held_by_another_scope_changes_nothing() {
    let fx = setup();
    let s1 = make_scope(&fx, "One").await;
    let s2 = make_scope(&fx, "Two").await;
    let a = s1.canonical_alias().clone();
    fx.aliases.add(s2.id(), name("b-name"), now()).await.unwrap();

    let before: Vec<_> = [
        fx.store.find_by_name(&a).await.unwrap(),
        fx.store.find_by_name(&name("b-name")).await.unwrap(),
    ]
    .into_iter()
    .flatten()
    .collect();

    assert!(fx.aliases.rename(&a, &name("b-name"), now()).await.is_err());

    // Both rows are exactly as they were.
    let after: Vec<_> = [
        fx.store.find_by_name(&a).await.unwrap(),
        fx.store.find_by_name(&name("b-name")).await.unwrap(),
    ]
    .into_iter()
    .flatten()
    .collect();
    assert_eq!(before, after);
}

#[tokio::test]
async fn rename_moves_the_row_and_keeps_its_kind() {
    let fx = setup();
    let scope = make_scope(&fx, "One").await;
    let old = scope.canonical_alias().clone();

    let renamed = fx
        .aliases
        .rename(&old, &name("fresh-name"), now())
        .await
        .unwrap();
    assert_eq!(renamed.kind, AliasKind::Canonical);
    assert!(fx.store.find_by_name(&old).await.unwrap().is_none());

    let scope = fx.scopes.get(scope.id()).await.unwrap();
    assert_eq!(scope.canonical_alias(), &name("fresh-name"));
}

#[tokio::test]
async fn rename_preserves_scope_and_kind_pairs() {
    let fx = setup();
    let scope = make_scope(&fx, "One").await;
    fx.aliases.add(scope.id(), name("first"), now()).await.unwrap();

    let pairs = |rows: Vec<ScopeAlias>| {
        let mut p: Vec<_> = rows.into_iter().map(|r| (r.scope_id, r.kind)).collect();
        p.sort();
        p
    };
    let before = pairs(fx.aliases.list(scope.id()).await.unwrap());
    fx.aliases
        .rename(&name("first"), &name("second"), now())
        .await
        .unwrap();
    let after = pairs(fx.aliases.list(scope.id()).await.unwrap());
    assert_eq!(before, after);
}

#[tokio::test]
async fn same_scope_merge_keeps_the_old_kind() {
    let fx = setup();
    let scope = make_scope(&fx, "One").await;
    let canonical = scope.canonical_alias().clone();
    fx.aliases.add(scope.id(), name("spare"), now()).await.unwrap();

    // Canonical renamed onto the scope's own custom alias: the surviving
    // row is canonical and the old name is gone.
    let merged = fx
        .aliases
        .rename(&canonical, &name("spare"), now())
        .await
        .unwrap();
    assert_eq!(merged.kind, AliasKind::Canonical);
    assert!(fx.store.find_by_name(&canonical).await.unwrap().is_none());

    let scope = fx.scopes.get(scope.id()).await.unwrap();
    assert_eq!(scope.canonical_alias(), &name("spare"));
    assert!(!scope.custom_aliases().contains(&name("spare")));
}

// -----------------------------------------------------------------------
// Completion
// -----------------------------------------------------------------------

#[tokio::test]
async fn prefix_completion_respects_the_limit() {
    let fx = setup();
    let scope = make_scope(&fx, "One").await;
    for i in 0..5 {
        fx.aliases
            .add(scope.id(), name(&format!("team-{i}")), now())
            .await
            .unwrap();
    }
    let hits = fx.aliases.complete("team-", 3).await.unwrap();
    assert_eq!(hits.len(), 3);
    assert!(hits.iter().all(|a| a.name.as_str().starts_with("team-")));
}
