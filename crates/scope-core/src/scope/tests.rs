use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use super::*;
use crate::error::CoreReason;
use crate::ids::{DeviceId, ScopeId};
use crate::store::MemoryStore;
use crate::value::{AliasName, AspectKey, AspectValue, ScopeTitle};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
}

fn title(s: &str) -> ScopeTitle {
    ScopeTitle::parse(s).unwrap()
}

fn alias(s: &str) -> AliasName {
    AliasName::parse(s).unwrap()
}

fn setup() -> (Arc<MemoryStore>, ScopeService) {
    let store = Arc::new(MemoryStore::new());
    let service = ScopeService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        DeviceId::parse("laptop").unwrap(),
        HierarchyLimits::default(),
    );
    (store, service)
}

// -----------------------------------------------------------------------
// Aggregate & events
// -----------------------------------------------------------------------

#[test]
fn create_and_mutate_then_replay_round_trips() {
    let id = ScopeId::generate();
    let (mut scope, created) = Scope::create(
        id,
        None,
        title("Alpha"),
        None,
        alias("calm-harbor-0a1b2c"),
        now(),
    );

    let mut events = vec![created];
    events.push(scope.rename(title("Alpha 2"), now()));
    events.push(scope.set_aspect(
        AspectKey::parse("priority").unwrap(),
        vec![AspectValue::parse("high").unwrap()],
        now(),
    ));
    events.push(scope.add_custom_alias(alias("release-train"), now()));
    events.push(scope.replace_canonical(alias("alpha-two"), now()));

    let replayed = Scope::replay(events.iter()).unwrap();
    assert_eq!(replayed, scope);
    assert_eq!(replayed.version(), 5);
    assert_eq!(replayed.canonical_alias(), &alias("alpha-two"));
    assert!(replayed.custom_aliases().contains(&alias("calm-harbor-0a1b2c")));
}

#[test]
fn replay_requires_a_created_head() {
    let event = ScopeEvent::TitleChanged {
        title: title("Orphan"),
        at: now(),
    };
    assert!(Scope::replay([&event]).is_none());
}

#[test]
fn alias_rename_event_moves_the_right_name() {
    let id = ScopeId::generate();
    let (mut scope, _) = Scope::create(id, None, title("T"), None, alias("old-name"), now());
    scope.add_custom_alias(alias("extra"), now());

    scope.rename_alias(alias("extra"), alias("extra2"), now());
    assert!(scope.custom_aliases().contains(&alias("extra2")));
    assert!(!scope.custom_aliases().contains(&alias("extra")));

    scope.rename_alias(alias("old-name"), alias("new-name"), now());
    assert_eq!(scope.canonical_alias(), &alias("new-name"));
}

#[test]
fn setting_an_empty_value_list_removes_the_aspect() {
    let id = ScopeId::generate();
    let (mut scope, _) = Scope::create(id, None, title("T"), None, alias("some-name"), now());
    let key = AspectKey::parse("priority").unwrap();
    scope.set_aspect(key.clone(), vec![AspectValue::parse("high").unwrap()], now());
    scope.set_aspect(key.clone(), vec![], now());
    assert!(!scope.aspects().contains_key(&key));
}

// -----------------------------------------------------------------------
// Creation validation
// -----------------------------------------------------------------------

#[tokio::test]
async fn duplicate_root_title_is_rejected_after_normalization() {
    let (_, service) = setup();
    service.create("Alpha", "", None, now()).await.unwrap();

    let issues = service
        .validate_creation("  alpha ", "", None)
        .await
        .unwrap()
        .unwrap_err();
    match issues.first() {
        CoreReason::Hierarchy(HierarchyError::DuplicateTitle { title, parent }) => {
            assert_eq!(title, "alpha");
            assert_eq!(*parent, None);
        }
        other => panic!("expected DuplicateTitle, got {other:?}"),
    }
    assert!(service.create(" alpha ", "", None, now()).await.is_err());
}

#[tokio::test]
async fn same_title_under_different_parents_is_fine() {
    let (_, service) = setup();
    let a = service.create("A", "", None, now()).await.unwrap();
    let b = service.create("B", "", None, now()).await.unwrap();
    service.create("Task", "", Some(a.id()), now()).await.unwrap();
    assert!(service.create("Task", "", Some(b.id()), now()).await.is_ok());
}

#[tokio::test]
async fn validation_accumulates_every_failure() {
    let (_, service) = setup();
    let missing_parent = ScopeId::generate();
    let issues = service
        .validate_creation("", &"d".repeat(1001), Some(missing_parent))
        .await
        .unwrap()
        .unwrap_err();
    // Empty title, oversized description, unknown parent — all reported.
    assert_eq!(issues.all().len(), 3);
}

#[tokio::test]
async fn depth_limit_rejects_the_eleventh_level() {
    let (_, service) = setup();
    let mut parent = None;
    for i in 0..10 {
        let scope = service
            .create(&format!("level {i}"), "", parent, now())
            .await
            .unwrap();
        parent = Some(scope.id());
    }
    let issues = service
        .validate_creation("level 10", "", parent)
        .await
        .unwrap()
        .unwrap_err();
    match issues.first() {
        CoreReason::Hierarchy(HierarchyError::MaxDepthExceeded { max, attempted }) => {
            assert_eq!((*max, *attempted), (10, 11));
        }
        other => panic!("expected MaxDepthExceeded, got {other:?}"),
    }
}

#[tokio::test]
async fn children_limit_is_enforced() {
    let store = Arc::new(MemoryStore::new());
    let service = ScopeService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        DeviceId::parse("laptop").unwrap(),
        HierarchyLimits {
            max_depth: Some(10),
            max_children: Some(3),
        },
    );
    let parent = service.create("parent", "", None, now()).await.unwrap();
    for i in 0..3 {
        service
            .create(&format!("child {i}"), "", Some(parent.id()), now())
            .await
            .unwrap();
    }
    let issues = service
        .validate_creation("child 3", "", Some(parent.id()))
        .await
        .unwrap()
        .unwrap_err();
    assert!(matches!(
        issues.first(),
        CoreReason::Hierarchy(HierarchyError::MaxChildrenExceeded { max: 3, current: 3 })
    ));
}

// -----------------------------------------------------------------------
// Service mutations
// -----------------------------------------------------------------------

#[tokio::test]
async fn create_appends_event_and_registers_canonical_alias() {
    let (store, service) = setup();
    let scope = service.create("Alpha", "notes", None, now()).await.unwrap();

    use crate::event::EventStore;
    let events = store.events_for(scope.id(), 0).await.unwrap();
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0].payload, ScopeEvent::Created { .. }));
    assert_eq!(events[0].version, 1);
    assert_eq!(events[0].vector_clock.get(service.device()), 1);

    use crate::repo::ScopeAliasRepository;
    let canonical = store.find_canonical(scope.id()).await.unwrap().unwrap();
    assert_eq!(&canonical.name, scope.canonical_alias());
}

#[tokio::test]
async fn rename_checks_sibling_titles_but_allows_case_change() {
    let (_, service) = setup();
    let a = service.create("Alpha", "", None, now()).await.unwrap();
    service.create("Beta", "", None, now()).await.unwrap();

    assert!(service.rename(a.id(), "beta", now()).await.is_err());
    // Re-casing itself is not a collision.
    let renamed = service.rename(a.id(), "ALPHA", now()).await.unwrap();
    assert_eq!(renamed.title().as_str(), "ALPHA");
}

#[tokio::test]
async fn move_rejects_cycles_and_self() {
    let (_, service) = setup();
    let a = service.create("A", "", None, now()).await.unwrap();
    let b = service.create("B", "", Some(a.id()), now()).await.unwrap();
    let c = service.create("C", "", Some(b.id()), now()).await.unwrap();

    assert!(service.move_scope(a.id(), Some(a.id()), now()).await.is_err());
    assert!(service.move_scope(a.id(), Some(c.id()), now()).await.is_err());
    let moved = service.move_scope(c.id(), Some(a.id()), now()).await.unwrap();
    assert_eq!(moved.parent_id(), Some(a.id()));
}

#[tokio::test]
async fn delete_with_children_is_rejected() {
    let (_, service) = setup();
    let parent = service.create("parent", "", None, now()).await.unwrap();
    service
        .create("child", "", Some(parent.id()), now())
        .await
        .unwrap();

    assert!(service.delete(parent.id(), now()).await.is_err());
    // Still present.
    assert!(service.get(parent.id()).await.is_ok());
}

#[tokio::test]
async fn delete_leaf_removes_scope_and_aliases() {
    let (store, service) = setup();
    let scope = service.create("leaf", "", None, now()).await.unwrap();
    service.delete(scope.id(), now()).await.unwrap();

    assert!(service.get(scope.id()).await.is_err());
    use crate::repo::ScopeAliasRepository;
    assert!(store.find_by_scope(scope.id()).await.unwrap().is_empty());
    use crate::event::EventStore;
    let events = store.events_for(scope.id(), 0).await.unwrap();
    assert!(events.last().unwrap().payload.is_deletion());
}

#[tokio::test]
async fn resolve_finds_by_id_and_by_alias() {
    let (_, service) = setup();
    let scope = service.create("Alpha", "", None, now()).await.unwrap();

    let by_id = service.resolve(&scope.id().to_string()).await.unwrap();
    assert_eq!(by_id.id(), scope.id());
    let by_alias = service
        .resolve(scope.canonical_alias().as_str())
        .await
        .unwrap();
    assert_eq!(by_alias.id(), scope.id());
    assert!(service.resolve("no-such-alias").await.is_err());
}

#[tokio::test]
async fn committed_mutations_notify_the_change_tracker() {
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::repo::{ChangeTracker, RepoResult};

    struct Counting(AtomicU32);

    #[async_trait::async_trait]
    impl ChangeTracker for Counting {
        async fn record_local_changes(&self, count: u32) -> RepoResult<()> {
            self.0.fetch_add(count, Ordering::SeqCst);
            Ok(())
        }
    }

    let store = Arc::new(MemoryStore::new());
    let tracker = Arc::new(Counting(AtomicU32::new(0)));
    let service = ScopeService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        DeviceId::parse("laptop").unwrap(),
        HierarchyLimits::default(),
    )
    .with_change_tracker(tracker.clone());

    let scope = service.create("Alpha", "", None, now()).await.unwrap();
    service.rename(scope.id(), "Beta", now()).await.unwrap();
    service.delete(scope.id(), now()).await.unwrap();

    // One notification per appended event: create, rename, delete.
    assert_eq!(tracker.0.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn set_aspect_validates_against_its_definition() {
    use crate::aspect::{AspectDefinition, AspectType};
    use crate::repo::AspectDefinitionRepository;

    let (store, service) = setup();
    let scope = service.create("Alpha", "", None, now()).await.unwrap();
    let key = AspectKey::parse("estimate").unwrap();
    store
        .save(AspectDefinition::new(key.clone(), AspectType::Numeric))
        .await
        .unwrap();

    assert!(
        service
            .set_aspect(
                scope.id(),
                key.clone(),
                vec![AspectValue::parse("3").unwrap()],
                now(),
            )
            .await
            .is_ok()
    );
    assert!(
        service
            .set_aspect(
                scope.id(),
                key.clone(),
                vec![AspectValue::parse("soon").unwrap()],
                now(),
            )
            .await
            .is_err()
    );
    // Two values on a single-valued definition.
    assert!(
        service
            .set_aspect(
                scope.id(),
                key,
                vec![
                    AspectValue::parse("1").unwrap(),
                    AspectValue::parse("2").unwrap(),
                ],
                now(),
            )
            .await
            .is_err()
    );
}
