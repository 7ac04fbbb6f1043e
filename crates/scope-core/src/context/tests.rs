use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use super::*;
use crate::store::MemoryStore;
use crate::value::ContextViewKey;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
}

fn key(s: &str) -> ContextViewKey {
    ContextViewKey::parse(s).unwrap()
}

fn setup() -> (ContextViewService, ActiveContextService) {
    let store = Arc::new(MemoryStore::new());
    (
        ContextViewService::new(store.clone()),
        ActiveContextService::new(store.clone(), store),
    )
}

// -----------------------------------------------------------------------
// Views
// -----------------------------------------------------------------------

#[tokio::test]
async fn stored_filters_are_canonical_and_reparse() {
    let (views, _) = setup();
    let view = views
        .create(key("work"), "Work", "priority == 'high' and not blocked == 'true'", now())
        .await
        .unwrap();
    assert_eq!(view.filter, r#"priority == "high" AND NOT blocked == "true""#);
    assert!(view.filter_expr().is_ok());
}

#[tokio::test]
async fn invalid_filters_are_rejected_at_creation() {
    let (views, _) = setup();
    assert!(views.create(key("bad"), "Bad", "priority ==", now()).await.is_err());
    assert!(views.create(key("empty"), "Empty", "   ", now()).await.is_err());
}

#[tokio::test]
async fn keys_and_names_are_unique() {
    let (views, _) = setup();
    views
        .create(key("work"), "Work", "a == '1'", now())
        .await
        .unwrap();
    assert!(
        views
            .create(key("work"), "Other", "a == '1'", now())
            .await
            .is_err()
    );
    assert!(
        views
            .create(key("other"), "Work", "a == '1'", now())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn blank_or_oversized_names_are_invalid() {
    let (views, _) = setup();
    assert!(views.create(key("a-key"), "  ", "a == '1'", now()).await.is_err());
    assert!(
        views
            .create(key("b-key"), &"n".repeat(101), "a == '1'", now())
            .await
            .is_err()
    );
}

// -----------------------------------------------------------------------
// Active context
// -----------------------------------------------------------------------

#[tokio::test]
async fn switch_get_clear_cycle() {
    let (views, active) = setup();
    views
        .create(key("work"), "Work", "a == '1'", now())
        .await
        .unwrap();

    assert_eq!(active.get().await, None);
    let switched = active.switch_by_name("Work").await.unwrap();
    assert_eq!(active.get().await.unwrap().id, switched.id);

    let status = active.status().await.unwrap();
    assert_eq!(status.total_views, 1);
    assert_eq!(status.active.unwrap().id, switched.id);

    let cleared = active.clear().await.unwrap();
    assert_eq!(cleared.id, switched.id);
    assert_eq!(active.get().await, None);
}

#[tokio::test]
async fn switch_to_unknown_or_invalid_name_fails() {
    let (_, active) = setup();
    assert!(active.switch_by_name("nowhere").await.is_err());
    assert!(active.switch_by_name("   ").await.is_err());
}

#[tokio::test]
async fn list_matching_filters_through_the_active_context() {
    use crate::ids::ScopeId;
    use crate::scope::Scope;
    use crate::value::{AliasName, AspectKey, AspectValue, ScopeTitle};

    fn scope_with(title: &str, alias: &str, priority: Option<&str>) -> Scope {
        let (mut scope, _) = Scope::create(
            ScopeId::generate(),
            None,
            ScopeTitle::parse(title).unwrap(),
            None,
            AliasName::parse(alias).unwrap(),
            now(),
        );
        if let Some(value) = priority {
            scope.set_aspect(
                AspectKey::parse("priority").unwrap(),
                vec![AspectValue::parse(value).unwrap()],
                now(),
            );
        }
        scope
    }

    let (views, active) = setup();
    let high = scope_with("Urgent", "urgent-one", Some("high"));
    let low = scope_with("Later", "later-one", Some("low"));
    let plain = scope_with("Untagged", "untagged-one", None);

    // No active context: everything passes through untouched.
    let all = active
        .list_matching(vec![high.clone(), low.clone(), plain.clone()])
        .await
        .unwrap();
    assert_eq!(all.len(), 3);

    views
        .create(key("hot"), "Hot", r#"priority == "high""#, now())
        .await
        .unwrap();
    active.switch_by_name("Hot").await.unwrap();

    let matching = active
        .list_matching(vec![high.clone(), low, plain])
        .await
        .unwrap();
    assert_eq!(matching.len(), 1);
    assert_eq!(matching[0].id(), high.id());

    // Clearing the context widens the listing again.
    assert!(active.clear().await.is_some());
    let all = active.list_matching(vec![high]).await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn list_matching_orders_through_registered_definitions() {
    use crate::aspect::{AspectDefinition, AspectType};
    use crate::ids::ScopeId;
    use crate::repo::AspectDefinitionRepository;
    use crate::scope::Scope;
    use crate::value::{AliasName, AspectKey, AspectValue, ScopeTitle};

    let store = Arc::new(MemoryStore::new());
    let views = ContextViewService::new(store.clone());
    let active = ActiveContextService::new(store.clone(), store.clone());

    let priority = AspectKey::parse("priority").unwrap();
    let ordered: Vec<AspectValue> = ["low", "medium", "high"]
        .iter()
        .map(|v| AspectValue::parse(v).unwrap())
        .collect();
    AspectDefinitionRepository::save(
        store.as_ref(),
        AspectDefinition::new(priority.clone(), AspectType::Ordered { values: ordered }),
    )
    .await
    .unwrap();

    let mut medium = Scope::create(
        ScopeId::generate(),
        None,
        ScopeTitle::parse("Medium").unwrap(),
        None,
        AliasName::parse("medium-one").unwrap(),
        now(),
    )
    .0;
    medium.set_aspect(
        priority.clone(),
        vec![AspectValue::parse("medium").unwrap()],
        now(),
    );
    let mut low = Scope::create(
        ScopeId::generate(),
        None,
        ScopeTitle::parse("Low").unwrap(),
        None,
        AliasName::parse("low-one").unwrap(),
        now(),
    )
    .0;
    low.set_aspect(priority, vec![AspectValue::parse("low").unwrap()], now());

    views
        .create(key("above-low"), "Above low", r#"priority > "low""#, now())
        .await
        .unwrap();
    active.switch_by_name("Above low").await.unwrap();

    let matching = active
        .list_matching(vec![medium.clone(), low])
        .await
        .unwrap();
    assert_eq!(matching.len(), 1);
    assert_eq!(matching[0].id(), medium.id());
}

#[tokio::test]
async fn concurrent_switches_leave_one_winner() {
    let (views, active) = setup();
    views.create(key("a"), "A", "a == '1'", now()).await.unwrap();
    views.create(key("b"), "B", "b == '1'", now()).await.unwrap();

    let active = Arc::new(active);
    let mut handles = Vec::new();
    for name in ["A", "B", "A", "B", "A", "B"] {
        let active = Arc::clone(&active);
        handles.push(tokio::spawn(async move {
            active.switch_by_name(name).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    let winner = active.get().await.unwrap();
    assert!(winner.name == "A" || winner.name == "B");
}
