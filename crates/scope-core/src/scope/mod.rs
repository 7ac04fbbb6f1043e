mod event;
mod hierarchy;
mod service;

#[cfg(test)]
mod tests;

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::ScopeId;
use crate::value::{AliasName, AspectKey, AspectValue, ScopeDescription, ScopeTitle};

pub use crate::aspect::AspectMap;
pub use event::ScopeEvent;
pub use hierarchy::{
    HierarchyError, HierarchyLimits, MAX_CHILDREN_PER_PARENT, MAX_HIERARCHY_DEPTH,
    calculate_depth, detect_circular_reference, validate_children_limit, validate_depth,
    validate_parent_child,
};
pub use service::{CreationIssues, NewScope, ScopeService};

// ---------------------------------------------------------------------------
// Scope aggregate
// ---------------------------------------------------------------------------

/// A work item in the hierarchy.
///
/// The tree is held together by parent pointers only; children are found
/// through repository queries. Every mutation goes through an event: the
/// mutators build a [`ScopeEvent`], apply it, and hand it back for the
/// caller to append to the log, so `replay` over the full event sequence
/// reproduces the aggregate exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    id: ScopeId,
    parent_id: Option<ScopeId>,
    title: ScopeTitle,
    description: Option<ScopeDescription>,
    aspects: AspectMap,
    canonical_alias: AliasName,
    custom_aliases: BTreeSet<AliasName>,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Scope {
    pub fn create(
        id: ScopeId,
        parent_id: Option<ScopeId>,
        title: ScopeTitle,
        description: Option<ScopeDescription>,
        canonical_alias: AliasName,
        now: DateTime<Utc>,
    ) -> (Self, ScopeEvent) {
        let event = ScopeEvent::Created {
            id,
            parent_id,
            title: title.clone(),
            description: description.clone(),
            canonical_alias: canonical_alias.clone(),
            at: now,
        };
        let scope = Self {
            id,
            parent_id,
            title,
            description,
            aspects: AspectMap::new(),
            canonical_alias,
            custom_aliases: BTreeSet::new(),
            version: 1,
            created_at: now,
            updated_at: now,
        };
        (scope, event)
    }

    // -- accessors ----------------------------------------------------------

    pub fn id(&self) -> ScopeId {
        self.id
    }

    pub fn parent_id(&self) -> Option<ScopeId> {
        self.parent_id
    }

    pub fn title(&self) -> &ScopeTitle {
        &self.title
    }

    pub fn description(&self) -> Option<&ScopeDescription> {
        self.description.as_ref()
    }

    pub fn aspects(&self) -> &AspectMap {
        &self.aspects
    }

    pub fn canonical_alias(&self) -> &AliasName {
        &self.canonical_alias
    }

    pub fn custom_aliases(&self) -> &BTreeSet<AliasName> {
        &self.custom_aliases
    }

    /// Aggregate version: 1 after creation, +1 per applied event.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    // -- mutators -----------------------------------------------------------

    pub fn rename(&mut self, title: ScopeTitle, now: DateTime<Utc>) -> ScopeEvent {
        self.emit(ScopeEvent::TitleChanged { title, at: now })
    }

    pub fn describe(
        &mut self,
        description: Option<ScopeDescription>,
        now: DateTime<Utc>,
    ) -> ScopeEvent {
        self.emit(ScopeEvent::DescriptionChanged {
            description,
            at: now,
        })
    }

    /// Replace the value list under `key`. An empty list removes the key.
    pub fn set_aspect(
        &mut self,
        key: AspectKey,
        values: Vec<AspectValue>,
        now: DateTime<Utc>,
    ) -> ScopeEvent {
        self.emit(ScopeEvent::AspectSet {
            key,
            values,
            at: now,
        })
    }

    pub fn remove_aspect(&mut self, key: &AspectKey, now: DateTime<Utc>) -> Option<ScopeEvent> {
        if !self.aspects.contains_key(key) {
            return None;
        }
        Some(self.emit(ScopeEvent::AspectRemoved {
            key: key.clone(),
            at: now,
        }))
    }

    pub fn move_to(&mut self, new_parent: Option<ScopeId>, now: DateTime<Utc>) -> ScopeEvent {
        self.emit(ScopeEvent::Moved {
            new_parent,
            at: now,
        })
    }

    pub fn add_custom_alias(&mut self, name: AliasName, now: DateTime<Utc>) -> ScopeEvent {
        self.emit(ScopeEvent::AliasAdded {
            name,
            kind: crate::alias::AliasKind::Custom,
            at: now,
        })
    }

    pub fn remove_custom_alias(
        &mut self,
        name: &AliasName,
        now: DateTime<Utc>,
    ) -> Option<ScopeEvent> {
        if !self.custom_aliases.contains(name) {
            return None;
        }
        Some(self.emit(ScopeEvent::AliasRemoved {
            name: name.clone(),
            at: now,
        }))
    }

    pub fn rename_alias(
        &mut self,
        old: AliasName,
        new: AliasName,
        now: DateTime<Utc>,
    ) -> ScopeEvent {
        self.emit(ScopeEvent::AliasRenamed { old, new, at: now })
    }

    /// Install a new canonical alias; the previous one is demoted to custom
    /// in the same event.
    pub fn replace_canonical(&mut self, new: AliasName, now: DateTime<Utc>) -> ScopeEvent {
        self.emit(ScopeEvent::CanonicalReplaced {
            old: self.canonical_alias.clone(),
            new,
            at: now,
        })
    }

    pub fn deleted(&mut self, now: DateTime<Utc>) -> ScopeEvent {
        self.emit(ScopeEvent::Deleted { at: now })
    }

    fn emit(&mut self, event: ScopeEvent) -> ScopeEvent {
        self.apply(&event);
        event
    }

    // -- event application --------------------------------------------------

    /// Apply one post-creation event. `Created` is handled by [`replay`]
    /// (and by `create`); applying it here is a no-op.
    pub fn apply(&mut self, event: &ScopeEvent) {
        match event {
            ScopeEvent::Created { .. } => return,
            ScopeEvent::TitleChanged { title, .. } => self.title = title.clone(),
            ScopeEvent::DescriptionChanged { description, .. } => {
                self.description = description.clone();
            }
            ScopeEvent::AspectSet { key, values, .. } => {
                if values.is_empty() {
                    self.aspects.remove(key);
                } else {
                    self.aspects.insert(key.clone(), values.clone());
                }
            }
            ScopeEvent::AspectRemoved { key, .. } => {
                self.aspects.remove(key);
            }
            ScopeEvent::Moved { new_parent, .. } => self.parent_id = *new_parent,
            ScopeEvent::AliasAdded { name, kind, .. } => {
                if *kind == crate::alias::AliasKind::Custom {
                    self.custom_aliases.insert(name.clone());
                }
            }
            ScopeEvent::AliasRemoved { name, .. } => {
                self.custom_aliases.remove(name);
            }
            ScopeEvent::AliasRenamed { old, new, .. } => {
                // A same-scope merge may retire `new`'s previous row.
                self.custom_aliases.remove(new);
                if self.canonical_alias == *old {
                    self.canonical_alias = new.clone();
                } else if self.custom_aliases.remove(old) {
                    self.custom_aliases.insert(new.clone());
                }
            }
            ScopeEvent::CanonicalReplaced { old, new, .. } => {
                self.custom_aliases.remove(new);
                self.custom_aliases.insert(old.clone());
                self.canonical_alias = new.clone();
            }
            ScopeEvent::Deleted { .. } => {}
        }
        self.version += 1;
        self.updated_at = event.at();
    }

    /// Rebuild an aggregate from its full event sequence. Returns `None`
    /// unless the sequence starts with `Created`.
    pub fn replay<'a, I>(events: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a ScopeEvent>,
    {
        let mut iter = events.into_iter();
        let ScopeEvent::Created {
            id,
            parent_id,
            title,
            description,
            canonical_alias,
            at,
        } = iter.next()?
        else {
            return None;
        };
        let mut scope = Self {
            id: *id,
            parent_id: *parent_id,
            title: title.clone(),
            description: description.clone(),
            aspects: AspectMap::new(),
            canonical_alias: canonical_alias.clone(),
            custom_aliases: BTreeSet::new(),
            version: 1,
            created_at: *at,
            updated_at: *at,
        };
        for event in iter {
            scope.apply(event);
        }
        Some(scope)
    }
}
