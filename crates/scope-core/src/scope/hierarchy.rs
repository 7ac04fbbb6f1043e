use crate::ids::ScopeId;

/// Default hierarchy limits; overridable through configuration.
pub const MAX_HIERARCHY_DEPTH: u32 = 10;
pub const MAX_CHILDREN_PER_PARENT: u32 = 100;

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

/// Business-rule failure in the scope tree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HierarchyError {
    #[error("scope {id} appears twice in its own ancestor path")]
    CircularPath { id: ScopeId, seen: Vec<ScopeId> },
    #[error("scope {id} cannot be its own parent")]
    SelfParenting { id: ScopeId },
    #[error("moving {child} here would create a cycle")]
    CircularReference {
        child: ScopeId,
        ancestors: Vec<ScopeId>,
    },
    #[error("hierarchy depth limit {max} exceeded (attempted depth {attempted})")]
    MaxDepthExceeded { max: u32, attempted: u32 },
    #[error("children limit {max} reached ({current} existing)")]
    MaxChildrenExceeded { max: u32, current: u32 },
    #[error("a sibling with title {title:?} already exists")]
    DuplicateTitle {
        title: String,
        parent: Option<ScopeId>,
    },
    #[error("scope {id} still has {count} children")]
    HasChildren { id: ScopeId, count: u32 },
    #[error("parent scope {id} does not exist")]
    ParentNotFound { id: ScopeId },
    #[error("scope {id} does not exist")]
    NotFound { id: ScopeId },
}

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Effective limits for the tree. `None` disables the corresponding guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HierarchyLimits {
    pub max_depth: Option<u32>,
    pub max_children: Option<u32>,
}

impl Default for HierarchyLimits {
    fn default() -> Self {
        Self {
            max_depth: Some(MAX_HIERARCHY_DEPTH),
            max_children: Some(MAX_CHILDREN_PER_PARENT),
        }
    }
}

// ---------------------------------------------------------------------------
// Pure validators — no I/O, no suspension
// ---------------------------------------------------------------------------

/// Depth of a scope given its ancestor path (nearest parent first); the
/// path of a root is empty.
pub fn calculate_depth(path: &[ScopeId]) -> u32 {
    path.len() as u32
}

/// Scan an ancestor path for the first repeated id.
pub fn detect_circular_reference(path: &[ScopeId]) -> Result<(), HierarchyError> {
    let mut seen: Vec<ScopeId> = Vec::with_capacity(path.len());
    for &id in path {
        if seen.contains(&id) {
            return Err(HierarchyError::CircularPath { id, seen });
        }
        seen.push(id);
    }
    Ok(())
}

/// Check that making `child` a child of `parent` neither self-parents nor
/// closes a cycle through `parent`'s ancestors.
pub fn validate_parent_child(
    parent: ScopeId,
    child: ScopeId,
    parent_ancestors: &[ScopeId],
) -> Result<(), HierarchyError> {
    if parent == child {
        return Err(HierarchyError::SelfParenting { id: child });
    }
    if parent_ancestors.contains(&child) {
        return Err(HierarchyError::CircularReference {
            child,
            ancestors: parent_ancestors.to_vec(),
        });
    }
    Ok(())
}

/// Guard the sibling count before adding a child.
pub fn validate_children_limit(current: u32, max: Option<u32>) -> Result<(), HierarchyError> {
    if let Some(max) = max
        && current >= max
    {
        return Err(HierarchyError::MaxChildrenExceeded { max, current });
    }
    Ok(())
}

/// Guard the depth a new child would land at, given its parent's depth.
pub fn validate_depth(parent_depth: u32, max: Option<u32>) -> Result<(), HierarchyError> {
    if let Some(max) = max
        && parent_depth + 1 > max
    {
        return Err(HierarchyError::MaxDepthExceeded {
            max,
            attempted: parent_depth + 1,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<ScopeId> {
        (0..n).map(|i| ScopeId::from_u128(i as u128 + 1)).collect()
    }

    #[test]
    fn depth_is_path_length() {
        assert_eq!(calculate_depth(&[]), 0);
        assert_eq!(calculate_depth(&ids(3)), 3);
    }

    #[test]
    fn circular_path_reports_first_repeat() {
        let path = ids(3);
        assert!(detect_circular_reference(&path).is_ok());

        let looped = vec![path[0], path[1], path[0], path[2]];
        match detect_circular_reference(&looped) {
            Err(HierarchyError::CircularPath { id, seen }) => {
                assert_eq!(id, path[0]);
                assert_eq!(seen, vec![path[0], path[1]]);
            }
            other => panic!("expected CircularPath, got {other:?}"),
        }
    }

    #[test]
    fn self_parenting_is_rejected() {
        let id = ScopeId::from_u128(7);
        assert!(matches!(
            validate_parent_child(id, id, &[]),
            Err(HierarchyError::SelfParenting { .. })
        ));
    }

    #[test]
    fn cycle_through_ancestors_is_rejected() {
        let all = ids(4);
        let (parent, child) = (all[0], all[3]);
        // child already sits above parent.
        let ancestors = vec![all[1], all[3]];
        assert!(matches!(
            validate_parent_child(parent, child, &ancestors),
            Err(HierarchyError::CircularReference { .. })
        ));
        assert!(validate_parent_child(parent, all[2], &[all[1]]).is_ok());
    }

    #[test]
    fn children_limit_is_inclusive() {
        assert!(validate_children_limit(99, Some(100)).is_ok());
        assert!(matches!(
            validate_children_limit(100, Some(100)),
            Err(HierarchyError::MaxChildrenExceeded {
                max: 100,
                current: 100
            })
        ));
        assert!(validate_children_limit(10_000, None).is_ok());
    }

    #[test]
    fn depth_limit_rejects_the_eleventh_level() {
        // A chain of 10 gives the parent depth 10; a child would land at 11.
        assert!(validate_depth(9, Some(MAX_HIERARCHY_DEPTH)).is_ok());
        assert!(matches!(
            validate_depth(10, Some(MAX_HIERARCHY_DEPTH)),
            Err(HierarchyError::MaxDepthExceeded {
                max: 10,
                attempted: 11
            })
        ));
        assert!(validate_depth(10, None).is_ok());
    }
}
