use std::cmp::Ordering;

use scope_filter::{CmpOp, FilterExpr};

use super::definition::DefinitionLookup;
use super::AspectMap;

// ---------------------------------------------------------------------------
// Filter evaluation against a scope's aspects
// ---------------------------------------------------------------------------

/// Evaluate a filter expression against an aspect map.
///
/// A comparison is true iff at least one actual value under the key
/// compares true against the literal. `==`/`!=` compare raw strings;
/// ordering operators consult the key's definition for an order (`Ordered`
/// or `Numeric`) and are false when no order exists — including when the key
/// has no definition at all or the key is absent from the map.
pub fn evaluate(expr: &FilterExpr, aspects: &AspectMap, defs: &dyn DefinitionLookup) -> bool {
    match expr {
        FilterExpr::Compare { key, op, value } => compare(key, *op, value, aspects, defs),
        FilterExpr::Not(inner) => !evaluate(inner, aspects, defs),
        FilterExpr::And(left, right) => {
            evaluate(left, aspects, defs) && evaluate(right, aspects, defs)
        }
        FilterExpr::Or(left, right) => {
            evaluate(left, aspects, defs) || evaluate(right, aspects, defs)
        }
    }
}

fn compare(
    key: &str,
    op: CmpOp,
    literal: &str,
    aspects: &AspectMap,
    defs: &dyn DefinitionLookup,
) -> bool {
    let Some(values) = aspects.get(key) else {
        return false;
    };

    if !op.is_ordering() {
        return values.iter().any(|actual| match op {
            CmpOp::Eq => actual.as_str() == literal,
            CmpOp::Ne => actual.as_str() != literal,
            _ => unreachable!("handled by the ordering branch"),
        });
    }

    let Some(def) = defs.definition(key) else {
        return false;
    };
    values.iter().any(|actual| {
        def.aspect_type
            .compare_raw(actual.as_str(), literal)
            .is_some_and(|ordering| ordering_matches(op, ordering))
    })
}

fn ordering_matches(op: CmpOp, ordering: Ordering) -> bool {
    match op {
        CmpOp::Gt => ordering == Ordering::Greater,
        CmpOp::Lt => ordering == Ordering::Less,
        CmpOp::Ge => ordering != Ordering::Less,
        CmpOp::Le => ordering != Ordering::Greater,
        CmpOp::Eq | CmpOp::Ne => unreachable!("handled by the equality branch"),
    }
}
