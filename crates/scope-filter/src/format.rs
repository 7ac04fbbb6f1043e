use crate::ast::{CmpOp, FilterExpr};

// ---------------------------------------------------------------------------
// Canonical formatting
// ---------------------------------------------------------------------------

/// Print an expression in canonical form: upper-case keywords, double-quoted
/// literals (single-quoted when the value itself contains a double quote),
/// and parentheses only where precedence demands them.
///
/// Round-trips: `parse_filter(&format_expr(e)) == Ok(e)` for every AST the
/// grammar can produce.
pub fn format_expr(expr: &FilterExpr) -> String {
    let mut out = String::new();
    write_expr(&mut out, expr, 0, false);
    out
}

/// Precedence: Or = 1, And = 2, Not = 3, Compare = 4.
fn precedence(expr: &FilterExpr) -> u8 {
    match expr {
        FilterExpr::Or(..) => 1,
        FilterExpr::And(..) => 2,
        FilterExpr::Not(_) => 3,
        FilterExpr::Compare { .. } => 4,
    }
}

fn write_expr(out: &mut String, expr: &FilterExpr, parent_prec: u8, is_right_operand: bool) {
    let prec = precedence(expr);
    // Same-precedence right operands need parens to survive the parser's
    // left associativity: And(a, And(b, c)) prints `a AND (b AND c)`.
    let needs_parens = prec < parent_prec || (prec == parent_prec && is_right_operand);
    if needs_parens {
        out.push('(');
    }
    match expr {
        FilterExpr::Compare { key, op, value } => write_compare(out, key, *op, value),
        FilterExpr::Not(inner) => {
            out.push_str("NOT ");
            write_expr(out, inner, 3, false);
        }
        FilterExpr::And(left, right) => {
            write_expr(out, left, 2, false);
            out.push_str(" AND ");
            write_expr(out, right, 2, true);
        }
        FilterExpr::Or(left, right) => {
            write_expr(out, left, 1, false);
            out.push_str(" OR ");
            write_expr(out, right, 1, true);
        }
    }
    if needs_parens {
        out.push(')');
    }
}

fn write_compare(out: &mut String, key: &str, op: CmpOp, value: &str) {
    out.push_str(key);
    out.push(' ');
    out.push_str(op.symbol());
    out.push(' ');
    let quote = if value.contains('"') { '\'' } else { '"' };
    out.push(quote);
    out.push_str(value);
    out.push(quote);
}
