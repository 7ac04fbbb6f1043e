use winnow::combinator::{alt, cut_err, opt};
use winnow::error::{ContextError, ParseError, StrContext};
use winnow::prelude::*;
use winnow::token::literal;

use crate::ast::{CmpOp, FilterExpr};
use crate::error::FilterError;
use crate::parse_utils::{UNTERMINATED_LABEL, filter_ident, kw_ci, quoted_literal, ws_skip};

#[cfg(test)]
mod tests;

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Parse a filter expression string into its AST.
///
/// The grammar, precedence lowest to highest:
///
/// ```text
/// expr    = or
/// or      = and { OR and }
/// and     = not { AND not }
/// not     = NOT not | primary
/// primary = "(" expr ")" | ident cmp_op string_literal
/// ```
///
/// `AND`/`OR`/`NOT` are case-insensitive keywords; literals are single- or
/// double-quoted with no escapes.
pub fn parse_filter(input: &str) -> Result<FilterExpr, FilterError> {
    if input.trim().is_empty() {
        return Err(FilterError::EmptyExpression);
    }
    filter_expr.parse(input).map_err(|e| classify(input, &e))
}

/// Map a winnow parse failure onto the typed error surface.
fn classify(input: &str, err: &ParseError<&str, ContextError>) -> FilterError {
    let pos = err.offset();
    let unterminated = err
        .inner()
        .context()
        .any(|c| matches!(c, StrContext::Label(l) if *l == UNTERMINATED_LABEL));
    if unterminated {
        return FilterError::UnterminatedString { pos };
    }
    match input[pos..].chars().next() {
        Some(ch) if !is_token_start(ch) => FilterError::UnexpectedCharacter { ch, pos },
        Some(_) => FilterError::UnexpectedToken { pos },
        // Failure at end of input: the expression was cut short.
        None => FilterError::InvalidSyntax,
    }
}

/// Characters that can begin some token of the grammar.
fn is_token_start(ch: char) -> bool {
    ch.is_ascii_alphanumeric()
        || matches!(ch, '_' | '(' | ')' | '"' | '\'' | '=' | '!' | '<' | '>')
}

// ---------------------------------------------------------------------------
// Precedence levels
// ---------------------------------------------------------------------------

fn filter_expr(input: &mut &str) -> ModalResult<FilterExpr> {
    ws_skip.parse_next(input)?;
    let expr = or_expr.parse_next(input)?;
    ws_skip.parse_next(input)?;
    Ok(expr)
}

/// `or = and { OR and }`
fn or_expr(input: &mut &str) -> ModalResult<FilterExpr> {
    let mut left = and_expr.parse_next(input)?;
    loop {
        ws_skip.parse_next(input)?;
        if opt(kw_ci("or")).parse_next(input)?.is_some() {
            let right = cut_err(and_expr).parse_next(input)?;
            left = FilterExpr::or(left, right);
        } else {
            break;
        }
    }
    Ok(left)
}

/// `and = not { AND not }`
fn and_expr(input: &mut &str) -> ModalResult<FilterExpr> {
    let mut left = not_expr.parse_next(input)?;
    loop {
        ws_skip.parse_next(input)?;
        if opt(kw_ci("and")).parse_next(input)?.is_some() {
            let right = cut_err(not_expr).parse_next(input)?;
            left = FilterExpr::and(left, right);
        } else {
            break;
        }
    }
    Ok(left)
}

/// `not = NOT not | primary`
fn not_expr(input: &mut &str) -> ModalResult<FilterExpr> {
    ws_skip.parse_next(input)?;
    if opt(kw_ci("not")).parse_next(input)?.is_some() {
        let inner = cut_err(not_expr).parse_next(input)?;
        return Ok(FilterExpr::not(inner));
    }
    primary.parse_next(input)
}

/// `primary = "(" expr ")" | comparison`
fn primary(input: &mut &str) -> ModalResult<FilterExpr> {
    ws_skip.parse_next(input)?;
    if opt(literal("(")).parse_next(input)?.is_some() {
        let inner = cut_err(or_expr).parse_next(input)?;
        ws_skip.parse_next(input)?;
        cut_err(literal(")")).parse_next(input)?;
        return Ok(inner);
    }
    comparison.parse_next(input)
}

/// `comparison = ident cmp_op string_literal`
fn comparison(input: &mut &str) -> ModalResult<FilterExpr> {
    let key = filter_ident.parse_next(input)?;
    ws_skip.parse_next(input)?;
    let op = cut_err(cmp_op).parse_next(input)?;
    ws_skip.parse_next(input)?;
    let value = cut_err(quoted_literal).parse_next(input)?;
    Ok(FilterExpr::Compare {
        key: key.to_string(),
        op,
        value,
    })
}

fn cmp_op(input: &mut &str) -> ModalResult<CmpOp> {
    alt((
        literal("==").value(CmpOp::Eq),
        literal("!=").value(CmpOp::Ne),
        literal("<=").value(CmpOp::Le),
        literal(">=").value(CmpOp::Ge),
        literal("<").value(CmpOp::Lt),
        literal(">").value(CmpOp::Gt),
    ))
    .parse_next(input)
}
