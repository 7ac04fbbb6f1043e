use crate::ast::{CmpOp, FilterExpr};
use crate::error::FilterError;
use crate::parser::parse_filter;

// -----------------------------------------------------------------------
// Leaves
// -----------------------------------------------------------------------

#[test]
fn parse_simple_comparison() {
    let e = parse_filter(r#"priority == "high""#).unwrap();
    assert_eq!(e, FilterExpr::compare("priority", CmpOp::Eq, "high"));
}

#[test]
fn parse_single_quoted_literal() {
    let e = parse_filter("status != 'done'").unwrap();
    assert_eq!(e, FilterExpr::compare("status", CmpOp::Ne, "done"));
}

#[test]
fn parse_all_operators() {
    for (src, op) in [
        ("==", CmpOp::Eq),
        ("!=", CmpOp::Ne),
        (">", CmpOp::Gt),
        ("<", CmpOp::Lt),
        (">=", CmpOp::Ge),
        ("<=", CmpOp::Le),
    ] {
        let e = parse_filter(&format!("estimate {src} '3'")).unwrap();
        assert_eq!(e, FilterExpr::compare("estimate", op, "3"));
    }
}

#[test]
fn identifier_may_start_with_digit() {
    let e = parse_filter("2024_q1 == 'yes'").unwrap();
    assert_eq!(e, FilterExpr::compare("2024_q1", CmpOp::Eq, "yes"));
}

#[test]
fn empty_literal_is_allowed() {
    let e = parse_filter("note == ''").unwrap();
    assert_eq!(e, FilterExpr::compare("note", CmpOp::Eq, ""));
}

// -----------------------------------------------------------------------
// Operators & precedence
// -----------------------------------------------------------------------

#[test]
fn and_binds_tighter_than_or() {
    let e = parse_filter("a == '1' OR b == '2' AND c == '3'").unwrap();
    assert_eq!(
        e,
        FilterExpr::or(
            FilterExpr::compare("a", CmpOp::Eq, "1"),
            FilterExpr::and(
                FilterExpr::compare("b", CmpOp::Eq, "2"),
                FilterExpr::compare("c", CmpOp::Eq, "3"),
            ),
        )
    );
}

#[test]
fn not_binds_tighter_than_and() {
    let e = parse_filter("NOT a == '1' AND b == '2'").unwrap();
    assert_eq!(
        e,
        FilterExpr::and(
            FilterExpr::not(FilterExpr::compare("a", CmpOp::Eq, "1")),
            FilterExpr::compare("b", CmpOp::Eq, "2"),
        )
    );
}

#[test]
fn parens_override_precedence() {
    let e = parse_filter("(a == '1' OR b == '2') AND c == '3'").unwrap();
    assert_eq!(
        e,
        FilterExpr::and(
            FilterExpr::or(
                FilterExpr::compare("a", CmpOp::Eq, "1"),
                FilterExpr::compare("b", CmpOp::Eq, "2"),
            ),
            FilterExpr::compare("c", CmpOp::Eq, "3"),
        )
    );
}

#[test]
fn chained_and_is_left_associative() {
    let e = parse_filter("a == '1' AND b == '2' AND c == '3'").unwrap();
    assert_eq!(
        e,
        FilterExpr::and(
            FilterExpr::and(
                FilterExpr::compare("a", CmpOp::Eq, "1"),
                FilterExpr::compare("b", CmpOp::Eq, "2"),
            ),
            FilterExpr::compare("c", CmpOp::Eq, "3"),
        )
    );
}

#[test]
fn keywords_are_case_insensitive() {
    let upper = parse_filter("a == '1' AND NOT b == '2'").unwrap();
    let lower = parse_filter("a == '1' and not b == '2'").unwrap();
    let mixed = parse_filter("a == '1' And nOt b == '2'").unwrap();
    assert_eq!(upper, lower);
    assert_eq!(upper, mixed);
}

#[test]
fn keyword_prefix_of_identifier_is_not_a_keyword() {
    // `android` starts with `and` but is a plain identifier.
    let e = parse_filter("android == 'yes'").unwrap();
    assert_eq!(e, FilterExpr::compare("android", CmpOp::Eq, "yes"));
}

#[test]
fn double_negation_parses() {
    let e = parse_filter("NOT NOT a == '1'").unwrap();
    assert_eq!(
        e,
        FilterExpr::not(FilterExpr::not(FilterExpr::compare("a", CmpOp::Eq, "1")))
    );
}

#[test]
fn whitespace_is_insignificant() {
    let tight = parse_filter("a=='1'AND b=='2'").unwrap();
    let loose = parse_filter("  a  ==  '1'   AND   b == '2'  ").unwrap();
    assert_eq!(tight, loose);
}

// -----------------------------------------------------------------------
// Errors
// -----------------------------------------------------------------------

#[test]
fn empty_input_is_rejected() {
    assert_eq!(parse_filter(""), Err(FilterError::EmptyExpression));
    assert_eq!(parse_filter("   \t\n"), Err(FilterError::EmptyExpression));
}

#[test]
fn unterminated_string_is_reported() {
    match parse_filter("a == 'never closed") {
        Err(FilterError::UnterminatedString { .. }) => {}
        other => panic!("expected UnterminatedString, got {other:?}"),
    }
}

#[test]
fn unexpected_character_is_reported_with_position() {
    match parse_filter("a @ '1'") {
        Err(FilterError::UnexpectedCharacter { ch: '@', pos }) => assert_eq!(pos, 2),
        other => panic!("expected UnexpectedCharacter, got {other:?}"),
    }
}

#[test]
fn trailing_garbage_is_an_unexpected_token() {
    match parse_filter("a == '1' b == '2'") {
        Err(FilterError::UnexpectedToken { .. }) => {}
        other => panic!("expected UnexpectedToken, got {other:?}"),
    }
}

#[test]
fn missing_close_paren_is_invalid_syntax() {
    assert_eq!(parse_filter("(a == '1'"), Err(FilterError::InvalidSyntax));
}

#[test]
fn bare_identifier_is_rejected() {
    // An identifier with no operator cannot form a primary.
    assert!(parse_filter("blocked").is_err());
}

#[test]
fn unquoted_literal_is_rejected() {
    assert!(parse_filter("a == high").is_err());
}
