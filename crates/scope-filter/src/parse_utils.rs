use winnow::ascii::multispace0;
use winnow::combinator::cut_err;
use winnow::error::{ContextError, ErrMode, StrContext};
use winnow::prelude::*;
use winnow::token::{literal, take_while};

/// Context label attached to the closing-quote cut so the entry point can
/// classify the failure as an unterminated string.
pub(crate) const UNTERMINATED_LABEL: &str = "unterminated string";

// ---------------------------------------------------------------------------
// Whitespace
// ---------------------------------------------------------------------------

pub(crate) fn ws_skip(input: &mut &str) -> ModalResult<()> {
    let _ = multispace0.parse_next(input)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Filter identifier: `[A-Za-z0-9_]+`, excluding the AND/OR/NOT keywords.
pub(crate) fn filter_ident<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    let saved = *input;
    let word = take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_').parse_next(input)?;
    if is_keyword(word) {
        *input = saved;
        return Err(ErrMode::Backtrack(ContextError::new()));
    }
    Ok(word)
}

fn is_keyword(word: &str) -> bool {
    word.eq_ignore_ascii_case("and")
        || word.eq_ignore_ascii_case("or")
        || word.eq_ignore_ascii_case("not")
}

// ---------------------------------------------------------------------------
// Keywords
// ---------------------------------------------------------------------------

/// Match a keyword case-insensitively with a word boundary: the match fails
/// (and backtracks) unless the next word is exactly the keyword, so `NOTE`
/// never parses as `NOT E`.
pub(crate) fn kw_ci(keyword: &'static str) -> impl FnMut(&mut &str) -> ModalResult<()> {
    move |input: &mut &str| {
        let saved = *input;
        let word =
            take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_').parse_next(input)?;
        if word.eq_ignore_ascii_case(keyword) {
            Ok(())
        } else {
            *input = saved;
            Err(ErrMode::Backtrack(ContextError::new()))
        }
    }
}

// ---------------------------------------------------------------------------
// String literals
// ---------------------------------------------------------------------------

/// Single- or double-quoted literal. No escape sequences: the literal runs
/// to the next occurrence of the opening quote character.
pub(crate) fn quoted_literal(input: &mut &str) -> ModalResult<String> {
    if input.starts_with('"') {
        return quoted_with('"').parse_next(input);
    }
    if input.starts_with('\'') {
        return quoted_with('\'').parse_next(input);
    }
    Err(ErrMode::Backtrack(ContextError::new()))
}

fn quoted_with(quote: char) -> impl FnMut(&mut &str) -> ModalResult<String> {
    move |input: &mut &str| {
        let open = match quote {
            '"' => "\"",
            _ => "'",
        };
        literal(open).parse_next(input)?;
        let content = take_while(0.., |c: char| c != quote).parse_next(input)?;
        cut_err(literal(open))
            .context(StrContext::Label(UNTERMINATED_LABEL))
            .parse_next(input)?;
        Ok(content.to_string())
    }
}
