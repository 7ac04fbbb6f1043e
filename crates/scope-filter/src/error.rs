/// Typed parse failures for filter expressions.
///
/// Positions are byte offsets into the original input, pointing at the spot
/// where the failure was noticed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    #[error("empty filter expression")]
    EmptyExpression,
    #[error("unterminated string literal at offset {pos}")]
    UnterminatedString { pos: usize },
    #[error("unexpected character {ch:?} at offset {pos}")]
    UnexpectedCharacter { ch: char, pos: usize },
    #[error("unexpected token at offset {pos}")]
    UnexpectedToken { pos: usize },
    #[error("invalid filter syntax")]
    InvalidSyntax,
}
