use thiserror::Error;

/// Errors raised while building a [`TagTable`][crate::grammar::TagTable].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GrammarError {
    #[error("tag `{0}` is already registered")]
    DuplicateTag(String),
    #[error("`{0}` is not a valid tag name (expected 1 to 16 lowercase ASCII letters or digits)")]
    InvalidName(String),
}
