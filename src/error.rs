use thiserror::Error;

use crate::lexer::LexError;
use crate::parser::ParseError;
use crate::token::Span;

/// Everything that can abort a translation. No output is produced when any
/// of these is returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranslateError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("Unsupported {construct} at line {line}, column {column}")]
    Unsupported {
        construct: String,
        line: usize,
        column: usize,
    },
}

impl TranslateError {
    pub fn unsupported(construct: impl Into<String>, span: Span) -> Self {
        Self::Unsupported {
            construct: construct.into(),
            line: span.line,
            column: span.column,
        }
    }
}

pub type TranslateResult<T> = Result<T, TranslateError>;
