//! Error taxonomy shared by both filter front-ends.

use std::fmt;

use thiserror::Error;

use crate::token::Span;

/// A single problem reported by the tokenizer or the grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    /// 1-based line of the offending input.
    pub line: usize,
    /// 0-based character position inside the line.
    pub column: usize,
    pub span: Option<Span>,
    pub message: String,
}

impl SyntaxError {
    pub fn at(source: &str, span: Span, message: String) -> Self {
        let (line, column) = span.line_column(source);
        Self {
            line,
            column,
            span: Some(span),
            message,
        }
    }

    /// An error located at the end of the input.
    pub fn at_end(source: &str, message: String) -> Self {
        let end = source.len();
        Self::at(source, Span::new(end, end), message)
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}:{} {}", self.line, self.column, self.message)
    }
}

/// Errors raised while turning a filter string or an argument tree into a predicate tree.
///
/// Every variant aborts the compilation it was raised in; no partial tree is returned.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("syntax error: {}", join_lines(.0))]
    Syntax(Vec<SyntaxError>),

    #[error("invalid clause: {0}")]
    InvalidClause(String),

    #[error("malformed argument tree: {0}")]
    MalformedArgumentTree(String),

    #[error("internal consistency violated: {0}")]
    InternalConsistency(String),
}

impl FilterError {
    /// Syntax errors carried by this failure, empty for the other kinds.
    pub fn syntax_errors(&self) -> &[SyntaxError] {
        match self {
            FilterError::Syntax(errors) => errors,
            _ => &[],
        }
    }
}

fn join_lines(errors: &[SyntaxError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
