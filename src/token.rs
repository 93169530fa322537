//! The token definition for the catalog filter language.

/// A token is a single unit of the language, with a specific kind and location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub span: Span,
}

/// The kind of a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind<'a> {
    // Keywords
    And, // "AND" or "&&"
    Or,  // "OR" or "||"

    // Literals
    Attribute(&'a str),
    String(&'a str), // The raw string, including quotes

    // Punctuation
    LParen, // (
    RParen, // )
    Comma,  // ,

    // Compare operators
    Eq,    // =
    NotEq, // !=

    Whitespace,

    // Special
    UnterminatedString(&'a str), // A string literal missing its closing quote
    Illegal(char),               // An illegal/unknown character
}

impl TokenKind<'_> {
    /// Short human-readable description used in syntax error messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::And => "AND".to_string(),
            TokenKind::Or => "OR".to_string(),
            TokenKind::Attribute(s) => format!("attribute '{}'", s),
            TokenKind::String(s) => format!("string {}", s),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::Eq => "'='".to_string(),
            TokenKind::NotEq => "'!='".to_string(),
            TokenKind::Whitespace => "whitespace".to_string(),
            TokenKind::UnterminatedString(s) => format!("unterminated string {}", s),
            TokenKind::Illegal(c) => format!("'{}'", c),
        }
    }
}

/// Represents a span in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// The starting byte offset.
    pub start: usize,
    /// The ending byte offset.
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Line (1-based) and column (0-based, in characters) of the span start.
    pub fn line_column(&self, source: &str) -> (usize, usize) {
        let mut line = 1;
        let mut column = 0;
        for (offset, c) in source.char_indices() {
            if offset >= self.start {
                break;
            }
            if c == '\n' {
                line += 1;
                column = 0;
            } else {
                column += 1;
            }
        }
        (line, column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_column_first_line() {
        let span = Span::new(5, 6);
        assert_eq!(span.line_column("name = \"a\""), (1, 5));
    }

    #[test]
    fn test_line_column_after_newline() {
        let source = "name = \"a\"\nAND )";
        let offset = source.find(')').unwrap();
        assert_eq!(Span::new(offset, offset + 1).line_column(source), (2, 4));
    }
}
