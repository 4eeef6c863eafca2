use crate::opcode::Opcode;

/// A line/column position in an assembly source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub col: usize,
}

impl Position {
    pub fn new(line: usize, col: usize) -> Self {
        Position { line, col }
    }
}

impl Default for Position {
    fn default() -> Self {
        Position { line: 1, col: 1 }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.col)
    }
}

/// The symbol classes produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// A recognized opcode mnemonic.
    Opcode(Opcode),
    /// An identifier that is not an opcode (label reference).
    Identifier,
    /// A label definition; the token text keeps the trailing colon.
    LabelId,
    IntLiteral,
    /// A character literal; the text keeps the quotes, escapes decoded.
    CharLiteral,
    /// A string literal; the text keeps the quotes, escapes decoded.
    StringLiteral,
    Eof,
}

/// A single token: symbol kind, source position and literal text.
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: Position,
    pub text: String,
}

impl Token {
    pub fn new(kind: TokenKind, position: Position, text: impl Into<String>) -> Self {
        Token {
            kind,
            position,
            text: text.into(),
        }
    }

    /// A synthetic integer-literal token, used by the optimizer when it
    /// folds constants.
    pub fn synthetic_int(value: i32) -> Self {
        Token {
            kind: TokenKind::IntLiteral,
            position: Position::default(),
            text: value.to_string(),
        }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            TokenKind::Eof => write!(f, "End-of-File"),
            _ => write!(f, "{}", self.text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_display() {
        let pos = Position::new(3, 14);
        assert_eq!(pos.to_string(), "line 3, column 14");
    }

    #[test]
    fn test_synthetic_int_token() {
        let seven = Token::synthetic_int(-7);
        assert_eq!(seven.kind, TokenKind::IntLiteral);
        assert_eq!(seven.text, "-7");
    }
}
