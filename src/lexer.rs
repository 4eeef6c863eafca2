//! Lexical analysis for Cinder assembly language.
//!
//! The lexer keeps one token of lookahead for the parser.  Lexical
//! errors are fatal: the first error stops the assembly with no
//! recovery, in contrast to the parser's resynchronization.

use crate::errors::AsmError;
use crate::opcode::Opcode;
use crate::token::{Position, Token, TokenKind};

pub struct Lexer {
    source: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
    token: Token,
}

impl Lexer {
    /// Construct a lexer and advance to the first token.
    pub fn new(source: &str) -> Result<Self, AsmError> {
        let mut lexer = Lexer {
            source: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            token: Token::new(TokenKind::Eof, Position::default(), ""),
        };
        lexer.advance()?;
        Ok(lexer)
    }

    /// The current lookahead token.
    pub fn token(&self) -> &Token {
        &self.token
    }

    /// Short form for the current token's kind.
    pub fn kind(&self) -> TokenKind {
        self.token.kind
    }

    /// Short form for the current token's position.
    pub fn position(&self) -> Position {
        self.token.position
    }

    /// Advance to the next token.  At end of file the EOF token is
    /// returned again on every advance.
    pub fn advance(&mut self) -> Result<(), AsmError> {
        self.token = self.next_token()?;
        Ok(())
    }

    /// Advance until the current token satisfies the predicate or end of
    /// file is reached.  Used by the parser for error recovery.
    pub fn advance_to(&mut self, accept: impl Fn(TokenKind) -> bool) -> Result<(), AsmError> {
        while !accept(self.kind()) && self.kind() != TokenKind::Eof {
            self.advance()?;
        }
        Ok(())
    }

    fn current(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.current();
        if ch == Some('\n') {
            self.line += 1;
            self.col = 1;
        } else if ch.is_some() {
            self.col += 1;
        }
        self.pos += 1;
        ch
    }

    fn span(&self) -> Position {
        Position::new(self.line, self.col)
    }

    fn next_token(&mut self) -> Result<Token, AsmError> {
        self.skip_whitespace_and_comments();

        // currently at the starting character of the next token
        let position = self.span();

        let ch = match self.current() {
            None => return Ok(Token::new(TokenKind::Eof, position, "")),
            Some(ch) => ch,
        };

        if ch.is_alphabetic() || ch == '_' {
            let id = self.scan_identifier();

            if let Some(opcode) = Opcode::from_mnemonic(&id) {
                return Ok(Token::new(TokenKind::Opcode(opcode), position, id));
            }

            // an identifier immediately followed by ':' is a label
            if self.current() == Some(':') {
                self.bump();
                return Ok(Token::new(TokenKind::LabelId, position, format!("{id}:")));
            }

            return Ok(Token::new(TokenKind::Identifier, position, id));
        }

        if ch.is_ascii_digit() {
            let digits = self.scan_integer();
            return Ok(Token::new(TokenKind::IntLiteral, position, digits));
        }

        match ch {
            '\'' => {
                let text = self.scan_char_literal(position)?;
                Ok(Token::new(TokenKind::CharLiteral, position, text))
            }
            '"' => {
                let text = self.scan_string_literal(position)?;
                Ok(Token::new(TokenKind::StringLiteral, position, text))
            }
            '-' => {
                // should be a negative integer literal
                self.bump();
                if self.current().is_some_and(|c| c.is_ascii_digit()) {
                    let digits = self.scan_integer();
                    Ok(Token::new(
                        TokenKind::IntLiteral,
                        position,
                        format!("-{digits}"),
                    ))
                } else {
                    Err(AsmError::lexical(position, "Expecting an integer literal"))
                }
            }
            _ => Err(AsmError::lexical(position, "Invalid token")),
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.current() {
                Some(ch) if ch.is_whitespace() => {
                    self.bump();
                }
                // comments run from ';' to end of line
                Some(';') => {
                    while let Some(ch) = self.current() {
                        if ch == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    // identifier = ( letter | "_" ) ( letter | digit )*
    fn scan_identifier(&mut self) -> String {
        let mut id = String::new();
        id.push(self.bump().unwrap_or_default());

        while let Some(ch) = self.current() {
            if ch.is_alphanumeric() {
                id.push(ch);
                self.bump();
            } else {
                break;
            }
        }
        id
    }

    fn scan_integer(&mut self) -> String {
        let mut digits = String::new();
        while let Some(ch) = self.current() {
            if ch.is_ascii_digit() {
                digits.push(ch);
                self.bump();
            } else {
                break;
            }
        }
        digits
    }

    /// Scan a character literal, returning its text with the quotes kept
    /// and any escape sequence decoded.
    fn scan_char_literal(&mut self, start: Position) -> Result<String, AsmError> {
        let mut text = String::from('\'');
        self.bump(); // opening quote

        let ch = self.check_graphic_char(start)?;
        if ch == '\\' {
            text.push(self.scan_escaped_char()?);
        } else if ch == '\'' {
            self.bump();
            return Err(AsmError::lexical(
                start,
                "Char literal must contain exactly one character",
            ));
        } else {
            text.push(ch);
            self.bump();
        }

        let closing = self.check_graphic_char(start)?;
        if closing != '\'' {
            return Err(AsmError::lexical(start, "Char literal not closed properly"));
        }
        text.push('\'');
        self.bump();

        Ok(text)
    }

    /// Scan a string literal, returning its text with the quotes kept
    /// and escape sequences decoded.
    fn scan_string_literal(&mut self, start: Position) -> Result<String, AsmError> {
        let mut text = String::from('"');
        self.bump(); // opening quote

        loop {
            let ch = self.check_graphic_char(start)?;
            if ch == '"' {
                text.push('"');
                self.bump();
                return Ok(text);
            } else if ch == '\\' {
                text.push(self.scan_escaped_char()?);
            } else {
                text.push(ch);
                self.bump();
            }
        }
    }

    // Handles the escapes \t \n \r \" \' \\ ; anything else is an error.
    fn scan_escaped_char(&mut self) -> Result<char, AsmError> {
        let backslash_position = self.span();
        self.bump(); // the backslash

        let ch = self.check_graphic_char(backslash_position)?;
        self.bump();

        match ch {
            't' => Ok('\t'),
            'n' => Ok('\n'),
            'r' => Ok('\r'),
            '"' => Ok('"'),
            '\'' => Ok('\''),
            '\\' => Ok('\\'),
            _ => Err(AsmError::lexical(
                backslash_position,
                "Illegal escape character.",
            )),
        }
    }

    /// Checks that the current character is a graphic character in the
    /// Unicode Basic Multilingual Plane and may appear inside a char or
    /// string literal.
    fn check_graphic_char(&self, literal_start: Position) -> Result<char, AsmError> {
        match self.current() {
            None => Err(AsmError::lexical(
                literal_start,
                "End of file reached before closing quote.",
            )),
            Some(ch) if (ch as u32) > 0xffff => Err(AsmError::lexical(
                self.span(),
                "Character not in Unicode Basic Multilingual Plane (BMP)",
            )),
            Some('\r') | Some('\n') => Err(AsmError::lexical(
                literal_start,
                "Char and String literals can not extend past end of line.",
            )),
            Some(ch) if ch.is_control() => Err(AsmError::lexical(
                self.span(),
                "Control characters not allowed in Char or String literal.",
            )),
            Some(ch) => Ok(ch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(source).unwrap();
        let mut out = Vec::new();
        loop {
            let token = lexer.token().clone();
            let done = token.kind == TokenKind::Eof;
            out.push(token);
            if done {
                return out;
            }
            lexer.advance().unwrap();
        }
    }

    #[test]
    fn test_opcode_and_int_literal() {
        let toks = tokens("LDCINT 42");
        assert_eq!(toks[0].kind, TokenKind::Opcode(Opcode::Ldcint));
        assert_eq!(toks[1].kind, TokenKind::IntLiteral);
        assert_eq!(toks[1].text, "42");
        assert_eq!(toks[2].kind, TokenKind::Eof);
    }

    #[test]
    fn test_opcodes_are_case_insensitive() {
        let toks = tokens("ldcint 1\nAdd");
        assert_eq!(toks[0].kind, TokenKind::Opcode(Opcode::Ldcint));
        assert_eq!(toks[2].kind, TokenKind::Opcode(Opcode::Add));
    }

    #[test]
    fn test_label_keeps_colon() {
        let toks = tokens("loop: BR loop");
        assert_eq!(toks[0].kind, TokenKind::LabelId);
        assert_eq!(toks[0].text, "loop:");
        assert_eq!(toks[1].kind, TokenKind::Opcode(Opcode::Br));
        assert_eq!(toks[2].kind, TokenKind::Identifier);
        assert_eq!(toks[2].text, "loop");
    }

    #[test]
    fn test_underscore_leads_but_never_continues() {
        let toks = tokens("_tmp: BR _tmp");
        assert_eq!(toks[0].kind, TokenKind::LabelId);
        assert_eq!(toks[0].text, "_tmp:");
        assert_eq!(toks[2].text, "_tmp");

        // an interior underscore starts a new identifier
        let toks = tokens("ab_cd");
        assert_eq!(toks[0].text, "ab");
        assert_eq!(toks[1].text, "_cd");
    }

    #[test]
    fn test_negative_int_literal() {
        let toks = tokens("LDCINT -17");
        assert_eq!(toks[1].kind, TokenKind::IntLiteral);
        assert_eq!(toks[1].text, "-17");
    }

    #[test]
    fn test_minus_without_digit_is_error() {
        assert!(Lexer::new("-x").is_err());
    }

    #[test]
    fn test_comment_is_discarded() {
        let toks = tokens("ADD ; add the operands\nSUB");
        assert_eq!(toks[0].kind, TokenKind::Opcode(Opcode::Add));
        assert_eq!(toks[1].kind, TokenKind::Opcode(Opcode::Sub));
    }

    #[test]
    fn test_char_literal_with_escape() {
        let toks = tokens("LDCCH '\\n'");
        assert_eq!(toks[1].kind, TokenKind::CharLiteral);
        assert_eq!(toks[1].text, "'\n'");
    }

    #[test]
    fn test_empty_char_literal_is_error() {
        assert!(Lexer::new("''").is_err());
    }

    #[test]
    fn test_string_literal_decodes_escapes() {
        let toks = tokens("LDCSTR \"a\\tb\"");
        assert_eq!(toks[1].kind, TokenKind::StringLiteral);
        assert_eq!(toks[1].text, "\"a\tb\"");
    }

    #[test]
    fn test_unterminated_string_is_error() {
        // construction scans the opcode; the literal is the next token
        let mut lexer = Lexer::new("LDCSTR \"abc\nADD").unwrap();
        assert!(lexer.advance().is_err());

        let mut lexer = Lexer::new("LDCSTR \"abc").unwrap();
        assert!(lexer.advance().is_err());
    }

    #[test]
    fn test_illegal_escape_is_error() {
        let mut lexer = Lexer::new("LDCSTR \"a\\qb\"").unwrap();
        assert!(lexer.advance().is_err());
    }

    #[test]
    fn test_eof_token_is_permanent() {
        let mut lexer = Lexer::new("HALT").unwrap();
        lexer.advance().unwrap();
        assert_eq!(lexer.kind(), TokenKind::Eof);
        lexer.advance().unwrap();
        lexer.advance().unwrap();
        assert_eq!(lexer.kind(), TokenKind::Eof);
    }

    #[test]
    fn test_positions() {
        let toks = tokens("HALT\n  ADD");
        assert_eq!(toks[0].position, Position::new(1, 1));
        assert_eq!(toks[1].position, Position::new(2, 3));
    }

    #[test]
    fn test_invalid_character_is_error() {
        assert!(Lexer::new("@").is_err());
    }
}
