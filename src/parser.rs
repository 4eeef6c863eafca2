//! Recursive-descent parser for Cinder assembly language.
//!
//! Grammar:
//! ```text
//! program     = instruction* .
//! instruction = labelId* opcode operand? .
//! operand     = identifier | intLiteral | charLiteral | stringLiteral .
//! ```
//!
//! Syntax errors are reported and the parser resynchronizes to the next
//! token that can start an instruction; lexical and fatal errors abort
//! the parse.

use crate::ast::{Instruction, Program};
use crate::errors::{AsmError, ErrorReporter};
use crate::lexer::Lexer;
use crate::opcode::Opcode;
use crate::token::{Token, TokenKind};

pub struct Parser<'a> {
    lexer: Lexer,
    reporter: &'a mut ErrorReporter,
}

impl<'a> Parser<'a> {
    pub fn new(lexer: Lexer, reporter: &'a mut ErrorReporter) -> Self {
        Parser { lexer, reporter }
    }

    /// Parse the whole source file into a program.
    ///
    /// Returns `Err` only for unrecoverable errors; recoverable syntax
    /// errors are collected in the reporter and the partial program is
    /// still returned so later phases can report more of them.
    pub fn parse_program(mut self) -> Result<Program, AsmError> {
        let mut program = Program::new();

        while self.lexer.kind() != TokenKind::Eof {
            match self.parse_instruction() {
                Ok(Some(instruction)) => program.add_instruction(instruction),
                Ok(None) => {}
                Err(error @ (AsmError::Lexical { .. } | AsmError::Fatal(_))) => return Err(error),
                Err(error) => {
                    self.reporter.report(&error)?;
                    self.resynchronize()?;
                }
            }
        }

        Ok(program)
    }

    fn parse_instruction(&mut self) -> Result<Option<Instruction>, AsmError> {
        let mut labels = Vec::new();
        while self.lexer.kind() == TokenKind::LabelId {
            labels.push(self.lexer.token().clone());
            self.lexer.advance()?;
        }

        // a label at the very end of the file labels an implicit HALT
        if self.lexer.kind() == TokenKind::Eof {
            if labels.is_empty() {
                return Ok(None);
            }
            return Ok(Some(Instruction::new(
                labels,
                Opcode::Halt,
                self.lexer.position(),
                None,
            )));
        }

        let opcode = match self.lexer.kind() {
            TokenKind::Opcode(opcode) => opcode,
            _ => {
                return Err(AsmError::syntax(
                    self.lexer.position(),
                    format!(
                        "Expecting an opcode but found \"{}\" instead.",
                        self.lexer.token()
                    ),
                ));
            }
        };
        let position = self.lexer.position();
        self.lexer.advance()?;

        let operand = if opcode.num_args() == 1 {
            Some(self.parse_operand()?)
        } else {
            None
        };

        Ok(Some(Instruction::new(labels, opcode, position, operand)))
    }

    fn parse_operand(&mut self) -> Result<Token, AsmError> {
        match self.lexer.kind() {
            TokenKind::Identifier
            | TokenKind::IntLiteral
            | TokenKind::CharLiteral
            | TokenKind::StringLiteral => {
                let operand = self.lexer.token().clone();
                self.lexer.advance()?;
                Ok(operand)
            }
            _ => Err(AsmError::syntax(
                self.lexer.position(),
                format!(
                    "Expecting an operand but found \"{}\" instead.",
                    self.lexer.token()
                ),
            )),
        }
    }

    // Skip forward to the next token that can start an instruction.
    fn resynchronize(&mut self) -> Result<(), AsmError> {
        self.lexer
            .advance_to(|kind| matches!(kind, TokenKind::Opcode(_) | TokenKind::LabelId))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> (Program, ErrorReporter) {
        let mut reporter = ErrorReporter::new();
        let lexer = Lexer::new(source).unwrap();
        let program = Parser::new(lexer, &mut reporter).parse_program().unwrap();
        (program, reporter)
    }

    #[test]
    fn test_simple_program() {
        let (program, reporter) = parse("PROGRAM 0\nLDCINT 3\nLDCINT 4\nADD\nPUTINT\nHALT");
        assert!(!reporter.errors_exist());

        let opcodes: Vec<Opcode> = program.instructions.iter().map(|i| i.opcode).collect();
        assert_eq!(
            opcodes,
            vec![
                Opcode::Program,
                Opcode::Ldcint,
                Opcode::Ldcint,
                Opcode::Add,
                Opcode::Putint,
                Opcode::Halt
            ]
        );
        assert_eq!(program.instructions[1].operand.as_ref().unwrap().text, "3");
    }

    #[test]
    fn test_labels_attach_to_next_instruction() {
        let (program, reporter) = parse("L1:\nL2: ADD\nBR L1");
        assert!(!reporter.errors_exist());

        let first = &program.instructions[0];
        assert_eq!(first.opcode, Opcode::Add);
        assert_eq!(first.labels.len(), 2);
        assert_eq!(first.labels[0].text, "L1:");
        assert_eq!(first.labels[1].text, "L2:");
    }

    #[test]
    fn test_label_at_eof_synthesizes_halt() {
        let (program, reporter) = parse("BR exit\nexit:");
        assert!(!reporter.errors_exist());

        let last = program.instructions.last().unwrap();
        assert_eq!(last.opcode, Opcode::Halt);
        assert_eq!(last.labels[0].text, "exit:");
    }

    #[test]
    fn test_misspelled_opcode_is_reported() {
        let (program, reporter) = parse("LDCNT 3\nHALT");
        assert!(reporter.errors_exist());
        assert!(reporter.messages()[0].contains("Expecting an opcode but found \"LDCNT\""));

        // parser recovered and kept going
        assert_eq!(program.instructions.last().unwrap().opcode, Opcode::Halt);
    }

    #[test]
    fn test_missing_operand_is_reported() {
        let (program, reporter) = parse("LDCINT\nHALT");
        assert!(reporter.errors_exist());
        assert!(reporter.messages()[0].contains("Expecting an operand"));
        assert_eq!(program.instructions.last().unwrap().opcode, Opcode::Halt);
    }

    #[test]
    fn test_missing_operand_at_eof() {
        let (_, reporter) = parse("LDCINT");
        assert!(reporter.errors_exist());
        assert!(reporter.messages()[0].contains("End-of-File"));
    }

    #[test]
    fn test_operand_kinds_accepted() {
        let (program, reporter) = parse("LDCCH 'x'\nLDCSTR \"hi\"\nLDCB 7\nCALL sub1");
        assert!(!reporter.errors_exist());
        assert_eq!(program.instructions.len(), 4);
        assert_eq!(
            program.instructions[3].operand.as_ref().unwrap().kind,
            TokenKind::Identifier
        );
    }
}
