//! The assembled program: an ordered list of instructions.
//!
//! An instruction is a single tagged value {labels, opcode, operand}
//! rather than one type per opcode; the opcode table drives argument
//! checking, size computation and emission for all of them.

use crate::bytes::{self, BYTES_PER_CHAR, BYTES_PER_INTEGER, BYTES_PER_OPCODE};
use crate::errors::{AsmError, ErrorReporter};
use crate::labels::LabelTable;
use crate::opcode::{Opcode, OperandKind};
use crate::token::{Position, Token, TokenKind};

/// One assembly-language instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Labels attached to this instruction (text keeps the colon).
    pub labels: Vec<Token>,
    pub opcode: Opcode,
    /// Position of the opcode mnemonic in the source.
    pub position: Position,
    /// The single operand, when the opcode takes one.
    pub operand: Option<Token>,
    /// Byte address, assigned by `Program::set_addresses`.
    pub address: i32,
}

impl Instruction {
    pub fn new(labels: Vec<Token>, opcode: Opcode, position: Position, operand: Option<Token>) -> Self {
        Instruction {
            labels,
            opcode,
            position,
            operand,
            address: 0,
        }
    }

    /// Size in bytes: one for the opcode plus the operand size.
    pub fn size(&self) -> i32 {
        let operand_size = match self.opcode.operand_kind() {
            OperandKind::None => 0,
            OperandKind::Byte => 1,
            OperandKind::Int => BYTES_PER_INTEGER,
            OperandKind::Char => BYTES_PER_CHAR,
            OperandKind::Str => BYTES_PER_INTEGER + BYTES_PER_CHAR * self.string_length(),
        };
        BYTES_PER_OPCODE + operand_size
    }

    /// The operand parsed as a 32-bit integer.
    pub fn int_operand(&self) -> Result<i32, AsmError> {
        let operand = self.require_operand()?;
        operand.text.parse::<i32>().map_err(|_| {
            AsmError::constraint(
                operand.position,
                format!("\"{}\" is not a valid integer literal.", operand.text),
            )
        })
    }

    /// Number of characters in a string-literal operand (quotes excluded).
    /// Zero for any other operand.
    pub fn string_length(&self) -> i32 {
        match &self.operand {
            Some(operand) if operand.kind == TokenKind::StringLiteral => {
                operand.text.chars().count() as i32 - 2
            }
            _ => 0,
        }
    }

    fn require_operand(&self) -> Result<&Token, AsmError> {
        self.operand.as_ref().ok_or_else(|| {
            AsmError::constraint(self.position, "One argument is required for this opcode.")
        })
    }

    fn check_operand_kind(&self, expected: TokenKind, description: &str) -> Result<(), AsmError> {
        let operand = self.require_operand()?;
        if operand.kind != expected {
            return Err(AsmError::constraint(
                operand.position,
                format!("Expecting {description} but found \"{operand}\" instead."),
            ));
        }
        Ok(())
    }

    fn check_int_range(&self, min: i32, max: i32) -> Result<(), AsmError> {
        let value = self.int_operand()?;
        if value < min || value > max {
            let operand = self.require_operand()?;
            return Err(AsmError::constraint(
                operand.position,
                format!("Operand must be in the range {min}..{max}."),
            ));
        }
        Ok(())
    }

    /// Validate the operand against what the opcode expects.  Label
    /// existence checks assume addresses have already been assigned.
    pub fn check_constraints(&self, labels: &LabelTable) -> Result<(), AsmError> {
        match self.opcode.operand_kind() {
            OperandKind::None => Ok(()),

            OperandKind::Byte => {
                self.check_operand_kind(TokenKind::IntLiteral, "an integer literal")?;
                match self.opcode {
                    // shift amounts wider than the word are meaningless
                    Opcode::Shl | Opcode::Shr => self.check_int_range(0, 31),
                    _ => self.check_int_range(i8::MIN as i32, i8::MAX as i32),
                }
            }

            OperandKind::Int if self.opcode.is_branch_or_call() => {
                let operand = self.require_operand()?;
                self.check_operand_kind(TokenKind::Identifier, "a label identifier")?;
                if !labels.is_defined(&operand.text) {
                    return Err(AsmError::constraint(
                        operand.position,
                        format!("label \"{}\" has not been defined.", operand.text),
                    ));
                }
                Ok(())
            }

            OperandKind::Int => {
                self.check_operand_kind(TokenKind::IntLiteral, "an integer literal")?;
                match self.opcode {
                    // byte counts and parameter lengths cannot be negative
                    Opcode::Program
                    | Opcode::Proc
                    | Opcode::Alloc
                    | Opcode::Ret
                    | Opcode::Getstr
                    | Opcode::Putstr => self.check_int_range(0, i32::MAX),
                    _ => self.int_operand().map(|_| ()),
                }
            }

            OperandKind::Char => self.check_operand_kind(TokenKind::CharLiteral, "a char literal"),

            OperandKind::Str => {
                self.check_operand_kind(TokenKind::StringLiteral, "a string literal")
            }
        }
    }

    /// The displacement from this instruction to its label operand,
    /// relative to the address of the next instruction.
    pub fn displacement(&self, labels: &LabelTable) -> Result<i32, AsmError> {
        let operand = self.require_operand()?;
        let target = labels.address_of_identifier(&operand.text).ok_or_else(|| {
            AsmError::constraint(
                operand.position,
                format!("label \"{}\" has not been defined.", operand.text),
            )
        })?;
        Ok(target - (self.address + self.size()))
    }

    /// Append this instruction's object code to the output buffer.
    pub fn emit(&self, labels: &LabelTable, out: &mut Vec<u8>) -> Result<(), AsmError> {
        out.push(self.opcode.value());

        match self.opcode.operand_kind() {
            OperandKind::None => {}

            OperandKind::Byte => {
                out.push(self.int_operand()? as u8);
            }

            OperandKind::Int if self.opcode.is_branch_or_call() => {
                out.extend_from_slice(&bytes::int_to_bytes(self.displacement(labels)?));
            }

            OperandKind::Int => {
                out.extend_from_slice(&bytes::int_to_bytes(self.int_operand()?));
            }

            OperandKind::Char => {
                let operand = self.require_operand()?;
                // text is 'c' with the escape already decoded
                let ch = operand.text.chars().nth(1).ok_or_else(|| {
                    AsmError::constraint(operand.position, "Empty char literal.")
                })?;
                out.extend_from_slice(&bytes::char_to_bytes(ch));
            }

            OperandKind::Str => {
                let operand = self.require_operand()?;
                out.extend_from_slice(&bytes::int_to_bytes(self.string_length()));
                let chars: Vec<char> = operand.text.chars().collect();
                // omit the opening and closing quotes
                for &ch in &chars[1..chars.len() - 1] {
                    out.extend_from_slice(&bytes::char_to_bytes(ch));
                }
            }
        }

        Ok(())
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for label in &self.labels {
            writeln!(f, "{}", label.text)?;
        }
        write!(f, "   {}", self.opcode)?;
        if let Some(operand) = &self.operand {
            write!(f, " {}", operand.text)?;
        }
        Ok(())
    }
}

/// An ordered sequence of instructions; owns them exclusively.
///
/// Built by the parser, rewritten by the optimizer, frozen by
/// `set_addresses`, then read-only for constraint checking and emission.
#[derive(Debug, Default)]
pub struct Program {
    pub instructions: Vec<Instruction>,
}

impl Program {
    pub fn new() -> Self {
        Program::default()
    }

    pub fn add_instruction(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    /// Assign a byte address to every instruction and bind its labels.
    ///
    /// Must run exactly once, after optimization and before constraint
    /// checking: later phases assume the label table is complete.
    pub fn set_addresses(
        &mut self,
        labels: &mut LabelTable,
        reporter: &mut ErrorReporter,
    ) -> Result<(), AsmError> {
        let mut address = 0;
        for instruction in &mut self.instructions {
            for label in &instruction.labels {
                if let Err(error) = labels.define(label, address) {
                    reporter.report(&error)?;
                }
            }
            instruction.address = address;
            address += instruction.size();
        }
        Ok(())
    }

    /// Check operand constraints for every instruction, collecting
    /// errors so several can be reported for one file.
    pub fn check_constraints(
        &self,
        labels: &LabelTable,
        reporter: &mut ErrorReporter,
    ) -> Result<(), AsmError> {
        for instruction in &self.instructions {
            if let Err(error) = instruction.check_constraints(labels) {
                reporter.report(&error)?;
            }
        }
        Ok(())
    }

    /// Serialize the resolved program to object code.
    pub fn emit(&self, labels: &LabelTable) -> Result<Vec<u8>, AsmError> {
        let mut out = Vec::new();
        for instruction in &self.instructions {
            instruction.emit(labels, &mut out)?;
        }
        Ok(out)
    }
}

impl std::fmt::Display for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for instruction in &self.instructions {
            writeln!(f, "{instruction}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inst(opcode: Opcode, operand: Option<Token>) -> Instruction {
        Instruction::new(Vec::new(), opcode, Position::default(), operand)
    }

    fn int_operand(text: &str) -> Option<Token> {
        Some(Token::new(TokenKind::IntLiteral, Position::default(), text))
    }

    fn id_operand(text: &str) -> Option<Token> {
        Some(Token::new(TokenKind::Identifier, Position::default(), text))
    }

    #[test]
    fn test_instruction_sizes() {
        assert_eq!(inst(Opcode::Halt, None).size(), 1);
        assert_eq!(inst(Opcode::Ldcb, int_operand("7")).size(), 2);
        assert_eq!(inst(Opcode::Ldcint, int_operand("7")).size(), 5);
        let ch = Token::new(TokenKind::CharLiteral, Position::default(), "'x'");
        assert_eq!(inst(Opcode::Ldcch, Some(ch)).size(), 3);
        let s = Token::new(TokenKind::StringLiteral, Position::default(), "\"abc\"");
        assert_eq!(inst(Opcode::Ldcstr, Some(s)).size(), 1 + 4 + 2 * 3);
    }

    #[test]
    fn test_addresses_are_contiguous() {
        let mut program = Program::new();
        program.add_instruction(inst(Opcode::Program, int_operand("0")));
        program.add_instruction(inst(Opcode::Ldcint, int_operand("3")));
        program.add_instruction(inst(Opcode::Add, None));
        program.add_instruction(inst(Opcode::Halt, None));

        let mut labels = LabelTable::new();
        let mut reporter = ErrorReporter::new();
        program.set_addresses(&mut labels, &mut reporter).unwrap();

        for pair in program.instructions.windows(2) {
            assert_eq!(pair[1].address, pair[0].address + pair[0].size());
        }
    }

    #[test]
    fn test_duplicate_label_reported() {
        let label = Token::new(TokenKind::LabelId, Position::default(), "L1:");
        let mut program = Program::new();
        program.add_instruction(Instruction::new(
            vec![label.clone()],
            Opcode::Halt,
            Position::default(),
            None,
        ));
        program.add_instruction(Instruction::new(
            vec![label],
            Opcode::Halt,
            Position::default(),
            None,
        ));

        let mut labels = LabelTable::new();
        let mut reporter = ErrorReporter::new();
        program.set_addresses(&mut labels, &mut reporter).unwrap();

        assert!(reporter.errors_exist());
        assert!(reporter.messages()[0].contains("already been defined"));
    }

    #[test]
    fn test_undefined_label_rejected() {
        let labels = LabelTable::new();
        let branch = inst(Opcode::Br, id_operand("nowhere"));
        let error = branch.check_constraints(&labels).unwrap_err();
        assert!(error.to_string().contains("has not been defined"));
    }

    #[test]
    fn test_shift_range_constraint() {
        let labels = LabelTable::new();
        assert!(inst(Opcode::Shl, int_operand("31"))
            .check_constraints(&labels)
            .is_ok());
        assert!(inst(Opcode::Shl, int_operand("32"))
            .check_constraints(&labels)
            .is_err());
        assert!(inst(Opcode::Shr, int_operand("-1"))
            .check_constraints(&labels)
            .is_err());
    }

    #[test]
    fn test_byte_operand_range() {
        let labels = LabelTable::new();
        assert!(inst(Opcode::Ldcb, int_operand("-128"))
            .check_constraints(&labels)
            .is_ok());
        assert!(inst(Opcode::Ldcb, int_operand("200"))
            .check_constraints(&labels)
            .is_err());
    }

    #[test]
    fn test_negative_length_rejected() {
        let labels = LabelTable::new();
        assert!(inst(Opcode::Alloc, int_operand("-4"))
            .check_constraints(&labels)
            .is_err());
        assert!(inst(Opcode::Ldcint, int_operand("-4"))
            .check_constraints(&labels)
            .is_ok());
    }

    #[test]
    fn test_branch_operand_must_be_identifier() {
        let labels = LabelTable::new();
        let branch = inst(Opcode::Br, int_operand("4"));
        assert!(branch.check_constraints(&labels).is_err());
    }

    #[test]
    fn test_displacement_is_relative_to_next_instruction() {
        let label = Token::new(TokenKind::LabelId, Position::default(), "top:");
        let mut program = Program::new();
        program.add_instruction(Instruction::new(
            vec![label],
            Opcode::Ldcint0,
            Position::default(),
            None,
        ));
        program.add_instruction(inst(Opcode::Br, id_operand("top")));

        let mut labels = LabelTable::new();
        let mut reporter = ErrorReporter::new();
        program.set_addresses(&mut labels, &mut reporter).unwrap();

        // BR at address 1, size 5; target address 0 => displacement -6
        let branch = &program.instructions[1];
        assert_eq!(branch.displacement(&labels).unwrap(), -6);

        // a displacement of 0 means fall through
        let mut fall = Program::new();
        fall.add_instruction(inst(Opcode::Br, id_operand("next")));
        fall.add_instruction(Instruction::new(
            vec![Token::new(TokenKind::LabelId, Position::default(), "next:")],
            Opcode::Halt,
            Position::default(),
            None,
        ));
        let mut labels = LabelTable::new();
        let mut reporter = ErrorReporter::new();
        fall.set_addresses(&mut labels, &mut reporter).unwrap();
        assert_eq!(fall.instructions[0].displacement(&labels).unwrap(), 0);
    }

    #[test]
    fn test_emit_int_and_string() {
        let labels = LabelTable::new();

        let mut out = Vec::new();
        inst(Opcode::Ldcint, int_operand("7"))
            .emit(&labels, &mut out)
            .unwrap();
        assert_eq!(out, vec![16, 0, 0, 0, 7]);

        let s = Token::new(TokenKind::StringLiteral, Position::default(), "\"Hi\"");
        let mut out = Vec::new();
        inst(Opcode::Ldcstr, Some(s)).emit(&labels, &mut out).unwrap();
        assert_eq!(out, vec![17, 0, 0, 0, 2, 0, b'H', 0, b'i']);
    }
}
