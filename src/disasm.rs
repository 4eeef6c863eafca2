//! Disassembler: translates object code back into assembly mnemonics.
//!
//! Output is one line per instruction: the byte address right-justified
//! in a four-character field, a colon, the mnemonic and the decoded
//! operand.  Char and string operands are printed as literals with
//! escape sequences restored, so the text reads like the source the
//! code was assembled from (labels excepted: branch operands come out
//! as raw displacements).

use std::io::Write;

use thiserror::Error;

use crate::bytes;
use crate::opcode::{Opcode, OperandKind};

#[derive(Debug, Error)]
pub enum DisasmError {
    #[error("*** Unknown opcode {0} at address {1} ***")]
    UnknownOpcode(u8, usize),

    #[error("*** Unexpected end of object code ***")]
    UnexpectedEof,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Disassemble a complete object code stream.
pub fn disassemble<W: Write>(code: &[u8], out: &mut W) -> Result<(), DisasmError> {
    let mut reader = ByteReader { code, pos: 0 };

    while !reader.at_end() {
        let address = reader.pos;
        let byte = reader.byte()?;
        let opcode =
            Opcode::from_byte(byte).ok_or(DisasmError::UnknownOpcode(byte, address))?;

        write!(out, "{address:>4}:  {opcode}")?;

        match opcode.operand_kind() {
            OperandKind::None => {}
            OperandKind::Byte => write!(out, " {}", reader.byte()? as i8)?,
            OperandKind::Int => write!(out, " {}", reader.int()?)?,
            OperandKind::Char => write!(out, " '{}'", escaped(reader.char()?))?,
            OperandKind::Str => {
                let length = reader.int()?;
                write!(out, "  \"")?;
                for _ in 0..length {
                    write!(out, "{}", escaped(reader.char()?))?;
                }
                write!(out, "\"")?;
            }
        }

        writeln!(out)?;
    }

    Ok(())
}

// Restores the escape sequence for characters that have one.
fn escaped(ch: char) -> String {
    match ch {
        '\t' => "\\t".to_string(),
        '\n' => "\\n".to_string(),
        '\r' => "\\r".to_string(),
        '"' => "\\\"".to_string(),
        '\'' => "\\'".to_string(),
        '\\' => "\\\\".to_string(),
        _ => ch.to_string(),
    }
}

struct ByteReader<'a> {
    code: &'a [u8],
    pos: usize,
}

impl ByteReader<'_> {
    fn at_end(&self) -> bool {
        self.pos >= self.code.len()
    }

    fn byte(&mut self) -> Result<u8, DisasmError> {
        let b = *self.code.get(self.pos).ok_or(DisasmError::UnexpectedEof)?;
        self.pos += 1;
        Ok(b)
    }

    fn int(&mut self) -> Result<i32, DisasmError> {
        Ok(bytes::bytes_to_int(
            self.byte()?,
            self.byte()?,
            self.byte()?,
            self.byte()?,
        ))
    }

    fn char(&mut self) -> Result<char, DisasmError> {
        Ok(bytes::bytes_to_char(self.byte()?, self.byte()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorReporter;
    use crate::labels::LabelTable;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn assemble(source: &str) -> Vec<u8> {
        let mut reporter = ErrorReporter::new();
        let lexer = Lexer::new(source).unwrap();
        let mut program = Parser::new(lexer, &mut reporter).parse_program().unwrap();

        let mut labels = LabelTable::new();
        program.set_addresses(&mut labels, &mut reporter).unwrap();
        assert!(!reporter.errors_exist());
        program.emit(&labels).unwrap()
    }

    fn disassembled(code: &[u8]) -> String {
        let mut out = Vec::new();
        disassemble(code, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_addresses_and_mnemonics() {
        let code = assemble("PROGRAM 2\nLDCINT 7\nADD\nHALT");
        assert_eq!(
            disassembled(&code),
            "   0:  PROGRAM 2\n   5:  LDCINT 7\n  10:  ADD\n  11:  HALT\n"
        );
    }

    #[test]
    fn test_branch_operand_is_a_displacement() {
        let code = assemble("BR end\nADD\nend: HALT");
        assert_eq!(
            disassembled(&code),
            "   0:  BR 1\n   5:  ADD\n   6:  HALT\n"
        );
    }

    #[test]
    fn test_byte_operands() {
        let code = assemble("LDCB -1\nSHL 8\nHALT");
        assert_eq!(
            disassembled(&code),
            "   0:  LDCB -1\n   2:  SHL 8\n   4:  HALT\n"
        );
    }

    #[test]
    fn test_literal_escapes_restored() {
        let code = assemble("LDCCH '\\n'\nLDCSTR \"a\\tb\"\nHALT");
        assert_eq!(
            disassembled(&code),
            "   0:  LDCCH '\\n'\n   3:  LDCSTR  \"a\\tb\"\n  14:  HALT\n"
        );
    }

    #[test]
    fn test_mnemonic_round_trip() {
        let source = "PROGRAM 4\nLDGADDR 0\nLDCINT 3\nSTOREW\nLDCSTR \"ok\"\nPUTSTR 2\nHALT";
        let text = disassembled(&assemble(source));

        let mnemonics: Vec<&str> = text
            .lines()
            .map(|line| {
                line.split_once(":  ")
                    .map(|(_, rest)| rest.split_whitespace().next().unwrap())
                    .unwrap()
            })
            .collect();
        assert_eq!(
            mnemonics,
            vec!["PROGRAM", "LDGADDR", "LDCINT", "STOREW", "LDCSTR", "PUTSTR", "HALT"]
        );
    }

    #[test]
    fn test_unknown_opcode_is_an_error() {
        let mut out = Vec::new();
        assert!(matches!(
            disassemble(&[3], &mut out),
            Err(DisasmError::UnknownOpcode(3, 0))
        ));
    }

    #[test]
    fn test_truncated_operand_is_an_error() {
        let mut out = Vec::new();
        let code = [Opcode::Ldcint.value(), 0, 0];
        assert!(matches!(
            disassemble(&code, &mut out),
            Err(DisasmError::UnexpectedEof)
        ));
    }
}
