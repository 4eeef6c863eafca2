//! Strength reduction and special-constant rewrites.

use crate::ast::Instruction;
use crate::opcode::Opcode;
use crate::token::Token;

use super::{int_value, unlabeled};

/// LDCINT 2^n; MUL  =>  SHL n  and  LDCINT 2^n; DIV  =>  SHR n
pub fn shift_special(instructions: &[Instruction]) -> Option<Vec<Instruction>> {
    let mut out: Vec<Instruction> = Vec::with_capacity(instructions.len());
    let mut changed = false;
    let mut i = 0;

    while i < instructions.len() {
        if i + 1 < instructions.len() {
            let (first, second) = (&instructions[i], &instructions[i + 1]);

            if first.opcode == Opcode::Ldcint && unlabeled(second) {
                if let Some(shift) = int_value(first).and_then(power_of_two) {
                    let replacement = match second.opcode {
                        Opcode::Mul => Some(Opcode::Shl),
                        Opcode::Div => Some(Opcode::Shr),
                        _ => None,
                    };

                    if let Some(opcode) = replacement {
                        out.push(Instruction::new(
                            first.labels.clone(),
                            opcode,
                            first.position,
                            Some(Token::synthetic_int(shift)),
                        ));
                        changed = true;
                        i += 2;
                        continue;
                    }
                }
            }
        }

        out.push(instructions[i].clone());
        i += 1;
    }

    changed.then_some(out)
}

// The shift amount n when value == 2^n, for positive values.
fn power_of_two(value: i32) -> Option<i32> {
    if value > 0 && value & (value - 1) == 0 {
        Some(value.trailing_zeros() as i32)
    } else {
        None
    }
}

/// Replace loads of the constants 0 and 1 with their zero-operand
/// forms, saving the operand bytes.
pub fn load_special(instructions: &[Instruction]) -> Option<Vec<Instruction>> {
    let mut out: Vec<Instruction> = Vec::with_capacity(instructions.len());
    let mut changed = false;

    for instruction in instructions {
        let replacement = match (instruction.opcode, int_value(instruction)) {
            (Opcode::Ldcint, Some(0)) => Some(Opcode::Ldcint0),
            (Opcode::Ldcint, Some(1)) => Some(Opcode::Ldcint1),
            (Opcode::Ldcb, Some(0)) => Some(Opcode::Ldcb0),
            (Opcode::Ldcb, Some(1)) => Some(Opcode::Ldcb1),
            _ => None,
        };

        match replacement {
            Some(opcode) => {
                out.push(Instruction::new(
                    instruction.labels.clone(),
                    opcode,
                    instruction.position,
                    None,
                ));
                changed = true;
            }
            None => out.push(instruction.clone()),
        }
    }

    changed.then_some(out)
}

/// ALLOC a; ALLOC b  =>  ALLOC a+b
pub fn alloc_fusion(instructions: &[Instruction]) -> Option<Vec<Instruction>> {
    let mut out: Vec<Instruction> = Vec::with_capacity(instructions.len());
    let mut changed = false;
    let mut i = 0;

    while i < instructions.len() {
        if i + 1 < instructions.len() {
            let (first, second) = (&instructions[i], &instructions[i + 1]);

            if first.opcode == Opcode::Alloc
                && second.opcode == Opcode::Alloc
                && unlabeled(second)
            {
                if let (Some(a), Some(b)) = (int_value(first), int_value(second)) {
                    if let Some(total) = a.checked_add(b) {
                        out.push(Instruction::new(
                            first.labels.clone(),
                            Opcode::Alloc,
                            first.position,
                            Some(Token::synthetic_int(total)),
                        ));
                        changed = true;
                        i += 2;
                        continue;
                    }
                }
            }
        }

        out.push(instructions[i].clone());
        i += 1;
    }

    changed.then_some(out)
}

/// RET 0  =>  RET0  and  RET 4  =>  RET4
///
/// Must run after dead-code elimination so an unreachable RET is
/// removed rather than specialized.
pub fn return_special(instructions: &[Instruction]) -> Option<Vec<Instruction>> {
    let mut out: Vec<Instruction> = Vec::with_capacity(instructions.len());
    let mut changed = false;

    for instruction in instructions {
        let replacement = match (instruction.opcode, int_value(instruction)) {
            (Opcode::Ret, Some(0)) => Some(Opcode::Ret0),
            (Opcode::Ret, Some(4)) => Some(Opcode::Ret4),
            _ => None,
        };

        match replacement {
            Some(opcode) => {
                out.push(Instruction::new(
                    instruction.labels.clone(),
                    opcode,
                    instruction.position,
                    None,
                ));
                changed = true;
            }
            None => out.push(instruction.clone()),
        }
    }

    changed.then_some(out)
}

#[cfg(test)]
mod tests {
    use super::super::tests::{opcodes, parse};
    use super::*;

    #[test]
    fn test_power_of_two() {
        assert_eq!(power_of_two(1), Some(0));
        assert_eq!(power_of_two(8), Some(3));
        assert_eq!(power_of_two(1 << 30), Some(30));
        assert_eq!(power_of_two(0), None);
        assert_eq!(power_of_two(6), None);
        assert_eq!(power_of_two(-8), None);
    }

    #[test]
    fn test_multiply_becomes_shift() {
        let mut program = parse("LOAD 0\nLDCINT 8\nMUL\nHALT");
        program.instructions = shift_special(&program.instructions).unwrap();

        assert_eq!(
            opcodes(&program),
            vec![Opcode::Load, Opcode::Shl, Opcode::Halt]
        );
        assert_eq!(program.instructions[1].operand.as_ref().unwrap().text, "3");
    }

    #[test]
    fn test_divide_becomes_shift() {
        let mut program = parse("LOAD 0\nLDCINT 4\nDIV\nHALT");
        program.instructions = shift_special(&program.instructions).unwrap();
        assert_eq!(program.instructions[1].opcode, Opcode::Shr);
        assert_eq!(program.instructions[1].operand.as_ref().unwrap().text, "2");
    }

    #[test]
    fn test_non_power_of_two_left_alone() {
        let program = parse("LOAD 0\nLDCINT 6\nMUL\nHALT");
        assert!(shift_special(&program.instructions).is_none());
    }

    #[test]
    fn test_load_special_constants() {
        let mut program = parse("LDCINT 0\nLDCINT 1\nLDCB 0\nLDCB 1\nLDCINT 2\nHALT");
        program.instructions = load_special(&program.instructions).unwrap();

        assert_eq!(
            opcodes(&program),
            vec![
                Opcode::Ldcint0,
                Opcode::Ldcint1,
                Opcode::Ldcb0,
                Opcode::Ldcb1,
                Opcode::Ldcint,
                Opcode::Halt
            ]
        );
        assert!(program.instructions[0].operand.is_none());
    }

    #[test]
    fn test_alloc_fusion() {
        let mut program = parse("ALLOC 4\nALLOC 8\nALLOC 2\nHALT");
        program.instructions = alloc_fusion(&program.instructions).unwrap();
        // a single sweep fuses the first pair; the driver's next round
        // would fuse the rest
        assert_eq!(program.instructions[0].operand.as_ref().unwrap().text, "12");
        assert_eq!(program.instructions[1].operand.as_ref().unwrap().text, "2");
    }

    #[test]
    fn test_labeled_alloc_not_fused() {
        let program = parse("ALLOC 4\nmark: ALLOC 8\nBR mark");
        assert!(alloc_fusion(&program.instructions).is_none());
    }

    #[test]
    fn test_return_special() {
        let mut program = parse("RET 0\nRET 4\nRET 8");
        program.instructions = return_special(&program.instructions).unwrap();

        assert_eq!(
            opcodes(&program),
            vec![Opcode::Ret0, Opcode::Ret4, Opcode::Ret]
        );
        assert!(program.instructions[0].operand.is_none());
        assert_eq!(program.instructions[2].operand.as_ref().unwrap().text, "8");
    }
}
