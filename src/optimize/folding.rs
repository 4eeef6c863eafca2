//! Constant-folding passes.

use crate::ast::Instruction;
use crate::opcode::Opcode;
use crate::token::Token;

use super::{int_value, unlabeled};

/// LDCINT a; LDCINT b; <ADD|SUB|MUL|DIV|MOD>  =>  LDCINT r
///
/// A zero divisor is never folded; the divide-by-zero fault must
/// happen at run time.
pub fn const_folding(instructions: &[Instruction]) -> Option<Vec<Instruction>> {
    let mut out: Vec<Instruction> = Vec::with_capacity(instructions.len());
    let mut changed = false;
    let mut i = 0;

    while i < instructions.len() {
        if i + 2 < instructions.len() {
            let (first, second, third) = (
                &instructions[i],
                &instructions[i + 1],
                &instructions[i + 2],
            );

            if first.opcode == Opcode::Ldcint
                && second.opcode == Opcode::Ldcint
                && unlabeled(second)
                && unlabeled(third)
            {
                if let (Some(a), Some(b)) = (int_value(first), int_value(second)) {
                    let folded = match third.opcode {
                        Opcode::Add => Some(a.wrapping_add(b)),
                        Opcode::Sub => Some(a.wrapping_sub(b)),
                        Opcode::Mul => Some(a.wrapping_mul(b)),
                        Opcode::Div if b != 0 => Some(a.wrapping_div(b)),
                        Opcode::Mod if b != 0 => Some(a.wrapping_rem(b)),
                        _ => None,
                    };

                    if let Some(value) = folded {
                        out.push(Instruction::new(
                            first.labels.clone(),
                            Opcode::Ldcint,
                            first.position,
                            Some(Token::synthetic_int(value)),
                        ));
                        changed = true;
                        i += 3;
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

/// LDCINT x; NEG  =>  LDCINT -x
pub fn const_neg(instructions: &[Instruction]) -> Option<Vec<Instruction>> {
    let mut out: Vec<Instruction> = Vec::with_capacity(instructions.len());
    let mut changed = false;
    let mut i = 0;

    while i < instructions.len() {
        if i + 1 < instructions.len() {
            let (first, second) = (&instructions[i], &instructions[i + 1]);

            if first.opcode == Opcode::Ldcint
                && second.opcode == Opcode::Neg
                && unlabeled(second)
            {
                if let Some(value) = int_value(first) {
                    out.push(Instruction::new(
                        first.labels.clone(),
                        Opcode::Ldcint,
                        first.position,
                        Some(Token::synthetic_int(value.wrapping_neg())),
                    ));
                    changed = true;
                    i += 2;
                    continue;
                }
            }
        }

        out.push(instructions[i].clone());
        i += 1;
    }

    changed.then_some(out)
}

/// LDCINT 1; ADD  =>  INC  and  LDCINT 1; SUB  =>  DEC
pub fn inc_dec(instructions: &[Instruction]) -> Option<Vec<Instruction>> {
    let mut out: Vec<Instruction> = Vec::with_capacity(instructions.len());
    let mut changed = false;
    let mut i = 0;

    while i < instructions.len() {
        if i + 1 < instructions.len() {
            let (first, second) = (&instructions[i], &instructions[i + 1]);

            if first.opcode == Opcode::Ldcint
                && int_value(first) == Some(1)
                && unlabeled(second)
            {
                let replacement = match second.opcode {
                    Opcode::Add => Some(Opcode::Inc),
                    Opcode::Sub => Some(Opcode::Dec),
                    _ => None,
                };

                if let Some(opcode) = replacement {
                    out.push(Instruction::new(
                        first.labels.clone(),
                        opcode,
                        first.position,
                        None,
                    ));
                    changed = true;
                    i += 2;
                    continue;
                }
            }
        }

        out.push(instructions[i].clone());
        i += 1;
    }

    changed.then_some(out)
}

/// LDCINT 1; <load>; ADD  =>  <load>; INC
///
/// Addition commutes, so the constant 1 pushed before the loaded value
/// increments it all the same.  Subtraction does not commute and is
/// left alone.  Only loads that consume nothing from the stack qualify:
/// LOAD, LOADB, LOAD2B and LOADW pop their address, and here that
/// address would be the constant 1 itself.
pub fn inc_dec_commuted(instructions: &[Instruction]) -> Option<Vec<Instruction>> {
    let mut out: Vec<Instruction> = Vec::with_capacity(instructions.len());
    let mut changed = false;
    let mut i = 0;

    while i < instructions.len() {
        if i + 2 < instructions.len() {
            let (first, second, third) = (
                &instructions[i],
                &instructions[i + 1],
                &instructions[i + 2],
            );

            if first.opcode == Opcode::Ldcint
                && int_value(first) == Some(1)
                && is_load(second.opcode)
                && unlabeled(second)
                && third.opcode == Opcode::Add
                && unlabeled(third)
            {
                let mut labels = first.labels.clone();
                labels.extend(second.labels.iter().cloned());
                out.push(Instruction::new(
                    labels,
                    second.opcode,
                    first.position,
                    second.operand.clone(),
                ));
                out.push(Instruction::new(
                    Vec::new(),
                    Opcode::Inc,
                    third.position,
                    None,
                ));
                changed = true;
                i += 3;
                continue;
            }
        }

        out.push(instructions[i].clone());
        i += 1;
    }

    changed.then_some(out)
}

fn is_load(opcode: Opcode) -> bool {
    matches!(
        opcode,
        Opcode::Ldcb
            | Opcode::Ldcb0
            | Opcode::Ldcb1
            | Opcode::Ldcch
            | Opcode::Ldcint
            | Opcode::Ldcint0
            | Opcode::Ldcint1
            | Opcode::Ldladdr
            | Opcode::Ldgaddr
    )
}

#[cfg(test)]
mod tests {
    use super::super::tests::{opcodes, parse};
    use super::*;

    #[test]
    fn test_const_folding_arithmetic() {
        let program = parse("LDCINT 6\nLDCINT 3\nMUL\nHALT");
        let folded = const_folding(&program.instructions).unwrap();

        assert_eq!(folded.len(), 2);
        assert_eq!(folded[0].opcode, Opcode::Ldcint);
        assert_eq!(folded[0].operand.as_ref().unwrap().text, "18");
    }

    #[test]
    fn test_division_by_zero_not_folded() {
        let program = parse("LDCINT 6\nLDCINT 0\nDIV\nHALT");
        assert!(const_folding(&program.instructions).is_none());
    }

    #[test]
    fn test_labeled_operand_blocks_fold() {
        // the second LDCINT is a branch target; folding would break it
        let program = parse("LDCINT 6\nhere: LDCINT 3\nADD\nBR here");
        assert!(const_folding(&program.instructions).is_none());
    }

    #[test]
    fn test_labels_kept_on_fold() {
        let program = parse("top: LDCINT 2\nLDCINT 2\nADD\nBR top");
        let folded = const_folding(&program.instructions).unwrap();
        assert_eq!(folded[0].labels[0].text, "top:");
    }

    #[test]
    fn test_const_neg() {
        let program = parse("LDCINT 5\nNEG\nHALT");
        let rewritten = const_neg(&program.instructions).unwrap();
        assert_eq!(rewritten[0].operand.as_ref().unwrap().text, "-5");
    }

    #[test]
    fn test_inc_dec() {
        let program = parse("LOAD 0\nLDCINT 1\nADD\nLDCINT 1\nSUB\nHALT");
        let rewritten = inc_dec(&program.instructions).unwrap();
        assert_eq!(
            rewritten.iter().map(|i| i.opcode).collect::<Vec<_>>(),
            vec![Opcode::Load, Opcode::Inc, Opcode::Dec, Opcode::Halt]
        );
    }

    #[test]
    fn test_inc_requires_constant_one() {
        let program = parse("LDCINT 2\nADD\nHALT");
        assert!(inc_dec(&program.instructions).is_none());
    }

    #[test]
    fn test_inc_dec_commuted() {
        let mut program = parse("LDCINT 1\nLDLADDR 8\nADD\nHALT");
        program.instructions = inc_dec_commuted(&program.instructions).unwrap();

        assert_eq!(
            opcodes(&program),
            vec![Opcode::Ldladdr, Opcode::Inc, Opcode::Halt]
        );
        assert_eq!(program.instructions[0].operand.as_ref().unwrap().text, "8");
    }

    #[test]
    fn test_commuted_sub_left_alone() {
        let program = parse("LDCINT 1\nLDLADDR 8\nSUB\nHALT");
        assert!(inc_dec_commuted(&program.instructions).is_none());
    }

    #[test]
    fn test_popping_load_blocks_commuted_inc() {
        // LOADW consumes the address on top of the stack; here that
        // address is the constant 1, so the rewrite would change the
        // program's result
        let program = parse("LDCINT 5\nLDCINT 1\nLOADW\nADD\nPUTINT\nHALT");
        assert!(inc_dec_commuted(&program.instructions).is_none());
    }
}
