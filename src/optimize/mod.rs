//! Peephole optimizer.
//!
//! Each pass is a pure rewrite: it reads a slice of instructions and
//! returns a new vector only when it changed something.  The driver runs
//! the fixed pass list in order, repeating the whole list until a full
//! round leaves the program untouched.  Passes run before addresses are
//! assigned, so they reorder and remove instructions freely; labels on
//! consumed instructions are merged onto the replacement so branch
//! targets survive.

mod branches;
mod folding;
mod special;

use crate::ast::{Instruction, Program};

pub use branches::{branch_reduction, dead_code};
pub use folding::{const_folding, const_neg, inc_dec, inc_dec_commuted};
pub use special::{alloc_fusion, load_special, return_special, shift_special};

type Pass = fn(&[Instruction]) -> Option<Vec<Instruction>>;

// Order matters: dead_code must precede return_special so that a RET
// made unreachable by an earlier rewrite is removed before it is
// specialized, and branch_reduction runs after the folding passes have
// settled the comparison operands.
const PASSES: [Pass; 10] = [
    const_folding,
    inc_dec,
    inc_dec_commuted,
    shift_special,
    branch_reduction,
    const_neg,
    load_special,
    alloc_fusion,
    dead_code,
    return_special,
];

/// Run every optimization pass to a fixed point.
pub fn optimize(program: &mut Program) {
    loop {
        let mut changed = false;
        for pass in PASSES {
            if let Some(rewritten) = pass(&program.instructions) {
                program.instructions = rewritten;
                changed = true;
            }
        }
        if !changed {
            return;
        }
    }
}

/// The operand parsed as an integer, when there is one and it parses.
/// Unparseable operands are left for the constraint checker to report.
fn int_value(instruction: &Instruction) -> Option<i32> {
    instruction
        .operand
        .as_ref()
        .and_then(|operand| operand.text.parse::<i32>().ok())
}

fn unlabeled(instruction: &Instruction) -> bool {
    instruction.labels.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorReporter;
    use crate::labels::LabelTable;
    use crate::lexer::Lexer;
    use crate::opcode::Opcode;
    use crate::parser::Parser;

    pub(super) fn parse(source: &str) -> Program {
        let mut reporter = ErrorReporter::new();
        let lexer = Lexer::new(source).unwrap();
        let program = Parser::new(lexer, &mut reporter).parse_program().unwrap();
        assert!(!reporter.errors_exist());
        program
    }

    pub(super) fn opcodes(program: &Program) -> Vec<Opcode> {
        program.instructions.iter().map(|i| i.opcode).collect()
    }

    #[test]
    fn test_passes_reach_a_fixed_point() {
        let mut program = parse("PROGRAM 0\nLDCINT 2\nLDCINT 3\nADD\nLDCINT 1\nADD\nPUTINT\nHALT");
        optimize(&mut program);
        let after_first = opcodes(&program);

        optimize(&mut program);
        assert_eq!(opcodes(&program), after_first);
    }

    #[test]
    fn test_cascading_folds() {
        // 2+3 folds to 5, then 5;NEG folds to -5, then nothing more
        let mut program = parse("LDCINT 2\nLDCINT 3\nADD\nNEG\nHALT");
        optimize(&mut program);

        assert_eq!(opcodes(&program), vec![Opcode::Ldcint, Opcode::Halt]);
        assert_eq!(program.instructions[0].operand.as_ref().unwrap().text, "-5");
    }

    #[test]
    fn test_optimized_program_still_resolves() {
        let mut program = parse(
            "PROGRAM 4\nloop: LOAD 0\nLDCINT 1\nADD\nSTORE 0\nBR loop\nexit: HALT",
        );
        optimize(&mut program);

        let mut labels = LabelTable::new();
        let mut reporter = ErrorReporter::new();
        program.set_addresses(&mut labels, &mut reporter).unwrap();
        program.check_constraints(&labels, &mut reporter).unwrap();
        assert!(!reporter.errors_exist());
        assert!(labels.is_defined("loop"));
    }
}
