//! Branch-related passes: branch reduction and dead-code elimination.

use std::collections::HashMap;

use crate::ast::Instruction;
use crate::opcode::Opcode;

use super::unlabeled;

/// A conditional branch over an unconditional one collapses into a
/// single branch with the condition negated:
///
/// ```text
///     BE L1            BNE L2
///     BR L2      =>    L1: ...
/// L1: ...
/// ```
///
/// Applies only when the conditional branch targets the instruction
/// immediately after the BR.
pub fn branch_reduction(instructions: &[Instruction]) -> Option<Vec<Instruction>> {
    let mut out: Vec<Instruction> = Vec::with_capacity(instructions.len());
    let mut changed = false;
    let mut i = 0;

    while i < instructions.len() {
        if i + 2 < instructions.len() {
            let (cond, unc, after) = (
                &instructions[i],
                &instructions[i + 1],
                &instructions[i + 2],
            );

            if let Some(negated) = cond.opcode.negated_branch() {
                let target = cond.operand.as_ref();
                let targets_next = target.is_some_and(|operand| {
                    after
                        .labels
                        .iter()
                        .any(|label| label.text == format!("{}:", operand.text))
                });

                if unc.opcode == Opcode::Br && unlabeled(unc) && targets_next {
                    out.push(Instruction::new(
                        cond.labels.clone(),
                        negated,
                        cond.position,
                        unc.operand.clone(),
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

/// Remove instructions that follow an unconditional transfer of control
/// (BR, RET, RET0, RET4) and cannot be reached through a label.
///
/// An instruction is unreachable when every label attached to it has
/// zero branch or call references.  Reference counts are computed once
/// per sweep and decremented when a counted branch is itself removed,
/// so chains of dead branches disappear in a single sweep.
pub fn dead_code(instructions: &[Instruction]) -> Option<Vec<Instruction>> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for instruction in instructions {
        if instruction.opcode.is_branch_or_call() {
            if let Some(operand) = &instruction.operand {
                *counts.entry(operand.text.as_str()).or_insert(0) += 1;
            }
        }
    }

    let reachable = |instruction: &Instruction, counts: &HashMap<&str, usize>| {
        instruction.labels.iter().any(|label| {
            let identifier = label.text.strip_suffix(':').unwrap_or(&label.text);
            counts.get(identifier).copied().unwrap_or(0) > 0
        })
    };

    let mut out: Vec<Instruction> = Vec::with_capacity(instructions.len());
    let mut changed = false;
    let mut i = 0;

    while i < instructions.len() {
        let instruction = &instructions[i];
        out.push(instruction.clone());
        i += 1;

        if instruction.opcode != Opcode::Br && !instruction.opcode.is_return() {
            continue;
        }

        while i < instructions.len() && !reachable(&instructions[i], &counts) {
            let removed = &instructions[i];
            if removed.opcode.is_branch_or_call() {
                if let Some(operand) = &removed.operand {
                    if let Some(count) = counts.get_mut(operand.text.as_str()) {
                        *count = count.saturating_sub(1);
                    }
                }
            }
            changed = true;
            i += 1;
        }
    }

    changed.then_some(out)
}
