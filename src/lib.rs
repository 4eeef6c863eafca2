//! Cinder: an instructional stack-machine toolchain.
//!
//! Three pieces share this crate: an assembler that translates Cinder
//! assembly language to object code, a virtual machine that executes
//! object code, and a disassembler that translates object code back to
//! readable mnemonics.  Each has a thin binary under `src/bin/`.

pub mod assembler;
pub mod ast;
pub mod bytes;
pub mod disasm;
pub mod errors;
pub mod labels;
pub mod lexer;
pub mod opcode;
pub mod optimize;
pub mod parser;
pub mod token;
pub mod vm;

pub use errors::{AsmError, ErrorReporter, VmFault};
pub use opcode::{Opcode, OperandKind};
pub use vm::{DEFAULT_MEMORY_SIZE, Vm};
