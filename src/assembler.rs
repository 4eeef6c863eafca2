//! Assembler driver: runs the full pipeline over a source file.
//!
//! Phases run in a fixed order and each phase is skipped once any
//! error has been reported, so a file with a bad constraint never
//! reaches code generation.  Progress goes to stdout, errors to
//! stderr.

use std::fs;
use std::path::PathBuf;

use crate::errors::{AsmError, ErrorReporter};
use crate::labels::LabelTable;
use crate::lexer::Lexer;
use crate::optimize;
use crate::parser::Parser;

pub const SOURCE_SUFFIX: &str = "asm";
pub const OBJECT_SUFFIX: &str = "obj";

#[derive(Debug, Clone, Copy)]
pub struct AsmOptions {
    pub optimize: bool,
}

impl Default for AsmOptions {
    fn default() -> Self {
        AsmOptions { optimize: true }
    }
}

/// Assemble one source text.
///
/// `name` is used only in progress and error messages.  Returns
/// `Ok(Some(code))` on success, `Ok(None)` if recoverable errors were
/// reported, and `Err` for unrecoverable ones (lexical errors, error
/// limit exceeded).
pub fn assemble(
    source: &str,
    name: &str,
    options: &AsmOptions,
) -> Result<Option<Vec<u8>>, AsmError> {
    let mut reporter = ErrorReporter::new();
    println!("Starting assembly for {name}");

    let lexer = Lexer::new(source)?;
    let mut program = Parser::new(lexer, &mut reporter).parse_program()?;

    if !reporter.errors_exist() && options.optimize {
        println!("...performing optimizations");
        optimize::optimize(&mut program);
    }

    let mut labels = LabelTable::new();
    if !reporter.errors_exist() {
        println!("...setting memory addresses");
        program.set_addresses(&mut labels, &mut reporter)?;
    }

    if !reporter.errors_exist() {
        println!("...checking constraints");
        program.check_constraints(&labels, &mut reporter)?;
    }

    let mut object_code = None;
    if !reporter.errors_exist() {
        println!("...generating code");
        object_code = Some(program.emit(&labels)?);
    }

    if reporter.errors_exist() {
        reporter.print_message(&format!(
            "*** Errors detected in {name} -- assembly terminated. ***"
        ));
        return Ok(None);
    }

    println!("Assembly complete.");
    Ok(object_code)
}

/// Assemble a source file and write the object code next to it.
/// Returns whether the file assembled cleanly.
pub fn assemble_file(file_name: &str, options: &AsmOptions) -> Result<bool, AsmError> {
    let path = resolve_source_path(file_name)?;
    let source = fs::read_to_string(&path)
        .map_err(|e| AsmError::fatal(format!("*** Error reading {}: {e} ***", path.display())))?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    match assemble(&source, &name, options)? {
        Some(object_code) => {
            let target = path.with_extension(OBJECT_SUFFIX);
            fs::write(&target, object_code).map_err(|e| {
                AsmError::fatal(format!("*** Error writing {}: {e} ***", target.display()))
            })?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Locate the source file, appending the `.asm` suffix when the named
/// file does not exist and carries no suffix of its own.
fn resolve_source_path(file_name: &str) -> Result<PathBuf, AsmError> {
    let path = PathBuf::from(file_name);
    if path.is_file() {
        return Ok(path);
    }

    if path.extension().is_none() {
        let with_suffix = path.with_extension(SOURCE_SUFFIX);
        if with_suffix.is_file() {
            return Ok(with_suffix);
        }
        return Err(AsmError::fatal(format!(
            "*** File {} not found ***",
            with_suffix.display()
        )));
    }

    Err(AsmError::fatal(format!(
        "*** File {} not found ***",
        path.display()
    )))
}
