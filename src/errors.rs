use std::collections::HashSet;

use thiserror::Error;

use crate::token::Position;

/// Maximum number of recoverable errors reported before the whole run
/// becomes fatal.
pub const MAX_ERRORS: usize = 15;

/// An error detected while assembling a source file.
///
/// Lexical errors stop the run immediately; syntax and constraint errors
/// are collected by the [`ErrorReporter`] so several can be reported for
/// one file; fatal errors abort the current file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AsmError {
    #[error("*** Lexical error at {position}: {message} ***")]
    Lexical { position: Position, message: String },

    #[error("*** Syntax error at {position}: {message} ***")]
    Syntax { position: Position, message: String },

    #[error("*** Constraint error at {position}: {message} ***")]
    Constraint { position: Position, message: String },

    #[error("{0}")]
    Fatal(String),
}

impl AsmError {
    pub fn lexical(position: Position, message: impl Into<String>) -> Self {
        AsmError::Lexical {
            position,
            message: message.into(),
        }
    }

    pub fn syntax(position: Position, message: impl Into<String>) -> Self {
        AsmError::Syntax {
            position,
            message: message.into(),
        }
    }

    pub fn constraint(position: Position, message: impl Into<String>) -> Self {
        AsmError::Constraint {
            position,
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        AsmError::Fatal(message.into())
    }
}

/// Collects recoverable assembly errors.
///
/// Duplicate consecutive messages and repeated "label X has not been
/// defined" messages for the same label are suppressed to avoid error
/// cascades.  One reporter serves one compilation unit.
#[derive(Debug, Default)]
pub struct ErrorReporter {
    messages: Vec<String>,
    last_message: String,
    undefined_labels: HashSet<String>,
}

impl ErrorReporter {
    pub fn new() -> Self {
        ErrorReporter::default()
    }

    /// True if any errors have been reported.
    pub fn errors_exist(&self) -> bool {
        !self.messages.is_empty()
    }

    /// The messages reported so far, in order.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Report a recoverable error.  Returns a fatal error once the
    /// maximum error count has been exceeded.
    pub fn report(&mut self, error: &AsmError) -> Result<(), AsmError> {
        if self.messages.len() >= MAX_ERRORS {
            return Err(AsmError::fatal("Max errors exceeded."));
        }

        let message = error.to_string();
        if self.should_print(&message) {
            eprintln!("{message}");
            self.messages.push(message);
        }
        Ok(())
    }

    /// Print a message without counting it as an error.
    pub fn print_message(&self, message: &str) {
        eprintln!("{message}");
    }

    // Checks for repeated error messages and for repeated messages of the
    // form `label "x" has not been defined.`.
    fn should_print(&mut self, message: &str) -> bool {
        if message == self.last_message {
            return false;
        }
        self.last_message = message.to_string();

        const UNDEFINED: &str = "\" has not been defined.";
        if let Some(end) = message.find(UNDEFINED) {
            if let Some(begin) = message.find('"') {
                if begin + 1 < end {
                    let label = &message[begin + 1..end];
                    return self.undefined_labels.insert(label.to_string());
                }
            }
        }

        true
    }
}

/// A runtime fault in the virtual machine.  Faults always terminate the
/// VM process with a printed diagnostic; there is no recovery.
#[derive(Debug, Error)]
pub enum VmFault {
    #[error("*** FAULT: Divide by zero ***")]
    DivideByZero,

    #[error("*** FAULT: Modulo by zero ***")]
    ModuloByZero,

    #[error("*** FAULT: Invalid machine instruction {0} ***")]
    UnknownOpcode(u8),

    #[error("*** Out of memory ***")]
    OutOfMemory,

    #[error("*** FAULT: Memory address {0} out of bounds ***")]
    AddressOutOfBounds(i32),

    #[error("Invalid input")]
    InvalidInput,

    #[error("Invalid input: EOF")]
    UnexpectedEof,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
