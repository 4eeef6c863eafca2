use std::collections::HashMap;

use crate::errors::AsmError;
use crate::token::Token;

/// Maps label text to a resolved byte address.
///
/// Label text always includes the trailing colon.  Entries are
/// write-once: redefining a label is a hard error.  A fresh table is
/// created for each compilation unit, so independent assemblies cannot
/// interfere with each other.
#[derive(Debug, Default)]
pub struct LabelTable {
    addresses: HashMap<String, i32>,
}

impl LabelTable {
    pub fn new() -> Self {
        LabelTable::default()
    }

    /// Bind a label token to an address.
    pub fn define(&mut self, label: &Token, address: i32) -> Result<(), AsmError> {
        if self.addresses.contains_key(&label.text) {
            return Err(AsmError::constraint(
                label.position,
                "This label has already been defined.",
            ));
        }
        self.addresses.insert(label.text.clone(), address);
        Ok(())
    }

    /// The address bound to a label id (text including the colon).
    pub fn address_of(&self, label_id: &str) -> Option<i32> {
        self.addresses.get(label_id).copied()
    }

    /// True if an identifier (text without the colon) names a bound label.
    pub fn is_defined(&self, identifier: &str) -> bool {
        self.addresses.contains_key(&format!("{identifier}:"))
    }

    /// The address for an identifier operand (text without the colon).
    pub fn address_of_identifier(&self, identifier: &str) -> Option<i32> {
        self.address_of(&format!("{identifier}:"))
    }
}
