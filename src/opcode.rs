//! The opcode table for the Cinder virtual machine.
//!
//! Each opcode is a unique byte value; the values are deliberately sparse
//! and grouped by category (loads 9-23, stores 30-34, branches 40-48,
//! conversions/bitwise/shift 50-66, arithmetic 70-77, I/O 80-87,
//! subprogram 90-94 and 100-101).

/// The kind of operand that follows an opcode in the instruction stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    /// No operand bytes.
    None,
    /// One raw byte.
    Byte,
    /// A 4-byte integer (big-endian).
    Int,
    /// A 2-byte character.
    Char,
    /// A 4-byte length followed by that many 2-byte characters.
    Str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Halt = 0,

    // load opcodes (move data from memory to top of stack)
    Load = 9,
    Loadb = 10,
    Load2b = 11,
    Loadw = 12,
    Loadstr = 13,
    Ldcb = 14,
    Ldcch = 15,
    Ldcint = 16,
    Ldcstr = 17,
    Ldladdr = 18,
    Ldgaddr = 19,

    // optimized loads for special constants
    Ldcb0 = 20,
    Ldcb1 = 21,
    Ldcint0 = 22,
    Ldcint1 = 23,

    // store opcodes (move data from top of stack to memory)
    Store = 30,
    Storeb = 31,
    Store2b = 32,
    Storew = 33,
    Storest = 34,

    // compare/branch opcodes
    Br = 40,
    Be = 41,
    Bne = 42,
    Bg = 43,
    Bge = 44,
    Bl = 45,
    Ble = 46,
    Bz = 47,
    Bnz = 48,

    // type conversion opcodes
    Int2byte = 50,
    Byte2int = 51,

    // logical not opcode
    Not = 60,

    // bitwise and shift opcodes
    Bitand = 61,
    Bitor = 62,
    Bitxor = 63,
    Bitnot = 64,
    Shl = 65,
    Shr = 66,

    // arithmetic opcodes
    Add = 70,
    Sub = 71,
    Mul = 72,
    Div = 73,
    Mod = 74,
    Neg = 75,
    Inc = 76,
    Dec = 77,

    // I/O opcodes
    Getch = 80,
    Getint = 81,
    Getstr = 82,
    Putbyte = 83,
    Putch = 84,
    Putint = 85,
    Puteol = 86,
    Putstr = 87,

    // program/procedure opcodes
    Program = 90,
    Proc = 91,
    Call = 92,
    Ret = 93,
    Alloc = 94,

    // optimized returns for special constants
    Ret0 = 100,
    Ret4 = 101,
}

/// Every declared opcode, used to build the lookup tables.
pub const ALL_OPCODES: [Opcode; 62] = [
    Opcode::Halt,
    Opcode::Load,
    Opcode::Loadb,
    Opcode::Load2b,
    Opcode::Loadw,
    Opcode::Loadstr,
    Opcode::Ldcb,
    Opcode::Ldcch,
    Opcode::Ldcint,
    Opcode::Ldcstr,
    Opcode::Ldladdr,
    Opcode::Ldgaddr,
    Opcode::Ldcb0,
    Opcode::Ldcb1,
    Opcode::Ldcint0,
    Opcode::Ldcint1,
    Opcode::Store,
    Opcode::Storeb,
    Opcode::Store2b,
    Opcode::Storew,
    Opcode::Storest,
    Opcode::Br,
    Opcode::Be,
    Opcode::Bne,
    Opcode::Bg,
    Opcode::Bge,
    Opcode::Bl,
    Opcode::Ble,
    Opcode::Bz,
    Opcode::Bnz,
    Opcode::Int2byte,
    Opcode::Byte2int,
    Opcode::Not,
    Opcode::Bitand,
    Opcode::Bitor,
    Opcode::Bitxor,
    Opcode::Bitnot,
    Opcode::Shl,
    Opcode::Shr,
    Opcode::Add,
    Opcode::Sub,
    Opcode::Mul,
    Opcode::Div,
    Opcode::Mod,
    Opcode::Neg,
    Opcode::Inc,
    Opcode::Dec,
    Opcode::Getch,
    Opcode::Getint,
    Opcode::Getstr,
    Opcode::Putbyte,
    Opcode::Putch,
    Opcode::Putint,
    Opcode::Puteol,
    Opcode::Putstr,
    Opcode::Program,
    Opcode::Proc,
    Opcode::Call,
    Opcode::Ret,
    Opcode::Alloc,
    Opcode::Ret0,
    Opcode::Ret4,
];

// Dispatch table indexed directly by opcode byte value: any byte outside
// the declared set decodes to None and is an unknown-opcode fault.
const BYTE_TABLE: [Option<Opcode>; 256] = {
    let mut table = [None; 256];
    let mut i = 0;
    while i < ALL_OPCODES.len() {
        let opcode = ALL_OPCODES[i];
        table[opcode as usize] = Some(opcode);
        i += 1;
    }
    table
};

impl Opcode {
    /// The byte value of this opcode in object code.
    pub fn value(self) -> u8 {
        self as u8
    }

    /// Look up the opcode for a byte value, or `None` if the byte does
    /// not correspond to a declared opcode.
    pub fn from_byte(b: u8) -> Option<Opcode> {
        BYTE_TABLE[b as usize]
    }

    /// Look up an opcode by mnemonic, case-insensitively.
    pub fn from_mnemonic(name: &str) -> Option<Opcode> {
        let upper = name.to_ascii_uppercase();
        ALL_OPCODES
            .iter()
            .copied()
            .find(|opcode| opcode.mnemonic() == upper)
    }

    /// The assembly-language mnemonic for this opcode.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Halt => "HALT",
            Opcode::Load => "LOAD",
            Opcode::Loadb => "LOADB",
            Opcode::Load2b => "LOAD2B",
            Opcode::Loadw => "LOADW",
            Opcode::Loadstr => "LOADSTR",
            Opcode::Ldcb => "LDCB",
            Opcode::Ldcch => "LDCCH",
            Opcode::Ldcint => "LDCINT",
            Opcode::Ldcstr => "LDCSTR",
            Opcode::Ldladdr => "LDLADDR",
            Opcode::Ldgaddr => "LDGADDR",
            Opcode::Ldcb0 => "LDCB0",
            Opcode::Ldcb1 => "LDCB1",
            Opcode::Ldcint0 => "LDCINT0",
            Opcode::Ldcint1 => "LDCINT1",
            Opcode::Store => "STORE",
            Opcode::Storeb => "STOREB",
            Opcode::Store2b => "STORE2B",
            Opcode::Storew => "STOREW",
            Opcode::Storest => "STOREST",
            Opcode::Br => "BR",
            Opcode::Be => "BE",
            Opcode::Bne => "BNE",
            Opcode::Bg => "BG",
            Opcode::Bge => "BGE",
            Opcode::Bl => "BL",
            Opcode::Ble => "BLE",
            Opcode::Bz => "BZ",
            Opcode::Bnz => "BNZ",
            Opcode::Int2byte => "INT2BYTE",
            Opcode::Byte2int => "BYTE2INT",
            Opcode::Not => "NOT",
            Opcode::Bitand => "BITAND",
            Opcode::Bitor => "BITOR",
            Opcode::Bitxor => "BITXOR",
            Opcode::Bitnot => "BITNOT",
            Opcode::Shl => "SHL",
            Opcode::Shr => "SHR",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Div => "DIV",
            Opcode::Mod => "MOD",
            Opcode::Neg => "NEG",
            Opcode::Inc => "INC",
            Opcode::Dec => "DEC",
            Opcode::Getch => "GETCH",
            Opcode::Getint => "GETINT",
            Opcode::Getstr => "GETSTR",
            Opcode::Putbyte => "PUTBYTE",
            Opcode::Putch => "PUTCH",
            Opcode::Putint => "PUTINT",
            Opcode::Puteol => "PUTEOL",
            Opcode::Putstr => "PUTSTR",
            Opcode::Program => "PROGRAM",
            Opcode::Proc => "PROC",
            Opcode::Call => "CALL",
            Opcode::Ret => "RET",
            Opcode::Alloc => "ALLOC",
            Opcode::Ret0 => "RET0",
            Opcode::Ret4 => "RET4",
        }
    }

    /// The operand kind that follows this opcode, used identically by
    /// parser argument checking, size computation and VM operand fetch.
    pub fn operand_kind(self) -> OperandKind {
        match self {
            Opcode::Ldcb | Opcode::Shl | Opcode::Shr => OperandKind::Byte,

            Opcode::Load
            | Opcode::Ldcint
            | Opcode::Ldladdr
            | Opcode::Ldgaddr
            | Opcode::Store
            | Opcode::Br
            | Opcode::Be
            | Opcode::Bne
            | Opcode::Bg
            | Opcode::Bge
            | Opcode::Bl
            | Opcode::Ble
            | Opcode::Bz
            | Opcode::Bnz
            | Opcode::Getstr
            | Opcode::Putstr
            | Opcode::Program
            | Opcode::Proc
            | Opcode::Call
            | Opcode::Ret
            | Opcode::Alloc => OperandKind::Int,

            Opcode::Ldcch => OperandKind::Char,
            Opcode::Ldcstr => OperandKind::Str,

            _ => OperandKind::None,
        }
    }

    /// Number of assembly-language arguments (0 or 1).
    pub fn num_args(self) -> usize {
        if self.operand_kind() == OperandKind::None {
            0
        } else {
            1
        }
    }

    /// True for the branch opcodes (conditional and unconditional).
    pub fn is_branch(self) -> bool {
        matches!(
            self,
            Opcode::Br
                | Opcode::Be
                | Opcode::Bne
                | Opcode::Bg
                | Opcode::Bge
                | Opcode::Bl
                | Opcode::Ble
                | Opcode::Bz
                | Opcode::Bnz
        )
    }

    /// True for opcodes whose operand is a label reference.
    pub fn is_branch_or_call(self) -> bool {
        self.is_branch() || self == Opcode::Call
    }

    /// True for the return opcodes.
    pub fn is_return(self) -> bool {
        matches!(self, Opcode::Ret | Opcode::Ret0 | Opcode::Ret4)
    }

    /// The branch with the opposite condition, for two-operand and
    /// zero-test conditional branches.  `None` for everything else.
    pub fn negated_branch(self) -> Option<Opcode> {
        match self {
            Opcode::Be => Some(Opcode::Bne),
            Opcode::Bne => Some(Opcode::Be),
            Opcode::Bg => Some(Opcode::Ble),
            Opcode::Ble => Some(Opcode::Bg),
            Opcode::Bge => Some(Opcode::Bl),
            Opcode::Bl => Some(Opcode::Bge),
            Opcode::Bz => Some(Opcode::Bnz),
            Opcode::Bnz => Some(Opcode::Bz),
            _ => None,
        }
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}
