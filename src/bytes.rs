//! Byte-level encoding shared by the assembler, disassembler and VM.
//!
//! Integers occupy four bytes, most significant byte first.  Characters
//! occupy two bytes holding a UTF-16 code unit (the machine supports only
//! the Basic Multilingual Plane).

/// Number of bytes for an opcode.
pub const BYTES_PER_OPCODE: i32 = 1;

/// Number of bytes for an integer value.
pub const BYTES_PER_INTEGER: i32 = 4;

/// Number of bytes for an address.
pub const BYTES_PER_ADDRESS: i32 = 4;

/// Number of bytes for a character value.
pub const BYTES_PER_CHAR: i32 = 2;

/// A context (call frame header) holds two addresses: the dynamic link
/// and the return address.
pub const BYTES_PER_CONTEXT: i32 = 2 * BYTES_PER_ADDRESS;

/// Encode an integer as four bytes, most significant first.
pub fn int_to_bytes(n: i32) -> [u8; 4] {
    n.to_be_bytes()
}

/// Decode four bytes (most significant first) into an integer.
pub fn bytes_to_int(b0: u8, b1: u8, b2: u8, b3: u8) -> i32 {
    i32::from_be_bytes([b0, b1, b2, b3])
}

/// Encode a character as two bytes holding its UTF-16 code unit.
///
/// Callers guarantee the character lies in the BMP; the lexer rejects
/// anything outside it.
pub fn char_to_bytes(c: char) -> [u8; 2] {
    (c as u16).to_be_bytes()
}

/// Decode two bytes into a character.  A code unit that is not a valid
/// scalar value (an unpaired surrogate) decodes to U+FFFD.
pub fn bytes_to_char(b0: u8, b1: u8) -> char {
    let unit = u16::from_be_bytes([b0, b1]);
    char::from_u32(unit as u32).unwrap_or('\u{fffd}')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_round_trip() {
        for n in [0, 1, -1, 7, 255, 256, i32::MAX, i32::MIN] {
            let [b0, b1, b2, b3] = int_to_bytes(n);
            assert_eq!(bytes_to_int(b0, b1, b2, b3), n);
        }
    }

    #[test]
    fn test_int_is_big_endian() {
        assert_eq!(int_to_bytes(1), [0, 0, 0, 1]);
        assert_eq!(int_to_bytes(256), [0, 0, 1, 0]);
        assert_eq!(int_to_bytes(-1), [0xff, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn test_char_round_trip() {
        for c in ['A', 'z', '0', '\n', '\t', 'é', '\u{20ac}'] {
            let [b0, b1] = char_to_bytes(c);
            assert_eq!(bytes_to_char(b0, b1), c);
        }
    }

    #[test]
    fn test_char_is_two_bytes_big_endian() {
        assert_eq!(char_to_bytes('A'), [0, 65]);
        assert_eq!(char_to_bytes('\u{20ac}'), [0x20, 0xac]);
    }
}
