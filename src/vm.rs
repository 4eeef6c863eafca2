//! The Cinder virtual machine.
//!
//! A single-threaded byte-addressed stack machine.  Object code is
//! loaded at address 0 and the runtime stack grows upward from the end
//! of the code.  Registers:
//!
//! - `pc` index of the next instruction byte
//! - `sp` index of the top of the stack
//! - `bp` base of the current frame
//! - `sb` bottom of the stack (first byte after the code)
//!
//! Multi-byte values live on the stack high byte first, so an integer
//! in stack memory reads the same as one in object code.  Every memory
//! access is bounds checked; a violation is a fault that terminates
//! execution.  I/O goes through an injected reader and writer so tests
//! can run programs against in-memory buffers.

use std::io::{BufRead, Write};

use crate::bytes::{self, BYTES_PER_CHAR, BYTES_PER_CONTEXT, BYTES_PER_INTEGER};
use crate::errors::VmFault;
use crate::opcode::Opcode;

/// Default memory size in bytes (code + stack).
pub const DEFAULT_MEMORY_SIZE: usize = 8 * 1024;

pub struct Vm<R, W> {
    memory: Vec<u8>,
    pc: i32,
    bp: i32,
    sp: i32,
    sb: i32,
    running: bool,
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> Vm<R, W> {
    pub fn new(memory_size: usize, reader: R, writer: W) -> Self {
        Vm {
            memory: vec![0; memory_size],
            pc: 0,
            bp: 0,
            sp: 0,
            sb: 0,
            running: false,
            reader,
            writer,
        }
    }

    /// Copy object code into memory starting at address 0 and position
    /// the stack registers just past it.
    pub fn load_program(&mut self, code: &[u8]) -> Result<(), VmFault> {
        if code.len() > self.memory.len() {
            return Err(VmFault::OutOfMemory);
        }
        self.memory[..code.len()].copy_from_slice(code);

        let code_length = code.len() as i32;
        self.bp = code_length;
        self.sb = code_length;
        self.sp = code_length - 1;
        self.pc = 0;
        Ok(())
    }

    /// Fetch-decode-execute until HALT or a fault.
    pub fn run(&mut self) -> Result<(), VmFault> {
        self.running = true;
        self.pc = 0;

        while self.running {
            let byte = self.fetch_byte()?;
            let opcode = Opcode::from_byte(byte).ok_or(VmFault::UnknownOpcode(byte))?;
            self.execute(opcode)?;
        }

        self.writer.flush()?;
        Ok(())
    }

    fn execute(&mut self, opcode: Opcode) -> Result<(), VmFault> {
        match opcode {
            Opcode::Halt => self.running = false,

            // loads
            Opcode::Load => {
                let length = self.fetch_int()?;
                let address = self.pop_int()?;
                for i in 0..length {
                    let b = self.byte_at(address + i)?;
                    self.push_byte(b)?;
                }
            }
            Opcode::Loadb => {
                let address = self.pop_int()?;
                let b = self.byte_at(address)?;
                self.push_byte(b)?;
            }
            Opcode::Load2b => {
                let address = self.pop_int()?;
                let b0 = self.byte_at(address)?;
                let b1 = self.byte_at(address + 1)?;
                self.push_byte(b0)?;
                self.push_byte(b1)?;
            }
            Opcode::Loadw => {
                let address = self.pop_int()?;
                let word = self.int_at(address)?;
                self.push_int(word)?;
            }
            Opcode::Loadstr => self.load_string()?,
            Opcode::Ldcb => {
                let b = self.fetch_byte()?;
                self.push_byte(b)?;
            }
            Opcode::Ldcb0 => self.push_byte(0)?,
            Opcode::Ldcb1 => self.push_byte(1)?,
            Opcode::Ldcch => {
                let ch = self.fetch_char()?;
                self.push_char(ch)?;
            }
            Opcode::Ldcint => {
                let value = self.fetch_int()?;
                self.push_int(value)?;
            }
            Opcode::Ldcint0 => self.push_int(0)?,
            Opcode::Ldcint1 => self.push_int(1)?,
            Opcode::Ldcstr => {
                let capacity = self.fetch_int()?;
                self.push_int(capacity)?;
                for _ in 0..capacity {
                    let ch = self.fetch_char()?;
                    self.push_char(ch)?;
                }
            }
            Opcode::Ldladdr => {
                let displacement = self.fetch_int()?;
                self.push_int(self.bp + displacement)?;
            }
            Opcode::Ldgaddr => {
                let displacement = self.fetch_int()?;
                self.push_int(self.sb + displacement)?;
            }

            // stores
            Opcode::Store => {
                let length = self.fetch_int()?;
                let mut data = vec![0u8; length.max(0) as usize];
                for i in (0..data.len()).rev() {
                    data[i] = self.pop_byte()?;
                }
                let address = self.pop_int()?;
                for (i, b) in data.iter().enumerate() {
                    self.set_byte(address + i as i32, *b)?;
                }
            }
            Opcode::Storeb => {
                let value = self.pop_byte()?;
                let address = self.pop_int()?;
                self.set_byte(address, value)?;
            }
            Opcode::Store2b => {
                let b1 = self.pop_byte()?;
                let b0 = self.pop_byte()?;
                let address = self.pop_int()?;
                self.set_byte(address, b0)?;
                self.set_byte(address + 1, b1)?;
            }
            Opcode::Storew => {
                let value = self.pop_int()?;
                let address = self.pop_int()?;
                self.put_int_at(address, value)?;
            }
            Opcode::Storest => self.store_string()?,

            // branches
            Opcode::Br => {
                let displacement = self.fetch_int()?;
                self.pc += displacement;
            }
            Opcode::Be | Opcode::Bne | Opcode::Bg | Opcode::Bge | Opcode::Bl | Opcode::Ble => {
                self.branch_compare(opcode)?
            }
            Opcode::Bz => {
                let displacement = self.fetch_int()?;
                if self.pop_byte()? == 0 {
                    self.pc += displacement;
                }
            }
            Opcode::Bnz => {
                let displacement = self.fetch_int()?;
                if self.pop_byte()? != 0 {
                    self.pc += displacement;
                }
            }

            // conversions
            Opcode::Int2byte => {
                let value = self.pop_int()?;
                self.push_byte(value as u8)?;
            }
            Opcode::Byte2int => {
                let b = self.pop_byte()?;
                self.push_int(b as i8 as i32)?;
            }

            // logical and bitwise
            Opcode::Not => {
                let b = self.pop_byte()?;
                self.push_byte(if b == 0 { 1 } else { 0 })?;
            }
            Opcode::Bitand => {
                let (a, b) = self.pop_operands()?;
                self.push_int(a & b)?;
            }
            Opcode::Bitor => {
                let (a, b) = self.pop_operands()?;
                self.push_int(a | b)?;
            }
            Opcode::Bitxor => {
                let (a, b) = self.pop_operands()?;
                self.push_int(a ^ b)?;
            }
            Opcode::Bitnot => {
                let value = self.pop_int()?;
                self.push_int(!value)?;
            }
            Opcode::Shl => {
                let value = self.pop_int()?;
                let shift = self.fetch_byte()? & 0x1f;
                self.push_int(value << shift)?;
            }
            Opcode::Shr => {
                let value = self.pop_int()?;
                let shift = self.fetch_byte()? & 0x1f;
                self.push_int(value >> shift)?;
            }

            // arithmetic
            Opcode::Add => {
                let (a, b) = self.pop_operands()?;
                self.push_int(a.wrapping_add(b))?;
            }
            Opcode::Sub => {
                let (a, b) = self.pop_operands()?;
                self.push_int(a.wrapping_sub(b))?;
            }
            Opcode::Mul => {
                let (a, b) = self.pop_operands()?;
                self.push_int(a.wrapping_mul(b))?;
            }
            Opcode::Div => {
                let (a, b) = self.pop_operands()?;
                if b == 0 {
                    return Err(VmFault::DivideByZero);
                }
                self.push_int(a.wrapping_div(b))?;
            }
            Opcode::Mod => {
                let (a, b) = self.pop_operands()?;
                if b == 0 {
                    return Err(VmFault::ModuloByZero);
                }
                self.push_int(a.wrapping_rem(b))?;
            }
            Opcode::Neg => {
                let value = self.pop_int()?;
                self.push_int(value.wrapping_neg())?;
            }
            Opcode::Inc => {
                let value = self.pop_int()?;
                self.push_int(value.wrapping_add(1))?;
            }
            Opcode::Dec => {
                let value = self.pop_int()?;
                self.push_int(value.wrapping_sub(1))?;
            }

            // I/O
            Opcode::Getch => {
                let address = self.pop_int()?;
                let ch = self.read_char()?;
                self.put_char_at(address, ch)?;
            }
            Opcode::Getint => {
                let address = self.pop_int()?;
                let value = self
                    .read_line()?
                    .trim()
                    .parse::<i32>()
                    .map_err(|_| VmFault::InvalidInput)?;
                self.put_int_at(address, value)?;
            }
            Opcode::Getstr => self.get_string()?,
            Opcode::Putbyte => {
                let b = self.pop_byte()?;
                write!(self.writer, "{}", b as i8)?;
            }
            Opcode::Putch => {
                let ch = self.pop_char()?;
                write!(self.writer, "{ch}")?;
            }
            Opcode::Putint => {
                let value = self.pop_int()?;
                write!(self.writer, "{value}")?;
            }
            Opcode::Puteol => {
                writeln!(self.writer)?;
                self.writer.flush()?;
            }
            Opcode::Putstr => self.put_string()?,

            // subprograms
            Opcode::Program => {
                let var_length = self.fetch_int()?;
                self.bp = self.sb;
                self.sp = self.bp + var_length - 1;
                if self.sp >= self.memory.len() as i32 {
                    return Err(VmFault::OutOfMemory);
                }
            }
            Opcode::Proc | Opcode::Alloc => {
                let num_bytes = self.fetch_int()?;
                self.sp += num_bytes;
                if self.sp >= self.memory.len() as i32 {
                    return Err(VmFault::OutOfMemory);
                }
            }
            Opcode::Call => {
                let displacement = self.fetch_int()?;
                self.push_int(self.bp)?; // dynamic link
                self.push_int(self.pc)?; // return address
                self.bp = self.sp - BYTES_PER_CONTEXT + 1;
                self.pc += displacement;
            }
            Opcode::Ret => {
                let param_length = self.fetch_int()?;
                self.return_from(param_length)?;
            }
            Opcode::Ret0 => self.return_from(0)?,
            Opcode::Ret4 => self.return_from(BYTES_PER_INTEGER)?,
        }

        Ok(())
    }

    // Two-operand comparison branches.  Operands are popped in reverse.
    fn branch_compare(&mut self, opcode: Opcode) -> Result<(), VmFault> {
        let displacement = self.fetch_int()?;
        let (a, b) = self.pop_operands()?;

        let taken = match opcode {
            Opcode::Be => a == b,
            Opcode::Bne => a != b,
            Opcode::Bg => a > b,
            Opcode::Bge => a >= b,
            Opcode::Bl => a < b,
            Opcode::Ble => a <= b,
            _ => unreachable!("not a comparison branch"),
        };

        if taken {
            self.pc += displacement;
        }
        Ok(())
    }

    // Unwind the current frame: drop the parameters, restore the
    // caller's bp and pc from the dynamic link and return address.
    fn return_from(&mut self, param_length: i32) -> Result<(), VmFault> {
        let bp_save = self.bp;
        self.sp = bp_save - param_length - 1;
        self.bp = self.int_at(bp_save)?;
        self.pc = self.int_at(bp_save + BYTES_PER_INTEGER)?;
        Ok(())
    }

    // Push the string at the popped address in reverse order, so the
    // length ends up on top.  The inverse of STOREST.
    fn load_string(&mut self) -> Result<(), VmFault> {
        let address = self.pop_int()?;
        let length = self.int_at(address)?;

        for i in (0..length).rev() {
            let ch = self.char_at(address + BYTES_PER_INTEGER + i * BYTES_PER_CHAR)?;
            self.push_char(ch)?;
        }
        self.push_int(length)?;
        Ok(())
    }

    fn store_string(&mut self) -> Result<(), VmFault> {
        let length = self.pop_int()?;
        let mut chars = vec!['\0'; length.max(0) as usize];
        for slot in chars.iter_mut() {
            *slot = self.pop_char()?;
        }
        let mut address = self.pop_int()?;

        self.put_int_at(address, length)?;
        address += BYTES_PER_INTEGER;
        for ch in chars {
            self.put_char_at(address, ch)?;
            address += BYTES_PER_CHAR;
        }
        Ok(())
    }

    // Read a line, truncate it to the instruction's capacity, and write
    // it as a length-prefixed string at the popped address.
    fn get_string(&mut self) -> Result<(), VmFault> {
        let mut address = self.pop_int()?;
        let capacity = self.fetch_int()?;
        let line = self.read_line()?;
        let data: Vec<char> = line.trim_end_matches(['\r', '\n']).chars().collect();
        let length = (data.len() as i32).min(capacity);

        self.put_int_at(address, length)?;
        address += BYTES_PER_INTEGER;
        for &ch in &data[..length.max(0) as usize] {
            self.put_char_at(address, ch)?;
            address += BYTES_PER_CHAR;
        }
        Ok(())
    }

    // Print the string on top of the stack, then pop it.  The operand
    // is the string's capacity, which fixes its footprint on the stack
    // regardless of the actual length.
    fn put_string(&mut self) -> Result<(), VmFault> {
        let capacity = self.fetch_int()?;
        let num_bytes = BYTES_PER_INTEGER + capacity * BYTES_PER_CHAR;

        let mut address = self.sp - num_bytes + 1;
        let length = self.int_at(address)?;
        address += BYTES_PER_INTEGER;

        for _ in 0..length {
            let ch = self.char_at(address)?;
            write!(self.writer, "{ch}")?;
            address += BYTES_PER_CHAR;
        }

        self.sp -= num_bytes;
        Ok(())
    }

    //------------------------------------------------------------------
    // memory access

    fn index(&self, address: i32) -> Result<usize, VmFault> {
        let index = usize::try_from(address).map_err(|_| VmFault::AddressOutOfBounds(address))?;
        if index < self.memory.len() {
            Ok(index)
        } else {
            Err(VmFault::AddressOutOfBounds(address))
        }
    }

    fn byte_at(&self, address: i32) -> Result<u8, VmFault> {
        Ok(self.memory[self.index(address)?])
    }

    fn set_byte(&mut self, address: i32, value: u8) -> Result<(), VmFault> {
        let index = self.index(address)?;
        self.memory[index] = value;
        Ok(())
    }

    fn int_at(&self, address: i32) -> Result<i32, VmFault> {
        Ok(bytes::bytes_to_int(
            self.byte_at(address)?,
            self.byte_at(address + 1)?,
            self.byte_at(address + 2)?,
            self.byte_at(address + 3)?,
        ))
    }

    fn put_int_at(&mut self, address: i32, value: i32) -> Result<(), VmFault> {
        for (i, b) in bytes::int_to_bytes(value).iter().enumerate() {
            self.set_byte(address + i as i32, *b)?;
        }
        Ok(())
    }

    fn char_at(&self, address: i32) -> Result<char, VmFault> {
        Ok(bytes::bytes_to_char(
            self.byte_at(address)?,
            self.byte_at(address + 1)?,
        ))
    }

    fn put_char_at(&mut self, address: i32, ch: char) -> Result<(), VmFault> {
        let [b0, b1] = bytes::char_to_bytes(ch);
        self.set_byte(address, b0)?;
        self.set_byte(address + 1, b1)
    }

    //------------------------------------------------------------------
    // stack

    fn push_byte(&mut self, b: u8) -> Result<(), VmFault> {
        self.sp += 1;
        self.set_byte(self.sp, b)
    }

    fn pop_byte(&mut self) -> Result<u8, VmFault> {
        let b = self.byte_at(self.sp)?;
        self.sp -= 1;
        Ok(b)
    }

    fn push_int(&mut self, value: i32) -> Result<(), VmFault> {
        for b in bytes::int_to_bytes(value) {
            self.push_byte(b)?;
        }
        Ok(())
    }

    fn pop_int(&mut self) -> Result<i32, VmFault> {
        let b3 = self.pop_byte()?;
        let b2 = self.pop_byte()?;
        let b1 = self.pop_byte()?;
        let b0 = self.pop_byte()?;
        Ok(bytes::bytes_to_int(b0, b1, b2, b3))
    }

    fn push_char(&mut self, ch: char) -> Result<(), VmFault> {
        let [b0, b1] = bytes::char_to_bytes(ch);
        self.push_byte(b0)?;
        self.push_byte(b1)
    }

    fn pop_char(&mut self) -> Result<char, VmFault> {
        let b1 = self.pop_byte()?;
        let b0 = self.pop_byte()?;
        Ok(bytes::bytes_to_char(b0, b1))
    }

    // binary operands come off the stack in reverse order
    fn pop_operands(&mut self) -> Result<(i32, i32), VmFault> {
        let b = self.pop_int()?;
        let a = self.pop_int()?;
        Ok((a, b))
    }

    //------------------------------------------------------------------
    // instruction fetch

    fn fetch_byte(&mut self) -> Result<u8, VmFault> {
        let b = self.byte_at(self.pc)?;
        self.pc += 1;
        Ok(b)
    }

    fn fetch_int(&mut self) -> Result<i32, VmFault> {
        let b0 = self.fetch_byte()?;
        let b1 = self.fetch_byte()?;
        let b2 = self.fetch_byte()?;
        let b3 = self.fetch_byte()?;
        Ok(bytes::bytes_to_int(b0, b1, b2, b3))
    }

    fn fetch_char(&mut self) -> Result<char, VmFault> {
        let b0 = self.fetch_byte()?;
        let b1 = self.fetch_byte()?;
        Ok(bytes::bytes_to_char(b0, b1))
    }

    //------------------------------------------------------------------
    // input

    fn read_line(&mut self) -> Result<String, VmFault> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Err(VmFault::UnexpectedEof);
        }
        Ok(line)
    }

    // Read a single UTF-8 encoded character.
    fn read_char(&mut self) -> Result<char, VmFault> {
        let mut first = [0u8; 1];
        if self.reader.read(&mut first)? == 0 {
            return Err(VmFault::UnexpectedEof);
        }

        let extra = match first[0] {
            b if b < 0x80 => 0,
            b if b >= 0xc0 && b < 0xe0 => 1,
            b if b >= 0xe0 && b < 0xf0 => 2,
            b if b >= 0xf0 => 3,
            _ => return Err(VmFault::InvalidInput),
        };

        let mut buf = [0u8; 4];
        buf[0] = first[0];
        self.reader.read_exact(&mut buf[1..=extra])?;

        std::str::from_utf8(&buf[..=extra])
            .ok()
            .and_then(|s| s.chars().next())
            .ok_or(VmFault::InvalidInput)
    }
}
