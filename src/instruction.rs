/*
 * This is free software, distributed under the MIT license.  A copy of the
 * license can be found in the LICENSE file in the project root, or at
 * https://opensource.org/licenses/MIT.
 */

//! CHIP-8 instructions and opcodes.
//!
//! An instruction word is decoded in two stages: the raw 16-bit `Opcode`
//! (which only knows how to slice out nibbles and composite fields) and the
//! `Instruction` enum, which represents a fully validated operation.  Keeping
//! `Instruction` as an intermediate form means the interpreter never has to
//! deal with partially decoded or unassigned patterns; those are rejected
//! here with a `DecodeError` before execution starts.

use std::fmt;
use std::ops::Add;

use num::FromPrimitive;

use MEM_SIZE;

/// An error resulting from address arithmetic leaving the addressable range.
#[derive(Debug, Fail, PartialEq, Eq)]
#[fail(display = "address out of bounds: {:#05X}", _0)]
pub struct AddressOverflowError(pub usize);

/// An error resulting from an unassigned opcode pattern.
#[derive(Debug, Fail, PartialEq, Eq)]
#[fail(display = "could not decode opcode {}", _0)]
pub struct DecodeError(pub Opcode);

enum_from_primitive! {
/// A CHIP-8 general-purpose register.
///
/// `VF` is special: arithmetic, shift and draw instructions overwrite it
/// with their flag output (but may still read it as an operand first).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    V0 = 0,
    V1,
    V2,
    V3,
    V4,
    V5,
    V6,
    V7,
    V8,
    V9,
    VA,
    VB,
    VC,
    VD,
    VE,
    VF,
}
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", *self)
    }
}

/// A raw 16-bit CHIP-8 instruction word.
///
/// Wrapping the `u16` gives us a place to hang the field-extraction helpers
/// that the decoder uses, instead of sprinkling masks and shifts around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode(pub u16);

impl Opcode {
    /// Assembles an opcode from its two big-endian bytes.
    pub fn from_bytes(high: u8, low: u8) -> Self {
        Opcode((high as u16) << 8 | low as u16)
    }

    /// Returns the `Vx` register selected by the second nibble.
    fn vx(&self) -> Register {
        Register::from_u16((self.0 & 0x0F00) >> 8).unwrap()
    }

    /// Returns the `Vy` register selected by the third nibble.
    fn vy(&self) -> Register {
        Register::from_u16((self.0 & 0x00F0) >> 4).unwrap()
    }

    /// Returns the low nibble.
    fn nibble(&self) -> u8 {
        self.0 as u8 & 0xF
    }

    /// Returns the low byte.
    fn byte(&self) -> u8 {
        self.0 as u8
    }

    /// Returns the low 12 bits as an address.
    ///
    /// A 12-bit quantity is always within the addressable range, so this
    /// cannot fail.
    fn addr(&self) -> Address {
        Address((self.0 & 0xFFF) as usize)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{:04X}", self.0)
    }
}

/// An offset into the CHIP-8's memory.
///
/// Every instance is guaranteed to lie within the addressable range
/// 0x000-0xFFF, so it can be used to index the memory array directly.  This
/// is what the program counter, the index register and the call stack hold;
/// arithmetic that would leave the range is rejected rather than wrapped.
///
/// # Examples
///
/// ```
/// use ocho::Address;
///
/// let addr = Address::from_u16(0x204).unwrap();
/// assert_eq!(addr.index(), 0x204);
/// assert!((addr + 2).is_ok());
/// assert!(Address::from_u16(0x1000).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Address(usize);

impl Address {
    /// Checks the given `u16` against the addressable range, returning the
    /// corresponding `Address` if it is valid.
    pub fn from_u16(addr: u16) -> Result<Self, AddressOverflowError> {
        Address::from_usize(addr as usize)
    }

    /// Checks the given `usize` against the addressable range, returning the
    /// corresponding `Address` if it is valid.
    pub fn from_usize(addr: usize) -> Result<Self, AddressOverflowError> {
        if addr >= MEM_SIZE {
            Err(AddressOverflowError(addr))
        } else {
            Ok(Address(addr))
        }
    }

    /// Returns the offset as a plain index into memory.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl Add<usize> for Address {
    type Output = Result<Self, AddressOverflowError>;

    fn add(self, rhs: usize) -> Self::Output {
        Address::from_usize(self.0 + rhs)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#05X}", self.0)
    }
}

/// A decoded CHIP-8 instruction.
///
/// The variants follow the conventional assembly mnemonics; the comments
/// give the matching opcode pattern.
///
/// # Examples
///
/// ```
/// use ocho::{Instruction, Opcode, Register};
///
/// let instr = Instruction::from_opcode(Opcode(0x7510)).unwrap();
/// assert_eq!(instr, Instruction::AddByte(Register::V5, 0x10));
///
/// // Unassigned patterns are rejected.
/// assert!(Instruction::from_opcode(Opcode(0x8ABF)).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// `CLS` (`00E0`): clear the display.
    Cls,
    /// `RET` (`00EE`): return from a subroutine.
    Ret,
    /// `JP addr` (`1nnn`).
    Jp(Address),
    /// `CALL addr` (`2nnn`).
    Call(Address),
    /// `SE Vx, byte` (`3xkk`).
    SeByte(Register, u8),
    /// `SNE Vx, byte` (`4xkk`).
    SneByte(Register, u8),
    /// `SE Vx, Vy` (`5xy0`).
    SeReg(Register, Register),
    /// `LD Vx, byte` (`6xkk`).
    LdByte(Register, u8),
    /// `ADD Vx, byte` (`7xkk`): no flag effect.
    AddByte(Register, u8),
    /// `LD Vx, Vy` (`8xy0`).
    LdReg(Register, Register),
    /// `OR Vx, Vy` (`8xy1`).
    Or(Register, Register),
    /// `AND Vx, Vy` (`8xy2`).
    And(Register, Register),
    /// `XOR Vx, Vy` (`8xy3`).
    Xor(Register, Register),
    /// `ADD Vx, Vy` (`8xy4`): `VF` is the carry.
    AddReg(Register, Register),
    /// `SUB Vx, Vy` (`8xy5`): `VF` is the negated borrow.
    Sub(Register, Register),
    /// `SHR Vx, Vy` (`8xy6`): `Vx := Vy >> 1`, `VF` the shifted-out bit.
    Shr(Register, Register),
    /// `SUBN Vx, Vy` (`8xy7`): `Vx := Vy - Vx`.
    Subn(Register, Register),
    /// `SHL Vx, Vy` (`8xyE`): `Vx := Vy << 1`, `VF` the shifted-out bit.
    Shl(Register, Register),
    /// `SNE Vx, Vy` (`9xy0`).
    SneReg(Register, Register),
    /// `LD I, addr` (`Annn`).
    LdI(Address),
    /// `JP V0, addr` (`Bnnn`).
    JpV0(Address),
    /// `RND Vx, byte` (`Cxkk`).
    Rnd(Register, u8),
    /// `DRW Vx, Vy, nibble` (`Dxyn`).
    Drw(Register, Register, u8),
    /// `SKP Vx` (`Ex9E`).
    Skp(Register),
    /// `SKNP Vx` (`ExA1`).
    Sknp(Register),
    /// `LD Vx, DT` (`Fx07`).
    LdDt(Register),
    /// `LD Vx, K` (`Fx0A`): suspend until a key is released.
    WaitKey(Register),
    /// `LD DT, Vx` (`Fx15`).
    SetDt(Register),
    /// `LD ST, Vx` (`Fx18`).
    SetSt(Register),
    /// `ADD I, Vx` (`Fx1E`).
    AddI(Register),
    /// `LD F, Vx` (`Fx29`): point `I` at the glyph for the digit in `Vx`.
    Glyph(Register),
    /// `LD B, Vx` (`Fx33`): store the decimal digits of `Vx` at `I..I+2`.
    Bcd(Register),
    /// `LD [I], Vx` (`Fx55`): store `V0..=Vx` at `I`.
    StoreRegs(Register),
    /// `LD Vx, [I]` (`Fx65`): load `V0..=Vx` from `I`.
    LoadRegs(Register),
}

impl Instruction {
    /// Decodes the given opcode, rejecting unassigned patterns.
    pub fn from_opcode(opcode: Opcode) -> Result<Self, DecodeError> {
        use self::Instruction::*;

        Ok(match (opcode.0 & 0xF000) >> 12 {
            0x0 => match opcode.0 & 0xFF {
                0xE0 => Cls,
                0xEE => Ret,
                _ => return Err(DecodeError(opcode)),
            },
            0x1 => Jp(opcode.addr()),
            0x2 => Call(opcode.addr()),
            0x3 => SeByte(opcode.vx(), opcode.byte()),
            0x4 => SneByte(opcode.vx(), opcode.byte()),
            0x5 => if opcode.nibble() == 0 {
                SeReg(opcode.vx(), opcode.vy())
            } else {
                return Err(DecodeError(opcode));
            },
            0x6 => LdByte(opcode.vx(), opcode.byte()),
            0x7 => AddByte(opcode.vx(), opcode.byte()),
            0x8 => match opcode.nibble() {
                0x0 => LdReg(opcode.vx(), opcode.vy()),
                0x1 => Or(opcode.vx(), opcode.vy()),
                0x2 => And(opcode.vx(), opcode.vy()),
                0x3 => Xor(opcode.vx(), opcode.vy()),
                0x4 => AddReg(opcode.vx(), opcode.vy()),
                0x5 => Sub(opcode.vx(), opcode.vy()),
                0x6 => Shr(opcode.vx(), opcode.vy()),
                0x7 => Subn(opcode.vx(), opcode.vy()),
                0xE => Shl(opcode.vx(), opcode.vy()),
                _ => return Err(DecodeError(opcode)),
            },
            0x9 => if opcode.nibble() == 0 {
                SneReg(opcode.vx(), opcode.vy())
            } else {
                return Err(DecodeError(opcode));
            },
            0xA => LdI(opcode.addr()),
            0xB => JpV0(opcode.addr()),
            0xC => Rnd(opcode.vx(), opcode.byte()),
            0xD => Drw(opcode.vx(), opcode.vy(), opcode.nibble()),
            0xE => match opcode.0 & 0xFF {
                0x9E => Skp(opcode.vx()),
                0xA1 => Sknp(opcode.vx()),
                _ => return Err(DecodeError(opcode)),
            },
            0xF => match opcode.0 & 0xFF {
                0x07 => LdDt(opcode.vx()),
                0x0A => WaitKey(opcode.vx()),
                0x15 => SetDt(opcode.vx()),
                0x18 => SetSt(opcode.vx()),
                0x1E => AddI(opcode.vx()),
                0x29 => Glyph(opcode.vx()),
                0x33 => Bcd(opcode.vx()),
                0x55 => StoreRegs(opcode.vx()),
                0x65 => LoadRegs(opcode.vx()),
                _ => return Err(DecodeError(opcode)),
            },
            _ => unreachable!("4-bit quantity didn't match 0-15"),
        })
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::Instruction::*;

        match *self {
            Cls => write!(f, "CLS"),
            Ret => write!(f, "RET"),
            Jp(addr) => write!(f, "JP {}", addr),
            Call(addr) => write!(f, "CALL {}", addr),
            SeByte(reg, b) => write!(f, "SE {}, #{:02X}", reg, b),
            SneByte(reg, b) => write!(f, "SNE {}, #{:02X}", reg, b),
            SeReg(reg1, reg2) => write!(f, "SE {}, {}", reg1, reg2),
            LdByte(reg, b) => write!(f, "LD {}, #{:02X}", reg, b),
            AddByte(reg, b) => write!(f, "ADD {}, #{:02X}", reg, b),
            LdReg(reg1, reg2) => write!(f, "LD {}, {}", reg1, reg2),
            Or(reg1, reg2) => write!(f, "OR {}, {}", reg1, reg2),
            And(reg1, reg2) => write!(f, "AND {}, {}", reg1, reg2),
            Xor(reg1, reg2) => write!(f, "XOR {}, {}", reg1, reg2),
            AddReg(reg1, reg2) => write!(f, "ADD {}, {}", reg1, reg2),
            Sub(reg1, reg2) => write!(f, "SUB {}, {}", reg1, reg2),
            Shr(reg1, reg2) => write!(f, "SHR {}, {}", reg1, reg2),
            Subn(reg1, reg2) => write!(f, "SUBN {}, {}", reg1, reg2),
            Shl(reg1, reg2) => write!(f, "SHL {}, {}", reg1, reg2),
            SneReg(reg1, reg2) => write!(f, "SNE {}, {}", reg1, reg2),
            LdI(addr) => write!(f, "LD I, {}", addr),
            JpV0(addr) => write!(f, "JP V0, {}", addr),
            Rnd(reg, b) => write!(f, "RND {}, #{:02X}", reg, b),
            Drw(reg1, reg2, n) => write!(f, "DRW {}, {}, {}", reg1, reg2, n),
            Skp(reg) => write!(f, "SKP {}", reg),
            Sknp(reg) => write!(f, "SKNP {}", reg),
            LdDt(reg) => write!(f, "LD {}, DT", reg),
            WaitKey(reg) => write!(f, "LD {}, K", reg),
            SetDt(reg) => write!(f, "LD DT, {}", reg),
            SetSt(reg) => write!(f, "LD ST, {}", reg),
            AddI(reg) => write!(f, "ADD I, {}", reg),
            Glyph(reg) => write!(f, "LD F, {}", reg),
            Bcd(reg) => write!(f, "LD B, {}", reg),
            StoreRegs(reg) => write!(f, "LD [I], {}", reg),
            LoadRegs(reg) => write!(f, "LD {}, [I]", reg),
        }
    }
}
