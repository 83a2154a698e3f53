/*
 * This is free software, distributed under the MIT license.  A copy of the
 * license can be found in the LICENSE file in the project root, or at
 * https://opensource.org/licenses/MIT.
 */

//! The CHIP-8 interpreter.
//!
//! The `Interpreter` struct owns the entire machine state: memory,
//! registers, call stack, timers, display buffer and keypad.  It exposes two
//! independent step functions for the outer scheduler to drive at its own
//! cadences: `step` executes one instruction and `tick_timers` decrements
//! the two countdown timers once.  Neither knows anything about wall-clock
//! time.
//!
//! A few points of CHIP-8 semantics are ambiguous between historical
//! implementations; the interpretations used here are:
//!
//! * `8xy6`/`8xyE` shift `Vy` into `Vx` (the original COSMAC behavior), and
//!   the logic instructions `8xy1`-`8xy3` leave `VF` alone.
//! * Program-counter or index-register arithmetic that would leave the
//!   addressable range is a hard error, not a silent clamp; the exceptions
//!   are `Fx1E` and the post-increment of `Fx55`/`Fx65`, where `I` wraps to
//!   12 bits (`Fx1E` flags the carry in `VF`).
//! * The key-wait instruction completes on a press-to-release transition,
//!   and the timers keep counting down while it waits (their step function
//!   is independent, so the scheduler keeps calling it).

use std::default::Default;
use std::io::Read;
use std::num::Wrapping;

use failure::{Error, Fail, ResultExt};
use rand;

use MEM_SIZE;
use PROG_END;
use PROG_SIZE;
use PROG_START;
use display::{self, GLYPHS, GLYPH_HEIGHT};
use input::{self, Key};
use instruction::{Address, AddressOverflowError, Instruction, Opcode, Register};

/// The address at which the glyph font is located.
const GLYPH_START: usize = 0x0;
/// The number of return addresses the call stack can hold.
const STACK_DEPTH: usize = 16;

/// An error resulting from a `CALL` with no free stack slot.
#[derive(Debug, Fail)]
#[fail(display = "call stack overflowed")]
pub struct StackOverflowError;

/// An error resulting from a `RET` with no saved return address.
#[derive(Debug, Fail)]
#[fail(display = "no subroutine to return from")]
pub struct StackUnderflowError;

/// An error resulting from an input program being too large.
#[derive(Debug, Fail)]
#[fail(display = "input program is too large")]
pub struct ProgramTooLargeError;

/// A CHIP-8 interpreter.
///
/// This struct contains the entire state of the machine and provides the
/// methods a front-end needs to drive it: loading a program, stepping
/// through execution, ticking the timers and inspecting or mutating the
/// state in between.
pub struct Interpreter {
    /// The internal memory.
    mem: [u8; MEM_SIZE],
    /// The display buffer.
    display: display::Buffer,
    /// The keypad state.
    input: input::State,
    /// The general-purpose registers `V0`-`VF`.
    regs: [Wrapping<u8>; 16],
    /// The index register `I`.
    reg_i: Address,
    /// The delay timer.
    reg_dt: u8,
    /// The sound timer.
    reg_st: u8,
    /// The program counter.
    pc: Address,
    /// The call stack; holds at most `STACK_DEPTH` return addresses.
    stack: Vec<Address>,
    /// The register awaiting a key release, if a key-wait is in progress.
    waiting: Option<Register>,
}

impl Interpreter {
    /// Returns a new interpreter with zeroed state and the glyph font
    /// loaded.
    pub fn new() -> Self {
        let mut interpreter = Interpreter {
            mem: [0; MEM_SIZE],
            display: display::Buffer::new(),
            input: input::State::new(),
            regs: [Wrapping(0); 16],
            reg_i: Address::from_usize(0).unwrap(),
            reg_dt: 0,
            reg_st: 0,
            pc: Address::from_usize(PROG_START).unwrap(),
            stack: Vec::with_capacity(STACK_DEPTH),
            waiting: None,
        };

        for (i, glyph) in GLYPHS.iter().enumerate() {
            let start = GLYPH_START + i * GLYPH_HEIGHT;
            interpreter.mem[start..start + glyph.len()].copy_from_slice(glyph);
        }

        interpreter
    }

    /// Loads program data from the given source into the program region and
    /// resets the program counter to its start.
    ///
    /// Read failures propagate to the caller, and a source with more data
    /// than the program region can hold is an error rather than a silent
    /// truncation.
    pub fn load_program<R: Read>(&mut self, input: &mut R) -> Result<(), Error> {
        let mut filled = 0;
        while filled < PROG_SIZE {
            let read = input.read(&mut self.mem[PROG_START + filled..PROG_END])?;
            if read == 0 {
                break;
            }
            filled += read;
        }
        if filled == PROG_SIZE {
            let mut tmp = [0u8];
            if input.read(&mut tmp)? == 1 {
                return Err(ProgramTooLargeError.into());
            }
        }

        self.pc = Address::from_usize(PROG_START).unwrap();
        debug!("loaded {} byte program", filled);
        Ok(())
    }

    /// Returns a reference to the display buffer.
    pub fn display(&self) -> &display::Buffer {
        &self.display
    }

    /// Returns a mutable reference to the display buffer.
    pub fn display_mut(&mut self) -> &mut display::Buffer {
        &mut self.display
    }

    /// Returns a reference to the keypad state.
    pub fn input(&self) -> &input::State {
        &self.input
    }

    /// Returns a mutable reference to the keypad state.
    pub fn input_mut(&mut self) -> &mut input::State {
        &mut self.input
    }

    /// Returns a reference to the internal memory.
    pub fn mem(&self) -> &[u8; MEM_SIZE] {
        &self.mem
    }

    /// Returns a mutable reference to the internal memory.
    pub fn mem_mut(&mut self) -> &mut [u8; MEM_SIZE] {
        &mut self.mem
    }

    /// Returns the value of register `I`.
    pub fn i(&self) -> Address {
        self.reg_i
    }

    /// Sets the value of register `I`.
    pub fn set_i(&mut self, val: Address) {
        self.reg_i = val;
    }

    /// Returns the value of the delay timer.
    pub fn dt(&self) -> u8 {
        self.reg_dt
    }

    /// Sets the value of the delay timer.
    pub fn set_dt(&mut self, val: u8) {
        self.reg_dt = val;
    }

    /// Returns the value of the sound timer.
    pub fn st(&self) -> u8 {
        self.reg_st
    }

    /// Sets the value of the sound timer.
    pub fn set_st(&mut self, val: u8) {
        self.reg_st = val;
    }

    /// Returns the value in the given register.
    pub fn register(&self, reg: Register) -> u8 {
        self.regs[reg as usize].0
    }

    /// Sets the given register to the given value.
    pub fn set_register(&mut self, reg: Register, val: u8) {
        self.regs[reg as usize].0 = val;
    }

    /// Returns a snapshot of all 16 general-purpose registers.
    pub fn registers(&self) -> [u8; 16] {
        let mut regs = [0; 16];
        for (dest, src) in regs.iter_mut().zip(self.regs.iter()) {
            *dest = src.0;
        }
        regs
    }

    /// Returns the value of the program counter.
    pub fn pc(&self) -> Address {
        self.pc
    }

    /// Returns whether a key-wait instruction is suspending execution.
    pub fn waiting_for_key(&self) -> bool {
        self.waiting.is_some()
    }

    /// Returns the opcode at the program counter.
    pub fn current_opcode(&self) -> Result<Opcode, Error> {
        let next = (self.pc + 1).context("program counter at the top of memory")?;
        Ok(Opcode::from_bytes(
            self.mem[self.pc.index()],
            self.mem[next.index()],
        ))
    }

    /// Returns the instruction at the program counter.
    pub fn current_instruction(&self) -> Result<Instruction, Error> {
        Ok(Instruction::from_opcode(self.current_opcode()?)?)
    }

    /// Performs a single execution step.
    ///
    /// If a key-wait is in progress this checks for a key release instead of
    /// executing; otherwise it fetches the opcode at the program counter,
    /// advances the counter by 2, decodes and executes.  On any error the
    /// machine state is left as it was at the point of failure.
    pub fn step(&mut self) -> Result<(), Error> {
        if let Some(reg) = self.waiting {
            if let Some(key) = self.input.take_release() {
                self.set_register(reg, key as u8);
                self.waiting = None;
            }
            return Ok(());
        }

        let opcode = self.current_opcode()?;
        self.pc = (self.pc + 2).context("program counter overflowed")?;
        let ins = Instruction::from_opcode(opcode)?;
        self.execute(ins)
    }

    /// Decrements both countdown timers by one tick, saturating at 0.
    ///
    /// The 60 Hz cadence is the caller's responsibility; this is safe to
    /// call regardless of how many instructions have executed in between.
    pub fn tick_timers(&mut self) {
        self.reg_dt = self.reg_dt.saturating_sub(1);
        self.reg_st = self.reg_st.saturating_sub(1);
    }

    /// Executes the given instruction in the current interpreter context.
    ///
    /// The program counter is assumed to have already advanced past the
    /// instruction, so skips and calls work from the post-fetch position.
    pub fn execute(&mut self, ins: Instruction) -> Result<(), Error> {
        use self::Instruction::*;

        match ins {
            Cls => self.display.clear(),
            Ret => {
                self.pc = self.stack
                    .pop()
                    .ok_or(StackUnderflowError)
                    .with_context(|_| format!("error executing {}", ins))?;
            }
            Jp(addr) => self.pc = addr,
            Call(addr) => {
                if self.stack.len() == STACK_DEPTH {
                    return Err(StackOverflowError
                        .context(format!("error executing {}", ins))
                        .into());
                }
                self.stack.push(self.pc);
                self.pc = addr;
            }
            SeByte(reg, b) => if self.register(reg) == b {
                self.skip()?;
            },
            SneByte(reg, b) => if self.register(reg) != b {
                self.skip()?;
            },
            SeReg(reg1, reg2) => if self.register(reg1) == self.register(reg2) {
                self.skip()?;
            },
            LdByte(reg, b) => self.set_register(reg, b),
            AddByte(reg, b) => self.regs[reg as usize] += Wrapping(b),
            LdReg(reg1, reg2) => {
                let r2 = self.register(reg2);
                self.set_register(reg1, r2);
            }
            Or(reg1, reg2) => {
                let r2 = self.register(reg2);
                self.regs[reg1 as usize].0 |= r2;
            }
            And(reg1, reg2) => {
                let r2 = self.register(reg2);
                self.regs[reg1 as usize].0 &= r2;
            }
            Xor(reg1, reg2) => {
                let r2 = self.register(reg2);
                self.regs[reg1 as usize].0 ^= r2;
            }
            AddReg(reg1, reg2) => self.add(reg1, reg2),
            Sub(reg1, reg2) => self.sub(reg1, reg2),
            Shr(reg1, reg2) => self.shr(reg1, reg2),
            Subn(reg1, reg2) => self.subn(reg1, reg2),
            Shl(reg1, reg2) => self.shl(reg1, reg2),
            SneReg(reg1, reg2) => if self.register(reg1) != self.register(reg2) {
                self.skip()?;
            },
            LdI(addr) => self.reg_i = addr,
            JpV0(addr) => {
                self.pc = (addr + self.register(Register::V0) as usize)
                    .context("jump target out of bounds")?;
            }
            Rnd(reg, b) => self.set_register(reg, rand::random::<u8>() & b),
            Drw(reg1, reg2, n) => self.drw(reg1, reg2, n)
                .with_context(|_| format!("error executing {}", ins))?,
            Skp(reg) => if self.input.is_pressed(Key::from_byte(self.register(reg))) {
                self.skip()?;
            },
            Sknp(reg) => if !self.input.is_pressed(Key::from_byte(self.register(reg))) {
                self.skip()?;
            },
            LdDt(reg) => {
                let dt = self.dt();
                self.set_register(reg, dt);
            }
            WaitKey(reg) => {
                // A release that happened before the wait began is stale;
                // only a fresh transition may complete the wait.
                self.input.take_release();
                self.waiting = Some(reg);
            }
            SetDt(reg) => {
                let r = self.register(reg);
                self.set_dt(r);
            }
            SetSt(reg) => {
                let r = self.register(reg);
                self.set_st(r);
            }
            AddI(reg) => {
                let sum = self.reg_i.index() + self.register(reg) as usize;
                if sum >= MEM_SIZE {
                    self.set_register(Register::VF, 1);
                }
                self.reg_i = Address::from_usize(sum % MEM_SIZE).unwrap();
            }
            Glyph(reg) => {
                let r = self.register(reg) as usize;
                self.reg_i =
                    Address::from_usize(GLYPH_START + GLYPH_HEIGHT * (r % GLYPHS.len())).unwrap();
            }
            Bcd(reg) => self.bcd(reg)
                .with_context(|_| format!("error executing {}", ins))?,
            StoreRegs(reg) => self.store_regs(reg)
                .with_context(|_| format!("error executing {}", ins))?,
            LoadRegs(reg) => self.load_regs(reg)
                .with_context(|_| format!("error executing {}", ins))?,
        }

        Ok(())
    }

    /// Advances the program counter past the next instruction.
    fn skip(&mut self) -> Result<(), Error> {
        self.pc = (self.pc + 2).context("program counter overflowed")?;
        Ok(())
    }

    /// Implements `ADD Vx, Vy`.
    ///
    /// The carry is computed from the original operands and written to `VF`
    /// only after the sum, since `VF` may itself be an operand.
    fn add(&mut self, reg1: Register, reg2: Register) {
        let (r1, r2) = (self.register(reg1), self.register(reg2));
        let carry = r1 as u16 + r2 as u16 > 0xFF;
        self.set_register(reg1, r1.wrapping_add(r2));
        self.set_register(Register::VF, carry as u8);
    }

    /// Implements `SUB Vx, Vy`: `VF` is 1 when no borrow occurs.
    fn sub(&mut self, reg1: Register, reg2: Register) {
        let (r1, r2) = (self.register(reg1), self.register(reg2));
        let no_borrow = r1 >= r2;
        self.set_register(reg1, r1.wrapping_sub(r2));
        self.set_register(Register::VF, no_borrow as u8);
    }

    /// Implements `SUBN Vx, Vy`: `Vx := Vy - Vx`, `VF` 1 when no borrow.
    fn subn(&mut self, reg1: Register, reg2: Register) {
        let (r1, r2) = (self.register(reg1), self.register(reg2));
        let no_borrow = r2 >= r1;
        self.set_register(reg1, r2.wrapping_sub(r1));
        self.set_register(Register::VF, no_borrow as u8);
    }

    /// Implements `SHR Vx, Vy`: `VF` receives the shifted-out low bit.
    fn shr(&mut self, reg1: Register, reg2: Register) {
        let r2 = self.register(reg2);
        self.set_register(reg1, r2 >> 1);
        self.set_register(Register::VF, r2 & 1);
    }

    /// Implements `SHL Vx, Vy`: `VF` receives the shifted-out high bit.
    fn shl(&mut self, reg1: Register, reg2: Register) {
        let r2 = self.register(reg2);
        self.set_register(reg1, r2 << 1);
        self.set_register(Register::VF, r2 >> 7);
    }

    /// Implements the `DRW` operation.
    fn drw(&mut self, reg1: Register, reg2: Register, n: u8) -> Result<(), AddressOverflowError> {
        let start = self.reg_i.index();
        let end = start + n as usize;
        if end > MEM_SIZE {
            return Err(AddressOverflowError(end - 1));
        }

        let x = self.register(reg1) as usize;
        let y = self.register(reg2) as usize;
        let collision = self.display.draw_sprite(&self.mem[start..end], x, y);
        self.set_register(Register::VF, collision as u8);
        Ok(())
    }

    /// Implements the `LD B, Vx` operation.
    fn bcd(&mut self, reg: Register) -> Result<(), AddressOverflowError> {
        let val = self.register(reg);
        let addr = self.reg_i.index();
        if addr + 2 >= MEM_SIZE {
            return Err(AddressOverflowError(addr + 2));
        }

        self.mem[addr] = val / 100;
        self.mem[addr + 1] = val % 100 / 10;
        self.mem[addr + 2] = val % 10;
        Ok(())
    }

    /// Implements the `LD [I], Vx` operation: stores `V0..=Vx` at `I` and
    /// advances `I` past the stored bytes.
    fn store_regs(&mut self, reg: Register) -> Result<(), AddressOverflowError> {
        let count = reg as usize + 1;
        let start = self.reg_i.index();
        if start + count > MEM_SIZE {
            return Err(AddressOverflowError(start + count - 1));
        }

        for (dest, src) in self.mem[start..start + count]
            .iter_mut()
            .zip(self.regs[..count].iter())
        {
            *dest = src.0;
        }
        self.reg_i = Address::from_usize((start + count) % MEM_SIZE).unwrap();
        Ok(())
    }

    /// Implements the `LD Vx, [I]` operation: loads `V0..=Vx` from `I` and
    /// advances `I` past the loaded bytes.
    fn load_regs(&mut self, reg: Register) -> Result<(), AddressOverflowError> {
        let count = reg as usize + 1;
        let start = self.reg_i.index();
        if start + count > MEM_SIZE {
            return Err(AddressOverflowError(start + count - 1));
        }

        for (dest, src) in self.regs[..count]
            .iter_mut()
            .zip(self.mem[start..start + count].iter())
        {
            *dest = Wrapping(*src);
        }
        self.reg_i = Address::from_usize((start + count) % MEM_SIZE).unwrap();
        Ok(())
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{Interpreter, StackOverflowError, StackUnderflowError};
    use instruction::{Address, DecodeError, Instruction, Register};
    use num::FromPrimitive;

    use PROG_START;

    /// Tests the `ADD Vx, Vy` operation, including the carry cases from the
    /// classic 8-bit overflow table.
    #[test]
    fn instruction_add_reg() {
        use Register::*;

        // Test cases, in the format (Vx, Vy, b1, b2).
        let cases = [
            (V0, V1, 0xFFu8, 0x01u8),
            (V5, VD, 0x01, 0x01),
            (V7, VE, 0xFF, 0xFF),
            (V2, V4, 0x00, 0x00),
            (V5, V6, 0x80, 0x80),
        ];
        let mut interpreter = Interpreter::new();

        for &(vx, vy, b1, b2) in cases.iter() {
            let case = (vx, vy, b1, b2);
            let sum = b1.wrapping_add(b2);
            let carry = b1 as u32 + b2 as u32 > 0xFF;

            interpreter.set_register(vx, b1);
            interpreter.set_register(vy, b2);
            interpreter.execute(Instruction::AddReg(vx, vy)).unwrap();
            assert_eq!(interpreter.register(vx), sum, "case {:?}", case);
            assert_eq!(interpreter.register(VF), carry as u8, "case {:?}", case);
        }
    }

    /// Tests that `ADD Vx, byte` wraps without touching `VF`.
    #[test]
    fn instruction_add_byte() {
        use Register::*;

        let mut interpreter = Interpreter::new();
        interpreter.set_register(VF, 0xAB);
        interpreter.set_register(V3, 0xFF);
        interpreter.execute(Instruction::AddByte(V3, 0x02)).unwrap();
        assert_eq!(interpreter.register(V3), 0x01);
        assert_eq!(interpreter.register(VF), 0xAB);
    }

    /// Tests the `SUB` and `SUBN` operations.
    #[test]
    fn instruction_sub() {
        use Register::*;

        // Test cases, in the format (Vx, Vy, b1, b2).
        let cases = [
            (V9, V8, 0x05u8, 0x0Au8),
            (V6, V2, 0x0A, 0x05),
            (V0, V1, 0x00, 0x00),
            (VE, VA, 0xFF, 0xFF),
            (V3, V7, 0x01, 0xFF),
        ];
        let mut interpreter = Interpreter::new();

        for &(vx, vy, b1, b2) in cases.iter() {
            let case = (vx, vy, b1, b2);

            interpreter.set_register(vx, b1);
            interpreter.set_register(vy, b2);
            interpreter.execute(Instruction::Sub(vx, vy)).unwrap();
            assert_eq!(interpreter.register(vx), b1.wrapping_sub(b2), "case {:?}", case);
            assert_eq!(interpreter.register(VF), (b1 >= b2) as u8, "case {:?}", case);

            interpreter.set_register(vx, b1);
            interpreter.set_register(vy, b2);
            interpreter.execute(Instruction::Subn(vx, vy)).unwrap();
            assert_eq!(interpreter.register(vx), b2.wrapping_sub(b1), "case {:?}", case);
            assert_eq!(interpreter.register(VF), (b2 >= b1) as u8, "case {:?}", case);
        }
    }

    /// Tests that the shifts read `Vy` and put the shifted-out bit in `VF`.
    #[test]
    fn instruction_shift() {
        use Register::*;

        let mut interpreter = Interpreter::new();

        interpreter.set_register(V4, 0x05);
        interpreter.execute(Instruction::Shr(V2, V4)).unwrap();
        assert_eq!(interpreter.register(V2), 0x02);
        assert_eq!(interpreter.register(V4), 0x05);
        assert_eq!(interpreter.register(VF), 1);

        interpreter.set_register(V4, 0x81);
        interpreter.execute(Instruction::Shl(V2, V4)).unwrap();
        assert_eq!(interpreter.register(V2), 0x02);
        assert_eq!(interpreter.register(VF), 1);

        interpreter.set_register(V4, 0x7E);
        interpreter.execute(Instruction::Shl(V2, V4)).unwrap();
        assert_eq!(interpreter.register(V2), 0xFC);
        assert_eq!(interpreter.register(VF), 0);
    }

    /// Tests that the flag is derived from the original operands even when
    /// `VF` itself is one of them.
    #[test]
    fn flag_register_as_operand() {
        use Register::*;

        let mut interpreter = Interpreter::new();
        interpreter.set_register(VF, 0xC8);
        interpreter.set_register(V1, 0x64);
        interpreter.execute(Instruction::AddReg(VF, V1)).unwrap();
        // The sum result is discarded in favor of the carry flag.
        assert_eq!(interpreter.register(VF), 1);

        interpreter.set_register(VF, 0x05);
        interpreter.set_register(V1, 0x0A);
        interpreter.execute(Instruction::Sub(VF, V1)).unwrap();
        assert_eq!(interpreter.register(VF), 0);
    }

    /// Tests the `AND`, `OR` and `XOR` operations, which must leave `VF`
    /// untouched.
    #[test]
    fn instruction_bitwise() {
        use Register::*;

        // Test cases, in the format (Vx, Vy, b1, b2).
        let cases = [
            (V7, V2, 0x75u8, 0xF2u8),
            (V3, V8, 0x01, 0xFF),
            (VA, VE, 0x6A, 0x32),
            (V0, V1, 0xF0, 0x0F),
        ];
        let mut interpreter = Interpreter::new();

        for &(vx, vy, b1, b2) in cases.iter() {
            let case = (vx, vy, b1, b2);
            interpreter.set_register(VF, 0x5A);

            interpreter.set_register(vx, b1);
            interpreter.set_register(vy, b2);
            interpreter.execute(Instruction::Or(vx, vy)).unwrap();
            assert_eq!(interpreter.register(vx), b1 | b2, "case {:?}", case);

            interpreter.set_register(vx, b1);
            interpreter.set_register(vy, b2);
            interpreter.execute(Instruction::And(vx, vy)).unwrap();
            assert_eq!(interpreter.register(vx), b1 & b2, "case {:?}", case);

            interpreter.set_register(vx, b1);
            interpreter.set_register(vy, b2);
            interpreter.execute(Instruction::Xor(vx, vy)).unwrap();
            assert_eq!(interpreter.register(vx), b1 ^ b2, "case {:?}", case);

            assert_eq!(interpreter.register(VF), 0x5A, "case {:?}", case);
        }
    }

    /// Tests the skip instructions against the program counter.
    #[test]
    fn instruction_skips() {
        use Register::*;

        let mut interpreter = Interpreter::new();
        let base = interpreter.pc().index();

        interpreter.set_register(V1, 0x42);
        interpreter
            .execute(Instruction::SeByte(V1, 0x42))
            .unwrap();
        assert_eq!(interpreter.pc().index(), base + 2);

        interpreter
            .execute(Instruction::SeByte(V1, 0x43))
            .unwrap();
        assert_eq!(interpreter.pc().index(), base + 2);

        interpreter
            .execute(Instruction::SneByte(V1, 0x43))
            .unwrap();
        assert_eq!(interpreter.pc().index(), base + 4);

        interpreter.set_register(V2, 0x42);
        interpreter.execute(Instruction::SeReg(V1, V2)).unwrap();
        assert_eq!(interpreter.pc().index(), base + 6);

        interpreter.execute(Instruction::SneReg(V1, V2)).unwrap();
        assert_eq!(interpreter.pc().index(), base + 6);
    }

    /// Tests the `LD B, Vx` operation.
    #[test]
    fn instruction_bcd() {
        use Register::*;

        // Test cases, in the format (Vx, n1, n2, n3), where the digits to be
        // stored are n1, n2 and n3 (in that order).
        let cases = [
            (V5, 1, 2, 3),
            (VD, 0, 0, 1),
            (VE, 1, 0, 0),
            (V2, 2, 5, 5),
            (V6, 0, 0, 0),
        ];
        let mut interpreter = Interpreter::new();

        for &(vx, n1, n2, n3) in cases.iter() {
            let case = (vx, n1, n2, n3);
            let n = 100 * n1 + 10 * n2 + n3;

            interpreter.set_i(Address::from_usize(0x300).unwrap());
            interpreter.set_register(vx, n);
            interpreter.execute(Instruction::Bcd(vx)).unwrap();
            let i = interpreter.i().index();
            assert_eq!(interpreter.mem()[i], n1, "case {:?}", case);
            assert_eq!(interpreter.mem()[i + 1], n2, "case {:?}", case);
            assert_eq!(interpreter.mem()[i + 2], n3, "case {:?}", case);
        }
    }

    /// Tests that storing `V0..=Vx` and loading it back round-trips, with
    /// `I` advancing past the block both times.
    #[test]
    fn store_load_roundtrip() {
        use Register::*;

        let values = [3u8, 1, 4, 1, 5, 9, 2, 6];
        let mut interpreter = Interpreter::new();

        for (i, &v) in values.iter().enumerate() {
            interpreter.set_register(Register::from_usize(i).unwrap(), v);
        }
        interpreter.set_i(Address::from_usize(0x400).unwrap());
        interpreter.execute(Instruction::StoreRegs(V7)).unwrap();
        assert_eq!(interpreter.i().index(), 0x408);
        assert_eq!(&interpreter.mem()[0x400..0x408], &values);

        for i in 0..8 {
            interpreter.set_register(Register::from_usize(i).unwrap(), 0);
        }
        interpreter.set_i(Address::from_usize(0x400).unwrap());
        interpreter.execute(Instruction::LoadRegs(V7)).unwrap();
        assert_eq!(interpreter.i().index(), 0x408);
        for (i, &v) in values.iter().enumerate() {
            assert_eq!(interpreter.register(Register::from_usize(i).unwrap()), v);
        }
    }

    /// Tests the `ADD I, Vx` overflow policy: `VF` flags the carry and `I`
    /// wraps to 12 bits.
    #[test]
    fn instruction_add_i() {
        use Register::*;

        let mut interpreter = Interpreter::new();

        interpreter.set_i(Address::from_usize(0x100).unwrap());
        interpreter.set_register(V1, 0x05);
        interpreter.set_register(VF, 0x77);
        interpreter.execute(Instruction::AddI(V1)).unwrap();
        assert_eq!(interpreter.i().index(), 0x105);
        assert_eq!(interpreter.register(VF), 0x77);

        interpreter.set_i(Address::from_usize(0xFFF).unwrap());
        interpreter.set_register(V1, 0x01);
        interpreter.execute(Instruction::AddI(V1)).unwrap();
        assert_eq!(interpreter.i().index(), 0x000);
        assert_eq!(interpreter.register(VF), 1);
    }

    /// Tests the glyph lookup: each hex digit maps to its 5-byte sprite.
    #[test]
    fn instruction_glyph() {
        use Register::*;

        let mut interpreter = Interpreter::new();
        interpreter.set_register(V0, 0xA);
        interpreter.execute(Instruction::Glyph(V0)).unwrap();
        assert_eq!(interpreter.i().index(), 0xA * 5);
        // Only the low nibble of the register matters.
        interpreter.set_register(V0, 0x1A);
        interpreter.execute(Instruction::Glyph(V0)).unwrap();
        assert_eq!(interpreter.i().index(), 0xA * 5);
    }

    /// Tests that `RND` masks the generated byte with the operand.
    #[test]
    fn instruction_rnd() {
        use Register::*;

        let mut interpreter = Interpreter::new();
        for _ in 0..16 {
            interpreter.execute(Instruction::Rnd(V6, 0x00)).unwrap();
            assert_eq!(interpreter.register(V6), 0);
            interpreter.execute(Instruction::Rnd(V6, 0x0F)).unwrap();
            assert_eq!(interpreter.register(V6) & 0xF0, 0);
        }
    }

    /// Tests a call/return round-trip through `step`.
    #[test]
    fn call_ret_roundtrip() {
        let mut interpreter = Interpreter::new();
        let mut prog: &[u8] = &[0x22, 0x10]; // CALL 0x210
        interpreter.load_program(&mut prog).unwrap();
        interpreter.mem_mut()[0x210] = 0x00; // RET
        interpreter.mem_mut()[0x211] = 0xEE;

        interpreter.step().unwrap();
        assert_eq!(interpreter.pc().index(), 0x210);
        interpreter.step().unwrap();
        assert_eq!(interpreter.pc().index(), PROG_START + 2);
    }

    /// Tests that the 17th nested call overflows the stack.
    #[test]
    fn stack_overflow() {
        let mut interpreter = Interpreter::new();
        // CALL 0x200: calls itself forever without returning.
        let mut prog: &[u8] = &[0x22, 0x00];
        interpreter.load_program(&mut prog).unwrap();

        for i in 0..16 {
            interpreter.step().unwrap_or_else(|e| panic!("call {}: {}", i, e));
        }
        let err = interpreter.step().unwrap_err();
        assert!(
            err.find_root_cause()
                .downcast_ref::<StackOverflowError>()
                .is_some(),
            "unexpected error: {}",
            err
        );
    }

    /// Tests that returning with an empty stack underflows.
    #[test]
    fn stack_underflow() {
        let mut interpreter = Interpreter::new();
        let err = interpreter.execute(Instruction::Ret).unwrap_err();
        assert!(
            err.find_root_cause()
                .downcast_ref::<StackUnderflowError>()
                .is_some(),
            "unexpected error: {}",
            err
        );
    }

    /// Tests that an unassigned pattern fails to decode and leaves the
    /// registers alone.
    #[test]
    fn step_decode_error() {
        let mut interpreter = Interpreter::new();
        let mut prog: &[u8] = &[0x8A, 0xBF];
        interpreter.load_program(&mut prog).unwrap();
        let regs = interpreter.registers();

        let err = interpreter.step().unwrap_err();
        assert!(
            err.find_root_cause().downcast_ref::<DecodeError>().is_some(),
            "unexpected error: {}",
            err
        );
        assert_eq!(interpreter.registers(), regs);
    }

    /// Tests the key-wait state machine: only a press-to-release transition
    /// observed after the wait began completes it.
    #[test]
    fn wait_key() {
        use input::Key;
        use Register::*;

        let mut interpreter = Interpreter::new();
        let mut prog: &[u8] = &[0xF3, 0x0A, 0x61, 0x05]; // LD V3, K; LD V1, #05
        interpreter.load_program(&mut prog).unwrap();

        interpreter.step().unwrap();
        assert!(interpreter.waiting_for_key());
        assert_eq!(interpreter.pc().index(), PROG_START + 2);

        // No key activity: stays suspended without advancing.
        interpreter.step().unwrap();
        assert!(interpreter.waiting_for_key());

        // A press alone is not enough.
        interpreter.input_mut().press(Key::K7);
        interpreter.step().unwrap();
        assert!(interpreter.waiting_for_key());

        interpreter.input_mut().release(Key::K7);
        interpreter.step().unwrap();
        assert!(!interpreter.waiting_for_key());
        assert_eq!(interpreter.register(V3), 0x7);

        // Execution resumes with the next instruction.
        interpreter.step().unwrap();
        assert_eq!(interpreter.register(V1), 0x05);
    }

    /// Tests that the timers decrement once per tick and stop at zero.
    #[test]
    fn timers_saturate() {
        let mut interpreter = Interpreter::new();
        interpreter.set_dt(2);
        interpreter.set_st(1);

        interpreter.tick_timers();
        assert_eq!(interpreter.dt(), 1);
        assert_eq!(interpreter.st(), 0);

        interpreter.tick_timers();
        interpreter.tick_timers();
        assert_eq!(interpreter.dt(), 0);
        assert_eq!(interpreter.st(), 0);
    }

    /// Tests that drawing sets `VF` on collision and resets it otherwise.
    #[test]
    fn instruction_drw() {
        use Register::*;

        let mut interpreter = Interpreter::new();
        interpreter.set_i(Address::from_usize(0x300).unwrap());
        interpreter.mem_mut()[0x300] = 0xFF;
        interpreter.set_register(V0, 4);
        interpreter.set_register(V1, 6);
        interpreter.set_register(VF, 1);

        interpreter.execute(Instruction::Drw(V0, V1, 1)).unwrap();
        assert_eq!(interpreter.register(VF), 0);
        assert!(interpreter.display().get(4, 6));

        // Redrawing the same sprite erases it and reports the collision.
        interpreter.execute(Instruction::Drw(V0, V1, 1)).unwrap();
        assert_eq!(interpreter.register(VF), 1);
        assert!(!interpreter.display().get(4, 6));
    }
}
