/*
 * This is free software, distributed under the MIT license.  A copy of the
 * license can be found in the LICENSE file in the project root, or at
 * https://opensource.org/licenses/MIT.
 */

//! A CHIP-8 virtual machine.
//!
//! The machine itself lives in the `interpreter` module; everything else here
//! is a building block for it (instruction decoding, the display buffer, the
//! keypad state) or for the front-end driving it (the wall-clock `timer`).
//! The front-end concerns themselves, such as putting pixels on an actual
//! screen or collecting key events, are deliberately kept out of the library;
//! see the `ocho` binary for one implementation.

#[macro_use]
extern crate enum_primitive;
extern crate failure;
#[macro_use]
extern crate failure_derive;
#[macro_use]
extern crate log;
extern crate num;
extern crate rand;
extern crate time;

/// The size of the CHIP-8's memory, in bytes.
pub const MEM_SIZE: usize = 0x1000;
/// The address where programs are loaded.
pub const PROG_START: usize = 0x200;
/// The first address past the program region.
///
/// The memory above this point (up to `MEM_SIZE`) is reserved as a work area
/// in the tradition of the original COSMAC VIP layout, so program loading
/// stops here rather than at the true top of memory.
pub const PROG_END: usize = 0xEA0;
/// The maximum size of a loaded program, in bytes.
pub const PROG_SIZE: usize = PROG_END - PROG_START;

pub mod display;
pub mod input;
pub mod instruction;
pub mod interpreter;
pub mod timer;

pub use instruction::{Address, AddressOverflowError, DecodeError, Instruction, Opcode, Register};
pub use interpreter::Interpreter;
