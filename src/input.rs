/*
 * This is free software, distributed under the MIT license.  A copy of the
 * license can be found in the LICENSE file in the project root, or at
 * https://opensource.org/licenses/MIT.
 */

//! The CHIP-8 keypad state.
//!
//! The machine never sees raw key events; an input collaborator observes
//! them and presses/releases the 16 logical keys here.  The one wrinkle is
//! the blocking key-wait instruction, which needs to see a press-to-release
//! transition: `release` records the key it happened on, and the interpreter
//! consumes that record with `take_release`.

use std::default::Default;

use num::traits::FromPrimitive;

/// The number of keys on the CHIP-8 keypad.
const N_KEYS: usize = 16;

enum_from_primitive! {
/// A key on the CHIP-8 keypad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    K0 = 0,
    K1,
    K2,
    K3,
    K4,
    K5,
    K6,
    K7,
    K8,
    K9,
    KA,
    KB,
    KC,
    KD,
    KE,
    KF,
}
}

impl Key {
    /// Returns the key selected by the lowest four bits of the given byte.
    pub fn from_byte(b: u8) -> Key {
        Key::from_u8(b % N_KEYS as u8).unwrap()
    }
}

/// The state of the 16-key keypad.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct State {
    /// The key states (`true` means "pressed").
    keys: [bool; N_KEYS],
    /// The most recent key release, if it has not been consumed yet.
    released: Option<Key>,
}

impl State {
    /// Returns a new input state with no keys pressed.
    pub fn new() -> Self {
        State::default()
    }

    /// Returns whether the given key is currently pressed.
    pub fn is_pressed(&self, key: Key) -> bool {
        self.keys[key as usize]
    }

    /// Marks the given key as pressed.
    pub fn press(&mut self, key: Key) {
        self.keys[key as usize] = true;
    }

    /// Marks the given key as released, recording the release so that a
    /// pending key-wait can pick it up.
    pub fn release(&mut self, key: Key) {
        if self.keys[key as usize] {
            self.released = Some(key);
        }
        self.keys[key as usize] = false;
    }

    /// Consumes and returns the most recent key release, if any.
    pub fn take_release(&mut self) -> Option<Key> {
        self.released.take()
    }
}
