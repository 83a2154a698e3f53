/*
 * This is free software, distributed under the MIT license.  A copy of the
 * license can be found in the LICENSE file in the project root, or at
 * https://opensource.org/licenses/MIT.
 */

//! The CHIP-8 display buffer.
//!
//! The buffer is purely logical: 64x32 on/off cells mutated by XOR sprite
//! drawing and nothing else.  A presentation layer pulls the cell data
//! through `refresh`, which only invokes it when something has actually
//! changed since the last pull.

use std::default::Default;

use failure::Fail;

/// The width of the display, in pixels.
pub const WIDTH: usize = 64;
/// The height of the display, in pixels.
pub const HEIGHT: usize = 32;

/// The height of a hex digit glyph, in rows.
pub const GLYPH_HEIGHT: usize = 5;

/// The built-in glyph sprites for the hex digits 0-F.
pub const GLYPHS: [[u8; GLYPH_HEIGHT]; 16] = [
    [0xF0, 0x90, 0x90, 0x90, 0xF0],
    [0x20, 0x60, 0x20, 0x20, 0x70],
    [0xF0, 0x10, 0xF0, 0x80, 0xF0],
    [0xF0, 0x10, 0xF0, 0x10, 0xF0],
    [0x90, 0x90, 0xF0, 0x10, 0x10],
    [0xF0, 0x80, 0xF0, 0x10, 0xF0],
    [0xF0, 0x80, 0xF0, 0x90, 0xF0],
    [0xF0, 0x10, 0x20, 0x40, 0x40],
    [0xF0, 0x90, 0xF0, 0x90, 0xF0],
    [0xF0, 0x90, 0xF0, 0x10, 0xF0],
    [0xF0, 0x90, 0xF0, 0x90, 0x90],
    [0xE0, 0x90, 0xE0, 0x90, 0xE0],
    [0xF0, 0x80, 0x80, 0x80, 0xF0],
    [0xE0, 0x90, 0x90, 0x90, 0xE0],
    [0xF0, 0x80, 0xF0, 0x80, 0xF0],
    [0xF0, 0x80, 0xF0, 0x80, 0x80],
];

/// A 64x32 monochrome display buffer.
pub struct Buffer {
    /// The cell data, indexed as `data[x][y]` (`true` means "lit").
    data: [[bool; HEIGHT]; WIDTH],
    /// Whether the contents have changed since the last refresh.
    needs_refresh: bool,
}

impl Buffer {
    /// Returns a new display buffer with all cells clear.
    pub fn new() -> Self {
        Buffer {
            data: [[false; HEIGHT]; WIDTH],
            needs_refresh: true,
        }
    }

    /// Clears every cell.
    pub fn clear(&mut self) {
        for col in self.data.iter_mut() {
            for cell in col.iter_mut() {
                *cell = false;
            }
        }
        self.needs_refresh = true;
    }

    /// Returns a reference to the underlying cell data.
    pub fn data(&self) -> &[[bool; HEIGHT]; WIDTH] {
        &self.data
    }

    /// Returns whether the given cell is lit.  Out-of-range coordinates read
    /// as unlit.
    pub fn get(&self, x: usize, y: usize) -> bool {
        x < WIDTH && y < HEIGHT && self.data[x][y]
    }

    /// Draws an 8-bit-wide sprite with its origin at `(x, y)`, one byte per
    /// row, most significant bit leftmost.
    ///
    /// The origin wraps around the display edges, but the sprite's pixels do
    /// not: anything extending past the right or bottom edge is clipped.
    /// Returns whether any lit cell was flipped off (a collision).
    pub fn draw_sprite(&mut self, sprite: &[u8], x: usize, y: usize) -> bool {
        let x = x % WIDTH;
        let y = y % HEIGHT;
        let mut collision = false;

        for (j, row) in sprite.iter().enumerate() {
            for i in 0..8 {
                if row & (1 << (7 - i)) != 0 && self.toggle(x + i, y + j) {
                    collision = true;
                }
            }
        }

        collision
    }

    /// Forces the next call to `refresh` to redraw even if nothing changed.
    pub fn force_refresh(&mut self) {
        self.needs_refresh = true;
    }

    /// Refreshes the presentation layer using the given function.
    ///
    /// The function receives a snapshot of the buffer and should draw it to
    /// whatever user-facing display is in use.  If nothing has changed since
    /// the last refresh, it is not called at all.
    pub fn refresh<F, E>(&mut self, f: F) -> Result<(), E>
    where
        F: FnOnce(&Self) -> Result<(), E>,
        E: Fail,
    {
        if self.needs_refresh {
            f(self)?;
            self.needs_refresh = false;
        }
        Ok(())
    }

    /// Flips the state of the given cell, returning whether it was flipped
    /// off from the lit state.  Out-of-range cells are left untouched.
    fn toggle(&mut self, x: usize, y: usize) -> bool {
        if x < WIDTH && y < HEIGHT {
            let old = self.data[x][y];
            self.data[x][y] = !old;
            self.needs_refresh = true;

            old
        } else {
            false
        }
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Buffer::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{Buffer, HEIGHT, WIDTH};

    /// Tests that drawing XORs cells in and reports collisions.
    #[test]
    fn draw_collision() {
        let mut buffer = Buffer::new();

        assert!(!buffer.draw_sprite(&[0b1010_0000], 0, 0));
        assert!(buffer.get(0, 0));
        assert!(!buffer.get(1, 0));
        assert!(buffer.get(2, 0));

        // Overlapping in one cell flips it off and reports the collision.
        assert!(buffer.draw_sprite(&[0b1100_0000], 0, 0));
        assert!(!buffer.get(0, 0));
        assert!(buffer.get(1, 0));
        assert!(buffer.get(2, 0));
    }

    /// Tests that drawing a sprite twice restores the previous contents.
    #[test]
    fn draw_self_inverse() {
        let mut buffer = Buffer::new();
        let sprite = [0xF0, 0x90, 0x90, 0x90, 0xF0];

        assert!(!buffer.draw_sprite(&sprite, 10, 12));
        assert!(buffer.draw_sprite(&sprite, 10, 12));
        for col in buffer.data().iter() {
            for &cell in col.iter() {
                assert!(!cell);
            }
        }
    }

    /// Tests that the origin wraps but individual pixels clip.
    #[test]
    fn draw_wrap_and_clip() {
        let mut buffer = Buffer::new();

        // Origin off the display wraps back on.
        buffer.draw_sprite(&[0x80], WIDTH + 3, HEIGHT + 4);
        assert!(buffer.get(3, 4));

        // A sprite extending past the right edge does not reappear on the
        // left of the same row.
        let mut buffer = Buffer::new();
        buffer.draw_sprite(&[0xFF], WIDTH - 2, 0);
        assert!(buffer.get(WIDTH - 2, 0));
        assert!(buffer.get(WIDTH - 1, 0));
        for x in 0..6 {
            assert!(!buffer.get(x, 0), "pixel {} should be clipped", x);
        }

        // Rows past the bottom edge are clipped too.
        let mut buffer = Buffer::new();
        buffer.draw_sprite(&[0x80, 0x80, 0x80], 0, HEIGHT - 1);
        assert!(buffer.get(0, HEIGHT - 1));
        assert!(!buffer.get(0, 0));
        assert!(!buffer.get(0, 1));
    }

    /// Tests that clearing turns every cell off.
    #[test]
    fn clear() {
        let mut buffer = Buffer::new();
        buffer.draw_sprite(&[0xFF, 0xFF], 20, 20);
        buffer.clear();
        for col in buffer.data().iter() {
            for &cell in col.iter() {
                assert!(!cell);
            }
        }
    }
}
