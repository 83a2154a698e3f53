/*
 * This is free software, distributed under the MIT license.  A copy of the
 * license can be found in the LICENSE file in the project root, or at
 * https://opensource.org/licenses/MIT.
 */

//! A wall-clock lap timer.
//!
//! The machine itself has no notion of time; its two step functions are
//! invoked by an outer scheduler that decides how often to call each.  This
//! timer is the scheduler's measuring stick: one instance per cadence (60 Hz
//! for the countdown timers, the configured instruction rate for execution),
//! with `lap` reporting how many ticks have elapsed since the last call.

use std::num::Wrapping;

use time;

/// A lap timer ticking at a fixed frequency.
#[derive(Debug)]
pub struct Timer {
    /// The frequency of the timer, in Hz.
    frequency: u32,
    /// The tick count at the last update.
    ticks: Wrapping<u32>,
}

impl Timer {
    /// Returns a new timer ticking at the given frequency.
    pub fn new(frequency: u32) -> Self {
        let mut timer = Timer {
            frequency,
            ticks: Wrapping(0),
        };
        timer.update();
        timer
    }

    /// Returns the number of ticks elapsed since the last call to this
    /// method (or since the timer was created).
    pub fn lap(&mut self) -> u32 {
        let old = self.ticks;
        self.update();
        (self.ticks - old).0
    }

    /// Recomputes the tick count from the wall clock.
    fn update(&mut self) {
        self.ticks =
            Wrapping((time::precise_time_ns() as f64 * self.frequency as f64 / 1e9) as u32);
    }
}
