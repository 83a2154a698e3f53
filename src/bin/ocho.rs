/*
 * This is free software, distributed under the MIT license.  A copy of the
 * license can be found in the LICENSE file in the project root, or at
 * https://opensource.org/licenses/MIT.
 */

//! The `ocho` binary program.
//!
//! This is the outer driver around the virtual machine: it loads the
//! program named on the command line, then runs one cooperative loop that
//! polls terminal events into the keypad, steps the machine at the
//! configured instruction rate, ticks the countdown timers at 60 Hz, redraws
//! the terminal display when the buffer changed and switches the buzzer with
//! the sound timer.  In `--debug` mode the machine advances one instruction
//! per operator keystroke instead.

extern crate beep;
extern crate clap;
#[macro_use]
extern crate crossterm;
extern crate env_logger;
extern crate failure;
#[macro_use]
extern crate log;
#[macro_use]
extern crate maplit;
extern crate ocho;
extern crate spin_sleep;

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Write};
use std::process;
use std::time::Duration;

use clap::{App, Arg, ArgMatches};
use crossterm::cursor;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::style::Print;
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use failure::{Error, ResultExt};
use log::LevelFilter;

use ocho::display;
use ocho::input::Key;
use ocho::timer::Timer;
use ocho::Interpreter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// How many 60 Hz frames a key stays pressed after its event.
///
/// Terminals report key presses only, never releases, so releases are
/// synthesized after a short hold; terminal auto-repeat keeps a genuinely
/// held key pressed.  The synthesized release is also what completes the
/// machine's key-wait instruction.
const HOLD_FRAMES: u8 = 6;

/// The buzzer tone, in Hz.
const BUZZER_PITCH: u16 = 440;

/// Upper bound on machine work per loop pass, to avoid a long stall turning
/// into a burst.
const MAX_BATCH: u32 = 1000;

/// RAII guard for the terminal: raw mode and the alternate screen are
/// restored on drop, including when we exit through an error.
struct Screen {
    out: io::Stdout,
}

impl Screen {
    fn new() -> Result<Self, Error> {
        terminal::enable_raw_mode().context("could not enable raw terminal mode")?;
        let mut out = io::stdout();
        execute!(out, EnterAlternateScreen, cursor::Hide)
            .context("could not enter the alternate screen")?;
        Ok(Screen { out })
    }

    /// Draws the display buffer, two pixel rows per terminal line using
    /// half-block characters.
    fn draw(&mut self, buffer: &display::Buffer) -> crossterm::Result<()> {
        let data = buffer.data();
        let mut line = String::with_capacity(3 * display::WIDTH);
        for y in 0..display::HEIGHT / 2 {
            line.clear();
            for x in 0..display::WIDTH {
                let top = data[x][2 * y];
                let bottom = data[x][2 * y + 1];
                line.push(match (top, bottom) {
                    (true, true) => '█',
                    (true, false) => '▀',
                    (false, true) => '▄',
                    (false, false) => ' ',
                });
            }
            queue!(self.out, cursor::MoveTo(0, y as u16), Print(&line))?;
        }
        self.out.flush()?;
        Ok(())
    }
}

impl Drop for Screen {
    fn drop(&mut self) {
        let _ = execute!(self.out, cursor::Show, LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

/// Maps terminal key events onto the CHIP-8 keypad.
struct Controller {
    /// The map from characters to CHIP-8 keys.
    ///
    /// The conventional mapping puts the 4x4 keypad under the left hand on
    /// a QWERTY layout.  Referring to keys by the character they produce
    /// (rather than by position) means other layouts get a different
    /// physical arrangement, but it keeps the mapping easy to document.
    keymap: HashMap<char, Key>,
    /// Per-key countdown of frames until the synthesized release.
    held: [u8; 16],
}

impl Controller {
    /// Returns a controller with the conventional keymap.
    fn new() -> Self {
        use Key::*;

        Controller::with_keymap(hashmap![
            '1' => K1,
            '2' => K2,
            '3' => K3,
            '4' => KC,
            'q' => K4,
            'w' => K5,
            'e' => K6,
            'r' => KD,
            'a' => K7,
            's' => K8,
            'd' => K9,
            'f' => KE,
            'z' => KA,
            'x' => K0,
            'c' => KB,
            'v' => KF,
        ])
    }

    /// Returns a controller with the given keymap.
    fn with_keymap(keymap: HashMap<char, Key>) -> Self {
        Controller {
            keymap,
            held: [0; 16],
        }
    }

    /// Presses the key mapped to the given character, if any.
    fn press(&mut self, c: char, interpreter: &mut Interpreter) {
        if let Some(&key) = self.keymap.get(&c) {
            interpreter.input_mut().press(key);
            self.held[key as usize] = HOLD_FRAMES;
        }
    }

    /// Advances the hold countdowns by one frame, releasing expired keys.
    fn frame(&mut self, interpreter: &mut Interpreter) {
        for (i, hold) in self.held.iter_mut().enumerate() {
            if *hold > 0 {
                *hold -= 1;
                if *hold == 0 {
                    interpreter.input_mut().release(Key::from_byte(i as u8));
                }
            }
        }
    }
}

/// Switches the PC-speaker buzzer on while the sound timer runs.
///
/// Not every environment has a usable speaker device; the first failure
/// downgrades the buzzer to a no-op with a warning.
struct Buzzer {
    beeping: bool,
    broken: bool,
}

impl Buzzer {
    fn new() -> Self {
        Buzzer {
            beeping: false,
            broken: false,
        }
    }

    fn update(&mut self, sound_timer: u8) {
        let want = sound_timer != 0;
        if self.broken || want == self.beeping {
            return;
        }
        let result = beep::beep(if want { BUZZER_PITCH } else { 0 });
        if let Err(e) = result {
            warn!("buzzer unavailable: {}", e);
            self.broken = true;
        }
        self.beeping = want;
    }
}

impl Drop for Buzzer {
    fn drop(&mut self) {
        if self.beeping {
            let _ = beep::beep(0);
        }
    }
}

/// One-shot operator requests in debug mode, cleared after each loop pass.
#[derive(Default)]
struct DebugFlags {
    /// Execute the next instruction.
    advance: bool,
    /// Dump the register values.
    registers: bool,
}

fn main() {
    let matches = App::new("ocho")
        .version(VERSION)
        .about("A CHIP-8 virtual machine")
        .help_message("show this help message and exit")
        .version_message("show version information and exit")
        .arg(
            Arg::with_name("debug")
                .short("d")
                .long("debug")
                .help("advance one instruction per right-arrow press ('p' dumps registers)"),
        )
        .arg(
            Arg::with_name("frequency")
                .short("f")
                .long("frequency")
                .value_name("FREQ")
                .help("set the instruction rate (in Hz)")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .multiple(true)
                .help("increase verbosity"),
        )
        .arg(
            Arg::with_name("FILE")
                .help("set the program file to run")
                .required(true)
                .index(1),
        )
        .get_matches();

    // Debug mode reports through the logger, so make sure it is audible.
    let filter = match matches.occurrences_of("verbose") {
        0 => if matches.is_present("debug") {
            LevelFilter::Info
        } else {
            LevelFilter::Warn
        },
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter(None, filter)
        .format(|buf, record| writeln!(buf, "{}: {}", record.level(), record.args()))
        .init();

    if let Err(e) = run(&matches) {
        error!("{}", e);
        for cause in e.causes().skip(1) {
            info!("caused by: {}", cause);
        }
        trace!("backtrace: {}", e.backtrace());
        process::exit(1);
    }
}

fn run(matches: &ArgMatches) -> Result<(), Error> {
    let freq = matches
        .value_of("frequency")
        .map(|n| n.parse::<u32>())
        .unwrap_or(Ok(720))
        .context("invalid frequency argument")?;
    let debug = matches.is_present("debug");

    let filename = matches.value_of("FILE").unwrap();
    let mut input =
        File::open(filename).with_context(|_| format!("could not open file '{}'", filename))?;
    let mut interpreter = Interpreter::new();
    interpreter
        .load_program(&mut input)
        .with_context(|_| format!("could not load program from file '{}'", filename))?;

    let mut screen = Screen::new()?;
    let mut controller = Controller::new();
    let mut buzzer = Buzzer::new();
    let mut frame_timer = Timer::new(60);
    let mut cycle_timer = Timer::new(freq);
    let mut flags = DebugFlags::default();

    loop {
        while event::poll(Duration::from_millis(0)).context("could not poll terminal events")? {
            match event::read().context("could not read terminal event")? {
                Event::Key(KeyEvent {
                    code: KeyCode::Esc, ..
                }) => return Ok(()),
                Event::Key(KeyEvent {
                    code: KeyCode::Char('c'),
                    modifiers,
                    ..
                }) if modifiers.contains(KeyModifiers::CONTROL) =>
                {
                    return Ok(())
                }
                Event::Key(KeyEvent {
                    code: KeyCode::Right,
                    ..
                }) if debug =>
                {
                    flags.advance = true
                }
                Event::Key(KeyEvent {
                    code: KeyCode::Char('p'),
                    ..
                }) if debug =>
                {
                    flags.registers = true
                }
                Event::Key(KeyEvent {
                    code: KeyCode::Char(c),
                    ..
                }) => controller.press(c, &mut interpreter),
                Event::Resize(..) => interpreter.display_mut().force_refresh(),
                _ => {}
            }
        }

        // The countdown timers run at 60 Hz regardless of the instruction
        // rate, and keep running while the machine waits on a key.
        for _ in 0..frame_timer.lap().min(MAX_BATCH) {
            interpreter.tick_timers();
            controller.frame(&mut interpreter);
        }

        if debug {
            step_debug(&mut interpreter, &mut flags)?;
        } else {
            // The necessary context for any error in 'step' is provided by
            // the method itself.
            for _ in 0..cycle_timer.lap().min(MAX_BATCH) {
                interpreter.step()?;
            }
        }

        interpreter
            .display_mut()
            .refresh(|buf| screen.draw(buf))
            .context("could not refresh the display")?;
        buzzer.update(interpreter.st());
        spin_sleep::sleep(Duration::from_millis(1));
    }
}

/// Performs one pass of the debug-stepping mode, acting on and then
/// clearing the one-shot operator flags.
fn step_debug(interpreter: &mut Interpreter, flags: &mut DebugFlags) -> Result<(), Error> {
    if flags.advance {
        if interpreter.waiting_for_key() {
            interpreter.step()?;
            info!("waiting for a key release");
        } else {
            let ins = interpreter.current_instruction()?;
            interpreter.step()?;
            info!("executed {}", ins);
        }
    }
    if flags.registers {
        let regs = interpreter.registers();
        for (i, chunk) in regs.chunks(4).enumerate() {
            info!(
                "V{:X}-V{:X}: {:3} {:3} {:3} {:3}",
                4 * i,
                4 * i + 3,
                chunk[0],
                chunk[1],
                chunk[2],
                chunk[3]
            );
        }
    }
    *flags = DebugFlags::default();
    Ok(())
}
