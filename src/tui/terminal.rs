//! Live keyboard for `run --keyboard`.
//!
//! Puts the terminal in raw mode so single key presses reach the emulated
//! keyboard without waiting for Enter.

use std::cell::Cell;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

use crate::cpu::devices::{InputSource, SystemClock};
use crate::cpu::Devices;

/// Raw-mode keyboard. Ctrl-C is not forwarded; it sets the shared
/// `interrupted` flag instead.
pub struct TerminalInput {
    interrupted: Rc<Cell<bool>>,
}

impl TerminalInput {
    pub fn new(interrupted: Rc<Cell<bool>>) -> Self {
        Self { interrupted }
    }
}

impl InputSource for TerminalInput {
    fn poll_key(&mut self) -> Option<u8> {
        // Errors from the terminal read as "no key".
        if !event::poll(Duration::ZERO).unwrap_or(false) {
            return None;
        }

        let Ok(Event::Key(key)) = event::read() else {
            return None;
        };
        if key.kind != KeyEventKind::Press {
            return None;
        }

        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.interrupted.set(true);
                None
            }
            KeyCode::Char(c) if c.is_ascii() => Some(c as u8),
            KeyCode::Enter => Some(b'\n'),
            KeyCode::Tab => Some(b'\t'),
            KeyCode::Backspace => Some(0x08),
            KeyCode::Esc => Some(0x1b),
            _ => None,
        }
    }
}

/// Stdout with `\n` expanded to `\r\n`, since raw mode disables the
/// terminal's own translation.
pub struct RawStdout {
    inner: io::Stdout,
}

impl RawStdout {
    pub fn new() -> Self {
        Self { inner: io::stdout() }
    }
}

impl Default for RawStdout {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for RawStdout {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for chunk in buf.split_inclusive(|&b| b == b'\n') {
            match chunk.split_last() {
                Some((b'\n', body)) => {
                    self.inner.write_all(body)?;
                    self.inner.write_all(b"\r\n")?;
                }
                _ => self.inner.write_all(chunk)?,
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Holds the terminal in raw mode until dropped.
pub struct RawModeGuard;

impl RawModeGuard {
    pub fn enable() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

/// Peripherals for an interactive console run.
pub fn keyboard_devices(interrupted: Rc<Cell<bool>>) -> Devices {
    Devices {
        input: Box::new(TerminalInput::new(interrupted)),
        clock: Box::new(SystemClock::new()),
        output: Box::new(RawStdout::new()),
    }
}
