//! Peripherals attached to the CPU: keyboard, clock and console output.
//!
//! The engine only polls these between instructions. None of them may
//! block.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::Instant;

/// Non-blocking keyboard.
pub trait InputSource {
    /// Consume the next pending key, if any.
    fn poll_key(&mut self) -> Option<u8>;
}

/// Monotonic wall clock in whole seconds.
pub trait Clock {
    fn seconds(&mut self) -> u64;
}

/// A keyboard that never has anything to say.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInput;

impl InputSource for NoInput {
    fn poll_key(&mut self) -> Option<u8> {
        None
    }
}

/// Shared FIFO of pending keys.
///
/// Clones share the same queue, so one handle can feed keys while the CPU
/// owns the other.
#[derive(Debug, Default, Clone)]
pub struct KeyQueue {
    keys: Rc<RefCell<VecDeque<u8>>>,
}

impl KeyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, key: u8) {
        self.keys.borrow_mut().push_back(key);
    }

    pub fn len(&self) -> usize {
        self.keys.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.borrow().is_empty()
    }
}

impl InputSource for KeyQueue {
    fn poll_key(&mut self) -> Option<u8> {
        self.keys.borrow_mut().pop_front()
    }
}

/// Real time elapsed since construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn seconds(&mut self) -> u64 {
        self.start.elapsed().as_secs()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, seconds: u64) {
        self.now.set(self.now.get() + seconds);
    }

    pub fn set(&self, seconds: u64) {
        self.now.set(seconds);
    }
}

impl Clock for ManualClock {
    fn seconds(&mut self) -> u64 {
        self.now.get()
    }
}

/// Captured console output. Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct SharedOutput {
    buf: Rc<RefCell<Vec<u8>>>,
}

impl SharedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.borrow()).into_owned()
    }

    pub fn clear(&self) {
        self.buf.borrow_mut().clear();
    }
}

impl Write for SharedOutput {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.borrow_mut().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// The full set of peripherals owned by a [`Cpu`](crate::Cpu).
pub struct Devices {
    pub input: Box<dyn InputSource>,
    pub clock: Box<dyn Clock>,
    pub output: Box<dyn Write>,
}

impl Devices {
    /// No keyboard, real clock, stdout.
    pub fn console() -> Self {
        Self {
            input: Box::new(NoInput),
            clock: Box::new(SystemClock::new()),
            output: Box::new(io::stdout()),
        }
    }

    /// Fully scripted peripherals, returned alongside the handles that
    /// drive them.
    pub fn scripted() -> (Self, KeyQueue, ManualClock, SharedOutput) {
        let keys = KeyQueue::new();
        let clock = ManualClock::new();
        let output = SharedOutput::new();
        let devices = Self {
            input: Box::new(keys.clone()),
            clock: Box::new(clock.clone()),
            output: Box::new(output.clone()),
        };
        (devices, keys, clock, output)
    }
}

impl Default for Devices {
    fn default() -> Self {
        Self::console()
    }
}
