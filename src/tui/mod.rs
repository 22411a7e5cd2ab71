//! Terminal front ends for the LS-8 emulator.
//!
//! Provides an interactive terminal-based debugger with:
//! - Register and flag visualization
//! - Memory hex view with PC and SP highlighted
//! - Step/run/breakpoint controls
//! - Disassembly and program output views
//!
//! and a raw-mode console for running programs that read the keyboard.

mod app;
mod ui;
pub mod terminal;

pub use app::{DebuggerApp, run_debugger};
pub use terminal::{keyboard_devices, RawModeGuard, TerminalInput};
