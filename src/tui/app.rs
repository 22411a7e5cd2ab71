//! Debugger application state and logic.

use crate::cpu::devices::{KeyQueue, SharedOutput, SystemClock};
use crate::cpu::{Cpu, Cycle, Devices};
use crate::image::disasm::disassemble_at;
use std::collections::HashSet;

/// Instructions executed per UI tick while running.
const CYCLES_PER_TICK: usize = 64;

/// Debugger application state.
pub struct DebuggerApp {
    /// The CPU being debugged.
    pub cpu: Cpu,
    /// Original program for reference.
    pub program: Vec<u8>,
    /// Breakpoints (by address).
    pub breakpoints: HashSet<usize>,
    /// Is the debugger running continuously?
    pub running: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Are key presses forwarded to the emulated keyboard?
    pub capture_keys: bool,
    /// Set when resuming, so the breakpoint under the PC does not fire again.
    leaving_breakpoint: bool,
    /// Status message to display.
    pub status: String,
    /// Memory view scroll offset (in rows of 8 bytes).
    pub mem_scroll: usize,
    /// Keys waiting for the emulated keyboard.
    pub keys: KeyQueue,
    /// Everything the program has printed.
    pub output: SharedOutput,
}

impl DebuggerApp {
    /// Create a new debugger with a loaded program.
    pub fn new(program: Vec<u8>) -> Self {
        let keys = KeyQueue::new();
        let output = SharedOutput::new();
        let mut cpu = Cpu::with_devices(Self::devices(&keys, &output));
        let status = match cpu.load_program(&program) {
            Ok(()) => "Ready. Press 's' to step, 'r' to run, 'q' to quit.".into(),
            Err(e) => format!("Load error: {}", e),
        };

        Self {
            cpu,
            program,
            breakpoints: HashSet::new(),
            running: false,
            should_quit: false,
            capture_keys: false,
            leaving_breakpoint: false,
            status,
            mem_scroll: 0,
            keys,
            output,
        }
    }

    fn devices(keys: &KeyQueue, output: &SharedOutput) -> Devices {
        Devices {
            input: Box::new(keys.clone()),
            clock: Box::new(SystemClock::new()),
            output: Box::new(output.clone()),
        }
    }

    /// Step one cycle.
    pub fn step(&mut self) {
        if !self.cpu.is_running() {
            self.status = format!("CPU stopped: {:?}", self.cpu.state);
            self.running = false;
            return;
        }

        let pc = self.cpu.regs.pc;
        match self.cpu.step() {
            Ok(Cycle::Executed(_)) => {
                let (disasm, _) = disassemble_at(self.cpu.mem.as_slice(), pc);
                self.status = format!("PC={:02X}: {}", pc, disasm);
            }
            Ok(Cycle::Interrupted(line)) => {
                self.status = format!("Interrupt {} → handler at {:02X}", line, self.cpu.regs.pc);
            }
            Err(e) => {
                self.status = format!("Error: {}", e);
                self.running = false;
            }
        }
    }

    /// Run until halt, breakpoint, or error.
    pub fn run(&mut self) {
        self.running = true;
        self.leaving_breakpoint = true;
        self.status = "Running...".into();
    }

    /// Run one batch of continuous execution.
    pub fn tick(&mut self) {
        for _ in 0..CYCLES_PER_TICK {
            if !self.running {
                return;
            }

            if !self.cpu.is_running() {
                self.running = false;
                self.status = format!("Stopped after {} cycles: {:?}", self.cpu.cycles, self.cpu.state);
                return;
            }

            let pc = self.cpu.regs.pc;
            if self.breakpoints.contains(&pc) && !self.leaving_breakpoint {
                self.running = false;
                self.status = format!("Breakpoint at PC={:02X}", pc);
                return;
            }
            self.leaving_breakpoint = false;

            self.step();
        }
    }

    /// Toggle breakpoint at current PC.
    pub fn toggle_breakpoint(&mut self) {
        let pc = self.cpu.regs.pc;
        if self.breakpoints.remove(&pc) {
            self.status = format!("Removed breakpoint at PC={:02X}", pc);
        } else {
            self.breakpoints.insert(pc);
            self.status = format!("Set breakpoint at PC={:02X}", pc);
        }
    }

    /// Forward a key to the emulated keyboard.
    pub fn press_key(&mut self, key: u8) {
        self.keys.push(key);
        self.status = format!("Key {:#04x} queued", key);
    }

    /// Reset CPU to initial state.
    pub fn reset(&mut self) {
        self.output.clear();
        self.cpu = Cpu::with_devices(Self::devices(&self.keys, &self.output));
        let _ = self.cpu.load_program(&self.program);
        self.running = false;
        self.status = "Reset. Ready.".into();
    }

    /// Get disassembly starting a few instructions before the PC.
    ///
    /// Instructions are variable length, so the listing walks forward
    /// from the start of memory and keeps the window around the PC.
    pub fn get_disassembly(&self, lines: usize) -> Vec<(usize, String, bool)> {
        let mem = self.cpu.mem.as_slice();
        let pc = self.cpu.regs.pc;

        let mut listing = Vec::new();
        let mut addr = 0;
        while addr < mem.len() {
            // Keep the walk aligned with the PC even if it jumped mid-way.
            if addr < pc && addr + disassemble_at(mem, addr).1 > pc {
                addr = pc;
            }
            let (text, len) = disassemble_at(mem, addr);
            listing.push((addr, text, addr == pc));
            addr += len;
        }

        let current = listing.iter().position(|(_, _, is_pc)| *is_pc).unwrap_or(0);
        let start = current.saturating_sub(lines / 2);
        listing.into_iter().skip(start).take(lines).collect()
    }
}

/// Run the debugger with a program.
pub fn run_debugger(program: Vec<u8>) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;
    use std::time::Duration;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    // Create app
    let mut app = DebuggerApp::new(program);

    // Main loop
    loop {
        // Draw
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        // Handle input
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if app.capture_keys {
                        match key.code {
                            KeyCode::Tab | KeyCode::Esc => {
                                app.capture_keys = false;
                                app.status = "Keyboard released.".into();
                            }
                            KeyCode::Enter => app.press_key(b'\n'),
                            KeyCode::Char(c) if c.is_ascii() => app.press_key(c as u8),
                            _ => {}
                        }
                    } else {
                        match key.code {
                            KeyCode::Char('q') => app.should_quit = true,
                            KeyCode::Char('s') => {
                                app.running = false;
                                app.step();
                            }
                            KeyCode::Char('r') => app.run(),
                            KeyCode::Char('p') => {
                                app.running = false;
                                app.status = "Paused.".into();
                            }
                            KeyCode::Char('b') => app.toggle_breakpoint(),
                            KeyCode::Char('x') => app.reset(),
                            KeyCode::Tab => {
                                app.capture_keys = true;
                                app.status = "Keyboard captured (Tab/Esc to release).".into();
                            }
                            KeyCode::Up => {
                                app.mem_scroll = app.mem_scroll.saturating_sub(1);
                            }
                            KeyCode::Down => {
                                if app.mem_scroll < 31 {
                                    app.mem_scroll += 1;
                                }
                            }
                            _ => {}
                        }
                    }
                }
            }
        }

        // Tick for continuous running
        if app.running {
            app.tick();
        }

        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LDI: u8 = 0b1000_0010;
    const PRN: u8 = 0b0100_0111;
    const HLT: u8 = 0b0000_0001;

    fn print8() -> Vec<u8> {
        vec![LDI, 0, 8, PRN, 0, HLT]
    }

    #[test]
    fn test_step_updates_status() {
        let mut app = DebuggerApp::new(print8());
        app.step();
        assert_eq!(app.status, "PC=00: LDI R0,8");
        assert_eq!(app.cpu.regs.pc, 3);
    }

    #[test]
    fn test_run_to_halt_captures_output() {
        let mut app = DebuggerApp::new(print8());
        app.run();
        app.tick();
        assert!(!app.running);
        assert!(app.cpu.is_halted());
        assert_eq!(app.output.contents(), "8\n");
    }

    #[test]
    fn test_breakpoint_stops_run() {
        let mut app = DebuggerApp::new(print8());
        app.step();
        app.toggle_breakpoint();
        assert!(app.breakpoints.contains(&3));
        app.reset();
        app.run();
        app.tick();
        assert!(!app.running);
        assert_eq!(app.cpu.regs.pc, 3);
        assert!(app.status.starts_with("Breakpoint"));
    }

    #[test]
    fn test_reset_clears_output() {
        let mut app = DebuggerApp::new(print8());
        app.run();
        app.tick();
        app.reset();
        assert_eq!(app.output.contents(), "");
        assert!(app.cpu.is_running());
        assert_eq!(app.cpu.mem.read(0).unwrap(), LDI);
    }

    #[test]
    fn test_disassembly_marks_pc() {
        let mut app = DebuggerApp::new(print8());
        app.step();
        let listing = app.get_disassembly(4);
        let current: Vec<_> = listing.iter().filter(|(_, _, pc)| *pc).collect();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].0, 3);
        assert_eq!(current[0].1, "PRN R0");
    }
}
