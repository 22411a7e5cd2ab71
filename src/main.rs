//! LS-8 Emulator - CLI Entry Point
//!
//! Commands:
//! - `ls8-emu run <program>` - Run a `.ls8` program until it halts
//! - `ls8-emu debug <program>` - Interactive debugger
//! - `ls8-emu disasm <program>` - Disassemble a program
//! - `ls8-emu test` - Built-in self-test

use std::io::Write;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ls8-emu")]
#[command(version = "0.1.0")]
#[command(about = "An emulator for the LS-8 8-bit computer")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it halts
    Run {
        /// Path to the .ls8 file to execute
        program: String,
        /// Stop after this many cycles
        #[arg(short, long)]
        max_cycles: Option<u64>,
        /// Print a TRACE line to stderr before every cycle
        #[arg(short, long)]
        trace: bool,
        /// Forward key presses to the emulated keyboard (raw terminal mode)
        #[cfg(feature = "tui")]
        #[arg(short, long)]
        keyboard: bool,
        /// Write the final machine state as JSON
        #[arg(long)]
        dump_state: Option<String>,
    },
    /// Interactive debugger
    #[cfg(feature = "tui")]
    Debug {
        /// Path to the .ls8 file to debug
        program: String,
    },
    /// Disassemble a program to readable text
    Disasm {
        /// Path to the .ls8 file
        program: String,
    },
    /// Run the built-in self-test
    Test,
}

fn main() {
    env_logger::builder()
        .format(|buf, record| {
            writeln!(buf, "{}: {}", record.level(), record.args())
        })
        .init();

    let cli = Cli::parse();

    match cli.command {
        #[cfg(feature = "tui")]
        Some(Commands::Run { program, max_cycles, trace, keyboard, dump_state }) => {
            run_program(&program, max_cycles, trace, keyboard, dump_state);
        }
        #[cfg(not(feature = "tui"))]
        Some(Commands::Run { program, max_cycles, trace, dump_state }) => {
            run_program(&program, max_cycles, trace, false, dump_state);
        }
        #[cfg(feature = "tui")]
        Some(Commands::Debug { program }) => {
            debug_program(&program);
        }
        Some(Commands::Disasm { program }) => {
            disassemble_file(&program);
        }
        Some(Commands::Test) => {
            run_self_test();
        }
        None => {
            println!("LS-8 Emulator v0.1.0");
            println!("An emulator for a small 8-bit computer");
            println!();
            println!("Use --help for available commands");
        }
    }
}

fn load_or_exit(path: &str) -> Vec<u8> {
    match ls8::load_program(path) {
        Ok(image) => {
            log::info!("loaded {} bytes from {}", image.len(), path);
            if image.is_empty() {
                eprintln!("❌ No instructions to execute");
                std::process::exit(1);
            }
            image.bytes
        }
        Err(e) => {
            eprintln!("❌ Was unable to load program: {}", e);
            std::process::exit(1);
        }
    }
}

fn run_program(path: &str, max_cycles: Option<u64>, trace: bool, keyboard: bool, dump_state: Option<String>) {
    use ls8::Cpu;
    use std::cell::Cell;
    use std::rc::Rc;

    let program = load_or_exit(path);

    let interrupted = Rc::new(Cell::new(false));
    #[cfg(feature = "tui")]
    let raw_mode = if keyboard {
        match ls8::tui::RawModeGuard::enable() {
            Ok(guard) => Some(guard),
            Err(e) => {
                eprintln!("❌ Failed to enable raw mode: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        None
    };

    #[cfg(feature = "tui")]
    let mut cpu = if keyboard {
        Cpu::with_devices(ls8::tui::keyboard_devices(Rc::clone(&interrupted)))
    } else {
        Cpu::new()
    };
    #[cfg(not(feature = "tui"))]
    let mut cpu = {
        let _ = keyboard;
        Cpu::new()
    };

    if let Err(e) = cpu.load_program(&program) {
        eprintln!("❌ Failed to load program: {}", e);
        std::process::exit(1);
    }

    let limit = max_cycles.unwrap_or(u64::MAX);
    let mut failure = None;
    while cpu.is_running() && cpu.cycles < limit && !interrupted.get() {
        if trace {
            eprintln!("{}", cpu.trace_line());
        }

        if let Err(e) = cpu.step() {
            failure = Some(e);
            break;
        }
    }

    // Leave raw mode before reporting anything.
    #[cfg(feature = "tui")]
    drop(raw_mode);

    if let Some(path) = dump_state {
        let json = serde_json::to_string_pretty(&cpu.snapshot())
            .unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e));
        if let Err(e) = std::fs::write(&path, json) {
            eprintln!("❌ Failed to write state to {}: {}", path, e);
        }
    }

    if let Some(e) = failure {
        eprintln!("❌ CPU error: {}", e);
        std::process::exit(1);
    }

    if interrupted.get() {
        eprintln!("Interrupted after {} cycles", cpu.cycles);
        std::process::exit(130);
    }

    if cpu.is_running() {
        eprintln!("⚠️  Reached max cycles limit ({}). Use --max-cycles to increase.", limit);
    }

    log::info!("halted after {} cycles", cpu.cycles);
}

#[cfg(feature = "tui")]
fn debug_program(path: &str) {
    use ls8::tui::run_debugger;

    let program = load_or_exit(path);

    if let Err(e) = run_debugger(program) {
        eprintln!("❌ Debugger error: {}", e);
        std::process::exit(1);
    }
}

fn disassemble_file(path: &str) {
    let program = load_or_exit(path);
    println!("{}", ls8::disassemble(&program));
}

fn run_self_test() {
    use ls8::cpu::devices::SharedOutput;
    use ls8::cpu::decode::decode;
    use ls8::{Cpu, Devices, Opcode};

    println!("━━━ LS-8 Emulator Self-Test ━━━");
    println!();

    let mut passed = 0;
    let mut failed = 0;

    let run = |program: &[u8]| -> (Cpu, SharedOutput) {
        let (devices, _keys, _clock, output) = Devices::scripted();
        let mut cpu = Cpu::with_devices(devices);
        let ok = cpu.load_program(program).is_ok() && cpu.run().is_ok();
        if !ok {
            cpu.state = ls8::CpuState::Error;
        }
        (cpu, output)
    };

    // Test 1: decoder flags
    print!("Opcode bit layout... ");
    let ok = Opcode::ALL.iter().all(|&op| {
        let d = decode(op.byte());
        d.map(|d| d.opcode == op && d.len() == 1 + (op.byte() >> 6) as usize).unwrap_or(false)
    });
    if ok { println!("✓"); passed += 1; }
    else { println!("✗"); failed += 1; }

    // Test 2: print8
    print!("LDI/PRN/HLT... ");
    let (cpu, out) = run(&[0b1000_0010, 0, 8, 0b0100_0111, 0, 0b0000_0001]);
    if cpu.is_halted() && out.contents() == "8\n" && cpu.regs.pc == 6 {
        println!("✓");
        passed += 1;
    } else {
        println!("✗ (got {:?})", out.contents());
        failed += 1;
    }

    // Test 3: 8-bit wraparound
    print!("ADD wraparound (255 + 1 = 0)... ");
    let (cpu, _) = run(&[
        0b1000_0010, 0, 255,
        0b1000_0010, 1, 1,
        0b1010_0000, 0, 1,
        0b0000_0001,
    ]);
    match cpu.regs.get(0) {
        Ok(0) => { println!("✓"); passed += 1; }
        other => { println!("✗ (got {:?})", other); failed += 1; }
    }

    // Test 4: stack balance
    print!("PUSH/POP balance... ");
    let (cpu, _) = run(&[
        0b1000_0010, 0, 42,
        0b0100_0101, 0,
        0b1000_0010, 0, 0,
        0b0100_0110, 0,
        0b0000_0001,
    ]);
    if cpu.regs.get(0) == Ok(42) && cpu.regs.sp() == 0xf4 {
        println!("✓");
        passed += 1;
    } else {
        println!("✗");
        failed += 1;
    }

    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Results: {} passed, {} failed", passed, failed);

    if failed == 0 {
        println!("✓ All tests passed!");
    } else {
        std::process::exit(1);
    }
}
