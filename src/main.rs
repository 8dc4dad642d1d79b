//! SIC-1 Emulator - CLI Entry Point
//!
//! Commands:
//! - `sic1-emu run <program>` - Run a hex image or assembly file
//! - `sic1-emu debug <program>` - Interactive debugger
//! - `sic1-emu asm <source>` - Assemble to a hex image
//! - `sic1-emu disasm <program>` - Disassemble an image
//! - `sic1-emu test` - Built-in self-test

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::Path;
use tracing_subscriber::EnvFilter;

use sic1::{assemble, disassemble, load_image, save_image, DebugSelect, Host, HostConfig, ProgramImage};

const HELLO_SOURCE: &str = include_str!("../demos/hello.sic1");
const HELLO_IMAGE: &str = include_str!("../demos/hello.hex");
const COUNT_IMAGE: &str = include_str!("../demos/count_7segment.hex");

#[derive(Parser)]
#[command(name = "sic1-emu")]
#[command(author = "Yigit")]
#[command(version = "0.1.0")]
#[command(about = "A cycle-accurate emulator of the SIC-1 subleq computer")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it halts
    Run {
        /// Path to the hex image or .sic1/.asm source to execute
        program: String,
        /// Maximum number of clock steps (default: 10000)
        #[arg(short, long)]
        max_cycles: Option<u64>,
        /// Byte presented on the INPUT port
        #[arg(short, long)]
        input: Option<u8>,
        /// JSON configuration file
        #[arg(short, long)]
        config: Option<String>,
        /// Trace every clock step
        #[arg(short, long)]
        trace: bool,
        /// Print the final machine state as JSON
        #[arg(long)]
        dump_state: bool,
    },
    /// Interactive debugger
    Debug {
        /// Path to the hex image or source to debug
        program: String,
        /// JSON configuration file
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Assemble source to a hex image
    Asm {
        /// Path to the source file
        source: String,
        /// Output image file
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Disassemble an image to readable text
    Disasm {
        /// Path to the hex image or source
        program: String,
    },
    /// Run the built-in self-test
    Test,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run { program, max_cycles, input, config, trace, dump_state }) => {
            let mut cfg = load_config(config.as_deref())?;
            if let Some(limit) = max_cycles {
                cfg.cycle_limit = limit;
            }
            if let Some(value) = input {
                cfg.input = value;
            }
            cfg.trace |= trace;
            init_tracing(cfg.trace);
            run_program(&program, cfg, dump_state)
        }
        Some(Commands::Debug { program, config }) => {
            let cfg = load_config(config.as_deref())?;
            debug_program(&program, cfg)
        }
        Some(Commands::Asm { source, output }) => {
            init_tracing(false);
            assemble_file(&source, output)
        }
        Some(Commands::Disasm { program }) => {
            init_tracing(false);
            disassemble_file(&program)
        }
        Some(Commands::Test) => {
            init_tracing(false);
            run_self_test()
        }
        None => {
            println!("SIC-1 Emulator v0.1.0");
            println!("A single-instruction subleq computer");
            println!();
            println!("Use --help for available commands");
            println!();
            demo_hello()
        }
    }
}

/// Install the log subscriber. `RUST_LOG` picks the filter unless a full
/// trace is forced.
fn init_tracing(force_trace: bool) {
    let filter = if force_trace {
        EnvFilter::new("trace")
    } else {
        EnvFilter::from_default_env()
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&str>) -> Result<HostConfig> {
    match path {
        Some(path) => HostConfig::load(path).with_context(|| format!("failed to load config {}", path)),
        None => Ok(HostConfig::default()),
    }
}

/// Load a program: `.sic1`/`.asm` files are assembled, anything else is
/// read as a hex image.
fn load_program(path: &str) -> Result<Vec<u8>> {
    let is_source = matches!(
        Path::new(path).extension().and_then(|e| e.to_str()),
        Some("sic1" | "asm")
    );

    if is_source {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path))?;
        let bytes = assemble(&source).with_context(|| format!("failed to assemble {}", path))?;
        println!("📝 Assembled {} bytes", bytes.len());
        Ok(bytes)
    } else {
        let image = load_image(path).with_context(|| format!("failed to load image {}", path))?;
        println!("📂 Loaded {} bytes", image.len());
        Ok(image.bytes)
    }
}

fn run_program(path: &str, config: HostConfig, dump_state: bool) -> Result<()> {
    println!("🔧 Running: {}", path);
    let bytes = load_program(path)?;

    let select = config.debug_select();
    let limit = config.cycle_limit;
    let mut host = Host::new(config);
    host.load_image(&bytes)?;

    println!();
    println!("━━━ Execution ━━━");
    let outcome = host.run(limit);

    println!();
    println!("━━━ Result ━━━");
    println!("Cycles:       {}", outcome.cycles);
    println!("Instructions: {}", host.cpu.retired);
    println!("State:        {:?}", host.cpu.state());
    println!("PC:           {}", host.cpu.regs.pc);
    println!("{:<13} {:#04x}", format!("{}:", select.name()), host.debug_read(select));

    let outputs = host.outputs();
    if !outputs.is_empty() {
        println!();
        println!("Output ({} bytes): {}", outputs.len(), hex_line(outputs));
        println!("Output text: {:?}", host.output_text());
    }

    if dump_state {
        println!();
        println!("{}", serde_json::to_string_pretty(&host.cpu)?);
    }

    if !outcome.halted {
        println!();
        println!("⚠️  Reached max cycles limit ({}). Use --max-cycles to increase.", limit);
    }

    Ok(())
}

#[cfg(feature = "tui")]
fn debug_program(path: &str, config: HostConfig) -> Result<()> {
    use sic1::run_debugger;

    println!("🔍 Loading: {}", path);
    let bytes = load_program(path)?;

    println!("🚀 Launching debugger...");
    run_debugger(bytes, config).context("debugger failed")?;
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn debug_program(_path: &str, _config: HostConfig) -> Result<()> {
    anyhow::bail!("this build has no debugger; rebuild with the `tui` feature")
}

fn assemble_file(source_path: &str, output: Option<String>) -> Result<()> {
    let out_path = output.unwrap_or_else(|| {
        Path::new(source_path).with_extension("hex").to_string_lossy().into_owned()
    });

    println!("📝 Assembling: {} → {}", source_path, out_path);

    let source = std::fs::read_to_string(source_path)
        .with_context(|| format!("failed to read {}", source_path))?;
    let bytes = assemble(&source)?;
    println!("✓ Assembled {} bytes", bytes.len());

    save_image(&out_path, &ProgramImage::new(bytes)?)?;
    println!("✓ Saved to {}", out_path);
    Ok(())
}

fn disassemble_file(path: &str) -> Result<()> {
    println!("📖 Disassembling: {}", path);
    println!();

    let bytes = load_program(path)?;
    println!("{}", disassemble(&bytes, 0));
    Ok(())
}

fn hex_line(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect::<Vec<_>>().join(" ")
}

fn demo_hello() -> Result<()> {
    let image = sic1::asm::parse_image(HELLO_IMAGE)?;
    let mut host = Host::default();
    host.load_image(&image.bytes)?;
    let outcome = host.run_to_halt();

    println!("━━━ Demo: hello ━━━");
    println!("  {}", host.output_text());
    println!("  {} clock steps, {} instructions", outcome.cycles, host.cpu.retired);
    Ok(())
}

fn report(name: &str, ok: bool, passed: &mut u32, failed: &mut u32) {
    if ok {
        println!("{}... ✓", name);
        *passed += 1;
    } else {
        println!("{}... ✗", name);
        *failed += 1;
    }
}

fn run_self_test() -> Result<()> {
    use sic1::cpu::decode::{leq, subtract};

    println!("━━━ SIC-1 Emulator Self-Test ━━━");
    println!();

    let mut passed = 0;
    let mut failed = 0;

    // Test 1: subtract wraps and branch condition follows the sign bit
    let ok = (0..=255u8).all(|a| {
        (0..=255u8).step_by(17).all(|b| {
            let r = a.wrapping_sub(b);
            subtract(a, b).result == r && leq(a, b) == (r == 0 || r >= 0x80)
        })
    });
    report("Subtract and branch condition", ok, &mut passed, &mut failed);

    // Test 2: negate the input
    let mut host = Host::default();
    host.write_bytes(0, &[0xfe, 0xfd, 0x10]);
    host.set_pc(0);
    host.input = 15;
    host.step_instruction();
    report(
        "OUT <- -IN",
        host.debug_read(DebugSelect::Output) as i8 == -15,
        &mut passed,
        &mut failed,
    );

    // Test 3: loader round trip
    let mut host = Host::default();
    let data: Vec<u8> = (0..=252u8).map(|i| i.wrapping_mul(73).wrapping_add(41)).collect();
    host.write_bytes(0, &data);
    let ok = (0..=252u8).all(|addr| {
        host.set_pc(addr);
        host.debug_read(DebugSelect::ValueA) == data[addr as usize]
    });
    report("Loader write and read back", ok, &mut passed, &mut failed);

    // Test 4: assembler reproduces the reference image
    let image = sic1::asm::parse_image(HELLO_IMAGE)?;
    report(
        "Assemble hello",
        assemble(HELLO_SOURCE).ok().as_deref() == Some(image.bytes.as_slice()),
        &mut passed,
        &mut failed,
    );

    // Test 5: print a string
    let mut host = Host::default();
    host.load_image(&image.bytes)?;
    let outcome = host.run_to_halt();
    report(
        "Print \"Hello, Tiny Tapeout!\"",
        outcome.halted && host.output_text() == "Hello, Tiny Tapeout!",
        &mut passed,
        &mut failed,
    );

    // Test 6: seven-segment counter keeps running
    let count = sic1::asm::parse_image(COUNT_IMAGE)?;
    let mut host = Host::default();
    host.load_image(&count.bytes)?;
    let outcome = host.run(500);
    let ok = !outcome.halted && host.outputs().starts_with(&[0x3f, 0x06, 0x5b, 0x4f]);
    report("Seven-segment counter", ok, &mut passed, &mut failed);

    // Test 7: PC past the last instruction slot never starts
    let mut host = Host::default();
    host.set_pc(255);
    let outcome = host.run(50);
    report(
        "Run from PC 255 is refused",
        outcome.halted && host.cpu.retired == 0,
        &mut passed,
        &mut failed,
    );

    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Results: {} passed, {} failed", passed, failed);

    if failed == 0 {
        println!("✓ All tests passed!");
        Ok(())
    } else {
        anyhow::bail!("{} self-test(s) failed", failed)
    }
}
