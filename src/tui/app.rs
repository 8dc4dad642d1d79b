//! Debugger application state and logic.

use crate::asm::disasm::disassemble_instruction;
use crate::cpu::{ControlLines, DebugSelect, ExecState};
use crate::cpu::memory::MAX_PC;
use crate::{Host, HostConfig};
use std::collections::HashSet;

/// Clock steps an instruction can take from any state.
const MAX_STEPS_PER_INSTRUCTION: usize = 4;

/// Rows of sixteen bytes in the memory view.
pub const MEMORY_ROWS: usize = 16;

/// Debugger application state.
pub struct DebuggerApp {
    /// The host driving the core.
    pub host: Host,
    /// Original image, reloaded on reset.
    pub program: Vec<u8>,
    /// Breakpoints (by PC).
    pub breakpoints: HashSet<u8>,
    /// Is the debugger running continuously?
    pub running: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
    /// Memory view scroll offset, in rows.
    pub mem_scroll: usize,
    /// Signal shown on the debug readout.
    pub debug_select: DebugSelect,
}

impl DebuggerApp {
    /// Create a new debugger with a loaded program.
    pub fn new(program: Vec<u8>, config: HostConfig) -> Self {
        let debug_select = config.debug_select();
        let mut app = Self {
            host: Host::new(config),
            program,
            breakpoints: HashSet::new(),
            running: false,
            should_quit: false,
            status: String::new(),
            mem_scroll: 0,
            debug_select,
        };
        app.reload();
        app.status = "Ready. Press 'n' to step, 'r' to run, 'q' to quit.".into();
        app
    }

    fn reload(&mut self) {
        if let Err(e) = self.host.load_image(&self.program) {
            self.status = format!("Error: {}", e);
        }
    }

    fn pc(&self) -> u8 {
        self.host.cpu.regs.pc
    }

    /// Advance a single clock step with `run` held.
    ///
    /// After a halt `run` is released for one step first, so the next press
    /// produces a fresh rising edge.
    pub fn clock_step(&mut self) {
        let cpu = &self.host.cpu;
        let lines = if cpu.is_halted() && cpu.regs.run_prev {
            ControlLines::idle(self.host.input)
        } else {
            ControlLines::run(self.host.input)
        };

        let state = self.host.clock(lines);
        self.status = format!(
            "Cycle {}: {:?} PC={:03}{}",
            self.host.cpu.cycles,
            state,
            self.pc(),
            if lines.run { "" } else { " (run released)" }
        );
    }

    /// Clock until one instruction completes or the core halts.
    pub fn step_instruction(&mut self) {
        let pc = self.pc();
        let retired = self.host.cpu.retired;

        if self.host.cpu.is_halted() && self.host.cpu.regs.run_prev {
            self.host.idle();
        }

        for _ in 0..MAX_STEPS_PER_INSTRUCTION {
            self.host.clock(ControlLines::run(self.host.input));
            if self.host.cpu.retired != retired || self.host.cpu.is_halted() {
                break;
            }
        }

        if self.host.cpu.retired == retired {
            self.running = false;
            self.status = if pc > MAX_PC {
                format!("PC={:03} is past the last instruction slot", pc)
            } else {
                format!("Halted at PC={:03}", pc)
            };
            return;
        }

        let bytes = [
            self.host.cpu.mem.peek(pc),
            self.host.cpu.mem.peek(pc.wrapping_add(1)),
            self.host.cpu.mem.peek(pc.wrapping_add(2)),
        ];
        self.status = format!("PC={:03}: {}", pc, disassemble_instruction(bytes));
    }

    /// Run until halt or breakpoint.
    pub fn run(&mut self) {
        self.running = true;
        self.status = "Running...".into();
    }

    /// Run one iteration of continuous execution.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }

        self.step_instruction();

        if self.host.cpu.is_halted() {
            self.running = false;
            self.status = format!(
                "Halted after {} cycles, {} instructions",
                self.host.cpu.cycles, self.host.cpu.retired
            );
            return;
        }

        // Check for breakpoint
        let pc = self.pc();
        if self.breakpoints.contains(&pc) {
            self.running = false;
            self.status = format!("Breakpoint at PC={:03}", pc);
        }
    }

    /// Toggle breakpoint at current PC.
    pub fn toggle_breakpoint(&mut self) {
        let pc = self.pc();
        if self.breakpoints.remove(&pc) {
            self.status = format!("Removed breakpoint at PC={:03}", pc);
        } else {
            self.breakpoints.insert(pc);
            self.status = format!("Set breakpoint at PC={:03}", pc);
        }
    }

    /// Reset the core and reload the program.
    pub fn reset(&mut self) {
        self.host.reset();
        self.reload();
        self.running = false;
        self.status = "Reset. Ready.".into();
    }

    /// Forget the output collected so far.
    pub fn clear_output(&mut self) {
        self.host.clear_outputs();
        self.status = "Output cleared.".into();
    }

    /// Change the byte on the INPUT port.
    pub fn adjust_input(&mut self, delta: i8) {
        self.host.input = self.host.input.wrapping_add_signed(delta);
        self.status = format!("Input = {} ({:#04x})", self.host.input, self.host.input);
    }

    /// Show the next debug signal.
    pub fn cycle_debug_select(&mut self) {
        self.debug_select = self.debug_select.next();
        self.status = format!("Debug readout: {}", self.debug_select.name());
    }

    /// Current debug readout value.
    pub fn debug_value(&self) -> u8 {
        self.host.debug_read(self.debug_select)
    }

    /// Is an instruction in flight?
    pub fn in_flight(&self) -> bool {
        self.host.cpu.state() != ExecState::Halt
    }

    /// Get disassembly around current PC, three bytes per line.
    pub fn get_disassembly(&self, lines: usize) -> Vec<(u8, String, bool)> {
        let pc = self.pc() as usize;
        let back = (lines / 2) * 3;
        let start = pc.saturating_sub(back);

        (0..lines)
            .map(|i| start + i * 3)
            .take_while(|&addr| addr + 2 <= 0xff)
            .map(|addr| {
                let mem = &self.host.cpu.mem;
                let bytes = [mem.peek(addr as u8), mem.peek(addr as u8 + 1), mem.peek(addr as u8 + 2)];
                (addr as u8, disassemble_instruction(bytes), addr == pc)
            })
            .collect()
    }

    /// Scroll the memory view.
    pub fn scroll(&mut self, down: bool) {
        if down {
            self.mem_scroll = (self.mem_scroll + 1).min(MEMORY_ROWS - 1);
        } else {
            self.mem_scroll = self.mem_scroll.saturating_sub(1);
        }
    }
}

/// Run the debugger with a program.
pub fn run_debugger(program: Vec<u8>, config: HostConfig) -> std::io::Result<()> {
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

    let mut app = DebuggerApp::new(program, config);

    loop {
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => app.should_quit = true,
                        KeyCode::Char('s') => {
                            app.running = false;
                            app.clock_step();
                        }
                        KeyCode::Char('n') => {
                            app.running = false;
                            app.step_instruction();
                        }
                        KeyCode::Char('r') => app.run(),
                        KeyCode::Char('p') => {
                            app.running = false;
                            app.status = "Paused.".into();
                        }
                        KeyCode::Char('b') => app.toggle_breakpoint(),
                        KeyCode::Char('x') => app.reset(),
                        KeyCode::Char('c') => app.clear_output(),
                        KeyCode::Char('d') => app.cycle_debug_select(),
                        KeyCode::Char('+') | KeyCode::Char('=') => app.adjust_input(1),
                        KeyCode::Char('-') => app.adjust_input(-1),
                        KeyCode::Up => app.scroll(false),
                        KeyCode::Down => app.scroll(true),
                        _ => {}
                    }
                }
            }
        }

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

    fn app(program: &[u8]) -> DebuggerApp {
        DebuggerApp::new(program.to_vec(), HostConfig::default())
    }

    #[test]
    fn test_step_instruction_advances_pc() {
        // subleq 6, 7, 3 ; subleq 6, 6, 255
        let mut app = app(&[6, 7, 3, 6, 6, 255, 5, 3]);

        app.step_instruction();
        assert_eq!(app.host.cpu.retired, 1);
        assert_eq!(app.host.cpu.regs.pc, 3);
        assert_eq!(app.host.cpu.mem.peek(6), 2);
        assert!(app.in_flight());

        app.step_instruction();
        assert_eq!(app.host.cpu.retired, 2);
        assert!(app.host.cpu.is_halted());
    }

    #[test]
    fn test_run_stops_at_breakpoint() {
        let mut app = app(&[6, 7, 3, 6, 6, 255, 5, 3]);
        app.toggle_breakpoint();
        assert!(app.breakpoints.contains(&0));
        app.toggle_breakpoint();
        assert!(app.breakpoints.is_empty());
        app.breakpoints.insert(3);

        app.run();
        app.tick();
        assert!(!app.running);
        assert_eq!(app.host.cpu.regs.pc, 3);
        assert!(app.status.contains("Breakpoint"));

        app.run();
        app.tick();
        assert!(!app.running);
        assert!(app.status.contains("Halted"));
    }

    #[test]
    fn test_clock_step_walks_states() {
        let mut app = app(&[6, 7, 3, 6, 6, 255, 5, 3]);

        app.clock_step();
        assert_eq!(app.host.cpu.state(), ExecState::ReadInst);
        app.clock_step();
        assert_eq!(app.host.cpu.state(), ExecState::ReadData);
        app.clock_step();
        assert_eq!(app.host.cpu.state(), ExecState::ReadInst);
        assert_eq!(app.host.cpu.retired, 1);
    }

    #[test]
    fn test_reset_reloads_program() {
        let mut app = app(&[6, 7, 3, 6, 6, 255, 5, 3]);
        app.step_instruction();
        app.step_instruction();
        assert_eq!(app.host.cpu.mem.peek(6), 0);

        app.reset();
        assert_eq!(app.host.cpu.mem.peek(6), 5);
        assert_eq!(app.host.cpu.regs.pc, 0);
        assert!(!app.in_flight());
    }

    #[test]
    fn test_input_and_debug_select() {
        let mut app = app(&[254, 253, 255]);
        app.adjust_input(-1);
        assert_eq!(app.host.input, 0xff);
        app.adjust_input(2);
        assert_eq!(app.host.input, 1);

        app.step_instruction();
        assert_eq!(app.debug_select, DebugSelect::Output);
        assert_eq!(app.debug_value(), 0xff);

        app.cycle_debug_select();
        assert_eq!(app.debug_select, DebugSelect::Pc);
    }

    #[test]
    fn test_clear_output_keeps_latch() {
        let mut app = app(&[254, 253, 255]);
        app.adjust_input(1);
        app.step_instruction();
        assert_eq!(app.host.outputs(), &[0xff]);

        app.clear_output();
        assert!(app.host.outputs().is_empty());
        assert_eq!(app.debug_value(), 0xff);
    }

    #[test]
    fn test_disassembly_marks_pc() {
        let app = app(&[254, 253, 255]);
        let lines = app.get_disassembly(4);
        assert_eq!(lines[0], (0, "subleq @OUT, @IN, @HALT".to_string(), true));
        assert_eq!(lines.len(), 4);
    }
}
