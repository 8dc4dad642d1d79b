//! SIC-1 execution engine.
//!
//! A three-state machine advanced one clock step at a time:
//!
//! ```text
//! HALT --run edge, PC <= 252--> READ_INST --> READ_DATA --run, next PC <= 252--> READ_INST
//!   ^                                            |
//!   +--------------- run low or next PC > 252 ---+
//! ```
//!
//! Memory reads have one step of latency, so every step issues the reads
//! the *next* state needs. READ_DATA writes the result back and prefetches
//! the following instruction in the same step.

use crate::cpu::decode::{self, AluOutput, Instruction};
use crate::cpu::io::IoUnit;
use crate::cpu::memory::{
    fetch_window, lane_of, select_lane, ByteMemory, ByteWrite, MemRequest, MemoryError, MAX_PC,
};
use crate::cpu::registers::{ExecState, Registers};
use serde::{Serialize, Deserialize};
use tracing::{debug, trace};

/// Levels of the control inputs for one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ControlLines {
    /// Run request (level; starting needs a rising edge).
    pub run: bool,
    /// Load PC from `input`.
    pub load_pc: bool,
    /// Write `input` to `mem[PC]` and advance PC (ignored while `run`).
    pub load_byte: bool,
    /// Live input byte.
    pub input: u8,
}

impl ControlLines {
    /// Nothing asserted.
    pub fn idle(input: u8) -> Self {
        Self { input, ..Self::default() }
    }

    /// Only `run` asserted.
    pub fn run(input: u8) -> Self {
        Self { run: true, input, ..Self::default() }
    }

    /// Only `load_pc` asserted, loading `addr`.
    pub fn load_pc(addr: u8) -> Self {
        Self { load_pc: true, input: addr, ..Self::default() }
    }

    /// Only `load_byte` asserted, writing `value`.
    pub fn load_byte(value: u8) -> Self {
        Self { load_byte: true, input: value, ..Self::default() }
    }
}

/// Selector of the debug readout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DebugSelect {
    /// Output latch.
    #[default]
    Output = 0,
    Pc = 1,
    /// Operand address A of the instruction at PC.
    OperandA = 2,
    /// Operand address B of the instruction at PC.
    OperandB = 3,
    /// Branch target C of the instruction at PC.
    Target = 4,
    /// Byte on view A.
    ValueA = 5,
    /// ALU result.
    Result = 6,
    State = 7,
}

impl DebugSelect {
    pub const ALL: [DebugSelect; 8] = [
        DebugSelect::Output,
        DebugSelect::Pc,
        DebugSelect::OperandA,
        DebugSelect::OperandB,
        DebugSelect::Target,
        DebugSelect::ValueA,
        DebugSelect::Result,
        DebugSelect::State,
    ];

    /// Decode the 3-bit select lines. Higher bits are ignored.
    pub fn from_bits(bits: u8) -> Self {
        Self::ALL[(bits & 7) as usize]
    }

    /// Short label for displays.
    pub fn name(self) -> &'static str {
        match self {
            DebugSelect::Output => "OUT",
            DebugSelect::Pc => "PC",
            DebugSelect::OperandA => "A",
            DebugSelect::OperandB => "B",
            DebugSelect::Target => "C",
            DebugSelect::ValueA => "MEM[A]",
            DebugSelect::Result => "RESULT",
            DebugSelect::State => "STATE",
        }
    }

    /// The next selector, wrapping around.
    pub fn next(self) -> Self {
        Self::from_bits(self as u8 + 1)
    }
}

/// Combinational values derived from the current views.
///
/// Which of these are meaningful depends on the state: the instruction in
/// READ_INST, the operands and result in READ_DATA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Datapath {
    /// Instruction window at PC.
    pub instruction: Instruction,
    /// Byte at the address that produced view A.
    pub value_a: u8,
    /// Byte of view B at the latched operand B lane.
    pub value_b: u8,
    pub alu: AluOutput,
}

/// Next register values and memory request computed for one step.
struct StepPlan {
    regs: Registers,
    request: MemRequest,
}

/// The SIC-1 core: engine registers, memory and output latch.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// Control registers.
    pub regs: Registers,
    /// Byte memory.
    pub mem: ByteMemory,
    /// Output latch.
    pub io: IoUnit,
    /// Clock steps since reset.
    pub cycles: u64,
    /// Instructions completed since reset.
    pub retired: u64,
}

impl Cpu {
    /// Create a halted CPU with zeroed memory.
    pub fn new() -> Self {
        let mut cpu = Self {
            regs: Registers::new(),
            mem: ByteMemory::new(),
            io: IoUnit::new(),
            cycles: 0,
            retired: 0,
        };
        cpu.latch_pc();
        cpu
    }

    /// Reset registers and the output latch. Memory is left untouched.
    ///
    /// The views are re-read at PC and PC + 4 while held in reset, so the
    /// first loader write merges into the word it lands in.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.io.reset();
        self.cycles = 0;
        self.retired = 0;
        self.latch_pc();
    }

    /// Issue the HALT reads for the current PC without a clock step.
    fn latch_pc(&mut self) {
        let pc = self.regs.pc;
        self.mem.clock(MemRequest {
            read_a: pc,
            read_b: pc.wrapping_add(4),
            write: None,
        });
    }

    /// Copy a program image to address 0, bypassing the loader.
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), MemoryError> {
        self.mem.load_program(0, program)
    }

    /// Current combinational datapath values.
    pub fn datapath(&self, input: u8) -> Datapath {
        let view_a = self.mem.view_a(input);
        let view_b = self.mem.view_b(input);

        let instruction =
            Instruction::from_bytes(fetch_window(lane_of(self.regs.pc), view_a.word, view_b.word));
        let value_a = view_a.byte();
        let value_b = select_lane(view_b.word, self.regs.lane_b);

        Datapath {
            instruction,
            value_a,
            value_b,
            alu: decode::subtract(value_a, value_b),
        }
    }

    /// Advance one clock step. Returns the new state.
    pub fn step(&mut self, lines: ControlLines) -> ExecState {
        let from = self.regs.state;
        let dp = self.datapath(lines.input);

        let StepPlan { mut regs, request } = match from {
            ExecState::Halt => self.plan_halt(&lines),
            ExecState::ReadInst => self.plan_read_inst(&dp),
            ExecState::ReadData => self.plan_read_data(&lines, &dp),
        };
        regs.run_prev = lines.run;

        // Commit everything at the clock edge.
        let write = self.io.observe(request.write);
        if self.io.strobe() {
            debug!(value = self.io.output(), "output strobe");
        }
        self.mem.clock(MemRequest { write, ..request });
        self.regs = regs;
        self.cycles += 1;
        if from == ExecState::ReadData {
            self.retired += 1;
        }

        trace!(
            cycle = self.cycles,
            ?from,
            to = ?self.regs.state,
            pc = self.regs.pc,
            read_a = request.read_a,
            read_b = request.read_b,
            "step"
        );

        self.regs.state
    }

    fn plan_halt(&self, lines: &ControlLines) -> StepPlan {
        let mut regs = self.regs.clone();
        let pc = regs.pc;

        let loading = lines.load_byte && !lines.run;
        let write = loading.then(|| ByteWrite {
            addr: pc,
            value: lines.input,
            prior: self.mem.raw_a(),
        });

        let next_pc = if lines.load_pc {
            lines.input
        } else if loading {
            pc.wrapping_add(1)
        } else {
            pc
        };

        if lines.run && !regs.run_prev && pc <= MAX_PC {
            debug!(pc, "run edge, starting");
            regs.state = ExecState::ReadInst;
        }
        regs.pc = next_pc;

        StepPlan {
            regs,
            request: MemRequest {
                read_a: next_pc,
                read_b: pc.wrapping_add(4),
                write,
            },
        }
    }

    fn plan_read_inst(&self, dp: &Datapath) -> StepPlan {
        let ins = dp.instruction;
        let mut regs = self.regs.clone();
        regs.reg_c = ins.c;
        regs.operand_a = ins.a;
        regs.lane_b = lane_of(ins.b);
        regs.state = ExecState::ReadData;

        StepPlan {
            regs,
            request: MemRequest {
                read_a: ins.a,
                read_b: ins.b,
                write: None,
            },
        }
    }

    fn plan_read_data(&self, lines: &ControlLines, dp: &Datapath) -> StepPlan {
        let mut regs = self.regs.clone();
        let target = if dp.alu.leq {
            regs.reg_c
        } else {
            regs.fall_through()
        };

        // operand_a was read on view A during READ_INST, so raw_a holds its word.
        let write = ByteWrite {
            addr: regs.operand_a,
            value: dp.alu.result,
            prior: self.mem.raw_a(),
        };

        if !lines.run || target > MAX_PC {
            debug!(pc = regs.pc, target, run = lines.run, "halted");
            regs.state = ExecState::Halt;
        } else {
            regs.pc = target;
            regs.state = ExecState::ReadInst;
        }

        StepPlan {
            regs,
            request: MemRequest {
                read_a: target,
                read_b: target.wrapping_add(4),
                write: Some(write),
            },
        }
    }

    /// The value the debug multiplexer shows for `select`.
    pub fn debug_read(&self, select: DebugSelect, input: u8) -> u8 {
        let dp = self.datapath(input);
        match select {
            DebugSelect::Output => self.io.output(),
            DebugSelect::Pc => self.regs.pc,
            DebugSelect::OperandA => dp.instruction.a,
            DebugSelect::OperandB => dp.instruction.b,
            DebugSelect::Target => dp.instruction.c,
            DebugSelect::ValueA => dp.value_a,
            DebugSelect::Result => dp.alu.result,
            DebugSelect::State => self.regs.state.code(),
        }
    }

    /// Current state.
    pub fn state(&self) -> ExecState {
        self.regs.state
    }

    /// Check if the CPU is halted.
    pub fn is_halted(&self) -> bool {
        self.regs.is_halted()
    }

    /// Check if an instruction is in flight.
    pub fn is_running(&self) -> bool {
        !self.is_halted()
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("regs", &self.regs)
            .field("io", &self.io)
            .field("cycles", &self.cycles)
            .field("retired", &self.retired)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::memory::{ADDR_IN, ADDR_OUT};

    /// Load bytes through the control lines, as the host loader does.
    fn load(cpu: &mut Cpu, addr: u8, bytes: &[u8]) {
        cpu.step(ControlLines::load_pc(addr));
        for &b in bytes {
            cpu.step(ControlLines::load_byte(b));
        }
    }

    #[test]
    fn test_single_instruction_end_to_end() {
        let mut cpu = Cpu::new();
        cpu.mem.poke(5, 10);
        cpu.mem.poke(3, 4);

        for b in [5, 3, 0] {
            cpu.step(ControlLines::load_byte(b));
        }
        assert_eq!(cpu.regs.pc, 3);
        assert_eq!(cpu.mem.bytes()[..6], [5u8, 3, 0, 4, 0, 10]);

        cpu.step(ControlLines::load_pc(0));
        assert_eq!(cpu.step(ControlLines::run(0)), ExecState::ReadInst);
        assert_eq!(cpu.step(ControlLines::run(0)), ExecState::ReadData);
        assert_eq!(cpu.datapath(0).alu, AluOutput { result: 6, leq: false });

        assert_eq!(cpu.step(ControlLines::run(0)), ExecState::ReadInst);
        assert_eq!(cpu.mem.peek(5), 6);
        assert_eq!(cpu.regs.pc, 3);
        assert_eq!(cpu.retired, 1);
    }

    #[test]
    fn test_first_loader_write_after_reset_keeps_word() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[0, 0xaa, 0xbb, 0xcc]).unwrap();
        cpu.step(ControlLines::load_pc(40));
        cpu.step(ControlLines::idle(0));

        cpu.reset();
        cpu.step(ControlLines::load_byte(7));
        assert_eq!(cpu.mem.bytes()[..4], [7u8, 0xaa, 0xbb, 0xcc]);
        assert_eq!(cpu.regs.pc, 1);
    }

    #[test]
    fn test_poke_refreshes_latched_view() {
        let mut cpu = Cpu::new();
        cpu.mem.poke(2, 0x55);
        assert_eq!(cpu.debug_read(DebugSelect::ValueA, 0), 0);

        cpu.step(ControlLines::load_byte(0x11));
        assert_eq!(cpu.mem.bytes()[..4], [0x11u8, 0, 0x55, 0]);
    }

    #[test]
    fn test_instruction_straddling_words() {
        let mut cpu = Cpu::new();
        // subleq 20, 21, 0 at address 2 (bytes 2..4 span words 0 and 1).
        cpu.load_program(&[0, 0, 20, 21, 0]).unwrap();
        cpu.mem.poke(20, 9);
        cpu.mem.poke(21, 9);

        cpu.step(ControlLines::load_pc(2));
        cpu.step(ControlLines::run(0));
        assert_eq!(cpu.datapath(0).instruction, Instruction::new(20, 21, 0));
        assert_eq!(cpu.regs.reg_c, 0);
        cpu.step(ControlLines::run(0));
        cpu.step(ControlLines::run(0));

        assert_eq!(cpu.mem.peek(20), 0);
        assert_eq!(cpu.regs.pc, 0);
    }

    #[test]
    fn test_run_needs_rising_edge() {
        let mut cpu = Cpu::new();
        // subleq 10, 10, @HALT: result 0, branch to 255, halts.
        cpu.load_program(&[10, 10, 255]).unwrap();

        assert_eq!(cpu.step(ControlLines::run(0)), ExecState::ReadInst);
        cpu.step(ControlLines::run(0));
        assert_eq!(cpu.step(ControlLines::run(0)), ExecState::Halt);

        // Run still high: no edge, no restart.
        for _ in 0..5 {
            assert_eq!(cpu.step(ControlLines::run(0)), ExecState::Halt);
        }

        cpu.step(ControlLines::idle(0));
        assert_eq!(cpu.step(ControlLines::run(0)), ExecState::ReadInst);
    }

    #[test]
    fn test_branch_past_last_pc_halts_and_keeps_pc() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[0, 0, 0, 10, 10, 253]).unwrap();
        cpu.step(ControlLines::load_pc(3));
        cpu.step(ControlLines::idle(0));

        let mut state = cpu.step(ControlLines::run(0));
        while state != ExecState::Halt {
            state = cpu.step(ControlLines::run(0));
        }
        assert_eq!(cpu.regs.pc, 3);
        assert_eq!(cpu.retired, 1);
    }

    #[test]
    fn test_pc_above_252_never_starts() {
        let mut cpu = Cpu::new();
        cpu.step(ControlLines::load_pc(253));
        assert_eq!(cpu.regs.pc, 253);

        for _ in 0..3 {
            cpu.step(ControlLines::idle(0));
            assert_eq!(cpu.step(ControlLines::run(0)), ExecState::Halt);
        }
        assert_eq!(cpu.regs.pc, 253);
    }

    #[test]
    fn test_loop_runs_until_run_drops_and_finishes_instruction() {
        let mut cpu = Cpu::new();
        // 0: subleq 20, 21, 3   ; mem[20] -= 1, next is 3 either way
        // 3: subleq 22, 22, 0   ; always branches back to 0
        cpu.load_program(&[20, 21, 3, 22, 22, 0]).unwrap();
        cpu.mem.poke(21, 1);

        for _ in 0..100 {
            cpu.step(ControlLines::run(0));
        }
        assert!(cpu.is_running());
        assert_eq!(cpu.retired, 49);

        while cpu.state() != ExecState::ReadInst {
            cpu.step(ControlLines::run(0));
        }
        assert_eq!(cpu.retired, 50);
        assert_eq!(cpu.regs.pc, 0);
        let before = cpu.mem.peek(20);

        // Drop run partway: the instruction in flight still completes.
        assert_eq!(cpu.step(ControlLines::idle(0)), ExecState::ReadData);
        assert_eq!(cpu.step(ControlLines::idle(0)), ExecState::Halt);
        assert_eq!(cpu.retired, 51);
        assert_eq!(cpu.mem.peek(20), before.wrapping_sub(1));
        assert_eq!(cpu.regs.pc, 0);
    }

    #[test]
    fn test_output_write_strobes_and_is_not_stored() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[ADDR_OUT, ADDR_IN, 0x10]).unwrap();

        cpu.step(ControlLines::run(15));
        cpu.step(ControlLines::idle(15));
        assert!(!cpu.io.strobe());
        cpu.step(ControlLines::idle(15));
        assert!(cpu.io.strobe());
        assert_eq!(cpu.io.output() as i8, -15);
        assert_eq!(cpu.debug_read(DebugSelect::Output, 15) as i8, -15);

        cpu.step(ControlLines::idle(15));
        assert!(!cpu.io.strobe());
        assert_eq!(cpu.io.output() as i8, -15);
        assert_eq!(cpu.mem.peek(ADDR_OUT), 0);
    }

    #[test]
    fn test_loaded_bytes_read_back_through_debug_port() {
        let mut cpu = Cpu::new();
        cpu.step(ControlLines::idle(0));
        load(&mut cpu, 0x3e, &[0xaa, 0xbb, 0xcc, 0xdd]);

        for (addr, want) in [(0x3e, 0xaa), (0x3f, 0xbb), (0x40, 0xcc), (0x41, 0xdd)] {
            cpu.step(ControlLines::load_pc(addr));
            assert_eq!(cpu.debug_read(DebugSelect::ValueA, 0), want);
        }
    }

    #[test]
    fn test_loader_is_ignored_while_running() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[10, 10, 255]).unwrap();
        let lines = ControlLines {
            run: true,
            load_byte: true,
            input: 0x77,
            ..ControlLines::default()
        };
        cpu.step(lines);
        assert_eq!(cpu.mem.peek(0), 10);
        assert_eq!(cpu.regs.pc, 0);
    }

    #[test]
    fn test_debug_interface_sequence() {
        let mut cpu = Cpu::new();
        cpu.step(ControlLines::idle(0));
        for (addr, value) in [(0x10, 0x25), (0x11, 0x26), (0x12, 0x13), (0x13, 0x25), (0x25, 0x42), (0x26, 0x47)] {
            load(&mut cpu, addr, &[value]);
        }
        cpu.step(ControlLines::load_pc(0x10));
        assert_eq!(cpu.debug_read(DebugSelect::Pc, 0), 0x10);
        assert_eq!(cpu.debug_read(DebugSelect::State, 0), 0);

        cpu.step(ControlLines::run(0));
        assert_eq!(cpu.debug_read(DebugSelect::State, 0), 1);
        assert_eq!(cpu.debug_read(DebugSelect::OperandA, 0), 0x25);
        assert_eq!(cpu.debug_read(DebugSelect::OperandB, 0), 0x26);
        assert_eq!(cpu.debug_read(DebugSelect::Target, 0), 0x13);

        cpu.step(ControlLines::run(0));
        assert_eq!(cpu.debug_read(DebugSelect::State, 0), 2);
        assert_eq!(cpu.debug_read(DebugSelect::ValueA, 0), 0x42);
        assert_eq!(cpu.debug_read(DebugSelect::Result, 0) as i8, 0x42 - 0x47);

        cpu.step(ControlLines::idle(0));
        assert_eq!(cpu.debug_read(DebugSelect::State, 0), 0);

        cpu.step(ControlLines::run(0));
        cpu.step(ControlLines::run(0));
        assert_eq!(cpu.debug_read(DebugSelect::State, 0), 2);
        assert_eq!(cpu.debug_read(DebugSelect::ValueA, 0) as i8, 0x42 - 0x47);
    }

    #[test]
    fn test_reset_is_idempotent_and_keeps_memory() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[ADDR_OUT, ADDR_IN, 0]).unwrap();
        for _ in 0..10 {
            cpu.step(ControlLines::run(3));
        }
        let memory = cpu.mem.bytes();

        for _ in 0..3 {
            cpu.reset();
            assert_eq!(cpu.regs, Registers::new());
            assert_eq!(cpu.io, IoUnit::new());
            assert_eq!(cpu.mem.bytes(), memory);
        }
    }

    #[test]
    fn test_snapshot_with_bad_state_code_heals() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[1, 2, 3]).unwrap();
        cpu.step(ControlLines::run(0));

        let mut json = serde_json::to_value(&cpu).unwrap();
        assert_eq!(json["regs"]["state"], 1);
        json["regs"]["state"] = serde_json::json!(5);

        let restored: Cpu = serde_json::from_value(json).unwrap();
        assert_eq!(restored.state(), ExecState::Halt);
        assert_eq!(restored.mem.bytes(), cpu.mem.bytes());
    }

    #[test]
    fn test_debug_select_bits() {
        assert_eq!(DebugSelect::from_bits(0), DebugSelect::Output);
        assert_eq!(DebugSelect::from_bits(7), DebugSelect::State);
        assert_eq!(DebugSelect::from_bits(0b1010), DebugSelect::OperandA);
        assert_eq!(DebugSelect::State.next(), DebugSelect::Output);
    }
}
