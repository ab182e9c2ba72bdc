//! Simulating and execution for MIPS assembly.
//!
//! This module is focused on executing fully assembled code (i.e., [`Program`]).
//!
//! This module consists of:
//! - [`Simulator`]: The struct that simulates assembled code.
//! - [`signals`]: The control unit, mapping each mnemonic to its datapath control signals.
//! - [`mem`]: The module handling memory and the registers.
//! - [`console`]: The module handling where syscall output is sent.
//! - [`observer`]: The module tracking what each step changed.
//! - [`session`]: The module handling resumable, one-step-at-a-time executions.
//!
//! # Usage
//!
//! To simulate some code, you need to instantiate a Simulator and load a program into it:
//!
//! ```
//! use mips_ensemble::asm::assemble_src;
//! use mips_ensemble::sim::Simulator;
//!
//! let program = assemble_src("addi $t0, $zero, 5").unwrap();
//! let mut simulator = Simulator::new(Default::default());
//! simulator.load_program(&program);
//! simulator.run().unwrap();
//! ```
//!
//! ## Flags
//!
//! Here, we define `simulator` to have the default flags.
//! We could also configure the simulator by editing the flags. For example,
//! if we wish for `syscall 10` to print an exit message, we can edit the flags like so:
//!
//! ```
//! # use mips_ensemble::sim::{Simulator, SimFlags};
//! let mut simulator = Simulator::new(SimFlags { announce_exit: true, ..Default::default() });
//! ```
//!
//! All of the available flags can be found in [`SimFlags`].
//!
//! ## Execution
//!
//! Beyond the basic [`Simulator::run`] (which runs until the program halts or falls off the end),
//! there are also:
//! - [`Simulator::step_in`]: manual step-by-step simulation
//! - [`Simulator::run_while`], [`Simulator::run_with_limit`]: more advanced programmatic execution
//!
//! ```
//! use mips_ensemble::asm::assemble_src;
//! use mips_ensemble::sim::Simulator;
//! use mips_ensemble::ast::reg_consts::{T0, T1, T2};
//!
//! let src = "
//!     addi $t0, $zero, 5
//!     addi $t1, $zero, 3
//!     add $t2, $t0, $t1
//! ";
//! let program = assemble_src(src).unwrap();
//!
//! let mut sim = Simulator::new(Default::default());
//! sim.load_program(&program);
//!
//! // Running step by step:
//! sim.step_in().unwrap();
//! assert_eq!(sim.reg_file[T0], 5);
//! assert_eq!(sim.pc, 4);
//! sim.step_in().unwrap();
//! assert_eq!(sim.reg_file[T1], 3);
//! sim.step_in().unwrap();
//! assert_eq!(sim.reg_file[T2], 8);
//! assert_eq!(sim.pc, 12);
//! assert!(sim.is_done());
//! ```
//!
//! ## Querying State
//!
//! - The PC is the `sim.pc` field.
//! - The register file is the `sim.reg_file` field (see [`RegFile`]).
//! - The memory is the `sim.mem` field (see [`Memory`]).
//! - Everything printed by syscalls so far is [`Simulator::output`].
//!
//! # Faults
//!
//! Branching or jumping to a label that doesn't exist stops execution with a [`SimErr`].
//! The machine state (and any output) up to the fault is kept.

pub mod mem;
pub mod console;
pub mod signals;
pub mod observer;
pub mod session;

use std::borrow::Cow;
use std::sync::Arc;

use crate::asm::{assemble_src, Program, SourceErr, TEXT_BASE};
use crate::ast::asm::{AsmInstr, MemOperand};
use crate::ast::reg_consts::{A0, RA, SP, V0, ZERO};
use crate::ast::{Label, Reg};
use crate::err::ErrCategory;
use console::ConsoleDevice;

use self::mem::{Memory, RegFile};

/// The initial value of the stack pointer.
pub const INITIAL_SP: u32 = 0x7FFF_FFFC;

/// Errors that can occur during simulation.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub enum SimErr {
    /// A taken branch, a jump, or a memory access referred to a label
    /// that isn't in the symbol table.
    UnresolvedLabel(String),
}
impl std::fmt::Display for SimErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimErr::UnresolvedLabel(s) => write!(f, "label {s} could not be found"),
        }
    }
}
impl std::error::Error for SimErr {}
impl crate::err::Error for SimErr {
    fn help(&self) -> Option<Cow<str>> {
        match self {
            SimErr::UnresolvedLabel(s) => Some(format!("try adding a label named {s} to the program").into()),
        }
    }

    fn category(&self) -> ErrCategory {
        match self {
            SimErr::UnresolvedLabel(_) => ErrCategory::UnresolvedLabel,
        }
    }
}

/// Anything that can cause a step to abruptly fail to finish.
enum StepBreak {
    /// `syscall 10` was executed.
    Halt,
    /// The PC does not point to an instruction.
    Exit,
    /// A simulation error occurred.
    Err(SimErr),
}
impl From<SimErr> for StepBreak {
    fn from(value: SimErr) -> Self {
        Self::Err(value)
    }
}

/// Reason for why execution paused if it wasn't due to an error.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
enum PauseCondition {
    /// Program executed `syscall 10`.
    Halt,
    /// Program ran past its last instruction.
    Exit,
    /// Program hit a tripwire condition.
    Tripwire,
    /// Program hit an error and did not pause successfully.
    #[default]
    Unsuccessful
}

/// Configuration flags for [`Simulator`].
///
/// These can be modified after the `Simulator` is created with [`Simulator::new`].
/// `initial_sp` takes effect on the next [`Simulator::reset`]
/// (or [`Simulator::load_program`]).
///
/// Read the field descriptions for more details.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct SimFlags {
    /// The value of `$sp` when a program starts.
    ///
    /// By default, this is [`INITIAL_SP`].
    pub initial_sp: u32,

    /// Whether `syscall 10` prints `"Program exit\n"` before halting.
    ///
    /// By default, this flag is `false`.
    pub announce_exit: bool,
}

impl Default for SimFlags {
    fn default() -> Self {
        Self {
            initial_sp: INITIAL_SP,
            announce_exit: false,
        }
    }
}

/// A copy of the machine's state.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Snapshot {
    /// The register values.
    pub regs: RegFile,
    /// The memory contents.
    pub mem: Memory,
    /// The program counter.
    pub pc: u32,
    /// All text printed by syscalls.
    pub output: String,
}

/// The result of running a program to completion.
///
/// A fault does not discard state: the snapshot is the machine as of the fault.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct RunOutcome {
    /// The final machine state.
    pub snapshot: Snapshot,
    /// Whether the run ended normally.
    pub result: Result<(), SimErr>,
}

/// Executes assembled code.
pub struct Simulator {
    // ------------------ SIMULATION STATE ------------------
    // Calling [`Simulator::reset`] resets these values.

    /// The simulator's memory.
    pub mem: Memory,

    /// The simulator's register file.
    pub reg_file: RegFile,

    /// The program counter.
    pub pc: u32,

    /// The loaded program.
    program: Arc<Program>,

    /// Everything printed by syscalls.
    output: String,

    /// Whether `syscall 10` was executed.
    halted: bool,

    /// The number of instructions successfully run since this `Simulator` was initialized.
    ///
    /// This can be set to 0 to reset the counter.
    pub instructions_run: u64,

    /// Indicates the reason why the last execution (via [`Simulator::run_while`] and adjacent)
    /// had paused.
    pause_condition: PauseCondition,

    /// Tracks changes in simulator state.
    pub observer: observer::ChangeObserver,

    // ------------------ CONFIG STATE ------------------
    // Calling [`Simulator::reset`] does not reset these values.

    /// Configuration settings for the simulator.
    ///
    /// These are preserved between resets.
    ///
    /// See [`SimFlags`] for more details on what configuration
    /// settings are available.
    pub flags: SimFlags,

    /// Sinks which receive console output as it's printed.
    consoles: Vec<Box<dyn ConsoleDevice>>,
}
impl Simulator where Simulator: Send + Sync {}

impl std::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulator")
            .field("mem", &self.mem)
            .field("reg_file", &self.reg_file)
            .field("pc", &self.pc)
            .field("halted", &self.halted)
            .field("instructions_run", &self.instructions_run)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

/// The operands of an instruction, as they're routed through the datapath.
struct Datapath<'a> {
    /// The register written (or, for `sw`, the register whose value is stored).
    dest: Reg,
    /// The register read as the ALU's first operand.
    src: Reg,
    /// The ALU's second operand.
    operand: Operand<'a>,
    /// The branch or jump target.
    target: Option<&'a Label>,
}
enum Operand<'a> {
    Reg(Reg),
    Imm(i32),
    Label(&'a Label),
}
impl<'a> Datapath<'a> {
    fn of(instr: &'a AsmInstr) -> Self {
        let dp = |dest, src, operand| Datapath { dest, src, operand, target: None };

        match instr {
            | &AsmInstr::Add(rd, rs, rt)
            | &AsmInstr::Sub(rd, rs, rt)
            | &AsmInstr::And(rd, rs, rt)
            | &AsmInstr::Or(rd, rs, rt)
            | &AsmInstr::Slt(rd, rs, rt)
            | &AsmInstr::Mul(rd, rs, rt)
            | &AsmInstr::Xor(rd, rs, rt)
            | &AsmInstr::Nor(rd, rs, rt) => dp(rd, rs, Operand::Reg(rt)),
            | &AsmInstr::Sll(rd, rt, sa)
            | &AsmInstr::Srl(rd, rt, sa) => dp(rd, rt, Operand::Imm(sa.get() as i32)),
            &AsmInstr::Jr(rs) => dp(ZERO, rs, Operand::Imm(0)),
            | &AsmInstr::Addi(rt, rs, imm)
            | &AsmInstr::Andi(rt, rs, imm)
            | &AsmInstr::Ori(rt, rs, imm) => dp(rt, rs, Operand::Imm(imm)),
            &AsmInstr::Lui(rt, imm) => dp(rt, ZERO, Operand::Imm(imm)),
            &AsmInstr::Li(rd, imm) => dp(rd, ZERO, Operand::Imm(imm)),
            AsmInstr::La(rd, label) => dp(*rd, ZERO, Operand::Label(label)),
            AsmInstr::Lw(rt, mem) | AsmInstr::Sw(rt, mem) => match mem {
                &MemOperand::Offset { offset, base } => dp(*rt, base, Operand::Imm(offset)),
                MemOperand::Label(label) => dp(*rt, ZERO, Operand::Label(label)),
            },
            AsmInstr::Beq(rs, rt, label) | AsmInstr::Bne(rs, rt, label) => Datapath {
                target: Some(label),
                ..dp(ZERO, *rs, Operand::Reg(*rt))
            },
            AsmInstr::J(label) | AsmInstr::Jal(label) => Datapath {
                target: Some(label),
                ..dp(ZERO, ZERO, Operand::Imm(0))
            },
            &AsmInstr::Move(rd, rs) => dp(rd, rs, Operand::Reg(ZERO)),
            AsmInstr::Syscall => dp(ZERO, ZERO, Operand::Imm(0)),
        }
    }
}

impl Simulator {
    /// Creates a new simulator with the provided flags, without a loaded program.
    pub fn new(flags: SimFlags) -> Self {
        let mut reg_file = RegFile::new();
        reg_file.set(SP, flags.initial_sp as i32);

        Self {
            mem: Memory::new(),
            reg_file,
            pc: TEXT_BASE,
            program: Arc::default(),
            output: String::new(),
            halted: false,
            instructions_run: 0,
            pause_condition: Default::default(),
            observer: Default::default(),

            flags,
            consoles: vec![],
        }
    }

    /// Resets the simulator.
    ///
    /// This resets the state of the `Simulator` back to before any execution calls,
    /// while preserving configuration and attached consoles.
    ///
    /// Note that this function preserves:
    /// - Flags
    /// - Attached consoles
    ///
    /// This also unloads the program. The program has to be reloaded into the Simulator.
    pub fn reset(&mut self) {
        let flags = self.flags;
        let consoles = std::mem::take(&mut self.consoles);

        *self = Simulator::new(flags);
        self.consoles = consoles;
    }

    /// Loads a program into this simulator.
    ///
    /// This resets the simulator, then copies the program's data segment into memory.
    pub fn load_program(&mut self, program: &Program) {
        self.reset();
        self.mem.copy_block(program.data());
        self.program = Arc::new(program.clone());
    }

    /// The currently loaded program.
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Attaches a sink which receives console output as it's printed.
    pub fn attach_console(&mut self, console: impl ConsoleDevice + 'static) {
        self.consoles.push(Box::new(console));
    }

    /// All console output printed since the program was loaded.
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Takes the console output printed so far, clearing it.
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    /// Copies the current machine state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            regs: self.reg_file.clone(),
            mem: self.mem.clone(),
            pc: self.pc,
            output: self.output.clone(),
        }
    }

    /// Indicates whether the last execution of the simulator stopped
    /// because its tripwire (or step limit) ran out, rather than the program finishing.
    pub fn hit_step_limit(&self) -> bool {
        matches!(self.pause_condition, PauseCondition::Tripwire)
    }

    /// Indicates whether the program executed `syscall 10`.
    pub fn hit_halt(&self) -> bool {
        self.halted
    }

    /// Indicates whether the program has finished,
    /// either by halting or because the PC no longer points to an instruction.
    pub fn is_done(&self) -> bool {
        self.halted || self.program.instr_at(self.pc).is_none()
    }

    fn print(&mut self, text: &str) {
        self.output.push_str(text);
        for console in &self.consoles {
            console.write_str(text);
        }
    }

    fn set_reg(&mut self, reg: Reg, value: i32) {
        if self.reg_file.set(reg, value) {
            self.observer.set_reg_changed(reg);
        }
    }

    fn resolve(&self, label: &Label) -> Result<u32, SimErr> {
        self.program.symbol_table()
            .lookup_label(&label.name)
            .ok_or_else(|| SimErr::UnresolvedLabel(label.name.clone()))
    }

    /// Performs a syscall, returning whether the program continues.
    fn syscall(&mut self) -> bool {
        match self.reg_file[V0] {
            1 => {
                let text = self.reg_file[A0].to_string();
                self.print(&text);
            },
            4 => {
                let text = self.mem.read_cstr(self.reg_file[A0] as u32);
                self.print(&text);
            },
            10 => {
                if self.flags.announce_exit {
                    self.print("Program exit\n");
                }
                return false;
            },
            code => self.print(&format!("Unknown syscall: {code}\n")),
        }
        true
    }

    /// Runs until the tripwire condition returns false (or any of the typical breaks occur).
    ///
    /// The typical break conditions are:
    /// - `syscall 10` is executed
    /// - the PC no longer points to an instruction
    pub fn run_while(&mut self, mut tripwire: impl FnMut(&mut Simulator) -> bool) -> Result<(), SimErr> {
        self.observer.clear();
        std::mem::take(&mut self.pause_condition);

        // event loop
        // run until:
        // 1. the program halts or runs out of instructions
        // 2. the tripwire condition returns false
        let result = loop {
            // Tripwire turned off:
            if !tripwire(self) {
                break Ok(PauseCondition::Tripwire);
            }

            // Run a step:
            match self.step() {
                Ok(_) => {},
                Err(StepBreak::Halt) => break Ok(PauseCondition::Halt),
                Err(StepBreak::Exit) => break Ok(PauseCondition::Exit),
                Err(StepBreak::Err(e)) => break Err(e)
            }
        };

        self.pause_condition = result?;
        Ok(())
    }

    /// Execute the program.
    ///
    /// This blocks until the program ends.
    /// If you would like to limit the maximum number of steps to execute, consider [`Simulator::run_with_limit`].
    pub fn run(&mut self) -> Result<(), SimErr> {
        self.run_while(|_| true)
    }

    /// Execute the program with a limit on how many steps to execute.
    ///
    /// This blocks until the program ends or until the number of steps to execute has been hit.
    pub fn run_with_limit(&mut self, max_steps: u64) -> Result<(), SimErr> {
        let i = self.instructions_run;
        self.run_while(|sim| sim.instructions_run.wrapping_sub(i) < max_steps)
    }

    /// Simulate one step, executing one instruction.
    ///
    /// This function is a library function and should be used when one step is needed.
    /// The difference between this function and [`Simulator::step_in`] is that this
    /// function can return [`StepBreak::Halt`] and [`StepBreak::Exit`] as errors,
    /// whereas `step_in` will ignore those errors.
    fn step(&mut self) -> Result<(), StepBreak> {
        if self.halted { return Err(StepBreak::Halt) };

        let program = Arc::clone(&self.program);
        let Some(pi) = program.instr_at(self.pc) else {
            return Err(StepBreak::Exit);
        };

        let mnemonic = pi.instr.mnemonic();
        let sig = mnemonic.signals();
        let dp = Datapath::of(&pi.instr);

        let next_pc = self.pc.wrapping_add(4);
        let mut new_pc = next_pc;

        let a = self.reg_file[dp.src];
        let b = match dp.operand {
            Operand::Reg(r)   => self.reg_file[r],
            Operand::Imm(i)   => i,
            Operand::Label(l) => self.resolve(l)? as i32,
        };

        let mut value = None;
        if sig.syscall {
            if !self.syscall() {
                // the PC stays on the syscall
                self.halted = true;
                self.instructions_run = self.instructions_run.wrapping_add(1);
                return Err(StepBreak::Halt);
            }
        } else if sig.jump {
            // The target must resolve before anything is written.
            new_pc = match (sig.jump_reg, dp.target) {
                (false, Some(label)) => self.resolve(label)?,
                _ => a as u32,
            };
            if sig.link {
                self.set_reg(RA, next_pc as i32);
            }
        } else if sig.reg_move {
            value = Some(a);
        } else if sig.load_address {
            value = Some(b);
        } else if let Some(alu) = mnemonic.alu_fn() {
            let result = alu.apply(a, b);

            if sig.branch {
                if result != 0 {
                    if let Some(label) = dp.target {
                        new_pc = self.resolve(label)?;
                    }
                }
            } else if sig.mem_write {
                let addr = result as u32;
                if self.mem.set(addr, self.reg_file[dp.dest]) {
                    self.observer.set_mem_changed(addr);
                }
            } else if sig.mem_read {
                value = Some(self.mem.get(result as u32));
            } else {
                value = Some(result);
            }
        }

        if let (true, Some(v)) = (sig.reg_write, value) {
            self.set_reg(dp.dest, v);
        }
        if new_pc != next_pc {
            self.observer.set_pc_changed();
        }
        self.pc = new_pc;

        self.instructions_run = self.instructions_run.wrapping_add(1);
        Ok(())
    }

    /// Simulate one step, executing one instruction.
    ///
    /// If the program is already done, this does nothing.
    pub fn step_in(&mut self) -> Result<(), SimErr> {
        self.observer.clear();
        match self.step() {
            Ok(()) => Ok(()),
            Err(StepBreak::Halt | StepBreak::Exit) => Ok(()),
            Err(StepBreak::Err(e)) => Err(e)
        }
    }
}
impl Default for Simulator {
    fn default() -> Self {
        Self::new(Default::default())
    }
}

/// Runs an assembled program to completion.
///
/// Note that a program which never ends will cause this to never return.
pub fn run_program(program: &Program, flags: SimFlags) -> RunOutcome {
    let mut sim = Simulator::new(flags);
    sim.load_program(program);
    let result = sim.run();

    RunOutcome { snapshot: sim.snapshot(), result }
}

/// Parses, assembles, and runs source code to completion.
///
/// Assembly errors abort before anything is executed.
///
/// ```
/// use mips_ensemble::sim::run_source;
/// use mips_ensemble::ast::reg_consts::A0;
///
/// let src = r#"
///     .data
///     hello: .asciiz "Hi\n"
///     .text
///     addi $v0, $zero, 4
///     la $a0, hello
///     syscall
/// "#;
/// let outcome = run_source(src, Default::default()).unwrap();
/// assert_eq!(outcome.snapshot.output, "Hi\n");
/// assert_eq!(outcome.snapshot.regs[A0], 0x1001_0000);
/// assert!(outcome.result.is_ok());
/// ```
pub fn run_source(src: &str, flags: SimFlags) -> Result<RunOutcome, SourceErr> {
    let program = assemble_src(src)?;
    Ok(run_program(&program, flags))
}

#[cfg(test)]
mod tests {
    use crate::asm::assemble_src;
    use crate::ast::reg_consts::{A0, A1, RA, SP, T0, T1, T2, T3, V0, ZERO};
    use crate::ast::Reg;
    use crate::err::{ErrCategory, Error};

    use super::console::BufferedConsole;
    use super::{run_source, RunOutcome, SimErr, SimFlags, Simulator, INITIAL_SP};

    fn run_src(src: &str) -> RunOutcome {
        run_source(src, Default::default()).unwrap()
    }
    fn load_src(src: &str) -> Simulator {
        let program = assemble_src(src).unwrap();
        let mut sim = Simulator::new(Default::default());
        sim.load_program(&program);
        sim
    }

    #[test]
    fn test_alu() {
        let out = run_src("
            addi $t0, $zero, 5
            addi $t1, $zero, 3
            add $t2, $t0, $t1
        ");
        let regs = &out.snapshot.regs;
        assert_eq!(regs[T0], 5);
        assert_eq!(regs[T1], 3);
        assert_eq!(regs[T2], 8);
        assert_eq!(out.snapshot.pc, 12);
        assert!(out.result.is_ok());

        let out = run_src("
            li $t0, -6
            li $t1, 4
            sub $t2, $t0, $t1   # -10
            mul $t3, $t0, $t1   # -24
            slt $a0, $t0, $t1   # 1
            slt $a1, $t1, $t0   # 0
            nor $a2, $zero, $zero
            xor $a3, $t1, $t1
            and $s0, $t0, $t1   # 0b...1010 & 0b0100 = 0
            or  $s1, $t0, $t1   # -6 | 4 = -2
            sll $s2, $t1, 3     # 32
            srl $s3, $t0, 28    # 0xF
        ");
        let regs = &out.snapshot.regs;
        let get = |name: &str| regs[name.parse::<Reg>().unwrap()];
        assert_eq!(get("t2"), -10);
        assert_eq!(get("t3"), -24);
        assert_eq!(get("a0"), 1);
        assert_eq!(get("a1"), 0);
        assert_eq!(get("a2"), -1);
        assert_eq!(get("a3"), 0);
        assert_eq!(get("s0"), 0);
        assert_eq!(get("s1"), -2);
        assert_eq!(get("s2"), 32);
        assert_eq!(get("s3"), 0xF);
    }

    #[test]
    fn test_imm_alu() {
        let out = run_src("
            addi $t0, $zero, -1
            andi $t1, $t0, 0xFF00   # zero-extended
            ori  $t2, $zero, 0xFFFF
            lui  $t3, 0x1001
            li   $a0, 0x12345678
            li   $a1, -100000
        ");
        let regs = &out.snapshot.regs;
        assert_eq!(regs[T0], -1);
        assert_eq!(regs[T1], 0xFF00);
        assert_eq!(regs[T2], 0xFFFF);
        assert_eq!(regs[T3], 0x1001_0000);
        assert_eq!(regs[A0], 0x1234_5678);
        assert_eq!(regs[A1], -100000);
    }

    #[test]
    fn test_zero_reg() {
        let out = run_src("
            addi $zero, $zero, 5
            move $t0, $zero
        ");
        assert_eq!(out.snapshot.regs[ZERO], 0);
        assert_eq!(out.snapshot.regs[T0], 0);
    }

    #[test]
    fn test_hello() {
        let out = run_src("
            .data
            hello: .asciiz \"Hi\\n\"
            .text
            addi $v0, $zero, 4
            la $a0, hello
            syscall
        ");
        assert_eq!(out.snapshot.output, "Hi\n");
        assert_eq!(out.snapshot.regs[A0], 0x1001_0000);
    }

    #[test]
    fn test_mem() {
        let out = run_src("
            .data
            var: .word 42
            .text
            lw $t0, var
            sw $t0, 4($zero)
            addi $sp, $sp, -4
            sw $t0, 0($sp)
            lw $t1, ($sp)
            lw $t2, 100($zero)     # never written
        ");
        let snap = &out.snapshot;
        assert_eq!(snap.regs[T0], 42);
        assert_eq!(snap.regs[T1], 42);
        assert_eq!(snap.regs[T2], 0);
        assert_eq!(snap.mem.get(4), 42);
        assert_eq!(snap.mem.get(INITIAL_SP - 4), 42);
        assert_eq!(snap.regs[SP], (INITIAL_SP - 4) as i32);
    }

    #[test]
    fn test_move_chain() {
        let out = run_src("
            li $t0, 42
            move $t1, $t0
            move $t2, $t1
            move $t3, $t2
        ");
        let regs = &out.snapshot.regs;
        assert_eq!(regs[T0], 42);
        assert_eq!(regs[T1], 42);
        assert_eq!(regs[T3], 42);
    }

    #[test]
    fn test_loop() {
        // sum 1..=5, printing it
        let out = run_src("
                li $t0, 5
                li $t1, 0
            loop:
                beq $t0, $zero, done
                add $t1, $t1, $t0
                addi $t0, $t0, -1
                j loop
            done:
                move $a0, $t1
                li $v0, 1
                syscall
                li $v0, 10
                syscall
                li $t1, 99      # unreachable
        ");
        assert_eq!(out.snapshot.output, "15");
        assert_eq!(out.snapshot.regs[T1], 15);
        // halting doesn't advance the PC
        assert_eq!(out.snapshot.pc, 4 * 10);
    }

    #[test]
    fn test_forward_bne() {
        let out = run_src("
                li $t0, 1
                bne $t0, $zero, skip
                li $t1, 7
            skip:
                li $t2, 8
        ");
        assert_eq!(out.snapshot.regs[T1], 0);
        assert_eq!(out.snapshot.regs[T2], 8);
    }

    #[test]
    fn test_subroutine() {
        let out = run_src("
            main:
                li $a0, 20
                jal double
                move $t0, $v0
                j end
            double:
                add $v0, $a0, $a0
                jr $ra
            end:
        ");
        assert_eq!(out.snapshot.regs[T0], 40);
        assert_eq!(out.snapshot.regs[RA], 8);
        assert_eq!(out.snapshot.pc, 24);
        assert!(out.result.is_ok());
    }

    #[test]
    fn test_syscalls() {
        let out = run_src("
            li $v0, 1
            li $a0, -7
            syscall
            li $v0, 42
            syscall
            li $v0, 10
            syscall
        ");
        assert_eq!(out.snapshot.output, "-7Unknown syscall: 42\n");

        let flags = SimFlags { announce_exit: true, ..Default::default() };
        let out = run_source("li $v0, 10\nsyscall", flags).unwrap();
        assert_eq!(out.snapshot.output, "Program exit\n");
        assert_eq!(out.snapshot.regs[V0], 10);
    }

    #[test]
    fn test_wide_imm() {
        let out = run_src("
            addi $t0, $zero, 40000
            ori  $t1, $zero, -1
            andi $t2, $t1, 0x12345
            lui  $t3, 0x10001
            sw   $t0, 40000($zero)
            lw   $a0, 40000($zero)
        ");
        assert!(out.result.is_ok());

        let regs = &out.snapshot.regs;
        assert_eq!(regs[T0], 40000);
        assert_eq!(regs[T1], -1);
        assert_eq!(regs[T2], 0x12345);
        assert_eq!(regs[T3], 0x0001_0000);
        assert_eq!(out.snapshot.mem.get(40000), 40000);
        assert_eq!(regs[A0], 40000);
    }

    #[test]
    fn test_unresolved_fault() {
        let out = run_src("
            li $v0, 1
            li $a0, 3
            syscall
            j nowhere
            li $t0, 1
        ");
        assert_eq!(out.result, Err(SimErr::UnresolvedLabel("nowhere".to_string())));
        // state up to the fault is kept
        assert_eq!(out.snapshot.output, "3");
        assert_eq!(out.snapshot.pc, 12);
        assert_eq!(out.snapshot.regs[T0], 0);

        let e = out.result.unwrap_err();
        assert_eq!(e.category(), ErrCategory::UnresolvedLabel);

        // a faulting jal does not link
        let out = run_src("
            li $t0, 1
            jal nowhere
        ");
        assert_eq!(out.result, Err(SimErr::UnresolvedLabel("nowhere".to_string())));
        assert_eq!(out.snapshot.regs[RA], 0);
        assert_eq!(out.snapshot.pc, 4);

        // branches to missing labels only fault if taken
        let out = run_src("
            li $t0, 1
            beq $t0, $zero, nowhere
            li $t1, 2
        ");
        assert!(out.result.is_ok());
        assert_eq!(out.snapshot.regs[T1], 2);
    }

    #[test]
    fn test_jr_off_end() {
        let out = run_src("
            li $t0, 1000
            jr $t0
            li $t1, 1
        ");
        assert!(out.result.is_ok());
        assert_eq!(out.snapshot.pc, 1000);
        assert_eq!(out.snapshot.regs[T1], 0);

        // misaligned PC also stops
        let out = run_src("li $t0, 2\njr $t0");
        assert!(out.result.is_ok());
        assert_eq!(out.snapshot.pc, 2);
    }

    #[test]
    fn test_step_in() {
        let mut sim = load_src("
            li $t0, 1
            li $t1, 2
            sw $t1, 8($zero)
        ");
        sim.step_in().unwrap();
        assert_eq!(sim.pc, 4);
        assert!(sim.observer.reg_changed(T0));

        sim.step_in().unwrap();
        assert!(!sim.observer.reg_changed(T0));
        assert!(sim.observer.reg_changed(T1));

        sim.step_in().unwrap();
        assert!(sim.observer.mem_changed(8));
        assert!(sim.is_done());

        // stepping past the end does nothing
        let count = sim.instructions_run;
        sim.step_in().unwrap();
        assert_eq!(sim.instructions_run, count);
        assert_eq!(sim.pc, 12);
    }

    #[test]
    fn test_run_with_limit() {
        let mut sim = load_src("loop: j loop");
        sim.run_with_limit(100).unwrap();
        assert_eq!(sim.instructions_run, 100);
        assert!(!sim.is_done());
        assert!(sim.hit_step_limit());

        // a program that finishes within the limit
        let mut sim = load_src("
                li $t1, 3
            loop:
                addi $t0, $t0, 1
                bne $t0, $t1, loop
        ");
        sim.run_with_limit(1000).unwrap();
        assert!(sim.is_done());
        assert!(!sim.hit_step_limit());
    }

    #[test]
    fn test_consoles_and_reset() {
        let console = BufferedConsole::new();
        let mut sim = Simulator::new(SimFlags {
            initial_sp: 0x7FFF_EFFC,
            ..Default::default()
        });
        sim.attach_console(console.clone());

        let program = assemble_src("li $v0, 1\nli $a0, 5\nsyscall\nsyscall").unwrap();
        sim.load_program(&program);
        assert_eq!(sim.reg_file[T0], 0);
        assert_eq!(sim.reg_file[SP], 0x7FFF_EFFC);
        assert_eq!(sim.reg_file[ZERO], 0);

        sim.run().unwrap();
        assert_eq!(sim.output(), "55");
        assert_eq!(*console.get_output().read().unwrap(), "55");

        // reloading resets state but keeps consoles
        sim.load_program(&program);
        assert_eq!(sim.output(), "");
        sim.run().unwrap();
        assert_eq!(sim.take_output(), "55");
        assert_eq!(*console.get_output().read().unwrap(), "5555");
    }
}
