//! The control unit.
//!
//! Every [`Mnemonic`] belongs to exactly one [`InstrClass`],
//! and every class has exactly one fixed set of [`ControlSignals`].
//! The simulator dispatches on these signals (rather than on mnemonics),
//! the way a single-cycle datapath is driven by its control unit.
//!
//! ```
//! use mips_ensemble::sim::signals::{signals_for, AluOp};
//!
//! let sig = signals_for("lw").unwrap();
//! assert!(sig.reg_write && sig.alu_src && sig.mem_read && sig.mem_to_reg);
//! assert!(!sig.mem_write);
//! assert_eq!(sig.alu_op, AluOp::Mem);
//!
//! assert!(signals_for("addiu").is_err());
//! ```
use crate::ast::asm::{Mnemonic, UnsupportedOpErr};

/// The broad groups instructions fall into.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum InstrClass {
    /// Register-register ALU operations (`add`, `sll`, ...).
    RegAlu,
    /// ALU operations with an immediate (`addi`, `lui`, `li`, ...).
    ImmAlu,
    /// `lw`
    Load,
    /// `sw`
    Store,
    /// `beq`, `bne`
    Branch,
    /// `j`, `jal`
    Jump,
    /// `jr`
    RegJump,
    /// `syscall`
    Syscall,
    /// `move`
    Move,
    /// `la`
    LoadAddr,
}

/// The 2-bit ALUOp signal sent from the control unit to the ALU control.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum AluOp {
    /// `00`: the ALU adds (address computation and immediates).
    Mem,
    /// `01`: the ALU compares (branches).
    Branch,
    /// `10`: the ALU operation comes from the function field.
    Funct,
}
impl AluOp {
    /// The two signal bits.
    pub fn bits(self) -> u8 {
        match self {
            AluOp::Mem    => 0b00,
            AluOp::Branch => 0b01,
            AluOp::Funct  => 0b10,
        }
    }
}

/// The operation the ALU performs for a given instruction.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum AluFn {
    #[allow(missing_docs)]
    Add,
    #[allow(missing_docs)]
    Sub,
    #[allow(missing_docs)]
    And,
    #[allow(missing_docs)]
    Or,
    /// 1 if the first operand is less than the second (signed), 0 otherwise.
    Slt,
    #[allow(missing_docs)]
    Mul,
    #[allow(missing_docs)]
    Xor,
    #[allow(missing_docs)]
    Nor,
    /// Logical left shift of the first operand.
    Sll,
    /// Logical right shift of the first operand.
    Srl,
    /// Second operand shifted into the upper half.
    Lui,
    /// 1 if both operands are equal.
    Eq,
    /// 1 if the operands differ.
    Ne,
}
impl AluFn {
    /// Applies this operation to two operands. All arithmetic wraps.
    ///
    /// ```
    /// use mips_ensemble::sim::signals::AluFn;
    ///
    /// assert_eq!(AluFn::Add.apply(i32::MAX, 1), i32::MIN);
    /// assert_eq!(AluFn::Slt.apply(-1, 0), 1);
    /// assert_eq!(AluFn::Srl.apply(-1, 28), 0xF);
    /// assert_eq!(AluFn::Nor.apply(0, 0), -1);
    /// ```
    pub fn apply(self, a: i32, b: i32) -> i32 {
        let shamt = (b as u32) & 0x1F;
        match self {
            AluFn::Add => a.wrapping_add(b),
            AluFn::Sub => a.wrapping_sub(b),
            AluFn::And => a & b,
            AluFn::Or  => a | b,
            AluFn::Slt => i32::from(a < b),
            AluFn::Mul => a.wrapping_mul(b),
            AluFn::Xor => a ^ b,
            AluFn::Nor => !(a | b),
            AluFn::Sll => ((a as u32) << shamt) as i32,
            AluFn::Srl => ((a as u32) >> shamt) as i32,
            AluFn::Lui => ((b as u32) << 16) as i32,
            AluFn::Eq  => i32::from(a == b),
            AluFn::Ne  => i32::from(a != b),
        }
    }
}

/// The datapath control flags for one instruction class.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct ControlSignals {
    /// The class these signals were generated for.
    pub class: InstrClass,
    /// The destination register is written.
    pub reg_write: bool,
    /// The destination is `rd` (R-type) rather than `rt`.
    pub reg_dst: bool,
    /// The ALU's second operand is the immediate.
    pub alu_src: bool,
    /// The instruction may branch.
    pub branch: bool,
    /// Memory is read.
    pub mem_read: bool,
    /// Memory is written.
    pub mem_write: bool,
    /// The value written to the register comes from memory.
    pub mem_to_reg: bool,
    /// The ALUOp signal.
    pub alu_op: AluOp,
    /// The PC is unconditionally replaced.
    pub jump: bool,
    /// The jump target comes from a register (`jr`).
    pub jump_reg: bool,
    /// The return address is saved in `$ra` (`jal`).
    pub link: bool,
    /// The destination is loaded with a label's address (`la`).
    pub load_address: bool,
    /// A system call is performed.
    pub syscall: bool,
    /// The source register is copied to the destination (`move`).
    pub reg_move: bool,
}

const NONE: ControlSignals = ControlSignals {
    class: InstrClass::Syscall,
    reg_write: false,
    reg_dst: false,
    alu_src: false,
    branch: false,
    mem_read: false,
    mem_write: false,
    mem_to_reg: false,
    alu_op: AluOp::Mem,
    jump: false,
    jump_reg: false,
    link: false,
    load_address: false,
    syscall: false,
    reg_move: false,
};

impl InstrClass {
    /// The fixed signal set for this class.
    pub const fn signals(self) -> ControlSignals {
        match self {
            InstrClass::RegAlu   => ControlSignals { class: self, reg_dst: true, reg_write: true, alu_op: AluOp::Funct, ..NONE },
            InstrClass::ImmAlu   => ControlSignals { class: self, alu_src: true, reg_write: true, ..NONE },
            InstrClass::Load     => ControlSignals { class: self, alu_src: true, mem_to_reg: true, reg_write: true, mem_read: true, ..NONE },
            InstrClass::Store    => ControlSignals { class: self, alu_src: true, mem_write: true, ..NONE },
            InstrClass::Branch   => ControlSignals { class: self, branch: true, alu_op: AluOp::Branch, ..NONE },
            InstrClass::Jump     => ControlSignals { class: self, jump: true, ..NONE },
            InstrClass::RegJump  => ControlSignals { class: self, jump: true, jump_reg: true, ..NONE },
            InstrClass::Syscall  => ControlSignals { class: self, syscall: true, ..NONE },
            InstrClass::Move     => ControlSignals { class: self, reg_write: true, reg_move: true, ..NONE },
            InstrClass::LoadAddr => ControlSignals { class: self, reg_write: true, load_address: true, ..NONE },
        }
    }
}

impl Mnemonic {
    /// The class this mnemonic belongs to.
    pub fn class(self) -> InstrClass {
        use Mnemonic::*;

        match self {
            Add | Sub | And | Or | Slt | Mul | Xor | Nor | Sll | Srl => InstrClass::RegAlu,
            Addi | Andi | Ori | Lui | Li => InstrClass::ImmAlu,
            Lw   => InstrClass::Load,
            Sw   => InstrClass::Store,
            Beq | Bne => InstrClass::Branch,
            J | Jal => InstrClass::Jump,
            Jr   => InstrClass::RegJump,
            Syscall => InstrClass::Syscall,
            Move => InstrClass::Move,
            La   => InstrClass::LoadAddr,
        }
    }

    /// The control signals for this mnemonic.
    ///
    /// `jal` is the one jump that writes a register.
    pub fn signals(self) -> ControlSignals {
        let sig = self.class().signals();
        match self {
            Mnemonic::Jal => ControlSignals { reg_write: true, link: true, ..sig },
            _ => sig
        }
    }

    /// The ALU operation for this mnemonic, if it uses the ALU.
    pub fn alu_fn(self) -> Option<AluFn> {
        use Mnemonic::*;

        match self {
            Add | Addi | Li | Lw | Sw => Some(AluFn::Add),
            Sub  => Some(AluFn::Sub),
            And | Andi => Some(AluFn::And),
            Or | Ori => Some(AluFn::Or),
            Slt  => Some(AluFn::Slt),
            Mul  => Some(AluFn::Mul),
            Xor  => Some(AluFn::Xor),
            Nor  => Some(AluFn::Nor),
            Sll  => Some(AluFn::Sll),
            Srl  => Some(AluFn::Srl),
            Lui  => Some(AluFn::Lui),
            Beq  => Some(AluFn::Eq),
            Bne  => Some(AluFn::Ne),
            J | Jal | Jr | Syscall | Move | La => None,
        }
    }
}

/// Looks up the control signals of a mnemonic by name (case-insensitive).
pub fn signals_for(mnemonic: &str) -> Result<ControlSignals, UnsupportedOpErr> {
    mnemonic.parse::<Mnemonic>().map(Mnemonic::signals)
}

#[cfg(test)]
mod tests {
    use crate::ast::asm::Mnemonic;
    use crate::err::{ErrCategory, Error};

    use super::{signals_for, AluFn, AluOp, InstrClass};

    #[test]
    fn test_classes() {
        for &m in Mnemonic::ALL {
            let sig = m.signals();
            assert_eq!(sig.class, m.class(), "{m}");

            // every ALU-driven class has an ALU function
            let uses_alu = matches!(sig.class, InstrClass::RegAlu | InstrClass::ImmAlu | InstrClass::Load | InstrClass::Store | InstrClass::Branch);
            assert_eq!(uses_alu, m.alu_fn().is_some(), "{m}");
        }
    }

    #[test]
    fn test_table() {
        let add = signals_for("add").unwrap();
        assert!(add.reg_write && add.reg_dst);
        assert_eq!(add.alu_op.bits(), 0b10);

        let addi = signals_for("ADDI").unwrap();
        assert!(addi.reg_write && addi.alu_src && !addi.reg_dst);
        assert_eq!(addi.alu_op.bits(), 0b00);

        let sw = signals_for("sw").unwrap();
        assert!(sw.mem_write && !sw.reg_write && !sw.mem_read);

        let beq = signals_for("beq").unwrap();
        assert!(beq.branch && !beq.reg_write);
        assert_eq!(beq.alu_op, AluOp::Branch);

        let j = signals_for("j").unwrap();
        let jal = signals_for("jal").unwrap();
        let jr = signals_for("jr").unwrap();
        assert!(j.jump && !j.reg_write && !j.link);
        assert!(jal.jump && jal.reg_write && jal.link);
        assert!(jr.jump && jr.jump_reg);

        assert!(signals_for("move").unwrap().reg_move);
        assert!(signals_for("la").unwrap().load_address);
        assert!(signals_for("syscall").unwrap().syscall);
    }

    #[test]
    fn test_unsupported() {
        let e = signals_for("frob").unwrap_err();
        assert_eq!(e.category(), ErrCategory::UnsupportedOperation);
        assert!(e.help().is_some());
    }

    #[test]
    fn test_alu() {
        assert_eq!(AluFn::Sub.apply(3, 5), -2);
        assert_eq!(AluFn::Slt.apply(5, 3), 0);
        assert_eq!(AluFn::Mul.apply(-4, 6), -24);
        assert_eq!(AluFn::Sll.apply(1, 33), 2);
        assert_eq!(AluFn::Lui.apply(0, 0x1001), 0x1001_0000);
        assert_eq!(AluFn::Eq.apply(7, 7), 1);
        assert_eq!(AluFn::Ne.apply(7, 7), 0);
    }
}
