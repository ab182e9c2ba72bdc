//! This module holds the AST for statements from assembly source code.
//!
//! For instructions that map to real machine instructions, see [`crate::ast::sim::SimInstr`].
//!
//! Useful structs in this module include:
//! - [`Mnemonic`]: the closed set of supported instruction names
//! - [`AsmInstr`]: An enum of all possible assembly source code instructions
//! - [`Directive`]: An enum of all possible assembly source code directives
//! - [`Stmt`]: The format for a single "statement" in assembly source code
use std::borrow::Cow;
use std::ops::Range;

use super::{Label, Reg, UOffset};

macro_rules! mnemonic_enum {
    ($($instr:ident => $text:literal),+ $(,)?) => {
        /// A supported instruction name.
        ///
        /// This is a closed set: anything that isn't listed here is an unsupported operation.
        /// Mnemonics are parsed case-insensitively.
        ///
        /// ```
        /// # use mips_ensemble::ast::asm::Mnemonic;
        /// assert_eq!("ADDI".parse::<Mnemonic>(), Ok(Mnemonic::Addi));
        /// assert!("addiu".parse::<Mnemonic>().is_err());
        /// ```
        #[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
        pub enum Mnemonic {
            $(
                #[allow(missing_docs)]
                $instr
            ),+
        }
        impl Mnemonic {
            /// Every supported mnemonic.
            pub const ALL: &'static [Mnemonic] = &[$(Mnemonic::$instr),+];

            /// The lowercase name of this mnemonic.
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$instr => $text),+
                }
            }
        }
        impl std::str::FromStr for Mnemonic {
            type Err = UnsupportedOpErr;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match &*s.to_ascii_lowercase() {
                    $($text => Ok(Self::$instr)),+,
                    _ => Err(UnsupportedOpErr(s.to_string()))
                }
            }
        }
    }
}
mnemonic_enum! {
    Add => "add",
    Sub => "sub",
    And => "and",
    Or  => "or",
    Slt => "slt",
    Mul => "mul",
    Xor => "xor",
    Nor => "nor",
    Sll => "sll",
    Srl => "srl",
    Jr  => "jr",
    Addi => "addi",
    Andi => "andi",
    Ori  => "ori",
    Lui  => "lui",
    Li   => "li",
    La   => "la",
    Lw   => "lw",
    Sw   => "sw",
    Beq  => "beq",
    Bne  => "bne",
    J    => "j",
    Jal  => "jal",
    Move => "move",
    Syscall => "syscall",
}
impl std::fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised when a mnemonic is not in the supported instruction set.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct UnsupportedOpErr(pub String);
impl std::fmt::Display for UnsupportedOpErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unsupported operation: {}", self.0)
    }
}
impl std::error::Error for UnsupportedOpErr {}
impl crate::err::Error for UnsupportedOpErr {
    fn help(&self) -> Option<Cow<str>> {
        let names: Vec<_> = Mnemonic::ALL.iter().map(|m| m.as_str()).collect();
        Some(format!("supported operations are: {}", names.join(", ")).into())
    }

    fn category(&self) -> crate::err::ErrCategory {
        crate::err::ErrCategory::UnsupportedOperation
    }
}

/// The memory operand of a `lw` or `sw` instruction.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub enum MemOperand {
    /// `offset(base)`: the address is `base + offset`.
    Offset {
        /// Signed byte offset, as written.
        ///
        /// Only the low 16 bits are kept when encoded.
        offset: i32,
        /// Base register.
        base: Reg
    },
    /// A bare label: the address is the label's address.
    ///
    /// When encoded, the base register is `$zero` and the immediate is the
    /// address truncated to 16 bits.
    Label(Label),
}
impl std::fmt::Display for MemOperand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemOperand::Offset { offset, base } => write!(f, "{offset}({base})"),
            MemOperand::Label(label) => label.fmt(f),
        }
    }
}

/// An enum representing all of the possible instructions in MIPS assembly code.
///
/// The variants in this enum represent instructions before assembly passes.
/// Labels are still unresolved, and pseudo-instructions (`li`, `la`, `move`)
/// have not been expanded into machine instructions.
///
/// Operands are listed in source order. For example, `Addi(rt, rs, imm)`
/// corresponds to `addi rt, rs, imm`.
///
/// Immediates hold the literal value from source. The simulator executes with
/// that value, and the encoder keeps its low 16 bits in the immediate field.
///
/// For instructions that map to machine code, refer to [`crate::ast::sim::SimInstr`].
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub enum AsmInstr {
    /// `add rd, rs, rt`
    Add(Reg, Reg, Reg),
    /// `sub rd, rs, rt`
    Sub(Reg, Reg, Reg),
    /// `and rd, rs, rt`
    And(Reg, Reg, Reg),
    /// `or rd, rs, rt`
    Or(Reg, Reg, Reg),
    /// `slt rd, rs, rt`
    Slt(Reg, Reg, Reg),
    /// `mul rd, rs, rt`
    Mul(Reg, Reg, Reg),
    /// `xor rd, rs, rt`
    Xor(Reg, Reg, Reg),
    /// `nor rd, rs, rt`
    Nor(Reg, Reg, Reg),
    /// `sll rd, rt, shamt`
    Sll(Reg, Reg, UOffset<5>),
    /// `srl rd, rt, shamt`
    Srl(Reg, Reg, UOffset<5>),
    /// `jr rs`
    Jr(Reg),
    /// `addi rt, rs, imm`
    Addi(Reg, Reg, i32),
    /// `andi rt, rs, imm`
    Andi(Reg, Reg, i32),
    /// `ori rt, rs, imm`
    Ori(Reg, Reg, i32),
    /// `lui rt, imm`
    Lui(Reg, i32),
    /// `li rd, imm` (pseudo-instruction, any 32-bit value)
    Li(Reg, i32),
    /// `la rd, label` (pseudo-instruction)
    La(Reg, Label),
    /// `lw rt, offset(base)` or `lw rt, label`
    Lw(Reg, MemOperand),
    /// `sw rt, offset(base)` or `sw rt, label`
    Sw(Reg, MemOperand),
    /// `beq rs, rt, label`
    Beq(Reg, Reg, Label),
    /// `bne rs, rt, label`
    Bne(Reg, Reg, Label),
    /// `j label`
    J(Label),
    /// `jal label`
    Jal(Label),
    /// `move rd, rs` (pseudo-instruction)
    Move(Reg, Reg),
    /// `syscall`
    Syscall,
}
impl AsmInstr {
    /// The mnemonic of this instruction.
    pub fn mnemonic(&self) -> Mnemonic {
        match self {
            AsmInstr::Add(..)  => Mnemonic::Add,
            AsmInstr::Sub(..)  => Mnemonic::Sub,
            AsmInstr::And(..)  => Mnemonic::And,
            AsmInstr::Or(..)   => Mnemonic::Or,
            AsmInstr::Slt(..)  => Mnemonic::Slt,
            AsmInstr::Mul(..)  => Mnemonic::Mul,
            AsmInstr::Xor(..)  => Mnemonic::Xor,
            AsmInstr::Nor(..)  => Mnemonic::Nor,
            AsmInstr::Sll(..)  => Mnemonic::Sll,
            AsmInstr::Srl(..)  => Mnemonic::Srl,
            AsmInstr::Jr(..)   => Mnemonic::Jr,
            AsmInstr::Addi(..) => Mnemonic::Addi,
            AsmInstr::Andi(..) => Mnemonic::Andi,
            AsmInstr::Ori(..)  => Mnemonic::Ori,
            AsmInstr::Lui(..)  => Mnemonic::Lui,
            AsmInstr::Li(..)   => Mnemonic::Li,
            AsmInstr::La(..)   => Mnemonic::La,
            AsmInstr::Lw(..)   => Mnemonic::Lw,
            AsmInstr::Sw(..)   => Mnemonic::Sw,
            AsmInstr::Beq(..)  => Mnemonic::Beq,
            AsmInstr::Bne(..)  => Mnemonic::Bne,
            AsmInstr::J(..)    => Mnemonic::J,
            AsmInstr::Jal(..)  => Mnemonic::Jal,
            AsmInstr::Move(..) => Mnemonic::Move,
            AsmInstr::Syscall  => Mnemonic::Syscall,
        }
    }
}
impl std::fmt::Display for AsmInstr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let m = self.mnemonic();
        match self {
            | AsmInstr::Add(rd, rs, rt)
            | AsmInstr::Sub(rd, rs, rt)
            | AsmInstr::And(rd, rs, rt)
            | AsmInstr::Or(rd, rs, rt)
            | AsmInstr::Slt(rd, rs, rt)
            | AsmInstr::Mul(rd, rs, rt)
            | AsmInstr::Xor(rd, rs, rt)
            | AsmInstr::Nor(rd, rs, rt) => write!(f, "{m} {rd}, {rs}, {rt}"),
            | AsmInstr::Sll(rd, rt, sa)
            | AsmInstr::Srl(rd, rt, sa) => write!(f, "{m} {rd}, {rt}, {sa}"),
            AsmInstr::Jr(rs) => write!(f, "{m} {rs}"),
            | AsmInstr::Addi(rt, rs, imm)
            | AsmInstr::Andi(rt, rs, imm)
            | AsmInstr::Ori(rt, rs, imm) => write!(f, "{m} {rt}, {rs}, {imm}"),
            AsmInstr::Lui(rt, imm) => write!(f, "{m} {rt}, {imm}"),
            AsmInstr::Li(rd, imm) => write!(f, "{m} {rd}, {imm}"),
            AsmInstr::La(rd, label) => write!(f, "{m} {rd}, {label}"),
            | AsmInstr::Lw(rt, op)
            | AsmInstr::Sw(rt, op) => write!(f, "{m} {rt}, {op}"),
            | AsmInstr::Beq(rs, rt, label)
            | AsmInstr::Bne(rs, rt, label) => write!(f, "{m} {rs}, {rt}, {label}"),
            | AsmInstr::J(label)
            | AsmInstr::Jal(label) => write!(f, "{m} {label}"),
            AsmInstr::Move(rd, rs) => write!(f, "{m} {rd}, {rs}"),
            AsmInstr::Syscall => write!(f, "{m}"),
        }
    }
}

/// An enum representing all the possible directives in MIPS assembly code.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub enum Directive {
    /// `.data`: switches to the data segment.
    Data,
    /// `.text`: switches to the text (instruction) segment.
    Text,
    /// `.word a, b, ...`: one 4-byte slot per value.
    Word(Vec<i32>),
    /// `.asciiz "..."`: one byte slot per character, plus a NUL terminator.
    Asciiz(String),
    /// `.globl label`: accepted and otherwise ignored.
    Globl(Label),
}
impl Directive {
    /// The number of bytes this directive lays out in the data segment.
    pub fn byte_len(&self) -> u32 {
        match self {
            Directive::Data | Directive::Text | Directive::Globl(_) => 0,
            Directive::Word(vals) => 4 * vals.len() as u32,
            Directive::Asciiz(s)  => s.chars().count() as u32 + 1,
        }
    }
}
impl std::fmt::Display for Directive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Directive::Data => f.write_str(".data"),
            Directive::Text => f.write_str(".text"),
            Directive::Word(vals) => {
                f.write_str(".word ")?;
                for (i, v) in vals.iter().enumerate() {
                    if i != 0 { f.write_str(", ")?; }
                    write!(f, "{v}")?;
                }
                Ok(())
            },
            Directive::Asciiz(s) => write!(f, ".asciiz {s:?}"),
            Directive::Globl(label) => write!(f, ".globl {label}"),
        }
    }
}

/// Either an instruction or a directive.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub enum StmtKind {
    #[allow(missing_docs)]
    Instr(AsmInstr),
    #[allow(missing_docs)]
    Directive(Directive),
    /// Labels with nothing after them (only occurs at the end of a file).
    Empty
}
impl std::fmt::Display for StmtKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StmtKind::Instr(i) => i.fmt(f),
            StmtKind::Directive(d) => d.fmt(f),
            StmtKind::Empty => Ok(()),
        }
    }
}

/// A "statement" in MIPS assembly.
///
/// While not a defined term in MIPS assembly, a statement here refers to
/// either an instruction or a directive, and the labels that are associated with it.
///
/// Labels may appear on the same line as the statement or on preceding lines
/// (`main:` on its own line labels the next statement).
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct Stmt {
    /// The labels.
    pub labels: Vec<Label>,
    /// The instruction or directive.
    pub nucleus: StmtKind,
    /// The span of the nucleus.
    pub span: Range<usize>
}
impl std::fmt::Display for Stmt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for label in &self.labels {
            write!(f, "{label}: ")?;
        }
        self.nucleus.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::reg_consts::{SP, T0, T1, T2, ZERO};
    use crate::ast::{Label, UOffset};

    use super::{AsmInstr, Directive, MemOperand, Mnemonic};

    #[test]
    fn test_mnemonic_roundtrip() {
        for &m in Mnemonic::ALL {
            assert_eq!(m.as_str().parse::<Mnemonic>(), Ok(m));
            assert_eq!(m.as_str().to_uppercase().parse::<Mnemonic>(), Ok(m));
        }
        assert_eq!(Mnemonic::ALL.len(), 25);

        let err = "frobnicate".parse::<Mnemonic>().unwrap_err();
        assert_eq!(err.0, "frobnicate");
    }

    #[test]
    fn test_instr_display() {
        let add = AsmInstr::Add(T2, T0, T1);
        assert_eq!(add.to_string(), "add $t2, $t0, $t1");
        assert_eq!(add.mnemonic(), Mnemonic::Add);

        let addi = AsmInstr::Addi(T0, ZERO, -5);
        assert_eq!(addi.to_string(), "addi $t0, $zero, -5");

        let sll = AsmInstr::Sll(T0, T1, UOffset::new_trunc(2));
        assert_eq!(sll.to_string(), "sll $t0, $t1, 2");

        let lw = AsmInstr::Lw(T0, MemOperand::Offset { offset: -4, base: SP });
        assert_eq!(lw.to_string(), "lw $t0, -4($sp)");

        let sw = AsmInstr::Sw(T0, MemOperand::Label(Label::new("var".to_string(), 0..3)));
        assert_eq!(sw.to_string(), "sw $t0, var");

        assert_eq!(AsmInstr::Syscall.to_string(), "syscall");
    }

    #[test]
    fn test_directive_len() {
        assert_eq!(Directive::Word(vec![1, 2, 3]).byte_len(), 12);
        assert_eq!(Directive::Asciiz("Hi\n".to_string()).byte_len(), 4);
        assert_eq!(Directive::Asciiz(String::new()).byte_len(), 1);
        assert_eq!(Directive::Data.byte_len(), 0);
        assert_eq!(Directive::Word(vec![1, -2]).to_string(), ".word 1, -2");
    }
}
