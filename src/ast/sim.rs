//! This module is used for holding simulation instructions ([`SimInstr`]),
//! which are instructions that directly map to bytecode.
//!
//! For instructions that map to assembly code, refer to [`asm::AsmInstr`].
//!
//! [`asm::AsmInstr`]: crate::ast::asm::AsmInstr
use super::reg_consts::ZERO;
use super::{IOffset, Reg, UOffset};

const OP_SPECIAL:  u32 = 0b000000;
const OP_SPECIAL2: u32 = 0b011100;
const OP_J:    u32 = 0b000010;
const OP_JAL:  u32 = 0b000011;
const OP_BEQ:  u32 = 0b000100;
const OP_BNE:  u32 = 0b000101;
const OP_ADDI: u32 = 0b001000;
const OP_ANDI: u32 = 0b001100;
const OP_ORI:  u32 = 0b001101;
const OP_LUI:  u32 = 0b001111;
const OP_LW:   u32 = 0b100011;
const OP_SW:   u32 = 0b101011;

const FN_SLL:  u32 = 0b000000;
const FN_SRL:  u32 = 0b000010;
const FN_JR:   u32 = 0b001000;
const FN_SYSCALL: u32 = 0b001100;
const FN_ADD:  u32 = 0b100000;
const FN_SUB:  u32 = 0b100010;
const FN_AND:  u32 = 0b100100;
const FN_OR:   u32 = 0b100101;
const FN_XOR:  u32 = 0b100110;
const FN_NOR:  u32 = 0b100111;
const FN_SLT:  u32 = 0b101010;
const FN_MUL:  u32 = 0b000010;

/// The three binary layouts of a machine instruction.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Format {
    /// `opcode(6) rs(5) rt(5) rd(5) shamt(5) funct(6)`
    R,
    /// `opcode(6) rs(5) rt(5) immediate(16)`
    I,
    /// `opcode(6) target(26)`
    J,
}

/// An enum representing all of the possible instructions in machine code.
///
/// Each variant encodes to exactly one 32-bit word.
/// Operands are in assembly order (e.g., `Addi(rt, rs, imm)` for `addi rt, rs, imm`).
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum SimInstr {
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
    /// `syscall`
    Syscall,
    /// `addi rt, rs, imm`
    Addi(Reg, Reg, IOffset<16>),
    /// `andi rt, rs, imm`
    Andi(Reg, Reg, UOffset<16>),
    /// `ori rt, rs, imm`
    Ori(Reg, Reg, UOffset<16>),
    /// `lui rt, imm`
    Lui(Reg, UOffset<16>),
    /// `lw rt, offset(base)`
    Lw(Reg, Reg, IOffset<16>),
    /// `sw rt, offset(base)`
    Sw(Reg, Reg, IOffset<16>),
    /// `beq rs, rt, offset` where offset is in words, relative to the next instruction
    Beq(Reg, Reg, IOffset<16>),
    /// `bne rs, rt, offset` where offset is in words, relative to the next instruction
    Bne(Reg, Reg, IOffset<16>),
    /// `j target` where target is the word address
    J(UOffset<26>),
    /// `jal target` where target is the word address
    Jal(UOffset<26>),
}

fn r_word(op: u32, rs: Reg, rt: Reg, rd: Reg, shamt: u32, funct: u32) -> u32 {
    (op << 26)
        | (u32::from(rs.reg_no()) << 21)
        | (u32::from(rt.reg_no()) << 16)
        | (u32::from(rd.reg_no()) << 11)
        | ((shamt & 0x1F) << 6)
        | funct
}
fn i_word(op: u32, rs: Reg, rt: Reg, imm: u32) -> u32 {
    (op << 26)
        | (u32::from(rs.reg_no()) << 21)
        | (u32::from(rt.reg_no()) << 16)
        | (imm & 0xFFFF)
}
fn j_word(op: u32, target: u32) -> u32 {
    (op << 26) | (target & 0x03FF_FFFF)
}

impl SimInstr {
    /// Gets the opcode (the top 6 bits) for the given instruction.
    pub fn opcode(&self) -> u8 {
        (self.encode() >> 26) as u8
    }

    /// Gets the binary layout of this instruction.
    pub fn format(&self) -> Format {
        match self {
            SimInstr::J(_) | SimInstr::Jal(_) => Format::J,
            | SimInstr::Addi(..)
            | SimInstr::Andi(..)
            | SimInstr::Ori(..)
            | SimInstr::Lui(..)
            | SimInstr::Lw(..)
            | SimInstr::Sw(..)
            | SimInstr::Beq(..)
            | SimInstr::Bne(..) => Format::I,
            _ => Format::R,
        }
    }

    /// Encodes this instruction as a word.
    ///
    /// ```
    /// # use mips_ensemble::ast::sim::SimInstr;
    /// # use mips_ensemble::ast::reg_consts::{T0, ZERO};
    /// # use mips_ensemble::ast::IOffset;
    /// let instr = SimInstr::Addi(T0, ZERO, IOffset::new_trunc(5));
    /// assert_eq!(instr.encode(), 0x2008_0005);
    /// assert_eq!(instr.to_bin_string(), "00100000000010000000000000000101");
    /// ```
    pub fn encode(&self) -> u32 {
        match *self {
            SimInstr::Add(rd, rs, rt) => r_word(OP_SPECIAL,  rs, rt, rd, 0, FN_ADD),
            SimInstr::Sub(rd, rs, rt) => r_word(OP_SPECIAL,  rs, rt, rd, 0, FN_SUB),
            SimInstr::And(rd, rs, rt) => r_word(OP_SPECIAL,  rs, rt, rd, 0, FN_AND),
            SimInstr::Or(rd, rs, rt)  => r_word(OP_SPECIAL,  rs, rt, rd, 0, FN_OR),
            SimInstr::Slt(rd, rs, rt) => r_word(OP_SPECIAL,  rs, rt, rd, 0, FN_SLT),
            SimInstr::Mul(rd, rs, rt) => r_word(OP_SPECIAL2, rs, rt, rd, 0, FN_MUL),
            SimInstr::Xor(rd, rs, rt) => r_word(OP_SPECIAL,  rs, rt, rd, 0, FN_XOR),
            SimInstr::Nor(rd, rs, rt) => r_word(OP_SPECIAL,  rs, rt, rd, 0, FN_NOR),
            SimInstr::Sll(rd, rt, sa) => r_word(OP_SPECIAL, ZERO, rt, rd, sa.get(), FN_SLL),
            SimInstr::Srl(rd, rt, sa) => r_word(OP_SPECIAL, ZERO, rt, rd, sa.get(), FN_SRL),
            SimInstr::Jr(rs)          => r_word(OP_SPECIAL, rs, ZERO, ZERO, 0, FN_JR),
            SimInstr::Syscall         => r_word(OP_SPECIAL, ZERO, ZERO, ZERO, 0, FN_SYSCALL),
            SimInstr::Addi(rt, rs, imm) => i_word(OP_ADDI, rs, rt, imm.get() as u32),
            SimInstr::Andi(rt, rs, imm) => i_word(OP_ANDI, rs, rt, imm.get()),
            SimInstr::Ori(rt, rs, imm)  => i_word(OP_ORI,  rs, rt, imm.get()),
            SimInstr::Lui(rt, imm)      => i_word(OP_LUI,  ZERO, rt, imm.get()),
            SimInstr::Lw(rt, base, off) => i_word(OP_LW, base, rt, off.get() as u32),
            SimInstr::Sw(rt, base, off) => i_word(OP_SW, base, rt, off.get() as u32),
            SimInstr::Beq(rs, rt, off)  => i_word(OP_BEQ, rs, rt, off.get() as u32),
            SimInstr::Bne(rs, rt, off)  => i_word(OP_BNE, rs, rt, off.get() as u32),
            SimInstr::J(target)   => j_word(OP_J, target.get()),
            SimInstr::Jal(target) => j_word(OP_JAL, target.get()),
        }
    }

    /// Renders this instruction as 32 `0`/`1` characters (most significant bit first).
    pub fn to_bin_string(&self) -> String {
        format!("{:032b}", self.encode())
    }

    /// Converts a word into a simulator instruction.
    ///
    /// Fields that the instruction does not use must be zero.
    ///
    /// ```
    /// # use mips_ensemble::ast::sim::SimInstr;
    /// # use mips_ensemble::ast::reg_consts::RA;
    /// assert_eq!(SimInstr::decode(0x03E0_0008), Ok(SimInstr::Jr(RA)));
    /// assert!(SimInstr::decode(0xFFFF_FFFF).is_err());
    /// ```
    pub fn decode(word: u32) -> Result<Self, DecodeErr> {
        let op = word >> 26;
        let rs = Reg(((word >> 21) & 0x1F) as u8);
        let rt = Reg(((word >> 16) & 0x1F) as u8);
        let rd = Reg(((word >> 11) & 0x1F) as u8);
        let shamt = (word >> 6) & 0x1F;
        let funct = word & 0x3F;
        let imm = word & 0xFFFF;
        let simm = IOffset::new_trunc(imm as i32);
        let uimm = UOffset::new_trunc(imm);

        let require = |cond: bool, instr: SimInstr| match cond {
            true  => Ok(instr),
            false => Err(DecodeErr::InvalidFormat),
        };

        match op {
            OP_SPECIAL => match funct {
                FN_ADD => require(shamt == 0, SimInstr::Add(rd, rs, rt)),
                FN_SUB => require(shamt == 0, SimInstr::Sub(rd, rs, rt)),
                FN_AND => require(shamt == 0, SimInstr::And(rd, rs, rt)),
                FN_OR  => require(shamt == 0, SimInstr::Or(rd, rs, rt)),
                FN_SLT => require(shamt == 0, SimInstr::Slt(rd, rs, rt)),
                FN_XOR => require(shamt == 0, SimInstr::Xor(rd, rs, rt)),
                FN_NOR => require(shamt == 0, SimInstr::Nor(rd, rs, rt)),
                FN_SLL => require(rs == ZERO, SimInstr::Sll(rd, rt, UOffset::new_trunc(shamt))),
                FN_SRL => require(rs == ZERO, SimInstr::Srl(rd, rt, UOffset::new_trunc(shamt))),
                FN_JR  => require(word & 0x001F_FFC0 == 0, SimInstr::Jr(rs)),
                FN_SYSCALL => require(word & 0x03FF_FFC0 == 0, SimInstr::Syscall),
                f => Err(DecodeErr::IllegalFunct(f as u8)),
            },
            OP_SPECIAL2 => match funct {
                FN_MUL => require(shamt == 0, SimInstr::Mul(rd, rs, rt)),
                f => Err(DecodeErr::IllegalFunct(f as u8)),
            },
            OP_ADDI => Ok(SimInstr::Addi(rt, rs, simm)),
            OP_ANDI => Ok(SimInstr::Andi(rt, rs, uimm)),
            OP_ORI  => Ok(SimInstr::Ori(rt, rs, uimm)),
            OP_LUI  => require(rs == ZERO, SimInstr::Lui(rt, uimm)),
            OP_LW   => Ok(SimInstr::Lw(rt, rs, simm)),
            OP_SW   => Ok(SimInstr::Sw(rt, rs, simm)),
            OP_BEQ  => Ok(SimInstr::Beq(rs, rt, simm)),
            OP_BNE  => Ok(SimInstr::Bne(rs, rt, simm)),
            OP_J    => Ok(SimInstr::J(UOffset::new_trunc(word))),
            OP_JAL  => Ok(SimInstr::Jal(UOffset::new_trunc(word))),
            o => Err(DecodeErr::IllegalOpcode(o as u8)),
        }
    }

    /// For a branch, computes the target address given the address of the branch itself.
    pub fn branch_target(&self, pc: u32) -> Option<u32> {
        match self {
            SimInstr::Beq(_, _, off) | SimInstr::Bne(_, _, off) => {
                Some(pc.wrapping_add(4).wrapping_add_signed(off.get() << 2))
            },
            _ => None
        }
    }

    /// For a jump, computes the target byte address.
    pub fn jump_target(&self) -> Option<u32> {
        match self {
            SimInstr::J(t) | SimInstr::Jal(t) => Some(t.get() << 2),
            _ => None
        }
    }
}
impl std::fmt::Display for SimInstr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimInstr::Add(rd, rs, rt) => write!(f, "add {rd}, {rs}, {rt}"),
            SimInstr::Sub(rd, rs, rt) => write!(f, "sub {rd}, {rs}, {rt}"),
            SimInstr::And(rd, rs, rt) => write!(f, "and {rd}, {rs}, {rt}"),
            SimInstr::Or(rd, rs, rt)  => write!(f, "or {rd}, {rs}, {rt}"),
            SimInstr::Slt(rd, rs, rt) => write!(f, "slt {rd}, {rs}, {rt}"),
            SimInstr::Mul(rd, rs, rt) => write!(f, "mul {rd}, {rs}, {rt}"),
            SimInstr::Xor(rd, rs, rt) => write!(f, "xor {rd}, {rs}, {rt}"),
            SimInstr::Nor(rd, rs, rt) => write!(f, "nor {rd}, {rs}, {rt}"),
            SimInstr::Sll(rd, rt, sa) => write!(f, "sll {rd}, {rt}, {sa}"),
            SimInstr::Srl(rd, rt, sa) => write!(f, "srl {rd}, {rt}, {sa}"),
            SimInstr::Jr(rs)          => write!(f, "jr {rs}"),
            SimInstr::Syscall         => f.write_str("syscall"),
            SimInstr::Addi(rt, rs, imm) => write!(f, "addi {rt}, {rs}, {imm}"),
            SimInstr::Andi(rt, rs, imm) => write!(f, "andi {rt}, {rs}, {:#x}", imm.get()),
            SimInstr::Ori(rt, rs, imm)  => write!(f, "ori {rt}, {rs}, {:#x}", imm.get()),
            SimInstr::Lui(rt, imm)      => write!(f, "lui {rt}, {:#x}", imm.get()),
            SimInstr::Lw(rt, base, off) => write!(f, "lw {rt}, {off}({base})"),
            SimInstr::Sw(rt, base, off) => write!(f, "sw {rt}, {off}({base})"),
            SimInstr::Beq(rs, rt, off)  => write!(f, "beq {rs}, {rt}, {off}"),
            SimInstr::Bne(rs, rt, off)  => write!(f, "bne {rs}, {rt}, {off}"),
            SimInstr::J(t)   => write!(f, "j {:#010x}", t.get() << 2),
            SimInstr::Jal(t) => write!(f, "jal {:#010x}", t.get() << 2),
        }
    }
}

/// Errors from decoding a word with [`SimInstr::decode`].
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum DecodeErr {
    /// The opcode is not one of the supported opcodes.
    IllegalOpcode(u8),
    /// The opcode is an R-type opcode, but the function code is unsupported.
    IllegalFunct(u8),
    /// The instruction is recognized, but a field it does not use was nonzero.
    InvalidFormat,
}
impl std::fmt::Display for DecodeErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeErr::IllegalOpcode(op) => write!(f, "illegal opcode {op:06b}"),
            DecodeErr::IllegalFunct(fc)  => write!(f, "illegal function code {fc:06b}"),
            DecodeErr::InvalidFormat     => f.write_str("invalid instruction format"),
        }
    }
}
impl std::error::Error for DecodeErr {}
impl crate::err::Error for DecodeErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        None
    }

    fn category(&self) -> crate::err::ErrCategory {
        crate::err::ErrCategory::Encoding
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::reg_consts::{RA, SP, T0, T1, T2, ZERO};
    use crate::ast::{IOffset, UOffset};

    use super::{DecodeErr, Format, SimInstr};

    fn assert_encodes(instr: SimInstr, word: u32) {
        assert_eq!(instr.encode(), word, "{instr} encoded incorrectly");
        assert_eq!(SimInstr::decode(word), Ok(instr), "{word:#010x} decoded incorrectly");
    }

    #[test]
    fn test_known_encodings() {
        assert_encodes(SimInstr::Addi(T0, ZERO, IOffset::new_trunc(5)), 0x2008_0005);
        assert_encodes(SimInstr::Add(T2, T0, T1), 0x0109_5020);
        assert_encodes(SimInstr::Mul(T2, T0, T1), 0x7109_5002);
        assert_encodes(SimInstr::Lui(T0, UOffset::new_trunc(0x1001)), 0x3C08_1001);
        assert_encodes(SimInstr::Ori(T0, T0, UOffset::new_trunc(0)), 0x3508_0000);
        assert_encodes(SimInstr::Lw(T0, SP, IOffset::new_trunc(4)), 0x8FA8_0004);
        assert_encodes(SimInstr::Sw(T0, ZERO, IOffset::new_trunc(4)), 0xAC08_0004);
        assert_encodes(SimInstr::Sll(T0, T1, UOffset::new_trunc(2)), 0x0009_4080);
        assert_encodes(SimInstr::Srl(T0, T1, UOffset::new_trunc(3)), 0x0009_40C2);
        assert_encodes(SimInstr::Jr(RA), 0x03E0_0008);
        assert_encodes(SimInstr::Beq(T0, T1, IOffset::new_trunc(-3)), 0x1109_FFFD);
        assert_encodes(SimInstr::J(UOffset::new_trunc(4)), 0x0800_0004);
        assert_encodes(SimInstr::Jal(UOffset::new_trunc(4)), 0x0C00_0004);
        assert_encodes(SimInstr::Syscall, 0x0000_000C);
    }

    #[test]
    fn test_bin_string() {
        assert_eq!(SimInstr::Syscall.to_bin_string(), "00000000000000000000000000001100");
        assert_eq!(SimInstr::J(UOffset::new_trunc(1)).to_bin_string().len(), 32);
    }

    #[test]
    fn test_format() {
        assert_eq!(SimInstr::Add(T2, T0, T1).format(), Format::R);
        assert_eq!(SimInstr::Syscall.format(), Format::R);
        assert_eq!(SimInstr::Lw(T0, SP, IOffset::new_trunc(0)).format(), Format::I);
        assert_eq!(SimInstr::Jal(UOffset::new_trunc(0)).format(), Format::J);
        assert_eq!(SimInstr::Jal(UOffset::new_trunc(0)).opcode(), 0b000011);
    }

    #[test]
    fn test_branch_roundtrip() {
        // beq at 0x14 targeting 0x08: (0x08 - 0x18) >> 2 = -4
        let beq = SimInstr::Beq(T0, T1, IOffset::new_trunc((0x08 - 0x18) >> 2));
        let decoded = SimInstr::decode(beq.encode()).unwrap();
        assert_eq!(decoded.branch_target(0x14), Some(0x08));

        // forward
        let bne = SimInstr::Bne(T0, ZERO, IOffset::new_trunc((0x20 - 0x08) >> 2));
        let decoded = SimInstr::decode(bne.encode()).unwrap();
        assert_eq!(decoded.branch_target(0x04), Some(0x20));

        let j = SimInstr::J(UOffset::new_trunc(0x30 >> 2));
        assert_eq!(SimInstr::decode(j.encode()).unwrap().jump_target(), Some(0x30));
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(SimInstr::decode(0xFC00_0000), Err(DecodeErr::IllegalOpcode(0b111111)));
        assert_eq!(SimInstr::decode(0x0000_0001), Err(DecodeErr::IllegalFunct(0b000001)));
        assert_eq!(SimInstr::decode(0x7000_0000), Err(DecodeErr::IllegalFunct(0)));
        // syscall with a register field set
        assert_eq!(SimInstr::decode(0x0100_000C), Err(DecodeErr::InvalidFormat));
        // lui with rs set
        assert_eq!(SimInstr::decode(0x3C28_0001), Err(DecodeErr::InvalidFormat));
    }
}
