//! Assembling assembly source ASTs into programs.
//!
//! This module is used to convert source ASTs (`Vec<`[`Stmt`]`>`) into programs
//! that can be executed by the simulator.
//!
//! The assembler module notably consists of:
//! - [`assemble`] and [`assemble_debug`]: The main functions which assemble the statements into a program.
//! - [`assemble_src`]: Parses and assembles source code in one go.
//! - [`SymbolTable`]: a struct holding the symbol table, which stores location information for labels after the first assembler pass
//! - [`Program`]: a struct holding the assembled program, which can be loaded into the simulator and executed
//!
//! # Layout
//!
//! The text segment starts at [`TEXT_BASE`] and every instruction takes up one 4-byte slot,
//! even pseudo-instructions that expand into two machine words (`li`, `la`).
//! Branch offsets and jump targets are computed against these logical slots.
//!
//! The data segment starts at [`DATA_BASE`]. `.word` takes 4 bytes per value
//! and `.asciiz` takes 1 byte per character, plus a NUL terminator. There is no alignment padding.
//!
//! [`Stmt`]: crate::ast::asm::Stmt

use std::borrow::Cow;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

use crate::ast::asm::{AsmInstr, Directive, MemOperand, Stmt, StmtKind};
use crate::ast::reg_consts::ZERO;
use crate::ast::sim::SimInstr;
use crate::ast::{IOffset, Label, OffsetNewErr, UOffset};
use crate::err::{ErrCategory, ErrSpan};
use crate::parse::{parse_ast, ParseErr};

/// The address of the first instruction.
pub const TEXT_BASE: u32 = 0;
/// The address of the first byte of the data segment.
pub const DATA_BASE: u32 = 0x1001_0000;

/// Assembles an assembly source code AST into a program.
///
/// This function assembles the source AST *without* keeping the source text,
/// so instructions are described by their canonical form.
///
/// # Example
/// ```
/// use mips_ensemble::parse::parse_ast;
/// use mips_ensemble::asm::assemble;
///
/// let src = "
///     main: addi $t0, $zero, 5
///     syscall
/// ";
/// let ast = parse_ast(src).unwrap();
///
/// let program = assemble(ast).unwrap();
/// assert_eq!(program.len(), 2);
/// assert_eq!(program.instr_text(0).as_deref(), Some("addi $t0, $zero, 5"));
/// ```
pub fn assemble(ast: Vec<Stmt>) -> Result<Program, AsmErr> {
    let sym = SymbolTable::new(&ast)?;
    Program::new(ast, sym, None)
}
/// Assembles an assembly source code AST into a program.
///
/// This function assembles the source AST *and* keeps the source text,
/// so instructions are described by the text they were written as.
///
/// # Example
/// ```
/// use mips_ensemble::parse::parse_ast;
/// use mips_ensemble::asm::assemble_debug;
///
/// let src = "
///     main: ADDI $8, $0, 5
///     syscall
/// ";
/// let ast = parse_ast(src).unwrap();
///
/// let program = assemble_debug(ast, src).unwrap();
/// assert_eq!(program.instr_text(0).as_deref(), Some("ADDI $8, $0, 5"));
/// ```
pub fn assemble_debug(ast: Vec<Stmt>, src: &str) -> Result<Program, AsmErr> {
    let sym = SymbolTable::new(&ast)?;
    Program::new(ast, sym, Some(SourceInfo::new(src)))
}
/// Parses and assembles source code into a program (with source text kept).
///
/// On failure, the error carries the text of the offending line.
///
/// # Example
/// ```
/// use mips_ensemble::asm::assemble_src;
/// use mips_ensemble::err::{Error, ErrCategory};
///
/// let program = assemble_src("li $t0, 42\nmove $t1, $t0").unwrap();
/// assert_eq!(program.len(), 2);
///
/// let err = assemble_src("li $t0, 42\nfrob $t1, $t0").unwrap_err();
/// assert_eq!(err.category(), ErrCategory::UnsupportedOperation);
/// assert_eq!(err.line_text, "frob $t1, $t0");
/// ```
pub fn assemble_src(src: &str) -> Result<Program, SourceErr> {
    let ast = parse_ast(src)
        .map_err(|e| SourceErr::new(SourceErrKind::Parse(e), src))?;
    assemble_debug(ast, src)
        .map_err(|e| SourceErr::new(SourceErrKind::Asm(e), src))
}

/// Kinds of errors that can occur from assembling given assembly code.
///
/// See [`AsmErr`] for this error type with span information included.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum AsmErrKind {
    /// There were multiple labels of the same name (pass 1).
    OverlappingLabels,
    /// A `.text` block restarted at an address that already holds an instruction (pass 2).
    OverlappingInstrs,
    /// An instruction was placed in the data segment (pass 1).
    InstrInData,
    /// A data directive (`.word`, `.asciiz`) was placed in the text segment (pass 1).
    DataInText,
    /// The data segment grew past the end of memory (pass 1).
    DataOverflow,
    /// Creating the offset to replace a label caused overflow (pass 2).
    OffsetNewErr(OffsetNewErr),
    /// Label did not have an assigned address (pass 2).
    CouldNotFindLabel,
}
impl std::fmt::Display for AsmErrKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OverlappingLabels => f.write_str("label was defined multiple times"),
            Self::OverlappingInstrs => f.write_str("instruction overlaps an earlier instruction"),
            Self::InstrInData       => f.write_str("instruction in data segment"),
            Self::DataInText        => f.write_str("data directive in text segment"),
            Self::DataOverflow      => f.write_str("data segment exceeds memory"),
            Self::OffsetNewErr(e)   => e.fmt(f),
            Self::CouldNotFindLabel => f.write_str("label could not be found"),
        }
    }
}

/// Error from assembling given assembly code.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct AsmErr {
    /// The value with a span.
    pub kind: AsmErrKind,
    /// The span in the source associated with this value.
    pub span: ErrSpan
}
impl AsmErr {
    /// Creates a new [`AsmErr`].
    pub fn new<E: Into<ErrSpan>>(kind: AsmErrKind, span: E) -> Self {
        AsmErr { kind, span: span.into() }
    }
}
impl std::fmt::Display for AsmErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.kind.fmt(f)
    }
}
impl std::error::Error for AsmErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            AsmErrKind::OffsetNewErr(e) => Some(e),
            _ => None
        }
    }
}
impl crate::err::Error for AsmErr {
    fn span(&self) -> Option<ErrSpan> {
        Some(self.span.clone())
    }

    fn help(&self) -> Option<Cow<str>> {
        match &self.kind {
            AsmErrKind::OverlappingLabels => Some("labels must be unique within a file, try renaming one of the labels".into()),
            AsmErrKind::OverlappingInstrs => Some(".text restarts at address 0, so keep all instructions in one .text block".into()),
            AsmErrKind::InstrInData       => Some("try adding a .text directive before this instruction".into()),
            AsmErrKind::DataInText        => Some("try adding a .data directive before this directive".into()),
            AsmErrKind::DataOverflow      => None,
            AsmErrKind::OffsetNewErr(e)   => crate::err::Error::help(e),
            AsmErrKind::CouldNotFindLabel => Some("try adding this label before an instruction or directive".into()),
        }
    }

    fn category(&self) -> ErrCategory {
        match self.kind {
            | AsmErrKind::OverlappingLabels
            | AsmErrKind::OverlappingInstrs
            | AsmErrKind::InstrInData
            | AsmErrKind::DataInText
            | AsmErrKind::DataOverflow => ErrCategory::Syntax,
            AsmErrKind::OffsetNewErr(_) => ErrCategory::Encoding,
            AsmErrKind::CouldNotFindLabel => ErrCategory::UnresolvedLabel,
        }
    }
}

/// Either stage of [`assemble_src`] failing.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum SourceErrKind {
    /// Parsing failed.
    Parse(ParseErr),
    /// Assembling failed.
    Asm(AsmErr),
}
impl SourceErrKind {
    fn as_err(&self) -> &dyn crate::err::Error {
        match self {
            SourceErrKind::Parse(e) => e,
            SourceErrKind::Asm(e) => e,
        }
    }
}

/// Error from parsing or assembling source code, along with the offending source line.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SourceErr {
    /// The underlying error.
    pub kind: SourceErrKind,
    /// The line the error occurred on (0-indexed).
    pub line: usize,
    /// The text of the offending line (without surrounding whitespace).
    pub line_text: String,
}
impl SourceErr {
    fn new(kind: SourceErrKind, src: &str) -> Self {
        let info = SourceInfo::new(src);
        let start = kind.as_err().span()
            .and_then(|s| s.first())
            .map_or(0, |r| r.start);
        let line = info.get_line(start);
        let line_text = info.read_line(line).unwrap_or("").to_string();

        SourceErr { kind, line, line_text }
    }
}
impl std::fmt::Display for SourceErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (line {}: `{}`)", self.kind.as_err(), self.line + 1, self.line_text)
    }
}
impl std::error::Error for SourceErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            SourceErrKind::Parse(e) => Some(e),
            SourceErrKind::Asm(e) => Some(e),
        }
    }
}
impl crate::err::Error for SourceErr {
    fn span(&self) -> Option<ErrSpan> {
        self.kind.as_err().span()
    }

    fn help(&self) -> Option<Cow<str>> {
        self.kind.as_err().help()
    }

    fn category(&self) -> ErrCategory {
        self.kind.as_err().category()
    }
}

/// Struct holding the source string and contains helpers
/// to index lines and to query position information from a source string.
#[derive(PartialEq, Eq, Clone)]
pub struct SourceInfo {
    /// The source code.
    src: String,
    /// The index of each new line in source code.
    nl_indices: Vec<usize>
}
impl std::fmt::Debug for SourceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceInfo")
            .field("nl_indices", &self.nl_indices)
            .finish_non_exhaustive()
    }
}
impl SourceInfo {
    /// Computes the source info from a given string.
    pub fn new(src: &str) -> Self {
        let nl_indices: Vec<_> = src
            .match_indices('\n')
            .map(|(i, _)| i)
            .chain([src.len()])
            .collect();

        Self { src: src.to_string(), nl_indices }
    }

    /// Returns the entire source.
    pub fn source(&self) -> &str {
        &self.src
    }

    /// Counts the number of lines in the source string.
    pub fn count_lines(&self) -> usize {
        self.nl_indices.len()
    }

    /// Gets the character range for the provided line, excluding any whitespace.
    ///
    /// This returns None if line is not in the interval `[0, number of lines)`.
    pub fn line_span(&self, line: usize) -> Option<Range<usize>> {
        if line >= self.count_lines() { return None; }

        let start = match line {
            0 => 0,
            _ => self.nl_indices[line - 1] + 1
        };
        let end = self.nl_indices[line];

        let text = &self.src[start..end];
        let lead = text.len() - text.trim_start().len();
        let trail = text.len() - text.trim_end().len();
        match lead == text.len() {
            true  => Some(start..start),
            false => Some((start + lead)..(end - trail)),
        }
    }

    /// Reads a line from source.
    ///
    /// This returns None if line is not in the interval `[0, number of lines)`.
    pub fn read_line(&self, line: usize) -> Option<&str> {
        self.line_span(line).map(|r| &self.src[r])
    }

    /// Gets the (0-indexed) line number of a character index.
    pub fn get_line(&self, index: usize) -> usize {
        self.nl_indices.partition_point(|&nl| nl < index)
    }

    /// Calculates the line and character number for a given character index.
    pub fn get_pos_pair(&self, index: usize) -> (usize, usize) {
        let lno = self.get_line(index);
        let lstart = match lno {
            0 => 0,
            _ => self.nl_indices.get(lno - 1).map_or(0, |&i| i + 1)
        };
        (lno, index.saturating_sub(lstart))
    }
}

/// Which segment a label or statement is located in.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Segment {
    /// The instruction segment.
    Text,
    /// The data segment.
    Data,
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
struct SymbolData {
    addr: u32,
    src_start: usize,
    segment: Segment,
}
impl SymbolData {
    /// Calculates the source range of this symbol, given the name of the label.
    fn span(&self, label: &str) -> Range<usize> {
        self.src_start .. (self.src_start + label.len())
    }
}

/// The symbol table created in the first assembler pass
/// that maps each label to its address.
///
/// Labels in the text segment resolve to the address of an instruction slot
/// (starting at [`TEXT_BASE`], 4 bytes per instruction).
/// Labels in the data segment resolve to a data address (starting at [`DATA_BASE`]).
///
/// The symbol table is kept in the [`Program`], so it can be used
/// to resolve branch and jump targets during simulation.
#[derive(PartialEq, Eq, Clone, Debug, Default)]
pub struct SymbolTable {
    /// A mapping from label to address and span of the label.
    label_map: HashMap<String, SymbolData>,
}

impl SymbolTable {
    /// Creates a new symbol table.
    ///
    /// This performs the first assembler pass, calculating the address of
    /// labels at each provided statement. Every `.text` directive restarts
    /// instruction addresses at [`TEXT_BASE`].
    ///
    /// ## Example
    /// ```
    /// use mips_ensemble::parse::parse_ast;
    /// use mips_ensemble::asm::SymbolTable;
    ///
    /// let src = "
    ///     .data
    ///     msg: .asciiz \"Hi\"
    ///     num: .word 42
    ///     .text
    ///     main: la $a0, msg
    ///     loop: j loop
    /// ";
    /// let ast = parse_ast(src).unwrap();
    ///
    /// let sym = SymbolTable::new(&ast).unwrap();
    /// assert_eq!(sym.lookup_label("msg"), Some(0x1001_0000));
    /// assert_eq!(sym.lookup_label("num"), Some(0x1001_0003));
    /// assert_eq!(sym.lookup_label("main"), Some(0));
    /// assert_eq!(sym.lookup_label("loop"), Some(4));
    /// assert_eq!(sym.lookup_label("LOOP"), None);
    /// ```
    pub fn new(stmts: &[Stmt]) -> Result<Self, AsmErr> {
        struct Cursor {
            segment: Segment,
            // The next instruction's address.
            pc: u32,
            // The next data address.
            data: u32,
        }
        impl Cursor {
            fn addr(&self) -> u32 {
                match self.segment {
                    Segment::Text => self.pc,
                    Segment::Data => self.data,
                }
            }
        }

        fn add_label(
            labels: &mut HashMap<String, SymbolData>,
            label: &Label,
            addr: u32,
            segment: Segment
        ) -> Result<(), AsmErr> {
            match labels.entry(label.name.clone()) {
                // Two labels with different addresses. Conflict.
                Entry::Occupied(e) if e.get().addr != addr => {
                    let span1 = e.get().span(e.key());
                    let span2 = label.span();
                    Err(AsmErr::new(AsmErrKind::OverlappingLabels, [span1, span2]))
                },
                // Two labels with same address. No conflict.
                Entry::Occupied(_) => Ok(()),
                // New label.
                Entry::Vacant(e) => {
                    e.insert(SymbolData { addr, src_start: label.span().start, segment });
                    Ok(())
                }
            }
        }

        let mut cursor = Cursor { segment: Segment::Text, pc: TEXT_BASE, data: DATA_BASE };
        let mut label_map = HashMap::new();

        for stmt in stmts {
            for label in &stmt.labels {
                add_label(&mut label_map, label, cursor.addr(), cursor.segment)?;
            }

            match (&stmt.nucleus, cursor.segment) {
                (StmtKind::Directive(Directive::Data), _) => cursor.segment = Segment::Data,
                (StmtKind::Directive(Directive::Text), _) => {
                    cursor.segment = Segment::Text;
                    cursor.pc = TEXT_BASE;
                },
                (StmtKind::Directive(d @ (Directive::Word(_) | Directive::Asciiz(_))), Segment::Data) => {
                    cursor.data = cursor.data.checked_add(d.byte_len())
                        .ok_or_else(|| AsmErr::new(AsmErrKind::DataOverflow, stmt.span.clone()))?;
                },
                (StmtKind::Directive(Directive::Word(_) | Directive::Asciiz(_)), Segment::Text) => {
                    return Err(AsmErr::new(AsmErrKind::DataInText, stmt.span.clone()));
                },
                (StmtKind::Directive(Directive::Globl(_)), _) => {},
                (StmtKind::Instr(_), Segment::Text) => cursor.pc = cursor.pc.wrapping_add(4),
                (StmtKind::Instr(_), Segment::Data) => {
                    return Err(AsmErr::new(AsmErrKind::InstrInData, stmt.span.clone()));
                },
                (StmtKind::Empty, _) => {},
            }
        }

        Ok(SymbolTable { label_map })
    }

    /// Gets the address of a given label (if it exists).
    ///
    /// Labels are case-sensitive.
    pub fn lookup_label(&self, label: &str) -> Option<u32> {
        self.label_map.get(label).map(|sym_data| sym_data.addr)
    }

    /// Gets the segment a given label is defined in (if it exists).
    pub fn label_segment(&self, label: &str) -> Option<Segment> {
        self.label_map.get(label).map(|sym_data| sym_data.segment)
    }

    /// Gets a label at a given text address (if one exists).
    ///
    /// If multiple labels share the address, the one defined first in source is returned.
    pub fn rev_lookup_label(&self, addr: u32) -> Option<&str> {
        self.label_map.iter()
            .filter(|(_, d)| d.segment == Segment::Text && d.addr == addr)
            .min_by_key(|(_, d)| d.src_start)
            .map(|(label, _)| &**label)
    }

    /// Gets the source span of a given label (if it exists).
    pub fn get_label_source(&self, label: &str) -> Option<Range<usize>> {
        self.label_map.get(label)
            .map(|data| data.span(label))
    }

    /// Gets an iterable of the mapping from labels to addresses.
    pub fn label_iter(&self) -> impl Iterator<Item=(&str, u32)> + '_ {
        self.label_map.iter()
            .map(|(label, sym_data)| (&**label, sym_data.addr))
    }
}

/// Computes the branch offset (in words) from the instruction at `pc` to the given label.
///
/// Labels that don't exist anywhere are encoded with a zero offset;
/// the simulator reports them if the branch is ever taken.
fn branch_offset(label: &Label, pc: u32, sym: &SymbolTable) -> Result<IOffset<16>, AsmErr> {
    let Some(addr) = sym.lookup_label(&label.name) else {
        return Ok(IOffset::new_trunc(0));
    };

    let words = (i64::from(addr) - (i64::from(pc) + 4)) >> 2;
    i32::try_from(words)
        .map_err(|_| OffsetNewErr::CannotFitSigned(16))
        .and_then(IOffset::new)
        .map_err(|e| AsmErr::new(AsmErrKind::OffsetNewErr(e), label.span()))
}

/// Computes the jump target field for the given label.
///
/// Labels that don't exist anywhere are encoded as target 0;
/// the simulator reports them if the jump is ever executed.
fn jump_target(label: &Label, sym: &SymbolTable) -> UOffset<26> {
    let addr = sym.lookup_label(&label.name).unwrap_or(0);
    UOffset::new_trunc(addr >> 2)
}

/// Looks up the address of a label that must exist.
fn resolve(label: &Label, sym: &SymbolTable) -> Result<u32, AsmErr> {
    sym.lookup_label(&label.name)
        .ok_or_else(|| AsmErr::new(AsmErrKind::CouldNotFindLabel, label.span()))
}

/// Loads a full 32-bit value into a register with `lui` + `ori`.
fn lui_ori(rd: crate::ast::Reg, value: u32) -> Vec<SimInstr> {
    vec![
        SimInstr::Lui(rd, UOffset::new_trunc(value >> 16)),
        SimInstr::Ori(rd, rd, UOffset::new_trunc(value & 0xFFFF)),
    ]
}

impl AsmInstr {
    /// Converts an ASM instruction into simulator instructions ([`SimInstr`])
    /// by resolving labels and expanding pseudo-instructions.
    ///
    /// Most instructions produce exactly one machine instruction.
    /// `li` (outside of `[-32768, 65535]`) and `la` produce two (`lui`, then `ori`).
    ///
    /// Parameters:
    /// - `pc`: The address of this instruction
    /// - `sym`: The symbol table
    pub fn to_sim_instrs(&self, pc: u32, sym: &SymbolTable) -> Result<Vec<SimInstr>, AsmErr> {
        let one = match self {
            &AsmInstr::Add(rd, rs, rt) => SimInstr::Add(rd, rs, rt),
            &AsmInstr::Sub(rd, rs, rt) => SimInstr::Sub(rd, rs, rt),
            &AsmInstr::And(rd, rs, rt) => SimInstr::And(rd, rs, rt),
            &AsmInstr::Or(rd, rs, rt)  => SimInstr::Or(rd, rs, rt),
            &AsmInstr::Slt(rd, rs, rt) => SimInstr::Slt(rd, rs, rt),
            &AsmInstr::Mul(rd, rs, rt) => SimInstr::Mul(rd, rs, rt),
            &AsmInstr::Xor(rd, rs, rt) => SimInstr::Xor(rd, rs, rt),
            &AsmInstr::Nor(rd, rs, rt) => SimInstr::Nor(rd, rs, rt),
            &AsmInstr::Sll(rd, rt, sa) => SimInstr::Sll(rd, rt, sa),
            &AsmInstr::Srl(rd, rt, sa) => SimInstr::Srl(rd, rt, sa),
            &AsmInstr::Jr(rs)          => SimInstr::Jr(rs),
            // Immediate fields keep the low 16 bits.
            &AsmInstr::Addi(rt, rs, imm) => SimInstr::Addi(rt, rs, IOffset::new_trunc(imm)),
            &AsmInstr::Andi(rt, rs, imm) => SimInstr::Andi(rt, rs, UOffset::new_trunc(imm as u32)),
            &AsmInstr::Ori(rt, rs, imm)  => SimInstr::Ori(rt, rs, UOffset::new_trunc(imm as u32)),
            &AsmInstr::Lui(rt, imm)      => SimInstr::Lui(rt, UOffset::new_trunc(imm as u32)),
            &AsmInstr::Li(rd, imm) => match (-32768..=65535).contains(&imm) {
                true  => SimInstr::Addi(rd, ZERO, IOffset::new_trunc(imm)),
                false => return Ok(lui_ori(rd, imm as u32)),
            },
            AsmInstr::La(rd, label) => return Ok(lui_ori(*rd, resolve(label, sym)?)),
            AsmInstr::Lw(rt, op) | AsmInstr::Sw(rt, op) => {
                let (base, off) = match op {
                    MemOperand::Offset { offset, base } => (*base, *offset),
                    MemOperand::Label(label) => (ZERO, resolve(label, sym)? as i32),
                };
                // The 16-bit immediate cannot hold a full data address; only the low half is kept.
                let off = IOffset::new_trunc(off);
                match self {
                    AsmInstr::Lw(..) => SimInstr::Lw(*rt, base, off),
                    _ => SimInstr::Sw(*rt, base, off),
                }
            },
            AsmInstr::Beq(rs, rt, label) => SimInstr::Beq(*rs, *rt, branch_offset(label, pc, sym)?),
            AsmInstr::Bne(rs, rt, label) => SimInstr::Bne(*rs, *rt, branch_offset(label, pc, sym)?),
            AsmInstr::J(label)   => SimInstr::J(jump_target(label, sym)),
            AsmInstr::Jal(label) => SimInstr::Jal(jump_target(label, sym)),
            &AsmInstr::Move(rd, rs) => SimInstr::Add(rd, rs, ZERO),
            AsmInstr::Syscall => SimInstr::Syscall,
        };

        Ok(vec![one])
    }
}

/// One instruction slot of an assembled program.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ProgramInstr {
    /// The instruction, as written.
    pub instr: AsmInstr,
    /// Its machine code (one or two words).
    pub words: Vec<SimInstr>,
    /// The span of the instruction in source.
    pub span: Range<usize>,
}

/// An assembled program.
///
/// This is the final product after assembly source code is fully assembled.
/// This can be loaded in the simulator to run the assembled code.
///
/// It consists of:
/// - the instructions (in order of their addresses, 4 bytes apart starting at [`TEXT_BASE`]),
/// - the initial contents of the data segment,
/// - the symbol table,
/// - and the source text (if assembled with [`assemble_debug`] or [`assemble_src`]).
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct Program {
    instrs: Vec<ProgramInstr>,
    data: BTreeMap<u32, i32>,
    sym: SymbolTable,
    src: Option<SourceInfo>,
}
impl Program {
    /// Creates a new program from an assembly AST and a symbol table (pass 2).
    fn new(ast: Vec<Stmt>, sym: SymbolTable, src: Option<SourceInfo>) -> Result<Self, AsmErr> {
        let mut instrs = vec![];
        let mut data = BTreeMap::new();
        let mut pc = TEXT_BASE;
        let mut data_cursor = DATA_BASE;

        for stmt in ast {
            match stmt.nucleus {
                StmtKind::Instr(instr) => {
                    let slot = TEXT_BASE.wrapping_add(4 * instrs.len() as u32);
                    if pc != slot {
                        let kind = AsmErrKind::OverlappingInstrs;
                        let earlier = usize::try_from(pc.wrapping_sub(TEXT_BASE) / 4).ok()
                            .and_then(|i| instrs.get(i))
                            .map(|pi: &ProgramInstr| pi.span.clone());
                        return Err(match earlier {
                            Some(earlier) => AsmErr::new(kind, [earlier, stmt.span]),
                            None => AsmErr::new(kind, stmt.span),
                        });
                    }

                    let words = instr.to_sim_instrs(pc, &sym)?;
                    instrs.push(ProgramInstr { instr, words, span: stmt.span });
                    pc = pc.wrapping_add(4);
                },
                StmtKind::Directive(Directive::Word(vals)) => {
                    for v in vals {
                        data.insert(data_cursor, v);
                        data_cursor = data_cursor.wrapping_add(4);
                    }
                },
                StmtKind::Directive(Directive::Asciiz(s)) => {
                    for c in s.chars().chain(std::iter::once('\0')) {
                        data.insert(data_cursor, c as i32);
                        data_cursor = data_cursor.wrapping_add(1);
                    }
                },
                StmtKind::Directive(Directive::Text) => pc = TEXT_BASE,
                // Segment switches were validated in pass 1.
                StmtKind::Directive(Directive::Data | Directive::Globl(_)) => {},
                StmtKind::Empty => {},
            }
        }

        Ok(Program { instrs, data, sym, src })
    }

    /// The number of instructions (not machine words) in the program.
    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    /// Whether the program has no instructions.
    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    /// All of the instructions of the program.
    pub fn instrs(&self) -> &[ProgramInstr] {
        &self.instrs
    }

    /// Gets the instruction at the given address.
    ///
    /// This is `None` if the address is misaligned or past the end of the program.
    pub fn instr_at(&self, pc: u32) -> Option<&ProgramInstr> {
        self.instrs.get(self.index_of(pc)?)
    }

    /// Gets the index of the instruction at the given address.
    ///
    /// This is `None` if the address is misaligned or past the end of the program.
    pub fn index_of(&self, pc: u32) -> Option<usize> {
        let offset = pc.checked_sub(TEXT_BASE)?;
        let index = usize::try_from(offset / 4).ok()?;
        (offset % 4 == 0 && index < self.instrs.len()).then_some(index)
    }

    /// The text of the instruction at the given index.
    ///
    /// If the program was assembled with source, this is the instruction as written.
    /// Otherwise, it is the instruction's canonical form.
    pub fn instr_text(&self, index: usize) -> Option<Cow<str>> {
        let pi = self.instrs.get(index)?;
        let text = match &self.src {
            Some(info) => Cow::from(info.source().get(pi.span.clone())?),
            None => Cow::from(pi.instr.to_string()),
        };
        Some(text)
    }

    /// The initial contents of the data segment.
    pub fn data(&self) -> &BTreeMap<u32, i32> {
        &self.data
    }

    /// The symbol table.
    pub fn symbol_table(&self) -> &SymbolTable {
        &self.sym
    }

    /// The source info, if the program was assembled with source.
    pub fn source_info(&self) -> Option<&SourceInfo> {
        self.src.as_ref()
    }

    /// The assembled program as a listing:
    /// each instruction's address, text, and machine code (one line per word).
    ///
    /// ```
    /// use mips_ensemble::asm::assemble_src;
    ///
    /// let program = assemble_src("li $t0, 0x12345678\nsyscall").unwrap();
    /// let listing = program.listing().to_string();
    /// let lines: Vec<_> = listing.lines().collect();
    ///
    /// assert_eq!(lines.len(), 4); // header + lui + ori + syscall
    /// assert!(lines[1].starts_with("0x00000000  li $t0, 0x12345678"));
    /// assert!(lines[2].ends_with("00110101000010000101011001111000"));
    /// assert!(lines[3].ends_with("00000000000000000000000000001100"));
    /// ```
    pub fn listing(&self) -> Listing<'_> {
        Listing(self)
    }
}

/// A displayable machine-code listing of a [`Program`].
///
/// This is created with [`Program::listing`].
#[derive(Debug, Clone, Copy)]
pub struct Listing<'a>(&'a Program);
impl std::fmt::Display for Listing<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let program = self.0;
        let width = (0..program.len())
            .filter_map(|i| program.instr_text(i).map(|t| t.len()))
            .max()
            .unwrap_or(0)
            .max("Instruction".len());

        writeln!(f, "{:<10}  {:<width$}  Machine code", "Address", "Instruction")?;
        for (i, pi) in program.instrs.iter().enumerate() {
            let addr = TEXT_BASE.wrapping_add(4 * i as u32);
            let text = program.instr_text(i).unwrap_or_default();
            for (j, word) in pi.words.iter().enumerate() {
                match j {
                    0 => writeln!(f, "{addr:#010x}  {text:<width$}  {}", word.to_bin_string())?,
                    _ => writeln!(f, "{:<10}  {:<width$}  {}", "", "", word.to_bin_string())?,
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::asm::AsmInstr;
    use crate::ast::reg_consts::{A0, T0, T1, ZERO};
    use crate::ast::sim::SimInstr;
    use crate::ast::{IOffset, UOffset};
    use crate::err::{ErrCategory, Error};
    use crate::parse::parse_ast;

    use super::{assemble_src, AsmErrKind, Program, SourceErr, SourceErrKind, SymbolTable, DATA_BASE};

    fn assert_asm_fail<T: std::fmt::Debug>(r: Result<T, SourceErr>, kind: AsmErrKind) {
        match r.unwrap_err().kind {
            SourceErrKind::Asm(e) => assert_eq!(e.kind, kind),
            SourceErrKind::Parse(e) => panic!("expected assembly error, got parse error {e}"),
        }
    }
    fn words(program: &Program, index: usize) -> &[SimInstr] {
        &program.instrs()[index].words
    }

    #[test]
    fn test_sym_basic() {
        let src = "
            .data
            hello: .asciiz \"Hi\\n\"
            nums:  .word 1, 2, 3
            after: .word 4
            .text
            main:  addi $v0, $zero, 4
                   la $a0, hello
            loop:  syscall
                   j loop
            end:
        ";

        let program = assemble_src(src).unwrap();
        let sym = program.symbol_table();
        assert_eq!(sym.lookup_label("hello"), Some(DATA_BASE));
        assert_eq!(sym.lookup_label("nums"),  Some(DATA_BASE + 4));
        assert_eq!(sym.lookup_label("after"), Some(DATA_BASE + 16));
        assert_eq!(sym.lookup_label("main"),  Some(0));
        // la expands to two words but still takes one slot
        assert_eq!(sym.lookup_label("loop"),  Some(8));
        assert_eq!(sym.lookup_label("end"),   Some(16));
        assert_eq!(sym.rev_lookup_label(8), Some("loop"));
        assert_eq!(program.len(), 4);
    }

    #[test]
    fn test_data_layout() {
        let src = "
            .data
            msg: .asciiz \"Hi\\n\"
            odd: .asciiz \"abcde\"
            num: .word 42, -1
        ";
        let program = assemble_src(src).unwrap();
        let data = program.data();

        assert_eq!(data.get(&DATA_BASE), Some(&i32::from(b'H')));
        assert_eq!(data.get(&(DATA_BASE + 1)), Some(&i32::from(b'i')));
        assert_eq!(data.get(&(DATA_BASE + 2)), Some(&10));
        assert_eq!(data.get(&(DATA_BASE + 3)), Some(&0));
        assert_eq!(data.get(&(DATA_BASE + 4)), Some(&i32::from(b'a')));
        assert_eq!(data.get(&(DATA_BASE + 9)), Some(&0));

        // no alignment padding
        let num = program.symbol_table().lookup_label("num").unwrap();
        assert_eq!(num, DATA_BASE + 10);
        assert_eq!(data.get(&num), Some(&42));
        assert_eq!(data.get(&(num + 4)), Some(&-1));
        assert_eq!(data.len(), 12);
        assert!(program.is_empty());
    }

    #[test]
    fn test_li_expansion() {
        let program = assemble_src("
            li $t0, 42
            li $t0, -32768
            li $t0, 65535
            li $t0, 0x12345678
            li $t0, -32769
        ").unwrap();

        assert_eq!(words(&program, 0), [SimInstr::Addi(T0, ZERO, IOffset::new_trunc(42))]);
        assert_eq!(words(&program, 1), [SimInstr::Addi(T0, ZERO, IOffset::new_trunc(-32768))]);
        assert_eq!(words(&program, 2)[0].encode(), 0x2008_FFFF);
        assert_eq!(words(&program, 3), [
            SimInstr::Lui(T0, UOffset::new_trunc(0x1234)),
            SimInstr::Ori(T0, T0, UOffset::new_trunc(0x5678)),
        ]);
        assert_eq!(words(&program, 4), [
            SimInstr::Lui(T0, UOffset::new_trunc(0xFFFF)),
            SimInstr::Ori(T0, T0, UOffset::new_trunc(0x7FFF)),
        ]);
    }

    #[test]
    fn test_wide_immediates() {
        let program = assemble_src("
            addi $t0, $zero, 40000
            ori  $t1, $zero, -1
            andi $t2, $t1, 0x12345
            lui  $t3, 0x10001
            lw   $t4, 40000($sp)
        ").unwrap();

        // the literal is kept, and only its low 16 bits are encoded
        assert_eq!(program.instrs()[0].instr, AsmInstr::Addi(T0, ZERO, 40000));
        assert_eq!(words(&program, 0), [SimInstr::Addi(T0, ZERO, IOffset::new_trunc(40000))]);
        assert_eq!(words(&program, 0)[0].encode() & 0xFFFF, 0x9C40);
        assert_eq!(words(&program, 1)[0].encode() & 0xFFFF, 0xFFFF);
        assert_eq!(words(&program, 2)[0].encode() & 0xFFFF, 0x2345);
        assert_eq!(words(&program, 3)[0].encode() & 0xFFFF, 0x0001);
        assert_eq!(words(&program, 4)[0].encode() & 0xFFFF, 0x9C40);
    }

    #[test]
    fn test_text_restarts() {
        let src = "
            a: li $t0, 1
            .data
            x: .word 1
            .text
            b: li $t1, 2
        ";
        let sym = SymbolTable::new(&parse_ast(src).unwrap()).unwrap();
        assert_eq!(sym.lookup_label("a"), Some(0));
        assert_eq!(sym.lookup_label("b"), Some(0));

        // both instructions would live at address 0
        let r = assemble_src(src);
        assert_asm_fail(r, AsmErrKind::OverlappingInstrs);

        // a restart before any instruction is fine
        let program = assemble_src("
            .text
            .data
            x: .word 1
            .text
            main: li $t0, 1
            next: syscall
        ").unwrap();
        assert_eq!(program.symbol_table().lookup_label("main"), Some(0));
        assert_eq!(program.symbol_table().lookup_label("next"), Some(4));
        assert_eq!(program.len(), 2);
    }

    #[test]
    fn test_la_and_labels_in_mem() {
        let program = assemble_src("
            .data
            pad: .word 0
            var: .word 42
            .text
            la $a0, var
            lw $t0, var
            sw $t0, 4($zero)
            move $t1, $t0
        ").unwrap();

        assert_eq!(words(&program, 0), [
            SimInstr::Lui(A0, UOffset::new_trunc(0x1001)),
            SimInstr::Ori(A0, A0, UOffset::new_trunc(0x0004)),
        ]);
        // only the low 16 bits of the label's address are encoded
        assert_eq!(words(&program, 1), [SimInstr::Lw(T0, ZERO, IOffset::new_trunc(4))]);
        assert_eq!(words(&program, 1)[0].encode(), 0x8C08_0004);
        assert_eq!(words(&program, 2), [SimInstr::Sw(T0, ZERO, IOffset::new_trunc(4))]);
        assert_eq!(words(&program, 3), [SimInstr::Add(T1, T0, ZERO)]);
    }

    #[test]
    fn test_branch_offsets() {
        let program = assemble_src("
                beq $t0, $t1, done    # 0x00, forward
            loop:
                addi $t0, $t0, 1      # 0x04
                nop_like: or $t1, $t1, $zero
                bne $t0, $t1, loop    # 0x0C, backward
            done:
                j loop                # 0x10
                jal done              # 0x14
                beq $t0, $t0, nowhere # 0x18
        ").unwrap();

        // (0x10 - 0x04) >> 2
        assert_eq!(words(&program, 0), [SimInstr::Beq(T0, T1, IOffset::new_trunc(3))]);
        // (0x04 - 0x10) >> 2
        assert_eq!(words(&program, 3), [SimInstr::Bne(T0, T1, IOffset::new_trunc(-3))]);
        assert_eq!(words(&program, 3)[0].branch_target(0x0C), Some(0x04));
        assert_eq!(words(&program, 4), [SimInstr::J(UOffset::new_trunc(1))]);
        assert_eq!(words(&program, 5), [SimInstr::Jal(UOffset::new_trunc(4))]);
        // unknown label: placeholder
        assert_eq!(words(&program, 6), [SimInstr::Beq(T0, T0, IOffset::new_trunc(0))]);
    }

    #[test]
    fn test_unresolved_labels() {
        let r = assemble_src("la $a0, missing");
        assert_asm_fail(r, AsmErrKind::CouldNotFindLabel);

        let e = assemble_src("lw $t0, missing").unwrap_err();
        assert_eq!(e.category(), ErrCategory::UnresolvedLabel);
        assert_eq!(e.line_text, "lw $t0, missing");

        // jumps to labels that don't exist still assemble
        assemble_src("j missing").unwrap();
    }

    #[test]
    fn test_segment_errors() {
        let r = assemble_src(".data\nadd $t0, $t1, $t2");
        assert_asm_fail(r, AsmErrKind::InstrInData);

        let r = assemble_src(".text\n.word 5");
        assert_asm_fail(r, AsmErrKind::DataInText);

        let r = assemble_src("
            a: add $t0, $t1, $t2
            a: add $t0, $t1, $t2
        ");
        assert_asm_fail(r, AsmErrKind::OverlappingLabels);

        // same label at the same address is allowed
        assemble_src("a:\na: syscall").unwrap();
    }

    #[test]
    fn test_source_err_line() {
        let e = assemble_src("addi $t0, $zero, 1\n\n   add $t0, $t1\n").unwrap_err();
        assert_eq!(e.line, 2);
        assert_eq!(e.line_text, "add $t0, $t1");
        assert_eq!(e.category(), ErrCategory::Encoding);
        assert!(e.to_string().contains("line 3"));
    }

    #[test]
    fn test_instr_at() {
        let program = assemble_src("addi $t0, $zero, 5\nsyscall").unwrap();
        assert!(program.instr_at(0).is_some());
        assert!(program.instr_at(4).is_some());
        assert!(program.instr_at(2).is_none());
        assert!(program.instr_at(8).is_none());
        assert_eq!(program.instr_text(1).as_deref(), Some("syscall"));
    }
}
