//! Parsing assembly source code into an AST.
//!
//! This module is used to convert strings (which represent assembly source code)
//! into abstract syntax trees that maintain all of the information of the source code
//! in an easier to handle format.
//!
//! The main function to use from this module is [`parse_ast`],
//! which parses an assembly code program into a `Vec<Stmt>` (a list of statements).
//!
//! ```
//! use mips_ensemble::parse::parse_ast;
//!
//! let src = "
//!     .text
//!     main:
//!         addi $t0, $zero, 5
//!         syscall
//! ";
//! let ast = parse_ast(src).unwrap();
//! assert_eq!(ast.len(), 3);
//! ```
pub mod lex;

use std::borrow::Cow;
use std::ops::Range;

use logos::{Logos, Span};

use crate::ast::asm::{AsmInstr, Directive, MemOperand, Mnemonic, Stmt, StmtKind, UnsupportedOpErr};
use crate::ast::{Label, Reg, UOffset};
use crate::err::ErrSpan;
use lex::{LexErr, Token};

/// Kinds of errors that can occur from parsing assembly source code.
///
/// See [`ParseErr`] for this error type with span information included.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ParseErrKind {
    /// The source could not be tokenized.
    Lex(LexErr),
    /// The mnemonic is not in the supported instruction set.
    UnsupportedOp(UnsupportedOpErr),
    /// The directive is not one of the supported directives.
    UnknownDirective(String),
    /// A line didn't start with an instruction, a directive, or a label.
    ExpectedStatement,
    /// A token appeared where an operand was expected.
    UnexpectedToken,
    /// An identifier was used as a register, but it doesn't name one of the 32 registers.
    UnknownRegister(String),
    /// The wrong number of operands was provided.
    OperandCount {
        /// The instruction or directive.
        name: String,
        /// The number of operands it takes.
        expected: usize,
        /// The number of operands provided.
        found: usize
    },
    /// Expected a register operand.
    ExpectedReg,
    /// Expected an integer operand.
    ExpectedImm,
    /// Expected a label operand.
    ExpectedLabel,
    /// Expected an `offset(base)` or label operand.
    ExpectedMem,
    /// Expected a string literal operand.
    ExpectedStr,
}
impl std::fmt::Display for ParseErrKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lex(e)              => e.fmt(f),
            Self::UnsupportedOp(e)    => e.fmt(f),
            Self::UnknownDirective(d) => write!(f, "unknown directive .{d}"),
            Self::ExpectedStatement   => f.write_str("expected instruction or directive"),
            Self::UnexpectedToken     => f.write_str("unexpected token"),
            Self::UnknownRegister(r)  => write!(f, "unknown register {r}"),
            Self::OperandCount { name, expected, found } => {
                write!(f, "{name} expects {expected} operand(s), but {found} were provided")
            },
            Self::ExpectedReg         => f.write_str("expected register"),
            Self::ExpectedImm         => f.write_str("expected integer"),
            Self::ExpectedLabel       => f.write_str("expected label"),
            Self::ExpectedMem         => f.write_str("expected memory operand"),
            Self::ExpectedStr         => f.write_str("expected string literal"),
        }
    }
}

/// Error from parsing assembly source code.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ParseErr {
    /// The value with a span.
    pub kind: ParseErrKind,
    /// The span in the source associated with this value.
    pub span: ErrSpan
}
impl ParseErr {
    /// Creates a new [`ParseErr`].
    pub fn new<E: Into<ErrSpan>>(kind: ParseErrKind, span: E) -> Self {
        ParseErr { kind, span: span.into() }
    }
}
impl std::fmt::Display for ParseErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.kind.fmt(f)
    }
}
impl std::error::Error for ParseErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ParseErrKind::Lex(e) => Some(e),
            ParseErrKind::UnsupportedOp(e) => Some(e),
            _ => None
        }
    }
}
impl crate::err::Error for ParseErr {
    fn span(&self) -> Option<ErrSpan> {
        Some(self.span.clone())
    }

    fn help(&self) -> Option<Cow<str>> {
        use crate::err::Error;

        match &self.kind {
            ParseErrKind::Lex(e)              => e.help(),
            ParseErrKind::UnsupportedOp(e)    => e.help(),
            ParseErrKind::UnknownDirective(_) => Some("supported directives are .data, .text, .word, .asciiz, and .globl".into()),
            ParseErrKind::ExpectedStatement   => Some("a line consists of optional labels (name:) followed by an instruction or directive".into()),
            ParseErrKind::UnexpectedToken     => Some("operands are registers, integers, labels, offset(base) pairs, or strings".into()),
            ParseErrKind::UnknownRegister(_)  => Some("registers are $0-$31 or one of their names (e.g., $zero, $t0, $sp, $ra)".into()),
            ParseErrKind::OperandCount { .. } => None,
            ParseErrKind::ExpectedReg         => Some("try a register such as $t0".into()),
            ParseErrKind::ExpectedImm         => Some("try a decimal or hex (0x) integer".into()),
            ParseErrKind::ExpectedLabel       => Some("try a label name".into()),
            ParseErrKind::ExpectedMem         => Some("try an operand such as 4($sp) or a data label".into()),
            ParseErrKind::ExpectedStr         => Some("try a double-quoted string".into()),
        }
    }

    fn category(&self) -> crate::err::ErrCategory {
        use crate::err::{ErrCategory, Error};

        match &self.kind {
            ParseErrKind::Lex(e) => e.category(),
            ParseErrKind::UnsupportedOp(_) => ErrCategory::UnsupportedOperation,
            ParseErrKind::UnknownRegister(_) => ErrCategory::UnknownRegister,
            | ParseErrKind::UnknownDirective(_)
            | ParseErrKind::ExpectedStatement
            | ParseErrKind::UnexpectedToken => ErrCategory::Syntax,
            | ParseErrKind::OperandCount { .. }
            | ParseErrKind::ExpectedReg
            | ParseErrKind::ExpectedImm
            | ParseErrKind::ExpectedLabel
            | ParseErrKind::ExpectedMem
            | ParseErrKind::ExpectedStr => ErrCategory::Encoding,
        }
    }
}

/// Parses an assembly source code string into a `Vec` of statements.
///
/// Statements are parsed line by line. Each line may start with any number of
/// label definitions (`name:`), followed by at most one instruction or directive.
/// Labels on a line by themselves are attached to the next statement.
///
/// # Example
/// ```
/// use mips_ensemble::parse::parse_ast;
/// use mips_ensemble::ast::asm::{AsmInstr, StmtKind};
/// use mips_ensemble::ast::reg_consts::{T0, T1};
///
/// let src = "loop: move $t1, $t0  # copy";
/// let ast = parse_ast(src).unwrap();
///
/// assert_eq!(ast[0].labels[0].name, "loop");
/// assert_eq!(ast[0].nucleus, StmtKind::Instr(AsmInstr::Move(T1, T0)));
/// assert_eq!(&src[ast[0].span.clone()], "move $t1, $t0");
/// ```
pub fn parse_ast(src: &str) -> Result<Vec<Stmt>, ParseErr> {
    let tokens = tokenize(src)?;

    let mut stmts = vec![];
    let mut labels = vec![];
    for line in tokens.split(|(t, _)| matches!(t, Token::NewLine)) {
        let mut rest = line;
        while let [(Token::Ident(name), span), (Token::Colon, _), tail @ ..] = rest {
            labels.push(Label::new(name.clone(), span.clone()));
            rest = tail;
        }

        let (Some((_, first)), Some((_, last))) = (rest.first(), rest.last()) else { continue };
        let span = first.start .. last.end;

        let nucleus = parse_nucleus(rest, span.clone())?;
        stmts.push(Stmt { labels: std::mem::take(&mut labels), nucleus, span });
    }

    if !labels.is_empty() {
        stmts.push(Stmt { labels, nucleus: StmtKind::Empty, span: src.len()..src.len() });
    }

    Ok(stmts)
}

/// Tokenizes the source, dropping comments.
fn tokenize(src: &str) -> Result<Vec<(Token, Span)>, ParseErr> {
    Token::lexer(src)
        .spanned()
        .filter(|(t, _)| !matches!(t, Ok(Token::Comment)))
        .map(|(t, span)| match t {
            Ok(t)  => Ok((t, span)),
            Err(e) => Err(ParseErr::new(ParseErrKind::Lex(e), span)),
        })
        .collect()
}

/// An operand, before it has been checked against its instruction.
#[derive(Debug)]
struct Operand {
    value: OperandValue,
    span: Range<usize>
}
#[derive(Debug)]
enum OperandValue {
    Reg(Reg),
    Ident(String),
    Int(i64),
    Mem(i64, Reg),
    Str(String),
}
impl Operand {
    fn err(&self, kind: ParseErrKind) -> ParseErr {
        ParseErr::new(kind, self.span.clone())
    }

    fn reg(&self) -> Result<Reg, ParseErr> {
        match &self.value {
            OperandValue::Reg(r) => Ok(*r),
            OperandValue::Ident(name) => Reg::from_name(name)
                .ok_or_else(|| self.err(ParseErrKind::UnknownRegister(name.clone()))),
            _ => Err(self.err(ParseErrKind::ExpectedReg)),
        }
    }

    fn label(&self) -> Result<Label, ParseErr> {
        match &self.value {
            OperandValue::Ident(name) => Ok(Label::new(name.clone(), self.span.clone())),
            _ => Err(self.err(ParseErrKind::ExpectedLabel)),
        }
    }

    fn int(&self) -> Result<i64, ParseErr> {
        match self.value {
            OperandValue::Int(n) => Ok(n),
            _ => Err(self.err(ParseErrKind::ExpectedImm)),
        }
    }

    /// A full 32-bit value (either a u32 or i32 literal), stored as its bit pattern.
    fn word(&self) -> Result<i32, ParseErr> {
        self.int().map(|n| n as i32)
    }

    /// Shift amounts are masked to 5 bits.
    fn shamt(&self) -> Result<UOffset<5>, ParseErr> {
        self.int().map(|n| UOffset::new_trunc(n as u32))
    }

    fn mem(&self) -> Result<MemOperand, ParseErr> {
        match &self.value {
            &OperandValue::Mem(offset, base) => Ok(MemOperand::Offset { offset: offset as i32, base }),
            OperandValue::Ident(name) => Ok(MemOperand::Label(Label::new(name.clone(), self.span.clone()))),
            _ => Err(self.err(ParseErrKind::ExpectedMem)),
        }
    }

    fn string(&self) -> Result<String, ParseErr> {
        match &self.value {
            OperandValue::Str(s) => Ok(s.clone()),
            _ => Err(self.err(ParseErrKind::ExpectedStr)),
        }
    }
}

/// Reads a register from a token, accepting bare register names (without `$`).
fn token_reg(tok: &Token, span: &Span) -> Result<Reg, ParseErr> {
    match tok {
        Token::Reg(r) => Ok(*r),
        Token::Ident(name) => Reg::from_name(name)
            .ok_or_else(|| ParseErr::new(ParseErrKind::UnknownRegister(name.clone()), span.clone())),
        _ => Err(ParseErr::new(ParseErrKind::ExpectedReg, span.clone())),
    }
}

/// Parses a list of operands.
///
/// Operands are normally separated by commas, but (as with most MIPS assemblers) whitespace also works.
fn parse_operands(toks: &[(Token, Span)]) -> Result<Vec<Operand>, ParseErr> {
    let mut ops = vec![];
    let mut rest = toks;

    while let Some(((tok, span), tail)) = rest.split_first() {
        let (value, end, tail) = match (tok, tail) {
            // offset(base)
            (Token::Unsigned(_) | Token::Signed(_), [(Token::LParen, _), (base, bspan), (Token::RParen, rparen), tail @ ..]) => {
                let offset = match *tok {
                    Token::Unsigned(n) => i64::from(n),
                    Token::Signed(n)   => i64::from(n),
                    _ => unreachable!("matched numeric token"),
                };
                (OperandValue::Mem(offset, token_reg(base, bspan)?), rparen.end, tail)
            },
            // (base)
            (Token::LParen, [(base, bspan), (Token::RParen, rparen), tail @ ..]) => {
                (OperandValue::Mem(0, token_reg(base, bspan)?), rparen.end, tail)
            },
            (&Token::Unsigned(n), tail) => (OperandValue::Int(i64::from(n)), span.end, tail),
            (&Token::Signed(n), tail)   => (OperandValue::Int(i64::from(n)), span.end, tail),
            (&Token::Reg(r), tail)      => (OperandValue::Reg(r), span.end, tail),
            (Token::Ident(s), tail)     => (OperandValue::Ident(s.clone()), span.end, tail),
            (Token::String(s), tail)    => (OperandValue::Str(s.clone()), span.end, tail),
            _ => return Err(ParseErr::new(ParseErrKind::UnexpectedToken, span.clone())),
        };
        ops.push(Operand { value, span: span.start..end });

        rest = match tail {
            [(Token::Comma, _), tail @ ..] => tail,
            tail => tail,
        };
    }

    Ok(ops)
}

/// Checks that exactly `N` operands were provided.
fn operands<const N: usize>(name: &str, ops: Vec<Operand>, span: &Range<usize>) -> Result<[Operand; N], ParseErr> {
    let found = ops.len();
    <[Operand; N]>::try_from(ops)
        .map_err(|_| ParseErr::new(ParseErrKind::OperandCount { name: name.to_string(), expected: N, found }, span.clone()))
}

/// Parses the part of a line after its labels.
fn parse_nucleus(toks: &[(Token, Span)], span: Range<usize>) -> Result<StmtKind, ParseErr> {
    match toks {
        [(Token::Directive(d), dspan), rest @ ..] => {
            let ops = parse_operands(rest)?;
            parse_directive(d, dspan, ops, &span).map(StmtKind::Directive)
        },
        [(Token::Ident(m), mspan), rest @ ..] => {
            let mnemonic = m.parse::<Mnemonic>()
                .map_err(|e| ParseErr::new(ParseErrKind::UnsupportedOp(e), mspan.clone()))?;
            let ops = parse_operands(rest)?;
            parse_instr(mnemonic, ops, &span).map(StmtKind::Instr)
        },
        [(_, tspan), ..] => Err(ParseErr::new(ParseErrKind::ExpectedStatement, tspan.clone())),
        [] => Err(ParseErr::new(ParseErrKind::ExpectedStatement, span)),
    }
}

fn parse_directive(name: &str, name_span: &Span, ops: Vec<Operand>, span: &Range<usize>) -> Result<Directive, ParseErr> {
    let full_name = format!(".{name}");
    match &*name.to_ascii_lowercase() {
        "data" => {
            let [] = operands(&full_name, ops, span)?;
            Ok(Directive::Data)
        },
        "text" => {
            let [] = operands(&full_name, ops, span)?;
            Ok(Directive::Text)
        },
        "word" => {
            if ops.is_empty() {
                return Err(ParseErr::new(ParseErrKind::OperandCount { name: full_name, expected: 1, found: 0 }, span.clone()));
            }
            ops.iter()
                .map(Operand::word)
                .collect::<Result<_, _>>()
                .map(Directive::Word)
        },
        "asciiz" => {
            let [s] = operands(&full_name, ops, span)?;
            s.string().map(Directive::Asciiz)
        },
        "globl" | "global" => {
            let [label] = operands(&full_name, ops, span)?;
            label.label().map(Directive::Globl)
        },
        _ => Err(ParseErr::new(ParseErrKind::UnknownDirective(name.to_string()), name_span.clone())),
    }
}

fn parse_instr(m: Mnemonic, ops: Vec<Operand>, span: &Range<usize>) -> Result<AsmInstr, ParseErr> {
    macro_rules! reg3 {
        ($V:ident) => {{
            let [rd, rs, rt] = operands(m.as_str(), ops, span)?;
            AsmInstr::$V(rd.reg()?, rs.reg()?, rt.reg()?)
        }}
    }
    macro_rules! shift {
        ($V:ident) => {{
            let [rd, rt, sa] = operands(m.as_str(), ops, span)?;
            AsmInstr::$V(rd.reg()?, rt.reg()?, sa.shamt()?)
        }}
    }
    macro_rules! branch {
        ($V:ident) => {{
            let [rs, rt, label] = operands(m.as_str(), ops, span)?;
            AsmInstr::$V(rs.reg()?, rt.reg()?, label.label()?)
        }}
    }

    let instr = match m {
        Mnemonic::Add => reg3!(Add),
        Mnemonic::Sub => reg3!(Sub),
        Mnemonic::And => reg3!(And),
        Mnemonic::Or  => reg3!(Or),
        Mnemonic::Slt => reg3!(Slt),
        Mnemonic::Mul => reg3!(Mul),
        Mnemonic::Xor => reg3!(Xor),
        Mnemonic::Nor => reg3!(Nor),
        Mnemonic::Sll => shift!(Sll),
        Mnemonic::Srl => shift!(Srl),
        Mnemonic::Jr => {
            let [rs] = operands(m.as_str(), ops, span)?;
            AsmInstr::Jr(rs.reg()?)
        },
        Mnemonic::Addi => {
            let [rt, rs, imm] = operands(m.as_str(), ops, span)?;
            AsmInstr::Addi(rt.reg()?, rs.reg()?, imm.word()?)
        },
        Mnemonic::Andi => {
            let [rt, rs, imm] = operands(m.as_str(), ops, span)?;
            AsmInstr::Andi(rt.reg()?, rs.reg()?, imm.word()?)
        },
        Mnemonic::Ori => {
            let [rt, rs, imm] = operands(m.as_str(), ops, span)?;
            AsmInstr::Ori(rt.reg()?, rs.reg()?, imm.word()?)
        },
        Mnemonic::Lui => {
            let [rt, imm] = operands(m.as_str(), ops, span)?;
            AsmInstr::Lui(rt.reg()?, imm.word()?)
        },
        Mnemonic::Li => {
            let [rd, imm] = operands(m.as_str(), ops, span)?;
            AsmInstr::Li(rd.reg()?, imm.word()?)
        },
        Mnemonic::La => {
            let [rd, label] = operands(m.as_str(), ops, span)?;
            AsmInstr::La(rd.reg()?, label.label()?)
        },
        Mnemonic::Lw => {
            let [rt, mem] = operands(m.as_str(), ops, span)?;
            AsmInstr::Lw(rt.reg()?, mem.mem()?)
        },
        Mnemonic::Sw => {
            let [rt, mem] = operands(m.as_str(), ops, span)?;
            AsmInstr::Sw(rt.reg()?, mem.mem()?)
        },
        Mnemonic::Beq => branch!(Beq),
        Mnemonic::Bne => branch!(Bne),
        Mnemonic::J => {
            let [label] = operands(m.as_str(), ops, span)?;
            AsmInstr::J(label.label()?)
        },
        Mnemonic::Jal => {
            let [label] = operands(m.as_str(), ops, span)?;
            AsmInstr::Jal(label.label()?)
        },
        Mnemonic::Move => {
            let [rd, rs] = operands(m.as_str(), ops, span)?;
            AsmInstr::Move(rd.reg()?, rs.reg()?)
        },
        Mnemonic::Syscall => {
            let [] = operands(m.as_str(), ops, span)?;
            AsmInstr::Syscall
        },
    };

    Ok(instr)
}
