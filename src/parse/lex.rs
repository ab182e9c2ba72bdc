//! Tokenizing MIPS assembly.
//!
//! This module holds the tokens that characterize MIPS assembly ([`Token`]).
//! This module is used by the parser to facilitate the conversion of
//! assembly source code into an AST.
//!
//! The module's key data structure is the [`Token`] enum,
//! which lists all of the tokens of MIPS assembly.

use std::num::IntErrorKind;

use logos::{Lexer, Logos};

use crate::ast::Reg;

/// A unit of information in MIPS source code.
#[derive(Debug, Logos, PartialEq, Eq)]
#[logos(skip r"[ \t]+", error = LexErr)]
pub enum Token {
    // Note, these regexes span over tokens that are technically invalid
    // (e.g., 23trst matches for unsigned even though it shouldn't).
    // This is intended.
    // These regexes collect what would be considered one discernable unit
    // and validates it using the validator function.

    /// An unsigned numeric value (e.g., `9`, `0x7F`, etc.)
    #[regex(r"\d\w*", lex_unsigned)]
    Unsigned(u32),

    /// A signed numeric value (e.g., `-9`, `-0x7F`, etc.)
    #[regex(r"-\w*", lex_signed)]
    Signed(i32),

    /// A register (e.g., `$t0`, `$zero`, `$31`)
    #[regex(r"\$\w*", lex_reg)]
    Reg(Reg),

    /// An identifier.
    ///
    /// This can refer to either:
    /// - a label (e.g., `main`, `loop`, `end_if`)
    /// - a mnemonic (e.g. `add`, `lw`, `syscall`)
    /// - a register name written without its `$` (e.g., `t0`)
    #[regex(r"[A-Za-z_]\w*", |lx| lx.slice().to_string())]
    Ident(String),

    /// A directive (e.g., `.data`, `.asciiz`).
    #[regex(r"\.[A-Za-z_]\w*", |lx| lx.slice()[1..].to_string())]
    Directive(String),

    /// A string literal (e.g., `"Hello!"`)
    #[token(r#"""#, lex_str_literal)]
    String(String),

    /// A colon, which ends a label definition
    #[token(":")]
    Colon,

    /// A comma, which delineate operands of an instruction
    #[token(",")]
    Comma,

    /// An open parenthesis (as in `4($sp)`)
    #[token("(")]
    LParen,

    /// A close parenthesis (as in `4($sp)`)
    #[token(")")]
    RParen,

    /// A comment, which starts with a hash and spans the remaining part of the line.
    #[regex(r"#.*")]
    Comment,

    /// A new line
    #[regex(r"\r?\n")]
    NewLine
}

/// Any errors raised in attempting to tokenize an input stream.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum LexErr {
    /// Numeric literal (unsigned dec or hex) cannot fit within the range of a u32
    DoesNotFitU32,
    /// Numeric literal (negative dec or hex) cannot fit within the range of a i32
    DoesNotFitI32,
    /// Hex literal (starting with 0x) has invalid hex digits
    InvalidHex,
    /// Numeric literal could not be parsed as a decimal literal because it has invalid digits (i.e., not 0-9)
    InvalidNumeric,
    /// Hex literal (starting with 0x) doesn't have digits after it.
    InvalidHexEmpty,
    /// Numeric literal could not be parsed as a decimal literal because there are no digits in it (it's just -)
    InvalidDecEmpty,
    /// Int parsing failed but the reason why is unknown
    UnknownIntErr,
    /// String literal is missing an end quotation mark.
    UnclosedStrLit,
    /// Token had the format `$name`, but `name` isn't one of the 32 registers.
    InvalidReg,
    /// A symbol was used which is not allowed in MIPS assembly files
    #[default]
    InvalidSymbol
}
impl std::fmt::Display for LexErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LexErr::DoesNotFitU32   => f.write_str("numeric token does not fit 32-bit unsigned integer"),
            LexErr::DoesNotFitI32   => f.write_str("numeric token does not fit 32-bit signed integer"),
            LexErr::InvalidHex      => f.write_str("invalid hex literal"),
            LexErr::InvalidNumeric  => f.write_str("invalid decimal literal"),
            LexErr::InvalidHexEmpty => f.write_str("invalid hex literal"),
            LexErr::InvalidDecEmpty => f.write_str("invalid decimal literal"),
            LexErr::UnknownIntErr   => f.write_str("could not parse integer"),
            LexErr::UnclosedStrLit  => f.write_str("unclosed string literal"),
            LexErr::InvalidReg      => f.write_str("unknown register"),
            LexErr::InvalidSymbol   => f.write_str("unrecognized symbol"),
        }
    }
}
impl std::error::Error for LexErr {}
impl crate::err::Error for LexErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match self {
            LexErr::DoesNotFitU32    => Some(format!("the range for a 32-bit unsigned integer is [{}, {}]", u32::MIN, u32::MAX).into()),
            LexErr::DoesNotFitI32    => Some(format!("the range for a 32-bit signed integer is [{}, {}]", i32::MIN, i32::MAX).into()),
            LexErr::InvalidHex       => Some("a hex literal starts with '0x' and consists of 0-9, A-F".into()),
            LexErr::InvalidNumeric   => Some("a decimal literal only consists of digits 0-9".into()),
            LexErr::InvalidHexEmpty  => Some("there should be hex digits (0-9, A-F) here".into()),
            LexErr::InvalidDecEmpty  => Some("there should be digits (0-9) here".into()),
            LexErr::UnknownIntErr    => None,
            LexErr::UnclosedStrLit   => Some("add a quote to the end of the string literal".into()),
            LexErr::InvalidReg       => Some("registers are $0-$31 or one of their names (e.g., $zero, $t0, $sp, $ra)".into()),
            LexErr::InvalidSymbol    => Some("this char does not occur in any token in MIPS assembly".into()),
        }
    }

    fn category(&self) -> crate::err::ErrCategory {
        use crate::err::ErrCategory;

        match self {
            LexErr::InvalidReg => ErrCategory::UnknownRegister,
            _ => ErrCategory::Syntax,
        }
    }
}
/// Helper that converts an int error kind to its corresponding LexErr, based on the provided inputs.
fn convert_int_error(
    e: &std::num::IntErrorKind,
    invalid_digits_err: LexErr,
    empty_err: LexErr,
    overflow_err: LexErr,
) -> LexErr {
    match e {
        IntErrorKind::Empty        => empty_err,
        IntErrorKind::InvalidDigit => invalid_digits_err,
        IntErrorKind::PosOverflow  => overflow_err,
        IntErrorKind::NegOverflow  => overflow_err,
        _ => LexErr::UnknownIntErr,
    }
}
/// Parses a magnitude (without sign), which is either hex (prefixed with `0x`) or decimal.
fn parse_magnitude(digits: &str, overflow_err: LexErr) -> Result<u32, LexErr> {
    match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16)
            .map_err(|e| convert_int_error(e.kind(), LexErr::InvalidHex, LexErr::InvalidHexEmpty, overflow_err)),
        None => digits.parse::<u32>()
            .map_err(|e| convert_int_error(e.kind(), LexErr::InvalidNumeric, LexErr::InvalidDecEmpty, overflow_err)),
    }
}
fn lex_unsigned(lx: &Lexer<'_, Token>) -> Result<u32, LexErr> {
    parse_magnitude(lx.slice(), LexErr::DoesNotFitU32)
}
fn lex_signed(lx: &Lexer<'_, Token>) -> Result<i32, LexErr> {
    let Some(digits) = lx.slice().strip_prefix('-') else {
        unreachable!("Lexer slice should have started with -");
    };

    let magnitude = parse_magnitude(digits, LexErr::DoesNotFitI32)?;
    0i32.checked_sub_unsigned(magnitude)
        .ok_or(LexErr::DoesNotFitI32)
}
fn lex_reg(lx: &Lexer<'_, Token>) -> Result<Reg, LexErr> {
    lx.slice().parse::<Reg>()
        .map_err(|_| LexErr::InvalidReg)
}
fn lex_str_literal(lx: &mut Lexer<'_, Token>) -> Result<String, LexErr> {
    let rem = lx.remainder()
        .lines()
        .next()
        .unwrap_or("");

    // find the unescaped end quote
    let mut escaped = false;
    let end = rem.char_indices()
        .find(|&(_, c)| {
            let is_end = !escaped && c == '"';
            escaped = !escaped && c == '\\';
            is_end
        })
        .map(|(i, _)| i);

    match end {
        Some(len) => lx.bump(len + 1),
        None => {
            lx.bump(rem.len());
            return Err(LexErr::UnclosedStrLit);
        }
    }

    // get the string inside quotes:
    let inner = &lx.slice()[1..(lx.slice().len() - 1)];
    let mut buf = String::with_capacity(inner.len());

    // Only a simple group of escapes are implemented.
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            buf.push(c);
            continue;
        }

        match chars.next() {
            Some('n')  => buf.push('\n'),
            Some('r')  => buf.push('\r'),
            Some('t')  => buf.push('\t'),
            Some('\\') => buf.push('\\'),
            Some('0')  => buf.push('\0'),
            Some('"')  => buf.push('"'),
            Some(c) => {
                buf.push('\\');
                buf.push(c);
            },
            None => buf.push('\\'),
        }
    }

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use logos::Logos;

    use crate::ast::reg_consts::{A0, FP, RA, S7, SP, T0, T9, ZERO};
    use crate::err::LexErr;
    use crate::parse::lex::Token;

    fn ident(s: &str) -> Token {
        Token::Ident(s.to_string())
    }
    fn directive(s: &str) -> Token {
        Token::Directive(s.to_string())
    }
    fn str_literal(s: &str) -> Token {
        Token::String(s.to_string())
    }

    #[test]
    fn test_numeric_dec_success() {
        // Basic
        let mut tokens = Token::lexer("0 123 456 789");
        assert_eq!(tokens.next(), Some(Ok(Token::Unsigned(0))));
        assert_eq!(tokens.next(), Some(Ok(Token::Unsigned(123))));
        assert_eq!(tokens.next(), Some(Ok(Token::Unsigned(456))));
        assert_eq!(tokens.next(), Some(Ok(Token::Unsigned(789))));
        assert_eq!(tokens.next(), None);

        // Negative
        let mut tokens = Token::lexer("-123 -456 -789 -0");
        assert_eq!(tokens.next(), Some(Ok(Token::Signed(-123))));
        assert_eq!(tokens.next(), Some(Ok(Token::Signed(-456))));
        assert_eq!(tokens.next(), Some(Ok(Token::Signed(-789))));
        assert_eq!(tokens.next(), Some(Ok(Token::Signed(0))));
        assert_eq!(tokens.next(), None);
    }

    #[test]
    fn test_numeric_hex_success() {
        let mut tokens = Token::lexer("0x10010000 0xABCD 0Xabcd 0xA 0xFFFFFFFF");
        assert_eq!(tokens.next(), Some(Ok(Token::Unsigned(0x10010000))));
        assert_eq!(tokens.next(), Some(Ok(Token::Unsigned(0xABCD))));
        assert_eq!(tokens.next(), Some(Ok(Token::Unsigned(0xABCD))));
        assert_eq!(tokens.next(), Some(Ok(Token::Unsigned(0xA))));
        assert_eq!(tokens.next(), Some(Ok(Token::Unsigned(0xFFFFFFFF))));
        assert_eq!(tokens.next(), None);

        // Negative
        let mut tokens = Token::lexer("-0x9 -0x1234 -0x80000000");
        assert_eq!(tokens.next(), Some(Ok(Token::Signed(-0x9))));
        assert_eq!(tokens.next(), Some(Ok(Token::Signed(-0x1234))));
        assert_eq!(tokens.next(), Some(Ok(Token::Signed(i32::MIN))));
        assert_eq!(tokens.next(), None);
    }

    #[test]
    fn test_numeric_overflow() {
        let mut tokens = Token::lexer("4294967295 -2147483648 65535 -32768");
        assert_eq!(tokens.next(), Some(Ok(Token::Unsigned(u32::MAX))));
        assert_eq!(tokens.next(), Some(Ok(Token::Signed(i32::MIN))));
        assert_eq!(tokens.next(), Some(Ok(Token::Unsigned(65535))));
        assert_eq!(tokens.next(), Some(Ok(Token::Signed(-32768))));
        assert_eq!(tokens.next(), None);

        assert_eq!(Token::lexer("4294967296").next(), Some(Err(LexErr::DoesNotFitU32)));
        assert_eq!(Token::lexer("999999999999999999999999999999").next(), Some(Err(LexErr::DoesNotFitU32)));
        assert_eq!(Token::lexer("0x100000000").next(), Some(Err(LexErr::DoesNotFitU32)));
        assert_eq!(Token::lexer("-2147483649").next(), Some(Err(LexErr::DoesNotFitI32)));
        assert_eq!(Token::lexer("-0x80000001").next(), Some(Err(LexErr::DoesNotFitI32)));
    }

    #[test]
    fn test_numeric_invalid() {
        assert_eq!(Token::lexer("3Q").next(), Some(Err(LexErr::InvalidNumeric)));
        assert_eq!(Token::lexer("-Q").next(), Some(Err(LexErr::InvalidNumeric)));
        assert_eq!(Token::lexer("-").next(), Some(Err(LexErr::InvalidDecEmpty)));
        assert_eq!(Token::lexer("0x0Q").next(), Some(Err(LexErr::InvalidHex)));
        assert_eq!(Token::lexer("0x").next(), Some(Err(LexErr::InvalidHexEmpty)));
        assert_eq!(Token::lexer("-0x").next(), Some(Err(LexErr::InvalidHexEmpty)));
    }

    #[test]
    fn test_regs() {
        let mut tokens = Token::lexer("$zero $0 $t0 $8 $a0 $s7 $t9 $sp $fp $ra $31");
        assert_eq!(tokens.next(), Some(Ok(Token::Reg(ZERO))));
        assert_eq!(tokens.next(), Some(Ok(Token::Reg(ZERO))));
        assert_eq!(tokens.next(), Some(Ok(Token::Reg(T0))));
        assert_eq!(tokens.next(), Some(Ok(Token::Reg(T0))));
        assert_eq!(tokens.next(), Some(Ok(Token::Reg(A0))));
        assert_eq!(tokens.next(), Some(Ok(Token::Reg(S7))));
        assert_eq!(tokens.next(), Some(Ok(Token::Reg(T9))));
        assert_eq!(tokens.next(), Some(Ok(Token::Reg(SP))));
        assert_eq!(tokens.next(), Some(Ok(Token::Reg(FP))));
        assert_eq!(tokens.next(), Some(Ok(Token::Reg(RA))));
        assert_eq!(tokens.next(), Some(Ok(Token::Reg(RA))));
        assert_eq!(tokens.next(), None);

        // Failures:
        assert_eq!(Token::lexer("$32").next(), Some(Err(LexErr::InvalidReg)));
        assert_eq!(Token::lexer("$t10").next(), Some(Err(LexErr::InvalidReg)));
        assert_eq!(Token::lexer("$foo").next(), Some(Err(LexErr::InvalidReg)));
        assert_eq!(Token::lexer("$").next(), Some(Err(LexErr::InvalidReg)));
    }

    #[test]
    fn test_str() {
        let mut tokens = Token::lexer(r#" " " "abc" "Hello, World!" "" "#);
        assert_eq!(tokens.next(), Some(Ok(str_literal(" "))));
        assert_eq!(tokens.next(), Some(Ok(str_literal("abc"))));
        assert_eq!(tokens.next(), Some(Ok(str_literal("Hello, World!"))));
        assert_eq!(tokens.next(), Some(Ok(str_literal(""))));
        assert_eq!(tokens.next(), None);
    }

    #[test]
    fn test_str_escape() {
        let mut tokens = Token::lexer(r#" "\n" "\r" "\t" "\\" "\"" "\0" "\e" "Hi\n" "#);
        assert_eq!(tokens.next(), Some(Ok(str_literal("\n"))));
        assert_eq!(tokens.next(), Some(Ok(str_literal("\r"))));
        assert_eq!(tokens.next(), Some(Ok(str_literal("\t"))));
        assert_eq!(tokens.next(), Some(Ok(str_literal("\\"))));
        assert_eq!(tokens.next(), Some(Ok(str_literal("\""))));
        assert_eq!(tokens.next(), Some(Ok(str_literal("\0"))));
        assert_eq!(tokens.next(), Some(Ok(str_literal("\\e"))));
        assert_eq!(tokens.next(), Some(Ok(str_literal("Hi\n"))));
        assert_eq!(tokens.next(), None);

        // Escaped newline decodes into exactly one character
        let Some(Ok(Token::String(s))) = Token::lexer(r#""a\nb""#).next() else {
            panic!("expected string literal");
        };
        assert_eq!(s.len(), 3);
    }

    #[test]
    fn test_str_unclosed() {
        assert_eq!(Token::lexer(r#"""#).next(), Some(Err(LexErr::UnclosedStrLit)));
        assert_eq!(Token::lexer(r#""abc\""#).next(), Some(Err(LexErr::UnclosedStrLit)));
        assert_eq!(Token::lexer("\"\n\"").next(), Some(Err(LexErr::UnclosedStrLit)));
    }

    #[test]
    fn test_idents() {
        let mut tokens = Token::lexer("add ADDI main loop_2 _start t0");
        assert_eq!(tokens.next(), Some(Ok(ident("add"))));
        assert_eq!(tokens.next(), Some(Ok(ident("ADDI"))));
        assert_eq!(tokens.next(), Some(Ok(ident("main"))));
        assert_eq!(tokens.next(), Some(Ok(ident("loop_2"))));
        assert_eq!(tokens.next(), Some(Ok(ident("_start"))));
        assert_eq!(tokens.next(), Some(Ok(ident("t0"))));
        assert_eq!(tokens.next(), None);
    }

    #[test]
    fn test_directive() {
        let mut tokens = Token::lexer(".data .text .word .asciiz .globl");
        assert_eq!(tokens.next(), Some(Ok(directive("data"))));
        assert_eq!(tokens.next(), Some(Ok(directive("text"))));
        assert_eq!(tokens.next(), Some(Ok(directive("word"))));
        assert_eq!(tokens.next(), Some(Ok(directive("asciiz"))));
        assert_eq!(tokens.next(), Some(Ok(directive("globl"))));
        assert_eq!(tokens.next(), None);
    }

    #[test]
    fn test_punct() {
        let mut tokens = Token::lexer("main: lw $t0, -4($sp) # load\r\nsyscall");
        assert_eq!(tokens.next(), Some(Ok(ident("main"))));
        assert_eq!(tokens.next(), Some(Ok(Token::Colon)));
        assert_eq!(tokens.next(), Some(Ok(ident("lw"))));
        assert_eq!(tokens.next(), Some(Ok(Token::Reg(T0))));
        assert_eq!(tokens.next(), Some(Ok(Token::Comma)));
        assert_eq!(tokens.next(), Some(Ok(Token::Signed(-4))));
        assert_eq!(tokens.next(), Some(Ok(Token::LParen)));
        assert_eq!(tokens.next(), Some(Ok(Token::Reg(SP))));
        assert_eq!(tokens.next(), Some(Ok(Token::RParen)));
        assert_eq!(tokens.next(), Some(Ok(Token::Comment)));
        assert_eq!(tokens.next(), Some(Ok(Token::NewLine)));
        assert_eq!(tokens.next(), Some(Ok(ident("syscall"))));
        assert_eq!(tokens.next(), None);
    }

    #[test]
    fn test_invalid_symbol() {
        for c in "!%&'*+/;<=>?@[\\]^`{|}~\x00\x01\x07\x0B\x0C\x0D\x1B\x7F".chars() {
            let string = c.to_string();
            assert_eq!(
                Token::lexer(&string).next(),
                Some(Err(LexErr::InvalidSymbol)),
                "Expected {string:?} to be an invalid symbol"
            );
        }
    }
}
