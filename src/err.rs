//! Error interface for this crate.
//!
//! Every error raised by this crate implements [`Error`], which exposes:
//! - where in the source the error occurred ([`Error::span`]),
//! - a help message that can be shown to the user ([`Error::help`]),
//! - and which broad class of failure occurred ([`Error::category`]).
//!
//! This module also re-exports the error types of each pipeline stage:
//! - [`LexErr`]: tokenizing errors
//! - [`ParseErr`]: parsing errors
//! - [`AsmErr`]: assembling errors
//! - [`SourceErr`]: parsing or assembling errors (from [`assemble_src`])
//! - [`SimErr`]: execution faults
//! - [`SessionErr`]: session lookup errors
//!
//! [`assemble_src`]: crate::asm::assemble_src
use std::borrow::Cow;
use std::ops::Range;

pub use crate::parse::lex::LexErr;
pub use crate::parse::ParseErr;
pub use crate::asm::{AsmErr, SourceErr};
pub use crate::sim::SimErr;
pub use crate::sim::session::SessionErr;

/// Broad classes of failures.
///
/// Each error in this crate can be classified into one of these categories
/// (via [`Error::category`]), which allows callers to handle errors without
/// matching on every individual error kind.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum ErrCategory {
    /// A line or directive is malformed.
    Syntax,
    /// The operands of an instruction do not fit its mnemonic.
    Encoding,
    /// A label was required but is not in the symbol table.
    UnresolvedLabel,
    /// A register name or number is not one of the 32 registers.
    UnknownRegister,
    /// A mnemonic is not part of the supported instruction set.
    UnsupportedOperation,
    /// A session handle does not refer to a live session.
    InvalidSession,
}
impl std::fmt::Display for ErrCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrCategory::Syntax               => f.write_str("syntax error"),
            ErrCategory::Encoding             => f.write_str("encoding error"),
            ErrCategory::UnresolvedLabel      => f.write_str("unresolved label error"),
            ErrCategory::UnknownRegister      => f.write_str("unknown register error"),
            ErrCategory::UnsupportedOperation => f.write_str("unsupported operation error"),
            ErrCategory::InvalidSession       => f.write_str("invalid session error"),
        }
    }
}

/// Unified error interface for all errors in this crate.
pub trait Error: std::error::Error {
    /// The range where this error occurs in source.
    ///
    /// If this is not known, this can be set to `None`.
    fn span(&self) -> Option<ErrSpan> {
        None
    }

    /// A simple help message explaining how to fix this error, if one exists.
    fn help(&self) -> Option<Cow<str>>;

    /// The broad class of this error.
    fn category(&self) -> ErrCategory;
}

/// The source span(s) an error is associated with.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub enum ErrSpan {
    /// One contiguous span.
    One(Range<usize>),
    /// Two contiguous spans (e.g., two definitions of the same label).
    Two([Range<usize>; 2]),
    /// Any number of spans.
    Many(Vec<Range<usize>>)
}
impl ErrSpan {
    /// Gets the first span of this error span.
    ///
    /// This returns `None` if there are no spans.
    pub fn first(&self) -> Option<Range<usize>> {
        match self {
            ErrSpan::One(r)      => Some(r.clone()),
            ErrSpan::Two([r, _]) => Some(r.clone()),
            ErrSpan::Many(rs)    => rs.first().cloned(),
        }
    }

    /// Gets an iterator over all of the spans.
    pub fn iter(&self) -> impl Iterator<Item=&Range<usize>> + '_ {
        match self {
            ErrSpan::One(r)   => std::slice::from_ref(r).iter(),
            ErrSpan::Two(rs)  => rs.iter(),
            ErrSpan::Many(rs) => rs.iter(),
        }
    }
}
impl From<Range<usize>> for ErrSpan {
    fn from(value: Range<usize>) -> Self {
        ErrSpan::One(value)
    }
}
impl From<Vec<Range<usize>>> for ErrSpan {
    fn from(value: Vec<Range<usize>>) -> Self {
        match <[_; 2]>::try_from(value) {
            Ok(two) => ErrSpan::Two(two),
            Err(mut v) if v.len() == 1 => ErrSpan::One(v.remove(0)),
            Err(v) => ErrSpan::Many(v),
        }
    }
}
impl<const N: usize> From<[Range<usize>; N]> for ErrSpan {
    fn from(value: [Range<usize>; N]) -> Self {
        Vec::from(value).into()
    }
}
