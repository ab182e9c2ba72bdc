//! Components relating to the abstract syntax trees (ASTs)
//! used in representing assembly instructions.
//!
//! These components together are used to construct...
//! - [`asm::AsmInstr`] (a data structure holding an assembly source code instruction),
//! - [`asm::Directive`] (a data structure holding an assembly source code directive),
//! - and [`sim::SimInstr`] (a data structure holding an encoded machine instruction).

pub mod asm;
pub mod sim;

use std::num::TryFromIntError;
use offset_base::OffsetBacking;

use crate::parse::lex::LexErr;

/// A register. Must be between 0 and 31.
///
/// This `Reg` struct can either be constructed by selecting a register from [`reg_consts`],
/// by using [`Reg::try_from`], or by parsing a register name (e.g., `"$t0"`, `"sp"`, `"$31"`).
///
/// Each register has a fixed number and a fixed name
/// (see [`Reg::reg_no`] and [`Reg::name`]), and the two are a bijection.
///
/// ## Examples
///
/// ```text
/// add $t2, $t0, $t1
///     ~~~  ~~~  ~~~
/// lw $t0, 4($sp)
///    ~~~    ~~~
/// jr $31
///    ~~~
/// ```
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
pub struct Reg(pub(crate) u8);

/// The conventional names of the 32 registers, indexed by register number.
const REG_NAMES: [&str; 32] = [
    "zero", "at", "v0", "v1", "a0", "a1", "a2", "a3",
    "t0",   "t1", "t2", "t3", "t4", "t5", "t6", "t7",
    "s0",   "s1", "s2", "s3", "s4", "s5", "s6", "s7",
    "t8",   "t9", "k0", "k1", "gp", "sp", "fp", "ra",
];

/// Register constants!
pub mod reg_consts {
    use super::Reg;

    /// `$zero`, which is hardwired to 0.
    pub const ZERO: Reg = Reg(0);
    /// `$at`, the assembler temporary.
    pub const AT: Reg = Reg(1);
    /// `$v0`, the first return value register (also the syscall code).
    pub const V0: Reg = Reg(2);
    /// `$v1`, the second return value register.
    pub const V1: Reg = Reg(3);
    /// `$a0`, the first argument register.
    pub const A0: Reg = Reg(4);
    /// `$a1`, the second argument register.
    pub const A1: Reg = Reg(5);
    /// `$a2`, the third argument register.
    pub const A2: Reg = Reg(6);
    /// `$a3`, the fourth argument register.
    pub const A3: Reg = Reg(7);
    #[allow(missing_docs)]
    pub const T0: Reg = Reg(8);
    #[allow(missing_docs)]
    pub const T1: Reg = Reg(9);
    #[allow(missing_docs)]
    pub const T2: Reg = Reg(10);
    #[allow(missing_docs)]
    pub const T3: Reg = Reg(11);
    #[allow(missing_docs)]
    pub const T4: Reg = Reg(12);
    #[allow(missing_docs)]
    pub const T5: Reg = Reg(13);
    #[allow(missing_docs)]
    pub const T6: Reg = Reg(14);
    #[allow(missing_docs)]
    pub const T7: Reg = Reg(15);
    #[allow(missing_docs)]
    pub const S0: Reg = Reg(16);
    #[allow(missing_docs)]
    pub const S1: Reg = Reg(17);
    #[allow(missing_docs)]
    pub const S2: Reg = Reg(18);
    #[allow(missing_docs)]
    pub const S3: Reg = Reg(19);
    #[allow(missing_docs)]
    pub const S4: Reg = Reg(20);
    #[allow(missing_docs)]
    pub const S5: Reg = Reg(21);
    #[allow(missing_docs)]
    pub const S6: Reg = Reg(22);
    #[allow(missing_docs)]
    pub const S7: Reg = Reg(23);
    #[allow(missing_docs)]
    pub const T8: Reg = Reg(24);
    #[allow(missing_docs)]
    pub const T9: Reg = Reg(25);
    /// `$k0`, reserved for the kernel.
    pub const K0: Reg = Reg(26);
    /// `$k1`, reserved for the kernel.
    pub const K1: Reg = Reg(27);
    /// `$gp`, the global pointer.
    pub const GP: Reg = Reg(28);
    /// `$sp`, the stack pointer.
    pub const SP: Reg = Reg(29);
    /// `$fp`, the frame pointer.
    pub const FP: Reg = Reg(30);
    /// `$ra`, the return address (written by `jal`).
    pub const RA: Reg = Reg(31);
}
impl Reg {
    /// The number of registers in the register file.
    pub const COUNT: usize = 32;

    /// Gets the register number of this [`Reg`]. This is always between 0 and 31.
    pub fn reg_no(self) -> u8 {
        self.0
    }

    /// Gets the conventional name of this register (without the `$`).
    ///
    /// ```
    /// # use mips_ensemble::ast::Reg;
    /// let reg = Reg::try_from(29).unwrap();
    /// assert_eq!(reg.name(), "sp");
    /// assert_eq!(Reg::from_name("sp"), Some(reg));
    /// ```
    pub fn name(self) -> &'static str {
        REG_NAMES[usize::from(self.0)]
    }

    /// Looks up a register by its conventional name (without the `$`).
    pub fn from_name(name: &str) -> Option<Self> {
        REG_NAMES.iter()
            .position(|&n| n.eq_ignore_ascii_case(name))
            .map(|i| Reg(i as u8))
    }

    /// Iterates over every register, in register number order.
    pub fn all() -> impl Iterator<Item=Reg> {
        (0..Self::COUNT as u8).map(Reg)
    }
}
impl std::fmt::Display for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${}", self.name())
    }
}
impl From<Reg> for usize {
    // Used for indexing the reg file in [`crate::sim::mem::RegFile`].
    fn from(value: Reg) -> Self {
        usize::from(value.0)
    }
}
impl TryFrom<u8> for Reg {
    type Error = TryFromIntError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0..=31 => Ok(Reg(value)),
            // HACKy, but there's no other way to create this error
            _      => u8::try_from(256).map(|_| unreachable!("should've been TryFromIntError")),
        }
    }
}
impl std::str::FromStr for Reg {
    type Err = LexErr;

    /// Parses a register, accepting `$name`, `$number`, `name`, or `number`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s.strip_prefix('$').unwrap_or(s);

        match body.bytes().all(|b| b.is_ascii_digit()) && !body.is_empty() {
            true => body.parse::<u8>().ok()
                .and_then(|n| Reg::try_from(n).ok())
                .ok_or(LexErr::InvalidReg),
            false => Reg::from_name(body).ok_or(LexErr::InvalidReg),
        }
    }
}

/// A signed offset or immediate value (e.g., for `addi`, `lw`, `sw`).
///
/// See [`Offset`] for more details.
pub type IOffset<const N: u32> = Offset<i32, N>;
/// An unsigned offset or immediate value (e.g., for `andi`, `ori`, `lui`, shift amounts).
///
/// See [`Offset`] for more details.
pub type UOffset<const N: u32> = Offset<u32, N>;

/// A value representing an offset or an immediate value.
///
/// The `OFF` type represents the backing type of this offset.
/// The signedness of this offset type is dependent on the signedness of the `OFF` type:
/// - `Offset<i32, _>`: signed offset (also aliased as [`IOffset`])
/// - `Offset<u32, _>`: unsigned offset (also aliased as [`UOffset`])
///
/// `N` indicates the maximum bit size of this offset/immediate value.
/// These are the fields of encoded instructions ([`sim::SimInstr`]);
/// the operands of [`asm::AsmInstr`] hold full source literals instead.
///
/// ## Examples
///
/// ```text
/// addi $t0, $zero, -5     # IOffset<16>
///                  ~~
/// lw $t0, -4($sp)         # IOffset<16>
///         ~~
/// ori $t0, $t0, 0xFFFF    # UOffset<16>
///               ~~~~~~
/// sll $t0, $t1, 2         # UOffset<5>
///               ~
/// ```
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct Offset<OFF, const N: u32>(OFF);

impl<OFF: std::fmt::Display, const N: u32> std::fmt::Display for Offset<OFF, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// The errors that can result from calling [`Offset::new`].
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum OffsetNewErr {
    /// The provided offset cannot fit an unsigned integer of the given bitsize.
    CannotFitUnsigned(u32),
    /// The provided offset cannot fit a signed integer of the given bitsize.
    CannotFitSigned(u32)
}

impl std::fmt::Display for OffsetNewErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OffsetNewErr::CannotFitUnsigned(n) => write!(f, "value is too big for unsigned {n}-bit integer"),
            OffsetNewErr::CannotFitSigned(n) => write!(f, "value is too big for signed {n}-bit integer"),
        }
    }
}
impl std::error::Error for OffsetNewErr {}
impl crate::err::Error for OffsetNewErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        use std::borrow::Cow;

        let error = match self {
            OffsetNewErr::CannotFitUnsigned(n) => Cow::from(format!("the range for an unsigned {n}-bit integer is [0, {}]", (1u64 << n) - 1)),
            OffsetNewErr::CannotFitSigned(n) => Cow::from(format!("the range for a signed {n}-bit integer is [{}, {}]", (-1i64) << (n - 1), (1i64 << (n - 1)) - 1)),
        };

        Some(error)
    }

    fn category(&self) -> crate::err::ErrCategory {
        crate::err::ErrCategory::Encoding
    }
}

mod offset_base {
    use super::OffsetNewErr;

    /// Any type that could store a value for [`Offset`].
    ///
    /// [`Offset`]: super::Offset
    pub trait OffsetBacking: Copy + Eq {
        /// How many bits are contained within this backing.
        ///
        /// For example, `u32` has 32 bits and thus BITS == 32.
        const BITS: u32;

        /// Truncates the given value to the provided `bit_size`.
        ///
        /// This bit size is always known to be less than or equal to BITS.
        fn truncate(self, bit_size: u32) -> Self;

        /// The error to raise if a given value doesn't match
        /// its provided value when truncated to a given `bit_size`.
        fn does_not_fit_error(bit_size: u32) -> OffsetNewErr;
    }

    macro_rules! impl_offset_backing_for_ints {
        ($($Int:ty: $Err:ident),*) => {
            $(
                impl OffsetBacking for $Int {
                    const BITS: u32 = Self::BITS;

                    fn truncate(self, bit_size: u32) -> Self {
                        match bit_size {
                            0 => 0,
                            b if b >= Self::BITS => self,
                            b => (self << (Self::BITS - b)) >> (Self::BITS - b)
                        }
                    }

                    fn does_not_fit_error(bit_size: u32) -> OffsetNewErr {
                        OffsetNewErr::$Err(bit_size)
                    }
                }
            )*
        }
    }
    impl_offset_backing_for_ints! {
        u32: CannotFitUnsigned,
        i32: CannotFitSigned
    }
}

impl<OFF: OffsetBacking, const N: u32> Offset<OFF, N> {
    /// Creates a new offset value.
    /// This must fit within `N` bits of the representation, otherwise an error is raised.
    ///
    /// # Examples
    ///
    /// ```
    /// # use mips_ensemble::ast::Offset;
    /// #
    /// // Signed:
    /// assert!(Offset::<i32, 16>::new(-32768).is_ok());
    /// assert!(Offset::<i32, 16>::new(32767).is_ok());
    /// assert!(Offset::<i32, 16>::new(32768).is_err());
    ///
    /// // Unsigned:
    /// assert!(Offset::<u32, 16>::new(65535).is_ok());
    /// assert!(Offset::<u32, 16>::new(65536).is_err());
    /// ```
    ///
    /// # Panics
    ///
    /// This will panic if `N` is larger than the offset backing (e.g., for backing `u32`, larger than 32).
    pub fn new(n: OFF) -> Result<Self, OffsetNewErr> {
        assert!(N <= OFF::BITS, "bit size {N} exceeds size of backing ({})", OFF::BITS);
        match n == n.truncate(N) {
            true  => Ok(Offset(n)),
            false => Err(OFF::does_not_fit_error(N)),
        }
    }

    /// Creates a new offset by extending the first N bits of the integer,
    /// and discarding the rest.
    ///
    /// The extension is considered sign-extended if the offset's backing is signed,
    /// and zero-extended if the offset's backing is unsigned.
    ///
    /// # Examples
    ///
    /// ```
    /// # use mips_ensemble::ast::Offset;
    /// #
    /// // Shift amounts are masked to 5 bits:
    /// assert_eq!(Offset::<u32, 5>::new_trunc(33).get(), 1);
    /// // Branch offsets are sign-extended from 16 bits:
    /// assert_eq!(Offset::<i32, 16>::new_trunc(0xFFFF).get(), -1);
    /// ```
    ///
    /// # Panics
    ///
    /// This will panic if `N` is larger than the offset backing (e.g., for backing `u32`, larger than 32).
    pub fn new_trunc(n: OFF) -> Self {
        assert!(N <= OFF::BITS, "bit size {N} exceeds size of backing ({})", OFF::BITS);
        Self(n.truncate(N))
    }

    /// Gets the value of the offset.
    pub fn get(&self) -> OFF {
        self.0
    }
}

/// A label.
///
/// This struct stores the name of the label (accessible by the `name` field)
/// and the source code span indicating where the label is located in assembly source code.
///
/// Unlike mnemonics, label names are case-sensitive.
///
/// # Examples
/// ```text
/// .data
/// msg: .asciiz "Hi"
/// ~~~
/// .text
/// main:
/// ~~~~
///     la $a0, msg
///             ~~~
///     beq $t0, $zero, main
///                     ~~~~
/// ```
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct Label {
    /// The label's identifier
    pub name: String,

    /// The start of the label in assembly source code.
    ///
    /// Since name stores the length of the string,
    /// we don't need to store the whole span.
    start: usize
}
impl Label {
    /// Creates a new label.
    pub fn new(name: String, span: std::ops::Range<usize>) -> Self {
        debug_assert_eq!(span.start + name.len(), span.end, "span should have the same length as name");
        Label { name, start: span.start }
    }
    /// Returns the span of the label in assembly source code.
    pub fn span(&self) -> std::ops::Range<usize> {
        self.start .. (self.start + self.name.len())
    }
}
impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.name.fmt(f)
    }
}
