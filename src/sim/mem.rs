//! Memory handling for the MIPS simulator.
//!
//! This module consists of:
//! - [`Memory`]: The memory.
//! - [`RegFile`]: The register file.

use std::collections::BTreeMap;

use crate::ast::reg_consts::ZERO;
use crate::ast::Reg;

/// The simulator's memory.
///
/// Memory is sparse: it maps addresses to the value stored there.
/// `.word` values and `lw`/`sw` occupy one cell per word address,
/// and `.asciiz` strings occupy one cell per character.
///
/// Cells that were never written read as 0.
///
/// ```
/// use mips_ensemble::sim::mem::Memory;
///
/// let mut mem = Memory::new();
/// assert_eq!(mem.get(0x1001_0000), 0);
///
/// mem.set(0x1001_0000, 42);
/// assert_eq!(mem.get(0x1001_0000), 42);
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct Memory(BTreeMap<u32, i32>);

impl Memory {
    /// Creates empty memory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the value at the given address.
    pub fn get(&self, addr: u32) -> i32 {
        self.0.get(&addr).copied().unwrap_or(0)
    }

    /// Writes a value to the given address.
    ///
    /// This returns whether the stored value changed.
    pub fn set(&mut self, addr: u32, value: i32) -> bool {
        self.0.insert(addr, value).unwrap_or(0) != value
    }

    /// Reads a NUL-terminated string, starting at the given address.
    ///
    /// Each cell is one character. Values which are not valid characters
    /// are read as `U+FFFD`.
    ///
    /// ```
    /// use mips_ensemble::sim::mem::Memory;
    ///
    /// let mut mem = Memory::new();
    /// mem.write_cstr(0x100, "Hi\n");
    /// assert_eq!(mem.read_cstr(0x100), "Hi\n");
    /// assert_eq!(mem.read_cstr(0x101), "i\n");
    /// ```
    pub fn read_cstr(&self, addr: u32) -> String {
        let mut out = String::new();
        let mut addr = addr;
        loop {
            match self.get(addr) {
                0 => break,
                c => out.push(char::from_u32(c as u32).unwrap_or(char::REPLACEMENT_CHARACTER)),
            }
            addr = addr.wrapping_add(1);
        }
        out
    }

    /// Writes a string (with a NUL terminator) starting at the given address.
    ///
    /// This returns the address just past the terminator.
    pub fn write_cstr(&mut self, addr: u32, s: &str) -> u32 {
        let mut addr = addr;
        for c in s.chars().chain(std::iter::once('\0')) {
            self.0.insert(addr, c as i32);
            addr = addr.wrapping_add(1);
        }
        addr
    }

    /// Copies a block of initial values (e.g., a program's data segment) into memory.
    pub fn copy_block(&mut self, data: &BTreeMap<u32, i32>) {
        self.0.extend(data);
    }

    /// An iterator over all written cells, in address order.
    pub fn iter(&self) -> impl Iterator<Item=(u32, i32)> + '_ {
        self.0.iter().map(|(&addr, &value)| (addr, value))
    }

    /// The number of cells that have been written.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no cells have been written.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

}
impl std::fmt::Display for Memory {
    /// Displays every written cell as `address: value`,
    /// annotating values that are printable ASCII with their character.
    ///
    /// ```
    /// use mips_ensemble::sim::mem::Memory;
    ///
    /// let mut mem = Memory::new();
    /// mem.set(0x1001_0000, 72);
    /// mem.set(0x1001_0004, 1000);
    /// assert_eq!(mem.to_string(), "0x10010000: 72 ('H')\n0x10010004: 1000\n");
    /// ```
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (addr, value) in self.iter() {
            match u8::try_from(value) {
                Ok(b) if b.is_ascii_graphic() || b == b' ' => writeln!(f, "{addr:#010x}: {value} ('{}')", char::from(b))?,
                _ => writeln!(f, "{addr:#010x}: {value}")?,
            }
        }
        Ok(())
    }
}

/// The register file.
///
/// This holds the values of all 32 registers.
/// `$zero` always reads 0: writes to it are discarded.
///
/// ```
/// use mips_ensemble::sim::mem::RegFile;
/// use mips_ensemble::ast::reg_consts::{T0, ZERO};
///
/// let mut reg = RegFile::new();
/// reg.set(T0, 11);
/// reg.set(ZERO, 11);
/// assert_eq!(reg[T0], 11);
/// assert_eq!(reg[ZERO], 0);
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct RegFile([i32; Reg::COUNT]);
impl RegFile {
    /// Creates a register file with every register set to 0.
    pub fn new() -> Self {
        Self([0; Reg::COUNT])
    }

    /// Writes to a register. Writes to `$zero` have no effect.
    ///
    /// This returns whether the register's value changed.
    pub fn set(&mut self, reg: Reg, value: i32) -> bool {
        if reg == ZERO { return false; }

        let slot = &mut self.0[usize::from(reg)];
        let changed = *slot != value;
        *slot = value;
        changed
    }

    /// An iterator over every register and its value, in register order.
    pub fn iter(&self) -> impl Iterator<Item=(Reg, i32)> + '_ {
        Reg::all().zip(self.0)
    }
}
impl Default for RegFile {
    fn default() -> Self {
        Self::new()
    }
}
impl std::ops::Index<Reg> for RegFile {
    type Output = i32;

    fn index(&self, index: Reg) -> &Self::Output {
        &self.0[usize::from(index)]
    }
}
impl std::fmt::Display for RegFile {
    /// Displays the registers as a 4-column table.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, (reg, value)) in self.iter().enumerate() {
            let cell = format!("{reg}");
            write!(f, "{cell:>5} = {value:<11}")?;
            match i % 4 {
                3 => writeln!(f)?,
                _ => f.write_str("  ")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::ast::reg_consts::{T0, ZERO};

    use super::{Memory, RegFile};

    #[test]
    fn test_mem_basic() {
        let mut mem = Memory::new();
        assert!(mem.is_empty());
        assert!(mem.set(4, 42));
        assert!(!mem.set(4, 42));
        // writing 0 to a fresh cell doesn't change what it reads
        assert!(!mem.set(8, 0));
        assert_eq!(mem.get(4), 42);
        assert_eq!(mem.len(), 2);

        let data = BTreeMap::from([(0x100, 1), (0x104, 2)]);
        mem.copy_block(&data);
        assert_eq!(mem.iter().collect::<Vec<_>>(), [(4, 42), (8, 0), (0x100, 1), (0x104, 2)]);
    }

    #[test]
    fn test_cstr() {
        let mut mem = Memory::new();
        let end = mem.write_cstr(0x1001_0000, "héllo");
        assert_eq!(end, 0x1001_0006);
        assert_eq!(mem.read_cstr(0x1001_0000), "héllo");
        // unwritten memory is an empty string
        assert_eq!(mem.read_cstr(0x2000), "");

        mem.set(0x3000, -1);
        assert_eq!(mem.read_cstr(0x3000), "\u{FFFD}");

        let dump = mem.to_string();
        assert!(dump.starts_with("0x00003000: -1\n0x10010000: 104 ('h')\n0x10010001: 233\n"));
        assert_eq!(dump.lines().count(), 7);
    }

    #[test]
    fn test_reg_file() {
        let mut regs = RegFile::new();
        assert!(regs.set(T0, -5));
        assert!(!regs.set(T0, -5));
        assert!(!regs.set(ZERO, 1));
        assert_eq!(regs[ZERO], 0);
        assert_eq!(regs.iter().count(), 32);

        let table = regs.to_string();
        assert_eq!(table.lines().count(), 8);
        assert!(table.contains("$t0 = -5"));
    }
}
