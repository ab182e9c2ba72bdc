//! Module handles change observers,
//! which store which parts of the machine changed during execution.
//!
//! You would typically access an observer via the [`Simulator::observer`] field.
//! It is cleared at the start of every [`Simulator::step_in`] and [`Simulator::run_while`] call,
//! so after a step it describes exactly what that step changed.
//!
//! [`Simulator::observer`]: crate::sim::Simulator::observer
//! [`Simulator::step_in`]: crate::sim::Simulator::step_in
//! [`Simulator::run_while`]: crate::sim::Simulator::run_while

use std::collections::{BTreeSet, HashSet};

use crate::ast::Reg;

/// A struct that tracks changes in registers, memory, and the PC.
///
/// A change is only recorded if a write actually changed the stored value.
///
/// ## Example
///
/// ```
/// use mips_ensemble::sim::observer::ChangeObserver;
/// use mips_ensemble::ast::reg_consts::T0;
///
/// let mut obs = ChangeObserver::new();
/// obs.set_reg_changed(T0);
/// obs.set_mem_changed(0x1001_0000);
///
/// assert!(obs.reg_changed(T0));
/// assert!(obs.mem_changed(0x1001_0000));
/// assert!(!obs.pc_changed());
///
/// obs.clear();
/// assert!(!obs.reg_changed(T0));
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct ChangeObserver {
    regs: HashSet<Reg>,
    mem: BTreeSet<u32>,
    pc: bool,
}
impl ChangeObserver {
    /// Creates a new change observer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears all changes.
    pub fn clear(&mut self) {
        std::mem::take(self);
    }

    /// Checks if the register was changed.
    pub fn reg_changed(&self, reg: Reg) -> bool {
        self.regs.contains(&reg)
    }
    /// Marks the register as changed.
    pub fn set_reg_changed(&mut self, reg: Reg) {
        self.regs.insert(reg);
    }

    /// Checks if the memory location was changed.
    pub fn mem_changed(&self, addr: u32) -> bool {
        self.mem.contains(&addr)
    }
    /// Marks the memory location as changed.
    pub fn set_mem_changed(&mut self, addr: u32) {
        self.mem.insert(addr);
    }

    /// Checks if the PC was redirected (by a jump or taken branch).
    pub fn pc_changed(&self) -> bool {
        self.pc
    }
    /// Marks the PC as redirected.
    pub fn set_pc_changed(&mut self) {
        self.pc = true;
    }

    /// All changed registers, in register order.
    pub fn changed_regs(&self) -> Vec<Reg> {
        let mut regs: Vec<_> = self.regs.iter().copied().collect();
        regs.sort_unstable();
        regs
    }
    /// All changed memory locations, in address order.
    pub fn changed_mem(&self) -> impl Iterator<Item=u32> + '_ {
        self.mem.iter().copied()
    }
}
