//! Critical section handling
//!
//! The kernel keeps one nesting counter for the whole kernel state. Only the
//! outermost enter masks the kernel interrupts and only the matching
//! outermost leave unmasks them. There is no automatic unwind: an unpaired
//! enter leaves the kernel masked, an unpaired leave is a fault.

use crate::error::KernelFault;
use crate::types::OsNestingCtr;

/// Transition reported by [`CriticalNesting`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// 0 -> 1 on enter, 1 -> 0 on leave: the port must act
    Edge,
    /// Nested enter or leave
    Nested,
}

/// Nesting counter of the kernel critical section
#[derive(Debug, Default)]
pub struct CriticalNesting {
    depth: OsNestingCtr,
}

impl CriticalNesting {
    pub const fn new() -> Self {
        Self { depth: 0 }
    }

    /// Increment the counter
    #[inline]
    pub fn enter(&mut self) -> Result<Transition, KernelFault> {
        if self.depth == OsNestingCtr::MAX {
            return Err(KernelFault::CriticalOverflow);
        }
        self.depth += 1;
        Ok(if self.depth == 1 {
            Transition::Edge
        } else {
            Transition::Nested
        })
    }

    /// Decrement the counter
    #[inline]
    pub fn leave(&mut self) -> Result<Transition, KernelFault> {
        if self.depth == 0 {
            return Err(KernelFault::CriticalUnderflow);
        }
        self.depth -= 1;
        Ok(if self.depth == 0 {
            Transition::Edge
        } else {
            Transition::Nested
        })
    }

    #[inline]
    pub fn depth(&self) -> OsNestingCtr {
        self.depth
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.depth > 0
    }
}

/// Check if currently executing in an ISR context
#[inline]
pub fn is_isr_context() -> bool {
    #[cfg(target_arch = "arm")]
    {
        let ipsr: u32;
        unsafe {
            core::arch::asm!(
                "mrs {}, IPSR",
                out(reg) ipsr,
                options(nomem, nostack, preserves_flags)
            );
        }
        ipsr != 0
    }

    #[cfg(not(target_arch = "arm"))]
    {
        false
    }
}

/// Mask priority levels using BASEPRI (Cortex-M3/M4/M7)
///
/// Only interrupts with a priority value >= the mask value are blocked.
#[inline]
pub fn set_basepri(priority: u8) {
    #[cfg(target_arch = "arm")]
    unsafe {
        core::arch::asm!(
            "msr BASEPRI, {}",
            in(reg) priority as u32,
            options(nomem, nostack, preserves_flags)
        );
    }

    #[cfg(not(target_arch = "arm"))]
    {
        let _ = priority;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edges_only_at_outermost_level() {
        let mut nesting = CriticalNesting::new();
        assert_eq!(nesting.enter(), Ok(Transition::Edge));
        assert_eq!(nesting.enter(), Ok(Transition::Nested));
        assert_eq!(nesting.depth(), 2);
        assert_eq!(nesting.leave(), Ok(Transition::Nested));
        assert_eq!(nesting.leave(), Ok(Transition::Edge));
        assert!(!nesting.is_active());
    }

    #[test]
    fn test_unpaired_leave_is_fault() {
        let mut nesting = CriticalNesting::new();
        assert_eq!(nesting.leave(), Err(KernelFault::CriticalUnderflow));
    }

    #[test]
    fn test_saturation_is_fault() {
        let mut nesting = CriticalNesting::new();
        for _ in 0..OsNestingCtr::MAX {
            assert!(nesting.enter().is_ok());
        }
        assert_eq!(nesting.enter(), Err(KernelFault::CriticalOverflow));
    }
}
