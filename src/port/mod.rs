//! Port layer - CPU-specific implementations
//!
//! The kernel core never touches registers. Everything processor or board
//! specific goes through the [`Port`] trait, injected when the kernel is
//! built.

mod pool;
mod switch;

pub use pool::{StackPool, STACK_POOL_BLOCKS};
pub use switch::SwitchState;

#[cfg(target_arch = "arm")]
pub mod cortex_m4;

#[cfg(target_arch = "arm")]
pub use cortex_m4::CortexM4;

// Host simulation port (for testing)
#[cfg(not(target_arch = "arm"))]
pub mod sim;

#[cfg(not(target_arch = "arm"))]
pub use sim::{SimFrame, SimPort};

use crate::error::KernelFault;
use crate::task::OsTaskFn;

/// Memory owned exclusively by one task's stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StackRegion {
    bottom: usize,
    size: usize,
}

impl StackRegion {
    pub const fn new(bottom: usize, size: usize) -> Self {
        Self { bottom, size }
    }

    /// Lowest address of the region
    #[inline]
    pub const fn bottom(&self) -> usize {
        self.bottom
    }

    /// One past the highest address; stacks grow down from here
    #[inline]
    pub const fn top(&self) -> usize {
        self.bottom + self.size
    }

    #[inline]
    pub const fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub const fn overlaps(&self, other: &StackRegion) -> bool {
        self.bottom < other.top() && other.bottom < self.top()
    }
}

/// Hardware adapter consumed by the kernel
///
/// Pre/post-conditions the kernel relies on:
/// - `load_context` makes `frame` the next context to execute. On hardware
///   control never comes back to the outgoing context until it is loaded
///   again.
/// - `save_context` is called before `load_context` with the frame of the
///   context being switched out; `discard_context` replaces it when that
///   context belongs to a deleted task.
/// - `forget_frame` is called while a frame is still in place, right before
///   it is freed. No later switch may write into it.
/// - `mask_interrupts` blocks every interrupt that can reenter the kernel
///   (tick, syscall trap, switch request) until `unmask_interrupts`.
/// - `fatal` never returns.
pub trait Port {
    /// Saved execution context of one task
    type Frame: Default;

    /// One-time hardware bring-up, before any task exists
    fn init(&mut self);

    /// Arm the periodic timer that drives `Kernel::tick`
    fn init_ticker(&mut self);

    /// Reserve at least `size` bytes of stack. `None` means the pool is full.
    fn alloc_stack(&mut self, size: usize) -> Option<StackRegion>;

    /// Give a stack obtained from `alloc_stack` back
    fn free_stack(&mut self, stack: StackRegion);

    /// Build the first frame of a task so that it starts in `entry(arg)`
    fn init_frame(
        &mut self,
        frame: &mut Self::Frame,
        stack: &StackRegion,
        entry: OsTaskFn,
        arg: *mut (),
    );

    /// Build the frame of the idle task, whose body must never return
    fn init_idle(&mut self, frame: &mut Self::Frame);

    /// Outgoing context will be stored into `frame`
    fn save_context(&mut self, frame: &mut Self::Frame);

    /// Outgoing context is dead and must not be stored anywhere
    fn discard_context(&mut self);

    /// `frame` belongs to a task being deleted
    fn forget_frame(&mut self, frame: &Self::Frame) {
        let _ = frame;
    }

    /// Resume `frame`
    fn load_context(&mut self, frame: &Self::Frame);

    fn mask_interrupts(&mut self);

    fn unmask_interrupts(&mut self);

    /// Halt or restart the platform
    fn fatal(&mut self, fault: KernelFault) -> !;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_overlap() {
        let a = StackRegion::new(0x1000, 0x100);
        let b = StackRegion::new(0x1100, 0x100);
        let c = StackRegion::new(0x10F0, 0x20);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(b.overlaps(&c));
        assert_eq!(a.top(), 0x1100);
    }
}
