//! Critical section protected cell
//!
//! Zero-overhead wrapper for data that must be accessed within critical sections.

use core::cell::UnsafeCell;
use critical_section::CriticalSection;

/// A cell that can only be accessed within a critical section.
pub struct CsCell<T>(UnsafeCell<T>);

unsafe impl<T> Sync for CsCell<T> {}

impl<T> CsCell<T> {
    /// Create a new CsCell
    #[inline(always)]
    pub const fn new(value: T) -> Self {
        Self(UnsafeCell::new(value))
    }

    /// Get a mutable reference to the inner value
    ///
    /// The token proves interrupts are masked for `'cs`.
    #[inline(always)]
    #[allow(clippy::mut_from_ref)]
    pub fn get<'cs>(&'cs self, _cs: CriticalSection<'cs>) -> &'cs mut T {
        unsafe { &mut *self.0.get() }
    }
}
