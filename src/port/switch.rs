//! Switch request shared between the kernel and a deferred switch handler
//!
//! On hardware the kernel only names the frames; the actual register swap
//! happens later in an exception. Several kernel decisions may land before
//! that exception runs, so the request is kept here and merged.

use core::ptr::{null, null_mut};

/// Pending context switch
///
/// `save` must stay the first field: handler code tests it by address
/// before stacking.
#[repr(C)]
#[derive(Debug)]
pub struct SwitchState<F> {
    /// Frame receiving the outgoing context, null to drop it
    save: *mut F,
    /// Frame to resume
    load: *const F,
    /// A switch is requested and has not run yet
    pending: bool,
}

impl<F> SwitchState<F> {
    pub const fn new() -> Self {
        Self {
            save: null_mut(),
            load: null(),
            pending: false,
        }
    }

    /// Store the outgoing context into `frame`
    ///
    /// While a switch is in flight the CPU still holds the context named by
    /// the earlier request, so that target is kept.
    pub fn save(&mut self, frame: *mut F) {
        if !self.pending {
            self.save = frame;
        }
    }

    /// Drop the outgoing context
    pub fn discard(&mut self) {
        if !self.pending {
            self.save = null_mut();
        }
    }

    /// `frame` is about to be freed: never write into it
    pub fn forget(&mut self, frame: *const F) {
        if core::ptr::eq(self.save, frame) {
            self.save = null_mut();
        }
    }

    /// Resume `frame` at the next switch; the last request wins
    pub fn load(&mut self, frame: *const F) {
        self.load = frame;
        self.pending = true;
    }

    /// Hand the request to the switch handler and clear it
    ///
    /// Returns the frames to save into and to resume, either may be null.
    pub fn complete(&mut self) -> (*mut F, *const F) {
        let save = core::mem::replace(&mut self.save, null_mut());
        self.pending = false;
        (save, self.load)
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    #[inline]
    pub fn save_target(&self) -> *mut F {
        self.save
    }
}

impl<F> Default for SwitchState<F> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_save_target_kept_until_complete() {
        let mut a = 1u32;
        let mut b = 2u32;
        let c = 3u32;
        let mut sw = SwitchState::new();

        sw.save(&mut a);
        sw.load(&b);
        sw.save(&mut b);
        sw.load(&c);
        assert!(sw.is_pending());

        let (save, load) = sw.complete();
        assert!(core::ptr::eq(save, &a));
        assert!(core::ptr::eq(load, &c));
        assert!(!sw.is_pending());
        assert!(sw.save_target().is_null());
    }

    #[test]
    fn test_forget_freed_save_target() {
        let mut dead = 1u32;
        let mut live = 2u32;
        let next = 3u32;
        let mut sw = SwitchState::new();

        sw.save(&mut dead);
        sw.load(&live);
        // Deleting the outgoing task before the handler runs
        sw.discard();
        sw.forget(&dead);
        sw.load(&next);

        let (save, load) = sw.complete();
        assert!(save.is_null());
        assert!(core::ptr::eq(load, &next));

        // Unrelated frames leave the target alone
        sw.save(&mut live);
        sw.forget(&next);
        assert!(core::ptr::eq(sw.save_target(), &live));
    }
}
