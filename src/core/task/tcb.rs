//! Task Control Block (TCB) definition
//!
//! The TCB contains all the information needed to manage a task.

use crate::config::{CFG_TASK_NAME_SIZE, CFG_TIME_QUANTA};
use crate::port::StackRegion;
use crate::types::{OsPrio, OsTick, QueueHandle, TaskState, WaitOutcome};

use super::OsTaskFn;

/// Bounded, debug-only task name
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TaskName {
    bytes: [u8; CFG_TASK_NAME_SIZE],
    len: u8,
}

impl TaskName {
    /// Copy `name`, truncated on a char boundary to fit
    pub fn new(name: &str) -> Self {
        let mut len = name.len().min(CFG_TASK_NAME_SIZE);
        while !name.is_char_boundary(len) {
            len -= 1;
        }
        let mut bytes = [0u8; CFG_TASK_NAME_SIZE];
        bytes[..len].copy_from_slice(&name.as_bytes()[..len]);
        Self {
            bytes,
            len: len as u8,
        }
    }

    pub fn as_str(&self) -> &str {
        // Only ever built from a &str cut on a char boundary
        core::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or("")
    }
}

impl core::fmt::Debug for TaskName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Debug::fmt(self.as_str(), f)
    }
}

/// Task Control Block
pub struct Tcb<F> {
    // ============ Identification ============
    pub(crate) name: TaskName,
    pub(crate) prio: OsPrio,

    // ============ State ============
    pub(crate) state: TaskState,
    /// Result of the last blocking queue call, set when the task is woken
    pub(crate) outcome: Option<WaitOutcome>,
    /// Blocking order, breaks priority ties between waiters
    pub(crate) wait_seq: u32,

    // ============ Time slicing ============
    pub(crate) time_quanta_ctr: OsTick,

    // ============ Stack and context ============
    pub(crate) stack: StackRegion,
    pub(crate) frame: F,

    // ============ Task entry point ============
    pub(crate) entry: OsTaskFn,
    pub(crate) arg: *mut (),
}

impl<F> Tcb<F> {
    pub(crate) fn new(
        name: &str,
        prio: OsPrio,
        stack: StackRegion,
        frame: F,
        entry: OsTaskFn,
        arg: *mut (),
    ) -> Self {
        Tcb {
            name: TaskName::new(name),
            prio,
            state: TaskState::Ready,
            outcome: None,
            wait_seq: 0,
            time_quanta_ctr: CFG_TIME_QUANTA,
            stack,
            frame,
            entry,
            arg,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    #[inline]
    pub fn priority(&self) -> OsPrio {
        self.prio
    }

    #[inline]
    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Legacy status bitmask of the current state
    #[inline]
    pub fn status(&self) -> u8 {
        self.state.bits()
    }

    /// Queue this task is blocked on
    #[inline]
    pub fn waiting(&self) -> Option<QueueHandle> {
        self.state.waiting()
    }

    /// Remaining ticks of a delay or of a bounded queue wait
    pub fn sleep_time(&self) -> Option<OsTick> {
        match self.state {
            TaskState::Ready => None,
            TaskState::Delayed { remaining } => Some(remaining),
            TaskState::BlockedReading { remaining, .. }
            | TaskState::BlockedWriting { remaining, .. } => remaining,
        }
    }

    #[inline]
    pub fn stack(&self) -> &StackRegion {
        &self.stack
    }

    #[inline]
    pub fn stack_size(&self) -> usize {
        self.stack.size()
    }

    #[inline]
    pub fn stack_top(&self) -> usize {
        self.stack.top()
    }

    #[inline]
    pub fn stack_bottom(&self) -> usize {
        self.stack.bottom()
    }

    #[inline]
    pub fn frame(&self) -> &F {
        &self.frame
    }

    #[inline]
    pub fn entry(&self) -> OsTaskFn {
        self.entry
    }

    #[inline]
    pub fn arg(&self) -> *mut () {
        self.arg
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    #[inline]
    pub fn is_delayed(&self) -> bool {
        matches!(self.state, TaskState::Delayed { .. })
    }

    #[inline]
    pub fn is_blocked(&self) -> bool {
        self.state.is_blocked()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_truncates_on_char_boundary() {
        let name = TaskName::new("abcdefghijklmnopqrstuvwxyz");
        assert_eq!(name.as_str().len(), CFG_TASK_NAME_SIZE);

        // 'é' is two bytes; the cut must not split it
        let long = "aaaaaaaaaaaaaaaé";
        assert_eq!(long.len(), CFG_TASK_NAME_SIZE + 1);
        let name = TaskName::new(long);
        assert_eq!(name.as_str(), "aaaaaaaaaaaaaaa");
    }
}
