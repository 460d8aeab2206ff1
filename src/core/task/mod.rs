//! Task management module
//!
//! Provides the task table and task creation and deletion.

mod tcb;

pub use tcb::{TaskName, Tcb};

use crate::config::{CFG_MAX_TASKS, CFG_PRIO_MAX, CFG_STK_SIZE_MIN};
use crate::error::{OsError, OsResult};
use crate::kernel::{Kernel, Running};
use crate::port::Port;
use crate::types::{OsPrio, TaskHandle};

/// Task entry point function type
///
/// Returning from the entry point terminates the task.
pub type OsTaskFn = fn(*mut ());

/// Fixed-capacity arena of TCBs
///
/// Freed slots are recycled through a free list. Each slot carries a
/// generation that is bumped on every free, so handles to deleted tasks
/// stop resolving even after the slot is reused. A slot whose generation
/// has run out is retired for good instead of wrapping.
pub struct TaskTable<F> {
    slots: [Option<Tcb<F>>; CFG_MAX_TASKS],
    generations: [u16; CFG_MAX_TASKS],
    free: [u8; CFG_MAX_TASKS],
    free_len: usize,
    retired: usize,
}

impl<F> TaskTable<F> {
    pub fn new() -> Self {
        // Popped from the back: lowest slot first
        let mut free = [0u8; CFG_MAX_TASKS];
        for (i, slot) in free.iter_mut().enumerate() {
            *slot = (CFG_MAX_TASKS - 1 - i) as u8;
        }

        Self {
            slots: core::array::from_fn(|_| None),
            generations: [0; CFG_MAX_TASKS],
            free,
            free_len: CFG_MAX_TASKS,
            retired: 0,
        }
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.free_len == 0
    }

    /// Number of live tasks
    #[inline]
    pub fn len(&self) -> usize {
        CFG_MAX_TASKS - self.free_len - self.retired
    }

    /// Slots taken out of service after exhausting their generations
    #[inline]
    pub fn retired(&self) -> usize {
        self.retired
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store a TCB in a free slot
    pub(crate) fn insert(&mut self, tcb: Tcb<F>) -> Result<TaskHandle, Tcb<F>> {
        if self.free_len == 0 {
            return Err(tcb);
        }
        self.free_len -= 1;
        let idx = self.free[self.free_len] as usize;
        self.slots[idx] = Some(tcb);
        Ok(TaskHandle::new(idx as u8, self.generations[idx]))
    }

    /// Free a slot and hand back its TCB
    pub(crate) fn remove(&mut self, idx: usize) -> Option<Tcb<F>> {
        let tcb = self.slots.get_mut(idx)?.take()?;
        match self.generations[idx].checked_add(1) {
            Some(generation) => {
                self.generations[idx] = generation;
                self.free[self.free_len] = idx as u8;
                self.free_len += 1;
            }
            None => {
                crate::warn!("slot {} retired", idx);
                self.retired += 1;
            }
        }
        Some(tcb)
    }

    /// Slot index of a live task, `None` for stale or foreign handles
    pub fn resolve(&self, handle: TaskHandle) -> Option<usize> {
        let idx = handle.index();
        let live = self.slots.get(idx)?.is_some();
        (live && self.generations[idx] == handle.generation()).then_some(idx)
    }

    #[inline]
    pub fn get(&self, idx: usize) -> Option<&Tcb<F>> {
        self.slots.get(idx)?.as_ref()
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, idx: usize) -> Option<&mut Tcb<F>> {
        self.slots.get_mut(idx)?.as_mut()
    }

    pub fn handle_of(&self, idx: usize) -> Option<TaskHandle> {
        self.get(idx)?;
        Some(TaskHandle::new(idx as u8, self.generations[idx]))
    }

    /// Live tasks with their slot index
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Tcb<F>)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|tcb| (idx, tcb)))
    }
}

impl<F> Default for TaskTable<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Port> Kernel<P> {
    /// Create a new task
    ///
    /// # Arguments
    /// * `entry` - Task entry point, called as `entry(arg)`
    /// * `name` - Task name for debugging, truncated to `CFG_TASK_NAME_SIZE`
    /// * `stack_size` - Stack size in bytes, at least `CFG_STK_SIZE_MIN`
    /// * `arg` - Argument passed to `entry`
    /// * `prio` - Task priority (0 = most urgent)
    ///
    /// The task starts ready. If the kernel is running and the new task is
    /// more urgent than the caller, it runs before this call returns.
    ///
    /// # Returns
    /// * `Err(OsError::TaskMaximumExceeded)` - No free task slot
    /// * `Err(OsError::TaskMemPoolFull)` - Port could not provide the stack
    pub fn task_create(
        &mut self,
        entry: OsTaskFn,
        name: &str,
        stack_size: usize,
        arg: *mut (),
        prio: OsPrio,
    ) -> OsResult<TaskHandle> {
        if prio as usize >= CFG_PRIO_MAX {
            return Err(OsError::PrioInvalid);
        }

        if stack_size < CFG_STK_SIZE_MIN {
            return Err(OsError::StkSizeInvalid);
        }

        self.critical(|k| {
            if k.tasks.is_full() {
                crate::warn!("task table full, cannot create {}", name);
                return Err(OsError::TaskMaximumExceeded);
            }

            let Some(stack) = k.port.alloc_stack(stack_size) else {
                crate::warn!("no stack of {} bytes for {}", stack_size, name);
                return Err(OsError::TaskMemPoolFull);
            };

            let mut frame = P::Frame::default();
            k.port.init_frame(&mut frame, &stack, entry, arg);

            let handle = match k.tasks.insert(Tcb::new(name, prio, stack, frame, entry, arg)) {
                Ok(handle) => handle,
                Err(tcb) => {
                    k.port.free_stack(tcb.stack);
                    return Err(OsError::TaskMaximumExceeded);
                }
            };

            k.sched.make_ready(handle.index(), prio);
            crate::debug!("task {} created in slot {}, prio {}", name, handle.index(), prio);

            k.schedule();
            Ok(handle)
        })
    }

    /// Delete the calling task
    ///
    /// The CPU goes to another task (or idle) at once; the deleted context
    /// is never resumed.
    ///
    /// # Returns
    /// * `Err(OsError::NoCurrentTask)` - Called before start or from idle
    /// * `Err(OsError::SchedLocked)` - Caller holds the critical section
    pub fn task_delete(&mut self) -> OsResult<()> {
        let idx = self.current_index().ok_or(OsError::NoCurrentTask)?;
        self.critical(|k| k.delete_slot(idx))
    }

    /// Delete a task by handle
    ///
    /// A task blocked on a queue is removed without notice; its pending
    /// operation is abandoned.
    ///
    /// # Returns
    /// * `Err(OsError::TaskInvalid)` - Handle is stale or was never issued
    pub fn task_delete_by_handle(&mut self, handle: TaskHandle) -> OsResult<()> {
        self.critical(|k| {
            let idx = k.tasks.resolve(handle).ok_or(OsError::TaskInvalid)?;
            k.delete_slot(idx)
        })
    }

    fn delete_slot(&mut self, idx: usize) -> OsResult<()> {
        let Some(frame) = self.tasks.get(idx).map(|tcb| &tcb.frame) else {
            return Err(OsError::TaskInvalid);
        };
        if self.running == Running::Task(idx) && self.sched_locked() {
            return Err(OsError::SchedLocked);
        }
        // A switch still in flight may point at this frame
        self.port.forget_frame(frame);

        let tcb = self.tasks.remove(idx).ok_or(OsError::TaskInvalid)?;

        if tcb.is_ready() {
            self.sched.make_unready(idx, tcb.prio);
        }
        self.port.free_stack(tcb.stack);

        if self.running == Running::Task(idx) {
            self.running = Running::Detached;
        }

        crate::debug!("task {} deleted from slot {}", tcb.name(), idx);
        self.schedule();
        Ok(())
    }

    /// Look up a live task
    pub fn task(&self, handle: TaskHandle) -> OsResult<&Tcb<P::Frame>> {
        self.tasks
            .resolve(handle)
            .and_then(|idx| self.tasks.get(idx))
            .ok_or(OsError::TaskInvalid)
    }

    #[inline]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Live tasks with their slot index
    pub fn tasks(&self) -> impl Iterator<Item = (usize, &Tcb<P::Frame>)> {
        self.tasks.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::StackRegion;

    fn entry(_: *mut ()) {}

    fn tcb(prio: OsPrio) -> Tcb<()> {
        Tcb::new("t", prio, StackRegion::new(0, 256), (), entry, core::ptr::null_mut())
    }

    #[test]
    fn test_fills_lowest_slots_first() {
        let mut table = TaskTable::new();
        let a = table.insert(tcb(1)).ok().unwrap();
        let b = table.insert(tcb(1)).ok().unwrap();
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_capacity() {
        let mut table = TaskTable::new();
        for _ in 0..CFG_MAX_TASKS {
            assert!(table.insert(tcb(3)).is_ok());
        }
        assert!(table.is_full());
        assert!(table.insert(tcb(3)).is_err());
    }

    #[test]
    fn test_stale_handle_after_reuse() {
        let mut table = TaskTable::new();
        let old = table.insert(tcb(1)).ok().unwrap();
        assert!(table.remove(old.index()).is_some());
        assert_eq!(table.resolve(old), None);

        let new = table.insert(tcb(2)).ok().unwrap();
        assert_eq!(new.index(), old.index());
        assert_ne!(new.generation(), old.generation());
        assert_eq!(table.resolve(old), None);
        assert_eq!(table.resolve(new), Some(new.index()));
    }

    #[test]
    fn test_exhausted_slot_is_retired() {
        let mut table = TaskTable::new();
        table.generations[0] = u16::MAX - 1;

        let last = table.insert(tcb(1)).ok().unwrap();
        table.remove(last.index());
        let oldest = table.insert(tcb(1)).ok().unwrap();
        assert_eq!(oldest.index(), 0);
        assert_eq!(oldest.generation(), u16::MAX);

        // Generation would wrap back to one already handed out
        table.remove(oldest.index());
        assert_eq!(table.retired(), 1);
        assert!(table.is_empty());

        let next = table.insert(tcb(1)).ok().unwrap();
        assert_eq!(next.index(), 1);
        assert_eq!(table.resolve(oldest), None);
        assert_eq!(table.resolve(last), None);

        for _ in 1..CFG_MAX_TASKS - 1 {
            assert!(table.insert(tcb(1)).is_ok());
        }
        assert!(table.is_full());
        assert_eq!(table.len(), CFG_MAX_TASKS - 1);
    }

    #[test]
    fn test_double_remove() {
        let mut table = TaskTable::new();
        let h = table.insert(tcb(1)).ok().unwrap();
        assert!(table.remove(h.index()).is_some());
        assert!(table.remove(h.index()).is_none());
        assert!(table.is_empty());
    }
}
