//! Mailbox queues
//!
//! Each queue holds at most one machine-word item. A writer that finds the
//! mailbox filled blocks until a reader empties it; a reader that finds it
//! empty blocks until a writer fills it. When a reader is already waiting,
//! a push hands the item over directly and the mailbox stays empty.
//!
//! Waiters are found by scanning the task table for the matching blocked
//! state. The most urgent waiter wins; among equal priorities the one that
//! blocked first.

use crate::config::CFG_MAX_QUEUES;
use crate::error::{OsError, OsResult};
use crate::kernel::Kernel;
use crate::port::Port;
use crate::types::{
    OsItem, OsTick, Progress, QueueHandle, QueueStatus, TaskState, WaitOutcome, NO_WAIT,
    WAIT_FOREVER,
};

/// Single-slot mailbox
#[derive(Debug, Clone, Copy)]
pub struct Mailbox {
    status: QueueStatus,
    item: OsItem,
}

impl Mailbox {
    pub const fn new() -> Self {
        Self {
            status: QueueStatus::Empty,
            item: 0,
        }
    }

    #[inline]
    pub fn status(&self) -> QueueStatus {
        self.status
    }

    #[inline]
    pub fn is_filled(&self) -> bool {
        self.status == QueueStatus::Filled
    }

    fn fill(&mut self, item: OsItem) {
        self.item = item;
        self.status = QueueStatus::Filled;
    }

    fn take(&mut self) -> OsItem {
        self.status = QueueStatus::Empty;
        core::mem::take(&mut self.item)
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed table of mailboxes, allocated in creation order
#[derive(Debug)]
pub struct QueueTable {
    boxes: [Mailbox; CFG_MAX_QUEUES],
    len: usize,
}

impl QueueTable {
    pub const fn new() -> Self {
        Self {
            boxes: [Mailbox::new(); CFG_MAX_QUEUES],
            len: 0,
        }
    }

    /// Take the next unused mailbox. `None` when the table is full.
    pub fn create(&mut self) -> Option<QueueHandle> {
        if self.is_full() {
            return None;
        }
        let handle = QueueHandle::new(self.len as u8);
        self.boxes[self.len] = Mailbox::new();
        self.len += 1;
        Some(handle)
    }

    pub fn get(&self, handle: QueueHandle) -> Option<&Mailbox> {
        self.boxes[..self.len].get(handle.index())
    }

    pub fn get_mut(&mut self, handle: QueueHandle) -> Option<&mut Mailbox> {
        self.boxes[..self.len].get_mut(handle.index())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == CFG_MAX_QUEUES
    }
}

impl Default for QueueTable {
    fn default() -> Self {
        Self::new()
    }
}

fn wait_budget(timeout: OsTick) -> Option<OsTick> {
    (timeout != WAIT_FOREVER).then_some(timeout)
}

impl<P: Port> Kernel<P> {
    /// Create a mailbox
    ///
    /// # Returns
    /// * `Err(OsError::QueueMaximumExceeded)` - Queue table is full
    pub fn queue_create(&mut self) -> OsResult<QueueHandle> {
        self.critical(|k| match k.queues.create() {
            Some(handle) => {
                crate::debug!("queue {} created", handle.index());
                Ok(handle)
            }
            None => {
                crate::warn!("queue table full");
                Err(OsError::QueueMaximumExceeded)
            }
        })
    }

    pub fn queue_status(&self, queue: QueueHandle) -> OsResult<QueueStatus> {
        self.queues
            .get(queue)
            .map(Mailbox::status)
            .ok_or(OsError::QueueInvalid)
    }

    #[inline]
    pub fn queue_count(&self) -> usize {
        self.queues.len()
    }

    /// Put an item into a mailbox
    ///
    /// # Arguments
    /// * `queue` - Target mailbox
    /// * `item` - Word to deliver
    /// * `timeout` - Ticks to wait for room: `NO_WAIT`, a bound, or `WAIT_FOREVER`
    ///
    /// # Returns
    /// * `Ok(Progress::Done(()))` - Item stored or handed to a waiting reader
    /// * `Ok(Progress::Suspended)` - Caller blocked; collect with [`Kernel::finish_push`]
    /// * `Err(OsError::WouldBlock)` - Mailbox filled and `timeout` is `NO_WAIT`
    /// * `Err(OsError::SchedLocked)` - Would block while the caller holds the critical section
    pub fn queue_push(
        &mut self,
        queue: QueueHandle,
        item: OsItem,
        timeout: OsTick,
    ) -> OsResult<Progress<()>> {
        self.critical(|k| {
            let filled = k
                .queues
                .get(queue)
                .ok_or(OsError::QueueInvalid)?
                .is_filled();

            if !filled {
                match k.waiting_reader(queue) {
                    Some(reader) => {
                        k.wake(reader, Some(WaitOutcome::Received(item)));
                        k.schedule();
                    }
                    None => {
                        if let Some(mailbox) = k.queues.get_mut(queue) {
                            mailbox.fill(item);
                        }
                    }
                }
                return Ok(Progress::Done(()));
            }

            let idx = k.blocking_caller(timeout)?;
            k.suspend(
                idx,
                TaskState::BlockedWriting {
                    queue,
                    remaining: wait_budget(timeout),
                    item,
                },
            );
            k.schedule();
            Ok(Progress::Suspended)
        })
    }

    /// Take the item out of a mailbox
    ///
    /// If a writer is blocked on the mailbox, its item moves in right away
    /// and the writer becomes ready.
    ///
    /// # Returns
    /// * `Ok(Progress::Done(item))` - Item taken without blocking
    /// * `Ok(Progress::Suspended)` - Caller blocked; collect with [`Kernel::finish_pull`]
    /// * `Err(OsError::WouldBlock)` - Mailbox empty and `timeout` is `NO_WAIT`
    /// * `Err(OsError::SchedLocked)` - Would block while the caller holds the critical section
    pub fn queue_pull(&mut self, queue: QueueHandle, timeout: OsTick) -> OsResult<Progress<OsItem>> {
        self.critical(|k| {
            let mailbox = k.queues.get_mut(queue).ok_or(OsError::QueueInvalid)?;

            if mailbox.is_filled() {
                let item = mailbox.take();
                if let Some(writer) = k.waiting_writer(queue) {
                    if let Some(TaskState::BlockedWriting { item: pending, .. }) =
                        k.tasks.get(writer).map(|tcb| tcb.state)
                    {
                        if let Some(mailbox) = k.queues.get_mut(queue) {
                            mailbox.fill(pending);
                        }
                    }
                    k.wake(writer, Some(WaitOutcome::Sent));
                    k.schedule();
                }
                return Ok(Progress::Done(item));
            }

            let idx = k.blocking_caller(timeout)?;
            k.suspend(
                idx,
                TaskState::BlockedReading {
                    queue,
                    remaining: wait_budget(timeout),
                },
            );
            k.schedule();
            Ok(Progress::Suspended)
        })
    }

    /// Collect the result of a push that suspended the caller
    ///
    /// # Returns
    /// * `Err(OsError::Timeout)` - No room appeared within the timeout
    pub fn finish_push(&mut self) -> OsResult<()> {
        match self.take_outcome()? {
            WaitOutcome::Sent => Ok(()),
            WaitOutcome::TimedOut => Err(OsError::Timeout),
            WaitOutcome::Received(_) => Err(OsError::NoPendingOutcome),
        }
    }

    /// Collect the result of a pull that suspended the caller
    ///
    /// # Returns
    /// * `Err(OsError::Timeout)` - No item arrived within the timeout
    pub fn finish_pull(&mut self) -> OsResult<OsItem> {
        match self.take_outcome()? {
            WaitOutcome::Received(item) => Ok(item),
            WaitOutcome::TimedOut => Err(OsError::Timeout),
            WaitOutcome::Sent => Err(OsError::NoPendingOutcome),
        }
    }

    fn take_outcome(&mut self) -> OsResult<WaitOutcome> {
        self.critical(|k| {
            let idx = k.current_index().ok_or(OsError::NoCurrentTask)?;
            k.tasks
                .get_mut(idx)
                .and_then(|tcb| tcb.outcome.take())
                .ok_or(OsError::NoPendingOutcome)
        })
    }

    /// Task that would suspend on a full or empty mailbox
    fn blocking_caller(&self, timeout: OsTick) -> OsResult<usize> {
        if timeout == NO_WAIT {
            return Err(OsError::WouldBlock);
        }
        if !self.started {
            return Err(OsError::OsNotRunning);
        }
        if self.sched_locked() {
            crate::warn!("blocking queue call inside critical section");
            return Err(OsError::SchedLocked);
        }
        self.current_index().ok_or(OsError::NoCurrentTask)
    }

    /// Most urgent task blocked reading `queue`
    pub(crate) fn waiting_reader(&self, queue: QueueHandle) -> Option<usize> {
        self.first_waiter(|state| {
            matches!(state, TaskState::BlockedReading { queue: q, .. } if q == queue)
        })
    }

    /// Most urgent task blocked writing `queue`
    pub(crate) fn waiting_writer(&self, queue: QueueHandle) -> Option<usize> {
        self.first_waiter(|state| {
            matches!(state, TaskState::BlockedWriting { queue: q, .. } if q == queue)
        })
    }

    fn first_waiter(&self, pred: impl Fn(TaskState) -> bool) -> Option<usize> {
        self.tasks
            .iter()
            .filter(|(_, tcb)| pred(tcb.state))
            .min_by_key(|(_, tcb)| (tcb.prio, tcb.wait_seq))
            .map(|(idx, _)| idx)
    }
}
