//! Core type definitions
//!
//! These types provide strong typing for kernel primitives.

/// Task priority (0 = most urgent)
pub type OsPrio = u8;

/// Tick counter type
pub type OsTick = u32;

/// Nesting counter
pub type OsNestingCtr = u8;

/// One machine word carried by a mailbox
pub type OsItem = usize;

/// Stack element type
pub type OsStkElement = u32;

/// Timeout for a non-blocking attempt
pub const NO_WAIT: OsTick = 0;

/// Timeout that never expires
pub const WAIT_FOREVER: OsTick = OsTick::MAX;

/// Legacy status bits, one per primary task state
pub mod status {
    pub const READY: u8 = 1;
    pub const DELAYED: u8 = 1 << 1;
    pub const BLOCKED_READING_QUEUE: u8 = 1 << 2;
    pub const BLOCKED_WRITING_QUEUE: u8 = 1 << 3;
}

/// Handle of a task slot
///
/// The generation changes every time the slot is freed, so a handle kept
/// past its task's deletion never resolves to a newer task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TaskHandle {
    index: u8,
    generation: u16,
}

impl TaskHandle {
    pub(crate) const fn new(index: u8, generation: u16) -> Self {
        Self { index, generation }
    }

    /// Slot index in the task table
    #[inline]
    pub const fn index(self) -> usize {
        self.index as usize
    }

    #[inline]
    pub const fn generation(self) -> u16 {
        self.generation
    }

    /// Pack into one machine word for the syscall gateway
    #[inline]
    pub const fn to_raw(self) -> usize {
        (self.generation as usize) << 8 | self.index as usize
    }

    /// Unpack a word made by [`TaskHandle::to_raw`]; `None` if bits
    /// above the generation are set
    #[inline]
    pub const fn from_raw(raw: usize) -> Option<Self> {
        if raw >> 24 != 0 {
            return None;
        }
        Some(Self {
            index: (raw & 0xFF) as u8,
            generation: ((raw >> 8) & 0xFFFF) as u16,
        })
    }
}

/// Handle of a mailbox. Mailboxes live as long as the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct QueueHandle(u8);

impl QueueHandle {
    pub(crate) const fn new(index: u8) -> Self {
        Self(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn to_raw(self) -> usize {
        self.0 as usize
    }

    /// `None` if `raw` does not fit a queue index
    #[inline]
    pub const fn from_raw(raw: usize) -> Option<Self> {
        if raw > u8::MAX as usize {
            return None;
        }
        Some(Self(raw as u8))
    }
}

/// Task state
///
/// Exactly one primary state at a time. A running task is `Ready`.
/// `remaining: None` on a blocked task means it waits forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TaskState {
    /// Task may be selected by the scheduler
    Ready,
    /// Task sleeps for `remaining` more ticks
    Delayed { remaining: OsTick },
    /// Task waits for an item on `queue`
    BlockedReading {
        queue: QueueHandle,
        remaining: Option<OsTick>,
    },
    /// Task waits for room on `queue` to deposit `item`
    BlockedWriting {
        queue: QueueHandle,
        remaining: Option<OsTick>,
        item: OsItem,
    },
}

impl TaskState {
    /// Status bit matching this state
    pub const fn bits(self) -> u8 {
        match self {
            TaskState::Ready => status::READY,
            TaskState::Delayed { .. } => status::DELAYED,
            TaskState::BlockedReading { .. } => status::BLOCKED_READING_QUEUE,
            TaskState::BlockedWriting { .. } => status::BLOCKED_WRITING_QUEUE,
        }
    }

    #[inline]
    pub const fn is_ready(self) -> bool {
        matches!(self, TaskState::Ready)
    }

    #[inline]
    pub const fn is_blocked(self) -> bool {
        matches!(
            self,
            TaskState::BlockedReading { .. } | TaskState::BlockedWriting { .. }
        )
    }

    /// Queue the task is blocked on, if any
    pub const fn waiting(self) -> Option<QueueHandle> {
        match self {
            TaskState::BlockedReading { queue, .. } | TaskState::BlockedWriting { queue, .. } => {
                Some(queue)
            }
            _ => None,
        }
    }
}

/// How a blocked queue operation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WaitOutcome {
    /// A writer handed this item to the blocked reader
    Received(OsItem),
    /// The blocked writer's item was accepted
    Sent,
    /// The wait budget ran out
    TimedOut,
}

/// Mailbox fill state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum QueueStatus {
    Empty = 0,
    Filled = 1,
}

/// Result of a call that may suspend the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Progress<T> {
    /// The call completed without blocking
    Done(T),
    /// The caller was switched out; collect the outcome once resumed
    Suspended,
}

impl<T> Progress<T> {
    #[inline]
    pub fn is_suspended(&self) -> bool {
        matches!(self, Progress::Suspended)
    }
}
