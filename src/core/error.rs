//! Error types
//!
//! Recoverable failures use Rust's Result pattern. Every error maps onto one
//! of the kernel's numeric return codes for callers on the raw gateway.

/// Numeric outcome of a kernel call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ReturnCode {
    SyscallUndefined = 0,
    SyscallOk = 1,
    SyscallFailed = 2,
    TaskOk = 3,
    TaskMaximumExceeded = 4,
    TaskMemPoolFull = 5,
    QueueOk = 6,
    QueueMaximumExceeded = 7,
    QueueFailed = 8,
}

impl ReturnCode {
    pub fn from_raw(raw: usize) -> Option<Self> {
        let code = match raw {
            0 => ReturnCode::SyscallUndefined,
            1 => ReturnCode::SyscallOk,
            2 => ReturnCode::SyscallFailed,
            3 => ReturnCode::TaskOk,
            4 => ReturnCode::TaskMaximumExceeded,
            5 => ReturnCode::TaskMemPoolFull,
            6 => ReturnCode::QueueOk,
            7 => ReturnCode::QueueMaximumExceeded,
            8 => ReturnCode::QueueFailed,
            _ => return None,
        };
        Some(code)
    }

    #[inline]
    pub fn is_ok(self) -> bool {
        matches!(
            self,
            ReturnCode::SyscallOk | ReturnCode::TaskOk | ReturnCode::QueueOk
        )
    }
}

/// Recoverable kernel error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OsError {
    // ============ OS state errors ============
    /// Kernel has not been started
    OsNotRunning,
    /// Kernel is already running
    OsRunning,
    /// Global kernel instance not initialized
    OsNotInit,
    /// Blocking call issued from an interrupt handler
    IsrContext,
    /// Call needs a calling task but the idle context is running
    NoCurrentTask,
    /// Caller holds the critical section and may not be switched out
    SchedLocked,
    /// Gateway reported a failure without a recorded cause
    SyscallUndefined,

    // ============ Task errors ============
    /// Task table is full
    TaskMaximumExceeded,
    /// Port could not provide a stack of the requested size
    TaskMemPoolFull,
    /// Handle does not name a live task
    TaskInvalid,
    /// Stack size below the configured minimum
    StkSizeInvalid,
    /// Priority outside the configured range
    PrioInvalid,
    /// Delay components out of range
    DelayInvalid,

    // ============ Queue errors ============
    /// Queue table is full
    QueueMaximumExceeded,
    /// Handle does not name a created queue
    QueueInvalid,
    /// Non-blocking attempt found the mailbox in the wrong state
    WouldBlock,
    /// Blocking attempt ran out of ticks
    Timeout,
    /// Resumed caller has no completed wait to collect
    NoPendingOutcome,
}

/// Result type alias for kernel operations
pub type OsResult<T> = Result<T, OsError>;

impl OsError {
    /// Return code reported for this error
    pub fn code(self) -> ReturnCode {
        match self {
            OsError::SyscallUndefined => ReturnCode::SyscallUndefined,
            OsError::TaskMaximumExceeded => ReturnCode::TaskMaximumExceeded,
            OsError::TaskMemPoolFull => ReturnCode::TaskMemPoolFull,
            OsError::QueueMaximumExceeded => ReturnCode::QueueMaximumExceeded,
            OsError::QueueInvalid
            | OsError::WouldBlock
            | OsError::Timeout
            | OsError::NoPendingOutcome => ReturnCode::QueueFailed,
            OsError::OsNotRunning
            | OsError::OsRunning
            | OsError::OsNotInit
            | OsError::IsrContext
            | OsError::NoCurrentTask
            | OsError::SchedLocked
            | OsError::TaskInvalid
            | OsError::StkSizeInvalid
            | OsError::PrioInvalid
            | OsError::DelayInvalid => ReturnCode::SyscallFailed,
        }
    }

    /// Timeout or would-block: expected in normal operation
    #[inline]
    pub fn is_timeout(self) -> bool {
        matches!(self, OsError::Timeout | OsError::WouldBlock)
    }
}

/// Unrecoverable kernel condition
///
/// Raised when the kernel's own bookkeeping can no longer be trusted.
/// Handled by `Port::fatal`, which halts or resets the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum KernelFault {
    /// Raw gateway received a call code it does not know
    UnknownSyscall(usize),
    /// `leave_critical` without a matching `enter_critical`
    CriticalUnderflow,
    /// Critical section nesting counter saturated
    CriticalOverflow,
    /// Running task slot no longer holds a task
    StaleCurrent(usize),
    /// Ready list disagrees with the task table
    ReadyListCorrupt(usize),
    /// Application issued FATAL_ERROR with this code
    Requested(usize),
}

impl KernelFault {
    /// Numeric fault code, useful for post-mortem registers
    pub fn code(self) -> usize {
        match self {
            KernelFault::UnknownSyscall(_) => 1,
            KernelFault::CriticalUnderflow => 2,
            KernelFault::CriticalOverflow => 3,
            KernelFault::StaleCurrent(_) => 4,
            KernelFault::ReadyListCorrupt(_) => 5,
            KernelFault::Requested(_) => 6,
        }
    }
}
