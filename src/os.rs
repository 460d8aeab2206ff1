//! Cortex-M binding of the kernel
//!
//! Places one [`Kernel`] in a critical-section protected static so tasks
//! and interrupt handlers can reach it, and exposes the application API as
//! free functions. Calls that may switch contexts from task level go
//! through the SVCall gateway.

use portable_atomic::{AtomicU32, Ordering};

use crate::critical::is_isr_context;
use crate::cs_cell::CsCell;
use crate::error::{OsError, OsResult, ReturnCode};
use crate::kernel::Kernel;
use crate::port::cortex_m4::{self, CortexM4};
use crate::syscall::Syscall;
use crate::task::OsTaskFn;
use crate::types::{OsItem, OsPrio, OsTick, Progress, QueueHandle, QueueStatus, TaskHandle, NO_WAIT};

static KERNEL: CsCell<Option<Kernel<CortexM4>>> = CsCell::new(None);

/// Tick counter mirror, readable without a critical section
static TICKS: AtomicU32 = AtomicU32::new(0);

/// Run `f` on the global kernel inside a critical section
pub fn with_kernel<R>(f: impl FnOnce(&mut Kernel<CortexM4>) -> R) -> OsResult<R> {
    critical_section::with(|cs| KERNEL.get(cs).as_mut().map(f).ok_or(OsError::OsNotInit))
}

/// Trap into the kernel and recover the error behind a failed call
fn trap(call: Syscall) -> OsResult<()> {
    let raw = cortex_m4::syscall(call.encode());
    if ReturnCode::from_raw(raw) == Some(ReturnCode::SyscallOk) {
        return Ok(());
    }
    let recorded = with_kernel(|k| k.take_syscall_error())?;
    Err(recorded.unwrap_or(OsError::SyscallUndefined))
}

/// Initialize the OS
///
/// Must be called once, before any other function of this module.
pub fn os_init() -> OsResult<()> {
    critical_section::with(|cs| {
        let slot = KERNEL.get(cs);
        if slot.is_some() {
            return Err(OsError::OsRunning);
        }
        *slot = Some(Kernel::new(CortexM4::new()));
        Ok(())
    })
}

/// Start multitasking
///
/// Never returns on success; the first task takes over the CPU.
pub fn os_start() -> OsResult<()> {
    if is_isr_context() {
        return Err(OsError::IsrContext);
    }
    if os_is_running() {
        return Err(OsError::OsRunning);
    }
    with_kernel(|_| ())?;

    trap(Syscall::StartOs)?;

    loop {
        cortex_m::asm::wfi();
    }
}

pub fn os_is_running() -> bool {
    with_kernel(|k| k.is_running()).unwrap_or(false)
}

/// Enter the kernel critical section from application code
pub fn os_enter_critical() -> OsResult<()> {
    with_kernel(|k| k.enter_critical())
}

/// Leave the kernel critical section from application code
pub fn os_leave_critical() -> OsResult<()> {
    with_kernel(|k| k.leave_critical())
}

/// Create a new task
///
/// See [`Kernel::task_create`].
pub fn os_task_create(
    entry: OsTaskFn,
    name: &str,
    stack_size: usize,
    arg: *mut (),
    prio: OsPrio,
) -> OsResult<TaskHandle> {
    with_kernel(|k| k.task_create(entry, name, stack_size, arg, prio))?
}

/// Delete the calling task
pub fn os_task_del() -> ! {
    if let Err(_err) = with_kernel(|k| k.task_delete()).and_then(|r| r) {
        crate::error!("task delete failed: {}", _err);
    }

    // The pended switch discards this context
    loop {
        cortex_m::asm::wfi();
    }
}

/// Delete another task
pub fn os_task_del_by_handle(handle: TaskHandle) -> OsResult<()> {
    with_kernel(|k| k.task_delete_by_handle(handle))?
}

/// Time delay in ticks
///
/// # Returns
/// * `Err(OsError::IsrContext)` - Cannot delay from ISR
/// * `Err(OsError::SchedLocked)` - Caller holds the critical section
pub fn os_time_dly(ticks: OsTick) -> OsResult<()> {
    if is_isr_context() {
        return Err(OsError::IsrContext);
    }
    if !os_is_running() {
        return Err(OsError::OsNotRunning);
    }

    trap(Syscall::TaskSleep(ticks))
}

/// Let the next ready task of the same priority run
pub fn os_yield() -> OsResult<()> {
    if is_isr_context() {
        return Err(OsError::IsrContext);
    }
    if !os_is_running() {
        return Err(OsError::OsNotRunning);
    }

    trap(Syscall::SwitchContext)
}

/// Halt the platform from application code
pub fn os_fatal(code: usize) -> ! {
    let _ = trap(Syscall::FatalError(code));
    loop {
        cortex_m::asm::udf();
    }
}

pub fn os_queue_create() -> OsResult<QueueHandle> {
    with_kernel(|k| k.queue_create())?
}

pub fn os_queue_status(queue: QueueHandle) -> OsResult<QueueStatus> {
    with_kernel(|k| k.queue_status(queue))?
}

/// Put an item into a mailbox, blocking up to `timeout` ticks for room
///
/// Interrupt handlers may only use `NO_WAIT`.
pub fn os_queue_push(queue: QueueHandle, item: OsItem, timeout: OsTick) -> OsResult<()> {
    if timeout != NO_WAIT && is_isr_context() {
        return Err(OsError::IsrContext);
    }

    match with_kernel(|k| k.queue_push(queue, item, timeout))?? {
        Progress::Done(()) => Ok(()),
        // Resumes here once a reader made room or the wait ran out
        Progress::Suspended => with_kernel(|k| k.finish_push())?,
    }
}

/// Take the item out of a mailbox, blocking up to `timeout` ticks for one
///
/// Interrupt handlers may only use `NO_WAIT`.
pub fn os_queue_pull(queue: QueueHandle, timeout: OsTick) -> OsResult<OsItem> {
    if timeout != NO_WAIT && is_isr_context() {
        return Err(OsError::IsrContext);
    }

    match with_kernel(|k| k.queue_pull(queue, timeout))?? {
        Progress::Done(item) => Ok(item),
        Progress::Suspended => with_kernel(|k| k.finish_pull())?,
    }
}

/// Get current tick count
#[inline]
pub fn os_time_get() -> OsTick {
    TICKS.load(Ordering::Relaxed)
}

/// SysTick interrupt handler
#[no_mangle]
pub extern "C" fn SysTick() {
    let _ = with_kernel(|k| {
        k.tick();
        TICKS.store(k.tick_count(), Ordering::Relaxed);
    });
}
