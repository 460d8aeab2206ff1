//! moyos: a small preemptive real-time kernel core
//!
//! A real-time operating system kernel providing:
//! - Priority-based preemptive scheduling with round-robin among equals
//! - Single-slot mailbox queues with blocking and timeouts
//! - Time management with tick-based delays
//! - A syscall gateway and context switching for ARM Cortex-M
//!
//! The whole kernel state lives in one [`Kernel`] value parameterized by a
//! [`port::Port`]. On the host, [`port::SimPort`] drives it in tests; on
//! Cortex-M, [`os`] binds one instance to the hardware.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

// ============ Critical Section ============

#[cfg(target_arch = "arm")]
mod cs_impl {
    use cortex_m::interrupt;
    use cortex_m::register::primask;
    use critical_section::{set_impl, Impl, RawRestoreState};

    struct SingleCoreCriticalSection;
    set_impl!(SingleCoreCriticalSection);

    unsafe impl Impl for SingleCoreCriticalSection {
        unsafe fn acquire() -> RawRestoreState {
            let was_active = primask::read().is_active();
            interrupt::disable();
            was_active
        }

        unsafe fn release(was_active: RawRestoreState) {
            if was_active {
                unsafe { interrupt::enable() }
            }
        }
    }
}

// ============ Modules ============

pub mod log;
mod lang_items;

pub mod core;
pub mod sync;
pub mod port;

#[cfg(target_arch = "arm")]
pub mod os;

// ============ Re-exports ============

pub use self::core::config;
pub use self::core::config::*;
pub use self::core::critical;
pub use self::core::cs_cell;
pub use self::core::error;
pub use self::core::error::{KernelFault, OsError, OsResult, ReturnCode};
pub use self::core::kernel;
pub use self::core::kernel::Kernel;
pub use self::core::prio;
pub use self::core::types;
pub use self::core::types::*;
pub use self::core::task;
pub use self::core::task::{OsTaskFn, Tcb};
pub use self::core::sched;
pub use self::core::syscall;
pub use self::core::syscall::{CallCode, Syscall};
pub use self::core::time;

pub use sync::queue;

#[cfg(feature = "pac")]
pub use stm32_metapac as pac;
