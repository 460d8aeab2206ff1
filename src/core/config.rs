//! Compile-time configuration for the kernel
//!
//! These constants fix the size of every kernel table. Nothing grows at
//! run time.

use crate::types::OsTick;

/// Number of task slots in the task table
pub const CFG_MAX_TASKS: usize = 8;

/// Number of mailboxes in the queue table
pub const CFG_MAX_QUEUES: usize = 8;

/// Number of priority levels (0 = most urgent)
pub const CFG_PRIO_MAX: usize = 32;

/// Maximum length of a task name in bytes
pub const CFG_TASK_NAME_SIZE: usize = 16;

/// System tick rate in Hz
pub const CFG_TICK_RATE_HZ: u32 = 1000;

/// Core clock feeding the tick timer
pub const CFG_CPU_CLOCK_HZ: u32 = 16_000_000;

/// Ticks a task may run before yielding to a peer of equal priority
pub const CFG_TIME_QUANTA: OsTick = 1;

/// Minimum task stack size in bytes
pub const CFG_STK_SIZE_MIN: usize = 256;

/// Allocation granule of the stack pool in bytes
pub const CFG_STACK_BLOCK_SIZE: usize = 256;

/// Total bytes available for task stacks
pub const CFG_STACK_POOL_SIZE: usize = 16 * 1024;

/// Stack reserved for the idle task in bytes
pub const CFG_IDLE_STK_SIZE: usize = 512;
