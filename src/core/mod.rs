//! Core RTOS modules
//!
//! Contains kernel, scheduler, task management, time management and the
//! syscall gateway.

pub mod config;
pub mod critical;
pub mod error;
pub mod kernel;
pub mod prio;
pub mod types;
pub mod task;
pub mod sched;
pub mod time;
pub mod syscall;
pub mod cs_cell;
