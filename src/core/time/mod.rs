//! Time management module
//!
//! Provides tick handling, time delays, and timeout management.

use crate::config::{CFG_MAX_TASKS, CFG_TICK_RATE_HZ};
use crate::error::{OsError, OsResult};
use crate::kernel::{Kernel, Running};
use crate::port::Port;
use crate::syscall::Syscall;
use crate::types::{OsTick, TaskState, WaitOutcome};

/// Convert a duration in milliseconds to ticks, rounding up
#[inline]
pub const fn ms_to_ticks(ms: u64) -> OsTick {
    let ticks = ms.saturating_mul(CFG_TICK_RATE_HZ as u64).div_ceil(1000);
    if ticks > OsTick::MAX as u64 {
        OsTick::MAX
    } else {
        ticks as OsTick
    }
}

impl<P: Port> Kernel<P> {
    /// Time delay in ticks
    ///
    /// Delays the calling task for the specified number of system ticks.
    /// The task leaves its ready list; the tick handler puts it back once
    /// the delay has run down.
    ///
    /// # Arguments
    /// * `ticks` - Number of ticks to delay (0 = yield to equal priority)
    ///
    /// # Returns
    /// * `Err(OsError::OsNotRunning)` - Kernel not started
    /// * `Err(OsError::NoCurrentTask)` - Called from the idle context
    /// * `Err(OsError::SchedLocked)` - `ticks > 0` while the caller holds the critical section
    pub fn delay(&mut self, ticks: OsTick) -> OsResult<()> {
        self.syscall(Syscall::TaskSleep(ticks))
    }

    /// Time delay in hours, minutes, seconds, milliseconds
    ///
    /// Durations longer than the tick counter can express are clamped to
    /// `OsTick::MAX` ticks.
    ///
    /// # Returns
    /// * `Err(OsError::DelayInvalid)` - Minutes, seconds or milliseconds out of range
    pub fn delay_hmsm(
        &mut self,
        hours: u16,
        minutes: u8,
        seconds: u8,
        milliseconds: u16,
    ) -> OsResult<()> {
        if minutes > 59 || seconds > 59 || milliseconds > 999 {
            return Err(OsError::DelayInvalid);
        }

        let total_ms = (hours as u64) * 3_600_000
            + (minutes as u64) * 60_000
            + (seconds as u64) * 1000
            + (milliseconds as u64);

        self.delay(ms_to_ticks(total_ms))
    }

    /// Let the next ready task of the same priority run
    pub fn yield_now(&mut self) -> OsResult<()> {
        self.syscall(Syscall::SwitchContext)
    }

    pub(crate) fn sys_sleep(&mut self, ticks: OsTick) -> OsResult<()> {
        if !self.started {
            return Err(OsError::OsNotRunning);
        }

        self.critical(|k| {
            let idx = k.current_index().ok_or(OsError::NoCurrentTask)?;
            if ticks == 0 {
                k.rotate(idx);
            } else if k.sched_locked() {
                return Err(OsError::SchedLocked);
            } else {
                k.suspend(idx, TaskState::Delayed { remaining: ticks });
            }
            k.schedule();
            Ok(())
        })
    }

    pub(crate) fn sys_switch(&mut self) -> OsResult<()> {
        if !self.started {
            return Err(OsError::OsNotRunning);
        }

        self.critical(|k| {
            if let Some(idx) = k.current_index() {
                k.rotate(idx);
            }
            k.schedule();
        });
        Ok(())
    }

    /// Tick handler
    ///
    /// Called once per timer period. Runs down delays and bounded queue
    /// waits, expires the running task's time slice, then reschedules.
    /// Ignored until the kernel is started.
    pub fn tick(&mut self) {
        if !self.started {
            return;
        }

        self.critical(|k| {
            k.ticks = k.ticks.wrapping_add(1);

            for idx in 0..CFG_MAX_TASKS {
                if let Some(outcome) = k.count_down(idx) {
                    k.wake(idx, outcome);
                }
            }

            k.slice_current();
            k.schedule();
        });
    }

    /// Decrement one task's timer. `Some` when it expired, carrying the
    /// outcome the woken task will find.
    fn count_down(&mut self, idx: usize) -> Option<Option<WaitOutcome>> {
        let tcb = self.tasks.get_mut(idx)?;
        match &mut tcb.state {
            TaskState::Delayed { remaining } => {
                *remaining = remaining.saturating_sub(1);
                (*remaining == 0).then_some(None)
            }
            TaskState::BlockedReading {
                remaining: Some(remaining),
                ..
            }
            | TaskState::BlockedWriting {
                remaining: Some(remaining),
                ..
            } => {
                *remaining = remaining.saturating_sub(1);
                (*remaining == 0).then_some(Some(WaitOutcome::TimedOut))
            }
            _ => None,
        }
    }

    /// Round-robin: rotate the running task once its quantum is used up
    fn slice_current(&mut self) {
        let Running::Task(idx) = self.running else {
            return;
        };
        let Some(tcb) = self.tasks.get_mut(idx) else {
            return;
        };
        if !tcb.is_ready() {
            return;
        }

        tcb.time_quanta_ctr = tcb.time_quanta_ctr.saturating_sub(1);
        if tcb.time_quanta_ctr == 0 {
            self.rotate(idx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ms_to_ticks() {
        assert_eq!(ms_to_ticks(0), 0);
        assert_eq!(ms_to_ticks(1000), CFG_TICK_RATE_HZ);
        assert_eq!(ms_to_ticks(1), 1);

        // Longest hmsm delay: 65535 hours
        assert_eq!(ms_to_ticks(u16::MAX as u64 * 3_600_000), OsTick::MAX);
        assert_eq!(ms_to_ticks(u64::MAX), OsTick::MAX);
    }
}
