//! Unit tests for core RTOS modules
//!
//! These tests run on the host (not embedded target) to verify
//! the core algorithms work correctly.

#[cfg(test)]
mod prio_tests {
    use moyos::config::CFG_PRIO_MAX;
    use moyos::prio::PrioTable;

    #[test]
    fn test_empty_table() {
        let table = PrioTable::new();
        assert!(table.is_empty());
        assert_eq!(table.get_highest(), None);
    }

    #[test]
    fn test_single_priority() {
        let mut table = PrioTable::new();

        table.insert(5);
        assert!(!table.is_empty());
        assert!(table.is_set(5));
        assert!(!table.is_set(4));
        assert_eq!(table.get_highest(), Some(5));

        table.remove(5);
        assert!(table.is_empty());
    }

    #[test]
    fn test_multiple_priorities() {
        let mut table = PrioTable::new();

        // Insert in random order
        table.insert(20);
        table.insert(5);
        table.insert(10);
        table.insert(0);
        table.insert(15);

        // Most urgent (lowest number) first
        for expected in [0, 5, 10, 15, 20] {
            assert_eq!(table.get_highest(), Some(expected));
            table.remove(expected);
        }
        assert!(table.is_empty());
    }

    #[test]
    fn test_all_priorities() {
        let mut table = PrioTable::new();

        for i in 0..CFG_PRIO_MAX {
            table.insert(i as u8);
        }

        for i in 0..CFG_PRIO_MAX {
            assert_eq!(table.get_highest(), Some(i as u8));
            table.remove(i as u8);
        }

        assert!(table.is_empty());
    }

    #[test]
    fn test_duplicate_insert_remove() {
        let mut table = PrioTable::new();

        // No count per priority: one remove clears the bit
        table.insert(10);
        table.insert(10);
        assert_eq!(table.get_highest(), Some(10));
        table.remove(10);
        assert!(table.is_empty());
    }
}

#[cfg(test)]
mod error_tests {
    use moyos::error::{KernelFault, OsError, ReturnCode};

    #[test]
    fn test_return_codes_follow_header_order() {
        let all = [
            ReturnCode::SyscallUndefined,
            ReturnCode::SyscallOk,
            ReturnCode::SyscallFailed,
            ReturnCode::TaskOk,
            ReturnCode::TaskMaximumExceeded,
            ReturnCode::TaskMemPoolFull,
            ReturnCode::QueueOk,
            ReturnCode::QueueMaximumExceeded,
            ReturnCode::QueueFailed,
        ];
        for (raw, code) in all.into_iter().enumerate() {
            assert_eq!(code as usize, raw);
            assert_eq!(ReturnCode::from_raw(raw), Some(code));
        }
        assert_eq!(ReturnCode::from_raw(9), None);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(OsError::TaskMaximumExceeded.code(), ReturnCode::TaskMaximumExceeded);
        assert_eq!(OsError::TaskMemPoolFull.code(), ReturnCode::TaskMemPoolFull);
        assert_eq!(OsError::QueueMaximumExceeded.code(), ReturnCode::QueueMaximumExceeded);
        assert_eq!(OsError::Timeout.code(), ReturnCode::QueueFailed);
        assert_eq!(OsError::WouldBlock.code(), ReturnCode::QueueFailed);
        assert_eq!(OsError::TaskInvalid.code(), ReturnCode::SyscallFailed);
        assert_eq!(OsError::OsNotRunning.code(), ReturnCode::SyscallFailed);
        assert_eq!(OsError::SchedLocked.code(), ReturnCode::SyscallFailed);
        assert_eq!(OsError::SyscallUndefined.code(), ReturnCode::SyscallUndefined);
        assert!(!OsError::Timeout.code().is_ok());
    }

    #[test]
    fn test_timeout_is_expected() {
        assert!(OsError::Timeout.is_timeout());
        assert!(OsError::WouldBlock.is_timeout());
        assert!(!OsError::QueueInvalid.is_timeout());
    }

    #[test]
    fn test_fault_codes_distinct() {
        let faults = [
            KernelFault::UnknownSyscall(9),
            KernelFault::CriticalUnderflow,
            KernelFault::CriticalOverflow,
            KernelFault::StaleCurrent(0),
            KernelFault::ReadyListCorrupt(0),
            KernelFault::Requested(0),
        ];
        for (i, a) in faults.iter().enumerate() {
            for b in &faults[i + 1..] {
                assert_ne!(a.code(), b.code());
            }
        }
    }

    #[test]
    fn test_error_debug() {
        // Ensure errors can be formatted for debugging
        let err = OsError::IsrContext;
        let _ = format!("{:?}", err);
    }
}

#[cfg(test)]
mod types_tests {
    use moyos::types::*;

    #[test]
    fn test_status_bits() {
        assert_eq!(status::READY, 1);
        assert_eq!(status::DELAYED, 2);
        assert_eq!(status::BLOCKED_READING_QUEUE, 4);
        assert_eq!(status::BLOCKED_WRITING_QUEUE, 8);

        let q = QueueHandle::from_raw(0).unwrap();
        assert_eq!(TaskState::Ready.bits(), status::READY);
        assert_eq!(TaskState::Delayed { remaining: 3 }.bits(), status::DELAYED);
        let reading = TaskState::BlockedReading { queue: q, remaining: None };
        assert_eq!(reading.bits(), status::BLOCKED_READING_QUEUE);
        assert!(reading.is_blocked());
        assert_eq!(reading.waiting(), Some(q));
    }

    #[test]
    fn test_task_handle_raw() {
        let raw = (7 << 8) | 3;
        let handle = TaskHandle::from_raw(raw).unwrap();
        assert_eq!(handle.index(), 3);
        assert_eq!(handle.generation(), 7);
        assert_eq!(handle.to_raw(), raw);

        // Bits above the generation do not name a task
        assert_eq!(TaskHandle::from_raw(1 << 24 | raw), None);
    }

    #[test]
    fn test_queue_handle_raw_out_of_range() {
        assert_eq!(QueueHandle::from_raw(255).map(QueueHandle::index), Some(255));
        assert_eq!(QueueHandle::from_raw(256), None);
        assert_eq!(QueueHandle::from_raw(usize::MAX), None);
    }

    #[test]
    fn test_timeouts() {
        assert_eq!(NO_WAIT, 0);
        assert_eq!(WAIT_FOREVER, OsTick::MAX);
    }

    #[test]
    fn test_queue_status_codes() {
        assert_eq!(QueueStatus::Empty as u8, 0);
        assert_eq!(QueueStatus::Filled as u8, 1);
    }
}

#[cfg(test)]
mod config_tests {
    use moyos::config::*;

    #[test]
    fn test_config_values() {
        assert!(CFG_PRIO_MAX >= 8, "Need at least 8 priority levels");
        assert!(CFG_PRIO_MAX <= 256, "Too many priority levels");
        assert!(CFG_MAX_TASKS <= 256, "Task slots must fit a u8 index");

        assert!(CFG_STK_SIZE_MIN >= 32, "Stack too small");
        assert_eq!(CFG_STACK_POOL_SIZE % CFG_STACK_BLOCK_SIZE, 0);

        assert!(CFG_TICK_RATE_HZ >= 10, "Tick rate too slow");
        assert!(CFG_TICK_RATE_HZ <= 10000, "Tick rate too fast");
        assert!(CFG_TIME_QUANTA >= 1);
    }
}
