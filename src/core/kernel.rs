//! Kernel state and the context switch protocol
//!
//! One [`Kernel`] value owns every table: tasks, ready lists, mailboxes and
//! the critical section counter. Nothing here is global, so several kernels
//! can live side by side in tests. Operations are spread over the modules
//! that own their semantics (`task`, `time`, `sync::queue`, `syscall`).

use crate::config::CFG_TIME_QUANTA;
use crate::critical::{CriticalNesting, Transition};
use crate::error::{KernelFault, OsError, OsResult};
use crate::port::Port;
use crate::sched::Scheduler;
use crate::sync::queue::QueueTable;
use crate::syscall::Syscall;
use crate::task::TaskTable;
use crate::types::{OsNestingCtr, OsTick, TaskHandle, TaskState, WaitOutcome};

/// Context the CPU is executing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Running {
    /// Startup code, or a task deleted while running: nothing to save
    Detached,
    /// The port's idle task
    Idle,
    /// Task in this slot
    Task(usize),
}

/// Kernel state
pub struct Kernel<P: Port> {
    pub(crate) port: P,
    pub(crate) nesting: CriticalNesting,
    pub(crate) tasks: TaskTable<P::Frame>,
    pub(crate) sched: Scheduler,
    pub(crate) queues: QueueTable,
    pub(crate) idle_frame: P::Frame,
    pub(crate) running: Running,
    pub(crate) started: bool,
    pub(crate) ticks: OsTick,
    pub(crate) wait_seq: u32,
    /// A switch was requested while the caller held the critical section
    pub(crate) reschedule_pending: bool,
    /// Error behind the last failed gateway call
    pub(crate) syscall_error: Option<OsError>,
}

impl<P: Port> Kernel<P> {
    /// Bring up the port and build an empty kernel
    ///
    /// Tasks and queues can be created right away; nothing runs until
    /// [`Kernel::start`].
    pub fn new(mut port: P) -> Self {
        port.init();
        let mut idle_frame = P::Frame::default();
        port.init_idle(&mut idle_frame);

        Self {
            port,
            nesting: CriticalNesting::new(),
            tasks: TaskTable::new(),
            sched: Scheduler::new(),
            queues: QueueTable::new(),
            idle_frame,
            running: Running::Detached,
            started: false,
            ticks: 0,
            wait_seq: 0,
            reschedule_pending: false,
            syscall_error: None,
        }
    }

    /// Start multitasking
    ///
    /// Arms the ticker and switches to the most urgent ready task, or to
    /// the idle task if none exists yet.
    ///
    /// # Returns
    /// * `Err(OsError::OsRunning)` - Kernel is already running
    pub fn start(&mut self) -> OsResult<()> {
        self.syscall(Syscall::StartOs)
    }

    pub(crate) fn sys_start(&mut self) -> OsResult<()> {
        if self.started {
            return Err(OsError::OsRunning);
        }

        self.critical(|k| {
            k.port.init_ticker();
            k.started = true;
            crate::info!("kernel started with {} tasks", k.tasks.len());
            k.schedule();
        });
        Ok(())
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.started
    }

    /// Ticks since start
    #[inline]
    pub fn tick_count(&self) -> OsTick {
        self.ticks
    }

    #[inline]
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Handle of the running task; `None` while idle or before start
    pub fn current_task(&self) -> Option<TaskHandle> {
        self.current_index().and_then(|idx| self.tasks.handle_of(idx))
    }

    /// The idle task holds the CPU
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.running == Running::Idle
    }

    #[inline]
    pub(crate) fn current_index(&self) -> Option<usize> {
        match self.running {
            Running::Task(idx) => Some(idx),
            _ => None,
        }
    }

    // ============ Critical section ============

    /// Enter the kernel critical section
    ///
    /// Must be paired with [`Kernel::leave_critical`]. The outermost enter
    /// masks every interrupt that can reenter the kernel.
    pub fn enter_critical(&mut self) {
        match self.nesting.enter() {
            Ok(Transition::Edge) => self.port.mask_interrupts(),
            Ok(Transition::Nested) => {}
            Err(fault) => self.fault(fault),
        }
    }

    /// Leave the kernel critical section
    ///
    /// A switch held back while the section was owned by the caller happens
    /// on the outermost leave. A leave without a matching enter is fatal.
    pub fn leave_critical(&mut self) {
        if self.reschedule_pending && self.nesting.depth() == 1 {
            self.schedule();
        }
        match self.nesting.leave() {
            Ok(Transition::Edge) => self.port.unmask_interrupts(),
            Ok(Transition::Nested) => {}
            Err(fault) => self.fault(fault),
        }
    }

    #[inline]
    pub fn critical_depth(&self) -> OsNestingCtr {
        self.nesting.depth()
    }

    /// The caller entered the critical section itself, so it may not be
    /// switched out. Only meaningful inside [`Kernel::critical`].
    #[inline]
    pub(crate) fn sched_locked(&self) -> bool {
        self.nesting.depth() > 1
    }

    /// Run `f` inside a balanced critical section
    #[inline]
    pub(crate) fn critical<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.enter_critical();
        let result = f(self);
        self.leave_critical();
        result
    }

    // ============ Fatal path ============

    pub(crate) fn fault(&mut self, fault: KernelFault) -> ! {
        crate::error!("kernel fault {}", fault.code());
        self.port.fatal(fault)
    }

    // ============ State transitions ============

    pub(crate) fn next_wait_seq(&mut self) -> u32 {
        self.wait_seq = self.wait_seq.wrapping_add(1);
        self.wait_seq
    }

    /// Take a ready task off its ready list and park it in `state`
    pub(crate) fn suspend(&mut self, idx: usize, state: TaskState) {
        let seq = self.next_wait_seq();
        let Some(tcb) = self.tasks.get_mut(idx) else {
            self.fault(KernelFault::StaleCurrent(idx));
        };
        if !tcb.is_ready() {
            self.fault(KernelFault::ReadyListCorrupt(idx));
        }
        tcb.state = state;
        tcb.outcome = None;
        tcb.wait_seq = seq;
        let prio = tcb.prio;
        self.sched.make_unready(idx, prio);
    }

    /// Make a parked task ready again, leaving `outcome` for it to collect
    pub(crate) fn wake(&mut self, idx: usize, outcome: Option<WaitOutcome>) {
        let Some(tcb) = self.tasks.get_mut(idx) else {
            self.fault(KernelFault::ReadyListCorrupt(idx));
        };
        tcb.state = TaskState::Ready;
        tcb.outcome = outcome;
        let prio = tcb.prio;
        self.sched.make_ready(idx, prio);
        crate::trace!("slot {} ready", idx);
    }

    /// Move the running task behind its equal-priority peers
    pub(crate) fn rotate(&mut self, idx: usize) {
        if let Some(tcb) = self.tasks.get_mut(idx) {
            if tcb.is_ready() {
                tcb.time_quanta_ctr = CFG_TIME_QUANTA;
                self.sched.rotate(idx, tcb.prio);
            }
        }
    }

    // ============ Context switch ============

    /// Switch to the most urgent ready task
    ///
    /// Saves the outgoing context into its owner's frame, picks the head of
    /// the most urgent ready list (idle if none), and loads it. This is the
    /// only place a context changes hands. Callers hold the critical section
    /// or run on the interrupt return path.
    ///
    /// Inside a critical section the caller entered itself, the switch is
    /// held back until [`Kernel::leave_critical`] drops the last level.
    pub(crate) fn schedule(&mut self) {
        if !self.started {
            return;
        }
        if self.nesting.depth() > 1 {
            self.reschedule_pending = true;
            return;
        }
        self.reschedule_pending = false;

        let next = match self.sched.highest_ready() {
            Some(idx) => Running::Task(idx),
            None => Running::Idle,
        };
        if next == self.running {
            return;
        }

        match self.running {
            Running::Task(idx) => match self.tasks.get_mut(idx) {
                Some(tcb) => self.port.save_context(&mut tcb.frame),
                None => self.fault(KernelFault::StaleCurrent(idx)),
            },
            Running::Idle => self.port.save_context(&mut self.idle_frame),
            Running::Detached => self.port.discard_context(),
        }

        self.running = next;

        match next {
            Running::Task(idx) => match self.tasks.get_mut(idx) {
                Some(tcb) => {
                    tcb.time_quanta_ctr = CFG_TIME_QUANTA;
                    crate::trace!("switch to slot {}", idx);
                    self.port.load_context(&tcb.frame);
                }
                None => self.fault(KernelFault::ReadyListCorrupt(idx)),
            },
            Running::Idle => {
                crate::trace!("switch to idle");
                self.port.load_context(&self.idle_frame);
            }
            Running::Detached => {}
        }
    }
}
