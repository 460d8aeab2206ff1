//! Host simulation port
//!
//! Runs the kernel core on a development machine. No code is executed on
//! behalf of tasks: a frame is an identity tag, and the port records which
//! frame the simulated CPU is running. It panics on any violation of the
//! switch protocol so tests catch them.

use super::{Port, StackPool, StackRegion};
use crate::error::KernelFault;
use crate::task::OsTaskFn;

/// Virtual base address of the simulated stack pool
pub const SIM_STACK_BASE: usize = 0x2000_0000;

/// Frame id of the idle task
pub const SIM_IDLE_ID: u32 = 0;

/// Number of context loads kept in the trace
pub const SIM_TRACE_LEN: usize = 64;

/// Simulated saved context
#[derive(Debug, Clone, Copy, Default)]
pub struct SimFrame {
    id: u32,
    entry: Option<OsTaskFn>,
    arg: usize,
    sp: usize,
    saves: u32,
}

impl SimFrame {
    /// Identity tag; stays constant for the life of a task
    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    pub fn entry(&self) -> Option<OsTaskFn> {
        self.entry
    }

    #[inline]
    pub fn arg(&self) -> usize {
        self.arg
    }

    /// Initial stack pointer
    #[inline]
    pub fn sp(&self) -> usize {
        self.sp
    }

    /// How often this context was switched out
    #[inline]
    pub fn saves(&self) -> u32 {
        self.saves
    }
}

/// Host port with a virtual stack pool and a switch recorder
pub struct SimPort {
    pool: StackPool,
    next_id: u32,
    running: Option<u32>,
    outgoing_claimed: bool,
    forgotten: Option<u32>,
    masked: bool,
    mask_count: u32,
    ticker_armed: bool,
    initialized: bool,
    trace: [u32; SIM_TRACE_LEN],
    loads: usize,
}

impl SimPort {
    pub const fn new() -> Self {
        Self {
            pool: StackPool::new(SIM_STACK_BASE),
            next_id: SIM_IDLE_ID + 1,
            running: None,
            outgoing_claimed: false,
            forgotten: None,
            masked: false,
            mask_count: 0,
            ticker_armed: false,
            initialized: false,
            trace: [0; SIM_TRACE_LEN],
            loads: 0,
        }
    }

    /// Frame id the simulated CPU is executing
    #[inline]
    pub fn running(&self) -> Option<u32> {
        self.running
    }

    /// Frame id most recently released by a task deletion
    #[inline]
    pub fn forgotten(&self) -> Option<u32> {
        self.forgotten
    }

    #[inline]
    pub fn is_masked(&self) -> bool {
        self.masked
    }

    /// How often interrupts went from unmasked to masked
    #[inline]
    pub fn mask_count(&self) -> u32 {
        self.mask_count
    }

    #[inline]
    pub fn ticker_armed(&self) -> bool {
        self.ticker_armed
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Total number of context loads
    #[inline]
    pub fn loads(&self) -> usize {
        self.loads
    }

    /// Frame ids loaded so far, oldest first (first `SIM_TRACE_LEN` only)
    pub fn trace(&self) -> &[u32] {
        &self.trace[..self.loads.min(SIM_TRACE_LEN)]
    }

    pub fn free_stack_blocks(&self) -> usize {
        self.pool.free_blocks()
    }
}

impl Default for SimPort {
    fn default() -> Self {
        Self::new()
    }
}

impl Port for SimPort {
    type Frame = SimFrame;

    fn init(&mut self) {
        self.initialized = true;
    }

    fn init_ticker(&mut self) {
        self.ticker_armed = true;
    }

    fn alloc_stack(&mut self, size: usize) -> Option<StackRegion> {
        self.pool.alloc(size)
    }

    fn free_stack(&mut self, stack: StackRegion) {
        assert!(self.pool.free(stack), "stack {:?} not owned by pool", stack);
    }

    fn init_frame(
        &mut self,
        frame: &mut SimFrame,
        stack: &StackRegion,
        entry: OsTaskFn,
        arg: *mut (),
    ) {
        *frame = SimFrame {
            id: self.next_id,
            entry: Some(entry),
            arg: arg as usize,
            sp: stack.top() & !7,
            saves: 0,
        };
        self.next_id += 1;
    }

    fn init_idle(&mut self, frame: &mut SimFrame) {
        *frame = SimFrame {
            id: SIM_IDLE_ID,
            ..SimFrame::default()
        };
    }

    fn save_context(&mut self, frame: &mut SimFrame) {
        assert_eq!(
            self.running,
            Some(frame.id),
            "saving frame {} while frame {:?} is loaded",
            frame.id,
            self.running
        );
        frame.saves += 1;
        self.outgoing_claimed = true;
    }

    fn discard_context(&mut self) {
        self.outgoing_claimed = true;
    }

    fn forget_frame(&mut self, frame: &SimFrame) {
        self.forgotten = Some(frame.id);
    }

    fn load_context(&mut self, frame: &SimFrame) {
        if self.running.is_some() {
            assert!(self.outgoing_claimed, "outgoing context neither saved nor discarded");
        }
        self.outgoing_claimed = false;
        self.running = Some(frame.id);
        if self.loads < SIM_TRACE_LEN {
            self.trace[self.loads] = frame.id;
        }
        self.loads += 1;
    }

    fn mask_interrupts(&mut self) {
        assert!(!self.masked, "interrupts masked twice");
        self.masked = true;
        self.mask_count += 1;
    }

    fn unmask_interrupts(&mut self) {
        assert!(self.masked, "interrupts unmasked while not masked");
        self.masked = false;
    }

    fn fatal(&mut self, fault: KernelFault) -> ! {
        panic!("kernel fault: {:?}", fault);
    }
}
