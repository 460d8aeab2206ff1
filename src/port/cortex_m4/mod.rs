//! Cortex-M4 port implementation
//!
//! Provides context switching via the PendSV exception handler, the SVCall
//! trap behind the syscall gateway, and the SysTick ticker.
//!
//! Exception priorities: SysTick and PendSV run at the lowest level (0xF0)
//! and are the interrupts the kernel masks through BASEPRI. SVCall sits
//! above the mask so a task can trap while the kernel is masked.

#![allow(named_asm_labels)]

use core::arch::{asm, naked_asm};
use core::ptr::{addr_of_mut, null_mut};

use cortex_m::peripheral::scb::SystemHandler;
use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::SCB;

use super::{Port, StackPool, StackRegion, SwitchState};
use crate::config::{CFG_CPU_CLOCK_HZ, CFG_IDLE_STK_SIZE, CFG_STACK_POOL_SIZE, CFG_TICK_RATE_HZ};
use crate::critical::set_basepri;
use crate::error::KernelFault;
use crate::task::OsTaskFn;
use crate::types::OsStkElement;

/// BASEPRI value masking SysTick and PendSV
const KERNEL_MASK_PRIO: u8 = 0xF0;

/// Priority of the SVCall trap, above the kernel mask
const SVCALL_PRIO: u8 = 0x80;

/// Backing memory of the task stack pool
static mut STACK_POOL: [u64; CFG_STACK_POOL_SIZE / 8] = [0; CFG_STACK_POOL_SIZE / 8];

/// Stack of the idle task
static mut IDLE_STACK: [u64; CFG_IDLE_STK_SIZE / 8] = [0; CFG_IDLE_STK_SIZE / 8];

/// Saved context of a task: its stack pointer at switch-out
#[derive(Debug)]
pub struct CortexFrame {
    sp: *mut OsStkElement,
}

impl CortexFrame {
    #[inline]
    pub fn sp(&self) -> *mut OsStkElement {
        self.sp
    }
}

impl Default for CortexFrame {
    fn default() -> Self {
        Self { sp: null_mut() }
    }
}

/// Switch request handed from the kernel to PendSV
static mut SWITCH: SwitchState<CortexFrame> = SwitchState::new();

/// Context structure stored on stack
#[repr(C, align(4))]
struct UcStk {
    r4: u32,
    r5: u32,
    r6: u32,
    r7: u32,
    r8: u32,
    r9: u32,
    r10: u32,
    r11: u32,
    exc_return: u32, // LR value for exception return
    r0: u32,
    r1: u32,
    r2: u32,
    r3: u32,
    r12: u32,
    lr: u32,
    pc: u32,
    xpsr: u32,
}
const CONTEXT_STACK_SIZE: usize = 17;

/// Cortex-M4 port
pub struct CortexM4 {
    pool: StackPool,
}

impl CortexM4 {
    /// Only one instance may exist: it owns the static stack pool.
    pub(crate) fn new() -> Self {
        let base = unsafe { addr_of_mut!(STACK_POOL) } as usize;
        Self {
            pool: StackPool::new(base),
        }
    }

    pub fn free_stack_blocks(&self) -> usize {
        self.pool.free_blocks()
    }
}

/// Build the first exception frame of a context at the top of `stack`
///
/// The context starts in `task_trampoline(entry, arg)`.
fn build_frame(frame: &mut CortexFrame, stack: &StackRegion, entry: OsTaskFn, arg: *mut ()) {
    let stk_aligned = (stack.top() & !7) as *mut u32;

    unsafe {
        let frame_ptr = stk_aligned.sub(CONTEXT_STACK_SIZE) as *mut UcStk;

        frame_ptr.write(UcStk {
            r4: 0x04040404,
            r5: 0x05050505,
            r6: 0x06060606,
            r7: 0x07070707,
            r8: 0x08080808,
            r9: 0x09090909,
            r10: 0x10101010,
            r11: 0x11111111,
            exc_return: 0xFFFF_FFFD,
            r0: entry as usize as u32,
            r1: arg as u32,
            r2: 0,
            r3: 0,
            r12: 0,
            lr: task_exit_trap as usize as u32,
            pc: (task_trampoline as usize as u32) | 1,
            xpsr: 0x0100_0000,
        });

        // 4 bytes before the frame to match PendSV's "add r0, r0, #4"
        frame.sp = (frame_ptr as *mut u32).sub(1);
    }
}

impl Port for CortexM4 {
    type Frame = CortexFrame;

    fn init(&mut self) {
        unsafe {
            let mut scb = cortex_m::Peripherals::steal().SCB;
            scb.set_priority(SystemHandler::PendSV, KERNEL_MASK_PRIO);
            scb.set_priority(SystemHandler::SysTick, KERNEL_MASK_PRIO);
            scb.set_priority(SystemHandler::SVCall, SVCALL_PRIO);
        }
    }

    /// Example: 16MHz clock with 1000Hz tick rate gives a reload of 15_999
    fn init_ticker(&mut self) {
        let mut p = unsafe { cortex_m::Peripherals::steal() };

        p.SYST.set_reload(CFG_CPU_CLOCK_HZ / CFG_TICK_RATE_HZ - 1);
        p.SYST.clear_current();
        p.SYST.set_clock_source(SystClkSource::Core);
        p.SYST.enable_interrupt();
        p.SYST.enable_counter();
    }

    fn alloc_stack(&mut self, size: usize) -> Option<StackRegion> {
        self.pool.alloc(size)
    }

    fn free_stack(&mut self, stack: StackRegion) {
        if !self.pool.free(stack) {
            crate::warn!("stack at {=usize:#x} not owned by pool", stack.bottom());
        }
    }

    fn init_frame(
        &mut self,
        frame: &mut CortexFrame,
        stack: &StackRegion,
        entry: OsTaskFn,
        arg: *mut (),
    ) {
        build_frame(frame, stack, entry, arg);
    }

    fn init_idle(&mut self, frame: &mut CortexFrame) {
        let bottom = unsafe { addr_of_mut!(IDLE_STACK) } as usize;
        let stack = StackRegion::new(bottom, CFG_IDLE_STK_SIZE);
        build_frame(frame, &stack, idle_task, null_mut());
    }

    fn save_context(&mut self, frame: &mut CortexFrame) {
        unsafe { (*addr_of_mut!(SWITCH)).save(frame) }
    }

    fn discard_context(&mut self) {
        unsafe { (*addr_of_mut!(SWITCH)).discard() }
    }

    fn forget_frame(&mut self, frame: &CortexFrame) {
        unsafe { (*addr_of_mut!(SWITCH)).forget(frame) }
    }

    fn load_context(&mut self, frame: &CortexFrame) {
        unsafe { (*addr_of_mut!(SWITCH)).load(frame) }
        SCB::set_pendsv();
    }

    fn mask_interrupts(&mut self) {
        set_basepri(KERNEL_MASK_PRIO);
    }

    fn unmask_interrupts(&mut self) {
        set_basepri(0);
    }

    fn fatal(&mut self, fault: KernelFault) -> ! {
        crate::error!("fatal {}, resetting", fault);
        SCB::sys_reset()
    }
}

/// First code run by every task
///
/// Returning from the entry point deletes the task.
extern "C" fn task_trampoline(entry: usize, arg: *mut ()) -> ! {
    let entry: OsTaskFn = unsafe { core::mem::transmute::<usize, OsTaskFn>(entry) };
    entry(arg);
    crate::os::os_task_del()
}

fn idle_task(_: *mut ()) {
    loop {
        cortex_m::asm::wfi();
    }
}

#[no_mangle]
extern "C" fn task_exit_trap() -> ! {
    loop {
        cortex_m::asm::udf();
    }
}

/// Helper function called from PendSV to swap contexts
/// Returns new task's stack pointer
#[inline(never)]
#[no_mangle]
unsafe extern "C" fn pendsv_switch_context(cur_sp: *mut u32) -> *mut u32 {
    unsafe {
        let (save, load) = (*addr_of_mut!(SWITCH)).complete();

        if !save.is_null() {
            (*save).sp = cur_sp;
        }

        if load.is_null() {
            null_mut()
        } else {
            (*load).sp
        }
    }
}

/// PendSV exception handler - performs full context switch
///
/// 1. Save R4-R11, LR to current task's PSP (skip if the context is dropped)
/// 2. Call pendsv_switch_context to record it and fetch the next one
/// 3. Restore R4-R11, LR from new task's stack
/// 4. Exception return
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn PendSV() {
    naked_asm!(
        "cpsid i",
        "dsb",
        "isb",

        "mrs r0, psp",

        "ldr r1, ={switch}",
        "ldr r1, [r1]",
        "cbz r1, 1f",

        "stmdb r0!, {{r4-r11, lr}}",

        "sub r0, r0, #4",

        "1:",
        "bl pendsv_switch_context",

        "cbz r0, 2f",
        "add r0, r0, #4",
        "ldmia r0!, {{r4-r11, lr}}",

        "msr psp, r0",

        "2:",
        "cpsie i",
        "dsb",
        "isb",

        "bx lr",

        switch = sym SWITCH,
    );
}

/// SVCall exception handler
///
/// Finds the stacked argument words and hands them to the kernel.
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn SVCall() {
    naked_asm!(
        "tst lr, #4",
        "ite eq",
        "mrseq r0, msp",
        "mrsne r0, psp",
        "b {dispatch}",
        dispatch = sym svc_dispatch,
    );
}

/// Run one trapped call; the result replaces the caller's r0
unsafe extern "C" fn svc_dispatch(frame: *mut usize) {
    unsafe {
        let args = [*frame, *frame.add(1), *frame.add(2), *frame.add(3)];
        let ret = crate::os::with_kernel(|k| k.dispatch(args))
            .unwrap_or_else(|err| err.code() as usize);
        *frame = ret;
    }
}

/// Trap into the kernel with four argument words
///
/// Must not be called with interrupts disabled.
#[inline(always)]
pub fn syscall(args: [usize; 4]) -> usize {
    let mut r0 = args[0];
    unsafe {
        asm!(
            "svc 0",
            inout("r0") r0,
            in("r1") args[1],
            in("r2") args[2],
            in("r3") args[3],
            options(nostack),
        );
    }
    r0
}
