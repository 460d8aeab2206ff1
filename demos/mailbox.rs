//! Producer-Consumer example over a mailbox queue
//!
//! The producer pushes a counter every 200 ticks; the consumer blocks on
//! the mailbox and reports each value over semihosting.

#![no_std]
#![no_main]

use core::sync::atomic::{AtomicU32, Ordering};

use cortex_m_rt::entry;
use cortex_m_semihosting::hprintln;
use moyos::os::{
    os_init, os_queue_create, os_queue_pull, os_queue_push, os_start, os_task_create, os_time_dly,
};
use moyos::{OsError, QueueHandle, WAIT_FOREVER};

static PRODUCED: AtomicU32 = AtomicU32::new(0);
static CONSUMED: AtomicU32 = AtomicU32::new(0);

fn mailbox(arg: *mut ()) -> Option<QueueHandle> {
    QueueHandle::from_raw(arg as usize)
}

fn producer_task(arg: *mut ()) {
    let Some(queue) = mailbox(arg) else {
        return;
    };
    loop {
        let n = PRODUCED.fetch_add(1, Ordering::Relaxed) + 1;
        match os_queue_push(queue, n as usize, 50) {
            Ok(()) => {
                moyos::info!("[P] produced #{}", n);
            }
            Err(OsError::Timeout) => {
                hprintln!("[P] consumer stalled");
            }
            Err(_) => break,
        }
        let _ = os_time_dly(200);
    }
    // Returning deletes the task
}

fn consumer_task(arg: *mut ()) {
    let Some(queue) = mailbox(arg) else {
        return;
    };
    loop {
        if let Ok(item) = os_queue_pull(queue, WAIT_FOREVER) {
            let n = CONSUMED.fetch_add(1, Ordering::Relaxed) + 1;
            hprintln!("[C] got {} ({} consumed)", item, n);
        }
    }
}

#[entry]
fn main() -> ! {
    hprintln!("Mailbox Demo");

    os_init().expect("OS init failed");
    let queue = os_queue_create().expect("queue create failed");
    let arg = queue.to_raw() as *mut ();

    os_task_create(producer_task, "P", 1024, arg, 15).expect("producer create failed");
    os_task_create(consumer_task, "C", 1024, arg, 10).expect("consumer create failed");

    hprintln!("Starting...");
    os_start().expect("OS start failed");

    loop {
        cortex_m::asm::wfi();
    }
}
