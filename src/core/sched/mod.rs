//! Scheduler module
//!
//! Priority-based preemptive scheduler with round-robin for same priority.
//! The scheduler only tracks which slots are ready; task data stays in the
//! task table.

mod rdy_list;

pub use rdy_list::{Link, ReadyList};

use crate::config::{CFG_MAX_TASKS, CFG_PRIO_MAX};
use crate::prio::PrioTable;
use crate::types::OsPrio;

/// Ready bookkeeping: one FIFO per priority plus the priority bitmap
#[derive(Debug, Clone)]
pub struct Scheduler {
    prio_tbl: PrioTable,
    rdy_list: [ReadyList; CFG_PRIO_MAX],
    links: [Link; CFG_MAX_TASKS],
}

impl Scheduler {
    pub const fn new() -> Self {
        Self {
            prio_tbl: PrioTable::new(),
            rdy_list: [ReadyList::new(); CFG_PRIO_MAX],
            links: [Link::new(); CFG_MAX_TASKS],
        }
    }

    /// Make a slot ready, behind the peers already waiting at its priority
    pub fn make_ready(&mut self, idx: usize, prio: OsPrio) {
        self.rdy_list[prio as usize].insert_tail(&mut self.links, idx as u8);
        self.prio_tbl.insert(prio);
    }

    /// Remove a slot from its ready list
    pub fn make_unready(&mut self, idx: usize, prio: OsPrio) {
        let list = &mut self.rdy_list[prio as usize];
        list.remove(&mut self.links, idx as u8);
        if list.is_empty() {
            self.prio_tbl.remove(prio);
        }
    }

    /// Send a ready slot to the back of its priority level
    pub fn rotate(&mut self, idx: usize, prio: OsPrio) {
        self.rdy_list[prio as usize].move_to_tail(&mut self.links, idx as u8);
    }

    /// Slot that should run next: head of the most urgent non-empty list
    pub fn highest_ready(&self) -> Option<usize> {
        let prio = self.prio_tbl.get_highest()?;
        self.rdy_list[prio as usize].head().map(usize::from)
    }

    /// Most urgent priority with a ready task
    #[inline]
    pub fn highest_prio(&self) -> Option<OsPrio> {
        self.prio_tbl.get_highest()
    }

    /// Number of ready slots at a priority
    #[inline]
    pub fn ready_count(&self, prio: OsPrio) -> usize {
        self.rdy_list[prio as usize].len()
    }

    /// Ready slots at a priority, in the order they will run
    pub fn ready_at(&self, prio: OsPrio) -> impl Iterator<Item = usize> + '_ {
        self.rdy_list[prio as usize].iter(&self.links).map(usize::from)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_most_urgent_wins() {
        let mut sched = Scheduler::new();
        sched.make_ready(0, 7);
        sched.make_ready(1, 2);
        sched.make_ready(2, 9);
        assert_eq!(sched.highest_ready(), Some(1));

        sched.make_unready(1, 2);
        assert_eq!(sched.highest_ready(), Some(0));
        assert_eq!(sched.highest_prio(), Some(7));
    }

    #[test]
    fn test_rotation_within_priority() {
        let mut sched = Scheduler::new();
        sched.make_ready(3, 4);
        sched.make_ready(5, 4);
        assert_eq!(sched.highest_ready(), Some(3));

        sched.rotate(3, 4);
        assert_eq!(sched.highest_ready(), Some(5));
        assert_eq!(sched.ready_count(4), 2);
    }

    #[test]
    fn test_empty_level_clears_bitmap() {
        let mut sched = Scheduler::new();
        sched.make_ready(0, 1);
        sched.make_unready(0, 1);
        assert_eq!(sched.highest_ready(), None);
        assert_eq!(sched.highest_prio(), None);
    }
}
