//! Priority bitmap for O(1) most-urgent-ready lookup
//!
//! One bit per priority level. Uses count-leading-zeros to find the most
//! urgent level with at least one ready task.

use crate::config::CFG_PRIO_MAX;
use crate::types::OsPrio;

/// Number of words needed for the priority bitmap
const PRIO_TBL_SIZE: usize = (CFG_PRIO_MAX + 31) / 32;

/// Priority bitmap table
///
/// Bit 31 of word 0 is priority 0 (most urgent); urgency decreases toward
/// lower significance and higher word indices.
#[derive(Debug, Clone)]
pub struct PrioTable {
    bitmap: [u32; PRIO_TBL_SIZE],
}

impl PrioTable {
    pub const fn new() -> Self {
        PrioTable {
            bitmap: [0; PRIO_TBL_SIZE],
        }
    }

    /// Mark a priority level as having ready tasks
    #[inline]
    pub fn insert(&mut self, prio: OsPrio) {
        debug_assert!((prio as usize) < CFG_PRIO_MAX);
        let (word, bit) = Self::locate(prio);
        self.bitmap[word] |= bit;
    }

    /// Clear a priority level
    #[inline]
    pub fn remove(&mut self, prio: OsPrio) {
        debug_assert!((prio as usize) < CFG_PRIO_MAX);
        let (word, bit) = Self::locate(prio);
        self.bitmap[word] &= !bit;
    }

    /// Most urgent priority with a ready task
    #[inline]
    pub fn get_highest(&self) -> Option<OsPrio> {
        let mut base: usize = 0;
        for &word in self.bitmap.iter() {
            if word != 0 {
                return Some((base + word.leading_zeros() as usize) as OsPrio);
            }
            base += 32;
        }
        None
    }

    #[inline]
    pub fn is_set(&self, prio: OsPrio) -> bool {
        let (word, bit) = Self::locate(prio);
        self.bitmap[word] & bit != 0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bitmap.iter().all(|&w| w == 0)
    }

    #[inline]
    fn locate(prio: OsPrio) -> (usize, u32) {
        let word = prio as usize / 32;
        let bit = 1u32 << (31 - (prio as u32 % 32));
        (word, bit)
    }
}

impl Default for PrioTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_table() {
        let table = PrioTable::new();
        assert!(table.is_empty());
        assert_eq!(table.get_highest(), None);
    }

    #[test]
    fn test_insert_remove() {
        let mut table = PrioTable::new();

        table.insert(5);
        assert!(table.is_set(5));
        assert!(!table.is_set(4));
        assert_eq!(table.get_highest(), Some(5));

        table.insert(3);
        assert_eq!(table.get_highest(), Some(3));

        table.remove(3);
        assert_eq!(table.get_highest(), Some(5));

        table.remove(5);
        assert!(table.is_empty());
    }

    #[test]
    fn test_least_urgent_level() {
        let mut table = PrioTable::new();
        let last = (CFG_PRIO_MAX - 1) as OsPrio;
        table.insert(last);
        assert_eq!(table.get_highest(), Some(last));
        table.insert(0);
        assert_eq!(table.get_highest(), Some(0));
    }
}
