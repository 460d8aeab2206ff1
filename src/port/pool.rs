//! Fixed stack pool shared by the ports
//!
//! First-fit allocator over `STACK_POOL_BLOCKS` blocks of
//! `CFG_STACK_BLOCK_SIZE` bytes. A region is a contiguous run of blocks, so
//! two live regions never overlap.

use crate::config::{CFG_STACK_BLOCK_SIZE, CFG_STACK_POOL_SIZE};
use super::StackRegion;

/// Number of blocks in the pool
pub const STACK_POOL_BLOCKS: usize = CFG_STACK_POOL_SIZE / CFG_STACK_BLOCK_SIZE;

pub struct StackPool {
    base: usize,
    used: [bool; STACK_POOL_BLOCKS],
}

impl StackPool {
    /// Pool covering `CFG_STACK_POOL_SIZE` bytes starting at `base`
    pub const fn new(base: usize) -> Self {
        Self {
            base,
            used: [false; STACK_POOL_BLOCKS],
        }
    }

    pub fn alloc(&mut self, size: usize) -> Option<StackRegion> {
        if size == 0 {
            return None;
        }
        let blocks = size.div_ceil(CFG_STACK_BLOCK_SIZE);
        if blocks > STACK_POOL_BLOCKS {
            return None;
        }

        let mut run = 0;
        for idx in 0..STACK_POOL_BLOCKS {
            if self.used[idx] {
                run = 0;
                continue;
            }
            run += 1;
            if run == blocks {
                let first = idx + 1 - blocks;
                self.used[first..=idx].fill(true);
                return Some(StackRegion::new(
                    self.base + first * CFG_STACK_BLOCK_SIZE,
                    blocks * CFG_STACK_BLOCK_SIZE,
                ));
            }
        }
        None
    }

    /// Release a region. Returns false if it was not handed out by this pool.
    pub fn free(&mut self, region: StackRegion) -> bool {
        let Some(offset) = region.bottom().checked_sub(self.base) else {
            return false;
        };
        if offset % CFG_STACK_BLOCK_SIZE != 0 || region.size() % CFG_STACK_BLOCK_SIZE != 0 {
            return false;
        }
        let first = offset / CFG_STACK_BLOCK_SIZE;
        let last = first + region.size() / CFG_STACK_BLOCK_SIZE;
        if last > STACK_POOL_BLOCKS || !self.used[first..last].iter().all(|&u| u) {
            return false;
        }
        self.used[first..last].fill(false);
        true
    }

    pub fn free_blocks(&self) -> usize {
        self.used.iter().filter(|&&u| !u).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: usize = 0x2000_0000;

    #[test]
    fn test_rounds_up_to_blocks() {
        let mut pool = StackPool::new(BASE);
        let region = pool.alloc(CFG_STACK_BLOCK_SIZE + 1).unwrap();
        assert_eq!(region.bottom(), BASE);
        assert_eq!(region.size(), 2 * CFG_STACK_BLOCK_SIZE);
        assert_eq!(pool.free_blocks(), STACK_POOL_BLOCKS - 2);
    }

    #[test]
    fn test_regions_never_overlap() {
        let mut pool = StackPool::new(BASE);
        let a = pool.alloc(512).unwrap();
        let b = pool.alloc(256).unwrap();
        let c = pool.alloc(1024).unwrap();
        assert!(!a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert!(!b.overlaps(&c));

        // Reuse the hole left by `b`
        assert!(pool.free(b));
        let d = pool.alloc(256).unwrap();
        assert_eq!(d, b);
        assert!(!d.overlaps(&a) && !d.overlaps(&c));
    }

    #[test]
    fn test_exhaustion() {
        let mut pool = StackPool::new(BASE);
        assert!(pool.alloc(CFG_STACK_POOL_SIZE).is_some());
        assert!(pool.alloc(CFG_STACK_BLOCK_SIZE).is_none());
        assert!(pool.alloc(CFG_STACK_POOL_SIZE + 1).is_none());
    }

    #[test]
    fn test_free_rejects_foreign_region() {
        let mut pool = StackPool::new(BASE);
        let a = pool.alloc(256).unwrap();
        assert!(!pool.free(StackRegion::new(BASE + 3, 256)));
        assert!(!pool.free(StackRegion::new(BASE - 256, 256)));
        assert!(pool.free(a));
        // Double free
        assert!(!pool.free(a));
    }
}
