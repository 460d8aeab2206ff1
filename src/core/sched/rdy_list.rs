//! Ready list - doubly linked list of task slots at a given priority
//!
//! Each priority level has its own ready list. Tasks are added to the
//! tail (FIFO for round-robin) and scheduled from the head. Links are slot
//! indices kept in a side table, so the list never points into a TCB.

/// Links of one task slot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Link {
    next: Option<u8>,
    prev: Option<u8>,
}

impl Link {
    pub const fn new() -> Self {
        Link { next: None, prev: None }
    }
}

/// Ready list for a single priority level
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadyList {
    head: Option<u8>,
    tail: Option<u8>,
    count: u8,
}

impl ReadyList {
    /// Create a new empty ready list
    pub const fn new() -> Self {
        ReadyList {
            head: None,
            tail: None,
            count: 0,
        }
    }

    /// Head of list (next to be scheduled)
    #[inline]
    pub fn head(&self) -> Option<u8> {
        self.head
    }

    #[inline]
    pub fn tail(&self) -> Option<u8> {
        self.tail
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count as usize
    }

    /// Insert a slot at the tail of the list (FIFO order)
    ///
    /// The slot must not already be linked into any list.
    pub fn insert_tail(&mut self, links: &mut [Link], idx: u8) {
        links[idx as usize] = Link {
            next: None,
            prev: self.tail,
        };

        match self.tail {
            Some(tail) => links[tail as usize].next = Some(idx),
            None => self.head = Some(idx),
        }

        self.tail = Some(idx);
        self.count += 1;
    }

    /// Unlink a slot from the list
    ///
    /// The slot must currently be linked into this list.
    pub fn remove(&mut self, links: &mut [Link], idx: u8) {
        let Link { next, prev } = links[idx as usize];

        match prev {
            Some(prev) => links[prev as usize].next = next,
            None => self.head = next,
        }

        match next {
            Some(next) => links[next as usize].prev = prev,
            None => self.tail = prev,
        }

        links[idx as usize] = Link::default();
        self.count = self.count.saturating_sub(1);
    }

    /// Move a linked slot behind all its peers
    pub fn move_to_tail(&mut self, links: &mut [Link], idx: u8) {
        if self.tail == Some(idx) {
            return;
        }
        self.remove(links, idx);
        self.insert_tail(links, idx);
    }

    /// Walk the list from head to tail
    pub fn iter<'a>(&self, links: &'a [Link]) -> impl Iterator<Item = u8> + 'a {
        let mut cursor = self.head;
        core::iter::from_fn(move || {
            let idx = cursor?;
            cursor = links[idx as usize].next;
            Some(idx)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(list: &ReadyList, links: &[Link]) -> ([u8; 4], usize) {
        let mut out = [0u8; 4];
        let mut n = 0;
        for idx in list.iter(links) {
            out[n] = idx;
            n += 1;
        }
        (out, n)
    }

    #[test]
    fn test_fifo_order() {
        let mut links = [Link::default(); 4];
        let mut list = ReadyList::new();
        list.insert_tail(&mut links, 2);
        list.insert_tail(&mut links, 0);
        list.insert_tail(&mut links, 3);

        assert_eq!(list.head(), Some(2));
        assert_eq!(list.tail(), Some(3));
        assert_eq!(list.len(), 3);
        assert_eq!(collect(&list, &links), ([2, 0, 3, 0], 3));
    }

    #[test]
    fn test_remove_middle_and_ends() {
        let mut links = [Link::default(); 4];
        let mut list = ReadyList::new();
        for idx in 0..4 {
            list.insert_tail(&mut links, idx);
        }

        list.remove(&mut links, 1);
        assert_eq!(collect(&list, &links), ([0, 2, 3, 0], 3));

        list.remove(&mut links, 0);
        assert_eq!(list.head(), Some(2));

        list.remove(&mut links, 3);
        assert_eq!(list.tail(), Some(2));

        list.remove(&mut links, 2);
        assert!(list.is_empty());
        assert_eq!(list.len(), 0);
    }

    #[test]
    fn test_move_to_tail_rotates() {
        let mut links = [Link::default(); 4];
        let mut list = ReadyList::new();
        for idx in 0..3 {
            list.insert_tail(&mut links, idx);
        }

        list.move_to_tail(&mut links, 0);
        assert_eq!(collect(&list, &links), ([1, 2, 0, 0], 3));

        // Already last: nothing moves
        list.move_to_tail(&mut links, 0);
        assert_eq!(collect(&list, &links), ([1, 2, 0, 0], 3));
    }
}
