//! Fixed-capacity storage segment shared by the stack and the queue.

/// Default number of slots per block.
pub const BLOCK_SIZE: usize = 256;

/// One segment of a stack or queue.
///
/// Unused slots are always `None`, so a block can move between a queue and a
/// stack without being cleared first.
#[derive(Debug)]
pub(crate) struct Block<T, const N: usize> {
    slots: Box<[Option<T>]>,
}

impl<T, const N: usize> Block<T, N> {
    pub(crate) fn new() -> Self {
        assert!(N >= 2, "block capacity must be at least 2");
        Self {
            slots: (0..N).map(|_| None).collect(),
        }
    }

    pub(crate) fn put(&mut self, slot: usize, item: T) -> Option<T> {
        self.slots[slot].replace(item)
    }

    pub(crate) fn take(&mut self, slot: usize) -> Option<T> {
        self.slots[slot].take()
    }

    pub(crate) fn get(&self, slot: usize) -> Option<&T> {
        self.slots[slot].as_ref()
    }

    /// Drop every item held by the block.
    pub(crate) fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
    }

    #[cfg(test)]
    pub(crate) fn occupied(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}
