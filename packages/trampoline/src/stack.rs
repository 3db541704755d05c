//! LIFO of pending continuations.

use std::mem;

use crate::block::{Block, BLOCK_SIZE};
use crate::error::StackError;

/// What `undo_pop` would restore.
#[derive(Debug)]
enum Undo<T> {
    Unavailable,
    Bottom,
    Item(T),
}

/// A stack of pending continuations, segmented into blocks of `N` slots.
///
/// Each block holds a contiguous run of slots, so a block drained from a
/// [`ContinuationQueue`](crate::ContinuationQueue) can be taken over as is.
/// Pushes fill the top block upwards and open a new one once its highest
/// slot is used. An empty stack has a logical
/// bottom sentinel that is never stored: `pop` on an empty stack returns
/// `None` instead of failing.
///
/// # Example
///
/// ```rust
/// use chr_trampoline::ContinuationStack;
///
/// let mut stack: ContinuationStack<&str> = ContinuationStack::new();
/// stack.push_all(["activate", "resume"]);
///
/// assert_eq!(stack.peek(), Some(&"activate"));
/// assert_eq!(stack.pop(), Some("activate"));
///
/// // A single pop can be taken back
/// stack.undo_pop().unwrap();
/// assert_eq!(stack.len(), 2);
/// ```
#[derive(Debug)]
pub struct ContinuationStack<T, const N: usize = BLOCK_SIZE> {
    /// Bottom segment first. None of them is empty.
    segments: Vec<Segment<T, N>>,
    size: usize,
    /// One cached block so that oscillating around a boundary does not allocate.
    spare: Option<Block<T, N>>,
    undo: Undo<T>,
    /// Blocks taken over whole by `push_block`.
    #[cfg(test)]
    spliced: usize,
}

/// A block whose items occupy slots `lo..hi`, bottom to top.
#[derive(Debug)]
struct Segment<T, const N: usize> {
    block: Block<T, N>,
    lo: usize,
    hi: usize,
}

impl<T, const N: usize> Default for ContinuationStack<T, N> {
    fn default() -> Self {
        Self {
            segments: Vec::new(),
            size: 0,
            spare: None,
            undo: Undo::Unavailable,
            #[cfg(test)]
            spliced: 0,
        }
    }
}

impl<T, const N: usize> ContinuationStack<T, N> {
    /// Create an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live items.
    pub fn len(&self) -> usize {
        self.size
    }

    /// True if only the bottom sentinel is left.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Push a single item.
    pub fn push(&mut self, item: T) {
        self.undo = Undo::Unavailable;
        self.push_raw(item);
    }

    /// Push several items in one call.
    ///
    /// Items are pushed right to left, so the left-most one ends on top and
    /// is popped first.
    pub fn push_all<const K: usize>(&mut self, items: [T; K]) {
        self.undo = Undo::Unavailable;
        for item in items.into_iter().rev() {
            self.push_raw(item);
        }
    }

    /// Push an arbitrary number of items, first item on top.
    pub fn push_many<I>(&mut self, items: I)
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: DoubleEndedIterator,
    {
        self.undo = Undo::Unavailable;
        for item in items.into_iter().rev() {
            self.push_raw(item);
        }
    }

    /// Look at the top item without removing it.
    pub fn peek(&self) -> Option<&T> {
        self.get(0)
    }

    /// Look at the item `index` positions below the top.
    pub fn get(&self, index: usize) -> Option<&T> {
        let (segment, slot) = self.position(index)?;
        self.segments[segment].block.get(slot)
    }

    /// Swap the top item, returning the old one.
    pub fn replace(&mut self, item: T) -> Result<T, StackError> {
        self.replace_at(0, item)
    }

    /// Swap the item `index` positions below the top, returning the old one.
    ///
    /// Used to retarget the resumption point of a suspended constraint that
    /// is still somewhere on the stack.
    pub fn replace_at(&mut self, index: usize, item: T) -> Result<T, StackError> {
        let out_of_bounds = StackError::IndexOutOfBounds {
            index,
            size: self.size,
        };
        let (segment, slot) = self.position(index).ok_or(out_of_bounds.clone())?;
        self.segments[segment]
            .block
            .put(slot, item)
            .ok_or(out_of_bounds)
    }

    /// Drop every item; the stack stays usable.
    pub fn clear(&mut self) {
        for mut segment in self.segments.drain(..) {
            segment.block.clear();
            if self.spare.is_none() {
                self.spare = Some(segment.block);
            }
        }
        self.size = 0;
        self.undo = Undo::Unavailable;
    }

    /// Iterate from the top of the stack down to the bottom.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.segments.iter().rev().flat_map(|segment| {
            (segment.lo..segment.hi)
                .rev()
                .filter_map(move |slot| segment.block.get(slot))
        })
    }

    /// Number of blocks currently holding items.
    pub fn block_count(&self) -> usize {
        self.segments.len()
    }

    /// Map a stack-relative index to (segment, slot), walking down from the top.
    fn position(&self, index: usize) -> Option<(usize, usize)> {
        let mut rest = index;
        for (i, segment) in self.segments.iter().enumerate().rev() {
            let len = segment.hi - segment.lo;
            if rest < len {
                return Some((i, segment.hi - 1 - rest));
            }
            rest -= len;
        }
        None
    }

    fn push_raw(&mut self, item: T) {
        let room = self.segments.last().is_some_and(|top| top.hi < N);
        if !room {
            let block = self.spare.take().unwrap_or_else(Block::new);
            self.segments.push(Segment { block, lo: 0, hi: 0 });
        }
        if let Some(top) = self.segments.last_mut() {
            top.block.put(top.hi, item);
            top.hi += 1;
            self.size += 1;
        }
    }

    fn take_top(&mut self) -> Option<T> {
        let top = self.segments.last_mut()?;
        top.hi -= 1;
        let item = top.block.take(top.hi);
        let emptied = top.hi == top.lo;
        self.size -= 1;
        if emptied {
            if let Some(segment) = self.segments.pop() {
                self.recycle(segment.block);
            }
        }
        item
    }

    #[cfg(test)]
    pub(crate) fn spliced(&self) -> usize {
        self.spliced
    }

    fn recycle(&mut self, block: Block<T, N>) {
        if self.spare.is_none() {
            self.spare = Some(block);
        }
    }

    /// Push the items held in `block[lo..hi]`, lowest slot first.
    ///
    /// A range covering at least half the block is spliced in as the new top
    /// block without touching its items. Smaller ranges are copied so that
    /// sparse blocks do not pile up.
    pub(crate) fn push_block(&mut self, mut block: Block<T, N>, lo: usize, hi: usize) {
        self.undo = Undo::Unavailable;
        let len = hi.saturating_sub(lo);
        if len > 0 && 2 * len >= N {
            self.segments.push(Segment { block, lo, hi });
            self.size += len;
            #[cfg(test)]
            {
                self.spliced += 1;
            }
        } else {
            for slot in lo..hi {
                if let Some(item) = block.take(slot) {
                    self.push_raw(item);
                }
            }
            self.recycle(block);
        }
    }
}

impl<T: Clone, const N: usize> ContinuationStack<T, N> {
    /// Pop the top item.
    ///
    /// Returns `None` - the bottom sentinel - when the stack is empty.
    pub fn pop(&mut self) -> Option<T> {
        let item = self.take_top();
        self.undo = match &item {
            Some(item) => Undo::Item(item.clone()),
            None => Undo::Bottom,
        };
        item
    }

    /// Reverse the directly preceding `pop`.
    ///
    /// Undoing a pop of the bottom sentinel is a no-op. Calling this twice in
    /// a row, or after a push, is an error.
    pub fn undo_pop(&mut self) -> Result<(), StackError> {
        match mem::replace(&mut self.undo, Undo::Unavailable) {
            Undo::Unavailable => Err(StackError::UndoUnavailable),
            Undo::Bottom => Ok(()),
            Undo::Item(item) => {
                self.push_raw(item);
                Ok(())
            }
        }
    }
}
