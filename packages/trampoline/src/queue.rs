//! FIFO of continuations awaiting dispatch.

use std::mem;

use crate::block::{Block, BLOCK_SIZE};
use crate::stack::ContinuationStack;

/// A queue of continuations, drained destructively onto a [`ContinuationStack`].
///
/// The oldest item is kept aside; everything after it lives in blocks that
/// fill from the highest slot down. A full queue block therefore already has
/// the layout of a stack block - newest item at slot 0, oldest at the top -
/// and draining can splice it onto the stack without touching its items.
#[derive(Debug)]
pub struct ContinuationQueue<T, const N: usize = BLOCK_SIZE> {
    head: Option<T>,
    /// Oldest block first.
    blocks: Vec<Block<T, N>>,
    /// Occupied slots in the last block.
    tail: usize,
    size: usize,
}

impl<T, const N: usize> Default for ContinuationQueue<T, N> {
    fn default() -> Self {
        Self {
            head: None,
            blocks: Vec::new(),
            tail: 0,
            size: 0,
        }
    }
}

impl<T, const N: usize> ContinuationQueue<T, N> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.size
    }

    /// True if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Append an item at the back of the queue.
    pub fn enqueue(&mut self, item: T) {
        self.size += 1;
        if self.head.is_none() {
            self.head = Some(item);
            return;
        }
        if self.blocks.is_empty() || self.tail == N {
            self.blocks.push(Block::new());
            self.tail = 0;
        }
        let last = self.blocks.len() - 1;
        self.blocks[last].put(N - 1 - self.tail, item);
        self.tail += 1;
    }

    /// Drop every queued item.
    pub fn clear(&mut self) {
        self.head = None;
        self.blocks.clear();
        self.tail = 0;
        self.size = 0;
    }

    /// Drain the queue onto `stack`.
    ///
    /// The first enqueued item is returned directly so the caller can run it
    /// at once; the remaining items are pushed so that popping the stack
    /// replays them in enqueue order. Returns `None` if the queue was empty.
    pub fn poll_and_push(&mut self, stack: &mut ContinuationStack<T, N>) -> Option<T> {
        let first = self.head.take()?;
        self.push_blocks(stack);
        Some(first)
    }

    /// Drain the queue onto `stack`, followed by `then`.
    ///
    /// `then` is pushed beneath the drained items so it runs after all of
    /// them. If the queue is empty `then` itself is returned.
    pub fn poll_and_push_then(&mut self, stack: &mut ContinuationStack<T, N>, then: T) -> T {
        match self.head.take() {
            None => then,
            Some(first) => {
                stack.push(then);
                self.push_blocks(stack);
                first
            }
        }
    }

    /// Move every block onto the stack, newest block first.
    fn push_blocks(&mut self, stack: &mut ContinuationStack<T, N>) {
        let blocks = mem::take(&mut self.blocks);
        let count = blocks.len();
        let tail = self.tail;
        self.tail = 0;
        self.size = 0;

        for (i, block) in blocks.into_iter().enumerate().rev() {
            let lo = if i + 1 == count { N - tail } else { 0 };
            stack.push_block(block, lo, N);
        }
    }
}
