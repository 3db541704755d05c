//! Trampoline: the continuation stack and queue of the CHR runtime.
//!
//! This is the lowest layer of the runtime. Everything here is generic over
//! the item type: the stack and queue know nothing about constraints or rule
//! bodies. They only move opaque items around in the order the trampoline
//! loop needs.
//!
//! Both structures are segmented into fixed-capacity blocks. Pushing and
//! popping touch a single slot. Draining a queue onto a stack moves whole
//! blocks and copies at most half a block, so waking up a large batch of
//! suspended work costs time proportional to the number of blocks rather
//! than the number of items.
//!
//! # Example
//!
//! ```rust
//! use chr_trampoline::{ContinuationQueue, ContinuationStack};
//!
//! let mut stack: ContinuationStack<u32> = ContinuationStack::new();
//! let mut queue: ContinuationQueue<u32> = ContinuationQueue::new();
//!
//! for i in 1..=3 {
//!     queue.enqueue(i);
//! }
//!
//! // The first enqueued item comes back directly, the rest is on the stack
//! let first = queue.poll_and_push(&mut stack);
//! assert_eq!(first, Some(1));
//! assert_eq!(stack.pop(), Some(2));
//! assert_eq!(stack.pop(), Some(3));
//!
//! // An empty stack yields the bottom sentinel
//! assert_eq!(stack.pop(), None);
//! ```

mod block;
mod error;
mod queue;
mod stack;

pub use block::BLOCK_SIZE;
pub use error::StackError;
pub use queue::ContinuationQueue;
pub use stack::ContinuationStack;
