//! Per-module Message Queue
//!
//! Every module controller owns one [`MessageQueue`]: an unbounded,
//! thread-safe container with a normal channel and a priority channel,
//! shared between any number of producer threads and the controller's
//! worker threads.
//!
//! # Ordering
//!
//! - Messages enqueued on the priority channel always dequeue before any
//!   message on the normal channel
//! - Within a channel, order is FIFO
//! - Nothing is promised about the order in which different workers
//!   *finish* processing their messages
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  enqueue           ┌──────────────────────────────┐
//! │  Producer A  │ ─────────────────▶ │ normal   │ 1 │ 2 │ 3 │ ...   │
//! └──────────────┘                    ├──────────────────────────────┤
//! ┌──────────────┐  enqueue_priority  │ priority │ 0 │ ...           │
//! │  Producer B  │ ─────────────────▶ └──────────────┬───────────────┘
//! └──────────────┘                                   │ dequeue (blocks)
//!                                    ┌───────────────┼───────────────┐
//!                                    ▼               ▼               ▼
//!                                ┌────────┐      ┌────────┐      ┌────────┐
//!                                │worker 0│      │worker 1│      │worker N│
//!                                └────────┘      └────────┘      └────────┘
//! ```
//!
//! # Example Usage
//!
//! ```rust
//! use moduleflow::queue::{Message, MessageQueue};
//!
//! let queue = MessageQueue::new("billing");
//! queue.enqueue(Message::new(1));
//! queue.enqueue(Message::new(2));
//! queue.enqueue_priority(Message::new(0));
//!
//! let first = queue.dequeue().unwrap();
//! assert_eq!(first.downcast_ref::<i32>(), Some(&0));
//! assert_eq!(queue.count(), 2);
//! ```

mod internal;
mod message;

pub mod api;

pub use internal::MessageQueue;
pub use message::{Message, MessageId};

#[cfg(test)]
mod tests;
