//! Blocking two-channel message queue
//!
//! This module provides the queue owned by every module controller:
//! - A normal FIFO channel and a priority FIFO channel
//! - Priority messages always dequeue before normal messages
//! - Blocking dequeue with a condition variable so idle workers do not spin
//! - A release signal, distinct from message arrival, that wakes every
//!   blocked consumer without handing it a message (used on shutdown)

use crate::core::sync::lock_or_recover;
use crate::queue::message::Message;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct QueueState {
    normal: VecDeque<Message>,
    priority: VecDeque<Message>,
    released: bool,
}

impl QueueState {
    fn pop(&mut self) -> Option<Message> {
        self.priority
            .pop_front()
            .or_else(|| self.normal.pop_front())
    }

    fn len(&self) -> usize {
        self.normal.len() + self.priority.len()
    }
}

/// Thread-safe unbounded queue with a priority sub-channel
#[derive(Debug)]
pub struct MessageQueue {
    state: Mutex<QueueState>,
    available: Condvar,
    queue_id: String,
}

impl MessageQueue {
    pub fn new(queue_id: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            available: Condvar::new(),
            queue_id: queue_id.into(),
        }
    }

    pub fn queue_id(&self) -> &str {
        &self.queue_id
    }

    /// Append to the tail of the normal channel and wake one consumer
    pub fn enqueue(&self, message: Message) {
        let mut state = lock_or_recover(&self.state, "message queue");
        state.normal.push_back(message);
        self.available.notify_one();
    }

    /// Append to the tail of the priority channel and wake one consumer
    pub fn enqueue_priority(&self, message: Message) {
        let mut state = lock_or_recover(&self.state, "message queue");
        state.priority.push_back(message);
        self.available.notify_one();
    }

    /// Block until a message is available or the queue is released
    ///
    /// Returns `None` once the queue is released, even if messages remain;
    /// those stay queued (and counted) until drained or the queue is reset.
    pub fn dequeue(&self) -> Option<Message> {
        let mut state = lock_or_recover(&self.state, "message queue");
        loop {
            if state.released {
                return None;
            }
            if let Some(message) = state.pop() {
                return Some(message);
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`dequeue`](Self::dequeue) but gives up after `timeout`
    pub fn dequeue_timeout(&self, timeout: Duration) -> Option<Message> {
        let deadline = Instant::now() + timeout;
        let mut state = lock_or_recover(&self.state, "message queue");
        loop {
            if state.released {
                return None;
            }
            if let Some(message) = state.pop() {
                return Some(message);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            state = self
                .available
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Pop the next message without blocking, ignoring the release flag
    pub fn try_dequeue(&self) -> Option<Message> {
        lock_or_recover(&self.state, "message queue").pop()
    }

    /// Wake every blocked consumer without a message
    pub fn release(&self) {
        let mut state = lock_or_recover(&self.state, "message queue");
        state.released = true;
        self.available.notify_all();
    }

    /// Clear the release flag so consumers block again
    pub fn reset_release(&self) {
        lock_or_recover(&self.state, "message queue").released = false;
    }

    pub fn is_released(&self) -> bool {
        lock_or_recover(&self.state, "message queue").released
    }

    pub fn count(&self) -> usize {
        lock_or_recover(&self.state, "message queue").len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Copy of the pending messages in dequeue order
    pub fn snapshot(&self) -> Vec<Message> {
        let state = lock_or_recover(&self.state, "message queue");
        state
            .priority
            .iter()
            .chain(state.normal.iter())
            .cloned()
            .collect()
    }

    /// Atomically drain every pending message, in dequeue order
    pub fn clear_messages(&self) -> Vec<Message> {
        let mut state = lock_or_recover(&self.state, "message queue");
        let mut drained: Vec<Message> = state.priority.drain(..).collect();
        drained.extend(state.normal.drain(..));
        drained
    }
}
