//! Message type carried by module queues
//!
//! A [`Message`] is an opaque, immutable payload. The framework never looks
//! inside it except to recognise a handful of control types by downcasting.
//! Cloning a message is cheap (the payload is shared) and keeps its identity,
//! which is what lets policies such as retry track "the same message" across
//! re-deliveries.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

static NEXT_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique message identity, assigned at creation and preserved by clones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(u64);

impl MessageId {
    fn next() -> Self {
        MessageId(NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Opaque message payload with identity and creation metadata
///
/// # Example
///
/// ```rust
/// use moduleflow::queue::Message;
///
/// let message = Message::new(42_u32);
/// assert!(message.is::<u32>());
/// assert_eq!(message.downcast_ref::<u32>(), Some(&42));
///
/// let copy = message.clone();
/// assert_eq!(copy.id(), message.id());
/// ```
#[derive(Clone)]
pub struct Message {
    id: MessageId,
    type_name: &'static str,
    created_at: SystemTime,
    payload: Arc<dyn Any + Send + Sync>,
}

impl Message {
    /// Wrap a value as a message
    ///
    /// Passing a `Message` returns it unchanged rather than nesting it.
    pub fn new<T: Any + Send + Sync>(payload: T) -> Self {
        let boxed: Box<dyn Any + Send + Sync> = Box::new(payload);
        match boxed.downcast::<Message>() {
            Ok(message) => *message,
            Err(boxed) => Self {
                id: MessageId::next(),
                type_name: std::any::type_name::<T>(),
                created_at: SystemTime::now(),
                payload: Arc::from(boxed),
            },
        }
    }

    /// Wrap an already shared value without copying it
    pub fn from_arc<T: Any + Send + Sync>(payload: Arc<T>) -> Self {
        Self {
            id: MessageId::next(),
            type_name: std::any::type_name::<T>(),
            created_at: SystemTime::now(),
            payload,
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    /// Rust type name of the payload, for diagnostics only
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    pub fn is<T: Any>(&self) -> bool {
        self.payload.is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    pub fn payload(&self) -> &(dyn Any + Send + Sync) {
        self.payload.as_ref()
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("id", &self.id)
            .field("type", &self.type_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Invoice {
        number: u32,
    }

    #[test]
    fn test_message_downcasting() {
        let message = Message::new(Invoice { number: 7 });

        assert!(message.is::<Invoice>());
        assert!(!message.is::<String>());
        assert_eq!(message.downcast_ref::<Invoice>(), Some(&Invoice { number: 7 }));
        assert!(message.type_name().ends_with("Invoice"));
    }

    #[test]
    fn test_message_ids_are_unique_and_survive_clone() {
        let first = Message::new("a");
        let second = Message::new("a");
        let clone = first.clone();

        assert_ne!(first.id(), second.id());
        assert_eq!(first.id(), clone.id());
        assert!(second.id() > first.id());
    }

    #[test]
    fn test_wrapping_a_message_does_not_nest() {
        let inner = Message::new(5_i64);
        let outer = Message::new(inner.clone());

        assert_eq!(outer.id(), inner.id());
        assert_eq!(outer.downcast_ref::<i64>(), Some(&5));
    }

    #[test]
    fn test_from_arc_shares_payload() {
        let shared = Arc::new(String::from("shared"));
        let message = Message::from_arc(Arc::clone(&shared));

        assert_eq!(Arc::strong_count(&shared), 2);
        assert_eq!(message.downcast_ref::<String>().map(String::as_str), Some("shared"));
    }
}
