//! Conversation memory — a bounded message list with a pinned system message.
//!
//! Memory is pruned by message count, not tokens. When the list grows past
//! `max_size`, the oldest non-system messages are discarded in insertion
//! order. If a system message exists it always sits at index 0 and survives
//! every trim.
//!
//! All operations are internally serialized; callers may invoke them from any
//! task. A single logical `query`, however, must not run concurrently with
//! another `query` on the same agent instance.

use parking_lot::RwLock;

use crate::message::{Message, Role};

/// Default capacity when none is configured.
pub const DEFAULT_MEMORY_SIZE: usize = 100;

pub struct ConversationMemory {
    inner: RwLock<Inner>,
}

struct Inner {
    messages: Vec<Message>,
    max_size: usize,
}

impl ConversationMemory {
    /// Create a memory bounded at `max_size` messages (minimum 1).
    pub fn new(max_size: usize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                messages: Vec::new(),
                max_size: max_size.max(1),
            }),
        }
    }

    /// Append a message, trimming the oldest non-system messages if the
    /// list overflows.
    pub fn append(&self, message: Message) {
        let mut inner = self.inner.write();
        inner.messages.push(message);
        Self::trim(&mut inner);
    }

    /// A defensive copy of the current message list.
    pub fn snapshot(&self) -> Vec<Message> {
        self.inner.read().messages.clone()
    }

    /// Atomic whole-memory replacement (used by session restore).
    pub fn replace(&self, messages: Vec<Message>) {
        let mut inner = self.inner.write();
        inner.messages = messages;
        Self::trim(&mut inner);
    }

    /// Update the pinned system message, creating one at index 0 if absent.
    pub fn set_system_prompt(&self, text: impl Into<String>) {
        let text = text.into();
        let mut inner = self.inner.write();
        match inner.messages.first_mut() {
            Some(first) if first.role == Role::System => first.content = Some(text),
            _ => {
                inner.messages.insert(0, Message::system(text));
                Self::trim(&mut inner);
            }
        }
    }

    /// Drop everything except the system message.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.messages.retain(|m| m.role == Role::System);
        inner.messages.truncate(1);
    }

    /// Truncate back to `len` messages (rollback after a failed or
    /// cancelled streaming query).
    pub fn truncate(&self, len: usize) {
        self.inner.write().messages.truncate(len);
    }

    pub fn len(&self) -> usize {
        self.inner.read().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().messages.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.inner.read().max_size
    }

    fn trim(inner: &mut Inner) {
        while inner.messages.len() > inner.max_size {
            let evict = match inner.messages.first() {
                Some(first) if first.role == Role::System => 1,
                _ => 0,
            };
            if evict >= inner.messages.len() {
                break;
            }
            inner.messages.remove(evict);
        }
    }
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(max: usize, count: usize) -> ConversationMemory {
        let memory = ConversationMemory::new(max);
        memory.set_system_prompt("You are helpful.");
        for i in 0..count {
            memory.append(Message::user(format!("message {i}")));
        }
        memory
    }

    #[test]
    fn append_and_snapshot() {
        let memory = ConversationMemory::new(10);
        memory.append(Message::user("hello"));
        let snap = memory.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].text(), "hello");
    }

    #[test]
    fn system_message_survives_trim() {
        let memory = filled(3, 10);
        let snap = memory.snapshot();
        assert_eq!(snap.len(), 3);
        assert_eq!(snap[0].role, Role::System);
        // Oldest user messages are gone; the most recent survive.
        assert_eq!(snap[2].text(), "message 9");
    }

    #[test]
    fn trim_boundary_exact_capacity() {
        // system + 4 users == max_size: no trim
        let memory = filled(5, 4);
        assert_eq!(memory.len(), 5);
        assert_eq!(memory.snapshot()[1].text(), "message 0");

        // one more pushes the oldest non-system message out
        memory.append(Message::user("message 4"));
        let snap = memory.snapshot();
        assert_eq!(snap.len(), 5);
        assert_eq!(snap[0].role, Role::System);
        assert_eq!(snap[1].text(), "message 1");
    }

    #[test]
    fn set_system_prompt_updates_in_place() {
        let memory = ConversationMemory::new(10);
        memory.append(Message::user("first"));
        memory.set_system_prompt("v1");
        memory.set_system_prompt("v2");

        let snap = memory.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].role, Role::System);
        assert_eq!(snap[0].text(), "v2");
        assert_eq!(snap[1].text(), "first");
    }

    #[test]
    fn clear_retains_system_message() {
        let memory = filled(10, 4);
        memory.clear();
        let snap = memory.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].role, Role::System);
    }

    #[test]
    fn replace_is_atomic_and_trims() {
        let memory = ConversationMemory::new(3);
        let mut list = vec![Message::system("sys")];
        for i in 0..5 {
            list.push(Message::user(format!("m{i}")));
        }
        memory.replace(list);
        let snap = memory.snapshot();
        assert_eq!(snap.len(), 3);
        assert_eq!(snap[0].role, Role::System);
        assert_eq!(snap[2].text(), "m4");
    }

    #[test]
    fn truncate_rolls_back() {
        let memory = filled(10, 2);
        let before = memory.len();
        memory.append(Message::user("in-flight"));
        memory.append(Message::assistant("partial"));
        memory.truncate(before);
        assert_eq!(memory.len(), before);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let memory = ConversationMemory::new(0);
        memory.append(Message::user("kept"));
        assert_eq!(memory.len(), 1);
    }
}
