//! Append-only conversation memory for one session.
//!
//! Turns are stored in creation order and are never edited or removed.
//! The only mutation is [`ConversationMemory::append`], which records a
//! user turn and its assistant reply together, so history always holds
//! complete exchanges.
//!
//! This type is not synchronized. The session registry wraps each memory
//! in a per-session lock and holds it for the whole pipeline run.

use crate::models::Turn;

#[derive(Debug, Clone, Default)]
pub struct ConversationMemory {
    turns: Vec<Turn>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed exchange.
    ///
    /// Both turns are pushed under the same `&mut` borrow, so a reader can
    /// never observe the user turn without its reply.
    pub fn append(&mut self, user_text: impl Into<String>, assistant_text: impl Into<String>) {
        self.turns.reserve(2);
        self.turns.push(Turn::user(user_text));
        self.turns.push(Turn::assistant(assistant_text));
    }

    /// Snapshot of the full ordered history.
    ///
    /// Returns an owned copy; changes to it do not affect the memory.
    pub fn history(&self) -> Vec<Turn> {
        self.turns.clone()
    }

    /// Borrowed view of the history, for rendering without a copy.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of stored turns (twice the number of exchanges).
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Number of completed user/assistant exchanges.
    pub fn exchanges(&self) -> usize {
        self.turns.len() / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[test]
    fn test_new_memory_is_empty() {
        let memory = ConversationMemory::new();
        assert!(memory.is_empty());
        assert_eq!(memory.exchanges(), 0);
        assert!(memory.history().is_empty());
    }

    #[test]
    fn test_history_preserves_call_order() {
        let mut memory = ConversationMemory::new();
        for i in 0..5 {
            memory.append(format!("question {}", i), format!("answer {}", i));
        }

        let history = memory.history();
        assert_eq!(history.len(), 10);
        assert_eq!(memory.exchanges(), 5);
        for i in 0..5 {
            assert_eq!(history[2 * i].role, Role::User);
            assert_eq!(history[2 * i].text, format!("question {}", i));
            assert_eq!(history[2 * i + 1].role, Role::Assistant);
            assert_eq!(history[2 * i + 1].text, format!("answer {}", i));
        }
    }

    #[test]
    fn test_history_is_a_snapshot() {
        let mut memory = ConversationMemory::new();
        memory.append("hello", "hi there");

        let mut snapshot = memory.history();
        snapshot.clear();
        snapshot.push(Turn::user("tampered"));

        assert_eq!(memory.len(), 2);
        assert_eq!(memory.history()[0].text, "hello");
    }
}
