use std::collections::HashMap;
use std::sync::Mutex;

use crate::llm::messages::ChatMessage;

/// Conversation history keyed by session id.
///
/// The contract is append-only: histories are never truncated or rewritten,
/// so an external store (a database, a file) can implement the same two
/// operations without the loop noticing.
pub trait SessionStore: Send + Sync {
    fn load(&self, session_id: &str) -> Vec<ChatMessage>;
    fn append(&self, session_id: &str, message: ChatMessage);
}

/// Process-lifetime store; history is lost when the process exits.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, Vec<ChatMessage>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    fn load(&self, session_id: &str) -> Vec<ChatMessage> {
        self.sessions
            .lock()
            .expect("session store lock poisoned")
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    fn append(&self, session_id: &str, message: ChatMessage) {
        self.sessions
            .lock()
            .expect("session store lock poisoned")
            .entry(session_id.to_string())
            .or_default()
            .push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::{InMemorySessionStore, SessionStore};
    use crate::llm::messages::{ChatMessage, MessageRole};

    #[test]
    fn unknown_session_loads_empty_history() {
        let store = InMemorySessionStore::new();
        assert!(store.load("nope").is_empty());
    }

    #[test]
    fn append_preserves_order_within_a_session() {
        let store = InMemorySessionStore::new();
        store.append("s1", ChatMessage::user("first"));
        store.append("s1", ChatMessage::assistant("second", Vec::new()));
        store.append("s1", ChatMessage::user("third"));

        let history = store.load("s1");
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].content, "first");
        assert_eq!(history[1].role, MessageRole::Assistant);
        assert_eq!(history[2].content, "third");
    }

    #[test]
    fn sessions_are_isolated_by_id() {
        let store = InMemorySessionStore::new();
        store.append("a", ChatMessage::user("for a"));
        store.append("b", ChatMessage::user("for b"));

        assert_eq!(store.load("a").len(), 1);
        assert_eq!(store.load("b").len(), 1);
        assert_eq!(store.load("a")[0].content, "for a");
    }
}
