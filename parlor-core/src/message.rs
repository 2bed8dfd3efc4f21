use crate::types::{AgentId, Role};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// One conversation turn. The id is stable across updates: transcription
/// segments keep the same id from first partial to final, and instant
/// responses get a synthetic id of their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,

    // Set only for assistant turns.
    pub agent: Option<AgentId>,
    pub content: String,

    // True while the content is partial and may still be replaced.
    pub transcribing: bool,
    pub ts_unix_ms: i64,
}

pub fn unix_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Insertion-ordered collection of turns keyed by message id.
///
/// `upsert` merges updates for an id in place so that repeated partials and
/// the final text of one utterance stay a single turn at its original
/// position.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MessageStore {
    messages: Vec<Message>,
    index: HashMap<String, usize>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, msg: Message) {
        match self.index.get(&msg.id) {
            Some(&i) => self.messages[i] = msg,
            None => {
                self.index.insert(msg.id.clone(), self.messages.len());
                self.messages.push(msg);
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.index.get(id).map(|&i| &self.messages[i])
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_msg(id: &str, content: &str, transcribing: bool) -> Message {
        Message {
            id: id.into(),
            role: Role::User,
            agent: None,
            content: content.into(),
            transcribing,
            ts_unix_ms: 1,
        }
    }

    #[test]
    fn upsert_merges_partial_then_final_into_one_turn() {
        let mut store = MessageStore::new();
        store.upsert(user_msg("user-s1", "hel", true));
        store.upsert(user_msg("user-s1", "hello", false));

        assert_eq!(store.len(), 1);
        let m = store.get("user-s1").unwrap();
        assert_eq!(m.content, "hello");
        assert!(!m.transcribing);
    }

    #[test]
    fn upsert_preserves_insertion_order_across_updates() {
        let mut store = MessageStore::new();
        store.upsert(user_msg("user-s1", "first", true));
        store.upsert(user_msg("user-s2", "second", true));
        store.upsert(user_msg("user-s1", "first, updated", false));

        let ids: Vec<&str> = store.messages().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["user-s1", "user-s2"]);
    }

    #[test]
    fn store_reflects_most_recently_applied_update() {
        // The store never reorders: if a final lands before a late partial,
        // the partial wins because it was applied last.
        let mut store = MessageStore::new();
        store.upsert(user_msg("user-s1", "done", false));
        store.upsert(user_msg("user-s1", "don", true));

        let m = store.get("user-s1").unwrap();
        assert_eq!(m.content, "don");
        assert!(m.transcribing);
    }

    #[test]
    fn clear_empties_both_list_and_index() {
        let mut store = MessageStore::new();
        store.upsert(user_msg("user-s1", "hello", false));
        store.clear();
        assert!(store.is_empty());
        assert!(store.get("user-s1").is_none());

        store.upsert(user_msg("user-s1", "fresh", true));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("user-s1").unwrap().content, "fresh");
    }
}
