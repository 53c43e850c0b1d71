//! Conversation history
//!
//! A bounded log of role-tagged turns shared between the HTTP handlers and
//! the console loop. Mutation goes through one mutex; callers get read-only
//! snapshots to hand to the response generator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::Mutex;

/// Sliding-window cap on stored turns.
pub const MAX_TURNS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One role-tagged message in the conversation log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

pub struct ConversationStore {
    turns: Mutex<VecDeque<Turn>>,
    capacity: usize,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::with_capacity(MAX_TURNS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            turns: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Add one turn, evicting from the front once the cap is exceeded.
    pub async fn append(&self, role: Role, content: impl Into<String>) {
        let mut turns = self.turns.lock().await;
        turns.push_back(Turn {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        });
        while turns.len() > self.capacity {
            turns.pop_front();
        }
    }

    /// Read-only copy, in insertion order.
    pub async fn snapshot(&self) -> Vec<Turn> {
        self.turns.lock().await.iter().cloned().collect()
    }

    pub async fn clear(&self) {
        self.turns.lock().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.turns.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.turns.lock().await.is_empty()
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_keeps_the_most_recent_turns() {
        let store = ConversationStore::new();

        for i in 0..25 {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            store.append(role, format!("turn {}", i)).await;
        }

        let turns = store.snapshot().await;
        assert_eq!(turns.len(), MAX_TURNS);
        assert_eq!(turns[0].content, "turn 5");
        assert_eq!(turns[19].content, "turn 24");
    }

    #[tokio::test]
    async fn clear_empties_the_store() {
        let store = ConversationStore::new();
        store.append(Role::User, "hello").await;
        store.append(Role::Assistant, "hi there").await;
        assert_eq!(store.len().await, 2);

        store.clear().await;
        assert!(store.is_empty().await);
        assert!(store.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn snapshot_is_a_copy() {
        let store = ConversationStore::new();
        store.append(Role::User, "hello").await;

        let mut snapshot = store.snapshot().await;
        snapshot.clear();

        assert_eq!(store.len().await, 1);
    }
}
