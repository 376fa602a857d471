//! **Conversation store seam** — history reads and per-turn appends.
//!
//! The SQL store itself lives with the gateway; the core only needs these two
//! operations. `MemoryStore` backs tests and key-less local runs.

use crate::error::VoiceResult;
use crate::llm::ChatMessage;
use async_trait::async_trait;
use std::sync::Mutex;

/// Persisted conversation history for a user, plus turn analytics.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Oldest-first recent history, at most `limit` turns.
    async fn read_history(&self, user_id: i64, limit: usize) -> VoiceResult<Vec<ChatMessage>>;

    /// Append one turn. `sentiment` is recorded for user turns, `latency_ms`
    /// for assistant turns; both are analytics only.
    async fn append_turn(
        &self,
        user_id: i64,
        role: &str,
        content: &str,
        sentiment: Option<f32>,
        latency_ms: Option<u64>,
    ) -> VoiceResult<()>;
}

#[derive(Debug, Clone)]
struct StoredTurn {
    user_id: i64,
    role: String,
    content: String,
}

/// In-memory store for tests and demos. Per-process, unordered users.
#[derive(Debug, Default)]
pub struct MemoryStore {
    turns: Mutex<Vec<StoredTurn>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turn_count(&self) -> usize {
        self.turns.lock().unwrap().len()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn read_history(&self, user_id: i64, limit: usize) -> VoiceResult<Vec<ChatMessage>> {
        let turns = self.turns.lock().unwrap();
        let mut history: Vec<ChatMessage> = turns
            .iter()
            .filter(|t| t.user_id == user_id)
            .map(|t| ChatMessage {
                role: t.role.clone(),
                content: t.content.clone(),
            })
            .collect();
        if history.len() > limit {
            history.drain(..history.len() - limit);
        }
        Ok(history)
    }

    async fn append_turn(
        &self,
        user_id: i64,
        role: &str,
        content: &str,
        _sentiment: Option<f32>,
        _latency_ms: Option<u64>,
    ) -> VoiceResult<()> {
        self.turns.lock().unwrap().push(StoredTurn {
            user_id,
            role: role.to_string(),
            content: content.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn history_is_per_user_and_limited() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store
                .append_turn(1, "user", &format!("msg {i}"), None, None)
                .await
                .unwrap();
        }
        store.append_turn(2, "user", "other", None, None).await.unwrap();

        let history = store.read_history(1, 3).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].content, "msg 2");
        assert_eq!(history[2].content, "msg 4");

        let other = store.read_history(2, 20).await.unwrap();
        assert_eq!(other.len(), 1);
    }
}
