//! Conversation state used to render prompts.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::channels::IncomingMessage;
use crate::error::ContextError;

/// One line of conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender: sender.into(),
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}

impl From<&IncomingMessage> for ChatMessage {
    fn from(message: &IncomingMessage) -> Self {
        Self {
            id: message.id,
            sender: message.sender_name.clone(),
            text: message.content.clone(),
            created_at: message.received_at,
        }
    }
}

/// Composed state for one room. Read-only to the command pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationContext {
    pub agent_name: String,
    pub room_id: String,
    pub recent_messages: Vec<ChatMessage>,
}

impl ConversationContext {
    pub fn new(agent_name: impl Into<String>, room_id: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            room_id: room_id.into(),
            recent_messages: Vec::new(),
        }
    }

    pub fn with_messages(mut self, messages: Vec<ChatMessage>) -> Self {
        self.recent_messages = messages;
        self
    }

    /// `sender: text` lines, oldest first.
    pub fn recent_messages_text(&self) -> String {
        self.recent_messages
            .iter()
            .map(|m| format!("{}: {}", m.sender, m.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Builds and refreshes conversation state.
#[async_trait]
pub trait ContextComposer: Send + Sync {
    /// Compose fresh state for the room the message belongs to.
    async fn compose(&self, message: &IncomingMessage)
    -> Result<ConversationContext, ContextError>;

    /// Refresh the recent-message list of previously composed state.
    ///
    /// Messages already in `state` are kept; newer logged ones are merged in.
    async fn update_recent_messages(
        &self,
        state: ConversationContext,
    ) -> Result<ConversationContext, ContextError>;

    /// Append a message to the room log.
    async fn record(&self, room_id: &str, message: ChatMessage) -> Result<(), ContextError>;

    /// Forget the room log.
    async fn clear(&self, _room_id: &str) -> Result<(), ContextError> {
        Ok(())
    }
}

/// In-memory room log bounded to the most recent `limit` messages.
pub struct MemoryComposer {
    agent_name: String,
    limit: usize,
    rooms: RwLock<HashMap<String, VecDeque<ChatMessage>>>,
}

impl MemoryComposer {
    pub fn new(agent_name: impl Into<String>, limit: usize) -> Self {
        Self {
            agent_name: agent_name.into(),
            limit: limit.max(1),
            rooms: RwLock::new(HashMap::new()),
        }
    }

    async fn snapshot(&self, room_id: &str) -> Vec<ChatMessage> {
        let rooms = self.rooms.read().await;
        rooms
            .get(room_id)
            .map(|log| log.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn tail(&self, mut messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
        if messages.len() > self.limit {
            messages.drain(..messages.len() - self.limit);
        }
        messages
    }
}

#[async_trait]
impl ContextComposer for MemoryComposer {
    async fn compose(
        &self,
        message: &IncomingMessage,
    ) -> Result<ConversationContext, ContextError> {
        let mut messages = self.snapshot(&message.room_id).await;
        if !messages.iter().any(|m| m.id == message.id) {
            messages.push(ChatMessage::from(message));
        }

        Ok(ConversationContext::new(&self.agent_name, &message.room_id)
            .with_messages(self.tail(messages)))
    }

    async fn update_recent_messages(
        &self,
        mut state: ConversationContext,
    ) -> Result<ConversationContext, ContextError> {
        let mut messages = std::mem::take(&mut state.recent_messages);
        for logged in self.snapshot(&state.room_id).await {
            if !messages.iter().any(|m| m.id == logged.id) {
                messages.push(logged);
            }
        }
        messages.sort_by_key(|m| m.created_at);
        state.recent_messages = self.tail(messages);
        Ok(state)
    }

    async fn record(&self, room_id: &str, message: ChatMessage) -> Result<(), ContextError> {
        let mut rooms = self.rooms.write().await;
        let log = rooms.entry(room_id.to_string()).or_default();
        log.push_back(message);
        while log.len() > self.limit {
            log.pop_front();
        }
        Ok(())
    }

    async fn clear(&self, room_id: &str) -> Result<(), ContextError> {
        self.rooms.write().await.remove(room_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn compose_includes_unrecorded_message() {
        let composer = MemoryComposer::new("XtreamlyLooper", 10);
        let msg = IncomingMessage::new("repl", "user", "Retrieve ETH volatility");

        let state = composer.compose(&msg).await.unwrap();

        assert_eq!(state.agent_name, "XtreamlyLooper");
        assert_eq!(state.recent_messages_text(), "user: Retrieve ETH volatility");
    }

    #[tokio::test]
    async fn compose_does_not_duplicate_recorded_message() {
        let composer = MemoryComposer::new("XtreamlyLooper", 10);
        let msg = IncomingMessage::new("repl", "user", "hello");
        composer
            .record(&msg.room_id, ChatMessage::from(&msg))
            .await
            .unwrap();

        let state = composer.compose(&msg).await.unwrap();
        assert_eq!(state.recent_messages.len(), 1);
    }

    #[tokio::test]
    async fn room_log_is_bounded() {
        let composer = MemoryComposer::new("agent", 2);
        for text in ["one", "two", "three"] {
            composer
                .record("room", ChatMessage::new("user", text))
                .await
                .unwrap();
        }

        let state = composer
            .update_recent_messages(ConversationContext::new("agent", "room"))
            .await
            .unwrap();
        assert_eq!(state.recent_messages_text(), "user: two\nuser: three");

        composer.clear("room").await.unwrap();
        let state = composer
            .update_recent_messages(ConversationContext::new("agent", "room"))
            .await
            .unwrap();
        assert!(state.recent_messages.is_empty());
    }

    #[tokio::test]
    async fn update_keeps_supplied_history() {
        let composer = MemoryComposer::new("agent", 10);
        let supplied = vec![
            ChatMessage::new("user", "What is going on with bitcoin?"),
            ChatMessage::new("agent", "Want the volatility state?"),
        ];

        let state = composer
            .update_recent_messages(
                ConversationContext::new("agent", "room").with_messages(supplied.clone()),
            )
            .await
            .unwrap();
        assert_eq!(state.recent_messages, supplied);
    }

    #[tokio::test]
    async fn update_merges_log_without_duplicates() {
        let composer = MemoryComposer::new("agent", 10);
        let first = ChatMessage::new("user", "one");
        composer.record("room", first.clone()).await.unwrap();
        composer
            .record("room", ChatMessage::new("user", "two"))
            .await
            .unwrap();

        let state = composer
            .update_recent_messages(
                ConversationContext::new("agent", "room").with_messages(vec![first]),
            )
            .await
            .unwrap();
        assert_eq!(state.recent_messages_text(), "user: one\nuser: two");
    }
}
