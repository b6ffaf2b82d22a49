//! Inbound messages and the outward response sink.

mod repl;

pub use repl::ReplChannel;

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A message received from a user.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub id: Uuid,
    /// Channel the message arrived on ("repl", "cli").
    pub channel: String,
    /// Conversation room; defaults to `<channel>:<user_id>`.
    pub room_id: String,
    pub user_id: String,
    pub sender_name: String,
    pub content: String,
    pub received_at: DateTime<Utc>,
}

impl IncomingMessage {
    pub fn new(
        channel: impl Into<String>,
        user_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let channel = channel.into();
        let user_id = user_id.into();
        Self {
            id: Uuid::new_v4(),
            room_id: format!("{channel}:{user_id}"),
            sender_name: user_id.clone(),
            channel,
            user_id,
            content: content.into(),
            received_at: Utc::now(),
        }
    }
}

/// A single reply sent back to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingResponse {
    pub text: String,
    /// `Some(vec![])` marks a reply that explicitly carries no attachments.
    pub attachments: Option<Vec<String>>,
}

impl OutgoingResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachments: None,
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<String>) -> Self {
        self.attachments = Some(attachments);
        self
    }
}

/// Callback that delivers a reply to the user.
pub trait ResponseSink: Send + Sync {
    fn respond(&self, response: OutgoingResponse);
}

impl<F> ResponseSink for F
where
    F: Fn(OutgoingResponse) + Send + Sync,
{
    fn respond(&self, response: OutgoingResponse) {
        self(response)
    }
}

/// Sink that keeps every response in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    responses: Mutex<Vec<OutgoingResponse>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn responses(&self) -> Vec<OutgoingResponse> {
        match self.responses.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn take(&self) -> Vec<OutgoingResponse> {
        match self.responses.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl ResponseSink for CollectingSink {
    fn respond(&self, response: OutgoingResponse) {
        match self.responses.lock() {
            Ok(mut guard) => guard.push(response),
            Err(poisoned) => poisoned.into_inner().push(response),
        }
    }
}
