//! Ephemeral live-stream session and chat relay
//!
//! A [`LiveHub`] holds at most one running stream. It is shared by every
//! controller that should see the same stream (admin console and guest
//! viewers); nothing here is persisted.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use ulid::Ulid;

const CHAT_CHANNEL_CAPACITY: usize = 256;

/// One chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Sortable id
    pub id: Ulid,
    /// "Admin" or the guest's name
    pub author: String,
    /// Message text
    pub text: String,
    /// Time posted
    pub sent_at: DateTime<Utc>,
}

/// A running stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveSession {
    /// Stream title
    pub title: String,
    /// Start time
    pub started_at: DateTime<Utc>,
    /// Chat in posting order
    pub messages: Vec<ChatMessage>,
}

/// Banner shown while a stream is live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveNotice {
    /// Stream title
    pub title: String,
}

/// Holder of the current live session
#[derive(Debug)]
pub struct LiveHub {
    session: RwLock<Option<LiveSession>>,
    events: broadcast::Sender<ChatMessage>,
}

impl Default for LiveHub {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveHub {
    /// Create a hub with no stream running
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(CHAT_CHANNEL_CAPACITY);
        Self {
            session: RwLock::new(None),
            events,
        }
    }

    /// Start a stream, replacing any running one; chat starts empty
    pub fn start(&self, title: &str, now: DateTime<Utc>) -> LiveSession {
        let session = LiveSession {
            title: title.trim().to_string(),
            started_at: now,
            messages: Vec::new(),
        };
        *self.session.write() = Some(session.clone());
        tracing::info!(title = %session.title, "Live stream started");
        session
    }

    /// End the running stream, returning it
    pub fn end(&self) -> Option<LiveSession> {
        let ended = self.session.write().take();
        if let Some(s) = &ended {
            tracing::info!(title = %s.title, messages = s.messages.len(), "Live stream ended");
        }
        ended
    }

    /// True while a stream runs
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.session.read().is_some()
    }

    /// Banner for the running stream
    #[must_use]
    pub fn notice(&self) -> Option<LiveNotice> {
        self.session.read().as_ref().map(|s| LiveNotice { title: s.title.clone() })
    }

    /// Snapshot of the running stream
    #[must_use]
    pub fn snapshot(&self) -> Option<LiveSession> {
        self.session.read().clone()
    }

    /// Append a message; `None` when no stream runs
    pub fn post(&self, author: &str, text: &str, now: DateTime<Utc>) -> Option<ChatMessage> {
        let message = {
            let mut guard = self.session.write();
            let session = guard.as_mut()?;
            let message = ChatMessage {
                id: Ulid::new(),
                author: author.to_string(),
                text: text.trim().to_string(),
                sent_at: now,
            };
            session.messages.push(message.clone());
            message
        };
        // No subscribers is fine
        let _ = self.events.send(message.clone());
        Some(message)
    }

    /// Receive messages as they are posted
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChatMessage> {
        self.events.subscribe()
    }
}
