//! Transcript
//!
//! The ordered list of messages exchanged in the current session. This is the
//! single source of truth for what a surface renders.
//!
//! # Design Philosophy
//!
//! Entries are appended and resolved in place, never reordered. The assistant
//! placeholder is a phase of the message entity rather than a separate entry:
//! it goes `Pending → Revealing → Settled` under one id, so the answer lands
//! exactly where the placeholder was.
//!
//! Reveal progress is view state. A message always carries its full text and
//! the visible prefix can be rebuilt from it at any time.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::messages::{MessageId, Sender};

/// Where a message is in its lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessagePhase {
    /// Assistant placeholder waiting for the endpoint; text is empty
    Pending,
    /// Final text is set and the reveal is running
    Revealing,
    /// Fully shown
    Settled,
}

/// A message in the transcript
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: MessageId,
    /// Full message text
    pub text: String,
    /// Who sent this message
    pub sender: Sender,
    /// Local wall-clock time of send/receive, display only
    pub timestamp: String,
    /// Lifecycle phase
    phase: MessagePhase,
}

impl Message {
    /// Create a settled user message
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            text: text.into(),
            sender: Sender::User,
            timestamp: display_time(),
            phase: MessagePhase::Settled,
        }
    }

    /// Create an assistant placeholder (empty text, revealing)
    pub fn placeholder() -> Self {
        Self {
            id: MessageId::new(),
            text: String::new(),
            sender: Sender::Assistant,
            timestamp: display_time(),
            phase: MessagePhase::Pending,
        }
    }

    /// Create an assistant message that is already fully shown
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            text: text.into(),
            sender: Sender::Assistant,
            timestamp: display_time(),
            phase: MessagePhase::Settled,
        }
    }

    /// Current lifecycle phase
    #[must_use]
    pub fn phase(&self) -> MessagePhase {
        self.phase
    }

    /// Whether the message is the placeholder or the active reveal target
    #[must_use]
    pub fn is_revealing(&self) -> bool {
        matches!(self.phase, MessagePhase::Pending | MessagePhase::Revealing)
    }

    /// Whether the message is an unresolved placeholder
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.phase == MessagePhase::Pending
    }

    /// Number of characters the reveal walks through
    #[must_use]
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    fn resolve(&mut self, text: String) {
        self.text = text;
        self.timestamp = display_time();
        self.phase = MessagePhase::Revealing;
    }

    fn settle(&mut self) {
        self.phase = MessagePhase::Settled;
    }
}

/// Transcript mutation errors
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TranscriptError {
    /// Another message is already revealing
    #[error("message {active} is still revealing")]
    RevealInProgress {
        /// The message currently revealing
        active: MessageId,
    },
    /// The id is not an outstanding placeholder
    #[error("no outstanding placeholder with id {0}")]
    NoPlaceholder(MessageId),
}

/// Ordered, append-only conversation transcript
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Transcript {
    messages: Vec<Message>,
    /// The single message allowed to be revealing (placeholder included)
    revealing: Option<MessageId>,
}

impl Transcript {
    /// Create an empty transcript
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to the end
    ///
    /// Fails if the message is revealing while another message still is.
    pub fn append(&mut self, message: Message) -> Result<MessageId, TranscriptError> {
        if message.is_revealing() {
            if let Some(active) = &self.revealing {
                return Err(TranscriptError::RevealInProgress {
                    active: active.clone(),
                });
            }
            self.revealing = Some(message.id.clone());
        }

        let id = message.id.clone();
        self.messages.push(message);
        Ok(id)
    }

    /// Append an assistant placeholder
    pub fn push_placeholder(&mut self) -> Result<MessageId, TranscriptError> {
        self.append(Message::placeholder())
    }

    /// Resolve the outstanding placeholder in place with its final text
    ///
    /// The message keeps its id and position and starts revealing.
    pub fn replace_placeholder(
        &mut self,
        id: &MessageId,
        text: String,
    ) -> Result<&Message, TranscriptError> {
        let msg = self
            .messages
            .iter_mut()
            .find(|m| &m.id == id && m.is_placeholder())
            .ok_or_else(|| TranscriptError::NoPlaceholder(id.clone()))?;
        msg.resolve(text);
        Ok(&*msg)
    }

    /// Mark a revealing message as fully shown
    ///
    /// Returns false if the message was not revealing.
    pub fn finish_reveal(&mut self, id: &MessageId) -> bool {
        let Some(msg) = self
            .messages
            .iter_mut()
            .find(|m| &m.id == id && m.phase() == MessagePhase::Revealing)
        else {
            return false;
        };
        msg.settle();
        if self.revealing.as_ref() == Some(id) {
            self.revealing = None;
        }
        true
    }

    /// Reset to empty (new chat)
    pub fn clear(&mut self) {
        self.messages.clear();
        self.revealing = None;
    }

    /// All messages, oldest first
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Get message by ID
    #[must_use]
    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| &m.id == id)
    }

    /// The newest message
    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Number of messages
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the transcript has no messages
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The message currently revealing, placeholder included
    #[must_use]
    pub fn revealing_id(&self) -> Option<&MessageId> {
        self.revealing.as_ref()
    }

    /// The outstanding placeholder, if any
    #[must_use]
    pub fn placeholder_id(&self) -> Option<&MessageId> {
        self.messages
            .iter()
            .find(|m| m.is_placeholder())
            .map(|m| &m.id)
    }
}

/// Current local time as `HH:MM`
fn display_time() -> String {
    chrono::Local::now().format("%H:%M").to_string()
}
