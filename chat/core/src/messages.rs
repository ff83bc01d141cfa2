//! Session Messages
//!
//! Identifiers and the events a [`ChatSession`](crate::session::ChatSession)
//! sends to whatever surface is rendering it (terminal, web view, test
//! harness).
//!
//! # Design Philosophy
//!
//! The session engine owns all conversation state. Surfaces are renderers:
//! they apply `SessionEvent`s to their own display state and never mutate the
//! transcript directly. This keeps the request lifecycle and the reveal
//! animation testable without any UI attached.

use serde::{Deserialize, Serialize};

use crate::transcript::Message;

/// Events from the session engine to a rendering surface
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEvent {
    // ============================================
    // Transcript
    // ============================================
    /// A message was appended to the end of the transcript
    MessageAppended {
        /// The appended message (placeholders have empty text)
        message: Message,
    },

    /// The placeholder was resolved in place with its final text
    MessageResolved {
        /// The resolved message, same id and position as the placeholder
        message: Message,
    },

    /// The transcript was reset for a new chat
    TranscriptCleared,

    /// The transcript length changed; surfaces should scroll to the newest entry
    ScrollToLatest {
        /// The newest message
        message_id: MessageId,
    },

    // ============================================
    // Reveal
    // ============================================
    /// The visible prefix of a revealing message grew
    RevealProgress {
        /// Message being revealed
        message_id: MessageId,
        /// Currently visible prefix of the message text
        visible: String,
    },

    /// The reveal finished; the message is no longer revealing
    RevealComplete {
        /// Message that finished revealing
        message_id: MessageId,
    },

    // ============================================
    // Lifecycle
    // ============================================
    /// The awaiting flag changed (disables submit, shows the pending indicator)
    Pending {
        /// Whether a request is being submitted or awaited
        active: bool,
    },

    /// Controller state change
    State {
        /// The new state
        state: ControllerState,
    },
}

/// Message identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Generate a new unique message ID
    pub fn new() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        Self(format!("msg_{id}"))
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a new random session ID
    pub fn new() -> Self {
        Self(format!("session_{}", uuid::Uuid::new_v4().simple()))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who sent a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    /// User input
    User,
    /// Answer from the endpoint
    Assistant,
}

impl Sender {
    /// Display label for this sender
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::User => "You",
            Self::Assistant => "RecipeAI",
        }
    }
}

/// Request lifecycle states
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControllerState {
    /// Ready for a submission
    #[default]
    Idle,
    /// Appending the user message and placeholder
    Submitting,
    /// Waiting on the answer endpoint
    AwaitingResponse,
    /// Resolving the placeholder with the answer or the failure text
    Settling,
}

impl ControllerState {
    /// Human-readable description
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Idle => "Ready",
            Self::Submitting => "Sending...",
            Self::AwaitingResponse => "Waiting for RecipeAI...",
            Self::Settling => "Answer received",
        }
    }

    /// Whether the pending indicator is shown in this state
    #[must_use]
    pub fn shows_pending(&self) -> bool {
        matches!(self, Self::Submitting | Self::AwaitingResponse)
    }
}

/// Result of a submission attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The question was sent; both messages are in the transcript
    Accepted {
        /// The user's message
        user_message: MessageId,
        /// The assistant placeholder awaiting the answer
        placeholder: MessageId,
    },
    /// Nothing happened
    Ignored(IgnoreReason),
}

impl SubmitOutcome {
    /// Whether the submission was accepted
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Why a submission was a no-op
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Input was empty after trimming whitespace
    EmptyInput,
    /// A request is already in flight
    RequestInFlight,
    /// An earlier assistant message is still unresolved or revealing
    Unsettled,
    /// The session has been torn down
    TornDown,
}
