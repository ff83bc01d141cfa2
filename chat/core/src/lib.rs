//! Chat Core - Headless Conversation Session Engine for RecipeAI
//!
//! This crate holds everything a RecipeAI chat surface needs except the
//! drawing: the transcript, the request lifecycle against the answer
//! endpoint, the typing reveal of answers, and the advisory sign-in state.
//! It can drive a terminal, a web view, or run headless in tests.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        UI Surfaces                            │
//! │      ┌──────────────┐   ┌──────────────┐   ┌─────────────┐    │
//! │      │ recipe-chat  │   │   Web view   │   │  Headless   │    │
//! │      │    (CLI)     │   │              │   │   / tests   │    │
//! │      └──────┬───────┘   └──────┬───────┘   └──────┬──────┘    │
//! │             └──────────────────┴──────────────────┘           │
//! │                method calls (down)  SessionEvent (up)         │
//! └────────────────────────────┼──────────────────────────────────┘
//!                              │
//! ┌────────────────────────────┼──────────────────────────────────┐
//! │                       CHAT CORE                               │
//! │  ┌─────────────────────────┴───────────────────────────────┐  │
//! │  │                      ChatSession                        │  │
//! │  │  ┌────────────┐  ┌────────────┐  ┌────────────────────┐ │  │
//! │  │  │ Transcript │  │   Reveal   │  │  Answer Endpoint   │ │  │
//! │  │  │            │  │ Scheduler  │  │  (HTTP /predict)   │ │  │
//! │  │  └────────────┘  └────────────┘  └────────────────────┘ │  │
//! │  └─────────────────────────────────────────────────────────┘  │
//! │  ┌─────────────────────────────────────────────────────────┐  │
//! │  │        SessionStore (sign-in flag + identity)           │  │
//! │  └─────────────────────────────────────────────────────────┘  │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`ChatSession`]: Runs submissions through `Idle → Submitting →
//!   AwaitingResponse → Settling → Idle`
//! - [`Transcript`]: Ordered messages, at most one of them revealing
//! - [`RevealScheduler`]: Paces the character-by-character reveal
//! - [`SessionStore`]: Persisted, advisory sign-in state
//! - [`SessionEvent`]: Events sent from the session to a surface
//!
//! # Quick Start
//!
//! ```ignore
//! use chat_core::{ChatConfig, ChatSession, HttpAnswerEndpoint};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ChatConfig::from_env();
//!     let (tx, mut rx) = mpsc::channel(config.event_capacity);
//!
//!     let endpoint = HttpAnswerEndpoint::from_config(&config)?;
//!     let mut session = ChatSession::new(endpoint, &config, tx);
//!
//!     session.send("What can I cook with eggs and spinach?").await;
//!
//!     // Drive the request and the reveal, rendering events as they come
//!     while session.next_activity().await.is_some() {
//!         while let Ok(event) = rx.try_recv() {
//!             // Render event
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`backend`]: Answer endpoint abstraction and HTTP client
//! - [`config`]: Defaults, TOML file, environment and CLI overrides
//! - [`identity`]: Session state store (sign-in flag, display name, greeting)
//! - [`messages`]: Identifiers and events from the session to surfaces
//! - [`reveal`]: Reveal scheduler
//! - [`session`]: Request lifecycle controller
//! - [`transcript`]: Transcript and message lifecycle
//!
//! # No UI Dependencies
//!
//! This crate has **zero** dependencies on crossterm or any other UI
//! framework.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod config;
pub mod identity;
pub mod messages;
pub mod reveal;
pub mod session;
pub mod transcript;

// Re-exports for convenience
pub use backend::{
    AnswerBody, AnswerEndpoint, AnswerRequest, EndpointError, HttpAnswerEndpoint,
    DEFAULT_ENDPOINT_URL,
};
pub use config::{
    default_config_path, load_config, load_config_from_path, ChatConfig, ChatToml, ConfigError,
    ConfigOverrides, ConfigSource,
};
pub use identity::{
    FileStore, KeyValueStore, MemoryStore, SessionState, SessionStore, StoreError, Welcome,
};
pub use messages::{
    ControllerState, IgnoreReason, MessageId, Sender, SessionEvent, SessionId, SubmitOutcome,
};
pub use reveal::{visible_prefix, RevealError, RevealFrame, RevealScheduler, RevealStream};
pub use session::{Activity, ChatSession, FAILURE_MESSAGE};
pub use transcript::{Message, MessagePhase, Transcript, TranscriptError};
