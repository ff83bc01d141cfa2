//! Chat Session - The Request Lifecycle Controller
//!
//! A `ChatSession` owns the transcript for one conversation and runs every
//! submission through the same lifecycle:
//!
//! ```text
//! Idle ──submit──▶ Submitting ──▶ AwaitingResponse ──answer/failure──▶ Settling ──▶ Idle
//!                  (user msg,                                          (placeholder
//!                   placeholder)                                        resolved, reveal
//!                                                                       started)
//! ```
//!
//! # Design Philosophy
//!
//! The session is UI-agnostic. It doesn't know whether a terminal, a web view
//! or a test harness is watching. Surfaces call methods (`submit`, `new_chat`,
//! `teardown`) and receive [`SessionEvent`]s over an `mpsc` channel.
//!
//! Nothing runs in the background except the single endpoint call. Progress
//! happens when the surface drives the session with
//! [`next_activity`](ChatSession::next_activity), which is cancel-safe and
//! meant to be raced against user input in a `tokio::select!`.
//!
//! Endpoint failures never escape: the placeholder is resolved with
//! [`FAILURE_MESSAGE`] and the session returns to `Idle`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::backend::{AnswerBody, AnswerEndpoint, AnswerRequest, EndpointError};
use crate::config::ChatConfig;
use crate::messages::{
    ControllerState, IgnoreReason, MessageId, SessionEvent, SessionId, SubmitOutcome,
};
use crate::reveal::{RevealFrame, RevealScheduler, RevealStream};
use crate::transcript::{Message, Transcript, TranscriptError};

/// Text shown in place of an answer when the endpoint call fails
pub const FAILURE_MESSAGE: &str = "Sorry, there was an error connecting to RecipeAI backend.";

type Settlement = Result<AnswerBody, EndpointError>;

/// Something that happened while driving the session
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Activity {
    /// The in-flight request settled and its placeholder was resolved
    Settled {
        /// The resolved message, now revealing
        message_id: MessageId,
    },
    /// The active reveal advanced
    Reveal(RevealFrame),
}

/// The one outstanding endpoint call
struct InFlight {
    placeholder_id: MessageId,
    receiver: oneshot::Receiver<Settlement>,
    task: JoinHandle<()>,
    started: Instant,
}

/// A single conversation with the answer endpoint
pub struct ChatSession<E: AnswerEndpoint> {
    /// Session identifier
    id: SessionId,
    /// Answer endpoint
    endpoint: Arc<E>,
    /// Endpoint time limit, if any
    request_timeout: Option<Duration>,
    /// Ordered messages
    transcript: Transcript,
    /// Lifecycle state
    state: ControllerState,
    /// Whether the pending indicator is on
    awaiting: bool,
    /// Text the user is composing
    input: String,
    /// Outstanding endpoint call
    in_flight: Option<InFlight>,
    /// Hands out reveals one at a time
    scheduler: RevealScheduler,
    /// The reveal currently being driven
    reveal: Option<RevealStream>,
    /// Channel to the rendering surface
    tx: mpsc::Sender<SessionEvent>,
    /// Events not yet taken by the channel
    outbox: VecDeque<SessionEvent>,
    /// Set once by teardown; the session ignores everything afterwards
    torn_down: bool,
}

impl<E: AnswerEndpoint + 'static> ChatSession<E> {
    /// Create a session for the given endpoint
    pub fn new(endpoint: E, config: &ChatConfig, tx: mpsc::Sender<SessionEvent>) -> Self {
        Self::with_shared_endpoint(Arc::new(endpoint), config, tx)
    }

    /// Create a session around an endpoint shared with other owners
    pub fn with_shared_endpoint(
        endpoint: Arc<E>,
        config: &ChatConfig,
        tx: mpsc::Sender<SessionEvent>,
    ) -> Self {
        let id = SessionId::new();
        tracing::debug!(session_id = %id, endpoint = endpoint.name(), "Session created");

        Self {
            id,
            endpoint,
            request_timeout: config.request_timeout,
            transcript: Transcript::new(),
            state: ControllerState::Idle,
            awaiting: false,
            input: String::new(),
            in_flight: None,
            scheduler: RevealScheduler::new(config.reveal_interval),
            reveal: None,
            tx,
            outbox: VecDeque::new(),
            torn_down: false,
        }
    }

    /// Get the session ID
    pub fn session_id(&self) -> &SessionId {
        &self.id
    }

    /// Get the answer endpoint
    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    /// Get current state
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Whether a request is being submitted or awaited
    pub fn is_awaiting(&self) -> bool {
        self.awaiting
    }

    /// The conversation so far
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Whether the session has been torn down
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    // ========================================================================
    // Input buffer
    // ========================================================================

    /// Current input buffer
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Replace the input buffer
    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// Fill the input with a suggested prompt without sending it
    pub fn use_prompt(&mut self, prompt: &str) {
        tracing::debug!(prompt = %prompt, "Suggested prompt selected");
        self.set_input(prompt);
    }

    /// Fill the input and submit it
    pub async fn send(&mut self, text: impl Into<String>) -> SubmitOutcome {
        self.set_input(text);
        self.submit().await
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Submit the input buffer
    ///
    /// Appends the user message and an assistant placeholder, clears the
    /// input and starts the endpoint call. A no-op if the trimmed input is
    /// empty, a request is already in flight, or the session was torn down.
    /// A no-op never touches the transcript.
    pub async fn submit(&mut self) -> SubmitOutcome {
        let outcome = self.begin_submit();
        self.flush().await;
        outcome
    }

    fn begin_submit(&mut self) -> SubmitOutcome {
        if self.torn_down {
            return SubmitOutcome::Ignored(IgnoreReason::TornDown);
        }
        if self.in_flight.is_some() {
            tracing::debug!("Submission ignored: request in flight");
            return SubmitOutcome::Ignored(IgnoreReason::RequestInFlight);
        }

        let question = self.input.trim().to_string();
        if question.is_empty() {
            tracing::debug!("Submission ignored: empty input");
            return SubmitOutcome::Ignored(IgnoreReason::EmptyInput);
        }

        // One revealing message at a time: show the previous answer in full
        self.fast_forward_reveal();
        if let Some(active) = self.transcript.revealing_id() {
            tracing::warn!(message_id = %active, "Submission ignored: message still unsettled");
            return SubmitOutcome::Ignored(IgnoreReason::Unsettled);
        }

        self.set_state(ControllerState::Submitting);
        self.set_awaiting(true);

        // Nothing is revealing, so neither append can fail
        let appended = self.append(Message::user(question.clone())).and_then(|user_message| {
            self.input.clear();
            self.append(Message::placeholder())
                .map(|placeholder| (user_message, placeholder))
        });
        let (user_message, placeholder) = match appended {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(error = %e, "Submission abandoned");
                self.set_awaiting(false);
                self.set_state(ControllerState::Idle);
                return SubmitOutcome::Ignored(IgnoreReason::Unsettled);
            }
        };

        tracing::info!(
            session_id = %self.id,
            placeholder = %placeholder,
            chars = question.chars().count(),
            "Question submitted"
        );

        self.in_flight = Some(self.spawn_request(question, placeholder.clone()));
        self.set_state(ControllerState::AwaitingResponse);

        SubmitOutcome::Accepted {
            user_message,
            placeholder,
        }
    }

    fn spawn_request(&self, question: String, placeholder_id: MessageId) -> InFlight {
        let endpoint = Arc::clone(&self.endpoint);
        let limit = self.request_timeout;
        let (tx, receiver) = oneshot::channel();

        let task = tokio::spawn(async move {
            let request = AnswerRequest::new(question);
            let outcome = match limit {
                Some(limit) => tokio::time::timeout(limit, endpoint.ask(&request))
                    .await
                    .unwrap_or(Err(EndpointError::Timeout(limit))),
                None => endpoint.ask(&request).await,
            };
            // Receiver is gone after teardown or new chat
            let _ = tx.send(outcome);
        });

        InFlight {
            placeholder_id,
            receiver,
            task,
            started: Instant::now(),
        }
    }

    /// Whether there is anything for [`next_activity`](Self::next_activity) to wait on
    pub fn has_activity(&self) -> bool {
        !self.torn_down && (self.in_flight.is_some() || self.reveal.is_some())
    }

    /// Wait for the next settlement or reveal frame
    ///
    /// Returns `None` when there is nothing in flight and nothing revealing.
    ///
    /// Cancel-safe: the session state changes without suspending, and events
    /// not yet delivered when the future is dropped are delivered by the next
    /// call that emits.
    pub async fn next_activity(&mut self) -> Option<Activity> {
        self.flush().await;
        loop {
            if !self.has_activity() {
                return None;
            }

            let activity = tokio::select! {
                biased;

                outcome = recv_settlement(&mut self.in_flight), if self.in_flight.is_some() => {
                    self.settle(outcome)
                        .map(|message_id| Activity::Settled { message_id })
                }

                frame = next_frame(&mut self.reveal), if self.reveal.is_some() => {
                    match frame {
                        Some(frame) => {
                            self.apply_frame(&frame);
                            Some(Activity::Reveal(frame))
                        }
                        None => {
                            // Cancelled underneath us
                            self.reveal = None;
                            None
                        }
                    }
                }
            };

            if let Some(activity) = activity {
                self.flush().await;
                return Some(activity);
            }
        }
    }

    /// Settle the in-flight request if its result is ready, without waiting
    pub async fn poll_response(&mut self) -> Option<MessageId> {
        let in_flight = self.in_flight.as_mut()?;
        let outcome = match in_flight.receiver.try_recv() {
            Ok(outcome) => outcome,
            Err(oneshot::error::TryRecvError::Empty) => return None,
            Err(oneshot::error::TryRecvError::Closed) => Err(task_lost()),
        };
        let settled = self.settle(outcome);
        self.flush().await;
        settled
    }

    /// Wait until the in-flight request settles
    ///
    /// Returns `None` at once if nothing is in flight. The reveal is not
    /// advanced while waiting.
    pub async fn wait_for_response(&mut self) -> Option<MessageId> {
        if self.torn_down || self.in_flight.is_none() {
            return None;
        }
        let outcome = recv_settlement(&mut self.in_flight).await;
        let settled = self.settle(outcome);
        self.flush().await;
        settled
    }

    /// Resolve the placeholder with the answer or the failure text
    fn settle(&mut self, outcome: Settlement) -> Option<MessageId> {
        let in_flight = self.in_flight.take()?;
        let elapsed_ms = u64::try_from(in_flight.started.elapsed().as_millis()).unwrap_or(u64::MAX);

        self.set_awaiting(false);
        self.set_state(ControllerState::Settling);

        let text = match outcome {
            Ok(body) => {
                let text = body.answer_text();
                tracing::info!(
                    session_id = %self.id,
                    elapsed_ms,
                    chars = text.chars().count(),
                    "Answer received"
                );
                text
            }
            Err(e) => {
                tracing::warn!(
                    session_id = %self.id,
                    endpoint = self.endpoint.name(),
                    elapsed_ms,
                    error = %e,
                    "Answer endpoint failed"
                );
                FAILURE_MESSAGE.to_string()
            }
        };

        let message_id = in_flight.placeholder_id;
        let resolved = match self.transcript.replace_placeholder(&message_id, text) {
            Ok(message) => Some(message.clone()),
            Err(e) => {
                tracing::warn!(error = %e, "Placeholder missing at settlement");
                None
            }
        };

        if let Some(message) = resolved {
            match self.scheduler.begin(&message) {
                Ok(stream) => self.reveal = Some(stream),
                Err(e) => tracing::warn!(error = %e, "Reveal not started"),
            }
            self.emit(SessionEvent::MessageResolved { message });
        }

        self.set_state(ControllerState::Idle);
        Some(message_id)
    }

    fn apply_frame(&mut self, frame: &RevealFrame) {
        match frame {
            RevealFrame::Prefix {
                message_id,
                visible,
                ..
            } => {
                self.emit(SessionEvent::RevealProgress {
                    message_id: message_id.clone(),
                    visible: visible.clone(),
                });
            }
            RevealFrame::Complete { message_id } => {
                self.reveal = None;
                self.complete_reveal(message_id);
            }
        }
    }

    fn complete_reveal(&mut self, message_id: &MessageId) {
        self.scheduler.finish(message_id);
        if self.transcript.finish_reveal(message_id) {
            tracing::debug!(message_id = %message_id, "Reveal complete");
            self.emit(SessionEvent::RevealComplete {
                message_id: message_id.clone(),
            });
        }
    }

    /// Skip the rest of the active reveal and show the full text
    ///
    /// Returns the message that was fast-forwarded, if any.
    pub async fn finish_reveal_now(&mut self) -> Option<MessageId> {
        let finished = self.fast_forward_reveal();
        self.flush().await;
        finished
    }

    fn fast_forward_reveal(&mut self) -> Option<MessageId> {
        if let Some(stream) = self.reveal.take() {
            stream.cancel();
        }
        self.scheduler.cancel();

        let message_id = self.transcript.revealing_id()?.clone();
        let full_text = self
            .transcript
            .get(&message_id)
            .filter(|m| !m.is_placeholder())
            .map(|m| m.text.clone())?;

        self.emit(SessionEvent::RevealProgress {
            message_id: message_id.clone(),
            visible: full_text,
        });
        self.complete_reveal(&message_id);
        Some(message_id)
    }

    /// Start over with an empty transcript
    ///
    /// Abandons any in-flight request and stops any reveal. Sign-in state and
    /// the input buffer are untouched.
    pub async fn new_chat(&mut self) {
        if self.torn_down {
            return;
        }

        if let Some(in_flight) = self.in_flight.take() {
            in_flight.task.abort();
            tracing::debug!(placeholder = %in_flight.placeholder_id, "In-flight request abandoned");
        }
        self.reveal = None;
        self.scheduler.cancel();

        self.transcript.clear();
        // Undelivered events describe the old transcript
        self.outbox.clear();
        self.emit(SessionEvent::TranscriptCleared);
        self.set_awaiting(false);
        self.set_state(ControllerState::Idle);
        self.flush().await;

        tracing::info!(session_id = %self.id, "New chat started");
    }

    /// Stop all work; later results are discarded and submissions ignored
    ///
    /// Also runs when the session is dropped.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        if let Some(in_flight) = self.in_flight.take() {
            in_flight.task.abort();
        }
        self.reveal = None;
        self.scheduler.cancel();
        self.outbox.clear();
        self.awaiting = false;
        self.state = ControllerState::Idle;

        tracing::debug!(session_id = %self.id, "Session torn down");
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Append and tell the surface to scroll to it
    fn append(&mut self, message: Message) -> Result<MessageId, TranscriptError> {
        let id = self.transcript.append(message.clone())?;
        self.emit(SessionEvent::MessageAppended { message });
        self.emit(SessionEvent::ScrollToLatest {
            message_id: id.clone(),
        });
        Ok(id)
    }

    /// Set state and notify surface
    fn set_state(&mut self, state: ControllerState) {
        self.state = state;
        self.emit(SessionEvent::State { state });
    }

    fn set_awaiting(&mut self, active: bool) {
        if self.awaiting != active {
            self.awaiting = active;
            self.emit(SessionEvent::Pending { active });
        }
    }

    /// Queue an event for the surface
    fn emit(&mut self, event: SessionEvent) {
        self.outbox.push_back(event);
    }

    /// Deliver queued events in order
    ///
    /// An event leaves the queue only once the channel has taken it, so a
    /// dropped flush resumes where it stopped.
    async fn flush(&mut self) {
        while let Some(event) = self.outbox.front() {
            if let Err(e) = self.tx.send(event.clone()).await {
                tracing::warn!("Failed to send event to surface: {}", e);
            }
            self.outbox.pop_front();
        }
    }
}

impl<E: AnswerEndpoint> Drop for ChatSession<E> {
    fn drop(&mut self) {
        self.torn_down = true;
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.task.abort();
        }
        if let Some(stream) = self.reveal.take() {
            stream.cancel();
        }
        self.scheduler.cancel();
    }
}

impl<E: AnswerEndpoint> std::fmt::Debug for ChatSession<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint.name())
            .field("state", &self.state)
            .field("messages", &self.transcript.len())
            .field("in_flight", &self.in_flight.is_some())
            .field("revealing", &self.reveal.is_some())
            .field("torn_down", &self.torn_down)
            .finish_non_exhaustive()
    }
}

fn task_lost() -> EndpointError {
    EndpointError::Unavailable("request task ended without a result".to_string())
}

async fn recv_settlement(in_flight: &mut Option<InFlight>) -> Settlement {
    match in_flight {
        Some(in_flight) => (&mut in_flight.receiver)
            .await
            .unwrap_or_else(|_| Err(task_lost())),
        None => std::future::pending().await,
    }
}

async fn next_frame(reveal: &mut Option<RevealStream>) -> Option<RevealFrame> {
    match reveal {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}
