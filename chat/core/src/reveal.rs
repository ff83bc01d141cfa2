//! Reveal Scheduler
//!
//! Paces the character-by-character "typing" reveal of one assistant message.
//!
//! A reveal is a lazy [`Stream`] of [`RevealFrame`]s: every prefix of the
//! message text from empty to complete, one per tick, then a single
//! `Complete` frame. Ticks come from `tokio::time::interval`, so the stream
//! does nothing until polled and stops as soon as it is cancelled or dropped.
//!
//! ```text
//! begin(msg "Hi")
//!   t=0     Prefix ""
//!   t=30ms  Prefix "H"
//!   t=60ms  Prefix "Hi"
//!           Complete
//! ```
//!
//! Only one reveal runs at a time. The scheduler refuses to start another
//! until the active one is finished or cancelled.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::stream::{self, Stream};
use thiserror::Error;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::messages::MessageId;
use crate::transcript::{Message, MessagePhase};

/// Reference typing speed
pub const DEFAULT_REVEAL_INTERVAL: Duration = Duration::from_millis(30);

/// One step of a reveal
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RevealFrame {
    /// A new visible prefix
    Prefix {
        /// Message being revealed
        message_id: MessageId,
        /// The visible prefix
        visible: String,
        /// Characters in `visible`
        shown: usize,
        /// Characters in the full text
        total: usize,
    },
    /// The full text has been shown
    Complete {
        /// Message that finished revealing
        message_id: MessageId,
    },
}

impl RevealFrame {
    /// The message this frame belongs to
    #[must_use]
    pub fn message_id(&self) -> &MessageId {
        match self {
            Self::Prefix { message_id, .. } | Self::Complete { message_id } => message_id,
        }
    }
}

/// Reveal scheduling errors
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RevealError {
    /// A reveal is already running
    #[error("reveal of {active} is still running")]
    AlreadyActive {
        /// The message being revealed
        active: MessageId,
    },
    /// The message has no final text to reveal, or was already revealed
    #[error("message {0} is not awaiting a reveal")]
    NotRevealing(MessageId),
}

/// The prefix of `text` holding its first `chars` characters
///
/// Surfaces can use this to rebuild reveal progress from the full text.
#[must_use]
pub fn visible_prefix(text: &str, chars: usize) -> &str {
    let end = text
        .char_indices()
        .nth(chars)
        .map_or(text.len(), |(idx, _)| idx);
    &text[..end]
}

struct RevealState {
    message_id: MessageId,
    text: String,
    total: usize,
    shown: usize,
    ticker: Option<Interval>,
    period: Duration,
    token: CancellationToken,
    completed: bool,
}

fn frames(state: RevealState) -> impl Stream<Item = RevealFrame> + Send {
    stream::unfold(state, |mut st| async move {
        if st.completed || st.token.is_cancelled() {
            return None;
        }

        if st.shown > st.total {
            st.completed = true;
            let frame = RevealFrame::Complete {
                message_id: st.message_id.clone(),
            };
            return Some((frame, st));
        }

        let period = st.period;
        let ticker = st.ticker.get_or_insert_with(|| {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        tokio::select! {
            biased;
            () = st.token.cancelled() => return None,
            _ = ticker.tick() => {}
        }

        let frame = RevealFrame::Prefix {
            message_id: st.message_id.clone(),
            visible: visible_prefix(&st.text, st.shown).to_string(),
            shown: st.shown,
            total: st.total,
        };
        st.shown += 1;
        Some((frame, st))
    })
}

/// A running reveal
///
/// Dropping the stream cancels it.
pub struct RevealStream {
    message_id: MessageId,
    token: CancellationToken,
    frames: Pin<Box<dyn Stream<Item = RevealFrame> + Send>>,
}

impl RevealStream {
    fn new(message: &Message, period: Duration, token: CancellationToken) -> Self {
        let state = RevealState {
            message_id: message.id.clone(),
            text: message.text.clone(),
            total: message.char_count(),
            shown: 0,
            ticker: None,
            period,
            token: token.clone(),
            completed: false,
        };

        Self {
            message_id: message.id.clone(),
            token,
            frames: Box::pin(frames(state)),
        }
    }

    /// The message being revealed
    #[must_use]
    pub fn message_id(&self) -> &MessageId {
        &self.message_id
    }

    /// Stop the reveal; no further frames are produced
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the reveal was cancelled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// A token that cancels this reveal from elsewhere
    #[must_use]
    pub fn cancel_handle(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Stream for RevealStream {
    type Item = RevealFrame;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.token.is_cancelled() {
            return Poll::Ready(None);
        }
        self.frames.as_mut().poll_next(cx)
    }
}

impl Drop for RevealStream {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl std::fmt::Debug for RevealStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevealStream")
            .field("message_id", &self.message_id)
            .field("cancelled", &self.token.is_cancelled())
            .finish_non_exhaustive()
    }
}

struct ActiveReveal {
    message_id: MessageId,
    token: CancellationToken,
}

/// Hands out reveals, one at a time
pub struct RevealScheduler {
    interval: Duration,
    active: Option<ActiveReveal>,
}

impl RevealScheduler {
    /// Create a scheduler with the given per-character interval
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            active: None,
        }
    }

    /// Per-character interval
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start revealing a message whose final text has just been set
    pub fn begin(&mut self, message: &Message) -> Result<RevealStream, RevealError> {
        if let Some(active) = self.active() {
            return Err(RevealError::AlreadyActive {
                active: active.clone(),
            });
        }
        if message.phase() != MessagePhase::Revealing {
            return Err(RevealError::NotRevealing(message.id.clone()));
        }

        let token = CancellationToken::new();
        self.active = Some(ActiveReveal {
            message_id: message.id.clone(),
            token: token.clone(),
        });

        tracing::debug!(
            message_id = %message.id,
            chars = message.char_count(),
            interval_ms = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX),
            "Reveal started"
        );

        Ok(RevealStream::new(message, self.interval, token))
    }

    /// Release the slot after a reveal completed
    ///
    /// Returns false if `id` was not the active reveal.
    pub fn finish(&mut self, id: &MessageId) -> bool {
        match &self.active {
            Some(active) if &active.message_id == id => {
                self.active = None;
                true
            }
            _ => false,
        }
    }

    /// Cancel the active reveal, if any
    pub fn cancel(&mut self) -> Option<MessageId> {
        let active = self.active.take()?;
        active.token.cancel();
        tracing::debug!(message_id = %active.message_id, "Reveal cancelled");
        Some(active.message_id)
    }

    /// The message currently being revealed
    #[must_use]
    pub fn active(&self) -> Option<&MessageId> {
        self.active
            .as_ref()
            .filter(|a| !a.token.is_cancelled())
            .map(|a| &a.message_id)
    }

    /// Whether a reveal is running
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active().is_some()
    }
}

impl Default for RevealScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_REVEAL_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::Transcript;
    use futures::StreamExt;
    use pretty_assertions::assert_eq;
    use tokio::time::Instant;

    fn revealing(text: &str) -> Message {
        let mut transcript = Transcript::new();
        let id = transcript.push_placeholder().unwrap();
        transcript
            .replace_placeholder(&id, text.to_string())
            .unwrap()
            .clone()
    }

    fn visible(frames: &[RevealFrame]) -> Vec<String> {
        frames
            .iter()
            .filter_map(|f| match f {
                RevealFrame::Prefix { visible, .. } => Some(visible.clone()),
                RevealFrame::Complete { .. } => None,
            })
            .collect()
    }

    #[test]
    fn test_visible_prefix() {
        assert_eq!(visible_prefix("pasta", 0), "");
        assert_eq!(visible_prefix("pasta", 3), "pas");
        assert_eq!(visible_prefix("pasta", 5), "pasta");
        assert_eq!(visible_prefix("pasta", 9), "pasta");
        assert_eq!(visible_prefix("jalapeño", 7), "jalapeñ");
    }

    #[tokio::test(start_paused = true)]
    async fn test_emits_every_prefix_then_completes() {
        let msg = revealing("pasta");
        let mut scheduler = RevealScheduler::default();
        let start = Instant::now();

        let frames: Vec<RevealFrame> = scheduler.begin(&msg).unwrap().collect().await;

        assert_eq!(frames.len(), 7);
        assert_eq!(
            visible(&frames),
            vec!["", "p", "pa", "pas", "past", "pasta"]
        );
        assert_eq!(
            frames.last(),
            Some(&RevealFrame::Complete {
                message_id: msg.id.clone()
            })
        );
        assert_eq!(start.elapsed(), DEFAULT_REVEAL_INTERVAL * 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_text_reveals_single_prefix() {
        let msg = revealing("");
        let mut scheduler = RevealScheduler::default();

        let frames: Vec<RevealFrame> = scheduler.begin(&msg).unwrap().collect().await;

        assert_eq!(visible(&frames), vec![""]);
        assert!(matches!(frames[1], RevealFrame::Complete { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_prefixes_respect_char_boundaries() {
        let msg = revealing("añejo");
        let mut scheduler = RevealScheduler::new(Duration::from_millis(5));

        let frames: Vec<RevealFrame> = scheduler.begin(&msg).unwrap().collect().await;

        assert_eq!(visible(&frames), vec!["", "a", "añ", "añe", "añej", "añejo"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_prefix_waits_one_interval() {
        let msg = revealing("ok");
        let mut scheduler = RevealScheduler::default();
        let mut stream = scheduler.begin(&msg).unwrap();

        // The empty prefix is immediate
        let first = stream.next().await.unwrap();
        assert!(matches!(first, RevealFrame::Prefix { shown: 0, .. }));

        // Nothing before the interval elapses
        let early = tokio::time::timeout(Duration::from_millis(29), stream.next()).await;
        assert!(early.is_err());

        let second = stream.next().await.unwrap();
        assert!(matches!(second, RevealFrame::Prefix { shown: 1, total: 2, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_emission() {
        let msg = revealing("a long answer");
        let mut scheduler = RevealScheduler::default();
        let mut stream = scheduler.begin(&msg).unwrap();

        assert!(stream.next().await.is_some());
        assert!(stream.next().await.is_some());

        let mut pending = tokio_test::task::spawn(stream.next());
        tokio_test::assert_pending!(pending.poll());
        drop(pending);

        assert_eq!(scheduler.cancel(), Some(msg.id.clone()));
        assert!(stream.is_cancelled());
        assert!(stream.next().await.is_none());
        assert!(stream.next().await.is_none());
        assert!(!scheduler.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_stream_cancels_it() {
        let msg = revealing("bye");
        let mut scheduler = RevealScheduler::default();
        let stream = scheduler.begin(&msg).unwrap();
        let handle = stream.cancel_handle();

        drop(stream);

        assert!(handle.is_cancelled());
        assert!(!scheduler.is_active());
    }

    #[tokio::test]
    async fn test_only_one_reveal_at_a_time() {
        let first = revealing("first");
        let second = revealing("second");
        let mut scheduler = RevealScheduler::default();

        let _stream = scheduler.begin(&first).unwrap();
        let err = scheduler.begin(&second).unwrap_err();
        assert_eq!(
            err,
            RevealError::AlreadyActive {
                active: first.id.clone()
            }
        );

        assert!(scheduler.finish(&first.id));
        assert!(scheduler.begin(&second).is_ok());
    }

    #[tokio::test]
    async fn test_refuses_placeholders_and_settled_messages() {
        let mut scheduler = RevealScheduler::default();

        let placeholder = Message::placeholder();
        assert_eq!(
            scheduler.begin(&placeholder).unwrap_err(),
            RevealError::NotRevealing(placeholder.id.clone())
        );

        let settled = Message::assistant("already shown");
        assert_eq!(
            scheduler.begin(&settled).unwrap_err(),
            RevealError::NotRevealing(settled.id.clone())
        );
        assert!(!scheduler.is_active());
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let scheduler = RevealScheduler::new(Duration::ZERO);
        assert_eq!(scheduler.interval(), Duration::from_millis(1));
    }
}
