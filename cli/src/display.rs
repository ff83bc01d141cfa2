//! Display State
//!
//! The terminal is a thin client: it renders what the session tells it to.
//! [`DisplayState`] folds [`SessionEvent`]s into its own copy of the
//! conversation and turns each event into zero or more [`RenderOp`]s, which
//! the [`Renderer`] writes to a line-oriented terminal.

use std::io::{self, Write};

use chat_core::{ControllerState, Message, MessageId, Sender, SessionEvent, Welcome};
use crossterm::{
    cursor::MoveTo,
    queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
    terminal::{Clear, ClearType},
};

/// Shown while a request is out
pub const THINKING_STATUS: &str = "RecipeAI is thinking...";

/// A conversation message as the terminal knows it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisplayMessage {
    /// Message ID
    pub id: MessageId,
    /// Who sent it
    pub sender: Sender,
    /// Text shown so far
    pub visible: String,
    /// Whether the reveal is still running (or the answer has not arrived)
    pub revealing: bool,
}

impl DisplayMessage {
    fn from_message(message: &Message) -> Self {
        let revealing = message.is_revealing();
        Self {
            id: message.id.clone(),
            sender: message.sender,
            visible: if revealing {
                String::new()
            } else {
                message.text.clone()
            },
            revealing,
        }
    }
}

/// One thing to draw
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderOp {
    /// Greeting for an empty transcript
    Welcome(Welcome),
    /// A complete message (user input)
    Message {
        /// Sender label source
        sender: Sender,
        /// Display time
        timestamp: String,
        /// Full text
        text: String,
    },
    /// Start of an answer whose text follows in `Append`s
    Header {
        /// Sender label source
        sender: Sender,
        /// Display time
        timestamp: String,
    },
    /// More characters of the answer being revealed
    Append(String),
    /// The revealed answer is complete
    EndLine,
    /// Transient status line
    Status(String),
    /// Local feedback that is not part of the conversation
    Notice(String),
    /// Wipe the screen for a new chat
    Clear,
}

/// Everything the terminal needs to render the conversation
#[derive(Debug, Default)]
pub struct DisplayState {
    /// Messages in transcript order
    pub messages: Vec<DisplayMessage>,
    /// Pending indicator
    pub pending: bool,
    /// Last reported lifecycle state
    pub state: ControllerState,
    /// Newest message, for scrolling
    pub scroll_target: Option<MessageId>,
}

impl DisplayState {
    /// Create an empty display state
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold an event into the display state
    pub fn apply(&mut self, event: SessionEvent) -> Vec<RenderOp> {
        match event {
            SessionEvent::MessageAppended { message } => {
                self.messages.push(DisplayMessage::from_message(&message));
                if message.is_placeholder() {
                    Vec::new()
                } else {
                    vec![RenderOp::Message {
                        sender: message.sender,
                        timestamp: message.timestamp,
                        text: message.text,
                    }]
                }
            }
            SessionEvent::MessageResolved { message } => {
                let resolved = DisplayMessage::from_message(&message);
                match self.messages.iter_mut().find(|m| m.id == message.id) {
                    Some(existing) => *existing = resolved,
                    None => self.messages.push(resolved),
                }
                vec![RenderOp::Header {
                    sender: message.sender,
                    timestamp: message.timestamp,
                }]
            }
            SessionEvent::RevealProgress {
                message_id,
                visible,
            } => {
                let Some(message) = self.messages.iter_mut().find(|m| m.id == message_id) else {
                    return Vec::new();
                };
                let delta = visible
                    .strip_prefix(message.visible.as_str())
                    .unwrap_or(visible.as_str())
                    .to_string();
                message.visible = visible;
                if delta.is_empty() {
                    Vec::new()
                } else {
                    vec![RenderOp::Append(delta)]
                }
            }
            SessionEvent::RevealComplete { message_id } => {
                if let Some(message) = self.messages.iter_mut().find(|m| m.id == message_id) {
                    message.revealing = false;
                }
                vec![RenderOp::EndLine]
            }
            SessionEvent::TranscriptCleared => {
                self.messages.clear();
                self.scroll_target = None;
                vec![RenderOp::Clear]
            }
            SessionEvent::ScrollToLatest { message_id } => {
                self.scroll_target = Some(message_id);
                Vec::new()
            }
            SessionEvent::Pending { active } => {
                let was_pending = self.pending;
                self.pending = active;
                if active && !was_pending {
                    vec![RenderOp::Status(THINKING_STATUS.to_string())]
                } else {
                    Vec::new()
                }
            }
            SessionEvent::State { state } => {
                self.state = state;
                Vec::new()
            }
        }
    }

    /// Whether any message is still being revealed
    pub fn is_revealing(&self) -> bool {
        self.messages.iter().any(|m| m.revealing)
    }
}

/// Writes render ops to a terminal
pub struct Renderer<W: Write> {
    out: W,
    /// An answer line is being revealed and has not been terminated yet
    line_open: bool,
}

impl<W: Write> Renderer<W> {
    /// Create a renderer writing to `out`
    pub fn new(out: W) -> Self {
        Self {
            out,
            line_open: false,
        }
    }

    /// The underlying writer
    pub fn writer(&self) -> &W {
        &self.out
    }

    /// Queue one op
    pub fn render(&mut self, op: &RenderOp) -> io::Result<()> {
        if self.line_open && !matches!(op, RenderOp::Append(_) | RenderOp::EndLine) {
            queue!(self.out, Print("\n"))?;
            self.line_open = false;
        }

        match op {
            RenderOp::Welcome(welcome) => {
                queue!(
                    self.out,
                    SetAttribute(Attribute::Bold),
                    Print(&welcome.greeting),
                    SetAttribute(Attribute::Reset),
                    Print("\n"),
                    Print(&welcome.prompt),
                    Print("\n"),
                )?;
                if let Some(tip) = &welcome.tip {
                    queue!(
                        self.out,
                        SetForegroundColor(Color::DarkGrey),
                        Print(tip),
                        ResetColor,
                        Print("\n"),
                    )?;
                }
            }
            RenderOp::Message {
                sender,
                timestamp,
                text,
            } => {
                self.header(*sender, timestamp)?;
                queue!(self.out, Print(text), Print("\n"))?;
            }
            RenderOp::Header { sender, timestamp } => {
                self.header(*sender, timestamp)?;
                self.line_open = true;
            }
            RenderOp::Append(text) => {
                queue!(self.out, Print(text))?;
                self.line_open = true;
            }
            RenderOp::EndLine => {
                if self.line_open {
                    queue!(self.out, Print("\n"))?;
                    self.line_open = false;
                }
            }
            RenderOp::Status(status) => {
                queue!(
                    self.out,
                    SetForegroundColor(Color::DarkGrey),
                    SetAttribute(Attribute::Italic),
                    Print(status),
                    SetAttribute(Attribute::Reset),
                    ResetColor,
                    Print("\n"),
                )?;
            }
            RenderOp::Notice(notice) => {
                queue!(
                    self.out,
                    SetForegroundColor(Color::Yellow),
                    Print(notice),
                    ResetColor,
                    Print("\n"),
                )?;
            }
            RenderOp::Clear => {
                queue!(self.out, Clear(ClearType::All), MoveTo(0, 0))?;
            }
        }
        Ok(())
    }

    /// Flush queued output
    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    fn header(&mut self, sender: Sender, timestamp: &str) -> io::Result<()> {
        let color = match sender {
            Sender::User => Color::Cyan,
            Sender::Assistant => Color::Green,
        };
        queue!(
            self.out,
            SetForegroundColor(color),
            SetAttribute(Attribute::Bold),
            Print(sender.label()),
            SetAttribute(Attribute::Reset),
            SetForegroundColor(Color::DarkGrey),
            Print(format!(" {timestamp}")),
            ResetColor,
            Print("\n"),
        )
    }
}
