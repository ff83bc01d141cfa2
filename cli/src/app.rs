//! Terminal Application
//!
//! Reads lines from the user, turns them into session calls or local
//! commands, and renders session events as they arrive. The request and the
//! reveal are driven from the same loop that reads input, so typing a new
//! question while an answer is still revealing fast-forwards it.

use std::io::Write;

use anyhow::Result;
use chat_core::{
    AnswerEndpoint, ChatSession, IgnoreReason, KeyValueStore, SessionEvent, SessionStore,
    SubmitOutcome,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

use crate::display::{DisplayState, RenderOp, Renderer};

/// Suggested prompts offered by `/prompts`
pub const SUGGESTED_PROMPTS: [&str; 4] = [
    "Today's Recipe Ideas",
    "Meal Planning Help",
    "Cooking Tips",
    "Ingredient Substitutions",
];

/// Hint shown under the welcome
pub const INPUT_HINT: &str = "How can RecipeAI help you cook today?";

const HELP_TEXT: &str = "\
Type a question and press Enter to ask RecipeAI.
  /new             start a new chat
  /signin <email>  remember who you are
  /signout         forget who you are
  /whoami          show who you are signed in as
  /prompts         list suggested prompts
  /prompt <n>      put suggested prompt n in the input, Enter sends it
  /help            show this help
  /quit            exit";

/// A parsed input line
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Ask a question
    Send(String),
    /// Submit whatever is already in the input buffer
    SubmitBuffer,
    /// Start over
    NewChat,
    /// Record an identity
    SignIn(String),
    /// Forget the identity
    SignOut,
    /// Show the current identity
    WhoAmI,
    /// List suggested prompts
    Prompts,
    /// Load suggested prompt `n` (1-based) into the input buffer
    UsePrompt(usize),
    /// Show help
    Help,
    /// Exit
    Quit,
    /// Unusable input, with the reason
    Invalid(String),
}

impl Command {
    /// Parse one line of user input
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Self::SubmitBuffer;
        }
        let Some(command) = trimmed.strip_prefix('/') else {
            return Self::Send(line.to_string());
        };

        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (command, ""),
        };

        match name {
            "new" => Self::NewChat,
            "signin" if arg.is_empty() => Self::Invalid("Usage: /signin <email>".to_string()),
            "signin" => Self::SignIn(arg.to_string()),
            "signout" => Self::SignOut,
            "whoami" => Self::WhoAmI,
            "prompts" => Self::Prompts,
            "prompt" => match arg.parse::<usize>() {
                Ok(n) if (1..=SUGGESTED_PROMPTS.len()).contains(&n) => Self::UsePrompt(n),
                _ => Self::Invalid(format!(
                    "Usage: /prompt <1-{}>",
                    SUGGESTED_PROMPTS.len()
                )),
            },
            "help" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => Self::Invalid(format!("Unknown command: /{other} (try /help)")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// The terminal chat application
pub struct App<E: AnswerEndpoint + 'static, S: KeyValueStore, W: Write> {
    session: ChatSession<E>,
    events: mpsc::Receiver<SessionEvent>,
    store: SessionStore<S>,
    display: DisplayState,
    renderer: Renderer<W>,
}

impl<E: AnswerEndpoint + 'static, S: KeyValueStore, W: Write> App<E, S, W> {
    /// Create the app around a session and the receiving end of its events
    pub fn new(
        session: ChatSession<E>,
        events: mpsc::Receiver<SessionEvent>,
        store: SessionStore<S>,
        out: W,
    ) -> Self {
        Self {
            session,
            events,
            store,
            display: DisplayState::new(),
            renderer: Renderer::new(out),
        }
    }

    /// The chat session
    pub fn session(&self) -> &ChatSession<E> {
        &self.session
    }

    /// The sign-in state store
    pub fn store(&self) -> &SessionStore<S> {
        &self.store
    }

    /// What is on screen
    pub fn display(&self) -> &DisplayState {
        &self.display
    }

    /// Everything written so far
    pub fn output(&self) -> &W {
        self.renderer.writer()
    }

    /// Run until `/quit` or end of input
    ///
    /// At end of input the outstanding answer, if any, is still received and
    /// revealed before returning.
    pub async fn run<R: AsyncBufRead + Unpin>(&mut self, input: R) -> Result<()> {
        self.show_welcome()?;

        let mut lines = input.lines();
        let mut input_open = true;

        loop {
            tokio::select! {
                line = lines.next_line(), if input_open => {
                    match line? {
                        Some(line) => {
                            if self.handle_line(&line).await? == Flow::Quit {
                                break;
                            }
                        }
                        None => {
                            tracing::debug!("Input closed");
                            input_open = false;
                        }
                    }
                }

                _ = self.session.next_activity(), if self.session.has_activity() => {}

                else => break,
            }
            self.render_pending()?;
        }

        self.render_pending()
    }

    /// Stop the session; late answers are discarded
    pub fn shutdown(&mut self) {
        self.session.teardown();
        tracing::debug!(session_id = %self.session.session_id(), "Session torn down");
    }

    async fn handle_line(&mut self, line: &str) -> Result<Flow> {
        match Command::parse(line) {
            Command::Send(text) => {
                let outcome = self.session.send(text).await;
                self.report(&outcome)?;
            }
            Command::SubmitBuffer => {
                let outcome = self.session.submit().await;
                self.report(&outcome)?;
            }
            Command::NewChat => {
                self.session.new_chat().await;
                self.render_pending()?;
                self.show_welcome()?;
            }
            Command::SignIn(identity) => match self.store.sign_in(&identity).await {
                Ok(()) => {
                    let notice = format!("Signed in as {}", self.store.display_name());
                    self.notice(notice)?;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Sign-in not saved");
                    self.notice(format!("Could not save sign-in: {e}"))?;
                }
            },
            Command::SignOut => match self.store.sign_out().await {
                Ok(()) => self.notice("Signed out")?,
                Err(e) => {
                    tracing::warn!(error = %e, "Sign-out not saved");
                    self.notice(format!("Could not save sign-out: {e}"))?;
                }
            },
            Command::WhoAmI => {
                let state = self.store.state();
                let notice = if state.signed_in {
                    format!(
                        "[{}] {} ({})",
                        self.store.avatar_initial(),
                        self.store.display_name(),
                        state.identity
                    )
                } else {
                    format!("[{}] Not signed in", self.store.avatar_initial())
                };
                self.notice(notice)?;
            }
            Command::Prompts => {
                let list = SUGGESTED_PROMPTS
                    .iter()
                    .enumerate()
                    .map(|(i, prompt)| format!("  {}. {prompt}", i + 1))
                    .collect::<Vec<_>>()
                    .join("\n");
                self.notice(format!("Suggested prompts:\n{list}"))?;
            }
            Command::UsePrompt(n) => {
                let prompt = SUGGESTED_PROMPTS[n - 1];
                self.session.use_prompt(prompt);
                self.notice(format!("Input: {prompt} (press Enter to send)"))?;
            }
            Command::Help => self.notice(HELP_TEXT)?,
            Command::Quit => return Ok(Flow::Quit),
            Command::Invalid(reason) => self.notice(reason)?,
        }
        Ok(Flow::Continue)
    }

    fn report(&mut self, outcome: &SubmitOutcome) -> Result<()> {
        match outcome {
            SubmitOutcome::Ignored(IgnoreReason::RequestInFlight) => {
                self.notice("RecipeAI is still answering, please wait.")
            }
            SubmitOutcome::Ignored(IgnoreReason::Unsettled) => {
                self.notice("The previous answer has not settled yet.")
            }
            SubmitOutcome::Accepted { .. }
            | SubmitOutcome::Ignored(IgnoreReason::EmptyInput | IgnoreReason::TornDown) => Ok(()),
        }
    }

    fn show_welcome(&mut self) -> Result<()> {
        if !self.session.transcript().is_empty() {
            return Ok(());
        }
        self.renderer
            .render(&RenderOp::Welcome(self.store.welcome()))?;
        self.renderer.render(&RenderOp::Status(format!(
            "{INPUT_HINT} (type /help for commands)"
        )))?;
        self.renderer.flush()?;
        Ok(())
    }

    fn notice(&mut self, text: impl Into<String>) -> Result<()> {
        self.render_pending()?;
        self.renderer.render(&RenderOp::Notice(text.into()))?;
        self.renderer.flush()?;
        Ok(())
    }

    fn render_pending(&mut self) -> Result<()> {
        while let Ok(event) = self.events.try_recv() {
            for op in self.display.apply(event) {
                self.renderer.render(&op)?;
            }
        }
        self.renderer.flush()?;
        Ok(())
    }
}
