//! Session lifecycle hooks
//!
//! Explicit listener registry for the three host-facing events:
//! `round-complete`, `interrupted`, and `session-error`. Each listener is a
//! plain callable receiving a typed payload.

use crate::chat::ChatMessage;
use crate::tools::TurnContext;
use crate::NatterError;
use tracing::warn;

/// Marker appended to an utterance that was cut off mid-speech
pub const INTERRUPTION_MARKER: &str = "... (user interrupted you)";

/// What the session should do after an error hook has seen a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorDisposition {
    /// End the session for this participant
    #[default]
    Fatal,

    /// Swallow the failure and return to listening
    Resume,
}

/// Fired when a tool-calling round finishes; may request a follow-up
/// summarization by returning a system prompt built from the context.
pub type RoundCompleteHook =
    Box<dyn FnMut(&TurnContext) -> anyhow::Result<Option<String>> + Send>;

/// Fired at most once per speaking episode when a barge-in lands; receives
/// the conversation messages the reply was generated from and the in-flight
/// history message, before it is finalized.
pub type InterruptedHook = Box<dyn FnMut(&[ChatMessage], &mut ChatMessage) + Send>;

/// Fired on any surfaced session error; the disposition decides whether the
/// session survives a model or synthesis failure.
pub type ErrorHook = Box<dyn FnMut(&NatterError) -> ErrorDisposition + Send>;

/// Ready-made interrupted hook appending [`INTERRUPTION_MARKER`]
pub fn append_interruption_marker(_context: &[ChatMessage], message: &mut ChatMessage) {
    message.content.push_str(INTERRUPTION_MARKER);
}

/// Listener registry for one session
#[derive(Default)]
pub struct SessionHooks {
    round_complete: Vec<RoundCompleteHook>,
    interrupted: Vec<InterruptedHook>,
    error: Vec<ErrorHook>,
}

impl SessionHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a round-complete listener
    pub fn on_round_complete<F>(&mut self, hook: F)
    where
        F: FnMut(&TurnContext) -> anyhow::Result<Option<String>> + Send + 'static,
    {
        self.round_complete.push(Box::new(hook));
    }

    /// Register an interrupted listener
    pub fn on_interrupted<F>(&mut self, hook: F)
    where
        F: FnMut(&[ChatMessage], &mut ChatMessage) + Send + 'static,
    {
        self.interrupted.push(Box::new(hook));
    }

    /// Register a session-error listener
    pub fn on_error<F>(&mut self, hook: F)
    where
        F: FnMut(&NatterError) -> ErrorDisposition + Send + 'static,
    {
        self.error.push(Box::new(hook));
    }

    /// Run the round-complete listeners; collects every requested follow-up
    /// prompt. A listener failure is the host's bug, logged and skipped.
    pub fn fire_round_complete(&mut self, context: &TurnContext) -> Vec<String> {
        let mut prompts = Vec::new();
        for hook in &mut self.round_complete {
            match hook(context) {
                Ok(Some(prompt)) => prompts.push(prompt),
                Ok(None) => {}
                Err(e) => warn!("round-complete hook failed: {e:#}"),
            }
        }
        prompts
    }

    /// Run the interrupted listeners over the in-flight message and its
    /// originating conversation context
    pub fn fire_interrupted(&mut self, context: &[ChatMessage], message: &mut ChatMessage) {
        for hook in &mut self.interrupted {
            hook(context, message);
        }
    }

    /// Run the error listeners. Any listener opting to resume wins; with no
    /// listeners the error keeps its default fatality.
    pub fn fire_error(&mut self, error: &NatterError) -> ErrorDisposition {
        let mut disposition = ErrorDisposition::Fatal;
        for hook in &mut self.error {
            if hook(error) == ErrorDisposition::Resume {
                disposition = ErrorDisposition::Resume;
            }
        }
        disposition
    }

    /// Whether any error listener is registered
    pub fn has_error_hooks(&self) -> bool {
        !self.error.is_empty()
    }
}
