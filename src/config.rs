//! Session configuration
//!
//! Centralized knobs for one voice session: prompts, greeting, history
//! bounds, and the barge-in policy while the model is still deliberating.

/// What to do when the participant starts speaking while the model is
/// still producing its turn (tool calls possibly pending).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ThinkingInterruptPolicy {
    /// Let the model turn complete silently
    #[default]
    Ignore,

    /// Drop the in-flight model stream and return to listening
    Abort,
}

/// Configuration for a voice session
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// System prompt prepended to every model request
    pub system_prompt: String,

    /// Utterance spoken once the participant joins, if any
    pub greeting: Option<String>,

    /// Barge-in handling while the model turn is in flight
    pub thinking_interrupts: ThinkingInterruptPolicy,

    /// Maximum number of history messages to keep
    pub max_history_messages: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            system_prompt: "You are a helpful voice assistant. Keep replies short and \
                            spoken-friendly."
                .to_string(),
            greeting: None,
            thinking_interrupts: ThinkingInterruptPolicy::default(),
            max_history_messages: 100,
        }
    }
}

impl SessionConfig {
    /// Set the system prompt
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Set the greeting spoken on participant join
    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = Some(greeting.into());
        self
    }

    /// Set the barge-in policy for the thinking phase
    pub fn with_thinking_interrupts(mut self, policy: ThinkingInterruptPolicy) -> Self {
        self.thinking_interrupts = policy;
        self
    }

    /// Set the history cap
    pub fn with_max_history(mut self, max: usize) -> Self {
        self.max_history_messages = max;
        self
    }
}
