//! Session state machine
//!
//! States and the transition table the orchestrator enforces. Every state
//! change goes through one place so an illegal transition cannot slip in.

/// Who holds the floor right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for a participant to be bound to the session
    Idle,

    /// Monitoring voice activity for the next utterance
    Listening,

    /// A model turn is in flight (tool calls possibly pending)
    Thinking,

    /// The agent's reply is being synthesized and played out
    Speaking,

    /// A barge-in landed mid-speech; the floor is being yielded
    Interrupted,
}

impl SessionState {
    /// Whether moving from `self` to `next` is a legal transition
    pub fn can_transition(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Listening)
                | (Idle, Speaking)
                | (Listening, Thinking)
                | (Listening, Speaking)
                | (Listening, Idle)
                | (Thinking, Speaking)
                | (Thinking, Listening)
                | (Speaking, Interrupted)
                | (Speaking, Listening)
                | (Speaking, Idle)
                | (Interrupted, Listening)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Listening => "listening",
            SessionState::Thinking => "thinking",
            SessionState::Speaking => "speaking",
            SessionState::Interrupted => "interrupted",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::SessionState::*;

    #[test]
    fn test_normal_turn_cycle() {
        assert!(Idle.can_transition(Listening));
        assert!(Listening.can_transition(Thinking));
        assert!(Thinking.can_transition(Speaking));
        assert!(Speaking.can_transition(Listening));
    }

    #[test]
    fn test_interruption_path() {
        assert!(Speaking.can_transition(Interrupted));
        assert!(Interrupted.can_transition(Listening));
        // The interruption never jumps straight back into speech
        assert!(!Interrupted.can_transition(Speaking));
        assert!(!Interrupted.can_transition(Thinking));
    }

    #[test]
    fn test_silent_round_goes_back_to_listening() {
        assert!(Thinking.can_transition(Listening));
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!Idle.can_transition(Thinking));
        assert!(!Listening.can_transition(Interrupted));
        assert!(!Thinking.can_transition(Interrupted));
        assert!(!Speaking.can_transition(Thinking));
    }
}
