pub mod hooks;
pub mod orchestrator;
pub mod state;

pub use hooks::{ErrorDisposition, SessionHooks, INTERRUPTION_MARKER};
pub use orchestrator::{
    SessionCommand, SessionHandle, SessionNotice, VoiceSession, VoiceSessionBuilder,
};
pub use state::SessionState;
