pub mod chat;
pub mod config;
pub mod providers;
pub mod session;
pub mod tools;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum NatterError {
    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Synthesis error: {0}")]
    Synthesis(String),

    #[error("Tool `{0}` is already registered")]
    DuplicateTool(String),

    #[error("Unknown tool `{0}`")]
    UnknownTool(String),

    #[error("Invalid argument `{argument}` for tool `{tool}`: {reason}")]
    InvalidArgument {
        tool: String,
        argument: String,
        reason: String,
    },

    #[error("Tool `{tool}` failed: {reason}")]
    ToolFailed { tool: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Channel error: {0}")]
    Channel(String),
}

impl NatterError {
    /// Check if the session can keep going after this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Transient: the session re-enters listening and tries again
            NatterError::Transcription(_) => true,
            // Session-fatal unless a registered error hook intervenes
            NatterError::Model(_) => false,
            NatterError::Synthesis(_) => false,
            // A malformed call from the model must not bring down the session
            NatterError::UnknownTool(_) => true,
            NatterError::InvalidArgument { .. } => true,
            NatterError::ToolFailed { .. } => true,
            // Programmer errors surfaced at setup time
            NatterError::DuplicateTool(_) => false,
            NatterError::Config(_) => false,
            NatterError::Channel(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, NatterError>;
