pub mod history;

pub use history::{ChatHistory, ChatMessage, Role};
