//! Provider capability interfaces
//!
//! The orchestrator reaches every external engine through one of these
//! traits: voice activity, transcription, language model, synthesis, and the
//! session binding that announces participants. Implementations live with
//! the host; the core never sees a wire format.

use crate::chat::ChatMessage;
use crate::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// A captured segment of participant audio
#[derive(Debug, Clone, Default)]
pub struct AudioSegment {
    /// Mono samples
    pub samples: Vec<f32>,

    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioSegment {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn duration_seconds(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// One frame of synthesized audio, played out by the host
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Mono samples
    pub samples: Vec<f32>,

    /// Sample rate in Hz
    pub sample_rate: u32,
}

/// Signals from the voice-activity engine
#[derive(Debug, Clone)]
pub enum VadEvent {
    /// The participant started speaking
    SpeechStart,

    /// The participant finished an utterance; carries the captured audio
    SpeechEnd(AudioSegment),
}

/// One fragment of a streamed model response
#[derive(Debug, Clone)]
pub enum ModelFragment {
    /// Natural-language text
    Text(String),

    /// A structured tool-call request
    ToolCall {
        name: String,
        arguments: serde_json::Value,
    },
}

/// Participant lifecycle notifications from the session container
#[derive(Debug, Clone)]
pub enum BindingEvent {
    ParticipantJoined { id: String },
    ParticipantLeft { id: String },
}

/// Lazy, infinite, non-restartable sequence of speech-activity events for
/// one audio stream. `None` means the stream ended (participant audio gone)
/// and must keep being returned afterwards.
#[async_trait]
pub trait VoiceActivitySource: Send {
    async fn next_event(&mut self) -> Option<VadEvent>;
}

/// Speech-to-text over one captured segment
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, segment: AudioSegment) -> Result<String>;
}

/// Language-model completion over the conversation history plus the tool
/// schema, streamed as interleaved text and tool-call fragments
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[serde_json::Value],
    ) -> Result<BoxStream<'static, Result<ModelFragment>>>;
}

/// Text-to-speech. Dropping the returned stream cancels synthesis and
/// playback mid-way.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<BoxStream<'static, Result<AudioFrame>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_duration() {
        let segment = AudioSegment::new(vec![0.0; 16000], 16000);
        assert!((segment.duration_seconds() - 1.0).abs() < f32::EPSILON);
        assert!(!segment.is_empty());
    }

    #[test]
    fn test_empty_segment() {
        let segment = AudioSegment::default();
        assert!(segment.is_empty());
        assert_eq!(segment.duration_seconds(), 0.0);
    }
}
