//! Session orchestrator
//!
//! Drives one participant's conversation: listen -> transcribe -> think
//! (dispatching tool calls) -> speak, with barge-in folding back into
//! history. One cooperative event loop per session; voice-activity signals,
//! model fragments, and synthesis frames are multiplexed onto it.

use crate::chat::{ChatHistory, ChatMessage};
use crate::config::{SessionConfig, ThinkingInterruptPolicy};
use crate::providers::{
    AudioFrame, AudioSegment, BindingEvent, LanguageModel, ModelFragment, Synthesizer,
    Transcriber, VadEvent, VoiceActivitySource,
};
use crate::session::hooks::{ErrorDisposition, SessionHooks};
use crate::session::state::SessionState;
use crate::tools::{ToolRegistry, TurnContext};
use crate::{NatterError, Result};
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Commands the host can send to a running session
#[derive(Debug, Clone)]
pub enum SessionCommand {
    /// Inject an utterance outside the normal turn cycle
    Say(String),

    /// End the session
    Shutdown,
}

/// Notifications emitted while the session runs
#[derive(Debug, Clone)]
pub enum SessionNotice {
    /// The state machine moved
    StateChanged(SessionState),

    /// A participant utterance was transcribed and appended to history
    UserTranscript(String),

    /// The agent finished (or was cut off during) a spoken reply; `text` is
    /// the finalized history content, marker included
    AgentUtterance { text: String, interrupted: bool },

    /// An error was surfaced to the session-error hooks
    Error(String),

    /// The session has ended
    Shutdown,
}

/// Handle for controlling a session from host code
pub struct SessionHandle {
    command_tx: mpsc::UnboundedSender<SessionCommand>,
    notice_rx: mpsc::UnboundedReceiver<SessionNotice>,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle").finish_non_exhaustive()
    }
}

impl SessionHandle {
    /// Queue an utterance to be spoken outside the normal turn cycle
    pub fn say(&self, text: impl Into<String>) -> Result<()> {
        self.command_tx
            .send(SessionCommand::Say(text.into()))
            .map_err(|e| NatterError::Channel(format!("failed to send say: {e}")))
    }

    /// Ask the session to shut down
    pub fn shutdown(&self) -> Result<()> {
        self.command_tx
            .send(SessionCommand::Shutdown)
            .map_err(|e| NatterError::Channel(format!("failed to send shutdown: {e}")))
    }

    /// Wait for the next session notice
    pub async fn next_notice(&mut self) -> Option<SessionNotice> {
        self.notice_rx.recv().await
    }

    /// Try to receive a notice without waiting
    pub fn try_recv_notice(&mut self) -> Option<SessionNotice> {
        self.notice_rx.try_recv().ok()
    }

    /// Get a cloneable command sender
    pub fn command_sender(&self) -> mpsc::UnboundedSender<SessionCommand> {
        self.command_tx.clone()
    }
}

/// Builder for a voice session
pub struct VoiceSessionBuilder {
    config: SessionConfig,
    registry: Option<Arc<ToolRegistry>>,
    hooks: SessionHooks,
    vad: Option<Box<dyn VoiceActivitySource>>,
    stt: Option<Arc<dyn Transcriber>>,
    llm: Option<Arc<dyn LanguageModel>>,
    tts: Option<Arc<dyn Synthesizer>>,
}

impl VoiceSessionBuilder {
    pub fn new() -> Self {
        Self {
            config: SessionConfig::default(),
            registry: None,
            hooks: SessionHooks::new(),
            vad: None,
            stt: None,
            llm: None,
            tts: None,
        }
    }

    /// Set the session configuration
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the tool registry (shareable across sessions)
    pub fn tools(mut self, registry: Arc<ToolRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the voice-activity source
    pub fn voice_activity(mut self, vad: impl VoiceActivitySource + 'static) -> Self {
        self.vad = Some(Box::new(vad));
        self
    }

    /// Set the transcription service
    pub fn transcriber(mut self, stt: impl Transcriber + 'static) -> Self {
        self.stt = Some(Arc::new(stt));
        self
    }

    /// Set the language-model service
    pub fn model(mut self, llm: impl LanguageModel + 'static) -> Self {
        self.llm = Some(Arc::new(llm));
        self
    }

    /// Set the synthesis service
    pub fn synthesizer(mut self, tts: impl Synthesizer + 'static) -> Self {
        self.tts = Some(Arc::new(tts));
        self
    }

    /// Register a round-complete hook
    pub fn on_round_complete<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&TurnContext) -> anyhow::Result<Option<String>> + Send + 'static,
    {
        self.hooks.on_round_complete(hook);
        self
    }

    /// Register an interrupted hook
    pub fn on_interrupted<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&[ChatMessage], &mut ChatMessage) + Send + 'static,
    {
        self.hooks.on_interrupted(hook);
        self
    }

    /// Register a session-error hook
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&NatterError) -> ErrorDisposition + Send + 'static,
    {
        self.hooks.on_error(hook);
        self
    }

    /// Build the session and its control handle
    pub fn build(self) -> Result<(VoiceSession, SessionHandle)> {
        let vad = self
            .vad
            .ok_or_else(|| NatterError::Config("no voice-activity source configured".into()))?;
        let stt = self
            .stt
            .ok_or_else(|| NatterError::Config("no transcriber configured".into()))?;
        let llm = self
            .llm
            .ok_or_else(|| NatterError::Config("no language model configured".into()))?;
        let tts = self
            .tts
            .ok_or_else(|| NatterError::Config("no synthesizer configured".into()))?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();

        let history = ChatHistory::new(
            self.config.system_prompt.clone(),
            self.config.max_history_messages,
        );

        let session = VoiceSession {
            config: self.config,
            registry: self.registry.unwrap_or_else(|| Arc::new(ToolRegistry::new())),
            hooks: self.hooks,
            history,
            state: SessionState::Idle,
            pending_utterance: None,
            vad,
            stt,
            llm,
            tts,
            command_rx,
            notice_tx,
        };
        let handle = SessionHandle {
            command_tx,
            notice_rx,
        };
        Ok((session, handle))
    }
}

impl Default for VoiceSessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// One participant's conversation, driven to completion by [`run`].
///
/// [`run`]: VoiceSession::run
pub struct VoiceSession {
    config: SessionConfig,
    registry: Arc<ToolRegistry>,
    hooks: SessionHooks,
    history: ChatHistory,
    state: SessionState,
    // utterance that completed while the agent held the floor
    pending_utterance: Option<AudioSegment>,
    vad: Box<dyn VoiceActivitySource>,
    stt: Arc<dyn Transcriber>,
    llm: Arc<dyn LanguageModel>,
    tts: Arc<dyn Synthesizer>,
    command_rx: mpsc::UnboundedReceiver<SessionCommand>,
    notice_tx: mpsc::UnboundedSender<SessionNotice>,
}

impl std::fmt::Debug for VoiceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceSession").finish_non_exhaustive()
    }
}

impl VoiceSession {
    /// Start with a builder
    pub fn builder() -> VoiceSessionBuilder {
        VoiceSessionBuilder::new()
    }

    /// Drive the session until the participant leaves, the host shuts it
    /// down, or a fatal provider error ends the conversation.
    pub async fn run(mut self, mut binding: mpsc::UnboundedReceiver<BindingEvent>) -> Result<()> {
        info!("voice session starting");
        let mut pending_say: VecDeque<String> = VecDeque::new();

        // Idle until a participant is bound to the session
        let participant = loop {
            enum Wake {
                Command(Option<SessionCommand>),
                Binding(Option<BindingEvent>),
            }
            let wake = tokio::select! {
                biased;
                cmd = self.command_rx.recv() => Wake::Command(cmd),
                ev = binding.recv() => Wake::Binding(ev),
            };
            match wake {
                Wake::Command(None) | Wake::Command(Some(SessionCommand::Shutdown)) => {
                    info!("session shut down before a participant joined");
                    let _ = self.notice_tx.send(SessionNotice::Shutdown);
                    return Ok(());
                }
                Wake::Command(Some(SessionCommand::Say(text))) => pending_say.push_back(text),
                Wake::Binding(Some(BindingEvent::ParticipantJoined { id })) => break id,
                Wake::Binding(Some(BindingEvent::ParticipantLeft { .. })) => {}
                Wake::Binding(None) => {
                    info!("session binding closed while idle");
                    let _ = self.notice_tx.send(SessionNotice::Shutdown);
                    return Ok(());
                }
            }
        };
        info!(participant = %participant, "participant joined");

        let result = self.converse(&mut binding, pending_say).await;
        let _ = self.notice_tx.send(SessionNotice::Shutdown);
        info!("voice session stopped");
        result
    }

    /// Greeting first, then the listen/think/speak cycle
    async fn converse(
        &mut self,
        binding: &mut mpsc::UnboundedReceiver<BindingEvent>,
        mut pending_say: VecDeque<String>,
    ) -> Result<()> {
        if let Some(greeting) = self.config.greeting.clone() {
            self.speak_episode(greeting).await?;
        }
        while let Some(text) = pending_say.pop_front() {
            self.speak_episode(text).await?;
        }
        self.set_state(SessionState::Listening);
        self.listen_loop(binding).await
    }

    async fn listen_loop(
        &mut self,
        binding: &mut mpsc::UnboundedReceiver<BindingEvent>,
    ) -> Result<()> {
        loop {
            // fold back an utterance that completed while the agent was
            // speaking, before waiting for anything new
            if let Some(segment) = self.pending_utterance.take() {
                self.handle_utterance(segment).await?;
                continue;
            }

            enum Wake {
                Command(Option<SessionCommand>),
                Binding(Option<BindingEvent>),
                Vad(Option<VadEvent>),
            }
            let wake = tokio::select! {
                biased;
                cmd = self.command_rx.recv() => Wake::Command(cmd),
                ev = binding.recv() => Wake::Binding(ev),
                ev = self.vad.next_event() => Wake::Vad(ev),
            };
            match wake {
                Wake::Command(None) | Wake::Command(Some(SessionCommand::Shutdown)) => {
                    info!("session shutdown requested");
                    return Ok(());
                }
                Wake::Command(Some(SessionCommand::Say(text))) => {
                    self.speak_episode(text).await?;
                }
                Wake::Binding(Some(BindingEvent::ParticipantLeft { id })) => {
                    info!(participant = %id, "participant left");
                    self.set_state(SessionState::Idle);
                    return Ok(());
                }
                Wake::Binding(Some(BindingEvent::ParticipantJoined { id })) => {
                    // single-participant sessions; extras are not bound
                    debug!(participant = %id, "ignoring extra participant");
                }
                Wake::Binding(None) => {
                    info!("session binding closed");
                    self.set_state(SessionState::Idle);
                    return Ok(());
                }
                Wake::Vad(None) => {
                    info!("voice activity stream ended");
                    self.set_state(SessionState::Idle);
                    return Ok(());
                }
                Wake::Vad(Some(VadEvent::SpeechStart)) => {
                    debug!("participant speaking");
                }
                Wake::Vad(Some(VadEvent::SpeechEnd(segment))) => {
                    self.handle_utterance(segment).await?;
                }
            }
        }
    }

    /// End-of-utterance: transcribe, append to history, run a model turn.
    /// Transcription failures are transient; the session stays listening.
    async fn handle_utterance(&mut self, segment: AudioSegment) -> Result<()> {
        if segment.is_empty() {
            debug!("discarding empty audio segment");
            return Ok(());
        }

        debug!(
            seconds = segment.duration_seconds(),
            "transcribing utterance"
        );
        let text = match self.stt.transcribe(segment).await {
            Ok(text) => text,
            Err(e) => return self.surface_failure(transcription_kind(e)),
        };
        let text = text.trim();
        if text.is_empty() {
            debug!("empty transcription, staying in listening");
            return Ok(());
        }

        info!(%text, "user utterance");
        self.history.push_user(text);
        let _ = self
            .notice_tx
            .send(SessionNotice::UserTranscript(text.to_string()));
        self.think_and_respond().await
    }

    /// One model turn: stream fragments, dispatch tool calls against the
    /// round's turn context, fire round-complete, then speak.
    async fn think_and_respond(&mut self) -> Result<()> {
        self.set_state(SessionState::Thinking);

        let tools = self.registry.list_tools();
        let prompt = self.history.prompt_messages();
        let mut stream = match self.llm.complete(&prompt, &tools).await {
            Ok(stream) => stream,
            Err(e) => return self.surface_failure(model_kind(e)),
        };

        let mut spoken = String::new();
        let mut turn_context: Option<TurnContext> = None;

        loop {
            let fragment = match self.config.thinking_interrupts {
                ThinkingInterruptPolicy::Ignore => stream.next().await,
                ThinkingInterruptPolicy::Abort => {
                    enum Wake {
                        Vad(Option<VadEvent>),
                        Fragment(Option<Result<ModelFragment>>),
                    }
                    let wake = tokio::select! {
                        biased;
                        ev = self.vad.next_event() => Wake::Vad(ev),
                        frag = stream.next() => Wake::Fragment(frag),
                    };
                    match wake {
                        Wake::Vad(Some(VadEvent::SpeechStart)) => {
                            info!("barge-in during model turn, aborting the round");
                            drop(stream);
                            self.set_state(SessionState::Listening);
                            return Ok(());
                        }
                        Wake::Vad(Some(VadEvent::SpeechEnd(segment))) => {
                            // speech that began before this round; keep it
                            self.pending_utterance = Some(segment);
                            continue;
                        }
                        Wake::Vad(None) => {
                            debug!("voice activity stream ended during model turn");
                            drop(stream);
                            self.set_state(SessionState::Listening);
                            return Ok(());
                        }
                        Wake::Fragment(fragment) => fragment,
                    }
                }
            };

            match fragment {
                None => break,
                Some(Err(e)) => {
                    drop(stream);
                    return self.surface_failure(model_kind(e));
                }
                Some(Ok(ModelFragment::Text(text))) => spoken.push_str(&text),
                Some(Ok(ModelFragment::ToolCall { name, arguments })) => {
                    // the round's context is created lazily on the first call
                    let context = turn_context.get_or_insert_with(TurnContext::new).clone();
                    if let Err(e) = self.registry.dispatch(&name, &arguments, &context).await {
                        // a bad call must not crash the session; all tool
                        // error kinds are recoverable
                        warn!(tool = %name, %arguments, "tool call failed");
                        drop(stream);
                        return self.surface_failure(e);
                    }
                }
            }
        }
        drop(stream);

        // Round complete: hand the context to the host, run any requested
        // summarization before the next utterance can be appended
        if let Some(context) = turn_context.take() {
            debug!(round = ?context.snapshot(), "tool round complete");
            let prompts = self.hooks.fire_round_complete(&context);
            for prompt in prompts {
                match self.run_followup(&prompt).await {
                    Ok(summary) => {
                        let summary = summary.trim();
                        if !summary.is_empty() {
                            if !spoken.is_empty() {
                                spoken.push(' ');
                            }
                            spoken.push_str(summary);
                        }
                    }
                    Err(e) => return self.surface_failure(e),
                }
            }
        }

        if spoken.trim().is_empty() {
            debug!("round produced nothing to speak");
            self.set_state(SessionState::Listening);
            return Ok(());
        }
        self.speak_episode(spoken).await
    }

    /// Summarization follow-up: run a tool-less completion against the
    /// history plus the given system prompt, return the produced text. The
    /// prompt only lands in history once the completion has succeeded, so a
    /// failed follow-up leaves nothing dangling for later turns.
    async fn run_followup(&mut self, prompt: &str) -> Result<String> {
        let mut messages = self.history.prompt_messages();
        messages.push(ChatMessage::system(prompt));
        let mut stream = self.llm.complete(&messages, &[]).await.map_err(model_kind)?;

        let mut text = String::new();
        while let Some(fragment) = stream.next().await {
            match fragment.map_err(model_kind)? {
                ModelFragment::Text(t) => text.push_str(&t),
                ModelFragment::ToolCall { name, .. } => {
                    warn!(tool = %name, "ignoring tool call in summarization turn");
                }
            }
        }
        self.history.push_system(prompt);
        Ok(text)
    }

    /// One speaking episode: the assistant message lands in history before
    /// synthesis begins, the frame stream is raced against voice activity,
    /// and a barge-in amends the message before it is final.
    async fn speak_episode(&mut self, text: String) -> Result<()> {
        self.set_state(SessionState::Speaking);
        self.history.push_assistant(&text);

        let mut frames = match self.tts.synthesize(&text).await {
            Ok(frames) => frames,
            Err(e) => return self.surface_failure(synthesis_kind(e)),
        };

        let mut frames_played = 0usize;
        let mut interrupted = false;
        let mut failure: Option<NatterError> = None;
        loop {
            enum Wake {
                Vad(Option<VadEvent>),
                Frame(Option<Result<AudioFrame>>),
            }
            // interruption beats a simultaneously arriving final frame
            let wake = tokio::select! {
                biased;
                ev = self.vad.next_event() => Wake::Vad(ev),
                frame = frames.next() => Wake::Frame(frame),
            };
            match wake {
                Wake::Vad(Some(VadEvent::SpeechStart)) => {
                    info!(frames_played, "barge-in detected, yielding the floor");
                    // amend the in-flight message before it becomes final
                    if let Some((context, message)) = self.history.last_assistant_context_mut() {
                        self.hooks.fire_interrupted(context, message);
                    }
                    self.set_state(SessionState::Interrupted);
                    interrupted = true;
                    break;
                }
                Wake::Vad(Some(VadEvent::SpeechEnd(segment))) => {
                    // tail of an utterance that began before this episode;
                    // keep it so the transcript is not lost
                    debug!("stashing utterance that finished while speaking");
                    self.pending_utterance = Some(segment);
                }
                Wake::Vad(None) => {
                    debug!("voice activity stream ended while speaking");
                    break;
                }
                Wake::Frame(Some(Ok(_frame))) => frames_played += 1,
                Wake::Frame(Some(Err(e))) => {
                    failure = Some(synthesis_kind(e));
                    break;
                }
                Wake::Frame(None) => break,
            }
        }
        // dropping the stream cancels any remaining synthesis and playback
        drop(frames);

        if let Some(error) = failure {
            return self.surface_failure(error);
        }

        debug!(frames_played, interrupted, "speaking episode finished");
        let final_text = self
            .history
            .last_assistant()
            .map(|m| m.content.clone())
            .unwrap_or(text);
        let _ = self.notice_tx.send(SessionNotice::AgentUtterance {
            text: final_text,
            interrupted,
        });
        self.set_state(SessionState::Listening);
        Ok(())
    }

    /// Route a failure through the session-error hooks. A recoverable kind
    /// or a `Resume` disposition returns the session to listening; anything
    /// else ends the conversation.
    fn surface_failure(&mut self, error: NatterError) -> Result<()> {
        let _ = self.notice_tx.send(SessionNotice::Error(error.to_string()));
        let disposition = self.hooks.fire_error(&error);
        if error.is_recoverable() || disposition == ErrorDisposition::Resume {
            warn!("{error}, returning to listening");
            self.set_state(SessionState::Listening);
            Ok(())
        } else {
            error!("{error}");
            Err(error)
        }
    }

    fn set_state(&mut self, next: SessionState) {
        if self.state == next {
            return;
        }
        debug_assert!(
            self.state.can_transition(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        debug!(from = %self.state, to = %next, "state transition");
        self.state = next;
        let _ = self.notice_tx.send(SessionNotice::StateChanged(next));
    }
}

fn transcription_kind(error: NatterError) -> NatterError {
    match error {
        e @ NatterError::Transcription(_) => e,
        other => NatterError::Transcription(other.to_string()),
    }
}

fn model_kind(error: NatterError) -> NatterError {
    match error {
        e @ NatterError::Model(_) => e,
        other => NatterError::Model(other.to_string()),
    }
}

fn synthesis_kind(error: NatterError) -> NatterError {
    match error {
        e @ NatterError::Synthesis(_) => e,
        other => NatterError::Synthesis(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::stream::BoxStream;

    struct SilentVad;

    #[async_trait]
    impl VoiceActivitySource for SilentVad {
        async fn next_event(&mut self) -> Option<VadEvent> {
            std::future::pending().await
        }
    }

    struct NoopStt;

    #[async_trait]
    impl Transcriber for NoopStt {
        async fn transcribe(&self, _segment: AudioSegment) -> Result<String> {
            Ok(String::new())
        }
    }

    struct NoopModel;

    #[async_trait]
    impl LanguageModel for NoopModel {
        async fn complete(
            &self,
            _messages: &[crate::chat::ChatMessage],
            _tools: &[serde_json::Value],
        ) -> Result<BoxStream<'static, Result<ModelFragment>>> {
            Ok(futures::stream::empty().boxed())
        }
    }

    struct NoopTts;

    #[async_trait]
    impl Synthesizer for NoopTts {
        async fn synthesize(&self, _text: &str) -> Result<BoxStream<'static, Result<AudioFrame>>> {
            Ok(futures::stream::empty().boxed())
        }
    }

    fn full_builder() -> VoiceSessionBuilder {
        VoiceSession::builder()
            .voice_activity(SilentVad)
            .transcriber(NoopStt)
            .model(NoopModel)
            .synthesizer(NoopTts)
    }

    #[test]
    fn test_builder_requires_providers() {
        let err = VoiceSession::builder().build().unwrap_err();
        assert!(matches!(err, NatterError::Config(_)));
    }

    #[test]
    fn test_builder_with_all_providers() {
        assert!(full_builder().build().is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_before_join() {
        let (session, handle) = full_builder().build().unwrap();
        let (_binding_tx, binding_rx) = mpsc::unbounded_channel();

        handle.shutdown().unwrap();
        session.run(binding_rx).await.unwrap();
    }

    #[tokio::test]
    async fn test_binding_closed_ends_session() {
        let (session, _handle) = full_builder().build().unwrap();
        let (binding_tx, binding_rx) = mpsc::unbounded_channel();
        drop(binding_tx);

        session.run(binding_rx).await.unwrap();
    }
}
