//! Session runtime: one context object owning the command pipeline, both
//! speech channels, the confirmation flow, the draft slot, and the message
//! log.
//!
//! All I/O happens on worker threads that deliver over channels; the host
//! calls [`Session::poll`] from its loop and reacts to the returned signals.
//! Mutual exclusion between the two speech channels and the dispatcher is
//! carried by the [`InputAuthority`] token rather than a lock.

pub mod confirm;
pub mod draft;
pub mod history;
pub mod voice;

mod dispatch;
mod render;

use crate::backend::{CommandBackend, DraftDetails};
use crate::config::AppConfig;
use crate::protocol::{ActionKind, CommandOutcome, CommandReply, CommandRequest, DraftPayload};
use crate::speech::{CaptureEvent, SharedRecognizer, SpeechError, SpeechSynthesizer};
use crate::{log_debug, log_debug_content};
use std::sync::Arc;

use confirm::{
    classify_response, ConfirmationChannel, ConfirmationDecision, ConfirmationFlow,
    ConfirmationPhase, RepromptDisposition, TYPED_FALLBACK_MESSAGE,
};
use dispatch::{should_speak, spawn_dispatch, DispatchJob, DispatchKind, DispatchRequest};
use draft::{Draft, DraftStore};
use history::{Category, Message, MessageContent, MessageLog, MessageSender};
use voice::VoiceChannel;

const BUSY_MESSAGE: &str = "Still working on the previous command. One moment.";
const CONFIRMATION_GATE_MESSAGE: &str =
    "Please answer the pending confirmation first: yes or no.";
const CANCELLED_MESSAGE: &str = "Okay, cancelled. Nothing was changed.";
const CONFIRM_TYPED_HINT: &str = "Type yes to confirm or no to cancel.";
const STOPPING_MESSAGE: &str = "Voice capture is still stopping. Try again in a moment.";
const ALREADY_EXECUTING_MESSAGE: &str = "That action is already being carried out.";

/// Who currently owns the input path. Acquired before acting, released on
/// completion; the two speech channels and the dispatcher are mutually
/// exclusive through this token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAuthority {
    Idle,
    MainCapture,
    ConfirmationCapture,
    Dispatching,
}

/// Host-facing notifications drained from [`Session::poll`].
#[derive(Debug, Clone)]
pub enum SessionSignal {
    /// A message was appended to the log, in arrival order.
    MessageAppended(Message),
    /// Live partial transcript from the main speech channel.
    InterimTranscript(String),
    /// The host should run its interactive draft-details flow.
    CollectDraftDetails,
    /// The host should run its recipient-collection flow.
    CollectRecipients,
    /// The assistant asked to end the session.
    ExitRequested,
}

/// The session-scoped engine context. One per conversation; no globals.
pub struct Session {
    config: AppConfig,
    backend: Arc<dyn CommandBackend>,
    synthesizer: Option<Box<dyn SpeechSynthesizer>>,
    voice: VoiceChannel,
    confirmation_channel: ConfirmationChannel,
    confirmation: ConfirmationFlow,
    drafts: DraftStore,
    log: MessageLog,
    authority: InputAuthority,
    in_flight: Option<DispatchJob>,
    signals: Vec<SessionSignal>,
}

impl Session {
    #[must_use]
    pub fn new(config: AppConfig, backend: Arc<dyn CommandBackend>) -> Self {
        let category = Category::parse(&config.category).unwrap_or(Category::All);
        let lang = config.lang.clone();
        let max_reprompts = config.max_reprompts;
        Self {
            config,
            backend,
            synthesizer: None,
            voice: VoiceChannel::new(lang),
            confirmation_channel: ConfirmationChannel::new(),
            confirmation: ConfirmationFlow::new(max_reprompts),
            drafts: DraftStore::new(),
            log: MessageLog::new(category),
            authority: InputAuthority::Idle,
            in_flight: None,
            signals: Vec::new(),
        }
    }

    /// Install the host speech-to-text capability; shared by both channels.
    pub fn set_recognizer(&mut self, recognizer: SharedRecognizer) {
        self.voice.set_recognizer(recognizer);
    }

    /// Install the host text-to-speech capability.
    pub fn set_synthesizer(&mut self, synthesizer: Box<dyn SpeechSynthesizer>) {
        self.synthesizer = Some(synthesizer);
    }

    // ------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------

    #[must_use]
    pub fn history(&self) -> &MessageLog {
        &self.log
    }

    #[must_use]
    pub fn current_draft(&self) -> Option<&Draft> {
        self.drafts.current()
    }

    #[must_use]
    pub fn input_authority(&self) -> InputAuthority {
        self.authority
    }

    #[must_use]
    pub fn confirmation_pending(&self) -> bool {
        self.confirmation.is_active()
    }

    /// True when nothing is in flight and no channel is listening.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.in_flight.is_none()
            && !self.voice.is_listening()
            && !self.confirmation_channel.is_listening()
    }

    /// Switch the live message filter; derivation never reruns.
    pub fn set_active_category(&mut self, category: Category) {
        self.log.set_active_category(category);
    }

    // ------------------------------------------------------------------
    // Input paths
    // ------------------------------------------------------------------

    /// Submit typed input. While a confirmation is pending this is routed to
    /// the confirmation flow, never dispatched as a new top-level command.
    pub fn submit_text(&mut self, text: &str) {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }
        if self.confirmation.is_active() {
            self.append(
                MessageSender::User,
                MessageContent::Text(trimmed.to_string()),
            );
            self.handle_confirmation_response(trimmed, ResponseSource::Typed);
            return;
        }
        if self.in_flight.is_some() {
            self.append(
                MessageSender::System,
                MessageContent::Text(BUSY_MESSAGE.to_string()),
            );
            return;
        }
        self.append(
            MessageSender::User,
            MessageContent::Text(trimmed.to_string()),
        );
        self.start_dispatch(DispatchRequest::Command(CommandRequest::plain(trimmed)));
    }

    /// Start the main speech channel. Always false (with an instruction)
    /// while a confirmation is pending; the pending confirmation is the sole
    /// input gate.
    pub fn start_voice(&mut self) -> bool {
        if self.confirmation.is_active() {
            self.append(
                MessageSender::System,
                MessageContent::Text(CONFIRMATION_GATE_MESSAGE.to_string()),
            );
            return false;
        }
        if self.in_flight.is_some() {
            self.append(
                MessageSender::System,
                MessageContent::Text(BUSY_MESSAGE.to_string()),
            );
            return false;
        }
        if !self.voice.has_recognizer() {
            self.append(
                MessageSender::System,
                MessageContent::Text(SpeechError::Unavailable.user_message()),
            );
            return false;
        }
        if self.voice.is_stopping() {
            self.append(
                MessageSender::System,
                MessageContent::Text(STOPPING_MESSAGE.to_string()),
            );
            return false;
        }
        if self.voice.start() {
            self.authority = InputAuthority::MainCapture;
            true
        } else {
            false
        }
    }

    /// Abort the main speech channel; an accumulated transcript is discarded.
    pub fn stop_voice(&mut self) {
        if self.voice.is_listening() {
            self.voice.stop();
            self.authority = InputAuthority::Idle;
        }
    }

    /// Alternate input path for out-of-band transcription events; gated and
    /// routed exactly like typed input.
    pub fn push_remote_transcription(&mut self, text: &str) {
        log_debug_content(&format!("remote transcription: {text}"));
        self.submit_text(text);
    }

    /// Surface an out-of-band transcription-channel error inline.
    pub fn push_remote_error(&mut self, message: &str) {
        self.append(
            MessageSender::System,
            MessageContent::Text(format!("Voice channel error: {message}")),
        );
    }

    /// Submit the host-collected draft details (interactive flow).
    pub fn submit_draft_details(&mut self, details: DraftDetails) {
        if self.confirmation.is_active() {
            self.append(
                MessageSender::System,
                MessageContent::Text(CONFIRMATION_GATE_MESSAGE.to_string()),
            );
            return;
        }
        if self.in_flight.is_some() {
            self.append(
                MessageSender::System,
                MessageContent::Text(BUSY_MESSAGE.to_string()),
            );
            return;
        }
        self.start_dispatch(DispatchRequest::Draft(details));
    }

    /// Attach recipients to the current draft and send it.
    pub fn submit_recipients(&mut self, recipients: Vec<String>) {
        if self.confirmation.is_active() {
            self.append(
                MessageSender::System,
                MessageContent::Text(CONFIRMATION_GATE_MESSAGE.to_string()),
            );
            return;
        }
        if self.in_flight.is_some() {
            self.append(
                MessageSender::System,
                MessageContent::Text(BUSY_MESSAGE.to_string()),
            );
            return;
        }
        if recipients.is_empty() {
            self.append(
                MessageSender::System,
                MessageContent::Text("Please provide at least one recipient address.".to_string()),
            );
            self.signals.push(SessionSignal::CollectRecipients);
            return;
        }
        self.start_dispatch(DispatchRequest::Recipients(recipients));
    }

    // ------------------------------------------------------------------
    // Event loop integration
    // ------------------------------------------------------------------

    /// Drain worker channels and return pending host signals. Message Log
    /// append order is completion order by construction of this drain.
    pub fn poll(&mut self) -> Vec<SessionSignal> {
        self.drain_voice();
        self.drain_confirmation_channel();
        self.drain_dispatch();
        std::mem::take(&mut self.signals)
    }

    fn drain_voice(&mut self) {
        while let Some(event) = self.voice.poll() {
            match event {
                CaptureEvent::Interim { text } => {
                    self.signals.push(SessionSignal::InterimTranscript(text));
                }
                CaptureEvent::Final { text } => {
                    self.authority = InputAuthority::Idle;
                    log_debug_content(&format!("voice transcript: {text}"));
                    self.append(MessageSender::User, MessageContent::Text(text.clone()));
                    self.start_dispatch(DispatchRequest::Command(CommandRequest::plain(text)));
                    break;
                }
                CaptureEvent::Empty => {
                    // Silent end with no speech: no submission, no message.
                    self.authority = InputAuthority::Idle;
                    break;
                }
                CaptureEvent::Error(err) => {
                    self.authority = InputAuthority::Idle;
                    self.append(
                        MessageSender::System,
                        MessageContent::Text(err.user_message()),
                    );
                    break;
                }
            }
        }
    }

    fn drain_confirmation_channel(&mut self) {
        let Some(event) = self.confirmation_channel.poll() else {
            return;
        };
        match event {
            CaptureEvent::Final { text } => {
                self.authority = InputAuthority::Idle;
                self.handle_confirmation_response(&text, ResponseSource::Voice);
            }
            CaptureEvent::Empty => {
                self.authority = InputAuthority::Idle;
                self.handle_confirmation_response("", ResponseSource::Voice);
            }
            CaptureEvent::Error(err) => {
                // No automatic voice retry; fall back to typed yes/no.
                self.authority = InputAuthority::Idle;
                self.append(
                    MessageSender::System,
                    MessageContent::Text(err.user_message()),
                );
                self.append(
                    MessageSender::System,
                    MessageContent::Text(CONFIRM_TYPED_HINT.to_string()),
                );
            }
            CaptureEvent::Interim { .. } => {}
        }
    }

    fn drain_dispatch(&mut self) {
        let reply = match self.in_flight.as_mut() {
            Some(job) => job.poll(),
            None => None,
        };
        let Some(reply) = reply else {
            return;
        };
        if let Some(job) = self.in_flight.take() {
            self.log.remove_placeholder(job.placeholder);
            self.authority = InputAuthority::Idle;
            self.handle_reply(job.kind, reply);
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn append(&mut self, sender: MessageSender, content: MessageContent) {
        let message = self.log.append(sender, content);
        self.signals.push(SessionSignal::MessageAppended(message));
    }

    fn start_dispatch(&mut self, request: DispatchRequest) {
        if self.in_flight.is_some() {
            self.append(
                MessageSender::System,
                MessageContent::Text(BUSY_MESSAGE.to_string()),
            );
            return;
        }
        let placeholder = self.log.insert_placeholder();
        let job = spawn_dispatch(self.backend.clone(), request, placeholder);
        self.authority = InputAuthority::Dispatching;
        self.in_flight = Some(job);
    }

    fn start_confirmation_listening(&mut self) {
        let recognizer = self.voice.recognizer().cloned();
        if self
            .confirmation_channel
            .start(recognizer.as_ref(), &self.config.lang)
        {
            self.authority = InputAuthority::ConfirmationCapture;
        } else {
            self.append(
                MessageSender::System,
                MessageContent::Text(CONFIRM_TYPED_HINT.to_string()),
            );
        }
    }

    fn handle_confirmation_response(&mut self, response: &str, source: ResponseSource) {
        if self.confirmation.phase() == ConfirmationPhase::Executing {
            self.append(
                MessageSender::System,
                MessageContent::Text(ALREADY_EXECUTING_MESSAGE.to_string()),
            );
            return;
        }
        if source == ResponseSource::Typed {
            // A typed response resolves this round; stop the voice listener.
            self.confirmation_channel.stop();
        }
        match classify_response(response) {
            ConfirmationDecision::Confirm => {
                if let Some((kind, data)) = self.confirmation.begin_execution() {
                    self.start_dispatch(DispatchRequest::Command(CommandRequest {
                        command: kind.confirm_command().to_string(),
                        confirmation_data: Some(data),
                    }));
                }
            }
            ConfirmationDecision::Cancel => {
                if self.confirmation.cancel() {
                    self.append(
                        MessageSender::Bot,
                        MessageContent::Text(CANCELLED_MESSAGE.to_string()),
                    );
                }
            }
            ConfirmationDecision::Unrecognized => match self.confirmation.note_unrecognized() {
                RepromptDisposition::ReArm { prompt } => {
                    self.append(
                        MessageSender::System,
                        MessageContent::Text(format!("Sorry, I didn't catch that. {prompt}")),
                    );
                    if source == ResponseSource::Voice {
                        self.start_confirmation_listening();
                    }
                }
                RepromptDisposition::TypedFallback => {
                    self.append(
                        MessageSender::System,
                        MessageContent::Text(TYPED_FALLBACK_MESSAGE.to_string()),
                    );
                }
                RepromptDisposition::Exhausted => {
                    self.append(
                        MessageSender::System,
                        MessageContent::Text(CONFIRM_TYPED_HINT.to_string()),
                    );
                }
            },
        }
    }

    fn handle_reply(&mut self, kind: DispatchKind, reply: CommandReply) {
        if kind == DispatchKind::ConfirmAction {
            // Cleared regardless of how the confirmed action itself went.
            self.confirmation.complete_execution();
        }
        let succeeded = reply.success;
        if succeeded {
            self.maybe_speak(&reply);
        }
        if kind == DispatchKind::Recipients && succeeded {
            // Server-side the sent draft is gone; mirror it.
            self.drafts.clear();
        }
        match reply.into_outcome() {
            CommandOutcome::Completed {
                action,
                message,
                data,
            } => {
                self.apply_draft_effects(action, data.as_ref());
                if action == Some(ActionKind::Exit) {
                    self.signals.push(SessionSignal::ExitRequested);
                }
                let content = render::render_completed(action, message.as_deref(), data.as_ref());
                self.append(MessageSender::Bot, content);
                self.maybe_hint_draft_affordance(action);
            }
            CommandOutcome::NeedsConfirmation { kind, prompt, data } => {
                self.append(MessageSender::Bot, MessageContent::Text(prompt.clone()));
                self.confirmation.arm(kind, prompt, data);
                self.start_confirmation_listening();
            }
            CommandOutcome::NeedsInteractiveDraft { message } => {
                self.append(MessageSender::Bot, MessageContent::Text(message));
                self.signals.push(SessionSignal::CollectDraftDetails);
            }
            CommandOutcome::NeedsRecipients { message } => {
                self.append(MessageSender::Bot, MessageContent::Text(message));
                self.signals.push(SessionSignal::CollectRecipients);
            }
            CommandOutcome::Failed { message } => {
                self.append(MessageSender::Bot, MessageContent::Text(message));
            }
        }
    }

    fn apply_draft_effects(&mut self, action: Option<ActionKind>, data: Option<&serde_json::Value>) {
        let Some(action) = action else {
            return;
        };
        if action.produces_draft() {
            let payload = data.and_then(|value| {
                serde_json::from_value::<DraftPayload>(value.clone()).ok()
            });
            if let Some(draft) = payload.as_ref().and_then(Draft::from_payload) {
                // Full replacement, never a merge.
                self.drafts.set(draft);
            }
            return;
        }
        if matches!(action, ActionKind::ClearDraft | ActionKind::SendDraft) {
            self.drafts.clear();
        }
    }

    fn maybe_hint_draft_affordance(&mut self, action: Option<ActionKind>) {
        if !action.is_some_and(ActionKind::produces_draft) {
            return;
        }
        let Some(draft) = self.drafts.current() else {
            return;
        };
        let hint = if draft.has_recipient() {
            "Say \"send draft\" to send it now."
        } else {
            "Add recipients with \"send draft to <address>\"."
        };
        self.append(
            MessageSender::System,
            MessageContent::Text(hint.to_string()),
        );
    }

    fn maybe_speak(&mut self, reply: &CommandReply) {
        if self.config.no_speak {
            return;
        }
        let Some(message) = reply.message.as_deref() else {
            return;
        };
        if !should_speak(message, reply.action) {
            return;
        }
        if let Some(synthesizer) = self.synthesizer.as_mut() {
            // Narration failures are deliberately silent.
            if let Err(err) = synthesizer.speak(message) {
                log_debug(&format!("speech synthesis failed (ignored): {err}"));
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResponseSource {
    Typed,
    Voice,
}
