//! Confirmation flow for destructive actions: state machine, lexicons, and
//! the restricted yes/no voice listener.

use crate::protocol::ConfirmationKind;
use crate::speech::{CaptureEvent, SharedRecognizer};
use serde_json::Value;

use super::voice::{spawn_capture_job, CaptureJob};

// Matched as substrings of the normalized utterance, affirmative first,
// mirroring the original client's check order.
const AFFIRMATIVE_WORDS: &[&str] = &["yes", "yeah", "yep", "sure", "confirm"];
const NEGATIVE_WORDS: &[&str] = &["no", "nope", "cancel", "stop"];

/// Instruction issued when voice re-prompting is abandoned.
pub const TYPED_FALLBACK_MESSAGE: &str =
    "I didn't catch that. Please type yes to confirm or no to cancel.";

/// How a confirmation response was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationDecision {
    Confirm,
    Cancel,
    Unrecognized,
}

/// Classify a confirmation utterance or typed response.
#[must_use]
pub fn classify_response(utterance: &str) -> ConfirmationDecision {
    let normalized = utterance.trim().to_lowercase();
    if normalized.is_empty() {
        return ConfirmationDecision::Unrecognized;
    }
    if AFFIRMATIVE_WORDS.iter().any(|word| normalized.contains(word)) {
        return ConfirmationDecision::Confirm;
    }
    if NEGATIVE_WORDS.iter().any(|word| normalized.contains(word)) {
        return ConfirmationDecision::Cancel;
    }
    ConfirmationDecision::Unrecognized
}

/// Where the flow currently is. `Executing` spans the confirm-action
/// round-trip; the pending payload survives until the reply lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationPhase {
    Idle,
    Awaiting,
    Executing,
}

/// The stored destructive-action confirmation, exclusively owned here.
#[derive(Debug, Clone)]
pub struct PendingConfirmation {
    pub kind: ConfirmationKind,
    pub prompt: String,
    pub data: Value,
}

/// What the session should do after an unrecognized response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepromptDisposition {
    /// Re-issue the prompt and re-arm the voice listener.
    ReArm { prompt: String },
    /// The bound was just reached; issue the typed fallback instruction once.
    TypedFallback,
    /// The fallback was already issued; stay quiet except for a short nudge.
    Exhausted,
}

/// Single arbiter of whether new top-level input is accepted.
pub struct ConfirmationFlow {
    phase: ConfirmationPhase,
    pending: Option<PendingConfirmation>,
    reprompts: u8,
    max_reprompts: u8,
    typed_fallback_issued: bool,
}

impl ConfirmationFlow {
    #[must_use]
    pub fn new(max_reprompts: u8) -> Self {
        Self {
            phase: ConfirmationPhase::Idle,
            pending: None,
            reprompts: 0,
            max_reprompts,
            typed_fallback_issued: false,
        }
    }

    /// While a confirmation exists it is the sole input gate.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.pending.is_some()
    }

    #[must_use]
    pub fn phase(&self) -> ConfirmationPhase {
        self.phase
    }

    #[must_use]
    pub fn pending(&self) -> Option<&PendingConfirmation> {
        self.pending.as_ref()
    }

    /// Store a new confirmation request and enter `Awaiting`.
    pub fn arm(&mut self, kind: ConfirmationKind, prompt: String, data: Value) {
        self.pending = Some(PendingConfirmation { kind, prompt, data });
        self.phase = ConfirmationPhase::Awaiting;
        self.reprompts = 0;
        self.typed_fallback_issued = false;
    }

    /// Affirmative received: enter `Executing` and hand back the payload to
    /// resubmit. `None` when no confirmation is awaiting.
    pub fn begin_execution(&mut self) -> Option<(ConfirmationKind, Value)> {
        if self.phase != ConfirmationPhase::Awaiting {
            return None;
        }
        let pending = self.pending.as_ref()?;
        let payload = (pending.kind, pending.data.clone());
        self.phase = ConfirmationPhase::Executing;
        Some(payload)
    }

    /// The confirm-action reply landed; clear regardless of its outcome.
    pub fn complete_execution(&mut self) {
        self.pending = None;
        self.phase = ConfirmationPhase::Idle;
    }

    /// Negative received: discard without contacting the service. Refused
    /// once execution has begun; a dispatched confirm cannot be recalled.
    pub fn cancel(&mut self) -> bool {
        if self.phase != ConfirmationPhase::Awaiting {
            return false;
        }
        self.pending = None;
        self.phase = ConfirmationPhase::Idle;
        true
    }

    /// Account for an unrecognized response; bounded so the re-prompt loop
    /// always terminates user-visibly.
    pub fn note_unrecognized(&mut self) -> RepromptDisposition {
        if self.typed_fallback_issued {
            return RepromptDisposition::Exhausted;
        }
        if self.reprompts < self.max_reprompts {
            self.reprompts += 1;
            let prompt = self
                .pending
                .as_ref()
                .map(|p| p.prompt.clone())
                .unwrap_or_default();
            return RepromptDisposition::ReArm { prompt };
        }
        self.typed_fallback_issued = true;
        RepromptDisposition::TypedFallback
    }
}

/// Restricted single-shot listener for confirmation responses.
///
/// Never surfaces interim updates; the lexicon match only needs the final
/// utterance, lowercased and trimmed.
#[derive(Default)]
pub struct ConfirmationChannel {
    job: Option<CaptureJob>,
}

impl ConfirmationChannel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start one capture; false when no recognizer is available.
    pub fn start(&mut self, recognizer: Option<&SharedRecognizer>, lang: &str) -> bool {
        if self.job.is_some() {
            return true;
        }
        let Some(recognizer) = recognizer else {
            return false;
        };
        self.job = Some(spawn_capture_job(recognizer.clone(), lang.to_string()));
        true
    }

    /// Abort the current capture, discarding any result.
    pub fn stop(&mut self) {
        if let Some(job) = self.job.as_mut() {
            job.request_stop();
            job.mark_cancelled();
        }
    }

    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.job.is_some()
    }

    /// Drain the capture job; terminal events release the channel.
    /// Interim updates are swallowed here by contract.
    pub fn poll(&mut self) -> Option<CaptureEvent> {
        let job = self.job.as_mut()?;
        loop {
            let event = job.poll()?;
            match event {
                CaptureEvent::Interim { .. } => continue,
                CaptureEvent::Final { text } => {
                    let cancelled = job.is_cancelled();
                    self.job = None;
                    if cancelled {
                        return None;
                    }
                    return Some(CaptureEvent::Final {
                        text: text.trim().to_lowercase(),
                    });
                }
                terminal => {
                    let cancelled = job.is_cancelled();
                    self.job = None;
                    if cancelled {
                        return None;
                    }
                    return Some(terminal);
                }
            }
        }
    }
}
