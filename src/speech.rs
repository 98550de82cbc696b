//! Host speech capability seams and the capture event contract.
//!
//! The crate never records or synthesizes audio itself; hosts install
//! [`SpeechRecognizer`] / [`SpeechSynthesizer`] implementations and the
//! session drives them through single-shot capture jobs.

use crossbeam_channel::Sender;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Recognizer handle shared between the session and its capture threads.
pub type SharedRecognizer = Arc<Mutex<dyn SpeechRecognizer>>;

/// Wrap a recognizer for installation into a session.
#[must_use]
pub fn shared_recognizer<R: SpeechRecognizer + 'static>(recognizer: R) -> SharedRecognizer {
    Arc::new(Mutex::new(recognizer))
}

/// Terminal result of one single-shot recognition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// A final transcript was produced.
    Transcript(String),
    /// Recognition ended without hearing any speech.
    Empty,
}

/// Events delivered from a capture job to the session loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// Partial transcript update; zero or more precede the terminal event.
    Interim { text: String },
    /// Final transcript; exactly one terminal event ends each capture.
    Final { text: String },
    /// Recognition ended silently with no speech.
    Empty,
    /// Recognition failed; the adapter returns to idle without submitting.
    Error(SpeechError),
}

/// Closed taxonomy of host recognition failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpeechError {
    #[error("no speech detected")]
    NoSpeech,
    #[error("no microphone available")]
    NoMicrophone,
    #[error("microphone permission denied")]
    PermissionDenied,
    #[error("speech recognition unavailable")]
    Unavailable,
    #[error("{0}")]
    Other(String),
}

impl SpeechError {
    /// Message rendered inline when a capture fails.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            SpeechError::NoSpeech => "No speech detected. Please try again.".to_string(),
            SpeechError::NoMicrophone => {
                "No microphone was found. Check your audio input and try again.".to_string()
            }
            SpeechError::PermissionDenied => {
                "Microphone permission was denied. Allow microphone access to use voice input."
                    .to_string()
            }
            SpeechError::Unavailable => {
                "Voice input is not available on this host. Type your command instead.".to_string()
            }
            SpeechError::Other(detail) => format!("Voice input failed: {detail}"),
        }
    }
}

/// Host-provided single-shot speech-to-text capability.
///
/// Implementations may push [`CaptureEvent::Interim`] updates through
/// `events` while listening, must honor `stop` promptly (returning whatever
/// terminal outcome is natural), and report the terminal result through the
/// return value. They must not send terminal events themselves; the capture
/// job owns that.
pub trait SpeechRecognizer: Send {
    fn listen_once(
        &mut self,
        lang: &str,
        events: &Sender<CaptureEvent>,
        stop: &AtomicBool,
    ) -> Result<CaptureOutcome, SpeechError>;
}

/// Host-provided text-to-speech capability.
///
/// Failures are swallowed by the caller (logged, never surfaced) so a
/// narration glitch cannot block rendering of a reply.
pub trait SpeechSynthesizer: Send {
    fn speak(&mut self, text: &str) -> Result<(), SpeechError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_messages_cover_every_cause() {
        let causes = [
            SpeechError::NoSpeech,
            SpeechError::NoMicrophone,
            SpeechError::PermissionDenied,
            SpeechError::Unavailable,
            SpeechError::Other("device busy".to_string()),
        ];
        for cause in causes {
            let message = cause.user_message();
            assert!(!message.is_empty());
        }
        assert!(SpeechError::Other("device busy".to_string())
            .user_message()
            .contains("device busy"));
    }

    #[test]
    fn capture_events_distinguish_terminal_kinds() {
        assert_ne!(
            CaptureEvent::Empty,
            CaptureEvent::Final {
                text: String::new()
            }
        );
        assert_ne!(
            CaptureEvent::Error(SpeechError::NoSpeech),
            CaptureEvent::Empty
        );
    }
}
