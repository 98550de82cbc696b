//! Main speech channel adapter: single-shot capture jobs with abortable stop.

use crate::log_debug;
use crate::speech::{CaptureEvent, CaptureOutcome, SharedRecognizer, SpeechError};
use crossbeam_channel::{bounded, Receiver, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

const CAPTURE_EVENT_CHANNEL_CAPACITY: usize = 16;

/// Externally observable state of a speech channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceChannelState {
    Idle,
    Listening,
    Error,
}

/// One in-flight single-shot recognition.
pub(crate) struct CaptureJob {
    rx: Receiver<CaptureEvent>,
    stop: Arc<AtomicBool>,
    cancelled: bool,
}

impl CaptureJob {
    /// Ask the recognizer to end early.
    pub(crate) fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Mark the capture as aborted; terminal results will be discarded.
    pub(crate) fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Non-blocking drain of the capture worker.
    pub(crate) fn poll(&mut self) -> Option<CaptureEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) => None,
            // A worker that died without its terminal event still terminates
            // the capture instead of leaving the adapter stuck listening.
            Err(TryRecvError::Disconnected) => Some(CaptureEvent::Error(SpeechError::Other(
                "capture worker exited unexpectedly".to_string(),
            ))),
        }
    }
}

/// Spawn a worker that runs one recognition and always delivers exactly one
/// terminal event after zero or more interim updates.
pub(crate) fn spawn_capture_job(recognizer: SharedRecognizer, lang: String) -> CaptureJob {
    let (tx, rx) = bounded(CAPTURE_EVENT_CHANNEL_CAPACITY);
    let stop = Arc::new(AtomicBool::new(false));
    let worker_stop = stop.clone();
    thread::spawn(move || {
        let outcome = {
            let mut guard = recognizer
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            guard.listen_once(&lang, &tx, &worker_stop)
        };
        let terminal = match outcome {
            Ok(CaptureOutcome::Transcript(text)) if !text.trim().is_empty() => {
                CaptureEvent::Final {
                    text: text.trim().to_string(),
                }
            }
            Ok(_) => CaptureEvent::Empty,
            Err(err) => CaptureEvent::Error(err),
        };
        if tx.send(terminal).is_err() {
            log_debug("capture result dropped: session went away");
        }
    });
    CaptureJob {
        rx,
        stop,
        cancelled: false,
    }
}

/// The primary voice input channel feeding the command pipeline.
pub struct VoiceChannel {
    recognizer: Option<SharedRecognizer>,
    lang: String,
    job: Option<CaptureJob>,
    state: VoiceChannelState,
}

impl VoiceChannel {
    #[must_use]
    pub fn new(lang: String) -> Self {
        Self {
            recognizer: None,
            lang,
            job: None,
            state: VoiceChannelState::Idle,
        }
    }

    pub fn set_recognizer(&mut self, recognizer: SharedRecognizer) {
        self.recognizer = Some(recognizer);
    }

    #[must_use]
    pub fn has_recognizer(&self) -> bool {
        self.recognizer.is_some()
    }

    pub(crate) fn recognizer(&self) -> Option<&SharedRecognizer> {
        self.recognizer.as_ref()
    }

    #[must_use]
    pub fn state(&self) -> VoiceChannelState {
        self.state
    }

    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.job.is_some()
    }

    /// True while an aborted capture is still winding down; a new capture
    /// cannot begin until its discarded terminal event drains.
    #[must_use]
    pub fn is_stopping(&self) -> bool {
        self.job.as_ref().is_some_and(CaptureJob::is_cancelled)
    }

    /// Begin one capture. False when the host has no recognizer installed or
    /// an aborted capture is still draining; true (without restarting) when
    /// already listening.
    pub fn start(&mut self) -> bool {
        if let Some(job) = &self.job {
            return !job.is_cancelled();
        }
        let Some(recognizer) = self.recognizer.as_ref() else {
            return false;
        };
        self.job = Some(spawn_capture_job(recognizer.clone(), self.lang.clone()));
        self.state = VoiceChannelState::Listening;
        true
    }

    /// Abort the capture. Stopping is an abort, not a commit: any transcript
    /// accumulated before cancellation is discarded, not submitted.
    pub fn stop(&mut self) {
        if let Some(job) = self.job.as_mut() {
            job.request_stop();
            job.mark_cancelled();
        }
    }

    /// Drain capture events. Interim updates pass through; a terminal event
    /// releases the channel back to idle (or error) and, if the capture was
    /// cancelled, is swallowed entirely.
    pub fn poll(&mut self) -> Option<CaptureEvent> {
        let job = self.job.as_mut()?;
        let event = job.poll()?;
        let cancelled = job.is_cancelled();
        match event {
            CaptureEvent::Interim { .. } => {
                if cancelled {
                    return None;
                }
                Some(event)
            }
            CaptureEvent::Error(_) => {
                self.job = None;
                if cancelled {
                    self.state = VoiceChannelState::Idle;
                    return None;
                }
                self.state = VoiceChannelState::Error;
                Some(event)
            }
            CaptureEvent::Final { .. } | CaptureEvent::Empty => {
                self.job = None;
                self.state = VoiceChannelState::Idle;
                if cancelled {
                    return None;
                }
                Some(event)
            }
        }
    }
}
