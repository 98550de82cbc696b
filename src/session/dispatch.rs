//! Worker-thread command dispatch with a synthesized failure on transport errors.

use crate::backend::{CommandBackend, DraftDetails};
use crate::log_debug;
use crate::protocol::{ActionKind, CommandReply, CommandRequest, TRANSPORT_FAILURE_MESSAGE};
use crossbeam_channel::{bounded, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use super::history::PlaceholderToken;

/// Ceiling above which successful replies are not narrated.
pub(crate) const SPOKEN_REPLY_MAX_CHARS: usize = 200;

/// What kind of request a dispatch job carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DispatchKind {
    Command,
    ConfirmAction,
    DraftDetails,
    Recipients,
}

/// A request routed through the one-at-a-time dispatch pipeline.
pub(crate) enum DispatchRequest {
    Command(CommandRequest),
    Draft(DraftDetails),
    Recipients(Vec<String>),
}

impl DispatchRequest {
    pub(crate) fn kind(&self) -> DispatchKind {
        match self {
            DispatchRequest::Command(request) if request.confirmation_data.is_some() => {
                DispatchKind::ConfirmAction
            }
            DispatchRequest::Command(_) => DispatchKind::Command,
            DispatchRequest::Draft(_) => DispatchKind::DraftDetails,
            DispatchRequest::Recipients(_) => DispatchKind::Recipients,
        }
    }
}

/// The single in-flight request; owns the pending placeholder for its lifetime.
pub(crate) struct DispatchJob {
    rx: Receiver<CommandReply>,
    pub(crate) kind: DispatchKind,
    pub(crate) placeholder: PlaceholderToken,
}

impl DispatchJob {
    /// Non-blocking poll; delivers exactly one reply per job. Transport
    /// failures were already collapsed into a plain-failure reply by the
    /// worker; a vanished worker is collapsed here for the same reason.
    pub(crate) fn poll(&mut self) -> Option<CommandReply> {
        match self.rx.try_recv() {
            Ok(reply) => Some(reply),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                Some(CommandReply::plain_failure(TRANSPORT_FAILURE_MESSAGE))
            }
        }
    }
}

/// Run one request on a worker thread. There is no client-side cancellation:
/// once dispatched we always wait for the reply or the transport failure.
pub(crate) fn spawn_dispatch(
    backend: Arc<dyn CommandBackend>,
    request: DispatchRequest,
    placeholder: PlaceholderToken,
) -> DispatchJob {
    let kind = request.kind();
    let (tx, rx) = bounded(1);
    thread::spawn(move || {
        let started = Instant::now();
        let result = match &request {
            DispatchRequest::Command(command) => backend.submit_command(command),
            DispatchRequest::Draft(details) => backend.collect_draft(details),
            DispatchRequest::Recipients(recipients) => backend.attach_recipients(recipients),
        };
        tracing::debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "command dispatch finished"
        );
        let reply = match result {
            Ok(reply) => reply,
            Err(err) => {
                log_debug(&format!("command dispatch failed: {err:#}"));
                CommandReply::plain_failure(TRANSPORT_FAILURE_MESSAGE)
            }
        };
        let _ = tx.send(reply);
    });
    DispatchJob {
        rx,
        kind,
        placeholder,
    }
}

/// Narration policy for successful replies: short, prose-only, and never the
/// help text.
#[must_use]
pub(crate) fn should_speak(message: &str, action: Option<ActionKind>) -> bool {
    !message.is_empty()
        && message.chars().count() < SPOKEN_REPLY_MAX_CHARS
        && !message.contains("```")
        && action != Some(ActionKind::Help)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::history::{Category, MessageLog};
    use anyhow::anyhow;
    use std::time::{Duration, Instant};

    struct OneShotBackend {
        reply: fn() -> anyhow::Result<CommandReply>,
    }

    impl CommandBackend for OneShotBackend {
        fn submit_command(&self, _request: &CommandRequest) -> anyhow::Result<CommandReply> {
            (self.reply)()
        }

        fn collect_draft(&self, _details: &DraftDetails) -> anyhow::Result<CommandReply> {
            (self.reply)()
        }

        fn attach_recipients(&self, _recipients: &[String]) -> anyhow::Result<CommandReply> {
            (self.reply)()
        }
    }

    fn wait_for_reply(job: &mut DispatchJob) -> CommandReply {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            if let Some(reply) = job.poll() {
                return reply;
            }
            assert!(Instant::now() < deadline, "dispatch did not resolve");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn kind_distinguishes_confirm_resubmissions() {
        let plain = DispatchRequest::Command(CommandRequest::plain("list tasks"));
        assert_eq!(plain.kind(), DispatchKind::Command);

        let confirm = DispatchRequest::Command(CommandRequest {
            command: "confirm delete all events".to_string(),
            confirmation_data: Some(serde_json::json!({"event_ids": []})),
        });
        assert_eq!(confirm.kind(), DispatchKind::ConfirmAction);

        assert_eq!(
            DispatchRequest::Recipients(vec![]).kind(),
            DispatchKind::Recipients
        );
    }

    #[test]
    fn transport_failure_synthesizes_the_fixed_message() {
        let backend = Arc::new(OneShotBackend {
            reply: || Err(anyhow!("connection refused")),
        });
        let mut log = MessageLog::new(Category::All);
        let placeholder = log.insert_placeholder();
        let mut job = spawn_dispatch(
            backend,
            DispatchRequest::Command(CommandRequest::plain("list tasks")),
            placeholder,
        );
        let reply = wait_for_reply(&mut job);
        assert!(!reply.success);
        assert_eq!(reply.message.as_deref(), Some(TRANSPORT_FAILURE_MESSAGE));
    }

    #[test]
    fn successful_reply_passes_through_unchanged() {
        let backend = Arc::new(OneShotBackend {
            reply: || {
                Ok(serde_json::from_value(serde_json::json!({
                    "success": true,
                    "action": "list_tasks",
                    "message": "Here are your tasks"
                }))
                .expect("reply"))
            },
        });
        let mut log = MessageLog::new(Category::All);
        let placeholder = log.insert_placeholder();
        let mut job = spawn_dispatch(
            backend,
            DispatchRequest::Command(CommandRequest::plain("list tasks")),
            placeholder,
        );
        let reply = wait_for_reply(&mut job);
        assert!(reply.success);
        assert_eq!(reply.action, Some(ActionKind::ListTasks));
    }

    #[test]
    fn speak_policy_truth_table() {
        assert!(should_speak("Task added", Some(ActionKind::AddTask)));
        assert!(should_speak("Task added", None));
        assert!(!should_speak("", Some(ActionKind::AddTask)));
        assert!(!should_speak("Task added", Some(ActionKind::Help)));
        assert!(!should_speak("run ```cargo test``` locally", None));
        let long = "a".repeat(SPOKEN_REPLY_MAX_CHARS);
        assert!(!should_speak(&long, None));
        let short_enough = "a".repeat(SPOKEN_REPLY_MAX_CHARS - 1);
        assert!(should_speak(&short_enough, None));
    }
}
