//! Typed wire contract for the assistant's command endpoint.
//!
//! The service replies with a permissive JSON shape; [`CommandReply`] accepts
//! it field-by-field and [`CommandReply::into_outcome`] collapses it into a
//! closed tagged variant so callers match exhaustively instead of branching
//! on loose strings.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fixed message surfaced when the service cannot be reached at all.
pub const TRANSPORT_FAILURE_MESSAGE: &str =
    "Could not reach the assistant service. Please try again.";

/// Fixed message surfaced when a reply requests two follow-up flows at once.
pub const CONTRACT_VIOLATION_MESSAGE: &str =
    "The assistant returned a conflicting reply. Please try again.";

// ============================================================================
// Requests (client → service)
// ============================================================================

/// Request body for the command endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CommandRequest {
    /// Free-text instruction, interpreted server-side.
    pub command: String,
    /// Opaque payload echoed back verbatim when confirming a destructive action.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation_data: Option<Value>,
}

impl CommandRequest {
    /// A plain top-level command with no confirmation payload.
    #[must_use]
    pub fn plain(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            confirmation_data: None,
        }
    }
}

// ============================================================================
// Replies (service → client)
// ============================================================================

/// Action tag identifying the rendering/side-effect branch of a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    ListFiles,
    SearchFiles,
    ShowImages,
    ShowImage,
    ViewFolder,
    SummarizeFile,
    ListTasks,
    AddTask,
    CompleteTask,
    DeleteTask,
    ListNotes,
    CreateNote,
    GetNote,
    DeleteNote,
    SearchNotes,
    ListEvents,
    ListToday,
    ListDate,
    CreateEvent,
    GetEvent,
    DeleteEvent,
    DeleteAllEvents,
    ConfirmDeleteAll,
    ScheduleMeet,
    SendMeetInvite,
    DraftEmail,
    DraftSummary,
    ShowDraft,
    ClearDraft,
    RefineDraft,
    SendDraft,
    Help,
    Exit,
    /// Any tag this client does not recognize; rendered via `message` only.
    #[serde(other)]
    Unknown,
}

impl ActionKind {
    /// True when a successful reply with this tag carries a new draft payload.
    #[must_use]
    pub fn produces_draft(self) -> bool {
        matches!(
            self,
            ActionKind::DraftEmail
                | ActionKind::DraftSummary
                | ActionKind::RefineDraft
                | ActionKind::ShowDraft
        )
    }
}

/// Destructive-action families the client knows how to confirm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationKind {
    DeleteAllEvents,
    /// Confirmation families newer than this client; not treated as confirmations.
    #[serde(other)]
    Unknown,
}

impl ConfirmationKind {
    /// Command string a confirmed action is resubmitted under.
    #[must_use]
    pub fn confirm_command(self) -> &'static str {
        match self {
            ConfirmationKind::DeleteAllEvents => "confirm delete all events",
            ConfirmationKind::Unknown => "confirm",
        }
    }
}

/// Raw reply from the command endpoint; every field is optional on the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandReply {
    /// Whether the command completed.
    #[serde(default)]
    pub success: bool,
    /// Rendering branch for the reply.
    #[serde(default)]
    pub action: Option<ActionKind>,
    /// Human-readable reply text.
    #[serde(default)]
    pub message: Option<String>,
    /// Action-specific payload, decoded lazily per action.
    #[serde(default)]
    pub data: Option<Value>,
    /// Service needs the interactive draft-details flow before drafting.
    #[serde(default)]
    pub needs_interactive: bool,
    /// Service needs recipients before it can send the draft.
    #[serde(default)]
    pub needs_recipients: bool,
    /// Present when the reply is a destructive-action confirmation request.
    #[serde(default)]
    pub confirmation_type: Option<ConfirmationKind>,
}

impl CommandReply {
    /// Synthesized plain failure used for transport-level errors.
    #[must_use]
    pub fn plain_failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            action: None,
            message: Some(message.into()),
            data: None,
            needs_interactive: false,
            needs_recipients: false,
            confirmation_type: None,
        }
    }

    /// Collapse the permissive wire shape into exactly one outcome branch.
    ///
    /// A reply carrying both follow-up flags violates the service contract and
    /// becomes a failure rather than a silent client-side tie-break.
    #[must_use]
    pub fn into_outcome(self) -> CommandOutcome {
        if self.needs_interactive && self.needs_recipients {
            return CommandOutcome::Failed {
                message: CONTRACT_VIOLATION_MESSAGE.to_string(),
            };
        }
        if !self.success && self.needs_interactive {
            return CommandOutcome::NeedsInteractiveDraft {
                message: self
                    .message
                    .unwrap_or_else(|| "Please provide more details".to_string()),
            };
        }
        if !self.success && self.needs_recipients {
            return CommandOutcome::NeedsRecipients {
                message: self
                    .message
                    .unwrap_or_else(|| "Please provide recipients".to_string()),
            };
        }
        match self.confirmation_type {
            Some(kind) if kind != ConfirmationKind::Unknown => {
                return CommandOutcome::NeedsConfirmation {
                    kind,
                    prompt: self
                        .message
                        .unwrap_or_else(|| "Are you sure? Say yes to confirm or no to cancel.".to_string()),
                    data: self.data.unwrap_or(Value::Null),
                };
            }
            _ => {}
        }
        if self.success {
            CommandOutcome::Completed {
                action: self.action,
                message: self.message,
                data: self.data,
            }
        } else {
            CommandOutcome::Failed {
                message: self
                    .message
                    .unwrap_or_else(|| "Command not recognized. Try \"help\"".to_string()),
            }
        }
    }
}

/// Interpreted reply; exactly one branch is true for any wire reply.
#[derive(Debug, Clone)]
pub enum CommandOutcome {
    /// Completed command routed to a rendering branch by action tag.
    Completed {
        action: Option<ActionKind>,
        message: Option<String>,
        data: Option<Value>,
    },
    /// Destructive action awaiting an explicit affirmative.
    NeedsConfirmation {
        kind: ConfirmationKind,
        prompt: String,
        data: Value,
    },
    /// The host should run its interactive draft-details flow.
    NeedsInteractiveDraft { message: String },
    /// The host should run its recipient-collection flow.
    NeedsRecipients { message: String },
    /// Plain failure surfaced as a message.
    Failed { message: String },
}

// ============================================================================
// Action payloads
// ============================================================================

/// A task row as returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TaskItem {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub due: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

/// A note row as returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NoteItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
}

/// A calendar event row as returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EventItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
}

/// A drive file row as returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FileItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Draft payload attached to draft-producing replies.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DraftPayload {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}
