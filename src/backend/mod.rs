//! Backend seam for the assistant service so sessions can run against stubs.

mod http;

pub use http::{FriendRecord, HistoryEntry, HistoryStats, HttpBackend};

use crate::protocol::{CommandReply, CommandRequest};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Details collected by the host's interactive draft form.
#[derive(Debug, Clone, Serialize)]
pub struct DraftDetails {
    /// What the email is for ("request sick leave", "thank a colleague", ...).
    pub purpose: String,
    /// Who it addresses (manager, colleague, client, ...).
    pub recipient_type: String,
    /// Free-text specifics folded into the body.
    pub details: String,
    /// Requested tone (formal, friendly, ...).
    pub tone: String,
}

/// Generic `{success, message, data?}` envelope for resource endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

/// The command pipeline's view of the assistant service.
///
/// Implementations must be cheap to share; dispatch worker threads hold a
/// clone of the `Arc` for the lifetime of one request.
pub trait CommandBackend: Send + Sync {
    /// Submit a natural-language command (or a confirm-action resubmission).
    fn submit_command(&self, request: &CommandRequest) -> Result<CommandReply>;

    /// Run the interactive draft-collection flow; replies draft-shaped.
    fn collect_draft(&self, details: &DraftDetails) -> Result<CommandReply>;

    /// Attach recipients to the current draft and send it.
    fn attach_recipients(&self, recipients: &[String]) -> Result<CommandReply>;
}
