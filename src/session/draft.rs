//! Single-slot draft store with full-replacement semantics.

use crate::protocol::DraftPayload;
use regex::Regex;
use std::sync::OnceLock;

/// What kind of artifact the draft is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftKind {
    Email,
    Summary,
}

/// The single in-flight composable artifact awaiting send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub subject: String,
    pub body: String,
    pub recipients: Vec<String>,
    pub kind: DraftKind,
    pub summary: Option<String>,
}

impl Draft {
    /// True when a direct send can be offered without recipient collection.
    #[must_use]
    pub fn has_recipient(&self) -> bool {
        !self.recipients.is_empty()
    }

    /// Build a draft from a reply payload; `None` when there is no body to keep.
    #[must_use]
    pub fn from_payload(payload: &DraftPayload) -> Option<Self> {
        let body = payload.body.as_deref()?.trim();
        if body.is_empty() {
            return None;
        }
        let kind = match payload.kind.as_deref() {
            Some("summary") => DraftKind::Summary,
            _ => DraftKind::Email,
        };
        Some(Self {
            subject: payload
                .subject
                .clone()
                .unwrap_or_else(|| "Drafted Email".to_string()),
            body: body.to_string(),
            recipients: payload.recipients.clone(),
            kind,
            summary: payload.summary.clone(),
        })
    }
}

/// Owns the one draft slot; every set is a full replacement, never a merge.
#[derive(Default)]
pub struct DraftStore {
    current: Option<Draft>,
}

impl DraftStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever draft existed before.
    pub fn set(&mut self, draft: Draft) {
        self.current = Some(draft);
    }

    /// Discard the draft, if any.
    pub fn clear(&mut self) {
        self.current = None;
    }

    #[must_use]
    pub fn current(&self) -> Option<&Draft> {
        self.current.as_ref()
    }
}

/// Extract mail addresses from free text, in order of appearance.
#[must_use]
pub fn parse_recipients(text: &str) -> Vec<String> {
    static ADDRESS: OnceLock<Regex> = OnceLock::new();
    let address = ADDRESS.get_or_init(|| {
        Regex::new(r"[\w.\-]+@[\w.\-]+\.\w+").unwrap_or_else(|_| Regex::new("$^").expect("fallback"))
    });
    address
        .find_iter(text)
        .map(|m| m.as_str().trim_matches(|c| c == ',' || c == ';').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
