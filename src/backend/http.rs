//! Blocking HTTP implementation of the assistant service surface.

use super::{ApiEnvelope, CommandBackend, DraftDetails};
use crate::log_debug;
use crate::protocol::{CommandReply, CommandRequest};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const USER_AGENT: &str = concat!("voicedesk/", env!("CARGO_PKG_VERSION"));

/// A friend directory row.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FriendRecord {
    #[serde(default, alias = "_id")]
    pub id: Option<String>,
    pub name: String,
    pub email: String,
}

/// One past command exchange, as recorded by the service.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryEntry {
    pub command: String,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub success: bool,
}

/// Aggregate usage counters for the history view.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryStats {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub successful: u64,
    #[serde(default)]
    pub failed: u64,
}

/// Reusable blocking client for one assistant service.
pub struct HttpBackend {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpBackend {
    /// Build a backend handle with an explicit transport timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn post_reply<T: serde::Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<CommandReply> {
        let response = self
            .client
            .post(self.endpoint(path))
            .json(body)
            .send()
            .with_context(|| format!("request to {path} failed"))?;
        response
            .json()
            .with_context(|| format!("reply from {path} was not valid JSON"))
    }

    fn envelope(&self, request: reqwest::blocking::RequestBuilder, what: &str) -> Result<ApiEnvelope> {
        let response = request
            .send()
            .with_context(|| format!("{what} request failed"))?;
        response
            .json()
            .with_context(|| format!("{what} reply was not valid JSON"))
    }

    // ------------------------------------------------------------------
    // Speech synthesis
    // ------------------------------------------------------------------

    /// Fetch synthesized audio for `text`; playback is the host's concern.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-success status.
    pub fn fetch_speech(&self, text: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(self.endpoint("/api/tts"))
            .json(&json!({ "text": text }))
            .send()
            .context("tts request failed")?
            .error_for_status()
            .context("tts request rejected")?;
        let bytes = response.bytes().context("failed to read tts audio")?;
        log_debug(&format!("fetched {} bytes of synthesized speech", bytes.len()));
        Ok(bytes.to_vec())
    }

    // ------------------------------------------------------------------
    // Friends directory
    // ------------------------------------------------------------------

    /// List the friends directory.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a malformed reply.
    pub fn list_friends(&self) -> Result<Vec<FriendRecord>> {
        let envelope = self.envelope(self.client.get(self.endpoint("/api/friends")), "friends list")?;
        match envelope.data {
            Some(data) => serde_json::from_value(data).context("friends payload was malformed"),
            None => Ok(Vec::new()),
        }
    }

    /// Add a friend by name and address.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a malformed reply.
    pub fn add_friend(&self, name: &str, email: &str) -> Result<ApiEnvelope> {
        self.envelope(
            self.client
                .post(self.endpoint("/api/friends"))
                .json(&json!({ "name": name, "email": email })),
            "friends create",
        )
    }

    /// Update a friend's name and/or address.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a malformed reply.
    pub fn update_friend(
        &self,
        id: &str,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Result<ApiEnvelope> {
        self.envelope(
            self.client
                .put(self.endpoint(&format!("/api/friends/{id}")))
                .json(&json!({ "name": name, "email": email })),
            "friends update",
        )
    }

    /// Remove a friend.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a malformed reply.
    pub fn delete_friend(&self, id: &str) -> Result<ApiEnvelope> {
        self.envelope(
            self.client.delete(self.endpoint(&format!("/api/friends/{id}"))),
            "friends delete",
        )
    }

    /// Search friends by name or address fragment.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a malformed reply.
    pub fn search_friends(&self, query: &str) -> Result<Vec<FriendRecord>> {
        let envelope = self.envelope(
            self.client
                .get(self.endpoint("/api/friends/search"))
                .query(&[("q", query)]),
            "friends search",
        )?;
        match envelope.data {
            Some(data) => serde_json::from_value(data).context("friends payload was malformed"),
            None => Ok(Vec::new()),
        }
    }

    // ------------------------------------------------------------------
    // Command history
    // ------------------------------------------------------------------

    /// Fetch the most recent history entries.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a malformed reply.
    pub fn recent_history(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        let envelope = self.envelope(
            self.client
                .get(self.endpoint("/api/history"))
                .query(&[("limit", limit.to_string())]),
            "history list",
        )?;
        match envelope.data {
            Some(data) => serde_json::from_value(data).context("history payload was malformed"),
            None => Ok(Vec::new()),
        }
    }

    /// Search past commands.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a malformed reply.
    pub fn search_history(&self, query: &str) -> Result<Vec<HistoryEntry>> {
        let envelope = self.envelope(
            self.client
                .get(self.endpoint("/api/history/search"))
                .query(&[("q", query)]),
            "history search",
        )?;
        match envelope.data {
            Some(data) => serde_json::from_value(data).context("history payload was malformed"),
            None => Ok(Vec::new()),
        }
    }

    /// Fetch aggregate history counters.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a malformed reply.
    pub fn history_stats(&self) -> Result<HistoryStats> {
        let envelope = self.envelope(
            self.client.get(self.endpoint("/api/history/stats")),
            "history stats",
        )?;
        match envelope.data {
            Some(data) => serde_json::from_value(data).context("history stats were malformed"),
            None => Ok(HistoryStats {
                total: 0,
                successful: 0,
                failed: 0,
            }),
        }
    }

    /// Clear the server-side history.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a malformed reply.
    pub fn clear_history(&self) -> Result<ApiEnvelope> {
        self.envelope(
            self.client.delete(self.endpoint("/api/history/clear")),
            "history clear",
        )
    }
}

impl CommandBackend for HttpBackend {
    fn submit_command(&self, request: &CommandRequest) -> Result<CommandReply> {
        self.post_reply("/api/command", request)
    }

    fn collect_draft(&self, details: &DraftDetails) -> Result<CommandReply> {
        self.post_reply("/api/draft/interactive", details)
    }

    fn attach_recipients(&self, recipients: &[String]) -> Result<CommandReply> {
        self.post_reply("/api/draft/send", &json!({ "recipients": recipients }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(base: &str) -> HttpBackend {
        HttpBackend::new(base, Duration::from_secs(5)).expect("client should build")
    }

    #[test]
    fn endpoint_joins_without_duplicate_slashes() {
        let backend = backend("http://assistant.local:5000/");
        assert_eq!(
            backend.endpoint("/api/command"),
            "http://assistant.local:5000/api/command"
        );
    }

    #[test]
    fn friend_record_accepts_mongo_style_ids() {
        let record: FriendRecord = serde_json::from_value(serde_json::json!({
            "_id": "65f0",
            "name": "Venkat",
            "email": "venkat@example.com"
        }))
        .expect("friend record");
        assert_eq!(record.id.as_deref(), Some("65f0"));
        assert_eq!(record.email, "venkat@example.com");
    }

    #[test]
    fn history_stats_default_when_payload_is_sparse() {
        let stats: HistoryStats =
            serde_json::from_value(serde_json::json!({ "total": 7 })).expect("stats");
        assert_eq!(stats.total, 7);
        assert_eq!(stats.successful, 0);
        assert_eq!(stats.failed, 0);
    }
}
