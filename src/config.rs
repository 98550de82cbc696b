//! Runtime configuration parsed from CLI flags and environment variables.

use clap::Parser;

/// Default ceiling on confirmation re-prompts before the typed fallback.
pub const DEFAULT_MAX_REPROMPTS: u8 = 3;

/// Configuration for a voicedesk session and its backend connection.
#[derive(Debug, Clone, Parser)]
#[command(name = "voicedesk", version, about = "Voice-first client for a workspace assistant")]
pub struct AppConfig {
    /// Base URL of the assistant service.
    #[arg(
        long,
        env = "VOICEDESK_BACKEND_URL",
        default_value = "http://127.0.0.1:5000"
    )]
    pub backend_url: String,

    /// HTTP timeout for backend requests, in seconds.
    #[arg(long, env = "VOICEDESK_HTTP_TIMEOUT_SECS", default_value_t = 30)]
    pub http_timeout_secs: u64,

    /// Language hint handed to the host speech recognizer.
    #[arg(long, env = "VOICEDESK_LANG", default_value = "en")]
    pub lang: String,

    /// Disable spoken playback of short successful replies.
    #[arg(long)]
    pub no_speak: bool,

    /// Confirmation re-prompts allowed before falling back to typed input.
    #[arg(long, default_value_t = DEFAULT_MAX_REPROMPTS)]
    pub max_reprompts: u8,

    /// Initial message filter category (all, tasks, notes, events, images).
    #[arg(long, default_value = "all")]
    pub category: String,

    /// Enable debug logging to the temp log file.
    #[arg(long)]
    pub logs: bool,

    /// Disable all logging even if other logging flags are set.
    #[arg(long)]
    pub no_logs: bool,

    /// Allow user content (commands, transcripts) in debug logs.
    #[arg(long)]
    pub log_content: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = AppConfig::parse_from(["config-test"]);
        assert_eq!(cfg.backend_url, "http://127.0.0.1:5000");
        assert_eq!(cfg.http_timeout_secs, 30);
        assert_eq!(cfg.lang, "en");
        assert!(!cfg.no_speak);
        assert_eq!(cfg.max_reprompts, DEFAULT_MAX_REPROMPTS);
        assert_eq!(cfg.category, "all");
        assert!(!cfg.logs);
    }

    #[test]
    fn flags_override_defaults() {
        let cfg = AppConfig::parse_from([
            "config-test",
            "--backend-url",
            "http://assistant.local:8080",
            "--max-reprompts",
            "5",
            "--no-speak",
            "--category",
            "tasks",
        ]);
        assert_eq!(cfg.backend_url, "http://assistant.local:8080");
        assert_eq!(cfg.max_reprompts, 5);
        assert!(cfg.no_speak);
        assert_eq!(cfg.category, "tasks");
    }
}
