//! Voicedesk entrypoint: a line-oriented client for the workspace assistant.
//!
//! Typed lines feed the command pipeline; replies render as plain text.
//! Slash commands control the local session (filtering, voice capture, the
//! friends directory, history). Everything else goes to the interpreter.

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::io::{self, BufRead};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use voicedesk::backend::{DraftDetails, HttpBackend};
use voicedesk::config::AppConfig;
use voicedesk::session::draft::parse_recipients;
use voicedesk::session::history::{Category, Message, MessageSender};
use voicedesk::session::{Session, SessionSignal};
use voicedesk::speech::{SpeechError, SpeechSynthesizer};
use voicedesk::{init_logging, init_tracing, log_debug};

const INPUT_POLL_MS: u64 = 20;
const INPUT_CHANNEL_CAPACITY: usize = 64;
const SHUTDOWN_DRAIN_MS: u64 = 2000;

/// Client-side commands that never reach the interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LocalCommand {
    Filter(Option<Category>),
    Voice,
    StopVoice,
    ShowDraft,
    Send(Vec<String>),
    Compose(Vec<String>),
    FriendsList,
    FriendsAdd { name: String, email: String },
    FriendsRename { id: String, name: String },
    FriendsRemove(String),
    FriendsSearch(String),
    History,
    HistorySearch(String),
    HistoryStats,
    HistoryClear,
    Help,
    Quit,
    Unknown(String),
}

fn parse_local_command(line: &str) -> Option<LocalCommand> {
    let rest = line.strip_prefix('/')?;
    let mut parts = rest.split_whitespace();
    let verb = parts.next().unwrap_or_default().to_lowercase();
    let tail: Vec<&str> = parts.collect();
    Some(match verb.as_str() {
        "filter" => LocalCommand::Filter(tail.first().and_then(|c| Category::parse(c))),
        "voice" => LocalCommand::Voice,
        "stop" => LocalCommand::StopVoice,
        "draft" => LocalCommand::ShowDraft,
        "send" => LocalCommand::Send(parse_recipients(&tail.join(" "))),
        "compose" => LocalCommand::Compose(
            rest.trim_start_matches("compose")
                .split(';')
                .map(|part| part.trim().to_string())
                .filter(|part| !part.is_empty())
                .collect(),
        ),
        "friends" => match tail.first().copied() {
            Some("add") => match (tail.get(1), tail.get(2)) {
                (Some(name), Some(email)) => LocalCommand::FriendsAdd {
                    name: (*name).to_string(),
                    email: (*email).to_string(),
                },
                _ => LocalCommand::Unknown("usage: /friends add <name> <email>".to_string()),
            },
            Some("rename") => match (tail.get(1), tail.get(2)) {
                (Some(id), Some(name)) => LocalCommand::FriendsRename {
                    id: (*id).to_string(),
                    name: (*name).to_string(),
                },
                _ => LocalCommand::Unknown("usage: /friends rename <id> <name>".to_string()),
            },
            Some("remove") => match tail.get(1) {
                Some(id) => LocalCommand::FriendsRemove((*id).to_string()),
                None => LocalCommand::Unknown("usage: /friends remove <id>".to_string()),
            },
            Some("search") => LocalCommand::FriendsSearch(tail[1..].join(" ")),
            _ => LocalCommand::FriendsList,
        },
        "history" => match tail.first().copied() {
            Some("search") => LocalCommand::HistorySearch(tail[1..].join(" ")),
            Some("stats") => LocalCommand::HistoryStats,
            Some("clear") => LocalCommand::HistoryClear,
            _ => LocalCommand::History,
        },
        "help" => LocalCommand::Help,
        "quit" | "exit" => LocalCommand::Quit,
        other => LocalCommand::Unknown(format!("unknown command: /{other} (try /help)")),
    })
}

const LOCAL_HELP: &str = "\
local commands:
  /filter <all|tasks|notes|events|images>   switch the message filter
  /voice                                    start voice capture
  /stop                                     abort voice capture
  /draft                                    show the current draft
  /send <addresses>                         send the draft to recipients
  /compose <purpose>; <recipient>; <details>; <tone>
  /friends [add <name> <email> | rename <id> <name> | remove <id> | search <q>]
  /history [search <q> | stats | clear]     command history on the service
  /quit                                     leave
anything else is sent to the assistant (try: help)";

/// Narration that fetches synthesized audio and parks it for a host player.
struct FetchedSpeech {
    backend: Arc<HttpBackend>,
}

impl SpeechSynthesizer for FetchedSpeech {
    fn speak(&mut self, text: &str) -> Result<(), SpeechError> {
        let bytes = self
            .backend
            .fetch_speech(text)
            .map_err(|err| SpeechError::Other(format!("{err:#}")))?;
        let path = std::env::temp_dir().join("voicedesk_reply.mp3");
        std::fs::write(&path, bytes).map_err(|err| SpeechError::Other(err.to_string()))?;
        log_debug(&format!("narration audio written to {}", path.display()));
        Ok(())
    }
}

fn spawn_stdin_reader(tx: Sender<String>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
        log_debug("stdin reader exiting");
    })
}

fn print_message(message: &Message) {
    let prefix = match message.sender {
        MessageSender::User => "you",
        MessageSender::Bot => "assistant",
        MessageSender::System => "   ·",
    };
    let text = message.content.display_text();
    let mut lines = text.lines();
    if let Some(first) = lines.next() {
        println!("{prefix}: {first}");
    }
    for line in lines {
        println!("      {line}");
    }
}

fn print_visible(session: &Session) {
    println!(
        "— filter: {} —",
        session.history().active_category().as_str()
    );
    for message in session.history().visible() {
        print_message(message);
    }
}

fn handle_signals(session: &mut Session, exit: &mut bool) {
    for signal in session.poll() {
        match signal {
            SessionSignal::MessageAppended(message) => print_message(&message),
            SessionSignal::InterimTranscript(text) => println!("   … {text}"),
            SessionSignal::CollectDraftDetails => {
                println!("   · draft needs details: /compose <purpose>; <recipient>; <details>; <tone>");
            }
            SessionSignal::CollectRecipients => {
                println!("   · draft needs recipients: /send <addresses>");
            }
            SessionSignal::ExitRequested => *exit = true,
        }
    }
}

fn run_local_command(
    session: &mut Session,
    http: &Arc<HttpBackend>,
    command: LocalCommand,
) -> Result<bool> {
    match command {
        LocalCommand::Filter(Some(category)) => {
            session.set_active_category(category);
            print_visible(session);
        }
        LocalCommand::Filter(None) => {
            println!("usage: /filter <all|tasks|notes|events|images>");
        }
        LocalCommand::Voice => {
            if session.start_voice() {
                println!("   · listening…");
            }
        }
        LocalCommand::StopVoice => session.stop_voice(),
        LocalCommand::ShowDraft => match session.current_draft() {
            Some(draft) => {
                println!("Subject: {}", draft.subject);
                if draft.has_recipient() {
                    println!("To: {}", draft.recipients.join(", "));
                }
                println!("{}", draft.body);
            }
            None => println!("   · no draft in progress"),
        },
        LocalCommand::Send(recipients) => session.submit_recipients(recipients),
        LocalCommand::Compose(parts) => {
            if parts.len() == 4 {
                session.submit_draft_details(DraftDetails {
                    purpose: parts[0].clone(),
                    recipient_type: parts[1].clone(),
                    details: parts[2].clone(),
                    tone: parts[3].clone(),
                });
            } else {
                println!("usage: /compose <purpose>; <recipient>; <details>; <tone>");
            }
        }
        LocalCommand::FriendsList => match http.list_friends() {
            Ok(friends) if friends.is_empty() => println!("   · no friends saved"),
            Ok(friends) => {
                for friend in friends {
                    println!("{}  <{}>", friend.name, friend.email);
                }
            }
            Err(err) => println!("   · friends unavailable: {err:#}"),
        },
        LocalCommand::FriendsAdd { name, email } => match http.add_friend(&name, &email) {
            Ok(envelope) => println!(
                "   · {}",
                envelope.message.unwrap_or_else(|| "saved".to_string())
            ),
            Err(err) => println!("   · could not add friend: {err:#}"),
        },
        LocalCommand::FriendsRename { id, name } => {
            match http.update_friend(&id, Some(&name), None) {
                Ok(envelope) => println!(
                    "   · {}",
                    envelope.message.unwrap_or_else(|| "updated".to_string())
                ),
                Err(err) => println!("   · could not update friend: {err:#}"),
            }
        }
        LocalCommand::FriendsRemove(id) => match http.delete_friend(&id) {
            Ok(envelope) => println!(
                "   · {}",
                envelope.message.unwrap_or_else(|| "removed".to_string())
            ),
            Err(err) => println!("   · could not remove friend: {err:#}"),
        },
        LocalCommand::FriendsSearch(query) => match http.search_friends(&query) {
            Ok(friends) if friends.is_empty() => println!("   · no matches"),
            Ok(friends) => {
                for friend in friends {
                    println!("{}  <{}>", friend.name, friend.email);
                }
            }
            Err(err) => println!("   · search unavailable: {err:#}"),
        },
        LocalCommand::History => match http.recent_history(10) {
            Ok(entries) if entries.is_empty() => println!("   · no history yet"),
            Ok(entries) => {
                for entry in entries {
                    let mark = if entry.success { "ok " } else { "err" };
                    println!("[{mark}] {}", entry.command);
                }
            }
            Err(err) => println!("   · history unavailable: {err:#}"),
        },
        LocalCommand::HistorySearch(query) => match http.search_history(&query) {
            Ok(entries) if entries.is_empty() => println!("   · no matches"),
            Ok(entries) => {
                for entry in entries {
                    let mark = if entry.success { "ok " } else { "err" };
                    println!("[{mark}] {}", entry.command);
                }
            }
            Err(err) => println!("   · search unavailable: {err:#}"),
        },
        LocalCommand::HistoryStats => match http.history_stats() {
            Ok(stats) => println!(
                "   · {} commands ({} ok, {} failed)",
                stats.total, stats.successful, stats.failed
            ),
            Err(err) => println!("   · stats unavailable: {err:#}"),
        },
        LocalCommand::HistoryClear => match http.clear_history() {
            Ok(envelope) => println!(
                "   · {}",
                envelope.message.unwrap_or_else(|| "history cleared".to_string())
            ),
            Err(err) => println!("   · could not clear history: {err:#}"),
        },
        LocalCommand::Help => println!("{LOCAL_HELP}"),
        LocalCommand::Quit => return Ok(true),
        LocalCommand::Unknown(hint) => println!("   · {hint}"),
    }
    Ok(false)
}

fn main() -> Result<()> {
    let config = AppConfig::parse();
    init_logging(&config);
    init_tracing(&config);

    let http = Arc::new(
        HttpBackend::new(
            &config.backend_url,
            Duration::from_secs(config.http_timeout_secs),
        )
        .context("failed to set up the assistant connection")?,
    );
    let mut session = Session::new(config.clone(), http.clone());
    if !config.no_speak {
        session.set_synthesizer(Box::new(FetchedSpeech {
            backend: http.clone(),
        }));
    }

    println!("voicedesk — connected to {} (/help for local commands)", config.backend_url);

    let (line_tx, line_rx): (Sender<String>, Receiver<String>) = bounded(INPUT_CHANNEL_CAPACITY);
    let _stdin_handle = spawn_stdin_reader(line_tx);

    let mut exit = false;
    while !exit {
        match line_rx.recv_timeout(Duration::from_millis(INPUT_POLL_MS)) {
            Ok(line) => {
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    if let Some(command) = parse_local_command(trimmed) {
                        exit = run_local_command(&mut session, &http, command)?;
                    } else {
                        session.submit_text(trimmed);
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => exit = true,
        }
        handle_signals(&mut session, &mut exit);
    }

    // Let an in-flight reply land before leaving so its message still renders.
    let deadline = Instant::now() + Duration::from_millis(SHUTDOWN_DRAIN_MS);
    while !session.is_idle() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(INPUT_POLL_MS));
        let mut ignored = false;
        handle_signals(&mut session, &mut ignored);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_not_a_local_command() {
        assert_eq!(parse_local_command("list tasks"), None);
        assert_eq!(parse_local_command("help"), None);
    }

    #[test]
    fn filter_parses_categories() {
        assert_eq!(
            parse_local_command("/filter tasks"),
            Some(LocalCommand::Filter(Some(Category::Tasks)))
        );
        assert_eq!(
            parse_local_command("/filter nonsense"),
            Some(LocalCommand::Filter(None))
        );
    }

    #[test]
    fn send_extracts_addresses_from_the_tail() {
        match parse_local_command("/send amy@example.com and bob@test.org") {
            Some(LocalCommand::Send(recipients)) => {
                assert_eq!(recipients, vec!["amy@example.com", "bob@test.org"]);
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn compose_splits_on_semicolons() {
        match parse_local_command("/compose sick leave; manager; out Friday; formal") {
            Some(LocalCommand::Compose(parts)) => {
                assert_eq!(parts, vec!["sick leave", "manager", "out Friday", "formal"]);
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn friends_subcommands_parse() {
        assert_eq!(
            parse_local_command("/friends"),
            Some(LocalCommand::FriendsList)
        );
        assert_eq!(
            parse_local_command("/friends add Venkat venkat@example.com"),
            Some(LocalCommand::FriendsAdd {
                name: "Venkat".to_string(),
                email: "venkat@example.com".to_string(),
            })
        );
        match parse_local_command("/friends search ven") {
            Some(LocalCommand::FriendsSearch(query)) => assert_eq!(query, "ven"),
            other => panic!("unexpected parse: {other:?}"),
        }
        assert_eq!(
            parse_local_command("/friends remove 65f0"),
            Some(LocalCommand::FriendsRemove("65f0".to_string()))
        );
    }

    #[test]
    fn history_subcommands_parse() {
        assert_eq!(parse_local_command("/history"), Some(LocalCommand::History));
        assert_eq!(
            parse_local_command("/history stats"),
            Some(LocalCommand::HistoryStats)
        );
        match parse_local_command("/history search tasks") {
            Some(LocalCommand::HistorySearch(query)) => assert_eq!(query, "tasks"),
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn quit_aliases_both_parse() {
        assert_eq!(parse_local_command("/quit"), Some(LocalCommand::Quit));
        assert_eq!(parse_local_command("/exit"), Some(LocalCommand::Quit));
    }
}
