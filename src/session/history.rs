//! Append-only message log with write-time category derivation and a live filter view.

use crate::protocol::{DraftPayload, EventItem, FileItem, NoteItem, TaskItem};
use std::time::SystemTime;

// Keyword groups checked in priority order when classifying bot/system text.
// This is a heuristic, not a semantic classifier; misfiled messages are an
// accepted limitation of the original client preserved here.
const TASK_TERMS: &[&str] = &["task", "todo", "to-do"];
const NOTE_TERMS: &[&str] = &["note", "keep"];
const EVENT_TERMS: &[&str] = &[
    "event",
    "calendar",
    "meeting",
    "meet",
    "schedule",
    "appointment",
];
const IMAGE_TERMS: &[&str] = &["image", "photo", "picture", "gallery", "folder"];

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSender {
    User,
    Bot,
    System,
}

/// Client-side filter tag; derived once at append time, never recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    All,
    Tasks,
    Notes,
    Events,
    Images,
}

impl Category {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Category::All => "all",
            Category::Tasks => "tasks",
            Category::Notes => "notes",
            Category::Events => "events",
            Category::Images => "images",
        }
    }

    /// Parse a user-facing category name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "all" => Some(Category::All),
            "tasks" | "task" => Some(Category::Tasks),
            "notes" | "note" => Some(Category::Notes),
            "events" | "event" | "calendar" => Some(Category::Events),
            "images" | "image" | "gallery" => Some(Category::Images),
            _ => None,
        }
    }
}

/// Typed rendering payload for structured replies.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Task(TaskItem),
    TaskList(Vec<TaskItem>),
    Note(NoteItem),
    NoteList(Vec<NoteItem>),
    Event(EventItem),
    EventList(Vec<EventItem>),
    FileList(Vec<FileItem>),
    ImageGallery(Vec<FileItem>),
    Draft(DraftPayload),
}

impl Fragment {
    /// Category implied by the payload kind; used instead of keyword scanning.
    #[must_use]
    pub fn category(&self) -> Category {
        match self {
            Fragment::Task(_) | Fragment::TaskList(_) => Category::Tasks,
            Fragment::Note(_) | Fragment::NoteList(_) => Category::Notes,
            Fragment::Event(_) | Fragment::EventList(_) => Category::Events,
            Fragment::ImageGallery(_) => Category::Images,
            Fragment::FileList(_) | Fragment::Draft(_) => Category::All,
        }
    }

    /// Plain-text rendering used by hosts without structured display.
    #[must_use]
    pub fn display_text(&self) -> String {
        match self {
            Fragment::Task(task) => format_task(task),
            Fragment::TaskList(tasks) => {
                if tasks.is_empty() {
                    "No tasks.".to_string()
                } else {
                    tasks.iter().map(format_task).collect::<Vec<_>>().join("\n")
                }
            }
            Fragment::Note(note) => format_note(note),
            Fragment::NoteList(notes) => {
                if notes.is_empty() {
                    "No notes.".to_string()
                } else {
                    notes.iter().map(format_note).collect::<Vec<_>>().join("\n")
                }
            }
            Fragment::Event(event) => format_event(event),
            Fragment::EventList(events) => {
                if events.is_empty() {
                    "No upcoming events.".to_string()
                } else {
                    events.iter().map(format_event).collect::<Vec<_>>().join("\n")
                }
            }
            Fragment::FileList(files) | Fragment::ImageGallery(files) => {
                if files.is_empty() {
                    "No files found.".to_string()
                } else {
                    files
                        .iter()
                        .map(|f| format!("{}  ({})", f.name, f.id))
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            }
            Fragment::Draft(draft) => {
                let subject = draft.subject.as_deref().unwrap_or("(no subject)");
                let body = draft.body.as_deref().unwrap_or("");
                if draft.recipients.is_empty() {
                    format!("Subject: {subject}\n\n{body}")
                } else {
                    format!(
                        "To: {}\nSubject: {subject}\n\n{body}",
                        draft.recipients.join(", ")
                    )
                }
            }
        }
    }
}

fn format_task(task: &TaskItem) -> String {
    let mark = if task.completed { "[x]" } else { "[ ]" };
    match &task.due {
        Some(due) => format!("{mark} {} (due {due}) #{}", task.text, task.id),
        None => format!("{mark} {} #{}", task.text, task.id),
    }
}

fn format_note(note: &NoteItem) -> String {
    match &note.content {
        Some(content) => format!("{} — {content} #{}", note.title, note.id),
        None => format!("{} #{}", note.title, note.id),
    }
}

fn format_event(event: &EventItem) -> String {
    let mut line = event.title.clone();
    if let Some(date) = &event.date {
        line.push_str(&format!(" on {date}"));
    }
    if let Some(time) = &event.time {
        line.push_str(&format!(" at {time}"));
    }
    line.push_str(&format!(" #{}", event.id));
    line
}

/// Message content: plain text or a typed rendering fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageContent {
    Text(String),
    Fragment(Fragment),
}

impl MessageContent {
    /// Plain-text view regardless of variant.
    #[must_use]
    pub fn display_text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Fragment(fragment) => fragment.display_text(),
        }
    }
}

/// One immutable log entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub content: MessageContent,
    pub sender: MessageSender,
    pub category: Category,
    pub timestamp: SystemTime,
}

/// Handle for the in-flight pending placeholder.
#[derive(Debug, PartialEq, Eq)]
pub struct PlaceholderToken(u64);

enum Entry {
    Message(Message),
    Placeholder(u64),
}

/// Append-only log plus the active filter category.
pub struct MessageLog {
    entries: Vec<Entry>,
    active_category: Category,
    next_placeholder: u64,
}

impl MessageLog {
    #[must_use]
    pub fn new(active_category: Category) -> Self {
        Self {
            entries: Vec::new(),
            active_category,
            next_placeholder: 0,
        }
    }

    /// Append a message; its category is derived here, once, and never again.
    pub fn append(&mut self, sender: MessageSender, content: MessageContent) -> Message {
        let message = Message {
            category: derive_category(sender, &content),
            content,
            sender,
            timestamp: SystemTime::now(),
        };
        self.entries.push(Entry::Message(message.clone()));
        message
    }

    /// Insert the visible pending placeholder for an in-flight command.
    pub fn insert_placeholder(&mut self) -> PlaceholderToken {
        self.next_placeholder += 1;
        let id = self.next_placeholder;
        self.entries.push(Entry::Placeholder(id));
        PlaceholderToken(id)
    }

    /// Remove a placeholder in place (not merely hidden); true when found.
    pub fn remove_placeholder(&mut self, token: PlaceholderToken) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|entry| !matches!(entry, Entry::Placeholder(id) if *id == token.0));
        self.entries.len() != before
    }

    /// Number of placeholders currently visible.
    #[must_use]
    pub fn placeholder_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(entry, Entry::Placeholder(_)))
            .count()
    }

    /// All messages in arrival order, unfiltered.
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().filter_map(|entry| match entry {
            Entry::Message(message) => Some(message),
            Entry::Placeholder(_) => None,
        })
    }

    /// Number of real messages (placeholders excluded).
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Switch the live filter; re-evaluates visibility, never re-derives.
    pub fn set_active_category(&mut self, category: Category) {
        self.active_category = category;
    }

    #[must_use]
    pub fn active_category(&self) -> Category {
        self.active_category
    }

    /// Filtered view in original order. User messages are always visible so
    /// the conversational context survives any filter.
    pub fn visible(&self) -> impl Iterator<Item = &Message> {
        let active = self.active_category;
        self.messages().filter(move |message| {
            active == Category::All
                || message.sender == MessageSender::User
                || message.category == active
        })
    }
}

fn derive_category(sender: MessageSender, content: &MessageContent) -> Category {
    if sender == MessageSender::User {
        return Category::All;
    }
    match content {
        MessageContent::Fragment(fragment) => fragment.category(),
        MessageContent::Text(text) => classify_text(text),
    }
}

fn classify_text(text: &str) -> Category {
    let lowered = text.to_lowercase();
    let groups: [(&[&str], Category); 4] = [
        (TASK_TERMS, Category::Tasks),
        (NOTE_TERMS, Category::Notes),
        (EVENT_TERMS, Category::Events),
        (IMAGE_TERMS, Category::Images),
    ];
    for (terms, category) in groups {
        if terms.iter().any(|term| lowered.contains(term)) {
            return category;
        }
    }
    Category::All
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn text(value: &str) -> MessageContent {
        MessageContent::Text(value.to_string())
    }

    #[test]
    fn user_messages_are_always_category_all() {
        let mut log = MessageLog::new(Category::All);
        let message = log.append(MessageSender::User, text("add task: buy milk"));
        assert_eq!(message.category, Category::All);
    }

    #[test]
    fn bot_text_classifies_by_first_matching_group() {
        let mut log = MessageLog::new(Category::All);
        assert_eq!(
            log.append(MessageSender::Bot, text("Task added")).category,
            Category::Tasks
        );
        assert_eq!(
            log.append(MessageSender::Bot, text("Note created")).category,
            Category::Notes
        );
        assert_eq!(
            log.append(MessageSender::Bot, text("Event deleted: standup"))
                .category,
            Category::Events
        );
        assert_eq!(
            log.append(MessageSender::Bot, text("Here are your photos"))
                .category,
            Category::Images
        );
        assert_eq!(
            log.append(MessageSender::Bot, text("Goodbye!")).category,
            Category::All
        );
    }

    #[test]
    fn task_terms_win_over_later_groups() {
        let mut log = MessageLog::new(Category::All);
        // Mentions both a task and a meeting; the task group is checked first.
        let message = log.append(MessageSender::Bot, text("Task added for the meeting"));
        assert_eq!(message.category, Category::Tasks);
    }

    #[test]
    fn fragments_classify_by_payload_kind() {
        let fragment = Fragment::TaskList(vec![]);
        assert_eq!(fragment.category(), Category::Tasks);
        let gallery = Fragment::ImageGallery(vec![]);
        assert_eq!(gallery.category(), Category::Images);
    }

    #[test]
    fn filter_hides_other_categories_but_never_user_messages() {
        let mut log = MessageLog::new(Category::All);
        log.append(MessageSender::User, text("list tasks"));
        log.append(MessageSender::Bot, text("Task added"));
        log.append(MessageSender::Bot, text("Note created"));

        log.set_active_category(Category::Tasks);
        let visible: Vec<_> = log.visible().collect();
        assert_eq!(visible.len(), 2);
        assert_eq!(visible[0].sender, MessageSender::User);
        assert_eq!(visible[1].category, Category::Tasks);

        log.set_active_category(Category::All);
        assert_eq!(log.visible().count(), 3);
    }

    #[test]
    fn filter_preserves_original_order() {
        let mut log = MessageLog::new(Category::All);
        log.append(MessageSender::Bot, text("Task one added"));
        log.append(MessageSender::User, text("what about notes"));
        log.append(MessageSender::Bot, text("Task two added"));

        log.set_active_category(Category::Tasks);
        let texts: Vec<_> = log
            .visible()
            .map(|m| m.content.display_text())
            .collect();
        assert_eq!(
            texts,
            vec!["Task one added", "what about notes", "Task two added"]
        );
    }

    #[test]
    fn categories_are_not_rederived_when_filter_changes() {
        let mut log = MessageLog::new(Category::All);
        let appended = log.append(MessageSender::Bot, text("Task added"));
        log.set_active_category(Category::Notes);
        log.set_active_category(Category::Tasks);
        let stored = log.messages().next().expect("message");
        assert_eq!(stored.category, appended.category);
    }

    #[test]
    fn placeholders_insert_and_remove_in_place() {
        let mut log = MessageLog::new(Category::All);
        let token = log.insert_placeholder();
        assert_eq!(log.placeholder_count(), 1);
        log.append(MessageSender::Bot, text("Task added"));
        assert!(log.remove_placeholder(token));
        assert_eq!(log.placeholder_count(), 0);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn removing_a_placeholder_twice_is_a_no_op() {
        let mut log = MessageLog::new(Category::All);
        let first = log.insert_placeholder();
        let second = log.insert_placeholder();
        assert!(log.remove_placeholder(first));
        assert_eq!(log.placeholder_count(), 1);
        assert!(log.remove_placeholder(second));
        assert_eq!(log.placeholder_count(), 0);
    }

    #[test]
    fn category_parse_round_trips_canonical_names() {
        for category in [
            Category::All,
            Category::Tasks,
            Category::Notes,
            Category::Events,
            Category::Images,
        ] {
            assert_eq!(Category::parse(category.as_str()), Some(category));
        }
        assert_eq!(Category::parse("bogus"), None);
    }

    proptest! {
        #[test]
        fn setting_the_same_category_twice_is_idempotent(
            senders in prop::collection::vec(0u8..3, 0..24),
            category in 0u8..5,
        ) {
            let category = [
                Category::All,
                Category::Tasks,
                Category::Notes,
                Category::Events,
                Category::Images,
            ][category as usize];
            let mut log = MessageLog::new(Category::All);
            for (i, sender) in senders.iter().enumerate() {
                let sender = [MessageSender::User, MessageSender::Bot, MessageSender::System]
                    [*sender as usize];
                log.append(sender, MessageContent::Text(format!("task note event {i}")));
            }

            log.set_active_category(category);
            let once: Vec<Message> = log.visible().cloned().collect();
            log.set_active_category(category);
            let twice: Vec<Message> = log.visible().cloned().collect();
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn user_messages_survive_every_filter(
            texts in prop::collection::vec(".*", 0..12),
            category in 0u8..5,
        ) {
            let category = [
                Category::All,
                Category::Tasks,
                Category::Notes,
                Category::Events,
                Category::Images,
            ][category as usize];
            let mut log = MessageLog::new(Category::All);
            for text in &texts {
                log.append(MessageSender::User, MessageContent::Text(text.clone()));
            }
            log.set_active_category(category);
            prop_assert_eq!(log.visible().count(), texts.len());
        }
    }
}
