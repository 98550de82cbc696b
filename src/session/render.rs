//! Total mapping from reply action tags to rendered message content.
//!
//! Every recognized tag gets a typed fragment when its payload decodes; any
//! unrecognized tag, missing payload, or malformed payload falls back to the
//! reply's message text verbatim.

use crate::protocol::{ActionKind, DraftPayload, EventItem, FileItem, NoteItem, TaskItem};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::history::{Fragment, MessageContent};

fn decode<T: DeserializeOwned>(data: Option<&Value>) -> Option<T> {
    data.and_then(|value| serde_json::from_value(value.clone()).ok())
}

fn fallback(message: Option<&str>) -> MessageContent {
    MessageContent::Text(message.unwrap_or("Done.").to_string())
}

/// Render a completed reply into log content.
pub(crate) fn render_completed(
    action: Option<ActionKind>,
    message: Option<&str>,
    data: Option<&Value>,
) -> MessageContent {
    let Some(action) = action else {
        return fallback(message);
    };
    let fragment = match action {
        ActionKind::AddTask | ActionKind::CompleteTask => {
            decode::<TaskItem>(data).map(Fragment::Task)
        }
        ActionKind::ListTasks => decode::<Vec<TaskItem>>(data).map(Fragment::TaskList),
        ActionKind::CreateNote | ActionKind::GetNote => {
            decode::<NoteItem>(data).map(Fragment::Note)
        }
        ActionKind::ListNotes | ActionKind::SearchNotes => {
            decode::<Vec<NoteItem>>(data).map(Fragment::NoteList)
        }
        ActionKind::CreateEvent | ActionKind::GetEvent | ActionKind::ScheduleMeet => {
            decode::<EventItem>(data).map(Fragment::Event)
        }
        ActionKind::ListEvents | ActionKind::ListToday | ActionKind::ListDate => {
            decode::<Vec<EventItem>>(data).map(Fragment::EventList)
        }
        ActionKind::ListFiles | ActionKind::SearchFiles | ActionKind::ViewFolder => {
            decode::<Vec<FileItem>>(data).map(Fragment::FileList)
        }
        ActionKind::ShowImages => decode::<Vec<FileItem>>(data).map(Fragment::ImageGallery),
        ActionKind::ShowImage => decode::<FileItem>(data)
            .map(|file| Fragment::ImageGallery(vec![file]))
            .or_else(|| decode::<Vec<FileItem>>(data).map(Fragment::ImageGallery)),
        ActionKind::DraftEmail
        | ActionKind::DraftSummary
        | ActionKind::RefineDraft
        | ActionKind::ShowDraft => decode::<DraftPayload>(data).map(Fragment::Draft),
        // Message-only branches, including Unknown.
        ActionKind::DeleteTask
        | ActionKind::DeleteNote
        | ActionKind::DeleteEvent
        | ActionKind::DeleteAllEvents
        | ActionKind::ConfirmDeleteAll
        | ActionKind::SendMeetInvite
        | ActionKind::SummarizeFile
        | ActionKind::ClearDraft
        | ActionKind::SendDraft
        | ActionKind::Help
        | ActionKind::Exit
        | ActionKind::Unknown => None,
    };
    match fragment {
        Some(fragment) => MessageContent::Fragment(fragment),
        None => fallback(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn add_task_renders_an_unchecked_task_fragment() {
        let data = json!({"id": "1", "text": "buy milk", "due": "tomorrow", "completed": false});
        let content = render_completed(
            Some(ActionKind::AddTask),
            Some("Task added"),
            Some(&data),
        );
        match content {
            MessageContent::Fragment(Fragment::Task(task)) => {
                assert_eq!(task.text, "buy milk");
                assert!(!task.completed);
                assert_eq!(task.due.as_deref(), Some("tomorrow"));
            }
            other => panic!("unexpected content: {other:?}"),
        }
    }

    #[test]
    fn list_replies_render_typed_lists() {
        let data = json!([
            {"id": "1", "title": "standup", "date": "tomorrow", "time": "9am"},
            {"id": "2", "title": "retro"}
        ]);
        let content = render_completed(Some(ActionKind::ListEvents), None, Some(&data));
        match content {
            MessageContent::Fragment(Fragment::EventList(events)) => {
                assert_eq!(events.len(), 2);
                assert_eq!(events[0].title, "standup");
            }
            other => panic!("unexpected content: {other:?}"),
        }
    }

    #[test]
    fn show_image_wraps_a_single_file_into_a_gallery() {
        let data = json!({"id": "f1", "name": "cat.jpg"});
        let content = render_completed(Some(ActionKind::ShowImage), None, Some(&data));
        match content {
            MessageContent::Fragment(Fragment::ImageGallery(files)) => {
                assert_eq!(files.len(), 1);
                assert_eq!(files[0].name, "cat.jpg");
            }
            other => panic!("unexpected content: {other:?}"),
        }
    }

    #[test]
    fn malformed_payload_falls_back_to_the_message() {
        let data = json!({"unexpected": "shape"});
        let content = render_completed(
            Some(ActionKind::ListTasks),
            Some("Here are your tasks"),
            Some(&data),
        );
        assert_eq!(
            content,
            MessageContent::Text("Here are your tasks".to_string())
        );
    }

    #[test]
    fn unknown_action_renders_message_verbatim() {
        let content = render_completed(Some(ActionKind::Unknown), Some("Please log in"), None);
        assert_eq!(content, MessageContent::Text("Please log in".to_string()));
    }

    #[test]
    fn missing_everything_still_produces_an_entry() {
        let content = render_completed(None, None, None);
        assert_eq!(content, MessageContent::Text("Done.".to_string()));
    }
}
