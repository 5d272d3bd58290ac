//! The message log: the ordered record of everything shown in the chat view.
//!
//! Entries are append-only and display order is insertion order. The only
//! mutation allowed after an append is replacing the text of a bot message
//! while its response is still streaming; once the stream closes the entry
//! is frozen like every other.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Who a message is displayed as coming from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The local user.
    User,
    /// The chat backend.
    Bot,
}

impl Role {
    /// Maps a backend history role to a display role.
    ///
    /// Only `"assistant"` is shown as the bot; every other role is the user.
    pub fn from_backend(role: &str) -> Self {
        if role == "assistant" {
            Role::Bot
        } else {
            Role::User
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Bot => write!(f, "bot"),
        }
    }
}

/// A chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Display role.
    pub role: Role,
    /// Message text.
    pub text: String,
    /// Label of the agent that produced a bot message, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_label: Option<String>,
}

impl Message {
    /// Creates a message with the given role and text.
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            agent_label: None,
        }
    }

    /// Creates a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    /// Creates a bot message.
    pub fn bot(text: impl Into<String>) -> Self {
        Self::new(Role::Bot, text)
    }

    /// Attaches an agent label.
    pub fn with_agent_label(mut self, label: impl Into<String>) -> Self {
        self.agent_label = Some(label.into());
        self
    }
}

/// What kind of placeholder an upload leaves in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// An image, shown with a local preview.
    Image,
    /// Any other file, shown by name.
    File,
}

/// The record of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadArtifact {
    /// Name of the uploaded file.
    pub file_name: String,
    /// Image or plain file.
    pub kind: ArtifactKind,
    /// Local preview reference; present only for images.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
}

/// One entry in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Entry {
    /// A user or bot message.
    Message(Message),
    /// An upload placeholder.
    Upload(UploadArtifact),
}

impl Entry {
    /// Returns the message, if this entry is one.
    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Entry::Message(message) => Some(message),
            Entry::Upload(_) => None,
        }
    }

    /// Returns the upload artifact, if this entry is one.
    pub fn as_upload(&self) -> Option<&UploadArtifact> {
        match self {
            Entry::Message(_) => None,
            Entry::Upload(artifact) => Some(artifact),
        }
    }
}

impl From<Message> for Entry {
    fn from(message: Message) -> Self {
        Entry::Message(message)
    }
}

impl From<UploadArtifact> for Entry {
    fn from(artifact: UploadArtifact) -> Self {
        Entry::Upload(artifact)
    }
}

/// Stable handle to an entry; its position in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(usize);

impl EntryId {
    /// Position of the entry in display order.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Append-only, ordered sequence of chat entries.
#[derive(Debug, Default, Clone)]
pub struct MessageLog {
    entries: Vec<Entry>,
    streaming: BTreeSet<EntryId>,
}

impl MessageLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry and returns its handle.
    ///
    /// This is the single append primitive used by live chat, uploads and
    /// history replay.
    pub fn append(&mut self, entry: impl Into<Entry>) -> EntryId {
        let id = EntryId(self.entries.len());
        self.entries.push(entry.into());
        id
    }

    /// Appends a bot message that may keep changing until [`MessageLog::close`].
    pub fn append_streaming(&mut self, message: Message) -> EntryId {
        let id = self.append(message);
        self.streaming.insert(id);
        id
    }

    /// Replaces the text of a streaming bot message.
    ///
    /// Returns false, leaving the log untouched, if `id` is not open.
    pub fn replace_streaming_text(&mut self, id: EntryId, text: &str) -> bool {
        if !self.streaming.contains(&id) {
            return false;
        }
        match self.entries.get_mut(id.0) {
            Some(Entry::Message(message)) => {
                message.text.clear();
                message.text.push_str(text);
                true
            }
            _ => false,
        }
    }

    /// Freezes a streaming entry.
    pub fn close(&mut self, id: EntryId) {
        self.streaming.remove(&id);
    }

    /// True while `id` is still accepting streamed text.
    pub fn is_streaming(&self, id: EntryId) -> bool {
        self.streaming.contains(&id)
    }

    /// Returns the entry for `id`.
    pub fn get(&self, id: EntryId) -> Option<&Entry> {
        self.entries.get(id.0)
    }

    /// All entries in display order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Iterates over entries with their handles.
    pub fn iter(&self) -> impl Iterator<Item = (EntryId, &Entry)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| (EntryId(idx), entry))
    }

    /// Iterates over the messages only, skipping uploads.
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().filter_map(Entry::as_message)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been appended.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
