//! History loader: replaying stored messages into a fresh log.

use serde::{Deserialize, Serialize};

use crate::client::ChatBackend;
use crate::error::Result;
use crate::message_log::{EntryId, Message, MessageLog, Role};
use crate::observability::HISTORY_LOADS;

/// One stored message as the backend returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    /// Backend role, e.g. `"assistant"` or `"user"`.
    pub role: String,
    /// Message text.
    pub content: String,
    /// Opaque server-side metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<String>,
}

impl From<HistoryMessage> for Message {
    fn from(message: HistoryMessage) -> Self {
        Message::new(Role::from_backend(&message.role), message.content)
    }
}

/// Fetches the history, mapped to display messages, in server order.
pub async fn load_history<B: ChatBackend + ?Sized>(
    backend: &B,
    token: &str,
) -> Result<Vec<Message>> {
    let history = backend.history(token).await?;
    HISTORY_LOADS.click();
    tracing::debug!(messages = history.len(), "history loaded");
    Ok(history.into_iter().map(Message::from).collect())
}

/// Appends `messages` to `log` in order, returning their handles.
pub fn replay(log: &mut MessageLog, messages: Vec<Message>) -> Vec<EntryId> {
    messages
        .into_iter()
        .map(|message| log.append(message))
        .collect()
}
