//! Session message log entries.
//!
//! Entries are immutable once appended; the log's insertion order is the
//! display order.

use bytes::Bytes;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Which side of the connection produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    Me,
    Them,
}

/// A received or sent file, reassembled in memory.
///
/// `data` is the blob handle: cloning an attachment shares the underlying
/// buffer rather than copying it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttachment {
    pub name: String,
    pub mime_type: String,
    pub data: Bytes,
}

/// One entry in the session's ordered message log.
///
/// Either `text` or `file` is set, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender: Sender,
    pub text: Option<String>,
    pub file: Option<FileAttachment>,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    /// File transfer progress, 0–100. Reserved for UI use; entries are
    /// never mutated after being appended.
    pub progress: Option<u8>,
}

impl ChatMessage {
    /// Build a text entry stamped with the current time.
    pub fn text(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
            text: Some(text.into()),
            file: None,
            timestamp_ms: now_ms(),
            progress: None,
        }
    }

    /// Build a file entry stamped with the current time.
    pub fn file(sender: Sender, file: FileAttachment) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
            text: None,
            file: Some(file),
            timestamp_ms: now_ms(),
            progress: None,
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
