//! Wire frames and the channel-boundary classifier.
//!
//! Every inbound frame is decoded exactly once, here, into a tagged
//! [`WireFrame`]. The two channel protocols then act only on the variants
//! they own and ignore the rest, so a frame that strays onto the wrong
//! channel is a no-op rather than a parse hazard.
//!
//! Wire shapes (interoperable with web peers):
//!
//! - chat:      `{"message": "..."}` (text frame)
//! - file meta: `{"type": "file-meta", "fileName": "...", "fileType": "...", "fileSize": N}` (text frame)
//! - chunk:     raw bytes (binary frame)

pub mod chat;
pub mod file;

use crate::core::connection::transport::InboundFrame;
use bytes::Bytes;
use serde::Deserialize;
use thiserror::Error;

pub use chat::ChatFrame;
pub use file::FileMetaFrame;

/// A classified inbound frame.
#[derive(Debug, Clone)]
pub enum WireFrame {
    Chat(ChatFrame),
    FileMeta(FileMetaFrame),
    Chunk(Bytes),
}

/// Why a text frame could not be classified. Callers log and drop; this
/// never propagates past the channel handler.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("unparseable frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unrecognized frame type {0:?}")]
    UnknownTag(String),
}

/// Tag sniffer: pulls the optional `type` field out of a text frame
/// without committing to a body shape.
#[derive(Deserialize)]
struct FrameTag {
    #[serde(rename = "type")]
    tag: Option<String>,
}

impl WireFrame {
    /// Classify one inbound frame by encoding and declared `type` field.
    pub fn classify(frame: InboundFrame) -> Result<Self, FrameError> {
        match frame {
            InboundFrame::Binary(data) => Ok(WireFrame::Chunk(data)),
            InboundFrame::Text(text) => {
                let sniffed: FrameTag = serde_json::from_str(&text)?;
                match sniffed.tag.as_deref() {
                    Some(file::FILE_META_TAG) => {
                        Ok(WireFrame::FileMeta(serde_json::from_str(&text)?))
                    }
                    Some(other) => Err(FrameError::UnknownTag(other.to_owned())),
                    None => Ok(WireFrame::Chat(serde_json::from_str(&text)?)),
                }
            }
        }
    }
}
