//! File transfer protocol: metadata framing, chunking, and reassembly.
//!
//! A transfer is one metadata text frame followed by the file's bytes as
//! binary frames of [`CHUNK_SIZE`] (the final chunk may be shorter), in
//! order, with no acknowledgements and no retries — integrity rides on the
//! channel's ordered+reliable delivery. The receive side holds at most one
//! transfer at a time; a new metadata frame silently abandons whatever was
//! in flight.

use crate::core::config::CHUNK_SIZE;
use crate::core::connection::transport::FrameHandler;
use crate::core::error::Result;
use crate::core::message::{ChatMessage, FileAttachment, Sender};
use crate::core::observable::lock;
use crate::core::protocol::{FrameError, WireFrame};
use crate::core::session::SessionState;
use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, trace, warn};

/// Declared `type` of the metadata frame.
pub(crate) const FILE_META_TAG: &str = "file-meta";

/// The metadata envelope preceding a file's chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "file-meta", rename_all = "camelCase")]
pub struct FileMetaFrame {
    pub file_name: String,
    pub file_type: String,
    pub file_size: u64,
}

// ── Outbound ─────────────────────────────────────────────────────────────────

/// A file staged for sending: name, MIME type, and full content.
#[derive(Debug, Clone)]
pub struct OutgoingFile {
    pub name: String,
    pub mime_type: String,
    pub data: Bytes,
}

impl OutgoingFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Read a file from disk, taking the name from the path and guessing
    /// the MIME type from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file")
            .to_owned();
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_owned();
        Ok(Self::new(name, mime_type, Bytes::from(data)))
    }

    /// The metadata frame announcing this file.
    pub(crate) fn meta(&self) -> FileMetaFrame {
        FileMetaFrame {
            file_name: self.name.clone(),
            file_type: self.mime_type.clone(),
            file_size: self.data.len() as u64,
        }
    }

    /// The attachment for the sender's own log entry. Shares the buffer
    /// with `data`.
    pub(crate) fn attachment(&self) -> FileAttachment {
        FileAttachment {
            name: self.name.clone(),
            mime_type: self.mime_type.clone(),
            data: self.data.clone(),
        }
    }
}

/// Split a payload into send-order chunks of [`CHUNK_SIZE`].
///
/// Chunks are zero-copy slices of the input; an empty payload yields no
/// chunks.
pub fn chunk_frames(data: &Bytes) -> impl Iterator<Item = Bytes> + '_ {
    let total = data.len();
    (0..total)
        .step_by(CHUNK_SIZE)
        .map(move |start| data.slice(start..usize::min(start + CHUNK_SIZE, total)))
}

// ── Inbound ──────────────────────────────────────────────────────────────────

/// The single in-flight incoming transfer: metadata plus accumulated chunks.
#[derive(Debug)]
pub struct IncomingTransfer {
    name: String,
    mime_type: String,
    total_size: u64,
    received_size: u64,
    chunks: Vec<Bytes>,
}

impl IncomingTransfer {
    pub fn new(meta: FileMetaFrame) -> Self {
        Self {
            name: meta.file_name,
            mime_type: meta.file_type,
            total_size: meta.file_size,
            received_size: 0,
            chunks: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn received(&self) -> u64 {
        self.received_size
    }

    pub fn total(&self) -> u64 {
        self.total_size
    }

    /// Accept one chunk; returns the reassembled attachment once
    /// `received >= total`.
    ///
    /// Completion is `>=`, not `==`: an oversized final chunk still
    /// completes the transfer and its excess bytes are kept in the blob.
    pub fn push_chunk(&mut self, chunk: Bytes) -> Option<FileAttachment> {
        self.received_size += chunk.len() as u64;
        self.chunks.push(chunk);
        if self.received_size < self.total_size {
            return None;
        }

        let mut assembled = BytesMut::with_capacity(self.received_size as usize);
        for chunk in &self.chunks {
            assembled.extend_from_slice(chunk);
        }
        Some(FileAttachment {
            name: self.name.clone(),
            mime_type: self.mime_type.clone(),
            data: assembled.freeze(),
        })
    }
}

/// Build the inbound handler installed on the file channel.
///
/// Text frames (re)initialize the in-flight transfer; binary frames
/// accumulate into it. A binary frame with no transfer in flight is
/// dropped, as is anything malformed.
pub(crate) fn inbound_handler(
    state: Arc<SessionState>,
    slot: Arc<Mutex<Option<IncomingTransfer>>>,
) -> FrameHandler {
    Box::new(move |frame| match WireFrame::classify(frame) {
        Ok(WireFrame::FileMeta(meta)) => {
            let mut guard = lock(&slot);
            if let Some(previous) = guard.take() {
                debug!(
                    event = "file_transfer_superseded",
                    name = %previous.name(),
                    received = previous.received(),
                    total = previous.total(),
                    "New metadata frame abandons in-progress transfer"
                );
            }
            info!(
                event = "file_receive_started",
                name = %meta.file_name,
                mime = %meta.file_type,
                bytes = meta.file_size,
                "Incoming file announced"
            );
            *guard = Some(IncomingTransfer::new(meta));
        }
        Ok(WireFrame::Chunk(data)) => {
            let mut guard = lock(&slot);
            let Some(transfer) = guard.as_mut() else {
                debug!(
                    event = "orphan_chunk_dropped",
                    bytes = data.len(),
                    "Binary frame with no transfer in flight"
                );
                return;
            };
            match transfer.push_chunk(data) {
                Some(attachment) => {
                    info!(
                        event = "file_receive_complete",
                        name = %attachment.name,
                        bytes = attachment.data.len(),
                        "File reassembled"
                    );
                    *guard = None;
                    // Release the slot before fanning out to subscribers.
                    drop(guard);
                    state.append_message(ChatMessage::file(Sender::Them, attachment));
                }
                None => {
                    trace!(
                        event = "file_chunk_received",
                        name = %transfer.name(),
                        received = transfer.received(),
                        total = transfer.total(),
                    );
                }
            }
        }
        Ok(WireFrame::Chat(_)) => {
            debug!(event = "file_unexpected_frame", "Chat frame on file channel ignored");
        }
        Err(err) => log_dropped(&err),
    })
}

fn log_dropped(err: &FrameError) {
    warn!(event = "file_frame_dropped", error = %err, "Dropping malformed file frame");
}
