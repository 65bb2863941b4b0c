//! Centralized configuration constants for pastewire.
//!
//! All tunable parameters live here so they can be reviewed and adjusted
//! in a single place. Wire-format shapes (frame JSON fields, descriptor
//! encoding) stay in their respective modules.

use std::time::Duration;

// ── Transfer / Chunking ──────────────────────────────────────────────────────

/// File chunk size in bytes (16 KB).
///
/// Sized to stay safely under the message-size limits commonly enforced by
/// WebRTC data channel implementations, so a chunk is never silently
/// truncated or rejected by the remote SCTP stack.
pub const CHUNK_SIZE: usize = 16 * 1024;

// ── Signaling / Negotiation ──────────────────────────────────────────────────

/// Upper bound on the wait for ICE candidate gathering to complete.
///
/// Gathering normally finishes well under a second; with an unreachable
/// STUN server it can stall indefinitely. The signaling payload is emitted
/// with whatever candidates exist once this elapses, trading connection
/// success rate for a single copy/paste round trip instead of many.
pub const ICE_GATHER_TIMEOUT: Duration = Duration::from_millis(3000);

/// STUN servers used to discover public addresses.
pub const STUN_SERVERS: [&str; 2] = [
    "stun:stun.l.google.com:19302",
    "stun:stun1.l.google.com:19302",
];

// ── Logical channels ─────────────────────────────────────────────────────────

/// Label of the text chat channel.
pub const CHAT_CHANNEL_LABEL: &str = "chat";

/// Label of the file transfer channel.
pub const FILE_CHANNEL_LABEL: &str = "file";
