//! Library error taxonomy.
//!
//! Inbound-frame problems are deliberately absent: malformed frames are
//! logged and dropped at the channel boundary (see [`crate::core::protocol`])
//! and never surface to callers. Transport failures surface as a
//! [`ConnectionState`](crate::core::session::ConnectionState) transition, not
//! as an error value; the variants here cover the explicitly-invoked
//! operations only.

use crate::core::signaling::DescriptorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A signaling payload decoded as neither base64-of-JSON nor raw JSON.
    #[error("malformed signaling payload: {0}")]
    MalformedSignalingPayload(String),

    /// The payload decoded fine but carried the wrong half of the exchange
    /// (an answer where an offer was expected, or vice versa).
    #[error("expected {expected} descriptor, got {got}")]
    UnexpectedDescriptor {
        expected: DescriptorKind,
        got: DescriptorKind,
    },

    /// An operation that needs a live connection was invoked before
    /// `host_chat`/`join_chat` created one.
    #[error("no active connection")]
    NoConnection,

    /// The underlying transport reported an error while negotiating.
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
