//! Chat protocol: the `{"message": …}` envelope and its inbound handler.

use crate::core::connection::transport::FrameHandler;
use crate::core::message::{ChatMessage, Sender};
use crate::core::protocol::{FrameError, WireFrame};
use crate::core::session::SessionState;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// The chat wire envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatFrame {
    pub message: String,
}

impl ChatFrame {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Build the inbound handler installed on the chat channel.
///
/// A non-empty `message` appends a Them entry to the session log. Anything
/// else — empty messages, frames belonging to the file protocol, or
/// unparseable text — is dropped without disturbing the session.
pub(crate) fn inbound_handler(state: Arc<SessionState>) -> FrameHandler {
    Box::new(move |frame| match WireFrame::classify(frame) {
        Ok(WireFrame::Chat(chat)) if !chat.message.is_empty() => {
            state.append_message(ChatMessage::text(Sender::Them, chat.message));
        }
        Ok(WireFrame::Chat(_)) => {
            debug!(event = "chat_empty_message", "Dropping chat frame with empty message");
        }
        Ok(_) => {
            debug!(event = "chat_unexpected_frame", "Non-chat frame on chat channel ignored");
        }
        Err(err) => log_dropped(&err),
    })
}

fn log_dropped(err: &FrameError) {
    warn!(event = "chat_frame_dropped", error = %err, "Dropping malformed chat frame");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::connection::transport::InboundFrame;
    use bytes::Bytes;

    fn text(frame: &str) -> InboundFrame {
        InboundFrame::Text(frame.to_owned())
    }

    #[test]
    fn test_inbound_message_appends_them_entry() {
        let state = Arc::new(SessionState::new());
        let handler = inbound_handler(state.clone());

        handler(text(r#"{"message":"hello there"}"#));

        let log = state.messages().get();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].sender, Sender::Them);
        assert_eq!(log[0].text.as_deref(), Some("hello there"));
    }

    #[test]
    fn test_empty_message_is_dropped() {
        let state = Arc::new(SessionState::new());
        let handler = inbound_handler(state.clone());

        handler(text(r#"{"message":""}"#));
        assert!(state.messages().get().is_empty());
    }

    #[test]
    fn test_malformed_frame_is_dropped() {
        let state = Arc::new(SessionState::new());
        let handler = inbound_handler(state.clone());

        handler(text("{{{"));
        handler(text(r#"{"other":"shape"}"#));
        assert!(state.messages().get().is_empty());
    }

    #[test]
    fn test_binary_frame_on_chat_channel_is_ignored() {
        let state = Arc::new(SessionState::new());
        let handler = inbound_handler(state.clone());

        handler(InboundFrame::Binary(Bytes::from_static(b"\x00\x01")));
        assert!(state.messages().get().is_empty());
    }

    #[test]
    fn test_frame_roundtrip() {
        let frame = ChatFrame::new("hi");
        let json = serde_json::to_string(&frame).unwrap();
        assert_eq!(json, r#"{"message":"hi"}"#);
        let back: ChatFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(back, frame);
    }
}
