//! Process-wide observable session state: connection state + message log.
//!
//! Mutated only by the negotiator and the channel protocols; a UI layer
//! observes through the [`Observable`] handles and never writes.

use crate::core::message::ChatMessage;
use crate::core::observable::Observable;
use std::fmt;
use tracing::debug;

/// Lifecycle of the one peer connection a session holds.
///
/// `Failed` exists in the type for completeness, but transport failure is
/// surfaced as `Disconnected`: after emitting an offer the host also sits
/// in `Disconnected` ("awaiting answer"), so a dead connection and a
/// not-yet-started one read the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Gathering,
    Connecting,
    Connected,
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Gathering => "gathering",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Observable state shared between the session and its observers.
pub struct SessionState {
    connection_state: Observable<ConnectionState>,
    messages: Observable<Vec<ChatMessage>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            connection_state: Observable::new(ConnectionState::Disconnected),
            messages: Observable::new(Vec::new()),
        }
    }

    /// The session's connection state; read/subscribe only.
    pub fn connection_state(&self) -> &Observable<ConnectionState> {
        &self.connection_state
    }

    /// The ordered message log; read/subscribe only.
    pub fn messages(&self) -> &Observable<Vec<ChatMessage>> {
        &self.messages
    }

    pub(crate) fn set_connection_state(&self, next: ConnectionState) {
        debug!(event = "connection_state", state = %next, "Session state change");
        self.connection_state.set(next);
    }

    pub(crate) fn append_message(&self, message: ChatMessage) {
        self.messages.update(|log| log.push(message));
    }

    /// Drop every subscriber on both observables. The message log itself is
    /// kept; only the notification fan-out is torn down.
    pub(crate) fn teardown(&self) {
        self.connection_state.clear_subscribers();
        self.messages.clear_subscribers();
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Sender;

    #[test]
    fn test_starts_disconnected_and_empty() {
        let state = SessionState::new();
        assert_eq!(state.connection_state().get(), ConnectionState::Disconnected);
        assert!(state.messages().get().is_empty());
    }

    #[test]
    fn test_append_preserves_order() {
        let state = SessionState::new();
        state.append_message(ChatMessage::text(Sender::Me, "one"));
        state.append_message(ChatMessage::text(Sender::Them, "two"));

        let log = state.messages().get();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].text.as_deref(), Some("one"));
        assert_eq!(log[1].text.as_deref(), Some("two"));
    }

    #[test]
    fn test_teardown_silences_subscribers() {
        use std::sync::{Arc, Mutex};

        let state = SessionState::new();
        let count = Arc::new(Mutex::new(0usize));
        let sink = count.clone();
        state.connection_state().subscribe(move |_| *sink.lock().unwrap() += 1);

        state.set_connection_state(ConnectionState::Gathering);
        state.teardown();
        state.set_connection_state(ConnectionState::Disconnected);
        assert_eq!(*count.lock().unwrap(), 1);
    }
}
