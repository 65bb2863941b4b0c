//! Connection negotiator: owns the transport connection and both logical
//! channels, and drives the manual offer/answer exchange.
//!
//! All candidates are gathered before a payload is emitted (bounded by
//! [`ICE_GATHER_TIMEOUT`]), so each direction of the exchange is a single
//! copy/paste instead of a trickle of candidate messages.

pub mod router;
pub mod transport;
pub mod webrtc;

#[cfg(test)]
pub(crate) mod mock;

use crate::core::config::{CHAT_CHANNEL_LABEL, FILE_CHANNEL_LABEL, ICE_GATHER_TIMEOUT};
use crate::core::error::{Error, Result};
use crate::core::message::{ChatMessage, Sender};
use crate::core::observable::lock;
use crate::core::protocol::chat::ChatFrame;
use crate::core::protocol::file::{IncomingTransfer, OutgoingFile};
use crate::core::protocol::{chat, file};
use crate::core::session::{ConnectionState, SessionState};
use crate::core::signaling::{self, DescriptorKind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use self::transport::{
    GatheringState, LinkState, MessageChannel, SessionTransport, TransportConnector,
};

pub(crate) type ChannelSlot = Arc<Mutex<Option<Arc<dyn MessageChannel>>>>;

/// A peer-to-peer chat session over one transport connection.
///
/// The session exclusively owns the connection object and both channels;
/// replacing or cleaning up the connection transitively closes them. State
/// and the message log are exposed through [`SessionState`].
pub struct ChatSession {
    connector: Arc<dyn TransportConnector>,
    state: Arc<SessionState>,
    transport: Mutex<Option<Arc<dyn SessionTransport>>>,
    chat_channel: ChannelSlot,
    file_channel: ChannelSlot,
    incoming: Arc<Mutex<Option<IncomingTransfer>>>,
    /// Bumped whenever the connection is replaced or torn down; callbacks
    /// registered on an older connection carry the old value and are
    /// ignored when they fire late.
    epoch: Arc<AtomicU64>,
}

impl ChatSession {
    pub fn new(connector: Arc<dyn TransportConnector>) -> Self {
        Self {
            connector,
            state: Arc::new(SessionState::new()),
            transport: Mutex::new(None),
            chat_channel: Arc::new(Mutex::new(None)),
            file_channel: Arc::new(Mutex::new(None)),
            incoming: Arc::new(Mutex::new(None)),
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Session over the production WebRTC transport with the default STUN
    /// servers.
    pub fn with_webrtc() -> Self {
        Self::new(Arc::new(webrtc::WebRtcConnector::new()))
    }

    /// Observable connection state and message log.
    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }

    // ── Signaling roles ──────────────────────────────────────────────────

    /// Host a session: create the channels, produce an offer, and return
    /// the encoded payload once candidate gathering settles.
    ///
    /// On return the state is `Disconnected` — the offer is out, nothing is
    /// live until [`accept_answer`](Self::accept_answer) lands and the
    /// transport reports connectivity.
    pub async fn host_chat(&self) -> Result<String> {
        self.state.set_connection_state(ConnectionState::Gathering);
        let transport = self.fresh_transport().await?;

        // Host side creates both channels; the joiner receives them
        // through the router.
        let chat = transport.create_channel(CHAT_CHANNEL_LABEL).await?;
        chat.on_frame(chat::inbound_handler(self.state.clone()));
        *lock(&self.chat_channel) = Some(chat);

        let file = transport.create_channel(FILE_CHANNEL_LABEL).await?;
        file.on_frame(file::inbound_handler(
            self.state.clone(),
            self.incoming.clone(),
        ));
        *lock(&self.file_channel) = Some(file);

        let offer = transport.create_offer().await?;
        transport.set_local_description(&offer).await?;
        wait_for_gathering(transport.as_ref()).await;

        let local = transport
            .local_description()
            .await
            .ok_or_else(|| Error::Transport("no local description after gathering".into()))?;

        // Awaiting the answer is modeled as Disconnected.
        self.state
            .set_connection_state(ConnectionState::Disconnected);
        info!(event = "offer_ready", "Offer payload ready for the remote peer");
        Ok(signaling::encode(&local))
    }

    /// Join a session from a host's offer payload; returns the encoded
    /// answer payload to hand back.
    pub async fn join_chat(&self, offer_payload: &str) -> Result<String> {
        self.state.set_connection_state(ConnectionState::Gathering);
        let transport = self.fresh_transport().await?;

        let offer = signaling::decode(offer_payload)?;
        if offer.kind != DescriptorKind::Offer {
            return Err(Error::UnexpectedDescriptor {
                expected: DescriptorKind::Offer,
                got: offer.kind,
            });
        }
        transport.set_remote_description(&offer).await?;

        let answer = transport.create_answer().await?;
        transport.set_local_description(&answer).await?;
        wait_for_gathering(transport.as_ref()).await;

        let local = transport
            .local_description()
            .await
            .ok_or_else(|| Error::Transport("no local description after gathering".into()))?;

        self.state.set_connection_state(ConnectionState::Connecting);
        info!(event = "answer_ready", "Answer payload ready for the host");
        Ok(signaling::encode(&local))
    }

    /// Accept the joiner's answer payload on the hosting side.
    ///
    /// Does not itself reach `Connected`; that transition arrives through
    /// the transport's connectivity notifications.
    pub async fn accept_answer(&self, answer_payload: &str) -> Result<()> {
        self.state.set_connection_state(ConnectionState::Connecting);

        let answer = signaling::decode(answer_payload)?;
        if answer.kind != DescriptorKind::Answer {
            return Err(Error::UnexpectedDescriptor {
                expected: DescriptorKind::Answer,
                got: answer.kind,
            });
        }

        let transport = self.current_transport().ok_or(Error::NoConnection)?;
        transport.set_remote_description(&answer).await
    }

    // ── Outbound operations ──────────────────────────────────────────────

    /// Send a chat message. Drops silently when the chat channel is not
    /// open — no queueing, no retry.
    pub async fn send_text(&self, text: &str) {
        let Some(channel) = open_channel(&self.chat_channel) else {
            debug!(event = "chat_channel_not_open", "Dropping outbound chat message");
            return;
        };

        match serde_json::to_string(&ChatFrame::new(text)) {
            Ok(json) => {
                if let Err(err) = channel.send_text(&json).await {
                    warn!(event = "chat_send_failed", error = %err, "Chat frame send failed");
                }
            }
            Err(err) => {
                warn!(event = "chat_encode_failed", error = %err, "Could not encode chat frame");
                return;
            }
        }

        // Local echo goes in regardless of delivery.
        self.state
            .append_message(ChatMessage::text(Sender::Me, text));
    }

    /// Send a file. Drops silently when the file channel is not open.
    ///
    /// Emits one metadata frame, appends the local log entry, then streams
    /// the chunks in order. A chunk send failure aborts the rest; the
    /// receiver is left with a transfer that never completes.
    pub async fn send_file(&self, outgoing: OutgoingFile) {
        let Some(channel) = open_channel(&self.file_channel) else {
            debug!(event = "file_channel_not_open", "Dropping outbound file");
            return;
        };

        let meta = outgoing.meta();
        match serde_json::to_string(&meta) {
            Ok(json) => {
                if let Err(err) = channel.send_text(&json).await {
                    warn!(event = "file_meta_send_failed", error = %err, "Metadata send failed");
                    return;
                }
            }
            Err(err) => {
                warn!(event = "file_meta_encode_failed", error = %err, "Could not encode metadata");
                return;
            }
        }

        // The sender's log reflects the attachment before any bytes move.
        self.state
            .append_message(ChatMessage::file(Sender::Me, outgoing.attachment()));

        info!(
            event = "file_send_started",
            name = %outgoing.name,
            bytes = outgoing.data.len(),
            "Sending file"
        );
        for (seq, chunk) in file::chunk_frames(&outgoing.data).enumerate() {
            if let Err(err) = channel.send_binary(chunk).await {
                warn!(
                    event = "file_chunk_send_failed",
                    seq,
                    error = %err,
                    "Aborting file send"
                );
                return;
            }
        }
        info!(event = "file_send_complete", name = %outgoing.name, "File sent");
    }

    // ── Teardown ─────────────────────────────────────────────────────────

    /// Close both channels and the connection, force `Disconnected`, and
    /// tear down observable subscriptions. Safe to call repeatedly.
    pub async fn cleanup(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);

        let chat = lock(&self.chat_channel).take();
        if let Some(chat) = chat {
            chat.close().await;
        }
        let file = lock(&self.file_channel).take();
        if let Some(file) = file {
            file.close().await;
        }
        let transport = lock(&self.transport).take();
        if let Some(transport) = transport {
            transport.close().await;
        }

        *lock(&self.incoming) = None;
        self.state
            .set_connection_state(ConnectionState::Disconnected);
        self.state.teardown();
        info!(event = "session_cleaned_up", "Session torn down");
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn current_transport(&self) -> Option<Arc<dyn SessionTransport>> {
        lock(&self.transport).clone()
    }

    /// Close any existing connection and stand up a fresh one with the
    /// router and link watcher installed.
    async fn fresh_transport(&self) -> Result<Arc<dyn SessionTransport>> {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;

        let previous = lock(&self.transport).take();
        if let Some(previous) = previous {
            debug!(event = "connection_replaced", "Closing previous connection");
            previous.close().await;
        }
        *lock(&self.chat_channel) = None;
        *lock(&self.file_channel) = None;
        *lock(&self.incoming) = None;

        let transport = self.connector.connect().await?;
        self.install_link_watcher(&transport, epoch);
        self.install_router(&transport, epoch);
        *lock(&self.transport) = Some(transport.clone());
        Ok(transport)
    }

    fn install_link_watcher(&self, transport: &Arc<dyn SessionTransport>, epoch: u64) {
        let state = self.state.clone();
        let current = self.epoch.clone();
        transport.on_link_state(Box::new(move |link| {
            if current.load(Ordering::SeqCst) != epoch {
                // Late event from a connection that has been replaced.
                return;
            }
            match link {
                LinkState::Connected | LinkState::Completed => {
                    info!(event = "link_up", "Peer connection established");
                    state.set_connection_state(ConnectionState::Connected);
                }
                LinkState::Failed | LinkState::Disconnected | LinkState::Closed => {
                    warn!(event = "link_down", state = ?link, "Peer connection lost");
                    state.set_connection_state(ConnectionState::Disconnected);
                }
                LinkState::New | LinkState::Checking => {
                    debug!(event = "link_progress", state = ?link, "Connectivity check in progress");
                }
            }
        }));
    }

    fn install_router(&self, transport: &Arc<dyn SessionTransport>, epoch: u64) {
        let state = self.state.clone();
        let incoming = self.incoming.clone();
        let chat_slot = self.chat_channel.clone();
        let file_slot = self.file_channel.clone();
        let current = self.epoch.clone();
        transport.on_incoming_channel(Box::new(move |channel| {
            if current.load(Ordering::SeqCst) != epoch {
                return;
            }
            router::bind_incoming_channel(channel, &state, &incoming, &chat_slot, &file_slot);
        }));
    }
}

fn open_channel(slot: &ChannelSlot) -> Option<Arc<dyn MessageChannel>> {
    lock(slot).clone().filter(|channel| channel.is_open())
}

/// Resolve once candidate gathering completes, or after
/// [`ICE_GATHER_TIMEOUT`] — whichever comes first. Timing out is not an
/// error; the caller proceeds with whatever candidates exist.
async fn wait_for_gathering(transport: &dyn SessionTransport) {
    if transport.gathering_state() == GatheringState::Complete {
        return;
    }

    let (tx, rx) = oneshot::channel::<()>();
    let tx = Arc::new(Mutex::new(Some(tx)));
    transport.on_gathering_state({
        let tx = tx.clone();
        Box::new(move |gathering| {
            if gathering == GatheringState::Complete {
                if let Ok(mut guard) = tx.lock() {
                    if let Some(tx) = guard.take() {
                        let _ = tx.send(());
                    }
                }
            }
        })
    });

    // Gathering may have completed between the first check and handler
    // registration.
    if transport.gathering_state() == GatheringState::Complete {
        return;
    }

    if timeout(ICE_GATHER_TIMEOUT, rx).await.is_err() {
        warn!(
            event = "ice_gather_timeout",
            "Proceeding with a possibly incomplete candidate set"
        );
    }
}
