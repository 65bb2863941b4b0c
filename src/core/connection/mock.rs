//! In-memory transport pair for tests.
//!
//! Two [`ChatSession`](super::ChatSession)s, one per [`Side`], negotiate
//! over this wire exactly as they would over the real stack; the test then
//! calls [`MockWire::establish`] to stand in for ICE/DTLS completing:
//! host-created channels appear on the joiner's side, everything opens,
//! and both link handlers see `Connected`.

use crate::core::error::Result;
use crate::core::observable::lock;
use crate::core::signaling::SessionDescriptor;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use super::transport::{
    ChannelHandler, FrameHandler, GatheringState, GatheringStateHandler, InboundFrame, LinkState,
    LinkStateHandler, MessageChannel, SessionTransport, TransportConnector,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Host,
    Joiner,
}

// ── Wire ─────────────────────────────────────────────────────────────────────

pub struct MockWire {
    host: Mutex<Option<Arc<MockTransport>>>,
    joiner: Mutex<Option<Arc<MockTransport>>>,
    gathering_stalls: Arc<AtomicBool>,
}

impl MockWire {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            host: Mutex::new(None),
            joiner: Mutex::new(None),
            gathering_stalls: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn connector(self: &Arc<Self>, side: Side) -> Arc<dyn TransportConnector> {
        Arc::new(MockConnector {
            wire: self.clone(),
            side,
        })
    }

    /// When set, transports never report gathering complete and the
    /// negotiator has to fall back to its timeout.
    pub fn set_gathering_stalls(&self, stalls: bool) {
        self.gathering_stalls.store(stalls, Ordering::SeqCst);
    }

    /// Stand in for the underlying stack connecting: mirror host channels
    /// to the joiner, open everything, and report `Connected` to both.
    pub fn establish(&self) {
        let host = lock(&self.host).clone().expect("host side never connected");
        let joiner = lock(&self.joiner)
            .clone()
            .expect("joiner side never connected");

        let channels: Vec<Arc<MockChannel>> = lock(&host.created).clone();
        for channel in channels {
            let counterpart = Arc::new(MockChannel::new(channel.label.clone()));
            *lock(&channel.peer) = Arc::downgrade(&counterpart);
            *lock(&counterpart.peer) = Arc::downgrade(&channel);
            channel.open.store(true, Ordering::SeqCst);
            counterpart.open.store(true, Ordering::SeqCst);

            // Keep the counterpart alive even if the router rejects it.
            lock(&joiner.created).push(counterpart.clone());
            joiner.fire_incoming(counterpart);
        }

        host.fire_link(LinkState::Connected);
        joiner.fire_link(LinkState::Connected);
    }

    /// Deliver an extra remotely-created channel with an arbitrary label to
    /// the joiner, as a newer peer might.
    pub fn push_channel_to_joiner(&self, label: &str) {
        let joiner = lock(&self.joiner)
            .clone()
            .expect("joiner side never connected");
        let channel = Arc::new(MockChannel::new(label.to_owned()));
        channel.open.store(true, Ordering::SeqCst);
        lock(&joiner.created).push(channel.clone());
        joiner.fire_incoming(channel);
    }

    /// Frames sent so far on the host's "file" channel, in send order.
    pub fn host_file_frames(&self) -> Vec<InboundFrame> {
        let host = lock(&self.host).clone().expect("host side never connected");
        let channels = lock(&host.created).clone();
        channels
            .iter()
            .find(|c| c.label == crate::core::config::FILE_CHANNEL_LABEL)
            .map(|c| lock(&c.sent).clone())
            .unwrap_or_default()
    }
}

struct MockConnector {
    wire: Arc<MockWire>,
    side: Side,
}

#[async_trait]
impl TransportConnector for MockConnector {
    async fn connect(&self) -> Result<Arc<dyn SessionTransport>> {
        let transport = Arc::new(MockTransport::new(self.wire.gathering_stalls.clone()));
        let slot = match self.side {
            Side::Host => &self.wire.host,
            Side::Joiner => &self.wire.joiner,
        };
        *lock(slot) = Some(transport.clone());
        Ok(transport)
    }
}

// ── Transport ────────────────────────────────────────────────────────────────

pub struct MockTransport {
    gathering_stalls: Arc<AtomicBool>,
    incoming_handler: Mutex<Option<ChannelHandler>>,
    link_handler: Mutex<Option<LinkStateHandler>>,
    gathering_handler: Mutex<Option<GatheringStateHandler>>,
    local: Mutex<Option<SessionDescriptor>>,
    remote: Mutex<Option<SessionDescriptor>>,
    created: Mutex<Vec<Arc<MockChannel>>>,
    closed: AtomicBool,
}

impl MockTransport {
    fn new(gathering_stalls: Arc<AtomicBool>) -> Self {
        Self {
            gathering_stalls,
            incoming_handler: Mutex::new(None),
            link_handler: Mutex::new(None),
            gathering_handler: Mutex::new(None),
            local: Mutex::new(None),
            remote: Mutex::new(None),
            created: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    fn fire_incoming(&self, channel: Arc<MockChannel>) {
        if let Some(handler) = &*lock(&self.incoming_handler) {
            handler(channel);
        }
    }

    fn fire_link(&self, state: LinkState) {
        if let Some(handler) = &*lock(&self.link_handler) {
            handler(state);
        }
    }
}

#[async_trait]
impl SessionTransport for MockTransport {
    async fn create_channel(&self, label: &str) -> Result<Arc<dyn MessageChannel>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(crate::core::error::Error::Transport(
                "connection closed".into(),
            ));
        }
        let channel = Arc::new(MockChannel::new(label.to_owned()));
        lock(&self.created).push(channel.clone());
        Ok(channel)
    }

    fn on_incoming_channel(&self, handler: ChannelHandler) {
        *lock(&self.incoming_handler) = Some(handler);
    }

    fn on_link_state(&self, handler: LinkStateHandler) {
        *lock(&self.link_handler) = Some(handler);
    }

    fn on_gathering_state(&self, handler: GatheringStateHandler) {
        *lock(&self.gathering_handler) = Some(handler);
    }

    fn gathering_state(&self) -> GatheringState {
        if self.gathering_stalls.load(Ordering::SeqCst) {
            GatheringState::New
        } else {
            GatheringState::Complete
        }
    }

    async fn create_offer(&self) -> Result<SessionDescriptor> {
        Ok(SessionDescriptor::offer("v=0\r\nmock offer\r\n"))
    }

    async fn create_answer(&self) -> Result<SessionDescriptor> {
        Ok(SessionDescriptor::answer("v=0\r\nmock answer\r\n"))
    }

    async fn set_local_description(&self, descriptor: &SessionDescriptor) -> Result<()> {
        *lock(&self.local) = Some(descriptor.clone());
        Ok(())
    }

    async fn set_remote_description(&self, descriptor: &SessionDescriptor) -> Result<()> {
        *lock(&self.remote) = Some(descriptor.clone());
        Ok(())
    }

    async fn local_description(&self) -> Option<SessionDescriptor> {
        lock(&self.local).clone()
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        for channel in lock(&self.created).clone() {
            channel.open.store(false, Ordering::SeqCst);
        }
        // The real stack reports a final Closed transition on teardown.
        self.fire_link(LinkState::Closed);
    }
}

// ── Channel ──────────────────────────────────────────────────────────────────

pub struct MockChannel {
    label: String,
    open: AtomicBool,
    handler: Mutex<Option<FrameHandler>>,
    sent: Mutex<Vec<InboundFrame>>,
    peer: Mutex<Weak<MockChannel>>,
}

impl MockChannel {
    fn new(label: String) -> Self {
        Self {
            label,
            open: AtomicBool::new(false),
            handler: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
            peer: Mutex::new(Weak::new()),
        }
    }

    fn deliver_to_peer(&self, frame: InboundFrame) {
        let peer = lock(&self.peer).upgrade();
        if let Some(peer) = peer {
            if let Some(handler) = &*lock(&peer.handler) {
                handler(frame);
            }
        }
    }
}

#[async_trait]
impl MessageChannel for MockChannel {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn on_frame(&self, handler: FrameHandler) {
        *lock(&self.handler) = Some(handler);
    }

    async fn send_text(&self, text: &str) -> Result<()> {
        let frame = InboundFrame::Text(text.to_owned());
        lock(&self.sent).push(frame.clone());
        self.deliver_to_peer(frame);
        Ok(())
    }

    async fn send_binary(&self, data: Bytes) -> Result<()> {
        let frame = InboundFrame::Binary(data);
        lock(&self.sent).push(frame.clone());
        self.deliver_to_peer(frame);
        Ok(())
    }

    async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}
