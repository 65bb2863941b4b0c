//! Transport seam: the capability set this crate needs from the underlying
//! peer-to-peer stack.
//!
//! The negotiator, router, and both channel protocols are written against
//! these traits only. The production implementation lives in
//! [`super::webrtc`]; tests drive the same code paths through an in-memory
//! pair (`super::mock`).
//!
//! Notification callbacks are synchronous and expected to return quickly;
//! anything slow belongs on a task, not in the handler.

use crate::core::error::Result;
use crate::core::signaling::SessionDescriptor;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

/// A single message as delivered by a channel: the transport distinguishes
/// text from binary framing, and the protocol layer classifies from there.
#[derive(Debug, Clone)]
pub enum InboundFrame {
    Text(String),
    Binary(Bytes),
}

/// Connectivity of the underlying peer link, as reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

/// Candidate gathering progress. `Complete` means no further candidates
/// will be found for the current local description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatheringState {
    New,
    Gathering,
    Complete,
}

pub type FrameHandler = Box<dyn Fn(InboundFrame) + Send + Sync>;
pub type ChannelHandler = Box<dyn Fn(Arc<dyn MessageChannel>) + Send + Sync>;
pub type LinkStateHandler = Box<dyn Fn(LinkState) + Send + Sync>;
pub type GatheringStateHandler = Box<dyn Fn(GatheringState) + Send + Sync>;

/// Creates fresh connections. The negotiator discards and replaces whole
/// connections rather than renegotiating, so this is a separate capability
/// from the connection itself.
#[async_trait]
pub trait TransportConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn SessionTransport>>;
}

/// One peer connection: offer/answer negotiation plus logical channels.
#[async_trait]
pub trait SessionTransport: Send + Sync {
    /// Create a locally-initiated channel with the given label.
    async fn create_channel(&self, label: &str) -> Result<Arc<dyn MessageChannel>>;

    /// Replace the handler invoked when the remote peer's channels appear
    /// on this side.
    fn on_incoming_channel(&self, handler: ChannelHandler);

    /// Replace the handler invoked on connectivity transitions.
    fn on_link_state(&self, handler: LinkStateHandler);

    /// Replace the handler invoked on candidate-gathering transitions.
    fn on_gathering_state(&self, handler: GatheringStateHandler);

    /// Current candidate-gathering state.
    fn gathering_state(&self) -> GatheringState;

    async fn create_offer(&self) -> Result<SessionDescriptor>;

    async fn create_answer(&self) -> Result<SessionDescriptor>;

    async fn set_local_description(&self, descriptor: &SessionDescriptor) -> Result<()>;

    async fn set_remote_description(&self, descriptor: &SessionDescriptor) -> Result<()>;

    /// The committed local description, including any candidates gathered
    /// since [`set_local_description`](Self::set_local_description).
    async fn local_description(&self) -> Option<SessionDescriptor>;

    /// Close the connection and, transitively, its channels. Idempotent.
    async fn close(&self);
}

/// A named, independent message stream multiplexed over one connection.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    fn label(&self) -> String;

    /// Whether the channel is open for sending right now.
    fn is_open(&self) -> bool;

    /// Replace the inbound frame handler.
    fn on_frame(&self, handler: FrameHandler);

    async fn send_text(&self, text: &str) -> Result<()>;

    async fn send_binary(&self, data: Bytes) -> Result<()>;

    async fn close(&self);
}
