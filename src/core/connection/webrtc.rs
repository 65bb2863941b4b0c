//! Production transport: the seam implemented over the `webrtc` crate.
//!
//! Channels are created ordered + fully reliable (SCTP default, no partial
//! reliability); the file protocol's in-order reassembly depends on it.
//! Connectivity is tracked through the ICE connection state, which the
//! session maps onto [`ConnectionState`](crate::core::session::ConnectionState).

use crate::core::config::STUN_SERVERS;
use crate::core::error::{Error, Result};
use crate::core::signaling::{DescriptorKind, SessionDescriptor};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, error, info};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_gatherer_state::RTCIceGathererState;
use webrtc::ice_transport::ice_gathering_state::RTCIceGatheringState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;

use super::transport::{
    ChannelHandler, FrameHandler, GatheringState, GatheringStateHandler, InboundFrame, LinkState,
    LinkStateHandler, MessageChannel, SessionTransport, TransportConnector,
};

impl From<webrtc::Error> for Error {
    fn from(err: webrtc::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

// ── Connector ────────────────────────────────────────────────────────────────

/// Creates WebRTC peer connections with a fixed ICE server list.
pub struct WebRtcConnector {
    ice_servers: Vec<RTCIceServer>,
}

impl WebRtcConnector {
    /// Connector with the default STUN servers.
    pub fn new() -> Self {
        Self::with_ice_servers(STUN_SERVERS.iter().map(|s| s.to_string()))
    }

    /// Connector with caller-provided ICE server URLs.
    pub fn with_ice_servers(urls: impl IntoIterator<Item = String>) -> Self {
        Self {
            ice_servers: urls
                .into_iter()
                .map(|url| RTCIceServer {
                    urls: vec![url],
                    ..Default::default()
                })
                .collect(),
        }
    }
}

impl Default for WebRtcConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransportConnector for WebRtcConnector {
    async fn connect(&self) -> Result<Arc<dyn SessionTransport>> {
        let mut media_engine = MediaEngine::default();
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;
        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let pc = api
            .new_peer_connection(RTCConfiguration {
                ice_servers: self.ice_servers.clone(),
                ..Default::default()
            })
            .await?;
        debug!(event = "peer_connection_created", "New WebRTC peer connection");
        Ok(Arc::new(WebRtcTransport { pc: Arc::new(pc) }))
    }
}

// ── Connection ───────────────────────────────────────────────────────────────

struct WebRtcTransport {
    pc: Arc<RTCPeerConnection>,
}

#[async_trait]
impl SessionTransport for WebRtcTransport {
    async fn create_channel(&self, label: &str) -> Result<Arc<dyn MessageChannel>> {
        let init = RTCDataChannelInit {
            ordered: Some(true),
            ..Default::default()
        };
        let dc = self.pc.create_data_channel(label, Some(init)).await?;
        Ok(WebRtcChannel::wrap(dc))
    }

    fn on_incoming_channel(&self, handler: ChannelHandler) {
        self.pc
            .on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
                handler(WebRtcChannel::wrap(dc));
                Box::pin(async {})
            }));
    }

    fn on_link_state(&self, handler: LinkStateHandler) {
        self.pc
            .on_ice_connection_state_change(Box::new(move |state: RTCIceConnectionState| {
                handler(map_link_state(state));
                Box::pin(async {})
            }));
    }

    fn on_gathering_state(&self, handler: GatheringStateHandler) {
        self.pc
            .on_ice_gathering_state_change(Box::new(move |state: RTCIceGathererState| {
                let mapped = match state {
                    RTCIceGathererState::Gathering => GatheringState::Gathering,
                    RTCIceGathererState::Complete => GatheringState::Complete,
                    _ => GatheringState::New,
                };
                handler(mapped);
                Box::pin(async {})
            }));
    }

    fn gathering_state(&self) -> GatheringState {
        match self.pc.ice_gathering_state() {
            RTCIceGatheringState::Gathering => GatheringState::Gathering,
            RTCIceGatheringState::Complete => GatheringState::Complete,
            _ => GatheringState::New,
        }
    }

    async fn create_offer(&self) -> Result<SessionDescriptor> {
        let offer = self.pc.create_offer(None).await?;
        Ok(SessionDescriptor::offer(offer.sdp))
    }

    async fn create_answer(&self) -> Result<SessionDescriptor> {
        let answer = self.pc.create_answer(None).await?;
        Ok(SessionDescriptor::answer(answer.sdp))
    }

    async fn set_local_description(&self, descriptor: &SessionDescriptor) -> Result<()> {
        self.pc
            .set_local_description(to_rtc_description(descriptor)?)
            .await?;
        Ok(())
    }

    async fn set_remote_description(&self, descriptor: &SessionDescriptor) -> Result<()> {
        self.pc
            .set_remote_description(to_rtc_description(descriptor)?)
            .await?;
        Ok(())
    }

    async fn local_description(&self) -> Option<SessionDescriptor> {
        let desc = self.pc.local_description().await?;
        let kind = match desc.sdp_type {
            RTCSdpType::Offer => DescriptorKind::Offer,
            RTCSdpType::Answer => DescriptorKind::Answer,
            _ => return None,
        };
        Some(SessionDescriptor {
            kind,
            sdp: desc.sdp,
        })
    }

    async fn close(&self) {
        if let Err(err) = self.pc.close().await {
            debug!(event = "pc_close_failed", error = %err, "Peer connection close reported an error");
        }
    }
}

fn map_link_state(state: RTCIceConnectionState) -> LinkState {
    match state {
        RTCIceConnectionState::Checking => LinkState::Checking,
        RTCIceConnectionState::Connected => LinkState::Connected,
        RTCIceConnectionState::Completed => LinkState::Completed,
        RTCIceConnectionState::Disconnected => LinkState::Disconnected,
        RTCIceConnectionState::Failed => LinkState::Failed,
        RTCIceConnectionState::Closed => LinkState::Closed,
        _ => LinkState::New,
    }
}

fn to_rtc_description(descriptor: &SessionDescriptor) -> Result<RTCSessionDescription> {
    let desc = match descriptor.kind {
        DescriptorKind::Offer => RTCSessionDescription::offer(descriptor.sdp.clone())?,
        DescriptorKind::Answer => RTCSessionDescription::answer(descriptor.sdp.clone())?,
    };
    Ok(desc)
}

// ── Channel ──────────────────────────────────────────────────────────────────

struct WebRtcChannel {
    dc: Arc<RTCDataChannel>,
}

impl WebRtcChannel {
    fn wrap(dc: Arc<RTCDataChannel>) -> Arc<Self> {
        {
            let label = dc.label().to_string();
            dc.on_open(Box::new(move || {
                info!(event = "channel_open", label = %label, "Data channel open");
                Box::pin(async {})
            }));
        }
        {
            let label = dc.label().to_string();
            dc.on_close(Box::new(move || {
                info!(event = "channel_closed", label = %label, "Data channel closed");
                Box::pin(async {})
            }));
        }
        {
            let label = dc.label().to_string();
            dc.on_error(Box::new(move |err| {
                error!(event = "channel_error", label = %label, error = %err, "Data channel error");
                Box::pin(async {})
            }));
        }
        Arc::new(Self { dc })
    }
}

#[async_trait]
impl MessageChannel for WebRtcChannel {
    fn label(&self) -> String {
        self.dc.label().to_string()
    }

    fn is_open(&self) -> bool {
        self.dc.ready_state() == RTCDataChannelState::Open
    }

    fn on_frame(&self, handler: FrameHandler) {
        self.dc.on_message(Box::new(move |msg: DataChannelMessage| {
            if msg.is_string {
                match String::from_utf8(msg.data.to_vec()) {
                    Ok(text) => handler(InboundFrame::Text(text)),
                    Err(_) => {
                        debug!(
                            event = "non_utf8_text_frame",
                            "Dropping text frame with invalid UTF-8"
                        );
                    }
                }
            } else {
                handler(InboundFrame::Binary(msg.data));
            }
            Box::pin(async {})
        }));
    }

    async fn send_text(&self, text: &str) -> Result<()> {
        self.dc.send_text(text.to_owned()).await?;
        Ok(())
    }

    async fn send_binary(&self, data: Bytes) -> Result<()> {
        self.dc.send(&data).await?;
        Ok(())
    }

    async fn close(&self) {
        if let Err(err) = self.dc.close().await {
            debug!(event = "channel_close_failed", error = %err, "Data channel close reported an error");
        }
    }
}
