//! Channel router: binds remotely-created channels by label.
//!
//! Only the joining side ever sees this fire — the host creates its
//! channels itself. Unknown labels are ignored so newer peers can add
//! channels without breaking older ones.

use crate::core::config::{CHAT_CHANNEL_LABEL, FILE_CHANNEL_LABEL};
use crate::core::connection::transport::MessageChannel;
use crate::core::connection::ChannelSlot;
use crate::core::observable::lock;
use crate::core::protocol::file::IncomingTransfer;
use crate::core::protocol::{chat, file};
use crate::core::session::SessionState;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Inspect an incoming channel's label and install the matching protocol.
pub(crate) fn bind_incoming_channel(
    channel: Arc<dyn MessageChannel>,
    state: &Arc<SessionState>,
    incoming: &Arc<Mutex<Option<IncomingTransfer>>>,
    chat_slot: &ChannelSlot,
    file_slot: &ChannelSlot,
) {
    let label = channel.label();
    match label.as_str() {
        CHAT_CHANNEL_LABEL => {
            info!(event = "chat_channel_bound", "Remote chat channel attached");
            channel.on_frame(chat::inbound_handler(state.clone()));
            *lock(chat_slot) = Some(channel);
        }
        FILE_CHANNEL_LABEL => {
            info!(event = "file_channel_bound", "Remote file channel attached");
            channel.on_frame(file::inbound_handler(state.clone(), incoming.clone()));
            *lock(file_slot) = Some(channel);
        }
        other => {
            debug!(
                event = "unknown_channel_ignored",
                label = other,
                "Ignoring data channel with unrecognized label"
            );
        }
    }
}
