//! Serverless peer-to-peer chat and file drop over WebRTC data channels.
//!
//! No signaling server: the offer and answer travel as single opaque
//! strings that the two humans exchange by hand (chat, email, carrier
//! pigeon). All ICE candidates are gathered up front — bounded by a short
//! timeout — so each direction is exactly one copy/paste.
//!
//! ```no_run
//! use pastewire::ChatSession;
//!
//! # async fn run() -> pastewire::Result<()> {
//! let session = ChatSession::with_webrtc();
//! let offer = session.host_chat().await?;
//! // hand `offer` to the peer, paste their answer back:
//! # let answer = String::new();
//! session.accept_answer(&answer).await?;
//! session.send_text("hello over p2p").await;
//! # Ok(())
//! # }
//! ```

pub mod core;

pub use crate::core::connection::webrtc::WebRtcConnector;
pub use crate::core::connection::ChatSession;
pub use crate::core::error::{Error, Result};
pub use crate::core::message::{ChatMessage, FileAttachment, Sender};
pub use crate::core::observable::{Observable, SubscriptionId};
pub use crate::core::protocol::file::OutgoingFile;
pub use crate::core::session::{ConnectionState, SessionState};
pub use crate::core::signaling::{DescriptorKind, SessionDescriptor};
