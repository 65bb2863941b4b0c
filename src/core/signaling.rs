//! Signaling payload codec.
//!
//! A session descriptor travels between peers as an opaque string: JSON
//! serialized, then base64 encoded (standard alphabet, padded) so it
//! survives chat apps, URLs, and shells. Humans paste these by hand, so
//! decoding also accepts the raw JSON form and trims stray whitespace.

use crate::core::error::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which half of the offer/answer exchange a descriptor carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptorKind {
    Offer,
    Answer,
}

impl DescriptorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DescriptorKind::Offer => "offer",
            DescriptorKind::Answer => "answer",
        }
    }
}

impl fmt::Display for DescriptorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A session description ready for the one-string-per-direction exchange.
///
/// Wire shape is `{"type": "offer"|"answer", "sdp": "..."}` — the same JSON
/// a browser produces for its session descriptions, so payloads interoperate
/// with web peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescriptor {
    #[serde(rename = "type")]
    pub kind: DescriptorKind,
    pub sdp: String,
}

impl SessionDescriptor {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: DescriptorKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: DescriptorKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// Encode a descriptor into the transportable payload form.
pub fn encode(descriptor: &SessionDescriptor) -> String {
    let json = serde_json::json!({
        "type": descriptor.kind.as_str(),
        "sdp": descriptor.sdp,
    });
    STANDARD.encode(json.to_string())
}

/// Decode a payload produced by [`encode`], or the raw JSON a human pasted
/// without the base64 layer.
///
/// Base64 is attempted first; when that fails the input is treated as JSON
/// directly. A payload that base64-decodes is committed to that
/// interpretation: garbage behind a valid base64 wrapping is an error, not
/// a reason to retry the raw form.
pub fn decode(payload: &str) -> Result<SessionDescriptor> {
    let trimmed = payload.trim();
    let json = match STANDARD.decode(trimmed) {
        Ok(raw) => String::from_utf8(raw)
            .map_err(|_| Error::MalformedSignalingPayload("decoded payload is not UTF-8".into()))?,
        Err(_) => trimmed.to_owned(),
    };
    serde_json::from_str(&json).map_err(|err| Error::MalformedSignalingPayload(err.to_string()))
}
