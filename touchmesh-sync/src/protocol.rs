//! JSON wire protocol for touch-state synchronization.
//!
//! Every frame is a JSON text message tagged by `type`:
//! ```text
//! {"type":"touchUpdate","clientId":"…","color":"#rrggbb","touches":[{"id":1,"x":10,"y":20}]}
//! {"type":"clearTouches","clientId":"…"}
//! ```
//!
//! An Update always carries the sender's complete active set, so any Update
//! fully supersedes the previous one and a dropped frame heals on the next.
//! Frames with an unrecognized `type` decode to [`WireMessage::Unknown`] and
//! are ignored by receivers.

use serde::{Deserialize, Serialize};

use crate::identity::Color;
use crate::touch::{ContactPoint, TouchSample};

pub const TOUCH_UPDATE: &str = "touchUpdate";
pub const CLEAR_TOUCHES: &str = "clearTouches";

/// Top-level protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WireMessage {
    /// Full replacement of the sender's active contact set.
    #[serde(rename = "touchUpdate", rename_all = "camelCase")]
    TouchUpdate {
        client_id: String,
        color: Color,
        touches: Vec<TouchSample>,
    },
    /// The sender has no active contacts.
    #[serde(rename = "clearTouches", rename_all = "camelCase")]
    ClearTouches { client_id: String },
    /// Any other `type`. Kept for forward compatibility, never sent.
    #[serde(other)]
    Unknown,
}

impl WireMessage {
    /// Create an update carrying the given contacts.
    pub fn update(client_id: impl Into<String>, color: Color, contacts: &[ContactPoint]) -> Self {
        WireMessage::TouchUpdate {
            client_id: client_id.into(),
            color,
            touches: contacts.iter().map(ContactPoint::to_sample).collect(),
        }
    }

    /// Create a clear signal.
    pub fn clear(client_id: impl Into<String>) -> Self {
        WireMessage::ClearTouches {
            client_id: client_id.into(),
        }
    }

    /// Sender id, if this is a known message kind.
    pub fn client_id(&self) -> Option<&str> {
        match self {
            WireMessage::TouchUpdate { client_id, .. } => Some(client_id),
            WireMessage::ClearTouches { client_id } => Some(client_id),
            WireMessage::Unknown => None,
        }
    }

    /// Short name of the message kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            WireMessage::TouchUpdate { .. } => TOUCH_UPDATE,
            WireMessage::ClearTouches { .. } => CLEAR_TOUCHES,
            WireMessage::Unknown => "unknown",
        }
    }

    /// Serialize to a JSON text frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        if matches!(self, WireMessage::Unknown) {
            return Err(ProtocolError::Encode("cannot encode an unknown message kind".into()));
        }
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// Parse and validate a JSON text frame.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let msg: WireMessage =
            serde_json::from_str(text).map_err(|e| ProtocolError::Decode(e.to_string()))?;
        msg.validate()?;
        Ok(msg)
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        match self.client_id() {
            Some("") => Err(ProtocolError::InvalidField("clientId is empty".into())),
            _ => Ok(()),
        }
    }
}

/// Protocol errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolError {
    Encode(String),
    Decode(String),
    InvalidField(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Encode(e) => write!(f, "Encode error: {e}"),
            Self::Decode(e) => write!(f, "Decode error: {e}"),
            Self::InvalidField(e) => write!(f, "Invalid field: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}
