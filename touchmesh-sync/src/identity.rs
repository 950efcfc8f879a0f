//! Participant identity: an opaque client id plus a display color.
//!
//! Both are generated once per process and never change afterwards.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::protocol::ProtocolError;

/// 24-bit RGB color, written on the wire as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color(u32);

impl Color {
    pub const WHITE: Color = Color(0xFF_FFFF);

    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self(((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    /// Build from a packed `0xRRGGBB` value. Bits above 24 are ignored.
    pub fn from_u32(rgb: u32) -> Self {
        Self(rgb & 0xFF_FFFF)
    }

    /// Pick a color from the random bits of a v4 UUID.
    ///
    /// The low 24 bits of a v4 UUID carry no version/variant bits, so every
    /// color in the 24-bit space is reachable.
    pub fn from_uuid(id: Uuid) -> Self {
        Self::from_u32((id.as_u128() & 0xFF_FFFF) as u32)
    }

    pub fn r(&self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub fn g(&self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn b(&self) -> u8 {
        self.0 as u8
    }

    pub fn to_u32(&self) -> u32 {
        self.0
    }

    /// Lowercase `#rrggbb`.
    pub fn to_hex(&self) -> String {
        format!("#{:06x}", self.0)
    }

    /// Parse `#rrggbb` (hex digits in either case).
    pub fn parse_hex(s: &str) -> Result<Self, ProtocolError> {
        let digits = s
            .strip_prefix('#')
            .filter(|d| d.len() == 6 && d.bytes().all(|b| b.is_ascii_hexdigit()))
            .ok_or_else(|| ProtocolError::InvalidField(format!("color {s:?} is not #rrggbb")))?;
        let rgb = u32::from_str_radix(digits, 16)
            .map_err(|e| ProtocolError::InvalidField(format!("color {s:?}: {e}")))?;
        Ok(Self(rgb))
    }

    /// Normalized RGBA with the given alpha, for GPU/canvas upload.
    pub fn to_array(&self, alpha: f32) -> [f32; 4] {
        [
            self.r() as f32 / 255.0,
            self.g() as f32 / 255.0,
            self.b() as f32 / 255.0,
            alpha,
        ]
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.0)
    }
}

impl FromStr for Color {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_hex(s)
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// This client's identity for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    client_id: String,
    color: Color,
}

impl Identity {
    /// Generate a fresh identity.
    ///
    /// The id is a random UUID in simple form (32 hex digits). The color is
    /// drawn from an independent UUID.
    pub fn generate() -> Self {
        Self {
            client_id: Uuid::new_v4().simple().to_string(),
            color: Color::from_uuid(Uuid::new_v4()),
        }
    }

    /// Create with an explicit id and color (for testing).
    pub fn new(client_id: impl Into<String>, color: Color) -> Self {
        Self {
            client_id: client_id.into(),
            color,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// First four characters of the id, for log lines.
    pub fn short_id(&self) -> &str {
        short_id(&self.client_id)
    }

    pub fn color(&self) -> Color {
        self.color
    }
}

/// Abbreviate a participant id to its first four characters.
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(4) {
        Some((end, _)) => &id[..end],
        None => id,
    }
}
