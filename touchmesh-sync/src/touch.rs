//! Contact points: one tracked finger touch or mouse drag.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::identity::Color;

/// Identifier of one contact, unique only among its owner's active contacts.
///
/// Touch contacts carry the numeric identifier the input device assigns;
/// the mouse pointer uses the reserved name `"mouse"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContactId {
    Touch(i64),
    Named(String),
}

impl ContactId {
    pub const MOUSE: &'static str = "mouse";

    pub fn mouse() -> Self {
        ContactId::Named(Self::MOUSE.to_string())
    }

    pub fn is_mouse(&self) -> bool {
        matches!(self, ContactId::Named(name) if name == Self::MOUSE)
    }
}

impl From<i64> for ContactId {
    fn from(id: i64) -> Self {
        ContactId::Touch(id)
    }
}

impl From<&str> for ContactId {
    fn from(name: &str) -> Self {
        ContactId::Named(name.to_string())
    }
}

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContactId::Touch(id) => write!(f, "{id}"),
            ContactId::Named(name) => f.write_str(name),
        }
    }
}

/// Position of one contact as it travels on the wire: `{id, x, y}`.
///
/// Coordinates are unconstrained; fast drags can leave the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TouchSample {
    pub id: ContactId,
    pub x: f64,
    pub y: f64,
}

impl TouchSample {
    pub fn new(id: impl Into<ContactId>, x: f64, y: f64) -> Self {
        Self { id: id.into(), x, y }
    }
}

/// A contact point tagged with its owner's color.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactPoint {
    pub id: ContactId,
    pub x: f64,
    pub y: f64,
    pub color: Color,
}

impl ContactPoint {
    pub fn from_sample(sample: TouchSample, color: Color) -> Self {
        Self {
            id: sample.id,
            x: sample.x,
            y: sample.y,
            color,
        }
    }

    pub fn to_sample(&self) -> TouchSample {
        TouchSample {
            id: self.id.clone(),
            x: self.x,
            y: self.y,
        }
    }
}
