//! Draw-ready circle instances.
//!
//! The library never draws. A renderer takes the latest [`FrameSnapshot`]
//! once per frame and uploads the instances built here.
//!
//! [`FrameSnapshot`]: crate::session::FrameSnapshot

use std::collections::HashMap;

use crate::identity::Color;
use crate::remote::ParticipantState;
use crate::touch::ContactPoint;

pub const LOCAL_RADIUS: f32 = 35.0;
pub const LOCAL_STROKE_WIDTH: f32 = 2.0;
pub const REMOTE_RADIUS: f32 = 25.0;
pub const REMOTE_STROKE_WIDTH: f32 = 1.0;
const REMOTE_STROKE_ALPHA: f32 = 0.3;

/// One filled, stroked circle. Packed for instanced upload.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchInstance {
    /// Center in canvas coordinates.
    pub position: [f32; 2],       // 8 bytes
    pub radius: f32,              // 4 bytes
    pub stroke_width: f32,        // 4 bytes
    /// Fill RGBA.
    pub fill: [f32; 4],           // 16 bytes
    /// Stroke RGBA.
    pub stroke: [f32; 4],         // 16 bytes
    // Total: 48 bytes
}

impl TouchInstance {
    pub fn local(point: &ContactPoint) -> Self {
        Self {
            position: [point.x as f32, point.y as f32],
            radius: LOCAL_RADIUS,
            stroke_width: LOCAL_STROKE_WIDTH,
            fill: point.color.to_array(1.0),
            stroke: Color::WHITE.to_array(1.0),
        }
    }

    pub fn remote(point: &ContactPoint) -> Self {
        Self {
            position: [point.x as f32, point.y as f32],
            radius: REMOTE_RADIUS,
            stroke_width: REMOTE_STROKE_WIDTH,
            fill: point.color.to_array(1.0),
            stroke: Color::WHITE.to_array(REMOTE_STROKE_ALPHA),
        }
    }
}

/// Build instances for every local point, then every remote point, so remote
/// contacts draw on top.
pub fn build_touch_instances(
    local: &[ContactPoint],
    remote: &HashMap<String, ParticipantState>,
) -> Vec<TouchInstance> {
    let remote_points = remote.values().flat_map(|p| p.touches.iter());
    let mut instances: Vec<TouchInstance> = local.iter().map(TouchInstance::local).collect();
    instances.extend(remote_points.map(TouchInstance::remote));
    instances
}
