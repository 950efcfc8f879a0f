//! Pointer and touch events consumed from the host environment.

use crate::touch::{ContactId, TouchSample};

/// One input event.
///
/// Touch events carry every contact that changed in that event; the session
/// applies all of them before emitting a single message.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    TouchStart(Vec<TouchSample>),
    TouchMove(Vec<TouchSample>),
    TouchEnd(Vec<ContactId>),
    /// Interrupted by the system; handled like an end.
    TouchCancel(Vec<ContactId>),
    MouseDown { x: f64, y: f64 },
    /// Ignored unless the button is held.
    MouseMove { x: f64, y: f64 },
    MouseUp,
    /// Pointer left the canvas; ends the drag if the button is held.
    MouseLeave,
}

impl InputEvent {
    /// Single-contact touch start.
    pub fn touch_start(id: i64, x: f64, y: f64) -> Self {
        InputEvent::TouchStart(vec![TouchSample::new(id, x, y)])
    }

    /// Single-contact touch move.
    pub fn touch_move(id: i64, x: f64, y: f64) -> Self {
        InputEvent::TouchMove(vec![TouchSample::new(id, x, y)])
    }

    /// Single-contact touch end.
    pub fn touch_end(id: i64) -> Self {
        InputEvent::TouchEnd(vec![ContactId::Touch(id)])
    }
}
