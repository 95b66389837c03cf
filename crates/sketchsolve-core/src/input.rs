//! Pointer event model for the drawing surface.

use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Kind of device a pointer event originated from.
///
/// Mirrors the `pointerType` taxonomy of the platforms the surface is
/// driven by. Only pen and mouse input produces ink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    Pen,
    Mouse,
    Touch,
    /// Anything the platform reports that is none of the above.
    Other,
}

impl DeviceKind {
    /// Whether events from this device start or extend strokes.
    pub fn draws(self) -> bool {
        matches!(self, DeviceKind::Pen | DeviceKind::Mouse)
    }
}

/// Pointer event fed into the surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PointerEvent {
    Down {
        position: Point,
        device: DeviceKind,
    },
    Move {
        position: Point,
        /// Reported pressure in 0.0..=1.0. Mice report 0.0.
        pressure: f64,
        device: DeviceKind,
    },
    Up,
    /// Pointer left the surface; treated exactly like `Up`.
    Leave,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drawing_devices() {
        assert!(DeviceKind::Pen.draws());
        assert!(DeviceKind::Mouse.draws());
        assert!(!DeviceKind::Touch.draws());
        assert!(!DeviceKind::Other.draws());
    }

    #[test]
    fn test_event_serialize_roundtrip() {
        let event = PointerEvent::Down {
            position: Point::new(12.0, 34.0),
            device: DeviceKind::Pen,
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: PointerEvent = serde_json::from_str(&json).unwrap();
        match back {
            PointerEvent::Down { position, device } => {
                assert_eq!(position, Point::new(12.0, 34.0));
                assert_eq!(device, DeviceKind::Pen);
            }
            _ => panic!("wrong event variant"),
        }
    }
}
