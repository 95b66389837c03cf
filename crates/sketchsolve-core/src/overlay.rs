//! Result overlays: placement, drag relocation, and typeset notification.

use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Nominal extent of an overlay for drag hit testing. The real rendered
/// size belongs to the external typesetting engine; this box only needs to
/// be grabbable.
pub const HIT_WIDTH: f64 = 160.0;
pub const HIT_HEIGHT: f64 = 48.0;

/// Build the display markup handed to the typesetting sink.
pub fn display_markup(expression: &str, answer: &str) -> String {
    format!(r"\[\LARGE {expression} = {answer} \]")
}

/// A positioned, draggable rendering of one recognition result.
///
/// Content is immutable once the overlay is added; only the position moves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Overlay {
    content: String,
    position: Point,
}

impl Overlay {
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn position(&self) -> Point {
        self.position
    }
}

/// Drag-relocation state for one overlay.
#[derive(Debug, Clone, Copy)]
struct DragState {
    index: usize,
    /// Offset from the overlay origin to the grab point, kept constant
    /// while dragging.
    grab_offset: (f64, f64),
}

/// Owns the list of placed result overlays and their drag state.
///
/// Order is append order; it carries no meaning beyond display stacking.
/// Any change to the set marks it dirty so the shell can re-trigger the
/// typesetting sink.
#[derive(Debug, Clone, Default)]
pub struct OverlayManager {
    overlays: Vec<Overlay>,
    drag: Option<DragState>,
    dirty: bool,
}

impl OverlayManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new overlay at `position`.
    pub fn add(&mut self, content: String, position: Point) {
        self.overlays.push(Overlay { content, position });
        self.dirty = true;
    }

    /// Move one overlay in place. Other overlays are untouched.
    /// Returns false for an out-of-range index.
    pub fn move_to(&mut self, index: usize, position: Point) -> bool {
        match self.overlays.get_mut(index) {
            Some(overlay) => {
                overlay.position = position;
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    /// Empty the overlay list and any drag in progress.
    pub fn clear_all(&mut self) {
        if !self.overlays.is_empty() {
            self.dirty = true;
        }
        self.overlays.clear();
        self.drag = None;
    }

    pub fn overlays(&self) -> &[Overlay] {
        &self.overlays
    }

    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }

    /// Topmost overlay under `point`, front of the display stack first.
    pub fn hit_test(&self, point: Point) -> Option<usize> {
        self.overlays.iter().enumerate().rev().find_map(|(i, o)| {
            let inside = point.x >= o.position.x
                && point.x <= o.position.x + HIT_WIDTH
                && point.y >= o.position.y
                && point.y <= o.position.y + HIT_HEIGHT;
            inside.then_some(i)
        })
    }

    /// Start dragging the overlay under `point`, if any.
    pub fn begin_drag(&mut self, point: Point) -> bool {
        match self.hit_test(point) {
            Some(index) => {
                let origin = self.overlays[index].position;
                self.drag = Some(DragState {
                    index,
                    grab_offset: (point.x - origin.x, point.y - origin.y),
                });
                true
            }
            None => false,
        }
    }

    /// Update the dragged overlay to follow `point`.
    pub fn drag_to(&mut self, point: Point) {
        if let Some(drag) = self.drag {
            let position = Point::new(point.x - drag.grab_offset.0, point.y - drag.grab_offset.1);
            self.move_to(drag.index, position);
        }
    }

    /// Finish the drag in progress. Idempotent.
    pub fn end_drag(&mut self) {
        self.drag = None;
    }

    pub fn drag_active(&self) -> bool {
        self.drag.is_some()
    }

    /// True if the set changed since the last call; clears the flag.
    /// The shell re-triggers the typesetting sink when this fires.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

/// Rendering sink for marked-up overlay content.
///
/// Implementations are external typesetting engines; the core only feeds
/// them the full overlay slice whenever the set changes.
pub trait TypesetSink {
    fn typeset(&mut self, overlays: &[Overlay]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_markup() {
        assert_eq!(display_markup("x", "5"), r"\[\LARGE x = 5 \]");
    }

    #[test]
    fn test_add_and_move() {
        let mut manager = OverlayManager::new();
        manager.add("a".into(), Point::new(10.0, 10.0));
        manager.add("b".into(), Point::new(20.0, 20.0));

        assert!(manager.move_to(0, Point::new(99.0, 99.0)));

        assert_eq!(manager.overlays()[0].position(), Point::new(99.0, 99.0));
        // The other overlay is untouched.
        assert_eq!(manager.overlays()[1].position(), Point::new(20.0, 20.0));
        assert_eq!(manager.overlays()[1].content(), "b");
    }

    #[test]
    fn test_move_out_of_range() {
        let mut manager = OverlayManager::new();
        assert!(!manager.move_to(0, Point::new(1.0, 1.0)));
    }

    #[test]
    fn test_clear_all() {
        let mut manager = OverlayManager::new();
        manager.add("a".into(), Point::new(0.0, 0.0));
        manager.clear_all();
        assert!(manager.is_empty());
        assert!(!manager.drag_active());
    }

    #[test]
    fn test_hit_test_prefers_topmost() {
        let mut manager = OverlayManager::new();
        manager.add("below".into(), Point::new(10.0, 10.0));
        manager.add("above".into(), Point::new(10.0, 10.0));

        assert_eq!(manager.hit_test(Point::new(15.0, 15.0)), Some(1));
        assert_eq!(manager.hit_test(Point::new(500.0, 500.0)), None);
    }

    #[test]
    fn test_drag_keeps_grab_offset() {
        let mut manager = OverlayManager::new();
        manager.add("a".into(), Point::new(100.0, 100.0));

        assert!(manager.begin_drag(Point::new(110.0, 105.0)));
        manager.drag_to(Point::new(210.0, 155.0));
        manager.end_drag();

        assert_eq!(manager.overlays()[0].position(), Point::new(200.0, 150.0));
        assert!(!manager.drag_active());
    }

    #[test]
    fn test_drag_misses_empty_space() {
        let mut manager = OverlayManager::new();
        manager.add("a".into(), Point::new(100.0, 100.0));
        assert!(!manager.begin_drag(Point::new(0.0, 0.0)));
        manager.drag_to(Point::new(50.0, 50.0));
        assert_eq!(manager.overlays()[0].position(), Point::new(100.0, 100.0));
    }

    #[test]
    fn test_dirty_tracking() {
        let mut manager = OverlayManager::new();
        assert!(!manager.take_dirty());

        manager.add("a".into(), Point::new(0.0, 0.0));
        assert!(manager.take_dirty());
        assert!(!manager.take_dirty());

        manager.move_to(0, Point::new(5.0, 5.0));
        assert!(manager.take_dirty());

        manager.clear_all();
        assert!(manager.take_dirty());
        // Clearing an already-empty set is not a change.
        manager.clear_all();
        assert!(!manager.take_dirty());
    }
}
