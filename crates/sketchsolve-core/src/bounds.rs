//! Ink bounding-box scan over the raw pixel buffer.

use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Tight bounding box of non-transparent ink pixels.
///
/// A blank buffer produces the degenerate box `{min_x: width, min_y: height,
/// max_x: 0, max_y: 0}` (`min_x > max_x`); callers must fall back to a
/// default anchor instead of deriving a center from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InkBounds {
    pub min_x: usize,
    pub min_y: usize,
    pub max_x: usize,
    pub max_y: usize,
}

impl InkBounds {
    /// Scan an RGBA8 buffer for pixels with alpha > 0.
    ///
    /// Visits every pixel exactly once; isolated single-pixel ink is never
    /// missed.
    pub fn scan(pixels: &[u8], width: usize, height: usize) -> Self {
        let mut bounds = Self {
            min_x: width,
            min_y: height,
            max_x: 0,
            max_y: 0,
        };
        for y in 0..height {
            for x in 0..width {
                let alpha = pixels[(y * width + x) * 4 + 3];
                if alpha > 0 {
                    bounds.min_x = bounds.min_x.min(x);
                    bounds.min_y = bounds.min_y.min(y);
                    bounds.max_x = bounds.max_x.max(x);
                    bounds.max_y = bounds.max_y.max(y);
                }
            }
        }
        bounds
    }

    /// True when no ink pixel was found.
    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    /// Center of the box, or None for the degenerate case.
    pub fn center(&self) -> Option<Point> {
        if self.is_empty() {
            return None;
        }
        Some(Point::new(
            (self.min_x + self.max_x) as f64 / 2.0,
            (self.min_y + self.max_y) as f64 / 2.0,
        ))
    }
}
